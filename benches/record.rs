use criterion::Criterion;

use threebot::record::Record;

const KV: &str = r#"{"a":[{"ip":"192.0.2.1","ttl":60},{"ip":"192.0.2.2"}],
    "aaaa":[{"ip":"2001:db8::1","ttl":3600}],
    "cname":[{"host":"zaibon.grid.tf."}]}"#;

const WHOIS: &[u8] = br#"{"record":{"id":38,
    "addresses":["google.com","8.8.8.8","192.168.12.42","2001:db8:85a3::8a2e:370:7334"],
    "names":["codepaste.thabeta"],
    "publickey":"ed25519:47ae06c4457f8fc1ec9ecc944fc05459d320670575a95b517465b6c332a7f2d2",
    "expiration":1559901840}}"#;

fn from_kv_json(c: &mut Criterion) {
    c.bench_function("Record from key/value JSON", |b| {
        b.iter(|| Record::from_kv_json(KV).unwrap())
    });
}

fn from_directory_json(c: &mut Criterion) {
    c.bench_function("Record from whois response", |b| {
        b.iter(|| Record::from_directory_json(WHOIS, 300).unwrap())
    });
}

criterion_group!(record, from_kv_json, from_directory_json);

use criterion::Criterion;
use std::str::FromStr;

use threebot::name::Name;

fn from_str(c: &mut Criterion) {
    c.bench_function("Name from_str", |b| {
        b.iter(|| Name::from_str("zaibon.tf3bot.grid.tf.").unwrap())
    });
}

fn from_str_idna(c: &mut Criterion) {
    c.bench_function("Name from_str (IDNA)", |b| {
        b.iter(|| Name::from_str("bücher.grid.tf").unwrap())
    });
}

criterion_group!(name, from_str, from_str_idna);

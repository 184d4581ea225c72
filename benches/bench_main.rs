#[macro_use]
extern crate criterion;
extern crate threebot;

mod name;
mod record;

criterion_main!(name::name, location::location, record::record);

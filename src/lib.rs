//! The `fundtrace` library reconciles grant-funded projects against their
//! on-chain wallets and milestone reviews, and publishes the results as
//! CSV tables, a markdown summary and a JSON cache.

pub mod backend;
pub mod config;
pub mod dates;
pub mod ledger;
pub mod logger;
pub mod metrics;
pub mod notifier;
pub mod pipeline;
pub mod project_store;
pub mod records;
pub mod report;
pub mod result;
pub mod rollup;
pub mod table_store;

extern crate bs58;
extern crate chrono;
extern crate env_logger;
extern crate influx_db_client;
extern crate itertools;
#[macro_use]
extern crate log;
#[cfg(test)]
#[macro_use]
extern crate matches;
#[cfg(test)]
extern crate rand;
extern crate reqwest;
extern crate serde;
extern crate serde_cbor;
#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate serde_json;

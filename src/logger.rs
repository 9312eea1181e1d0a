//! The `logger` module configures env_logger once per process. Runs default
//! to `info` so cron captures a useful trail even without RUST_LOG set.

use env_logger;
use log::LevelFilter;
use std::env;
use std::sync::{Once, ONCE_INIT};

static INIT: Once = ONCE_INIT;

pub fn setup() {
    INIT.call_once(|| {
        let mut builder = env_logger::Builder::new();
        builder.filter(None, LevelFilter::Info);
        if let Ok(spec) = env::var("RUST_LOG") {
            builder.parse(&spec);
        }
        builder.init();
    });
}

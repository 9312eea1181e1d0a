//! The `metrics` module buffers InfluxDB points during a run and flushes
//! them once at the end. Configured from the environment; with no
//! `INFLUX_HOST` set every submit is a quiet no-op. Flush failures are
//! logged and swallowed, metrics never fail a run.

use influx_db_client as influxdb;
use std::env;
use std::mem;

pub struct MetricsAgent {
    client: Option<influxdb::Client>,
    points: Vec<influxdb::Point>,
}

impl MetricsAgent {
    /// Builds the agent from `INFLUX_HOST`, `INFLUX_DB`, `INFLUX_USERNAME`
    /// and `INFLUX_PASSWORD`. A missing host disables submission.
    pub fn from_env() -> MetricsAgent {
        let client = match env::var("INFLUX_HOST") {
            Ok(host) => {
                let db = env::var("INFLUX_DB").unwrap_or_else(|_| "fundtrace".to_string());
                let username = env::var("INFLUX_USERNAME").unwrap_or_default();
                let password = env::var("INFLUX_PASSWORD").unwrap_or_default();
                Some(influxdb::Client::new(host, db).set_authentication(username, password))
            }
            Err(_) => None,
        };
        MetricsAgent {
            client,
            points: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.client.is_some()
    }

    pub fn submit(&mut self, point: influxdb::Point) {
        if self.client.is_none() {
            debug!("metrics disabled, dropping point");
            return;
        }
        self.points.push(point);
    }

    /// Sends every buffered point in one batch.
    pub fn flush(&mut self) {
        let points = mem::replace(&mut self.points, Vec::new());
        if points.is_empty() {
            return;
        }
        if let Some(ref client) = self.client {
            let batch = influxdb::Points::create_new(points);
            if let Err(err) = client.write_points(
                batch,
                Some(influxdb::Precision::Milliseconds),
                None,
            ) {
                warn!("metrics flush failed: {:?}", err);
            }
        }
    }
}

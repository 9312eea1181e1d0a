#[macro_use]
extern crate clap;
extern crate atty;
extern crate chrono;
extern crate dirs;
extern crate fundtrace;
extern crate influx_db_client;
#[macro_use]
extern crate log;
extern crate rand;

use chrono::Utc;
use clap::{App, Arg};
use fundtrace::backend::RepositoryClient;
use fundtrace::config::{read_config, Settings};
use fundtrace::ledger::LedgerClient;
use fundtrace::logger;
use fundtrace::metrics::MetricsAgent;
use fundtrace::notifier::Notifier;
use fundtrace::pipeline::{self, LiveSource};
use fundtrace::project_store::{self, ProjectCache};
use fundtrace::records::{GlobalFinancials, ProjectAggregate};
use fundtrace::report;
use fundtrace::result::{Error, Result};
use fundtrace::rollup;
use fundtrace::table_store::TableStore;
use influx_db_client as influxdb;
use rand::{thread_rng, Rng};
use std::fs::File;
use std::io::Write;
use std::process;
use std::time::Instant;

fn main() {
    logger::setup();
    let matches = App::new("fundtrace-report")
        .version(crate_version!())
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("PATH")
                .takes_value(true)
                .help("Path to the projects config file"),
        ).arg(
            Arg::with_name("output-dir")
                .short("o")
                .long("output-dir")
                .value_name("DIR")
                .takes_value(true)
                .help("Directory the tables, summary and cache are written to"),
        ).arg(
            Arg::with_name("skip-notify")
                .long("skip-notify")
                .help("Do not post the run status to the webhook"),
        ).get_matches();

    let settings = match Settings::from_env() {
        Ok(settings) => settings,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    let mut default_config = dirs::home_dir().expect("home directory");
    default_config.extend(&[".config", "fundtrace", "config.json"]);
    let config_path = matches
        .value_of("config")
        .unwrap_or_else(|| default_config.to_str().unwrap());
    let config = match read_config(config_path) {
        Ok(config) => config,
        Err(err) => {
            error!("{}: {}", config_path, err);
            process::exit(1);
        }
    };
    if config.projects.is_empty() {
        error!("{}: no projects configured", config_path);
        process::exit(1);
    }

    let output_dir = matches.value_of("output-dir").unwrap_or(".");
    let store = match TableStore::open(output_dir) {
        Ok(store) => store,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    let repository = RepositoryClient::new(&settings);
    let ledger = LedgerClient::new(&settings);
    let source = LiveSource {
        repository: &repository,
        ledger: &ledger,
    };
    let mut metrics = MetricsAgent::from_env();
    let webhook_url = if matches.is_present("skip-notify") {
        None
    } else {
        settings.webhook_url.clone()
    };
    let notifier = Notifier::new(webhook_url);

    let run_id = format!("{:08x}", thread_rng().gen::<u32>());
    info!(
        "run {}: {} projects, output {}",
        run_id,
        config.projects.len(),
        output_dir
    );
    let started = Instant::now();

    let outcome = pipeline::run(&source, &config.projects);
    let global = rollup::build_global(&ledger, &outcome.processed, &config.organizations);
    let generated_at = Utc::now().format("%Y-%m-%d %H:%M UTC").to_string();
    let summary = report::render_summary(
        &outcome.processed,
        &outcome.failures,
        &global,
        &generated_at,
    );
    let persisted = write_outputs(
        &store,
        &outcome.processed,
        &global,
        &summary,
        &generated_at,
        &settings.milestone_site_url,
    );

    let elapsed = started.elapsed();
    let duration_ms = elapsed.as_secs() * 1000 + u64::from(elapsed.subsec_nanos()) / 1_000_000;
    metrics.submit(
        influxdb::Point::new("fundtrace-run")
            .add_tag("run_id", influxdb::Value::String(run_id.clone()))
            .add_field(
                "projects_processed",
                influxdb::Value::Integer(outcome.processed.len() as i64),
            ).add_field(
                "projects_failed",
                influxdb::Value::Integer(outcome.failures.len() as i64),
            ).add_field("duration_ms", influxdb::Value::Integer(duration_ms as i64))
            .to_owned(),
    );
    metrics.flush();

    match persisted {
        Ok(()) => {
            if atty::is(atty::Stream::Stdout) {
                println!("{}", summary);
            }
            notifier.notify(&format!(
                "run {}: {} projects processed, {} failed, total received {}",
                run_id,
                outcome.processed.len(),
                outcome.failures.len(),
                global.total_received
            ));
            info!("run {} finished in {} ms", run_id, duration_ms);
        }
        Err(err) => {
            error!("run {}: persisting outputs failed: {}", run_id, err);
            notifier.notify(&format!("run {}: persisting outputs failed: {}", run_id, err));
            process::exit(1);
        }
    }
}

/// Writes every table, the summary document and the projects cache. The
/// first failure aborts the remaining writes so a partial run is visible
/// as an error, not as silently stale files.
fn write_outputs(
    store: &TableStore,
    processed: &[ProjectAggregate],
    global: &GlobalFinancials,
    summary: &str,
    generated_at: &str,
    milestone_site: &str,
) -> Result<()> {
    let mut proposal_rows = Vec::new();
    let mut milestone_rows = Vec::new();
    let mut transaction_rows = Vec::new();
    let mut collaborator_rows = Vec::new();
    for aggregate in processed {
        proposal_rows.push(report::proposal_row(aggregate, milestone_site));
        milestone_rows.extend(report::milestone_rows(aggregate));
        transaction_rows.extend(report::transaction_rows(aggregate));
        collaborator_rows.extend(report::collaborator_rows(aggregate));
    }

    store.write_table(
        report::PROPOSALS_TABLE,
        &report::PROPOSALS_HEADER,
        &proposal_rows,
    )?;
    store.write_table(
        report::MILESTONES_TABLE,
        &report::MILESTONES_HEADER,
        &milestone_rows,
    )?;
    store.write_table(
        report::TRANSACTIONS_TABLE,
        &report::TRANSACTIONS_HEADER,
        &transaction_rows,
    )?;
    store.write_table(
        report::COLLABORATORS_TABLE,
        &report::COLLABORATORS_HEADER,
        &collaborator_rows,
    )?;
    store.write_table(
        report::GLOBAL_TABLE,
        &report::GLOBAL_HEADER,
        &report::global_rows(global),
    )?;

    let summary_path = store.dir().join("summary.md");
    let mut summary_file = File::create(&summary_path).map_err(|err| {
        Error::Persistence(format!("create {}: {}", summary_path.display(), err))
    })?;
    summary_file.write_all(summary.as_bytes()).map_err(|err| {
        Error::Persistence(format!("write {}: {}", summary_path.display(), err))
    })?;

    let cache = ProjectCache::new(generated_at.to_string(), processed.to_vec());
    project_store::write_cache(store.dir(), &cache)?;
    Ok(())
}

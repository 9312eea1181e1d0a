#[macro_use]
extern crate clap;
extern crate fundtrace;
#[macro_use]
extern crate log;

use clap::{App, Arg};
use fundtrace::logger;
use fundtrace::table_store::TableStore;
use std::path::Path;
use std::process;

fn main() {
    logger::setup();
    let matches = App::new("fundtrace-table-tool")
        .version(crate_version!())
        .about("Inspects and verifies a published table file")
        .arg(
            Arg::with_name("table")
                .value_name("PATH")
                .required(true)
                .help("Path to a table .csv file"),
        ).arg(
            Arg::with_name("rows")
                .short("r")
                .long("rows")
                .help("Print every row"),
        ).arg(
            Arg::with_name("verify-only")
                .long("verify-only")
                .help("Parse and check the table, print nothing on success"),
        ).get_matches();

    let path = Path::new(matches.value_of("table").unwrap());
    let (dir, name) = match table_location(path) {
        Some(location) => location,
        None => {
            error!("{}: not a table .csv path", path.display());
            process::exit(1);
        }
    };

    let store = match TableStore::open(&dir) {
        Ok(store) => store,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };
    let table = match store.read_table(&name) {
        Ok(table) => table,
        Err(err) => {
            error!("{}", err);
            process::exit(1);
        }
    };

    let ragged = table
        .rows
        .iter()
        .filter(|row| row.len() != table.header.len())
        .count();
    if ragged > 0 {
        error!(
            "{}: {} of {} rows do not match the {}-column header",
            path.display(),
            ragged,
            table.rows.len(),
            table.header.len()
        );
        process::exit(1);
    }

    if matches.is_present("verify-only") {
        return;
    }

    println!(
        "{}: {} columns, {} rows",
        table.name,
        table.header.len(),
        table.rows.len()
    );
    println!("header: {}", table.header.join(" | "));
    if matches.is_present("rows") {
        for row in &table.rows {
            println!("{}", row.join(" | "));
        }
    }
}

/// Splits a `dir/name.csv` path into the store directory and table name.
fn table_location(path: &Path) -> Option<(String, String)> {
    if path.extension()?.to_str()? != "csv" {
        return None;
    }
    let name = path.file_stem()?.to_str()?.to_string();
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_str()?.to_string(),
        _ => ".".to_string(),
    };
    Some((dir, name))
}

//! The `table_store` module reads and writes the named tabular files: one
//! comma-separated file per table, a header row plus one row per record.
//! Replacing a table goes through a temp file and rename so a failed run
//! never leaves a half-written table behind.

use itertools::Itertools;
use result::{Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::mem;
use std::path::{Path, PathBuf};

/// One table cell. Rows are heterogeneous, so cells carry their type until
/// render time instead of being stringly assembled.
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Empty,
}

impl Cell {
    pub fn render(&self) -> String {
        match *self {
            Cell::Text(ref value) => value.clone(),
            Cell::Int(value) => value.to_string(),
            Cell::Float(value) => format!("{}", value),
            Cell::Bool(value) => value.to_string(),
            Cell::Empty => String::new(),
        }
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Cell {
        Cell::Text(value)
    }
}

impl<'a> From<&'a str> for Cell {
    fn from(value: &'a str) -> Cell {
        Cell::Text(value.to_string())
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Cell {
        Cell::Int(value)
    }
}

impl From<u32> for Cell {
    fn from(value: u32) -> Cell {
        Cell::Int(value as i64)
    }
}

impl From<u64> for Cell {
    fn from(value: u64) -> Cell {
        Cell::Int(value as i64)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Cell {
        Cell::Float(value)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Cell {
        Cell::Bool(value)
    }
}

impl From<Option<i64>> for Cell {
    fn from(value: Option<i64>) -> Cell {
        match value {
            Some(n) => Cell::Int(n),
            None => Cell::Empty,
        }
    }
}

/// A parsed table: the header row plus every data row as plain strings.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub name: String,
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

pub struct TableStore {
    dir: PathBuf,
}

impl TableStore {
    pub fn open(dir: &str) -> Result<TableStore> {
        fs::create_dir_all(dir).map_err(|err| {
            Error::Persistence(format!("unable to create output dir {}: {}", dir, err))
        })?;
        Ok(TableStore {
            dir: PathBuf::from(dir),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", name))
    }

    /// Replaces the named table wholesale. The content lands in a temp file
    /// first and only a successful write is renamed over the old table.
    pub fn write_table(&self, name: &str, header: &[&str], rows: &[Vec<Cell>]) -> Result<()> {
        let path = self.table_path(name);
        let tmp_path = self.dir.join(format!(".{}.csv.tmp", name));
        {
            let mut file = File::create(&tmp_path).map_err(|err| {
                Error::Persistence(format!("unable to create {:?}: {}", tmp_path, err))
            })?;
            write_csv(&mut file, header, rows)
                .map_err(|err| Error::Persistence(format!("write table {}: {}", name, err)))?;
            file.sync_all()
                .map_err(|err| Error::Persistence(format!("sync table {}: {}", name, err)))?;
        }
        fs::rename(&tmp_path, &path)
            .map_err(|err| Error::Persistence(format!("rename into {:?}: {}", path, err)))?;
        Ok(())
    }

    /// Appends rows to the named table, writing the header first when the
    /// table does not exist yet.
    pub fn append_rows(&self, name: &str, header: &[&str], rows: &[Vec<Cell>]) -> Result<()> {
        let path = self.table_path(name);
        let needs_header = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(_) => true,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| {
                Error::Persistence(format!("unable to open {:?} for append: {}", path, err))
            })?;

        let mut out = String::new();
        if needs_header {
            out.push_str(&format_header(header));
            out.push('\n');
        }
        for row in rows {
            out.push_str(&format_row(row));
            out.push('\n');
        }
        file.write_all(out.as_bytes())
            .map_err(|err| Error::Persistence(format!("append to table {}: {}", name, err)))
    }

    pub fn read_table(&self, name: &str) -> Result<Table> {
        let path = self.table_path(name);
        let mut content = String::new();
        File::open(&path)
            .and_then(|mut file| file.read_to_string(&mut content))
            .map_err(|err| Error::Persistence(format!("read table {}: {}", name, err)))?;

        let mut parsed = parse_csv(&content)?;
        if parsed.is_empty() {
            return Err(Error::Persistence(format!(
                "table {} has no header row",
                name
            )));
        }
        let header = parsed.remove(0);
        Ok(Table {
            name: name.to_string(),
            header,
            rows: parsed,
        })
    }
}

pub fn format_header(header: &[&str]) -> String {
    header.iter().map(|field| escape(field)).join(",")
}

pub fn format_row(cells: &[Cell]) -> String {
    cells.iter().map(|cell| escape(&cell.render())).join(",")
}

fn write_csv<W: Write>(writer: &mut W, header: &[&str], rows: &[Vec<Cell>]) -> io::Result<()> {
    writeln!(writer, "{}", format_header(header))?;
    for row in rows {
        writeln!(writer, "{}", format_row(row))?;
    }
    Ok(())
}

// Fields containing a comma, quote or line break are wrapped in double
// quotes, with embedded quotes doubled.
fn escape(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') || field.contains('\r') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Parses comma-separated content with quoted fields, including fields that
/// span lines. Lenient about stray quotes inside unquoted fields; an
/// unterminated quoted field is corruption and fails.
pub fn parse_csv(content: &str) -> Result<Vec<Vec<String>>> {
    let mut rows: Vec<Vec<String>> = Vec::new();
    let mut row: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = content.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
        } else {
            match c {
                '"' if field.is_empty() => in_quotes = true,
                ',' => row.push(mem::replace(&mut field, String::new())),
                '\r' => {}
                '\n' => {
                    row.push(mem::replace(&mut field, String::new()));
                    rows.push(mem::replace(&mut row, Vec::new()));
                }
                _ => field.push(c),
            }
        }
    }
    if in_quotes {
        return Err(Error::Persistence(
            "unterminated quoted field".to_string(),
        ));
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{thread_rng, Rng};
    use std::env;

    fn tmp_store(name: &str) -> (TableStore, String) {
        let out_dir = env::var("OUT_DIR").unwrap_or_else(|_| "target".to_string());
        let path = format!("{}/tmp-tables-{}-{}", out_dir, name, thread_rng().gen::<u32>());
        (TableStore::open(&path).unwrap(), path)
    }

    #[test]
    fn test_escape_rules() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_cell_render() {
        assert_eq!(Cell::Text("x".to_string()).render(), "x");
        assert_eq!(Cell::Int(-3).render(), "-3");
        assert_eq!(Cell::Float(96_000.0).render(), "96000");
        assert_eq!(Cell::Float(0.2).render(), "0.2");
        assert_eq!(Cell::Bool(false).render(), "false");
        assert_eq!(Cell::Empty.render(), "");
        assert_eq!(Cell::from(None as Option<i64>), Cell::Empty);
    }

    #[test]
    fn test_round_trip_preserves_embedded_specials() {
        let (store, path) = tmp_store("round-trip");
        let header = ["id", "note", "amount"];
        let rows = vec![
            vec![
                Cell::Int(1),
                Cell::Text("plain note".to_string()),
                Cell::Float(12.5),
            ],
            vec![
                Cell::Int(2),
                Cell::Text("commas, inside".to_string()),
                Cell::Float(0.0),
            ],
            vec![
                Cell::Int(3),
                Cell::Text("says \"quoted\"\nand spans lines".to_string()),
                Cell::Float(-7.25),
            ],
        ];
        store.write_table("notes", &header, &rows).unwrap();

        let table = store.read_table("notes").unwrap();
        assert_eq!(table.header, vec!["id", "note", "amount"]);
        assert_eq!(table.rows.len(), rows.len());
        for (parsed, written) in table.rows.iter().zip(rows.iter()) {
            let rendered: Vec<String> = written.iter().map(|cell| cell.render()).collect();
            assert_eq!(*parsed, rendered);
        }
        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn test_write_table_replaces_previous_content() {
        let (store, path) = tmp_store("replace");
        let header = ["id"];
        store
            .write_table("t", &header, &[vec![Cell::Int(1)], vec![Cell::Int(2)]])
            .unwrap();
        store.write_table("t", &header, &[vec![Cell::Int(9)]]).unwrap();

        let table = store.read_table("t").unwrap();
        assert_eq!(table.rows, vec![vec!["9".to_string()]]);
        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn test_append_writes_header_once() {
        let (store, path) = tmp_store("append");
        let header = ["id", "name"];
        store
            .append_rows("t", &header, &[vec![Cell::Int(1), Cell::from("a")]])
            .unwrap();
        store
            .append_rows("t", &header, &[vec![Cell::Int(2), Cell::from("b")]])
            .unwrap();

        let table = store.read_table("t").unwrap();
        assert_eq!(table.header, vec!["id", "name"]);
        assert_eq!(table.rows.len(), 2);
        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn test_read_missing_table_is_persistence_error() {
        let (store, path) = tmp_store("missing");
        assert_matches!(store.read_table("nope"), Err(Error::Persistence(_)));
        fs::remove_dir_all(&path).unwrap();
    }

    #[test]
    fn test_unterminated_quote_fails() {
        assert_matches!(parse_csv("a,\"broken\nrow"), Err(Error::Persistence(_)));
    }

    #[test]
    fn test_parse_handles_trailing_empty_field() {
        let rows = parse_csv("a,b,\n").unwrap();
        assert_eq!(
            rows,
            vec![vec!["a".to_string(), "b".to_string(), String::new()]]
        );
    }
}

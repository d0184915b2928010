// Append-only JSONL log, the store's source of truth

use eyre::{Context, Result};
use fs2::FileExt;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use tracing::{info, warn};

pub const ID_KEY: &str = "id";
pub const UPDATED_AT_KEY: &str = "updatedAt";
pub const DELETED_KEY: &str = "deleted";

/// Append records to a JSONL file under an exclusive lock, one line each
pub fn append_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .context("Failed to open JSONL file for appending")?;

    // Released when the file is dropped
    file.lock_exclusive().context("Failed to acquire file lock")?;

    let mut buf = String::new();
    for record in records {
        buf.push_str(&serde_json::to_string(record)?);
        buf.push('\n');
    }
    file.write_all(buf.as_bytes())?;
    file.sync_all()?;

    Ok(())
}

/// Read all lines from a JSONL file, returning latest version per id
///
/// Lines without a string `id` are skipped. For duplicate ids the line with
/// the highest `updatedAt` wins; on a tie the later line wins. Tombstones are
/// returned like any other line so callers can tell deletions apart.
pub fn read_jsonl_latest(path: &Path) -> Result<HashMap<String, Value>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }

    let file = File::open(path).context("Failed to open JSONL file")?;
    let reader = BufReader::new(file);
    let mut records: HashMap<String, Value> = HashMap::new();

    for (line_num, line) in reader.lines().enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to read line, skipping"
                );
                continue;
            }
        };

        if line.trim().is_empty() {
            continue;
        }

        let record: Value = match serde_json::from_str(&line) {
            Ok(r) => r,
            Err(e) => {
                warn!(
                    file = ?path,
                    line = line_num + 1,
                    error = ?e,
                    "Failed to parse JSON, skipping"
                );
                continue;
            }
        };

        let Some(id) = record.get(ID_KEY).and_then(Value::as_str).map(str::to_string) else {
            warn!(file = ?path, line = line_num + 1, "Line has no id, skipping");
            continue;
        };

        let keep = match records.get(&id) {
            Some(existing) => updated_at(&record) >= updated_at(existing),
            None => true,
        };
        if keep {
            records.insert(id, record);
        }
    }

    info!(
        file = ?path,
        count = records.len(),
        "Loaded latest records from JSONL"
    );

    Ok(records)
}

pub fn updated_at(record: &Value) -> i64 {
    record.get(UPDATED_AT_KEY).and_then(Value::as_i64).unwrap_or(0)
}

pub fn is_tombstone(record: &Value) -> bool {
    record.get(DELETED_KEY).and_then(Value::as_bool).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Event;
    use std::fs;
    use tempfile::TempDir;

    fn event(id: &str, title: &str, updated_at: i64) -> Event {
        let mut event = Event::new(title, "2024-06-15", "papa");
        event.id = id.to_string();
        event.updated_at = updated_at;
        event
    }

    #[test]
    fn test_append_jsonl() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("events.jsonl");

        append_jsonl(&jsonl_path, &[event("ev-1", "Piscina", 1000), event("ev-2", "Médico", 1000)]).unwrap();

        let content = fs::read_to_string(&jsonl_path).unwrap();
        assert_eq!(content.lines().count(), 2);
        assert!(content.contains("\"id\":\"ev-1\""));
        assert!(content.contains("\"title\":\"Médico\""));
    }

    #[test]
    fn test_read_jsonl_latest() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("events.jsonl");

        append_jsonl(&jsonl_path, &[event("ev-1", "Version 2", 2000)]).unwrap();
        // An older write appended later must not win
        append_jsonl(&jsonl_path, &[event("ev-1", "Version 1", 1000)]).unwrap();

        let records = read_jsonl_latest(&jsonl_path).unwrap();
        assert_eq!(records.len(), 1);

        let latest = records.get("ev-1").unwrap();
        assert_eq!(latest["title"], "Version 2");
        assert_eq!(updated_at(latest), 2000);
    }

    #[test]
    fn test_read_jsonl_keeps_tombstone() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("events.jsonl");

        append_jsonl(&jsonl_path, &[event("ev-1", "Cumpleaños", 1000)]).unwrap();
        append_jsonl(
            &jsonl_path,
            &[serde_json::json!({"id": "ev-1", "deleted": true, "updatedAt": 1500})],
        )
        .unwrap();

        let records = read_jsonl_latest(&jsonl_path).unwrap();
        assert!(is_tombstone(records.get("ev-1").unwrap()));
    }

    #[test]
    fn test_read_jsonl_nonexistent_file() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("nonexistent.jsonl");

        let records = read_jsonl_latest(&jsonl_path).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_read_jsonl_malformed_line() {
        let temp = TempDir::new().unwrap();
        let jsonl_path = temp.path().join("events.jsonl");

        fs::write(
            &jsonl_path,
            r#"{"id":"ev-1","title":"Valid","date":"2024-06-15","memberId":"papa","updatedAt":1000}
{malformed json}
{"title":"No id","date":"2024-06-15","memberId":"papa"}
{"id":"ev-2","title":"Also Valid","date":"2024-06-16","memberId":"mama","updatedAt":1000}
"#,
        )
        .unwrap();

        let records = read_jsonl_latest(&jsonl_path).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.contains_key("ev-1"));
        assert!(records.contains_key("ev-2"));
    }
}

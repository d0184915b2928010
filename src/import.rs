// Producers of candidate events: bulk importers and free-text parsers

use eyre::{Context, Result, eyre};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::models::Event;

/// Produces zero or more events from an external source
pub trait EventImporter {
    fn import(&self) -> Result<Vec<Event>>;
}

/// Produces at most one event from unstructured text
pub trait EventParser {
    fn parse(&self, text: &str) -> Result<Option<Event>>;
}

/// On-disk formats understood by `FileImporter`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    /// A JSON array of events
    Json,
    /// One JSON event per line
    JsonLines,
    /// A YAML sequence of events
    Yaml,
}

impl ImportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "json" => Ok(ImportFormat::Json),
            "jsonl" => Ok(ImportFormat::JsonLines),
            "yaml" | "yml" => Ok(ImportFormat::Yaml),
            _ => Err(eyre!("Unsupported import file: {:?} (expected .json, .jsonl, .yaml)", path)),
        }
    }
}

/// Reads events from a JSON, JSONL or YAML file
#[derive(Debug, Clone)]
pub struct FileImporter {
    path: PathBuf,
    format: ImportFormat,
}

impl FileImporter {
    /// Importer whose format is picked from the file extension
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let format = ImportFormat::from_path(&path)?;
        Ok(Self { path, format })
    }

    pub fn with_format<P: AsRef<Path>>(path: P, format: ImportFormat) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            format,
        }
    }

    fn parse(&self, content: &str) -> Result<Vec<Event>> {
        match self.format {
            ImportFormat::Json => serde_json::from_str(content).context("Failed to parse JSON event list"),
            ImportFormat::Yaml => serde_yaml::from_str(content).context("Failed to parse YAML event list"),
            ImportFormat::JsonLines => content
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(n, line)| {
                    serde_json::from_str::<Event>(line).with_context(|| format!("Failed to parse event on line {}", n + 1))
                })
                .collect(),
        }
    }
}

impl EventImporter for FileImporter {
    fn import(&self) -> Result<Vec<Event>> {
        debug!(path = ?self.path, format = ?self.format, "Importing events");

        let content = fs::read_to_string(&self.path).with_context(|| format!("Failed to read {:?}", self.path))?;
        if content.trim().is_empty() {
            warn!(path = ?self.path, "Import file is empty");
            return Ok(Vec::new());
        }

        let mut events = self.parse(&content)?;
        for event in &mut events {
            if event.id.trim().is_empty() {
                event.id = uuid::Uuid::now_v7().to_string();
            }
        }

        info!(path = ?self.path, count = events.len(), "Imported events");
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventCategory;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(ImportFormat::from_path(Path::new("a.json")).unwrap(), ImportFormat::Json);
        assert_eq!(ImportFormat::from_path(Path::new("a.JSONL")).unwrap(), ImportFormat::JsonLines);
        assert_eq!(ImportFormat::from_path(Path::new("a.yml")).unwrap(), ImportFormat::Yaml);
        assert!(ImportFormat::from_path(Path::new("a.csv")).is_err());
        assert!(ImportFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_import_json_array() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agenda.json");
        fs::write(
            &path,
            r#"[
                {"id":"ev-1","title":"Vacuna","date":"2024-06-20","memberId":"ahsoka","category":"Salud"},
                {"title":"Reunión","date":"2024-06-21","startTime":"17:00","memberId":"papa","category":"Colegio","isReminder":true}
            ]"#,
        )
        .unwrap();

        let events = FileImporter::new(&path).unwrap().import().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "ev-1");
        assert_eq!(events[0].category, EventCategory::Health);
        assert!(!events[1].id.is_empty());
        assert_eq!(events[1].start_time.as_deref(), Some("17:00"));
        assert!(events[1].is_reminder);
    }

    #[test]
    fn test_import_jsonl_reports_bad_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agenda.jsonl");
        fs::write(
            &path,
            "{\"title\":\"Cena\",\"date\":\"2024-06-20\",\"memberId\":\"mama\"}\n\n{oops}\n",
        )
        .unwrap();

        let err = FileImporter::new(&path).unwrap().import().unwrap_err();
        assert!(format!("{:#}", err).contains("line 3"));
    }

    #[test]
    fn test_import_yaml() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agenda.yaml");
        fs::write(
            &path,
            r#"
- title: Piscina
  date: "2024-06-22"
  startTime: "10:00"
  memberId: ahsoka
  category: Ocio
- title: Fontanero
  date: "2024-06-24"
  memberId: papa
  category: Hogar
"#,
        )
        .unwrap();

        let events = FileImporter::new(&path).unwrap().import().unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].category, EventCategory::Leisure);
        assert_eq!(events[1].category, EventCategory::Home);
    }

    #[test]
    fn test_import_empty_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("agenda.json");
        fs::write(&path, "  \n").unwrap();

        let events = FileImporter::with_format(&path, ImportFormat::Json).import().unwrap();
        assert!(events.is_empty());
    }

    #[test]
    fn test_import_missing_file() {
        let temp = TempDir::new().unwrap();
        let importer = FileImporter::new(temp.path().join("missing.json")).unwrap();
        assert!(importer.import().is_err());
    }
}

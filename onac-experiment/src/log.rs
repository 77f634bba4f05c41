//! Session data on disk: the wide experiment log and the per-task results.

use csv::WriterBuilder;
use onac_core::{ExperimentInfo, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::info;

/// Wide-format log: one row per [`next_entry`](Self::next_entry), columns are
/// the union of every key ever added, in first-seen order.
#[derive(Debug, Default, Clone)]
pub struct ExperimentLog {
    columns: Vec<String>,
    entries: Vec<HashMap<String, String>>,
    current: HashMap<String, String>,
}

#[derive(Serialize)]
struct Snapshot<'a> {
    info: &'a ExperimentInfo,
    columns: &'a [String],
    entries: &'a [HashMap<String, String>],
}

impl ExperimentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `key` on the pending row. A repeated key overwrites.
    pub fn add_data(&mut self, key: &str, value: impl ToString) {
        if !self.columns.iter().any(|c| c == key) {
            self.columns.push(key.to_string());
        }
        self.current.insert(key.to_string(), value.to_string());
    }

    /// Closes the pending row. Empty rows are not kept.
    pub fn next_entry(&mut self) {
        if !self.current.is_empty() {
            self.entries.push(std::mem::take(&mut self.current));
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn entries(&self) -> &[HashMap<String, String>] {
        &self.entries
    }

    /// Writes the wide CSV. Session identity columns follow the data columns
    /// on every row; a pending row is included.
    pub fn save_wide_csv(&mut self, path: &Path, info: &ExperimentInfo) -> Result<()> {
        self.next_entry();
        create_parent(path)?;
        let extra = [
            ("participant", info.participant.clone()),
            ("date", info.date.clone()),
            ("expName", info.experiment_name.clone()),
            ("frameRate", info.frame_rate.map(|r| format!("{r:.3}")).unwrap_or_default()),
            ("version", info.version.clone()),
        ];

        let mut writer = WriterBuilder::new().from_path(path)?;
        let header: Vec<&str> = self
            .columns
            .iter()
            .map(String::as_str)
            .chain(extra.iter().map(|(k, _)| *k))
            .collect();
        writer.write_record(&header)?;
        for entry in &self.entries {
            let row = self
                .columns
                .iter()
                .map(|c| entry.get(c).map(String::as_str).unwrap_or(""))
                .chain(extra.iter().map(|(_, v)| v.as_str()));
            writer.write_record(row)?;
        }
        writer.flush()?;
        info!(path = %path.display(), rows = self.entries.len(), "experiment log saved");
        Ok(())
    }

    /// Writes the whole session state as pretty JSON.
    pub fn save_json(&mut self, path: &Path, info: &ExperimentInfo) -> Result<()> {
        self.next_entry();
        create_parent(path)?;
        let snapshot = Snapshot {
            info,
            columns: &self.columns,
            entries: &self.entries,
        };
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, &snapshot).map_err(std::io::Error::from)?;
        Ok(())
    }
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Per-task results CSV. Each record is flushed as soon as it is appended,
/// so an aborted run leaves exactly the completed trials on disk.
pub struct ResultsWriter {
    path: PathBuf,
    writer: csv::Writer<File>,
    rows: usize,
}

impl ResultsWriter {
    pub fn create(path: &Path, headers: &[&str]) -> Result<Self> {
        create_parent(path)?;
        let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
        writer.write_record(headers)?;
        writer.flush()?;
        info!(path = %path.display(), "writing task data");
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            rows: 0,
        })
    }

    pub fn append<R: Serialize>(&mut self, record: &R) -> Result<()> {
        self.writer.serialize(record)?;
        self.writer.flush()?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("onac-log-{}", std::process::id()))
            .join(name)
    }

    #[derive(Serialize)]
    struct Row {
        condition: &'static str,
        reaction_time: Option<f64>,
    }

    #[test]
    fn wide_log_unions_columns() {
        let mut log = ExperimentLog::new();
        log.add_data("Time", "2023-02-14 15:30:00");
        log.next_entry();
        log.add_data("Condition", "standard");
        log.add_data("Sound", "tone_1000");
        log.next_entry();
        log.next_entry();
        log.add_data("Condition", "deviant");

        let info = ExperimentInfo::new("017", "ONAC", "MMN_task");
        let path = tmp("wide.csv");
        log.save_wide_csv(&path, &info).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(log.columns(), ["Time", "Condition", "Sound"]);
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("Time,Condition,Sound,participant"));
        assert!(lines[2].starts_with(",standard,tone_1000,017"));
        assert!(lines[3].starts_with(",deviant,,017"));
    }

    #[test]
    fn json_snapshot_carries_info_and_entries() {
        let mut log = ExperimentLog::new();
        log.add_data("trigger", 'Z');
        log.add_data("trigger_time", 0.5);
        let info = ExperimentInfo::new("test", "ONAC", "resting_state");
        let path = tmp("snapshot.json");
        log.save_json(&path, &info).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["info"]["participant"], "test");
        assert_eq!(value["entries"][0]["trigger"], "Z");
        assert_eq!(value["columns"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn results_are_flushed_per_row() {
        let path = tmp("results.csv");
        let mut writer = ResultsWriter::create(&path, &["condition", "reaction_time"]).unwrap();
        writer
            .append(&Row {
                condition: "hit",
                reaction_time: Some(0.412),
            })
            .unwrap();
        writer
            .append(&Row {
                condition: "miss",
                reaction_time: None,
            })
            .unwrap();

        // Read while the writer is still open
        let text = std::fs::read_to_string(writer.path()).unwrap();
        assert_eq!(text, "condition,reaction_time\nhit,0.412\nmiss,\n");
        assert_eq!(writer.rows(), 2);
    }
}

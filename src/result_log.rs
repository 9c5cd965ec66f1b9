// src/result_log.rs

//! Append-only, line-delimited JSON result log, one file per topic.
//!
//! Files are opened in append mode and never truncated, so re-running a
//! workflow into the same output directory keeps the earlier entries.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::Result;
use crate::record::ResultLogEntry;

#[derive(Debug)]
pub struct ResultLog {
    dir: PathBuf,
    writers: HashMap<String, BufWriter<File>>,
}

impl ResultLog {
    /// Open a result log rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            writers: HashMap::new(),
        })
    }

    /// File backing the given topic.
    pub fn path_for(&self, topic: &str) -> PathBuf {
        self.dir.join(format!("{topic}.json"))
    }

    /// Append one entry to the topic's log and flush it to the OS.
    pub fn append(&mut self, topic: &str, entry: &ResultLogEntry) -> Result<()> {
        if !self.writers.contains_key(topic) {
            let path = self.path_for(topic);
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            debug!(topic, path = %path.display(), "opened result log");
            self.writers.insert(topic.to_string(), BufWriter::new(file));
        }

        if let Some(writer) = self.writers.get_mut(topic) {
            serde_json::to_writer(&mut *writer, entry)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }

        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        for writer in self.writers.values_mut() {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Read every entry of a result log file, in write order.
pub fn read_entries(path: impl AsRef<Path>) -> Result<Vec<ResultLogEntry>> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut entries = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        entries.push(serde_json::from_str(&line)?);
    }
    Ok(entries)
}

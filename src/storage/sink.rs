use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context;
use tracing::debug;

use crate::errors::{CrawlerError, ErrorKind, Result};
use crate::module::{Item, ItemProcessor};

/// Appends every item it sees to a file, one JSON object per line
pub struct JsonLinesSink {
    /// Output file path
    path: PathBuf,

    writer: Mutex<BufWriter<File>>,

    /// Number of items written so far
    written: AtomicU64,
}

impl JsonLinesSink {
    /// Create (or truncate) the output file
    pub fn create(path: &Path) -> anyhow::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context(format!("Failed to create output directory: {}", parent.display()))?;
        }

        let file = File::create(path)
            .context(format!("Failed to create output file: {}", path.display()))?;
        debug!("Writing items to: {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
            written: AtomicU64::new(0),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Acquire)
    }

    pub fn write(&self, item: &Item) -> Result<()> {
        let line = serde_json::to_string(item).map_err(|e| sink_error(format!("serialize item: {}", e)))?;

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writeln!(writer, "{}", line)
            .map_err(|e| sink_error(format!("write {}: {}", self.path.display(), e)))?;
        self.written.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    pub fn flush(&self) -> anyhow::Result<()> {
        self.writer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .flush()
            .context(format!("Failed to flush output file: {}", self.path.display()))
    }

    /// Item processor writing each item and passing it on unchanged
    pub fn processor(self: &Arc<Self>) -> ItemProcessor {
        let sink = Arc::clone(self);
        Arc::new(move |item: Item| -> Result<Item> {
            sink.write(&item)?;
            Ok(item)
        })
    }
}

fn sink_error(message: String) -> crate::errors::Error {
    CrawlerError::new(ErrorKind::Pipeline, message).into()
}

#[cfg(test)]
mod tests {
    use serde_json::Value;

    use super::*;

    #[test]
    fn test_items_written_as_lines() {
        let dir = std::env::temp_dir().join(format!("crawl-sink-{}", uuid::Uuid::new_v4()));
        let path = dir.join("items.jsonl");
        let sink = Arc::new(JsonLinesSink::create(&path).unwrap());
        let processor = sink.processor();

        for n in 0..3 {
            let mut item = Item::new();
            item.insert("n".into(), Value::from(n));
            let passed = processor(item.clone()).unwrap();
            assert_eq!(passed, item);
        }
        sink.flush().unwrap();
        assert_eq!(sink.written(), 3);

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<Value> = contents
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[2]["n"], 2);

        fs::remove_dir_all(dir).unwrap();
    }
}

//! Where rendered pages end up. The directory sink is the production
//! path; tests swap in an in-memory sink.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

const EXTENSION: &str = "html";

pub trait DocumentSink: Sync {
    fn write(&self, retrieval_id: &str, html: &str) -> Result<()>;
}

/// Writes one file per retrieval into a flat output directory.
pub struct DirSink {
    root: PathBuf,
}

impl DirSink {
    pub fn new(root: &Path) -> Result<Self> {
        fs::create_dir_all(root)
            .with_context(|| format!("failed to create output directory {}", root.display()))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn output_path(&self, retrieval_id: &str) -> PathBuf {
        self.root.join(format!("{retrieval_id}.{EXTENSION}"))
    }
}

impl DocumentSink for DirSink {
    fn write(&self, retrieval_id: &str, html: &str) -> Result<()> {
        let path = self.output_path(retrieval_id);
        fs::write(&path, html).with_context(|| format!("failed to write {}", path.display()))
    }
}

#[cfg(test)]
pub struct MemorySink(pub std::sync::Mutex<Vec<(String, String)>>);

#[cfg(test)]
impl MemorySink {
    pub fn new() -> Self {
        Self(std::sync::Mutex::new(Vec::new()))
    }
}

#[cfg(test)]
impl DocumentSink for MemorySink {
    fn write(&self, retrieval_id: &str, html: &str) -> Result<()> {
        self.0
            .lock()
            .unwrap()
            .push((retrieval_id.to_string(), html.to_string()));
        Ok(())
    }
}

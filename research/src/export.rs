use crate::research::Review;
use agent::Result;
use chrono::{DateTime, Local};
use std::path::PathBuf;
use tracing::info;

/// Writes search results to timestamped files in one directory.
pub struct Exporter {
    dir: PathBuf,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn quick(&self, findings: &str, at: DateTime<Local>) -> Result<PathBuf> {
        self.write(&file_name("quick_search", "txt", at), findings)
    }

    /// Returns the findings file and the metadata file.
    pub fn review(&self, review: &Review, at: DateTime<Local>) -> Result<(PathBuf, PathBuf)> {
        let findings = self.write(&file_name("literature_review", "txt", at), &review.findings)?;
        let metadata = self.write(
            &file_name("search_metadata", "json", at),
            &serde_json::to_string_pretty(&review.metadata)?,
        )?;
        Ok((findings, metadata))
    }

    fn write(&self, name: &str, contents: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(name);
        std::fs::write(&path, contents)?;
        info!(path = %path.display(), "export written");
        Ok(path)
    }
}

fn file_name(prefix: &str, extension: &str, at: DateTime<Local>) -> String {
    format!("{}_{}.{}", prefix, at.format("%Y%m%d_%H%M%S"), extension)
}

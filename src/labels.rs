use log::{debug, info};
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name used for class ids the label file does not cover.
pub const UNKNOWN_LABEL: &str = "unknown";

#[derive(Error, Debug)]
pub enum LabelError {
    #[error("label file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read label file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
}

/// Class id to name, where line N of the label file names class N.
#[derive(Debug, Clone, Default)]
pub struct LabelTable {
    names: HashMap<usize, String>,
}

impl LabelTable {
    pub fn load(path: &Path) -> Result<Self, LabelError> {
        debug!("Loading labels from {}", path.display());
        let text = std::fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => LabelError::NotFound(path.to_path_buf()),
            _ => LabelError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;

        let table = Self::parse(&text);
        info!("Loaded {} labels", table.len());
        Ok(table)
    }

    pub fn parse(text: &str) -> Self {
        let names = text
            .lines()
            .enumerate()
            .map(|(index, line)| (index, line.trim_end().to_owned()))
            .collect();
        Self { names }
    }

    /// Never fails: ids outside the table resolve to [`UNKNOWN_LABEL`].
    pub fn get(&self, index: usize) -> &str {
        self.names
            .get(&index)
            .map(String::as_str)
            .unwrap_or(UNKNOWN_LABEL)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

//! Class label table

use crate::error::{Result, ScanError};
use std::path::Path;
use tracing::info;

/// Ordered class names, indexed by class id. Loaded once per run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelTable {
    labels: Vec<String>,
}

impl LabelTable {
    /// Load a labels file with one name per line.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ScanError::Io(format!("Failed to open labels file {:?}: {}", path, e)))?;
        let table = Self::parse(&text);
        info!("Loaded {} class labels from {:?}", table.len(), path);
        Ok(table)
    }

    pub fn parse(text: &str) -> Self {
        Self::from_names(text.lines().map(str::trim))
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.labels.get(class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

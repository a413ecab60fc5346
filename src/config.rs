use crate::domain::product::ProductIdentifier;
use crate::error::{Result, StoreError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// The resource file listing the product identifiers to query.
///
/// It holds a JSON array of strings and is read once at startup.
#[derive(Debug, Clone)]
pub struct ProductIdsResource {
    path: PathBuf,
}

impl ProductIdsResource {
    pub const DEFAULT_FILE_NAME: &'static str = "ProductIds.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the identifiers, skipping blanks and duplicates.
    pub fn load(&self) -> Result<Vec<ProductIdentifier>> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StoreError::ConfigurationMissing(self.path.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        if contents.trim().is_empty() {
            return Err(StoreError::ConfigurationEmpty(self.path.clone()));
        }

        let raw: Vec<String> = serde_json::from_str(&contents)?;
        let mut identifiers: Vec<ProductIdentifier> = Vec::with_capacity(raw.len());
        for value in raw {
            let value = value.trim();
            if value.is_empty() {
                continue;
            }
            let identifier = ProductIdentifier::from(value);
            if !identifiers.contains(&identifier) {
                identifiers.push(identifier);
            }
        }

        if identifiers.is_empty() {
            return Err(StoreError::ConfigurationEmpty(self.path.clone()));
        }
        Ok(identifiers)
    }
}

impl Default for ProductIdsResource {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FILE_NAME)
    }
}

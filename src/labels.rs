//! Persistent image labels.
//!
//! Labels are a flat JSON object stored in a file next to (or inside) the image.  Each write reads
//! the current object, sets one key, and writes the whole thing back atomically.

use std::{
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use serde_json::{Map, Value};

use crate::{
    download::tempfile_beside,
    error::{Error, Result},
};

/// Somewhere to put key/value labels.
pub trait LabelStore {
    /// Sets `key` to `value`.  An existing key is only overwritten when `force` is set.
    ///
    /// Returns the value that was stored.
    fn add(&mut self, key: &str, value: &Value, force: bool) -> Result<Value>;

    /// Describes the store in log messages.
    fn describe(&self) -> String;
}

/// A [`LabelStore`] backed by a JSON object in a file.
#[derive(Debug, Clone)]
pub struct JsonLabelFile {
    path: PathBuf,
}

impl JsonLabelFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonLabelFile { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the labels.  A missing or empty file holds no labels.
    pub fn load(&self) -> Result<Map<String, Value>> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Map::new()),
            Err(err) => return Err(err.into()),
        };
        if data.iter().all(u8::is_ascii_whitespace) {
            return Ok(Map::new());
        }

        match serde_json::from_slice(&data)? {
            Value::Object(labels) => Ok(labels),
            _ => Err(Error::InvalidLabelFile {
                path: self.path.display().to_string(),
            }),
        }
    }

    fn save(&self, labels: &Map<String, Value>) -> Result<()> {
        let mut tmp = tempfile_beside(&self.path, ".shub-labels-")?;
        serde_json::to_writer_pretty(&mut tmp, labels)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|err| err.error)?;
        Ok(())
    }
}

impl LabelStore for JsonLabelFile {
    fn add(&mut self, key: &str, value: &Value, force: bool) -> Result<Value> {
        let mut labels = self.load()?;

        if labels.contains_key(key) && !force {
            return Err(Error::LabelExists {
                key: key.to_string(),
            });
        }
        labels.insert(key.to_string(), value.clone());
        self.save(&labels)?;

        log::debug!("{key} set in {}", self.path.display());
        Ok(value.clone())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

//! Read-only catalog of files shipped with the program.
//!
//! Built-ins are listed ahead of durable records, carry
//! [`Timestamp::BUILTIN`], and are never written or deleted through the
//! store.

use std::sync::Arc;

use crate::record::{FileRecord, Timestamp};

/// A single shipped file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuiltinFile {
    pub name: String,
    pub data: Arc<[u8]>,
}

/// Fixed, ordered set of built-in files.
#[derive(Debug, Clone, Default)]
pub struct BuiltinCatalog {
    files: Vec<BuiltinFile>,
}

impl BuiltinCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a file. Catalog order is listing order.
    pub fn with_file(mut self, name: impl Into<String>, data: impl Into<Arc<[u8]>>) -> Self {
        self.files.push(BuiltinFile {
            name: name.into(),
            data: data.into(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<FileRecord> {
        self.files
            .iter()
            .find(|f| f.name == name)
            .map(Self::to_record)
    }

    /// Built-ins synthesized as records, in catalog order.
    pub fn records(&self) -> impl Iterator<Item = FileRecord> + '_ {
        self.files.iter().map(Self::to_record)
    }

    fn to_record(file: &BuiltinFile) -> FileRecord {
        FileRecord::new(file.name.clone(), Arc::clone(&file.data), Timestamp::BUILTIN)
    }
}

//! Application state of an interactive reconciliation session.
//!
//! The state is never mutated in place: every user action goes through
//! [`Session::apply`], which consumes the old state and returns the new one.

use crate::Result;
use crate::codec::RecordCodec;
use crate::reconcile::{Bucket, MISSING_INPUT_MESSAGE, ReconciliationResult, reconcile};
use crate::record::{Record, RecordCollection};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Side {
    Internal,
    Provider,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedFile {
    pub name: String,
    pub records: Arc<RecordCollection>,
}

#[derive(Debug)]
pub enum Action {
    LoadStarted {
        side: Side,
        name: String,
    },
    Loaded {
        side: Side,
        name: String,
        records: RecordCollection,
    },
    LoadFailed {
        side: Side,
        name: String,
        error: String,
    },
    Cleared {
        side: Side,
    },
    Reconciled,
    Exported {
        filename: String,
    },
    ExportSkipped {
        filename: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    /// Name of a file that is still being parsed, before its records arrive.
    pending: [Option<String>; 2],
    internal: Option<LoadedFile>,
    provider: Option<LoadedFile>,
    results: Option<Arc<ReconciliationResult>>,
    message: String,
}

fn slot(side: Side) -> usize {
    match side {
        Side::Internal => 0,
        Side::Provider => 1,
    }
}

impl Session {
    pub fn file(&self, side: Side) -> Option<&LoadedFile> {
        match side {
            Side::Internal => self.internal.as_ref(),
            Side::Provider => self.provider.as_ref(),
        }
    }

    fn file_mut(&mut self, side: Side) -> &mut Option<LoadedFile> {
        match side {
            Side::Internal => &mut self.internal,
            Side::Provider => &mut self.provider,
        }
    }

    /// Name shown for a side: the file being loaded, else the loaded one.
    pub fn file_name(&self, side: Side) -> Option<&str> {
        self.pending[slot(side)]
            .as_deref()
            .or_else(|| self.file(side).map(|file| file.name.as_str()))
    }

    pub fn results(&self) -> Option<&Arc<ReconciliationResult>> {
        self.results.as_ref()
    }

    /// True while either side is still being parsed.
    pub fn is_loading(&self) -> bool {
        self.pending.iter().any(Option::is_some)
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Whether a reconcile request would be accepted right now.
    pub fn can_reconcile(&self) -> bool {
        !self.is_loading() && self.internal.is_some() && self.provider.is_some()
    }

    pub fn apply(mut self, action: Action) -> Session {
        match action {
            Action::LoadStarted { side, name } => {
                self.message = format!("Loading {name}...");
                self.pending[slot(side)] = Some(name);
            }
            Action::Loaded {
                side,
                name,
                records,
            } => {
                self.message = format!("{name} loaded successfully.");
                self.pending[slot(side)] = None;
                *self.file_mut(side) = Some(LoadedFile {
                    name,
                    records: Arc::new(records),
                });
            }
            Action::LoadFailed { side, name, error } => {
                self.message = format!("Error parsing {name}: {error}");
                self.pending[slot(side)] = None;
                *self.file_mut(side) = None;
            }
            Action::Cleared { side } => {
                self.pending[slot(side)] = None;
                *self.file_mut(side) = None;
                self.results = None;
                self.message = "File cleared. Please upload new files to reconcile.".to_string();
            }
            Action::Reconciled => {
                let internal = self.records(Side::Internal);
                let provider = self.records(Side::Provider);
                if internal.is_empty() || provider.is_empty() {
                    self.message = MISSING_INPUT_MESSAGE.to_string();
                } else {
                    let results = reconcile(internal, provider);
                    self.results = Some(Arc::new(results));
                    self.message = "Reconciliation complete!".to_string();
                }
            }
            Action::Exported { filename } => {
                self.message = format!("Exported {filename} successfully.");
            }
            Action::ExportSkipped { filename } => {
                self.message = format!("No data to export for {filename}.");
            }
        }
        self
    }

    fn records(&self, side: Side) -> &[Record] {
        self.file(side)
            .map(|file| file.records.as_slice())
            .unwrap_or_default()
    }

    /// CSV text for a bucket of the current results, `None` when there is nothing to export.
    pub fn export(&self, bucket: Bucket, codec: &impl RecordCodec) -> Result<Option<String>> {
        let Some(results) = &self.results else {
            return Ok(None);
        };
        let records = results.records(bucket);
        if records.is_empty() {
            return Ok(None);
        }
        codec.serialize(&records).map(Some)
    }
}

//! Memoization of audit results by input content.

use crate::config::AuditConfig;
use crate::error::Result;
use crate::types::AuditResult;
use parking_lot::Mutex;
use polars::prelude::{DataFrame, DataType};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::debug;

/// Results of previous runs, keyed by a SHA-256 hash of the three inputs.
///
/// Entries never expire on their own; callers drop them with
/// [`invalidate`](Self::invalidate) or [`clear`](Self::clear).
#[derive(Debug, Default)]
pub struct AuditCache {
    entries: Mutex<HashMap<String, AuditResult>>,
}

static_assertions::assert_impl_all!(AuditCache: Send, Sync);

impl AuditCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Content key for a set of inputs under a configuration.
    ///
    /// Covers every configuration field, column names, dtypes and every
    /// cell, so changing any of them yields a different key. Row order
    /// matters.
    pub fn key(
        config: &AuditConfig,
        inventory: &DataFrame,
        transactions: &DataFrame,
        feedback: &DataFrame,
    ) -> Result<String> {
        let mut hasher = Sha256::new();
        hash_bytes(&mut hasher, &serde_json::to_vec(config)?);
        for table in [inventory, transactions, feedback] {
            hasher.update((table.height() as u64).to_le_bytes());
            hasher.update((table.width() as u64).to_le_bytes());
            for column in table.get_columns() {
                hash_bytes(&mut hasher, column.name().as_bytes());
                hash_bytes(&mut hasher, column.dtype().to_string().as_bytes());
                let rendered = column.as_materialized_series().cast(&DataType::String)?;
                for value in rendered.str()?.into_iter() {
                    match value {
                        Some(text) => {
                            hasher.update([1u8]);
                            hash_bytes(&mut hasher, text.as_bytes());
                        }
                        None => hasher.update([0u8]),
                    }
                }
            }
        }
        Ok(format!("sha256:{:x}", hasher.finalize()))
    }

    pub fn get(&self, key: &str) -> Option<AuditResult> {
        let hit = self.entries.lock().get(key).cloned();
        debug!("Audit cache {} for {}", if hit.is_some() { "hit" } else { "miss" }, key);
        hit
    }

    pub fn insert(&self, result: AuditResult) {
        self.entries.lock().insert(result.cache_key.clone(), result);
    }

    /// Drop one entry. Returns whether it was present.
    pub fn invalidate(&self, key: &str) -> bool {
        self.entries.lock().remove(key).is_some()
    }

    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

/// Length-prefixed so adjacent values cannot run together.
fn hash_bytes(hasher: &mut Sha256, bytes: &[u8]) {
    hasher.update((bytes.len() as u64).to_le_bytes());
    hasher.update(bytes);
}

//! Catalog - the JSON index of a store directory

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::scope::Scope;
use crate::Result;

pub(super) const CATALOG_FILE: &str = "catalog.json";
const FORMAT_VERSION: u32 = 1;

/// What a Parquet part holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub(super) enum PartKind {
    /// Input columns only.
    Design,
    /// Inputs and measures produced by the given source code.
    Results { source: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct PartEntry {
    pub file: String,
    pub kind: PartKind,
    pub rows: usize,
    pub written_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct DesignEntry {
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sampler: Option<String>,
    pub experiment_ids: BTreeSet<u64>,
    pub parts: Vec<PartEntry>,
}

impl DesignEntry {
    pub fn new(sampler: Option<String>) -> Self {
        Self {
            created_at: Utc::now(),
            sampler,
            experiment_ids: BTreeSet::new(),
            parts: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct ScopeEntry {
    pub scope: Scope,
    pub fingerprint: u64,
    pub stored_at: DateTime<Utc>,
    pub designs: BTreeMap<String, DesignEntry>,
    /// Input-vector key -> experiment ids, one per replicate of the vector.
    pub experiment_keys: HashMap<u64, Vec<u64>>,
}

impl ScopeEntry {
    pub fn new(scope: Scope) -> Self {
        Self {
            fingerprint: scope.fingerprint(),
            scope,
            stored_at: Utc::now(),
            designs: BTreeMap::new(),
            experiment_keys: HashMap::new(),
        }
    }

    pub fn has_experiments(&self) -> bool {
        self.designs.values().any(|d| !d.parts.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct MetaModelEntry {
    pub scope_name: String,
    pub file: String,
    pub stored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(super) struct Catalog {
    pub format_version: u32,
    pub created_at: DateTime<Utc>,
    pub scopes: BTreeMap<String, ScopeEntry>,
    pub metamodels: BTreeMap<u32, MetaModelEntry>,
}

impl Catalog {
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION,
            created_at: Utc::now(),
            scopes: BTreeMap::new(),
            metamodels: BTreeMap::new(),
        }
    }

    pub fn load(root: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(root.join(CATALOG_FILE))?;
        Ok(serde_json::from_str(&text)?)
    }

    /// Replace the catalog file via temp file + rename.
    pub fn save(&self, root: &Path) -> Result<()> {
        let tmp = root.join(format!("{CATALOG_FILE}.tmp"));
        std::fs::write(&tmp, serde_json::to_vec_pretty(self)?)?;
        std::fs::rename(&tmp, root.join(CATALOG_FILE))?;
        Ok(())
    }
}

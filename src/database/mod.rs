//! Persistent experiment store
//!
//! A store is a directory holding a JSON catalog plus append-only Parquet
//! parts, keyed by scope name and design name:
//!
//! ```text
//! <path>/catalog.json
//! <path>/experiments/<scope>/<design>/part-00001.parquet
//! <path>/metamodels/<id>.json
//! ```
//!
//! The store assumes a single writer. Opening with `initialize = true`
//! discards an existing store at the path without asking, but refuses a
//! path that holds anything else.
//!
//! ```rust,no_run
//! use surrogate_db::database::{Database, ReadOptions};
//!
//! let db = Database::open("soabm_v2.db", false)?;
//! let scope = db.read_scope("SOABM")?;
//! let core = db.read_experiments("SOABM", "odot_lhs", &ReadOptions::new().ensure_dtypes(true))?;
//! assert_eq!(core.len(), db.design_row_count("SOABM", "odot_lhs")?);
//! # let _ = scope;
//! # Ok::<(), surrogate_db::Error>(())
//! ```

mod catalog;

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Serialize;

use catalog::{Catalog, DesignEntry, MetaModelEntry, PartEntry, PartKind, ScopeEntry, CATALOG_FILE};

use crate::experiment::{ExperimentFrame, Source};
use crate::scope::Scope;
use crate::storage::StorageEngine;
use crate::{Error, Result};

const EXPERIMENTS_DIR: &str = "experiments";
const METAMODELS_DIR: &str = "metamodels";

/// Options for [`Database::read_experiments`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadOptions {
    ensure_dtypes: bool,
    source: Option<Source>,
    only_complete: bool,
}

impl ReadOptions {
    /// All rows from every source, values as stored.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ensure_dtypes: false,
            source: None,
            only_complete: false,
        }
    }

    /// Coerce input columns to their declared dtypes.
    #[must_use]
    pub const fn ensure_dtypes(mut self, ensure: bool) -> Self {
        self.ensure_dtypes = ensure;
        self
    }

    /// Only rows produced by `source`.
    #[must_use]
    pub const fn source(mut self, source: Source) -> Self {
        self.source = Some(source);
        self
    }

    /// Drop rows with any missing measure.
    #[must_use]
    pub const fn only_complete(mut self, only: bool) -> Self {
        self.only_complete = only;
        self
    }
}

/// Builder for opening a [`Database`].
#[derive(Debug)]
pub struct DatabaseBuilder {
    path: PathBuf,
    initialize: bool,
}

impl DatabaseBuilder {
    /// Discard anything at the path and start empty.
    #[must_use]
    pub const fn initialize(mut self, initialize: bool) -> Self {
        self.initialize = initialize;
        self
    }

    /// Open the store.
    ///
    /// # Errors
    ///
    /// See [`Database::open`].
    pub fn open(self) -> Result<Database> {
        Database::open(self.path, self.initialize)
    }
}

/// Directory-backed store of scopes, experiments and meta-models.
#[derive(Debug)]
pub struct Database {
    root: PathBuf,
    catalog: Catalog,
}

impl Database {
    /// Create a builder for the store at `path`.
    #[must_use]
    pub fn builder(path: impl Into<PathBuf>) -> DatabaseBuilder {
        DatabaseBuilder {
            path: path.into(),
            initialize: false,
        }
    }

    /// Open the store at `path`.
    ///
    /// With `initialize = false` the store must already exist. With
    /// `initialize = true` an existing store at `path` is deleted and a new
    /// empty one is created. A missing path or an empty directory is fine.
    ///
    /// # Errors
    ///
    /// Returns `StoreNotFound` when opening a missing store without
    /// `initialize`, `InvalidInput` when initializing over a file or a
    /// non-empty directory that is not a store, or `Io`/`Json` if the
    /// catalog cannot be read or written.
    pub fn open<P: AsRef<Path>>(path: P, initialize: bool) -> Result<Self> {
        let root = path.as_ref().to_path_buf();

        if initialize {
            if root.join(CATALOG_FILE).is_file() {
                tracing::warn!(path = %root.display(), "discarding existing store");
                std::fs::remove_dir_all(&root)?;
            } else if is_occupied(&root)? {
                return Err(Error::InvalidInput(format!(
                    "{} exists and is not a store; refusing to initialize over it",
                    root.display()
                )));
            }
            std::fs::create_dir_all(&root)?;
            let catalog = Catalog::new();
            catalog.save(&root)?;
            tracing::info!(path = %root.display(), "initialized store");
            return Ok(Self { root, catalog });
        }

        if !root.join(CATALOG_FILE).is_file() {
            return Err(Error::StoreNotFound(root.display().to_string()));
        }
        let catalog = Catalog::load(&root)?;
        tracing::info!(
            path = %root.display(),
            scopes = catalog.scopes.len(),
            metamodels = catalog.metamodels.len(),
            "opened store"
        );
        Ok(Self { root, catalog })
    }

    /// Directory backing this store.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Names of all stored scopes, sorted.
    #[must_use]
    pub fn read_scope_names(&self) -> Vec<String> {
        self.catalog.scopes.keys().cloned().collect()
    }

    /// Read a stored scope by name.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound` if the name is absent.
    pub fn read_scope(&self, name: &str) -> Result<Scope> {
        Ok(self.scope_entry(name)?.scope.clone())
    }

    /// Store a scope.
    ///
    /// Re-storing an identical scope is a no-op. A changed definition may
    /// replace the stored one only while no experiments are recorded for it.
    ///
    /// # Errors
    ///
    /// Returns `SchemaMismatch` when replacing a scope that has experiments,
    /// `InvalidInput` for a name unusable as a directory, or `Io`/`Json` if
    /// the catalog cannot be saved.
    pub fn write_scope(&mut self, scope: &Scope) -> Result<()> {
        check_path_component("scope", scope.name())?;

        if let Some(existing) = self.catalog.scopes.get(scope.name()) {
            if existing.fingerprint == scope.fingerprint() {
                tracing::debug!(scope = %scope.name(), "scope already stored");
                return Ok(());
            }
            if existing.has_experiments() {
                return Err(Error::SchemaMismatch(format!(
                    "scope {} already has experiments under a different definition",
                    scope.name()
                )));
            }
        }

        let entry = ScopeEntry::new(scope.clone());
        self.commit(|catalog| {
            catalog.scopes.insert(scope.name().to_string(), entry);
            Ok(())
        })?;
        tracing::info!(scope = %scope.name(), fingerprint = scope.fingerprint(), "stored scope");
        Ok(())
    }

    /// Names of the designs recorded for a scope, sorted.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound` if the scope is absent.
    pub fn read_design_names(&self, scope_name: &str) -> Result<Vec<String>> {
        Ok(self.scope_entry(scope_name)?.designs.keys().cloned().collect())
    }

    /// True if the scope has a design of this name.
    #[must_use]
    pub fn has_design(&self, scope_name: &str, design_name: &str) -> bool {
        self.catalog
            .scopes
            .get(scope_name)
            .is_some_and(|s| s.designs.contains_key(design_name))
    }

    /// Number of distinct experiments recorded for a design.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound` or `DesignNotFound`.
    pub fn design_row_count(&self, scope_name: &str, design_name: &str) -> Result<usize> {
        Ok(self.design_entry(scope_name, design_name)?.experiment_ids.len())
    }

    /// `base` if unused for the scope, else the first free `base_2`, `base_3`, ...
    #[must_use]
    pub fn unique_design_name(&self, scope_name: &str, base: &str) -> String {
        if !self.has_design(scope_name, base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{base}_{n}"))
            .find(|name| !self.has_design(scope_name, name))
            .unwrap_or_else(|| base.to_string())
    }

    /// Record a design: input columns only, no results.
    ///
    /// Experiment ids are assigned by the store (see
    /// [`write_experiments`](Self::write_experiments)); the returned frame
    /// carries them.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound`, `SchemaMismatch` for rows that do not fit the
    /// scope, or storage errors.
    pub fn write_design(
        &mut self,
        scope_name: &str,
        design_name: &str,
        design: &ExperimentFrame,
        sampler: Option<&str>,
    ) -> Result<ExperimentFrame> {
        let scope = self.read_scope(scope_name)?;
        let inputs = design.inputs(&scope);
        self.write_part(&scope, design_name, PartKind::Design, inputs, sampler)
    }

    /// Append experiment results under `(scope, design)` tagged with `source`.
    ///
    /// Every scope input must be present. Measures may be a subset. Rows are
    /// coerced to the scope's dtypes. Experiment ids are assigned per scope by
    /// input vector: a vector seen before reuses its id, a new vector keeps
    /// the frame's id when that id is free and otherwise gets the next one.
    /// Rows repeating an input vector within one write are replicates and
    /// each gets its own id; a later write of the same replicates reuses
    /// those ids in order.
    ///
    /// Nothing is recorded unless the whole write succeeds.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound`, `ScopeMismatch`, `SchemaMismatch`, or storage
    /// errors.
    pub fn write_experiments(
        &mut self,
        scope_name: &str,
        design_name: &str,
        source: Source,
        results: &ExperimentFrame,
    ) -> Result<ExperimentFrame> {
        let scope = self.read_scope(scope_name)?;
        let tagged = results.clone().with_source(source);
        self.write_part(
            &scope,
            design_name,
            PartKind::Results {
                source: source.code(),
            },
            tagged,
            None,
        )
    }

    /// Read the result rows recorded for a design.
    ///
    /// Columns follow the scope's declaration order. When the same
    /// experiment was written more than once by the same source, the latest
    /// write wins.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound`, `DesignNotFound`, or storage errors.
    pub fn read_experiments(
        &self,
        scope_name: &str,
        design_name: &str,
        options: &ReadOptions,
    ) -> Result<ExperimentFrame> {
        let entry = self.scope_entry(scope_name)?;
        let design = self.design_entry(scope_name, design_name)?;

        let mut names = entry.scope.parameter_names();
        names.extend(entry.scope.measure_names());
        let mut frame = ExperimentFrame::new(scope_name, &names)?;

        for part in design
            .parts
            .iter()
            .filter(|p| matches!(p.kind, PartKind::Results { .. }))
        {
            frame.extend(&self.load_part(scope_name, design_name, part)?)?;
        }

        let mut frame = latest_per_experiment(&frame);
        if let Some(source) = options.source {
            frame = frame.select_source(source);
        }
        if options.ensure_dtypes {
            frame = frame.ensure_dtypes(&entry.scope)?;
        }
        if options.only_complete {
            frame = frame.complete_rows(&entry.scope.measure_names());
        }

        tracing::info!(
            scope = %scope_name,
            design = %design_name,
            rows = frame.len(),
            "read experiments"
        );
        Ok(frame)
    }

    /// Read the input vectors of a design's experiments, with or without
    /// results, one row per experiment id.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound`, `DesignNotFound`, or storage errors.
    pub fn read_experiment_parameters(
        &self,
        scope_name: &str,
        design_name: &str,
    ) -> Result<ExperimentFrame> {
        let entry = self.scope_entry(scope_name)?;
        let design = self.design_entry(scope_name, design_name)?;

        let names = entry.scope.parameter_names();
        let mut frame = ExperimentFrame::new(scope_name, &names)?;
        for part in &design.parts {
            frame.extend(&self.load_part(scope_name, design_name, part)?.project(&names))?;
        }

        let mut seen = HashSet::new();
        let mask: Vec<bool> = frame.experiment_ids().iter().map(|id| seen.insert(*id)).collect();
        Ok(frame.filter(&mask).with_source(Source::CoreModel))
    }

    /// Next unused meta-model id (ids start at 1).
    #[must_use]
    pub fn new_metamodel_id(&self) -> u32 {
        self.catalog
            .metamodels
            .keys()
            .next_back()
            .map_or(1, |id| id + 1)
    }

    /// Ids of the meta-models stored for a scope.
    #[must_use]
    pub fn read_metamodel_ids(&self, scope_name: &str) -> Vec<u32> {
        self.catalog
            .metamodels
            .iter()
            .filter(|(_, m)| m.scope_name == scope_name)
            .map(|(id, _)| *id)
            .collect()
    }

    /// Persist a serialized meta-model under `id`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `ScopeNotFound` if the scope is not stored, `InvalidInput`
    /// for id 0 (reserved for the core model), or `Io`/`Json`.
    pub fn write_metamodel<T: Serialize>(
        &mut self,
        scope_name: &str,
        id: u32,
        model: &T,
    ) -> Result<()> {
        if id == 0 {
            return Err(Error::InvalidInput(
                "meta-model id 0 is reserved for the core model".to_string(),
            ));
        }
        self.scope_entry(scope_name)?;

        let dir = self.root.join(METAMODELS_DIR);
        std::fs::create_dir_all(&dir)?;
        let file = format!("{id}.json");
        std::fs::write(dir.join(&file), serde_json::to_vec(model)?)?;

        let entry = MetaModelEntry {
            scope_name: scope_name.to_string(),
            file,
            stored_at: Utc::now(),
        };
        self.commit(|catalog| {
            catalog.metamodels.insert(id, entry);
            Ok(())
        })?;
        tracing::info!(scope = %scope_name, metamodel_id = id, "stored meta-model");
        Ok(())
    }

    /// Load a stored meta-model.
    ///
    /// # Errors
    ///
    /// Returns `MetaModelNotFound`, or `Io`/`Json` if the file is unreadable.
    pub fn read_metamodel<T: DeserializeOwned>(&self, id: u32) -> Result<T> {
        let entry = self
            .catalog
            .metamodels
            .get(&id)
            .ok_or(Error::MetaModelNotFound(id))?;
        let bytes = std::fs::read(self.root.join(METAMODELS_DIR).join(&entry.file))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Apply `update` to a copy of the catalog and keep it only once saved.
    fn commit(&mut self, update: impl FnOnce(&mut Catalog) -> Result<()>) -> Result<()> {
        let mut next = self.catalog.clone();
        update(&mut next)?;
        next.save(&self.root)?;
        self.catalog = next;
        Ok(())
    }

    fn scope_entry(&self, name: &str) -> Result<&ScopeEntry> {
        self.catalog
            .scopes
            .get(name)
            .ok_or_else(|| Error::ScopeNotFound(name.to_string()))
    }

    fn design_entry(&self, scope_name: &str, design_name: &str) -> Result<&DesignEntry> {
        self.scope_entry(scope_name)?
            .designs
            .get(design_name)
            .ok_or_else(|| Error::DesignNotFound {
                scope: scope_name.to_string(),
                design: design_name.to_string(),
            })
    }

    fn design_dir(&self, scope_name: &str, design_name: &str) -> PathBuf {
        self.root
            .join(EXPERIMENTS_DIR)
            .join(scope_name)
            .join(design_name)
    }

    fn load_part(
        &self,
        scope_name: &str,
        design_name: &str,
        part: &PartEntry,
    ) -> Result<ExperimentFrame> {
        let path = self.design_dir(scope_name, design_name).join(&part.file);
        let storage = StorageEngine::load_parquet(&path)?;
        let mut frame = ExperimentFrame::new::<&str>(scope_name, &[])?;
        for batch in storage.batches() {
            frame.extend(&ExperimentFrame::from_record_batch(scope_name, batch)?)?;
        }
        Ok(frame)
    }

    fn write_part(
        &mut self,
        scope: &Scope,
        design_name: &str,
        kind: PartKind,
        frame: ExperimentFrame,
        sampler: Option<&str>,
    ) -> Result<ExperimentFrame> {
        check_path_component("design", design_name)?;
        for parameter in scope.parameters() {
            if !frame.has_column(parameter.name()) {
                return Err(Error::SchemaMismatch(format!(
                    "input column `{}` missing from rows for scope {}",
                    parameter.name(),
                    scope.name()
                )));
            }
        }
        let mut frame = frame.ensure_dtypes(scope)?;

        let entry = self.scope_entry(scope.name())?;
        let assigned = assign_experiment_ids(entry, scope, &frame);
        frame.set_experiment_ids(assigned.ids)?;
        let part_number = entry.designs.get(design_name).map_or(0, |d| d.parts.len()) + 1;

        let part = if frame.is_empty() {
            None
        } else {
            let dir = self.design_dir(scope.name(), design_name);
            std::fs::create_dir_all(&dir)?;
            let file = format!("part-{part_number:05}.parquet");
            StorageEngine::new(vec![frame.to_record_batch()?]).write_parquet(dir.join(&file))?;
            Some(PartEntry {
                file,
                kind,
                rows: frame.len(),
                written_at: Utc::now(),
            })
        };

        let ids = frame.experiment_ids().to_vec();
        self.commit(|catalog| {
            let entry = catalog
                .scopes
                .get_mut(scope.name())
                .ok_or_else(|| Error::ScopeNotFound(scope.name().to_string()))?;
            for (key, id) in assigned.new_keys {
                entry.experiment_keys.entry(key).or_default().push(id);
            }
            let design = entry
                .designs
                .entry(design_name.to_string())
                .or_insert_with(|| DesignEntry::new(sampler.map(str::to_string)));
            if let Some(part) = part {
                design.experiment_ids.extend(ids);
                design.parts.push(part);
            }
            Ok(())
        })?;

        tracing::info!(
            scope = %scope.name(),
            design = %design_name,
            rows = frame.len(),
            kind = ?kind,
            "wrote experiments"
        );
        Ok(frame)
    }
}

fn check_path_component(what: &str, name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains(['/', '\\'])
        || name.chars().any(char::is_control);
    if bad {
        return Err(Error::InvalidInput(format!("unusable {what} name `{name}`")));
    }
    Ok(())
}

/// True for an existing file or a directory with any entry.
fn is_occupied(path: &Path) -> Result<bool> {
    if path.is_dir() {
        Ok(std::fs::read_dir(path)?.next().is_some())
    } else {
        Ok(path.exists())
    }
}

/// Hash of a row's input vector in scope order.
fn input_key(scope: &Scope, frame: &ExperimentFrame, row: usize) -> u64 {
    let mut text = String::new();
    for parameter in scope.parameters() {
        let value = frame
            .column(parameter.name())
            .map_or(f64::NAN, |values| values[row]);
        // -0.0 and 0.0 name the same experiment
        let value = if value == 0.0 { 0.0 } else { value };
        let _ = write!(text, "{:016x};", value.to_bits());
    }
    trueno::hash_key(&text)
}

/// Ids for the rows of one write, plus the vector keys it adds.
struct IdAssignment {
    ids: Vec<u64>,
    new_keys: Vec<(u64, u64)>,
}

fn assign_experiment_ids(
    entry: &ScopeEntry,
    scope: &Scope,
    frame: &ExperimentFrame,
) -> IdAssignment {
    let mut taken: HashSet<u64> = entry.experiment_keys.values().flatten().copied().collect();
    let mut next = taken.iter().max().map_or(1, |max| max + 1);
    // ids already handed out in this write
    let mut used = HashSet::new();
    let mut ids = Vec::with_capacity(frame.len());
    let mut new_keys = Vec::new();

    for row in 0..frame.len() {
        let key = input_key(scope, frame, row);
        let proposed = frame.experiment_ids()[row];
        let stored = entry.experiment_keys.get(&key).map_or(&[][..], Vec::as_slice);

        let reused = if stored.contains(&proposed) && !used.contains(&proposed) {
            Some(proposed)
        } else {
            stored.iter().copied().find(|id| !used.contains(id))
        };
        let id = match reused {
            Some(id) => id,
            None => {
                let id = if proposed != 0 && !taken.contains(&proposed) {
                    proposed
                } else {
                    while taken.contains(&next) {
                        next += 1;
                    }
                    next
                };
                taken.insert(id);
                next = next.max(id + 1);
                new_keys.push((key, id));
                id
            }
        };
        used.insert(id);
        ids.push(id);
    }
    IdAssignment { ids, new_keys }
}

/// Keep the last row written for each `(experiment_id, source)` pair.
fn latest_per_experiment(frame: &ExperimentFrame) -> ExperimentFrame {
    let mut seen = HashSet::new();
    let mut mask = vec![false; frame.len()];
    for row in (0..frame.len()).rev() {
        let key = (frame.experiment_ids()[row], frame.sources()[row]);
        mask[row] = seen.insert(key);
    }
    frame.filter(&mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::{Measure, Parameter, ParameterType};

    fn scope() -> Scope {
        Scope::builder("road")
            .parameter(Parameter::real("demand", ParameterType::Uncertainty, 0.0, 10.0))
            .parameter(Parameter::integer("lanes", ParameterType::Lever, 1, 4))
            .measure(Measure::new("delay"))
            .build()
            .unwrap()
    }

    fn results(rows: &[(f64, f64, f64)]) -> ExperimentFrame {
        let mut frame = ExperimentFrame::new("road", &["demand", "lanes", "delay"]).unwrap();
        for (i, (d, l, y)) in rows.iter().enumerate() {
            frame
                .push_row(i as u64 + 1, Source::CoreModel, &[*d, *l, *y])
                .unwrap();
        }
        frame
    }

    #[test]
    fn test_open_missing_store_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = Database::open(dir.path().join("missing.db"), false);
        assert!(matches!(result, Err(Error::StoreNotFound(_))));
    }

    #[test]
    fn test_initialize_discards_previous_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.db");

        let mut db = Database::open(&path, true).unwrap();
        db.write_scope(&scope()).unwrap();
        drop(db);

        let db = Database::open(&path, true).unwrap();
        assert!(db.read_scope_names().is_empty());
        let reopened = Database::builder(&path).open().unwrap();
        assert!(reopened.read_scope_names().is_empty());
    }

    #[test]
    fn test_initialize_refuses_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.db");
        std::fs::write(&path, "not a store").unwrap();

        let result = Database::open(&path, true);
        assert!(matches!(result, Err(Error::InvalidInput(_))));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "not a store");
    }

    #[test]
    fn test_replicates_in_one_write_get_own_ids() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("s.db"), true).unwrap();
        db.write_scope(&scope()).unwrap();

        let mut runs = results(&[(1.0, 2.0, 3.0), (1.0, 2.0, 3.5), (4.0, 1.0, 5.0)]);
        runs.set_experiment_ids(vec![0, 0, 0]).unwrap();
        let first = db.write_experiments("road", "a", Source::CoreModel, &runs).unwrap();
        assert_eq!(first.experiment_ids(), &[1, 2, 3]);

        // a later write of the same vectors reuses those ids in order
        let again = db.write_experiments("road", "b", Source::CoreModel, &runs).unwrap();
        assert_eq!(again.experiment_ids(), &[1, 2, 3]);
    }

    #[test]
    fn test_experiment_ids_shared_across_designs() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("s.db"), true).unwrap();
        db.write_scope(&scope()).unwrap();

        let first = db
            .write_experiments("road", "a", Source::CoreModel, &results(&[(1.0, 2.0, 3.0)]))
            .unwrap();
        let mut other = results(&[(5.0, 1.0, 9.0), (1.0, 2.0, 4.0)]);
        other.set_experiment_ids(vec![1, 2]).unwrap();
        let second = db
            .write_experiments("road", "b", Source::MetaModel(1), &other)
            .unwrap();

        assert_eq!(first.experiment_ids(), &[1]);
        // (5, 1) is new but id 1 is taken; (1, 2) was seen before
        assert_eq!(second.experiment_ids(), &[2, 1]);
    }

    #[test]
    fn test_latest_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("s.db"), true).unwrap();
        db.write_scope(&scope()).unwrap();

        db.write_experiments("road", "a", Source::CoreModel, &results(&[(1.0, 2.0, 3.0)]))
            .unwrap();
        db.write_experiments("road", "a", Source::CoreModel, &results(&[(1.0, 2.0, 7.0)]))
            .unwrap();

        let frame = db.read_experiments("road", "a", &ReadOptions::new()).unwrap();
        assert_eq!(frame.len(), 1);
        assert!((frame.column("delay").unwrap()[0] - 7.0).abs() < f64::EPSILON);
        assert_eq!(db.design_row_count("road", "a").unwrap(), 1);
    }

    #[test]
    fn test_write_requires_every_input() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("s.db"), true).unwrap();
        db.write_scope(&scope()).unwrap();

        let mut frame = ExperimentFrame::new("road", &["demand", "delay"]).unwrap();
        frame.push_row(1, Source::CoreModel, &[1.0, 2.0]).unwrap();
        let result = db.write_experiments("road", "a", Source::CoreModel, &frame);
        assert!(matches!(result, Err(Error::SchemaMismatch(_))));
    }

    #[test]
    fn test_scope_redefinition_blocked_once_data_exists() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("s.db"), true).unwrap();
        db.write_scope(&scope()).unwrap();
        db.write_experiments("road", "a", Source::CoreModel, &results(&[(1.0, 2.0, 3.0)]))
            .unwrap();

        let changed = Scope::builder("road")
            .parameter(Parameter::real("demand", ParameterType::Uncertainty, 0.0, 20.0))
            .parameter(Parameter::integer("lanes", ParameterType::Lever, 1, 4))
            .measure(Measure::new("delay"))
            .build()
            .unwrap();
        assert!(matches!(
            db.write_scope(&changed),
            Err(Error::SchemaMismatch(_))
        ));
        db.write_scope(&scope()).unwrap();
    }

    #[test]
    fn test_unique_design_name() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("s.db"), true).unwrap();
        db.write_scope(&scope()).unwrap();
        assert_eq!(db.unique_design_name("road", "mc"), "mc");

        db.write_design("road", "mc", &results(&[(1.0, 1.0, 0.0)]), Some("mc"))
            .unwrap();
        assert_eq!(db.unique_design_name("road", "mc"), "mc_2");
    }

    #[test]
    fn test_design_parts_are_not_results() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("s.db"), true).unwrap();
        db.write_scope(&scope()).unwrap();
        db.write_design("road", "lhs", &results(&[(1.0, 1.0, 0.0), (2.0, 3.0, 0.0)]), Some("lhs"))
            .unwrap();

        assert!(db.read_experiments("road", "lhs", &ReadOptions::new()).unwrap().is_empty());
        let params = db.read_experiment_parameters("road", "lhs").unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.column_names(), vec!["demand", "lanes"]);
    }

    #[test]
    fn test_bad_design_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("s.db"), true).unwrap();
        db.write_scope(&scope()).unwrap();
        let result = db.write_experiments("road", "../x", Source::CoreModel, &results(&[]));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_metamodel_ids_increment() {
        let dir = tempfile::tempdir().unwrap();
        let mut db = Database::open(dir.path().join("s.db"), true).unwrap();
        db.write_scope(&scope()).unwrap();
        assert_eq!(db.new_metamodel_id(), 1);

        db.write_metamodel("road", 1, &serde_json::json!({"k": 1})).unwrap();
        assert_eq!(db.new_metamodel_id(), 2);
        assert_eq!(db.read_metamodel_ids("road"), vec![1]);

        let back: serde_json::Value = db.read_metamodel(1).unwrap();
        assert_eq!(back["k"], 1);
        assert!(matches!(
            db.read_metamodel::<serde_json::Value>(9),
            Err(Error::MetaModelNotFound(9))
        ));
    }
}

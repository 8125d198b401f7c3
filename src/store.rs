//! Per-version persistence and staleness handling.
//!
//! Each release version owns one directory under the data root holding a
//! metadata file and a serialized forest blob. Loaded forests live behind an
//! `RwLock`ed map of `Arc`s: queries clone the `Arc` and keep reading the old
//! forest while a rebuild prepares a new one; the map entry is swapped only
//! after the rebuild fully succeeds. One rebuild may run per version at a
//! time; different versions never coordinate.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{info, warn};

use crate::bundle::RawBundle;
use crate::codec;
use crate::model::MappingDatabase;
use crate::overrides::{self, OverrideTables};
use crate::parse::{self, FormatGeneration};
use crate::version::compare_versions;

pub const META_FILE: &str = "meta.json";
pub const DB_FILE: &str = "db.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionMeta {
    pub mc_version: String,
    pub snapshot: String,
    pub format: FormatGeneration,
}

/// What an ingest actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum IngestOutcome {
    UpToDate,
    Incremental,
    Full,
}

/// Typed signals for the query surface. Distinct from empty search results,
/// which are an `Ok` with nothing in them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unresolvable version: {0:?}")]
    UnknownVersion(String),
}

pub struct VersionStore {
    root: PathBuf,
    databases: RwLock<HashMap<String, Arc<MappingDatabase>>>,
    latest: RwLock<Option<String>>,
    rebuilds: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl VersionStore {
    pub fn open(root: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create data directory: {}", root.display()))?;
        Ok(Self {
            root,
            databases: RwLock::new(HashMap::new()),
            latest: RwLock::new(None),
            rebuilds: Mutex::new(HashMap::new()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn version_dir(&self, mc_version: &str) -> PathBuf {
        self.root.join(mc_version)
    }

    /// Load every persisted version into memory. Directories without a
    /// metadata file are skipped; a version that fails to load is logged and
    /// skipped without disturbing the others.
    pub fn load_all(&self) -> Result<usize> {
        let mut dirs = Vec::new();
        for entry in std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to scan data directory: {}", self.root.display()))?
        {
            let path = entry?.path();
            if path.is_dir() && path.join(META_FILE).is_file() {
                dirs.push(path);
            } else {
                info!("skipping {}: no metadata file", path.display());
            }
        }

        let loaded: Vec<(String, MappingDatabase)> = dirs
            .par_iter()
            .filter_map(|dir| match load_version_dir(dir) {
                Ok(db) => Some((db.mc_version.clone(), db)),
                Err(e) => {
                    warn!("failed to load {}: {e:#}", dir.display());
                    None
                }
            })
            .collect();

        let count = loaded.len();
        {
            let mut databases = write_lock(&self.databases);
            for (version, db) in loaded {
                info!(
                    "loaded mappings for {} snapshot {}",
                    db.mc_version, db.snapshot
                );
                databases.insert(version, Arc::new(db));
            }
        }
        self.reset_latest();
        Ok(count)
    }

    /// Bring one version up to the observed snapshot. Decides between serving
    /// the existing blob, an incremental override refresh, and a full rebuild
    /// from the raw bundle. On failure nothing is swapped and any previously
    /// served forest keeps answering queries.
    pub fn ingest(
        &self,
        mc_version: &str,
        snapshot: &str,
        bundle: &RawBundle,
    ) -> Result<IngestOutcome> {
        let lock = self.rebuild_lock(mc_version);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let dir = self.version_dir(mc_version);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create version directory: {}", dir.display()))?;
        let db_path = dir.join(DB_FILE);
        let meta = read_meta(&dir)?;

        if let Some(meta) = &meta
            && meta.snapshot == snapshot
        {
            if let Some(served) = self.served(mc_version)
                && served.snapshot == snapshot
            {
                return Ok(IngestOutcome::UpToDate);
            }
            match load_blob(&db_path) {
                Ok(db) => {
                    info!("{mc_version} already on snapshot {snapshot}");
                    self.publish(mc_version, db);
                    return Ok(IngestOutcome::UpToDate);
                }
                Err(e) => warn!("{mc_version}: stored blob unreadable ({e:#}), rebuilding"),
            }
        }

        let (outcome, db) = if db_path.is_file() {
            match load_blob(&db_path) {
                Ok(mut existing) => {
                    let tables = OverrideTables::parse(
                        &bundle.fields_csv,
                        &bundle.methods_csv,
                        &bundle.params_csv,
                    )?;
                    overrides::merge_incremental(&mut existing.classes, &tables);
                    existing.mc_version = mc_version.to_string();
                    existing.snapshot = snapshot.to_string();
                    (IngestOutcome::Incremental, existing)
                }
                Err(e) => {
                    warn!("{mc_version}: stored blob unreadable ({e:#}), rebuilding from bundle");
                    (IngestOutcome::Full, rebuild_full(mc_version, snapshot, bundle)?)
                }
            }
        } else {
            (IngestOutcome::Full, rebuild_full(mc_version, snapshot, bundle)?)
        };

        persist(&dir, bundle.generation, &db)?;
        info!(
            "updated mappings for {mc_version} snapshot {snapshot} ({outcome:?}, {} classes)",
            db.classes.len()
        );
        self.publish(mc_version, db);
        Ok(outcome)
    }

    fn served(&self, mc_version: &str) -> Option<Arc<MappingDatabase>> {
        read_lock(&self.databases).get(mc_version).cloned()
    }

    fn publish(&self, mc_version: &str, db: MappingDatabase) {
        write_lock(&self.databases).insert(mc_version.to_string(), Arc::new(db));
        *write_lock(&self.latest) = Some(mc_version.to_string());
    }

    /// After a cold load there is no ingestion order to speak of; the highest
    /// version key stands in until the first ingest overwrites it.
    fn reset_latest(&self) {
        let databases = read_lock(&self.databases);
        let newest = databases
            .keys()
            .max_by(|a, b| compare_versions(a, b))
            .cloned();
        drop(databases);
        *write_lock(&self.latest) = newest;
    }

    fn rebuild_lock(&self, mc_version: &str) -> Arc<Mutex<()>> {
        let mut rebuilds = self.rebuilds.lock().unwrap_or_else(PoisonError::into_inner);
        rebuilds
            .entry(mc_version.to_string())
            .or_default()
            .clone()
    }

    pub fn latest(&self) -> Option<String> {
        read_lock(&self.latest).clone()
    }

    /// Loaded versions with their snapshots, ordered by version key.
    pub fn versions(&self) -> Vec<(String, String)> {
        let databases = read_lock(&self.databases);
        let mut versions: Vec<(String, String)> = databases
            .values()
            .map(|db| (db.mc_version.clone(), db.snapshot.clone()))
            .collect();
        versions.sort_by(|a, b| compare_versions(&a.0, &b.0));
        versions
    }

    /// Resolve a version token: exact match, `latest`, or a partial prefix
    /// that picks the newest matching sub-version. Tokens not starting with
    /// `1.` get it prepended first (host convention, kept from the observed
    /// system).
    pub fn resolve_version(&self, token: &str) -> Result<String, StoreError> {
        let unresolved = || StoreError::UnknownVersion(token.to_string());
        let token = token.trim();
        if token.is_empty() {
            return Err(unresolved());
        }
        if token == "latest" {
            return self.latest().ok_or_else(unresolved);
        }
        let normalized = if token.starts_with("1.") {
            token.to_string()
        } else {
            format!("1.{token}")
        };
        let databases = read_lock(&self.databases);
        if databases.contains_key(&normalized) {
            return Ok(normalized);
        }
        let prefix = format!("{normalized}.");
        databases
            .keys()
            .filter(|v| v.starts_with(&prefix))
            .max_by(|a, b| compare_versions(a, b))
            .cloned()
            .ok_or_else(unresolved)
    }

    /// The resolved forest for a version token, ready to query.
    pub fn get_forest(&self, token: &str) -> Result<Arc<MappingDatabase>, StoreError> {
        let version = self.resolve_version(token)?;
        read_lock(&self.databases)
            .get(&version)
            .cloned()
            .ok_or_else(|| StoreError::UnknownVersion(token.to_string()))
    }
}

fn read_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write_lock<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn read_meta(dir: &Path) -> Result<Option<VersionMeta>> {
    let path = dir.join(META_FILE);
    if !path.is_file() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read metadata: {}", path.display()))?;
    let meta = serde_json::from_str(&text)
        .with_context(|| format!("malformed metadata: {}", path.display()))?;
    Ok(Some(meta))
}

fn load_blob(path: &Path) -> Result<MappingDatabase> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read database blob: {}", path.display()))?;
    codec::decode_database(&text)
}

fn load_version_dir(dir: &Path) -> Result<MappingDatabase> {
    let meta = read_meta(dir)?.context("metadata file vanished")?;
    let db = load_blob(&dir.join(DB_FILE))?;
    if db.mc_version != meta.mc_version || db.snapshot != meta.snapshot {
        warn!(
            "{}: blob ({} snapshot {}) disagrees with metadata ({} snapshot {}); serving the blob",
            dir.display(),
            db.mc_version,
            db.snapshot,
            meta.mc_version,
            meta.snapshot
        );
    }
    Ok(db)
}

fn rebuild_full(mc_version: &str, snapshot: &str, bundle: &RawBundle) -> Result<MappingDatabase> {
    let classes = parse::parse(
        bundle.generation,
        &bundle.export,
        &bundle.static_methods,
        bundle.constructor_table.as_deref(),
    )?;
    let mut db = MappingDatabase {
        mc_version: mc_version.to_string(),
        snapshot: snapshot.to_string(),
        classes,
    };
    let tables = OverrideTables::parse(
        &bundle.fields_csv,
        &bundle.methods_csv,
        &bundle.params_csv,
    )?;
    overrides::merge(&mut db.classes, &tables)?;
    Ok(db)
}

/// Blob first, metadata last: a crash between the two leaves stale metadata
/// and the next ingest simply rebuilds.
fn persist(dir: &Path, format: FormatGeneration, db: &MappingDatabase) -> Result<()> {
    let blob = codec::database_to_string(db)?;
    let db_path = dir.join(DB_FILE);
    std::fs::write(&db_path, blob)
        .with_context(|| format!("failed to write database blob: {}", db_path.display()))?;
    let meta = VersionMeta {
        mc_version: db.mc_version.clone(),
        snapshot: db.snapshot.clone(),
        format,
    };
    let meta_path = dir.join(META_FILE);
    std::fs::write(&meta_path, serde_json::to_string(&meta)?)
        .with_context(|| format!("failed to write metadata: {}", meta_path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Side;
    use std::time::{SystemTime, UNIX_EPOCH};

    fn temp_root(name: &str) -> PathBuf {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_nanos();
        std::env::temp_dir().join(format!(
            "mapping_finder_store_{}_{}_{}",
            std::process::id(),
            nanos,
            name
        ))
    }

    fn tsrg_bundle(field_name: &str) -> RawBundle {
        RawBundle {
            generation: FormatGeneration::Tsrg,
            export: "a net/minecraft/Foo\n\
                     \tb field_70170_p\n\
                     \tc (F)V func_70071_h_\n"
                .to_string(),
            fields_csv: format!("searge,name,side,desc\nfield_70170_p,{field_name},0,\n"),
            methods_csv: "searge,name,side,desc\nfunc_70071_h_,onUpdate,2,\n".to_string(),
            params_csv: "param,name,side\np_70071_1_,partialTicks,2\n".to_string(),
            static_methods: String::new(),
            constructor_table: None,
        }
    }

    #[test]
    fn full_then_up_to_date_then_incremental() -> Result<()> {
        let root = temp_root("lifecycle");
        let store = VersionStore::open(root.clone())?;
        let bundle = tsrg_bundle("world");

        assert_eq!(store.ingest("1.16.1", "s1", &bundle)?, IngestOutcome::Full);
        let first = store.get_forest("1.16.1").unwrap();
        assert_eq!(
            first.classes[0].fields[0].name.as_deref(),
            Some("world")
        );
        assert_eq!(first.classes[0].methods[0].parameters.len(), 1);

        assert_eq!(
            store.ingest("1.16.1", "s1", &bundle)?,
            IngestOutcome::UpToDate
        );

        let renamed = tsrg_bundle("level");
        assert_eq!(
            store.ingest("1.16.1", "s2", &renamed)?,
            IngestOutcome::Incremental
        );
        let second = store.get_forest("1.16.1").unwrap();
        assert_eq!(second.snapshot, "s2");
        assert_eq!(second.classes[0].fields[0].name.as_deref(), Some("level"));
        // The old Arc still reads the old data.
        assert_eq!(first.classes[0].fields[0].name.as_deref(), Some("world"));
        // Structure is untouched by the incremental path.
        assert_eq!(
            second.classes[0].methods[0].parameters[0].name.as_deref(),
            Some("partialTicks")
        );

        let _ = std::fs::remove_dir_all(root);
        Ok(())
    }

    #[test]
    fn reopening_serves_persisted_forests() -> Result<()> {
        let root = temp_root("reopen");
        {
            let store = VersionStore::open(root.clone())?;
            store.ingest("1.16.1", "s1", &tsrg_bundle("world"))?;
        }
        let store = VersionStore::open(root.clone())?;
        assert_eq!(store.load_all()?, 1);
        let db = store.get_forest("latest").unwrap();
        assert_eq!(db.mc_version, "1.16.1");
        assert_eq!(db.classes[0].fields[0].side, Side::Client);

        let _ = std::fs::remove_dir_all(root);
        Ok(())
    }

    #[test]
    fn resolution_handles_latest_prefixes_and_bare_tokens() -> Result<()> {
        let root = temp_root("resolution");
        let store = VersionStore::open(root.clone())?;
        store.ingest("1.16.1", "s1", &tsrg_bundle("world"))?;
        store.ingest("1.16.4", "s2", &tsrg_bundle("world"))?;

        assert_eq!(store.resolve_version("1.16.1")?, "1.16.1");
        assert_eq!(store.resolve_version("latest")?, "1.16.4");
        assert_eq!(store.resolve_version("1.16")?, "1.16.4");
        assert_eq!(store.resolve_version("16.1")?, "1.16.1");
        assert_eq!(store.resolve_version("16")?, "1.16.4");
        assert_eq!(
            store.resolve_version("1.15"),
            Err(StoreError::UnknownVersion("1.15".to_string()))
        );

        let _ = std::fs::remove_dir_all(root);
        Ok(())
    }

    #[test]
    fn failed_ingest_leaves_other_versions_and_prior_state_alone() -> Result<()> {
        let root = temp_root("isolation");
        let store = VersionStore::open(root.clone())?;
        store.ingest("1.16.1", "s1", &tsrg_bundle("world"))?;

        let mut broken = tsrg_bundle("world");
        broken.export.push_str("\tone_token_only\n");
        assert!(store.ingest("1.16.4", "s1", &broken).is_err());

        assert!(store.get_forest("1.16.1").is_ok());
        assert_eq!(
            store.get_forest("1.16.4"),
            Err(StoreError::UnknownVersion("1.16.4".to_string()))
        );
        assert_eq!(store.resolve_version("latest")?, "1.16.1");

        let _ = std::fs::remove_dir_all(root);
        Ok(())
    }
}

//! The collector registry: loads packs from the drivers root and serves
//! version-matched lookups from an atomically swapped snapshot.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use sqlgate_common::constants::{LOADING, PACK_EXTENSIONS};
use sqlgate_common::stdfs;
use sqlgate_xdbc::Connection;
use walkdir::WalkDir;

use crate::schema::{CollectorPack, parse_pack_file};
use crate::version::VersionNumber;

type Snapshot = HashMap<String, Vec<Arc<CollectorPack>>>;

/// Registry of collector packs, keyed by dialect tag.
///
/// `reload` builds a fresh snapshot and publishes it atomically: readers
/// observe either the previous map in full or the new one in full, never a
/// partial merge.
pub struct CollectorRegistry {
    drivers_root: PathBuf,
    packs: ArcSwap<Snapshot>,
}

impl CollectorRegistry {
    /// Create an empty registry rooted at `drivers_root`. Call
    /// [`CollectorRegistry::reload`] to populate it.
    pub fn new(drivers_root: impl Into<PathBuf>) -> Self {
        CollectorRegistry {
            drivers_root: drivers_root.into(),
            packs: ArcSwap::from_pointee(Snapshot::new()),
        }
    }

    pub fn drivers_root(&self) -> &Path {
        &self.drivers_root
    }

    /// Walk `<drivers_root>/<db_type>/*.y?ml`, parse every pack, and swap
    /// the result in. Unparseable or version-less packs are skipped with a
    /// warning; a missing root yields an empty registry.
    ///
    /// Returns the number of packs loaded.
    pub fn reload(&self) -> usize {
        let mut snapshot = Snapshot::new();
        let mut loaded = 0usize;

        if !self.drivers_root.is_dir() {
            log::warn!(
                target: LOADING,
                "drivers root {} does not exist; no collector packs loaded",
                self.drivers_root.display()
            );
            self.packs.store(Arc::new(snapshot));
            return 0;
        }

        for entry in std::fs::read_dir(&self.drivers_root).into_iter().flatten().flatten() {
            let dialect_dir = entry.path();
            if !dialect_dir.is_dir() {
                continue;
            }
            let Some(db_type) = dialect_dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let db_type = db_type.to_ascii_lowercase();
            for file in WalkDir::new(&dialect_dir)
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let path = file.path();
                let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                if !PACK_EXTENSIONS.contains(&extension) {
                    continue;
                }
                match Self::load_pack(path, &db_type) {
                    Ok(Some(pack)) => {
                        snapshot.entry(db_type.clone()).or_default().push(Arc::new(pack));
                        loaded += 1;
                    }
                    Ok(None) => {}
                    Err(message) => {
                        log::warn!(target: LOADING, "skipping pack {}: {message}", path.display());
                    }
                }
            }
        }

        log::info!(
            target: LOADING,
            "collector registry loaded {loaded} pack(s) for {} dialect(s) from {}",
            snapshot.len(),
            self.drivers_root.display()
        );
        self.packs.store(Arc::new(snapshot));
        loaded
    }

    fn load_pack(path: &Path, db_type: &str) -> Result<Option<CollectorPack>, String> {
        let source_file = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("<unnamed>")
            .to_string();
        let contents = stdfs::read_to_string(path).map_err(|e| e.to_string())?;
        let parsed = parse_pack_file(&contents, &source_file).map_err(|e| e.to_string())?;
        let Some(supported_versions) = parsed.supported_versions else {
            log::warn!(
                target: LOADING,
                "skipping pack {}: missing supported_versions",
                path.display()
            );
            return Ok(None);
        };
        Ok(Some(CollectorPack {
            db_type: db_type.to_string(),
            source_file,
            supported_versions,
            collectors: parsed.collectors,
        }))
    }

    /// Every loaded pack for a dialect, regardless of version.
    pub fn packs_for(&self, db_type: &str) -> Vec<Arc<CollectorPack>> {
        self.packs
            .load()
            .get(&db_type.to_ascii_lowercase())
            .cloned()
            .unwrap_or_default()
    }

    pub fn db_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.packs.load().keys().cloned().collect();
        types.sort();
        types
    }

    /// All packs whose version range contains the given server version.
    pub fn get_matching_configs(
        &self,
        db_type: &str,
        server_version: &str,
    ) -> Vec<Arc<CollectorPack>> {
        let version = VersionNumber::parse_server(server_version);
        let candidates = self.packs_for(db_type);
        let matches: Vec<Arc<CollectorPack>> = candidates
            .iter()
            .filter(|pack| pack.supported_versions.contains(&version))
            .cloned()
            .collect();
        if matches.is_empty() {
            let available: Vec<String> = candidates
                .iter()
                .map(|pack| {
                    format!(
                        "{} [{} - {}]",
                        pack.source_file, pack.supported_versions.min, pack.supported_versions.max
                    )
                })
                .collect();
            log::warn!(
                target: LOADING,
                "no collector pack for db_type '{db_type}' matches server version '{server_version}' \
                 (parsed as {version}); available ranges: [{}]",
                available.join(", ")
            );
        }
        matches
    }

    /// The single best pack for a server version: among matching ranges, the
    /// one with the highest `max`.
    pub fn get_config(&self, db_type: &str, server_version: &str) -> Option<Arc<CollectorPack>> {
        self.get_matching_configs(db_type, server_version)
            .into_iter()
            .max_by_key(|pack| pack.supported_versions.max_version())
    }

    /// [`CollectorRegistry::get_config`] with the version taken from a live
    /// connection.
    pub fn get_config_for_connection(
        &self,
        conn: &mut dyn Connection,
        db_type: &str,
    ) -> Option<Arc<CollectorPack>> {
        let version = server_version(conn)?;
        self.get_config(db_type, &version)
    }

    /// [`CollectorRegistry::get_matching_configs`] with the version taken
    /// from a live connection.
    pub fn get_matching_configs_for_connection(
        &self,
        conn: &mut dyn Connection,
        db_type: &str,
    ) -> Vec<Arc<CollectorPack>> {
        match server_version(conn) {
            Some(version) => self.get_matching_configs(db_type, &version),
            None => Vec::new(),
        }
    }
}

fn server_version(conn: &mut dyn Connection) -> Option<String> {
    match conn.get_info(sqlgate_xdbc::options::InfoCode::VendorVersion) {
        Ok(version) => Some(version),
        Err(err) => {
            log::warn!(target: LOADING, "failed to read server version: {err}");
            None
        }
    }
}

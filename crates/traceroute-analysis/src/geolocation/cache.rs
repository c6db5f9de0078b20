use super::OriginLocator;
use crate::{decoder::ProbeId, error::Result};
use std::{
    collections::{BTreeMap, BTreeSet},
    fs,
    io::Write,
    net::IpAddr,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

/// Read access to resolved probe origins
pub trait OriginLookup {
    fn origin(&self, probe_id: ProbeId) -> Option<&str>;
}

impl OriginLookup for BTreeMap<ProbeId, String> {
    fn origin(&self, probe_id: ProbeId) -> Option<&str> {
        self.get(&probe_id).map(String::as_str)
    }
}

/// Probe origin cache persisted as `probe_id -> origin` JSON.
///
/// Resolution order: origin already resolved during this run, then a live
/// lookup, then the origin persisted by a previous run. A probe gets at most
/// one live lookup per run, whatever its outcome.
#[derive(Debug, Clone)]
pub struct GeoCache {
    path: PathBuf,
    resolved: BTreeMap<ProbeId, String>,
    persisted: BTreeMap<ProbeId, String>,
    looked_up: BTreeSet<ProbeId>,
}

impl GeoCache {
    /// Empty cache that will be saved to `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            resolved: BTreeMap::new(),
            persisted: BTreeMap::new(),
            looked_up: BTreeSet::new(),
        }
    }

    /// Load the cache file, or start empty if it doesn't exist or is unreadable
    pub fn load_or_default(path: &Path) -> Self {
        let mut cache = Self::new(path);
        if !path.exists() {
            debug!("No geolocation cache at {:?}, starting empty", path);
            return cache;
        }

        match read_entries(path) {
            Ok(persisted) => {
                cache.persisted = persisted;
                info!(
                    "Loaded {} cached probe origins from {:?}",
                    cache.persisted.len(),
                    path
                );
            }
            Err(e) => warn!("Ignoring unreadable geolocation cache {:?}: {}", path, e),
        }
        cache
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty() && self.persisted.is_empty()
    }

    /// Resolve the origin of a probe, at most one live lookup per probe and run
    pub async fn resolve<L>(
        &mut self,
        locator: &L,
        probe_id: ProbeId,
        address: Option<IpAddr>,
    ) -> Option<String>
    where
        L: OriginLocator + ?Sized,
    {
        if let Some(origin) = self.resolved.get(&probe_id) {
            return Some(origin.clone());
        }

        // One live attempt per probe and run, failures fall through to the persisted entry
        if let Some(address) = address {
            if self.looked_up.insert(probe_id) {
                match locator.locate(address).await {
                    Ok(Some(origin)) => {
                        self.resolved.insert(probe_id, origin.clone());
                        return Some(origin);
                    }
                    Ok(None) => debug!("No origin known for probe {} ({})", probe_id, address),
                    Err(e) => warn!(
                        "Origin lookup for probe {} ({}) failed: {}",
                        probe_id, address, e
                    ),
                }
            }
        }

        let fallback = self.persisted.get(&probe_id).cloned();
        if let Some(origin) = &fallback {
            debug!("Using cached origin for probe {}: {}", probe_id, origin);
            self.resolved.insert(probe_id, origin.clone());
        }
        fallback
    }

    /// Persisted entries merged with this run's resolutions
    pub fn entries(&self) -> BTreeMap<ProbeId, String> {
        let mut merged = self.persisted.clone();
        merged.extend(self.resolved.clone());
        merged
    }

    /// Write the cache atomically (temp file then rename)
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(&self.entries())?;
        let temp_path = self.path.with_extension("json.tmp");
        {
            let mut temp_file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)?;
            temp_file.write_all(contents.as_bytes())?;
            temp_file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path)?;

        debug!("Saved {} probe origins to {:?}", self.len(), self.path);
        Ok(())
    }
}

fn read_entries(path: &Path) -> Result<BTreeMap<ProbeId, String>> {
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

impl OriginLookup for GeoCache {
    fn origin(&self, probe_id: ProbeId) -> Option<&str> {
        self.resolved
            .get(&probe_id)
            .or_else(|| self.persisted.get(&probe_id))
            .map(String::as_str)
    }
}

//! Single-entry memo of the rendered map, keyed by (selected names, store mtime).

use std::sync::Arc;

use sha2::{Digest, Sha256};

use crate::data::catalog::Location;
use crate::data::store::RecordStore;
use crate::map::render::{render_map, MapArtifact};

/// SHA-256 over the ordered location names and the store's modification time, as hex.
pub fn fingerprint(locations: &[Location], store_mtime: u128) -> String {
    let mut hasher = Sha256::new();
    for location in locations {
        hasher.update(location.name.as_bytes());
        hasher.update([0u8]);
    }
    hasher.update(store_mtime.to_be_bytes());
    hex::encode(hasher.finalize())
}

#[derive(Debug, Default)]
pub struct RenderCache {
    fingerprint: Option<String>,
    artifact: Option<Arc<MapArtifact>>,
    builds: u64,
}

impl RenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached artifact if the fingerprint still matches, otherwise render anew.
    pub fn get_or_build(&mut self, locations: &[Location], store: &RecordStore) -> Arc<MapArtifact> {
        let key = fingerprint(locations, store.modified_at());
        if let (Some(current), Some(artifact)) = (&self.fingerprint, &self.artifact) {
            if *current == key {
                tracing::debug!(fingerprint = %key, "map cache hit");
                return Arc::clone(artifact);
            }
        }

        let artifact = Arc::new(render_map(locations, store));
        self.builds += 1;
        tracing::debug!(
            fingerprint = %key,
            markers = artifact.markers.len(),
            builds = self.builds,
            "map rebuilt"
        );
        self.fingerprint = Some(key);
        self.artifact = Some(Arc::clone(&artifact));
        artifact
    }

    /// Force a rebuild on the next `get_or_build`.
    pub fn invalidate(&mut self) {
        self.fingerprint = None;
    }

    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn builds(&self) -> u64 {
        self.builds
    }
}

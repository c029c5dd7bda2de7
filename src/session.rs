//! Per-session state: catalog, record store, render cache, category selection and
//! the resolved admin secret. Created when a session starts and dropped with it.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::config::{AdminSecret, Config};
use crate::data::catalog::{available_categories, load_catalog, CatalogError, Location};
use crate::data::category::Category;
use crate::data::overpass::GeodataSource;
use crate::data::store::{Record, RecordInput, RecordStore, StoreError};
use crate::map::cache::RenderCache;
use crate::map::filter::{select, selectable_names};
use crate::map::render::MapArtifact;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("unknown school '{0}'")]
    UnknownSchool(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClearOutcome {
    Cleared,
    /// The record had no makerspace, so deletion was not offered.
    NothingToClear,
    /// Wrong password. Treated as a no-op, not an error.
    Denied,
}

impl ClearOutcome {
    pub fn cleared(&self) -> bool {
        matches!(self, Self::Cleared)
    }
}

#[derive(Debug)]
pub struct SessionContext {
    catalog: Vec<Location>,
    known: HashSet<String>,
    store: RecordStore,
    cache: RenderCache,
    selection: BTreeSet<Category>,
    admin: AdminSecret,
}

impl SessionContext {
    pub fn new(catalog: Vec<Location>, store: RecordStore, admin: AdminSecret) -> Self {
        let known = catalog.iter().map(|l| l.name.clone()).collect();
        Self {
            catalog,
            known,
            store,
            cache: RenderCache::new(),
            selection: BTreeSet::new(),
            admin,
        }
    }

    /// Load catalog and record store as configured and start with an empty selection.
    pub fn open(config: &Config, source: &dyn GeodataSource) -> Result<Self, SessionError> {
        let catalog = load_catalog(&config.school_cache, source)?;
        let store = RecordStore::load(
            config.space_file.clone(),
            catalog.iter().map(|l| l.name.as_str()),
        )?;
        tracing::info!(
            schools = catalog.len(),
            records = store.len(),
            makerspaces = store.presence_count(),
            "session opened"
        );
        Ok(Self::new(catalog, store, config.admin_secret()))
    }

    pub fn catalog(&self) -> &[Location] {
        &self.catalog
    }

    pub fn store(&self) -> &RecordStore {
        &self.store
    }

    pub fn cache(&self) -> &RenderCache {
        &self.cache
    }

    pub fn categories(&self) -> Vec<Category> {
        available_categories(&self.catalog)
    }

    pub fn selection(&self) -> &BTreeSet<Category> {
        &self.selection
    }

    pub fn select_categories(&mut self, chosen: BTreeSet<Category>) {
        self.selection = chosen;
    }

    pub fn filtered(&self) -> Vec<Location> {
        select(&self.catalog, &self.selection)
    }

    pub fn selectable_names(&self) -> Vec<String> {
        selectable_names(&self.catalog, &self.filtered())
    }

    /// Map for the current selection; rebuilt only when selection or store changed.
    pub fn map(&mut self) -> Arc<MapArtifact> {
        let filtered = self.filtered();
        self.cache.get_or_build(&filtered, &self.store)
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.known.contains(name)
    }

    pub fn record(&self, name: &str) -> Result<Record, SessionError> {
        if !self.is_known(name) {
            return Err(SessionError::UnknownSchool(name.to_string()));
        }
        Ok(self.store.get(name).cloned().unwrap_or_default())
    }

    /// Replace the record of a known school with the normalized form input.
    pub fn save_record(&mut self, name: &str, input: &RecordInput) -> Result<Record, SessionError> {
        if !self.is_known(name) {
            return Err(SessionError::UnknownSchool(name.to_string()));
        }
        let record = input.normalize();
        self.store.save(name, record.clone())?;
        self.cache.invalidate();
        Ok(record)
    }

    /// Reset a school's record if it has a makerspace and the password matches.
    pub fn clear_record(&mut self, name: &str, password: &str) -> Result<ClearOutcome, SessionError> {
        let current = self.record(name)?;
        if !current.has_space() {
            return Ok(ClearOutcome::NothingToClear);
        }
        if !self.admin.matches(password) {
            tracing::info!(school = name, "deletion skipped: password mismatch");
            return Ok(ClearOutcome::Denied);
        }
        self.store.clear(name)?;
        self.cache.invalidate();
        tracing::info!(school = name, "record cleared");
        Ok(ClearOutcome::Cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc(name: &str, category: Category) -> Location {
        Location {
            name: name.to_string(),
            lat: 48.0,
            lon: 11.0,
            category,
        }
    }

    fn session(dir: &tempfile::TempDir) -> SessionContext {
        let catalog = vec![
            loc("A", Category::Gymnasium),
            loc("B", Category::Grundschule),
        ];
        let store = RecordStore::load(
            dir.path().join("spaces.json"),
            catalog.iter().map(|l| l.name.as_str()),
        )
        .expect("load store");
        SessionContext::new(catalog, store, AdminSecret::new("geheim"))
    }

    fn input(space_name: &str) -> RecordInput {
        RecordInput {
            space_name: space_name.to_string(),
            ..RecordInput::default()
        }
    }

    #[test]
    fn save_invalidates_map_cache() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = session(&dir);
        session.select_categories(BTreeSet::from([Category::Gymnasium]));

        let before = session.map();
        assert!(Arc::ptr_eq(&before, &session.map()));

        session.save_record("A", &input("Werkstatt")).expect("save");
        assert!(session.cache().fingerprint().is_none());
        let after = session.map();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(after.markers[0].has_space, true);
    }

    #[test]
    fn save_rejects_unknown_school() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = session(&dir);
        let err = session.save_record("Z", &input("X")).expect_err("unknown");
        assert!(matches!(err, SessionError::UnknownSchool(name) if name == "Z"));
        assert!(session.store().get("Z").is_none());
    }

    #[test]
    fn clear_requires_presence_and_password() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = session(&dir);

        assert_eq!(
            session.clear_record("A", "geheim").expect("clear"),
            ClearOutcome::NothingToClear
        );

        session.save_record("A", &input("Werkstatt")).expect("save");
        let builds = {
            session.map();
            session.cache().builds()
        };
        assert_eq!(session.clear_record("A", "falsch").expect("clear"), ClearOutcome::Denied);
        assert!(session.record("A").expect("record").has_space());
        session.map();
        assert_eq!(session.cache().builds(), builds, "denied delete keeps the cache");

        assert!(session.clear_record("A", "geheim").expect("clear").cleared());
        assert_eq!(session.record("A").expect("record"), Record::default());
        assert!(session.store().get("A").is_some());
    }

    #[test]
    fn empty_space_name_is_saved_as_no_makerspace() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = session(&dir);
        let saved = session
            .save_record(
                "B",
                &RecordInput {
                    tools: "Säge".into(),
                    ..RecordInput::default()
                },
            )
            .expect("save");
        assert!(!saved.has_space());
        session.select_categories(BTreeSet::from([Category::Grundschule]));
        assert!(!session.map().markers[0].has_space);
    }

    #[test]
    fn selector_names_follow_selection() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut session = session(&dir);
        assert_eq!(session.selectable_names(), vec!["A", "B"]);
        session.select_categories(BTreeSet::from([Category::Grundschule]));
        assert_eq!(session.selectable_names(), vec!["B"]);
        assert!(session.map().markers.len() == 1);
    }
}

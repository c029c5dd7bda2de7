//! School catalog: the list of known locations, cached as CSV (`name,lat,lon,type`).
//! Fetched from the geodata source only when no cache exists.

use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::category::{classify, Category};
use crate::data::overpass::{FetchError, GeodataSource, RawSchool};

pub const SCHOOL_CACHE_FILE_NAME: &str = "schools_bavaria.csv";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub category: Category,
}

impl Location {
    pub fn from_raw(raw: RawSchool) -> Self {
        let category = classify(&raw.name);
        Self {
            name: raw.name,
            lat: raw.lat,
            lon: raw.lon,
            category,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("school data unavailable: {0}")]
    Unavailable(#[from] FetchError),
    #[error("failed to access catalog cache '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog cache: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Debug, Deserialize)]
struct CachedRow {
    name: String,
    lat: f64,
    lon: f64,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

#[derive(Debug, Serialize)]
struct CacheRowOut<'a> {
    name: &'a str,
    lat: f64,
    lon: f64,
    #[serde(rename = "type")]
    kind: &'static str,
}

/// Load the catalog from `cache_path`, falling back to one fetch from `source`
/// when the cache file does not exist. Rows without a usable category are
/// classified and the cache rewritten; a complete cache is never touched.
pub fn load_catalog(
    cache_path: &Path,
    source: &dyn GeodataSource,
) -> Result<Vec<Location>, CatalogError> {
    if cache_path.exists() {
        let (locations, repaired) = read_cache(cache_path)?;
        if repaired {
            tracing::info!(
                path = %cache_path.display(),
                rows = locations.len(),
                "repairing catalog cache with derived categories"
            );
            write_cache(cache_path, &locations)?;
        }
        tracing::debug!(rows = locations.len(), "loaded school catalog from cache");
        return Ok(locations);
    }

    tracing::info!(path = %cache_path.display(), "no catalog cache, fetching schools");
    let raw = source.fetch()?;
    let locations = dedup_locations(raw.into_iter().map(Location::from_raw));
    write_cache(cache_path, &locations)?;
    tracing::info!(rows = locations.len(), "school catalog cached");
    Ok(locations)
}

/// Read the CSV cache. Returns the rows and whether any category had to be derived.
fn read_cache(path: &Path) -> Result<(Vec<Location>, bool), CatalogError> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut repaired = false;
    let mut locations = Vec::new();
    for row in reader.deserialize::<CachedRow>() {
        let row = row?;
        let category = match row.kind.as_deref().map(str::parse::<Category>) {
            Some(Ok(category)) => category,
            _ => {
                repaired = true;
                classify(&row.name)
            }
        };
        locations.push(Location {
            name: row.name,
            lat: row.lat,
            lon: row.lon,
            category,
        });
    }
    Ok((locations, repaired))
}

fn write_cache(path: &Path, locations: &[Location]) -> Result<(), CatalogError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
            path: parent.display().to_string(),
            source,
        })?;
    }
    let mut writer = csv::Writer::from_path(path)?;
    for location in locations {
        writer.serialize(CacheRowOut {
            name: &location.name,
            lat: location.lat,
            lon: location.lon,
            kind: location.category.label(),
        })?;
    }
    writer.flush().map_err(|source| CatalogError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(())
}

/// Drop exact duplicate rows, keeping the first occurrence.
fn dedup_locations(locations: impl IntoIterator<Item = Location>) -> Vec<Location> {
    let mut seen: HashSet<(String, u64, u64)> = HashSet::new();
    locations
        .into_iter()
        .filter(|l| seen.insert((l.name.clone(), l.lat.to_bits(), l.lon.to_bits())))
        .collect()
}

/// Distinct categories present in the catalog, sorted by label.
pub fn available_categories(catalog: &[Location]) -> Vec<Category> {
    let present: BTreeSet<Category> = catalog.iter().map(|l| l.category).collect();
    let mut categories: Vec<Category> = present.into_iter().collect();
    categories.sort_by_key(|c| c.label());
    categories
}

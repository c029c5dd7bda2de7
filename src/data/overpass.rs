//! Geodata collaborator: one Overpass query for every `amenity=school` in a region.

use serde::Deserialize;

pub const DEFAULT_OVERPASS_URL: &str = "https://overpass-api.de/api/interpreter";
pub const DEFAULT_REGION: &str = "DE-BY";

/// A labeled point as delivered by the geodata service, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSchool {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("geodata request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geodata service answered HTTP {status}")]
    Status { status: u16 },
    #[error("malformed geodata response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Anything that can hand the catalog a set of labeled points.
pub trait GeodataSource {
    fn fetch(&self) -> Result<Vec<RawSchool>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<OverpassElement>,
}

#[derive(Debug, Deserialize)]
struct OverpassElement {
    #[serde(default)]
    lat: Option<f64>,
    #[serde(default)]
    lon: Option<f64>,
    #[serde(default)]
    center: Option<Center>,
    #[serde(default)]
    tags: Option<Tags>,
}

#[derive(Debug, Deserialize)]
struct Center {
    lat: Option<f64>,
    lon: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Tags {
    #[serde(default)]
    name: Option<String>,
}

impl OverpassElement {
    fn into_raw(self) -> Option<RawSchool> {
        let lat = self.lat.or_else(|| self.center.as_ref().and_then(|c| c.lat))?;
        let lon = self.lon.or_else(|| self.center.as_ref().and_then(|c| c.lon))?;
        let name = self.tags.and_then(|t| t.name)?;
        if name.trim().is_empty() {
            return None;
        }
        Some(RawSchool { name, lat, lon })
    }
}

/// Build the Overpass QL query for schools inside one ISO3166-2 area.
pub fn school_query(region: &str) -> String {
    format!(
        r#"[out:json][timeout:120];
area["ISO3166-2"="{region}"]->.searchArea;
(
  node["amenity"="school"](area.searchArea);
  way["amenity"="school"](area.searchArea);
  relation["amenity"="school"](area.searchArea);
);
out center tags;
"#
    )
}

/// Decode an Overpass JSON body, keeping only elements with coordinates and a name.
pub fn parse_elements(body: &str) -> Result<Vec<RawSchool>, serde_json::Error> {
    let response: OverpassResponse = serde_json::from_str(body)?;
    Ok(response
        .elements
        .into_iter()
        .filter_map(OverpassElement::into_raw)
        .collect())
}

pub struct OverpassSource {
    client: reqwest::blocking::Client,
    url: String,
    region: String,
}

impl OverpassSource {
    pub fn new(url: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            url: url.into(),
            region: region.into(),
        }
    }
}

impl GeodataSource for OverpassSource {
    fn fetch(&self) -> Result<Vec<RawSchool>, FetchError> {
        tracing::info!(url = %self.url, region = %self.region, "querying Overpass for schools");
        let query = school_query(&self.region);
        let response = self
            .client
            .post(&self.url)
            .form(&[("data", query.as_str())])
            .send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.text()?;
        let schools = parse_elements(&body)?;
        tracing::info!(count = schools.len(), "received schools from Overpass");
        Ok(schools)
    }
}

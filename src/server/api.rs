use std::time::{Duration, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::data::category::Category;
use crate::data::store::{Record, RecordInput};
use crate::map::filter::parse_categories;
use crate::session::{SessionContext, SessionError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid request body: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    pub fn status(&self) -> (u16, &'static str) {
        match self {
            Self::Parse(_) | Self::Validation(_) => (400, "Bad Request"),
            Self::Session(SessionError::UnknownSchool(_)) => (404, "Not Found"),
            Self::Session(_) => (500, "Internal Server Error"),
        }
    }
}

/// Decoded value of a query parameter. `+` counts as a space, as in form encoding.
pub fn query_param(path: &str, key: &str) -> Option<String> {
    let query = path.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if k != key {
            return None;
        }
        let v = v.replace('+', " ");
        urlencoding::decode(&v).ok().map(|s| s.into_owned())
    })
}

/// Apply `types=` from the query string to the session selection, if present.
fn apply_selection(session: &mut SessionContext, path: &str) {
    if let Some(types) = query_param(path, "types") {
        session.select_categories(parse_categories(&types));
    }
}

fn iso_timestamp(nanos: u128) -> Option<String> {
    if nanos == 0 {
        return None;
    }
    let secs = u64::try_from(nanos / 1_000_000_000).ok()?;
    let time = UNIX_EPOCH + Duration::new(secs, (nanos % 1_000_000_000) as u32);
    Some(DateTime::<Utc>::from(time).to_rfc3339())
}

pub fn health_payload(session: &SessionContext) -> Result<String, ApiError> {
    let store = session.store();
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "service": "makerspaces",
        "version": env!("CARGO_PKG_VERSION"),
        "schools": session.catalog().len(),
        "records": store.len(),
        "makerspaces": store.presence_count(),
        "store_modified": iso_timestamp(store.modified_at()),
    }))?)
}

pub fn categories_payload(session: &SessionContext) -> Result<String, ApiError> {
    let selected: Vec<Category> = session.selection().iter().copied().collect();
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "categories": session.categories(),
        "selected": selected,
    }))?)
}

pub fn schools_payload(session: &mut SessionContext, path: &str) -> Result<String, ApiError> {
    apply_selection(session, path);
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "selected": session.selection(),
        "shown_on_map": session.filtered().len(),
        "schools": session.selectable_names(),
    }))?)
}

pub fn map_page(session: &mut SessionContext, path: &str) -> String {
    apply_selection(session, path);
    session.map().html.clone()
}

pub fn cache_payload(session: &SessionContext) -> Result<String, ApiError> {
    let cache = session.cache();
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "fingerprint": cache.fingerprint(),
        "builds": cache.builds(),
    }))?)
}

#[derive(Debug, Serialize)]
struct RecordResponse<'a> {
    name: &'a str,
    has_space: bool,
    record: &'a Record,
}

fn record_response(name: &str, record: &Record) -> Result<String, ApiError> {
    Ok(serde_json::to_string_pretty(&RecordResponse {
        name,
        has_space: record.has_space(),
        record,
    })?)
}

pub fn record_get_payload(session: &SessionContext, path: &str) -> Result<String, ApiError> {
    let name = query_param(path, "name")
        .filter(|n| !n.is_empty())
        .ok_or_else(|| ApiError::Validation("query parameter 'name' is required".to_string()))?;
    let record = session.record(&name)?;
    record_response(&name, &record)
}

#[derive(Debug, Deserialize)]
struct SaveRequest {
    name: String,
    #[serde(flatten)]
    input: RecordInput,
}

pub fn record_put_payload(session: &mut SessionContext, body: &str) -> Result<String, ApiError> {
    let request: SaveRequest = serde_json::from_str(body)?;
    let record = session.save_record(&request.name, &request.input)?;
    record_response(&request.name, &record)
}

#[derive(Debug, Deserialize)]
struct ClearRequest {
    name: String,
    #[serde(default)]
    password: String,
}

/// A refused deletion answers like a successful request, only with `cleared: false`.
pub fn record_clear_payload(session: &mut SessionContext, body: &str) -> Result<String, ApiError> {
    let request: ClearRequest = serde_json::from_str(body)?;
    let outcome = session.clear_record(&request.name, &request.password)?;
    Ok(serde_json::to_string_pretty(&serde_json::json!({
        "status": "ok",
        "name": request.name,
        "cleared": outcome.cleared(),
    }))?)
}

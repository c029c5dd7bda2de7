//! Runtime configuration from environment variables, with defaults for local use.
//!
//! | variable                 | default                      |
//! |--------------------------|------------------------------|
//! | `MAKERSPACE_DATA_DIR`    | `data`                       |
//! | `MAKERSPACE_SCHOOL_CACHE`| `<data>/schools_bavaria.csv` |
//! | `MAKERSPACE_SPACE_FILE`  | `<data>/makerspaces.json`    |
//! | `MAKERSPACE_SECRETS`     | `<data>/secrets.json`        |
//! | `MAKERSPACE_ADMIN_PW`    | secrets file, then `changeme`|
//! | `MAKERSPACE_BIND`        | `127.0.0.1:8501`             |
//! | `OVERPASS_URL`           | public Overpass endpoint     |
//! | `MAKERSPACE_REGION`      | `DE-BY`                      |

use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::data::catalog::SCHOOL_CACHE_FILE_NAME;
use crate::data::overpass::{DEFAULT_OVERPASS_URL, DEFAULT_REGION};
use crate::data::store::SPACE_FILE_NAME;

pub const DEFAULT_DATA_DIR: &str = "data";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8501";
pub const FALLBACK_ADMIN_PASSWORD: &str = "changeme";
pub const SECRETS_FILE_NAME: &str = "secrets.json";
const SECRETS_KEY: &str = "makerspace_admin_pw";

#[derive(Debug, Clone)]
pub struct Config {
    pub school_cache: PathBuf,
    pub space_file: PathBuf,
    pub secrets_file: PathBuf,
    pub bind_addr: String,
    pub overpass_url: String,
    pub region: String,
}

impl Config {
    pub fn from_env() -> Self {
        let data_dir = PathBuf::from(
            env::var("MAKERSPACE_DATA_DIR").unwrap_or_else(|_| DEFAULT_DATA_DIR.to_string()),
        );
        Self {
            school_cache: path_var("MAKERSPACE_SCHOOL_CACHE")
                .unwrap_or_else(|| data_dir.join(SCHOOL_CACHE_FILE_NAME)),
            space_file: path_var("MAKERSPACE_SPACE_FILE")
                .unwrap_or_else(|| data_dir.join(SPACE_FILE_NAME)),
            secrets_file: path_var("MAKERSPACE_SECRETS")
                .unwrap_or_else(|| data_dir.join(SECRETS_FILE_NAME)),
            bind_addr: env::var("MAKERSPACE_BIND").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            overpass_url: env::var("OVERPASS_URL")
                .unwrap_or_else(|_| DEFAULT_OVERPASS_URL.to_string()),
            region: env::var("MAKERSPACE_REGION").unwrap_or_else(|_| DEFAULT_REGION.to_string()),
        }
    }

    /// Resolve the deletion password: env var, then secrets file, then the fallback.
    pub fn admin_secret(&self) -> AdminSecret {
        resolve_admin_secret(env::var("MAKERSPACE_ADMIN_PW").ok(), &self.secrets_file)
    }

    pub fn log_summary(&self) {
        tracing::info!(
            school_cache = %self.school_cache.display(),
            space_file = %self.space_file.display(),
            bind = %self.bind_addr,
            region = %self.region,
            "configuration loaded"
        );
    }
}

fn path_var(name: &str) -> Option<PathBuf> {
    env::var(name).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from)
}

/// Shared secret that gates record deletion. Plain comparison, no hashing.
#[derive(Clone)]
pub struct AdminSecret(String);

impl AdminSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn matches(&self, candidate: &str) -> bool {
        self.0 == candidate
    }
}

impl fmt::Debug for AdminSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AdminSecret(<redacted>)")
    }
}

pub fn resolve_admin_secret(from_env: Option<String>, secrets_file: &Path) -> AdminSecret {
    if let Some(secret) = from_env.filter(|s| !s.is_empty()) {
        return AdminSecret(secret);
    }
    if let Some(secret) = read_secrets_file(secrets_file) {
        return AdminSecret(secret);
    }
    tracing::warn!("no admin password configured, using the built-in fallback");
    AdminSecret(FALLBACK_ADMIN_PASSWORD.to_string())
}

fn read_secrets_file(path: &Path) -> Option<String> {
    let raw = fs::read_to_string(path).ok()?;
    let secrets: serde_json::Value = match serde_json::from_str(&raw) {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(path = %path.display(), %err, "ignoring unreadable secrets file");
            return None;
        }
    };
    secrets
        .get(SECRETS_KEY)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

//! Application configuration.
//!
//! Configuration is layered: stock defaults, then an optional `config.toml`,
//! then environment variables. The TOML layer is sparse and strict (unknown
//! keys are rejected to catch typos early); environment variables only
//! override when set and non-empty.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [backend]
//! url = ""                    # SUPABASE_URL
//! anon_key = ""               # SUPABASE_ANON_KEY
//! # timeout_secs = 30         # Omit for no timeout
//!
//! [buckets]
//! trips = "viagens"
//! gallery = "galeria"
//!
//! [uploads]
//! max_bytes = 5242880
//! allowed_types = ["image/jpeg", "image/png", "image/webp"]
//! max_width = 1920
//! quality = 85
//!
//! [contact]
//! whatsapp = "5527999999999"  # WHATSAPP_NUMBER
//! instagram = "https://instagram.com/trilhosetrilhases"  # INSTAGRAM_URL
//!
//! [cache]
//! settings_ttl_secs = 3600
//! dir = ".trilhos-cache"
//!
//! [homepage]
//! featured_limit = 5
//! photo_sample = 6
//! ```
//!
//! The `contact` values seed the site settings defaults; rows in the
//! `configuracoes` table still win over them.

use crate::content::SiteSettings;
use crate::content::settings::{INSTAGRAM, WHATSAPP};
use crate::imaging::{PrepareConfig, Quality};
use crate::upload::{DEFAULT_ALLOWED_TYPES, DEFAULT_MAX_BYTES, UploadPolicy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_URL: &str = "SUPABASE_URL";
pub const ENV_ANON_KEY: &str = "SUPABASE_ANON_KEY";
pub const ENV_WHATSAPP: &str = "WHATSAPP_NUMBER";
pub const ENV_INSTAGRAM: &str = "INSTAGRAM_URL";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Everything the admin tool needs to reach the backend and shape uploads.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub buckets: BucketsConfig,
    pub uploads: UploadsConfig,
    pub contact: ContactConfig,
    pub cache: CacheConfig,
    pub homepage: HomepageConfig,
}

/// Content and blob store endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackendConfig {
    pub url: String,
    pub anon_key: String,
    /// Per-request timeout. No timeout when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BucketsConfig {
    /// Trip main and gallery images.
    pub trips: String,
    /// Homepage gallery photos and the footer image.
    pub gallery: String,
}

impl Default for BucketsConfig {
    fn default() -> Self {
        Self {
            trips: "viagens".to_string(),
            gallery: "galeria".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadsConfig {
    pub max_bytes: usize,
    pub allowed_types: Vec<String>,
    /// Images wider than this are scaled down before upload.
    pub max_width: u32,
    /// Re-encoding quality (1-100).
    pub quality: u32,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_BYTES,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|t| t.to_string()).collect(),
            max_width: PrepareConfig::default().max_width,
            quality: Quality::default().value(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ContactConfig {
    pub whatsapp: String,
    pub instagram: String,
}

impl Default for ContactConfig {
    fn default() -> Self {
        let settings = SiteSettings::default();
        Self {
            whatsapp: settings.whatsapp().to_string(),
            instagram: settings.instagram().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    /// 0 disables the settings cache.
    pub settings_ttl_secs: u64,
    pub dir: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            settings_ttl_secs: 3600,
            dir: ".trilhos-cache".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HomepageConfig {
    pub featured_limit: usize,
    /// Random gallery photos shown on the homepage.
    pub photo_sample: usize,
}

impl Default for HomepageConfig {
    fn default() -> Self {
        Self {
            featured_limit: 5,
            photo_sample: 6,
        }
    }
}

impl AppConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.backend.url.trim();
        if !url.is_empty() && !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(ConfigError::Validation(format!(
                "backend.url must be an http(s) URL, got '{url}'"
            )));
        }
        if self.backend.timeout_secs == Some(0) {
            return Err(ConfigError::Validation(
                "backend.timeout_secs must be positive (omit it for no timeout)".into(),
            ));
        }
        if self.buckets.trips.trim().is_empty() || self.buckets.gallery.trim().is_empty() {
            return Err(ConfigError::Validation(
                "buckets.trips and buckets.gallery must not be empty".into(),
            ));
        }
        if self.uploads.quality == 0 || self.uploads.quality > 100 {
            return Err(ConfigError::Validation(
                "uploads.quality must be 1-100".into(),
            ));
        }
        if self.uploads.max_width == 0 {
            return Err(ConfigError::Validation(
                "uploads.max_width must be non-zero".into(),
            ));
        }
        if self.uploads.max_bytes == 0 {
            return Err(ConfigError::Validation(
                "uploads.max_bytes must be non-zero".into(),
            ));
        }
        if self.uploads.allowed_types.is_empty() {
            return Err(ConfigError::Validation(
                "uploads.allowed_types must not be empty".into(),
            ));
        }
        if self.homepage.featured_limit == 0 {
            return Err(ConfigError::Validation(
                "homepage.featured_limit must be non-zero".into(),
            ));
        }
        Ok(())
    }

    /// Override values from the environment. Unset or blank variables are
    /// ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(url) = get(ENV_URL) {
            self.backend.url = url;
        }
        if let Some(key) = get(ENV_ANON_KEY) {
            self.backend.anon_key = key;
        }
        if let Some(number) = get(ENV_WHATSAPP) {
            self.contact.whatsapp = number;
        }
        if let Some(url) = get(ENV_INSTAGRAM) {
            self.contact.instagram = url;
        }
    }

    /// Fail unless both the backend URL and key are known.
    pub fn require_backend(&self) -> Result<(), ConfigError> {
        if self.backend.url.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "backend.url is not set (config file or {ENV_URL})"
            )));
        }
        if self.backend.anon_key.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "backend.anon_key is not set (config file or {ENV_ANON_KEY})"
            )));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.backend.timeout_secs.map(Duration::from_secs)
    }

    pub fn upload_policy(&self) -> UploadPolicy {
        UploadPolicy {
            allowed_types: self.uploads.allowed_types.clone(),
            max_bytes: self.uploads.max_bytes,
        }
    }

    pub fn prepare_config(&self) -> PrepareConfig {
        PrepareConfig {
            max_width: self.uploads.max_width,
            quality: Quality::new(self.uploads.quality),
        }
    }

    /// `None` when the settings cache is disabled.
    pub fn settings_ttl(&self) -> Option<Duration> {
        match self.cache.settings_ttl_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }

    pub fn cache_dir(&self) -> PathBuf {
        PathBuf::from(&self.cache.dir)
    }

    /// Built-in site settings with the configured contact details on top.
    pub fn site_defaults(&self) -> SiteSettings {
        let overrides = [
            (WHATSAPP, self.contact.whatsapp.trim()),
            (INSTAGRAM, self.contact.instagram.trim()),
        ];
        SiteSettings::default().overlay(overrides.into_iter().filter(|(_, v)| !v.is_empty()))
    }
}

// =============================================================================
// Loading: stock defaults, then config.toml, then the environment
// =============================================================================

/// Stock defaults as a TOML table, the bottom layer a config file is laid over.
pub fn stock_defaults_table() -> Result<toml::Table, ConfigError> {
    Ok(toml::Table::try_from(AppConfig::default())?)
}

/// Lay `file` over `base` section by section, so a config file only needs
/// the keys it changes. Arrays and scalars are replaced whole.
fn lay_over(base: &mut toml::Table, file: toml::Table) {
    for (key, value) in file {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(section)), toml::Value::Table(changes)) => {
                lay_over(section, changes);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Keys set in the config file. A missing file sets none.
fn read_config_file(path: &Path) -> Result<toml::Table, ConfigError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(text.parse::<toml::Table>()?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(toml::Table::new()),
        Err(e) => Err(e.into()),
    }
}

/// `file` laid over the stock defaults, checked for unknown keys and
/// validated.
pub fn config_from_table(file: toml::Table) -> Result<AppConfig, ConfigError> {
    let mut layered = stock_defaults_table()?;
    lay_over(&mut layered, file);
    let config: AppConfig = toml::Value::Table(layered).try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the config file at `path` (defaults when missing), without the
/// environment layer.
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    config_from_table(read_config_file(path)?)
}

/// [`load_config`] followed by the process environment.
pub fn load_config_with_env(path: &Path) -> Result<AppConfig, ConfigError> {
    let mut config = load_config(path)?;
    config.apply_env(|name| std::env::var(name).ok());
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# Trilhos admin configuration
# ===========================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults.
#
# Environment variables (also read from a .env file) override this file:
#   SUPABASE_URL, SUPABASE_ANON_KEY, WHATSAPP_NUMBER, INSTAGRAM_URL
#
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Backend (content store + blob store)
# ---------------------------------------------------------------------------
[backend]
# Project URL, e.g. "https://abcd.supabase.co".
url = ""

# Public (anon) API key.
anon_key = ""

# Per-request timeout in seconds. Omit for no timeout.
# timeout_secs = 30

# ---------------------------------------------------------------------------
# Storage buckets
# ---------------------------------------------------------------------------
[buckets]
# Trip main images and trip galleries.
trips = "viagens"

# Homepage gallery photos and the footer image.
gallery = "galeria"

# ---------------------------------------------------------------------------
# Uploads
# ---------------------------------------------------------------------------
[uploads]
# Largest accepted file, in bytes (5 MiB).
max_bytes = 5242880

# Accepted MIME types.
allowed_types = ["image/jpeg", "image/png", "image/webp"]

# Images wider than this are scaled down before upload.
max_width = 1920

# Re-encoding quality (1 = worst, 100 = best).
quality = 85

# ---------------------------------------------------------------------------
# Contact defaults (used until the settings table says otherwise)
# ---------------------------------------------------------------------------
[contact]
whatsapp = "5527999999999"
instagram = "https://instagram.com/trilhosetrilhases"

# ---------------------------------------------------------------------------
# Local cache
# ---------------------------------------------------------------------------
[cache]
# How long fetched site settings are reused. 0 disables the cache.
settings_ttl_secs = 3600

# Directory for cache files.
dir = ".trilhos-cache"

# ---------------------------------------------------------------------------
# Homepage
# ---------------------------------------------------------------------------
[homepage]
# Featured trips shown (filled up with upcoming trips when too few are featured).
featured_limit = 5

# Random gallery photos shown.
photo_sample = 6
"##
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_values() {
        let config = AppConfig::default();
        assert_eq!(config.buckets.trips, "viagens");
        assert_eq!(config.buckets.gallery, "galeria");
        assert_eq!(config.uploads.max_bytes, 5 * 1024 * 1024);
        assert_eq!(config.uploads.max_width, 1920);
        assert_eq!(config.homepage.featured_limit, 5);
        assert_eq!(config.backend.timeout_secs, None);
        assert_eq!(config.settings_ttl(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn parse_partial_config() {
        let toml = r#"
[uploads]
max_width = 1280
"#;
        let config: AppConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.uploads.max_width, 1280);
        assert_eq!(config.uploads.quality, 85);
        assert_eq!(config.buckets.trips, "viagens");
    }

    #[test]
    fn load_config_returns_default_when_no_file() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("config.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn load_config_reads_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(
            &path,
            r#"
[backend]
url = "https://abcd.supabase.co"
anon_key = "anon"
timeout_secs = 20

[homepage]
photo_sample = 9
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.backend.url, "https://abcd.supabase.co");
        assert_eq!(config.timeout(), Some(Duration::from_secs(20)));
        assert_eq!(config.homepage.photo_sample, 9);
        assert_eq!(config.homepage.featured_limit, 5);
        config.require_backend().unwrap();
    }

    #[test]
    fn load_config_invalid_toml_is_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "this is not valid toml [[[").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        fs::write(&path, "[uploads]\nmax_widht = 100\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));

        fs::write(&path, "[colors]\nbackground = \"#fff\"\n").unwrap();
        assert!(matches!(load_config(&path), Err(ConfigError::Toml(_))));
    }

    #[test]
    fn validation_rejects_bad_values() {
        let cases = [
            "[uploads]\nquality = 0\n",
            "[uploads]\nquality = 101\n",
            "[uploads]\nmax_width = 0\n",
            "[uploads]\nallowed_types = []\n",
            "[buckets]\ntrips = \"\"\n",
            "[backend]\nurl = \"ftp://host\"\n",
            "[backend]\ntimeout_secs = 0\n",
            "[homepage]\nfeatured_limit = 0\n",
        ];
        for case in cases {
            let result = config_from_table(case.parse().unwrap());
            assert!(
                matches!(result, Err(ConfigError::Validation(_))),
                "accepted: {case}"
            );
        }
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = AppConfig::default();
        config.backend.url = "https://from-file.supabase.co".into();
        config.apply_env(env(&[
            (ENV_URL, "https://from-env.supabase.co"),
            (ENV_ANON_KEY, "secret"),
            (ENV_WHATSAPP, "5527988887777"),
            (ENV_INSTAGRAM, "   "),
        ]));

        assert_eq!(config.backend.url, "https://from-env.supabase.co");
        assert_eq!(config.backend.anon_key, "secret");
        assert_eq!(config.contact.whatsapp, "5527988887777");
        assert_eq!(
            config.contact.instagram,
            "https://instagram.com/trilhosetrilhases"
        );
    }

    #[test]
    fn require_backend_names_the_missing_value() {
        let mut config = AppConfig::default();
        let err = config.require_backend().unwrap_err().to_string();
        assert!(err.contains(ENV_URL));

        config.backend.url = "https://abcd.supabase.co".into();
        let err = config.require_backend().unwrap_err().to_string();
        assert!(err.contains(ENV_ANON_KEY));
    }

    #[test]
    fn derived_upload_settings() {
        let mut config = AppConfig::default();
        config.uploads.quality = 70;
        config.uploads.max_bytes = 1024;

        assert_eq!(config.prepare_config().quality, Quality::new(70));
        assert_eq!(config.upload_policy().max_bytes, 1024);
    }

    #[test]
    fn zero_ttl_disables_settings_cache() {
        let mut config = AppConfig::default();
        config.cache.settings_ttl_secs = 0;
        assert_eq!(config.settings_ttl(), None);
    }

    #[test]
    fn site_defaults_use_contact_section() {
        let mut config = AppConfig::default();
        config.contact.whatsapp = "5521912345678".into();
        config.contact.instagram = String::new();

        let settings = config.site_defaults();
        assert_eq!(settings.whatsapp(), "5521912345678");
        assert_eq!(settings.instagram(), "https://instagram.com/trilhosetrilhases");
    }

    #[test]
    fn file_keys_replace_only_what_they_name() {
        let mut base: toml::Table = "[a]\nx = 1\ny = [1, 2]\n".parse().unwrap();
        let file: toml::Table = "[a]\ny = [3]\nz = 4\n".parse().unwrap();
        lay_over(&mut base, file);

        let a = base["a"].as_table().unwrap();
        assert_eq!(a["x"].as_integer(), Some(1));
        assert_eq!(a["y"].as_array().unwrap().len(), 1);
        assert_eq!(a["z"].as_integer(), Some(4));
    }

    #[test]
    fn unreadable_config_path_is_an_io_error() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(load_config(tmp.path()), Err(ConfigError::Io(_))));
    }

    #[test]
    fn stock_config_toml_roundtrips_to_defaults() {
        let parsed: AppConfig = toml::from_str(stock_config_toml()).unwrap();
        assert_eq!(parsed, AppConfig::default());
    }

    #[test]
    fn stock_config_toml_contains_all_sections() {
        let toml = stock_config_toml();
        for section in ["[backend]", "[buckets]", "[uploads]", "[contact]", "[cache]", "[homepage]"] {
            assert!(toml.contains(section), "missing {section}");
        }
    }

    #[test]
    fn stock_defaults_table_has_all_sections() {
        let table = stock_defaults_table().unwrap();
        for key in ["backend", "buckets", "uploads", "contact", "cache", "homepage"] {
            assert!(table.contains_key(key), "missing {key}");
        }
    }
}

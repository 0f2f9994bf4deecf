//! Application configuration for sn2n.
//!
//! User config lives at `~/.sn2n/sn2n.toml`.
//! CLI flags override config file values, which override defaults.
//! Configuration is loaded once per process and is read-only afterwards.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, Sn2nError};
use crate::report::ElementKind;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "sn2n.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".sn2n";

/// Smallest per-run limit that still leaves room for whitespace-aware splitting.
const MIN_RUN_LENGTH: usize = 8;

/// A table and its rows always occupy two levels.
const MIN_DEPTH: usize = 2;

// ---------------------------------------------------------------------------
// Config structs (matching sn2n.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Block conversion limits.
    #[serde(default)]
    pub conversion: ConversionSection,

    /// Completeness audit thresholds.
    #[serde(default)]
    pub audit: AuditSection,

    /// Image resolution policy.
    #[serde(default)]
    pub images: ImagesSection,

    /// Batch driver settings.
    #[serde(default)]
    pub batch: BatchSection,
}

/// `[conversion]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionSection {
    /// Maximum nesting levels the target accepts in one write.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Maximum characters per rich-text run.
    #[serde(default = "default_max_run_length")]
    pub max_run_length: usize,

    /// Cell text used when a table-cell image was moved below the table.
    #[serde(default = "default_cell_image_placeholder")]
    pub cell_image_placeholder: String,

    /// Cell text used when a table-cell image could not be resolved.
    #[serde(default = "default_unresolved_image_glyph")]
    pub unresolved_image_glyph: String,

    /// Base URL for resolving relative links and image sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ConversionSection {
    fn default() -> Self {
        Self {
            max_depth: default_max_depth(),
            max_run_length: default_max_run_length(),
            cell_image_placeholder: default_cell_image_placeholder(),
            unresolved_image_glyph: default_unresolved_image_glyph(),
            base_url: None,
        }
    }
}

fn default_max_depth() -> usize {
    2
}
fn default_max_run_length() -> usize {
    100
}
fn default_cell_image_placeholder() -> String {
    "See image below".into()
}
fn default_unresolved_image_glyph() -> String {
    "•".into()
}

/// `[audit]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditSection {
    /// Lowest acceptable coverage ratio.
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f64,

    /// Highest acceptable coverage ratio.
    #[serde(default = "default_max_coverage")]
    pub max_coverage: f64,

    /// Element kinds whose counts must match exactly.
    #[serde(default = "default_critical_kinds")]
    pub critical_kinds: Vec<ElementKind>,

    /// Maximum missing/extra spans kept in a report.
    #[serde(default = "default_sample_size")]
    pub sample_size: usize,

    /// DP cells allowed for the LCS diff before falling back to set difference.
    #[serde(default = "default_lcs_cell_limit")]
    pub lcs_cell_limit: usize,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            min_coverage: default_min_coverage(),
            max_coverage: default_max_coverage(),
            critical_kinds: default_critical_kinds(),
            sample_size: default_sample_size(),
            lcs_cell_limit: default_lcs_cell_limit(),
        }
    }
}

fn default_min_coverage() -> f64 {
    0.95
}
fn default_max_coverage() -> f64 {
    1.05
}
fn default_critical_kinds() -> Vec<ElementKind> {
    ElementKind::DEFAULT_CRITICAL.to_vec()
}
fn default_sample_size() -> usize {
    5
}
fn default_lcs_cell_limit() -> usize {
    4_000_000
}

/// `[images]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImagesSection {
    /// Accept inline `data:` URLs as external images.
    #[serde(default)]
    pub allow_data_urls: bool,
}

/// `[batch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchSection {
    /// Pages converted concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Directory receiving source HTML of pages that failed the audit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reprocess_dir: Option<String>,
}

impl Default for BatchSection {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            reprocess_dir: None,
        }
    }
}

fn default_concurrency() -> usize {
    4
}

// ---------------------------------------------------------------------------
// Runtime configs (derived from AppConfig, validated before use)
// ---------------------------------------------------------------------------

/// Runtime conversion configuration.
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub max_depth: usize,
    pub max_run_length: usize,
    pub cell_image_placeholder: String,
    pub unresolved_image_glyph: String,
    pub base_url: Option<Url>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for ConversionConfig {
    fn from(config: &AppConfig) -> Self {
        let section = &config.conversion;
        Self {
            max_depth: section.max_depth,
            max_run_length: section.max_run_length,
            cell_image_placeholder: section.cell_image_placeholder.clone(),
            unresolved_image_glyph: section.unresolved_image_glyph.clone(),
            base_url: section.base_url.as_deref().and_then(|u| Url::parse(u).ok()),
        }
    }
}

impl ConversionConfig {
    /// Reject limits the converter cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth < MIN_DEPTH {
            return Err(Sn2nError::config(format!(
                "conversion.max_depth must be at least {MIN_DEPTH}, got {}",
                self.max_depth
            )));
        }
        if self.max_run_length < MIN_RUN_LENGTH {
            return Err(Sn2nError::config(format!(
                "conversion.max_run_length must be at least {MIN_RUN_LENGTH}, got {}",
                self.max_run_length
            )));
        }
        Ok(())
    }
}

/// Runtime audit configuration.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    pub min_coverage: f64,
    pub max_coverage: f64,
    pub critical_kinds: Vec<ElementKind>,
    pub sample_size: usize,
    pub lcs_cell_limit: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for AuditConfig {
    fn from(config: &AppConfig) -> Self {
        let section = &config.audit;
        Self {
            min_coverage: section.min_coverage,
            max_coverage: section.max_coverage,
            critical_kinds: section.critical_kinds.clone(),
            sample_size: section.sample_size,
            lcs_cell_limit: section.lcs_cell_limit,
        }
    }
}

impl AuditConfig {
    /// Reject an acceptance band that can never pass.
    pub fn validate(&self) -> Result<()> {
        if !(self.min_coverage.is_finite() && self.max_coverage.is_finite()) {
            return Err(Sn2nError::config("audit coverage bounds must be finite"));
        }
        if self.min_coverage <= 0.0 {
            return Err(Sn2nError::config("audit.min_coverage must be positive"));
        }
        if self.min_coverage > self.max_coverage {
            return Err(Sn2nError::config(format!(
                "audit.min_coverage ({}) exceeds audit.max_coverage ({})",
                self.min_coverage, self.max_coverage
            )));
        }
        if self.sample_size == 0 {
            return Err(Sn2nError::config("audit.sample_size must be at least 1"));
        }
        Ok(())
    }

    pub fn is_critical(&self, kind: ElementKind) -> bool {
        self.critical_kinds.contains(&kind)
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.sn2n/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| Sn2nError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.sn2n/sn2n.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| Sn2nError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| Sn2nError::config(format!("failed to parse {}: {e}", path.display())))?;

    if let Some(base) = &config.conversion.base_url {
        Url::parse(base).map_err(|e| {
            Sn2nError::config(format!("conversion.base_url '{base}' is not a URL: {e}"))
        })?;
    }

    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| Sn2nError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| Sn2nError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| Sn2nError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("max_depth"));
        assert!(toml_str.contains("min_coverage"));
        assert!(toml_str.contains("callout"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.conversion.max_depth, 2);
        assert_eq!(parsed.conversion.max_run_length, 100);
        assert_eq!(parsed.audit.critical_kinds.len(), 5);
        assert_eq!(parsed.batch.concurrency, 4);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[conversion]
max_run_length = 2000
base_url = "https://docs.servicenow.com/"

[audit]
critical_kinds = ["table", "callout"]
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.conversion.max_depth, 2);
        assert_eq!(config.conversion.max_run_length, 2000);

        let audit = AuditConfig::from(&config);
        assert!(audit.is_critical(ElementKind::Callout));
        assert!(!audit.is_critical(ElementKind::Heading));
        assert!((audit.min_coverage - 0.95).abs() < f64::EPSILON);

        let conversion = ConversionConfig::from(&config);
        assert_eq!(
            conversion.base_url.map(|u| u.to_string()),
            Some("https://docs.servicenow.com/".to_string())
        );
    }

    #[test]
    fn invalid_limits_are_rejected() {
        let mut conversion = ConversionConfig::default();
        assert!(conversion.validate().is_ok());
        conversion.max_depth = 1;
        assert!(conversion.validate().is_err());

        conversion.max_depth = 2;
        conversion.max_run_length = 3;
        let err = conversion.validate().unwrap_err();
        assert!(err.to_string().contains("max_run_length"));

        let mut audit = AuditConfig::default();
        assert!(audit.validate().is_ok());
        audit.min_coverage = 1.2;
        assert!(audit.validate().is_err());
        audit.min_coverage = 0.0;
        audit.max_coverage = 1.0;
        assert!(audit.validate().is_err());
    }

    #[test]
    fn load_rejects_bad_base_url() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("sn2n.toml");
        std::fs::write(&path, "[conversion]\nbase_url = \"not a url\"\n").expect("write");

        let err = load_config_from(&path).unwrap_err();
        assert!(err.to_string().contains("base_url"));
    }
}

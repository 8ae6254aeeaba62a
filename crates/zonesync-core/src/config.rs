//! Configuration types for zonesync
//!
//! This module defines all configuration structures used throughout the crate.

use serde::{Deserialize, Serialize};

use crate::zone::Zone;

/// Main reconciliation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Backend configuration
    #[serde(default)]
    pub backend: BackendConfig,

    /// Create and maintain PTR records for A records
    #[serde(default)]
    pub reverse_record_generation: bool,

    /// TTL applied to endpoints that do not carry one
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    /// DNS view that scopes zone listing and record creation
    #[serde(default = "default_view")]
    pub view: String,

    /// Which zones are visible to a pass
    #[serde(default)]
    pub domain_filter: DomainFilter,

    /// Build and log changes without submitting them
    #[serde(default)]
    pub dry_run: bool,

    /// Page size requested from the backend (`_max_results`)
    #[serde(default = "default_max_results")]
    pub max_results: Option<u32>,

    /// Name regex passed to record queries (`name~`)
    #[serde(default)]
    pub name_regex: Option<String>,

    /// Zone name regex passed to zone listing (`fqdn~`)
    #[serde(default)]
    pub zone_regex: Option<String>,

    /// Extensible attributes attached to every record written
    #[serde(default = "default_extensible_attributes")]
    pub extensible_attributes: serde_json::Value,

    /// Optional engine settings
    #[serde(default)]
    pub engine: EngineConfig,
}

impl SyncConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self {
            backend: BackendConfig::default(),
            reverse_record_generation: false,
            default_ttl: default_ttl(),
            view: default_view(),
            domain_filter: DomainFilter::default(),
            dry_run: false,
            max_results: default_max_results(),
            name_regex: None,
            zone_regex: None,
            extensible_attributes: default_extensible_attributes(),
            engine: EngineConfig::default(),
        }
    }

    /// Enable or disable PTR generation
    pub fn with_reverse_records(mut self, enabled: bool) -> Self {
        self.reverse_record_generation = enabled;
        self
    }

    /// Set the domain filter
    pub fn with_domain_filter(mut self, filter: DomainFilter) -> Self {
        self.domain_filter = filter;
        self
    }

    /// Enable or disable dry-run mode
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.default_ttl == 0 {
            return Err(crate::Error::config("Default TTL must be > 0"));
        }

        if self.max_results == Some(0) {
            return Err(crate::Error::config(
                "max_results must be > 0 (omit it to let the backend decide)",
            ));
        }

        validate_regex("name_regex", self.name_regex.as_deref())?;
        validate_regex("zone_regex", self.zone_regex.as_deref())?;

        if !self.extensible_attributes.is_object() {
            return Err(crate::Error::config(
                "extensible_attributes must be a JSON object",
            ));
        }

        self.backend.validate()?;
        self.engine.validate()?;

        Ok(())
    }

    /// Extensible attributes as a JSON object map
    pub fn extensible_attributes(&self) -> serde_json::Map<String, serde_json::Value> {
        self.extensible_attributes
            .as_object()
            .cloned()
            .unwrap_or_default()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackendConfig {
    /// In-process backend (not persistent)
    #[default]
    Memory,

    /// JSON snapshot file backend
    File {
        /// Path to the snapshot file
        path: String,
    },

    /// Custom backend
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl BackendConfig {
    /// Validate the backend configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            BackendConfig::Memory => Ok(()),
            BackendConfig::File { path } => {
                if path.is_empty() {
                    return Err(crate::Error::config("File backend path cannot be empty"));
                }
                Ok(())
            }
            BackendConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom backend factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom backend config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the backend type name
    pub fn type_name(&self) -> &str {
        match self {
            BackendConfig::Memory => "memory",
            BackendConfig::File { .. } => "file",
            BackendConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Include/exclude suffix filter over zone names
///
/// An empty include list admits every zone. Exclusions always win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainFilter {
    /// Domains (and their subdomains) to admit
    #[serde(default)]
    pub include: Vec<String>,

    /// Domains (and their subdomains) to reject
    #[serde(default)]
    pub exclude: Vec<String>,
}

impl DomainFilter {
    /// Create a filter from include and exclude lists
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self {
            include: include.iter().map(|d| normalize_domain(d)).collect(),
            exclude: exclude.iter().map(|d| normalize_domain(d)).collect(),
        }
    }

    /// Whether the filter admits `domain`
    pub fn matches(&self, domain: &str) -> bool {
        let domain = normalize_domain(domain);

        if self.exclude.iter().any(|ex| is_within(&domain, &normalize_domain(ex))) {
            return false;
        }

        self.include.is_empty()
            || self
                .include
                .iter()
                .any(|inc| is_within(&domain, &normalize_domain(inc)))
    }

    /// Whether the filter admits `zone`.
    ///
    /// Reverse zones are admitted when their CIDR literal is listed verbatim
    /// or when their arpa name matches like any other domain.
    pub fn matches_zone(&self, zone: &Zone) -> bool {
        if zone.is_forward() {
            return self.matches(zone.name());
        }

        let literal = zone.name().to_ascii_lowercase();
        if self.exclude.iter().any(|ex| normalize_domain(ex) == literal) {
            return false;
        }
        if self.include.iter().any(|inc| normalize_domain(inc) == literal) {
            return true;
        }

        match zone.arpa_name() {
            Some(arpa) => self.matches(&arpa),
            None => self.include.is_empty(),
        }
    }

    /// Whether the filter has no include or exclude entries
    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_matches('.').to_ascii_lowercase()
}

fn is_within(domain: &str, suffix: &str) -> bool {
    domain == suffix
        || domain
            .strip_suffix(suffix)
            .is_some_and(|head| head.ends_with('.'))
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Capacity of the engine event channel
    ///
    /// When full, new events are dropped (with a warning log).
    ///
    /// Default: 1000 events
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Emit an `Update` for targets present in both the old and new version
    /// of a record when its TTL or annotations changed.
    ///
    /// Off by default: only target membership changes produce mutations.
    #[serde(default)]
    pub emit_attribute_updates: bool,
}

impl EngineConfig {
    /// Validate the engine configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.event_channel_capacity == 0 {
            return Err(crate::Error::config("event_channel_capacity must be > 0"));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_channel_capacity: default_event_channel_capacity(),
            emit_attribute_updates: false,
        }
    }
}

fn default_ttl() -> u32 {
    300
}

fn validate_regex(field: &str, pattern: Option<&str>) -> Result<(), crate::Error> {
    let Some(pattern) = pattern else {
        return Ok(());
    };
    if pattern.is_empty() {
        return Err(crate::Error::config(format!("{} cannot be empty", field)));
    }
    regex::Regex::new(pattern).map_err(|e| {
        crate::Error::config(format!("Invalid {} '{}': {}", field, pattern, e))
    })?;
    Ok(())
}

fn default_view() -> String {
    "default".to_string()
}

fn default_max_results() -> Option<u32> {
    Some(1500)
}

fn default_extensible_attributes() -> serde_json::Value {
    serde_json::Value::Object(serde_json::Map::new())
}

fn default_event_channel_capacity() -> usize {
    1000
}

//! Configuration types for StateGuard.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::error::GuardError;

/// Default attempt limit before the threshold callback fires.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Callback invoked with the guarded element and its violation count once the
/// count reaches the configured limit.
///
/// Runs synchronously inside the notification handler. Implementations that
/// do slow work (network, disk) should hand the report off to a queue.
pub type ViolationCallback<E> = Arc<dyn Fn(&E, u32) + Send + Sync>;

/// Which attributes of an element a guard watches.
///
/// Serializes as the keyword `"all"` or as a list of attribute names.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FilterRepr", into = "FilterRepr")]
pub enum AttributeFilter {
    /// Every attribute is monitored.
    #[default]
    All,
    /// Only the named attributes are monitored.
    Only(BTreeSet<String>),
}

impl AttributeFilter {
    /// Builds a filter for an explicit list of attribute names.
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Only(names.into_iter().map(Into::into).collect())
    }

    /// Returns true if changes to `name` are monitored.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(name),
        }
    }
}

impl fmt::Display for AttributeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(names) => {
                let names: Vec<&str> = names.iter().map(String::as_str).collect();
                write!(f, "[{}]", names.join(", "))
            }
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum FilterRepr {
    Keyword(String),
    Names(Vec<String>),
}

impl TryFrom<FilterRepr> for AttributeFilter {
    type Error = GuardError;

    fn try_from(repr: FilterRepr) -> Result<Self, Self::Error> {
        match repr {
            FilterRepr::Keyword(keyword) if keyword == "all" => Ok(Self::All),
            FilterRepr::Keyword(other) => Err(GuardError::InvalidAttributeFilter(other)),
            FilterRepr::Names(names) => Ok(Self::only(names)),
        }
    }
}

impl From<AttributeFilter> for FilterRepr {
    fn from(filter: AttributeFilter) -> Self {
        match filter {
            AttributeFilter::All => Self::Keyword("all".to_string()),
            AttributeFilter::Only(names) => Self::Names(names.into_iter().collect()),
        }
    }
}

/// Serializable guard settings.
///
/// # Example
///
/// ```rust
/// use stateguard_core::{AttributeFilter, GuardConfig};
///
/// let config = GuardConfig::from_json(r#"{"attributes": ["disabled"], "maxAttempts": 1}"#)?;
/// assert_eq!(config.attributes, AttributeFilter::only(["disabled"]));
/// assert_eq!(config.max_attempts, 1);
/// # Ok::<(), stateguard_core::GuardError>(())
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GuardConfig {
    /// Attributes to monitor.
    pub attributes: AttributeFilter,

    /// Violations tolerated before the callback fires. Clamped to at least 1
    /// when a guard is built.
    pub max_attempts: u32,
}

impl GuardConfig {
    /// Decodes a config from JSON. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, GuardError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            attributes: AttributeFilter::All,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// Settings plus the optional threshold callback for a guard.
///
/// Cloning shares the callback, so one set of options can protect many
/// elements.
///
/// # Example
///
/// ```rust
/// use stateguard_core::{GuardOptions, MemoryElement};
///
/// let options = GuardOptions::<MemoryElement>::new()
///     .with_attributes(["disabled"])
///     .with_max_attempts(2)
///     .on_violation(|_el, count| eprintln!("tamper attempt #{count}"));
/// assert_eq!(options.config.max_attempts, 2);
/// ```
pub struct GuardOptions<E> {
    /// Serializable settings.
    pub config: GuardConfig,
    /// Threshold callback.
    pub on_violation: Option<ViolationCallback<E>>,
}

impl<E> GuardOptions<E> {
    /// Options with every attribute monitored and a limit of 3.
    pub fn new() -> Self {
        Self::from_config(GuardConfig::default())
    }

    /// Options from a decoded config, without a callback.
    pub fn from_config(config: GuardConfig) -> Self {
        Self {
            config,
            on_violation: None,
        }
    }

    /// Monitors only the named attributes.
    #[must_use]
    pub fn with_attributes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.attributes = AttributeFilter::only(names);
        self
    }

    /// Sets the attribute filter.
    #[must_use]
    pub fn with_filter(mut self, filter: AttributeFilter) -> Self {
        self.config.attributes = filter;
        self
    }

    /// Sets the attempt limit.
    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    /// Sets the threshold callback.
    #[must_use]
    pub fn on_violation<F>(mut self, callback: F) -> Self
    where
        F: Fn(&E, u32) + Send + Sync + 'static,
    {
        self.on_violation = Some(Arc::new(callback));
        self
    }

    /// Sets an already shared threshold callback.
    #[must_use]
    pub fn with_callback(mut self, callback: ViolationCallback<E>) -> Self {
        self.on_violation = Some(callback);
        self
    }
}

impl<E> Default for GuardOptions<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for GuardOptions<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            on_violation: self.on_violation.clone(),
        }
    }
}

impl<E> fmt::Debug for GuardOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardOptions")
            .field("config", &self.config)
            .field("on_violation", &self.on_violation.is_some())
            .finish()
    }
}

/// Registry settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegistryConfig {
    /// Ask the host to block console clearing while the registry lives, so
    /// tamper warnings stay visible to auditors.
    pub audit_mode: bool,
}

impl RegistryConfig {
    /// Enables or disables audit mode.
    #[must_use]
    pub const fn with_audit_mode(mut self, enabled: bool) -> Self {
        self.audit_mode = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GuardConfig::default();
        assert_eq!(config.attributes, AttributeFilter::All);
        assert_eq!(config.max_attempts, 3);
        assert!(!RegistryConfig::default().audit_mode);
    }

    #[test]
    fn test_filter_matches() {
        assert!(AttributeFilter::All.matches("anything"));

        let filter = AttributeFilter::only(["disabled", "href"]);
        assert!(filter.matches("disabled"));
        assert!(filter.matches("href"));
        assert!(!filter.matches("class"));
    }

    #[test]
    fn test_filter_serialization() {
        let all: AttributeFilter = serde_json::from_str(r#""all""#).unwrap();
        assert_eq!(all, AttributeFilter::All);
        assert_eq!(serde_json::to_string(&all).unwrap(), r#""all""#);

        let only: AttributeFilter = serde_json::from_str(r#"["href", "disabled"]"#).unwrap();
        assert_eq!(only, AttributeFilter::only(["disabled", "href"]));
        assert_eq!(
            serde_json::to_string(&only).unwrap(),
            r#"["disabled","href"]"#
        );
    }

    #[test]
    fn test_filter_rejects_unknown_keyword() {
        let result: Result<AttributeFilter, _> = serde_json::from_str(r#""some""#);
        assert!(result.is_err());
    }

    #[test]
    fn test_config_defaults_for_missing_fields() {
        let config = GuardConfig::from_json("{}").unwrap();
        assert_eq!(config, GuardConfig::default());

        let config = GuardConfig::from_json(r#"{"maxAttempts": 7}"#).unwrap();
        assert_eq!(config.max_attempts, 7);
        assert_eq!(config.attributes, AttributeFilter::All);
    }

    #[test]
    fn test_registry_config_serialization() {
        let config = RegistryConfig::default().with_audit_mode(true);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(json, r#"{"auditMode":true}"#);
        let parsed: RegistryConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_options_builder_shares_callback() {
        let options = GuardOptions::<()>::new()
            .with_attributes(["disabled"])
            .with_max_attempts(0)
            .on_violation(|_, _| {});
        let copy = options.clone();

        assert_eq!(copy.config.max_attempts, 0);
        assert!(copy.config.attributes.matches("disabled"));
        assert!(Arc::ptr_eq(
            options.on_violation.as_ref().unwrap(),
            copy.on_violation.as_ref().unwrap()
        ));
    }
}

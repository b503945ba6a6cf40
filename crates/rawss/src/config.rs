//! Runtime configuration for a lifecycle controller.
//!
//! Configuration can be loaded from environment variables or constructed
//! programmatically.

use core::time::Duration;
use std::env;

use style_engine::DEFAULT_STYLE_ATTRIBUTE;

/// Runtime configuration for [`crate::Rawss`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawssConfig {
    /// Attribute holding the atomic declarations.
    pub style_attribute: String,
    /// Frame length in milliseconds; mutation bursts inside one frame share a pass.
    pub frame_budget_ms: u64,
    /// Narrows the attribute changes that trigger a pass to these and the
    /// style attribute. Empty means every attribute counts.
    pub observed_attributes: Vec<String>,
    /// Whether to log a telemetry line after every pass.
    pub telemetry_enabled: bool,
}

impl Default for RawssConfig {
    fn default() -> Self {
        Self::new(DEFAULT_STYLE_ATTRIBUTE, 16, false)
    }
}

impl RawssConfig {
    /// Construct a configuration with explicit values.
    ///
    /// The frame budget is clamped to at least 1ms.
    #[must_use]
    pub fn new(style_attribute: &str, frame_budget_ms: u64, telemetry_enabled: bool) -> Self {
        Self {
            style_attribute: style_attribute.to_owned(),
            frame_budget_ms: frame_budget_ms.max(1),
            observed_attributes: Vec::new(),
            telemetry_enabled,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Reads the following environment variables:
    /// - `RAWSS_STYLE_ATTRIBUTE`: attribute to resolve (default: `data-style`)
    /// - `RAWSS_FRAME_BUDGET_MS`: frame budget in milliseconds (default: 16)
    /// - `RAWSS_OBSERVED_ATTRIBUTES`: comma separated attributes to narrow the watch to (default: all)
    /// - `RAWSS_TELEMETRY`: set to "1" to enable telemetry (default: disabled)
    #[must_use]
    pub fn from_env() -> Self {
        let style_attribute = env::var("RAWSS_STYLE_ATTRIBUTE")
            .ok()
            .map(|val| val.trim().to_owned())
            .filter(|val| !val.is_empty())
            .unwrap_or_else(|| DEFAULT_STYLE_ATTRIBUTE.to_owned());
        let frame_budget_ms = env::var("RAWSS_FRAME_BUDGET_MS")
            .ok()
            .and_then(|val| val.trim().parse::<u64>().ok())
            .unwrap_or(16)
            .max(1);
        let observed_attributes = env::var("RAWSS_OBSERVED_ATTRIBUTES")
            .map(|val| parse_attribute_list(&val))
            .unwrap_or_default();
        let telemetry_enabled = env::var("RAWSS_TELEMETRY").ok().as_deref() == Some("1");
        Self {
            style_attribute,
            frame_budget_ms,
            observed_attributes,
            telemetry_enabled,
        }
    }

    /// Narrow the watch to `name` (plus the style attribute and any attribute
    /// already added).
    #[must_use]
    pub fn observe_attribute(mut self, name: &str) -> Self {
        if !self.observed_attributes.iter().any(|observed| observed == name) {
            self.observed_attributes.push(name.to_owned());
        }
        self
    }

    /// Whether a change to attribute `name` triggers a pass.
    pub fn observes(&self, name: &str) -> bool {
        self.observed_attributes.is_empty()
            || name == self.style_attribute
            || self.observed_attributes.iter().any(|observed| observed == name)
    }

    /// The attributes the watch is narrowed to, style attribute first, or
    /// `None` when every attribute counts.
    pub fn attribute_filter(&self) -> Option<Vec<String>> {
        if self.observed_attributes.is_empty() {
            return None;
        }
        let mut names = vec![self.style_attribute.clone()];
        names.extend(
            self.observed_attributes
                .iter()
                .filter(|name| **name != self.style_attribute)
                .cloned(),
        );
        Some(names)
    }

    #[must_use]
    pub const fn frame_budget(&self) -> Duration {
        Duration::from_millis(self.frame_budget_ms)
    }
}

fn parse_attribute_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn budget_is_clamped() {
        assert_eq!(RawssConfig::new("data-style", 0, false).frame_budget_ms, 1);
        assert_eq!(RawssConfig::default().frame_budget(), Duration::from_millis(16));
    }

    #[test]
    fn every_attribute_is_observed_by_default() {
        let config = RawssConfig::default();
        assert!(config.observes("class"));
        assert!(config.observes("title"));
        assert_eq!(config.attribute_filter(), None);
    }

    #[test]
    fn narrowing_keeps_the_style_attribute() {
        let config = RawssConfig::default().observe_attribute("class").observe_attribute("class");
        assert!(config.observes("data-style"));
        assert!(config.observes("class"));
        assert!(!config.observes("id"));
        assert_eq!(
            config.attribute_filter(),
            Some(vec![String::from("data-style"), String::from("class")])
        );
    }

    #[test]
    fn attribute_lists_skip_blanks() {
        assert_eq!(parse_attribute_list(" class, ,theme ,"), vec!["class", "theme"]);
    }
}

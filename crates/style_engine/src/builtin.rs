//! Ready-made processors for the common token shapes.

use std::collections::{HashMap, HashSet};

use anyhow::Error;
use css_style_attr::{AtomicStyle, AtomicStyleRule};
use log::trace;

use crate::host::ElementRef;
use crate::processor::Processor;
use crate::resolved::ResolvedStyle;

/// Only these properties are claimed when a filter is set.
fn claims(filter: Option<&HashSet<String>>, property: &str) -> bool {
    filter.is_none_or(|allowed| allowed.contains(property))
}

/// A fixed token to value dictionary.
///
/// ```
/// use style_engine::TokenTable;
/// let spacing = TokenTable::new("spacing")
///     .token("three-pixels", "3px")
///     .for_properties(["height", "margin"]);
/// # let _ = spacing;
/// ```
#[derive(Clone, Debug, Default)]
pub struct TokenTable {
    name: String,
    tokens: HashMap<String, String>,
    properties: Option<HashSet<String>>,
}

impl TokenTable {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn token(mut self, token: &str, value: &str) -> Self {
        self.tokens.insert(token.to_owned(), value.to_owned());
        self
    }

    /// Restrict the table to the given properties.
    #[must_use]
    pub fn for_properties<'prop>(mut self, properties: impl IntoIterator<Item = &'prop str>) -> Self {
        self.properties
            .get_or_insert_with(HashSet::new)
            .extend(properties.into_iter().map(str::to_owned));
        self
    }

    fn lookup(&self, rule: &AtomicStyleRule) -> Option<&str> {
        if !claims(self.properties.as_ref(), &rule.property) {
            return None;
        }
        self.tokens.get(&rule.value).map(String::as_str)
    }
}

impl Processor for TokenTable {
    fn matches(&self, rule: &AtomicStyleRule) -> bool {
        self.lookup(rule).is_some()
    }

    fn resolve(&self, style: &AtomicStyle, _element: &ElementRef<'_>) -> Result<ResolvedStyle, Error> {
        Ok(style
            .iter()
            .filter_map(|rule| self.lookup(rule).map(|value| (rule.property.as_str(), value)))
            .collect())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Resolves identifier tokens through custom properties: `height: gutter`
/// takes the value of `--gutter` as seen by the element.
#[derive(Clone, Debug)]
pub struct ThemeTokens {
    prefix: String,
    properties: Option<HashSet<String>>,
}

impl Default for ThemeTokens {
    fn default() -> Self {
        Self {
            prefix: String::from("--"),
            properties: None,
        }
    }
}

impl ThemeTokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look tokens up as `<prefix><token>` instead of `--<token>`.
    #[must_use]
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        prefix.clone_into(&mut self.prefix);
        self
    }

    #[must_use]
    pub fn for_properties<'prop>(mut self, properties: impl IntoIterator<Item = &'prop str>) -> Self {
        self.properties
            .get_or_insert_with(HashSet::new)
            .extend(properties.into_iter().map(str::to_owned));
        self
    }
}

/// `four-pixels`, `brand_blue`: starts with a letter, then letters, digits, `-` or `_`.
fn is_identifier_token(token: &str) -> bool {
    let mut chars = token.chars();
    chars.next().is_some_and(|first| first.is_ascii_alphabetic())
        && chars.all(|character| character.is_ascii_alphanumeric() || character == '-' || character == '_')
}

impl Processor for ThemeTokens {
    fn matches(&self, rule: &AtomicStyleRule) -> bool {
        claims(self.properties.as_ref(), &rule.property) && is_identifier_token(&rule.value)
    }

    fn resolve(&self, style: &AtomicStyle, element: &ElementRef<'_>) -> Result<ResolvedStyle, Error> {
        let mut resolved = ResolvedStyle::new();
        for rule in style.iter().filter(|rule| self.matches(rule)) {
            let name = format!("{}{}", self.prefix, rule.value);
            match element.custom_property(&name) {
                Some(value) => resolved.set(&rule.property, &value),
                None => trace!("{name} is not defined for {:?}; leaving {} unresolved", element.node(), rule.property),
            }
        }
        Ok(resolved)
    }

    fn name(&self) -> &str {
        "theme-tokens"
    }
}

#[cfg(test)]
mod tests {
    use super::is_identifier_token;

    #[test]
    fn identifier_tokens() {
        assert!(is_identifier_token("four-pixels"));
        assert!(is_identifier_token("brand_blue2"));
        assert!(!is_identifier_token("100px"));
        assert!(!is_identifier_token("var(--x)"));
        assert!(!is_identifier_token(""));
    }
}

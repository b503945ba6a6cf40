//! Atomic style attributes: `data-style="..."` declaration parsing.
//!
//! An atomic style attribute carries `property: token` pairs separated by
//! semicolons. Tokens are symbolic (`three-pixels`, `accent`) and are only
//! turned into concrete values later by processors, so this module keeps
//! values exactly as written and never validates them against CSS grammar.

#![forbid(unsafe_code)]

use core::fmt;

/// A single declaration parsed from an atomic style attribute.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AtomicStyleRule {
    /// Property name, trimmed of surrounding ASCII whitespace.
    pub property: String,
    /// Token value, trimmed of surrounding ASCII whitespace. May contain spaces or be empty.
    pub value: String,
}

impl AtomicStyleRule {
    /// Build a rule from a property and token.
    pub fn new(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            property: property.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for AtomicStyleRule {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{}: {}", self.property, self.value)
    }
}

/// The per-element token set after override reduction.
///
/// Each property appears at most once; when the source declared a property
/// several times the last declaration wins and keeps its source position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AtomicStyle {
    rules: Vec<AtomicStyleRule>,
}

impl AtomicStyle {
    /// An empty token set.
    pub const fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Reduce an ordered declaration list, keeping only the last occurrence of each property.
    pub fn from_rules(rules: impl IntoIterator<Item = AtomicStyleRule>) -> Self {
        let mut style = Self::new();
        for rule in rules {
            style.insert(rule);
        }
        style
    }

    /// Insert a rule, replacing any earlier declaration of the same property.
    ///
    /// The replacing rule moves to the end so iteration follows the position
    /// of the surviving declaration.
    pub fn insert(&mut self, rule: AtomicStyleRule) {
        if let Some(index) = self
            .rules
            .iter()
            .position(|existing| existing.property == rule.property)
        {
            self.rules.remove(index);
        }
        self.rules.push(rule);
    }

    /// Token for `property`, if declared.
    pub fn get(&self, property: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.property == property)
            .map(|rule| rule.value.as_str())
    }

    pub fn contains(&self, property: &str) -> bool {
        self.get(property).is_some()
    }

    /// Rules in the order of their surviving declarations.
    pub fn iter(&self) -> impl Iterator<Item = &AtomicStyleRule> {
        self.rules.iter()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<'style> IntoIterator for &'style AtomicStyle {
    type Item = &'style AtomicStyleRule;
    type IntoIter = core::slice::Iter<'style, AtomicStyleRule>;

    fn into_iter(self) -> Self::IntoIter {
        self.rules.iter()
    }
}

impl FromIterator<AtomicStyleRule> for AtomicStyle {
    fn from_iter<I: IntoIterator<Item = AtomicStyleRule>>(iter: I) -> Self {
        Self::from_rules(iter)
    }
}

/// Parse an atomic style attribute into its ordered declaration list.
///
/// - Splits on semicolons (`;`) into declaration items.
/// - Skips empty or whitespace-only items.
/// - Splits each item on the first colon (`:`) into property and token.
/// - Trims ASCII whitespace on both sides; names and tokens keep their case.
/// - Skips items without a colon or with an empty property name.
///
/// Skipped items never fail the parse; the remaining declarations are still returned.
pub fn parse_style_attribute(input: &str) -> Vec<AtomicStyleRule> {
    let mut out: Vec<AtomicStyleRule> = Vec::new();
    for raw_item in input.split(';') {
        let item = raw_item.trim_matches(is_ascii_whitespace);
        if item.is_empty() {
            continue;
        }
        let Some((raw_prop, raw_value)) = item.split_once(':') else {
            log::trace!("skipping atomic declaration without ':' separator: {item:?}");
            continue;
        };
        let property_text = raw_prop.trim_matches(is_ascii_whitespace);
        if property_text.is_empty() {
            log::trace!("skipping atomic declaration with empty property: {item:?}");
            continue;
        }
        out.push(AtomicStyleRule::new(
            property_text,
            raw_value.trim_matches(is_ascii_whitespace),
        ));
    }
    out
}

/// Parse an atomic style attribute straight into its reduced token set.
///
/// `"height: 100px; height: four-pixels"` yields `{height: "four-pixels"}`.
pub fn parse_atomic_style(input: &str) -> AtomicStyle {
    AtomicStyle::from_rules(parse_style_attribute(input))
}

/// ASCII whitespace per CSS Syntax (TAB, LF, FF, CR, SPACE).
///
/// Spec: <https://www.w3.org/TR/css-syntax-3/#whitespace>
const fn is_ascii_whitespace(character: char) -> bool {
    matches!(
        character,
        '\u{0009}' | '\u{000A}' | '\u{000C}' | '\u{000D}' | '\u{0020}'
    )
}

//! The document surface a resolution pass reads from and writes to.

use core::fmt;

use anyhow::Error;
use css_style_attr::parse_atomic_style;
use html::{Dom, NodeKey};

/// Tree access needed by the engine.
///
/// The engine reads attributes and custom properties through `&self` while
/// processors run, and only writes inline style properties through
/// [`StyleHost::set_style_property`] once an element's resolution is merged.
pub trait StyleHost {
    /// Whether `node` is known to the host and attached to its document.
    fn contains(&self, node: NodeKey) -> bool;

    /// Element nodes under `root` in depth-first pre-order, `root` included.
    fn element_subtree(&self, root: NodeKey) -> Vec<NodeKey>;

    fn is_inclusive_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool;

    fn attribute(&self, node: NodeKey, name: &str) -> Option<&str>;

    fn style_property(&self, node: NodeKey, property: &str) -> Option<&str>;

    /// Write one inline style property, returning whether the stored value changed.
    ///
    /// # Errors
    /// Returns an error when the host rejects the write (unknown or non-element node).
    fn set_style_property(&mut self, node: NodeKey, property: &str, value: &str) -> Result<bool, Error>;

    /// Value of the custom property `name` (including the leading `--`) as
    /// seen by `node`. Hosts without custom properties report none.
    fn custom_property(&self, _node: NodeKey, _name: &str) -> Option<String> {
        None
    }
}

/// Borrowed view of one element handed to processors.
#[derive(Clone, Copy)]
pub struct ElementRef<'host> {
    host: &'host dyn StyleHost,
    node: NodeKey,
}

impl<'host> ElementRef<'host> {
    pub const fn new(host: &'host dyn StyleHost, node: NodeKey) -> Self {
        Self { host, node }
    }

    pub const fn node(&self) -> NodeKey {
        self.node
    }

    pub fn attribute(&self, name: &str) -> Option<&'host str> {
        self.host.attribute(self.node, name)
    }

    /// Current inline value, i.e. what the previous pass (or the author) left.
    pub fn style_property(&self, property: &str) -> Option<&'host str> {
        self.host.style_property(self.node, property)
    }

    pub fn custom_property(&self, name: &str) -> Option<String> {
        self.host.custom_property(self.node, name)
    }
}

impl fmt::Debug for ElementRef<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("ElementRef")
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// Declaration bodies of a stylesheet with selectors stripped: every
/// `selector { ... }` block contributes its body, bare text is taken as is.
fn sheet_declarations(text: &str) -> impl Iterator<Item = &str> {
    text.split('}')
        .map(|block| block.split_once('{').map_or(block, |(_, body)| body))
}

#[allow(clippy::same_name_method, reason = "forwards to the inherent Dom methods")]
impl StyleHost for Dom {
    fn contains(&self, node: NodeKey) -> bool {
        self.is_connected(node)
    }

    fn element_subtree(&self, root: NodeKey) -> Vec<NodeKey> {
        self.elements_in(root)
    }

    fn is_inclusive_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        Self::is_inclusive_ancestor(self, ancestor, node)
    }

    fn attribute(&self, node: NodeKey, name: &str) -> Option<&str> {
        Self::attribute(self, node, name)
    }

    fn style_property(&self, node: NodeKey, property: &str) -> Option<&str> {
        Self::style_property(self, node, property)
    }

    fn set_style_property(&mut self, node: NodeKey, property: &str, value: &str) -> Result<bool, Error> {
        Self::set_style_property(self, node, property, value)
    }

    /// Inline custom properties on `node` and its ancestors win, nearest
    /// first; otherwise the last loaded stylesheet declaring `name` wins.
    fn custom_property(&self, node: NodeKey, name: &str) -> Option<String> {
        let mut current = Some(node);
        while let Some(key) = current {
            if let Some(value) = Self::style_property(self, key, name) {
                return Some(value.to_owned());
            }
            current = self.parent(key);
        }
        self.loaded_stylesheets()
            .flat_map(sheet_declarations)
            .filter_map(|body| parse_atomic_style(body).get(name).map(str::to_owned))
            .last()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, reason = "tests")]

    use super::*;
    use html::ElementSpec;

    #[test]
    fn sheet_blocks_are_unwrapped() {
        let bodies: Vec<&str> = sheet_declarations(":root { --a: 1px; } .x{--b:2px}").collect();
        assert_eq!(bodies, vec![" --a: 1px; ", "--b:2px", ""]);
    }

    #[test]
    fn nearest_inline_custom_property_wins() {
        let mut dom = Dom::new();
        let outer = dom.insert(dom.body(), ElementSpec::new("section")).unwrap();
        let inner = dom.insert(outer, ElementSpec::new("div")).unwrap();
        dom.set_style_property(dom.body(), "--gap", "1px").unwrap();
        dom.set_style_property(outer, "--gap", "2px").unwrap();
        assert_eq!(StyleHost::custom_property(&dom, inner, "--gap").as_deref(), Some("2px"));
        assert_eq!(StyleHost::custom_property(&dom, dom.head(), "--gap"), None);
    }

    #[test]
    fn later_stylesheets_override_earlier_ones() {
        let mut dom = Dom::new();
        let first = dom
            .insert(dom.head(), ElementSpec::new("link").attr("rel", "stylesheet").attr("href", "a.css"))
            .unwrap();
        let second = dom
            .insert(dom.head(), ElementSpec::new("link").attr("rel", "stylesheet").attr("href", "b.css"))
            .unwrap();
        dom.complete_resource(second, ":root { --size: 2px; }").unwrap();
        dom.complete_resource(first, ":root { --size: 1px; --other: 9px; }").unwrap();
        let body = dom.body();
        assert_eq!(StyleHost::custom_property(&dom, body, "--size").as_deref(), Some("2px"));
        assert_eq!(StyleHost::custom_property(&dom, body, "--other").as_deref(), Some("9px"));
    }
}

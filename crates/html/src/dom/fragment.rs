//! Declarative subtree descriptions used to build nodes in one go.

/// An element to build, with attributes and children.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementSpec {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub children: Vec<NodeSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeSpec {
    Element(ElementSpec),
    Text(String),
}

impl ElementSpec {
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_owned(),
            attrs: Vec::new(),
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attrs.push((name.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn child(mut self, child: impl Into<NodeSpec>) -> Self {
        self.children.push(child.into());
        self
    }

    #[must_use]
    pub fn text(mut self, text: &str) -> Self {
        self.children.push(NodeSpec::Text(text.to_owned()));
        self
    }
}

impl From<ElementSpec> for NodeSpec {
    fn from(element: ElementSpec) -> Self {
        Self::Element(element)
    }
}

impl From<&str> for NodeSpec {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

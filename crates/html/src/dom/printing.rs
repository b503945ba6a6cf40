use core::fmt;

use super::{DOMNode, Dom, NodeKey, NodeKind};

use serde_json::{Map, Value, json};

fn sorted_attrs(node: &DOMNode) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = node.attrs.iter().cloned().collect();
    pairs.sort_by(|left, right| left.0.cmp(&right.0));
    pairs
}

fn node_to_json(dom: &Dom, key: NodeKey) -> Value {
    let Some(node) = dom.node(key) else {
        return Value::Null;
    };
    let children: Vec<Value> = dom
        .children(key)
        .into_iter()
        .map(|child| node_to_json(dom, child))
        .filter(|value| !value.is_null())
        .collect();
    match &node.kind {
        NodeKind::Document => json!({ "type": "document", "children": children }),
        NodeKind::Element { tag } => {
            let mut attrs_obj = Map::new();
            for (name, value) in sorted_attrs(node) {
                attrs_obj.insert(name, Value::String(value));
            }
            let mut style_obj = Map::new();
            for (property, value) in node.inline_style.iter() {
                style_obj.insert(property.clone(), Value::String(value.clone()));
            }
            json!({
                "type": "element",
                "tag": tag,
                "attrs": Value::Object(attrs_obj),
                "style": Value::Object(style_obj),
                "children": children,
            })
        }
        NodeKind::Text { text } => {
            if text.trim().is_empty() {
                Value::Null
            } else {
                json!({ "type": "text", "text": text })
            }
        }
    }
}

fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for character in text.chars() {
        match character {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(character),
        }
    }
    out
}

fn write_indent(formatter: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    for _ in 0..depth {
        formatter.write_str("  ")?;
    }
    Ok(())
}

fn fmt_node(dom: &Dom, key: NodeKey, formatter: &mut fmt::Formatter<'_>, depth: usize) -> fmt::Result {
    let Some(node) = dom.node(key) else {
        return Ok(());
    };
    match &node.kind {
        NodeKind::Document => {
            write_indent(formatter, depth)?;
            writeln!(formatter, "#document")?;
        }
        NodeKind::Element { tag } => {
            write_indent(formatter, depth)?;
            write!(formatter, "<{tag}")?;
            for (name, value) in sorted_attrs(node) {
                write!(formatter, " {name}=\"{}\"", escape_text(&value))?;
            }
            if !node.inline_style.is_empty() {
                write!(formatter, " [style=\"{}\"]", escape_text(&dom.inline_style_text(key)))?;
            }
            writeln!(formatter, ">")?;
        }
        NodeKind::Text { text } => {
            // Whitespace-only text is noise in snapshots.
            if text.chars().all(char::is_whitespace) {
                return Ok(());
            }
            write_indent(formatter, depth)?;
            writeln!(formatter, "\"{}\"", escape_text(text))?;
            return Ok(());
        }
    }
    for child in dom.children(key) {
        fmt_node(dom, child, formatter, depth + 1)?;
    }
    if let NodeKind::Element { tag } = &node.kind {
        write_indent(formatter, depth)?;
        writeln!(formatter, "</{tag}>")?;
    }
    Ok(())
}

impl fmt::Debug for Dom {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(formatter, "DOM")?;
        fmt_node(self, self.document, formatter, 0)
    }
}

impl Dom {
    /// Build a deterministic JSON representation of the subtree at `root`.
    /// Schema:
    /// - Document: { "type":"document", "children":[ ... ] }
    /// - Element: { "type":"element", "tag": "div", "attrs": {..}, "style": {..}, "children":[ ... ] }
    /// - Text: { "type":"text", "text":"..." }
    pub fn to_json_value(&self, root: NodeKey) -> Value {
        node_to_json(self, root)
    }

    /// Pretty JSON string of the whole document for snapshots and test comparisons.
    pub fn to_json_string(&self) -> String {
        serde_json::to_string_pretty(&self.to_json_value(self.document))
            .unwrap_or_else(|_| String::from("{}"))
    }
}

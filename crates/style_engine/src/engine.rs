use core::any::Any;
use std::panic::{self, AssertUnwindSafe};

use css_style_attr::{AtomicStyle, parse_atomic_style};
use html::NodeKey;
use log::{trace, warn};
use tracing::info_span;

use crate::host::{ElementRef, StyleHost};
use crate::processor::ProcessorRef;
use crate::resolved::ResolvedStyle;

pub const DEFAULT_STYLE_ATTRIBUTE: &str = "data-style";

/// A processor error recorded during a pass.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolveFailure {
    pub node: NodeKey,
    pub processor: String,
    pub message: String,
}

/// What one resolution pass did.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Elements walked under the root.
    pub elements_visited: usize,
    /// Elements carrying a non-empty style attribute.
    pub elements_styled: usize,
    /// Elements for which at least one processor produced values.
    pub elements_resolved: usize,
    /// Inline style writes that changed a value.
    pub properties_written: usize,
    pub failures: Vec<ResolveFailure>,
}

impl PassReport {
    pub const fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Resolution pass over the subtree of one root.
#[derive(Clone, Debug)]
pub struct Engine {
    root: NodeKey,
    style_attribute: String,
}

impl Engine {
    /// Engine reading the default `data-style` attribute.
    pub fn create(root: NodeKey) -> Self {
        Self::with_attribute(root, DEFAULT_STYLE_ATTRIBUTE)
    }

    pub fn with_attribute(root: NodeKey, style_attribute: &str) -> Self {
        Self {
            root,
            style_attribute: style_attribute.to_owned(),
        }
    }

    pub const fn root(&self) -> NodeKey {
        self.root
    }

    pub fn style_attribute(&self) -> &str {
        &self.style_attribute
    }

    /// Resolve every element under the root with `processors`, in
    /// registration order, and write the merged values as inline styles.
    pub fn run(&self, host: &mut dyn StyleHost, processors: &[ProcessorRef]) -> PassReport {
        let _span = info_span!("resolution_pass", attribute = %self.style_attribute).entered();
        let mut report = PassReport::default();
        for node in host.element_subtree(self.root) {
            report.elements_visited += 1;
            let Some(style) = self.element_style(&*host, node) else {
                continue;
            };
            report.elements_styled += 1;
            let resolved = resolve_element(&*host, node, &style, processors, &mut report.failures);
            if resolved.is_empty() {
                continue;
            }
            report.elements_resolved += 1;
            for (property, value) in resolved.iter() {
                match host.set_style_property(node, property, value) {
                    Ok(true) => report.properties_written += 1,
                    Ok(false) => {}
                    Err(err) => warn!("could not write {property} on {node:?}: {err}"),
                }
            }
        }
        trace!(
            "pass visited {} elements, wrote {} properties",
            report.elements_visited, report.properties_written
        );
        report
    }

    /// The parsed style attribute of `node`, or `None` when it has nothing to resolve.
    fn element_style(&self, host: &dyn StyleHost, node: NodeKey) -> Option<AtomicStyle> {
        let source = host.attribute(node, &self.style_attribute)?;
        if source.trim().is_empty() {
            return None;
        }
        let style = parse_atomic_style(source);
        (!style.is_empty()).then_some(style)
    }
}

/// Run every processor claiming at least one entry of `style` and merge
/// their outputs, later processors overriding earlier ones. Errors and panics
/// stay with the processor and element they came from.
fn resolve_element(
    host: &dyn StyleHost,
    node: NodeKey,
    style: &AtomicStyle,
    processors: &[ProcessorRef],
    failures: &mut Vec<ResolveFailure>,
) -> ResolvedStyle {
    let element = ElementRef::new(host, node);
    let mut merged = ResolvedStyle::new();
    for processor in processors {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            if style.iter().any(|rule| processor.matches(rule)) {
                processor.resolve(style, &element).map(Some)
            } else {
                Ok(None)
            }
        }));
        let message = match outcome {
            Ok(Ok(Some(resolved))) => {
                merged.merge(resolved);
                continue;
            }
            Ok(Ok(None)) => continue,
            Ok(Err(err)) => format!("{err:#}"),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        warn!("processor {} failed on {node:?}: {message}", processor.name());
        failures.push(ResolveFailure {
            node,
            processor: processor.name().to_owned(),
            message,
        });
    }
    merged
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

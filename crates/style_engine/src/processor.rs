//! The pluggable token translation protocol.

use std::sync::Arc;

use anyhow::Error;
use css_style_attr::{AtomicStyle, AtomicStyleRule};

use crate::host::ElementRef;
use crate::resolved::ResolvedStyle;

/// Translates symbolic tokens into concrete style values.
///
/// `matches` is asked about every entry of an element's style; when it claims
/// at least one, `resolve` runs once for that element with the whole style and
/// returns the properties it sets. Processors are shared between passes and
/// must not keep per-element state.
pub trait Processor: Send + Sync {
    fn matches(&self, rule: &AtomicStyleRule) -> bool;

    /// # Errors
    /// A failure only affects this processor's output for this element.
    fn resolve(&self, style: &AtomicStyle, element: &ElementRef<'_>) -> Result<ResolvedStyle, Error>;

    /// Label used in diagnostics and failure reports.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }
}

pub type ProcessorRef = Arc<dyn Processor>;

/// A processor assembled from a matcher and a resolver closure.
pub struct FnProcessor<M, R> {
    name: String,
    matcher: M,
    resolver: R,
}

impl<M, R> FnProcessor<M, R>
where
    M: Fn(&AtomicStyleRule) -> bool + Send + Sync,
    R: Fn(&AtomicStyle, &ElementRef<'_>) -> Result<ResolvedStyle, Error> + Send + Sync,
{
    pub fn new(name: &str, matcher: M, resolver: R) -> Self {
        Self {
            name: name.to_owned(),
            matcher,
            resolver,
        }
    }
}

impl<M, R> core::fmt::Debug for FnProcessor<M, R> {
    fn fmt(&self, formatter: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        formatter
            .debug_struct("FnProcessor")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl<M, R> Processor for FnProcessor<M, R>
where
    M: Fn(&AtomicStyleRule) -> bool + Send + Sync,
    R: Fn(&AtomicStyle, &ElementRef<'_>) -> Result<ResolvedStyle, Error> + Send + Sync,
{
    fn matches(&self, rule: &AtomicStyleRule) -> bool {
        (self.matcher)(rule)
    }

    fn resolve(&self, style: &AtomicStyle, element: &ElementRef<'_>) -> Result<ResolvedStyle, Error> {
        (self.resolver)(style, element)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Build a shareable processor from a matcher and a resolver.
pub fn create_style_resolver<M, R>(matcher: M, resolver: R) -> ProcessorRef
where
    M: Fn(&AtomicStyleRule) -> bool + Send + Sync + 'static,
    R: Fn(&AtomicStyle, &ElementRef<'_>) -> Result<ResolvedStyle, Error> + Send + Sync + 'static,
{
    Arc::new(FnProcessor::new("style-resolver", matcher, resolver))
}

//! Atomic style resolution.
//!
//! Elements carry symbolic declarations in a style attribute
//! (`data-style="height: three-pixels"`). A resolution pass walks a subtree,
//! parses each attribute into an [`AtomicStyle`], lets every registered
//! [`Processor`] that claims at least one entry translate the tokens into
//! concrete values, and writes the merged result onto the element's inline
//! style through a [`StyleHost`].

#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]

mod builtin;
mod engine;
mod host;
mod processor;
mod resolved;

pub use builtin::{ThemeTokens, TokenTable};
pub use css_style_attr::{AtomicStyle, AtomicStyleRule, parse_atomic_style};
pub use engine::{DEFAULT_STYLE_ATTRIBUTE, Engine, PassReport, ResolveFailure};
pub use host::{ElementRef, StyleHost};
pub use processor::{FnProcessor, Processor, ProcessorRef, create_style_resolver};
pub use resolved::ResolvedStyle;

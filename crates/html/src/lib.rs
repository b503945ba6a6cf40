//! Host document for atomic style resolution.
//!
//! The [`dom::Dom`] owns the node tree, attributes and inline styles, and
//! announces every mutation as a [`dom::DOMUpdate`] batch. Linked stylesheets
//! are tracked as loadable resources in [`resources`].

#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]

pub mod dom;
pub mod resources;

pub use dom::{DOMMirror, DOMNode, DOMSubscriber, DOMUpdate, Dom, ElementSpec, NodeKey, NodeKind, NodeSpec};
pub use resources::LoadState;

//! Lifecycle controller for atomic style resolution.
//!
//! [`create_rawss`] binds a [`Rawss`] controller to a root element of a
//! host document. Processors registered with [`Rawss::add`] translate the
//! symbolic tokens found in the style attribute. The controller can run a
//! single pass ([`Rawss::once`]), keep the subtree resolved while it changes
//! ([`Rawss::start`] / [`Rawss::pause`]), or wait for linked style resources
//! before resolving ([`Rawss::settle`]).

#![allow(
    clippy::missing_docs_in_private_items,
    reason = "Internal implementation details don't need public documentation"
)]
#![allow(
    clippy::missing_inline_in_public_items,
    reason = "Inlining decisions left to compiler for this crate"
)]

pub mod config;
mod controller;
mod host;
pub mod observer;
pub mod scheduler;
pub mod telemetry;

pub use config::RawssConfig;
pub use controller::{LifecycleState, Rawss, SharedHost, create_rawss};
pub use host::RawssHost;
pub use scheduler::{FrameClock, FrameScheduler};
pub use style_engine::{
    AtomicStyle, AtomicStyleRule, ElementRef, PassReport, Processor, ProcessorRef, ResolvedStyle, ThemeTokens,
    TokenTable, create_style_resolver,
};
pub use telemetry::{PassCounters, PassTrigger};

//! # Domain Layer - Dispatch Core
//!
//! ## Components
//!
//! - `event`: `DispatchEvent` trait and the immutable `Event<E>` envelope
//! - `subscription`: Subscription lifecycle, options and handles
//! - `registry`: Priority-ordered, copy-on-read subscription registry
//! - `interceptor`: Before/after hook chain
//! - `statistics`: Per-kind counters and snapshots
//! - `outcome`: Publish outcomes and delivery reports
//! - `errors`: Error enumerations

pub mod errors;
pub mod event;
pub mod interceptor;
pub mod outcome;
pub mod registry;
pub mod statistics;
pub mod subscription;

pub use errors::*;
pub use event::*;
pub use interceptor::*;
pub use outcome::*;
pub use registry::*;
pub use statistics::*;
pub use subscription::*;

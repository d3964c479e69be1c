//! Ports of the dispatch core.
//!
//! - `inbound`: the API host code drives (`EventDispatcherApi`)
//! - `outbound`: what host code plugs in (`Interceptor`, `TimeSource`)

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;

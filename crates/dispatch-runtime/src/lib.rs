//! # Dispatch Runtime Library
//!
//! Exposes the composition root for testing. The main entry point is the
//! `main.rs` binary.
//!
//! ## Modules
//!
//! - `events` - Session event sum type and its kind tag
//! - `handlers` - Subscribers and the maintenance gate interceptor
//! - `container` - Builds the dispatcher and wires everything to it
//!
//! ## Flow
//!
//! ```text
//! publish(SessionEvent)
//!     │
//!     ├─ tracing ─→ metrics ─→ maintenance gate ──Abort (Sync in maintenance)
//!     │
//!     ├─ Login/Logout ─→ audit (100) ─→ sessions (10)
//!     ├─ Sync         ─→ ledger [completed] , notifier [failed, remove on error]
//!     └─ Heartbeat    ─→ monitor [expires after heartbeat_window]
//! ```

pub mod container;
pub mod events;
pub mod handlers;

pub use container::{DispatchContainer, RuntimeConfig, RuntimeError};
pub use events::{SessionEvent, SessionEventKind, SyncStatus};

//! Session events published by the runtime.

use dispatch_bus::DispatchEvent;
use serde::{Deserialize, Serialize};

/// Dispatch key for [`SessionEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionEventKind {
    Login,
    Logout,
    Sync,
    Heartbeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncStatus {
    Started,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEvent {
    Login { user: String },
    Logout { user: String },
    Sync { status: SyncStatus, items: u32 },
    Heartbeat { sequence: u64 },
}

impl SessionEvent {
    pub fn login(user: impl Into<String>) -> Self {
        Self::Login { user: user.into() }
    }

    pub fn logout(user: impl Into<String>) -> Self {
        Self::Logout { user: user.into() }
    }

    pub fn sync(status: SyncStatus, items: u32) -> Self {
        Self::Sync { status, items }
    }
}

impl DispatchEvent for SessionEvent {
    type Kind = SessionEventKind;

    fn kind(&self) -> SessionEventKind {
        match self {
            Self::Login { .. } => SessionEventKind::Login,
            Self::Logout { .. } => SessionEventKind::Logout,
            Self::Sync { .. } => SessionEventKind::Sync,
            Self::Heartbeat { .. } => SessionEventKind::Heartbeat,
        }
    }
}

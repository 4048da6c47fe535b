//! Core types for the freeLynk sync layer
//!
//! This module defines the fundamental identifier and time types used
//! throughout the layer, using newtype patterns for type safety.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// User Identifier
// ----------------------------------------------------------------------------

/// Unique identifier for a user profile row in the remote store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Create a new UserId from a UUID
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    /// Mint a fresh random UserId (test fixtures, local identities)
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ----------------------------------------------------------------------------
// Record Identifier
// ----------------------------------------------------------------------------

/// Counter for locally minted record ids. Process-wide and monotonic, so
/// two optimistic records can never share an id.
static LOCAL_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Identifier for a mirrored record.
///
/// `Server` ids are assigned by the remote store; `Local` ids are minted
/// for optimistic records that have not been acknowledged yet. The two
/// variants can never compare equal, which is what makes optimistic
/// purging and feed-event dedup safe under arrival races.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordId {
    /// Authoritative id assigned by the remote store
    Server(Uuid),
    /// Tentative id minted locally for an unacknowledged record
    Local(u64),
}

impl RecordId {
    /// Mint a fresh tentative id for an optimistic record
    pub fn next_local() -> Self {
        Self::Local(LOCAL_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Whether this id is a locally minted tentative id
    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }

    /// The server UUID, if this record has been acknowledged
    pub fn server_uuid(&self) -> Option<&Uuid> {
        match self {
            Self::Server(id) => Some(id),
            Self::Local(_) => None,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{}", id),
            Self::Local(n) => write!(f, "local-{}", n),
        }
    }
}

impl From<Uuid> for RecordId {
    fn from(id: Uuid) -> Self {
        Self::Server(id)
    }
}

// ----------------------------------------------------------------------------
// Timestamp
// ----------------------------------------------------------------------------

/// Milliseconds since the Unix epoch
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Create a timestamp from raw milliseconds
    pub fn from_millis(millis: u64) -> Self {
        Self(millis)
    }

    /// Current wall-clock time
    pub fn now() -> Self {
        Self(
            SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_millis() as u64,
        )
    }

    /// Raw milliseconds since epoch
    pub fn as_millis(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

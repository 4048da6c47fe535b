//! Optimistic Send Tracking
//!
//! Tracks locally inserted, tentatively-ID'd records between the moment
//! the user acts and the moment the remote write resolves. Whichever of
//! the success callback or the canonical feed event arrives first, the
//! optimistic record is purged exactly once; the final state always
//! holds exactly one record per send.

use std::collections::HashMap;

use freelynk_core::{RecordId, Timestamp, UserId};

// ----------------------------------------------------------------------------
// Pending Sends
// ----------------------------------------------------------------------------

/// Resolution state of one optimistic send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingStatus {
    /// Remote write issued, outcome unknown
    InFlight,
    /// Remote write acknowledged; canonical row is (or will be) mirrored
    Confirmed,
    /// Remote write failed; optimistic record rolled back
    Failed,
}

/// One tracked optimistic record
#[derive(Debug, Clone)]
pub struct PendingSend {
    /// Tentative local id of the optimistic record
    pub local_id: RecordId,
    /// Conversation counterpart the send belongs to
    pub receiver: UserId,
    pub status: PendingStatus,
    pub created_at: Timestamp,
}

// ----------------------------------------------------------------------------
// Pending Tracker
// ----------------------------------------------------------------------------

/// Tracks optimistic sends awaiting their remote outcome
#[derive(Debug, Default)]
pub struct PendingTracker {
    pending: HashMap<RecordId, PendingSend>,
}

impl PendingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start tracking an optimistic record. The id must be a tentative
    /// local id; server ids are never tracked.
    pub fn track(&mut self, local_id: RecordId, receiver: UserId) -> &PendingSend {
        debug_assert!(local_id.is_local());
        self.pending.insert(
            local_id,
            PendingSend {
                local_id,
                receiver,
                status: PendingStatus::InFlight,
                created_at: Timestamp::now(),
            },
        );
        self.pending
            .get(&local_id)
            .expect("send must exist as it was just inserted")
    }

    /// Mark a send as confirmed by the remote store
    pub fn mark_confirmed(&mut self, local_id: &RecordId) -> bool {
        if let Some(send) = self.pending.get_mut(local_id) {
            send.status = PendingStatus::Confirmed;
            true
        } else {
            false
        }
    }

    /// Mark a send as failed
    pub fn mark_failed(&mut self, local_id: &RecordId) -> bool {
        if let Some(send) = self.pending.get_mut(local_id) {
            send.status = PendingStatus::Failed;
            true
        } else {
            false
        }
    }

    /// Get a tracked send
    pub fn get(&self, local_id: &RecordId) -> Option<&PendingSend> {
        self.pending.get(local_id)
    }

    /// Remove a tracked send once its optimistic record has been purged
    /// from local state
    pub fn purge(&mut self, local_id: &RecordId) -> Option<PendingSend> {
        self.pending.remove(local_id)
    }

    /// Drop every resolved entry, keeping only in-flight sends
    pub fn purge_resolved(&mut self) {
        self.pending
            .retain(|_, send| send.status == PendingStatus::InFlight);
    }

    /// Number of sends still awaiting an outcome
    pub fn in_flight_count(&self) -> usize {
        self.pending
            .values()
            .filter(|send| send.status == PendingStatus::InFlight)
            .count()
    }

    /// Total tracked sends
    pub fn tracked_count(&self) -> usize {
        self.pending.len()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_and_confirm() {
        let mut tracker = PendingTracker::new();
        let local_id = RecordId::next_local();
        let receiver = UserId::random();

        let send = tracker.track(local_id, receiver);
        assert_eq!(send.status, PendingStatus::InFlight);
        assert_eq!(tracker.in_flight_count(), 1);

        assert!(tracker.mark_confirmed(&local_id));
        assert_eq!(tracker.get(&local_id).unwrap().status, PendingStatus::Confirmed);
        assert_eq!(tracker.in_flight_count(), 0);
    }

    #[test]
    fn test_mark_unknown_send_is_false() {
        let mut tracker = PendingTracker::new();
        assert!(!tracker.mark_confirmed(&RecordId::next_local()));
        assert!(!tracker.mark_failed(&RecordId::next_local()));
    }

    #[test]
    fn test_purge_resolved_keeps_in_flight() {
        let mut tracker = PendingTracker::new();
        let receiver = UserId::random();

        let confirmed = RecordId::next_local();
        let failed = RecordId::next_local();
        let in_flight = RecordId::next_local();
        tracker.track(confirmed, receiver);
        tracker.track(failed, receiver);
        tracker.track(in_flight, receiver);

        tracker.mark_confirmed(&confirmed);
        tracker.mark_failed(&failed);
        tracker.purge_resolved();

        assert_eq!(tracker.tracked_count(), 1);
        assert!(tracker.get(&in_flight).is_some());
    }
}

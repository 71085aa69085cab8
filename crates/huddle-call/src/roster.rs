//! Room membership as reported by the relay.
//!
//! Translates `user_joined`, `user_left` and `participants` envelopes into
//! membership changes. The local participant is never part of the tracked
//! set.

use std::collections::BTreeSet;

use huddle_common::{ParticipantId, SignalingEnvelope};
use tracing::{debug, info};

/// What one roster envelope changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterUpdate {
    /// Newly observed participants.
    pub added: Vec<ParticipantId>,
    /// Participants whose sessions must be torn down.
    pub removed: Vec<ParticipantId>,
    /// Participants that must have a session, whether or not they are new.
    pub present: Vec<ParticipantId>,
}

impl RosterUpdate {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.present.is_empty()
    }
}

#[derive(Debug)]
pub struct RoomRoster {
    local: ParticipantId,
    members: BTreeSet<ParticipantId>,
}

impl RoomRoster {
    pub fn new(local: ParticipantId) -> Self {
        Self {
            local,
            members: BTreeSet::new(),
        }
    }

    /// Apply a roster envelope. Non-roster envelopes yield an empty update.
    pub fn apply(&mut self, envelope: &SignalingEnvelope) -> RosterUpdate {
        match envelope {
            SignalingEnvelope::UserJoined { user_id, .. } => self.joined(user_id),
            SignalingEnvelope::UserLeft { user_id, .. } => self.left(user_id),
            SignalingEnvelope::Participants { participants } => self.replace(participants),
            _ => RosterUpdate::default(),
        }
    }

    fn joined(&mut self, id: &ParticipantId) -> RosterUpdate {
        if *id == self.local {
            debug!("ignoring echo of own join");
            return RosterUpdate::default();
        }
        let mut update = RosterUpdate {
            present: vec![id.clone()],
            ..RosterUpdate::default()
        };
        if self.members.insert(id.clone()) {
            info!(participant = %id, "participant joined");
            update.added.push(id.clone());
        }
        update
    }

    /// Removal is signalled even for unknown IDs; teardown is a no-op then.
    fn left(&mut self, id: &ParticipantId) -> RosterUpdate {
        if *id == self.local {
            return RosterUpdate::default();
        }
        if self.members.remove(id) {
            info!(participant = %id, "participant left");
        }
        RosterUpdate {
            removed: vec![id.clone()],
            ..RosterUpdate::default()
        }
    }

    /// A snapshot replaces the set wholesale.
    fn replace(&mut self, snapshot: &[ParticipantId]) -> RosterUpdate {
        let next: BTreeSet<ParticipantId> = snapshot
            .iter()
            .filter(|id| **id != self.local)
            .cloned()
            .collect();

        let update = RosterUpdate {
            added: next.difference(&self.members).cloned().collect(),
            removed: self.members.difference(&next).cloned().collect(),
            present: next.iter().cloned().collect(),
        };
        info!(
            members = next.len(),
            added = update.added.len(),
            removed = update.removed.len(),
            "roster snapshot applied"
        );
        self.members = next;
        update
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.members.contains(id)
    }

    /// Current remote members, sorted.
    pub fn members(&self) -> Vec<ParticipantId> {
        self.members.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn local(&self) -> &ParticipantId {
        &self.local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(names: &[&str]) -> Vec<ParticipantId> {
        names.iter().map(|n| ParticipantId::new(*n)).collect()
    }

    fn joined(id: &str) -> SignalingEnvelope {
        SignalingEnvelope::UserJoined {
            user_id: id.into(),
            room_id: None,
        }
    }

    fn left(id: &str) -> SignalingEnvelope {
        SignalingEnvelope::UserLeft {
            user_id: id.into(),
            room_id: None,
        }
    }

    fn snapshot(names: &[&str]) -> SignalingEnvelope {
        SignalingEnvelope::Participants {
            participants: ids(names),
        }
    }

    #[test]
    fn join_adds_and_marks_present() {
        let mut roster = RoomRoster::new("a".into());
        let update = roster.apply(&joined("b"));
        assert_eq!(update.added, ids(&["b"]));
        assert_eq!(update.present, ids(&["b"]));
        assert!(roster.contains(&"b".into()));
    }

    #[test]
    fn repeated_join_is_present_but_not_added() {
        let mut roster = RoomRoster::new("a".into());
        roster.apply(&joined("b"));
        let update = roster.apply(&joined("b"));
        assert!(update.added.is_empty());
        assert_eq!(update.present, ids(&["b"]));
    }

    #[test]
    fn own_join_is_suppressed() {
        let mut roster = RoomRoster::new("a".into());
        let update = roster.apply(&joined("a"));
        assert!(update.is_empty());
        assert!(roster.is_empty());
    }

    #[test]
    fn leave_of_unknown_still_signals_removal() {
        let mut roster = RoomRoster::new("a".into());
        let update = roster.apply(&left("ghost"));
        assert_eq!(update.removed, ids(&["ghost"]));
        assert!(roster.is_empty());
    }

    #[test]
    fn snapshot_excludes_local_participant() {
        let mut roster = RoomRoster::new("a".into());
        let update = roster.apply(&snapshot(&["a", "b", "c"]));
        assert_eq!(roster.members(), ids(&["b", "c"]));
        assert_eq!(update.present, ids(&["b", "c"]));
    }

    #[test]
    fn snapshot_reports_only_real_changes_as_added() {
        let mut roster = RoomRoster::new("a".into());
        roster.apply(&joined("b"));
        let update = roster.apply(&snapshot(&["a", "b", "c"]));
        assert_eq!(update.added, ids(&["c"]));
        assert!(update.removed.is_empty());
        // b still needs a session ensured even though it is not new.
        assert_eq!(update.present, ids(&["b", "c"]));
    }

    #[test]
    fn snapshot_removes_missing_members() {
        let mut roster = RoomRoster::new("a".into());
        roster.apply(&snapshot(&["b", "c", "d"]));
        let update = roster.apply(&snapshot(&["c"]));
        assert_eq!(update.removed, ids(&["b", "d"]));
        assert_eq!(roster.members(), ids(&["c"]));
    }

    #[test]
    fn roster_equals_latest_snapshot_regardless_of_history() {
        let sequences: Vec<Vec<SignalingEnvelope>> = vec![
            vec![joined("x"), snapshot(&["b", "c"]), left("b"), joined("y")],
            vec![snapshot(&["q"]), left("q"), joined("z"), joined("b")],
            vec![left("c"), joined("c"), joined("d"), snapshot(&[])],
        ];
        for events in sequences {
            let mut roster = RoomRoster::new("a".into());
            for e in &events {
                roster.apply(e);
            }
            let last = ids(&["b", "c", "e"]);
            roster.apply(&snapshot(&["e", "c", "b", "a"]));
            assert_eq!(roster.members(), last);
        }
    }

    #[test]
    fn non_roster_envelopes_are_ignored() {
        let mut roster = RoomRoster::new("a".into());
        let update = roster.apply(&SignalingEnvelope::Unknown);
        assert!(update.is_empty());
    }
}

use std::collections::HashMap;

use tracing::debug;

use super::types::{ConnectionId, Participant, epoch_millis};

/// Authoritative store of participant records, with a secondary index from
/// external id to connection id for identity-targeted lookups.
///
/// No method fails; absence is an `Option` and callers decide whether that
/// is an error.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<ConnectionId, Participant>,
    by_external_id: HashMap<String, ConnectionId>,
}

impl ParticipantRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a participant, webcam off, stamped with the current time.
    /// A reused connection id or external id overwrites the prior mapping;
    /// the previously mapped connection keeps its record but is no longer
    /// reachable through the identity index.
    pub fn add(
        &mut self,
        connection_id: ConnectionId,
        external_id: String,
        display_name: String,
        room_id: String,
    ) -> Participant {
        let participant = Participant {
            connection_id,
            external_id: external_id.clone(),
            display_name,
            room_id,
            webcam_active: false,
            connected_at: epoch_millis(),
        };

        self.participants.insert(connection_id, participant.clone());
        self.by_external_id.insert(external_id, connection_id);

        debug!(
            "Registered participant {} as {}",
            participant.display_name, connection_id
        );
        participant
    }

    /// Remove a participant, returning the record for leave notifications.
    /// The identity index entry is dropped only if it still points at this
    /// connection, so a superseding registration survives the orphan's
    /// removal.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<Participant> {
        let participant = self.participants.remove(&connection_id)?;
        if self.by_external_id.get(&participant.external_id) == Some(&connection_id) {
            self.by_external_id.remove(&participant.external_id);
        }
        debug!(
            "Removed participant {} ({})",
            participant.display_name, connection_id
        );
        Some(participant)
    }

    pub fn get(&self, connection_id: ConnectionId) -> Option<&Participant> {
        self.participants.get(&connection_id)
    }

    /// Resolve through the identity index; none if unmapped or if the mapped
    /// connection was since removed.
    pub fn get_by_external_id(&self, external_id: &str) -> Option<&Participant> {
        let connection_id = self.by_external_id.get(external_id)?;
        self.participants.get(connection_id)
    }

    /// In-place webcam flag update; no-op if the connection is unregistered.
    pub fn set_webcam_active(&mut self, connection_id: ConnectionId, active: bool) {
        if let Some(participant) = self.participants.get_mut(&connection_id) {
            participant.webcam_active = active;
        }
    }

    /// Unordered snapshot of all participants.
    pub fn list_all(&self) -> Vec<&Participant> {
        self.participants.values().collect()
    }

    /// Participants whose stored room id matches, unordered.
    pub fn list_in_room(&self, room_id: &str) -> Vec<&Participant> {
        self.participants
            .values()
            .filter(|p| p.room_id == room_id)
            .collect()
    }

}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    fn add(reg: &mut ParticipantRegistry, c: &str, ext: &str, name: &str, room: &str) {
        reg.add(conn(c), ext.to_string(), name.to_string(), room.to_string());
    }

    #[test]
    fn add_defaults_webcam_off() {
        let mut reg = ParticipantRegistry::new();
        let p = reg.add(
            conn("conn_aaaa0001"),
            "u1".to_string(),
            "Alex".to_string(),
            "default".to_string(),
        );
        assert!(!p.webcam_active);
        assert!(p.connected_at > 0);
    }

    #[test]
    fn get_roundtrip() {
        let mut reg = ParticipantRegistry::new();
        add(&mut reg, "conn_aaaa0001", "u1", "Alex", "r");
        let p = reg.get(conn("conn_aaaa0001")).unwrap();
        assert_eq!(p.external_id, "u1");
        assert!(reg.get(conn("conn_bbbb0002")).is_none());
    }

    #[test]
    fn remove_returns_record_and_clears_index() {
        let mut reg = ParticipantRegistry::new();
        add(&mut reg, "conn_aaaa0001", "u1", "Alex", "r");
        let removed = reg.remove(conn("conn_aaaa0001")).unwrap();
        assert_eq!(removed.display_name, "Alex");
        assert!(reg.get(conn("conn_aaaa0001")).is_none());
        assert!(reg.get_by_external_id("u1").is_none());
        assert!(reg.remove(conn("conn_aaaa0001")).is_none());
    }

    #[test]
    fn external_id_resolves_through_index() {
        let mut reg = ParticipantRegistry::new();
        add(&mut reg, "conn_aaaa0001", "u1", "Alex", "r");
        let p = reg.get_by_external_id("u1").unwrap();
        assert_eq!(p.connection_id, conn("conn_aaaa0001"));
        assert!(reg.get_by_external_id("u2").is_none());
    }

    #[test]
    fn second_registration_supersedes_index() {
        let mut reg = ParticipantRegistry::new();
        add(&mut reg, "conn_aaaa0001", "u1", "Alex", "r");
        add(&mut reg, "conn_bbbb0002", "u1", "Alex", "r");

        // identity now resolves to the new connection only
        let p = reg.get_by_external_id("u1").unwrap();
        assert_eq!(p.connection_id, conn("conn_bbbb0002"));

        // the orphaned record is still present under its connection id
        assert!(reg.get(conn("conn_aaaa0001")).is_some());
    }

    #[test]
    fn orphan_removal_keeps_superseding_mapping() {
        let mut reg = ParticipantRegistry::new();
        add(&mut reg, "conn_aaaa0001", "u1", "Alex", "r");
        add(&mut reg, "conn_bbbb0002", "u1", "Alex", "r");

        reg.remove(conn("conn_aaaa0001"));
        let p = reg.get_by_external_id("u1").unwrap();
        assert_eq!(p.connection_id, conn("conn_bbbb0002"));
    }

    #[test]
    fn set_webcam_active_mutates_in_place() {
        let mut reg = ParticipantRegistry::new();
        add(&mut reg, "conn_aaaa0001", "u1", "Alex", "r");
        reg.set_webcam_active(conn("conn_aaaa0001"), true);
        assert!(reg.get(conn("conn_aaaa0001")).unwrap().webcam_active);
    }

    #[test]
    fn set_webcam_active_unregistered_is_noop() {
        let mut reg = ParticipantRegistry::new();
        reg.set_webcam_active(conn("conn_aaaa0001"), true);
        assert!(reg.list_all().is_empty());
    }

    #[test]
    fn list_in_room_filters_by_room_field() {
        let mut reg = ParticipantRegistry::new();
        add(&mut reg, "conn_aaaa0001", "u1", "Alex", "lobby");
        add(&mut reg, "conn_bbbb0002", "u2", "Blake", "lobby");
        add(&mut reg, "conn_cccc0003", "u3", "Casey", "arena");

        let lobby = reg.list_in_room("lobby");
        assert_eq!(lobby.len(), 2);
        assert!(lobby.iter().all(|p| p.room_id == "lobby"));
        assert_eq!(reg.list_in_room("nowhere").len(), 0);
        assert_eq!(reg.list_all().len(), 3);
    }
}

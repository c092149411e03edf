use std::collections::{HashMap, HashSet};

use tracing::info;

use super::types::{ConnectionId, RoomInfo, epoch_millis};

#[derive(Debug)]
struct RoomState {
    members: HashSet<ConnectionId>,
    created_at: u64,
}

/// Room membership store. Membership is one relation kept under two indexes
/// updated together: a forward map of room id to member set and a reverse
/// map of connection id to room id, so the two views cannot diverge and
/// lookups by connection are constant-time.
///
/// A room exists iff its member set is non-empty; the last member leaving
/// destroys it.
#[derive(Debug, Default)]
pub struct RoomDirectory {
    rooms: HashMap<String, RoomState>,
    membership: HashMap<ConnectionId, String>,
}

impl RoomDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn get_or_create(&mut self, room_id: &str) -> &mut RoomState {
        self.rooms.entry(room_id.to_string()).or_insert_with(|| {
            info!("Room created: {}", room_id);
            RoomState {
                members: HashSet::new(),
                created_at: epoch_millis(),
            }
        })
    }

    /// Insert the connection into the room, creating the room lazily.
    /// Idempotent if already a member; if the connection was in a different
    /// room it is moved there, keeping the one-room-per-connection
    /// invariant.
    pub fn add_member(&mut self, room_id: &str, connection_id: ConnectionId) {
        if let Some(current) = self.membership.get(&connection_id) {
            if current == room_id {
                return;
            }
            self.remove_member(connection_id);
        }

        self.get_or_create(room_id).members.insert(connection_id);
        self.membership
            .insert(connection_id, room_id.to_string());
    }

    /// Remove the connection from its room, destroying the room if it is now
    /// empty. Returns the room it was removed from, or none if the
    /// connection was in no room.
    pub fn remove_member(&mut self, connection_id: ConnectionId) -> Option<String> {
        let room_id = self.membership.remove(&connection_id)?;
        if let Some(room) = self.rooms.get_mut(&room_id) {
            room.members.remove(&connection_id);
            if room.members.is_empty() {
                self.rooms.remove(&room_id);
                info!("Room {} removed (empty)", room_id);
            }
        }
        Some(room_id)
    }

    /// Member connection ids, empty if the room does not exist.
    pub fn members_of(&self, room_id: &str) -> Vec<ConnectionId> {
        self.rooms
            .get(room_id)
            .map(|room| room.members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn room_of(&self, connection_id: ConnectionId) -> Option<&str> {
        self.membership.get(&connection_id).map(String::as_str)
    }

    /// Reporting snapshot of all rooms.
    pub fn list_rooms(&self) -> Vec<RoomInfo> {
        self.rooms
            .iter()
            .map(|(id, room)| RoomInfo {
                id: id.clone(),
                member_count: room.members.len(),
                created_at: room.created_at,
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn(s: &str) -> ConnectionId {
        ConnectionId::from(s)
    }

    #[test]
    fn add_member_creates_room_lazily() {
        let mut dir = RoomDirectory::new();
        assert_eq!(dir.len(), 0);
        dir.add_member("lobby", conn("conn_aaaa0001"));
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.members_of("lobby"), vec![conn("conn_aaaa0001")]);
        assert_eq!(dir.room_of(conn("conn_aaaa0001")), Some("lobby"));
    }

    #[test]
    fn add_member_is_idempotent() {
        let mut dir = RoomDirectory::new();
        dir.add_member("lobby", conn("conn_aaaa0001"));
        dir.add_member("lobby", conn("conn_aaaa0001"));
        assert_eq!(dir.members_of("lobby").len(), 1);
    }

    #[test]
    fn add_member_moves_between_rooms() {
        let mut dir = RoomDirectory::new();
        dir.add_member("lobby", conn("conn_aaaa0001"));
        dir.add_member("arena", conn("conn_aaaa0001"));

        assert_eq!(dir.room_of(conn("conn_aaaa0001")), Some("arena"));
        // lobby emptied out and was destroyed
        assert_eq!(dir.members_of("lobby").len(), 0);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn last_member_leaving_destroys_room() {
        let mut dir = RoomDirectory::new();
        dir.add_member("lobby", conn("conn_aaaa0001"));
        let removed_from = dir.remove_member(conn("conn_aaaa0001"));
        assert_eq!(removed_from.as_deref(), Some("lobby"));
        assert_eq!(dir.len(), 0);
        assert!(dir.list_rooms().is_empty());
    }

    #[test]
    fn room_survives_while_members_remain() {
        let mut dir = RoomDirectory::new();
        dir.add_member("lobby", conn("conn_aaaa0001"));
        dir.add_member("lobby", conn("conn_bbbb0002"));
        dir.remove_member(conn("conn_aaaa0001"));

        assert_eq!(dir.members_of("lobby"), vec![conn("conn_bbbb0002")]);
        assert_eq!(dir.room_of(conn("conn_aaaa0001")), None);
    }

    #[test]
    fn remove_unknown_member_leaves_rooms_unchanged() {
        let mut dir = RoomDirectory::new();
        dir.add_member("lobby", conn("conn_aaaa0001"));
        assert_eq!(dir.remove_member(conn("conn_zzzz9999")), None);
        assert_eq!(dir.members_of("lobby").len(), 1);
        assert_eq!(dir.len(), 1);
    }

    #[test]
    fn members_of_unknown_room_is_empty() {
        let dir = RoomDirectory::new();
        assert!(dir.members_of("nowhere").is_empty());
    }

    #[test]
    fn list_rooms_reports_counts() {
        let mut dir = RoomDirectory::new();
        dir.add_member("lobby", conn("conn_aaaa0001"));
        dir.add_member("lobby", conn("conn_bbbb0002"));
        dir.add_member("arena", conn("conn_cccc0003"));

        let mut rooms = dir.list_rooms();
        rooms.sort_by(|a, b| a.id.cmp(&b.id));
        assert_eq!(rooms.len(), 2);
        assert_eq!(rooms[0].id, "arena");
        assert_eq!(rooms[0].member_count, 1);
        assert_eq!(rooms[1].id, "lobby");
        assert_eq!(rooms[1].member_count, 2);
        assert!(rooms.iter().all(|r| r.created_at > 0));
    }
}

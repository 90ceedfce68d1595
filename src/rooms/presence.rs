use serde::Serialize;

use crate::{ConnectionId, Token, activity::ActivityTracker, identity::IdentityRegistry};

use super::Room;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub connection_id: ConnectionId,
    pub name: String,
    pub idle: bool,
    pub token: Option<Token>,
}

impl Room {
    /// Recomputed on every call; idle flags are never cached, so a
    /// participant only turns idle in the eyes of others when something
    /// else causes a broadcast.
    pub fn participants(
        &self,
        identities: &IdentityRegistry,
        activity: &ActivityTracker,
        now_ms: i64,
        idle_threshold_ms: i64,
    ) -> Vec<Participant> {
        self.members
            .iter()
            .map(|(conn, name)| Participant {
                connection_id: conn.clone(),
                name: name.clone(),
                idle: activity.is_idle(conn, now_ms, idle_threshold_ms),
                token: identities.token_of(conn).map(str::to_owned),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_flag_follows_the_clock() {
        let mut identities = IdentityRegistry::default();
        let mut activity = ActivityTracker::default();
        let mut room = Room::new("Team".into());

        for conn in ["c1", "c2"] {
            identities.connect(conn);
            activity.touch(conn, 0);
            room.members.insert(conn.into(), conn.to_uppercase());
        }

        let now = room.participants(&identities, &activity, 0, 60_000);
        assert!(now.iter().all(|p| !p.idle));
        assert_eq!(now[0].token.as_deref(), Some("c1"));
        assert_eq!(now[1].name, "C2");

        activity.touch("c1", 61_000);
        let later = room.participants(&identities, &activity, 61_000, 60_000);
        assert!(!later[0].idle);
        assert!(later[1].idle);
    }
}

use crate::error::SessionError;
use crate::person::{OccupantId, Person, PersonAction};
use crate::registry::RoomRegistry;
use crate::room_loop::{RoomEvent, RoomHandle, RoomSnapshot};
use presence_shared::config::DEFAULT_JUMP_SPEED;
use presence_shared::protocol::ClientMsg;
use tokio::sync::broadcast;

/// A validated client message.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionInput {
    Join { room_id: String },
    Action(PersonAction),
}

impl TryFrom<ClientMsg> for SessionInput {
    type Error = SessionError;

    fn try_from(msg: ClientMsg) -> Result<Self, Self::Error> {
        let action = match msg {
            ClientMsg::Join { room_id } => {
                if room_id.trim().is_empty() {
                    return Err(SessionError::InvalidInput("empty room id".to_string()));
                }
                return Ok(SessionInput::Join { room_id });
            }
            ClientMsg::SetFlying { flying } => PersonAction::SetFlying(flying),
            ClientMsg::Jump { speed } => PersonAction::Jump(speed.unwrap_or(DEFAULT_JUMP_SPEED)),
            ClientMsg::Fly { magnitude } => PersonAction::Fly(magnitude),
            ClientMsg::MoveForwardsBackwards { magnitude } => {
                PersonAction::MoveForwardsBackwards(magnitude)
            }
            ClientMsg::MoveRightLeft { magnitude } => PersonAction::MoveRightLeft(magnitude),
            ClientMsg::RotateCounterclockwise { radians } => {
                PersonAction::RotateCounterclockwise(radians)
            }
            ClientMsg::SetYaw { yaw } => PersonAction::SetYaw(yaw),
            ClientMsg::SetPitch { pitch } => PersonAction::SetPitch(pitch),
            ClientMsg::SetUsername { username } => PersonAction::SetUsername(username),
            ClientMsg::SetColor { color } => PersonAction::SetColor(color),
            ClientMsg::SetShape { shape } => PersonAction::SetShape(shape),
        };

        if let Some(value) = action.number() {
            if !value.is_finite() {
                return Err(SessionError::InvalidInput(format!(
                    "non-finite value in {:?}",
                    action
                )));
            }
        }
        Ok(SessionInput::Action(action))
    }
}

struct CurrentRoom {
    room_id: String,
    handle: RoomHandle,
}

/// Per-connection record: who this connection is and which room it is in.
pub struct Session {
    occupant_id: OccupantId,
    current: Option<CurrentRoom>,
}

impl Session {
    pub fn new(occupant_id: OccupantId) -> Self {
        Self {
            occupant_id,
            current: None,
        }
    }

    pub fn occupant_id(&self) -> &str {
        &self.occupant_id
    }

    pub fn current_room_id(&self) -> Option<&str> {
        self.current.as_ref().map(|c| c.room_id.as_str())
    }

    /// Join `room_id`, leaving the current room first if there is one.
    ///
    /// Returns the room's event stream, subscribed before the snapshot was
    /// taken so nothing after the snapshot is missed.
    pub async fn join(
        &mut self,
        registry: &RoomRegistry,
        room_id: &str,
        gravity: f64,
    ) -> Result<(RoomSnapshot, broadcast::Receiver<RoomEvent>), SessionError> {
        self.leave(registry).await;

        let handle = registry
            .join_room(room_id, gravity, &self.occupant_id, Person::default())
            .await?;
        let events = handle.subscribe();
        let snapshot = handle.snapshot().await?;

        tracing::info!(occupant = %self.occupant_id, room = %room_id, "Joined room");
        self.current = Some(CurrentRoom {
            room_id: room_id.to_string(),
            handle,
        });
        Ok((snapshot, events))
    }

    /// Leave the current room, if any.
    pub async fn leave(&mut self, registry: &RoomRegistry) {
        if let Some(current) = self.current.take() {
            registry
                .remove_occupant(&current.room_id, &self.occupant_id)
                .await;
            tracing::info!(occupant = %self.occupant_id, room = %current.room_id, "Left room");
        }
    }

    pub fn apply(&self, action: PersonAction) -> Result<(), SessionError> {
        let current = self
            .current
            .as_ref()
            .ok_or_else(|| SessionError::NotInRoom(self.occupant_id.clone()))?;
        current.handle.apply(&self.occupant_id, action)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room_loop::RoomLoopConfig;
    use std::time::Duration;

    fn registry() -> RoomRegistry {
        RoomRegistry::new(RoomLoopConfig {
            tick_rate_hz: 200,
            ..Default::default()
        })
    }

    #[test]
    fn jump_without_speed_uses_default() {
        let input = SessionInput::try_from(ClientMsg::Jump { speed: None }).unwrap();
        assert_eq!(input, SessionInput::Action(PersonAction::Jump(2.0)));
    }

    #[test]
    fn non_finite_numbers_rejected() {
        let bad = [
            ClientMsg::Fly {
                magnitude: f64::NAN,
            },
            ClientMsg::SetYaw {
                yaw: f64::INFINITY,
            },
            ClientMsg::Jump {
                speed: Some(f64::NEG_INFINITY),
            },
        ];
        for msg in bad {
            assert!(matches!(
                SessionInput::try_from(msg),
                Err(SessionError::InvalidInput(_))
            ));
        }
    }

    #[test]
    fn empty_room_id_rejected() {
        let result = SessionInput::try_from(ClientMsg::Join {
            room_id: "  ".to_string(),
        });
        assert!(matches!(result, Err(SessionError::InvalidInput(_))));
    }

    #[test]
    fn large_finite_values_pass_through() {
        let input = SessionInput::try_from(ClientMsg::MoveRightLeft { magnitude: 1e12 }).unwrap();
        assert_eq!(
            input,
            SessionInput::Action(PersonAction::MoveRightLeft(1e12))
        );
    }

    #[tokio::test]
    async fn apply_before_join_is_not_in_room() {
        let session = Session::new("a".to_string());
        assert_eq!(
            session.apply(PersonAction::Fly(1.0)),
            Err(SessionError::NotInRoom("a".to_string()))
        );
    }

    #[tokio::test]
    async fn join_returns_snapshot_with_self() {
        let registry = registry();
        let mut session = Session::new("a".to_string());
        let (snapshot, _events) = session.join(&registry, "A", 9.8).await.unwrap();
        assert_eq!(snapshot.room_id, "A");
        assert_eq!(snapshot.people.len(), 1);
        assert_eq!(snapshot.people[0].id, "a");
        assert_eq!(session.current_room_id(), Some("A"));
    }

    #[tokio::test]
    async fn second_join_moves_between_rooms() {
        let registry = registry();
        let mut session = Session::new("a".to_string());
        session.join(&registry, "A", 9.8).await.unwrap();
        session.join(&registry, "B", 9.8).await.unwrap();

        assert_eq!(session.current_room_id(), Some("B"));
        // A lost its only occupant.
        assert!(registry.room("A").await.is_none());
        assert!(registry.room("B").await.is_some());
    }

    #[tokio::test]
    async fn leave_tears_down_empty_room() {
        let registry = registry();
        let mut session = Session::new("a".to_string());
        session.join(&registry, "A", 9.8).await.unwrap();
        session.leave(&registry).await;
        session.leave(&registry).await;
        assert_eq!(session.current_room_id(), None);
        assert_eq!(registry.room_count().await, 0);
    }

    #[tokio::test]
    async fn moves_land_before_next_tick() {
        let registry = registry();
        let mut session = Session::new("a".to_string());
        let (_, _events) = session.join(&registry, "A", 9.8).await.unwrap();

        session.apply(PersonAction::SetYaw(0.0)).unwrap();
        session
            .apply(PersonAction::MoveForwardsBackwards(2.0))
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let handle = registry.room("A").await.unwrap();
        let snapshot = handle.snapshot().await.unwrap();
        let me = &snapshot.people[0];
        assert!((me.position.z - 2.0).abs() < 1e-9);
        assert!(me.position.x.abs() < 1e-9);
        assert_eq!(me.position.y, 0.0);
    }
}

//! Conversions from room-loop output to wire messages.

use crate::room_loop::{RoomEvent, RoomSnapshot};
use presence_shared::protocol::{
    JoinedMsg, OccupantMsg, PeopleStateMsg, PersonPitchMsg, PersonYawMsg, ServerMsg, UsernameMsg,
};

pub use presence_shared::protocol::{ClientMsg, WelcomeMsg, PROTOCOL_VERSION};

impl From<RoomEvent> for ServerMsg {
    fn from(event: RoomEvent) -> Self {
        match event {
            RoomEvent::PeopleState {
                server_time,
                people,
            } => ServerMsg::PeopleState(PeopleStateMsg {
                server_time,
                people,
            }),
            RoomEvent::Connected { occupant_id } => {
                ServerMsg::Connected(OccupantMsg { occupant_id })
            }
            RoomEvent::Disconnected { occupant_id } => {
                ServerMsg::Disconnected(OccupantMsg { occupant_id })
            }
            RoomEvent::PersonYaw { occupant_id, yaw } => {
                ServerMsg::PersonYaw(PersonYawMsg { occupant_id, yaw })
            }
            RoomEvent::PersonPitch { occupant_id, pitch } => {
                ServerMsg::PersonPitch(PersonPitchMsg { occupant_id, pitch })
            }
            RoomEvent::Username {
                occupant_id,
                username,
            } => ServerMsg::Username(UsernameMsg {
                occupant_id,
                username,
            }),
        }
    }
}

impl From<RoomSnapshot> for ServerMsg {
    fn from(snapshot: RoomSnapshot) -> Self {
        ServerMsg::Joined(JoinedMsg {
            room_id: snapshot.room_id,
            server_time: snapshot.server_time,
            people: snapshot.people,
        })
    }
}

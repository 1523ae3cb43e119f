use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::config::WorldConfig;
use crate::vec3::Vector3;

/// Protocol version - increment when making breaking changes.
pub const PROTOCOL_VERSION: u32 = 1;

// === Server -> Client ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type")]
pub enum ServerMsg {
    #[serde(rename = "welcome")]
    Welcome(WelcomeMsg),
    #[serde(rename = "joined")]
    Joined(JoinedMsg),
    #[serde(rename = "people_state")]
    PeopleState(PeopleStateMsg),
    #[serde(rename = "connected")]
    Connected(OccupantMsg),
    #[serde(rename = "disconnected")]
    Disconnected(OccupantMsg),
    #[serde(rename = "person_yaw")]
    PersonYaw(PersonYawMsg),
    #[serde(rename = "person_pitch")]
    PersonPitch(PersonPitchMsg),
    #[serde(rename = "username")]
    Username(UsernameMsg),
}

/// First message on every connection.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct WelcomeMsg {
    pub protocol_version: u32,
    pub self_id: String,
    pub world: WorldConfig,
}

/// Sent to the joiner only, with the room as it stood when the join landed.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct JoinedMsg {
    pub room_id: String,
    #[ts(type = "number")]
    pub server_time: u64,
    pub people: Vec<PersonWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PeopleStateMsg {
    #[ts(type = "number")]
    pub server_time: u64,
    pub people: Vec<PersonWire>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct OccupantMsg {
    pub occupant_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PersonYawMsg {
    pub occupant_id: String,
    pub yaw: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PersonPitchMsg {
    pub occupant_id: String,
    pub pitch: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct UsernameMsg {
    pub occupant_id: String,
    pub username: String,
}

/// Full record of one occupant as broadcast to the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PersonWire {
    pub id: String,
    pub position: Vector3,
    pub velocity: Vector3,
    pub yaw: f64,
    pub pitch: f64,
    pub username: String,
    pub flying: bool,
    pub color: String,
    pub shape: String,
}

// === Client -> Server ===

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(tag = "type")]
pub enum ClientMsg {
    #[serde(rename = "join")]
    Join {
        #[serde(rename = "roomId")]
        room_id: String,
    },
    #[serde(rename = "set_flying")]
    SetFlying { flying: bool },
    #[serde(rename = "jump")]
    Jump {
        #[serde(default)]
        #[ts(optional)]
        speed: Option<f64>,
    },
    #[serde(rename = "fly")]
    Fly { magnitude: f64 },
    #[serde(rename = "move_forwards_backwards")]
    MoveForwardsBackwards { magnitude: f64 },
    #[serde(rename = "move_right_left")]
    MoveRightLeft { magnitude: f64 },
    #[serde(rename = "rotate_counterclockwise")]
    RotateCounterclockwise { radians: f64 },
    #[serde(rename = "set_yaw")]
    SetYaw { yaw: f64 },
    #[serde(rename = "set_pitch")]
    SetPitch { pitch: f64 },
    #[serde(rename = "set_username")]
    SetUsername { username: String },
    #[serde(rename = "set_color")]
    SetColor { color: String },
    #[serde(rename = "set_shape")]
    SetShape { shape: String },
}

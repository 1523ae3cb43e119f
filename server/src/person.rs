use presence_shared::config::FLOOR_Y;
use presence_shared::protocol::PersonWire;
use presence_shared::vec3::{self, Vector3};
use std::f64::consts::{PI, TAU};

/// Opaque per-connection identity, distinct from the display name.
pub type OccupantId = String;

/// One occupant's simulated and cosmetic state inside a room.
#[derive(Debug, Clone, PartialEq)]
pub struct Person {
    pub position: Vector3,
    /// Linear velocity (m/s)
    pub velocity: Vector3,
    /// Horizontal facing (radians)
    pub yaw: f64,
    /// Vertical facing (radians), unclamped
    pub pitch: f64,
    pub username: String,
    /// Gravity skips people who are flying.
    pub flying: bool,
    pub color: String,
    pub shape: String,
}

impl Default for Person {
    fn default() -> Self {
        Self {
            position: Vector3::ZERO,
            velocity: Vector3::ZERO,
            yaw: 0.0,
            pitch: 0.0,
            username: "anonymous".to_string(),
            flying: false,
            color: "#ffffff".to_string(),
            shape: "cube".to_string(),
        }
    }
}

/// A client-driven change to a single person, applied between ticks.
#[derive(Debug, Clone, PartialEq)]
pub enum PersonAction {
    SetFlying(bool),
    Jump(f64),
    Fly(f64),
    MoveForwardsBackwards(f64),
    MoveRightLeft(f64),
    RotateCounterclockwise(f64),
    SetYaw(f64),
    SetPitch(f64),
    SetUsername(String),
    SetColor(String),
    SetShape(String),
}

impl PersonAction {
    /// The numeric argument this action carries, if any.
    pub fn number(&self) -> Option<f64> {
        match self {
            PersonAction::Jump(v)
            | PersonAction::Fly(v)
            | PersonAction::MoveForwardsBackwards(v)
            | PersonAction::MoveRightLeft(v)
            | PersonAction::RotateCounterclockwise(v)
            | PersonAction::SetYaw(v)
            | PersonAction::SetPitch(v) => Some(*v),
            PersonAction::SetFlying(_)
            | PersonAction::SetUsername(_)
            | PersonAction::SetColor(_)
            | PersonAction::SetShape(_) => None,
        }
    }
}

impl Person {
    pub fn apply(&mut self, action: PersonAction) {
        match action {
            PersonAction::SetFlying(flying) => self.set_flying(flying),
            PersonAction::Jump(speed) => self.jump(speed),
            PersonAction::Fly(magnitude) => self.fly(magnitude),
            PersonAction::MoveForwardsBackwards(magnitude) => {
                self.move_forwards_backwards(magnitude)
            }
            PersonAction::MoveRightLeft(magnitude) => self.move_right_left(magnitude),
            PersonAction::RotateCounterclockwise(radians) => self.rotate_counterclockwise(radians),
            PersonAction::SetYaw(yaw) => self.yaw = yaw,
            PersonAction::SetPitch(pitch) => self.pitch = pitch,
            PersonAction::SetUsername(username) => self.username = username,
            PersonAction::SetColor(color) => self.color = color,
            PersonAction::SetShape(shape) => self.shape = shape,
        }
    }

    pub fn set_flying(&mut self, flying: bool) {
        self.flying = flying;
    }

    /// Overwrites vertical velocity; repeated jumps do not stack.
    pub fn jump(&mut self, speed: f64) {
        self.velocity.y = speed;
    }

    /// Moves straight up or down without touching velocity.
    pub fn fly(&mut self, magnitude: f64) {
        self.position.y += magnitude;
    }

    /// Displaces along the facing axis in the XZ plane.
    pub fn move_forwards_backwards(&mut self, magnitude: f64) {
        self.position.z += magnitude * self.yaw.cos();
        self.position.x -= magnitude * self.yaw.sin();
    }

    /// Displaces perpendicular to the facing axis in the XZ plane.
    pub fn move_right_left(&mut self, magnitude: f64) {
        self.position.z += magnitude * self.yaw.sin();
        self.position.x += magnitude * self.yaw.cos();
    }

    /// Adds to yaw. Past a full turn yaw becomes `(yaw % PI) * 2`, which clients
    /// already depend on; it does not keep yaw inside `[0, 2PI)` for every input.
    pub fn rotate_counterclockwise(&mut self, radians: f64) {
        self.yaw += radians;
        if self.yaw > TAU {
            self.yaw = (self.yaw % PI) * 2.0;
        }
    }

    /// One physics step: gravity, Euler integration, then the floor clamp.
    pub(crate) fn step(&mut self, gravity: f64, dt: f64) {
        if !self.flying {
            self.velocity.y -= gravity * dt;
        }
        self.position = vec3::add(self.position, vec3::scale(self.velocity, dt));
        if self.position.y < FLOOR_Y {
            self.position.y = FLOOR_Y;
            self.velocity.y = 0.0;
        }
    }

    pub fn to_wire(&self, id: &str) -> PersonWire {
        PersonWire {
            id: id.to_string(),
            position: self.position,
            velocity: self.velocity,
            yaw: self.yaw,
            pitch: self.pitch,
            username: self.username.clone(),
            flying: self.flying,
            color: self.color.clone(),
            shape: self.shape.clone(),
        }
    }
}

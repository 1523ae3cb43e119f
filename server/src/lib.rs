//! Presence server library.
//!
//! Rooms of people sharing 3D position, orientation and appearance, each
//! simulated by its own fixed-rate loop. Exposed for tests and binaries.

pub mod config;
pub mod error;
pub mod person;
pub mod protocol;
pub mod registry;
pub mod room;
pub mod room_loop;
pub mod session;
pub mod ws;

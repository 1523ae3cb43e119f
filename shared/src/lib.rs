//! Types shared between the presence server and its clients.
//!
//! Every wire type derives `ts_rs::TS`; `cargo test -p presence-shared`
//! regenerates the TypeScript bindings under `shared/bindings/`.

pub mod config;
pub mod protocol;
pub mod vec3;

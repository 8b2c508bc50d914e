//! Typed snapshots of external subsystems.
//!
//! Every snapshot is the immutable result of one parse cycle and carries a
//! documented empty/default shape that readers fall back to when a query or
//! parse fails. Producers never surface errors to snapshot consumers.

pub mod audio;
pub mod battery;
pub mod bluetooth;
pub mod hypr;
pub mod maintenance;
pub mod media;
pub mod network;
pub mod power;
pub mod session;
pub mod system;

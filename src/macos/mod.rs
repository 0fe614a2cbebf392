//! macOS platform layer: the AX-backed element bridge, screen topology
//! snapshots, and the accessibility permission gate. Nothing outside this
//! module touches AppKit or the AX API.

pub mod ax;
pub mod permission;
pub mod screen;

//! Core crate for code shared between the server and the control binaries.

pub mod db;
pub mod env;
pub mod id;
pub mod params;

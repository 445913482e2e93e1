//! Utility library for the Motor:bit software
//!
//! Shared ambient services for the executables: session directories, logging and parameter
//! loading.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod host;
pub mod logger;
pub mod params;
pub mod session;
pub mod time;

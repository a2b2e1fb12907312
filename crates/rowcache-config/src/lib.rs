//! # Rowcache Config
//!
//! Settings structures and a layered configuration loader for the cache:
//! named backend groups, the default group, and the negative-cache TTL.

pub mod loader;
pub mod settings;

pub use loader::*;
pub use settings::*;

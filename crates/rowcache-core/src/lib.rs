//! # Rowcache Core
//!
//! Core types and error definitions for the rowcache workspace: the unified
//! error type, result alias, and the record/payload data model shared by the
//! cache store, the request overlay, and the configuration layer.

pub mod error;
pub mod record;
pub mod result;

pub use error::*;
pub use record::*;
pub use result::*;

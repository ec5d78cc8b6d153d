//! Quick Notes domain logic.
//!
//! Pure functions and types shared by the persistence, chain and HTTP
//! crates. Nothing in here performs I/O.

pub mod error;
pub mod hashing;
pub mod note;
pub mod payload;
pub mod types;

pub mod chain;
pub mod notes;

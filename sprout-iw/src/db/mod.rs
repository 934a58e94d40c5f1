//! Database queries for the instructor workflow service
//!
//! Every status change goes through a conditional UPDATE keyed on the
//! expected current state, so concurrent writers lose cleanly instead of
//! clobbering each other.

pub mod artifacts;
pub mod earnings;
pub mod sessions;
pub mod wrapups;

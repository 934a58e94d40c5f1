//! # Sprout Instructor Workflow Library (sprout-iw)
//!
//! Session lifecycle and instructor wrap-up engine for the Sprout portal.
//!
//! **Purpose:** Govern scheduled sessions from pickup to completion, run the
//! four-step wrap-up workflow, and turn each committed wrap-up into an
//! earnings entry and badge-award candidates over an HTTP/SSE interface.

pub mod api;
pub mod badges;
pub mod db;
pub mod earnings;
pub mod error;
pub mod session;
pub mod state;
pub mod wrapup;

pub use error::{Error, Result};
pub use state::SharedState;

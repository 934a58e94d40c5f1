//! HTTP API for the instructor workflow service
//!
//! Route layout and handler conventions follow the other Sprout services:
//! serde request/response types per handler module, errors mapped to
//! status codes through `Error::into_response`.

pub mod earnings;
pub mod server;
pub mod sessions;
pub mod sse;
pub mod wrapup;

pub use server::{build_router, run, AppContext};

//! HTTP render boundary for the chat session
//!
//! A renderer reads the session view, posts user input, and follows view
//! updates over SSE.

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;
#[allow(unused_imports)] // Public API re-exports
pub use types::*;

use crate::runtime::SessionHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
}

impl AppState {
    pub fn new(session: SessionHandle) -> Self {
        Self { session }
    }
}

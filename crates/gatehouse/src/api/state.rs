//! Application state shared across handlers.

use std::sync::Arc;

use crate::auth::{AuthConfig, AuthState};
use crate::user::UserStore;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Authentication state.
    pub auth: AuthState,
}

impl AppState {
    pub fn new(config: AuthConfig, store: Arc<dyn UserStore>) -> Self {
        Self {
            auth: AuthState::new(config, store),
        }
    }
}

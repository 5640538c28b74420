use std::sync::Arc;

use momsync_core::repository::Repository;

/// Shared application state passed to the import handler.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repository>,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn new(repo: Arc<dyn Repository>, max_body_bytes: usize) -> Self {
        Self {
            repo,
            max_body_bytes,
        }
    }
}

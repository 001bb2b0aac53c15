/// Shared application state
use crate::db::Store;

/// State shared by every HTTP handler.
pub struct AppState {
    pub store: Store,
}

impl AppState {
    pub fn new(store: Store) -> Self {
        Self { store }
    }
}

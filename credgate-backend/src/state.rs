use std::sync::Arc;

use credgate_store::UserStore;

/// Shared application state passed to every route handler.
///
/// The store is held behind the `UserStore` trait so tests can inject an
/// in-process implementation in place of the remote client.
pub struct AppState {
    store: Arc<dyn UserStore>,
    touch_on_login: bool,
}

impl AppState {
    /// Build a state container around a concrete store implementation.
    pub fn new(store: Arc<dyn UserStore>, touch_on_login: bool) -> Self {
        Self {
            store,
            touch_on_login,
        }
    }

    /// Handle to the shared store client.
    pub fn store(&self) -> Arc<dyn UserStore> {
        Arc::clone(&self.store)
    }

    /// Whether a successful login should also stamp `last_login`.
    pub fn touch_on_login(&self) -> bool {
        self.touch_on_login
    }
}

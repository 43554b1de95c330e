pub mod auth;
pub mod handlers;
pub mod routes;

pub use auth::AuthUser;
pub use routes::*;

use crate::search::SearchService;
use crate::state::Database;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub search: SearchService,
}

impl AppState {
    pub fn new(db: Database, search: SearchService) -> Self {
        Self { db, search }
    }
}

pub mod auth;
pub mod catalog;
pub mod chat;
pub mod error;
pub mod middleware;
pub mod stats;
pub mod tokens;

use std::sync::Arc;

use arcadia_db::Database;
use arcadia_db::clock::Clock;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub jwt_secret: String,
    /// Shared secret for the x-admin-key header path.
    pub admin_key: String,
    /// Nick whose logins carry the admin role; None disables the role path.
    pub admin_user: Option<String>,
    pub clock: Arc<dyn Clock>,
}

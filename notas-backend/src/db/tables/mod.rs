//! Table-specific `impl Database` blocks.

mod auth_sessions;
mod notes;
mod users;

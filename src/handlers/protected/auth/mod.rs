// handlers/protected/auth/mod.rs - Session introspection
pub mod session;

pub use session::{csrf, roles, whoami};

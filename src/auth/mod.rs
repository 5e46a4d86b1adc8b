//! Token issuance, password hashing and the `protect` / `restrict_to` chain.

mod claims;
mod dto;
pub mod handlers;
pub mod jwt;
pub mod middleware;
pub mod password;

pub use claims::Claims;
pub use jwt::{JwtKeys, TokenError, JWT_COOKIE};
pub use middleware::{protect, require_admin, restrict_to, CurrentUser};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// JWT payload. Only the subject and timestamps matter to the app; issuer and
/// audience are checked on decode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,   // user ID
    pub iat: usize,  // issued at (unix timestamp)
    pub exp: usize,  // expires at (unix timestamp)
    pub iss: String, // issuer
    pub aud: String, // audience
}

impl Claims {
    pub fn issued_at(&self) -> i64 {
        self.iat as i64
    }
}

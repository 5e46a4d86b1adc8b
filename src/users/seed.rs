use tracing::{info, warn};

use super::model::{NewUser, User};
use crate::{
    config::SeedAdmin,
    store::{Filter, Repo, StoreError},
};

/// Creates the bootstrap admin unless a user with that email exists.
/// Returns whether an account was created.
pub async fn ensure_admin(repo: &Repo<User>, seed: &SeedAdmin) -> anyhow::Result<bool> {
    let email = seed.email.trim().to_lowercase();
    if repo
        .find_one(Filter::new().eq("email", email.as_str()))
        .await?
        .is_some()
    {
        info!(%email, "bootstrap admin already present");
        return Ok(false);
    }

    let admin = NewUser {
        name: Some(seed.name.clone()),
        email: Some(email.clone()),
        password: Some(seed.password.clone()),
        password_confirm: Some(seed.password.clone()),
        photo: None,
        role: Some("admin".into()),
    }
    .into_user()
    .map_err(|e| anyhow::anyhow!("invalid bootstrap admin: {e}"))?;

    match repo.insert(&admin).await {
        Ok(()) => {
            info!(user_id = %admin.id, %email, "bootstrap admin created");
            Ok(true)
        }
        // taken by a deactivated account
        Err(StoreError::Duplicate { .. }) => {
            warn!(%email, "bootstrap admin email belongs to an inactive user");
            Ok(false)
        }
        Err(e) => Err(e.into()),
    }
}

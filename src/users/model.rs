use std::{fmt, str::FromStr};

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{
    auth::password::{hash_password, MIN_PASSWORD_LEN},
    error::AppError,
    factory::Resource,
    store::{Collection, Document, Filter},
};

pub const DEFAULT_PHOTO: &str = "default.jpg";

const ROLE_MSG: &str = "Role is either: user or admin";

pub const PASSWORD_ROUTE_MSG: &str =
    "This route is not for password updates. Please use /update-my-password.";

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(AppError::Validation(vec![ROLE_MSG.into()])),
        }
    }
}

fn default_photo() -> String {
    DEFAULT_PHOTO.to_string()
}

fn default_active() -> bool {
    true
}

/// Credential record as stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default = "default_photo")]
    pub photo: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub password_changed_at: Option<OffsetDateTime>,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl User {
    /// True when the password changed after a token issued at `issued_at`
    /// (unix seconds).
    pub fn changed_password_after(&self, issued_at: i64) -> bool {
        self.password_changed_at
            .map(|changed| issued_at < changed.unix_timestamp())
            .unwrap_or(false)
    }

    /// Backdated by one second so a token signed right after the change
    /// still verifies.
    pub fn set_password(&mut self, plain: &str) -> anyhow::Result<()> {
        self.password_hash = hash_password(plain)?;
        self.password_changed_at = Some(OffsetDateTime::now_utc() - Duration::seconds(1));
        Ok(())
    }
}

impl Document for User {
    const COLLECTION: Collection = Collection {
        name: "users",
        unique: &["email"],
    };

    fn id(&self) -> Uuid {
        self.id
    }

    fn default_filter() -> Filter {
        Filter::new().ne("active", "false")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub photo: String,
}

impl From<&User> for PublicUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            photo: user.photo.clone(),
        }
    }
}

pub fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex =
            Regex::new(r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9.\-]+\.[A-Za-z]{2,}$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

fn check_name(name: Option<&str>, errors: &mut Vec<String>) {
    if name.map(str::trim).unwrap_or_default().is_empty() {
        errors.push("Please tell us your name!".into());
    }
}

fn check_email(email: Option<&str>, errors: &mut Vec<String>) {
    match email {
        None => errors.push("Please provide your email".into()),
        Some(e) if e.is_empty() => errors.push("Please provide your email".into()),
        Some(e) if !is_valid_email(e) => errors.push("Please provide a valid email".into()),
        Some(_) => {}
    }
}

fn check_role(role: Option<&str>, errors: &mut Vec<String>) -> Option<Role> {
    match role.map(Role::from_str) {
        None => None,
        Some(Ok(role)) => Some(role),
        Some(Err(_)) => {
            errors.push(ROLE_MSG.into());
            None
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, AppError> {
    serde_json::from_value(body).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Body accepted by signup and by the admin create route.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirm: Option<String>,
    pub photo: Option<String>,
    pub role: Option<String>,
}

impl NewUser {
    pub fn into_user(self) -> Result<User, AppError> {
        let mut errors = Vec::new();
        let email = self.email.as_deref().map(normalize_email);

        check_name(self.name.as_deref(), &mut errors);
        check_email(email.as_deref(), &mut errors);
        match self.password.as_deref() {
            None | Some("") => errors.push("Please provide a password".into()),
            Some(p) if p.chars().count() < MIN_PASSWORD_LEN => {
                errors.push("Password must have at least 8 characters".into())
            }
            Some(_) => {}
        }
        match self.password_confirm.as_deref() {
            None | Some("") => errors.push("Please confirm your password".into()),
            Some(c) if Some(c) != self.password.as_deref() => {
                errors.push("Passwords are not the same!".into())
            }
            Some(_) => {}
        }
        let role = check_role(self.role.as_deref(), &mut errors);

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        let password = self.password.unwrap_or_default();
        Ok(User {
            id: Uuid::new_v4(),
            name: self.name.unwrap_or_default().trim().to_string(),
            email: email.unwrap_or_default(),
            password_hash: hash_password(&password)?,
            role: role.unwrap_or_default(),
            photo: self.photo.unwrap_or_else(default_photo),
            password_changed_at: None,
            active: true,
        })
    }
}

/// Partial update of profile fields. Password fields are never accepted here.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub photo: Option<String>,
    pub role: Option<String>,
}

impl UserPatch {
    pub fn apply(self, user: &mut User) -> Result<(), AppError> {
        let mut errors = Vec::new();
        let email = self.email.as_deref().map(normalize_email);

        if self.name.is_some() {
            check_name(self.name.as_deref(), &mut errors);
        }
        if email.is_some() {
            check_email(email.as_deref(), &mut errors);
        }
        let role = check_role(self.role.as_deref(), &mut errors);

        if !errors.is_empty() {
            return Err(AppError::Validation(errors));
        }

        if let Some(name) = self.name {
            user.name = name.trim().to_string();
        }
        if let Some(email) = email {
            user.email = email;
        }
        if let Some(photo) = self.photo {
            user.photo = photo;
        }
        if let Some(role) = role {
            user.role = role;
        }
        Ok(())
    }
}

pub fn touches_password(body: &Value) -> bool {
    body.get("password").is_some() || body.get("passwordConfirm").is_some()
}

impl Resource for User {
    const SINGULAR: &'static str = "user";
    const PLURAL: &'static str = "users";
    type Public = PublicUser;

    fn to_public(&self) -> PublicUser {
        PublicUser::from(self)
    }

    fn create(body: Value) -> Result<Self, AppError> {
        decode::<NewUser>(body)?.into_user()
    }

    fn apply_update(&mut self, body: Value) -> Result<(), AppError> {
        if touches_password(&body) {
            return Err(AppError::BadRequest(PASSWORD_ROUTE_MSG.into()));
        }
        decode::<UserPatch>(body)?.apply(self)
    }

    fn is_queryable(field: &str) -> bool {
        !matches!(field, "passwordHash" | "passwordChangedAt" | "active")
    }
}

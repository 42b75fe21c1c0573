use crate::model::{Id, InvalidTextError};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt::{Debug, Formatter};

pub const USERNAME_MAX_LEN: usize = 80;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct UserMarker;

text_field!(
    /// Unique, case sensitive login name. Also what other users see as the
    /// author of posts and comments.
    Username,
    field = "username",
    max_chars = Some(USERNAME_MAX_LEN)
);

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
pub struct User {
    pub id: Id<UserMarker>,
    pub username: Username,
}

/// A plaintext password as received from a client. Trimmed and non-empty.
#[derive(Clone, Eq, PartialEq)]
pub struct Password(String);

impl Password {
    pub fn new(password: &str) -> Result<Self, InvalidTextError> {
        crate::util::trimmed_text(password, None)
            .map(Self)
            .map_err(|error| InvalidTextError {
                field: "password",
                error,
            })
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }
}

impl Debug for Password {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Password").field(&"[redacted]").finish()
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Password::new(&inner).map_err(serde::de::Error::custom)
    }
}

/// Body of both registration and login.
#[derive(Clone, Eq, PartialEq, Debug, Deserialize)]
pub struct Credentials {
    pub username: Username,
    pub password: Password,
}

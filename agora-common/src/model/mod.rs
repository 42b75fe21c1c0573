#[macro_use]
mod text;

pub mod auth;
pub mod comment;
pub mod like;
pub mod post;
pub mod user;

use crate::{
    model::auth::InvalidAuthTokenHashError,
    snowflake::{Epoch, Snowflake, SnowflakeGenerator},
    util::{NonPositiveDurationError, TextError},
};
use serde::{Deserialize, Serialize};
use std::{fmt::Display, marker::PhantomData, num::TryFromIntError};
use thiserror::Error;
use time::{UtcDateTime, error::ComponentRange, macros::utc_datetime};

#[derive(Clone, Eq, PartialEq, Debug, Error)]
pub enum ModelValidationError {
    #[error(transparent)]
    Text(#[from] InvalidTextError),
    #[error(transparent)]
    NonPositiveDuration(#[from] NonPositiveDurationError),
    #[error(transparent)]
    TokenHash(#[from] InvalidAuthTokenHashError),
    #[error("Timestamp out of range: {0}")]
    Timestamp(#[from] ComponentRange),
    #[error("Like count out of range: {0}")]
    LikeCount(#[from] TryFromIntError),
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
#[error("Invalid {field}: {error}")]
pub struct InvalidTextError {
    pub field: &'static str,
    pub error: TextError,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct AgoraEpoch;
impl Epoch for AgoraEpoch {
    const EPOCH_TIME: UtcDateTime = utc_datetime!(2025-01-01 00:00);
}

pub type AgoraSnowflake = Snowflake<AgoraEpoch>;
pub type AgoraSnowflakeGenerator = SnowflakeGenerator<AgoraEpoch>;

/// A snowflake tagged with the kind of object it identifies.
#[derive(
    Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Id<Marker>(AgoraSnowflake, #[serde(skip)] PhantomData<Marker>);

impl<Marker> Id<Marker> {
    #[must_use]
    pub fn new(snowflake: AgoraSnowflake) -> Self {
        Self(snowflake, PhantomData)
    }

    #[must_use]
    pub fn snowflake(self) -> AgoraSnowflake {
        self.0
    }
}

impl<Marker> Display for Id<Marker> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<Marker> From<AgoraSnowflake> for Id<Marker> {
    fn from(value: AgoraSnowflake) -> Self {
        Self::new(value)
    }
}

impl<Marker> From<u64> for Id<Marker> {
    fn from(value: u64) -> Self {
        Id::new(AgoraSnowflake::new(value))
    }
}

impl<Marker> From<Id<Marker>> for u64 {
    fn from(value: Id<Marker>) -> Self {
        value.snowflake().get()
    }
}

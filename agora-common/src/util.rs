use thiserror::Error;
use time::Duration;

#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Debug, Default, Hash)]
pub struct PositiveDuration(Duration);

impl PositiveDuration {
    #[must_use]
    pub fn new(duration: Duration) -> Option<Self> {
        duration.is_positive().then_some(Self(duration))
    }

    #[must_use]
    pub fn get(&self) -> Duration {
        self.0
    }
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The duration is not positive: {0}")]
pub struct NonPositiveDurationError(Duration);

impl TryFrom<Duration> for PositiveDuration {
    type Error = NonPositiveDurationError;

    fn try_from(value: Duration) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(NonPositiveDurationError(value))
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum TextError {
    #[error("must not be empty")]
    Empty,
    #[error("must be at most {0} characters long")]
    TooLong(usize),
}

/// Trims surrounding whitespace and checks what is left.
pub fn trimmed_text(text: &str, max_chars: Option<usize>) -> Result<String, TextError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(TextError::Empty);
    }
    if let Some(max_chars) = max_chars
        && trimmed.chars().count() > max_chars
    {
        return Err(TextError::TooLong(max_chars));
    }

    Ok(trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use crate::util::{PositiveDuration, TextError, trimmed_text};
    use time::Duration;

    #[test]
    fn positive_duration() {
        assert!(PositiveDuration::new(Duration::seconds(1)).is_some());
        assert!(PositiveDuration::new(Duration::ZERO).is_none());
        assert!(PositiveDuration::try_from(Duration::seconds(-5)).is_err());
    }

    #[test]
    fn trims_and_limits_text() {
        assert_eq!(trimmed_text("  hi \n", None), Ok("hi".to_owned()));
        assert_eq!(trimmed_text(" \t ", None), Err(TextError::Empty));
        assert_eq!(trimmed_text("", Some(3)), Err(TextError::Empty));
        assert_eq!(trimmed_text("  abc  ", Some(3)), Ok("abc".to_owned()));
        assert_eq!(trimmed_text("abcd", Some(3)), Err(TextError::TooLong(3)));
        assert_eq!(trimmed_text("ääö", Some(3)), Ok("ääö".to_owned()));
    }
}

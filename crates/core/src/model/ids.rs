use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error type for parsing an ID from a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseIdError {
    kind: &'static str,
}

impl fmt::Display for ParseIdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {} from string", self.kind)
    }
}

impl std::error::Error for ParseIdError {}

macro_rules! numeric_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            #[must_use]
            pub fn new(id: u64) -> Self {
                Self(id)
            }

            /// Returns the underlying u64 value
            #[must_use]
            pub fn value(&self) -> u64 {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ParseIdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<u64>()
                    .map($name::new)
                    .map_err(|_| ParseIdError {
                        kind: stringify!($name),
                    })
            }
        }
    };
}

numeric_id!(
    /// Unique identifier for a Question
    QuestionId
);
numeric_id!(
    /// Unique identifier for a QuestionBank
    BankId
);
numeric_id!(
    /// Unique identifier for a PracticeSession
    SessionId
);
numeric_id!(
    /// Unique identifier for a recorded UserAnswer
    AnswerId
);

/// Opaque user identifier issued by the hosted auth provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user id from the auth subject.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the subject is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, ParseIdError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError { kind: "UserId" });
        }
        Ok(Self(trimmed.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stable identifier of an answer option within its question (e.g. `"a"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OptionId(String);

impl OptionId {
    /// Create an option id, normalising surrounding whitespace and case.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value is blank.
    pub fn new(value: impl Into<String>) -> Result<Self, ParseIdError> {
        let raw = value.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ParseIdError { kind: "OptionId" });
        }
        Ok(Self(trimmed.to_lowercase()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracking identifier handed back for an accepted upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UploadId(String);

impl UploadId {
    /// Parse an upload id of the form `upload_<digits>_<suffix>`.
    ///
    /// # Errors
    ///
    /// Returns `ParseIdError` if the value does not have that shape.
    pub fn parse(value: &str) -> Result<Self, ParseIdError> {
        let err = ParseIdError { kind: "UploadId" };
        let rest = value.trim().strip_prefix("upload_").ok_or(err.clone())?;
        let (millis, suffix) = rest.split_once('_').ok_or(err.clone())?;
        if millis.is_empty()
            || !millis.bytes().all(|b| b.is_ascii_digit())
            || suffix.is_empty()
            || !suffix.bytes().all(|b| b.is_ascii_alphanumeric())
        {
            return Err(err);
        }
        Ok(Self(value.trim().to_owned()))
    }

    /// Build an id from a timestamp and an alphanumeric suffix.
    #[must_use]
    pub fn from_parts(millis: i64, suffix: &str) -> Self {
        Self(format!("upload_{millis}_{suffix}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_id_display_and_parse() {
        let id = QuestionId::new(42);
        assert_eq!(id.to_string(), "42");
        assert_eq!("42".parse::<QuestionId>().unwrap(), id);
        assert_eq!(format!("{id:?}"), "QuestionId(42)");
    }

    #[test]
    fn session_id_from_str_invalid() {
        assert!("not-a-number".parse::<SessionId>().is_err());
    }

    #[test]
    fn option_id_is_normalised() {
        let id = OptionId::new(" B ").unwrap();
        assert_eq!(id.as_str(), "b");
        assert!(OptionId::new("  ").is_err());
    }

    #[test]
    fn user_id_rejects_blank() {
        assert!(UserId::new("").is_err());
        assert_eq!(UserId::new("user-1").unwrap().as_str(), "user-1");
    }

    #[test]
    fn upload_id_shape_is_checked() {
        let id = UploadId::from_parts(1_700_000_000_000, "abc123xyz");
        assert_eq!(UploadId::parse(id.as_str()).unwrap(), id);
        assert!(UploadId::parse("upload_").is_err());
        assert!(UploadId::parse("upload_12_").is_err());
        assert!(UploadId::parse("file_12_abc").is_err());
        assert!(UploadId::parse("upload_x1_abc").is_err());
    }
}

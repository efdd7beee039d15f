use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Error type for parsing an ID from a string
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

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Wraps an existing UUID.
            #[must_use]
            pub fn new(id: Uuid) -> Self {
                Self(id)
            }

            /// Generates a fresh random id.
            #[must_use]
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            /// Returns the underlying UUID.
            #[must_use]
            pub fn value(&self) -> Uuid {
                self.0
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
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
                Uuid::parse_str(s.trim()).map(Self).map_err(|_| ParseIdError {
                    kind: stringify!($name),
                })
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an organization (tenant).
    OrganizationId
);
uuid_id!(
    /// Unique identifier for an audit template.
    TemplateId
);
uuid_id!(
    /// Unique identifier for an audit session.
    SessionId
);
uuid_id!(
    /// Unique identifier for a stored response row.
    ResponseId
);
uuid_id!(
    /// Unique identifier for an auditor (team member).
    AuditorId
);

/// Author-assigned question identifier, unique across a template.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QuestionId({:?})", self.0)
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ─── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_display_matches_uuid() {
        let raw = Uuid::new_v4();
        let id = SessionId::new(raw);
        assert_eq!(id.to_string(), raw.to_string());
    }

    #[test]
    fn template_id_from_str() {
        let raw = "6f1c5e7a-2f43-4b1e-9a57-3c2d1e0f9b88";
        let id: TemplateId = raw.parse().unwrap();
        assert_eq!(id.value().to_string(), raw);
    }

    #[test]
    fn response_id_from_str_invalid() {
        let result = "not-a-uuid".parse::<ResponseId>();
        assert_eq!(
            result.unwrap_err().to_string(),
            "failed to parse ResponseId from string"
        );
    }

    #[test]
    fn debug_names_the_id_kind() {
        let id = OrganizationId::new(Uuid::nil());
        assert_eq!(
            format!("{id:?}"),
            "OrganizationId(00000000-0000-0000-0000-000000000000)"
        );
    }

    #[test]
    fn question_id_serializes_as_plain_string() {
        let id = QuestionId::new("q-7");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"q-7\"");
        assert!(QuestionId::new("  ").is_blank());
    }
}

use std::fmt;

/// Maximum length, in bytes, of a session id (§3 of the spec).
pub const MAX_SESSION_ID_LEN: usize = 255;

/// A client-chosen upload session identifier.
///
/// The wire format is a plain string; this wrapper exists so the rest of the codebase
/// can't confuse a session id with an arbitrary `String` at the type level. Validity
/// (non-empty, printable, length-bounded) is enforced by the validator, not by this
/// type's constructors — the server must be able to hold onto ids it has not yet judged
/// valid long enough to reject them with a useful error.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }

    /// A fresh, random session id rendered as a canonical UUID, as recommended by §3.
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SessionId {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl From<&str> for SessionId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

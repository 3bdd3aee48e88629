use std::fmt;

use uuid::Uuid;

/// Authentication context for one pipeline run.
///
/// Passed explicitly to every producer call; nothing about authentication
/// lives in process-wide state, so independent runs can hold independent
/// sessions.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    id: Uuid,
    principal: Option<String>,
    token: Option<String>,
}

impl Session {
    /// A session with no credentials.
    pub fn anonymous() -> Self {
        Self {
            id: Uuid::now_v7(),
            principal: None,
            token: None,
        }
    }

    /// A session carrying a principal and bearer token.
    pub fn authenticated(principal: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: Uuid::now_v7(),
            principal: Some(principal.into()),
            token: Some(token.into()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

// Tokens never reach logs.
impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("principal", &self.principal)
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_session_is_not_authenticated() {
        let session = Session::anonymous();
        assert!(!session.is_authenticated());
        assert_eq!(session.principal(), None);
    }

    #[test]
    fn sessions_are_independent() {
        let a = Session::authenticated("alice", "t-1");
        let b = Session::authenticated("bob", "t-2");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.token(), Some("t-1"));
        assert_eq!(b.principal(), Some("bob"));
    }

    #[test]
    fn debug_redacts_token() {
        let session = Session::authenticated("alice", "secret-token");
        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-token"));
        assert!(rendered.contains("<redacted>"));
    }
}

//! User session context, passed explicitly into services.
//!
//! Created once at app start, populated at login, cleared at logout. Services
//! that need the auth signal hold a shared handle instead of reaching into an
//! ambient global.

use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Bearer credential used for progress API calls.
///
/// `Debug` is redacted so tokens never leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for an `Authorization` header.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AuthToken(***)")
    }
}

/// Identity and credential of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub username: String,
    pub token: AuthToken,
}

impl Credentials {
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        username: impl Into<String>,
        token: AuthToken,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            username: username.into(),
            token,
        }
    }
}

/// Shared authentication state with an explicit lifecycle.
///
/// Starts signed out; `sign_in` installs credentials and `sign_out` clears
/// them. Readers get cheap clones so no lock is held across a suspension point.
#[derive(Debug, Default)]
pub struct SessionContext {
    current: RwLock<Option<Credentials>>,
}

impl SessionContext {
    /// Creates a signed-out session context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a context that is already signed in (tests, token restore).
    #[must_use]
    pub fn signed_in(credentials: Credentials) -> Self {
        Self {
            current: RwLock::new(Some(credentials)),
        }
    }

    pub fn sign_in(&self, credentials: Credentials) {
        *self.write() = Some(credentials);
    }

    pub fn sign_out(&self) {
        *self.write() = None;
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    /// Returns the current bearer token, if signed in.
    #[must_use]
    pub fn token(&self) -> Option<AuthToken> {
        self.read().as_ref().map(|c| c.token.clone())
    }

    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.read().as_ref().map(|c| c.username.clone())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Credentials>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Credentials>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

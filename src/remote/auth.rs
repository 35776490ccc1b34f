//! Access tokens and the identity provider boundary.
//!
//! Token acquisition is owned by the host app. This module only models what
//! the backup core needs from it: whether an account is signed in, and a
//! bearer token for the current session.

use crate::errors::{AppResult, BackupError};
use async_trait::async_trait;
use std::fmt;
use std::sync::RwLock;
use tracing::{debug, info};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Placeholder string for redacted information in debug output.
const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Bearer token for the remote storage API.
///
/// The token never appears in `Debug` output and is zeroized on drop.
///
/// # Example
///
/// ```
/// use rentsync::remote::AccessToken;
///
/// let token = AccessToken::new("ya29.secret");
/// assert_eq!(token.expose(), "ya29.secret");
/// assert!(!format!("{:?}", token).contains("secret"));
/// ```
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wraps a raw token string.
    pub fn new(token: impl Into<String>) -> Self {
        AccessToken(token.into())
    }

    /// Returns the raw token for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns true if the token is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Fails with `NotSignedIn` if the token is blank.
    pub fn ensure_present(&self) -> AppResult<()> {
        if self.is_blank() {
            return Err(BackupError::NotSignedIn.into());
        }
        Ok(())
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("AccessToken")
            .field(&REDACTED_PLACEHOLDER)
            .finish()
    }
}

/// Source of account state and tokens, implemented by the host app.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Returns true if an account is currently signed in.
    async fn is_signed_in(&self) -> bool;

    /// Returns a token for the signed-in account.
    ///
    /// # Errors
    ///
    /// Returns `BackupError::NotSignedIn` when no account is signed in.
    async fn access_token(&self) -> AppResult<AccessToken>;
}

/// Identity provider holding a token pushed in by the host app.
///
/// The host calls `sign_in` whenever its identity SDK hands it a fresh token
/// and `sign_out` when the user disconnects their account.
///
/// # Example
///
/// ```
/// use rentsync::remote::{AccessToken, TokenSession};
///
/// let session = TokenSession::new();
/// assert!(!session.has_token());
///
/// session.sign_in(AccessToken::new("token"));
/// assert!(session.has_token());
///
/// session.sign_out();
/// assert!(!session.has_token());
/// ```
#[derive(Default)]
pub struct TokenSession {
    token: RwLock<Option<AccessToken>>,
}

impl TokenSession {
    /// Creates a signed-out session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the token for the signed-in account, replacing any previous one.
    pub fn sign_in(&self, token: AccessToken) {
        if let Ok(mut slot) = self.token.write() {
            *slot = Some(token);
            info!("Account signed in");
        }
    }

    /// Drops the stored token. The old token is zeroized on drop.
    pub fn sign_out(&self) {
        if let Ok(mut slot) = self.token.write() {
            *slot = None;
            info!("Account signed out");
        }
    }

    /// Returns true if a non-blank token is stored.
    pub fn has_token(&self) -> bool {
        self.token
            .read()
            .map(|slot| slot.as_ref().map_or(false, |t| !t.is_blank()))
            .unwrap_or(false)
    }
}

#[async_trait]
impl IdentityProvider for TokenSession {
    async fn is_signed_in(&self) -> bool {
        self.has_token()
    }

    async fn access_token(&self) -> AppResult<AccessToken> {
        let token = self
            .token
            .read()
            .ok()
            .and_then(|slot| slot.clone())
            .filter(|t| !t.is_blank());

        match token {
            Some(token) => Ok(token),
            None => {
                debug!("Token requested while signed out");
                Err(BackupError::NotSignedIn.into())
            }
        }
    }
}

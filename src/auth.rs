//! Bearer tokens for the authenticated scenarios.
//!
//! When the server runs with a shared secret it authorises each call from a
//! signed JWT in the `authorization` metadata. The suite mints HS256 tokens for
//! three fixed identities and attaches them with a tonic interceptor.

use std::time::{SystemTime, UNIX_EPOCH};

use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tonic::metadata::{Ascii, MetadataValue};
use tonic::service::Interceptor;
use tonic::{Request, Status};

const TOKEN_LIFETIME_SECS: u64 = 60 * 60 * 24;

/// Identities used by the role and ownership scenarios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TestUser {
    /// Cluster administrator with access to every resource.
    Admin,
    /// Regular user who owns the volumes under test.
    User1,
    /// Regular user in the same group as [`TestUser::User1`].
    User2,
}

impl TestUser {
    /// Subject and display name carried in the token.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::User1 => "user1",
            Self::User2 => "user2",
        }
    }

    const fn roles(self) -> &'static [&'static str] {
        match self {
            Self::Admin => &["system.admin"],
            Self::User1 | Self::User2 => &["system.user"],
        }
    }

    const fn groups(self) -> &'static [&'static str] {
        match self {
            Self::Admin => &["*"],
            Self::User1 | Self::User2 => &["users"],
        }
    }
}

/// Claims understood by the OpenStorage token authenticator.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    /// Token issuer; must match the issuer configured on the server.
    pub iss: String,
    /// Unique subject.
    pub sub: String,
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Role names granted to the subject.
    pub roles: Vec<String>,
    /// Groups the subject belongs to.
    pub groups: Vec<String>,
    /// Issued-at, seconds since the epoch.
    pub iat: u64,
    /// Expiry, seconds since the epoch.
    pub exp: u64,
}

impl Claims {
    /// Builds claims for `user` issued at `issued_at`.
    #[must_use]
    pub fn for_user(user: TestUser, issuer: &str, issued_at: u64) -> Self {
        let name = user.name();
        Self {
            iss: issuer.to_owned(),
            sub: name.to_owned(),
            name: name.to_owned(),
            email: format!("{name}@openstorage.io"),
            roles: user.roles().iter().map(|role| (*role).to_owned()).collect(),
            groups: user.groups().iter().map(|group| (*group).to_owned()).collect(),
            iat: issued_at,
            exp: issued_at.saturating_add(TOKEN_LIFETIME_SECS),
        }
    }
}

/// Errors raised while preparing authentication metadata.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The token could not be signed.
    #[error("failed to sign token for {user}: {message}")]
    Encode {
        /// Identity the token was minted for.
        user: &'static str,
        /// Signer diagnostic.
        message: String,
    },
    /// The token is not a valid metadata value.
    #[error("token for {user} is not valid gRPC metadata")]
    InvalidHeader {
        /// Identity the token was minted for.
        user: &'static str,
    },
}

/// Signs an HS256 token for `user`.
///
/// # Errors
///
/// Returns [`AuthError::Encode`] when signing fails.
pub fn mint_token(user: TestUser, secret: &str, issuer: &str) -> Result<String, AuthError> {
    let issued_at = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs());
    let claims = Claims::for_user(user, issuer, issued_at);
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|err| AuthError::Encode {
        user: user.name(),
        message: err.to_string(),
    })
}

/// Interceptor that attaches `authorization: bearer <token>` when a token is
/// configured and passes requests through untouched otherwise.
#[derive(Clone, Debug, Default)]
pub struct TokenInterceptor {
    header: Option<MetadataValue<Ascii>>,
}

impl TokenInterceptor {
    /// Interceptor that sends no credentials.
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { header: None }
    }

    /// Interceptor that presents a freshly minted token for `user`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError`] when the token cannot be minted or encoded.
    pub fn for_user(user: TestUser, secret: &str, issuer: &str) -> Result<Self, AuthError> {
        let token = mint_token(user, secret, issuer)?;
        let header = format!("bearer {token}")
            .parse::<MetadataValue<Ascii>>()
            .map_err(|_| AuthError::InvalidHeader { user: user.name() })?;
        Ok(Self {
            header: Some(header),
        })
    }
}

impl Interceptor for TokenInterceptor {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        if let Some(header) = &self.header {
            request
                .metadata_mut()
                .insert("authorization", header.clone());
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use jsonwebtoken::{DecodingKey, Validation, decode};

    use super::*;

    #[test]
    fn minted_token_carries_user_claims() {
        let token = mint_token(TestUser::User1, "s3cret", "openstorage.io").expect("token");
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&["openstorage.io"]);
        let decoded = decode::<Claims>(
            &token,
            &DecodingKey::from_secret("s3cret".as_bytes()),
            &validation,
        )
        .expect("decodes with the same secret");

        assert_eq!(decoded.claims.sub, "user1");
        assert_eq!(decoded.claims.roles, vec![String::from("system.user")]);
        assert_eq!(decoded.claims.groups, vec![String::from("users")]);
    }

    #[test]
    fn admin_claims_grant_every_group() {
        let claims = Claims::for_user(TestUser::Admin, "openstorage.io", 100);
        assert_eq!(claims.roles, vec![String::from("system.admin")]);
        assert_eq!(claims.groups, vec![String::from("*")]);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn interceptor_inserts_bearer_header() {
        let mut interceptor =
            TokenInterceptor::for_user(TestUser::Admin, "s3cret", "openstorage.io")
                .expect("interceptor");
        let request = interceptor.call(Request::new(())).expect("passes");
        let header = request
            .metadata()
            .get("authorization")
            .expect("authorization header")
            .to_str()
            .expect("ascii");
        assert!(header.starts_with("bearer "), "header: {header}");
    }

    #[test]
    fn anonymous_interceptor_leaves_metadata_empty() {
        let mut interceptor = TokenInterceptor::anonymous();
        let request = interceptor.call(Request::new(())).expect("passes");
        assert!(request.metadata().get("authorization").is_none());
    }
}

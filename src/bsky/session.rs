use super::client::{XrpcClient, XrpcError};
use crate::config::{ConfigError, Credentials};
use secrecy::SecretString;
use thiserror::Error;

/// Failure to establish an authenticated session. All variants are fatal.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Credentials are missing; no request was sent
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The server answered, and refused
    #[error("Credentials rejected by {service}: {source}")]
    Rejected {
        service: String,
        #[source]
        source: XrpcError,
    },
    /// The request never produced a usable answer
    #[error("Authentication request failed: {0}")]
    Transport(#[source] XrpcError),
}

/// An authenticated identity, held for the duration of one run.
///
/// Never persisted. Custom Debug impl masks the access token.
pub struct Session {
    did: String,
    handle: String,
    access_jwt: SecretString,
}

impl Session {
    pub fn new(did: String, handle: String, access_jwt: SecretString) -> Self {
        Self {
            did,
            handle,
            access_jwt,
        }
    }

    /// The account DID; used as `actor` when listing and `repo` when posting.
    pub fn did(&self) -> &str {
        &self.did
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub(crate) fn access_jwt(&self) -> &SecretString {
        &self.access_jwt
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("did", &self.did)
            .field("handle", &self.handle)
            .field("access_jwt", &"[REDACTED]")
            .finish()
    }
}

/// Establishes a session from account credentials.
///
/// Both credentials are checked before anything is sent: a missing value
/// fails with [`SessionError::Config`] and zero network calls.
///
/// # Errors
///
/// - [`SessionError::Config`] - identifier or password unset
/// - [`SessionError::Rejected`] - the server returned an error status
/// - [`SessionError::Transport`] - network failure or malformed response
pub async fn establish(
    client: &XrpcClient,
    credentials: &Credentials,
) -> Result<Session, SessionError> {
    let (identifier, password) = credentials.require()?;

    tracing::debug!(service = %client.service(), identifier = %identifier, "Creating session");

    match client.create_session(identifier, password).await {
        Ok(session) => {
            tracing::info!(did = %session.did(), handle = %session.handle(), "Authenticated");
            Ok(session)
        }
        Err(source @ XrpcError::Status { .. }) => Err(SessionError::Rejected {
            service: client.service().to_string(),
            source,
        }),
        Err(source) => Err(SessionError::Transport(source)),
    }
}

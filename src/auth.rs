//! OAuth2 authentication and Gmail API initialization

use async_trait::async_trait;
use google_gmail1::{hyper_rustls, hyper_util, yup_oauth2, Gmail};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use yup_oauth2::ApplicationSecret;

use crate::client::{GmailClient, ProductionGmailClient, MODIFY_SCOPE};
use crate::error::ArchiveError;

/// Gmail API scopes requested during the OAuth flow
///
/// gmail.modify covers listing messages and changing their labels without
/// permanent deletion rights.
pub const REQUIRED_SCOPES: &[&str] = &[MODIFY_SCOPE];

/// Environment variable holding the OAuth client id
pub const CLIENT_ID_ENV: &str = "GMAIL_CLIENT_ID";

/// Environment variable holding the OAuth client secret
pub const CLIENT_SECRET_ENV: &str = "GMAIL_CLIENT_SECRET";

const AUTH_URI: &str = "https://accounts.google.com/o/oauth2/auth";
const TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
const DEFAULT_REDIRECT_URI: &str = "http://localhost";

/// Type alias for Gmail Hub to simplify type signatures
pub type GmailHub = Gmail<hyper_rustls::HttpsConnector<hyper_util::client::legacy::connect::HttpConnector>>;

/// OAuth client id and secret of a Google Cloud "Desktop application" client
#[derive(Clone, PartialEq, Eq)]
pub struct ClientCredentials {
    client_id: String,
    client_secret: String,
}

impl ClientCredentials {
    /// Build credentials, rejecting blank values before any network call
    pub fn new(
        client_id: impl AsRef<str>,
        client_secret: impl AsRef<str>,
    ) -> Result<Self, ArchiveError> {
        let client_id = client_id.as_ref().trim();
        let client_secret = client_secret.as_ref().trim();

        if client_id.is_empty() || client_secret.is_empty() {
            return Err(ArchiveError::MissingCredentials);
        }

        Ok(Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
        })
    }

    /// Load credentials from `GMAIL_CLIENT_ID` / `GMAIL_CLIENT_SECRET`
    pub fn from_env() -> Result<Self, ArchiveError> {
        let client_id = env::var(CLIENT_ID_ENV).map_err(|_| ArchiveError::MissingCredentials)?;
        let client_secret =
            env::var(CLIENT_SECRET_ENV).map_err(|_| ArchiveError::MissingCredentials)?;
        Self::new(client_id, client_secret)
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// ApplicationSecret ready for use with the installed-flow authenticator
    pub fn to_application_secret(&self) -> ApplicationSecret {
        ApplicationSecret {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            auth_uri: AUTH_URI.to_string(),
            token_uri: TOKEN_URI.to_string(),
            redirect_uris: vec![DEFAULT_REDIRECT_URI.to_string()],
            ..Default::default()
        }
    }
}

impl fmt::Debug for ClientCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Produces an authenticated Gmail handle
///
/// Token refresh and caching are the implementor's business; the archiver
/// only ever asks for a ready client.
#[async_trait]
pub trait Authenticator: Send + Sync {
    type Client: GmailClient;

    async fn connect(&self) -> Result<Self::Client, ArchiveError>;
}

/// Installed-app OAuth2 flow with the token cached on disk
pub struct OAuthAuthenticator {
    credentials: ClientCredentials,
    token_cache: PathBuf,
    request_timeout: Duration,
}

impl OAuthAuthenticator {
    pub fn new(credentials: ClientCredentials, token_cache: impl Into<PathBuf>) -> Self {
        Self {
            credentials,
            token_cache: token_cache.into(),
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Bound every API call made by the resulting client
    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn token_cache(&self) -> &Path {
        &self.token_cache
    }
}

#[async_trait]
impl Authenticator for OAuthAuthenticator {
    type Client = ProductionGmailClient;

    async fn connect(&self) -> Result<Self::Client, ArchiveError> {
        let hub = initialize_gmail_hub(&self.credentials, &self.token_cache).await?;
        Ok(ProductionGmailClient::new(hub, self.request_timeout))
    }
}

/// Initialize Gmail API hub with OAuth2 authentication
///
/// This function sets up the complete Gmail API client with:
/// - OAuth2 authentication using InstalledFlow (desktop app flow)
/// - Token persistence to disk for automatic refresh
/// - HTTP/1 client with TLS support
///
/// # Arguments
/// * `credentials` - OAuth client id and secret
/// * `token_cache_path` - Path where access tokens will be cached
pub async fn initialize_gmail_hub(
    credentials: &ClientCredentials,
    token_cache_path: &Path,
) -> Result<GmailHub, ArchiveError> {
    if let Some(parent) = token_cache_path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    // HTTPRedirect opens a browser for user authorization
    let auth = yup_oauth2::InstalledFlowAuthenticator::builder(
        credentials.to_application_secret(),
        yup_oauth2::InstalledFlowReturnMethod::HTTPRedirect,
    )
    .persist_tokens_to_disk(token_cache_path)
    .build()
    .await
    .map_err(|e| ArchiveError::Authentication(format!("Failed to build authenticator: {}", e)))?;

    // Obtain the token up front so a bad client id fails here, not mid-run
    auth.token(REQUIRED_SCOPES)
        .await
        .map_err(|e| ArchiveError::Authentication(format!("Failed to obtain token: {}", e)))?;
    debug!("OAuth token available for {:?}", REQUIRED_SCOPES);

    if token_cache_path.exists() {
        secure_token_file(token_cache_path).await?;
    }

    // HTTP/1 works better with google-gmail1 than the HTTP/2 default
    let client = hyper_util::client::legacy::Client::builder(hyper_util::rt::TokioExecutor::new())
        .build(
            hyper_rustls::HttpsConnectorBuilder::new()
                .with_native_roots()
                .map_err(|e| {
                    ArchiveError::Authentication(format!("Failed to load TLS roots: {}", e))
                })?
                .https_or_http()
                .enable_http1()
                .build(),
        );

    info!("Connected to Gmail API");
    Ok(Gmail::new(client, auth))
}

/// Secure token file permissions on Unix systems
///
/// Sets file permissions to 0600 (read/write for owner only)
#[cfg(unix)]
pub async fn secure_token_file(path: &Path) -> Result<(), ArchiveError> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    perms.set_mode(0o600);
    tokio::fs::set_permissions(path, perms).await?;
    Ok(())
}

/// Windows relies on the profile directory ACLs
#[cfg(windows)]
pub async fn secure_token_file(_path: &Path) -> Result<(), ArchiveError> {
    Ok(())
}

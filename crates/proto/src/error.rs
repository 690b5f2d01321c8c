use thiserror::Error;

/// Top-level error type
#[derive(Debug, Error)]
pub enum Error {
    /// Registry or settings error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigurationError),

    /// Credential resolution error.
    #[error("Credentials error: {0}")]
    Credentials(#[from] CredentialsError),

    /// Network-level failure talking to a channel.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// A required registry or connection value was not provided.
    #[error("Missing configuration for {channel}: {key}")]
    MissingConfiguration { channel: String, key: String },

    /// The logical endpoint has no path in the registry.
    #[error("Endpoint '{endpoint}' is not configured for {channel}")]
    UnconfiguredEndpoint { channel: String, endpoint: String },

    /// No adapter exists for this channel name.
    #[error("Unsupported channel: {0}")]
    UnsupportedChannel(String),

    /// A field has an invalid value and reason.
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    /// Filesystem read error.
    #[error("IO error reading config: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parse error.
    #[error("TOML parse error: {0}")]
    Toml(String),
}

/// Credential errors
#[derive(Debug, Error)]
pub enum CredentialsError {
    /// A mandatory credential field is absent from every source.
    #[error("Missing credential '{field}' for {channel}")]
    MissingCredentials { channel: String, field: String },

    /// Credential material is present but unusable.
    #[error("Invalid credentials for {channel}: {reason}")]
    InvalidCredentials { channel: String, reason: String },
}

/// Transport errors
///
/// These never cross an adapter boundary: adapters turn them into failure
/// envelopes after reporting them.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// Connect or read deadline elapsed.
    #[error("Timed out: {0}")]
    Timeout(String),

    /// DNS, TCP or TLS connection failure.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// Request could not be built or sent.
    #[error("Request failed: {0}")]
    Request(String),

    /// Response body could not be read.
    #[error("Body read failed: {0}")]
    Body(String),
}

/// Setup-time errors surfaced by channel operations.
///
/// Runtime failures are represented in [`crate::ChannelResponse`] instead.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// Registry/deployment defect.
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// Missing or unusable credentials.
    #[error(transparent)]
    Credentials(#[from] CredentialsError),
}

impl From<ChannelError> for Error {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Configuration(e) => Error::Config(e),
            ChannelError::Credentials(e) => Error::Credentials(e),
        }
    }
}

//! Error types for promptline.
//!
//! Every failure the REPL, the providers, or the configuration layer can
//! produce is a variant of [`Error`].  Two variants are not failures in the
//! usual sense: [`Error::BlankInput`] marks a turn whose text was empty once
//! mentions were stripped, and [`Error::EndOfStream`] lets a provider end a
//! token stream early without it counting as a failure.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::str::Utf8Error;
use std::sync::Arc;

/// Shared, cloneable underlying cause of an error.
pub type Cause = Arc<dyn StdError + Send + Sync>;

fn boxed_cause(cause: Option<Box<dyn StdError + Send + Sync>>) -> Option<Cause> {
    cause.map(Cause::from)
}

/// Everything that can go wrong in promptline.
#[derive(Clone, Debug)]
pub enum Error {
    /// Unclassified non-success status from a provider.
    Api { status_code: u16, message: String },

    /// Missing or rejected credentials.
    Authentication { message: String },

    /// The provider does not know the requested model.
    ModelNotFound {
        message: String,
        model: Option<String>,
    },

    /// The provider refused the request as malformed.
    BadRequest { message: String },

    /// Too many requests; `retry_after` is in seconds when the provider says.
    RateLimit {
        message: String,
        retry_after: Option<u64>,
    },

    /// The request did not finish in time; `duration` is in seconds.
    Timeout {
        message: String,
        duration: Option<f64>,
    },

    /// The connection could not be made or was lost.
    Connection {
        message: String,
        cause: Option<Cause>,
    },

    /// 5xx from the provider.
    ServerError { status_code: u16, message: String },

    /// JSON could not be produced or parsed.
    Serialization {
        message: String,
        cause: Option<Cause>,
    },

    /// Local file or terminal I/O failed.
    Io {
        message: String,
        cause: Arc<io::Error>,
    },

    /// The HTTP client failed outside of connecting or timing out.
    HttpClient {
        message: String,
        cause: Option<Cause>,
    },

    /// An endpoint URL was malformed.
    Url {
        message: String,
        cause: Option<url::ParseError>,
    },

    /// A token stream broke off mid-response.
    Streaming {
        message: String,
        cause: Option<Cause>,
    },

    /// Bytes were not valid text.
    Encoding {
        message: String,
        cause: Option<Cause>,
    },

    /// Configuration could not be read or made no sense.
    Config { message: String },

    /// A value supplied by the user was rejected; `param` names it.
    Validation {
        message: String,
        param: Option<String>,
    },

    /// No provider is registered under `name`.
    UnknownProvider { name: String },

    /// `name` is not a top-level command.
    UnknownCommand { name: String },

    /// The terminal could not deliver a line.
    Readline { message: String },

    /// Nothing left to send once mentions were removed.
    BlankInput,

    /// The provider finished its token stream.
    EndOfStream,

    /// The provider cannot do what was asked.
    Unsupported { message: String },
}

impl Error {
    pub fn api(status_code: u16, message: impl Into<String>) -> Self {
        Error::Api {
            status_code,
            message: message.into(),
        }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Error::Authentication {
            message: message.into(),
        }
    }

    pub fn model_not_found(message: impl Into<String>, model: Option<String>) -> Self {
        Error::ModelNotFound {
            message: message.into(),
            model,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Error::BadRequest {
            message: message.into(),
        }
    }

    pub fn rate_limit(message: impl Into<String>, retry_after: Option<u64>) -> Self {
        Error::RateLimit {
            message: message.into(),
            retry_after,
        }
    }

    pub fn timeout(message: impl Into<String>, duration: Option<f64>) -> Self {
        Error::Timeout {
            message: message.into(),
            duration,
        }
    }

    pub fn connection(
        message: impl Into<String>,
        cause: Option<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Error::Connection {
            message: message.into(),
            cause: boxed_cause(cause),
        }
    }

    pub fn server_error(status_code: u16, message: impl Into<String>) -> Self {
        Error::ServerError {
            status_code,
            message: message.into(),
        }
    }

    pub fn serialization(
        message: impl Into<String>,
        cause: Option<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Error::Serialization {
            message: message.into(),
            cause: boxed_cause(cause),
        }
    }

    pub fn io(message: impl Into<String>, cause: io::Error) -> Self {
        Error::Io {
            message: message.into(),
            cause: Arc::new(cause),
        }
    }

    pub fn http_client(
        message: impl Into<String>,
        cause: Option<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Error::HttpClient {
            message: message.into(),
            cause: boxed_cause(cause),
        }
    }

    pub fn url(message: impl Into<String>, cause: Option<url::ParseError>) -> Self {
        Error::Url {
            message: message.into(),
            cause,
        }
    }

    pub fn streaming(
        message: impl Into<String>,
        cause: Option<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Error::Streaming {
            message: message.into(),
            cause: boxed_cause(cause),
        }
    }

    pub fn encoding(
        message: impl Into<String>,
        cause: Option<Box<dyn StdError + Send + Sync>>,
    ) -> Self {
        Error::Encoding {
            message: message.into(),
            cause: boxed_cause(cause),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Error::Config {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>, param: Option<String>) -> Self {
        Error::Validation {
            message: message.into(),
            param,
        }
    }

    pub fn unknown_provider(name: impl Into<String>) -> Self {
        Error::UnknownProvider { name: name.into() }
    }

    pub fn unknown_command(name: impl Into<String>) -> Self {
        Error::UnknownCommand { name: name.into() }
    }

    pub fn readline(message: impl Into<String>) -> Self {
        Error::Readline {
            message: message.into(),
        }
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::Unsupported {
            message: message.into(),
        }
    }

    pub fn is_blank_input(&self) -> bool {
        matches!(self, Error::BlankInput)
    }

    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Error::EndOfStream)
    }

    pub fn is_authentication(&self) -> bool {
        matches!(self, Error::Authentication { .. })
    }

    pub fn is_model_not_found(&self) -> bool {
        matches!(self, Error::ModelNotFound { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Timeout { .. })
    }

    pub fn is_config(&self) -> bool {
        matches!(self, Error::Config { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Error::Validation { .. })
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self, Error::Streaming { .. })
    }

    /// True for transport conditions that may clear up on their own.
    ///
    /// Nothing in the REPL retries; this only informs what gets logged.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status_code, .. } => matches!(status_code, 408 | 409 | 429),
            Error::Timeout { .. }
            | Error::Connection { .. }
            | Error::RateLimit { .. }
            | Error::ServerError { .. } => true,
            _ => false,
        }
    }

    /// HTTP status behind the error, for the variants that carry one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Api { status_code, .. } | Error::ServerError { status_code, .. } => {
                Some(*status_code)
            }
            _ => None,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Error::Api { .. } => "API error",
            Error::Authentication { .. } => "Authentication error",
            Error::ModelNotFound { .. } => "Model not found",
            Error::BadRequest { .. } => "Bad request",
            Error::RateLimit { .. } => "Rate limit exceeded",
            Error::Timeout { .. } => "Timeout error",
            Error::Connection { .. } => "Connection error",
            Error::ServerError { .. } => "Server error",
            Error::Serialization { .. } => "Serialization error",
            Error::Io { .. } => "I/O error",
            Error::HttpClient { .. } => "HTTP client error",
            Error::Url { .. } => "URL error",
            Error::Streaming { .. } => "Response stream error",
            Error::Encoding { .. } => "Encoding error",
            Error::Config { .. } => "Configuration error",
            Error::Validation { .. } => "Validation error",
            Error::UnknownProvider { .. } => "Unknown provider",
            Error::UnknownCommand { .. } => "Unknown command",
            Error::Readline { .. } => "Input error",
            Error::BlankInput => "No input",
            Error::EndOfStream => "End of stream",
            Error::Unsupported { .. } => "Unsupported",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            Error::Api { message, .. }
            | Error::Authentication { message }
            | Error::ModelNotFound { message, .. }
            | Error::BadRequest { message }
            | Error::RateLimit { message, .. }
            | Error::Timeout { message, .. }
            | Error::Connection { message, .. }
            | Error::ServerError { message, .. }
            | Error::Serialization { message, .. }
            | Error::Io { message, .. }
            | Error::HttpClient { message, .. }
            | Error::Url { message, .. }
            | Error::Streaming { message, .. }
            | Error::Encoding { message, .. }
            | Error::Config { message }
            | Error::Validation { message, .. }
            | Error::Readline { message }
            | Error::Unsupported { message } => Some(message.as_str()),
            Error::UnknownProvider { name } | Error::UnknownCommand { name } => Some(name.as_str()),
            Error::BlankInput | Error::EndOfStream => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Error::ModelNotFound {
            message,
            model: Some(model),
        } = self
        {
            return write!(f, "Model [{model}] not found: {message}");
        }
        f.write_str(self.label())?;
        if let Some(status) = self.status_code() {
            write!(f, " (status {status})")?;
        }
        if let Some(detail) = self.detail() {
            write!(f, ": {detail}")?;
        }
        match self {
            Error::RateLimit {
                retry_after: Some(secs),
                ..
            } => write!(f, " (retry after {secs} seconds)"),
            Error::Timeout {
                duration: Some(secs),
                ..
            } => write!(f, " ({secs} seconds)"),
            Error::Validation {
                param: Some(param), ..
            } => write!(f, " (parameter: {param})"),
            _ => Ok(()),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Connection { cause, .. }
            | Error::Serialization { cause, .. }
            | Error::HttpClient { cause, .. }
            | Error::Streaming { cause, .. }
            | Error::Encoding { cause, .. } => {
                cause.as_deref().map(|c| c as &(dyn StdError + 'static))
            }
            Error::Io { cause, .. } => Some(cause.as_ref()),
            Error::Url { cause, .. } => cause.as_ref().map(|c| c as &(dyn StdError + 'static)),
            _ => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::io(err.to_string(), err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        let message = format!("invalid JSON: {err}");
        Error::serialization(message, Some(Box::new(err)))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::config(format!("invalid TOML: {err}"))
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::url(format!("cannot parse URL: {err}"), Some(err))
    }
}

impl From<Utf8Error> for Error {
    fn from(err: Utf8Error) -> Self {
        Error::encoding(format!("invalid UTF-8: {err}"), Some(Box::new(err)))
    }
}

impl From<rustyline::error::ReadlineError> for Error {
    fn from(err: rustyline::error::ReadlineError) -> Self {
        Error::readline(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

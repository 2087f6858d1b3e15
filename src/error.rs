use std::error::Error as StdError;

/// Failures at the notebook server boundary that end the program.
///
/// Degraded responses (non-200, malformed JSON) never become an `ApiError`;
/// they are absorbed by the session parser as an empty listing.
#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("certificate verification failed for {url}")]
    Tls { url: String },
    #[error("connection to {url} failed!")]
    Connect { url: String },
    #[error("unsupported url scheme {scheme:?}, expected http or https")]
    UnsupportedScheme { scheme: String },
    #[error("invalid server url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        source: url::ParseError,
    },
    #[error("login to {url} failed: password rejected")]
    LoginRejected { url: String },
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        source: reqwest::Error,
    },
}

impl ApiError {
    /// Sorts a transport error into the fatal categories the user sees.
    pub fn from_transport(url: &str, err: reqwest::Error) -> Self {
        if mentions_certificate(&err) {
            return Self::Tls {
                url: url.to_string(),
            };
        }
        if err.is_connect() || err.is_timeout() {
            return Self::Connect {
                url: url.to_string(),
            };
        }
        Self::Request {
            url: url.to_string(),
            source: err,
        }
    }

    pub fn exit_code(&self) -> u8 {
        1
    }
}

fn mentions_certificate(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let text = e.to_string().to_lowercase();
        if text.contains("certificate") || text.contains("invalidcert") {
            return true;
        }
        current = e.source();
    }
    false
}

//! Error taxonomy shared by every core component.
//!
//! The variants map one-to-one onto how a caller should react:
//!
//! | Variant | Meaning | HTTP |
//! |---------|---------|------|
//! | [`CoreError::InvalidInput`] | Caller supplied something unusable; nothing was mutated | 400 |
//! | [`CoreError::NotFound`] | Unknown document id | 404 |
//! | [`CoreError::Gateway`] | Embedding or completion call failed | 500 |
//! | [`CoreError::Contract`] | Internal invariant broken (corrupt snapshot, wrong vector count) | 500 |

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("gateway failure: {0}")]
    Gateway(String),

    #[error("contract violation: {0}")]
    Contract(String),
}

impl CoreError {
    pub fn invalid(message: impl Into<String>) -> Self {
        CoreError::InvalidInput(message.into())
    }

    pub fn contract(message: impl Into<String>) -> Self {
        CoreError::Contract(message.into())
    }

    /// Wrap a gateway error, keeping only the top-level message.
    ///
    /// `anyhow` chains from reqwest can carry response bodies; only the
    /// outermost context is kept so callers see a short diagnostic.
    pub fn gateway(err: &anyhow::Error) -> Self {
        let mut message = err.to_string();
        if message.len() > 200 {
            let mut cut = 200;
            while !message.is_char_boundary(cut) {
                cut -= 1;
            }
            message.truncate(cut);
        }
        CoreError::Gateway(message)
    }

    /// Machine-readable code used in API error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            CoreError::InvalidInput(_) => "bad_request",
            CoreError::NotFound(_) => "not_found",
            CoreError::Gateway(_) => "gateway_error",
            CoreError::Contract(_) => "internal",
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(self, CoreError::InvalidInput(_) | CoreError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;

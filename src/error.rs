use thiserror::Error;

/// Why a login attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    UserNotFound,
    WrongPassword,
}

impl std::fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            AuthFailure::UserNotFound => "Utilisateur introuvable",
            AuthFailure::WrongPassword => "Mot de passe incorrect",
        })
    }
}

/// Errors surfaced to the user by every client operation.
///
/// Each variant renders to the text shown in the alert, so callers never need
/// to inspect the variant just to report it.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A required form field is missing or malformed. Never reaches the store.
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    /// The referenced record could not be located.
    #[error("{0}")]
    NotFound(String),

    /// Any failure reported by the document store or the network.
    #[error("Une erreur est survenue : {0}")]
    Store(String),

    #[error("{0}")]
    Auth(AuthFailure),

    /// A conditional write kept losing to concurrent writers.
    #[error("Les données ont été modifiées par un autre utilisateur, réessayez")]
    Conflict,

    #[error("Veuillez vous connecter")]
    NotLoggedIn,

    /// A navigation request that the current screen does not offer.
    #[error("Action impossible depuis cet écran")]
    InvalidNavigation,
}

impl ClientError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn store(err: impl std::fmt::Display) -> Self {
        Self::Store(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        Self::Store(format!("invalid document: {err}"))
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::Store(err.to_string())
    }
}

pub type ClientResult<T> = std::result::Result<T, ClientError>;

use shared::ValidationError;
use thiserror::Error;
use time::Duration;
use crate::ballot::{Event, Phase};

/// Every failure the session core can surface. `Clone` because results are
/// handed to every caller sharing a single in-flight request.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum Error {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("Not signed in. Please verify your token.")]
    NotAuthenticated,
    #[error("Session expired. Please verify your token again.")]
    SessionExpired,
    #[error("This credential has already been used and cannot be reused")]
    CredentialRetired,
    #[error("Rate limit exceeded. Please try again {}.", retry_hint(.retry_after))]
    RateLimited { retry_after: Option<Duration> },
    #[error("Network error: {0}")]
    Transient(String),
    #[error("{detail}")]
    Rejected { status: u16, detail: String },
    #[error("Unexpected response from server: {0}")]
    Decode(String),
    #[error("Failed to cast votes: {0}")]
    Submission(Box<Error>),
    #[error("Please make at least one selection")]
    EmptySelection,
    #[error("Every contest was declined, so there are no votes to submit")]
    NothingToSubmit,
    #[error("Unknown contest {0}")]
    UnknownContest(String),
    #[error("Candidate {candidate_id} is not standing in contest {contest_id}")]
    UnknownCandidate { contest_id: String, candidate_id: String },
    #[error("Cannot {event:?} while {phase:?}")]
    InvalidTransition { phase: Phase, event: Event },
}

fn retry_hint(retry_after: &Option<Duration>) -> String {
    match retry_after {
        Some(d) => format!("in {} seconds", d.whole_seconds()),
        None => "later".into(),
    }
}

impl Error {
    /// Errors that end the session and send the voter back to verification.
    pub fn is_session_loss(&self) -> bool {
        match self {
            Error::SessionExpired | Error::NotAuthenticated | Error::CredentialRetired => true,
            Error::Submission(inner) => inner.is_session_loss(),
            _ => false,
        }
    }

    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Transient(_))
    }

    pub fn from_json(e: serde_json::Error) -> Self {
        Error::Decode(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

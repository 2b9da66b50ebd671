use crate::models::VoteEntry;

pub const VOTER_TOKEN_LENGTH: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Please enter your voting token")]
    EmptyToken,
    #[error("Token must be exactly {VOTER_TOKEN_LENGTH} characters (got {0})")]
    TokenLength(usize),
    #[error("Votes must be a non-empty list")]
    NoVotes,
    #[error("Each vote must have portfolio_id and candidate_id")]
    IncompleteVote,
    #[error("More than one vote for portfolio {0}")]
    DuplicatePortfolio(String),
}

/// Strips separators and other non-alphanumeric characters from a voter
/// token as typed, then checks its length.
pub fn normalize_token(raw: &str) -> Result<String, ValidationError> {
    let token: String = raw.chars().filter(char::is_ascii_alphanumeric).collect();

    match token.len() {
        0 => Err(ValidationError::EmptyToken),
        VOTER_TOKEN_LENGTH => Ok(token),
        n => Err(ValidationError::TokenLength(n)),
    }
}

pub fn validate_votes(votes: &[VoteEntry]) -> Result<(), ValidationError> {
    if votes.is_empty() { return Err(ValidationError::NoVotes); }
    if votes.iter().any(|v| v.portfolio_id.is_empty() || v.candidate_id.is_empty()) {
        return Err(ValidationError::IncompleteVote);
    }

    let mut seen = std::collections::HashSet::new();
    if let Some(dup) = votes.iter().find(|v| !seen.insert(v.portfolio_id.as_str())) {
        return Err(ValidationError::DuplicatePortfolio(dup.portfolio_id.clone()));
    }

    Ok(())
}

use serde::{Deserialize, Deserializer, Serialize};

/// Lifetime the backend grants an access token when `expires_in` is absent.
pub const DEFAULT_TOKEN_TTL_SECONDS: u64 = 600;

fn default_expires_in() -> u64 {
    DEFAULT_TOKEN_TTL_SECONDS
}

/// The backend sends unset optional fields as `null`; treat that the same
/// as a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Profile of the authenticated voter, as returned on verification.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Electorate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub electoral_area: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub has_voted: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyRequest {
    pub token: String,
    pub current_location: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VerifyResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
    pub electorate: Electorate,
}

/// Body of `POST /auth/refresh`. The renewal credential itself travels as a
/// cookie and never appears here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RefreshResponse {
    pub access_token: String,
    #[serde(default = "default_expires_in")]
    pub expires_in: u64,
}

/// A contest on the ballot. The backend calls these portfolios.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Portfolio {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub voting_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BallotCandidate {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub display_order: i32,
    #[serde(default)]
    pub portfolio: Option<Portfolio>,
    #[serde(default)]
    pub picture_url: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub manifesto: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct VoteEntry {
    pub portfolio_id: String,
    pub candidate_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteRequest {
    pub votes: Vec<VoteEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedVote {
    #[serde(default)]
    pub portfolio_id: Option<String>,
    #[serde(default)]
    pub candidate_id: Option<String>,
    pub reason: String,
}

/// Receipt for an accepted vote submission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoteResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub votes_cast: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub failed_votes: Vec<FailedVote>,
}

impl VoteResponse {
    pub fn is_partial(&self) -> bool {
        !self.failed_votes.is_empty()
    }
}

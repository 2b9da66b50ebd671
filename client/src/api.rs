use shared::{
    normalize_token, validate_votes, BallotCandidate, VerifyRequest, VerifyResponse, VoteEntry, VoteRequest,
    VoteResponse,
};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::gateway::{Access, Gateway};

pub const VERIFY_PATH: &str = "/auth/verify-id";
pub const BALLOT_PATH: &str = "/voting/ballot";
pub const VOTE_PATH: &str = "/voting/vote";
pub const RESULTS_PATH: &str = "/results";

/// Typed calls for the voter-facing backend endpoints.
#[derive(Clone)]
pub struct VotingApi {
    gateway: Gateway,
}

impl VotingApi {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Exchanges a voter token for an access credential and stores it. A
    /// malformed token is rejected here and never sent.
    pub async fn verify(&self, raw_token: &str, current_location: Option<String>) -> Result<VerifyResponse> {
        let token = normalize_token(raw_token)?;
        let request = VerifyRequest { token, current_location };

        let verified: VerifyResponse = self.gateway.post_json(VERIFY_PATH, &request, Access::Public, &[]).await?;

        self.gateway.reset();
        self.gateway.credentials().store(
            verified.access_token.clone(),
            verified.expires_in,
            verified.electorate.clone(),
        )?;
        Ok(verified)
    }

    pub async fn ballot(&self) -> Result<Vec<BallotCandidate>> {
        self.gateway.get_json(BALLOT_PATH, Access::Authorized).await
    }

    /// Casts the ballot. Once the backend accepts the write the credential
    /// is retired, even if the receipt cannot be read, so the same session
    /// can never submit twice.
    pub async fn cast_vote(&self, votes: Vec<VoteEntry>) -> Result<VoteResponse> {
        validate_votes(&votes)?;
        let submitted = votes.len() as u32;
        let request = VoteRequest { votes };
        let body = serde_json::to_string(&request).map_err(Error::from_json)?;

        let payload = self.gateway
            .write(VOTE_PATH, Some(body), Access::Authorized, &[RESULTS_PATH])
            .await?;
        self.gateway.credentials().clear();

        let receipt = serde_json::from_str::<VoteResponse>(&payload).unwrap_or_else(|e| {
            warn!(error = %e, "Vote accepted but receipt unreadable");
            VoteResponse {
                message: "Votes cast successfully".to_string(),
                votes_cast: submitted,
                failed_votes: Vec::new(),
            }
        });
        info!(votes_cast = receipt.votes_cast, failed = receipt.failed_votes.len(), "Votes cast");
        Ok(receipt)
    }
}

use std::collections::BTreeMap;
use serde::{Serialize, Deserialize};
use crate::models::{BallotCandidate, Portfolio, VoteEntry};

/// One contest with its candidates in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contest {
    pub portfolio: Portfolio,
    pub candidates: Vec<BallotCandidate>,
}

impl Contest {
    pub fn id(&self) -> &str { &self.portfolio.id }

    pub fn candidate(&self, candidate_id: &str) -> Option<&BallotCandidate> {
        self.candidates.iter().find(|c| c.id == candidate_id)
    }

    /// Single-candidate contests are answered with endorse/decline rather than
    /// a choice between candidates.
    pub fn is_single_candidate(&self) -> bool { self.candidates.len() == 1 }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ballot {
    contests: Vec<Contest>,
}

impl Ballot {
    /// Groups the flat candidate list from the backend into contests, ordered
    /// by voting order and then by each candidate's display order. Candidates
    /// that carry no portfolio are dropped.
    pub fn from_candidates(candidates: Vec<BallotCandidate>) -> Self {
        let mut contests: Vec<Contest> = Vec::new();

        for candidate in candidates {
            let Some(portfolio) = candidate.portfolio.clone() else { continue };
            match contests.iter_mut().find(|c| c.portfolio.id == portfolio.id) {
                Some(contest) => contest.candidates.push(candidate),
                None => contests.push(Contest { portfolio, candidates: vec![candidate] }),
            }
        }

        contests.sort_by_key(|c| c.portfolio.voting_order);
        for contest in &mut contests {
            contest.candidates.sort_by_key(|c| c.display_order);
        }

        Self { contests }
    }

    pub fn contests(&self) -> &[Contest] { &self.contests }

    pub fn contest(&self, contest_id: &str) -> Option<&Contest> {
        self.contests.iter().find(|c| c.id() == contest_id)
    }

    pub fn len(&self) -> usize { self.contests.len() }

    pub fn is_empty(&self) -> bool { self.contests.is_empty() }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Choice {
    Candidate(String),
    /// Explicit refusal to endorse, distinct from leaving the contest unset.
    Decline,
}

/// The voter's current answers, at most one per contest.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selections {
    choices: BTreeMap<String, Choice>,
}

impl Selections {
    /// Selects `candidate_id` for the contest, or clears the contest if that
    /// candidate was already selected. Returns the resulting choice.
    pub fn toggle(&mut self, contest_id: &str, candidate_id: &str) -> Option<&Choice> {
        let already = matches!(
            self.choices.get(contest_id),
            Some(Choice::Candidate(current)) if current == candidate_id
        );

        if already {
            self.choices.remove(contest_id);
            None
        } else {
            self.choices.insert(contest_id.to_string(), Choice::Candidate(candidate_id.to_string()));
            self.choices.get(contest_id)
        }
    }

    pub fn decline(&mut self, contest_id: &str) {
        self.choices.insert(contest_id.to_string(), Choice::Decline);
    }

    pub fn clear(&mut self, contest_id: &str) -> Option<Choice> {
        self.choices.remove(contest_id)
    }

    pub fn get(&self, contest_id: &str) -> Option<&Choice> { self.choices.get(contest_id) }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Choice)> {
        self.choices.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize { self.choices.len() }

    pub fn is_empty(&self) -> bool { self.choices.is_empty() }

    pub fn vote_count(&self) -> usize {
        self.choices.values().filter(|c| matches!(c, Choice::Candidate(_))).count()
    }

    pub fn declined_count(&self) -> usize { self.len() - self.vote_count() }

    /// Builds the submission payload. Declines are not votes and are left out.
    pub fn to_votes(&self) -> Vec<VoteEntry> {
        self.choices.iter()
            .filter_map(|(portfolio_id, choice)| match choice {
                Choice::Candidate(candidate_id) => Some(VoteEntry {
                    portfolio_id: portfolio_id.clone(),
                    candidate_id: candidate_id.clone(),
                }),
                Choice::Decline => None,
            })
            .collect()
    }
}

//! The voter's path from verification to a cast ballot.
//!
//! [`transition`] is the whole state chart; [`BallotMachine`] drives it from
//! network results, voter input and the session clock, and refuses anything
//! the chart does not allow.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use shared::{Ballot, Choice, Electorate, Selections, VoteResponse};
use time::Duration;
use tracing::{debug, error, info, warn};

use crate::clock::{SessionEvent, SessionTimers};
use crate::error::{Error, Result};
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailedStep {
    Loading,
    Submission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Verifying,
    Loading,
    Ready,
    Confirming,
    Submitting,
    Complete,
    Error(FailedStep),
    /// The session ended underneath the voter; only re-verification leaves it.
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Verified,
    Loaded,
    LoadFailed,
    Select,
    Review,
    Cancel,
    Confirm,
    Accepted,
    Rejected,
    Retry,
    Expire,
    Logout,
}

pub fn transition(phase: Phase, event: Event) -> Result<Phase> {
    let next = match (phase, event) {
        (Phase::Submitting, Event::Logout) => return Err(Error::InvalidTransition { phase, event }),
        (_, Event::Logout) => Phase::Verifying,
        (Phase::Verifying | Phase::Expired, Event::Verified) => Phase::Loading,
        (Phase::Loading, Event::Loaded) => Phase::Ready,
        (Phase::Loading, Event::LoadFailed) => Phase::Error(FailedStep::Loading),
        (Phase::Ready, Event::Select) => Phase::Ready,
        (Phase::Ready, Event::Review) => Phase::Confirming,
        (Phase::Confirming | Phase::Error(FailedStep::Submission), Event::Cancel) => Phase::Ready,
        (Phase::Confirming, Event::Confirm) => Phase::Submitting,
        (Phase::Submitting, Event::Accepted) => Phase::Complete,
        (Phase::Submitting, Event::Rejected) => Phase::Error(FailedStep::Submission),
        (Phase::Error(FailedStep::Loading), Event::Retry) => Phase::Loading,
        (Phase::Error(FailedStep::Submission), Event::Retry) => Phase::Confirming,
        (
            Phase::Loading | Phase::Ready | Phase::Confirming | Phase::Submitting | Phase::Error(_),
            Event::Expire,
        ) => Phase::Expired,
        _ => return Err(Error::InvalidTransition { phase, event }),
    };
    Ok(next)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewChoice {
    Candidate { id: String, name: String },
    Declined,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewLine {
    pub contest_id: String,
    pub contest: String,
    pub choice: ReviewChoice,
}

/// What the voter is asked to confirm, in ballot order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewSummary {
    pub lines: Vec<ReviewLine>,
    pub votes: usize,
    pub declined: usize,
    pub contests: usize,
}

impl ReviewSummary {
    pub fn new(ballot: &Ballot, selections: &Selections) -> Self {
        let lines = ballot.contests().iter()
            .filter_map(|contest| {
                let choice = match selections.get(contest.id())? {
                    Choice::Decline => ReviewChoice::Declined,
                    Choice::Candidate(id) => ReviewChoice::Candidate {
                        id: id.clone(),
                        name: contest.candidate(id).map(|c| c.name.clone()).unwrap_or_else(|| id.clone()),
                    },
                };
                Some(ReviewLine {
                    contest_id: contest.id().to_string(),
                    contest: contest.portfolio.name.clone(),
                    choice,
                })
            })
            .collect();

        Self {
            lines,
            votes: selections.vote_count(),
            declined: selections.declined_count(),
            contests: ballot.len(),
        }
    }
}

struct MachineState {
    phase: Phase,
    ballot: Option<Rc<Ballot>>,
    selections: Selections,
    receipt: Option<VoteResponse>,
    last_error: Option<Error>,
    /// The clock ran out mid-submission; applied once the submission settles.
    expiry_pending: bool,
}

impl MachineState {
    fn new() -> Self {
        Self {
            phase: Phase::Verifying,
            ballot: None,
            selections: Selections::default(),
            receipt: None,
            last_error: None,
            expiry_pending: false,
        }
    }
}

struct MachineInner {
    session: Session,
    state: RefCell<MachineState>,
    timers: RefCell<Option<SessionTimers>>,
    verifying: Cell<bool>,
    listener: RefCell<Option<Rc<dyn Fn()>>>,
}

#[derive(Clone)]
pub struct BallotMachine {
    inner: Rc<MachineInner>,
}

impl BallotMachine {
    pub fn new(session: Session) -> Self {
        Self {
            inner: Rc::new(MachineInner {
                session,
                state: RefCell::new(MachineState::new()),
                timers: RefCell::new(None),
                verifying: Cell::new(false),
                listener: RefCell::new(None),
            }),
        }
    }

    pub fn session(&self) -> &Session {
        &self.inner.session
    }

    /// Called after every visible change: phase, selections, countdown.
    pub fn set_listener(&self, listener: impl Fn() + 'static) {
        *self.inner.listener.borrow_mut() = Some(Rc::new(listener));
    }

    pub fn phase(&self) -> Phase {
        self.inner.state.borrow().phase
    }

    pub fn ballot(&self) -> Option<Rc<Ballot>> {
        self.inner.state.borrow().ballot.clone()
    }

    pub fn selections(&self) -> Selections {
        self.inner.state.borrow().selections.clone()
    }

    pub fn selection(&self, contest_id: &str) -> Option<Choice> {
        self.inner.state.borrow().selections.get(contest_id).cloned()
    }

    pub fn receipt(&self) -> Option<VoteResponse> {
        self.inner.state.borrow().receipt.clone()
    }

    pub fn last_error(&self) -> Option<Error> {
        self.inner.state.borrow().last_error.clone()
    }

    /// The error worth showing the voter. A plain timeout is left out once
    /// the tab is back at verification, where the expiry itself is shown.
    pub fn visible_error(&self) -> Option<Error> {
        let state = self.inner.state.borrow();
        match (&state.phase, &state.last_error) {
            (Phase::Expired, Some(Error::SessionExpired)) => None,
            (_, error) => error.clone(),
        }
    }

    pub fn voter(&self) -> Option<Electorate> {
        self.inner.session.credentials().voter()
    }

    pub fn is_verifying(&self) -> bool {
        self.inner.verifying.get()
    }

    pub fn remaining(&self) -> Duration {
        self.inner.session.clock().countdown().remaining()
    }

    pub fn remaining_display(&self) -> String {
        self.inner.session.clock().countdown().display()
    }

    pub fn is_expiring(&self) -> bool {
        self.inner.session.clock().countdown().is_expiring()
    }

    pub fn summary(&self) -> Option<ReviewSummary> {
        let state = self.inner.state.borrow();
        let ballot = state.ballot.as_ref()?;
        Some(ReviewSummary::new(ballot, &state.selections))
    }

    fn notify(&self) {
        let listener = self.inner.listener.borrow().clone();
        if let Some(listener) = listener {
            listener();
        }
    }

    fn apply(&self, event: Event) -> Result<Phase> {
        let mut state = self.inner.state.borrow_mut();
        let next = transition(state.phase, event)?;
        debug!(from = ?state.phase, ?event, to = ?next, "Ballot transition");
        state.phase = next;
        Ok(next)
    }

    fn record_error(&self, error: Error) {
        self.inner.state.borrow_mut().last_error = Some(error);
    }

    /// Validates the token, exchanges it for a credential, starts the session
    /// clock and loads the ballot.
    pub async fn verify(&self, raw_token: &str, current_location: Option<String>) -> Result<()> {
        let phase = self.phase();
        transition(phase, Event::Verified)?;
        if self.inner.verifying.replace(true) {
            return Err(Error::InvalidTransition { phase, event: Event::Verified });
        }
        self.notify();

        let outcome = self.inner.session.api().verify(raw_token, current_location).await;
        self.inner.verifying.set(false);

        let verified = match outcome {
            Ok(verified) => verified,
            Err(e) => {
                warn!(error = %e, "Verification failed");
                self.record_error(e.clone());
                self.notify();
                return Err(e);
            }
        };
        info!(voter = %verified.electorate.id, "Voter verified");

        self.apply(Event::Verified)?;
        {
            let mut state = self.inner.state.borrow_mut();
            state.ballot = None;
            state.selections = Selections::default();
            state.receipt = None;
            state.last_error = None;
            state.expiry_pending = false;
        }
        self.start_clock();
        self.notify();

        self.load_ballot().await
    }

    /// Picks up a session persisted earlier in this tab. Returns whether a
    /// session was resumed.
    pub async fn resume(&self) -> Result<bool> {
        transition(self.phase(), Event::Verified)?;
        let session = &self.inner.session;
        if session.credentials().restore().is_none() {
            return Ok(false);
        }

        if session.credentials().is_expired() {
            if let Err(e) = session.refresher().refresh().await {
                warn!(error = %e, "Could not resume session");
                session.credentials().clear();
                return Ok(false);
            }
        }

        info!("Resuming voting session");
        self.apply(Event::Verified)?;
        self.start_clock();
        self.notify();
        self.load_ballot().await?;
        Ok(true)
    }

    pub async fn load_ballot(&self) -> Result<()> {
        let phase = self.phase();
        if phase != Phase::Loading {
            return Err(Error::InvalidTransition { phase, event: Event::Loaded });
        }

        match self.inner.session.api().ballot().await {
            Ok(candidates) => {
                let ballot = Ballot::from_candidates(candidates);
                self.apply(Event::Loaded)?;
                {
                    let mut state = self.inner.state.borrow_mut();
                    debug!(contests = ballot.len(), "Ballot loaded");
                    state.ballot = Some(Rc::new(ballot));
                    state.selections = Selections::default();
                    state.last_error = None;
                }
                self.notify();
                Ok(())
            }
            Err(e) if e.is_session_loss() => {
                self.lose_session(e.clone());
                Err(e)
            }
            Err(e) => {
                error!(error = %e, "Failed to load ballot");
                self.apply(Event::LoadFailed)?;
                self.record_error(e.clone());
                self.notify();
                Err(e)
            }
        }
    }

    /// Selects a candidate, or clears the contest if that candidate was
    /// already selected.
    pub fn select(&self, contest_id: &str, candidate_id: &str) -> Result<Option<Choice>> {
        let choice = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let next = transition(state.phase, Event::Select)?;
            let contest = state.ballot.as_ref()
                .and_then(|b| b.contest(contest_id))
                .ok_or_else(|| Error::UnknownContest(contest_id.to_string()))?;
            if contest.candidate(candidate_id).is_none() {
                return Err(Error::UnknownCandidate {
                    contest_id: contest_id.to_string(),
                    candidate_id: candidate_id.to_string(),
                });
            }
            let choice = state.selections.toggle(contest_id, candidate_id).cloned();
            state.phase = next;
            state.last_error = None;
            choice
        };
        self.notify();
        Ok(choice)
    }

    pub fn decline(&self, contest_id: &str) -> Result<()> {
        self.edit_selection(contest_id, |selections| selections.decline(contest_id))
    }

    pub fn clear_selection(&self, contest_id: &str) -> Result<()> {
        self.edit_selection(contest_id, |selections| {
            selections.clear(contest_id);
        })
    }

    fn edit_selection(&self, contest_id: &str, edit: impl FnOnce(&mut Selections)) -> Result<()> {
        {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let next = transition(state.phase, Event::Select)?;
            if state.ballot.as_ref().and_then(|b| b.contest(contest_id)).is_none() {
                return Err(Error::UnknownContest(contest_id.to_string()));
            }
            edit(&mut state.selections);
            state.phase = next;
        }
        self.notify();
        Ok(())
    }

    /// Moves to confirmation and returns what the voter is about to submit.
    pub fn request_submission(&self) -> Result<ReviewSummary> {
        let summary = {
            let mut guard = self.inner.state.borrow_mut();
            let state = &mut *guard;
            let next = transition(state.phase, Event::Review)?;
            if state.selections.is_empty() {
                state.last_error = Some(Error::EmptySelection);
                drop(guard);
                self.notify();
                return Err(Error::EmptySelection);
            }
            let ballot = state.ballot.clone().unwrap_or_default();
            let summary = ReviewSummary::new(&ballot, &state.selections);
            state.phase = next;
            state.last_error = None;
            summary
        };
        self.notify();
        Ok(summary)
    }

    /// Back to editing, from confirmation or after a failed submission.
    pub fn cancel(&self) -> Result<()> {
        self.apply(Event::Cancel)?;
        self.notify();
        Ok(())
    }

    /// Sends the ballot. Exactly one write is issued per call, and only from
    /// `Confirming`.
    pub async fn confirm(&self) -> Result<VoteResponse> {
        let votes = {
            let mut state = self.inner.state.borrow_mut();
            let next = transition(state.phase, Event::Confirm)?;
            let votes = state.selections.to_votes();
            if votes.is_empty() {
                state.last_error = Some(Error::NothingToSubmit);
                return Err(Error::NothingToSubmit);
            }
            state.phase = next;
            state.last_error = None;
            votes
        };
        info!(votes = votes.len(), "Submitting ballot");
        self.notify();

        match self.inner.session.api().cast_vote(votes).await {
            Ok(receipt) => {
                self.end_session();
                self.apply(Event::Accepted)?;
                {
                    let mut state = self.inner.state.borrow_mut();
                    state.receipt = Some(receipt.clone());
                    state.expiry_pending = false;
                }
                self.notify();
                Ok(receipt)
            }
            Err(e) => {
                let session_lost = e.is_session_loss();
                let failure = Error::Submission(Box::new(e));
                let expired = self.inner.state.borrow().expiry_pending;
                if session_lost || expired {
                    self.lose_session(failure.clone());
                } else {
                    error!(error = %failure, "Submission failed; credential kept for retry");
                    self.apply(Event::Rejected)?;
                    self.record_error(failure.clone());
                    self.notify();
                }
                Err(failure)
            }
        }
    }

    /// After a failure: reload the ballot, or return to confirmation so the
    /// voter can resubmit.
    pub async fn retry(&self) -> Result<()> {
        let next = self.apply(Event::Retry)?;
        self.notify();
        match next {
            Phase::Loading => self.load_ballot().await,
            _ => Ok(()),
        }
    }

    /// Forced timeout from the session clock. Deferred while a submission is
    /// on the wire.
    pub fn expire(&self) {
        self.expire_with(Error::SessionExpired);
    }

    fn expire_with(&self, reason: Error) {
        match self.phase() {
            Phase::Submitting => {
                warn!("Session expired during submission; applying once it settles");
                self.inner.state.borrow_mut().expiry_pending = true;
            }
            Phase::Loading | Phase::Ready | Phase::Confirming | Phase::Error(_) => {
                info!(reason = %reason, "Session expired");
                self.lose_session(reason);
            }
            phase => debug!(?phase, "Ignoring expiry outside an active session"),
        }
    }

    pub fn logout(&self) -> Result<()> {
        transition(self.phase(), Event::Logout)?;
        self.end_session();
        self.apply(Event::Logout)?;
        *self.inner.state.borrow_mut() = MachineState::new();
        info!("Logged out");
        self.notify();
        Ok(())
    }

    fn start_clock(&self) {
        let machine = Rc::downgrade(&self.inner);
        let timers = self.inner.session.clock().start(Rc::new(move |event: SessionEvent| {
            if let Some(inner) = machine.upgrade() {
                BallotMachine { inner }.on_session_event(event);
            }
        }));
        self.inner.timers.replace(Some(timers));
    }

    fn on_session_event(&self, event: SessionEvent) {
        match event {
            SessionEvent::Tick(_) | SessionEvent::Extended => self.notify(),
            SessionEvent::TimedOut => self.expire(),
            SessionEvent::RefreshFailed(e) => self.expire_with(e),
        }
    }

    /// Stops the timers and forgets the credential and every cached response.
    fn end_session(&self) {
        let timers = self.inner.timers.take();
        drop(timers);
        let session = &self.inner.session;
        session.credentials().clear();
        session.gateway().reset();
        session.clock().countdown().stop();
    }

    fn lose_session(&self, reason: Error) {
        self.end_session();
        if let Err(e) = self.apply(Event::Expire) {
            debug!(error = %e, "Session already ended");
        }
        {
            let mut state = self.inner.state.borrow_mut();
            state.last_error = Some(reason);
            state.expiry_pending = false;
        }
        self.notify();
    }
}

mod gateway;

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::rc::Rc;
use std::time::Duration as StdDuration;

use futures::future::{FutureExt, LocalBoxFuture};
use serde::Serialize;
use shared::{BallotCandidate, Electorate, Portfolio, RefreshResponse, VerifyResponse, VoteResponse};
use time::{Duration, OffsetDateTime};

use crate::config::ClientConfig;
use crate::credentials::MemoryStorage;
use crate::platform::Platform;
use crate::session::Session;
use crate::transport::{HttpRequest, HttpResponse, Transport, TransportError};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Runs `future` on a `LocalSet` so `spawn_local` works inside it.
pub async fn local<F: Future>(future: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(future).await
}

/// Wall clock driven by tokio's (paused) test clock.
pub struct TestPlatform {
    base: OffsetDateTime,
    started: tokio::time::Instant,
}

impl TestPlatform {
    pub fn new() -> Self {
        Self {
            base: OffsetDateTime::UNIX_EPOCH + Duration::days(20_000),
            started: tokio::time::Instant::now(),
        }
    }
}

impl Platform for TestPlatform {
    fn now(&self) -> OffsetDateTime {
        self.base + (tokio::time::Instant::now() - self.started)
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        tokio::time::sleep(duration.unsigned_abs()).boxed_local()
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        tokio::task::spawn_local(task);
    }
}

#[derive(Clone)]
pub struct Reply {
    outcome: Result<HttpResponse, TransportError>,
    delay: Option<StdDuration>,
}

impl Reply {
    pub fn after(mut self, delay: StdDuration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn retry_after(mut self, value: &str) -> Self {
        if let Ok(response) = &mut self.outcome {
            response.retry_after = Some(value.to_string());
        }
        self
    }
}

pub fn json<T: Serialize>(value: &T) -> Reply {
    Reply {
        outcome: Ok(HttpResponse::new(200, serde_json::to_string(value).unwrap())),
        delay: None,
    }
}

pub fn status(code: u16) -> Reply {
    Reply {
        outcome: Ok(HttpResponse::new(code, format!(r#"{{"detail":"status {code}"}}"#))),
        delay: None,
    }
}

pub fn body(code: u16, text: &str) -> Reply {
    Reply { outcome: Ok(HttpResponse::new(code, text)), delay: None }
}

pub fn offline() -> Reply {
    Reply { outcome: Err(TransportError("connection refused".into())), delay: None }
}

/// Scripted backend keyed by `"METHOD /path"`. Queued replies are used
/// first, then the route's standing reply.
pub struct MockTransport {
    base: String,
    queued: RefCell<HashMap<String, VecDeque<Reply>>>,
    standing: RefCell<HashMap<String, Reply>>,
    calls: RefCell<Vec<(String, HttpRequest)>>,
}

impl MockTransport {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            queued: RefCell::new(HashMap::new()),
            standing: RefCell::new(HashMap::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    pub fn respond(&self, route: &str, reply: Reply) {
        self.standing.borrow_mut().insert(route.to_string(), reply);
    }

    pub fn enqueue(&self, route: &str, reply: Reply) {
        self.queued.borrow_mut().entry(route.to_string()).or_default().push_back(reply);
    }

    pub fn calls_to(&self, route: &str) -> usize {
        self.calls.borrow().iter().filter(|(r, _)| r == route).count()
    }

    pub fn total_calls(&self) -> usize {
        self.calls.borrow().len()
    }

    pub fn bearers(&self, route: &str) -> Vec<Option<String>> {
        self.requests(route).into_iter().map(|r| r.bearer).collect()
    }

    pub fn requests(&self, route: &str) -> Vec<HttpRequest> {
        self.calls.borrow().iter()
            .filter(|(r, _)| r == route)
            .map(|(_, request)| request.clone())
            .collect()
    }

    fn route(&self, request: &HttpRequest) -> String {
        let path = request.url.strip_prefix(&self.base).unwrap_or(&request.url);
        format!("{} {}", request.method, path)
    }
}

impl Transport for MockTransport {
    fn send(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<HttpResponse, TransportError>> {
        let route = self.route(&request);
        self.calls.borrow_mut().push((route.clone(), request));

        let queued = self.queued.borrow_mut().get_mut(&route).and_then(VecDeque::pop_front);
        let reply = queued.or_else(|| self.standing.borrow().get(&route).cloned());

        async move {
            let Some(reply) = reply else {
                return Err(TransportError(format!("no route for {route}")));
            };
            match reply.delay {
                Some(delay) => tokio::time::sleep(delay).await,
                None => tokio::task::yield_now().await,
            }
            reply.outcome
        }
        .boxed_local()
    }
}

pub const BALLOT: &str = "GET /voting/ballot";
pub const VOTE: &str = "POST /voting/vote";
pub const VERIFY: &str = "POST /auth/verify-id";
pub const REFRESH: &str = "POST /auth/refresh";
pub const RESULTS: &str = "GET /results";

pub fn voter() -> Electorate {
    Electorate {
        id: "voter-1".into(),
        name: "Ama Mensah".into(),
        electoral_area: Some("North".into()),
        has_voted: false,
    }
}

pub fn portfolio(id: &str, voting_order: i32) -> Portfolio {
    Portfolio { id: id.into(), name: format!("Portfolio {id}"), description: None, voting_order }
}

pub fn candidate(id: &str, portfolio: &Portfolio, display_order: i32) -> BallotCandidate {
    BallotCandidate {
        id: id.into(),
        name: format!("Candidate {id}"),
        display_order,
        portfolio: Some(portfolio.clone()),
        picture_url: None,
        bio: None,
        manifesto: None,
    }
}

/// Two contests: `president` with two candidates, `treasurer` with one.
pub fn candidates() -> Vec<BallotCandidate> {
    let president = portfolio("president", 1);
    let treasurer = portfolio("treasurer", 2);
    vec![
        candidate("t-1", &treasurer, 1),
        candidate("p-2", &president, 2),
        candidate("p-1", &president, 1),
    ]
}

pub fn verified(token: &str) -> Reply {
    json(&VerifyResponse { access_token: token.into(), expires_in: 600, electorate: voter() })
}

pub fn refreshed(token: &str) -> Reply {
    json(&RefreshResponse { access_token: token.into(), expires_in: 600 })
}

pub fn receipt(votes_cast: u32) -> Reply {
    json(&VoteResponse { message: "Votes cast successfully".into(), votes_cast, failed_votes: vec![] })
}

pub struct Harness {
    pub transport: Rc<MockTransport>,
    pub storage: Rc<MemoryStorage>,
    pub platform: Rc<TestPlatform>,
    pub session: Session,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ClientConfig::default())
    }

    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_storage(config, Rc::new(MemoryStorage::default()))
    }

    pub fn with_storage(config: ClientConfig, storage: Rc<MemoryStorage>) -> Self {
        init_tracing();
        let transport = Rc::new(MockTransport::new(&config.api_base_url));
        let platform = Rc::new(TestPlatform::new());
        let session = Session::new(config, platform.clone(), transport.clone(), storage.clone());
        Self { transport, storage, platform, session }
    }

    /// Signs in directly, skipping `POST /auth/verify-id`.
    pub fn sign_in(&self, token: &str, ttl_seconds: u64) {
        self.session.credentials().store(token.into(), ttl_seconds, voter()).unwrap();
    }

    /// Standing replies for a backend where everything works.
    pub fn happy_backend(&self) {
        self.transport.respond(VERIFY, verified("tok-a"));
        self.transport.respond(BALLOT, json(&candidates()));
        self.transport.respond(VOTE, receipt(1));
        self.transport.respond(REFRESH, refreshed("tok-b"));
    }
}

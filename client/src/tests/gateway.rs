use std::time::Duration as StdDuration;

use shared::{ValidationError, VoteEntry};
use time::Duration;

use super::*;
use crate::error::Error;
use crate::gateway::Access;
use crate::platform::Platform;

fn vote(p: &str, c: &str) -> VoteEntry {
    VoteEntry { portfolio_id: p.into(), candidate_id: c.into() }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_reads_share_one_request() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.respond(BALLOT, json(&candidates()).after(StdDuration::from_millis(50)));

        let api = h.session.api();
        let (a, b, c) = futures::join!(api.ballot(), api.ballot(), api.ballot());

        assert_eq!(a.unwrap(), candidates());
        assert_eq!(b.unwrap(), candidates());
        assert_eq!(c.unwrap(), candidates());
        assert_eq!(h.transport.calls_to(BALLOT), 1);
        assert!(!h.session.gateway().is_pending("/voting/ballot"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_reads_cached_for_five_seconds() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.respond(BALLOT, json(&candidates()));
        let api = h.session.api();

        api.ballot().await.unwrap();
        assert!(h.session.gateway().is_cached("/voting/ballot"));

        tokio::time::advance(StdDuration::from_secs(4)).await;
        api.ballot().await.unwrap();
        assert_eq!(h.transport.calls_to(BALLOT), 1);

        tokio::time::advance(StdDuration::from_secs(2)).await;
        assert!(!h.session.gateway().is_cached("/voting/ballot"));
        api.ballot().await.unwrap();
        assert_eq!(h.transport.calls_to(BALLOT), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_cache_entry_stale_at_exactly_ttl() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.respond(BALLOT, json(&candidates()));

        h.session.api().ballot().await.unwrap();
        let stored_at = h.platform.now();

        tokio::time::advance(StdDuration::from_millis(4_999)).await;
        assert!(h.session.gateway().is_cached("/voting/ballot"));

        tokio::time::advance(StdDuration::from_millis(1)).await;
        assert_eq!(h.platform.now() - stored_at, Duration::seconds(5));
        assert!(!h.session.gateway().is_cached("/voting/ballot"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_failed_read_is_not_cached() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.enqueue(BALLOT, status(404));
        h.transport.respond(BALLOT, json(&candidates()));

        assert!(matches!(h.session.api().ballot().await, Err(Error::Rejected { status: 404, .. })));
        assert!(!h.session.gateway().is_cached("/voting/ballot"));
        assert!(h.session.api().ballot().await.is_ok());
        assert_eq!(h.transport.calls_to(BALLOT), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_unauthorized_refreshes_and_retries_once() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.enqueue(BALLOT, status(401));
        h.transport.respond(BALLOT, json(&candidates()));
        h.transport.respond(REFRESH, refreshed("tok-b"));

        assert_eq!(h.session.api().ballot().await.unwrap(), candidates());
        assert_eq!(h.transport.calls_to(REFRESH), 1);
        assert_eq!(
            h.transport.bearers(BALLOT),
            vec![Some("tok-a".to_string()), Some("tok-b".to_string())]
        );
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_second_unauthorized_ends_session() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.respond(BALLOT, status(401));
        h.transport.respond(REFRESH, refreshed("tok-b"));

        assert_eq!(h.session.api().ballot().await, Err(Error::SessionExpired));
        assert_eq!(h.transport.calls_to(BALLOT), 2);
        assert_eq!(h.transport.calls_to(REFRESH), 1);
        assert!(!h.session.credentials().is_present());
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_surfaces_retry_after() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.respond(BALLOT, status(429).retry_after("30"));

        let err = h.session.api().ballot().await.unwrap_err();
        assert_eq!(err, Error::RateLimited { retry_after: Some(Duration::seconds(30)) });
        assert_eq!(err.to_string(), "Rate limit exceeded. Please try again in 30 seconds.");
        assert_eq!(h.transport.calls_to(BALLOT), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_reads_retry_with_backoff() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.enqueue(BALLOT, status(503));
        h.transport.enqueue(BALLOT, offline());
        h.transport.respond(BALLOT, json(&candidates()));

        let started = tokio::time::Instant::now();
        assert!(h.session.api().ballot().await.is_ok());
        assert_eq!(h.transport.calls_to(BALLOT), 3);
        // 1s then 2s
        assert!(started.elapsed() >= StdDuration::from_secs(3));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_transient_reads_give_up() {
    local(async {
        let h = Harness::with_config(ClientConfig::default().with_read_retries(2, Duration::milliseconds(100)));
        h.sign_in("tok-a", 600);
        h.transport.respond(BALLOT, status(502));

        assert!(matches!(h.session.api().ballot().await, Err(Error::Transient(_))));
        assert_eq!(h.transport.calls_to(BALLOT), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_writes_are_never_retried() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.respond(VOTE, status(503));

        let outcome = h.session.api().cast_vote(vec![vote("president", "p-1")]).await;
        assert!(matches!(outcome, Err(Error::Transient(_))));
        assert_eq!(h.transport.calls_to(VOTE), 1);
        assert!(h.session.credentials().is_present());

        h.transport.respond(VOTE, offline());
        assert!(h.session.api().cast_vote(vec![vote("president", "p-1")]).await.is_err());
        assert_eq!(h.transport.calls_to(VOTE), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_write_invalidates_related_reads() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.respond(BALLOT, json(&candidates()));
        h.transport.respond(RESULTS, body(200, "[]"));
        h.transport.respond("POST /voting/flag", body(200, "{}"));
        let gateway = h.session.gateway();

        gateway.read("/voting/ballot", Access::Authorized).await.unwrap();
        gateway.read("/results", Access::Authorized).await.unwrap();
        gateway.read("/results", Access::Authorized).await.unwrap();
        assert_eq!(h.transport.calls_to(RESULTS), 1);

        gateway.write("/voting/flag", None, Access::Authorized, &["/results"]).await.unwrap();
        assert!(!gateway.is_cached("/voting/ballot"));
        assert!(!gateway.is_cached("/results"));

        gateway.read("/results", Access::Authorized).await.unwrap();
        assert_eq!(h.transport.calls_to(RESULTS), 2);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_reset_discards_in_flight_read() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.respond(BALLOT, json(&candidates()).after(StdDuration::from_millis(100)));
        let gateway = h.session.gateway().clone();

        let (outcome, _) = futures::join!(h.session.api().ballot(), async move {
            tokio::time::sleep(StdDuration::from_millis(10)).await;
            assert!(gateway.is_pending("/voting/ballot"));
            gateway.reset();
        });

        assert!(outcome.is_ok());
        assert!(!h.session.gateway().is_cached("/voting/ballot"));
        assert!(!h.session.gateway().is_pending("/voting/ballot"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_authorized_call_without_credential() {
    local(async {
        let h = Harness::new();
        h.transport.respond(BALLOT, json(&candidates()));

        assert_eq!(h.session.api().ballot().await, Err(Error::NotAuthenticated));
        assert_eq!(h.transport.total_calls(), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_near_expiry_token_refreshed_before_request() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 100);
        h.transport.respond(BALLOT, json(&candidates()));
        h.transport.respond(REFRESH, refreshed("tok-b"));

        h.session.api().ballot().await.unwrap();
        assert_eq!(h.transport.calls_to(REFRESH), 1);
        assert_eq!(h.transport.bearers(BALLOT), vec![Some("tok-b".to_string())]);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_rejection_carries_server_detail() {
    local(async {
        let h = Harness::new();
        h.transport.respond(VERIFY, body(400, r#"{"detail":"Invalid or expired token"}"#));

        let err = h.session.api().verify("AB12CD34", None).await.unwrap_err();
        assert_eq!(err, Error::Rejected { status: 400, detail: "Invalid or expired token".into() });
        assert_eq!(err.to_string(), "Invalid or expired token");
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_verify_is_public_and_stores_credential() {
    local(async {
        let h = Harness::new();
        h.transport.respond(VERIFY, verified("tok-a"));

        let response = h.session.api().verify(" ab12-cd34 ", Some("North".into())).await.unwrap();
        assert_eq!(response.electorate, voter());
        assert_eq!(h.transport.bearers(VERIFY), vec![None]);

        let sent: shared::VerifyRequest =
            serde_json::from_str(h.transport.requests(VERIFY)[0].body.as_deref().unwrap()).unwrap();
        assert_eq!(sent.token, "ab12cd34");
        assert_eq!(h.session.credentials().access_token().as_deref(), Some("tok-a"));
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_verify_unauthorized_does_not_refresh() {
    local(async {
        let h = Harness::new();
        h.transport.respond(VERIFY, status(401));
        h.transport.respond(REFRESH, refreshed("tok-b"));

        let err = h.session.api().verify("AB12CD34", None).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { status: 401, .. }));
        assert_eq!(h.transport.calls_to(REFRESH), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_malformed_token_never_sent() {
    local(async {
        let h = Harness::new();
        h.transport.respond(VERIFY, verified("tok-a"));

        let err = h.session.api().verify("AB-12", None).await.unwrap_err();
        assert_eq!(err, Error::Validation(ValidationError::TokenLength(4)));
        assert_eq!(h.transport.total_calls(), 0);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_cast_vote_retires_credential() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 600);
        h.transport.respond(VOTE, receipt(1));

        let receipt = h.session.api().cast_vote(vec![vote("president", "p-1")]).await.unwrap();
        assert_eq!(receipt.votes_cast, 1);
        assert!(!h.session.credentials().is_present());

        let replay = h.session.api().cast_vote(vec![vote("president", "p-1")]).await;
        assert_eq!(replay, Err(Error::NotAuthenticated));
        assert_eq!(h.transport.calls_to(VOTE), 1);
    })
    .await;
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_calls_near_expiry_refresh_once() {
    local(async {
        let h = Harness::new();
        h.sign_in("tok-a", 100);
        h.transport.respond(REFRESH, refreshed("tok-b").after(StdDuration::from_millis(50)));
        h.transport.respond(BALLOT, json(&candidates()));
        h.transport.respond(RESULTS, body(200, "[]"));
        h.transport.respond("GET /voting/status", body(200, "{}"));
        let gateway = h.session.gateway();

        let (a, b, c) = futures::join!(
            gateway.read("/voting/ballot", Access::Authorized),
            gateway.read("/results", Access::Authorized),
            gateway.read("/voting/status", Access::Authorized),
        );
        assert!(a.is_ok() && b.is_ok() && c.is_ok());
        assert_eq!(h.transport.calls_to(REFRESH), 1);
        for route in [BALLOT, RESULTS, "GET /voting/status"] {
            assert_eq!(h.transport.bearers(route), vec![Some("tok-b".to_string())]);
        }
    })
    .await;
}

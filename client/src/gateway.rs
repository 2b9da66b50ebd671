//! Every request to the election backend goes through the [`Gateway`].
//!
//! Reads are cached for a short TTL and identical concurrent reads share one
//! network exchange. Writes bypass both and invalidate the cache for the
//! resource they touch. Authorized calls carry the current access token and
//! recover from a single 401 by refreshing and retrying once.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use shared::ErrorResponse;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::platform::Platform;
use crate::refresh::RefreshCoordinator;
use crate::transport::{HttpRequest, HttpResponse, Method, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// No credential attached, no refresh on 401 (verification itself).
    Public,
    Authorized,
}

type PendingRead = Shared<LocalBoxFuture<'static, Result<Rc<str>>>>;

struct CacheEntry {
    payload: Rc<str>,
    stored_at: OffsetDateTime,
}

struct GatewayInner {
    config: ClientConfig,
    platform: Rc<dyn Platform>,
    transport: Rc<dyn Transport>,
    credentials: CredentialStore,
    refresher: RefreshCoordinator,
    pending: RefCell<HashMap<String, (u64, PendingRead)>>,
    cache: RefCell<HashMap<String, CacheEntry>>,
    next_ticket: Cell<u64>,
}

#[derive(Clone)]
pub struct Gateway {
    inner: Rc<GatewayInner>,
}

fn cache_key(method: Method, path: &str) -> String {
    format!("{} {}", method, path)
}

/// `/voting/vote` -> `/voting`
fn resource_root(path: &str) -> &str {
    let trimmed = path.trim_start_matches('/');
    let end = trimmed.find(|c: char| c == '/' || c == '?').unwrap_or(trimmed.len());
    &path[..path.len() - trimmed.len() + end]
}

fn parse_retry_after(value: Option<&str>) -> Option<Duration> {
    value?.trim().parse::<u32>().ok().map(|secs| Duration::seconds(secs.into()))
}

impl Gateway {
    pub fn new(
        config: ClientConfig,
        platform: Rc<dyn Platform>,
        transport: Rc<dyn Transport>,
        credentials: CredentialStore,
        refresher: RefreshCoordinator,
    ) -> Self {
        Self {
            inner: Rc::new(GatewayInner {
                config,
                platform,
                transport,
                credentials,
                refresher,
                pending: RefCell::new(HashMap::new()),
                cache: RefCell::new(HashMap::new()),
                next_ticket: Cell::new(0),
            }),
        }
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }

    pub fn refresher(&self) -> &RefreshCoordinator {
        &self.inner.refresher
    }

    pub async fn call(&self, method: Method, path: &str, body: Option<String>, access: Access) -> Result<Rc<str>> {
        match method {
            Method::Get => self.read(path, access).await,
            Method::Post => self.write(path, body, access, &[]).await,
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, access: Access) -> Result<T> {
        let payload = self.read(path, access).await?;
        serde_json::from_str(&payload).map_err(Error::from_json)
    }

    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        access: Access,
        invalidates: &[&str],
    ) -> Result<T> {
        let body = serde_json::to_string(body).map_err(Error::from_json)?;
        let payload = self.write(path, Some(body), access, invalidates).await?;
        serde_json::from_str(&payload).map_err(Error::from_json)
    }

    pub async fn read(&self, path: &str, access: Access) -> Result<Rc<str>> {
        let key = cache_key(Method::Get, path);

        if let Some(payload) = self.fresh(&key) {
            debug!(%key, "Serving from cache");
            return Ok(payload);
        }

        let joined = self.inner.pending.borrow().get(&key).map(|(_, p)| p.clone());
        let pending = match joined {
            Some(pending) => {
                debug!(%key, "Joining in-flight request");
                pending
            }
            None => self.start_read(key, path.to_string(), access),
        };
        pending.await
    }

    fn start_read(&self, key: String, path: String, access: Access) -> PendingRead {
        let ticket = self.inner.next_ticket.get();
        self.inner.next_ticket.set(ticket + 1);

        let this = self.clone();
        let entry_key = key.clone();
        let pending = async move {
            let outcome = this.read_with_retry(&path, access).await;
            this.settle(&entry_key, ticket, &outcome);
            outcome
        }
        .boxed_local()
        .shared();

        self.inner.pending.borrow_mut().insert(key, (ticket, pending.clone()));
        pending
    }

    /// Drops the pending entry and caches a success, unless the entry was
    /// reset or invalidated while the request was out.
    fn settle(&self, key: &str, ticket: u64, outcome: &Result<Rc<str>>) {
        let mut pending = self.inner.pending.borrow_mut();
        if pending.get(key).map(|(t, _)| *t) != Some(ticket) {
            debug!(%key, "Discarding result of superseded request");
            return;
        }
        pending.remove(key);

        if let Ok(payload) = outcome {
            self.inner.cache.borrow_mut().insert(key.to_string(), CacheEntry {
                payload: payload.clone(),
                stored_at: self.inner.platform.now(),
            });
        }
    }

    fn fresh(&self, key: &str) -> Option<Rc<str>> {
        let now = self.inner.platform.now();
        let mut cache = self.inner.cache.borrow_mut();
        match cache.get(key) {
            Some(entry) if now - entry.stored_at < self.inner.config.cache_ttl => Some(entry.payload.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    async fn read_with_retry(&self, path: &str, access: Access) -> Result<Rc<str>> {
        let mut auth_retried = false;
        let mut attempt = 0;
        loop {
            match self.exchange(Method::Get, path, None, access, &mut auth_retried).await {
                Err(e) if e.is_transient() && attempt + 1 < self.inner.config.max_read_attempts => {
                    let delay = self.inner.config.backoff(attempt);
                    warn!(path, attempt = attempt + 1, delay_ms = delay.whole_milliseconds() as i64, error = %e, "Retrying read");
                    self.inner.platform.sleep(delay).await;
                    attempt += 1;
                }
                outcome => return outcome,
            }
        }
    }

    /// Writes are sent exactly once; a transient failure is reported, never
    /// retried.
    pub async fn write(&self, path: &str, body: Option<String>, access: Access, invalidates: &[&str]) -> Result<Rc<str>> {
        let mut auth_retried = false;
        let payload = self.exchange(Method::Post, path, body, access, &mut auth_retried).await?;

        self.invalidate(resource_root(path));
        for prefix in invalidates {
            self.invalidate(prefix);
        }
        Ok(payload)
    }

    /// Forgets cached and in-flight reads whose path starts with `prefix`.
    pub fn invalidate(&self, prefix: &str) {
        let matches = |key: &String| {
            key.split_once(' ').map_or(false, |(_, path)| path.starts_with(prefix))
        };
        self.inner.cache.borrow_mut().retain(|key, _| !matches(key));
        self.inner.pending.borrow_mut().retain(|key, _| !matches(key));
        debug!(prefix, "Cache invalidated");
    }

    /// Drops all cached and in-flight state; used when a session ends.
    pub fn reset(&self) {
        self.inner.cache.borrow_mut().clear();
        self.inner.pending.borrow_mut().clear();
    }

    pub fn is_cached(&self, path: &str) -> bool {
        self.fresh(&cache_key(Method::Get, path)).is_some()
    }

    pub fn is_pending(&self, path: &str) -> bool {
        self.inner.pending.borrow().contains_key(&cache_key(Method::Get, path))
    }

    /// One logical attempt, including the single refresh-and-retry on 401.
    async fn exchange(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        access: Access,
        auth_retried: &mut bool,
    ) -> Result<Rc<str>> {
        let bearer = match access {
            Access::Public => None,
            Access::Authorized => Some(self.authorize().await?),
        };

        let response = self.send(method, path, body.clone(), bearer).await?;
        if response.status != 401 || access == Access::Public {
            return self.interpret(path, response, access);
        }

        if *auth_retried {
            return self.reject_session(path);
        }
        *auth_retried = true;

        info!(path, "Access token rejected, refreshing and retrying once");
        let token = self.inner.refresher.refresh().await?;
        let retried = self.send(method, path, body, Some(token)).await?;
        if retried.status == 401 {
            return self.reject_session(path);
        }
        self.interpret(path, retried, access)
    }

    /// Returns a usable access token, refreshing first when it has expired
    /// or is about to.
    async fn authorize(&self) -> Result<String> {
        let credentials = &self.inner.credentials;
        if !credentials.is_present() {
            return Err(Error::NotAuthenticated);
        }

        if credentials.is_expired() {
            info!("Access token expired, refreshing before request");
            return self.inner.refresher.refresh().await;
        }
        if credentials.needs_refresh() {
            debug!("Access token close to expiry, refreshing proactively");
            return self.inner.refresher.refresh().await;
        }

        credentials.access_token().ok_or(Error::NotAuthenticated)
    }

    async fn send(&self, method: Method, path: &str, body: Option<String>, bearer: Option<String>) -> Result<HttpResponse> {
        let request = HttpRequest {
            method,
            url: self.inner.config.url(path),
            body,
            bearer,
        };
        debug!(%method, path, "Sending request");
        self.inner.transport.send(request).await.map_err(|e| {
            warn!(%method, path, error = %e, "Request failed before a response");
            Error::Transient(e.0)
        })
    }

    fn reject_session(&self, path: &str) -> Result<Rc<str>> {
        warn!(path, "Access token rejected after refresh, ending session");
        self.inner.credentials.clear();
        Err(Error::SessionExpired)
    }

    fn interpret(&self, path: &str, response: HttpResponse, access: Access) -> Result<Rc<str>> {
        if response.is_success() {
            return Ok(Rc::from(response.body));
        }

        let detail = ErrorResponse::from_body(&response.body, response.status).detail;
        match response.status {
            401 if access == Access::Authorized => self.reject_session(path),
            429 => {
                let retry_after = parse_retry_after(response.retry_after.as_deref());
                warn!(path, retry_after = ?retry_after, "Rate limited");
                Err(Error::RateLimited { retry_after })
            }
            500..=599 => Err(Error::Transient(detail)),
            status => Err(Error::Rejected { status, detail }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resource_root() {
        assert_eq!(resource_root("/voting/vote"), "/voting");
        assert_eq!(resource_root("/voting"), "/voting");
        assert_eq!(resource_root("/results?limit=5"), "/results");
        assert_eq!(resource_root("/"), "/");
    }

    #[test]
    fn test_retry_after_parsing() {
        assert_eq!(parse_retry_after(Some("30")), Some(Duration::seconds(30)));
        assert_eq!(parse_retry_after(Some(" 5 ")), Some(Duration::seconds(5)));
        assert_eq!(parse_retry_after(Some("Wed, 21 Oct 2015 07:28:00 GMT")), None);
        assert_eq!(parse_retry_after(None), None);
    }
}

//! Single-flight renewal of the access token.
//!
//! Both the session clock (proactively) and the gateway (on 401 or an
//! expired token) ask for a refresh. Whoever asks while a renewal is already
//! on the wire gets the same pending result, so there is never more than one
//! `POST /auth/refresh` outstanding.

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::{FutureExt, LocalBoxFuture, Shared};
use shared::RefreshResponse;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::credentials::CredentialStore;
use crate::error::{Error, Result};
use crate::transport::{HttpRequest, Method, Transport};

pub const REFRESH_PATH: &str = "/auth/refresh";

type PendingRefresh = Shared<LocalBoxFuture<'static, Result<String>>>;

struct RefreshInner {
    url: String,
    transport: Rc<dyn Transport>,
    credentials: CredentialStore,
    in_flight: RefCell<Option<PendingRefresh>>,
}

#[derive(Clone)]
pub struct RefreshCoordinator {
    inner: Rc<RefreshInner>,
}

impl RefreshCoordinator {
    pub fn new(config: &ClientConfig, transport: Rc<dyn Transport>, credentials: CredentialStore) -> Self {
        Self {
            inner: Rc::new(RefreshInner {
                url: config.url(REFRESH_PATH),
                transport,
                credentials,
                in_flight: RefCell::new(None),
            }),
        }
    }

    pub fn is_refreshing(&self) -> bool {
        self.inner.in_flight.borrow().is_some()
    }

    /// Renews the access token and returns the new one. On failure the
    /// credential is cleared and every waiter sees `SessionExpired`.
    pub async fn refresh(&self) -> Result<String> {
        if !self.inner.credentials.is_present() {
            return Err(Error::NotAuthenticated);
        }
        self.pending().await
    }

    fn pending(&self) -> PendingRefresh {
        if let Some(pending) = self.inner.in_flight.borrow().as_ref() {
            debug!("Joining in-flight token refresh");
            return pending.clone();
        }

        let this = self.clone();
        let pending = async move {
            let outcome = this.exchange().await;
            this.inner.in_flight.borrow_mut().take();
            outcome
        }
        .boxed_local()
        .shared();

        *self.inner.in_flight.borrow_mut() = Some(pending.clone());
        pending
    }

    async fn exchange(&self) -> Result<String> {
        let request = HttpRequest {
            method: Method::Post,
            url: self.inner.url.clone(),
            body: None,
            bearer: None,
        };

        let response = match self.inner.transport.send(request).await {
            Ok(response) if response.is_success() => response,
            Ok(response) => {
                warn!(status = response.status, "Token refresh rejected");
                return self.expire();
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return self.expire();
            }
        };

        let renewed: RefreshResponse = match serde_json::from_str(&response.body) {
            Ok(renewed) => renewed,
            Err(e) => {
                warn!(error = %e, "Malformed token refresh response");
                return self.expire();
            }
        };

        // A logout that happened while we were waiting wins: the renewed
        // token is dropped rather than reviving the session.
        self.inner.credentials.renew(renewed.access_token.clone(), renewed.expires_in)?;
        info!(expires_in = renewed.expires_in, "Access token refreshed");
        Ok(renewed.access_token)
    }

    fn expire(&self) -> Result<String> {
        self.inner.credentials.clear();
        Err(Error::SessionExpired)
    }
}

//! Browser implementations of the client's platform seams: fetch, timers and
//! `sessionStorage`.

use client::{Credential, CredentialStorage, HttpRequest, HttpResponse, Method, Platform, Transport, TransportError};
use futures::future::{FutureExt, LocalBoxFuture};
use gloo_net::http::Request;
use gloo_timers::future::TimeoutFuture;
use time::{Duration, OffsetDateTime};
use tracing::warn;
use web_sys::RequestCredentials;

use crate::config::CONFIG;

pub struct BrowserPlatform;

impl Platform for BrowserPlatform {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        let millis = duration.whole_milliseconds().clamp(0, u32::MAX.into()) as u32;
        TimeoutFuture::new(millis).boxed_local()
    }

    fn spawn(&self, task: LocalBoxFuture<'static, ()>) {
        wasm_bindgen_futures::spawn_local(task);
    }
}

/// `fetch` with cookies included so the refresh cookie reaches the backend.
pub struct FetchTransport;

impl Transport for FetchTransport {
    fn send(&self, request: HttpRequest) -> LocalBoxFuture<'static, Result<HttpResponse, TransportError>> {
        async move {
            let mut req = match request.method {
                Method::Get => Request::get(&request.url),
                Method::Post => Request::post(&request.url),
            }
            .credentials(RequestCredentials::Include)
            .header("Content-Type", "application/json");

            if let Some(token) = &request.bearer {
                req = req.header("Authorization", &format!("Bearer {}", token));
            }
            if let Some(body) = request.body {
                req = req.body(body);
            }

            let response = req.send().await.map_err(|e| TransportError(e.to_string()))?;
            let status = response.status();
            let retry_after = response.headers().get("Retry-After");
            let body = response.text().await.map_err(|e| TransportError(e.to_string()))?;

            Ok(HttpResponse { status, body, retry_after })
        }
        .boxed_local()
    }
}

pub struct SessionStorage;

fn session_storage() -> Option<web_sys::Storage> {
    web_sys::window()?.session_storage().ok()?
}

impl CredentialStorage for SessionStorage {
    fn load(&self) -> Option<Credential> {
        let raw = session_storage()?.get_item(CONFIG.credential_key).ok()??;
        match serde_json::from_str(&raw) {
            Ok(credential) => Some(credential),
            Err(e) => {
                warn!("Ignoring unreadable stored credential: {}", e);
                None
            }
        }
    }

    fn save(&self, credential: &Credential) {
        let Some(storage) = session_storage() else { return };
        match serde_json::to_string(credential) {
            Ok(raw) => {
                if storage.set_item(CONFIG.credential_key, &raw).is_err() {
                    warn!("Failed to persist credential to sessionStorage");
                }
            }
            Err(e) => warn!("Failed to serialize credential: {}", e),
        }
    }

    fn remove(&self) {
        let Some(storage) = session_storage() else { return };
        if storage.remove_item(CONFIG.credential_key).is_err() {
            warn!("Failed to remove credential from sessionStorage");
        }
    }
}

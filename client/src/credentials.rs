//! The voter's access credential and where it lives between page loads.

use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use shared::Electorate;
use time::{Duration, OffsetDateTime};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::platform::Platform;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub access_token: String,
    pub expires_at: OffsetDateTime,
    pub voter: Electorate,
}

/// Tab-scoped persistence for the credential. The browser build backs this
/// with `sessionStorage`.
pub trait CredentialStorage {
    fn load(&self) -> Option<Credential>;
    fn save(&self, credential: &Credential);
    fn remove(&self);
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    slot: RefCell<Option<Credential>>,
}

impl CredentialStorage for MemoryStorage {
    fn load(&self) -> Option<Credential> {
        self.slot.borrow().clone()
    }

    fn save(&self, credential: &Credential) {
        *self.slot.borrow_mut() = Some(credential.clone());
    }

    fn remove(&self) {
        self.slot.borrow_mut().take();
    }
}

struct StoreInner {
    platform: Rc<dyn Platform>,
    storage: Rc<dyn CredentialStorage>,
    refresh_threshold: Duration,
    current: RefCell<Option<Credential>>,
    retired: RefCell<HashSet<String>>,
}

/// Holds at most one live credential. Every write replaces the whole value.
#[derive(Clone)]
pub struct CredentialStore {
    inner: Rc<StoreInner>,
}

fn ttl(seconds: u64) -> Duration {
    Duration::seconds(seconds.min(u64::from(u32::MAX)) as i64)
}

impl CredentialStore {
    pub fn new(
        platform: Rc<dyn Platform>,
        storage: Rc<dyn CredentialStorage>,
        refresh_threshold: Duration,
    ) -> Self {
        Self {
            inner: Rc::new(StoreInner {
                platform,
                storage,
                refresh_threshold,
                current: RefCell::new(None),
                retired: RefCell::new(HashSet::new()),
            }),
        }
    }

    /// Picks up a credential persisted earlier in this tab, if any.
    pub fn restore(&self) -> Option<Credential> {
        let credential = self.inner.storage.load()?;
        if self.inner.retired.borrow().contains(&credential.access_token) {
            warn!("Discarding persisted credential that was already cleared");
            self.inner.storage.remove();
            return None;
        }
        debug!(voter = %credential.voter.id, "Restored persisted credential");
        *self.inner.current.borrow_mut() = Some(credential.clone());
        Some(credential)
    }

    pub fn store(&self, access_token: String, ttl_seconds: u64, voter: Electorate) -> Result<()> {
        if self.inner.retired.borrow().contains(&access_token) {
            warn!(voter = %voter.id, "Refusing to store a retired credential");
            return Err(Error::CredentialRetired);
        }
        let credential = Credential {
            access_token,
            expires_at: self.inner.platform.now() + ttl(ttl_seconds),
            voter,
        };
        self.replace(credential);
        Ok(())
    }

    /// Swaps in a renewed access token, keeping the voter profile. Fails if
    /// the credential was cleared while the renewal was in flight.
    pub fn renew(&self, access_token: String, ttl_seconds: u64) -> Result<()> {
        if self.inner.retired.borrow().contains(&access_token) {
            return Err(Error::CredentialRetired);
        }
        let voter = match self.voter() {
            Some(voter) => voter,
            None => return Err(Error::NotAuthenticated),
        };
        let credential = Credential {
            access_token,
            expires_at: self.inner.platform.now() + ttl(ttl_seconds),
            voter,
        };
        self.replace(credential);
        Ok(())
    }

    fn replace(&self, credential: Credential) {
        self.inner.storage.save(&credential);
        *self.inner.current.borrow_mut() = Some(credential);
    }

    /// Discards the credential for good; the same token will not be accepted
    /// again by this store.
    pub fn clear(&self) {
        let previous = self.inner.current.borrow_mut().take();
        self.inner.storage.remove();
        if let Some(credential) = previous {
            self.inner.retired.borrow_mut().insert(credential.access_token);
            info!(voter = %credential.voter.id, "Credential cleared");
        }
    }

    pub fn current(&self) -> Option<Credential> {
        self.inner.current.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.inner.current.borrow().as_ref().map(|c| c.access_token.clone())
    }

    pub fn voter(&self) -> Option<Electorate> {
        self.inner.current.borrow().as_ref().map(|c| c.voter.clone())
    }

    pub fn is_present(&self) -> bool {
        self.inner.current.borrow().is_some()
    }

    pub fn time_to_expiry(&self) -> Option<Duration> {
        let expires_at = self.inner.current.borrow().as_ref()?.expires_at;
        Some(expires_at - self.inner.platform.now())
    }

    pub fn is_expired(&self) -> bool {
        match self.time_to_expiry() {
            Some(left) => left <= Duration::ZERO,
            None => true,
        }
    }

    /// Still valid, but close enough to expiry that it should be renewed now.
    pub fn needs_refresh(&self) -> bool {
        match self.time_to_expiry() {
            Some(left) => left > Duration::ZERO && left < self.inner.refresh_threshold,
            None => false,
        }
    }
}

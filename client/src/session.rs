use std::rc::Rc;

use crate::api::VotingApi;
use crate::clock::SessionClock;
use crate::config::ClientConfig;
use crate::credentials::{CredentialStorage, CredentialStore};
use crate::gateway::Gateway;
use crate::platform::Platform;
use crate::refresh::RefreshCoordinator;
use crate::transport::Transport;

/// Wires the credential store, refresh coordinator, gateway, API and clock
/// together. One per browser tab; everything inside shares the same
/// credential and caches.
#[derive(Clone)]
pub struct Session {
    config: ClientConfig,
    credentials: CredentialStore,
    refresher: RefreshCoordinator,
    gateway: Gateway,
    api: VotingApi,
    clock: SessionClock,
}

impl Session {
    pub fn new(
        config: ClientConfig,
        platform: Rc<dyn Platform>,
        transport: Rc<dyn Transport>,
        storage: Rc<dyn CredentialStorage>,
    ) -> Self {
        let credentials = CredentialStore::new(platform.clone(), storage, config.refresh_threshold);
        let refresher = RefreshCoordinator::new(&config, transport.clone(), credentials.clone());
        let gateway = Gateway::new(
            config.clone(),
            platform.clone(),
            transport,
            credentials.clone(),
            refresher.clone(),
        );
        let api = VotingApi::new(gateway.clone());
        let clock = SessionClock::new(&config, platform, credentials.clone(), refresher.clone());

        Self { config, credentials, refresher, gateway, api, clock }
    }

    pub fn config(&self) -> &ClientConfig { &self.config }

    pub fn credentials(&self) -> &CredentialStore { &self.credentials }

    pub fn refresher(&self) -> &RefreshCoordinator { &self.refresher }

    pub fn gateway(&self) -> &Gateway { &self.gateway }

    pub fn api(&self) -> &VotingApi { &self.api }

    pub fn clock(&self) -> &SessionClock { &self.clock }
}

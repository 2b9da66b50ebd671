pub mod api;
pub mod ballot;
pub mod clock;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod platform;
pub mod refresh;
pub mod session;
pub mod transport;

pub use api::VotingApi;
pub use ballot::{transition, BallotMachine, Event, FailedStep, Phase, ReviewChoice, ReviewLine, ReviewSummary};
pub use clock::{Countdown, SessionClock, SessionEvent, SessionTimers};
pub use config::ClientConfig;
pub use credentials::{Credential, CredentialStorage, CredentialStore, MemoryStorage};
pub use error::{Error, Result};
pub use gateway::{Access, Gateway};
pub use platform::Platform;
pub use refresh::RefreshCoordinator;
pub use session::Session;
pub use transport::{HttpRequest, HttpResponse, Method, Transport, TransportError};

#[cfg(test)]
mod tests;

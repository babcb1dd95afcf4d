//! # Courier Core
//!
//! Message routing and orchestration workers for provider ↔ patient communication.
//!
//! This crate contains the queue consumers and the pure processing logic behind them:
//! - External-message routing (carrier SMS and call events into threads)
//! - App-message routing (app-posted thread items out to SMS)
//! - Onboarding/setup thread driving on provisioning events
//! - Scheduled welcome messages for newly created organizations
//! - Resource teardown for blocked accounts
//!
//! **No persistence of directory or threading data**: those live behind the service clients in
//! [`services`]. The only local state is the blocked-account record store.

pub mod blocked_accounts;
pub mod clock;
pub mod config;
pub mod constants;
pub mod directory;
pub mod error;
pub mod markup;
pub mod queue;
pub mod services;
pub mod worker;
pub mod workers;

#[cfg(test)]
pub(crate) mod testing;

pub use courier_proto as proto;
pub use courier_types::{PhoneNumber, VisibleText};

pub use config::CourierConfig;
pub use error::{WorkerError, WorkerResult};
pub use worker::{EventHandler, Outcome, Worker, WorkerHandle};

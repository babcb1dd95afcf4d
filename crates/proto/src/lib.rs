//! # Courier Proto
//!
//! Protobuf wire types and gRPC clients for the services the courier workers talk to.
//!
//! Generated at build time from `proto/*.proto`:
//! - `directory`: entities, contacts, memberships and the `Directory` client
//! - `threading`: threads, thread items, onboarding events, the new-org event and the
//!   `Threads` client
//! - `excomms`: published external messages, provisioning events and the `ExComms` client
//! - `auth`: account blocking and the `Auth` client
//! - `events`: the service envelope wrapped around events on shared topics

pub mod auth {
    tonic::include_proto!("auth");
}

pub mod directory {
    tonic::include_proto!("directory");
}

pub mod events {
    tonic::include_proto!("events");
}

pub mod excomms {
    tonic::include_proto!("excomms");
}

pub mod threading {
    tonic::include_proto!("threading");
}

pub use prost::Message;

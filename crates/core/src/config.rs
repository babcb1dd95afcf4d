//! Core runtime configuration.
//!
//! Configuration is resolved once at process startup and then passed into the workers. Workers
//! never read process-wide environment variables while handling events.

use crate::constants::{
    DEFAULT_BLOCKED_ACCOUNTS_DIR, DEFAULT_STOP_WAIT, DEFAULT_SUPPORT_PERSON_NAME,
};
use crate::error::ConfigError;
use std::path::PathBuf;
use std::time::Duration;

pub const DIRECTORY_ADDR: &str = "COURIER_DIRECTORY_ADDR";
pub const THREADING_ADDR: &str = "COURIER_THREADING_ADDR";
pub const EXCOMMS_ADDR: &str = "COURIER_EXCOMMS_ADDR";
pub const AUTH_ADDR: &str = "COURIER_AUTH_ADDR";
pub const EXTERNAL_MESSAGE_QUEUE_URL: &str = "COURIER_EXTERNAL_MESSAGE_QUEUE_URL";
pub const APP_MESSAGE_QUEUE_URL: &str = "COURIER_APP_MESSAGE_QUEUE_URL";
pub const EXCOMMS_EVENT_QUEUE_URL: &str = "COURIER_EXCOMMS_EVENT_QUEUE_URL";
pub const NEW_ORG_QUEUE_URL: &str = "COURIER_NEW_ORG_QUEUE_URL";
pub const BLOCK_ACCOUNT_QUEUE_URL: &str = "COURIER_BLOCK_ACCOUNT_QUEUE_URL";
pub const SPRUCE_SUPPORT_ORG_ID: &str = "COURIER_SPRUCE_SUPPORT_ORG_ID";
pub const SUPPORT_PERSON_NAME: &str = "COURIER_SUPPORT_PERSON_NAME";
pub const QUEUE_KMS_KEY_ARN: &str = "COURIER_QUEUE_KMS_KEY_ARN";
pub const BLOCKED_ACCOUNTS_DIR: &str = "COURIER_BLOCKED_ACCOUNTS_DIR";
pub const STOP_WAIT_SECS: &str = "COURIER_STOP_WAIT_SECS";

/// Queue subscription per worker. A worker without a queue URL is not started.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueueUrls {
    pub external_message: Option<String>,
    pub app_message: Option<String>,
    pub excomms_event: Option<String>,
    pub new_org: Option<String>,
    pub block_account: Option<String>,
}

/// Courier configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CourierConfig {
    pub directory_addr: String,
    pub threading_addr: String,
    pub excomms_addr: String,
    pub auth_addr: String,
    pub queues: QueueUrls,
    pub spruce_support_org_id: String,
    pub support_person_name: String,
    /// Key protecting queue payloads at rest. Decryption happens server side.
    pub queue_kms_key_arn: Option<String>,
    pub blocked_accounts_dir: PathBuf,
    pub stop_wait: Duration,
}

impl CourierConfig {
    /// Builds the configuration from a key lookup, normally `std::env::var`.
    ///
    /// Blank values are treated as unset.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] when a service address or the support organization is
    /// not configured, and [`ConfigError::Invalid`] when `COURIER_STOP_WAIT_SECS` is not a
    /// whole number of seconds.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let optional = |key: &'static str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let required =
            |key: &'static str| optional(key).ok_or(ConfigError::Missing(key));

        let stop_wait = match optional(STOP_WAIT_SECS) {
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_secs)
                .map_err(|e| ConfigError::Invalid {
                    key: STOP_WAIT_SECS,
                    reason: e.to_string(),
                })?,
            None => DEFAULT_STOP_WAIT,
        };

        Ok(Self {
            directory_addr: required(DIRECTORY_ADDR)?,
            threading_addr: required(THREADING_ADDR)?,
            excomms_addr: required(EXCOMMS_ADDR)?,
            auth_addr: required(AUTH_ADDR)?,
            queues: QueueUrls {
                external_message: optional(EXTERNAL_MESSAGE_QUEUE_URL),
                app_message: optional(APP_MESSAGE_QUEUE_URL),
                excomms_event: optional(EXCOMMS_EVENT_QUEUE_URL),
                new_org: optional(NEW_ORG_QUEUE_URL),
                block_account: optional(BLOCK_ACCOUNT_QUEUE_URL),
            },
            spruce_support_org_id: required(SPRUCE_SUPPORT_ORG_ID)?,
            support_person_name: optional(SUPPORT_PERSON_NAME)
                .unwrap_or_else(|| DEFAULT_SUPPORT_PERSON_NAME.to_string()),
            queue_kms_key_arn: optional(QUEUE_KMS_KEY_ARN),
            blocked_accounts_dir: optional(BLOCKED_ACCOUNTS_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BLOCKED_ACCOUNTS_DIR)),
            stop_wait,
        })
    }
}

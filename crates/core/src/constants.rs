//! Constants used throughout the courier core crate.
//!
//! Queue receive parameters, content dictionaries and support scheduling values live here so
//! the workers and their tests agree on them.

use std::time::Duration;

/// Messages fetched per receive call.
pub const RECEIVE_MAX_MESSAGES: i32 = 1;

/// How long a received message stays hidden from other consumers.
pub const RECEIVE_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Long-poll wait per receive call.
pub const RECEIVE_WAIT_TIME: Duration = Duration::from_secs(20);

/// Pause after a failed receive before polling again.
pub const RECEIVE_ERROR_PAUSE: Duration = Duration::from_secs(1);

/// Phrases that mark an inbound SMS as carrier or verification-code spam.
///
/// Matched as case-insensitive substrings.
pub const SPAM_PHRASES: &[&str] = &[
    "WeChat Verification Code",
    "Your TALK2 verification code is",
    "is your verification code for Instanumber",
    "Your Swytch PIN :",
    "The code is only used for removing WeChat restrictions. Do not share it with anyone.",
    "You can also tap on this link to verify your phone: v.whatsapp.com",
    "[Alibaba Group]Your verification code for validation is",
    "Your ESIAtalk number is",
    "is your AOL verification code.",
    "Jelastic account activation code:",
    "Your textPlus access code is",
    "您申请注册微博，验证码",
    "Your Virtual SIM  verification code",
];

/// Short titles that earn a provider the "Dr. <last name>" salutation. Exact match.
pub const DOCTORAL_TITLES: &[&str] = &[
    "DDS", "DMD", "DO", "DPM", "DVM", "MBBS", "MD", "OD", "PharmD", "PhD", "PsyD",
];

/// Support desk opening time, Pacific, as (hour, minute).
pub const SUPPORT_HOURS_OPEN: (u32, u32) = (7, 30);

/// Support desk closing time, Pacific, as (hour, minute). Inclusive.
pub const SUPPORT_HOURS_CLOSE: (u32, u32) = (22, 30);

/// Minimum age of an organization created during support hours before it is welcomed.
pub const SUPPORT_WELCOME_MIN_AGE: Duration = Duration::from_secs(12 * 60);

/// Delay before re-evaluating a welcome message that is not due yet.
pub const SUPPORT_RETRY_DELAY: Duration = Duration::from_secs(15 * 60);

/// Earliest Pacific hour at which an after-hours organization is welcomed the next morning.
pub const SUPPORT_MORNING_HOUR: u32 = 9;

/// Pacific hours treated as "same evening" for organizations created after hours.
pub const SUPPORT_EVENING_HOURS: std::ops::RangeInclusive<u32> = 12..=23;

/// Notification summary on the automated welcome message.
pub const SUPPORT_MESSAGE_SUMMARY: &str = "Automated message from Spruce support";

/// Reason recorded with excomms when deprovisioning a blocked organization's endpoints.
pub const BLOCK_ACCOUNT_REASON: &str = "block account";

/// Default directory for blocked account records when none is configured.
pub const DEFAULT_BLOCKED_ACCOUNTS_DIR: &str = "blocked_accounts";

/// Default support person named in welcome messages.
pub const DEFAULT_SUPPORT_PERSON_NAME: &str = "Kim";

/// Default grace period for in-flight handlers on shutdown.
pub const DEFAULT_STOP_WAIT: Duration = Duration::from_secs(30);

//! Scheduled welcome message for newly created organizations.
//!
//! When an organization is created the support team greets its first provider in the
//! organization's support thread. The greeting is timed to look like it came from a person:
//!
//! - Organizations created during support hours (07:30–22:30 Pacific) are greeted once they are
//!   at least 12 minutes old.
//! - Organizations created outside support hours are greeted the next morning from 09:00
//!   Pacific.
//!
//! A message that is not due yet is rescheduled through the queue, never by sleeping.

use crate::clock::Clock;
use crate::constants::{
    DOCTORAL_TITLES, SUPPORT_EVENING_HOURS, SUPPORT_HOURS_CLOSE, SUPPORT_HOURS_OPEN,
    SUPPORT_MESSAGE_SUMMARY, SUPPORT_MORNING_HOUR, SUPPORT_RETRY_DELAY, SUPPORT_WELCOME_MIN_AGE,
};
use crate::directory::lookup_by_id;
use crate::error::{WorkerError, WorkerResult};
use crate::markup;
use crate::services::{DirectoryClient, ThreadingClient};
use crate::worker::{EventHandler, Outcome};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Timelike, Utc};
use chrono_tz::America::Los_Angeles;
use courier_types::VisibleText;
use courier_proto::directory::EntityInfo;
use courier_proto::threading::{NewOrgCreatedEvent, PostMessageRequest, ThreadRequest};
use std::sync::Arc;
use tonic::Code;

/// What to do with a welcome message at a given moment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Post,
    RetryLater,
}

/// Whether `t` falls within support hours, boundary minutes included.
pub fn within_support_hours(t: DateTime<Utc>) -> bool {
    let local = t.with_timezone(&Los_Angeles);
    let hm = (local.hour(), local.minute());
    hm >= SUPPORT_HOURS_OPEN && hm <= SUPPORT_HOURS_CLOSE
}

pub fn decide(org_created: DateTime<Utc>, now: DateTime<Utc>) -> Decision {
    if within_support_hours(org_created) {
        let old_enough = (now - org_created)
            .to_std()
            .is_ok_and(|age| age >= SUPPORT_WELCOME_MIN_AGE);
        return if old_enough {
            Decision::Post
        } else {
            Decision::RetryLater
        };
    }

    let hour = now.with_timezone(&Los_Angeles).hour();
    if SUPPORT_EVENING_HOURS.contains(&hour) {
        Decision::RetryLater
    } else if hour >= SUPPORT_MORNING_HOUR {
        Decision::Post
    } else {
        Decision::RetryLater
    }
}

/// How the welcome message addresses the provider.
pub fn provider_name(info: &EntityInfo) -> String {
    let doctor = DOCTORAL_TITLES.contains(&info.short_title.as_str());
    if doctor && !info.last_name.is_empty() {
        return format!("Dr. {}", info.last_name);
    }
    if !info.first_name.is_empty() {
        return info.first_name.clone();
    }
    info.display_name.clone()
}

/// Welcome text in block markup.
pub fn welcome_message(provider_name: &str, support_person_name: &str) -> String {
    format!(
        "Hi {provider} - great to see you on here! I'm {support}, and I'm part of the Spruce \
         support team. If you have questions while you're getting your practice set up, reply \
         in this thread and one of us will get back to you. Our \
         <a href=\"https://support.sprucehealth.com\">help center</a> is also open anytime.",
        provider = markup::escape(provider_name),
        support = markup::escape(support_person_name),
    )
}

/// Posts the Spruce support welcome into a new organization's support thread.
///
/// Runs once per thread: a thread that already holds more than one message is left alone.
/// Outside support hours the event is rescheduled instead of posted.
pub struct SupportWorker {
    directory: Arc<dyn DirectoryClient>,
    threading: Arc<dyn ThreadingClient>,
    clock: Arc<dyn Clock>,
    support_person_name: String,
}

impl SupportWorker {
    /// Creates a new support worker.
    ///
    /// `support_person_name` is the support team member introduced in the welcome text.
    pub fn new(
        directory: Arc<dyn DirectoryClient>,
        threading: Arc<dyn ThreadingClient>,
        clock: Arc<dyn Clock>,
        support_person_name: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            threading,
            clock,
            support_person_name: support_person_name.into(),
        }
    }
}

#[async_trait]
impl EventHandler for SupportWorker {
    type Event = NewOrgCreatedEvent;

    fn name(&self) -> &'static str {
        "support-worker"
    }

    async fn process(&self, event: NewOrgCreatedEvent) -> WorkerResult<Outcome> {
        let thread = match self
            .threading
            .thread(ThreadRequest {
                thread_id: event.org_support_thread_id.clone(),
            })
            .await
        {
            Ok(res) => res.thread,
            Err(status) if status.code() == Code::NotFound => None,
            Err(status) => return Err(WorkerError::rpc("fetch support thread")(status)),
        };
        let Some(thread) = thread else {
            tracing::warn!(thread_id = %event.org_support_thread_id, "support thread not found");
            return Ok(Outcome::Done);
        };

        if thread.message_count > 1 {
            tracing::debug!(thread_id = %thread.id, "support thread already active");
            return Ok(Outcome::Done);
        }

        let org_created = Utc
            .timestamp_opt(event.org_created, 0)
            .single()
            .ok_or_else(|| {
                WorkerError::Malformed(format!("org creation time {}", event.org_created))
            })?;
        if decide(org_created, self.clock.now()) == Decision::RetryLater {
            return Ok(Outcome::RetryLater(SUPPORT_RETRY_DELAY));
        }

        let provider = lookup_by_id(
            self.directory.as_ref(),
            &event.initial_provider_entity_id,
            0,
            &[],
        )
        .await
        .map_err(WorkerError::rpc("lookup provider"))?
        .ok_or_else(|| WorkerError::EntityNotFound(event.initial_provider_entity_id.clone()))?;
        let name = provider_name(&provider.info.unwrap_or_default());

        let text = welcome_message(&name, &self.support_person_name);
        let plain = markup::plain_text(&text)
            .map_err(|e| WorkerError::InvalidContent(e.to_string()))?;
        VisibleText::new(plain)
            .map_err(|e| WorkerError::InvalidContent(format!("welcome message: {e}")))?;

        self.threading
            .post_message(PostMessageRequest {
                thread_id: thread.id.clone(),
                from_entity_id: thread.primary_entity_id.clone(),
                source: None,
                destinations: Vec::new(),
                internal: false,
                text,
                summary: SUPPORT_MESSAGE_SUMMARY.to_string(),
                attachments: Vec::new(),
            })
            .await
            .map_err(WorkerError::rpc("post welcome message"))?;

        tracing::info!(thread_id = %thread.id, "posted welcome message");
        Ok(Outcome::Done)
    }
}

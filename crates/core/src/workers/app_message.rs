//! Sends messages posted in the app out to the external party over SMS.

use crate::directory::lookup_by_id;
use crate::error::{WorkerError, WorkerResult};
use crate::services::{DirectoryClient, ExcommsClient};
use crate::worker::{EventHandler, Outcome};
use async_trait::async_trait;
use courier_proto::directory::{Entity, EntityInformation};
use courier_proto::excomms::{ChannelType, SendMessageRequest};
use courier_proto::threading::{thread_item, EndpointChannel, PublishedThreadItem, ThreadItemType};
use std::sync::Arc;

const LOOKUP_INFORMATION: &[EntityInformation] =
    &[EntityInformation::Members, EntityInformation::Contacts];

/// Forwards app-originated messages in EXTERNAL threads to the party's phone.
///
/// Only non-internal `MESSAGE` items whose source channel is `APP` are sent. The SMS goes
/// from the organization's first contact to the external entity's first contact.
pub struct AppMessageRouter {
    directory: Arc<dyn DirectoryClient>,
    excomms: Arc<dyn ExcommsClient>,
}

impl AppMessageRouter {
    /// Creates a router that resolves parties through `directory` and sends through `excomms`.
    pub fn new(directory: Arc<dyn DirectoryClient>, excomms: Arc<dyn ExcommsClient>) -> Self {
        Self { directory, excomms }
    }

    async fn entity(&self, id: &str) -> WorkerResult<Entity> {
        lookup_by_id(self.directory.as_ref(), id, 1, LOOKUP_INFORMATION)
            .await
            .map_err(WorkerError::rpc("lookup entity"))?
            .ok_or_else(|| WorkerError::EntityNotFound(id.to_string()))
    }
}

#[async_trait]
impl EventHandler for AppMessageRouter {
    type Event = PublishedThreadItem;

    fn name(&self) -> &'static str {
        "app-message-router"
    }

    async fn process(&self, pti: PublishedThreadItem) -> WorkerResult<Outcome> {
        let Some(item) = pti.item else {
            tracing::debug!(thread_id = %pti.thread_id, "thread item event without item");
            return Ok(Outcome::Done);
        };
        if item.internal || item.r#type() != ThreadItemType::Message {
            return Ok(Outcome::Done);
        }
        let Some(thread_item::Item::Message(message)) = item.item else {
            return Ok(Outcome::Done);
        };
        let from_app = message.source.as_ref().is_some_and(|source| {
            matches!(
                EndpointChannel::try_from(source.channel),
                Ok(EndpointChannel::App)
            )
        });
        if !from_app {
            return Ok(Outcome::Done);
        }

        let org = self.entity(&pti.organization_id).await?;
        let external = self.entity(&pti.primary_entity_id).await?;

        let (Some(org_contact), Some(external_contact)) =
            (org.contacts.first(), external.contacts.first())
        else {
            tracing::warn!(
                org_id = %org.id,
                entity_id = %external.id,
                "organization or external entity has no contact, not sending"
            );
            return Ok(Outcome::Done);
        };

        self.excomms
            .send_message(SendMessageRequest {
                from_channel_id: org_contact.value.clone(),
                to_channel_id: external_contact.value.clone(),
                text: message.text,
                channel: ChannelType::Sms as i32,
            })
            .await
            .map_err(WorkerError::rpc("send message"))?;

        tracing::info!(thread_id = %pti.thread_id, item_id = %item.id, "sent app message");
        Ok(Outcome::Done)
    }
}

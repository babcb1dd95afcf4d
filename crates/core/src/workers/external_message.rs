//! Routes carrier SMS and call events into EXTERNAL threads.
//!
//! Every external party of an organization has exactly one EXTERNAL thread whose primary
//! entity is that party. The router finds (or creates) the party's entity, finds (or creates)
//! the thread and posts the event into it.

use crate::constants::SPAM_PHRASES;
use crate::directory::{
    display_name, external_member, lookup_by_contact, organization_of, provider_or_org,
    requested_information,
};
use crate::error::{WorkerError, WorkerResult};
use crate::services::{DirectoryClient, ThreadingClient};
use crate::worker::{EventHandler, Outcome};
use async_trait::async_trait;
use courier_proto::directory::{
    Contact, ContactType, CreateEntityRequest, Entity, EntityInformation, EntityType,
};
use courier_proto::excomms::{
    published_external_message::Item, CallEventItem, CallEventType, Direction,
    PublishedExternalMessage, SmsItem,
};
use courier_proto::threading::{
    attachment, Attachment, AudioAttachment, CreateThreadRequest, Endpoint, EndpointChannel,
    ImageAttachment, PostMessageRequest, ThreadsForMemberRequest, UpdateThreadRequest,
};
use std::sync::Arc;

/// Posts carrier SMS and call events into the external party's thread, creating the party
/// and the thread on first contact.
pub struct ExternalMessageRouter {
    directory: Arc<dyn DirectoryClient>,
    threading: Arc<dyn ThreadingClient>,
}

/// Both sides of a message once resolved against the directory.
struct Parties {
    org: Entity,
    /// The organization or provider on our side of the conversation.
    provider: Entity,
    external: Option<Entity>,
    external_channel_id: String,
}

/// Rendered thread item for an external message.
struct Content {
    channel: EndpointChannel,
    text: String,
    attachments: Vec<Attachment>,
}

impl ExternalMessageRouter {
    /// Creates a router over the directory and threading services.
    pub fn new(directory: Arc<dyn DirectoryClient>, threading: Arc<dyn ThreadingClient>) -> Self {
        Self {
            directory,
            threading,
        }
    }

    async fn resolve(
        &self,
        pem: &PublishedExternalMessage,
        direction: Direction,
    ) -> WorkerResult<Parties> {
        let to_entities = lookup_by_contact(self.directory.as_ref(), &pem.to_channel_id)
            .await
            .map_err(WorkerError::rpc("lookup recipient"))?;
        let from_entities = lookup_by_contact(self.directory.as_ref(), &pem.from_channel_id)
            .await
            .map_err(WorkerError::rpc("lookup sender"))?;

        let (ours, theirs, our_channel, their_channel) = match direction {
            Direction::Inbound => (
                &to_entities,
                &from_entities,
                &pem.to_channel_id,
                &pem.from_channel_id,
            ),
            Direction::Outbound => (
                &from_entities,
                &to_entities,
                &pem.from_channel_id,
                &pem.to_channel_id,
            ),
        };

        let provider = provider_or_org(ours, our_channel)
            .ok_or_else(|| WorkerError::NoOrgOrProvider(our_channel.clone()))?;
        let org = organization_of(provider)
            .ok_or_else(|| WorkerError::NoOrgOrProvider(our_channel.clone()))?;
        let external = external_member(theirs, &org.id);

        Ok(Parties {
            org: org.clone(),
            provider: provider.clone(),
            external: external.cloned(),
            external_channel_id: their_channel.clone(),
        })
    }

    async fn create_external_entity(&self, org_id: &str, channel_id: &str) -> WorkerResult<Entity> {
        let req = CreateEntityRequest {
            r#type: EntityType::External as i32,
            initial_membership_entity_id: org_id.to_string(),
            contacts: vec![Contact {
                contact_type: ContactType::Phone as i32,
                value: channel_id.to_string(),
                ..Default::default()
            }],
            entity_info: None,
            requested_information: Some(requested_information(
                1,
                &[EntityInformation::Memberships, EntityInformation::Contacts],
            )),
            external_id: String::new(),
        };

        let res = self
            .directory
            .create_entity(req)
            .await
            .map_err(WorkerError::rpc("create external entity"))?;
        match res.entity {
            Some(entity) if res.success => {
                tracing::info!(org_id, entity_id = %entity.id, "created external entity");
                Ok(entity)
            }
            _ => Err(WorkerError::UnexpectedResponse(format!(
                "entity creation for {channel_id} in {org_id} returned no entity"
            ))),
        }
    }
}

#[async_trait]
impl EventHandler for ExternalMessageRouter {
    type Event = PublishedExternalMessage;

    fn name(&self) -> &'static str {
        "external-message-router"
    }

    async fn process(&self, pem: PublishedExternalMessage) -> WorkerResult<Outcome> {
        let item = pem
            .item
            .clone()
            .ok_or_else(|| WorkerError::Malformed("external message without item".into()))?;
        let direction = Direction::try_from(pem.direction)
            .map_err(|e| WorkerError::Malformed(format!("external message direction: {e}")))?;

        if let Item::SmsItem(sms) = &item {
            if direction == Direction::Inbound && is_spam(&sms.text) {
                tracing::info!(from = %pem.from_channel_id, "dropping spam sms");
                return Ok(Outcome::Done);
            }
        }

        let mut parties = self.resolve(&pem, direction).await?;
        let content = match item {
            Item::SmsItem(sms) => sms_content(sms),
            Item::CallEventItem(call) => call_content(&pem, call, &parties)?,
        };
        let external = match parties.external.take() {
            Some(external) => external,
            None => {
                self.create_external_entity(&parties.org.id, &parties.external_channel_id)
                    .await?
            }
        };

        let threads = self
            .threading
            .threads_for_member(ThreadsForMemberRequest {
                entity_id: external.id.clone(),
                primary_only: true,
            })
            .await
            .map_err(WorkerError::rpc("threads for member"))?
            .threads;
        let existing = threads
            .into_iter()
            .find(|t| t.primary_entity_id == external.id);

        let source = Endpoint {
            channel: content.channel as i32,
            id: pem.from_channel_id.clone(),
        };
        let destination = Endpoint {
            channel: content.channel as i32,
            id: pem.to_channel_id.clone(),
        };

        match existing {
            Some(thread) => {
                let from_entity_id = match direction {
                    Direction::Inbound => external.id.clone(),
                    Direction::Outbound => parties.provider.id.clone(),
                };
                self.threading
                    .post_message(PostMessageRequest {
                        thread_id: thread.id.clone(),
                        from_entity_id,
                        source: Some(source),
                        destinations: vec![destination],
                        internal: false,
                        text: content.text,
                        summary: String::new(),
                        attachments: content.attachments,
                    })
                    .await
                    .map_err(WorkerError::rpc("post message"))?;
                tracing::info!(thread_id = %thread.id, "posted external message");
            }
            None => {
                let res = self
                    .threading
                    .create_thread(CreateThreadRequest {
                        organization_id: parties.org.id.clone(),
                        from_entity_id: external.id.clone(),
                        source: Some(source),
                        destinations: vec![destination],
                        text: content.text,
                        attachments: content.attachments,
                        summary: String::new(),
                        internal: false,
                    })
                    .await
                    .map_err(WorkerError::rpc("create thread"))?;
                tracing::info!(
                    thread_id = %res.thread_id,
                    org_id = %parties.org.id,
                    "created external thread"
                );

                // The message is already delivered, so a failed title update is not retried.
                let system_title = display_name(
                    &parties.external_channel_id,
                    ContactType::Phone,
                    Some(&external),
                );
                if let Err(status) = self
                    .threading
                    .update_thread(UpdateThreadRequest {
                        thread_id: res.thread_id.clone(),
                        system_title,
                    })
                    .await
                {
                    tracing::warn!(thread_id = %res.thread_id, error = %status, "failed to set thread title");
                }
            }
        }

        Ok(Outcome::Done)
    }
}

fn is_spam(text: &str) -> bool {
    let text = text.to_lowercase();
    SPAM_PHRASES
        .iter()
        .any(|phrase| text.contains(&phrase.to_lowercase()))
}

fn sms_content(sms: SmsItem) -> Content {
    let attachments = sms
        .attachments
        .into_iter()
        .map(|media| Attachment {
            title: String::new(),
            data: Some(attachment::Data::Image(ImageAttachment {
                mimetype: media.content_type,
                url: media.url,
                width: 0,
                height: 0,
            })),
        })
        .collect();

    Content {
        channel: EndpointChannel::Sms,
        text: sms.text,
        attachments,
    }
}

fn call_content(
    pem: &PublishedExternalMessage,
    call: CallEventItem,
    parties: &Parties,
) -> WorkerResult<Content> {
    let from = &pem.from_channel_id;
    let to = &pem.to_channel_id;
    let org_name = display_name(to, ContactType::Phone, Some(&parties.org));
    let from_name = display_name(from, ContactType::Phone, Some(&parties.provider));

    let mut attachments = Vec::new();
    let call_type = CallEventType::try_from(call.r#type)
        .map_err(|e| WorkerError::Malformed(format!("call event type: {e}")))?;
    let text = match call_type {
        CallEventType::IncomingAnswered => format!("{from} called {org_name}, answered."),
        CallEventType::IncomingUnanswered => format!("{from} called {org_name}, did not answer."),
        CallEventType::IncomingLeftVoicemail => {
            attachments.push(Attachment {
                title: String::new(),
                data: Some(attachment::Data::Audio(AudioAttachment {
                    mimetype: String::new(),
                    url: call.url.clone(),
                    duration_seconds: call.duration_seconds,
                })),
            });
            format!("{from} called {org_name}, left voicemail.")
        }
        CallEventType::OutgoingPlaced => format!("{from_name} called {to}."),
        CallEventType::OutgoingAnswered => format!("{from_name} called {to}, answered."),
        CallEventType::OutgoingUnanswered => format!("{from_name} called {to}, did not answer."),
    };

    Ok(Content {
        channel: EndpointChannel::Voice,
        text,
        attachments,
    })
}

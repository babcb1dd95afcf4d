//! In-memory fakes of the queue and the backend services, plus entity builders.

use crate::error::QueueError;
use crate::queue::{encode_notification, Queue, QueueMessage, ReceiveParams};
use crate::services::{AuthClient, DirectoryClient, ExcommsClient, ThreadingClient};
use async_trait::async_trait;
use courier_proto::directory::{
    Contact, ContactType, CreateEntityRequest, CreateEntityResponse, Entity, EntityInfo,
    EntityStatus, EntityType, LookupBy, LookupEntitiesByContactRequest,
    LookupEntitiesByContactResponse, LookupEntitiesRequest, LookupEntitiesResponse,
};
use courier_proto::{auth, excomms, threading};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;
use tonic::{Code, Status};

// ============================================================================
// ENTITY BUILDERS
// ============================================================================

pub fn contact(value: &str, provisioned: bool) -> Contact {
    let contact_type = if value.contains('@') {
        ContactType::Email
    } else {
        ContactType::Phone
    };
    Contact {
        id: format!("contact_{value}"),
        contact_type: contact_type as i32,
        value: value.to_string(),
        provisioned,
        label: String::new(),
    }
}

pub fn entity(id: &str, entity_type: EntityType) -> Entity {
    Entity {
        id: id.to_string(),
        r#type: entity_type as i32,
        status: EntityStatus::Active as i32,
        ..Default::default()
    }
}

/// Copy of `entity` without relations, as it appears inside another entity's lookup.
pub fn stripped(entity: &Entity) -> Entity {
    Entity {
        memberships: Vec::new(),
        members: Vec::new(),
        ..entity.clone()
    }
}

pub fn organization(id: &str, name: &str, contacts: &[(&str, bool)]) -> Entity {
    Entity {
        info: Some(EntityInfo {
            display_name: name.to_string(),
            ..Default::default()
        }),
        contacts: contacts
            .iter()
            .map(|(value, provisioned)| contact(value, *provisioned))
            .collect(),
        ..entity(id, EntityType::Organization)
    }
}

pub fn provider(id: &str, name: &str, phone: &str, org: &Entity) -> Entity {
    Entity {
        info: Some(EntityInfo {
            display_name: name.to_string(),
            ..Default::default()
        }),
        contacts: vec![contact(phone, true)],
        memberships: vec![stripped(org)],
        ..entity(id, EntityType::Internal)
    }
}

pub fn external(id: &str, value: &str, org: &Entity) -> Entity {
    Entity {
        contacts: vec![contact(value, false)],
        memberships: vec![stripped(org)],
        ..entity(id, EntityType::External)
    }
}

pub fn thread(id: &str, org_id: &str, primary_entity_id: &str, message_count: i32) -> threading::Thread {
    threading::Thread {
        id: id.to_string(),
        organization_id: org_id.to_string(),
        primary_entity_id: primary_entity_id.to_string(),
        r#type: threading::ThreadType::External as i32,
        message_count,
        ..Default::default()
    }
}

fn injected(code: Code) -> Status {
    Status::new(code, "injected failure")
}

// ============================================================================
// QUEUE
// ============================================================================

#[derive(Default)]
struct QueueState {
    ready: VecDeque<QueueMessage>,
    deleted: Vec<String>,
    visibility_changes: Vec<(String, Duration)>,
    fail_next_receive: bool,
    next_receipt: usize,
}

/// Queue that hands out pushed messages and records acknowledgements.
#[derive(Default)]
pub struct MemoryQueue {
    state: Mutex<QueueState>,
}

impl MemoryQueue {
    pub fn push_raw(&self, body: &str) -> QueueMessage {
        let mut state = self.state.lock().unwrap();
        state.next_receipt += 1;
        let message = QueueMessage {
            receipt_handle: format!("receipt-{}", state.next_receipt),
            body: body.to_string(),
        };
        state.ready.push_back(message.clone());
        message
    }

    pub fn push_event<M: prost::Message>(&self, event: &M) -> QueueMessage {
        self.push_raw(&encode_notification(&event.encode_to_vec()))
    }

    pub fn fail_next_receive(&self) {
        self.state.lock().unwrap().fail_next_receive = true;
    }

    pub fn deleted(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn visibility_changes(&self) -> Vec<(String, Duration)> {
        self.state.lock().unwrap().visibility_changes.clone()
    }
}

#[async_trait]
impl Queue for MemoryQueue {
    fn url(&self) -> &str {
        "memory://queue"
    }

    async fn receive(&self, params: &ReceiveParams) -> Result<Vec<QueueMessage>, QueueError> {
        let messages = {
            let mut state = self.state.lock().unwrap();
            if std::mem::take(&mut state.fail_next_receive) {
                return Err(QueueError::Receive {
                    url: self.url().to_string(),
                    message: "injected failure".into(),
                });
            }
            let take = usize::try_from(params.max_messages)
                .unwrap_or(1)
                .min(state.ready.len());
            state.ready.drain(..take).collect::<Vec<_>>()
        };

        if messages.is_empty() {
            // Stand-in for the long poll.
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.state
            .lock()
            .unwrap()
            .deleted
            .push(receipt_handle.to_string());
        Ok(())
    }

    async fn change_visibility(
        &self,
        receipt_handle: &str,
        timeout: Duration,
    ) -> Result<(), QueueError> {
        self.state
            .lock()
            .unwrap()
            .visibility_changes
            .push((receipt_handle.to_string(), timeout));
        Ok(())
    }
}

// ============================================================================
// DIRECTORY
// ============================================================================

#[derive(Default)]
struct DirectoryState {
    entities: Vec<Entity>,
    created: Vec<CreateEntityRequest>,
    contact_requests: Vec<LookupEntitiesByContactRequest>,
    contact_failure: Option<Code>,
}

#[derive(Default)]
pub struct FakeDirectory {
    state: Mutex<DirectoryState>,
}

impl FakeDirectory {
    pub fn with_entities(entities: Vec<Entity>) -> Self {
        let directory = Self::default();
        directory.state.lock().unwrap().entities = entities;
        directory
    }

    pub fn created(&self) -> Vec<CreateEntityRequest> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn contact_requests(&self) -> Vec<LookupEntitiesByContactRequest> {
        self.state.lock().unwrap().contact_requests.clone()
    }

    pub fn fail_contact_lookups_with(&self, code: Code) {
        self.state.lock().unwrap().contact_failure = Some(code);
    }
}

#[async_trait]
impl DirectoryClient for FakeDirectory {
    async fn lookup_entities(
        &self,
        req: LookupEntitiesRequest,
    ) -> Result<LookupEntitiesResponse, Status> {
        let state = self.state.lock().unwrap();
        let entities: Vec<Entity> = state
            .entities
            .iter()
            .filter(|e| match req.lookup_by() {
                LookupBy::EntityId => e.id == req.id,
                LookupBy::ExternalId => e.external_ids.contains(&req.id),
            })
            .cloned()
            .collect();
        if entities.is_empty() {
            return Err(Status::not_found(format!("no entity for {}", req.id)));
        }
        Ok(LookupEntitiesResponse { entities })
    }

    async fn lookup_entities_by_contact(
        &self,
        req: LookupEntitiesByContactRequest,
    ) -> Result<LookupEntitiesByContactResponse, Status> {
        let mut state = self.state.lock().unwrap();
        state.contact_requests.push(req.clone());
        if let Some(code) = state.contact_failure {
            return Err(injected(code));
        }
        let entities = state
            .entities
            .iter()
            .filter(|e| {
                e.contacts
                    .iter()
                    .any(|c| c.value.eq_ignore_ascii_case(&req.contact_value))
            })
            .cloned()
            .collect();
        Ok(LookupEntitiesByContactResponse {
            entities,
            failure: None,
        })
    }

    async fn create_entity(
        &self,
        req: CreateEntityRequest,
    ) -> Result<CreateEntityResponse, Status> {
        let mut state = self.state.lock().unwrap();
        state.created.push(req.clone());

        let memberships = state
            .entities
            .iter()
            .filter(|e| e.id == req.initial_membership_entity_id)
            .map(stripped)
            .collect();
        let entity = Entity {
            id: format!("ent_new_{}", state.created.len()),
            r#type: req.r#type,
            info: req.entity_info.clone(),
            contacts: req.contacts.clone(),
            memberships,
            status: EntityStatus::Active as i32,
            ..Default::default()
        };
        state.entities.push(entity.clone());

        Ok(CreateEntityResponse {
            entity: Some(entity),
            success: true,
            failure: None,
        })
    }
}

// ============================================================================
// THREADING
// ============================================================================

#[derive(Default)]
struct ThreadingState {
    threads: Vec<threading::Thread>,
    created: Vec<threading::CreateThreadRequest>,
    posted: Vec<threading::PostMessageRequest>,
    updated: Vec<threading::UpdateThreadRequest>,
    deleted: Vec<threading::DeleteThreadRequest>,
    onboarding: Vec<threading::OnboardingThreadEventRequest>,
    onboarding_failure: Option<Code>,
    update_failure: Option<Code>,
}

#[derive(Default)]
pub struct FakeThreading {
    state: Mutex<ThreadingState>,
}

impl FakeThreading {
    pub fn with_threads(threads: Vec<threading::Thread>) -> Self {
        let fake = Self::default();
        fake.state.lock().unwrap().threads = threads;
        fake
    }

    pub fn threads(&self) -> Vec<threading::Thread> {
        self.state.lock().unwrap().threads.clone()
    }

    pub fn created(&self) -> Vec<threading::CreateThreadRequest> {
        self.state.lock().unwrap().created.clone()
    }

    pub fn posted(&self) -> Vec<threading::PostMessageRequest> {
        self.state.lock().unwrap().posted.clone()
    }

    pub fn updated(&self) -> Vec<threading::UpdateThreadRequest> {
        self.state.lock().unwrap().updated.clone()
    }

    pub fn deleted(&self) -> Vec<threading::DeleteThreadRequest> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn onboarding_events(&self) -> Vec<threading::OnboardingThreadEventRequest> {
        self.state.lock().unwrap().onboarding.clone()
    }

    pub fn fail_onboarding_with(&self, code: Code) {
        self.state.lock().unwrap().onboarding_failure = Some(code);
    }

    pub fn fail_updates_with(&self, code: Code) {
        self.state.lock().unwrap().update_failure = Some(code);
    }
}

#[async_trait]
impl ThreadingClient for FakeThreading {
    async fn thread(
        &self,
        req: threading::ThreadRequest,
    ) -> Result<threading::ThreadResponse, Status> {
        let state = self.state.lock().unwrap();
        state
            .threads
            .iter()
            .find(|t| t.id == req.thread_id)
            .map(|t| threading::ThreadResponse {
                thread: Some(t.clone()),
            })
            .ok_or_else(|| Status::not_found(format!("no thread {}", req.thread_id)))
    }

    async fn threads_for_member(
        &self,
        req: threading::ThreadsForMemberRequest,
    ) -> Result<threading::ThreadsForMemberResponse, Status> {
        let state = self.state.lock().unwrap();
        let threads = state
            .threads
            .iter()
            .filter(|t| t.primary_entity_id == req.entity_id)
            .cloned()
            .collect();
        Ok(threading::ThreadsForMemberResponse { threads })
    }

    async fn create_thread(
        &self,
        req: threading::CreateThreadRequest,
    ) -> Result<threading::CreateThreadResponse, Status> {
        let mut state = self.state.lock().unwrap();
        state.created.push(req.clone());
        let new_thread = thread(
            &format!("thread_new_{}", state.created.len()),
            &req.organization_id,
            &req.from_entity_id,
            1,
        );
        state.threads.push(new_thread.clone());
        Ok(threading::CreateThreadResponse {
            thread_id: new_thread.id.clone(),
            thread: Some(new_thread),
        })
    }

    async fn post_message(
        &self,
        req: threading::PostMessageRequest,
    ) -> Result<threading::PostMessageResponse, Status> {
        let mut state = self.state.lock().unwrap();
        let thread = state
            .threads
            .iter_mut()
            .find(|t| t.id == req.thread_id)
            .ok_or_else(|| Status::not_found(format!("no thread {}", req.thread_id)))?;
        thread.message_count += 1;
        let thread = thread.clone();
        state.posted.push(req);
        Ok(threading::PostMessageResponse {
            item: None,
            thread: Some(thread),
        })
    }

    async fn update_thread(
        &self,
        req: threading::UpdateThreadRequest,
    ) -> Result<threading::UpdateThreadResponse, Status> {
        let mut state = self.state.lock().unwrap();
        if let Some(code) = state.update_failure {
            return Err(injected(code));
        }
        state.updated.push(req.clone());
        let thread = state.threads.iter_mut().find(|t| t.id == req.thread_id);
        let thread = thread.map(|t| {
            t.system_title = req.system_title.clone();
            t.clone()
        });
        Ok(threading::UpdateThreadResponse { thread })
    }

    async fn delete_thread(
        &self,
        req: threading::DeleteThreadRequest,
    ) -> Result<threading::DeleteThreadResponse, Status> {
        let mut state = self.state.lock().unwrap();
        state.threads.retain(|t| t.id != req.thread_id);
        state.deleted.push(req);
        Ok(threading::DeleteThreadResponse {})
    }

    async fn onboarding_thread_event(
        &self,
        req: threading::OnboardingThreadEventRequest,
    ) -> Result<threading::OnboardingThreadEventResponse, Status> {
        let mut state = self.state.lock().unwrap();
        state.onboarding.push(req);
        match state.onboarding_failure {
            Some(code) => Err(injected(code)),
            None => Ok(threading::OnboardingThreadEventResponse { thread: None }),
        }
    }
}

// ============================================================================
// EXCOMMS
// ============================================================================

#[derive(Default)]
struct ExcommsState {
    sent: Vec<excomms::SendMessageRequest>,
    deprovisioned_phones: Vec<excomms::DeprovisionPhoneNumberRequest>,
    deprovisioned_emails: Vec<excomms::DeprovisionEmailRequest>,
}

#[derive(Default)]
pub struct FakeExcomms {
    state: Mutex<ExcommsState>,
}

impl FakeExcomms {
    pub fn sent(&self) -> Vec<excomms::SendMessageRequest> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn deprovisioned_phones(&self) -> Vec<excomms::DeprovisionPhoneNumberRequest> {
        self.state.lock().unwrap().deprovisioned_phones.clone()
    }

    pub fn deprovisioned_emails(&self) -> Vec<excomms::DeprovisionEmailRequest> {
        self.state.lock().unwrap().deprovisioned_emails.clone()
    }
}

#[async_trait]
impl ExcommsClient for FakeExcomms {
    async fn send_message(
        &self,
        req: excomms::SendMessageRequest,
    ) -> Result<excomms::SendMessageResponse, Status> {
        self.state.lock().unwrap().sent.push(req);
        Ok(excomms::SendMessageResponse {})
    }

    async fn deprovision_phone_number(
        &self,
        req: excomms::DeprovisionPhoneNumberRequest,
    ) -> Result<excomms::DeprovisionPhoneNumberResponse, Status> {
        self.state.lock().unwrap().deprovisioned_phones.push(req);
        Ok(excomms::DeprovisionPhoneNumberResponse {})
    }

    async fn deprovision_email(
        &self,
        req: excomms::DeprovisionEmailRequest,
    ) -> Result<excomms::DeprovisionEmailResponse, Status> {
        self.state.lock().unwrap().deprovisioned_emails.push(req);
        Ok(excomms::DeprovisionEmailResponse {})
    }
}

// ============================================================================
// AUTH
// ============================================================================

#[derive(Default)]
pub struct FakeAuth {
    accounts: Mutex<HashMap<String, auth::Account>>,
    blocked: Mutex<Vec<String>>,
}

impl FakeAuth {
    pub fn with_account(account_id: &str, email: &str) -> Self {
        let fake = Self::default();
        fake.accounts.lock().unwrap().insert(
            account_id.to_string(),
            auth::Account {
                id: account_id.to_string(),
                primary_account_email: email.to_string(),
            },
        );
        fake
    }

    pub fn blocked(&self) -> Vec<String> {
        self.blocked.lock().unwrap().clone()
    }
}

#[async_trait]
impl AuthClient for FakeAuth {
    async fn block_account(
        &self,
        req: auth::BlockAccountRequest,
    ) -> Result<auth::BlockAccountResponse, Status> {
        let account = self
            .accounts
            .lock()
            .unwrap()
            .get(&req.account_id)
            .cloned()
            .ok_or_else(|| Status::not_found(format!("no account {}", req.account_id)))?;
        self.blocked.lock().unwrap().push(req.account_id);
        Ok(auth::BlockAccountResponse {
            account: Some(account),
        })
    }
}

//! Blocks an account and tears down what it alone owned.
//!
//! Order of operations:
//! 1. Revoke the account in auth. An unknown account is a no-op.
//! 2. For every organization the account's entity belongs to where it is the only provider,
//!    deprovision the organization's phone numbers and emails and delete its thread in the
//!    Spruce support organization.
//! 3. Record the block in the local store. Recording is idempotent.

use crate::blocked_accounts::BlockedAccountStore;
use crate::clock::Clock;
use crate::constants::BLOCK_ACCOUNT_REASON;
use crate::directory::{lookup_by_external_id, lookup_by_id};
use crate::error::{WorkerError, WorkerResult};
use crate::services::{AuthClient, DirectoryClient, ExcommsClient, ThreadingClient};
use crate::worker::{EventHandler, Outcome};
use async_trait::async_trait;
use courier_proto::auth::BlockAccountRequest;
use courier_proto::directory::{ContactType, Entity, EntityInformation, EntityType};
use courier_proto::excomms::{DeprovisionEmailRequest, DeprovisionPhoneNumberRequest};
use courier_proto::threading::{DeleteThreadRequest, ThreadsForMemberRequest};
use std::sync::Arc;
use tonic::Code;

/// Blocks accounts published on the block-account queue.
///
/// Organizations the account shares with other providers are left alone. Every other
/// organization it belongs to loses its provisioned endpoints and its Spruce support thread.
pub struct BlockAccountWorker {
    auth: Arc<dyn AuthClient>,
    directory: Arc<dyn DirectoryClient>,
    excomms: Arc<dyn ExcommsClient>,
    threading: Arc<dyn ThreadingClient>,
    store: BlockedAccountStore,
    clock: Arc<dyn Clock>,
    spruce_support_org_id: String,
}

impl BlockAccountWorker {
    /// Creates a new block-account worker.
    ///
    /// # Arguments
    ///
    /// * `store` - Local record of blocked accounts, written last
    /// * `clock` - Source of the `blocked_at` timestamp
    /// * `spruce_support_org_id` - Organization that owns the support threads, used as the
    ///   actor when deleting them
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        auth: Arc<dyn AuthClient>,
        directory: Arc<dyn DirectoryClient>,
        excomms: Arc<dyn ExcommsClient>,
        threading: Arc<dyn ThreadingClient>,
        store: BlockedAccountStore,
        clock: Arc<dyn Clock>,
        spruce_support_org_id: impl Into<String>,
    ) -> Self {
        Self {
            auth,
            directory,
            excomms,
            threading,
            store,
            clock,
            spruce_support_org_id: spruce_support_org_id.into(),
        }
    }

    /// Deprovisions `org`'s endpoints and deletes its support thread.
    async fn teardown(&self, org: &Entity) -> WorkerResult<()> {
        for contact in org.contacts.iter().filter(|c| c.provisioned) {
            match contact.contact_type() {
                ContactType::Phone => {
                    self.excomms
                        .deprovision_phone_number(DeprovisionPhoneNumberRequest {
                            phone_number: contact.value.clone(),
                            reason: BLOCK_ACCOUNT_REASON.to_string(),
                        })
                        .await
                        .map_err(WorkerError::rpc("deprovision phone number"))?;
                }
                ContactType::Email => {
                    self.excomms
                        .deprovision_email(DeprovisionEmailRequest {
                            email: contact.value.clone(),
                            reason: BLOCK_ACCOUNT_REASON.to_string(),
                        })
                        .await
                        .map_err(WorkerError::rpc("deprovision email"))?;
                }
                ContactType::Unknown => {}
            }
        }

        let threads = self
            .threading
            .threads_for_member(ThreadsForMemberRequest {
                entity_id: org.id.clone(),
                primary_only: true,
            })
            .await
            .map_err(WorkerError::rpc("threads for member"))?
            .threads;
        let support_thread = threads
            .into_iter()
            .find(|t| t.organization_id == self.spruce_support_org_id);

        if let Some(thread) = support_thread {
            self.threading
                .delete_thread(DeleteThreadRequest {
                    thread_id: thread.id.clone(),
                    actor_entity_id: self.spruce_support_org_id.clone(),
                })
                .await
                .map_err(WorkerError::rpc("delete support thread"))?;
            tracing::info!(org_id = %org.id, thread_id = %thread.id, "deleted support thread");
        }

        Ok(())
    }
}

#[async_trait]
impl EventHandler for BlockAccountWorker {
    type Event = BlockAccountRequest;

    fn name(&self) -> &'static str {
        "block-account-worker"
    }

    async fn process(&self, req: BlockAccountRequest) -> WorkerResult<Outcome> {
        let account_id = req.account_id.clone();
        let account = match self.auth.block_account(req).await {
            Ok(res) => res.account.ok_or_else(|| {
                WorkerError::UnexpectedResponse(format!("no account returned for {account_id}"))
            })?,
            Err(status) if status.code() == Code::NotFound => {
                tracing::info!(account_id = %account_id, "account not found, nothing to block");
                return Ok(Outcome::Done);
            }
            Err(status) => return Err(WorkerError::rpc("block account")(status)),
        };
        tracing::info!(account_id = %account.id, "account blocked");

        let entities = lookup_by_external_id(
            self.directory.as_ref(),
            &account.id,
            &[EntityInformation::Memberships],
        )
        .await
        .map_err(WorkerError::rpc("lookup account entity"))?;
        let [entity] = entities.as_slice() else {
            return Err(WorkerError::UnexpectedResponse(format!(
                "expected one entity for account {}, found {}",
                account.id,
                entities.len()
            )));
        };

        let orgs = entity
            .memberships
            .iter()
            .filter(|m| m.r#type() == EntityType::Organization);
        for membership in orgs {
            let org = lookup_by_id(
                self.directory.as_ref(),
                &membership.id,
                1,
                &[EntityInformation::Members, EntityInformation::Contacts],
            )
            .await
            .map_err(WorkerError::rpc("lookup organization"))?
            .ok_or_else(|| WorkerError::EntityNotFound(membership.id.clone()))?;

            let providers = org
                .members
                .iter()
                .filter(|m| m.r#type() == EntityType::Internal)
                .count();
            if providers > 1 {
                tracing::info!(
                    org_id = %org.id,
                    providers,
                    "organization has other providers, leaving it intact"
                );
                continue;
            }

            self.teardown(&org).await?;
        }

        let email = account.primary_account_email.trim().to_string();
        if email.is_empty() {
            tracing::warn!(account_id = %account.id, "account has no email, block not recorded");
            return Ok(Outcome::Done);
        }
        let store = self.store.clone();
        let blocked_at = self.clock.now();
        let recorded =
            tokio::task::spawn_blocking(move || store.mark_account_as_blocked(&email, blocked_at))
                .await??;
        if !recorded {
            tracing::debug!(account_id = %account.id, "block already recorded");
        }

        Ok(Outcome::Done)
    }
}

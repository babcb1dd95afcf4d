//! Clients for the backend services the workers collaborate through.
//!
//! Each backend is a trait so workers can run against in-memory fakes. The `Grpc*Client`
//! types are the production implementations, thin wrappers over the clients generated from
//! `crates/proto/proto`.
//!
//! Failures are reported as [`tonic::Status`] so callers can branch on `NOT_FOUND`,
//! `FAILED_PRECONDITION` and friends.

use async_trait::async_trait;
use courier_proto::auth::auth_client::AuthClient as AuthStub;
use courier_proto::directory::directory_client::DirectoryClient as DirectoryStub;
use courier_proto::excomms::ex_comms_client::ExCommsClient as ExcommsStub;
use courier_proto::threading::threads_client::ThreadsClient as ThreadsStub;
use courier_proto::{auth, directory, excomms, threading};
use tonic::transport::{Channel, Endpoint};
use tonic::{Response, Status};

#[async_trait]
pub trait DirectoryClient: Send + Sync {
    async fn lookup_entities(
        &self,
        req: directory::LookupEntitiesRequest,
    ) -> Result<directory::LookupEntitiesResponse, Status>;

    async fn lookup_entities_by_contact(
        &self,
        req: directory::LookupEntitiesByContactRequest,
    ) -> Result<directory::LookupEntitiesByContactResponse, Status>;

    async fn create_entity(
        &self,
        req: directory::CreateEntityRequest,
    ) -> Result<directory::CreateEntityResponse, Status>;
}

#[async_trait]
pub trait ThreadingClient: Send + Sync {
    async fn thread(
        &self,
        req: threading::ThreadRequest,
    ) -> Result<threading::ThreadResponse, Status>;

    async fn threads_for_member(
        &self,
        req: threading::ThreadsForMemberRequest,
    ) -> Result<threading::ThreadsForMemberResponse, Status>;

    async fn create_thread(
        &self,
        req: threading::CreateThreadRequest,
    ) -> Result<threading::CreateThreadResponse, Status>;

    async fn post_message(
        &self,
        req: threading::PostMessageRequest,
    ) -> Result<threading::PostMessageResponse, Status>;

    async fn update_thread(
        &self,
        req: threading::UpdateThreadRequest,
    ) -> Result<threading::UpdateThreadResponse, Status>;

    async fn delete_thread(
        &self,
        req: threading::DeleteThreadRequest,
    ) -> Result<threading::DeleteThreadResponse, Status>;

    /// Advances the setup thread state machine. `NOT_FOUND` means no setup thread exists.
    async fn onboarding_thread_event(
        &self,
        req: threading::OnboardingThreadEventRequest,
    ) -> Result<threading::OnboardingThreadEventResponse, Status>;
}

#[async_trait]
pub trait ExcommsClient: Send + Sync {
    async fn send_message(
        &self,
        req: excomms::SendMessageRequest,
    ) -> Result<excomms::SendMessageResponse, Status>;

    async fn deprovision_phone_number(
        &self,
        req: excomms::DeprovisionPhoneNumberRequest,
    ) -> Result<excomms::DeprovisionPhoneNumberResponse, Status>;

    async fn deprovision_email(
        &self,
        req: excomms::DeprovisionEmailRequest,
    ) -> Result<excomms::DeprovisionEmailResponse, Status>;
}

#[async_trait]
pub trait AuthClient: Send + Sync {
    /// Revokes the account's access. `NOT_FOUND` when the account does not exist.
    async fn block_account(
        &self,
        req: auth::BlockAccountRequest,
    ) -> Result<auth::BlockAccountResponse, Status>;
}

/// Creates a channel to `addr` that connects on first use.
///
/// One channel can back any number of clients; tonic multiplexes requests over it.
pub fn connect_lazy(addr: &str) -> Result<Channel, tonic::transport::Error> {
    Ok(Endpoint::from_shared(addr.to_string())?.connect_lazy())
}

/// Directory client over the generated `Directory` stub.
#[derive(Clone, Debug)]
pub struct GrpcDirectoryClient(DirectoryStub<Channel>);

impl GrpcDirectoryClient {
    pub fn new(channel: Channel) -> Self {
        Self(DirectoryStub::new(channel))
    }
}

#[async_trait]
impl DirectoryClient for GrpcDirectoryClient {
    async fn lookup_entities(
        &self,
        req: directory::LookupEntitiesRequest,
    ) -> Result<directory::LookupEntitiesResponse, Status> {
        self.0.clone().lookup_entities(req).await.map(Response::into_inner)
    }

    async fn lookup_entities_by_contact(
        &self,
        req: directory::LookupEntitiesByContactRequest,
    ) -> Result<directory::LookupEntitiesByContactResponse, Status> {
        self.0
            .clone()
            .lookup_entities_by_contact(req)
            .await
            .map(Response::into_inner)
    }

    async fn create_entity(
        &self,
        req: directory::CreateEntityRequest,
    ) -> Result<directory::CreateEntityResponse, Status> {
        self.0.clone().create_entity(req).await.map(Response::into_inner)
    }
}

/// Threading client over the generated `Threads` stub.
#[derive(Clone, Debug)]
pub struct GrpcThreadingClient(ThreadsStub<Channel>);

impl GrpcThreadingClient {
    pub fn new(channel: Channel) -> Self {
        Self(ThreadsStub::new(channel))
    }
}

#[async_trait]
impl ThreadingClient for GrpcThreadingClient {
    async fn thread(
        &self,
        req: threading::ThreadRequest,
    ) -> Result<threading::ThreadResponse, Status> {
        self.0.clone().thread(req).await.map(Response::into_inner)
    }

    async fn threads_for_member(
        &self,
        req: threading::ThreadsForMemberRequest,
    ) -> Result<threading::ThreadsForMemberResponse, Status> {
        self.0
            .clone()
            .threads_for_member(req)
            .await
            .map(Response::into_inner)
    }

    async fn create_thread(
        &self,
        req: threading::CreateThreadRequest,
    ) -> Result<threading::CreateThreadResponse, Status> {
        self.0.clone().create_thread(req).await.map(Response::into_inner)
    }

    async fn post_message(
        &self,
        req: threading::PostMessageRequest,
    ) -> Result<threading::PostMessageResponse, Status> {
        self.0.clone().post_message(req).await.map(Response::into_inner)
    }

    async fn update_thread(
        &self,
        req: threading::UpdateThreadRequest,
    ) -> Result<threading::UpdateThreadResponse, Status> {
        self.0.clone().update_thread(req).await.map(Response::into_inner)
    }

    async fn delete_thread(
        &self,
        req: threading::DeleteThreadRequest,
    ) -> Result<threading::DeleteThreadResponse, Status> {
        self.0.clone().delete_thread(req).await.map(Response::into_inner)
    }

    async fn onboarding_thread_event(
        &self,
        req: threading::OnboardingThreadEventRequest,
    ) -> Result<threading::OnboardingThreadEventResponse, Status> {
        self.0
            .clone()
            .onboarding_thread_event(req)
            .await
            .map(Response::into_inner)
    }
}

/// Excomms client over the generated `ExComms` stub.
#[derive(Clone, Debug)]
pub struct GrpcExcommsClient(ExcommsStub<Channel>);

impl GrpcExcommsClient {
    pub fn new(channel: Channel) -> Self {
        Self(ExcommsStub::new(channel))
    }
}

#[async_trait]
impl ExcommsClient for GrpcExcommsClient {
    async fn send_message(
        &self,
        req: excomms::SendMessageRequest,
    ) -> Result<excomms::SendMessageResponse, Status> {
        self.0.clone().send_message(req).await.map(Response::into_inner)
    }

    async fn deprovision_phone_number(
        &self,
        req: excomms::DeprovisionPhoneNumberRequest,
    ) -> Result<excomms::DeprovisionPhoneNumberResponse, Status> {
        self.0
            .clone()
            .deprovision_phone_number(req)
            .await
            .map(Response::into_inner)
    }

    async fn deprovision_email(
        &self,
        req: excomms::DeprovisionEmailRequest,
    ) -> Result<excomms::DeprovisionEmailResponse, Status> {
        self.0
            .clone()
            .deprovision_email(req)
            .await
            .map(Response::into_inner)
    }
}

/// Auth client over the generated `Auth` stub.
#[derive(Clone, Debug)]
pub struct GrpcAuthClient(AuthStub<Channel>);

impl GrpcAuthClient {
    pub fn new(channel: Channel) -> Self {
        Self(AuthStub::new(channel))
    }
}

#[async_trait]
impl AuthClient for GrpcAuthClient {
    async fn block_account(
        &self,
        req: auth::BlockAccountRequest,
    ) -> Result<auth::BlockAccountResponse, Status> {
        self.0.clone().block_account(req).await.map(Response::into_inner)
    }
}

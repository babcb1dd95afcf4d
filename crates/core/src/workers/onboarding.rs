//! Advances setup threads when excomms provisions an endpoint for an entity.

use crate::error::{WorkerError, WorkerResult};
use crate::services::ThreadingClient;
use crate::worker::{EventHandler, Outcome};
use async_trait::async_trait;
use courier_proto::events::{Envelope, Service};
use courier_proto::excomms::{self, event::Details, EndpointType, EventType};
use courier_proto::threading::{
    onboarding_thread_event_request, OnboardingEventType, OnboardingLookupBy,
    OnboardingThreadEventRequest, ProvisionedPhoneEvent,
};
use prost::Message;
use std::sync::Arc;
use tonic::Code;

/// Turns excomms `PROVISIONED_ENDPOINT` events for phone numbers into `PROVISIONED_PHONE`
/// onboarding events on the entity's setup thread.
///
/// Events from other services, other event types and email endpoints are acknowledged
/// without effect.
pub struct OnboardingDriver {
    threading: Arc<dyn ThreadingClient>,
}

impl OnboardingDriver {
    /// Creates a driver that reports provisioned phones to `threading`.
    pub fn new(threading: Arc<dyn ThreadingClient>) -> Self {
        Self { threading }
    }
}

#[async_trait]
impl EventHandler for OnboardingDriver {
    type Event = Envelope;

    fn name(&self) -> &'static str {
        "onboarding-driver"
    }

    async fn process(&self, envelope: Envelope) -> WorkerResult<Outcome> {
        if envelope.service() != Service::Excomms {
            tracing::debug!(service = ?envelope.service(), "ignoring event from other service");
            return Ok(Outcome::Done);
        }

        let event = excomms::Event::decode(envelope.event.as_slice())
            .map_err(|e| WorkerError::Malformed(format!("excomms event: {e}")))?;
        if event.r#type() != EventType::ProvisionedEndpoint {
            return Ok(Outcome::Done);
        }
        let Some(Details::ProvisionedEndpoint(endpoint)) = event.details else {
            return Err(WorkerError::Malformed(
                "provisioned endpoint event without details".into(),
            ));
        };
        let endpoint_type = EndpointType::try_from(endpoint.endpoint_type)
            .map_err(|e| WorkerError::Malformed(format!("provisioned endpoint type: {e}")))?;
        if endpoint_type != EndpointType::Phone {
            return Ok(Outcome::Done);
        }

        let req = OnboardingThreadEventRequest {
            lookup_by: OnboardingLookupBy::EntityId as i32,
            thread_id: String::new(),
            entity_id: endpoint.for_entity_id.clone(),
            event_type: OnboardingEventType::ProvisionedPhone as i32,
            event: Some(onboarding_thread_event_request::Event::ProvisionedPhone(
                ProvisionedPhoneEvent {
                    phone_number: endpoint.endpoint.clone(),
                },
            )),
        };

        match self.threading.onboarding_thread_event(req).await {
            Ok(_) => {
                tracing::info!(entity_id = %endpoint.for_entity_id, "advanced setup thread");
                Ok(Outcome::Done)
            }
            Err(status) if status.code() == Code::NotFound => {
                tracing::debug!(entity_id = %endpoint.for_entity_id, "no setup thread");
                Ok(Outcome::Done)
            }
            Err(status)
                if matches!(
                    status.code(),
                    Code::FailedPrecondition | Code::InvalidArgument
                ) =>
            {
                tracing::warn!(
                    entity_id = %endpoint.for_entity_id,
                    error = %status,
                    "setup thread rejected provisioned phone"
                );
                Ok(Outcome::Done)
            }
            Err(status) => Err(WorkerError::rpc("onboarding thread event")(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeThreading;
    use courier_proto::excomms::ProvisionedEndpoint;

    fn provisioned(endpoint_type: EndpointType, endpoint: &str) -> Envelope {
        let event = excomms::Event {
            r#type: EventType::ProvisionedEndpoint as i32,
            details: Some(Details::ProvisionedEndpoint(ProvisionedEndpoint {
                for_entity_id: "org_1".into(),
                endpoint_type: endpoint_type as i32,
                endpoint: endpoint.into(),
            })),
        };
        Envelope {
            service: Service::Excomms as i32,
            event: event.encode_to_vec(),
        }
    }

    #[tokio::test]
    async fn provisioned_phone_advances_setup_thread() {
        let threading = Arc::new(FakeThreading::default());
        let driver = OnboardingDriver::new(threading.clone());

        let outcome = driver
            .process(provisioned(EndpointType::Phone, "+17348465522"))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Done);
        let events = threading.onboarding_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].lookup_by(), OnboardingLookupBy::EntityId);
        assert_eq!(events[0].entity_id, "org_1");
        assert_eq!(events[0].event_type(), OnboardingEventType::ProvisionedPhone);
        match events[0].event.as_ref().unwrap() {
            onboarding_thread_event_request::Event::ProvisionedPhone(phone) => {
                assert_eq!(phone.phone_number, "+17348465522")
            }
        }
    }

    #[tokio::test]
    async fn other_events_are_ignored() {
        let threading = Arc::new(FakeThreading::default());
        let driver = OnboardingDriver::new(threading.clone());

        let email = provisioned(EndpointType::Email, "front@practice.example");
        let mut other_service = provisioned(EndpointType::Phone, "+17348465522");
        other_service.service = Service::Directory as i32;
        let unknown = Envelope {
            service: Service::Excomms as i32,
            event: excomms::Event {
                r#type: EventType::Unknown as i32,
                details: None,
            }
            .encode_to_vec(),
        };

        for envelope in [email, other_service, unknown] {
            assert_eq!(driver.process(envelope).await.unwrap(), Outcome::Done);
        }
        assert!(threading.onboarding_events().is_empty());
    }

    #[tokio::test]
    async fn threading_failures() {
        for (code, retried) in [
            (Code::NotFound, false),
            (Code::FailedPrecondition, false),
            (Code::InvalidArgument, false),
            (Code::Unavailable, true),
        ] {
            let threading = Arc::new(FakeThreading::default());
            threading.fail_onboarding_with(code);
            let driver = OnboardingDriver::new(threading);

            let result = driver
                .process(provisioned(EndpointType::Phone, "+17348465522"))
                .await;
            match result {
                Ok(outcome) => {
                    assert!(!retried, "{code:?} should be retried");
                    assert_eq!(outcome, Outcome::Done);
                }
                Err(e) => {
                    assert!(retried, "{code:?} should not be retried");
                    assert!(!e.is_permanent());
                }
            }
        }
    }

    #[tokio::test]
    async fn undecodable_inner_event_is_permanent() {
        let driver = OnboardingDriver::new(Arc::new(FakeThreading::default()));
        let envelope = Envelope {
            service: Service::Excomms as i32,
            event: vec![0x0a, 0xff],
        };

        let err = driver.process(envelope).await.unwrap_err();
        assert!(err.is_permanent());
    }

    #[tokio::test]
    async fn undefined_endpoint_type_is_permanent() {
        let threading = Arc::new(FakeThreading::default());
        let driver = OnboardingDriver::new(threading.clone());
        let event = excomms::Event {
            r#type: EventType::ProvisionedEndpoint as i32,
            details: Some(Details::ProvisionedEndpoint(ProvisionedEndpoint {
                for_entity_id: "org_1".into(),
                endpoint_type: 9,
                endpoint: "+17348465522".into(),
            })),
        };
        let envelope = Envelope {
            service: Service::Excomms as i32,
            event: event.encode_to_vec(),
        };

        let err = driver.process(envelope).await.unwrap_err();
        assert!(matches!(err, WorkerError::Malformed(_)));
        assert!(threading.onboarding_events().is_empty());
    }
}

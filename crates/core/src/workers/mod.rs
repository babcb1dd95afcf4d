//! Event handlers run by the queue harness, one per subscription.

mod app_message;
mod block_account;
mod external_message;
mod onboarding;
pub mod support;

pub use app_message::AppMessageRouter;
pub use block_account::BlockAccountWorker;
pub use external_message::ExternalMessageRouter;
pub use onboarding::OnboardingDriver;
pub use support::SupportWorker;

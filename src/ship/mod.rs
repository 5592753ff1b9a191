pub mod batch;
pub mod identity;
pub mod marker;
pub mod orchestrator;
pub mod provisioner;
pub mod retry;
pub mod submitter;

pub use batch::{plan_batches, BatchLimits};
pub use identity::StreamIdentity;
pub use orchestrator::{RunError, RunPhase, RunSummary, ShipOptions, ShippingOrchestrator};
pub use provisioner::{ProvisionError, StreamProvisioner};
pub use retry::{ExponentialBackoff, NoRetry, RetryPolicy};
pub use submitter::{BatchSubmitter, SubmitError};

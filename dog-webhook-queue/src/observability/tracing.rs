//! Subscriber setup for binaries embedding the adapter.
//!
//! The library only emits `tracing` events. Applications that do not bring
//! their own subscriber can call [`init_tracing`] once at startup.

use tracing_subscriber::{fmt, EnvFilter};

use crate::{QueueError, QueueResult};

/// Install a global fmt subscriber.
///
/// `filter` uses `EnvFilter` directives (e.g. `"dog_webhook_queue=debug"`);
/// `RUST_LOG` wins when set.
pub fn init_tracing(filter: &str) -> QueueResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter))
        .map_err(|e| QueueError::Configuration(format!("invalid tracing filter: {e}")))?;

    fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|e| QueueError::Internal(format!("tracing already initialised: {e}")))
}

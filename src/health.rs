//! The health module provides the probes that observe the textures pipeline through
//! [emitter](crate::emitter) events. Probes only record state inside the event
//! handler; the actual verdict is computed when a health report is requested.

use crate::emitter::{Emitter, Event};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A named health probe consumed by the `/healthcheck` endpoint.
pub trait HealthChecker: Send + Sync {
    fn name(&self) -> &'static str;

    /// `Err` carries a human-readable reason for the failing state.
    fn check(&self) -> Result<(), String>;
}

/// Reports unhealthy while the last upstream uuids call error is younger than the
/// cool-down window. Errors within the window keep re-arming it; a succeeding call
/// does not heal the probe early, only the window elapsing does.
pub struct ResponseProbe {
    cool_down: Duration,
    last_error: Mutex<Option<(Instant, String)>>,
}

impl ResponseProbe {
    /// Creates the probe and subscribes it to the emitter.
    pub fn register(emitter: &Emitter, cool_down: Duration) -> Arc<Self> {
        let probe = Arc::new(Self {
            cool_down,
            last_error: Mutex::new(None),
        });
        let handle = Arc::clone(&probe);
        emitter.subscribe(move |event| {
            if let Event::UsernamesAfterCall {
                error: Some(error), ..
            } = event
            {
                *handle
                    .last_error
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner) =
                    Some((Instant::now(), error.to_string()));
            }
        });
        probe
    }
}

impl HealthChecker for ResponseProbe {
    fn name(&self) -> &'static str {
        "mojang-batch-uuids-provider-response"
    }

    fn check(&self) -> Result<(), String> {
        let last_error = self
            .last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match &*last_error {
            Some((at, message)) if at.elapsed() < self.cool_down => Err(format!(
                "mojang uuids api errored {}s ago: {}",
                at.elapsed().as_secs(),
                message
            )),
            _ => Ok(()),
        }
    }
}

/// Reports unhealthy while the last observed batch queue length exceeds the limit.
pub struct QueueLengthProbe {
    limit: usize,
    last_size: AtomicUsize,
}

impl QueueLengthProbe {
    /// Creates the probe and subscribes it to the emitter.
    pub fn register(emitter: &Emitter, limit: usize) -> Arc<Self> {
        let probe = Arc::new(Self {
            limit,
            last_size: AtomicUsize::new(0),
        });
        let handle = Arc::clone(&probe);
        emitter.subscribe(move |event| {
            if let Event::QueueSize { size } = event {
                handle.last_size.store(*size, Ordering::Relaxed);
            }
        });
        probe
    }
}

impl HealthChecker for QueueLengthProbe {
    fn name(&self) -> &'static str {
        "mojang-batch-uuids-provider-queue-length"
    }

    fn check(&self) -> Result<(), String> {
        let size = self.last_size.load(Ordering::Relaxed);
        if size > self.limit {
            return Err(format!(
                "batch uuids queue has {} usernames, limit is {}",
                size, self.limit
            ));
        }
        Ok(())
    }
}

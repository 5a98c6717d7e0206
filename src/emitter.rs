//! The emitter module provides the event bus that connects the textures pipeline to
//! its observers (health probes, metrics, logging).
//!
//! Components receive an explicit [Emitter] handle at composition instead of a
//! process-global bus. Delivery is synchronous within the emitting task and ordered
//! per subscriber, so handlers must not block; observers that need to do real work
//! should only record state and defer the work to their own task.

use crate::error::DermaError;
use crate::mojang::{Profile, UsernameResolved};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{PoisonError, RwLock};
use tracing::error;
use uuid::Uuid;

/// A lifecycle event of the textures pipeline.
///
/// Variants correspond one-to-one to the dotted event names exposed for logging via
/// [Event::name]. Resolution results are carried as `Option<UsernameResolved>`,
/// where `None` is a confirmed upstream negative.
#[derive(Debug, Clone)]
pub enum Event {
    /// A textures lookup entered the pipeline.
    Call { username: String },

    /// The uuids cache was consulted for a username.
    UsernamesAfterCache {
        username: String,
        resolved: Option<UsernameResolved>,
        hit: bool,
    },

    /// The textures cache was consulted for a profile id.
    TexturesAfterCache {
        id: Uuid,
        textures: Option<Profile>,
        hit: bool,
    },

    /// A uuids provider is about to call upstream.
    UsernamesBeforeCall { usernames: Vec<String> },

    /// A uuids provider finished an upstream call.
    UsernamesAfterCall {
        usernames: Vec<String>,
        resolved: Vec<UsernameResolved>,
        error: Option<DermaError>,
    },

    /// The textures provider is about to call upstream.
    TexturesBeforeCall { id: Uuid },

    /// The textures provider finished an upstream call.
    TexturesAfterCall {
        id: Uuid,
        textures: Option<Profile>,
        error: Option<DermaError>,
    },

    /// The pending map size of the batch provider, observed at the start of a round.
    QueueSize { size: usize },

    /// A dispatch round started with the selected usernames.
    Round { usernames: Vec<String>, iteration: u64 },

    /// One username of a dispatch round was resolved.
    RoundResult {
        username: String,
        resolved: Option<UsernameResolved>,
        error: Option<DermaError>,
    },
}

impl Event {
    /// The canonical dotted name of the event, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Event::Call { .. } => "mojang_textures:call",
            Event::UsernamesAfterCache { .. } => "mojang_textures:usernames:after_cache",
            Event::TexturesAfterCache { .. } => "mojang_textures:textures:after_cache",
            Event::UsernamesBeforeCall { .. } => "mojang_textures:usernames:before_call",
            Event::UsernamesAfterCall { .. } => "mojang_textures:usernames:after_call",
            Event::TexturesBeforeCall { .. } => "mojang_textures:textures:before_call",
            Event::TexturesAfterCall { .. } => "mojang_textures:textures:after_call",
            Event::QueueSize { .. } => "mojang_textures:batch_uuids_provider:queue_size",
            Event::Round { .. } => "mojang_textures:batch_uuids_provider:round",
            Event::RoundResult { .. } => "mojang_textures:batch_uuids_provider:result",
        }
    }
}

type Handler = Box<dyn Fn(&Event) + Send + Sync>;

/// A synchronous publish/subscribe bus for [pipeline events](Event).
///
/// Subscribers registered first are invoked first, for every event. A panicking
/// subscriber is isolated and logged; the remaining subscribers still run.
#[derive(Default)]
pub struct Emitter {
    subscribers: RwLock<Vec<Handler>>,
}

impl Emitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler that is invoked for every emitted [Event].
    pub fn subscribe<H>(&self, handler: H)
    where
        H: Fn(&Event) + Send + Sync + 'static,
    {
        self.subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(handler));
    }

    /// Delivers the event to all subscribers, in subscription order.
    pub fn emit(&self, event: Event) {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        for handler in subscribers.iter() {
            if let Err(panic) = catch_unwind(AssertUnwindSafe(|| handler(&event))) {
                let message = panic
                    .downcast_ref::<&str>()
                    .copied()
                    .map(str::to_string)
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "non-string panic payload".to_string());
                error!(event = event.name(), %message, "event subscriber panicked");
            }
        }
    }
}

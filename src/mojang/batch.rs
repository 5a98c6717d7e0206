//! The batch uuids provider coalesces concurrent username lookups and groups them into
//! batched upstream calls.
//!
//! Callers for the same lowercased username share one in-flight resolution; distinct
//! usernames are collected in FIFO order and dispatched in rounds of at most
//! `queue.batch_size` names, with round starts at least `queue.loop_delay` apart. The
//! dispatch loop only lives while requests are pending; the first caller to find no
//! loop running starts one.

use crate::emitter::{Emitter, Event};
use crate::error::DermaError;
use crate::mojang::{Mojang, UsernameResolved, UuidsProvider};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep_until};
use tracing::debug;

type Waiter = oneshot::Sender<Result<Option<UsernameResolved>, DermaError>>;

/// One in-flight resolution, shared by every caller of the same username. Each waiter
/// receives the result exactly once; a caller that stopped listening is skipped.
struct PendingRequest {
    waiters: Vec<Waiter>,
}

struct State {
    /// All usernames currently awaiting resolution, including those taken by a round
    /// that has not completed yet. Invariant: at most one entry per lowercased username.
    pending: HashMap<String, PendingRequest>,
    /// Usernames not yet taken by a round, in insertion order.
    queue: VecDeque<String>,
    /// Whether a dispatch loop is currently alive.
    dispatcher_running: bool,
    /// Counts dispatch rounds for observability.
    iteration: u64,
}

/// The coalescing, batching [UuidsProvider] (driver `batch`).
pub struct BatchUuidsProvider {
    api: Arc<dyn Mojang>,
    emitter: Arc<Emitter>,
    iteration_delay: Duration,
    iteration_size: usize,
    state: Arc<Mutex<State>>,
}

impl BatchUuidsProvider {
    pub fn new(
        api: Arc<dyn Mojang>,
        emitter: Arc<Emitter>,
        iteration_delay: Duration,
        iteration_size: usize,
    ) -> Self {
        Self {
            api,
            emitter,
            iteration_delay,
            iteration_size: iteration_size.max(1),
            state: Arc::new(Mutex::new(State {
                pending: HashMap::new(),
                queue: VecDeque::new(),
                dispatcher_running: false,
                iteration: 0,
            })),
        }
    }

    /// The current pending map size, i.e. usernames awaiting resolution.
    pub async fn queue_size(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    fn spawn_dispatcher(&self) {
        let api = Arc::clone(&self.api);
        let emitter = Arc::clone(&self.emitter);
        let state = Arc::clone(&self.state);
        tokio::spawn(run_dispatcher(
            api,
            emitter,
            state,
            self.iteration_delay,
            self.iteration_size,
        ));
    }
}

#[async_trait]
impl UuidsProvider for BatchUuidsProvider {
    #[tracing::instrument(skip(self))]
    async fn get_uuid(&self, username: &str) -> Result<Option<UsernameResolved>, DermaError> {
        let username = username.to_lowercase();
        let (tx, rx) = oneshot::channel();

        let start_dispatcher = {
            let mut state = self.state.lock().await;
            match state.pending.get_mut(&username) {
                // join the in-flight resolution for this username
                Some(request) => {
                    request.waiters.push(tx);
                    false
                }
                None => {
                    state
                        .pending
                        .insert(username.clone(), PendingRequest { waiters: vec![tx] });
                    state.queue.push_back(username);
                    !std::mem::replace(&mut state.dispatcher_running, true)
                }
            }
        };
        if start_dispatcher {
            self.spawn_dispatcher();
        }

        match rx.await {
            Ok(result) => result,
            // the dispatcher was dropped, e.g. on runtime shutdown
            Err(_) => Err(DermaError::Shutdown),
        }
    }
}

/// The dispatch loop. Exactly one instance runs per provider while requests are
/// pending; it exits once a round finds the queue empty. The state lock is only held
/// to snapshot and remove entries, never across the upstream call.
async fn run_dispatcher(
    api: Arc<dyn Mojang>,
    emitter: Arc<Emitter>,
    state: Arc<Mutex<State>>,
    delay: Duration,
    size: usize,
) {
    let mut round_start = Instant::now() + delay;
    loop {
        sleep_until(round_start).await;
        round_start = Instant::now() + delay;

        // snapshot the round: take up to `size` usernames in FIFO order, leave the
        // rest for the next round
        let (selected, pending_len, iteration) = {
            let mut state = state.lock().await;
            let pending_len = state.pending.len();
            let count = state.queue.len().min(size);
            let selected: Vec<String> = state.queue.drain(..count).collect();
            if selected.is_empty() {
                state.dispatcher_running = false;
            } else {
                state.iteration += 1;
            }
            (selected, pending_len, state.iteration)
        };
        emitter.emit(Event::QueueSize { size: pending_len });
        if selected.is_empty() {
            return;
        }

        debug!(round = iteration, usernames = ?selected, "dispatching uuids round");
        emitter.emit(Event::Round {
            usernames: selected.clone(),
            iteration,
        });
        emitter.emit(Event::UsernamesBeforeCall {
            usernames: selected.clone(),
        });
        let result = api.fetch_uuids(&selected).await;
        emitter.emit(Event::UsernamesAfterCall {
            usernames: selected.clone(),
            resolved: result.as_deref().unwrap_or_default().to_vec(),
            error: result.as_ref().err().cloned(),
        });

        // completed entries leave the pending map; callers that attached while the
        // call was in flight are resolved along with the round
        let requests: Vec<(String, PendingRequest)> = {
            let mut state = state.lock().await;
            selected
                .iter()
                .filter_map(|username| {
                    state
                        .pending
                        .remove(username)
                        .map(|request| (username.clone(), request))
                })
                .collect()
        };

        match result {
            Ok(resolved) => {
                // correlate case-insensitively; canonical casing from upstream wins
                let by_username: HashMap<String, UsernameResolved> = resolved
                    .into_iter()
                    .map(|resolved| (resolved.name.to_lowercase(), resolved))
                    .collect();
                for (username, request) in requests {
                    let found = by_username.get(&username).cloned();
                    emitter.emit(Event::RoundResult {
                        username,
                        resolved: found.clone(),
                        error: None,
                    });
                    for waiter in request.waiters {
                        let _ = waiter.send(Ok(found.clone()));
                    }
                }
            }
            Err(err) => {
                // the failure fails only this round's waiters; later rounds retry
                for (username, request) in requests {
                    emitter.emit(Event::RoundResult {
                        username,
                        resolved: None,
                        error: Some(err.clone()),
                    });
                    for waiter in request.waiters {
                        let _ = waiter.send(Err(err.clone()));
                    }
                }
            }
        }
    }
}

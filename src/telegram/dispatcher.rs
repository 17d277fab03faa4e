//! Update loop.
//!
//! One task long-polls the transport and hands every update to a lane chosen
//! by hashing its conversation id. Each lane handles its updates one at a
//! time, in delivery order, so a conversation never races with itself while
//! different conversations proceed in parallel.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::Instrument;

use super::engine::Engine;
use super::transport::{ConversationId, Outgoing, Transport, Update, UpdateKind};
use crate::core::config::DispatchConfig;

/// Updates buffered per lane before the poller waits.
const LANE_CAPACITY: usize = 64;

pub struct Dispatcher {
    transport: Arc<dyn Transport>,
    engine: Arc<Engine>,
    workers: usize,
    poll_timeout: Duration,
    retry_delay: Duration,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn Transport>, engine: Arc<Engine>, config: &DispatchConfig) -> Self {
        Self {
            transport,
            engine,
            workers: config.workers.max(1),
            poll_timeout: config.poll_timeout(),
            retry_delay: config.retry_delay(),
        }
    }

    /// Polls until `shutdown` is cancelled, then lets the lanes drain.
    pub async fn run(self, shutdown: CancellationToken) {
        let tracker = TaskTracker::new();
        let mut lanes = Vec::with_capacity(self.workers);
        for lane in 0..self.workers {
            let (tx, rx) = mpsc::channel(LANE_CAPACITY);
            tracker.spawn(run_lane(lane, rx, Arc::clone(&self.engine), Arc::clone(&self.transport)));
            lanes.push(tx);
        }
        tracker.close();
        log::info!("Dispatcher started with {} lane(s)", self.workers);

        let mut offset = 0;
        loop {
            let polled = tokio::select! {
                _ = shutdown.cancelled() => break,
                polled = self.transport.poll(offset, self.poll_timeout) => polled,
            };

            let updates = match polled {
                Ok(updates) => updates,
                Err(err) => {
                    log::warn!("Polling failed, retrying in {:?}: {}", self.retry_delay, err);
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.retry_delay) => continue,
                    }
                }
            };

            for update in updates {
                let next_offset = update.id + 1;
                if update.kind != UpdateKind::Unsupported {
                    let lane = lane_for(update.conversation, self.workers);
                    if lanes[lane].send(update).await.is_err() {
                        log::error!("Lane {} is gone, update dropped", lane);
                    }
                }
                offset = offset.max(next_offset);
            }
        }

        log::info!("Shutting down, draining lanes...");
        drop(lanes);
        tracker.wait().await;
        log::info!(
            "Dispatcher stopped, {} conversation(s) left in a flow",
            self.engine.sessions().active_count()
        );
    }
}

/// Lane index of a conversation.
pub fn lane_for(conversation: ConversationId, lanes: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    conversation.hash(&mut hasher);
    (hasher.finish() % lanes.max(1) as u64) as usize
}

async fn run_lane(lane: usize, mut rx: mpsc::Receiver<Update>, engine: Arc<Engine>, transport: Arc<dyn Transport>) {
    while let Some(update) = rx.recv().await {
        let span = tracing::info_span!("update", id = update.id, conversation = %update.conversation, lane);
        process(&engine, transport.as_ref(), &update).instrument(span).await;
    }
    log::debug!("Lane {} closed", lane);
}

/// Handles one update and delivers the replies.
///
/// A button press is always answered exactly once, with the first notice
/// the engine produced or an empty acknowledgement.
pub async fn process(engine: &Engine, transport: &dyn Transport, update: &Update) {
    let replies = engine.handle(update).await;
    let conversation = update.conversation;

    let (query_id, pressed) = match &update.kind {
        UpdateKind::Callback {
            query_id, message_id, ..
        } => (Some(query_id.as_str()), *message_id),
        _ => (None, None),
    };

    let mut notice = None;
    let mut messages = Vec::new();
    for reply in replies {
        match reply {
            Outgoing::Notice { text, alert } if query_id.is_some() => {
                notice.get_or_insert((text, alert));
            }
            // Notices outside of a button press have nowhere to go but the chat
            Outgoing::Notice { text, .. } => messages.push(Outgoing::send(text, None)),
            other => messages.push(other),
        }
    }

    if let Some(query_id) = query_id {
        let (text, alert) = notice.map_or((None, false), |(text, alert)| (Some(text), alert));
        if let Err(err) = transport.answer_callback(query_id, text.as_deref(), alert).await {
            log::warn!("Failed to answer callback in {}: {}", conversation, err);
        }
    }

    for reply in &messages {
        let result = match reply {
            Outgoing::Edit { text, keyboard } => match pressed {
                Some(message_id) => {
                    match transport.edit_message(conversation, message_id, text, keyboard.as_ref()).await {
                        Ok(()) => Ok(()),
                        Err(err) => {
                            log::warn!("Edit failed in {}, sending instead: {}", conversation, err);
                            transport.send(conversation, text, keyboard.as_ref()).await.map(|_| ())
                        }
                    }
                }
                None => transport.send(conversation, text, keyboard.as_ref()).await.map(|_| ()),
            },
            Outgoing::Send { text, keyboard } => transport.send(conversation, text, keyboard.as_ref()).await.map(|_| ()),
            Outgoing::Notice { .. } => Ok(()),
        };
        if let Err(err) = result {
            log::error!("Failed to deliver a reply to {}: {}", conversation, err);
        }
    }
}

// libs/queue-cell/src/services/notifier.rs
// Fans queue changes out to per-appointment position channels so waiting
// patients see their place move in real time.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, RwLock};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::error::QueueError;
use crate::models::QueuePosition;
use crate::services::queue::QueueService;

pub type PositionSender = broadcast::Sender<QueuePosition>;
pub type PositionReceiver = broadcast::Receiver<QueuePosition>;

struct PositionChannel {
    clinic_id: Uuid,
    sender: PositionSender,
}

/// Per-appointment position feeds. Each channel remembers which clinic its
/// appointment belongs to, so a queue change only recomputes positions for
/// subscribers of that clinic. Clones share the channel map.
pub struct QueuePositionNotifier {
    channels: Arc<RwLock<HashMap<Uuid, PositionChannel>>>,
    queue: QueueService,
}

impl QueuePositionNotifier {
    pub fn new(queue: QueueService) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            queue,
        }
    }

    /// Opens a position feed for one appointment. Returns the current
    /// position snapshot together with the live receiver, so the caller
    /// has a first value before any queue change happens.
    pub async fn subscribe(
        &self,
        appointment_id: Uuid,
    ) -> Result<(QueuePosition, PositionReceiver), QueueError> {
        let clinic_id = self
            .queue
            .appointment_clinic(appointment_id)
            .await
            .ok_or(QueueError::AppointmentNotFound(appointment_id))?;

        let snapshot = self.queue.position(appointment_id).await;

        let mut channels = self.channels.write().await;
        let channel = channels
            .entry(appointment_id)
            .or_insert_with(|| PositionChannel {
                clinic_id,
                sender: broadcast::channel(100).0,
            });
        let receiver = channel.sender.subscribe();
        drop(channels);

        debug!(
            "Opened position feed for appointment {} (clinic {})",
            appointment_id, clinic_id
        );

        Ok((snapshot, receiver))
    }

    /// Consumes the queue change feed and pushes recomputed positions to
    /// subscribers. Runs until the process shuts down; if the change feed
    /// ever closes, resubscribes with a capped backoff.
    #[instrument(skip(self))]
    pub async fn run(self) {
        let mut backoff_secs = 1u64;

        loop {
            let mut changes = self.queue.subscribe_changes();
            info!("Queue position notifier listening for queue changes");

            loop {
                match changes.recv().await {
                    Ok(event) => {
                        backoff_secs = 1;
                        self.publish_clinic(event.clinic_id).await;
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(
                            "Position notifier lagged behind queue changes, {} events skipped",
                            skipped
                        );
                        self.publish_all().await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }

            error!(
                "Queue change feed closed, resubscribing in {}s",
                backoff_secs
            );
            tokio::time::sleep(Duration::from_secs(backoff_secs)).await;
            backoff_secs = (backoff_secs * 2).min(30);
        }
    }

    /// Recomputes and pushes positions for every subscriber of one clinic.
    /// Channels nobody is listening to anymore are pruned on the way.
    async fn publish_clinic(&self, clinic_id: Uuid) {
        let channels = self.channels.read().await;
        let targets: Vec<Uuid> = channels
            .iter()
            .filter(|(_, channel)| channel.clinic_id == clinic_id)
            .map(|(appointment_id, _)| *appointment_id)
            .collect();
        drop(channels);

        self.publish_targets(targets).await;
    }

    /// Pushes fresh positions to every subscriber across all clinics. Used
    /// after the notifier lost events, since a recompute from live state
    /// makes the missed deltas irrelevant.
    async fn publish_all(&self) {
        let channels = self.channels.read().await;
        let targets: Vec<Uuid> = channels.keys().copied().collect();
        drop(channels);

        self.publish_targets(targets).await;
    }

    async fn publish_targets(&self, targets: Vec<Uuid>) {
        let mut dead: Vec<Uuid> = Vec::new();

        for appointment_id in targets {
            let position = self.queue.position(appointment_id).await;

            let channels = self.channels.read().await;
            let Some(channel) = channels.get(&appointment_id) else {
                continue;
            };
            if channel.sender.receiver_count() == 0 {
                dead.push(appointment_id);
                continue;
            }
            if channel.sender.send(position).is_err() {
                warn!(
                    "Dropped position update for appointment {}: no receivers",
                    appointment_id
                );
                dead.push(appointment_id);
            }
        }

        if !dead.is_empty() {
            let mut channels = self.channels.write().await;
            for appointment_id in dead {
                let still_dead = channels
                    .get(&appointment_id)
                    .map(|channel| channel.sender.receiver_count() == 0)
                    .unwrap_or(false);
                if still_dead {
                    channels.remove(&appointment_id);
                    debug!(
                        "Pruned position channel for appointment {}",
                        appointment_id
                    );
                }
            }
        }
    }

    /// Number of live position channels.
    pub async fn channel_count(&self) -> usize {
        let channels = self.channels.read().await;
        channels.len()
    }
}

impl Clone for QueuePositionNotifier {
    fn clone(&self) -> Self {
        Self {
            channels: Arc::clone(&self.channels),
            queue: self.queue.clone(),
        }
    }
}

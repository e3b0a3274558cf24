use std::sync::Arc;

use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::sound::{LogOutput, SoundBank, SoundOutput};
use crate::store::LocalStore;

use super::{ElmMessage, InitData, InteropError, ShellEvent};

/// Everything the interop layer needs for one session.
///
/// Owns the open store and the sound cache; `shutdown` releases both.
pub struct Interop<O = LogOutput> {
    store: LocalStore,
    sounds: SoundBank<O>,
    version: String,
}

impl<O: SoundOutput + 'static> Interop<O> {
    pub fn new(store: LocalStore, sounds: SoundBank<O>, version: &str) -> Self {
        Self {
            store,
            sounds,
            version: version.to_string(),
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Build the startup message. Workouts and the preference are read
    /// concurrently and independently; if either read fails the failure is
    /// logged and no message is produced.
    pub async fn start(&self) -> Option<ElmMessage> {
        let (workouts, variant) =
            tokio::join!(self.store.list_workouts(), self.store.variant_preference());

        match (workouts, variant) {
            (Ok(workout_history), Ok(current_burpee_variant)) => {
                info!(
                    workouts = workout_history.len(),
                    has_variant = current_burpee_variant.is_some(),
                    version = %self.version,
                    "Loaded initial data"
                );
                Some(ElmMessage::InitData(InitData {
                    workout_history,
                    current_burpee_variant,
                    version: self.version.clone(),
                }))
            }
            (Err(e), _) | (_, Err(e)) => {
                error!(error = %e, "Error loading initial data");
                None
            }
        }
    }

    /// Execute one event from the application.
    pub async fn dispatch(&self, event: ShellEvent) -> Result<(), InteropError> {
        match event {
            ShellEvent::StoreBurpeeVariant(variant) => {
                self.store.put_variant_preference(&variant).await?;
            }
            ShellEvent::StoreWorkout(workout) => {
                self.store.put_workout(&workout).await?;
            }
            ShellEvent::LogError(message) => {
                error!(message = %message, "BurpeeBootcamp error");
            }
            ShellEvent::PlaySound(name) => {
                self.sounds.play(&name).await?;
            }
            ShellEvent::Unhandled { tag, data } => {
                info!(tag = %tag, data = %data, "Event tag not handled");
            }
        }
        Ok(())
    }

    /// Parse and execute one raw event. Nothing here is fatal: every failure
    /// ends up in the log and the event is dropped.
    pub async fn receive(&self, raw: Value) {
        debug!(event = %raw, "Received event from application");

        let event = match ShellEvent::try_from(raw) {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "Dropping malformed event");
                return;
            }
        };

        let tag = event.tag().to_string();
        if let Err(e) = self.dispatch(event).await {
            error!(tag = %tag, error = %e, "Failed to handle event");
        }
    }

    /// Session loop: send the startup message once, then execute inbound
    /// events as they arrive, each on its own task and without
    /// acknowledgement. Returns when `inbound` closes and all work is done.
    pub async fn run(self: Arc<Self>, mut inbound: mpsc::Receiver<Value>, outbound: mpsc::Sender<String>) {
        if let Some(message) = self.start().await {
            match message.to_port_string() {
                Ok(encoded) => {
                    if outbound.send(encoded).await.is_err() {
                        warn!("Application stopped listening before startup message");
                    }
                }
                Err(e) => error!(error = %e, "Failed to encode startup message"),
            }
        }

        let mut tasks = JoinSet::new();
        while let Some(raw) = inbound.recv().await {
            let interop = Arc::clone(&self);
            tasks.spawn(async move { interop.receive(raw).await });
        }

        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Event task panicked");
            }
        }
        debug!("Inbound channel closed");
    }

    /// Release the store handle and cached sound buffers.
    pub async fn shutdown(&self) {
        self.store.close().await;
        self.sounds.clear().await;
        info!("Interop session ended");
    }
}

// ============================================================================
// Tests
// ============================================================================

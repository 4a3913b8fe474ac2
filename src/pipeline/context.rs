//! Engine-wide context handed to every pipeline.
//!
//! `EngineContext` carries the execution settings and this process's rank,
//! plus the sending half of a message channel. User-visible warnings and
//! progress go through it instead of process-wide callbacks; the receiving
//! `EngineBridge` is drained by whoever owns the engine.

use crate::config::ExecutionSettings;
use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

/// Default capacity of the engine message channel.
pub const MESSAGE_CHANNEL_CAPACITY: usize = 256;

/// Messages emitted while pipelines execute.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineMessage {
    /// Something the user should see, e.g. a skipped timestep.
    Warning(String),

    /// Streaming progress of one filter.
    Progress {
        filter: String,
        current: usize,
        total: usize,
    },

    /// A time loop finished.
    TimeLoopFinished { valid: usize, skipped: usize },

    /// The engine is shutting down.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct EngineContext {
    tx: Option<Sender<EngineMessage>>,
    rank: usize,
    size: usize,
    settings: ExecutionSettings,
}

impl EngineContext {
    /// A context plus the bridge that receives its messages.
    pub fn new(settings: ExecutionSettings) -> (Self, EngineBridge) {
        let (tx, rx) = bounded(MESSAGE_CHANNEL_CAPACITY);
        let ctx = Self {
            tx: Some(tx),
            rank: 0,
            size: 1,
            settings,
        };
        (ctx, EngineBridge { rx })
    }

    /// A context whose messages go nowhere but the log.
    pub fn detached(settings: ExecutionSettings) -> Self {
        Self {
            tx: None,
            rank: 0,
            size: 1,
            settings,
        }
    }

    /// Same context, seen from `rank` of `size`.
    pub fn for_rank(&self, rank: usize, size: usize) -> Self {
        Self {
            rank,
            size: size.max(1),
            ..self.clone()
        }
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn settings(&self) -> &ExecutionSettings {
        &self.settings
    }

    fn send(&self, msg: EngineMessage) {
        if let Some(tx) = &self.tx {
            match tx.try_send(msg) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    tracing::trace!("Engine message channel full, dropping message");
                }
                Err(TrySendError::Disconnected(_)) => {}
            }
        }
    }

    pub fn warn(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.send(EngineMessage::Warning(message));
    }

    pub fn progress(&self, filter: &str, current: usize, total: usize) {
        if self.settings.report_progress {
            self.send(EngineMessage::Progress {
                filter: filter.to_string(),
                current,
                total,
            });
        }
    }

    pub fn time_loop_finished(&self, valid: usize, skipped: usize) {
        self.send(EngineMessage::TimeLoopFinished { valid, skipped });
    }

    pub fn shutdown(&self) {
        tracing::info!("Engine shutting down");
        self.send(EngineMessage::Shutdown);
    }
}

impl Default for EngineContext {
    fn default() -> Self {
        Self::detached(ExecutionSettings::default())
    }
}

/// Receiving side of the engine message channel.
pub struct EngineBridge {
    rx: Receiver<EngineMessage>,
}

impl EngineBridge {
    /// Receive without blocking.
    pub fn try_recv(&self) -> Option<EngineMessage> {
        self.rx.try_recv().ok()
    }

    /// Everything queued so far.
    pub fn drain(&self) -> Vec<EngineMessage> {
        self.rx.try_iter().collect()
    }

    /// Only the warnings among queued messages.
    pub fn drain_warnings(&self) -> Vec<String> {
        self.drain()
            .into_iter()
            .filter_map(|m| match m {
                EngineMessage::Warning(w) => Some(w),
                _ => None,
            })
            .collect()
    }
}

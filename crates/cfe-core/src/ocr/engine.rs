//! Lifecycle-aware, serialized access to an OCR backend.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::{OcrBackend, Recognition};
use crate::error::{CfeError, OcrError};

/// Observable lifecycle state of an [`OcrEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EngineStatus {
    Uninitialized,
    Ready,
    /// Initialization failed; a fresh `initialize` may recover.
    Degraded,
    /// Shut down; terminal.
    Terminated,
}

enum EngineSlot<B> {
    Uninitialized(B),
    Ready(B),
    Degraded { backend: B, reason: String },
    Terminated,
}

impl<B> EngineSlot<B> {
    fn status(&self) -> EngineStatus {
        match self {
            EngineSlot::Uninitialized(_) => EngineStatus::Uninitialized,
            EngineSlot::Ready(_) => EngineStatus::Ready,
            EngineSlot::Degraded { .. } => EngineStatus::Degraded,
            EngineSlot::Terminated => EngineStatus::Terminated,
        }
    }

    fn describe(&self) -> String {
        match self {
            EngineSlot::Uninitialized(_) => "engine not initialized".to_string(),
            EngineSlot::Ready(_) => "engine ready".to_string(),
            EngineSlot::Degraded { reason, .. } => format!("engine degraded: {}", reason),
            EngineSlot::Terminated => "engine terminated".to_string(),
        }
    }
}

/// Shared handle to an OCR backend.
///
/// Clones share the same backend. Recognition calls are serialized through a lock,
/// and each call is bounded by a deadline that covers both waiting for the lock and
/// the recognition itself. The lifecycle status is published outside the lock, so
/// reading it never waits on a recognition in flight.
pub struct OcrEngine<B> {
    slot: Arc<Mutex<EngineSlot<B>>>,
    state: Arc<watch::Sender<EngineStatus>>,
    timeout: Duration,
}

impl<B> Clone for OcrEngine<B> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
            state: Arc::clone(&self.state),
            timeout: self.timeout,
        }
    }
}

impl<B: OcrBackend> OcrEngine<B> {
    /// Wrap an uninitialized backend.
    pub fn new(backend: B, timeout: Duration) -> Self {
        Self {
            slot: Arc::new(Mutex::new(EngineSlot::Uninitialized(backend))),
            state: Arc::new(watch::channel(EngineStatus::Uninitialized).0),
            timeout,
        }
    }

    /// Per-call recognition deadline.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Current lifecycle state. Does not wait for a recognition in flight.
    pub async fn status(&self) -> EngineStatus {
        *self.state.borrow()
    }

    pub async fn is_ready(&self) -> bool {
        self.status().await == EngineStatus::Ready
    }

    /// Load the language model.
    ///
    /// Failure never propagates: the engine enters `Degraded` and callers fall back
    /// to text-layer-only extraction. Calling this on a ready or terminated engine is
    /// a no-op.
    pub async fn initialize(&self, language: &str) -> EngineStatus {
        let mut guard = Arc::clone(&self.slot).lock_owned().await;
        let state = Arc::clone(&self.state);
        let language = language.to_string();

        let joined = tokio::task::spawn_blocking(move || {
            let slot = std::mem::replace(&mut *guard, EngineSlot::Terminated);
            *guard = match slot {
                EngineSlot::Uninitialized(mut backend)
                | EngineSlot::Degraded {
                    mut backend,
                    ..
                } => {
                    let loaded = catch_unwind(AssertUnwindSafe(|| backend.initialize(&language)));
                    match loaded {
                        Ok(Ok(())) => {
                            info!(language = %language, "OCR engine initialized");
                            EngineSlot::Ready(backend)
                        }
                        Ok(Err(e)) => {
                            warn!(
                                language = %language,
                                error = %e,
                                "OCR engine initialization failed, continuing with PDF text layer only"
                            );
                            EngineSlot::Degraded {
                                backend,
                                reason: e.to_string(),
                            }
                        }
                        Err(_) => {
                            warn!(
                                language = %language,
                                "OCR engine initialization panicked, continuing with PDF text layer only"
                            );
                            EngineSlot::Degraded {
                                backend,
                                reason: "initialization panicked".to_string(),
                            }
                        }
                    }
                }
                other => other,
            };
            let status = guard.status();
            state.send_replace(status);
            status
        })
        .await;

        match joined {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "OCR engine initialization task failed");
                self.status().await
            }
        }
    }

    /// Recognize text in an encoded image.
    ///
    /// Fails with `OcrNotReady` unless the engine is ready and with `OcrTimeout` when
    /// the deadline passes. A timed-out backend keeps the lock until it returns, so
    /// later calls queue behind it and time out in turn instead of overlapping it.
    pub async fn recognize(&self, image: Vec<u8>) -> Result<Recognition, CfeError> {
        let slot = Arc::clone(&self.slot);
        let work = async move {
            let mut guard = slot.lock_owned().await;
            if guard.status() != EngineStatus::Ready {
                return Err(CfeError::OcrNotReady(guard.describe()));
            }

            debug!(bytes = image.len(), "Dispatching OCR recognition");
            tokio::task::spawn_blocking(move || match &mut *guard {
                EngineSlot::Ready(backend) => backend.recognize(&image).map_err(CfeError::from),
                other => Err(CfeError::OcrNotReady(other.describe())),
            })
            .await
            .map_err(|e| {
                CfeError::Ocr(OcrError::Recognition(format!("recognition task failed: {}", e)))
            })?
        };

        match tokio::time::timeout(self.timeout, work).await {
            Ok(result) => result,
            Err(_) => {
                let timeout_ms = self.timeout.as_millis() as u64;
                warn!(timeout_ms, "OCR recognition timed out");
                Err(CfeError::OcrTimeout(timeout_ms))
            }
        }
    }

    /// Release the backend. The engine cannot be used afterwards.
    pub async fn terminate(&self) {
        let mut guard = self.slot.lock().await;
        self.state.send_replace(EngineStatus::Terminated);
        match std::mem::replace(&mut *guard, EngineSlot::Terminated) {
            EngineSlot::Ready(mut backend) | EngineSlot::Degraded { mut backend, .. } => {
                backend.terminate();
                info!("OCR engine terminated");
            }
            EngineSlot::Uninitialized(_) => debug!("Dropped uninitialized OCR engine"),
            EngineSlot::Terminated => {}
        }
    }
}

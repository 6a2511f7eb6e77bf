//! Scripted OCR backend for tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{OcrBackend, Recognition};
use crate::error::OcrError;

/// Scripted backend for driving the engine and analyzer in tests.
pub(crate) struct FakeBackend {
    pub fail_init: bool,
    pub panic_init: bool,
    pub text: String,
    pub confidence_percent: f64,
    pub delay: Duration,
    pub in_flight: Arc<AtomicUsize>,
    pub max_in_flight: Arc<AtomicUsize>,
    pub terminated: Arc<AtomicUsize>,
    /// Byte length of the last image handed to `recognize`.
    pub last_input_len: Arc<AtomicUsize>,
}

impl FakeBackend {
    pub(crate) fn new(text: &str, confidence_percent: f64) -> Self {
        Self {
            fail_init: false,
            panic_init: false,
            text: text.to_string(),
            confidence_percent,
            delay: Duration::ZERO,
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
            terminated: Arc::new(AtomicUsize::new(0)),
            last_input_len: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn failing() -> Self {
        Self {
            fail_init: true,
            ..Self::new("", 0.0)
        }
    }
}

impl OcrBackend for FakeBackend {
    fn initialize(&mut self, language: &str) -> Result<(), OcrError> {
        if self.panic_init {
            panic!("model file truncated");
        }
        if self.fail_init {
            Err(OcrError::ModelLoad(format!("no model for {}", language)))
        } else {
            Ok(())
        }
    }

    fn recognize(&mut self, image: &[u8]) -> Result<Recognition, OcrError> {
        self.last_input_len.store(image.len(), Ordering::SeqCst);
        if image.is_empty() {
            return Err(OcrError::InvalidImage("empty image".to_string()));
        }
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(Recognition {
            text: self.text.clone(),
            confidence_percent: self.confidence_percent,
        })
    }

    fn terminate(&mut self) {
        self.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

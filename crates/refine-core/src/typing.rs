//! Typing/render state machine for the overlay.
//!
//! ```text
//! idle -> loading -> typing -> ready
//!            |          |
//!            +-> error <+
//! ready | error -> loading   (regenerate)
//! ```
//!
//! The machine is synchronous; the overlay drives [`TypingMachine::tick`] from
//! a cancellable timer task.

use crate::error::{RefineError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strum::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum OverlayState {
    Idle,
    Loading,
    Typing,
    Ready,
    Error,
}

/// What the driver must do after a result arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPlan {
    /// The full result is visible; no ticks needed.
    Immediate,
    /// Call `tick` every `interval` until it reports completion.
    Tick { interval: Duration },
}

#[derive(Debug, Clone)]
pub struct TypingMachine {
    state: OverlayState,
    interval: Duration,
    original: Option<String>,
    result: Vec<char>,
    revealed: usize,
    error: Option<String>,
}

impl TypingMachine {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: OverlayState::Idle,
            interval,
            original: None,
            result: Vec::new(),
            revealed: 0,
            error: None,
        }
    }

    pub fn state(&self) -> OverlayState {
        self.state
    }

    pub fn set_interval(&mut self, interval: Duration) {
        self.interval = interval;
    }

    pub fn original(&self) -> Option<&str> {
        self.original.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Currently revealed part of the result.
    pub fn visible(&self) -> String {
        self.result[..self.revealed].iter().collect()
    }

    /// The complete result, once one has arrived.
    pub fn full_result(&self) -> Option<String> {
        match self.state {
            OverlayState::Typing | OverlayState::Ready => Some(self.result.iter().collect()),
            _ => None,
        }
    }

    /// Accepts the selection text and enters `loading`.
    pub fn start(&mut self, original: impl Into<String>) -> Result<()> {
        let original = original.into();
        if original.trim().is_empty() {
            return Err(RefineError::EmptySelection);
        }
        match self.state {
            OverlayState::Idle | OverlayState::Ready | OverlayState::Error => {
                self.original = Some(original);
                self.enter_loading();
                Ok(())
            }
            state => Err(RefineError::invalid_state(format!(
                "cannot start while {state}"
            ))),
        }
    }

    /// `ready | error -> loading` with the same original text.
    pub fn regenerate(&mut self) -> Result<()> {
        if !self.can_regenerate() {
            return Err(RefineError::invalid_state(format!(
                "cannot regenerate while {}",
                self.state
            )));
        }
        self.enter_loading();
        Ok(())
    }

    fn enter_loading(&mut self) {
        self.state = OverlayState::Loading;
        self.result.clear();
        self.revealed = 0;
        self.error = None;
    }

    /// A result arrived; begins typing or shows it at once.
    pub fn receive(&mut self, text: &str) -> Result<RenderPlan> {
        if self.state != OverlayState::Loading {
            return Err(RefineError::invalid_state(format!(
                "result arrived while {}",
                self.state
            )));
        }
        self.result = text.chars().collect();
        if self.interval.is_zero() || self.result.is_empty() {
            self.revealed = self.result.len();
            self.state = OverlayState::Ready;
            return Ok(RenderPlan::Immediate);
        }
        self.revealed = 0;
        self.state = OverlayState::Typing;
        Ok(RenderPlan::Tick {
            interval: self.interval,
        })
    }

    /// Reveals one more character. Returns `true` once the machine is `ready`.
    pub fn tick(&mut self) -> bool {
        if self.state != OverlayState::Typing {
            return self.state == OverlayState::Ready;
        }
        self.revealed += 1;
        if self.revealed >= self.result.len() {
            self.revealed = self.result.len();
            self.state = OverlayState::Ready;
            return true;
        }
        false
    }

    /// Jumps straight to the end of the result.
    pub fn finish(&mut self) {
        if self.state == OverlayState::Typing {
            self.revealed = self.result.len();
            self.state = OverlayState::Ready;
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<()> {
        match self.state {
            OverlayState::Loading | OverlayState::Typing => {
                self.state = OverlayState::Error;
                self.error = Some(message.into());
                Ok(())
            }
            state => Err(RefineError::invalid_state(format!(
                "cannot fail while {state}"
            ))),
        }
    }

    /// Back to `idle`, dropping all text.
    pub fn reset(&mut self) {
        self.state = OverlayState::Idle;
        self.original = None;
        self.result.clear();
        self.revealed = 0;
        self.error = None;
    }

    pub fn can_accept(&self) -> bool {
        self.state == OverlayState::Ready
    }

    pub fn can_copy(&self) -> bool {
        self.state == OverlayState::Ready
    }

    pub fn can_regenerate(&self) -> bool {
        matches!(self.state, OverlayState::Ready | OverlayState::Error)
            && self.original.as_deref().is_some_and(|text| !text.trim().is_empty())
    }
}

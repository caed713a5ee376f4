//! Countdown model of a displayed notification. The caller drives it with elapsed time.

use super::{Notification, NotificationType};
use std::time::Duration;

pub const TOAST_LIFETIME: Duration = Duration::from_millis(5000);
pub const TOAST_CLOSING: Duration = Duration::from_millis(500);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ToastPhase {
    Visible,
    Closing,
    Closed,
}

#[derive(Clone, Debug)]
pub struct Toast {
    pub kind: NotificationType,
    pub title: String,
    pub message: Option<String>,
    time_left: Duration,
    closing_left: Duration,
    running: bool,
    phase: ToastPhase,
}

impl Toast {
    pub fn new(kind: NotificationType, title: impl Into<String>, message: Option<String>) -> Self {
        Toast {
            kind,
            title: title.into(),
            message,
            time_left: TOAST_LIFETIME,
            closing_left: TOAST_CLOSING,
            running: true,
            phase: ToastPhase::Visible,
        }
    }

    pub fn from_notification(n: &Notification) -> Self {
        Self::new(n.kind, n.message.title.clone(), n.message.message.clone())
    }

    /// Advance the countdown. Error toasts and paused toasts do not count down.
    pub fn tick(&mut self, elapsed: Duration) -> ToastPhase {
        match self.phase {
            ToastPhase::Visible => {
                if self.running && self.kind != NotificationType::Error {
                    self.time_left = self.time_left.saturating_sub(elapsed);
                }
                if self.time_left.is_zero() {
                    self.phase = ToastPhase::Closing;
                }
            }
            ToastPhase::Closing => {
                self.closing_left = self.closing_left.saturating_sub(elapsed);
                if self.closing_left.is_zero() {
                    self.running = false;
                    self.phase = ToastPhase::Closed;
                }
            }
            ToastPhase::Closed => {}
        }
        self.phase
    }

    /// Start closing now, whatever time is left.
    pub fn close(&mut self) {
        if self.phase == ToastPhase::Visible {
            self.time_left = Duration::ZERO;
            self.phase = ToastPhase::Closing;
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn resume(&mut self) {
        if self.phase != ToastPhase::Closed {
            self.running = true;
        }
    }

    pub fn time_left(&self) -> Duration {
        self.time_left
    }

    pub fn phase(&self) -> ToastPhase {
        self.phase
    }

    pub fn is_closed(&self) -> bool {
        self.phase == ToastPhase::Closed
    }
}

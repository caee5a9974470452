//! UI-facing projection events
//!
//! Everything the core reports to the control layer is advisory and flows
//! one way, from the worker thread to the caller, through a [`UiSink`].

use crate::errors::DeviceErrorCode;
use crate::frames::RawCaptureStats;
use crate::types::{CaptureMode, Facing};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Advisory events projected to the UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum UiEvent {
    /// The lens-facing icon should show `facing`.
    FacingChanged(Facing),
    ZoomChanged {
        progress: usize,
        max_progress: usize,
        /// Ratio in hundredths.
        ratio: u32,
        label: String,
    },
    NoAlternateLens {
        facing: Facing,
    },
    /// A session reached Ready and the live request is running.
    SessionStarted {
        logical_id: String,
        physical_id: Option<String>,
        facing: Facing,
        mode: CaptureMode,
    },
    SessionError(String),
    DeviceError {
        camera_id: String,
        code: DeviceErrorCode,
    },
    DeviceDisconnected {
        camera_id: String,
    },
    RawUnsupported {
        camera_id: String,
    },
    CaptureModeChanged(CaptureMode),
    RawCaptureFinished(RawCaptureStats),
}

impl UiEvent {
    /// "ID: 0 | 2" style label for a session-started event.
    pub fn identity_label(&self) -> Option<String> {
        match self {
            UiEvent::SessionStarted {
                logical_id,
                physical_id: Some(physical_id),
                ..
            } => Some(format!("ID: {} | {}", logical_id, physical_id)),
            UiEvent::SessionStarted { logical_id, .. } => Some(format!("ID: {}", logical_id)),
            _ => None,
        }
    }
}

/// Receives UI events. Called on the worker thread; must not block.
pub trait UiSink: Send + Sync {
    fn dispatch(&self, event: UiEvent);
}

/// Sink forwarding into a tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelUiSink {
    sender: mpsc::UnboundedSender<UiEvent>,
}

impl ChannelUiSink {
    pub fn new(sender: mpsc::UnboundedSender<UiEvent>) -> Self {
        Self { sender }
    }
}

impl UiSink for ChannelUiSink {
    fn dispatch(&self, event: UiEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("UI event receiver dropped");
        }
    }
}

/// Sink that only logs. Used when the caller does not listen.
#[derive(Debug, Default)]
pub struct LogUiSink;

impl UiSink for LogUiSink {
    fn dispatch(&self, event: UiEvent) {
        log::info!("UI event: {:?}", event);
    }
}

/// Create a channel-backed sink and its receiving end.
pub fn event_channel() -> (ChannelUiSink, mpsc::UnboundedReceiver<UiEvent>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (ChannelUiSink::new(tx), rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_sink_delivers_in_order() {
        let (sink, mut rx) = event_channel();
        sink.dispatch(UiEvent::FacingChanged(Facing::Front));
        sink.dispatch(UiEvent::CaptureModeChanged(CaptureMode::Raw));
        assert_eq!(rx.recv().await, Some(UiEvent::FacingChanged(Facing::Front)));
        assert_eq!(
            rx.recv().await,
            Some(UiEvent::CaptureModeChanged(CaptureMode::Raw))
        );
    }

    #[test]
    fn test_dispatch_after_receiver_dropped() {
        let (sink, rx) = event_channel();
        drop(rx);
        sink.dispatch(UiEvent::SessionError("late".to_string()));
    }

    #[test]
    fn test_identity_label() {
        let event = UiEvent::SessionStarted {
            logical_id: "0".to_string(),
            physical_id: Some("2".to_string()),
            facing: Facing::Back,
            mode: CaptureMode::Preview,
        };
        assert_eq!(event.identity_label().as_deref(), Some("ID: 0 | 2"));
        assert_eq!(UiEvent::FacingChanged(Facing::Back).identity_label(), None);
    }
}

use crate::counter::Stage;
use crate::error::EventBusError;
use crate::pose::FrameSkip;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::SystemTime;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Why a processing loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The frame source has no more frames
    SourceExhausted,
    /// The session's active flag was cleared
    Stopped,
    /// The frame source failed
    SourceFailed,
}

/// Events that can occur during an exercise session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RepCountEvent {
    /// A session was reset and its processing loop started
    SessionStarted {
        session_id: String,
        timestamp: SystemTime,
    },
    /// The processing loop of a session ended
    SessionEnded {
        session_id: String,
        reason: EndReason,
        reps: u32,
        timestamp: SystemTime,
    },
    /// The counter moved to a new stage
    StageChanged {
        from: Stage,
        to: Stage,
        angle: f64,
        timestamp: SystemTime,
    },
    /// A full UP to DOWN cycle was recognised
    RepCompleted { count: u32, timestamp: SystemTime },
    /// A frame did not contribute to counting
    FrameSkipped {
        frame_id: u64,
        reason: FrameSkip,
        timestamp: SystemTime,
    },
    /// Measurements were written to a local file
    ExportWritten { path: PathBuf, rows: usize },
    /// The upload collaborator stored an export
    UploadCompleted {
        artifact_id: String,
        viewer_url: String,
    },
    /// The upload collaborator failed; the local export is still available
    UploadFailed { path: PathBuf, error: String },
    /// A system error occurred in a component
    SystemError { component: String, error: String },
}

impl RepCountEvent {
    /// Get the timestamp of the event
    pub fn timestamp(&self) -> SystemTime {
        match self {
            RepCountEvent::SessionStarted { timestamp, .. } => *timestamp,
            RepCountEvent::SessionEnded { timestamp, .. } => *timestamp,
            RepCountEvent::StageChanged { timestamp, .. } => *timestamp,
            RepCountEvent::RepCompleted { timestamp, .. } => *timestamp,
            RepCountEvent::FrameSkipped { timestamp, .. } => *timestamp,
            RepCountEvent::ExportWritten { .. } => SystemTime::now(),
            RepCountEvent::UploadCompleted { .. } => SystemTime::now(),
            RepCountEvent::UploadFailed { .. } => SystemTime::now(),
            RepCountEvent::SystemError { .. } => SystemTime::now(),
        }
    }

    /// Get a human-readable description of the event
    pub fn description(&self) -> String {
        match self {
            RepCountEvent::SessionStarted { session_id, .. } => {
                format!("Session {} started", session_id)
            }
            RepCountEvent::SessionEnded {
                session_id,
                reason,
                reps,
                ..
            } => {
                format!("Session {} ended ({:?}) with {} reps", session_id, reason, reps)
            }
            RepCountEvent::StageChanged { from, to, angle, .. } => {
                format!("Stage {} -> {} at {:.1}°", from, to, angle)
            }
            RepCountEvent::RepCompleted { count, .. } => format!("Rep {} completed", count),
            RepCountEvent::FrameSkipped {
                frame_id, reason, ..
            } => {
                format!("Frame {} skipped: {}", frame_id, reason)
            }
            RepCountEvent::ExportWritten { path, rows } => {
                format!("Exported {} rows to {}", rows, path.display())
            }
            RepCountEvent::UploadCompleted { artifact_id, .. } => {
                format!("Uploaded export as {}", artifact_id)
            }
            RepCountEvent::UploadFailed { path, error } => {
                format!("Upload of {} failed: {}", path.display(), error)
            }
            RepCountEvent::SystemError { component, error } => {
                format!("Error in {}: {}", component, error)
            }
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self {
            RepCountEvent::SessionStarted { .. } => "session_started",
            RepCountEvent::SessionEnded { .. } => "session_ended",
            RepCountEvent::StageChanged { .. } => "stage_changed",
            RepCountEvent::RepCompleted { .. } => "rep_completed",
            RepCountEvent::FrameSkipped { .. } => "frame_skipped",
            RepCountEvent::ExportWritten { .. } => "export_written",
            RepCountEvent::UploadCompleted { .. } => "upload_completed",
            RepCountEvent::UploadFailed { .. } => "upload_failed",
            RepCountEvent::SystemError { .. } => "system_error",
        }
    }
}

/// Async event bus for component coordination using broadcast channels
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<RepCountEvent>,
}

impl EventBus {
    /// Create a new event bus with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events and get a receiver
    pub fn subscribe(&self) -> broadcast::Receiver<RepCountEvent> {
        self.sender.subscribe()
    }

    /// Subscribe with a filter applied on receive
    pub fn subscribe_filtered(&self, filter: EventFilter, name: &str) -> EventReceiver {
        EventReceiver::new(self.sender.subscribe(), filter, name.to_string())
    }

    /// Publish an event to all subscribers.
    ///
    /// Fails only when nobody is subscribed; callers on the frame path ignore that.
    pub fn publish(&self, event: RepCountEvent) -> Result<usize, EventBusError> {
        match &event {
            RepCountEvent::RepCompleted { count, .. } => {
                info!("Repetition counted: {}", count);
            }
            RepCountEvent::SystemError { component, error } => {
                error!("System error in {}: {}", component, error);
            }
            RepCountEvent::UploadFailed { .. } => {
                warn!("{}", event.description());
            }
            RepCountEvent::SessionStarted { .. } | RepCountEvent::SessionEnded { .. } => {
                info!("{}", event.description());
            }
            _ => {
                debug!("Event: {}", event.description());
            }
        }

        self.sender
            .send(event)
            .map_err(|e| EventBusError::PublishFailed {
                details: e.to_string(),
            })
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// Event filter for selective event handling
#[derive(Debug, Clone)]
pub enum EventFilter {
    /// Accept all events
    All,
    /// Accept only specific event types
    EventTypes(Vec<&'static str>),
    /// Custom filter function
    Custom(fn(&RepCountEvent) -> bool),
}

impl EventFilter {
    /// Check if an event passes this filter
    pub fn matches(&self, event: &RepCountEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::EventTypes(types) => types.contains(&event.event_type()),
            EventFilter::Custom(filter_fn) => filter_fn(event),
        }
    }
}

/// Event receiver that only yields events passing its filter
pub struct EventReceiver {
    receiver: broadcast::Receiver<RepCountEvent>,
    filter: EventFilter,
    name: String,
}

impl EventReceiver {
    pub fn new(
        receiver: broadcast::Receiver<RepCountEvent>,
        filter: EventFilter,
        name: String,
    ) -> Self {
        Self {
            receiver,
            filter,
            name,
        }
    }

    /// Receive the next filtered event
    pub async fn recv(&mut self) -> Result<RepCountEvent, EventBusError> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed for receiver '{}'", self.name);
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<Option<RepCountEvent>, EventBusError> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(Some(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    warn!("Receiver '{}' lagged behind by {} events", self.name, n);
                    return Err(EventBusError::PublishFailed {
                        details: format!("Receiver lagged behind by {} events", n),
                    });
                }
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(EventBusError::ChannelClosed);
                }
            }
        }
    }
}

//! Structured progress log returned with every publishing run.
//!
//! Each step appends events here instead of printing, and every event is also
//! emitted through `tracing`. Presentation is left to the caller.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};

/// Workflow step an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Login,
    InlineImages,
    Article,
    DraftSave,
    Reconcile,
    CoverImage,
    Publish,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Login => "login",
            Step::InlineImages => "inline_images",
            Step::Article => "article",
            Step::DraftSave => "draft_save",
            Step::Reconcile => "reconcile",
            Step::CoverImage => "cover_image",
            Step::Publish => "publish",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventLevel {
    Debug,
    Info,
    /// Degraded but recovered (skipped image, failed cover upload)
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize)]
pub struct PublishEvent {
    pub at: DateTime<Utc>,
    pub step: Step,
    pub level: EventLevel,
    pub message: String,
}

/// Append-only event list.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    events: Vec<PublishEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, step: Step, level: EventLevel, message: impl Into<String>) {
        let message = message.into();
        match level {
            EventLevel::Debug => debug!(step = %step, "{}", message),
            EventLevel::Info => info!(step = %step, "{}", message),
            EventLevel::Warn => warn!(step = %step, "{}", message),
            EventLevel::Error => error!(step = %step, "{}", message),
        }
        self.events.push(PublishEvent {
            at: Utc::now(),
            step,
            level,
            message,
        });
    }

    pub fn debug(&mut self, step: Step, message: impl Into<String>) {
        self.record(step, EventLevel::Debug, message);
    }

    pub fn info(&mut self, step: Step, message: impl Into<String>) {
        self.record(step, EventLevel::Info, message);
    }

    pub fn warn(&mut self, step: Step, message: impl Into<String>) {
        self.record(step, EventLevel::Warn, message);
    }

    pub fn error(&mut self, step: Step, message: impl Into<String>) {
        self.record(step, EventLevel::Error, message);
    }

    /// Move all events of `other` to the end of this log.
    pub fn append(&mut self, other: EventLog) {
        self.events.extend(other.events);
    }

    pub fn events(&self) -> &[PublishEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<PublishEvent> {
        self.events
    }

    /// Events at `Warn` level.
    pub fn warnings(&self) -> impl Iterator<Item = &PublishEvent> {
        self.events.iter().filter(|e| e.level == EventLevel::Warn)
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let mut log = EventLog::new();
        log.info(Step::Login, "logged in");

        let mut images = EventLog::new();
        images.warn(Step::InlineImages, "skipped");
        log.append(images);

        let steps: Vec<Step> = log.events().iter().map(|e| e.step).collect();
        assert_eq!(steps, vec![Step::Login, Step::InlineImages]);
        assert_eq!(log.warnings().count(), 1);
    }

    #[test]
    fn test_step_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&Step::DraftSave).unwrap(), "\"draft_save\"");
        assert_eq!(Step::CoverImage.to_string(), "cover_image");
    }
}

//! Progress events emitted during downloads.
//!
//! Every state transition of a track, episode or batch is reported to a
//! [`Reporter`] as an [`Event`], in chronological order and from a single
//! call stack. Events can be serialized for callers that forward them
//! elsewhere.
//!
//! # Example
//!
//! ```rust
//! use deezload::events::{Event, Status};
//!
//! let reporter = |event: &Event| {
//!     if let Status::Done { summary: Some(summary) } = &event.status {
//!         println!("{}: {} done, {} failed", event.subject, summary.total_successful(), summary.total_failed());
//!     }
//! };
//! ```

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use serde::Serialize;

use crate::quality::QualityTier;

/// Identity of a reported entity.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct EntityRef {
    pub id: u64,
    pub title: String,

    /// Artist, playlist owner or show name.
    pub artist: String,
}

impl EntityRef {
    #[must_use]
    pub fn new(id: u64, title: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            artist: artist.into(),
        }
    }
}

/// What an event is about.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Subject {
    Track(EntityRef),
    Episode(EntityRef),
    Album(EntityRef),
    Playlist(EntityRef),
    ArtistTop(EntityRef),
}

impl Subject {
    #[must_use]
    pub fn entity(&self) -> &EntityRef {
        match self {
            Self::Track(entity)
            | Self::Episode(entity)
            | Self::Album(entity)
            | Self::Playlist(entity)
            | Self::ArtistTop(entity) => entity,
        }
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self {
            Self::Track(_) => "track",
            Self::Episode(_) => "episode",
            Self::Album(_) => "album",
            Self::Playlist(_) => "playlist",
            Self::ArtistTop(_) => "artist",
        };
        let entity = self.entity();
        if entity.artist.is_empty() {
            write!(f, "{kind} {}: \"{}\"", entity.id, entity.title)
        } else {
            write!(
                f,
                "{kind} {}: \"{} - {}\"",
                entity.id, entity.artist, entity.title
            )
        }
    }
}

/// A child that could not be acquired.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FailedEntry {
    pub track: EntityRef,
    pub reason: String,
}

/// Outcome of a batch, in processing order within each bucket.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Summary {
    pub successful: Vec<EntityRef>,
    pub skipped: Vec<EntityRef>,
    pub failed: Vec<FailedEntry>,
}

impl Summary {
    #[must_use]
    pub fn total_successful(&self) -> usize {
        self.successful.len()
    }

    #[must_use]
    pub fn total_skipped(&self) -> usize {
        self.skipped.len()
    }

    #[must_use]
    pub fn total_failed(&self) -> usize {
        self.failed.len()
    }
}

/// State transition being reported.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Status {
    Initializing,

    /// An existing file satisfies the request.
    Skipped { reason: String },

    /// The requested tier could not be served; trying the next one.
    Retrying {
        from: QualityTier,
        to: QualityTier,
        reason: String,
    },

    /// Download progress, once per whole percent.
    RealTime { percent: u8 },

    Error { error: String },

    /// Finished. Batches and parentless tracks carry a summary.
    Done { summary: Option<Summary> },
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Initializing => write!(f, "initializing"),
            Self::Skipped { reason } => write!(f, "skipped ({reason})"),
            Self::Retrying { from, to, reason } => {
                write!(f, "retrying at {to} after {from} failed ({reason})")
            }
            Self::RealTime { percent } => write!(f, "{percent}%"),
            Self::Error { error } => write!(f, "error: {error}"),
            Self::Done { summary: None } => write!(f, "done"),
            Self::Done {
                summary: Some(summary),
            } => write!(
                f,
                "done ({} successful, {} skipped, {} failed)",
                summary.total_successful(),
                summary.total_skipped(),
                summary.total_failed()
            ),
        }
    }
}

/// A progress event.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Event {
    pub subject: Subject,
    pub status: Status,

    /// Album or playlist the subject is downloaded as part of.
    pub parent: Option<Subject>,

    /// 1-based position within the parent.
    pub current: Option<usize>,
    pub total: Option<usize>,
}

impl Event {
    /// Creates an event without parent context.
    #[must_use]
    pub fn new(subject: Subject, status: Status) -> Self {
        Self {
            subject,
            status,
            parent: None,
            current: None,
            total: None,
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if let (Some(current), Some(total)) = (self.current, self.total) {
            write!(f, "[{current}/{total}] ")?;
        }
        write!(f, "{}: {}", self.subject, self.status)
    }
}

/// Sink for progress events.
pub trait Reporter: Send + Sync {
    fn report(&self, event: &Event);
}

impl<F> Reporter for F
where
    F: Fn(&Event) + Send + Sync,
{
    fn report(&self, event: &Event) {
        self(event);
    }
}

/// Writes events to the log.
#[derive(Copy, Clone, Debug, Default)]
pub struct LogReporter;

impl Reporter for LogReporter {
    fn report(&self, event: &Event) {
        match event.status {
            Status::Error { .. } => error!("{event}"),
            Status::Retrying { .. } => warn!("{event}"),
            Status::RealTime { .. } => trace!("{event}"),
            Status::Initializing => debug!("{event}"),
            Status::Skipped { .. } | Status::Done { .. } => info!("{event}"),
        }
    }
}

/// Collects events for later inspection.
#[derive(Clone, Debug, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Events recorded so far, oldest first.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl Reporter for Recorder {
    fn report(&self, event: &Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_render_position_and_summary() {
        let mut event = Event::new(
            Subject::Track(EntityRef::new(3, "Digital Love", "Daft Punk")),
            Status::Initializing,
        );
        event.current = Some(3);
        event.total = Some(14);
        assert_eq!(
            event.to_string(),
            "[3/14] track 3: \"Daft Punk - Digital Love\": initializing"
        );

        let summary = Summary {
            successful: vec![EntityRef::default()],
            skipped: Vec::new(),
            failed: vec![FailedEntry {
                track: EntityRef::default(),
                reason: "gone".to_owned(),
            }],
        };
        let status = Status::Done {
            summary: Some(summary),
        };
        assert_eq!(status.to_string(), "done (1 successful, 0 skipped, 1 failed)");
    }

    #[test]
    fn status_serializes_with_tag() {
        let json = serde_json::to_value(Status::RealTime { percent: 42 }).unwrap();
        assert_eq!(json["status"], "real_time");
        assert_eq!(json["percent"], 42);
    }

    #[test]
    fn recorder_keeps_order() {
        let recorder = Recorder::new();
        let subject = Subject::Album(EntityRef::new(1, "Discovery", "Daft Punk"));
        recorder.report(&Event::new(subject.clone(), Status::Initializing));
        recorder.report(&Event::new(subject, Status::Done { summary: None }));

        let events = recorder.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].status, Status::Initializing);
    }
}

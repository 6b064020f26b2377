//! Three-channel event emitter for batch uploads
//!
//! Listeners subscribe by event name (`data`, `error`, `done`). Every event is
//! kept, and a listener registered late is first handed the earlier events of
//! its kind, so registering after the upload started never loses anything.

use crate::types::{FileUploadResult, UploadSummary};
use parking_lot::Mutex;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Event names
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Data,
    Error,
    Done,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Data => "data",
            Self::Error => "error",
            Self::Done => "done",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = crate::ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "data" => Ok(Self::Data),
            "error" => Ok(Self::Error),
            "done" => Ok(Self::Done),
            other => Err(crate::ClientError::Validation(format!(
                "unknown event name: {}",
                other
            ))),
        }
    }
}

/// An event emitted by a batch upload
#[derive(Clone, Debug)]
pub enum UploadEvent {
    /// A file was stored and registered
    Data(FileUploadResult),
    /// A file failed
    Error(FileUploadResult),
    /// Every file has been attempted
    Done(UploadSummary),
}

impl UploadEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Data(_) => EventKind::Data,
            Self::Error(_) => EventKind::Error,
            Self::Done(_) => EventKind::Done,
        }
    }
}

/// Handle returned by `on`/`once`, used to unregister
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Callback = Arc<dyn Fn(&UploadEvent) + Send + Sync>;

struct Listener {
    id: ListenerId,
    kind: EventKind,
    once: bool,
    callback: Callback,
}

#[derive(Default)]
struct EmitterState {
    history: Vec<UploadEvent>,
    listeners: Vec<Listener>,
    next_id: u64,
}

/// Event emitter with replay for late listeners
#[derive(Default)]
pub struct EventEmitter {
    state: Mutex<EmitterState>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Call `callback` for every event of `kind`, past and future
    pub fn on<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&UploadEvent) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let (id, replay) = {
            let mut state = self.state.lock();
            let id = ListenerId(state.next_id);
            state.next_id += 1;
            let replay: Vec<UploadEvent> = state
                .history
                .iter()
                .filter(|e| e.kind() == kind)
                .cloned()
                .collect();
            state.listeners.push(Listener {
                id,
                kind,
                once: false,
                callback: Arc::clone(&callback),
            });
            (id, replay)
        };
        for event in &replay {
            callback(event);
        }
        id
    }

    /// Call `callback` for the first event of `kind`, which may already have happened
    pub fn once<F>(&self, kind: EventKind, callback: F) -> ListenerId
    where
        F: Fn(&UploadEvent) + Send + Sync + 'static,
    {
        let callback: Callback = Arc::new(callback);
        let (id, earlier) = {
            let mut state = self.state.lock();
            let id = ListenerId(state.next_id);
            state.next_id += 1;
            let earlier = state.history.iter().find(|e| e.kind() == kind).cloned();
            if earlier.is_none() {
                state.listeners.push(Listener {
                    id,
                    kind,
                    once: true,
                    callback: Arc::clone(&callback),
                });
            }
            (id, earlier)
        };
        if let Some(event) = earlier {
            callback(&event);
        }
        id
    }

    /// Unregister a listener; returns whether it was still registered
    pub fn off(&self, id: ListenerId) -> bool {
        let mut state = self.state.lock();
        let before = state.listeners.len();
        state.listeners.retain(|l| l.id != id);
        state.listeners.len() != before
    }

    /// Record `event` and deliver it to current listeners
    pub fn emit(&self, event: UploadEvent) {
        let kind = event.kind();
        let callbacks: Vec<Callback> = {
            let mut state = self.state.lock();
            state.history.push(event.clone());
            let callbacks = state
                .listeners
                .iter()
                .filter(|l| l.kind == kind)
                .map(|l| Arc::clone(&l.callback))
                .collect();
            state.listeners.retain(|l| !(l.once && l.kind == kind));
            callbacks
        };
        for callback in callbacks {
            callback(&event);
        }
    }

    /// Number of emitted events of `kind`
    pub fn count(&self, kind: EventKind) -> usize {
        self.state
            .lock()
            .history
            .iter()
            .filter(|e| e.kind() == kind)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn failed(path: &str) -> UploadEvent {
        UploadEvent::Error(FileUploadResult::failure(path.to_string(), "boom"))
    }

    #[test]
    fn test_event_names() {
        assert_eq!(EventKind::Data.to_string(), "data");
        assert_eq!("done".parse::<EventKind>().unwrap(), EventKind::Done);
        assert!("progress".parse::<EventKind>().is_err());
    }

    #[test]
    fn test_late_listener_gets_replay() {
        let emitter = EventEmitter::new();
        emitter.emit(failed("/a"));
        emitter.emit(failed("/b"));

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        emitter.on(EventKind::Error, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(seen.load(Ordering::SeqCst), 2);

        emitter.emit(failed("/c"));
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_once_fires_a_single_time() {
        let emitter = EventEmitter::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        emitter.once(EventKind::Error, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        emitter.emit(failed("/a"));
        emitter.emit(failed("/b"));
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_off_stops_delivery() {
        let emitter = EventEmitter::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let id = emitter.on(EventKind::Error, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        emitter.emit(failed("/a"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_listeners_only_see_their_kind() {
        let emitter = EventEmitter::new();
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        emitter.on(EventKind::Done, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        emitter.emit(failed("/a"));
        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(emitter.count(EventKind::Error), 1);
    }
}

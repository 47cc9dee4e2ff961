use std::cell::Cell;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::{Mutex, ReentrantMutex};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One conversation entry. Fields are private so a message cannot change
/// after it is appended.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    id: Uuid,
    role: MessageRole,
    content: String,
}

impl ChatMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn role(&self) -> MessageRole {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }
}

/// What the current session was started from.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedMedia {
    Photo { width: u32, height: u32 },
    Video { path: PathBuf },
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub is_loading: bool,
    /// Description of the captured subject; grounding for chat questions.
    pub building_context: String,
    pub messages: Vec<ChatMessage>,
    pub question: String,
    pub captured: Option<CapturedMedia>,
    /// Incremented on each capture and each question; async tasks compare
    /// against this before writing results and discard stale ones.
    pub request_generation: u64,
}

impl AppState {
    /// Reset for a new capture and return the generation the capture owns.
    pub fn begin_capture(&mut self, media: CapturedMedia) -> u64 {
        self.messages.clear();
        self.question.clear();
        self.building_context.clear();
        self.captured = Some(media);
        self.is_loading = true;
        self.request_generation += 1;
        self.request_generation
    }
}

pub type Listener = Arc<dyn Fn(&AppState) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

#[derive(Default)]
struct Listeners {
    next_id: u64,
    entries: Vec<(SubscriptionId, Listener)>,
}

#[derive(Default)]
struct Shared {
    state: AppState,
    /// Bumped on every mutation, under the same lock.
    version: u64,
}

/// Shared state container. Every mutation goes through [`Store::update`],
/// which notifies subscribers with a snapshot after the state lock is
/// released. Snapshots reach listeners in mutation order; one that loses
/// the race to a newer snapshot is dropped rather than delivered late.
#[derive(Clone, Default)]
pub struct Store {
    shared: Arc<Mutex<Shared>>,
    listeners: Arc<Mutex<Listeners>>,
    /// Version of the newest snapshot handed to listeners. Reentrant so a
    /// listener may itself update the store.
    delivered: Arc<ReentrantMutex<Cell<u64>>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> AppState {
        self.shared.lock().state.clone()
    }

    /// Read without cloning the whole state.
    pub fn read<R>(&self, f: impl FnOnce(&AppState) -> R) -> R {
        f(&self.shared.lock().state)
    }

    pub fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let (result, version, snapshot) = {
            let mut shared = self.shared.lock();
            let result = f(&mut shared.state);
            shared.version += 1;
            (result, shared.version, shared.state.clone())
        };
        self.notify(version, &snapshot);
        result
    }

    /// Apply `f` only if no newer request has started since `generation`.
    /// Returns false (and notifies nobody) for a stale completion.
    pub fn update_if_current(&self, generation: u64, f: impl FnOnce(&mut AppState)) -> bool {
        let (version, snapshot) = {
            let mut shared = self.shared.lock();
            if shared.state.request_generation != generation {
                return false;
            }
            f(&mut shared.state);
            shared.version += 1;
            (shared.version, shared.state.clone())
        };
        self.notify(version, &snapshot);
        true
    }

    pub fn subscribe(&self, listener: impl Fn(&AppState) + Send + Sync + 'static) -> SubscriptionId {
        let listener: Listener = Arc::new(listener);
        let mut listeners = self.listeners.lock();
        let id = SubscriptionId(listeners.next_id);
        listeners.next_id += 1;
        listeners.entries.push((id, listener));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.listeners.lock().entries.retain(|(entry, _)| *entry != id);
    }

    fn notify(&self, version: u64, snapshot: &AppState) {
        let delivered = self.delivered.lock();
        if delivered.get() >= version {
            return;
        }
        delivered.set(version);

        // Clone the list so a listener may subscribe or unsubscribe re-entrantly.
        let listeners: Vec<Listener> = self
            .listeners
            .lock()
            .entries
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();
        for listener in listeners {
            // A listener updated the store; the rest already saw the newer state.
            if delivered.get() != version {
                break;
            }
            listener(snapshot);
        }
    }
}

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::trace;

use super::levels::{ButtonLevels, Key, Keys};


/// Button levels are sampled no more often than this, which also debounces them.
pub const SAMPLE_INTERVAL: Duration = Duration::from_millis(20);

const MAX_QUEUED: usize = 8;


/// The keys that were held together, reported once all are released.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyEvent {
    keys: Keys,
}

impl KeyEvent {
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> Keys {
        self.keys
    }

    pub fn is_single(&self, key: Key) -> bool {
        self.keys == Keys::from(key)
    }

    pub fn is_chord(&self, a: Key, b: Key) -> bool {
        a != b && self.keys == Keys(a.mask() | b.mask())
    }
}


/// Turns raw button levels into [`KeyEvent`]s.
pub struct ChordInput {
    levels: Arc<ButtonLevels>,
    last_sample: Option<Instant>,
    held: Keys,
    chord: Keys,
    cancelled: bool,
    events: VecDeque<KeyEvent>,
}

impl ChordInput {
    pub fn new(levels: Arc<ButtonLevels>) -> Self {
        Self {
            levels,
            last_sample: None,
            held: Keys::default(),
            chord: Keys::default(),
            cancelled: false,
            events: VecDeque::new(),
        }
    }

    pub fn tick(&mut self, now: Instant) {
        if let Some(last) = self.last_sample {
            if now.saturating_duration_since(last) < SAMPLE_INTERVAL {
                return;
            }
        }
        self.last_sample = Some(now);

        let held = self.levels.sample();
        self.held = held;

        if !held.is_empty() {
            self.chord = Keys(self.chord.0 | held.0);
            return;
        }

        if self.chord.is_empty() {
            return;
        }

        if self.cancelled {
            trace!("chord {:?} cancelled", self.chord);
        } else if self.events.len() < MAX_QUEUED {
            self.events.push_back(KeyEvent::new(self.chord));
        }

        self.chord = Keys::default();
        self.cancelled = false;
    }

    /// Whether `key` was down at the last sample.
    pub fn is_down(&self, key: Key) -> bool {
        self.held.contains(key)
    }

    /// Drop the chord currently being held, so no event is reported for it.
    pub fn cancel_current_chord(&mut self) {
        if !self.chord.is_empty() {
            self.cancelled = true;
        }
    }

    pub fn has_event(&self) -> bool {
        !self.events.is_empty()
    }

    pub fn pop_event(&mut self) -> Option<KeyEvent> {
        self.events.pop_front()
    }
}

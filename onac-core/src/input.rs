use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Keys the tasks care about, named the way the stimulus tables spell them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum Key {
    Escape,
    Space,
    Return,
    Left,
    Right,
    Up,
    Down,
    Char(char),
    Other(String),
}

impl Key {
    pub fn name(&self) -> String {
        match self {
            Key::Escape => "escape".into(),
            Key::Space => "space".into(),
            Key::Return => "return".into(),
            Key::Left => "left".into(),
            Key::Right => "right".into(),
            Key::Up => "up".into(),
            Key::Down => "down".into(),
            Key::Char(c) => c.to_string(),
            Key::Other(s) => s.clone(),
        }
    }

    pub fn from_name(name: &str) -> Key {
        let lower = name.trim().to_ascii_lowercase();
        match lower.as_str() {
            "escape" | "esc" => Key::Escape,
            "space" => Key::Space,
            "return" | "enter" => Key::Return,
            "left" => Key::Left,
            "right" => Key::Right,
            "up" => Key::Up,
            "down" => Key::Down,
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Key::Char(c),
                    _ => Key::Other(lower),
                }
            }
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

impl From<Key> for String {
    fn from(key: Key) -> String {
        key.name()
    }
}

impl From<String> for Key {
    fn from(name: String) -> Key {
        Key::from_name(&name)
    }
}

/// A key press stamped with the session timer (nanoseconds).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub timestamp_ns: u64,
}

/// Keys polled for a response. Escape never counts as a response: it is
/// reserved for aborting the session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeySet {
    Any,
    Only(Vec<Key>),
}

impl KeySet {
    pub fn only<I: IntoIterator<Item = Key>>(keys: I) -> Self {
        KeySet::Only(keys.into_iter().collect())
    }

    pub fn matches(&self, key: &Key) -> bool {
        if *key == Key::Escape {
            return false;
        }
        match self {
            KeySet::Any => true,
            KeySet::Only(keys) => keys.contains(key),
        }
    }
}

/// Buffered key presses, drained by the trial loop once per frame.
#[derive(Debug, Default)]
pub struct KeyQueue {
    events: VecDeque<KeyEvent>,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: KeyEvent) {
        self.events.push_back(event);
    }

    pub fn extend<I: IntoIterator<Item = KeyEvent>>(&mut self, events: I) {
        self.events.extend(events);
    }

    /// Removes and returns every buffered press matching `keys`, oldest first.
    pub fn take_matching(&mut self, keys: &KeySet) -> Vec<KeyEvent> {
        let mut taken = Vec::new();
        self.events.retain(|e| {
            if keys.matches(&e.key) {
                taken.push(e.clone());
                false
            } else {
                true
            }
        });
        taken
    }

    /// Removes any buffered escape presses, returning whether there was one.
    pub fn take_escape(&mut self) -> bool {
        let before = self.events.len();
        self.events.retain(|e| e.key != Key::Escape);
        self.events.len() != before
    }

    /// Drops presses other than escape, so an abort is never lost.
    pub fn clear(&mut self) {
        self.events.retain(|e| e.key == Key::Escape);
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

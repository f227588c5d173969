//! Bounded record of what the route did, kept until a report is delivered.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::route::layout::TokenColor;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ActionTag {
    Forward,
    TurnLeft,
    TurnRight,
    TurnBack,
    Collect { color: TokenColor },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ActionEntry {
    #[serde(flatten)]
    pub tag: ActionTag,
    /// Run counter at the time of the action.
    pub run: u32,
    pub at: DateTime<Utc>,
}

/// FIFO capped at `capacity`; the oldest entry goes first.
#[derive(Clone, Debug)]
pub struct ActionLog {
    entries: VecDeque<ActionEntry>,
    capacity: usize,
    evicted: u64,
}

impl ActionLog {
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    pub fn push(&mut self, tag: ActionTag, run: u32) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(ActionEntry {
            tag,
            run,
            at: Utc::now(),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries dropped for lack of room since the log was created.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActionEntry> {
        self.entries.iter()
    }

    pub fn snapshot(&self) -> Vec<ActionEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for ActionLog {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

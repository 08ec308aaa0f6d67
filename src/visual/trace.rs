//! Opt-in structured trace of what the engine did for a request
//!
//! Every event also goes to the `log` facade at debug level, so a sink is
//! only needed when the caller wants the events as data.

use std::sync::Mutex;

use serde::Serialize;

#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TraceEvent {
    SubgraphExtracted {
        root: String,
        radius: usize,
        devices: usize,
        links: usize,
    },
    GroupsFormed {
        candidates: usize,
        groups: Vec<String>,
    },
    Composed {
        hidden_members: usize,
        shadow_nodes: Vec<String>,
        rewritten_edges: usize,
        dropped_edges: usize,
    },
    GroupExpanded {
        group: String,
        members: usize,
        new_nodes: usize,
        new_edges: usize,
    },
    Regrouped {
        parent: String,
        groups: Vec<String>,
    },
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: &TraceEvent);
}

/// Keeps every event in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<TraceEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TraceEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl TraceSink for RecordingSink {
    fn record(&self, event: &TraceEvent) {
        match self.events.lock() {
            Ok(mut events) => events.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}

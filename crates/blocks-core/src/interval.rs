use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::dispatch::EventRecord;
use crate::identity::InstanceId;
use crate::node::HandlerRef;

/// Published state of one `use_interval` slot. The poller dispatches
/// `tick_event()` every `period_ms` while `running` is set.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalDescriptor {
    pub handler: HandlerRef,
    pub instance: InstanceId,
    pub slot: usize,
    pub period_ms: u64,
    pub running: bool,
}

impl IntervalDescriptor {
    pub fn tick_event(&self) -> Option<EventRecord> {
        self.running
            .then(|| EventRecord::new(self.handler.clone(), Value::Null))
    }
}

/// Tick events for every running interval, shortest period first.
pub fn due_ticks(intervals: &[IntervalDescriptor]) -> Vec<EventRecord> {
    let mut running: Vec<&IntervalDescriptor> = intervals.iter().filter(|i| i.running).collect();
    running.sort_by_key(|i| i.period_ms);
    running.iter().filter_map(|i| i.tick_event()).collect()
}

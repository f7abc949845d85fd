//! # Hook ledger
//!
//! Every component instance owns an ordered list of hook slots: slot 0 is its
//! first `use_state`/`use_interval` call, slot 1 the second, and so on. The
//! ledger is the only state that survives between requests; it is encoded to
//! an opaque blob at the end of each cycle and decoded at the start of the
//! next one.
//!
//! During a cycle the ledgers live in a `LedgerStore`, an arena keyed by
//! `InstanceKey` with an index from `InstanceId`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use slotmap::{SlotMap, new_key_type};

use crate::error::{EncodeError, LedgerError};
use crate::identity::InstanceId;

pub const LEDGER_VERSION: u32 = 1;

new_key_type! {
    pub struct InstanceKey;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotKind {
    State,
    Interval,
}

impl fmt::Display for SlotKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotKind::State => f.write_str("state"),
            SlotKind::Interval => f.write_str("interval"),
        }
    }
}

/// Resolution of a state slot. Slots created by a plain initializer are
/// always `Resolved`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    #[default]
    Resolved,
    Pending,
    Failed,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Slot {
    State {
        #[serde(default)]
        value: Value,
        #[serde(default)]
        status: SlotStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    Interval {
        period_ms: u64,
        running: bool,
    },
}

impl Slot {
    pub fn state(value: Value) -> Self {
        Slot::State {
            value,
            status: SlotStatus::Resolved,
            error: None,
        }
    }

    pub fn pending() -> Self {
        Slot::State {
            value: Value::Null,
            status: SlotStatus::Pending,
            error: None,
        }
    }

    pub fn interval(period_ms: u64) -> Self {
        Slot::Interval {
            period_ms,
            running: false,
        }
    }

    pub fn kind(&self) -> SlotKind {
        match self {
            Slot::State { .. } => SlotKind::State,
            Slot::Interval { .. } => SlotKind::Interval,
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Slot::State { value, .. } => Some(value),
            Slot::Interval { .. } => None,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceLedger {
    slots: Vec<Slot>,
}

impl InstanceLedger {
    pub fn from_slots(slots: Vec<Slot>) -> Self {
        Self { slots }
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[derive(Serialize, Deserialize)]
struct LedgerFile {
    version: u32,
    instances: BTreeMap<InstanceId, InstanceLedger>,
}

#[derive(Clone, Debug)]
struct Entry {
    id: InstanceId,
    ledger: InstanceLedger,
}

#[derive(Clone, Debug, Default)]
pub struct LedgerStore {
    entries: SlotMap<InstanceKey, Entry>,
    index: HashMap<InstanceId, InstanceKey>,
}

impl LedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty blob is a post that has never been rendered.
    pub fn decode(bytes: &[u8]) -> Result<Self, LedgerError> {
        let mut store = Self::new();
        if bytes.is_empty() {
            return Ok(store);
        }
        let file: LedgerFile =
            serde_json::from_slice(bytes).map_err(|e| LedgerError::Decode(e.to_string()))?;
        if file.version != LEDGER_VERSION {
            return Err(LedgerError::Version {
                found: file.version,
                expected: LEDGER_VERSION,
            });
        }
        for (id, ledger) in file.instances {
            store.insert(id, ledger);
        }
        Ok(store)
    }

    /// Instances without slots are left out; they re-create nothing.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let instances = self
            .entries
            .values()
            .filter(|e| !e.ledger.is_empty())
            .map(|e| (e.id.clone(), e.ledger.clone()))
            .collect();
        let file = LedgerFile {
            version: LEDGER_VERSION,
            instances,
        };
        serde_json::to_vec(&file).map_err(EncodeError::Encode)
    }

    pub fn insert(&mut self, id: InstanceId, ledger: InstanceLedger) -> InstanceKey {
        if let Some(&key) = self.index.get(&id) {
            self.entries[key].ledger = ledger;
            return key;
        }
        let key = self.entries.insert(Entry {
            id: id.clone(),
            ledger,
        });
        self.index.insert(id, key);
        key
    }

    pub fn get(&self, id: &InstanceId) -> Option<&InstanceLedger> {
        self.index.get(id).map(|&k| &self.entries[k].ledger)
    }

    pub fn len(&self) -> usize {
        self.entries.values().filter(|e| !e.ledger.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn instances(&self) -> impl Iterator<Item = (&InstanceId, &InstanceLedger)> {
        self.entries.values().map(|e| (&e.id, &e.ledger))
    }

    pub(crate) fn entry(&mut self, id: &InstanceId) -> InstanceKey {
        match self.index.get(id) {
            Some(&key) => key,
            None => self.insert(id.clone(), InstanceLedger::default()),
        }
    }

    pub(crate) fn slot_count(&self, key: InstanceKey) -> usize {
        self.entries.get(key).map_or(0, |e| e.ledger.len())
    }

    pub(crate) fn slot(&self, key: InstanceKey, index: usize) -> Option<&Slot> {
        self.entries.get(key)?.ledger.slots.get(index)
    }

    pub(crate) fn slot_mut(&mut self, key: InstanceKey, index: usize) -> Option<&mut Slot> {
        self.entries.get_mut(key)?.ledger.slots.get_mut(index)
    }

    pub(crate) fn push(&mut self, key: InstanceKey, slot: Slot) -> Option<usize> {
        let entry = self.entries.get_mut(key)?;
        entry.ledger.slots.push(slot);
        Some(entry.ledger.slots.len() - 1)
    }

    /// Writes the outcome of an async initializer into its slot.
    pub(crate) fn settle(&mut self, key: InstanceKey, index: usize, outcome: Result<Value, String>) {
        let Some(Slot::State {
            value,
            status,
            error,
        }) = self.slot_mut(key, index)
        else {
            log::warn!("settle: slot {index} vanished before its initializer finished");
            return;
        };
        match outcome {
            Ok(v) => {
                *value = v;
                *status = SlotStatus::Resolved;
                *error = None;
            }
            Err(message) => {
                *value = Value::Null;
                *status = SlotStatus::Failed;
                *error = Some(message);
            }
        }
    }

    /// Drops ledgers of instances the last pass did not reach.
    pub(crate) fn retain_visited(&mut self, visited: &HashSet<InstanceKey>) -> Vec<InstanceId> {
        let mut dropped = Vec::new();
        self.entries.retain(|key, entry| {
            let keep = visited.contains(&key);
            if !keep && !entry.ledger.is_empty() {
                dropped.push(entry.id.clone());
            }
            keep
        });
        self.index.retain(|_, key| visited.contains(key));
        dropped
    }
}

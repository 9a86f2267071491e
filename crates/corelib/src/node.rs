//! Node state and local (single-node) operations.
//!
//! `NodeState` holds everything one ring participant owns: its links,
//! finger table, stored data, lookup cache, predecessor backup, and
//! metrics. Per the arena strategy in the design notes, `NodeState`
//! never stores a reference to another node — only `Identifier`s, which
//! `Network` resolves through its arena. Local operations that need to
//! dereference a peer (`find_successor`, `closest_preceding_finger`)
//! therefore live on `Network`, parameterized by the acting node's id.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;
use tracing::trace;

use crate::error::{Error, Result};
use crate::identifier::{Identifier, RingParams};
use crate::network::Network;

/// Bound on how many lookup hints a node's cache retains. Entries beyond
/// this are evicted oldest-first; the cache is a hint, never a source of
/// truth, so a small bound keeps lookups cheap without risking staleness
/// becoming a correctness issue.
const CACHE_CAPACITY: usize = 64;

/// Lookup/liveness counters for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metrics {
    pub lookups_attempted: u64,
    pub lookups_succeeded: u64,
    pub lookups_failed: u64,
    /// Logical heartbeat counter. The core has no wall clock; a caller
    /// that wants real timestamps stamps them outside this crate.
    pub last_heartbeat: u64,
}

/// Snapshot of a predecessor's data, held by its successor so that data
/// can be recovered if the predecessor vanishes without a graceful leave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    pub predecessor_id: Identifier,
    pub data: HashMap<Identifier, Vec<u8>>,
}

/// Read-only view of a node's state, for introspection and health checks.
/// Serializable so a caller can export it (e.g. as JSON) the way
/// `original_source`'s `export_state()` does.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeSnapshot {
    pub id: Identifier,
    pub successor: Identifier,
    pub predecessor: Option<Identifier>,
    pub fingers: Vec<Identifier>,
    pub stored_key_count: usize,
    pub load: f64,
    pub metrics: Metrics,
}

/// One ring participant's mutable state.
#[derive(Debug)]
pub struct NodeState {
    pub id: Identifier,
    pub successor: Identifier,
    pub predecessor: Option<Identifier>,
    pub fingers: Vec<Identifier>,
    pub data: HashMap<Identifier, Vec<u8>>,
    pub backup: Option<Backup>,
    pub metrics: Metrics,
    cache: HashMap<Identifier, Identifier>,
    cache_order: VecDeque<Identifier>,
}

impl NodeState {
    /// A freshly constructed node is its own successor; predecessor is
    /// unknown and every finger points at itself until joins/fix-fingers
    /// populate the table.
    pub fn new(id: Identifier, params: &RingParams) -> Self {
        Self {
            id,
            successor: id,
            predecessor: None,
            fingers: vec![id; params.m as usize],
            data: HashMap::new(),
            backup: None,
            metrics: Metrics::default(),
            cache: HashMap::new(),
            cache_order: VecDeque::new(),
        }
    }

    pub fn cache_store(&mut self, key: Identifier, node: Identifier) {
        if !self.cache.contains_key(&key) {
            if self.cache_order.len() >= CACHE_CAPACITY {
                if let Some(oldest) = self.cache_order.pop_front() {
                    self.cache.remove(&oldest);
                }
            }
            self.cache_order.push_back(key);
        }
        self.cache.insert(key, node);
    }

    pub fn cache_lookup(&self, key: Identifier) -> Option<Identifier> {
        self.cache.get(&key).copied()
    }

    fn cache_invalidate(&mut self, key: Identifier) {
        self.cache.remove(&key);
        self.cache_order.retain(|k| *k != key);
    }
}

impl Network {
    /// Run `f` against a read lock on node `id`'s state.
    pub(crate) fn with_node<T>(
        &self,
        id: Identifier,
        f: impl FnOnce(&NodeState) -> T,
    ) -> Result<T> {
        let entry = self.nodes.get(&id).ok_or(Error::NodeNotFound(id))?;
        let guard = entry.value().read();
        Ok(f(&guard))
    }

    /// Run `f` against a write lock on node `id`'s state.
    pub(crate) fn with_node_mut<T>(
        &self,
        id: Identifier,
        f: impl FnOnce(&mut NodeState) -> T,
    ) -> Result<T> {
        let entry = self.nodes.get(&id).ok_or(Error::NodeNotFound(id))?;
        let mut guard = entry.value().write();
        Ok(f(&mut guard))
    }

    /// The node responsible for `key`, found by routing from `from`.
    ///
    /// Contract: if `key` falls in `(from.id, from.successor.id]`
    /// return the successor directly; otherwise hop to
    /// `closest_preceding_finger(key)` and repeat. Implemented iteratively
    /// rather than via recursive cross-node calls so a stalled route (a
    /// finger pointing at a node no longer in the arena) degrades to
    /// `RoutingFailure` instead of an unbounded retry.
    pub fn find_successor(&self, from: Identifier, key: Identifier) -> Result<Identifier> {
        let key = self.params.normalize(key);
        if !self.nodes.contains_key(&from) {
            return Err(Error::NodeNotFound(from));
        }
        let _ = self.with_node_mut(from, |n| n.metrics.lookups_attempted += 1);

        let start = self
            .with_node(from, |n| n.cache_lookup(key))
            .unwrap_or(None)
            .filter(|cached| self.nodes.contains_key(cached))
            .unwrap_or(from);

        match self.route_to_successor(start, key) {
            Ok(owner) => {
                let _ = self.with_node_mut(from, |n| {
                    n.metrics.lookups_succeeded += 1;
                    n.cache_store(key, owner);
                });
                trace!(from, key, owner, "find_successor resolved");
                Ok(owner)
            }
            Err(err) => {
                let _ = self.with_node_mut(from, |n| {
                    n.metrics.lookups_failed += 1;
                    n.cache_invalidate(key);
                });
                trace!(from, key, %err, "find_successor failed");
                Err(err)
            }
        }
    }

    fn route_to_successor(&self, start: Identifier, key: Identifier) -> Result<Identifier> {
        // Bounded by ring membership plus a finger-table margin: a
        // well-formed table resolves in O(log N) hops, so this bound is
        // only ever exercised by a skewed or partially-failed table.
        let max_hops = self.nodes.len().max(1) * 2 + self.params.m as usize * 2;
        let mut current = start;
        for _ in 0..max_hops {
            let succ = match self.with_node(current, |n| n.successor) {
                Ok(succ) => succ,
                Err(_) => return Err(Error::RoutingFailure),
            };
            if self.params.in_open_closed(key, current, succ) {
                return Ok(succ);
            }
            let next = self.closest_preceding_finger(current, key)?;
            current = if next != current {
                next
            } else if succ != current {
                succ
            } else {
                return Err(Error::RoutingFailure);
            };
        }
        Err(Error::RoutingFailure)
    }

    /// Among `from`'s fingers, the live node closest to (but not at)
    /// `key`, scanning from the highest index down. Falls back to `from`
    /// itself if no finger qualifies.
    pub fn closest_preceding_finger(&self, from: Identifier, key: Identifier) -> Result<Identifier> {
        let fingers = self.with_node(from, |n| n.fingers.clone())?;
        for i in (0..fingers.len()).rev() {
            let candidate = fingers[i];
            if candidate == from {
                continue;
            }
            if !self.nodes.contains_key(&candidate) {
                // Stale/dead finger: skip to the next-lower index rather
                // than letting the stall propagate to the caller.
                continue;
            }
            if self.params.in_open_open(candidate, from, key) {
                return Ok(candidate);
            }
        }
        Ok(from)
    }

    /// Store `value` under `key` on node `id`. Caller must have already
    /// established ownership via `find_successor`.
    pub fn local_put(&self, id: Identifier, key: Identifier, value: &[u8]) -> Result<()> {
        let encoded = self.codec.encode(value)?;
        self.with_node_mut(id, |n| {
            n.data.insert(key, encoded);
        })
    }

    /// Fetch and decode the value stored under `key` on node `id`, if any.
    pub fn local_get(&self, id: Identifier, key: Identifier) -> Result<Option<Vec<u8>>> {
        let raw = self.with_node(id, |n| n.data.get(&key).cloned())?;
        match raw {
            Some(bytes) => Ok(Some(self.codec.decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Bump node `id`'s liveness counter.
    pub fn send_heartbeat(&self, id: Identifier) -> Result<()> {
        self.with_node_mut(id, |n| n.metrics.last_heartbeat += 1)
    }

    pub fn cache_store(&self, id: Identifier, key: Identifier, target: Identifier) -> Result<()> {
        self.with_node_mut(id, |n| n.cache_store(key, target))
    }

    pub fn cache_lookup(&self, id: Identifier, key: Identifier) -> Result<Option<Identifier>> {
        self.with_node(id, |n| n.cache_lookup(key))
    }

    /// Read-only introspection snapshot of node `id`.
    pub fn snapshot(&self, id: Identifier) -> Result<NodeSnapshot> {
        self.with_node(id, |n| NodeSnapshot {
            id: n.id,
            successor: n.successor,
            predecessor: n.predecessor,
            fingers: n.fingers.clone(),
            stored_key_count: n.data.len(),
            load: n.data.len() as f64 / self.params.ring_size as f64,
            metrics: n.metrics.clone(),
        })
    }
}

//! Network supervisor: the arena that owns every node and the entry
//! points external callers use (construct, insert/delete, put/get,
//! introspection, health).
//!
//! Nodes live in a [`DashMap`] keyed by [`Identifier`]; each entry is
//! independently guarded by a [`parking_lot::RwLock`]. This is the arena
//! the design notes call for: node fields store `Identifier` handles,
//! never Rust references, so the reference graph between nodes has no
//! ownership cycles, and two different nodes can be operated on
//! concurrently without contention.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{info, instrument};

use crate::codec::{Codec, IdentityCodec};
use crate::error::{Error, Result};
use crate::identifier::{Identifier, RingParams};
use crate::node::NodeState;

/// Aggregate health report, keyed by named check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub checks: BTreeMap<String, bool>,
    pub details: BTreeMap<String, String>,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.checks.values().all(|ok| *ok)
    }
}

/// Supervisor owning every live node in one Chord ring.
pub struct Network {
    pub(crate) params: RingParams,
    pub(crate) nodes: DashMap<Identifier, RwLock<NodeState>>,
    pub(crate) codec: Arc<dyn Codec>,
}

impl Network {
    /// Build a ring with bit-width `m`, seeded from `initial_ids` (first
    /// id becomes the lone seed; the rest join sequentially via it), using
    /// the identity codec.
    #[instrument(skip(initial_ids))]
    pub fn create(m: u32, initial_ids: &[Identifier]) -> Result<Self> {
        Self::with_codec(m, initial_ids, Arc::new(IdentityCodec))
    }

    /// As [`Self::create`], with an injectable [`Codec`].
    pub fn with_codec(m: u32, initial_ids: &[Identifier], codec: Arc<dyn Codec>) -> Result<Self> {
        let params = RingParams::new(m)?;
        if initial_ids.is_empty() {
            return Err(Error::EmptyNetwork);
        }

        let mut seen = HashSet::with_capacity(initial_ids.len());
        for &id in initial_ids {
            if id >= params.ring_size {
                return Err(Error::InvalidNodeId(id));
            }
            if !seen.insert(id) {
                return Err(Error::DuplicateNodeId(id));
            }
        }

        let network = Self {
            params,
            nodes: DashMap::new(),
            codec,
        };

        let seed = initial_ids[0];
        network
            .nodes
            .insert(seed, RwLock::new(NodeState::new(seed, &params)));
        info!(seed, ring_size = params.ring_size, "seeded chord ring");

        for &id in &initial_ids[1..] {
            network.insert_node(id)?;
        }
        Ok(network)
    }

    /// Create a node with `id` and join it via any currently live node.
    /// Rolls the insertion back (a failed join leaves membership
    /// unchanged rather than half-admitting a node) if the join protocol
    /// fails partway through.
    #[instrument(skip(self))]
    pub fn insert_node(&self, id: Identifier) -> Result<()> {
        if id >= self.params.ring_size {
            return Err(Error::InvalidNodeId(id));
        }
        if self.nodes.contains_key(&id) {
            return Err(Error::DuplicateNodeId(id));
        }
        if self.nodes.len() as u64 >= self.params.ring_size {
            return Err(Error::RingFull(self.params.ring_size));
        }

        self.nodes
            .insert(id, RwLock::new(NodeState::new(id, &self.params)));

        if self.nodes.len() == 1 {
            return Ok(()); // first node: lone ring, nothing to join
        }

        let bootstrap = self.any_entry_excluding(id)?;
        if let Err(err) = self.join(id, bootstrap) {
            self.nodes.remove(&id);
            return Err(err);
        }
        info!(id, bootstrap, "node joined ring");
        Ok(())
    }

    /// Gracefully remove `id` from the ring, migrating its data to its
    /// successor. Refuses to remove the last remaining node.
    #[instrument(skip(self))]
    pub fn delete_node(&self, id: Identifier) -> Result<()> {
        if !self.nodes.contains_key(&id) {
            return Err(Error::NodeNotFound(id));
        }
        if self.nodes.len() == 1 {
            return Err(Error::EmptyNetwork);
        }
        self.leave(id)?;
        info!(id, "node left ring");
        Ok(())
    }

    /// Hash `data` to a key, resolve its owner, and store it there.
    /// Returns the derived key.
    pub fn put(&self, data: &[u8]) -> Result<Identifier> {
        let key = self.params.hash(data);
        let entry = self.any_entry()?;
        let owner = self.find_successor(entry, key)?;
        self.local_put(owner, key, data)?;
        Ok(key)
    }

    /// Hash `data` to a key, resolve its owner, and fetch the stored
    /// value. `KeyNotFound` if nothing is stored under that key.
    pub fn get(&self, data: &[u8]) -> Result<Vec<u8>> {
        let key = self.params.hash(data);
        let entry = self.any_entry()?;
        let owner = self.find_successor(entry, key)?;
        self.local_get(owner, key)?.ok_or(Error::KeyNotFound)
    }

    /// All currently live node ids, unordered.
    pub fn node_ids(&self) -> Vec<Identifier> {
        self.nodes.iter().map(|e| *e.key()).collect()
    }

    /// Number of live nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn ring_params(&self) -> RingParams {
        self.params
    }

    /// True iff node `node_id` is the rightful owner of `key`, per
    /// invariant 3: `key` lies in `(predecessor.id, node_id]`. A node
    /// with unknown predecessor is treated as owning the whole ring
    /// (matches a lone node's semantics).
    pub fn owns(&self, node_id: Identifier, key: Identifier) -> Result<bool> {
        self.with_node(node_id, |n| {
            let pred = n.predecessor.unwrap_or(node_id);
            self.params.in_open_closed(key, pred, node_id)
        })
    }

    /// Run one round of stabilize + fix-fingers + backup for every live
    /// node, in id order. A convenience for tests and demos that want to
    /// drive the ring to quiescence deterministically; production callers
    /// would instead schedule these independently and periodically.
    #[instrument(skip(self))]
    pub fn run_stabilization_round(&self) {
        let mut ids = self.node_ids();
        ids.sort_unstable();

        for &id in &ids {
            let _ = self.stabilize(id);
        }
        for &id in &ids {
            for i in 0..self.params.m {
                let _ = self.fix_fingers(id, i);
            }
        }
        for &id in &ids {
            let _ = self.backup_to_successor(id);
        }
    }

    /// Run `rounds` rounds of stabilization. Chord's convergence bound is
    /// logarithmic in ring membership; callers that want a ring at
    /// quiescence for deterministic tests should call this with a few
    /// rounds after every membership change.
    pub fn stabilize_to_quiescence(&self, rounds: usize) {
        for _ in 0..rounds {
            self.run_stabilization_round();
        }
    }

    /// Evaluate the required health checks:
    /// (a) every node's successor is live and points back via predecessor,
    /// (b) `fingers[0] == successor` for every node,
    /// (c) no key is stored by more than one node,
    /// (d) every node's stored keys satisfy the ownership predicate.
    pub fn health_check(&self) -> HealthReport {
        let mut successor_consistent = true;
        let mut finger_zero_matches_successor = true;
        let mut ownership_valid = true;
        let mut key_owners: BTreeMap<Identifier, Vec<Identifier>> = BTreeMap::new();

        for entry in self.nodes.iter() {
            let id = *entry.key();
            let state = entry.value().read();

            if state.successor != id {
                match self.nodes.get(&state.successor) {
                    Some(succ_entry) => {
                        let succ_state = succ_entry.value().read();
                        if succ_state.predecessor != Some(id) {
                            successor_consistent = false;
                        }
                    }
                    None => successor_consistent = false,
                }
            }

            if state.fingers.first().copied() != Some(state.successor) {
                finger_zero_matches_successor = false;
            }

            let pred = state.predecessor.unwrap_or(id);
            for &key in state.data.keys() {
                key_owners.entry(key).or_default().push(id);
                if !self.params.in_open_closed(key, pred, id) {
                    ownership_valid = false;
                }
            }
        }

        let no_duplicate_key_ownership = key_owners.values().all(|owners| owners.len() <= 1);

        let mut checks = BTreeMap::new();
        checks.insert("successor_consistency".to_string(), successor_consistent);
        checks.insert(
            "finger_zero_matches_successor".to_string(),
            finger_zero_matches_successor,
        );
        checks.insert(
            "no_duplicate_key_ownership".to_string(),
            no_duplicate_key_ownership,
        );
        checks.insert("key_ownership_valid".to_string(), ownership_valid);

        let mut details = BTreeMap::new();
        details.insert("node_count".to_string(), self.nodes.len().to_string());
        details.insert("stored_keys".to_string(), key_owners.len().to_string());

        HealthReport { checks, details }
    }

    /// Release all node state. The network is empty (and unusable for
    /// put/get/insert) afterward.
    pub fn cleanup(&self) {
        self.nodes.clear();
    }

    /// Any currently live node id, used as a default entry point for
    /// routing. Arbitrary but deterministic for a given membership since
    /// `DashMap` iteration order is stable between reads between writes.
    fn any_entry(&self) -> Result<Identifier> {
        self.nodes
            .iter()
            .next()
            .map(|e| *e.key())
            .ok_or(Error::EmptyNetwork)
    }

    fn any_entry_excluding(&self, excluded: Identifier) -> Result<Identifier> {
        self.nodes
            .iter()
            .map(|e| *e.key())
            .find(|id| *id != excluded)
            .ok_or(Error::EmptyNetwork)
    }
}

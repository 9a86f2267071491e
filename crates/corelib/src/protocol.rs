//! Routing protocol: join, notify, stabilize, fix-fingers, leave, and
//! recovery from an ungraceful departure. These are the algorithms that
//! keep finger tables and successor/predecessor links correct as ring
//! membership changes.

use tracing::{debug, trace};

use crate::error::Result;
use crate::identifier::Identifier;
use crate::network::Network;
use crate::node::Backup;

impl Network {
    /// Join node `id` into the ring via `bootstrap`.
    ///
    /// 1. `id`'s fingers already point at itself and its predecessor is
    ///    unknown (set at construction).
    /// 2. Ask `bootstrap` to resolve `id`'s successor.
    /// 3. Notify that successor so it considers adopting `id` as its
    ///    predecessor.
    /// 4. Hand off every key the successor held that `id` now owns.
    /// 5. Populate `id`'s finger table once so it can route immediately,
    ///    even if only slowly until further fix-finger rounds tighten it.
    pub(crate) fn join(&self, id: Identifier, bootstrap: Identifier) -> Result<()> {
        let successor = self.find_successor(bootstrap, id)?;
        self.with_node_mut(id, |n| {
            n.successor = successor;
            n.fingers[0] = successor;
        })?;

        // Capture the successor's current predecessor *before* notify
        // overwrites it: that node is the boundary between what the
        // successor keeps and what migrates to the joining node.
        let handoff_boundary = self
            .with_node(successor, |n| n.predecessor)?
            .unwrap_or(successor);

        self.notify(successor, id)?;
        self.migrate_owned_keys(successor, id, handoff_boundary)?;

        for i in 0..self.params.m {
            self.fix_fingers(id, i)?;
        }

        debug!(id, bootstrap, successor, "join complete");
        Ok(())
    }

    /// Move every key in `from`'s data that `to` now owns (i.e. that
    /// falls in `(boundary, to]`) from `from` to `to`.
    fn migrate_owned_keys(
        &self,
        from: Identifier,
        to: Identifier,
        boundary: Identifier,
    ) -> Result<()> {
        let moving: Vec<(Identifier, Vec<u8>)> = self.with_node(from, |n| {
            n.data
                .iter()
                .filter(|(&key, _)| self.params.in_open_closed(key, boundary, to))
                .map(|(&key, value)| (key, value.clone()))
                .collect()
        })?;

        if moving.is_empty() {
            return Ok(());
        }

        self.with_node_mut(from, |n| {
            for (key, _) in &moving {
                n.data.remove(key);
            }
        })?;
        let count = moving.len();
        self.with_node_mut(to, |n| {
            for (key, value) in moving {
                n.data.insert(key, value);
            }
        })?;
        trace!(from, to, count, "migrated keys");
        Ok(())
    }

    /// Move *all* of `from`'s data to `to` unconditionally, used by
    /// graceful leave rather than join's filtered handoff.
    fn migrate_all_keys(&self, from: Identifier, to: Identifier) -> Result<()> {
        let all = self.with_node_mut(from, |n| std::mem::take(&mut n.data))?;
        let count = all.len();
        self.with_node_mut(to, |n| n.data.extend(all))?;
        trace!(from, to, count, "migrated all keys on leave");
        Ok(())
    }

    /// `id.notify(candidate)`: if `id`'s predecessor is unknown, dead
    /// (there is no successor list here, so a predecessor that has
    /// vanished without a graceful leave is indistinguishable from
    /// "unknown" until something tells us otherwise), or `candidate` lies
    /// strictly between the current predecessor and `id`, tighten the
    /// predecessor pointer to `candidate`. This is the sole mechanism by
    /// which a predecessor is set or corrected.
    pub fn notify(&self, id: Identifier, candidate: Identifier) -> Result<()> {
        self.with_node_mut(id, |n| {
            let should_adopt = match n.predecessor {
                None => true,
                Some(pred) if !self.nodes.contains_key(&pred) => true,
                Some(pred) => self.params.in_open_open(candidate, pred, n.id),
            };
            if should_adopt {
                n.predecessor = Some(candidate);
            }
        })
    }

    /// Periodic repair: check whether the successor's predecessor is a
    /// closer successor than the one currently recorded, adopt it if so,
    /// then notify the (possibly new) successor of this node's existence.
    ///
    /// If the recorded successor has vanished (backup-recovered crash,
    /// not a graceful leave), there is no successor list to fall back on,
    /// so the repair falls back to the nearest still-live finger, or to
    /// `id` itself if every finger has gone dark too.
    pub fn stabilize(&self, id: Identifier) -> Result<()> {
        let successor = self.with_node(id, |n| n.successor)?;
        if successor != id && !self.nodes.contains_key(&successor) {
            let fallback = self.with_node(id, |n| {
                n.fingers
                    .iter()
                    .copied()
                    .find(|&f| f != successor && self.nodes.contains_key(&f))
            })?;
            let fallback = fallback.unwrap_or(id);
            self.with_node_mut(id, |n| {
                n.successor = fallback;
                n.fingers[0] = fallback;
            })?;
        }

        let successor = self.with_node(id, |n| n.successor)?;
        let candidate = self
            .with_node(successor, |n| n.predecessor)?
            .filter(|pred| self.nodes.contains_key(pred));

        if let Some(candidate_id) = candidate {
            let current_successor = self.with_node(id, |n| n.successor)?;
            if self.params.in_open_open(candidate_id, id, current_successor) {
                self.with_node_mut(id, |n| {
                    n.successor = candidate_id;
                    n.fingers[0] = candidate_id;
                })?;
            }
        }

        let successor = self.with_node(id, |n| n.successor)?;
        self.notify(successor, id)?;
        Ok(())
    }

    /// Refresh finger table entry `i` by resolving
    /// `find_successor((id + 2^i) mod ring_size)`. Finger 0 is kept equal
    /// to the current successor.
    pub fn fix_fingers(&self, id: Identifier, i: u32) -> Result<()> {
        let start = self.with_node(id, |n| self.params.finger_start(n.id, i))?;
        let successor = self.find_successor(id, start)?;
        self.with_node_mut(id, |n| {
            n.fingers[i as usize] = successor;
            if i == 0 {
                n.successor = successor;
            }
        })
    }

    /// Graceful departure: transfer all data to the successor, splice
    /// the predecessor and successor links together, and remove `id`
    /// from the arena.
    pub(crate) fn leave(&self, id: Identifier) -> Result<()> {
        let (successor, predecessor) = self.with_node(id, |n| (n.successor, n.predecessor))?;

        if successor == id {
            // Lone node: nothing to splice or transfer.
            self.nodes.remove(&id);
            return Ok(());
        }

        self.migrate_all_keys(id, successor)?;

        if let Some(pred) = predecessor {
            self.with_node_mut(pred, |n| {
                n.successor = successor;
                n.fingers[0] = successor;
            })?;
        }
        self.with_node_mut(successor, |n| {
            n.predecessor = predecessor;
        })?;

        self.nodes.remove(&id);
        debug!(id, successor, ?predecessor, "node left gracefully");
        Ok(())
    }

    /// Push a snapshot of `id`'s data to its successor's backup slot, so
    /// the successor can recover that data if `id` disappears without a
    /// graceful leave.
    pub fn backup_to_successor(&self, id: Identifier) -> Result<()> {
        let successor = self.with_node(id, |n| n.successor)?;
        if successor == id {
            return Ok(()); // lone node: no successor to back up onto
        }
        let snapshot = self.with_node(id, |n| Backup {
            predecessor_id: n.id,
            data: n.data.clone(),
        })?;
        self.with_node_mut(successor, |n| n.backup = Some(snapshot))
    }

    /// Simulate node `id` vanishing without a graceful leave (crash,
    /// partition). Removes it from the arena, then restores its data
    /// from whichever surviving node holds a matching backup.
    pub fn simulate_node_failure(&self, id: Identifier) -> Result<()> {
        self.nodes.remove(&id);
        self.recover_from_failure(id)
    }

    /// Find the surviving node whose backup slot was populated by `dead`
    /// and fold that backup's data back into its own store. The
    /// recovering node's predecessor is reset to unknown so the next
    /// stabilize/notify round re-closes the ring around the gap `dead`
    /// left behind.
    fn recover_from_failure(&self, dead: Identifier) -> Result<()> {
        let restorer = self.nodes.iter().find_map(|entry| {
            let state = entry.value().read();
            match &state.backup {
                Some(backup) if backup.predecessor_id == dead => Some(*entry.key()),
                _ => None,
            }
        });

        let Some(restorer) = restorer else {
            // No surviving node had backed up this node's data; nothing
            // to restore (e.g. the dead node never ran backup_to_successor).
            return Ok(());
        };

        self.with_node_mut(restorer, |n| {
            if let Some(backup) = n.backup.take() {
                for (key, value) in backup.data {
                    n.data.entry(key).or_insert(value);
                }
            }
            n.predecessor = None;
        })?;

        debug!(dead, restorer, "recovered data from dead predecessor's backup");
        Ok(())
    }
}

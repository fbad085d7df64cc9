use std::sync::Mutex;

use tracing::{error, info, warn};

use crate::error::{server_err, ServerResult};
use crate::model::client::{ClientSession, ClientState};
use crate::protocol::error_codes::ErrorCode;

struct Inner {
    slots: Vec<Option<ClientSession>>,
    max_clients: usize,
    next_client_id: u32,
    count: usize,
}

/// Fixed-capacity client table, protected by a single mutex.
///
/// Grounded on `original_source/server_src/client_list.c`: a slot array
/// rather than an unbounded map, linear-scan lookups, and defensive repair
/// of duplicate/ghost slots logged as bugs rather than panicked on. The
/// mutex is held only across structural mutation or snapshot copy, never
/// across socket I/O (see spec.md §5).
pub struct ClientRegistry {
    inner: Mutex<Inner>,
}

impl ClientRegistry {
    pub fn new(max_clients: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slots: (0..max_clients).map(|_| None).collect(),
                max_clients,
                next_client_id: 1,
                count: 0,
            }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().expect("client registry mutex poisoned").max_clients
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("client registry mutex poisoned").count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reserve the next monotonic `client_id`. Ids are never reused, even
    /// though slots are reclaimed.
    pub fn next_client_id(&self) -> u32 {
        let mut inner = self.inner.lock().expect("client registry mutex poisoned");
        let id = inner.next_client_id;
        inner.next_client_id += 1;
        id
    }

    /// Insert `session` into a free slot, or reclaim a zombie slot (a
    /// `DisconnectedPending` occupant whose transport has already closed)
    /// if the table is otherwise full.
    pub fn add(&self, session: ClientSession) -> ServerResult<()> {
        let mut inner = self.inner.lock().expect("client registry mutex poisoned");

        if inner.slots.iter().flatten().any(|c| c.client_id == session.client_id) {
            error!(client_id = session.client_id, "BUG: attempted to add a client id already present");
            return Err(server_err!(ErrorCode::InvalidParams, "client_id already registered"));
        }

        if let Some(slot) = inner.slots.iter_mut().find(|s| s.is_none()) {
            info!(client_id = session.client_id, "client added to registry");
            *slot = Some(session);
            inner.count += 1;
            return Ok(());
        }

        let zombie_idx = inner.slots.iter().position(|s| {
            s.as_ref()
                .is_some_and(|c| c.state == ClientState::DisconnectedPending && c.transport.is_closed())
        });

        if let Some(idx) = zombie_idx {
            let zombie = inner.slots[idx].take().expect("position() found Some");
            warn!(
                zombie_client_id = zombie.client_id,
                new_client_id = session.client_id,
                "client registry full, reclaiming a zombie slot"
            );
            inner.slots[idx] = Some(session);
            return Ok(());
        }

        warn!(client_id = session.client_id, "client registry full, rejecting new connection");
        Err(server_err!(ErrorCode::RoomLimit, "server is at client capacity"))
    }

    /// Clear every slot holding `client_id`. Logs (and still clears) if more
    /// than one slot matched — a defensive-repair path, not a panic.
    pub fn remove(&self, client_id: u32) {
        let mut inner = self.inner.lock().expect("client registry mutex poisoned");
        let mut removed = 0;
        for slot in &mut inner.slots {
            if slot.as_ref().is_some_and(|c| c.client_id == client_id) {
                *slot = None;
                removed += 1;
            }
        }
        inner.count = inner.count.saturating_sub(removed);
        match removed {
            0 => warn!(client_id, "client not found in registry during removal"),
            1 => info!(client_id, "client removed from registry"),
            n => error!(client_id, count = n, "BUG: client was present in registry more than once"),
        }
    }

    /// Atomically swap the slot occupied by `old_client_id` for `new_session`.
    /// Reconnection in this crate preserves `client_id` (see
    /// `model::client::ClientSession::inherit_identity_from`), so
    /// `new_session.client_id` usually equals `old_client_id`; the dup-check
    /// below only fires in the defensive case where it doesn't, so it must
    /// not treat old_idx itself as a duplicate to clear.
    pub fn replace(&self, old_client_id: u32, new_session: ClientSession) -> ServerResult<()> {
        let mut inner = self.inner.lock().expect("client registry mutex poisoned");

        let Some(old_idx) = inner.slots.iter().position(|s| s.as_ref().is_some_and(|c| c.client_id == old_client_id)) else {
            warn!(old_client_id, "old client not found for replacement");
            return Err(server_err!(ErrorCode::InvalidParams, "old client_id not found"));
        };

        if new_session.client_id != old_client_id {
            if let Some(dup_idx) = inner
                .slots
                .iter()
                .position(|s| s.as_ref().is_some_and(|c| c.client_id == new_session.client_id))
            {
                warn!(client_id = new_session.client_id, "new session already present before replace, clearing first");
                inner.slots[dup_idx] = None;
                inner.count -= 1;
            }
        }

        info!(old_client_id, new_client_id = new_session.client_id, "client replaced in registry (reconnect)");
        inner.slots[old_idx] = Some(new_session);
        Ok(())
    }

    pub fn find_by_id(&self, client_id: u32) -> Option<ClientSession> {
        let inner = self.inner.lock().expect("client registry mutex poisoned");
        inner.slots.iter().flatten().find(|c| c.client_id == client_id).cloned()
    }

    /// Run `f` against the live record for `client_id` while the registry
    /// lock is held, returning `f`'s result. `f` must not block or perform
    /// I/O: the lock must never be held across a socket operation.
    pub fn mutate<R>(&self, client_id: u32, f: impl FnOnce(&mut ClientSession) -> R) -> Option<R> {
        let mut inner = self.inner.lock().expect("client registry mutex poisoned");
        inner
            .slots
            .iter_mut()
            .flatten()
            .find(|c| c.client_id == client_id)
            .map(f)
    }

    /// Copy out every current member for iteration without holding the lock.
    pub fn get_snapshot(&self) -> Vec<ClientSession> {
        let inner = self.inner.lock().expect("client registry mutex poisoned");
        inner.slots.iter().flatten().cloned().collect()
    }

    /// Drop every record. Called once at the end of the shutdown sequence
    /// (spec.md §4.8), after rooms have been destroyed so nothing still
    /// references a client record this frees.
    pub fn clear(&self) {
        let mut inner = self.inner.lock().expect("client registry mutex poisoned");
        for slot in &mut inner.slots {
            *slot = None;
        }
        inner.count = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::Transport;
    use std::time::Instant;
    use tokio_util::sync::CancellationToken;

    fn fresh_session(id: u32) -> ClientSession {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        ClientSession::new(id, Transport::new(tx, CancellationToken::new()), Instant::now())
    }

    #[test]
    fn add_then_find_round_trips() {
        let reg = ClientRegistry::new(4);
        reg.add(fresh_session(1)).unwrap();
        assert!(reg.find_by_id(1).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn add_rejects_duplicate_ids() {
        let reg = ClientRegistry::new(4);
        reg.add(fresh_session(1)).unwrap();
        assert!(reg.add(fresh_session(1)).is_err());
    }

    #[test]
    fn full_registry_reclaims_zombie_slot() {
        let reg = ClientRegistry::new(1);
        let mut zombie = fresh_session(1);
        zombie.state = ClientState::DisconnectedPending;
        reg.add(zombie).unwrap();
        // drop the zombie's receiver so its transport reports closed
        reg.add(fresh_session(2)).unwrap();
        assert!(reg.find_by_id(2).is_some());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn remove_clears_duplicate_slots() {
        let reg = ClientRegistry::new(4);
        reg.add(fresh_session(1)).unwrap();
        {
            let mut inner = reg.inner.lock().unwrap();
            inner.slots[1] = inner.slots[0].clone();
            inner.count += 1;
        }
        reg.remove(1);
        assert_eq!(reg.len(), 0);
    }

    #[test]
    fn next_client_id_is_monotonic_and_never_reused() {
        let reg = ClientRegistry::new(4);
        let a = reg.next_client_id();
        let b = reg.next_client_id();
        assert!(b > a);
    }

    #[test]
    fn replace_with_same_client_id_does_not_evict_itself() {
        // Reconnection inherits the old client_id, so old and new ids are
        // usually equal; replace must not treat that as a pre-existing
        // duplicate and clear the very slot it's about to overwrite.
        let reg = ClientRegistry::new(4);
        reg.add(fresh_session(3)).unwrap();
        let mut reconnected = fresh_session(3);
        reconnected.nickname = Some("alice".to_string());
        reg.replace(3, reconnected).unwrap();
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.find_by_id(3).unwrap().nickname.as_deref(), Some("alice"));
    }
}

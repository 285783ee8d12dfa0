// Session storage: workspace -> session id -> draft session.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use anyhow::Result;
use snakedraft_core::{DraftSession, SessionId};

/// Where draft sessions live between operations.
///
/// Implementations hold whole sessions as opaque values; the draft engine
/// never calls into a store. Callers serialise writes per session (see
/// `app::SessionLocks`).
pub trait SessionStore: Send + Sync {
    fn get(&self, workspace: &str, id: SessionId) -> Result<Option<DraftSession>>;

    /// Insert or replace a session.
    fn put(&self, workspace: &str, session: &DraftSession) -> Result<()>;

    /// Remove a session. Returns whether it existed.
    fn delete(&self, workspace: &str, id: SessionId) -> Result<bool>;

    /// Sessions in `workspace` owned by `owner`, oldest first.
    fn list_by_owner(&self, workspace: &str, owner: &str) -> Result<Vec<DraftSession>>;

    /// Every session in `workspace`, oldest first.
    fn list_workspace(&self, workspace: &str) -> Result<Vec<DraftSession>>;
}

/// Process-local store for tests and throwaway runs.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<HashMap<String, HashMap<SessionId, DraftSession>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<String, HashMap<SessionId, DraftSession>>> {
        self.sessions.lock().expect("memory store mutex poisoned")
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, workspace: &str, id: SessionId) -> Result<Option<DraftSession>> {
        Ok(self
            .sessions()
            .get(workspace)
            .and_then(|w| w.get(&id))
            .cloned())
    }

    fn put(&self, workspace: &str, session: &DraftSession) -> Result<()> {
        self.sessions()
            .entry(workspace.to_string())
            .or_default()
            .insert(session.id(), session.clone());
        Ok(())
    }

    fn delete(&self, workspace: &str, id: SessionId) -> Result<bool> {
        Ok(self
            .sessions()
            .get_mut(workspace)
            .is_some_and(|w| w.remove(&id).is_some()))
    }

    fn list_by_owner(&self, workspace: &str, owner: &str) -> Result<Vec<DraftSession>> {
        Ok(self
            .list_workspace(workspace)?
            .into_iter()
            .filter(|s| s.is_owner(owner))
            .collect())
    }

    fn list_workspace(&self, workspace: &str) -> Result<Vec<DraftSession>> {
        let mut sessions: Vec<DraftSession> = self
            .sessions()
            .get(workspace)
            .map(|w| w.values().cloned().collect())
            .unwrap_or_default();
        sessions.sort_by_key(|s| (s.created_at(), s.id()));
        Ok(sessions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snakedraft_core::Item;

    fn session(owner: &str, name: &str) -> DraftSession {
        DraftSession::new(owner, name, "C1", 1, vec![Item::new("1", 1)]).unwrap()
    }

    #[test]
    fn put_get_delete() {
        let store = MemoryStore::new();
        let s = session("U1", "One");
        store.put("T1", &s).unwrap();
        assert_eq!(store.get("T1", s.id()).unwrap(), Some(s.clone()));
        assert_eq!(store.get("T2", s.id()).unwrap(), None);
        assert!(store.delete("T1", s.id()).unwrap());
        assert!(!store.delete("T1", s.id()).unwrap());
        assert_eq!(store.get("T1", s.id()).unwrap(), None);
    }

    #[test]
    fn put_replaces() {
        let store = MemoryStore::new();
        let mut s = session("U1", "One");
        store.put("T1", &s).unwrap();
        s.rename("Renamed");
        store.put("T1", &s).unwrap();
        assert_eq!(store.get("T1", s.id()).unwrap().unwrap().name(), "Renamed");
        assert_eq!(store.list_workspace("T1").unwrap().len(), 1);
    }

    #[test]
    fn list_by_owner_filters_within_workspace() {
        let store = MemoryStore::new();
        store.put("T1", &session("U1", "a")).unwrap();
        store.put("T1", &session("U2", "b")).unwrap();
        store.put("T2", &session("U1", "c")).unwrap();
        let mine = store.list_by_owner("T1", "U1").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].name(), "a");
    }
}

//! Session factory and registry. Sessions are handed out behind a mutex so
//! embedding transports serialize operations per session; there is no
//! process-global singleton.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::config::EngineConfig;

use super::Session;

pub type SharedSession = Arc<Mutex<Session>>;

pub struct SessionRegistry {
    sessions: DashMap<String, SharedSession>,
    config: EngineConfig,
}

impl SessionRegistry {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            sessions: DashMap::new(),
            config,
        }
    }

    /// Create a fresh session and register it under its id.
    pub fn create(&self) -> (String, SharedSession) {
        let session = Session::with_config(self.config.clone());
        let id = session.id.clone();
        let shared = Arc::new(Mutex::new(session));
        self.sessions.insert(id.clone(), shared.clone());
        (id, shared)
    }

    pub fn get(&self, id: &str) -> Option<SharedSession> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    pub fn remove(&self, id: &str) -> bool {
        self.sessions.remove(id).is_some()
    }

    pub fn ids(&self) -> Vec<String> {
        self.sessions.iter().map(|e| e.key().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_get_remove() {
        let registry = SessionRegistry::default();
        let (id, _session) = registry.create();
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&id).is_some());
        assert!(registry.remove(&id));
        assert!(registry.get(&id).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn sessions_are_independent() {
        let registry = SessionRegistry::default();
        let (id1, s1) = registry.create();
        let (id2, s2) = registry.create();
        assert_ne!(id1, id2);

        s1.lock().await.load_text("alpha");
        s2.lock().await.load_text("beta\ngamma");

        assert_eq!(s1.lock().await.stats().unwrap().line_count, 1);
        assert_eq!(s2.lock().await.stats().unwrap().line_count, 2);
    }

    #[tokio::test]
    async fn mutex_serializes_turns() {
        let registry = SessionRegistry::default();
        let (_, shared) = registry.create();
        shared.lock().await.load_text("x");

        let mut handles = Vec::new();
        for _ in 0..4 {
            let shared = shared.clone();
            handles.push(tokio::spawn(async move {
                shared.lock().await.execute("(count (list 1 2 3))", None);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(shared.lock().await.bindings()["TURN"], "4");
    }
}

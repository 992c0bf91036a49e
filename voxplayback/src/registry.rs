//! Process-wide session registry
//!
//! All sessions live in one explicit registry keyed by room, with
//! create/get/destroy operations. No global state: embedders construct one
//! registry and pass it around.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::Result;
use crate::session::{Session, SessionDeps};
use crate::types::RoomId;

struct RegistryInner {
    deps: SessionDeps,
    sessions: RwLock<HashMap<RoomId, Session>>,
}

/// One [`Session`] per room, created lazily on first use.
#[derive(Clone)]
pub struct SessionRegistry {
    inner: Arc<RegistryInner>,
}

impl SessionRegistry {
    pub fn new(deps: SessionDeps) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                deps,
                sessions: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// The session for `room`, joining the voice transport if none exists.
    pub async fn get_or_create(&self, room: RoomId) -> Result<Session> {
        {
            let sessions = self.inner.sessions.read().await;
            if let Some(session) = sessions.get(&room) {
                return Ok(session.clone());
            }
        }

        let mut sessions = self.inner.sessions.write().await;
        // Re-check under the write lock; another caller may have won.
        if let Some(session) = sessions.get(&room) {
            return Ok(session.clone());
        }

        let registry = self.clone();
        let session = Session::create(
            room,
            self.inner.deps.clone(),
            Arc::new(move |room| {
                let registry = registry.clone();
                tokio::spawn(async move {
                    registry.forget(room).await;
                });
            }),
        )
        .await?;

        sessions.insert(room, session.clone());
        info!(%room, "session registered");
        Ok(session)
    }

    pub async fn get(&self, room: RoomId) -> Option<Session> {
        self.inner.sessions.read().await.get(&room).cloned()
    }

    pub async fn active_rooms(&self) -> Vec<RoomId> {
        self.inner.sessions.read().await.keys().copied().collect()
    }

    /// Tear down and forget the session for `room`, if any.
    pub async fn destroy(&self, room: RoomId) {
        let session = self.inner.sessions.write().await.remove(&room);
        if let Some(session) = session {
            session.destroy().await;
        }
    }

    /// Drop the handle without tearing down; called from the session's own
    /// teardown hook.
    async fn forget(&self, room: RoomId) {
        if self.inner.sessions.write().await.remove(&room).is_some() {
            debug!(%room, "session unregistered");
        }
    }
}

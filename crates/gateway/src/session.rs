// Gateway Session Management
//
// Tracks connected viewers, the room each one is bound to, and the transport
// group of every room. Outbound messages go through each session's bounded
// queue; the connection task drains it into the socket.

use crate::protocol::ServerMessage;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

/// Match and user a session joined as
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomBinding {
    pub match_id: String,
    pub user_id: String,
}

/// Active gateway session
#[derive(Debug, Clone)]
pub struct GatewaySession {
    /// Session ID
    pub id: String,

    /// Queue drained by the connection task
    pub outbound: mpsc::Sender<ServerMessage>,

    /// Set by a successful join, cleared by leave
    pub binding: Option<RoomBinding>,

    /// Session start timestamp
    pub connected_at: chrono::DateTime<chrono::Utc>,
}

impl GatewaySession {
    pub fn new(outbound: mpsc::Sender<ServerMessage>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            outbound,
            binding: None,
            connected_at: chrono::Utc::now(),
        }
    }
}

/// Gateway session manager
pub struct SessionManager {
    sessions: Arc<RwLock<HashMap<String, GatewaySession>>>,
    /// Match id -> session ids receiving that room's broadcasts
    rooms: Arc<RwLock<HashMap<String, HashSet<String>>>>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            rooms: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn create_session(&self, outbound: mpsc::Sender<ServerMessage>) -> GatewaySession {
        let session = GatewaySession::new(outbound);
        let mut sessions = self.sessions.write().await;
        sessions.insert(session.id.clone(), session.clone());
        session
    }

    pub async fn get_session(&self, id: &str) -> Option<GatewaySession> {
        let sessions = self.sessions.read().await;
        sessions.get(id).cloned()
    }

    pub async fn binding(&self, id: &str) -> Option<RoomBinding> {
        let sessions = self.sessions.read().await;
        sessions.get(id).and_then(|s| s.binding.clone())
    }

    /// Remove the session and its room membership; returns it with its last binding.
    pub async fn remove_session(&self, id: &str) -> Option<GatewaySession> {
        let removed = self.sessions.write().await.remove(id);
        if let Some(binding) = removed.as_ref().and_then(|s| s.binding.as_ref()) {
            self.remove_from_room(&binding.match_id, id).await;
        }
        removed
    }

    /// Bind the session to a room and add it to the room's group.
    /// Returns the previous binding, if any; the caller decides how to leave it.
    pub async fn bind(&self, id: &str, binding: RoomBinding) -> Option<RoomBinding> {
        let match_id = binding.match_id.clone();
        let previous = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.get_mut(id)?;
            session.binding.replace(binding)
        };
        if let Some(previous) = &previous {
            if previous.match_id != match_id {
                self.remove_from_room(&previous.match_id, id).await;
            }
        }
        self.rooms
            .write()
            .await
            .entry(match_id)
            .or_default()
            .insert(id.to_string());
        previous
    }

    /// Drop the session from the room's group and clear its binding if it points there.
    pub async fn unbind(&self, id: &str, match_id: &str) {
        {
            let mut sessions = self.sessions.write().await;
            if let Some(session) = sessions.get_mut(id) {
                if session.binding.as_ref().is_some_and(|b| b.match_id == match_id) {
                    session.binding = None;
                }
            }
        }
        self.remove_from_room(match_id, id).await;
    }

    async fn remove_from_room(&self, match_id: &str, id: &str) {
        let mut rooms = self.rooms.write().await;
        if let Some(members) = rooms.get_mut(match_id) {
            members.remove(id);
            if members.is_empty() {
                rooms.remove(match_id);
            }
        }
    }

    /// Number of sessions in a room's transport group
    pub async fn room_size(&self, match_id: &str) -> usize {
        let rooms = self.rooms.read().await;
        rooms.get(match_id).map_or(0, HashSet::len)
    }

    /// Queue a message for one session. Returns false if it was not delivered.
    pub async fn send_to(&self, id: &str, message: ServerMessage) -> bool {
        let outbound = match self.sessions.read().await.get(id) {
            Some(session) => session.outbound.clone(),
            None => return false,
        };
        deliver(id, &outbound, message)
    }

    /// Queue a message for every session in a room, optionally skipping one.
    /// Returns how many sessions it was queued for.
    pub async fn broadcast(&self, match_id: &str, message: &ServerMessage, except: Option<&str>) -> usize {
        let members: Vec<String> = {
            let rooms = self.rooms.read().await;
            match rooms.get(match_id) {
                Some(members) => members
                    .iter()
                    .filter(|id| Some(id.as_str()) != except)
                    .cloned()
                    .collect(),
                None => return 0,
            }
        };

        let targets: Vec<(String, mpsc::Sender<ServerMessage>)> = {
            let sessions = self.sessions.read().await;
            members
                .into_iter()
                .filter_map(|id| {
                    let outbound = sessions.get(&id)?.outbound.clone();
                    Some((id, outbound))
                })
                .collect()
        };

        targets
            .iter()
            .filter(|(id, outbound)| deliver(id, outbound, message.clone()))
            .count()
    }

    pub async fn count(&self) -> usize {
        let sessions = self.sessions.read().await;
        sessions.len()
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

fn deliver(id: &str, outbound: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> bool {
    match outbound.try_send(message) {
        Ok(()) => true,
        Err(TrySendError::Full(message)) => {
            tracing::warn!(
                "Outbound queue full for session {}, dropping {}",
                id,
                message.event_name()
            );
            false
        }
        Err(TrySendError::Closed(_)) => {
            tracing::debug!("Session {} already closed", id);
            false
        }
    }
}

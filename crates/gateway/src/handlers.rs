// Gateway Match Handlers
//
// Room operations triggered by viewer messages and by simulation notifications.
// Failures are reported to the requesting session only and never broadcast.

use crate::protocol::{ClientMessage, ProtocolError, RoomRequest, ServerMessage};
use crate::session::{RoomBinding, SessionManager};
use matchcast_core::config::{GatewayConfig, PresenceConfig};
use matchcast_core::Notification;
use matchcast_presence::{PresenceError, PresenceStore, RoomRegistry, TypingTracker};
use serde_json::json;
use std::sync::Arc;

const NOT_JOINED: &str = "You must join a match first";

fn presence_failure(message: &str, err: PresenceError) -> ProtocolError {
    ProtocolError::internal(message).with_details(serde_json::Value::String(err.to_string()))
}

pub struct MatchHandlers {
    sessions: Arc<SessionManager>,
    rooms: RoomRegistry,
    typing: TypingTracker,
    max_message_chars: usize,
}

impl MatchHandlers {
    pub fn new(
        sessions: Arc<SessionManager>,
        presence: Arc<dyn PresenceStore>,
        presence_config: &PresenceConfig,
        gateway_config: &GatewayConfig,
    ) -> Self {
        Self {
            sessions,
            rooms: RoomRegistry::new(presence.clone()),
            typing: TypingTracker::new(presence, presence_config),
            max_message_chars: gateway_config.max_message_chars,
        }
    }

    pub fn sessions(&self) -> Arc<SessionManager> {
        Arc::clone(&self.sessions)
    }

    pub fn rooms(&self) -> &RoomRegistry {
        &self.rooms
    }

    /// Handle one inbound text frame, replying with an error on failure
    pub async fn handle_text(&self, session_id: &str, text: &str) {
        tracing::debug!("Received message from {}: {}", session_id, text);
        let result = match ClientMessage::parse(text) {
            Ok(message) => self.dispatch(session_id, message).await,
            Err(err) => Err(err),
        };
        if let Err(err) = result {
            tracing::warn!("Rejected message from session {}: {}", session_id, err);
            self.sessions
                .send_to(session_id, ServerMessage::Error(err))
                .await;
        }
    }

    pub async fn dispatch(&self, session_id: &str, message: ClientMessage) -> Result<(), ProtocolError> {
        match message {
            ClientMessage::JoinMatch(request) => self.join(session_id, request).await,
            ClientMessage::LeaveMatch(request) => self.leave(session_id, request).await,
            ClientMessage::SendMessage { message } => self.chat(session_id, message).await,
            ClientMessage::Typing { is_typing } => self.set_typing(session_id, is_typing).await,
        }
    }

    pub async fn join(&self, session_id: &str, request: RoomRequest) -> Result<(), ProtocolError> {
        let RoomRequest { match_id, user_id } = request;
        let binding = RoomBinding {
            match_id: match_id.clone(),
            user_id: user_id.clone(),
        };

        if self.sessions.get_session(session_id).await.is_none() {
            return Err(ProtocolError::internal("Unknown session"));
        }
        if let Some(previous) = self.sessions.bind(session_id, binding.clone()).await {
            if previous != binding {
                self.leave_room(session_id, &previous).await;
            }
        }
        tracing::info!("Session {} joined room match:{}", session_id, match_id);

        let count = self
            .rooms
            .join(&match_id, &user_id, session_id)
            .await
            .map_err(|e| presence_failure("Failed to join match", e))?;
        tracing::info!("User {} joined room {}. Total active: {}", user_id, match_id, count);

        self.sessions
            .broadcast(
                &match_id,
                &ServerMessage::UserCountUpdate {
                    match_id: match_id.clone(),
                    count,
                },
                None,
            )
            .await;
        self.sessions
            .broadcast(
                &match_id,
                &ServerMessage::UserJoined {
                    user_id: user_id.clone(),
                },
                None,
            )
            .await;
        self.sessions
            .send_to(
                session_id,
                ServerMessage::Joined {
                    match_id,
                    user_id,
                    count,
                },
            )
            .await;
        Ok(())
    }

    /// Leave the room this session joined. A session that is not in the
    /// requested room has nothing to leave.
    pub async fn leave(&self, session_id: &str, request: RoomRequest) -> Result<(), ProtocolError> {
        let binding = match self.sessions.binding(session_id).await {
            Some(binding) if binding.match_id == request.match_id => binding,
            _ => {
                tracing::debug!(
                    "Session {} is not in match {}, nothing to leave",
                    session_id,
                    request.match_id
                );
                return Ok(());
            }
        };
        if binding.user_id != request.user_id {
            return Err(
                ProtocolError::invalid_request("userId does not match the joined user").with_details(
                    json!({ "received": { "matchId": request.match_id, "userId": request.user_id } }),
                ),
            );
        }

        self.sessions.unbind(session_id, &binding.match_id).await;
        self.leave_presence(session_id, &binding)
            .await
            .map_err(|e| presence_failure("Failed to leave match", e))
    }

    /// Transport-level disconnect: the same cleanup as an explicit leave
    pub async fn disconnect(&self, session_id: &str) {
        let Some(session) = self.sessions.remove_session(session_id).await else {
            return;
        };
        if let Some(binding) = session.binding {
            if let Err(err) = self.leave_presence(session_id, &binding).await {
                tracing::error!("Presence cleanup failed for session {}: {}", session_id, err);
            }
        }
    }

    async fn leave_room(&self, session_id: &str, binding: &RoomBinding) {
        if let Err(err) = self.leave_presence(session_id, binding).await {
            tracing::error!(
                "Failed to leave room {} for session {}: {}",
                binding.match_id,
                session_id,
                err
            );
        }
    }

    async fn leave_presence(&self, session_id: &str, binding: &RoomBinding) -> Result<(), PresenceError> {
        let RoomBinding { match_id, user_id } = binding;
        let count = self.rooms.leave(match_id, user_id, session_id).await?;
        // A user whose last session left stops typing
        if !self.rooms.active_users(match_id).await?.contains(user_id) {
            self.typing.set_typing(match_id, user_id, false).await?;
        }
        tracing::info!("User {} left room {}. Total active: {}", user_id, match_id, count);

        self.sessions
            .broadcast(
                match_id,
                &ServerMessage::UserCountUpdate {
                    match_id: match_id.clone(),
                    count,
                },
                None,
            )
            .await;
        self.sessions
            .broadcast(
                match_id,
                &ServerMessage::UserLeft {
                    user_id: user_id.clone(),
                },
                None,
            )
            .await;
        Ok(())
    }

    pub async fn chat(&self, session_id: &str, message: String) -> Result<(), ProtocolError> {
        let binding = self
            .sessions
            .binding(session_id)
            .await
            .ok_or_else(|| ProtocolError::invalid_request(NOT_JOINED))?;

        if message.is_empty() {
            return Err(ProtocolError::invalid_request("Message cannot be empty"));
        }
        if message.chars().count() > self.max_message_chars {
            return Err(ProtocolError::invalid_request(format!(
                "Message too long (max {} chars)",
                self.max_message_chars
            )));
        }

        tracing::info!("Message from user {} in match {}", binding.user_id, binding.match_id);
        self.sessions
            .broadcast(
                &binding.match_id,
                &ServerMessage::ChatMessage {
                    user_id: binding.user_id,
                    message,
                    timestamp: chrono::Utc::now(),
                },
                None,
            )
            .await;
        Ok(())
    }

    pub async fn set_typing(&self, session_id: &str, is_typing: bool) -> Result<(), ProtocolError> {
        let binding = self
            .sessions
            .binding(session_id)
            .await
            .ok_or_else(|| ProtocolError::invalid_request(NOT_JOINED))?;

        self.typing
            .set_typing(&binding.match_id, &binding.user_id, is_typing)
            .await
            .map_err(|e| presence_failure("Failed to update typing status", e))?;
        let users = self
            .typing
            .typing_users(&binding.match_id)
            .await
            .map_err(|e| presence_failure("Failed to update typing status", e))?;

        self.sessions
            .broadcast(
                &binding.match_id,
                &ServerMessage::TypingUpdate {
                    match_id: binding.match_id.clone(),
                    users,
                },
                Some(session_id),
            )
            .await;
        Ok(())
    }

    /// Forward a simulation notification to the match's room
    pub async fn on_notification(&self, notification: Notification) {
        let match_id = notification.match_id().to_string();
        if match_id.is_empty() {
            tracing::debug!("Dropping notification without a match reference");
            return;
        }
        let message = match notification {
            Notification::MatchUpdated(m) => ServerMessage::MatchUpdated(m),
            Notification::MatchEvent(event) => ServerMessage::NewEvent(event),
        };
        let delivered = self.sessions.broadcast(&match_id, &message, None).await;
        tracing::debug!(
            "Forwarded {} for match {} to {} sessions",
            message.event_name(),
            match_id,
            delivered
        );
    }
}

use crate::handlers::MatchHandlers;
use crate::protocol::ServerMessage;
use crate::session::SessionManager;
use anyhow::{Context, Result};
use futures_util::{sink::SinkExt, stream::StreamExt};
use matchcast_core::config::GatewayConfig;
use matchcast_core::{Notification, NotificationBus};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;

/// Gateway server
pub struct GatewayServer {
    config: GatewayConfig,
    handlers: Arc<MatchHandlers>,
    bus: NotificationBus,
}

impl GatewayServer {
    pub fn new(config: GatewayConfig, handlers: Arc<MatchHandlers>, bus: NotificationBus) -> Self {
        Self {
            config,
            handlers,
            bus,
        }
    }

    /// Get handlers reference
    pub fn handlers(&self) -> Arc<MatchHandlers> {
        self.handlers.clone()
    }

    /// Bind the configured address and serve until shutdown
    pub async fn start(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("Failed to bind {}", addr))?;
        self.serve(listener, shutdown).await
    }

    /// Accept connections on `listener` until `shutdown` flips to true
    pub async fn serve(self, listener: TcpListener, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let listener_task = spawn_notification_listener(self.bus.subscribe(), self.handlers.clone());
        tracing::info!("Gateway server listening on {}", listener.local_addr()?);

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, addr)) => {
                            let handlers = self.handlers.clone();
                            let buffer = self.config.outbound_buffer;
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, addr.to_string(), handlers, buffer).await {
                                    tracing::error!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => tracing::warn!("Failed to accept connection: {}", e),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        listener_task.abort();
        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

/// Forward simulation notifications to match rooms
fn spawn_notification_listener(
    mut notifications: broadcast::Receiver<Notification>,
    handlers: Arc<MatchHandlers>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Match notification listener started");
        loop {
            match notifications.recv().await {
                Ok(notification) => handlers.on_notification(notification).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("Notification receiver lagged, skipped {} notifications", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Notification channel closed");
                    break;
                }
            }
        }
    })
}

// Handle a WebSocket connection
async fn handle_connection(
    stream: TcpStream,
    addr: String,
    handlers: Arc<MatchHandlers>,
    buffer: usize,
) -> Result<()> {
    // Upgrade to WebSocket
    let ws_stream = tokio_tungstenite::accept_async(stream)
        .await
        .context("WebSocket handshake failed")?;

    let sessions: Arc<SessionManager> = handlers.sessions();
    let (outbound_tx, mut outbound_rx) = mpsc::channel::<ServerMessage>(buffer.max(1));
    let session = sessions.create_session(outbound_tx).await;
    tracing::info!("Client connected: {} ({})", session.id, addr);

    let (mut ws_sender, mut ws_receiver) = ws_stream.split::<Message>();
    let result = connection_loop(&session.id, &handlers, &mut ws_sender, &mut ws_receiver, &mut outbound_rx).await;

    handlers.disconnect(&session.id).await;
    tracing::info!("Client disconnected: {}", session.id);
    result
}

async fn connection_loop<S, R>(
    session_id: &str,
    handlers: &MatchHandlers,
    ws_sender: &mut S,
    ws_receiver: &mut R,
    outbound_rx: &mut mpsc::Receiver<ServerMessage>,
) -> Result<()>
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin,
    R: futures_util::Stream<Item = std::result::Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        tokio::select! {
            // Handle incoming WebSocket messages
            msg_result = ws_receiver.next() => {
                match msg_result {
                    Some(Ok(msg)) => {
                        if msg.is_text() {
                            let text = msg.to_text()?;
                            handlers.handle_text(session_id, text).await;
                        } else if msg.is_close() {
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }

            // Drain this session's outbound queue
            outbound = outbound_rx.recv() => {
                match outbound {
                    Some(message) => {
                        let text = message.to_text()?;
                        ws_sender.send(Message::Text(text.into())).await?;
                    }
                    None => break,
                }
            }
        }
    }
    Ok(())
}

//! Connection handlers for the syncpad server.
//!
//! This module handles the connection lifecycle, realtime frame dispatch,
//! and the administrative document API.

use crate::config::Config;
use crate::metrics::{self, ConnectionMetricsGuard};
use anyhow::Result;
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{delete, get},
    Json, Router,
};
use bytes::BytesMut;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use syncpad_core::{validate_document_id, AutosaveCoordinator, Registry, RegistryConfig, RegistryError};
use syncpad_protocol::{codec, codes, Frame, PROTOCOL_VERSION};
use syncpad_store::{DocumentStore, StoreError};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};

/// Shared server state.
pub struct AppState {
    /// Session registry and relay.
    pub registry: Registry,
    /// Autosave coordinator.
    pub autosave: Arc<AutosaveCoordinator>,
    /// Durable document storage.
    pub store: DocumentStore,
    /// Server configuration.
    pub config: Config,
}

impl AppState {
    /// Create new app state, opening the document store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    pub fn new(config: Config) -> Result<Self> {
        let store = DocumentStore::open(&config.storage.path)?;

        let registry_config = RegistryConfig {
            max_rooms: config.limits.max_rooms,
            room_capacity: 131072,
            prune_empty_rooms: true,
        };

        let autosave = Arc::new(AutosaveCoordinator::with_interval(
            store.clone(),
            config.autosave.flush_interval(),
        ));

        Ok(Self {
            registry: Registry::with_config(store.clone(), registry_config),
            autosave,
            store,
            config,
        })
    }
}

/// Run the HTTP/WebSocket server.
///
/// # Errors
///
/// Returns an error if the server fails to start.
pub async fn run_server(config: Config) -> Result<()> {
    let state = Arc::new(AppState::new(config.clone())?);

    // Start metrics server if enabled
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    // Background snapshot flushing
    let autosave_task = state.autosave.spawn();

    // Build router
    let app = Router::new()
        .route(&config.transport.websocket_path, get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/documents", get(list_documents).post(create_document))
        .route("/api/documents/:id", delete(delete_document))
        .with_state(state.clone());

    // Bind and serve
    let addr = config.bind_addr()?;
    let listener = TcpListener::bind(addr).await?;

    info!("syncpad server listening on {}", addr);
    info!(
        "WebSocket endpoint: ws://{}{}",
        addr, config.transport.websocket_path
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Flush the newest snapshots before exit.
    autosave_task.abort();
    state.autosave.flush().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received");
}

/// Health check handler.
async fn health_handler() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// List all document ids.
async fn list_documents(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.list().await {
        Ok(ids) => Json(ids).into_response(),
        Err(e) => {
            error!("Failed to list documents: {}", e);
            metrics::record_error("store");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to list documents").into_response()
        }
    }
}

/// Request body for document creation.
#[derive(Debug, Deserialize)]
struct CreateDocument {
    id: String,
}

/// Create a new document with empty content.
async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateDocument>,
) -> impl IntoResponse {
    if let Err(reason) = validate_document_id(&req.id) {
        return (StatusCode::BAD_REQUEST, reason).into_response();
    }

    match state.store.create(&req.id).await {
        Ok(()) => (StatusCode::CREATED, "Document created").into_response(),
        Err(StoreError::AlreadyExists(_)) => {
            (StatusCode::BAD_REQUEST, "Document already exists").into_response()
        }
        Err(e) => {
            error!(document = %req.id, "Failed to create document: {}", e);
            metrics::record_error("store");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to create document").into_response()
        }
    }
}

/// Delete a document. A missing id is treated as success.
async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match state.store.delete(&id).await {
        Ok(_) => (StatusCode::OK, "Document deleted").into_response(),
        Err(e) => {
            error!(document = %id, "Failed to delete document: {}", e);
            metrics::record_error("store");
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete document").into_response()
        }
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_websocket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_websocket(socket: WebSocket, state: Arc<AppState>) {
    // Record connection metrics
    let _metrics_guard = ConnectionMetricsGuard::new();

    // Generate connection ID
    let connection_id = format!(
        "conn_{}",
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_nanos()
    );

    debug!(connection = %connection_id, "WebSocket connected");

    // Split the WebSocket
    let (mut sender, mut receiver) = socket.split();

    // Send Connected frame
    let connected_frame = Frame::connected(
        &connection_id,
        PROTOCOL_VERSION.major,
        state.config.heartbeat.interval_ms as u32,
    );
    if let Ok(data) = codec::encode(&connected_frame) {
        if sender.send(Message::Binary(data.to_vec())).await.is_err() {
            error!(connection = %connection_id, "Failed to send Connected frame");
            return;
        }
    }

    // Read buffer for partial frames
    let mut read_buffer = BytesMut::with_capacity(4096);

    // Forwarder task for the currently open room (at most one; replaced on
    // every successful open)
    let mut forward_task: Option<tokio::task::JoinHandle<()>> = None;

    // Relayed edits arrive here from the forwarder
    let (edit_tx, mut edit_rx) = mpsc::unbounded_channel::<Arc<syncpad_core::EditMessage>>();

    // Message processing loop
    loop {
        tokio::select! {
            biased;

            // Receive edits relayed from the open room (via mpsc)
            Some(msg) = edit_rx.recv() => {
                // Forward the edit to the WebSocket client
                let frame = Frame::Edit {
                    payload: msg.payload.to_vec(),
                };
                if let Ok(data) = codec::encode(&frame) {
                    metrics::record_message(data.len(), "outbound");
                    if sender.send(Message::Binary(data.to_vec())).await.is_err() {
                        break;
                    }
                }
            }

            // Receive from WebSocket
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => {
                        let start = Instant::now();
                        read_buffer.extend_from_slice(&data);

                        // Try to decode frames
                        loop {
                            match codec::decode_from(&mut read_buffer) {
                                Ok(Some(frame)) => {
                                    metrics::record_message(data.len(), "inbound");

                                    if let Err(e) = handle_frame(
                                        &frame,
                                        &connection_id,
                                        &state,
                                        &mut sender,
                                        &mut forward_task,
                                        &edit_tx,
                                    ).await {
                                        error!(connection = %connection_id, error = %e, "Frame handling error");
                                        break;
                                    }
                                }
                                Ok(None) => break,
                                Err(e) => {
                                    // Malformed input degrades this connection
                                    // only; report it and drop the buffer so
                                    // later frames start clean.
                                    warn!(connection = %connection_id, error = %e, "Protocol violation");
                                    metrics::record_error("protocol");
                                    let _ = send_frame(
                                        &mut sender,
                                        &Frame::error(0, codes::BAD_FRAME, e.to_string()),
                                    )
                                    .await;
                                    read_buffer.clear();
                                    break;
                                }
                            }
                        }

                        metrics::record_latency(start.elapsed().as_secs_f64());
                    }
                    Some(Ok(Message::Text(text))) => {
                        // Treat text as binary
                        read_buffer.extend_from_slice(text.as_bytes());
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Pong(_))) => {
                        // Ignore pongs
                    }
                    Some(Ok(Message::Close(_))) => {
                        debug!(connection = %connection_id, "Received close frame");
                        break;
                    }
                    Some(Err(e)) => {
                        warn!(connection = %connection_id, error = %e, "WebSocket error");
                        metrics::record_error("websocket");
                        break;
                    }
                    None => {
                        debug!(connection = %connection_id, "WebSocket stream ended");
                        break;
                    }
                }
            }
        }
    }

    // Cleanup: stop forwarding edits to this connection
    if let Some(handle) = forward_task.take() {
        handle.abort();
    }

    // Cleanup: leave the current room, if any
    state.registry.leave(&connection_id);
    metrics::set_active_rooms(state.registry.stats().room_count);

    debug!(connection = %connection_id, "WebSocket disconnected");
}

/// Handle a decoded frame.
async fn handle_frame(
    frame: &Frame,
    connection_id: &str,
    state: &Arc<AppState>,
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    forward_task: &mut Option<tokio::task::JoinHandle<()>>,
    edit_tx: &mpsc::UnboundedSender<Arc<syncpad_core::EditMessage>>,
) -> Result<()> {
    match frame {
        Frame::Open { id, document } => {
            debug!(connection = %connection_id, document = %document, "Open request");

            match state.registry.join(connection_id, document).await {
                Ok(joined) => {
                    // Replace any forwarder from a previously open document;
                    // this is what stops delivery from the old room.
                    if let Some(handle) = forward_task.take() {
                        handle.abort();
                    }

                    let tx = edit_tx.clone();
                    let own_id = connection_id.to_string();
                    let mut rx = joined.receiver;
                    *forward_task = Some(tokio::spawn(async move {
                        loop {
                            match rx.recv().await {
                                Ok(msg) => {
                                    // Never echo a connection's own edits back
                                    if msg.source == own_id {
                                        continue;
                                    }
                                    if tx.send(msg).is_err() {
                                        break; // Receiver dropped
                                    }
                                }
                                Err(broadcast::error::RecvError::Closed) => break,
                                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                            }
                        }
                    }));

                    metrics::record_join();
                    metrics::set_active_rooms(state.registry.stats().room_count);

                    // Content goes only to the requesting connection
                    send_frame(sender, &Frame::document(document.clone(), joined.content)).await?;
                }
                Err(e) => {
                    warn!(connection = %connection_id, document = %document, error = %e, "Open failed");
                    let code = match &e {
                        RegistryError::InvalidDocumentId(_) => codes::INVALID_DOCUMENT,
                        RegistryError::Store(_) => codes::STORE_FAILED,
                        _ => codes::BAD_FRAME,
                    };
                    // The connection survives in a degraded state
                    send_frame(sender, &Frame::error(*id, code, e.to_string())).await?;
                }
            }
        }

        Frame::Edit { payload } => {
            match state.registry.current_document(connection_id) {
                Some(document) => {
                    let count =
                        state
                            .registry
                            .broadcast_edit(&document, connection_id, payload.clone());
                    metrics::record_message(payload.len(), "relay");
                    debug!(
                        connection = %connection_id,
                        document = %document,
                        receivers = count,
                        "Relayed edit"
                    );
                }
                None => {
                    warn!(connection = %connection_id, "Edit without an open document");
                    send_frame(
                        sender,
                        &Frame::error(0, codes::NOT_JOINED, "No open document"),
                    )
                    .await?;
                }
            }
        }

        Frame::Save { content } => {
            match state.registry.current_document(connection_id) {
                Some(document) => {
                    state.autosave.submit(document, content.clone());
                    metrics::record_save();
                }
                None => {
                    warn!(connection = %connection_id, "Save without an open document");
                    send_frame(
                        sender,
                        &Frame::error(0, codes::NOT_JOINED, "No open document"),
                    )
                    .await?;
                }
            }
        }

        Frame::Ping { timestamp } => {
            send_frame(sender, &Frame::pong(*timestamp)).await?;
        }

        Frame::Pong { .. } => {
            // Ignore
        }

        Frame::Connect { version, token } => {
            debug!(
                connection = %connection_id,
                version = version,
                has_token = token.is_some(),
                "Connect frame (already connected)"
            );
            // Connection already established, ignore
        }

        _ => {
            warn!(connection = %connection_id, frame_type = ?frame.frame_type(), "Unexpected frame type");
        }
    }

    Ok(())
}

/// Send a frame to the WebSocket.
async fn send_frame(
    sender: &mut futures_util::stream::SplitSink<WebSocket, Message>,
    frame: &Frame,
) -> Result<()> {
    let data = codec::encode(frame)?;
    metrics::record_message(data.len(), "outbound");
    sender.send(Message::Binary(data.to_vec())).await?;
    Ok(())
}

//! `WebSocket {prefix}/ws?token=…` (spec.md §6): server pushes
//! `{type, data}` JSON text frames; client may send `"ping"` and gets back
//! `{"type":"pong"}`; bad auth closes with code 4003.

use std::sync::Arc;

use actix_web::{web, Error, HttpRequest, HttpResponse};
use actix_ws::{CloseCode, CloseReason, Message};
use dashmap::DashMap;
use futures::StreamExt;
use serde::Deserialize;
use uuid::Uuid;

use crate::events::{DomainEvent, EventSink};

use super::AppState;

/// Fans a published `DomainEvent` out to every connected client, dropping
/// any session whose send fails (client gone) rather than failing the
/// publish for the others.
pub struct WsBroadcaster {
    sessions: DashMap<Uuid, actix_ws::Session>,
}

impl WsBroadcaster {
    pub fn new() -> Self {
        Self { sessions: DashMap::new() }
    }

    fn register(&self, id: Uuid, session: actix_ws::Session) {
        self.sessions.insert(id, session);
    }

    fn remove(&self, id: Uuid) {
        self.sessions.remove(&id);
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for WsBroadcaster {
    fn publish(&self, event: DomainEvent) {
        let Ok(text) = serde_json::to_string(&event) else { return };
        let ids: Vec<Uuid> = self.sessions.iter().map(|e| *e.key()).collect();
        for id in ids {
            if let Some(mut entry) = self.sessions.get_mut(&id) {
                let mut session = entry.value().clone();
                let text = text.clone();
                tokio::spawn(async move {
                    session.text(text).await
                });
            }
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct WsQuery {
    token: Option<String>,
}

fn token_valid(token: Option<&str>, settings: &crate::config::Settings) -> bool {
    if settings.auth_disabled() {
        return true;
    }
    match token {
        Some(t) if t == settings.api_key => true,
        Some(t) => {
            let key = jsonwebtoken::DecodingKey::from_secret(settings.secret_key.as_bytes());
            jsonwebtoken::decode::<serde_json::Value>(t, &key, &jsonwebtoken::Validation::default()).is_ok()
        }
        None => false,
    }
}

pub async fn handshake(
    req: HttpRequest,
    stream: web::Payload,
    query: web::Query<WsQuery>,
    state: web::Data<AppState>,
    broadcaster: web::Data<Arc<WsBroadcaster>>,
) -> Result<HttpResponse, Error> {
    let (response, mut session, mut msg_stream) = actix_ws::handle(&req, stream)?;

    let authorized = token_valid(query.token.as_deref(), &state.settings);
    let connection_id = Uuid::new_v4();

    if !authorized {
        let mut closing = session.clone();
        actix_web::rt::spawn(async move {
            let _ = closing
                .close(Some(CloseReason {
                    code: CloseCode::Other(4003),
                    description: Some("bad auth".into()),
                }))
                .await;
        });
        return Ok(response);
    }

    broadcaster.register(connection_id, session.clone());

    actix_web::rt::spawn(async move {
        while let Some(Ok(msg)) = msg_stream.next().await {
            match msg {
                Message::Text(text) => {
                    if text.trim() == "ping" {
                        if session.text(r#"{"type":"pong"}"#).await.is_err() {
                            break;
                        }
                    }
                }
                Message::Ping(bytes) => {
                    if session.pong(&bytes).await.is_err() {
                        break;
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        broadcaster.remove(connection_id);
        let _ = session.close(None).await;
    });

    Ok(response)
}

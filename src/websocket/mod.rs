//! WebSocket hub for live prices and wallet change notices

use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, RwLock};
use uuid::Uuid;

use crate::auth::AuthService;
use crate::ledger::TransactionKind;
use crate::middleware::{auth::authenticate, OptionalUser};

const CHANNEL_CAPACITY: usize = 256;

/// Events fanned out to connected clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event")]
pub enum HubEvent {
    PriceTick {
        coin_id: Uuid,
        asset_id: String,
        price_usd: Decimal,
        change_percent_24h: Option<Decimal>,
    },
    WalletUpdated {
        user_id: Uuid,
        kind: TransactionKind,
        balance_after: Decimal,
        version: i64,
    },
}

impl HubEvent {
    /// Subscriptions filter price ticks; an empty list means every coin.
    /// A tick matches on either its coin uuid or its asset id. Wallet updates
    /// only reach connections authenticated as the wallet's owner.
    fn visible_to(&self, client: &ClientInfo) -> bool {
        match self {
            HubEvent::PriceTick {
                coin_id, asset_id, ..
            } => {
                client.subscribed_coins.is_empty()
                    || client
                        .subscribed_coins
                        .iter()
                        .any(|s| s == asset_id || *s == coin_id.to_string())
            }
            HubEvent::WalletUpdated { user_id, .. } => client.user_id == Some(*user_id),
        }
    }
}

/// WebSocket server state
#[derive(Clone)]
pub struct WsState {
    tx: broadcast::Sender<HubEvent>,
    clients: Arc<RwLock<HashMap<String, ClientInfo>>>,
}

/// Client connection information
#[derive(Debug, Clone, Default)]
struct ClientInfo {
    user_id: Option<Uuid>,
    subscribed_coins: Vec<String>,
}

/// Browsers cannot set headers on an upgrade, so the token may ride in the query
#[derive(Debug, Deserialize)]
pub struct WsParams {
    token: Option<String>,
}

/// Client message types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClientMessage {
    Subscribe { coin_ids: Vec<String> },
    Unsubscribe { coin_ids: Vec<String> },
    Ping,
}

/// Server message types
#[derive(Debug, Serialize)]
#[serde(tag = "type")]
enum ServerMessage {
    Event { event: HubEvent },
    Subscribed { coin_ids: Vec<String> },
    Unsubscribed { coin_ids: Vec<String> },
    Pong,
    Error { message: String },
}

impl Default for WsState {
    fn default() -> Self {
        Self::new()
    }
}

impl WsState {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            tx,
            clients: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Broadcast to every connected client. Returns how many receivers got it.
    pub fn broadcast_event(&self, event: HubEvent) -> usize {
        match self.tx.send(event) {
            Ok(n) => n,
            // No connected clients
            Err(_) => 0,
        }
    }

    /// Raw receiver on the event stream
    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.tx.subscribe()
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    async fn register_client(&self, client_id: &str, user_id: Option<Uuid>) {
        let mut clients = self.clients.write().await;
        clients.insert(
            client_id.to_string(),
            ClientInfo {
                user_id,
                ..Default::default()
            },
        );
        tracing::info!(client_id, user_id = ?user_id, "WebSocket client connected");
    }

    async fn unregister_client(&self, client_id: &str) {
        let mut clients = self.clients.write().await;
        clients.remove(client_id);
        tracing::info!(client_id, "WebSocket client disconnected");
    }

    async fn subscribe_coins(&self, client_id: &str, coin_ids: &[String]) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            for id in coin_ids {
                if !client.subscribed_coins.contains(id) {
                    client.subscribed_coins.push(id.clone());
                }
            }
        }
    }

    async fn unsubscribe_coins(&self, client_id: &str, coin_ids: &[String]) {
        let mut clients = self.clients.write().await;
        if let Some(client) = clients.get_mut(client_id) {
            client.subscribed_coins.retain(|id| !coin_ids.contains(id));
        }
    }

    async fn wants(&self, client_id: &str, event: &HubEvent) -> bool {
        let clients = self.clients.read().await;
        clients
            .get(client_id)
            .map_or(false, |c| event.visible_to(c))
    }
}

/// WebSocket handler - upgrades HTTP connection to WebSocket.
///
/// Anonymous connections get price ticks. A bearer header or `?token=` binds
/// the connection to a user so it also receives that user's wallet updates;
/// a token that fails verification refuses the upgrade.
pub async fn ws_handler(
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    State(state): State<WsState>,
    State(auth_service): State<Arc<AuthService>>,
    OptionalUser(header_user): OptionalUser,
    Query(params): Query<WsParams>,
) -> Result<Response, Response> {
    let user_id = match (header_user, params.token) {
        (Some(user), _) => Some(user.user_id),
        (None, Some(token)) => Some(authenticate(&token, &auth_service).await?.user_id),
        (None, None) => None,
    };
    let ws = ws.map_err(IntoResponse::into_response)?;

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, user_id)))
}

async fn handle_socket(socket: WebSocket, state: WsState, user_id: Option<Uuid>) {
    let client_id = Uuid::new_v4().to_string();
    state.register_client(&client_id, user_id).await;

    let (mut sender, mut receiver) = socket.split();

    // Replies produced by the receive side (acks, pongs, errors)
    let (internal_tx, mut internal_rx) = mpsc::channel::<ServerMessage>(32);

    let mut rx = state.tx.subscribe();
    let send_state = state.clone();
    let send_client_id = client_id.clone();

    let mut send_task = tokio::spawn(async move {
        loop {
            let msg = tokio::select! {
                event = rx.recv() => match event {
                    Ok(event) => {
                        if !send_state.wants(&send_client_id, &event).await {
                            continue;
                        }
                        ServerMessage::Event { event }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(client_id = %send_client_id, skipped, "WebSocket client lagging");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
                Some(msg) = internal_rx.recv() => msg,
                else => break,
            };

            match serde_json::to_string(&msg) {
                Ok(text) => {
                    if sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                Err(e) => tracing::error!("Failed to encode WebSocket message: {}", e),
            }
        }
    });

    let recv_state = state.clone();
    let recv_client_id = client_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            let text = match msg {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let reply = match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::Subscribe { coin_ids }) => {
                    recv_state.subscribe_coins(&recv_client_id, &coin_ids).await;
                    tracing::debug!(client_id = %recv_client_id, ?coin_ids, "Subscribed");
                    ServerMessage::Subscribed { coin_ids }
                }
                Ok(ClientMessage::Unsubscribe { coin_ids }) => {
                    recv_state
                        .unsubscribe_coins(&recv_client_id, &coin_ids)
                        .await;
                    tracing::debug!(client_id = %recv_client_id, ?coin_ids, "Unsubscribed");
                    ServerMessage::Unsubscribed { coin_ids }
                }
                Ok(ClientMessage::Ping) => ServerMessage::Pong,
                Err(e) => ServerMessage::Error {
                    message: format!("Unrecognised message: {}", e),
                },
            };

            if internal_tx.send(reply).await.is_err() {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => recv_task.abort(),
        _ = (&mut recv_task) => send_task.abort(),
    }

    state.unregister_client(&client_id).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn tick(asset_id: &str) -> (Uuid, HubEvent) {
        let coin_id = Uuid::new_v4();
        (
            coin_id,
            HubEvent::PriceTick {
                coin_id,
                asset_id: asset_id.to_string(),
                price_usd: dec!(100),
                change_percent_24h: None,
            },
        )
    }

    fn wallet_update(user_id: Uuid) -> HubEvent {
        HubEvent::WalletUpdated {
            user_id,
            kind: TransactionKind::Deposit,
            balance_after: dec!(10.00),
            version: 1,
        }
    }

    fn client(user_id: Option<Uuid>, coins: &[&str]) -> ClientInfo {
        ClientInfo {
            user_id,
            subscribed_coins: coins.iter().map(|c| c.to_string()).collect(),
        }
    }

    #[test]
    fn test_price_tick_filtering() {
        let (coin_id, event) = tick("bitcoin");

        assert!(event.visible_to(&client(None, &[])));
        assert!(event.visible_to(&client(None, &["bitcoin"])));
        assert!(event.visible_to(&client(None, &[&coin_id.to_string()])));
        assert!(!event.visible_to(&client(None, &["ethereum"])));
    }

    #[test]
    fn test_wallet_updates_reach_only_their_owner() {
        let owner = Uuid::new_v4();
        let event = wallet_update(owner);

        assert!(event.visible_to(&client(Some(owner), &["ethereum"])));
        assert!(!event.visible_to(&client(Some(Uuid::new_v4()), &[])));
        assert!(!event.visible_to(&client(None, &[])));
    }

    #[test]
    fn test_client_message_parsing() {
        let msg: ClientMessage =
            serde_json::from_str(r#"{"type":"Subscribe","coin_ids":["bitcoin"]}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Subscribe { coin_ids } if coin_ids == ["bitcoin"]));

        let msg: ClientMessage = serde_json::from_str(r#"{"type":"Ping"}"#).unwrap();
        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_server_message_shape() {
        let (_, event) = tick("bitcoin");
        let json = serde_json::to_value(ServerMessage::Event { event }).unwrap();
        assert_eq!(json["type"], "Event");
        assert_eq!(json["event"]["event"], "PriceTick");
        assert_eq!(json["event"]["asset_id"], "bitcoin");
    }

    #[tokio::test]
    async fn test_subscription_bookkeeping() {
        let state = WsState::new();
        state.register_client("c1", None).await;

        let (_, btc) = tick("bitcoin");
        let (_, eth) = tick("ethereum");

        state.subscribe_coins("c1", &["bitcoin".to_string()]).await;
        assert!(state.wants("c1", &btc).await);
        assert!(!state.wants("c1", &eth).await);

        state.unsubscribe_coins("c1", &["bitcoin".to_string()]).await;
        assert!(state.wants("c1", &eth).await);

        state.unregister_client("c1").await;
        assert_eq!(state.client_count().await, 0);
        assert!(!state.wants("c1", &btc).await);
    }

    #[tokio::test]
    async fn test_wallet_update_routing_between_clients() {
        let state = WsState::new();
        let alice = Uuid::new_v4();
        state.register_client("alice", Some(alice)).await;
        state.register_client("anon", None).await;

        let event = wallet_update(alice);
        assert!(state.wants("alice", &event).await);
        assert!(!state.wants("anon", &event).await);
    }

    #[tokio::test]
    async fn test_broadcast_without_clients_is_harmless() {
        let state = WsState::new();
        let (_, event) = tick("bitcoin");
        assert_eq!(state.broadcast_event(event.clone()), 0);

        let mut rx = state.subscribe();
        assert_eq!(state.broadcast_event(event.clone()), 1);
        assert_eq!(rx.recv().await.unwrap(), event);
    }
}

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, delete, get},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};

pub const NODE: &str = "rabbit@mock";
pub const MANAGEMENT_VERSION: &str = "3.12.0";

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Vhost {
    pub name: String,
    pub tracing: bool,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Queue {
    pub name: String,
    pub vhost: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub arguments: Map<String, Value>,
    pub node: String,
    pub messages: u64,
    pub messages_ready: u64,
    pub messages_unacknowledged: u64,
    pub consumers: u64,
    pub memory: u64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Exchange {
    pub name: String,
    pub vhost: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub durable: bool,
    pub auto_delete: bool,
    pub internal: bool,
    pub arguments: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct DeclareQueue {
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Deserialize)]
pub struct DeclareExchange {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub durable: bool,
    #[serde(default)]
    pub auto_delete: bool,
    #[serde(default)]
    pub internal: bool,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

#[derive(Clone, Debug, Default)]
struct VhostState {
    tracing: bool,
    queues: BTreeMap<String, Queue>,
    exchanges: BTreeMap<String, Exchange>,
}

/// In-memory broker state behind the mock management API.
#[derive(Clone, Debug)]
pub struct Broker {
    users: Vec<(String, String)>,
    vhosts: BTreeMap<String, VhostState>,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    /// A fresh broker: user `guest`/`guest` and the default vhost `/`.
    pub fn new() -> Self {
        let mut broker = Self {
            users: vec![("guest".to_string(), "guest".to_string())],
            vhosts: BTreeMap::new(),
        };
        broker.add_vhost("/");
        broker
    }

    pub fn add_user(mut self, name: &str, password: &str) -> Self {
        self.users.push((name.to_string(), password.to_string()));
        self
    }

    /// Create `name` with the standard set of exchanges. No-op if it exists.
    pub fn add_vhost(&mut self, name: &str) -> bool {
        if self.vhosts.contains_key(name) {
            return false;
        }
        let mut state = VhostState::default();
        for (exchange, kind) in [
            ("", "direct"),
            ("amq.direct", "direct"),
            ("amq.fanout", "fanout"),
            ("amq.headers", "headers"),
            ("amq.topic", "topic"),
        ] {
            state.exchanges.insert(
                exchange.to_string(),
                Exchange {
                    name: exchange.to_string(),
                    vhost: name.to_string(),
                    kind: kind.to_string(),
                    durable: true,
                    auto_delete: false,
                    internal: false,
                    arguments: Map::new(),
                },
            );
        }
        self.vhosts.insert(name.to_string(), state);
        true
    }

    /// Declare a durable queue holding `messages` ready messages.
    pub fn with_queue(mut self, vhost: &str, name: &str, messages: u64) -> Self {
        self.add_vhost(vhost);
        if let Some(state) = self.vhosts.get_mut(vhost) {
            let mut queue = new_queue(vhost, name, true, false, Map::new());
            queue.messages = messages;
            queue.messages_ready = messages;
            state.queues.insert(name.to_string(), queue);
        }
        self
    }

    fn authenticate(&self, user: &str, password: &str) -> bool {
        self.users.iter().any(|(u, p)| u == user && p == password)
    }

    fn queues(&self) -> impl Iterator<Item = &Queue> {
        self.vhosts.values().flat_map(|v| v.queues.values())
    }
}

fn new_queue(vhost: &str, name: &str, durable: bool, auto_delete: bool, arguments: Map<String, Value>) -> Queue {
    Queue {
        name: name.to_string(),
        vhost: vhost.to_string(),
        durable,
        auto_delete,
        arguments,
        node: NODE.to_string(),
        messages: 0,
        messages_ready: 0,
        messages_unacknowledged: 0,
        consumers: 0,
        memory: 12248,
    }
}

pub type Db = Arc<RwLock<Broker>>;

pub fn app() -> Router {
    app_with(Broker::new())
}

pub fn app_with(broker: Broker) -> Router {
    let db: Db = Arc::new(RwLock::new(broker));
    Router::new()
        .route("/api/overview", get(overview))
        .route("/api/vhosts", get(list_vhosts))
        .route(
            "/api/vhosts/{vhost}",
            get(get_vhost).put(put_vhost).delete(delete_vhost),
        )
        .route("/api/aliveness-test/{vhost}", get(aliveness_test))
        .route("/api/queues", get(list_queues))
        .route("/api/queues/{vhost}", get(list_vhost_queues))
        .route(
            "/api/queues/{vhost}/{name}",
            get(get_queue).put(put_queue).delete(delete_queue),
        )
        .route("/api/queues/{vhost}/{name}/contents", delete(purge_queue))
        .route("/api/exchanges", get(list_exchanges))
        .route("/api/exchanges/{vhost}", get(list_vhost_exchanges))
        .route(
            "/api/exchanges/{vhost}/{name}",
            get(get_exchange).put(put_exchange).delete(delete_exchange),
        )
        .route("/api/bindings", get(list_bindings))
        .route("/api/bindings/{vhost}", get(list_vhost_bindings))
        .route("/api/users", get(list_users))
        .route("/api/connections", get(list_connections))
        .route("/api/permissions", get(list_permissions))
        .route_layer(middleware::from_fn_with_state(db.clone(), require_auth))
        .route("/broken/{*rest}", any(broken))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, broker: Broker) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(broker)).await
}

type ApiError = (StatusCode, Json<Value>);
type ApiResult<T> = Result<T, ApiError>;

fn not_found() -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": "Object Not Found", "reason": "Not Found"})),
    )
}

/// Decode an `Authorization: Basic ...` header value into user and password.
pub fn decode_basic(value: &str) -> Option<(String, String)> {
    let token = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(token).ok()?).ok()?;
    let (user, password) = decoded.split_once(':')?;
    Some((user.to_string(), password.to_string()))
}

async fn require_auth(State(db): State<Db>, request: Request, next: Next) -> Response {
    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(decode_basic);
    let authorized = match credentials {
        Some((user, password)) => db.read().await.authenticate(&user, &password),
        None => false,
    };
    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"RabbitMQ Management\"")],
            Json(json!({"error": "not_authorised", "reason": "Login failed"})),
        )
            .into_response();
    }
    next.run(request).await
}

async fn broken() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn overview(State(db): State<Db>) -> Json<Value> {
    let broker = db.read().await;
    let messages: u64 = broker.queues().map(|q| q.messages).sum();
    let exchanges: usize = broker.vhosts.values().map(|v| v.exchanges.len()).sum();
    Json(json!({
        "management_version": MANAGEMENT_VERSION,
        "rabbitmq_version": MANAGEMENT_VERSION,
        "cluster_name": NODE,
        "node": NODE,
        "statistics_db_node": NODE,
        "statistics_level": "fine",
        "queue_totals": {
            "messages": messages,
            "messages_ready": messages,
            "messages_unacknowledged": 0
        },
        "object_totals": {
            "queues": broker.queues().count(),
            "exchanges": exchanges,
            "connections": 0,
            "channels": 0,
            "consumers": 0
        },
        "listeners": [{"node": NODE, "protocol": "amqp", "ip_address": "::", "port": 5672}],
        "message_stats": {}
    }))
}

// --- vhosts ---

async fn list_vhosts(State(db): State<Db>) -> Json<Vec<Vhost>> {
    let broker = db.read().await;
    Json(
        broker
            .vhosts
            .iter()
            .map(|(name, state)| Vhost {
                name: name.clone(),
                tracing: state.tracing,
            })
            .collect(),
    )
}

async fn get_vhost(State(db): State<Db>, Path(vhost): Path<String>) -> ApiResult<Json<Vhost>> {
    let broker = db.read().await;
    let state = broker.vhosts.get(&vhost).ok_or_else(not_found)?;
    Ok(Json(Vhost {
        name: vhost,
        tracing: state.tracing,
    }))
}

async fn put_vhost(State(db): State<Db>, Path(vhost): Path<String>) -> StatusCode {
    if db.write().await.add_vhost(&vhost) {
        StatusCode::CREATED
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn delete_vhost(State(db): State<Db>, Path(vhost): Path<String>) -> ApiResult<StatusCode> {
    let mut broker = db.write().await;
    broker
        .vhosts
        .remove(&vhost)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}

async fn aliveness_test(State(db): State<Db>, Path(vhost): Path<String>) -> ApiResult<Json<Value>> {
    let broker = db.read().await;
    broker.vhosts.get(&vhost).ok_or_else(not_found)?;
    Ok(Json(json!({"status": "ok"})))
}

// --- queues ---

async fn list_queues(State(db): State<Db>) -> Json<Vec<Queue>> {
    let broker = db.read().await;
    Json(broker.queues().cloned().collect())
}

async fn list_vhost_queues(State(db): State<Db>, Path(vhost): Path<String>) -> ApiResult<Json<Vec<Queue>>> {
    let broker = db.read().await;
    let state = broker.vhosts.get(&vhost).ok_or_else(not_found)?;
    Ok(Json(state.queues.values().cloned().collect()))
}

async fn get_queue(
    State(db): State<Db>,
    Path((vhost, name)): Path<(String, String)>,
) -> ApiResult<Json<Queue>> {
    let broker = db.read().await;
    broker
        .vhosts
        .get(&vhost)
        .and_then(|v| v.queues.get(&name))
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

async fn put_queue(
    State(db): State<Db>,
    Path((vhost, name)): Path<(String, String)>,
    Json(input): Json<DeclareQueue>,
) -> ApiResult<StatusCode> {
    let mut broker = db.write().await;
    let state = broker.vhosts.get_mut(&vhost).ok_or_else(not_found)?;
    if state.queues.contains_key(&name) {
        return Ok(StatusCode::NO_CONTENT);
    }
    let queue = new_queue(&vhost, &name, input.durable, input.auto_delete, input.arguments);
    state.queues.insert(name, queue);
    Ok(StatusCode::CREATED)
}

async fn delete_queue(
    State(db): State<Db>,
    Path((vhost, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let mut broker = db.write().await;
    broker
        .vhosts
        .get_mut(&vhost)
        .and_then(|v| v.queues.remove(&name))
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}

async fn purge_queue(
    State(db): State<Db>,
    Path((vhost, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let mut broker = db.write().await;
    let queue = broker
        .vhosts
        .get_mut(&vhost)
        .and_then(|v| v.queues.get_mut(&name))
        .ok_or_else(not_found)?;
    queue.messages = queue.messages_unacknowledged;
    queue.messages_ready = 0;
    Ok(StatusCode::NO_CONTENT)
}

// --- exchanges ---

async fn list_exchanges(State(db): State<Db>) -> Json<Vec<Exchange>> {
    let broker = db.read().await;
    Json(
        broker
            .vhosts
            .values()
            .flat_map(|v| v.exchanges.values().cloned())
            .collect(),
    )
}

async fn list_vhost_exchanges(
    State(db): State<Db>,
    Path(vhost): Path<String>,
) -> ApiResult<Json<Vec<Exchange>>> {
    let broker = db.read().await;
    let state = broker.vhosts.get(&vhost).ok_or_else(not_found)?;
    Ok(Json(state.exchanges.values().cloned().collect()))
}

async fn get_exchange(
    State(db): State<Db>,
    Path((vhost, name)): Path<(String, String)>,
) -> ApiResult<Json<Exchange>> {
    let broker = db.read().await;
    broker
        .vhosts
        .get(&vhost)
        .and_then(|v| v.exchanges.get(&name))
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}

async fn put_exchange(
    State(db): State<Db>,
    Path((vhost, name)): Path<(String, String)>,
    Json(input): Json<DeclareExchange>,
) -> ApiResult<StatusCode> {
    let mut broker = db.write().await;
    let state = broker.vhosts.get_mut(&vhost).ok_or_else(not_found)?;
    if state.exchanges.contains_key(&name) {
        return Ok(StatusCode::NO_CONTENT);
    }
    let exchange = Exchange {
        name: name.clone(),
        vhost,
        kind: input.kind,
        durable: input.durable,
        auto_delete: input.auto_delete,
        internal: input.internal,
        arguments: input.arguments,
    };
    state.exchanges.insert(name, exchange);
    Ok(StatusCode::CREATED)
}

async fn delete_exchange(
    State(db): State<Db>,
    Path((vhost, name)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    let mut broker = db.write().await;
    broker
        .vhosts
        .get_mut(&vhost)
        .and_then(|v| v.exchanges.remove(&name))
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(not_found)
}

// --- bindings, users, connections, permissions ---

/// Every queue is bound to the default exchange under its own name.
fn default_binding(queue: &Queue) -> Value {
    json!({
        "source": "",
        "vhost": queue.vhost,
        "destination": queue.name,
        "destination_type": "queue",
        "routing_key": queue.name,
        "arguments": {},
        "properties_key": queue.name
    })
}

async fn list_bindings(State(db): State<Db>) -> Json<Vec<Value>> {
    let broker = db.read().await;
    Json(broker.queues().map(default_binding).collect())
}

async fn list_vhost_bindings(State(db): State<Db>, Path(vhost): Path<String>) -> ApiResult<Json<Vec<Value>>> {
    let broker = db.read().await;
    let state = broker.vhosts.get(&vhost).ok_or_else(not_found)?;
    Ok(Json(state.queues.values().map(default_binding).collect()))
}

async fn list_users(State(db): State<Db>) -> Json<Vec<Value>> {
    let broker = db.read().await;
    Json(
        broker
            .users
            .iter()
            .map(|(name, _)| json!({"name": name, "tags": "administrator"}))
            .collect(),
    )
}

async fn list_connections() -> Json<Vec<Value>> {
    Json(Vec::new())
}

async fn list_permissions(State(db): State<Db>) -> Json<Vec<Value>> {
    let broker = db.read().await;
    let mut permissions = Vec::new();
    for (user, _) in &broker.users {
        for vhost in broker.vhosts.keys() {
            permissions.push(json!({
                "user": user,
                "vhost": vhost,
                "configure": ".*",
                "write": ".*",
                "read": ".*"
            }));
        }
    }
    Json(permissions)
}

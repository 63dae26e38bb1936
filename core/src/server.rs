//! Convenience façade over `HttpClient` returning typed records.
//!
//! # Design
//! `Server` snapshots the broker overview once at construction and never
//! refreshes it. Collections come back as `Vhost` / `Queue` / `Exchange`
//! values rather than raw records; anything not covered here is reachable
//! through `client()`.

use tracing::info;

use crate::client::HttpClient;
use crate::error::Result;
use crate::transport::{Transport, UreqTransport};
use crate::types::{from_record, Exchange, Overview, Queue, Record, Vhost};

/// One broker, identified by its overview snapshot.
#[derive(Debug, Clone)]
pub struct Server<T = UreqTransport> {
    /// The host exactly as given at construction.
    pub host: String,
    /// Overview taken at construction.
    pub overview: Overview,
    client: HttpClient<T>,
}

impl Server<UreqTransport> {
    /// Connect to `host` and fetch its overview. Fails if the broker is
    /// unreachable or rejects the request.
    pub fn new(host: &str, username: &str, password: &str) -> Result<Self> {
        Self::from_client(HttpClient::new(host, username, password))
    }
}

impl<T: Transport> Server<T> {
    pub fn from_client(client: HttpClient<T>) -> Result<Self> {
        let overview: Overview = from_record(client.get_overview()?)?;
        info!(
            host = client.host(),
            node = overview.node.as_deref().unwrap_or("unknown"),
            "connected to broker"
        );
        Ok(Self {
            host: client.host().to_string(),
            overview,
            client,
        })
    }

    pub fn client(&self) -> &HttpClient<T> {
        &self.client
    }

    pub fn node(&self) -> Option<&str> {
        self.overview.node.as_deref()
    }

    pub fn management_version(&self) -> Option<&str> {
        self.overview.management_version.as_deref()
    }

    pub fn is_alive(&self, vhost: &str) -> Result<bool> {
        self.client.is_alive(vhost)
    }

    pub fn get_all_vhosts(&self) -> Result<Vec<Vhost>> {
        typed(self.client.get_all_vhosts()?)
    }

    pub fn get_queues(&self, vhost: Option<&str>) -> Result<Vec<Queue>> {
        typed(self.client.get_queues(vhost)?)
    }

    pub fn get_exchanges(&self, vhost: Option<&str>) -> Result<Vec<Exchange>> {
        typed(self.client.get_exchanges(vhost)?)
    }
}

fn typed<D: serde::de::DeserializeOwned>(records: Vec<Record>) -> Result<Vec<D>> {
    records.into_iter().map(from_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::DEFAULT_VHOST;
    use crate::error::Error;
    use crate::http::Credentials;
    use crate::testing::CannedTransport;

    const OVERVIEW: &str = r#"{"node": "bar", "management_version": "2.4.1", "queue_totals": "rrrr",
        "listeners": "ssss", "statistics_db_node": "tttt", "message_stats": "uuuu",
        "statistics_level": "vvvv"}"#;

    fn server(transport: CannedTransport) -> Result<Server<CannedTransport>> {
        let client = HttpClient::with_transport(
            "localhost:55672",
            &Credentials::new("guest", "guest"),
            transport,
        );
        Server::from_client(client)
    }

    fn broker() -> CannedTransport {
        CannedTransport::new().reply("/api/overview", 200, OVERVIEW)
    }

    #[test]
    fn init_copies_overview_and_host() {
        let srv = server(broker()).unwrap();
        assert_eq!(srv.host, "localhost:55672");
        assert_eq!(srv.node(), Some("bar"));
        assert_eq!(srv.management_version(), Some("2.4.1"));

        let snapshot = serde_json::to_value(&srv.overview).unwrap();
        let expected: serde_json::Value = serde_json::from_str(OVERVIEW).unwrap();
        assert_eq!(snapshot, expected);
    }

    #[test]
    fn init_fails_when_overview_fails() {
        let err = server(CannedTransport::new().reply("/api/overview", 500, "")).unwrap_err();
        assert!(matches!(err, Error::Http { status: 500, .. }));

        let err = server(CannedTransport::new().unreachable()).unwrap_err();
        assert!(err.is_network());
    }

    #[test]
    fn is_alive_default_vhost() {
        let srv = server(broker().reply("/api/aliveness-test/%2F", 200, r#"{"status":"ok"}"#)).unwrap();
        assert!(srv.is_alive(DEFAULT_VHOST).unwrap());
    }

    #[test]
    fn get_all_vhosts_returns_named_records() {
        let srv = server(broker().reply("/api/vhosts", 200, r#"[{"name":"/"}]"#)).unwrap();
        let vhosts = srv.get_all_vhosts().unwrap();
        assert_eq!(vhosts.len(), 1);
        assert_eq!(vhosts[0].name, "/");
    }

    #[test]
    fn get_queues_preserves_broker_fields() {
        let body = r#"[{"memory":12248,"messages":0,"name":"testq","vhost":"/","durable":true,
            "auto_delete":false,"arguments":{},"idle_since":"2011-5-27 15:17:35",
            "backing_queue_status":{"q1":0,"avg_ingress_rate":0.0}}]"#;
        let srv = server(broker().reply("/api/queues", 200, body)).unwrap();
        let queues = srv.get_queues(None).unwrap();
        assert_eq!(queues.len(), 1);
        let q = &queues[0];
        assert_eq!(q.name, "testq");
        assert_eq!(q.memory, Some(12248));
        assert_eq!(q.durable, Some(true));
        assert_eq!(q.property("idle_since").and_then(|v| v.as_str()), Some("2011-5-27 15:17:35"));

        let raw: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(serde_json::to_value(&queues).unwrap(), raw);
    }

    #[test]
    fn get_exchanges_for_vhost() {
        let body = r#"[{"name":"","vhost":"v","type":"direct"},{"name":"amq.fanout","vhost":"v","type":"fanout"}]"#;
        let srv = server(broker().reply("/api/exchanges/v", 200, body)).unwrap();
        let kinds: Vec<_> = srv
            .get_exchanges(Some("v"))
            .unwrap()
            .into_iter()
            .map(|x| x.kind.unwrap_or_default())
            .collect();
        assert_eq!(kinds, ["direct", "fanout"]);
    }

    #[test]
    fn record_without_name_is_rejected() {
        let srv = server(broker().reply("/api/vhosts", 200, r#"[{"tracing":false}]"#)).unwrap();
        let err = srv.get_all_vhosts().unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }

    #[test]
    fn null_queue_fields_pass_through() {
        let body = r#"[{"name":"q","node":null,"messages":null}]"#;
        let srv = server(broker().reply("/api/queues", 200, body)).unwrap();
        let queues = srv.get_queues(None).unwrap();
        assert_eq!(queues[0].node, None);

        let raw: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(serde_json::to_value(&queues).unwrap(), raw);
    }

    #[test]
    fn one_odd_record_does_not_fail_the_listing() {
        let body = r#"[{"name":"good"},{"name":"odd","arguments":[]}]"#;
        let srv = server(broker().reply("/api/queues", 200, body)).unwrap();

        assert_eq!(srv.client().get_queues(None).unwrap().len(), 2);
        let queues = srv.get_queues(None).unwrap();
        assert_eq!(queues.len(), 2);
        assert_eq!(queues[1].arguments, None);
        assert_eq!(queues[1].property("arguments"), Some(&serde_json::json!([])));

        let raw: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(serde_json::to_value(&queues).unwrap(), raw);
    }

    #[test]
    fn mistyped_exchange_and_vhost_fields_pass_through() {
        let srv = server(
            broker()
                .reply("/api/exchanges", 200, r#"[{"name":"x","durable":"true","type":7}]"#)
                .reply("/api/vhosts", 200, r#"[{"name":"/","tracing":null}]"#),
        )
        .unwrap();

        let exchanges = srv.get_exchanges(None).unwrap();
        assert_eq!(exchanges[0].kind, None);
        assert_eq!(exchanges[0].property("type"), Some(&serde_json::json!(7)));
        assert_eq!(exchanges[0].property("durable"), Some(&serde_json::json!("true")));

        let vhosts = srv.get_all_vhosts().unwrap();
        assert_eq!(
            serde_json::to_value(&vhosts).unwrap(),
            serde_json::json!([{"name": "/", "tracing": null}])
        );
    }

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn default_client_and_server_are_send_sync() {
        assert_send_sync::<HttpClient>();
        assert_send_sync::<Server>();
    }
}

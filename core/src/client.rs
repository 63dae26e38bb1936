//! Blocking client for the management API.
//!
//! # Design
//! `HttpClient` pairs a `ManagementApi` (pure request building and status
//! mapping) with a `Transport` (the single I/O seam). Every method is one
//! round-trip and returns the decoded JSON as-is: objects come back as
//! `Record`, collections as `Vec<Record>` in broker order.

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::api::{ManagementApi, Scope};
use crate::error::Result;
use crate::http::{Credentials, HttpRequest};
use crate::transport::{Transport, UreqTransport};
use crate::types::{ExchangeOptions, QueueOptions, Record};

/// The broker's default virtual host.
pub const DEFAULT_VHOST: &str = "/";

#[derive(Deserialize)]
struct AlivenessStatus {
    status: String,
}

/// Synchronous client for one broker's management API.
#[derive(Debug, Clone)]
pub struct HttpClient<T = UreqTransport> {
    host: String,
    api: ManagementApi,
    transport: T,
}

impl HttpClient<UreqTransport> {
    /// Client for `host` (`host:port`, optionally followed by a path prefix).
    pub fn new(host: &str, username: &str, password: &str) -> Self {
        Self::with_transport(host, &Credentials::new(username, password), UreqTransport::new())
    }
}

impl<T: Transport> HttpClient<T> {
    pub fn with_transport(host: &str, credentials: &Credentials, transport: T) -> Self {
        Self {
            host: host.to_string(),
            api: ManagementApi::new(host, credentials),
            transport,
        }
    }

    /// The host exactly as given at construction.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn api(&self) -> &ManagementApi {
        &self.api
    }

    /// Run the broker's aliveness test for `vhost`.
    ///
    /// Returns `true` only when the broker reports status `ok`. A vhost that
    /// does not exist yields `Error::NotFound`.
    pub fn is_alive(&self, vhost: &str) -> Result<bool> {
        let status: AlivenessStatus = self.fetch(self.api.build_aliveness_test(vhost), Scope::Vhost(vhost))?;
        Ok(status.status == "ok")
    }

    pub fn get_overview(&self) -> Result<Record> {
        self.fetch(self.api.build_overview(), Scope::Broker)
    }

    pub fn get_all_vhosts(&self) -> Result<Vec<Record>> {
        self.fetch(self.api.build_vhosts(), Scope::Broker)
    }

    pub fn get_vhost(&self, vhost: &str) -> Result<Record> {
        self.fetch(self.api.build_vhost(vhost), Scope::Vhost(vhost))
    }

    pub fn create_vhost(&self, vhost: &str) -> Result<()> {
        self.send(self.api.build_create_vhost(vhost), Scope::Broker)
    }

    pub fn delete_vhost(&self, vhost: &str) -> Result<()> {
        self.send(self.api.build_delete_vhost(vhost), Scope::Vhost(vhost))
    }

    /// Queues in `vhost`, or across the broker when `None`.
    pub fn get_queues(&self, vhost: Option<&str>) -> Result<Vec<Record>> {
        self.fetch(self.api.build_queues(vhost), scope_of(vhost))
    }

    pub fn get_queue(&self, vhost: &str, name: &str) -> Result<Record> {
        self.fetch(self.api.build_queue(vhost, name), queue_scope(vhost, name))
    }

    pub fn create_queue(&self, vhost: &str, name: &str, options: &QueueOptions) -> Result<()> {
        let request = self.api.build_create_queue(vhost, name, options)?;
        self.send(request, Scope::Vhost(vhost))
    }

    pub fn delete_queue(&self, vhost: &str, name: &str) -> Result<()> {
        self.send(self.api.build_delete_queue(vhost, name), queue_scope(vhost, name))
    }

    /// Drop every ready message in the queue.
    pub fn purge_queue(&self, vhost: &str, name: &str) -> Result<()> {
        self.send(self.api.build_purge_queue(vhost, name), queue_scope(vhost, name))
    }

    /// Exchanges in `vhost`, or across the broker when `None`.
    pub fn get_exchanges(&self, vhost: Option<&str>) -> Result<Vec<Record>> {
        self.fetch(self.api.build_exchanges(vhost), scope_of(vhost))
    }

    pub fn get_exchange(&self, vhost: &str, name: &str) -> Result<Record> {
        self.fetch(self.api.build_exchange(vhost, name), exchange_scope(vhost, name))
    }

    pub fn create_exchange(&self, vhost: &str, name: &str, options: &ExchangeOptions) -> Result<()> {
        let request = self.api.build_create_exchange(vhost, name, options)?;
        self.send(request, Scope::Vhost(vhost))
    }

    pub fn delete_exchange(&self, vhost: &str, name: &str) -> Result<()> {
        self.send(self.api.build_delete_exchange(vhost, name), exchange_scope(vhost, name))
    }

    pub fn get_bindings(&self, vhost: Option<&str>) -> Result<Vec<Record>> {
        self.fetch(self.api.build_bindings(vhost), scope_of(vhost))
    }

    pub fn get_users(&self) -> Result<Vec<Record>> {
        self.fetch(self.api.build_users(), Scope::Broker)
    }

    pub fn get_connections(&self) -> Result<Vec<Record>> {
        self.fetch(self.api.build_connections(), Scope::Broker)
    }

    pub fn get_permissions(&self) -> Result<Vec<Record>> {
        self.fetch(self.api.build_permissions(), Scope::Broker)
    }

    fn fetch<D: DeserializeOwned>(&self, request: HttpRequest, scope: Scope<'_>) -> Result<D> {
        let response = self.transport.execute(&request)?;
        self.api.parse_json(response, scope)
    }

    fn send(&self, request: HttpRequest, scope: Scope<'_>) -> Result<()> {
        let response = self.transport.execute(&request)?;
        self.api.parse_empty(response, scope)
    }
}

fn scope_of(vhost: Option<&str>) -> Scope<'_> {
    vhost.map_or(Scope::Broker, Scope::Vhost)
}

fn queue_scope<'a>(vhost: &'a str, name: &'a str) -> Scope<'a> {
    Scope::Resource {
        kind: "queue",
        name,
        vhost,
    }
}

fn exchange_scope<'a>(vhost: &'a str, name: &'a str) -> Scope<'a> {
    Scope::Resource {
        kind: "exchange",
        name,
        vhost,
    }
}

//! Stateless request builder and response parser for the management API.
//!
//! # Design
//! `ManagementApi` holds only the base URL and the precomputed
//! `authorization` header. Each operation is split into a `build_*` method
//! that produces an `HttpRequest`; responses go through `parse_json` or
//! `parse_empty`, which map status codes onto `Error`. The caller executes
//! the HTTP round-trip in between.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::warn;

use crate::error::{Error, Result};
use crate::http::{Credentials, HttpMethod, HttpRequest, HttpResponse};
use crate::types::{ExchangeOptions, QueueOptions};

/// Everything except RFC 3986 unreserved characters, so `/` becomes `%2F`.
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'.').remove(b'_').remove(b'~');

/// What a request is about, which decides how a 404 is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Broker-wide endpoint; a 404 is an ordinary HTTP error.
    Broker,
    /// Endpoint scoped to a vhost; a 404 means the vhost does not exist.
    Vhost(&'a str),
    /// A named resource inside a vhost.
    Resource {
        kind: &'static str,
        name: &'a str,
        vhost: &'a str,
    },
}

impl Scope<'_> {
    fn not_found(self) -> Option<Error> {
        match self {
            Scope::Broker => None,
            Scope::Vhost(vhost) => Some(Error::NotFound {
                resource: "vhost".to_string(),
                scope: vhost.to_string(),
            }),
            Scope::Resource { kind, name, vhost } => Some(Error::NotFound {
                resource: format!("{kind} '{name}'"),
                scope: vhost.to_string(),
            }),
        }
    }
}

/// Request builder and response parser for one broker.
#[derive(Debug, Clone)]
pub struct ManagementApi {
    base_url: String,
    authorization: String,
}

impl ManagementApi {
    pub fn new(host: &str, credentials: &Credentials) -> Self {
        Self {
            base_url: format!("http://{}/api", host.trim_end_matches('/')),
            authorization: credentials.basic_auth_header(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --- broker ---

    pub fn build_overview(&self) -> HttpRequest {
        self.get("/overview".to_string())
    }

    pub fn build_users(&self) -> HttpRequest {
        self.get("/users".to_string())
    }

    pub fn build_connections(&self) -> HttpRequest {
        self.get("/connections".to_string())
    }

    pub fn build_permissions(&self) -> HttpRequest {
        self.get("/permissions".to_string())
    }

    // --- vhosts ---

    pub fn build_vhosts(&self) -> HttpRequest {
        self.get("/vhosts".to_string())
    }

    pub fn build_vhost(&self, vhost: &str) -> HttpRequest {
        self.get(format!("/vhosts/{}", encode(vhost)))
    }

    pub fn build_create_vhost(&self, vhost: &str) -> HttpRequest {
        self.bare(HttpMethod::Put, format!("/vhosts/{}", encode(vhost)))
    }

    pub fn build_delete_vhost(&self, vhost: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, format!("/vhosts/{}", encode(vhost)))
    }

    pub fn build_aliveness_test(&self, vhost: &str) -> HttpRequest {
        self.get(format!("/aliveness-test/{}", encode(vhost)))
    }

    // --- queues ---

    pub fn build_queues(&self, vhost: Option<&str>) -> HttpRequest {
        self.get(collection("/queues", vhost))
    }

    pub fn build_queue(&self, vhost: &str, name: &str) -> HttpRequest {
        self.get(format!("/queues/{}/{}", encode(vhost), encode(name)))
    }

    pub fn build_create_queue(&self, vhost: &str, name: &str, options: &QueueOptions) -> Result<HttpRequest> {
        self.put_json(format!("/queues/{}/{}", encode(vhost), encode(name)), options)
    }

    pub fn build_delete_queue(&self, vhost: &str, name: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, format!("/queues/{}/{}", encode(vhost), encode(name)))
    }

    pub fn build_purge_queue(&self, vhost: &str, name: &str) -> HttpRequest {
        self.bare(
            HttpMethod::Delete,
            format!("/queues/{}/{}/contents", encode(vhost), encode(name)),
        )
    }

    // --- exchanges ---

    pub fn build_exchanges(&self, vhost: Option<&str>) -> HttpRequest {
        self.get(collection("/exchanges", vhost))
    }

    pub fn build_exchange(&self, vhost: &str, name: &str) -> HttpRequest {
        self.get(format!("/exchanges/{}/{}", encode(vhost), encode(name)))
    }

    pub fn build_create_exchange(
        &self,
        vhost: &str,
        name: &str,
        options: &ExchangeOptions,
    ) -> Result<HttpRequest> {
        self.put_json(format!("/exchanges/{}/{}", encode(vhost), encode(name)), options)
    }

    pub fn build_delete_exchange(&self, vhost: &str, name: &str) -> HttpRequest {
        self.bare(HttpMethod::Delete, format!("/exchanges/{}/{}", encode(vhost), encode(name)))
    }

    // --- bindings ---

    pub fn build_bindings(&self, vhost: Option<&str>) -> HttpRequest {
        self.get(collection("/bindings", vhost))
    }

    // --- responses ---

    /// Check the status and decode the body as `D`.
    pub fn parse_json<D: DeserializeOwned>(&self, response: HttpResponse, scope: Scope<'_>) -> Result<D> {
        check_status(&response, scope)?;
        serde_json::from_str(&response.body).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Check the status of a response whose body carries nothing.
    pub fn parse_empty(&self, response: HttpResponse, scope: Scope<'_>) -> Result<()> {
        check_status(&response, scope)
    }

    fn get(&self, path: String) -> HttpRequest {
        self.bare(HttpMethod::Get, path)
    }

    fn bare(&self, method: HttpMethod, path: String) -> HttpRequest {
        HttpRequest {
            method,
            path: format!("{}{path}", self.base_url),
            headers: vec![("authorization".to_string(), self.authorization.clone())],
            body: None,
        }
    }

    fn put_json<B: Serialize>(&self, path: String, body: &B) -> Result<HttpRequest> {
        let body = serde_json::to_string(body).map_err(|e| Error::Serialization(e.to_string()))?;
        let mut request = self.bare(HttpMethod::Put, path);
        request
            .headers
            .push(("content-type".to_string(), "application/json".to_string()));
        request.body = Some(body);
        Ok(request)
    }
}

/// Percent-encode a single path segment.
pub fn encode(segment: &str) -> String {
    utf8_percent_encode(segment, SEGMENT).to_string()
}

fn collection(prefix: &str, vhost: Option<&str>) -> String {
    match vhost {
        Some(vhost) => format!("{prefix}/{}", encode(vhost)),
        None => prefix.to_string(),
    }
}

/// Map non-success status codes to the appropriate `Error` variant.
fn check_status(response: &HttpResponse, scope: Scope<'_>) -> Result<()> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }
    warn!(status = response.status, ?scope, "management API returned an error status");
    if response.status == 404 {
        if let Some(err) = scope.not_found() {
            return Err(err);
        }
    }
    Err(Error::Http {
        status: response.status,
        reason: response.reason.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Record;

    fn api() -> ManagementApi {
        ManagementApi::new("localhost:15672", &Credentials::new("guest", "guest"))
    }

    fn response(status: u16, body: &str) -> HttpResponse {
        HttpResponse {
            status,
            reason: String::new(),
            headers: Vec::new(),
            body: body.to_string(),
        }
    }

    #[test]
    fn build_overview_produces_correct_request() {
        let req = api().build_overview();
        assert_eq!(req.method, HttpMethod::Get);
        assert_eq!(req.path, "http://localhost:15672/api/overview");
        assert_eq!(req.header("authorization"), Some("Basic Z3Vlc3Q6Z3Vlc3Q="));
        assert!(req.body.is_none());
    }

    #[test]
    fn default_vhost_is_escaped() {
        let req = api().build_aliveness_test("/");
        assert_eq!(req.path, "http://localhost:15672/api/aliveness-test/%2F");
    }

    #[test]
    fn queue_collection_with_and_without_vhost() {
        assert_eq!(api().build_queues(None).path, "http://localhost:15672/api/queues");
        assert_eq!(
            api().build_queues(Some("testvhost")).path,
            "http://localhost:15672/api/queues/testvhost"
        );
    }

    #[test]
    fn resource_names_are_escaped() {
        let req = api().build_exchange("/", "amq.topic");
        assert_eq!(req.path, "http://localhost:15672/api/exchanges/%2F/amq.topic");
        let req = api().build_queue("my vhost", "a/b");
        assert_eq!(req.path, "http://localhost:15672/api/queues/my%20vhost/a%2Fb");
    }

    #[test]
    fn build_create_queue_carries_json_body() {
        let req = api().build_create_queue("/", "jobs", &QueueOptions::default()).unwrap();
        assert_eq!(req.method, HttpMethod::Put);
        assert_eq!(req.path, "http://localhost:15672/api/queues/%2F/jobs");
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body["durable"], true);
    }

    #[test]
    fn build_purge_queue_targets_contents() {
        let req = api().build_purge_queue("/", "jobs");
        assert_eq!(req.method, HttpMethod::Delete);
        assert_eq!(req.path, "http://localhost:15672/api/queues/%2F/jobs/contents");
    }

    #[test]
    fn host_path_prefix_is_kept() {
        let api = ManagementApi::new("broker.example:8080/rabbit/", &Credentials::new("u", "p"));
        assert_eq!(api.build_vhosts().path, "http://broker.example:8080/rabbit/api/vhosts");
    }

    #[test]
    fn parse_json_keeps_arrays_ordered() {
        let vhosts: Vec<Record> = api()
            .parse_json(response(200, r#"[{"name":"/"},{"name":"b"},{"name":"a"}]"#), Scope::Broker)
            .unwrap();
        let names: Vec<_> = vhosts.iter().map(|v| v["name"].as_str().unwrap()).collect();
        assert_eq!(names, ["/", "b", "a"]);
    }

    #[test]
    fn vhost_scoped_404_is_not_found() {
        let err = api()
            .parse_json::<Record>(response(404, r#"{"error":"Object Not Found"}"#), Scope::Vhost("nope"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { ref scope, .. } if scope == "nope"));
    }

    #[test]
    fn broker_wide_404_stays_http_error() {
        let err = api()
            .parse_json::<Record>(response(404, ""), Scope::Broker)
            .unwrap_err();
        assert!(matches!(err, Error::Http { status: 404, .. }));
    }

    #[test]
    fn resource_404_names_the_resource() {
        let scope = Scope::Resource {
            kind: "queue",
            name: "jobs",
            vhost: "/",
        };
        let err = api().parse_empty(response(404, ""), scope).unwrap_err();
        assert!(matches!(err, Error::NotFound { ref resource, .. } if resource == "queue 'jobs'"));
    }

    #[test]
    fn server_error_carries_status() {
        let err = api()
            .parse_json::<Record>(response(500, "boom"), Scope::Vhost("/"))
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(!err.is_not_found());
    }

    #[test]
    fn parse_empty_accepts_204() {
        assert!(api().parse_empty(response(204, ""), Scope::Broker).is_ok());
    }

    #[test]
    fn bad_json_is_deserialization_error() {
        let err = api()
            .parse_json::<Vec<Record>>(response(200, "not json"), Scope::Broker)
            .unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }

    #[test]
    fn object_where_array_expected_is_rejected() {
        let err = api()
            .parse_json::<Vec<Record>>(response(200, r#"{"name":"/"}"#), Scope::Broker)
            .unwrap_err();
        assert!(matches!(err, Error::Deserialization(_)));
    }
}

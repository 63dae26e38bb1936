//! Blocking client for the RabbitMQ HTTP management API.
//!
//! # Overview
//! `ManagementApi` builds `HttpRequest` values and parses `HttpResponse`
//! values without touching the network; a `Transport` executes the
//! round-trip. `HttpClient` combines the two and returns decoded JSON, and
//! `Server` layers typed records and an overview snapshot on top.
//!
//! # Design
//! - One blocking HTTP round-trip per call; no pooling, retry or caching.
//! - Every failure surfaces as `Error`: `Network` when nothing was received,
//!   `Http` for error statuses, `NotFound` for a 404 on a vhost-scoped lookup.
//! - Typed records keep unknown broker fields in an `extra` map.

pub mod api;
pub mod client;
pub mod error;
pub mod http;
pub mod server;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use api::{ManagementApi, Scope};
pub use client::{HttpClient, DEFAULT_VHOST};
pub use error::{Error, Result};
pub use http::{Credentials, HttpMethod, HttpRequest, HttpResponse};
pub use server::Server;
pub use transport::{Transport, UreqTransport};
pub use types::{Exchange, ExchangeOptions, Overview, Queue, QueueOptions, Record, Vhost};

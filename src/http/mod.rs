//! Embedded HTTP/1.1 engine
//!
//! A small Tokio server that parses requests into [`Session`]s, asks a
//! [`SessionHandler`] for a [`Response`] and writes it back. It knows
//! nothing about dispatching or flushing; [`crate::control`] builds those
//! on top of the [`SessionHandler`] seam.

pub mod client;
pub mod config;
pub mod encoding;
pub mod protocol;
pub mod response;
pub mod server;
pub mod session;


pub use client::{ClientConfig, ClientConfigBuilder, ClientResponse, FixtureClient, ResponseHead};
pub use config::HttpConfig;
pub use protocol::{HttpConnection, HttpProtocolError};
pub use response::Response;
pub use server::{HttpEngine, SessionHandler};
pub use session::{Headers, QueryParams, Session};

//! JSON over HTTP: axum routes on the server side, reqwest on the client side.

pub mod client;
pub mod server;

pub use client::HttpTransport;
pub use server::routes;

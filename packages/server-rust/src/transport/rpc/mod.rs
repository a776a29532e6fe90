//! Protobuf over HTTP/2: the tonic service on the server side, the
//! generated client on the client side.

pub mod client;
pub mod pb;
pub mod server;

pub use client::RpcTransport;
pub use server::RpcHandler;

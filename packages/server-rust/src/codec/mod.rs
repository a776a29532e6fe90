//! Wire adapters: per-operation encode/decode between envelopes and the
//! HTTP and RPC wire formats, plus the call-error mappings both transports
//! share.
//!
//! Codecs are pure. They never look at middleware state, and middleware
//! never sees wire types.

pub mod error;
pub mod http;
pub mod rpc;

pub use error::ErrorBody;
pub use http::HttpCodec;
pub use rpc::RpcCodec;

//! fc-server: the segment origin server.
//!
//! Serves the pipeline's working directory (playlist plus media segments)
//! over HTTP with HLS content types, caching disabled and permissive CORS.
//! The server binds before [`OriginServer::start`] returns, so its URL is
//! safe to publish immediately.

pub mod resolver;
pub mod router;
pub mod server;

pub use resolver::{AddressResolver, FixedResolver, RouteResolver};
pub use router::build_router;
pub use server::OriginServer;

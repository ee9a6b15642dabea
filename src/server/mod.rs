//! HTTP server module.
//!
//! Accepts TCP connections, speaks HTTP/1.1, and routes content requests
//! through rate limiting, authorization and the content gateway.
//!
//! ## Endpoints
//!
//! ```text
//! GET /health
//! GET /api/content/list/{owner}/{area}
//! GET /api/content/fetch/{owner}/{area}/{fileName}
//! ```

mod connection;
mod listener;
mod routes;

pub use connection::{handle_connection, status_for, GatewayState};
pub use listener::{ConnectionMetrics, GatewayServer};
pub use routes::Route;

//! `WebSocket` gateway: the transport adapter over axum's socket and the
//! upgrade handler that admits participants into jam rooms.

pub mod session;
pub mod transport;

pub use session::{jam_ws_handler, run_ws_session};
pub use transport::{WsSink, WsSource};

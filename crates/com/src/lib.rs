pub mod error;
pub mod header;
pub mod relay;
pub mod ws;

pub use error::ComError;
pub use header::StreamHeader;
pub use relay::{Relay, RelayStats};
pub use ws::{WsClient, WsServer};

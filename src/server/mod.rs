//! The networked side of the server: per-client connections, the session
//! coordinator, and the lifecycle files probes read.

pub mod connection;
pub mod session;
pub mod status;

pub use connection::{Connection, Received};
pub use session::Session;
pub use status::{ResultLog, StatusFile};

//! Cinesync Client Library
//!
//! Everything a peer needs to take part in a watch party: the REST
//! room API client, the connection supervisor that keeps the relay
//! subscription alive across drops, and the session driver that feeds
//! the sync engine.
//!
//! The engine itself lives in `cinesync-core`; this crate confines one
//! engine instance to one driver task and wires it to the transport.

#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod error;
pub mod session;
pub mod supervisor;

pub use api::RoomApi;
pub use error::ClientError;
pub use session::{PartySession, ProgressSink, SessionConfig, SessionEvent, SessionHandle};
pub use supervisor::{
    ConnectionState, ConnectionSupervisor, SupervisorConfig, SupervisorHandle, TransportEvent,
};

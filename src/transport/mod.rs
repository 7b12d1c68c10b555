//! Transport module - framed exchanges with a peer.
//!
//! - [`Connection`] frames messages over any async reader/writer pair
//! - [`PeerConnection`] owns a child process and talks over its stdio

mod connection;
mod peer;

pub use connection::{Connection, Exchange};
pub use peer::{PeerBuilder, PeerConnection};

//! # value-conformance
//!
//! Conformance harness for structured value codecs.
//!
//! A driver process (this crate) talks to a peer process implementing the same
//! codec in another runtime, over the peer's stdin/stdout, and checks that both
//! sides agree on encodings and on the exact text of decode errors.
//!
//! ## Architecture
//!
//! - **Wire framer / message protocol** (`protocol`): little-endian,
//!   length-prefixed header blocks and messages
//! - **Peer connection** (`transport`): one child process, strict
//!   request/response, no pipelining
//! - **Conformance driver** (`driver`): FIFO queue of operations against the
//!   peer plus the `get_spec_keys` / `get_spec` / `check_encode` / `close`
//!   commands
//! - **JSON codec** (`codec`): structured values to JSON and back, with
//!   path-qualified decode errors
//!
//! ## Example
//!
//! ```ignore
//! use value_conformance::driver::{run_all, ConformanceDriver};
//! use value_conformance::transport::PeerBuilder;
//!
//! #[tokio::main]
//! async fn main() -> value_conformance::Result<()> {
//!     let peer = PeerBuilder::new("./json-peer").open()?;
//!     let driver = ConformanceDriver::spawn(peer);
//!
//!     for outcome in run_all(&driver, "json", None).await? {
//!         println!("{} {}", if outcome.passed() { "ok" } else { "FAIL" }, outcome.key);
//!     }
//!
//!     driver.shutdown(true).await
//! }
//! ```

pub mod codec;
pub mod driver;
pub mod error;
pub mod protocol;
pub mod transport;
pub mod value;

pub use codec::{CodecOptions, JsonCodec};
pub use driver::{ConformanceDriver, TestSpec};
pub use error::{CodecError, ConformanceError, Result};
pub use transport::{PeerBuilder, PeerConnection};

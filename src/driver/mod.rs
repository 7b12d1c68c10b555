//! Conformance driver.
//!
//! - [`ConformanceDriver`] - FIFO queue serializing all access to one peer
//! - [`command`] - the `command` header vocabulary spoken to peers
//! - [`TestSpec`] - a fetched case and its structured value form
//! - [`run_case`] / [`run_all`] - execute cases against the local codec

pub mod command;
mod queue;
mod runner;
mod spec;

pub use command::PeerCommand;
pub use queue::{BoxFuture, ConformanceDriver};
pub use runner::{run_all, run_case, CaseOutcome};
pub use spec::{
    Action, TestSpec, DECODE_INPUT_TYPE, ENCODE_VALUE_TYPE, FAIL_DECODE_TYPE, HEADER_TYPE,
    ROUND_TRIP_TYPE, TEST_SPEC_TYPE,
};

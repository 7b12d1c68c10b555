//! Case runner.
//!
//! Executes each [`Action`] against a local [`JsonCodec`] configured from the
//! spec's headers. Only `EncodeValue` needs the peer again, to verify our
//! encoding.

use super::queue::ConformanceDriver;
use super::spec::{Action, TestSpec};
use crate::codec::{CodecOptions, JsonCodec};
use crate::error::{ConformanceError, Result};
use crate::transport::Exchange;
use crate::value::Value;

/// Verdict for one case.
#[derive(Debug)]
pub struct CaseOutcome {
    pub key: String,
    pub error: Option<ConformanceError>,
}

impl CaseOutcome {
    pub fn passed(&self) -> bool {
        self.error.is_none()
    }
}

/// Run one already fetched case.
pub async fn run_case<C: Exchange>(
    driver: &ConformanceDriver<C>,
    codec_id: &str,
    spec_key: &str,
    spec: &TestSpec,
) -> Result<()> {
    let codec = JsonCodec::new(CodecOptions::from_headers(&spec.headers)?)?;
    let fail = |detail: String| ConformanceError::CaseFailed {
        key: spec_key.to_string(),
        detail,
    };

    match &spec.action {
        Action::RoundTrip(expected) => {
            let expected = Value::Struct(expected.clone());
            let bytes = codec.as_buffer(&expected)?;
            let actual = Value::Struct(codec.from_buffer(&bytes)?);
            if !actual.equivalent(&expected) {
                return Err(fail(format!(
                    "round trip changed the value: expected {:?}, got {:?}",
                    expected, actual
                )));
            }
        }
        Action::FailDecode {
            error_message,
            input,
        } => match codec.from_buffer(input) {
            Ok(value) => {
                return Err(fail(format!(
                    "expected decode to fail with \"{}\", got {:?}",
                    error_message, value
                )))
            }
            Err(e) if e.to_string() != *error_message => {
                return Err(fail(format!(
                    "expected error \"{}\", got \"{}\"",
                    error_message, e
                )))
            }
            Err(_) => {}
        },
        Action::DecodeInput { input, expect } => {
            let actual = Value::Struct(codec.from_buffer(input)?);
            if !actual.equivalent(expect) {
                return Err(fail(format!(
                    "decoded value differs: expected {:?}, got {:?}",
                    expect, actual
                )));
            }
        }
        Action::EncodeValue(value) => {
            let body = codec.as_buffer(value)?;
            driver.check_encode(spec_key, codec_id, body).await?;
        }
    }
    Ok(())
}

/// Enumerate the peer's cases for `codec_id` and run each one.
///
/// `filter` keeps only keys containing the given substring. Failing cases
/// are collected, not fatal; only failing to list the keys is.
pub async fn run_all<C: Exchange>(
    driver: &ConformanceDriver<C>,
    codec_id: &str,
    filter: Option<&str>,
) -> Result<Vec<CaseOutcome>> {
    let keys = driver.get_spec_keys(codec_id).await?;

    // Queue every fetch up front; the driver still sends them one at a time.
    let fetches: Vec<_> = keys
        .into_iter()
        .filter(|key| filter.map_or(true, |f| key.contains(f)))
        .map(|key| {
            let fetch = driver.get_spec(&key, codec_id);
            (key, fetch)
        })
        .collect();

    let mut outcomes = Vec::with_capacity(fetches.len());
    for (key, fetch) in fetches {
        let result = match fetch.await {
            Ok(spec) => run_case(driver, codec_id, &key, &spec).await,
            Err(e) => Err(e),
        };
        match &result {
            Ok(()) => tracing::info!(case = %key, "Case passed"),
            Err(e) => tracing::warn!(case = %key, error = %e, "Case failed"),
        }
        outcomes.push(CaseOutcome {
            key,
            error: result.err(),
        });
    }
    Ok(outcomes)
}

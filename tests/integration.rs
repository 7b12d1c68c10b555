//! Integration tests for value-conformance.
//!
//! These tests drive the framer, JSON codec and conformance driver together
//! against an in-process fake peer.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use tokio::io::{duplex, split, DuplexStream, ReadHalf, WriteHalf};

use value_conformance::codec::{CodecOptions, JsonCodec};
use value_conformance::driver::{
    command, run_all, Action, ConformanceDriver, PeerCommand, TestSpec,
};
use value_conformance::protocol::{Headers, Message, WireReader, WireWriter};
use value_conformance::transport::Connection;
use value_conformance::value::{EnumValue, Identifier, StructValue, TypeName, Value};
use value_conformance::ConformanceError;

type Link = Connection<ReadHalf<DuplexStream>, WriteHalf<DuplexStream>>;

fn id(s: &str) -> Identifier {
    Identifier::parse(s).unwrap()
}

fn type_name(s: &str) -> TypeName {
    TypeName::parse(s).unwrap()
}

fn link() -> (Link, Link) {
    let (near, far) = duplex(64 * 1024);
    let (near_r, near_w) = split(near);
    let (far_r, far_w) = split(far);
    (Connection::new(near_r, near_w), Connection::new(far_r, far_w))
}

/// A peer serving a fixed set of cases the way a real peer process would.
struct FakePeer {
    specs: Vec<(String, TestSpec)>,
    /// Encodings the peer insists on, overriding its own.
    expected: HashMap<String, Bytes>,
}

impl FakePeer {
    fn reply(&self, request: &Message) -> Message {
        let failure = |text: String| Message::from_headers(Headers::new().with(command::EXCEPTION, text));
        let spec_key = request.header(command::SPEC_KEY).unwrap_or_default();
        let spec = self.specs.iter().find(|(key, _)| key == spec_key).map(|(_, s)| s);

        match request.header(command::COMMAND).and_then(PeerCommand::from_name) {
            Some(PeerCommand::GetSpecKeys) => {
                let keys: Vec<&str> = self.specs.iter().map(|(k, _)| k.as_str()).collect();
                Message::new(Headers::new(), Bytes::from(keys.join(",")))
            }
            Some(PeerCommand::GetSpec) => match spec {
                Some(spec) => {
                    let codec = JsonCodec::new(CodecOptions::default()).unwrap();
                    let body = codec.as_buffer(&Value::Struct(spec.to_value())).unwrap();
                    Message::new(Headers::new(), body)
                }
                None => failure(format!("no such spec: {}", spec_key)),
            },
            Some(PeerCommand::CheckEncode) => {
                let Some(spec) = spec else {
                    return failure(format!("no such spec: {}", spec_key));
                };
                let expected = match (self.expected.get(spec_key), &spec.action) {
                    (Some(bytes), _) => bytes.clone(),
                    (None, Action::EncodeValue(value)) => {
                        let options = CodecOptions::from_headers(&spec.headers).unwrap();
                        JsonCodec::new(options).unwrap().as_buffer(value).unwrap()
                    }
                    (None, _) => return failure("not an encode case".into()),
                };
                if expected == request.body {
                    Message::default()
                } else {
                    failure(format!(
                        "expected {}, got {}",
                        String::from_utf8_lossy(&expected),
                        String::from_utf8_lossy(&request.body)
                    ))
                }
            }
            Some(PeerCommand::Close) => Message::default(),
            None => failure("unknown command".into()),
        }
    }

    async fn serve(self, mut conn: Link) -> Vec<String> {
        let mut log = Vec::new();
        while let Ok(request) = conn.read_message().await {
            let name = request.header(command::COMMAND).unwrap_or_default().to_string();
            let reply = self.reply(&request);
            conn.write_message(&reply).await.unwrap();
            log.push(name.clone());
            if name == "close" {
                break;
            }
        }
        log
    }
}

fn color(constant: &str) -> Value {
    Value::Enum(EnumValue {
        type_name: type_name("paint.color"),
        constant: id(constant),
    })
}

fn sample_struct() -> StructValue {
    let inner = StructValue::new(type_name("geometry.point"))
        .with_field(id("x"), Value::Int32(1))
        .with_field(id("y"), Value::Float64(-2.5));
    StructValue::new(type_name("sample.everything"))
        .with_field(id("nothing"), Value::Null)
        .with_field(id("flag"), true)
        .with_field(id("small"), Value::Int32(-7))
        .with_field(id("big"), Value::Int64(1 << 40))
        .with_field(id("ratio"), Value::Float32(0.25))
        .with_field(id("label"), "hello, world")
        .with_field(id("blob"), Bytes::from_static(&[0, 1, 2, 250, 255]))
        .with_field(
            id("created-at"),
            Value::Timestamp(Utc.with_ymd_and_hms(2024, 2, 29, 12, 30, 0).unwrap()),
        )
        .with_field(id("favorite-color"), color("deep-blue"))
        .with_field(id("points"), vec![Value::Struct(inner.clone()), Value::Null])
        .with_field(id("origin"), inner)
}

#[test]
fn test_round_trip_every_kind_under_each_option_set() {
    let option_sets = [
        CodecOptions::default(),
        CodecOptions {
            expand_enums: true,
            ..Default::default()
        },
        CodecOptions {
            id_format: "lower_underscore".parse().unwrap(),
            ..Default::default()
        },
        CodecOptions {
            id_format: "lower_camel".parse().unwrap(),
            expand_enums: true,
            ..Default::default()
        },
    ];
    let value = Value::Struct(sample_struct());

    for options in option_sets {
        let codec = JsonCodec::new(options).unwrap();
        let bytes = codec.as_buffer(&value).unwrap();
        let decoded = Value::Struct(codec.from_buffer(&bytes).unwrap());
        assert!(
            decoded.equivalent(&value),
            "{:?} changed the value: {}",
            options,
            String::from_utf8_lossy(&bytes)
        );
    }
}

#[tokio::test]
async fn test_header_round_trip_repeated() {
    let header_sets = [
        Headers::new(),
        Headers::new().with("command", "get_spec").with("spec_key", "ünïcödé"),
    ];
    for headers in header_sets {
        for n in [1usize, 10] {
            let mut writer = WireWriter::new(Vec::new());
            for _ in 0..n {
                writer.write_headers(&headers).unwrap();
            }
            writer.flush().await.unwrap();
            let bytes = writer.into_inner();

            let mut reader = WireReader::new(&bytes[..]);
            for _ in 0..n {
                assert_eq!(reader.read_headers().await.unwrap(), headers);
            }
            assert!(reader.into_inner().is_empty());
        }
    }
}

#[tokio::test]
async fn test_message_round_trip_with_trailing_data() {
    let messages = [
        Message::default(),
        Message::new(
            Headers::new().with("command", "check_encode"),
            Bytes::from_static(br#"{"$type":"a.b"}"#),
        ),
    ];
    for message in messages {
        let mut writer = WireWriter::new(Vec::new());
        writer.write_message(&message).await.unwrap();
        let mut bytes = writer.into_inner();
        bytes.extend_from_slice(b"\xde\xad\xbe\xef trailing");

        let mut reader = WireReader::new(&bytes[..]);
        assert_eq!(reader.read_message().await.unwrap(), message);
        assert_eq!(reader.into_inner(), b"\xde\xad\xbe\xef trailing");
    }
}

#[tokio::test]
async fn test_message_stream_round_trip_repeated() {
    let messages: Vec<Message> = (0..10)
        .map(|i| match i % 3 {
            0 => Message::default(),
            1 => Message::from_headers(Headers::new().with("command", "get_spec_keys")),
            _ => Message::new(
                Headers::new()
                    .with("command", "check_encode")
                    .with("spec_key", format!("case-{}", i)),
                Bytes::from(vec![i as u8; i * 7]),
            ),
        })
        .collect();

    for n in [1usize, 10] {
        let mut writer = WireWriter::new(Vec::new());
        for message in &messages[..n] {
            writer.write_message(message).await.unwrap();
        }
        let bytes = writer.into_inner();

        let mut reader = WireReader::new(&bytes[..]);
        for message in &messages[..n] {
            assert_eq!(&reader.read_message().await.unwrap(), message);
        }
        assert!(reader.into_inner().is_empty());
    }
}

#[tokio::test]
async fn test_framing_error_literals() {
    let bad_version = [0x00u8, 0x02, 0x02, 0x02];
    let mut reader = WireReader::new(&bad_version[..]);
    assert_eq!(
        reader.read_headers().await.unwrap_err().to_string(),
        "Invalid headers :version => 0x02020200 (expected 0x00000001)"
    );

    let bad_type = [0x01u8, 0, 0, 0, 0x0f, 0, 0, 0];
    let mut reader = WireReader::new(&bad_type[..]);
    assert_eq!(
        reader.read_headers().await.unwrap_err().to_string(),
        "Unknown type :code => 0x0000000f"
    );
}

#[test]
fn test_codec_error_literals() {
    let illegal = CodecOptions {
        expand_enums: true,
        omit_type_fields: true,
        ..Default::default()
    };
    assert!(matches!(
        JsonCodec::new(illegal),
        Err(ConformanceError::InvalidOptions(_))
    ));

    let codec = JsonCodec::new(CodecOptions::default()).unwrap();
    assert_eq!(
        codec.from_buffer(b"{}").unwrap_err().to_string(),
        "Missing type key (\"$type\")"
    );
    assert_eq!(
        codec.from_buffer(b"[1, 2]").unwrap_err().to_string(),
        "unexpected top level JSON value"
    );
    assert_eq!(
        codec
            .from_buffer(br#"{"$type":"a.b","f1":{"f2":{"2bad":1}}}"#)
            .unwrap_err()
            .to_string(),
        "f1.f2.2bad: Invalid identifier \"2bad\": must start with a letter"
    );
}

#[tokio::test]
async fn test_run_all_against_fake_peer() {
    let enum_spec = TestSpec::new(id("enum-value"), Action::EncodeValue(color("deep-blue")))
        .with_codec_id(id("json"))
        .with_header("id_format", "upper_camel");
    let specs = vec![
        (
            "round-trip".to_string(),
            TestSpec::new(id("round-trip"), Action::RoundTrip(sample_struct())),
        ),
        (
            "missing-type".to_string(),
            TestSpec::new(
                id("missing-type"),
                Action::FailDecode {
                    error_message: "Missing type key (\"$type\")".into(),
                    input: Bytes::from_static(b"{}"),
                },
            ),
        ),
        (
            "bad-path".to_string(),
            TestSpec::new(
                id("bad-path"),
                Action::FailDecode {
                    error_message: "items[1].$oops: Unrecognized control key \"$oops\"".into(),
                    input: Bytes::from_static(br#"{"$type":"a.b","items":[{},{"$oops":1}]}"#),
                },
            ),
        ),
        (
            "decode".to_string(),
            TestSpec::new(
                id("decode"),
                Action::DecodeInput {
                    input: Bytes::from_static(br#"{"$type":"geometry.point","x":1,"y":-2.5}"#),
                    expect: Value::Struct(
                        StructValue::new(type_name("geometry.point"))
                            .with_field(id("x"), Value::Int64(1))
                            .with_field(id("y"), Value::Float64(-2.5)),
                    ),
                },
            ),
        ),
        (enum_spec.key(), enum_spec),
        (
            "rejected".to_string(),
            TestSpec::new(id("rejected"), Action::EncodeValue(Value::from("x"))),
        ),
    ];
    let peer = FakePeer {
        specs,
        expected: HashMap::from([("rejected".to_string(), Bytes::from_static(b"\"y\""))]),
    };

    let (near, far) = link();
    let server = tokio::spawn(peer.serve(far));
    let driver = ConformanceDriver::spawn(near);

    let outcomes = run_all(&driver, "json", None).await.unwrap();
    let verdicts: Vec<(&str, bool)> = outcomes.iter().map(|o| (o.key.as_str(), o.passed())).collect();
    assert_eq!(
        verdicts,
        vec![
            ("round-trip", true),
            ("missing-type", true),
            ("bad-path", true),
            ("decode", true),
            ("enum-value/json", true),
            ("rejected", false),
        ]
    );
    assert_eq!(
        outcomes[5].error.as_ref().unwrap().to_string(),
        "Remote failure: expected \"y\", got \"x\""
    );

    driver.finish().await.unwrap();
    let log = server.await.unwrap();
    assert_eq!(log.first().map(String::as_str), Some("get_spec_keys"));
    assert_eq!(log.last().map(String::as_str), Some("close"));
    // keys, six fetches, two encode checks, close
    assert_eq!(log.len(), 10);
}

#[tokio::test]
async fn test_filter_and_missing_spec() {
    let peer = FakePeer {
        specs: vec![(
            "only".to_string(),
            TestSpec::new(id("only"), Action::EncodeValue(Value::Null)),
        )],
        expected: HashMap::new(),
    };
    let (near, far) = link();
    let server = tokio::spawn(peer.serve(far));
    let driver = ConformanceDriver::spawn(near);

    assert!(run_all(&driver, "json", Some("nothing-matches"))
        .await
        .unwrap()
        .is_empty());
    assert_eq!(
        driver.get_spec("absent", "json").await.unwrap_err().to_string(),
        "Remote failure: no such spec: absent"
    );

    driver.finish().await.unwrap();
    assert_eq!(server.await.unwrap(), vec!["get_spec_keys", "get_spec", "close"]);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_peer() {
    let specs = (0..16)
        .map(|i| {
            let key = format!("case-{}", i);
            let spec = TestSpec::new(id(&key), Action::EncodeValue(Value::Int32(i)));
            (key, spec)
        })
        .collect();
    let peer = FakePeer {
        specs,
        expected: HashMap::new(),
    };
    let (near, far) = link();
    let server = tokio::spawn(peer.serve(far));
    let driver = Arc::new(ConformanceDriver::spawn(near));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let driver = driver.clone();
        tasks.push(tokio::spawn(async move {
            let key = format!("case-{}", i);
            let spec = driver.get_spec(&key, "json").await?;
            assert_eq!(spec.action, Action::EncodeValue(Value::Int32(i)));
            driver
                .check_encode(&key, "json", Bytes::from(i.to_string()))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let driver = match Arc::try_unwrap(driver) {
        Ok(driver) => driver,
        Err(_) => panic!("driver still shared"),
    };
    assert_eq!(driver.submitted(), 32);
    driver.finish().await.unwrap();
    assert_eq!(server.await.unwrap().len(), 33);
}

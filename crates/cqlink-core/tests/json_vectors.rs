//! Big-integer-safe JSON codec tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use serde::{Deserialize, Serialize};
use serde_json::json;

use cqlink_core::codec::json::{self, BigInt};

use vector_loader::load;

#[test]
fn json_vectors() {
    let files = [
        "json_big_ids.json",
        "json_wide_int.json",
        "json_embedded.json",
        "json_malformed.json",
    ];

    for f in files {
        let v = load(f);
        let res = json::decode_value(&v.input);

        if let Some(exp_err) = v.expect_error {
            let err = res.expect_err(&v.description);
            assert_eq!(err.code().as_str(), exp_err.code, "{}", v.description);
            continue;
        }

        let value = res.unwrap_or_else(|e| panic!("{}: {e}", v.description));
        assert_eq!(Some(value), v.expect, "{}", v.description);
    }
}

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Wide {
    id: BigInt,
    ids: Vec<BigInt>,
    small: u32,
}

#[test]
fn big_integers_round_trip_exactly() {
    let v = Wide {
        id: BigInt(123_456_789_012_345_678_901_234_567_890),
        ids: vec![BigInt(-98_765_432_109_876_543_210), BigInt(7)],
        small: 1,
    };

    let text = json::encode(&v).unwrap();
    assert_eq!(
        text,
        r#"{"id":123456789012345678901234567890,"ids":[-98765432109876543210,7],"small":1}"#
    );

    let back: Wide = json::decode(&text).unwrap();
    assert_eq!(back, v);
}

#[test]
fn nineteen_digit_id_survives_value_round_trip() {
    let text = r#"{"group_id":9007199254740993,"user_id":1234567890123456789}"#;
    let value = json::decode_value(text).unwrap();
    assert_eq!(value["user_id"].as_u64(), Some(1_234_567_890_123_456_789));
    assert_eq!(value["group_id"].as_u64(), Some(9_007_199_254_740_993));
    assert_eq!(json::encode(&value).unwrap(), text);
}

#[test]
fn wide_integers_survive_value_round_trip() {
    let text = r#"{"id":123456789012345678901234567890,"neg":[-98765432109876543210,1]}"#;
    let value = json::decode_value(text).unwrap();
    assert!(value["id"].is_number());
    assert_eq!(value["id"].to_string(), "123456789012345678901234567890");
    assert_eq!(json::encode(&value).unwrap(), text);

    let id: BigInt = serde_json::from_value(value["id"].clone()).unwrap();
    assert_eq!(id, BigInt(123_456_789_012_345_678_901_234_567_890));
}

#[test]
fn digit_keys_are_left_alone() {
    let value = json::decode_value(r#"{"12345678901234567890":"12345678901234567890"}"#).unwrap();
    assert_eq!(value, json!({"12345678901234567890": "12345678901234567890"}));
}

#[test]
fn short_sentinel_lookalikes_stay_strings() {
    let value = json::decode_value(r#"{"a":"12n","b":"n"}"#).unwrap();
    assert_eq!(value, json!({"a": "12n", "b": "n"}));
    assert_eq!(json::encode(&value).unwrap(), r#"{"a":"12n","b":"n"}"#);
}

#[test]
fn embedded_payload_count_does_not_matter() {
    for n in 0..3 {
        let tags: String = (0..n)
            .map(|i| format!(r#"[CQ:json,data={{\"i\":{i},\"s\":\"a,b\"}}]"#))
            .collect();
        let text = format!(r#"{{"raw_message":"[CQ:json x {tags}","n":{n}}}"#);
        let plain: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(json::decode_value(&text).unwrap(), plain, "{n} payloads");
    }
}

#[test]
fn typed_decode_reports_shape_errors() {
    let err = json::decode::<Wide>(r#"{"id":"nope","ids":[],"small":1}"#).unwrap_err();
    assert_eq!(err.code().as_str(), "BAD_PAYLOAD");
}

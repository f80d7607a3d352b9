use super::Error;
use super::Result;
use super::Tag;
use super::Value;
use super::decode;
use super::decode_pdu;
use super::encode;
use super::encode_pdu;

type R<T> = Result<T>;

fn roundtrip(value: Value) -> R<()> {
    let bytes = encode(&value);
    assert_eq!(decode(&bytes)?, value);
    Ok(())
}

#[test]
fn test_scalar_roundtrip() -> R<()> {
    roundtrip(Value::Null)?;
    roundtrip(Value::Bool(true))?;
    roundtrip(Value::Bool(false))?;
    roundtrip(Value::Int(0))?;
    roundtrip(Value::Int(-1))?;
    roundtrip(Value::Real(2.5))?;
    roundtrip(Value::Real(-0.125))?;
    roundtrip(Value::Str(String::new()))?;
    roundtrip(Value::Str("hello world".into()))?;
    roundtrip(Value::Str("snow\u{2603}man".into()))?;
    Ok(())
}

#[test]
fn test_container_roundtrip() -> R<()> {
    roundtrip(array![])?;
    roundtrip(array![1, "two", 3.0, true])?;
    roundtrip(object! {})?;
    roundtrip(object! {
        "version" => "1.2.3",
        "files" => array![
            object! { "name" => "a.rs", "exists" => true },
            object! { "name" => "b.rs", "exists" => false, "size" => 42 },
        ],
        "warning" => Value::Null,
    })?;
    Ok(())
}

// ==== INTEGER WIDTH ====

#[test]
fn test_minimal_int_width() {
    // Each boundary value must pick the smallest width that holds it.
    let cases: &[(i64, Tag, usize)] = &[
        (-128, Tag::Int8, 2),
        (127, Tag::Int8, 2),
        (128, Tag::Int16, 3),
        (32767, Tag::Int16, 3),
        (32768, Tag::Int32, 5),
        (i64::from(i32::MAX), Tag::Int32, 5),
        (i64::from(i32::MAX) + 1, Tag::Int64, 9),
        (i64::MIN, Tag::Int64, 9),
    ];
    for (value, tag, total_len) in cases {
        let bytes = encode(&Value::Int(*value));
        assert_eq!(bytes[0], *tag as u8, "tag for {}", value);
        assert_eq!(bytes.len(), *total_len, "length for {}", value);
    }
}

#[test]
fn test_int_bytes_exact() {
    assert_eq!(encode(&Value::Int(5)), vec![0x03, 0x05]);
    assert_eq!(encode(&Value::Int(-1)), vec![0x03, 0xff]);
    assert_eq!(encode(&Value::Int(0x0102)), vec![0x04, 0x02, 0x01]);
}

#[test]
fn test_decode_accepts_any_int_width() -> R<()> {
    // 5 encoded as int32 must decode the same as int8.
    let wide = [0x05, 0x05, 0x00, 0x00, 0x00];
    assert_eq!(decode(&wide)?, Value::Int(5));
    let narrow = [0x03, 0x05];
    assert_eq!(decode(&narrow)?, Value::Int(5));
    Ok(())
}

// ==== WIRE SHAPE ====

#[test]
fn test_string_bytes_exact() {
    let bytes = encode(&Value::Str("hi".into()));
    assert_eq!(bytes, vec![0x02, 0x03, 0x02, b'h', b'i']);
}

#[test]
fn test_empty_array_bytes_exact() {
    assert_eq!(encode(&array![]), vec![0x00, 0x03, 0x00]);
}

#[test]
fn test_object_bytes_exact() {
    let bytes = encode(&object! { "ok" => true });
    assert_eq!(bytes, vec![0x01, 0x03, 0x01, 0x02, 0x03, 0x02, b'o', b'k', 0x08]);
}

// ==== TEMPLATES ====

/// A template over {name, age} with three rows, the second of which
/// omits age via the skip marker.
fn template_fixture() -> Vec<u8> {
    let mut buf = vec![Tag::Template as u8];
    buf.extend(encode(&array!["name", "age"]));
    buf.extend(encode(&Value::Int(3)));
    buf.extend(encode(&Value::Str("fred".into())));
    buf.extend(encode(&Value::Int(20)));
    buf.extend(encode(&Value::Str("pete".into())));
    buf.push(Tag::Skip as u8);
    buf.extend(encode(&Value::Str("sam".into())));
    buf.extend(encode(&Value::Int(54)));
    buf
}

#[test]
fn test_template_expansion() -> R<()> {
    let expanded = decode(&template_fixture())?;
    let expected = array![
        object! { "name" => "fred", "age" => 20 },
        object! { "name" => "pete" },
        object! { "name" => "sam", "age" => 54 },
    ];
    assert_eq!(expanded, expected);
    Ok(())
}

#[test]
fn test_template_rows_are_independent() -> R<()> {
    // A skipped key in one row must not leak a neighbor's value.
    let rows = decode(&template_fixture())?;
    let rows = rows.as_array().unwrap();
    assert!(rows[1].get("age").is_none());
    assert_eq!(rows[0].get("age"), Some(&Value::Int(20)));
    Ok(())
}

#[test]
fn test_template_bad_key_list() {
    // Key list holding an integer instead of a string.
    let mut buf = vec![Tag::Template as u8];
    buf.extend(encode(&array![1]));
    buf.extend(encode(&Value::Int(0)));
    assert_eq!(decode(&buf), Err(Error::BadTemplateKeys));
}

// ==== ERRORS ====

#[test]
fn test_invalid_tag() {
    assert_eq!(decode(&[0x42]), Err(Error::InvalidTag(0x42)));
}

#[test]
fn test_truncated_scalar() {
    assert_eq!(decode(&[0x04, 0x01]), Err(Error::Truncated));
    assert_eq!(decode(&[0x07, 0x00, 0x00]), Err(Error::Truncated));
}

#[test]
fn test_truncated_string() {
    // Claims 5 bytes, supplies 2.
    assert_eq!(decode(&[0x02, 0x03, 0x05, b'h', b'i']), Err(Error::Truncated));
}

#[test]
fn test_truncated_array() {
    // Claims 2 items, supplies 1.
    let mut buf = vec![0x00, 0x03, 0x02];
    buf.extend(encode(&Value::Int(1)));
    assert_eq!(decode(&buf), Err(Error::Truncated));
}

#[test]
fn test_negative_length() {
    assert_eq!(decode(&[0x02, 0x03, 0xff]), Err(Error::BadLength(-1)));
}

#[test]
fn test_non_integer_length() {
    assert_eq!(decode(&[0x02, 0x08]), Err(Error::ExpectedInt(0x08)));
}

#[test]
fn test_non_string_object_key() {
    let buf = [0x01, 0x03, 0x01, 0x0a];
    assert_eq!(decode(&buf), Err(Error::ExpectedString(0x0a)));
}

#[test]
fn test_bare_skip_marker() {
    assert_eq!(decode(&[0x0c]), Err(Error::InvalidTag(0x0c)));
}

#[test]
fn test_invalid_utf8() {
    assert_eq!(decode(&[0x02, 0x03, 0x01, 0xff]), Err(Error::InvalidUtf8));
}

#[test]
fn test_trailing_bytes() {
    assert_eq!(decode(&[0x0a, 0x0a]), Err(Error::TrailingBytes(1)));
}

// ==== PDU ENVELOPE ====

#[test]
fn test_pdu_roundtrip() -> R<()> {
    let value = object! { "clock" => "c:12345:6" };
    let pdu = encode_pdu(&value);
    assert_eq!(&pdu[..2], &[0x00, 0x01]);
    assert_eq!(decode_pdu(&pdu)?, value);
    Ok(())
}

#[test]
fn test_pdu_length_matches_payload() {
    let value = array!["version"];
    let payload = encode(&value);
    let pdu = encode_pdu(&value);
    // Header, one-byte length (int8 fits), payload.
    assert_eq!(pdu.len(), 2 + 2 + payload.len());
    assert_eq!(pdu[2], Tag::Int8 as u8);
    assert_eq!(pdu[3] as usize, payload.len());
}

#[test]
fn test_pdu_bad_header() {
    let mut pdu = encode_pdu(&Value::Null);
    pdu[1] = 0x02;
    assert_eq!(decode_pdu(&pdu), Err(Error::BadPduHeader([0x00, 0x02])));
}

#[test]
fn test_pdu_truncated_payload() {
    let pdu = encode_pdu(&array!["version"]);
    assert_eq!(decode_pdu(&pdu[..pdu.len() - 1]), Err(Error::Truncated));
}

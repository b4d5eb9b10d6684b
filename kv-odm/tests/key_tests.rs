use kv_odm::{Error, Key, KeyId};
use rand::Rng;

fn is_url_safe(encoded: &str) -> bool {
    encoded
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

#[test]
fn random_keys_survive_encoding() -> Result<(), Error> {
    let mut rng = rand::thread_rng();
    let kinds = ["Book", "KeUser", ""];
    for _ in 0..100 {
        let kind = kinds[rng.gen_range(0..kinds.len())];
        let key = match rng.gen_range(0..4) {
            0 => Key::with_id(kind, rng.r#gen::<i64>()),
            1 => Key::with_id(kind, 0),
            2 => Key::with_name(kind, ""),
            _ => Key::with_name(kind, uuid::Uuid::new_v4().to_string()),
        };
        let encoded = key.encode();
        assert!(is_url_safe(&encoded), "{} is not URL-safe", encoded);
        assert_eq!(Key::decode(&encoded)?, key);
        assert_eq!(encoded.parse::<Key>()?, key);
    }
    Ok(())
}

#[test]
fn distinct_keys_encode_differently() {
    let by_id = Key::with_id("Book", 7).encode();
    let by_name = Key::with_name("Book", "7").encode();
    let other_kind = Key::with_id("KeUser", 7).encode();
    assert_ne!(by_id, by_name);
    assert_ne!(by_id, other_kind);
}

#[test]
fn garbage_is_rejected() {
    for input in ["", "not a key!", "%%%", "AAAA"] {
        let err = Key::decode(input).unwrap_err();
        assert!(
            matches!(err, Error::InvalidKeyEncoding(_)),
            "{:?} decoded to {:?}",
            input,
            err
        );
    }
}

#[test]
fn keys_serialize_as_their_encoded_form() -> Result<(), Error> {
    let key = Key::with_name("KeUser", uuid::Uuid::new_v4().to_string());
    let json = serde_json::to_value(&key)?;
    assert_eq!(json, serde_json::Value::String(key.encode()));
    let back: Key = serde_json::from_value(json)?;
    assert_eq!(back.id(), key.id());
    assert!(matches!(back.id(), KeyId::Name(_)));
    Ok(())
}

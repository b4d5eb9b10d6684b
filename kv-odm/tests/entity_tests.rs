mod common;

use std::sync::atomic::{AtomicUsize, Ordering};

use common::{Book, Review, User, at, book, memory_db};
use kv_odm::{DictOptions, Document, Entity, Error, Field, FieldKind, Key, KeyId, Value};
use serde_json::json;

#[tokio::test]
async fn save_assigns_key_and_reads_back() -> Result<(), Error> {
    let db = memory_db();
    let mut original = book("Dune", 15);
    original.tags = vec!["fiction".to_string()];
    original.extra = json!({"isbn": "978-0441013593", "pages": 412});
    assert!(original.key_or_id_string().is_none());

    let key = original.save(&db).await?;
    assert_eq!(original.key(), Some(&key));
    assert_eq!(key.kind(), "Book");

    let loaded = Book::get_by_key(&db, &key).await?.expect("stored book");
    assert_eq!(loaded, original);
    Ok(())
}

#[tokio::test]
async fn json_fields_are_stored_as_text() -> Result<(), Error> {
    let db = memory_db();
    let mut b = book("SICP", 35);
    b.tags = vec!["lisp".to_string()];
    let key = b.save(&db).await?;

    let document = db
        .select::<Book>()
        .filter(Book::title().eq("SICP")?)
        .execute()
        .await?;
    assert_eq!(document.len(), 1);

    let raw = b.to_document()?;
    assert_eq!(raw.get("tags"), Some(&Value::from("[\"lisp\"]")));
    assert_eq!(raw.get("extra"), Some(&Value::from("{}")));
    assert_eq!(document[0].key(), Some(&key));
    Ok(())
}

#[test]
fn to_dict_only_returns_selected_fields() -> Result<(), Error> {
    let b = book("X", 10);
    let dict = b.to_dict_with(&DictOptions::new().only(["title"]))?;
    assert_eq!(serde_json::Value::Object(dict), json!({"title": "X"}));
    Ok(())
}

#[test]
fn to_dict_formats_timestamps() -> Result<(), Error> {
    let mut b = book("X", 10);
    b.created = at(2023, 7, 14, 9, 30, 0);
    let dict = b.to_dict()?;
    assert_eq!(dict.get("created"), Some(&json!("2023-07-14 09:30:00")));
    assert_eq!(dict.get("price"), Some(&json!(10)));
    assert_eq!(dict.get("tags"), Some(&json!([])));
    Ok(())
}

#[test]
fn to_dict_applies_only_then_exclude() -> Result<(), Error> {
    let b = book("X", 10);
    let dict = b.to_dict_with(&DictOptions::new().only(["title", "price"]).exclude(["price"]))?;
    assert_eq!(serde_json::Value::Object(dict), json!({"title": "X"}));

    let dict = b.to_dict_with(&DictOptions::new().exclude(["extra", "tags", "author"]))?;
    assert_eq!(
        serde_json::Value::Object(dict),
        json!({"title": "X", "price": 10, "created": "2024-01-02 03:04:05"})
    );
    Ok(())
}

#[test]
fn to_dict_rejects_unknown_names() {
    let b = book("X", 10);
    let err = b
        .to_dict_with(&DictOptions::new().only(["subtitle"]))
        .unwrap_err();
    assert!(matches!(err, Error::UnknownField(name) if name == "subtitle"));
}

#[test]
fn missing_fields_take_defaults() -> Result<(), Error> {
    let user = User::blank()?;
    assert_eq!(user.key, None);
    assert_eq!(user.name, "");
    assert!(user.enable_send);
    assert_eq!(user.send_time, 7);
    assert!(user.send_days.is_empty());
    assert_eq!(user.timezone, 0.0);
    assert!(user.settings.is_empty());

    let mut document = Document::new();
    document.insert("name".to_string(), Value::from("ada"));
    document.insert("send_time".to_string(), Value::Null);
    document.insert("legacy".to_string(), Value::Int(1));
    let user = User::from_document(Some(Key::with_id("KeUser", 3)), document)?;
    assert_eq!(user.name, "ada");
    assert_eq!(user.send_time, 7);
    assert_eq!(user.key, Some(Key::with_id("KeUser", 3)));
    Ok(())
}

#[test]
fn renamed_field_uses_stored_name() -> Result<(), Error> {
    assert_eq!(User::settings().name(), "cfg");
    assert_eq!(User::settings().kind(), FieldKind::Map);
    let mut user = User::blank()?;
    user.settings.insert("lang".to_string(), Value::from("zh"));
    let document = user.to_document()?;
    assert_eq!(document.get("cfg"), Some(&Value::from("{\"lang\":\"zh\"}")));
    assert!(!document.contains_key("settings"));
    Ok(())
}

#[test]
fn derived_kinds_follow_rust_types() {
    assert_eq!(Book::title().kind(), FieldKind::String);
    assert!(Book::title().enforces_type());
    assert_eq!(Book::price().kind(), FieldKind::Int);
    assert_eq!(Book::created().kind(), FieldKind::Timestamp);
    assert_eq!(Book::tags().kind(), FieldKind::List);
    assert_eq!(Book::extra().kind(), FieldKind::Json);
    assert_eq!(Book::author().kind(), FieldKind::String);
    assert_eq!(User::enable_send().kind(), FieldKind::Bool);
    assert_eq!(User::timezone().kind(), FieldKind::Float);
    assert_eq!(Review::note().kind(), FieldKind::Any);
    assert_eq!(User::KIND, "KeUser");
}

#[tokio::test]
async fn enforced_field_rejects_wrong_type_on_save() {
    let db = memory_db();
    let mut review = Review {
        key: None,
        rating: Value::Bool(true),
        note: Value::Null,
    };
    let err = review.save(&db).await.unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref field, .. } if field == "rating"));
    assert!(review.key.is_none());

    review.rating = Value::Int(4);
    review.save(&db).await.expect("int rating is accepted");
}

static PRODUCED: AtomicUsize = AtomicUsize::new(0);

fn fresh_list() -> Value {
    PRODUCED.fetch_add(1, Ordering::SeqCst);
    Value::List(vec![Value::from("daily")])
}

#[test]
fn default_producer_runs_on_every_access() {
    let field = Field::new("days", FieldKind::List).default_with(fresh_list);
    let before = PRODUCED.load(Ordering::SeqCst);
    let mut first = field.default();
    let second = field.default();
    assert_eq!(PRODUCED.load(Ordering::SeqCst), before + 2);

    if let Value::List(items) = &mut first {
        items.push(Value::from("weekly"));
    }
    assert_eq!(second, Value::List(vec![Value::from("daily")]));
}

#[tokio::test]
async fn get_by_id_or_none_accepts_encoded_keys_and_raw_ids() -> Result<(), Error> {
    let db = memory_db();
    let mut b = book("Dune", 15);
    let key = b.save(&db).await?;

    let encoded = b.key_or_id_string().expect("saved book has a key");
    let found = Book::get_by_id_or_none(&db, encoded.as_str()).await?;
    assert_eq!(found.and_then(|f| f.key), Some(key.clone()));

    let KeyId::Id(id) = key.id() else {
        panic!("memory store assigns integer ids");
    };
    let found = Book::get_by_id_or_none(&db, *id).await?;
    assert_eq!(found.map(|f| f.title), Some("Dune".to_string()));

    let found = Book::get_by_id_or_none(&db, id.to_string()).await?;
    assert!(found.is_some());
    Ok(())
}

#[tokio::test]
async fn get_by_id_or_none_missing_and_malformed() -> Result<(), Error> {
    let db = memory_db();
    assert!(
        Book::get_by_id_or_none(&db, Key::with_id("Book", 999))
            .await?
            .is_none()
    );
    assert!(Book::get_by_id_or_none(&db, 12345i64).await?.is_none());
    assert!(
        User::get_by_id_or_none(&db, Key::with_id("Book", 1))
            .await?
            .is_none()
    );

    let err = Book::get_by_id_or_none(&db, "not a key!").await.unwrap_err();
    assert!(matches!(err, Error::InvalidKeyEncoding(_)));
    Ok(())
}

#[tokio::test]
async fn reference_keys_emulate_foreign_keys() -> Result<(), Error> {
    let db = memory_db();
    let mut user = User::blank()?;
    user.name = "ada".to_string();
    user.save(&db).await?;

    let mut b = book("Notes", 1);
    b.author = user.key.clone();
    b.save(&db).await?;

    let dict = b.to_dict()?;
    let reference = user.reference_key_or_id().expect("saved user");
    assert_eq!(dict.get("author"), Some(&json!(reference)));
    assert_eq!(user.key_or_id_string(), Some(reference.clone()));

    let by_author = Book::get_all(&db, Book::author().eq(reference.as_str())?).await?;
    assert_eq!(by_author.len(), 1);

    let author_key = by_author[0].author.clone().expect("author is set");
    let author = User::get_by_id_or_none(&db, author_key).await?;
    assert_eq!(author.map(|a| a.name), Some("ada".to_string()));
    Ok(())
}

#[tokio::test]
async fn delete_removes_the_document() -> Result<(), Error> {
    let db = memory_db();
    let mut b = book("Temp", 3);
    let unsaved = b.delete(&db).await.unwrap_err();
    assert!(matches!(unsaved, Error::MissingKey));

    let key = b.save(&db).await?;
    b.delete(&db).await?;
    assert!(Book::get_by_key(&db, &key).await?.is_none());
    Ok(())
}

#[tokio::test]
async fn saving_again_updates_in_place() -> Result<(), Error> {
    let db = memory_db();
    let mut b = book("Draft", 3);
    let key = b.save(&db).await?;
    b.title = "Final".to_string();
    assert_eq!(b.save(&db).await?, key);

    let all = Book::get_all(&db, ()).await?;
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].title, "Final");
    Ok(())
}

#[tokio::test]
async fn non_finite_floats_never_reach_the_store() -> Result<(), Error> {
    let db = memory_db();
    let mut user = User::blank()?;
    user.timezone = f64::NAN;
    let err = user.save(&db).await.unwrap_err();
    assert!(matches!(err, Error::TypeMismatch { ref field, .. } if field == "timezone"));
    assert!(user.key.is_none());

    user.timezone = f64::INFINITY;
    assert!(user.save(&db).await.is_err());
    assert!(User::get_all(&db, ()).await?.is_empty());

    user.timezone = 8.0;
    user.save(&db).await?;
    assert_eq!(User::get_all(&db, ()).await?.len(), 1);
    Ok(())
}

#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use kv_odm::{DB, Entity, Key, Value, store::MemoryStore};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn memory_db() -> DB {
    init_logger();
    DB::new(MemoryStore::new())
}

pub fn at(y: i32, m: u32, d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, min, s))
        .expect("valid timestamp")
}

fn now() -> Value {
    Value::from(Utc::now().naive_utc())
}

#[derive(Entity, Debug, Clone, PartialEq)]
pub struct Book {
    #[key]
    pub key: Option<Key>,
    #[field(enforce_type)]
    pub title: String,
    pub price: i64,
    #[field(default_fn = now)]
    pub created: NaiveDateTime,
    pub tags: Vec<String>,
    pub extra: serde_json::Value,
    pub author: Option<Key>,
}

#[derive(Entity, Debug, Clone, PartialEq)]
#[entity(kind = "KeUser")]
pub struct User {
    #[key]
    pub key: Option<Key>,
    pub name: String,
    #[field(default = true)]
    pub enable_send: bool,
    #[field(default = 7)]
    pub send_time: i32,
    pub send_days: Vec<String>,
    pub timezone: f64,
    #[field(name = "cfg")]
    pub settings: BTreeMap<String, Value>,
}

#[derive(Entity, Debug, Clone, PartialEq)]
pub struct Review {
    #[key]
    pub key: Option<Key>,
    #[field(kind = "int", enforce_type)]
    pub rating: Value,
    pub note: Value,
}

pub fn book(title: &str, price: i64) -> Book {
    Book {
        key: None,
        title: title.to_string(),
        price,
        created: at(2024, 1, 2, 3, 4, 5),
        tags: Vec::new(),
        extra: serde_json::json!({}),
        author: None,
    }
}

pub async fn seed_books(db: &DB) -> Result<Vec<Book>, kv_odm::Error> {
    let mut books = vec![
        book("Rust in Action", 25),
        book("Dune", 15),
        book("SICP", 35),
        book("Go", 5),
    ];
    books[0].tags = vec!["rust".to_string(), "systems".to_string()];
    books[1].tags = vec!["fiction".to_string()];
    for book in books.iter_mut() {
        book.save(db).await?;
    }
    Ok(books)
}

use chrono::{NaiveDateTime, Utc};
use kv_odm::{DB, DictOptions, Entity, Error, Key, StoreConfig, Value};

fn now() -> Value {
    Value::from(Utc::now().naive_utc())
}

#[derive(Entity, Debug, Clone)]
pub struct Author {
    #[key]
    pub key: Option<Key>,
    #[field(enforce_type)]
    pub name: String,
}

#[derive(Entity, Debug, Clone)]
pub struct Article {
    #[key]
    pub key: Option<Key>,
    #[field(enforce_type)]
    pub title: String,
    pub views: i64,
    #[field(default_fn = now)]
    pub published: NaiveDateTime,
    pub tags: Vec<String>,
    pub author: Option<Key>,
}

// Set DATABASE_ENGINE=tikv and DATABASE_HOST to run against a cluster.
#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();

    let db = DB::connect(&StoreConfig::from_env()?).await?;
    db.ensure_schema(true).await?;

    let mut alice = Author {
        key: None,
        name: "Alice".to_string(),
    };
    alice.save(&db).await?;

    for (title, views) in [("Ownership", 120), ("Lifetimes", 80), ("Traits", 300)] {
        let mut article = Article::blank()?;
        article.title = title.to_string();
        article.views = views;
        article.tags = vec!["rust".to_string()];
        article.author = alice.key.clone();
        article.save(&db).await?;
    }

    let popular = Article::select(&db)
        .filter(Article::views().between(100, 1000)?)
        .order_by([Article::views().desc()])
        .execute()
        .await?;
    for article in &popular {
        println!("{:?}", article.to_dict_with(&DictOptions::new().exclude(["author"]))?);
    }

    let first = Article::get_one(&db, Article::title().eq("Lifetimes")?)
        .await?
        .and_then(|a| a.author);
    if let Some(author_key) = first {
        let author = Author::get_by_id_or_none(&db, author_key).await?;
        println!("written by {:?}", author.map(|a| a.name));
    }

    for article in Article::get_all(&db, ()).await? {
        article.delete(&db).await?;
    }
    db.close().await
}

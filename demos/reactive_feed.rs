//! # Reactive Feed Example
//!
//! A timeline that re-renders itself:
//! - `as_stream()` delivers the current tweets, then a fresh list after
//!   every change to the `tweets` table
//! - a batch put inside one transaction causes a single re-render
//! - a raw statement re-renders the feed through a tag instead of a table

use rowbus::prelude::*;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, StorageType)]
#[table(name = "tweets")]
pub struct Tweet {
    #[column(key, ignore_null)]
    pub id: Option<i64>,
    pub author: String,
    pub content: String,
}

fn tweet(author: &str, content: &str) -> Tweet {
    Tweet {
        id: None,
        author: author.to_string(),
        content: content.to_string(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("📡 rowbus Reactive Feed Example");
    println!("==============================");

    let rowbus = Rowbus::in_memory(TypeMappings::new().with::<Tweet>()).await?;
    rowbus.auto_migrate::<Tweet>(true).await?;
    let storage = rowbus.storage().clone();

    let timeline = Query::builder()
        .table("tweets")
        .order_by("id DESC")
        .observes_tags(["timeline"])
        .build()?;
    let mut feed = storage
        .get()
        .list_of_objects::<Tweet>()
        .with_query(timeline)
        .prepare()
        .as_stream();

    let writer = {
        let storage = storage.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            storage
                .put()
                .object(tweet("ann", "first!"))
                .prepare()
                .execute()
                .await?;

            tokio::time::sleep(Duration::from_millis(100)).await;
            storage
                .put()
                .objects(vec![tweet("bob", "hello"), tweet("carol", "hi all")])
                .prepare()
                .execute()
                .await?;

            tokio::time::sleep(Duration::from_millis(100)).await;
            storage
                .execute_sql()
                .with_query(
                    RawQuery::builder()
                        .query("UPDATE tweets SET content = content || ' ✨'")
                        .affects_tags(["timeline"])
                        .build()?,
                )
                .execute()
                .await?;
            Ok::<_, anyhow::Error>(())
        })
    };

    // Seed plus three re-renders
    for render in 0..4 {
        let Some(tweets) = feed.next().await else {
            break;
        };
        println!("\n🖼️  Render #{}", render);
        for tweet in tweets? {
            println!("   @{}: {}", tweet.author, tweet.content);
        }
    }

    writer.await??;
    feed.cancel();
    rowbus.close().await?;
    println!("\n🎉 Reactive feed example completed!");
    Ok(())
}

//! Integration tests for re-executing reads
//!
//! A reactive read delivers the current result first, then a fresh result
//! after every change that touches its observed tables or tags.

use rowbus::prelude::*;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone, PartialEq, StorageType)]
#[table(name = "tweets")]
pub struct Tweet {
    #[column(key, ignore_null)]
    pub id: Option<i64>,
    pub author: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, StorageType)]
#[table(name = "authors")]
pub struct Author {
    #[column(key)]
    pub name: String,
    pub followers: i64,
}

const WAIT: Duration = Duration::from_secs(5);
const QUIET: Duration = Duration::from_millis(200);

async fn open() -> Rowbus {
    let rowbus = Rowbus::in_memory(TypeMappings::new().with::<Tweet>().with::<Author>())
        .await
        .expect("Failed to open in-memory database");
    rowbus.auto_migrate::<Tweet>(false).await.expect("Failed to create tweets");
    rowbus.auto_migrate::<Author>(false).await.expect("Failed to create authors");
    rowbus
}

fn tweet(author: &str, content: &str) -> Tweet {
    Tweet {
        id: None,
        author: author.to_string(),
        content: content.to_string(),
    }
}

fn all_tweets() -> Query {
    Query::builder().table("tweets").order_by("id").build().expect("valid query")
}

async fn next_ok<R>(subscription: &mut QuerySubscription<R>) -> R
where
    R: Send + 'static,
{
    timeout(WAIT, subscription.next())
        .await
        .expect("reactive read timed out")
        .expect("stream ended early")
        .expect("query failed")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_seed_then_reemission_on_put() {
    let rowbus = open().await;
    let storage = rowbus.storage();

    let mut tweets = storage
        .get()
        .list_of_objects::<Tweet>()
        .with_query(all_tweets())
        .prepare()
        .as_stream();
    assert!(next_ok(&mut tweets).await.is_empty());

    storage
        .put()
        .object(tweet("ann", "hello"))
        .prepare()
        .execute()
        .await
        .expect("put");

    let after_put = next_ok(&mut tweets).await;
    assert_eq!(after_put.len(), 1);
    assert_eq!(after_put[0].content, "hello");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unrelated_table_does_not_reemit() {
    let rowbus = open().await;
    let storage = rowbus.storage();

    let mut tweets = storage
        .get()
        .number_of_results()
        .with_query(all_tweets())
        .prepare()
        .as_stream();
    assert_eq!(next_ok(&mut tweets).await, 0);

    storage
        .put()
        .object(Author {
            name: "ann".to_string(),
            followers: 10,
        })
        .prepare()
        .execute()
        .await
        .expect("put");

    assert!(timeout(QUIET, tweets.next()).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_tag_observation_reemits() {
    let rowbus = open().await;
    let storage = rowbus.storage();

    let feed = RawQuery::builder()
        .query("SELECT COUNT(*) AS total FROM tweets")
        .observes_tags(["feed"])
        .build()
        .expect("valid query");
    let mut counts = storage.get().cursor().with_raw_query(feed).prepare().as_stream();
    let seed = next_ok(&mut counts).await;
    assert_eq!(seed.first().and_then(|row| row.get_as::<i64>("total").ok()), Some(0));

    storage
        .execute_sql()
        .with_query(
            RawQuery::builder()
                .query("INSERT INTO tweets (author, content) VALUES (?, ?)")
                .args(["bob", "tagged"])
                .affects_tags(["feed"])
                .build()
                .expect("valid query"),
        )
        .execute()
        .await
        .expect("insert");

    let updated = next_ok(&mut counts).await;
    assert_eq!(updated.first().and_then(|row| row.get_as::<i64>("total").ok()), Some(1));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_latest_result_wins_for_slow_consumer() {
    let rowbus = open().await;
    let storage = rowbus.storage();

    let mut tweets = storage
        .get()
        .list_of_objects::<Tweet>()
        .with_query(all_tweets())
        .prepare()
        .as_stream();
    assert!(next_ok(&mut tweets).await.is_empty());

    for content in ["one", "two", "three"] {
        storage
            .put()
            .object(tweet("ann", content))
            .prepare()
            .execute()
            .await
            .expect("put");
    }

    // Intermediate results may be skipped, the final state always arrives
    let mut latest = next_ok(&mut tweets).await;
    while latest.len() < 3 {
        latest = next_ok(&mut tweets).await;
    }
    assert_eq!(latest.len(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_ends_stream() {
    let rowbus = open().await;
    let storage = rowbus.storage();

    let mut tweets = storage
        .get()
        .list_of_objects::<Tweet>()
        .with_query(all_tweets())
        .prepare()
        .as_stream();
    next_ok(&mut tweets).await;

    tweets.cancel();
    assert!(tweets.is_cancelled());
    assert!(timeout(WAIT, tweets.next()).await.expect("completes").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_cancel_right_after_seed_ignores_later_writes() {
    let rowbus = open().await;
    let storage = rowbus.storage();

    let mut tweets = storage
        .get()
        .list_of_objects::<Tweet>()
        .with_query(all_tweets())
        .prepare()
        .as_stream();
    assert!(next_ok(&mut tweets).await.is_empty());
    tweets.cancel();

    storage
        .put()
        .object(tweet("ann", "after cancel"))
        .prepare()
        .execute()
        .await
        .expect("put");

    assert!(timeout(WAIT, tweets.next()).await.expect("completes").is_none());
    assert!(timeout(QUIET, tweets.next()).await.expect("stays complete").is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_failed_read_terminates_only_its_subscriber() {
    let rowbus = open().await;
    let storage = rowbus.storage();

    let broken = Query::builder()
        .table("missing_table")
        .observes_tables(["tweets"])
        .build()
        .expect("valid query");
    let mut failing = storage.get().cursor().with_query(broken).prepare().as_stream();
    let mut healthy = storage
        .get()
        .number_of_results()
        .with_query(all_tweets())
        .prepare()
        .as_stream();

    let first = timeout(WAIT, failing.next()).await.expect("delivered").expect("one item");
    let error = first.expect_err("table does not exist");
    assert_eq!(error.kind(), OperationKind::Get);
    assert!(timeout(WAIT, failing.next()).await.expect("completes").is_none());

    assert_eq!(next_ok(&mut healthy).await, 0);
    storage
        .put()
        .object(tweet("ann", "still here"))
        .prepare()
        .execute()
        .await
        .expect("put");
    assert_eq!(next_ok(&mut healthy).await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_transaction_reemits_once_after_commit() {
    let rowbus = open().await;
    let storage = rowbus.storage();

    let mut count = storage
        .get()
        .number_of_results()
        .with_query(all_tweets())
        .prepare()
        .as_stream();
    assert_eq!(next_ok(&mut count).await, 0);

    storage
        .put()
        .objects(vec![tweet("ann", "a"), tweet("ann", "b"), tweet("ann", "c")])
        .prepare()
        .execute()
        .await
        .expect("put batch");

    assert_eq!(next_ok(&mut count).await, 3);
    assert!(timeout(QUIET, count.next()).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_explicit_transaction_reemits_after_outermost_end() {
    let rowbus = open().await;
    let storage = rowbus.storage();

    let mut count = storage
        .get()
        .number_of_results()
        .with_query(all_tweets())
        .prepare()
        .as_stream();
    assert_eq!(next_ok(&mut count).await, 0);

    let transaction = storage.low_level().begin_transaction().await.expect("begin");
    for content in ["a", "b"] {
        transaction
            .storage()
            .put()
            .object(tweet("ann", content))
            .prepare()
            .execute()
            .await
            .expect("put");
    }
    assert!(timeout(QUIET, count.next()).await.is_err());

    transaction.set_successful().expect("open");
    transaction.end().await.expect("commit");
    assert_eq!(next_ok(&mut count).await, 2);
    assert!(timeout(QUIET, count.next()).await.is_err());
}

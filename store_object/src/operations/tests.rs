use crate::errors::{DbError, OperationKind};
use crate::interceptors::{Chain, Interceptor, InterceptorOutput, OperationInfo};
use crate::mapping::{TypeMapping, TypeMappings};
use crate::queries::{DeleteQuery, InsertQuery, Query, RawQuery, UpdateQuery};
use crate::resolvers::{DefaultDeleteResolver, DefaultGetResolver, DefaultPutResolver, PutResolver};
use crate::results::PutResult;
use crate::row_store::SqliteRowStore;
use crate::storage::Storage;
use crate::OperationError;
use async_trait::async_trait;
use changes_bus::{Changes, ChangesSubscription};
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use type_mapping::ContentValues;

#[derive(Debug, Clone, PartialEq)]
struct User {
    id: Option<i64>,
    email: String,
}

impl User {
    fn new(email: &str) -> Self {
        Self {
            id: None,
            email: email.to_string(),
        }
    }
}

fn user_put_resolver() -> DefaultPutResolver<User> {
    DefaultPutResolver::new(
        |_: &User| Ok(InsertQuery::builder().table("users").build()?),
        |user: &User| {
            Ok(UpdateQuery::builder()
                .table("users")
                .where_clause("id = ?")
                .where_args([user.id])
                .build()?)
        },
        |user: &User| {
            if user.email.is_empty() {
                return Err(DbError::custom("email is required"));
            }
            let mut values = ContentValues::new().with("email", user.email.clone());
            if let Some(id) = user.id {
                values.put("id", id);
            }
            Ok(values)
        },
    )
}

fn user_mapping() -> TypeMapping<User> {
    TypeMapping::new(
        user_put_resolver(),
        DefaultGetResolver::new(|row| {
            Ok(User {
                id: Some(row.get_as("id")?),
                email: row.get_as("email")?,
            })
        }),
        DefaultDeleteResolver::new(|user: &User| {
            Ok(DeleteQuery::builder()
                .table("users")
                .where_clause("id = ?")
                .where_args([user.id])
                .build()?)
        }),
    )
}

async fn storage() -> Storage {
    let row_store = SqliteRowStore::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    let storage = Storage::builder(row_store)
        .type_mappings(TypeMappings::new().with_mapping(user_mapping()))
        .build();
    storage
        .execute_sql()
        .with_query(
            RawQuery::builder()
                .query("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)")
                .build()
                .expect("valid query"),
        )
        .execute()
        .await
        .expect("create table");
    storage
}

fn all_users() -> Query {
    Query::builder().table("users").order_by("id").build().expect("valid query")
}

fn record(storage: &Storage) -> (Arc<Mutex<Vec<Changes>>>, ChangesSubscription) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let subscription = storage
        .changes_bus()
        .subscribe(move |changes| sink.lock().push(changes.clone()));
    (seen, subscription)
}

#[tokio::test]
async fn test_put_inserts_then_updates() {
    let storage = storage().await;

    let inserted = storage
        .put()
        .object(User::new("ann@example.com"))
        .prepare()
        .execute()
        .await
        .expect("put");
    assert!(inserted.was_inserted());
    assert_eq!(inserted.inserted_id(), Some(1));

    let renamed = User {
        id: Some(1),
        email: "ann@example.org".to_string(),
    };
    let updated = storage.put().object(renamed.clone()).prepare().execute().await.expect("put");
    assert!(updated.was_updated());
    assert_eq!(updated.rows_updated(), Some(1));

    let users = storage
        .get()
        .list_of_objects::<User>()
        .with_query(all_users())
        .prepare()
        .execute()
        .await
        .expect("get");
    assert_eq!(users, vec![renamed]);
}

#[tokio::test]
async fn test_put_announces_affected_table_once() {
    let storage = storage().await;
    let (seen, _subscription) = record(&storage);

    storage
        .put()
        .object(User::new("bob@example.com"))
        .prepare()
        .execute()
        .await
        .expect("put");

    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], Changes::for_table("users").expect("valid"));
}

#[tokio::test]
async fn test_transactional_batch_announces_once() {
    let storage = storage().await;
    let (seen, _subscription) = record(&storage);

    let results = storage
        .put()
        .objects(vec![User::new("a@x.io"), User::new("b@x.io"), User::new("c@x.io")])
        .prepare()
        .execute()
        .await
        .expect("put batch");

    assert_eq!(results.number_of_inserts(), 3);
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_batch_without_transaction_announces_each_object() {
    let storage = storage().await;
    let (seen, _subscription) = record(&storage);

    storage
        .put()
        .objects(vec![User::new("a@x.io"), User::new("b@x.io")])
        .use_transaction(false)
        .prepare()
        .execute()
        .await
        .expect("put batch");

    assert_eq!(seen.lock().len(), 2);
}

#[tokio::test]
async fn test_failed_transactional_batch_leaves_nothing_behind() {
    let storage = storage().await;
    let (seen, _subscription) = record(&storage);

    let error = storage
        .put()
        .objects(vec![User::new("a@x.io"), User::new("")])
        .prepare()
        .execute()
        .await
        .expect_err("second object is rejected");
    assert_eq!(error.kind(), OperationKind::Put);
    assert!(error.context().starts_with("objects = "));

    let count = storage
        .get()
        .number_of_results()
        .with_query(all_users())
        .prepare()
        .execute()
        .await
        .expect("count");
    assert_eq!(count, 0);
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_batch_without_transaction_keeps_objects_before_the_failure() {
    let storage = storage().await;
    let (seen, _subscription) = record(&storage);

    let error = storage
        .put()
        .objects(vec![User::new("a@x.io"), User::new(""), User::new("c@x.io")])
        .use_transaction(false)
        .prepare()
        .execute()
        .await
        .expect_err("second object is rejected");
    assert!(matches!(error.cause(), DbError::Custom(_)));

    let users = storage
        .get()
        .list_of_objects::<User>()
        .with_query(all_users())
        .prepare()
        .execute()
        .await
        .expect("get");
    assert_eq!(
        users,
        vec![User {
            id: Some(1),
            email: "a@x.io".to_string(),
        }]
    );
    let seen = seen.lock();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0], Changes::for_table("users").expect("valid"));
}

/// Rejects "slow@x.io" after a pause, everything else goes to the default resolver
struct SlowRejection;

#[async_trait]
impl PutResolver<User> for SlowRejection {
    async fn perform_put(&self, storage: &Storage, user: &User) -> Result<PutResult, DbError> {
        if user.email == "slow@x.io" {
            tokio::time::sleep(Duration::from_millis(100)).await;
            return Err(DbError::custom("rejected"));
        }
        user_put_resolver().perform_put(storage, user).await
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_put_during_another_transaction_is_not_rolled_back_with_it() {
    let storage = storage().await;
    let (seen, _subscription) = record(&storage);

    let batch = tokio::spawn({
        let storage = storage.clone();
        async move {
            storage
                .put()
                .objects(vec![User::new("a@x.io"), User::new("slow@x.io")])
                .with_put_resolver(SlowRejection)
                .prepare()
                .execute()
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let single = storage
        .put()
        .object(User::new("bob@x.io"))
        .prepare()
        .execute()
        .await
        .expect("single put commits on its own");
    assert!(single.was_inserted());
    batch
        .await
        .expect("batch task")
        .expect_err("batch is rejected");

    let emails: Vec<String> = storage
        .get()
        .list_of_objects::<User>()
        .with_query(all_users())
        .prepare()
        .execute()
        .await
        .expect("get")
        .into_iter()
        .map(|user| user.email)
        .collect();
    assert_eq!(emails, vec!["bob@x.io".to_string()]);
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_transaction_ended_without_success_reports_rollback() {
    let storage = storage().await;
    let (seen, _subscription) = record(&storage);

    let transaction = storage.low_level().begin_transaction().await.expect("begin");
    assert!(transaction.is_outermost());
    assert!(transaction.low_level().in_transaction());
    assert!(!storage.low_level().in_transaction());

    let nested = transaction.low_level().begin_transaction().await.expect("nested");
    assert!(!nested.is_outermost());
    transaction
        .storage()
        .put()
        .object(User::new("a@x.io"))
        .prepare()
        .execute()
        .await
        .expect("put inside the transaction");
    nested.set_successful().expect("open");
    nested.end().await.expect("inner level ends");

    let error = transaction.end().await.expect_err("outer level was not successful");
    assert!(matches!(error, DbError::RolledBack));

    let count = storage
        .get()
        .number_of_results()
        .with_query(all_users())
        .prepare()
        .execute()
        .await
        .expect("count");
    assert_eq!(count, 0);
    assert!(seen.lock().is_empty());
}

#[tokio::test]
async fn test_dropped_transaction_releases_the_connection() {
    let storage = storage().await;

    let transaction = storage.low_level().begin_transaction().await.expect("begin");
    transaction
        .storage()
        .put()
        .object(User::new("a@x.io"))
        .prepare()
        .execute()
        .await
        .expect("put inside the transaction");
    drop(transaction);

    let put = tokio::time::timeout(
        Duration::from_secs(5),
        storage.put().object(User::new("b@x.io")).prepare().execute(),
    )
    .await
    .expect("connection released")
    .expect("put");
    assert_eq!(put.inserted_id(), Some(1));
}

#[tokio::test]
async fn test_number_of_results_honours_filter_and_limit() {
    let storage = storage().await;
    storage
        .put()
        .objects(vec![User::new("a@x.io"), User::new("b@x.io"), User::new("c@y.io")])
        .prepare()
        .execute()
        .await
        .expect("put batch");

    let count = |query: Query| {
        let prepared = storage.get().number_of_results().with_query(query).prepare();
        async move { prepared.execute().await.expect("count") }
    };
    let matching = Query::builder()
        .table("users")
        .where_clause("email LIKE ?")
        .where_args(["%@x.io"])
        .build()
        .expect("valid query");
    assert_eq!(count(matching).await, 2);

    let limited = Query::builder().table("users").limit(2).build().expect("valid query");
    assert_eq!(count(limited).await, 2);

    let none = Query::builder()
        .table("users")
        .where_clause("id > ?")
        .where_args([10i64])
        .build()
        .expect("valid query");
    assert_eq!(count(none).await, 0);

    let raw = storage
        .get()
        .number_of_results()
        .with_raw_query(RawQuery::builder().query("SELECT * FROM users").build().expect("valid query"))
        .prepare()
        .execute()
        .await
        .expect("count");
    assert_eq!(raw, 3);
}

#[tokio::test]
async fn test_delete_announces_only_when_rows_were_deleted() {
    let storage = storage().await;
    storage
        .put()
        .object(User::new("gone@example.com"))
        .prepare()
        .execute()
        .await
        .expect("put");
    let (seen, _subscription) = record(&storage);

    let stored = User {
        id: Some(1),
        email: "gone@example.com".to_string(),
    };
    let deleted = storage.delete().object(stored.clone()).prepare().execute().await.expect("delete");
    assert_eq!(deleted.rows_deleted(), 1);

    let again = storage.delete().object(stored).prepare().execute().await.expect("delete");
    assert_eq!(again.rows_deleted(), 0);
    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_delete_by_query() {
    let storage = storage().await;
    storage
        .put()
        .objects(vec![User::new("a@x.io"), User::new("b@y.io"), User::new("c@x.io")])
        .prepare()
        .execute()
        .await
        .expect("put batch");

    let result = storage
        .delete()
        .by_query(
            DeleteQuery::builder()
                .table("users")
                .where_clause("email LIKE ?")
                .where_args(["%@x.io"])
                .build()
                .expect("valid query"),
        )
        .prepare()
        .execute()
        .await
        .expect("delete");
    assert_eq!(result.rows_deleted(), 2);

    let left = storage
        .get()
        .object::<User>()
        .with_query(all_users())
        .prepare()
        .execute()
        .await
        .expect("get");
    assert_eq!(left.map(|u| u.email), Some("b@y.io".to_string()));
}

#[tokio::test]
async fn test_missing_type_mapping_is_reported() {
    let storage = storage().await;
    let error = storage
        .get()
        .list_of_objects::<String>()
        .with_query(all_users())
        .prepare()
        .execute()
        .await
        .expect_err("no mapping for String");

    assert_eq!(error.kind(), OperationKind::Get);
    assert!(error.context().starts_with("query = "));
    assert!(matches!(error.cause(), DbError::MissingTypeMapping { .. }));
}

#[tokio::test]
async fn test_execute_sql_announces_declared_tables() {
    let storage = storage().await;
    let (seen, _subscription) = record(&storage);

    let inserted = storage
        .execute_sql()
        .with_query(
            RawQuery::builder()
                .query("INSERT INTO users (email) VALUES (?)")
                .args(["raw@example.com"])
                .affects_tables(["users"])
                .build()
                .expect("valid query"),
        )
        .execute()
        .await
        .expect("execute");
    assert_eq!(inserted, 1);

    storage
        .execute_sql()
        .with_query(
            RawQuery::builder()
                .query("UPDATE users SET email = email")
                .build()
                .expect("valid query"),
        )
        .execute()
        .await
        .expect("execute");

    assert_eq!(seen.lock().len(), 1);
}

#[tokio::test]
async fn test_cursor_read_with_raw_query() {
    let storage = storage().await;
    storage
        .put()
        .objects(vec![User::new("a@x.io"), User::new("b@x.io")])
        .prepare()
        .execute()
        .await
        .expect("put batch");

    let mut cursor = storage
        .get()
        .cursor()
        .with_raw_query(
            RawQuery::builder()
                .query("SELECT email FROM users WHERE id > ?")
                .args([1i64])
                .build()
                .expect("valid query"),
        )
        .prepare()
        .execute()
        .await
        .expect("cursor");

    assert_eq!(cursor.count(), 1);
    let row = cursor.move_to_next().expect("one row");
    assert_eq!(row.get_as::<String>("email").expect("text"), "b@x.io");
}

#[tokio::test]
async fn test_reactive_read_re_executes_on_change() {
    let storage = storage().await;
    let mut stream = storage
        .get()
        .list_of_objects::<User>()
        .with_query(all_users())
        .prepare()
        .as_stream();

    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("initial result")
        .expect("stream open")
        .expect("query succeeds");
    assert!(first.is_empty());

    storage
        .put()
        .object(User::new("live@example.com"))
        .prepare()
        .execute()
        .await
        .expect("put");

    let second = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("re-executed result")
        .expect("stream open")
        .expect("query succeeds");
    assert_eq!(second.len(), 1);
}

#[tokio::test]
async fn test_reactive_read_completes_when_storage_closes() {
    let storage = storage().await;
    let mut stream = storage
        .get()
        .number_of_results()
        .with_query(all_users())
        .prepare()
        .as_stream();

    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("initial result")
        .expect("stream open");
    assert_eq!(first.expect("count"), 0);

    storage.close().await.expect("close");

    let end = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("stream completes");
    assert!(end.is_none());
}

#[tokio::test]
async fn test_reactive_read_without_observed_sets_completes_after_first_result() {
    let storage = storage().await;
    let mut stream = storage
        .get()
        .number_of_results()
        .with_raw_query(RawQuery::builder().query("SELECT 1").build().expect("valid query"))
        .prepare()
        .as_stream();

    let first = tokio::time::timeout(Duration::from_secs(5), stream.next())
        .await
        .expect("initial result")
        .expect("stream open");
    assert_eq!(first.expect("count"), 1);
    assert!(stream.next().await.is_none());
}

struct Counting(Arc<AtomicUsize>);

#[async_trait]
impl Interceptor for Counting {
    async fn intercept(
        &self,
        _operation: &OperationInfo,
        chain: Chain<'_>,
    ) -> Result<InterceptorOutput, OperationError> {
        self.0.fetch_add(1, Ordering::SeqCst);
        chain.proceed().await
    }
}

#[tokio::test]
async fn test_interceptors_see_every_operation() {
    let calls = Arc::new(AtomicUsize::new(0));
    let row_store = SqliteRowStore::connect("sqlite::memory:")
        .await
        .expect("in-memory database");
    let storage = Storage::builder(row_store)
        .type_mappings(TypeMappings::new().with_mapping(user_mapping()))
        .add_interceptor(Counting(Arc::clone(&calls)))
        .build();

    storage
        .execute_sql()
        .with_query(
            RawQuery::builder()
                .query("CREATE TABLE users (id INTEGER PRIMARY KEY, email TEXT NOT NULL)")
                .build()
                .expect("valid query"),
        )
        .execute()
        .await
        .expect("create table");
    storage
        .put()
        .object(User::new("seen@example.com"))
        .prepare()
        .execute()
        .await
        .expect("put");
    let users = storage
        .get()
        .list_of_objects::<User>()
        .with_query(all_users())
        .prepare()
        .execute()
        .await
        .expect("get");

    assert_eq!(users.len(), 1);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_blocking_from_current_thread_runtime_is_refused() {
    let storage = storage().await;
    let error = storage
        .get()
        .number_of_results()
        .with_query(all_users())
        .prepare()
        .execute_as_blocking()
        .expect_err("current-thread runtime cannot block");
    assert!(matches!(error.cause(), DbError::BlockingInAsyncContext));
}

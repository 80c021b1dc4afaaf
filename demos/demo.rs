use rowbus::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, PartialEq, StorageType)]
#[table(name = "users")]
pub struct User {
    #[column(key, ignore_null)]
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
}

/// Counts every operation that passes through the storage
struct CountingInterceptor {
    seen: Arc<AtomicUsize>,
}

#[async_trait]
impl Interceptor for CountingInterceptor {
    async fn intercept(
        &self,
        operation: &OperationInfo,
        chain: Chain<'_>,
    ) -> Result<InterceptorOutput, OperationError> {
        let n = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
        println!("🔎 #{} {} {}", n, operation.kind(), operation.description());
        chain.proceed().await
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("🚀 rowbus Demo\n");

    // rowbus.toml when present, otherwise a private in-memory database
    let config = AppConfig::load().unwrap_or_else(|_| AppConfig::in_memory());
    let seen = Arc::new(AtomicUsize::new(0));

    let counter = CountingInterceptor { seen: Arc::clone(&seen) };
    let rowbus = Rowbus::open_with(&config, TypeMappings::new().with::<User>(), |builder| {
        builder.add_interceptor(counter)
    })
    .await?;
    let storage = rowbus.storage();
    rowbus.health_check().await?;
    rowbus.auto_migrate::<User>(true).await?;
    println!("✅ Database ready at {}", config.database.url);

    // Change notifications
    let _subscription = storage.changes_bus().subscribe(|changes| {
        println!("🔔 {}", changes);
    });

    // Put
    let results = storage
        .put()
        .objects(vec![
            User {
                id: None,
                name: "John Doe".to_string(),
                email: "john@example.com".to_string(),
            },
            User {
                id: None,
                name: "Jane Roe".to_string(),
                email: "jane@example.com".to_string(),
            },
        ])
        .prepare()
        .execute()
        .await?;
    println!("✅ Inserted {} users", results.number_of_inserts());

    // Get
    let users = storage
        .get()
        .list_of_objects::<User>()
        .with_query(Query::builder().table("users").order_by("name").build()?)
        .prepare()
        .execute()
        .await?;
    for user in &users {
        println!("   {} <{}>", user.name, user.email);
    }

    // Execute SQL, announcing the table it touched
    let renamed = storage
        .execute_sql()
        .with_query(
            RawQuery::builder()
                .query("UPDATE users SET name = upper(name)")
                .affects_tables(["users"])
                .build()?,
        )
        .execute()
        .await?;
    println!("✅ Renamed {} users", renamed);

    // Delete
    let deleted = storage.delete().objects(users).prepare().execute().await?;
    println!("✅ Deleted {} users", deleted.number_of_rows_deleted());

    println!("\n🎉 Demo completed after {} operations", seen.load(Ordering::SeqCst));
    rowbus.close().await?;
    Ok(())
}

//! # Basic Usage Example
//!
//! This example demonstrates the fundamental concepts of rowbus:
//! - Defining storage types with `#[derive(StorageType)]`
//! - Registering type mappings and opening a storage
//! - Put, Get and Delete through prepared operations
//! - Counting rows and reading raw cursors
//!
//! This is the perfect starting point for new users.

use rowbus::prelude::*;

/// A simple user model demonstrating basic field types
#[derive(Debug, Clone, PartialEq, StorageType)]
#[table(name = "users")]
pub struct User {
    /// Row id, assigned by SQLite on insert
    #[column(name = "_id", key, ignore_null)]
    pub id: Option<i64>,

    pub name: String,

    pub email: String,

    /// Optional field - demonstrates nullable columns
    pub phone: Option<String>,

    pub age: Option<i32>,
}

fn by_id(id: i64) -> Result<Query, QueryError> {
    Query::builder()
        .table("users")
        .where_clause("\"_id\" = ?")
        .where_args([id])
        .build()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("🚀 rowbus Basic Usage Example");
    println!("=============================");

    // 1. Setup
    println!("\n📊 Step 1: Database Setup");
    println!("--------------------------");

    let rowbus = Rowbus::in_memory(TypeMappings::new().with::<User>()).await?;
    rowbus.auto_migrate::<User>(true).await?;
    let storage = rowbus.storage();
    println!("✅ Opened in-memory SQLite database with 'users' table");

    // 2. Put
    println!("\n📝 Step 2: Creating Records");
    println!("---------------------------");

    let alice = User {
        id: None,
        name: "Alice Johnson".to_string(),
        email: "alice@example.com".to_string(),
        phone: Some("+1-555-0123".to_string()),
        age: Some(28),
    };
    let put = storage.put().object(alice).prepare().execute().await?;
    let alice_id = put.inserted_id().ok_or("alice was not inserted")?;
    println!("✅ Inserted Alice with id {}", alice_id);

    let results = storage
        .put()
        .objects(vec![
            User {
                id: None,
                name: "Bob Smith".to_string(),
                email: "bob@example.com".to_string(),
                phone: None,
                age: Some(35),
            },
            User {
                id: None,
                name: "Carol White".to_string(),
                email: "carol@example.com".to_string(),
                phone: None,
                age: None,
            },
        ])
        .prepare()
        .execute()
        .await?;
    println!("✅ Inserted {} more users in one transaction", results.number_of_inserts());

    // 3. Get
    println!("\n🔍 Step 3: Reading Records");
    println!("--------------------------");

    let found = storage
        .get()
        .object::<User>()
        .with_query(by_id(alice_id)?)
        .prepare()
        .execute()
        .await?;
    if let Some(user) = &found {
        println!("✅ Found: {} <{}>", user.name, user.email);
    }

    let adults = storage
        .get()
        .list_of_objects::<User>()
        .with_query(
            Query::builder()
                .table("users")
                .where_clause("age >= ?")
                .where_args([30])
                .order_by("name")
                .build()?,
        )
        .prepare()
        .execute()
        .await?;
    println!("✅ Users aged 30 or more: {}", adults.len());

    // 4. Update - a put with an existing key updates the row
    println!("\n✏️  Step 4: Updating Records");
    println!("---------------------------");

    if let Some(mut user) = found {
        user.age = Some(29);
        let updated = storage.put().object(user).prepare().execute().await?;
        println!("✅ Rows updated: {}", updated.rows_updated().unwrap_or(0));
    }

    // 5. Count and raw cursor
    println!("\n📈 Step 5: Counting and Raw Queries");
    println!("-----------------------------------");

    let total = storage
        .get()
        .number_of_results()
        .with_query(Query::builder().table("users").build()?)
        .prepare()
        .execute()
        .await?;
    println!("✅ Total users: {}", total);

    let mut cursor = storage
        .get()
        .cursor()
        .with_raw_query(
            RawQuery::builder()
                .query("SELECT name, COALESCE(age, 0) AS age FROM users ORDER BY name")
                .build()?,
        )
        .prepare()
        .execute()
        .await?;
    while let Some(row) = cursor.move_to_next() {
        println!("   {} ({})", row.get_as::<String>("name")?, row.get_as::<i64>("age")?);
    }

    // 6. Delete
    println!("\n🗑️  Step 6: Deleting Records");
    println!("----------------------------");

    let deleted = storage
        .delete()
        .by_query(
            DeleteQuery::builder()
                .table("users")
                .where_clause("age IS NULL")
                .build()?,
        )
        .prepare()
        .execute()
        .await?;
    println!("✅ Deleted {} user(s) without an age", deleted.rows_deleted());

    rowbus.close().await?;
    println!("\n🎉 Basic usage example completed!");
    Ok(())
}

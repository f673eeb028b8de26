//! Basic usage example
//!
//! This example demonstrates:
//! - Building parameterized queries incrementally
//! - Composing nested fragments and value lists
//! - Blocking and cancellable execution
//! - Transactions bound to one connection
//!
//! Run with: cargo run --example basic_usage

use rust_query_executor::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<()> {
    println!("=== Rust Query Executor - Basic Usage Example ===\n");

    let dir = tempfile::tempdir().map_err(|e| DatabaseError::other(e.to_string()))?;
    let path = dir.path().join("demo.db");

    let config = ExecutorConfig::new()
        .with_command_timeout(Duration::from_secs(5))
        .with_trace_service(Arc::new(LoggingTraceService::new()));
    let executor = SqliteExecutor::sqlite(path.to_string_lossy().to_string(), config)?;

    // Create table
    println!("1. Creating orders table...");
    executor
        .execute(ParameterizedQuery::from_text(
            "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer TEXT NOT NULL, total REAL)",
        ))?
        .close()?;
    println!("   ✓ Table created\n");

    // Insert rows inside one transaction
    println!("2. Inserting orders in a transaction...");
    let mut tx = executor.create_transaction();
    tx.begin()?;
    for (id, customer, total) in [(1, "Alice", 120.5), (2, "Bob", 80.0), (3, "Carol #1", 42.0)] {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("INSERT INTO orders (id, customer, total) VALUES (");
        builder.append_parameter(&id)?;
        builder.append_text(", ");
        builder.append_parameter(customer)?;
        builder.append_text(", ");
        builder.append_parameter(&total)?;
        builder.append_text(")");
        tx.execute(builder.create_query())?.close()?;
    }
    tx.commit()?;
    println!("   ✓ 3 orders committed\n");

    // Compose a query from fragments
    println!("3. Querying with a nested filter and a value list...");
    let filter = ParameterizedQueryBuilder::new();
    filter.append_text("total > ");
    filter.append_parameter(&50.0)?;
    let filter = filter.create_query();

    let builder = ParameterizedQueryBuilder::new();
    builder.append_text("SELECT id, customer FROM orders WHERE id IN (");
    builder.append_partial(&ValueList::new([1, 2, 3])?)?;
    builder.append_text(") AND ");
    builder.append_partial(&filter)?;
    builder.append_text(" ORDER BY id");
    let query = builder.create_query();
    println!("   Template: {}", query.text());

    let token = CancellationToken::new();
    let mut context = executor.execute_async(query, &token).await?;
    while let Some(row) = context.next_row() {
        let id = row.get("id").and_then(|v| v.as_long()).unwrap_or_default();
        let customer = row.get("customer").map(|v| v.as_string()).unwrap_or_default();
        println!("   - #{}: {}", id, customer);
    }
    context.close()?;

    // Call a scalar function by name
    println!("\n4. Calling a routine with named arguments...");
    let call = StoredProcedureQuery::new("max")?
        .with_parameter("a", &7)?
        .with_parameter("b", &13)?;
    let mut context = executor.execute(call)?;
    if let Some(row) = context.next_row() {
        for value in row.values() {
            println!("   max(7, 13) = {}", value.as_string());
        }
    }
    context.close()?;

    println!("\n✓ Example completed successfully!");
    Ok(())
}

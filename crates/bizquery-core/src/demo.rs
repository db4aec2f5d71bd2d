//! Demo store provisioning.
//!
//! Creates the four tables the prompt describes and fills them with a
//! handful of rows, including one sale whose `date` is deliberately not a
//! date so the injected glob filter has something to exclude. This is the
//! only write path in the crate and is never reached from the pipeline.

use rusqlite::{Connection, params};
use tracing::info;

const SCHEMA_SQL: &str = r#"
CREATE TABLE products (
    id INTEGER PRIMARY KEY,
    name TEXT,
    price REAL
);

CREATE TABLE customers (
    id INTEGER PRIMARY KEY,
    name TEXT,
    email TEXT,
    regn TEXT,
    age INTEGER,
    status TEXT,
    last_transaction_date TEXT
);

CREATE TABLE regions (
    id INTEGER PRIMARY KEY,
    name TEXT,
    manager TEXT
);

CREATE TABLE sales (
    id INTEGER PRIMARY KEY,
    customer_id INTEGER,
    product_id INTEGER,
    xx23 REAL,
    "123sales" REAL,
    date TEXT,
    FOREIGN KEY(customer_id) REFERENCES customers(id),
    FOREIGN KEY(product_id) REFERENCES products(id)
);
"#;

const PRODUCTS: [(&str, f64); 3] = [("Widget", 19.99), ("Gadget", 49.5), ("Gizmo", 120.0)];

const CUSTOMERS: [(&str, &str, &str, i64, &str, &str); 3] = [
    ("Ada Park", "ada@example.com", "North", 34, "active", "2024-02-20"),
    ("Ben Ortiz", "ben@example.com", "South", 51, "active", "2024-01-10"),
    ("Chen Wu", "chen@example.com", "West", 27, "churned", "2023-11-02"),
];

const REGIONS: [(&str, &str); 3] = [("North", "Dana"), ("South", "Eli"), ("West", "Farah")];

const SALES: [(i64, i64, Option<f64>, Option<f64>, &str); 4] = [
    (1, 1, Some(123.45), Some(200.5), "2024-01-01"),
    (2, 2, Some(300.0), None, "2024-01-10"),
    (1, 3, Some(400.0), Some(500.0), "not_a_date"),
    (3, 1, None, Some(600.0), "2024-02-20"),
];

/// Create the demo tables and rows on `conn` in one transaction.
pub fn provision(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    {
        let mut insert = tx.prepare("INSERT INTO products (name, price) VALUES (?1, ?2)")?;
        for (name, price) in PRODUCTS {
            insert.execute(params![name, price])?;
        }

        let mut insert = tx.prepare(
            "INSERT INTO customers (name, email, regn, age, status, last_transaction_date)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (name, email, regn, age, status, last) in CUSTOMERS {
            insert.execute(params![name, email, regn, age, status, last])?;
        }

        let mut insert = tx.prepare("INSERT INTO regions (name, manager) VALUES (?1, ?2)")?;
        for (name, manager) in REGIONS {
            insert.execute(params![name, manager])?;
        }

        let mut insert = tx.prepare(
            r#"INSERT INTO sales (customer_id, product_id, xx23, "123sales", date)
               VALUES (?1, ?2, ?3, ?4, ?5)"#,
        )?;
        for (customer, product, xx23, sales, date) in SALES {
            insert.execute(params![customer, product, xx23, sales, date])?;
        }
    }
    tx.commit()?;
    info!(
        products = PRODUCTS.len(),
        customers = CUSTOMERS.len(),
        regions = REGIONS.len(),
        sales = SALES.len(),
        "demo schema provisioned"
    );
    Ok(())
}

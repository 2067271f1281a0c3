//! # Seed Data Generator
//!
//! Populates a development database with demo materials and drink recipes.
//!
//! ## Usage
//! ```bash
//! # Seed ./pearl_dev.db (default)
//! cargo run -p pearl-db --bin seed
//!
//! # Specify database path
//! cargo run -p pearl-db --bin seed -- --db ./data/pearl.db
//! ```
//!
//! ## Generated Data
//! - Five materials with opening balances (each written as an `In` record)
//! - Recipes for three drinks, e.g. `milk-tea` uses 30 g of tapioca pearls

use std::collections::HashMap;
use std::env;

use chrono::Utc;
use pearl_core::{NewMaterial, Quantity};
use pearl_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

/// (name, unit, opening stock, alert threshold), whole units
const MATERIALS: &[(&str, &str, i64, i64)] = &[
    ("Tapioca pearls", "g", 1000, 200),
    ("Whole milk", "ml", 5000, 1000),
    ("Black tea", "g", 800, 100),
    ("Brown sugar syrup", "ml", 2000, 300),
    ("Cups", "pcs", 300, 50),
];

/// (product id, material name, quantity per item), whole units
const RECIPES: &[(&str, &str, i64)] = &[
    ("milk-tea", "Tapioca pearls", 30),
    ("milk-tea", "Whole milk", 150),
    ("milk-tea", "Black tea", 10),
    ("milk-tea", "Cups", 1),
    ("brown-sugar-milk", "Tapioca pearls", 40),
    ("brown-sugar-milk", "Whole milk", 200),
    ("brown-sugar-milk", "Brown sugar syrup", 30),
    ("brown-sugar-milk", "Cups", 1),
    ("black-tea", "Black tea", 12),
    ("black-tea", "Cups", 1),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./pearl_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Pearl POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./pearl_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Pearl POS Seed Data Generator");
    println!("================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.materials().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} materials", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Creating materials...");

    let mut ids: HashMap<&str, String> = HashMap::new();
    for (name, unit, opening, threshold) in MATERIALS {
        let material = db
            .materials()
            .create(
                &NewMaterial {
                    name: name.to_string(),
                    unit: unit.to_string(),
                    opening_stock: Quantity::from_units(*opening),
                    alert_threshold: Quantity::from_units(*threshold),
                },
                Utc::now(),
            )
            .await?;
        println!("  {} ({} {})", material.name, material.current_stock, material.unit);
        ids.insert(name, material.id);
    }

    println!();
    println!("Creating recipes...");

    for (product_id, material_name, quantity) in RECIPES {
        let Some(material_id) = ids.get(material_name) else {
            eprintln!("Unknown material in recipe: {}", material_name);
            continue;
        };
        db.recipes()
            .upsert(product_id, material_id, Quantity::from_units(*quantity))
            .await?;
    }
    println!("  {} recipe rows", RECIPES.len());

    let summary = db.materials().status_summary().await?;
    println!();
    println!(
        "✓ Seed complete! {} materials, {} low on stock",
        summary.total, summary.low_stock
    );

    db.close().await;
    Ok(())
}

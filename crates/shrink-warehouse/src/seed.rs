//! Deterministic sample data for local runs and tests.

use chrono::{Duration, NaiveDate};
use tracing::info;

use crate::db::Database;
use crate::error::WarehouseError;

const STORES: [(u32, &str, &str); 8] = [
    (1, "Bentonville Supercenter", "Central"),
    (2, "Rogers Supercenter", "Central"),
    (3, "Springdale Neighborhood", "Central"),
    (4, "Tulsa Midtown", "South"),
    (5, "Joplin Supercenter", "Central"),
    (6, "Fort Smith East", "South"),
    (7, "Fayetteville North", "Central"),
    (8, "Little Rock West", "South"),
];

const DEPARTMENTS: [(u32, &str); 6] = [
    (1, "Candy and Tobacco"),
    (7, "Toys"),
    (13, "Household Chemicals"),
    (46, "Cosmetics"),
    (72, "Electronics"),
    (92, "Dry Grocery"),
];

const REASONS: [&str; 4] = ["clearance", "damaged", "price_match", "seasonal"];

const FISCAL_WEEKS: u32 = 12;
const ITEMS_PER_DEPT: u32 = 2;

/// Row counts written by [`seed_sample_data`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub stores: usize,
    pub departments: usize,
    pub markdowns: usize,
    pub inventory_positions: usize,
}

/// Populate an empty warehouse with sample stores, departments, markdowns
/// and inventory positions. Does nothing when stores already exist.
pub fn seed_sample_data(db: &Database) -> Result<SeedSummary, WarehouseError> {
    let first_week_ending = NaiveDate::from_ymd_opt(2024, 2, 3)
        .ok_or_else(|| WarehouseError::Database("invalid seed date".to_string()))?;

    db.with_conn(|conn| {
        let existing: i64 = conn.query_row("SELECT COUNT(*) FROM stores", [], |row| row.get(0))?;
        if existing > 0 {
            info!(stores = existing, "Warehouse already populated, skipping seed");
            return Ok(SeedSummary::default());
        }

        let tx = conn.unchecked_transaction()?;
        let mut summary = SeedSummary::default();

        for (nbr, name, region) in STORES {
            tx.execute(
                "INSERT INTO stores (store_nbr, store_name, region) VALUES (?1, ?2, ?3)",
                rusqlite::params![nbr, name, region],
            )?;
            summary.stores += 1;
        }
        for (nbr, name) in DEPARTMENTS {
            tx.execute(
                "INSERT INTO departments (dept_nbr, dept_name) VALUES (?1, ?2)",
                rusqlite::params![nbr, name],
            )?;
            summary.departments += 1;
        }

        {
            let mut markdown = tx.prepare(
                "INSERT INTO markdowns (store_nbr, dept_nbr, item_nbr, markdown_date,
                                        fiscal_week, markdown_qty, markdown_amt, reason)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            let mut position = tx.prepare(
                "INSERT INTO inventory_positions (store_nbr, dept_nbr, fiscal_week,
                                                  week_ending, book_value, sku_value)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;

            for (store, _, _) in STORES {
                for (dept, _) in DEPARTMENTS {
                    for week in 1..=FISCAL_WEEKS {
                        let week_ending =
                            first_week_ending + Duration::weeks(i64::from(week) - 1);

                        for k in 0..ITEMS_PER_DEPT {
                            let qty = (store * 7 + dept * 3 + week * 5 + k) % 9 + 1;
                            let unit_price = 2.5 + f64::from(dept % 5) * 1.25;
                            let amt = (f64::from(qty) * unit_price * 100.0).round() / 100.0;
                            let date = week_ending - Duration::days(i64::from((store + k) % 7));
                            let reason = REASONS[((store + dept + week + k) % 4) as usize];
                            markdown.execute(rusqlite::params![
                                store,
                                dept,
                                dept * 1000 + k,
                                date.format("%Y-%m-%d").to_string(),
                                week,
                                qty,
                                amt,
                                reason,
                            ])?;
                            summary.markdowns += 1;
                        }

                        let book = 10_000.0
                            + f64::from(store) * 250.0
                            + f64::from(dept) * 100.0
                            + f64::from(week) * 10.0;
                        let sku = book - f64::from((store * dept * week) % 400) + 50.0;
                        position.execute(rusqlite::params![
                            store,
                            dept,
                            week,
                            week_ending.format("%Y-%m-%d").to_string(),
                            book,
                            sku,
                        ])?;
                        summary.inventory_positions += 1;
                    }
                }
            }
        }

        tx.commit()?;
        info!(
            stores = summary.stores,
            markdowns = summary.markdowns,
            "Seeded sample warehouse data"
        );
        Ok(summary)
    })
}

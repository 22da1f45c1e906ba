//! Warehouse query shim.
//!
//! Two calls cover everything the dashboard reads: `reference_data` for the
//! small lookup lists that feed filter widgets, and `transactional_data` for
//! the per-view fact tables. Sorting is restricted to the output columns of
//! each dataset so caller-supplied names never reach SQL unchecked.

use std::fmt;
use std::sync::Arc;

use rusqlite::types::{ToSql, ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use shrink_core::{Filters, Table};

use crate::db::Database;
use crate::error::WarehouseError;

// =============================================================================
// Request types
// =============================================================================

/// Reference lists cached per session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
    Stores,
    Departments,
    /// One markdown row, used by clients to discover the column layout.
    SampleRow,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 3] = [
        ReferenceKind::Stores,
        ReferenceKind::Departments,
        ReferenceKind::SampleRow,
    ];

    /// Session cache key for this list.
    pub fn cache_key(&self) -> &'static str {
        match self {
            ReferenceKind::Stores => "stores",
            ReferenceKind::Departments => "departments",
            ReferenceKind::SampleRow => "sample_row",
        }
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.cache_key())
    }
}

impl std::str::FromStr for ReferenceKind {
    type Err = WarehouseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stores" => Ok(ReferenceKind::Stores),
            "departments" => Ok(ReferenceKind::Departments),
            "sample_row" => Ok(ReferenceKind::SampleRow),
            _ => Err(WarehouseError::UnknownReferenceKind(s.to_string())),
        }
    }
}

/// Fact tables behind the dashboard views.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Markdown totals per store.
    StoreSummary,
    /// Markdown transactions, one row per event.
    Markdowns,
    /// Weekly book versus SKU totals per store.
    IrrRecap,
    /// Book versus SKU variance per store and department.
    BookVsSku,
}

impl Dataset {
    /// Output columns, in order. Also the set of sortable columns.
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Dataset::StoreSummary => &[
                "store_nbr",
                "store_name",
                "markdown_count",
                "markdown_qty",
                "markdown_amt",
            ],
            Dataset::Markdowns => &[
                "store_nbr",
                "store_name",
                "dept_nbr",
                "dept_name",
                "item_nbr",
                "markdown_date",
                "fiscal_week",
                "markdown_qty",
                "markdown_amt",
                "reason",
            ],
            Dataset::IrrRecap => &[
                "store_nbr",
                "fiscal_week",
                "week_ending",
                "book_value",
                "sku_value",
                "variance",
            ],
            Dataset::BookVsSku => &[
                "store_nbr",
                "dept_nbr",
                "dept_name",
                "book_value",
                "sku_value",
                "variance",
                "variance_pct",
            ],
        }
    }

    pub fn default_sort(&self) -> SortSpec {
        match self {
            Dataset::StoreSummary => SortSpec::desc("markdown_amt"),
            Dataset::Markdowns => SortSpec::desc("markdown_date"),
            Dataset::IrrRecap => SortSpec::desc("fiscal_week"),
            Dataset::BookVsSku => SortSpec::desc("variance"),
        }
    }

    fn query(&self) -> DatasetQuery {
        match self {
            Dataset::StoreSummary => DatasetQuery {
                select_from: "SELECT m.store_nbr AS store_nbr, s.store_name AS store_name,
                                     COUNT(*) AS markdown_count,
                                     SUM(m.markdown_qty) AS markdown_qty,
                                     ROUND(SUM(m.markdown_amt), 2) AS markdown_amt
                              FROM markdowns m
                              JOIN stores s ON s.store_nbr = m.store_nbr",
                group_by: Some("m.store_nbr, s.store_name"),
                store_col: "m.store_nbr",
                dept_col: "m.dept_nbr",
                date_col: "m.markdown_date",
            },
            Dataset::Markdowns => DatasetQuery {
                select_from: "SELECT m.store_nbr AS store_nbr, s.store_name AS store_name,
                                     m.dept_nbr AS dept_nbr, d.dept_name AS dept_name,
                                     m.item_nbr AS item_nbr, m.markdown_date AS markdown_date,
                                     m.fiscal_week AS fiscal_week,
                                     m.markdown_qty AS markdown_qty,
                                     m.markdown_amt AS markdown_amt, m.reason AS reason
                              FROM markdowns m
                              JOIN stores s ON s.store_nbr = m.store_nbr
                              JOIN departments d ON d.dept_nbr = m.dept_nbr",
                group_by: None,
                store_col: "m.store_nbr",
                dept_col: "m.dept_nbr",
                date_col: "m.markdown_date",
            },
            Dataset::IrrRecap => DatasetQuery {
                select_from: "SELECT p.store_nbr AS store_nbr, p.fiscal_week AS fiscal_week,
                                     MAX(p.week_ending) AS week_ending,
                                     ROUND(SUM(p.book_value), 2) AS book_value,
                                     ROUND(SUM(p.sku_value), 2) AS sku_value,
                                     ROUND(SUM(p.book_value - p.sku_value), 2) AS variance
                              FROM inventory_positions p",
                group_by: Some("p.store_nbr, p.fiscal_week"),
                store_col: "p.store_nbr",
                dept_col: "p.dept_nbr",
                date_col: "p.week_ending",
            },
            Dataset::BookVsSku => DatasetQuery {
                select_from: "SELECT p.store_nbr AS store_nbr, p.dept_nbr AS dept_nbr,
                                     d.dept_name AS dept_name,
                                     ROUND(SUM(p.book_value), 2) AS book_value,
                                     ROUND(SUM(p.sku_value), 2) AS sku_value,
                                     ROUND(SUM(p.book_value - p.sku_value), 2) AS variance,
                                     ROUND(100.0 * SUM(p.book_value - p.sku_value)
                                           / NULLIF(SUM(p.book_value), 0), 2) AS variance_pct
                              FROM inventory_positions p
                              JOIN departments d ON d.dept_nbr = p.dept_nbr",
                group_by: Some("p.store_nbr, p.dept_nbr, d.dept_name"),
                store_col: "p.store_nbr",
                dept_col: "p.dept_nbr",
                date_col: "p.week_ending",
            },
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::StoreSummary => write!(f, "store_summary"),
            Dataset::Markdowns => write!(f, "markdowns"),
            Dataset::IrrRecap => write!(f, "irr_recap"),
            Dataset::BookVsSku => write!(f, "book_vs_sku"),
        }
    }
}

impl std::str::FromStr for Dataset {
    type Err = WarehouseError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "store_summary" => Ok(Dataset::StoreSummary),
            "markdowns" => Ok(Dataset::Markdowns),
            "irr_recap" => Ok(Dataset::IrrRecap),
            "book_vs_sku" => Ok(Dataset::BookVsSku),
            _ => Err(WarehouseError::UnknownDataset(s.to_string())),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Ordering for a transactional query.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            direction: SortDirection::Desc,
        }
    }
}

struct DatasetQuery {
    select_from: &'static str,
    group_by: Option<&'static str>,
    store_col: &'static str,
    dept_col: &'static str,
    date_col: &'static str,
}

// =============================================================================
// Warehouse trait
// =============================================================================

/// Read-only access to the shrink warehouse.
pub trait Warehouse: Send + Sync {
    /// Small lookup list for filter widgets.
    fn reference_data(&self, kind: ReferenceKind, filters: &Filters)
        -> Result<Table, WarehouseError>;

    /// Filtered, sorted fact rows for one dataset. `limit` falls back to the
    /// warehouse default when `None`.
    fn transactional_data(
        &self,
        dataset: Dataset,
        filters: &Filters,
        sort: Option<&SortSpec>,
        limit: Option<u32>,
    ) -> Result<Table, WarehouseError>;
}

/// SQLite-backed warehouse.
pub struct SqliteWarehouse {
    db: Arc<Database>,
    default_row_limit: u32,
}

impl SqliteWarehouse {
    pub fn new(db: Arc<Database>, default_row_limit: u32) -> Self {
        Self {
            db,
            default_row_limit,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }
}

impl Warehouse for SqliteWarehouse {
    fn reference_data(
        &self,
        kind: ReferenceKind,
        filters: &Filters,
    ) -> Result<Table, WarehouseError> {
        debug!(kind = %kind, "Reference query");
        match kind {
            ReferenceKind::Stores => self.db.with_conn(|conn| {
                run_query(
                    conn,
                    "SELECT store_nbr, store_name, region FROM stores ORDER BY store_nbr",
                    Vec::new(),
                )
            }),
            ReferenceKind::Departments => self.db.with_conn(|conn| match filters.store {
                Some(store) => run_query(
                    conn,
                    "SELECT DISTINCT d.dept_nbr AS dept_nbr, d.dept_name AS dept_name
                     FROM departments d
                     JOIN markdowns m ON m.dept_nbr = d.dept_nbr
                     WHERE m.store_nbr = ?
                     ORDER BY d.dept_nbr",
                    vec![Box::new(store) as Box<dyn ToSql>],
                ),
                None => run_query(
                    conn,
                    "SELECT dept_nbr, dept_name FROM departments ORDER BY dept_nbr",
                    Vec::new(),
                ),
            }),
            ReferenceKind::SampleRow => {
                self.transactional_data(Dataset::Markdowns, filters, None, Some(1))
            }
        }
    }

    fn transactional_data(
        &self,
        dataset: Dataset,
        filters: &Filters,
        sort: Option<&SortSpec>,
        limit: Option<u32>,
    ) -> Result<Table, WarehouseError> {
        let default_sort = dataset.default_sort();
        let sort = sort.unwrap_or(&default_sort);
        if !dataset.columns().contains(&sort.column.as_str()) {
            return Err(WarehouseError::InvalidSortColumn {
                dataset: dataset.to_string(),
                column: sort.column.clone(),
            });
        }

        let query = dataset.query();
        let (where_clause, mut params) = build_where(&query, filters);

        let mut sql = String::from(query.select_from);
        sql.push_str(&where_clause);
        if let Some(group_by) = query.group_by {
            sql.push_str(" GROUP BY ");
            sql.push_str(group_by);
        }
        let direction = match sort.direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        sql.push_str(&format!(
            " ORDER BY {} {}, store_nbr ASC LIMIT ?",
            sort.column, direction
        ));
        let limit = limit.unwrap_or(self.default_row_limit);
        params.push(Box::new(limit));

        debug!(dataset = %dataset, limit, "Transactional query");
        self.db.with_conn(|conn| run_query(conn, &sql, params))
    }
}

fn build_where(query: &DatasetQuery, filters: &Filters) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions: Vec<String> = Vec::new();
    let mut params: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(store) = filters.store {
        conditions.push(format!("{} = ?", query.store_col));
        params.push(Box::new(store));
    }
    if let Some(dept) = filters.department {
        conditions.push(format!("{} = ?", query.dept_col));
        params.push(Box::new(dept));
    }
    if let Some(start) = filters.start_date {
        conditions.push(format!("{} >= ?", query.date_col));
        params.push(Box::new(start.format("%Y-%m-%d").to_string()));
    }
    if let Some(end) = filters.end_date {
        conditions.push(format!("{} <= ?", query.date_col));
        params.push(Box::new(end.format("%Y-%m-%d").to_string()));
    }

    if conditions.is_empty() {
        (String::new(), params)
    } else {
        (format!(" WHERE {}", conditions.join(" AND ")), params)
    }
}

fn run_query(
    conn: &rusqlite::Connection,
    sql: &str,
    params: Vec<Box<dyn ToSql>>,
) -> Result<Table, WarehouseError> {
    let mut stmt = conn.prepare(sql)?;
    let mut table = Table::with_columns(stmt.column_names());
    let width = table.columns.len();

    let param_refs: Vec<&dyn ToSql> = params.iter().map(|p| p.as_ref()).collect();
    let mut rows = stmt.query(param_refs.as_slice())?;
    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(width);
        for idx in 0..width {
            values.push(to_json(row.get_ref(idx)?));
        }
        table.push_row(values);
    }
    Ok(table)
}

fn to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::seed::seed_sample_data;
    use chrono::NaiveDate;
    use serde_json::json;

    fn seeded() -> SqliteWarehouse {
        let db = Arc::new(Database::in_memory().unwrap());
        seed_sample_data(&db).unwrap();
        SqliteWarehouse::new(db, 500)
    }

    #[test]
    fn test_reference_kind_parse() {
        assert_eq!("stores".parse::<ReferenceKind>().unwrap(), ReferenceKind::Stores);
        assert_eq!(
            "sample_row".parse::<ReferenceKind>().unwrap(),
            ReferenceKind::SampleRow
        );
        assert!("regions".parse::<ReferenceKind>().is_err());
    }

    #[test]
    fn test_dataset_display_roundtrip() {
        for ds in [
            Dataset::StoreSummary,
            Dataset::Markdowns,
            Dataset::IrrRecap,
            Dataset::BookVsSku,
        ] {
            assert_eq!(ds.to_string().parse::<Dataset>().unwrap(), ds);
        }
    }

    #[test]
    fn test_stores_reference() {
        let wh = seeded();
        let table = wh
            .reference_data(ReferenceKind::Stores, &Filters::default())
            .unwrap();
        assert_eq!(table.columns, vec!["store_nbr", "store_name", "region"]);
        assert_eq!(table.len(), 8);
        assert_eq!(table.rows[0][0], json!(1));
    }

    #[test]
    fn test_departments_reference_filtered_by_store() {
        let wh = seeded();
        let all = wh
            .reference_data(ReferenceKind::Departments, &Filters::default())
            .unwrap();
        let for_store = wh
            .reference_data(
                ReferenceKind::Departments,
                &Filters {
                    store: Some(5),
                    ..Filters::default()
                },
            )
            .unwrap();
        assert_eq!(for_store.columns, vec!["dept_nbr", "dept_name"]);
        assert!(!for_store.is_empty());
        assert!(for_store.len() <= all.len());
    }

    #[test]
    fn test_sample_row_is_single_markdown() {
        let wh = seeded();
        let table = wh
            .reference_data(ReferenceKind::SampleRow, &Filters::default())
            .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.columns.len(), Dataset::Markdowns.columns().len());
    }

    #[test]
    fn test_markdowns_store_filter() {
        let wh = seeded();
        let filters = Filters {
            store: Some(5),
            ..Filters::default()
        };
        let table = wh
            .transactional_data(Dataset::Markdowns, &filters, None, Some(50))
            .unwrap();
        assert_eq!(table.len(), 50);
        let stores = table.column("store_nbr").unwrap();
        assert!(stores.iter().all(|v| **v == json!(5)));
    }

    #[test]
    fn test_markdowns_date_range() {
        let wh = seeded();
        let start = NaiveDate::from_ymd_opt(2024, 2, 10).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 2, 17).unwrap();
        let filters = Filters {
            start_date: Some(start),
            end_date: Some(end),
            ..Filters::default()
        };
        let table = wh
            .transactional_data(Dataset::Markdowns, &filters, None, None)
            .unwrap();
        assert!(!table.is_empty());
        for v in table.column("markdown_date").unwrap() {
            let d = v.as_str().unwrap();
            assert!(d >= "2024-02-10" && d <= "2024-02-17", "out of range: {}", d);
        }
    }

    #[test]
    fn test_sort_ascending() {
        let wh = seeded();
        let table = wh
            .transactional_data(
                Dataset::StoreSummary,
                &Filters::default(),
                Some(&SortSpec::asc("markdown_amt")),
                None,
            )
            .unwrap();
        let amounts: Vec<f64> = table
            .column("markdown_amt")
            .unwrap()
            .iter()
            .map(|v| v.as_f64().unwrap())
            .collect();
        assert_eq!(amounts.len(), 8);
        assert!(amounts.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_sort_column_must_be_output_column() {
        let wh = seeded();
        let result = wh.transactional_data(
            Dataset::Markdowns,
            &Filters::default(),
            Some(&SortSpec::desc("1; DROP TABLE stores")),
            None,
        );
        assert!(matches!(
            result,
            Err(WarehouseError::InvalidSortColumn { .. })
        ));
    }

    #[test]
    fn test_book_vs_sku_variance_is_book_minus_sku() {
        let wh = seeded();
        let table = wh
            .transactional_data(Dataset::BookVsSku, &Filters::default(), None, Some(10))
            .unwrap();
        let book = table.column_index("book_value").unwrap();
        let sku = table.column_index("sku_value").unwrap();
        let var = table.column_index("variance").unwrap();
        for row in &table.rows {
            let expected = row[book].as_f64().unwrap() - row[sku].as_f64().unwrap();
            assert!((row[var].as_f64().unwrap() - expected).abs() < 0.02);
        }
    }

    #[test]
    fn test_irr_recap_one_row_per_store_week() {
        let wh = seeded();
        let filters = Filters {
            store: Some(2),
            ..Filters::default()
        };
        let table = wh
            .transactional_data(Dataset::IrrRecap, &filters, None, None)
            .unwrap();
        assert_eq!(table.len(), 12);
        assert_eq!(table.rows[0][1], json!(12));
    }

    #[test]
    fn test_empty_warehouse_returns_header_only() {
        let db = Arc::new(Database::in_memory().unwrap());
        let wh = SqliteWarehouse::new(db, 10);
        let table = wh
            .transactional_data(Dataset::Markdowns, &Filters::default(), None, None)
            .unwrap();
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), 10);
    }
}

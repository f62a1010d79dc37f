//! Shared paginated listing: active rows, case-insensitive search over a
//! fixed column set, whitelisted sort keys.
//!
//! Search binds [`PageRequest::glob_pattern`], which carries the case
//! folding itself; the columns are matched as stored.

use botica_core::{Page, PageRequest};
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, SqlitePool};

use crate::error::DbResult;
use crate::table::Table;

/// Listing rules of one entity.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ListSpec {
    pub table: Table,
    pub search_columns: &'static [&'static str],
    /// `(api key, column)`; keys match case-insensitively.
    pub sort_keys: &'static [(&'static str, &'static str)],
    pub default_sort: &'static str,
}

impl ListSpec {
    /// `ORDER BY <column> <dir>, id ASC`. Unknown keys use the default column.
    pub fn order_clause(&self, req: &PageRequest) -> String {
        let requested = req.sort_by.trim();
        let column = self
            .sort_keys
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(requested))
            .map(|(_, column)| *column)
            .unwrap_or(self.default_sort);
        format!("ORDER BY {} {}, id ASC", column, req.sort_order.as_sql())
    }

    /// `(a GLOB ? OR b GLOB ?)`, one bind per search column.
    pub fn search_clause(&self) -> String {
        let parts: Vec<String> = self
            .search_columns
            .iter()
            .map(|c| format!("{} GLOB ?", c))
            .collect();
        format!("({})", parts.join(" OR "))
    }
}

pub(crate) async fn paginate<T>(pool: &SqlitePool, list: &ListSpec, req: &PageRequest) -> DbResult<Page<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    let pattern = req.glob_pattern();
    let filter = match &pattern {
        Some(_) => format!("deleted_at IS NULL AND {}", list.search_clause()),
        None => "deleted_at IS NULL".to_string(),
    };

    let count_sql = format!("SELECT COUNT(*) FROM {} WHERE {}", list.table.name(), filter);
    let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
    if let Some(p) = &pattern {
        for _ in list.search_columns {
            count = count.bind(p.clone());
        }
    }
    let total_records = count.fetch_one(pool).await?;

    let page_sql = format!(
        "SELECT * FROM {} WHERE {} {} LIMIT ? OFFSET ?",
        list.table.name(),
        filter,
        list.order_clause(req)
    );
    let mut query = sqlx::query_as::<_, T>(&page_sql);
    if let Some(p) = &pattern {
        for _ in list.search_columns {
            query = query.bind(p.clone());
        }
    }
    let records = query.bind(req.limit()).bind(req.offset()).fetch_all(pool).await?;

    Ok(Page {
        records,
        total_records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use botica_core::SortOrder;

    const PRODUCTS: ListSpec = ListSpec {
        table: Table::Products,
        search_columns: &["name", "code"],
        sort_keys: &[("name", "name"), ("salePrice", "sale_price_cents")],
        default_sort: "name",
    };

    #[test]
    fn test_sort_whitelist_is_case_insensitive() {
        let req = PageRequest::new(1, 10).sort("SALEPRICE", SortOrder::Desc);
        assert_eq!(PRODUCTS.order_clause(&req), "ORDER BY sale_price_cents DESC, id ASC");
    }

    #[test]
    fn test_unknown_sort_key_falls_back() {
        let req = PageRequest::new(1, 10).sort("password_hash; DROP TABLE", SortOrder::Asc);
        assert_eq!(PRODUCTS.order_clause(&req), "ORDER BY name ASC, id ASC");
    }

    #[test]
    fn test_search_clause() {
        assert_eq!(PRODUCTS.search_clause(), "(name GLOB ? OR code GLOB ?)");
    }
}

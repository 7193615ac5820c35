use rusqlite::{params, Connection, OptionalExtension, Result as RusqliteResult, Row};

use super::{count_where, now_db_time, time_at, SqlFilter};
use crate::models::filters::CategoryFilter;
use crate::models::{Category, CategoryStatistics};

const CATEGORY_SELECT: &str = "SELECT c.id, c.name, c.slug, c.description, c.color, c.icon, c.sort_order, \
     c.is_featured, c.parent_id, c.meta_title, c.meta_description, \
     (SELECT COUNT(*) FROM posts p WHERE p.category_id = c.id), c.created_at, c.updated_at \
     FROM categories c";

pub struct CategoryRecord<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub description: Option<&'a str>,
    pub color: Option<&'a str>,
    pub icon: Option<&'a str>,
    pub sort_order: i64,
    pub is_featured: bool,
    pub parent_id: Option<i64>,
    pub meta_title: Option<&'a str>,
    pub meta_description: Option<&'a str>,
}

fn row_to_category(row: &Row<'_>) -> RusqliteResult<Category> {
    Ok(Category {
        id: row.get(0)?,
        name: row.get(1)?,
        slug: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        icon: row.get(5)?,
        sort_order: row.get(6)?,
        is_featured: row.get(7)?,
        parent_id: row.get(8)?,
        meta_title: row.get(9)?,
        meta_description: row.get(10)?,
        post_count: row.get(11)?,
        created_at: time_at(row, 12)?,
        updated_at: time_at(row, 13)?,
    })
}

fn category_filter(filter: &CategoryFilter) -> SqlFilter {
    let mut sql = SqlFilter::new();
    sql.eq_opt("c.is_featured", filter.is_featured)
        .search(&["c.name", "c.description"], filter.search.as_deref());
    sql
}

pub fn insert_category(conn: &Connection, category: &CategoryRecord<'_>) -> RusqliteResult<i64> {
    let now = now_db_time();
    conn.execute(
        "INSERT INTO categories (name, slug, description, color, icon, sort_order, is_featured, parent_id,
                                 meta_title, meta_description, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?11)",
        params![
            category.name,
            category.slug,
            category.description,
            category.color,
            category.icon,
            category.sort_order,
            category.is_featured,
            category.parent_id,
            category.meta_title,
            category.meta_description,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_category(conn: &Connection, category_id: i64, category: &CategoryRecord<'_>) -> RusqliteResult<usize> {
    conn.execute(
        "UPDATE categories SET name = ?1, slug = ?2, description = ?3, color = ?4, icon = ?5, sort_order = ?6,
                               is_featured = ?7, parent_id = ?8, meta_title = ?9, meta_description = ?10,
                               updated_at = ?11
         WHERE id = ?12",
        params![
            category.name,
            category.slug,
            category.description,
            category.color,
            category.icon,
            category.sort_order,
            category.is_featured,
            category.parent_id,
            category.meta_title,
            category.meta_description,
            now_db_time(),
            category_id
        ],
    )
}

pub fn find_category_by_id(conn: &Connection, category_id: i64) -> RusqliteResult<Option<Category>> {
    conn.query_row(&format!("{} WHERE c.id = ?1", CATEGORY_SELECT), [category_id], row_to_category)
        .optional()
}

pub fn find_category_by_slug(conn: &Connection, slug: &str) -> RusqliteResult<Option<Category>> {
    conn.query_row(&format!("{} WHERE c.slug = ?1", CATEGORY_SELECT), [slug], row_to_category)
        .optional()
}

pub fn category_exists(conn: &Connection, category_id: i64) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE id = ?1)",
        [category_id],
        |row| row.get(0),
    )
}

/// The parent id of `category_id`; `None` for a root or a missing row.
pub fn parent_of(conn: &Connection, category_id: i64) -> RusqliteResult<Option<i64>> {
    let parent: Option<Option<i64>> = conn
        .query_row("SELECT parent_id FROM categories WHERE id = ?1", [category_id], |row| row.get(0))
        .optional()?;
    Ok(parent.flatten())
}

pub fn slug_taken(conn: &Connection, slug: &str, exclude_id: Option<i64>) -> RusqliteResult<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM categories WHERE slug = ?1 AND id != ?2)",
        params![slug, exclude_id.unwrap_or(-1)],
        |row| row.get(0),
    )
}

pub fn delete_category(conn: &Connection, category_id: i64) -> RusqliteResult<usize> {
    conn.execute("DELETE FROM categories WHERE id = ?1", [category_id])
}

pub fn count_categories(conn: &Connection, filter: &CategoryFilter) -> RusqliteResult<i64> {
    count_where(conn, "categories c", &category_filter(filter))
}

pub fn list_categories(
    conn: &Connection,
    filter: &CategoryFilter,
    limit: i64,
    offset: i64,
) -> RusqliteResult<Vec<Category>> {
    let sql_filter = category_filter(filter);
    let sql = format!(
        "{}{} ORDER BY c.sort_order ASC, c.name ASC, c.id ASC LIMIT ? OFFSET ?",
        CATEGORY_SELECT,
        sql_filter.where_clause()
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(sql_filter.params_with_page(&limit, &offset).as_slice(), row_to_category)?;
    rows.collect()
}

pub fn category_statistics(conn: &Connection) -> RusqliteResult<CategoryStatistics> {
    conn.query_row(
        "SELECT COUNT(*), COALESCE(SUM(is_featured), 0) FROM categories",
        [],
        |row| {
            Ok(CategoryStatistics {
                total: row.get(0)?,
                featured: row.get(1)?,
            })
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::db_setup::memory_pool;

    fn record<'a>(name: &'a str, slug: &'a str, sort_order: i64) -> CategoryRecord<'a> {
        CategoryRecord {
            name,
            slug,
            description: None,
            color: None,
            icon: None,
            sort_order,
            is_featured: false,
            parent_id: None,
            meta_title: None,
            meta_description: None,
        }
    }

    #[test]
    fn categories_list_by_sort_order_then_name() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        insert_category(&conn, &record("Zeta", "zeta", 0)).unwrap();
        insert_category(&conn, &record("Alpha", "alpha", 1)).unwrap();
        insert_category(&conn, &record("Beta", "beta", 0)).unwrap();
        let names: Vec<String> = list_categories(&conn, &CategoryFilter::default(), 10, 0)
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Beta", "Zeta", "Alpha"]);
    }

    #[test]
    fn slug_lookup_reports_zero_posts() {
        let pool = memory_pool();
        let conn = pool.get().unwrap();
        let id = insert_category(&conn, &record("Technology", "technology", 0)).unwrap();
        let found = find_category_by_slug(&conn, "technology").unwrap().unwrap();
        assert_eq!(found.id, id);
        assert_eq!(found.post_count, 0);
        assert!(slug_taken(&conn, "technology", None).unwrap());
        assert!(!slug_taken(&conn, "technology", Some(id)).unwrap());
    }
}

//! Row-level access to the SQLite store. Every function takes a borrowed
//! `Connection` (or `Transaction`, which derefs to one) so callers decide the
//! transaction boundary.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{ToSql, Type};
use rusqlite::{Connection, Row};

pub mod categories_db_operations;
pub mod comments_db_operations;
pub mod posts_db_operations;
pub mod settings_db_operations;
pub mod users_db_operations;

/// Fixed width RFC 3339 so that text order equals time order.
pub fn to_db_time(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn now_db_time() -> String {
    to_db_time(&Utc::now())
}

fn parse_db_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub fn time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_db_time(idx, &raw)
}

pub fn optional_time_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| parse_db_time(idx, &s)).transpose()
}

/// Builds a `WHERE` clause from typed predicates with positional parameters.
#[derive(Default)]
pub struct SqlFilter {
    clauses: Vec<String>,
    params: Vec<Box<dyn ToSql>>,
}

impl SqlFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq<T: ToSql + 'static>(&mut self, column: &str, value: T) -> &mut Self {
        self.clauses.push(format!("{} = ?", column));
        self.params.push(Box::new(value));
        self
    }

    pub fn ne<T: ToSql + 'static>(&mut self, column: &str, value: T) -> &mut Self {
        self.clauses.push(format!("{} != ?", column));
        self.params.push(Box::new(value));
        self
    }

    pub fn eq_opt<T: ToSql + 'static>(&mut self, column: &str, value: Option<T>) -> &mut Self {
        if let Some(v) = value {
            self.eq(column, v);
        }
        self
    }

    pub fn is_null(&mut self, column: &str) -> &mut Self {
        self.clauses.push(format!("{} IS NULL", column));
        self
    }

    pub fn in_list<T: ToSql + Clone + 'static>(&mut self, column: &str, values: &[T]) -> &mut Self {
        if values.is_empty() {
            self.clauses.push("0 = 1".to_string());
            return self;
        }
        let marks = vec!["?"; values.len()].join(", ");
        self.clauses.push(format!("{} IN ({})", column, marks));
        for v in values {
            self.params.push(Box::new(v.clone()));
        }
        self
    }

    /// Case-insensitive substring match over `columns`, OR-combined.
    /// Blank terms add nothing.
    pub fn search(&mut self, columns: &[&str], term: Option<&str>) -> &mut Self {
        let term = match term.map(str::trim) {
            Some(t) if !t.is_empty() => t,
            _ => return self,
        };
        let pattern = format!("%{}%", escape_like(term));
        let ors: Vec<String> = columns
            .iter()
            .map(|c| format!("{} LIKE ? ESCAPE '\\'", c))
            .collect();
        self.clauses.push(format!("({})", ors.join(" OR ")));
        for _ in columns {
            self.params.push(Box::new(pattern.clone()));
        }
        self
    }

    /// Adds a raw predicate with no parameters.
    pub fn raw(&mut self, clause: &str) -> &mut Self {
        self.clauses.push(clause.to_string());
        self
    }

    pub fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }

    pub fn params(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p.as_ref()).collect()
    }

    /// Parameters followed by `LIMIT ? OFFSET ?` values.
    pub fn params_with_page<'a>(&'a self, limit: &'a i64, offset: &'a i64) -> Vec<&'a dyn ToSql> {
        let mut values = self.params();
        values.push(limit);
        values.push(offset);
        values
    }
}

fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub fn count_where(conn: &Connection, from: &str, filter: &SqlFilter) -> rusqlite::Result<i64> {
    let sql = format!("SELECT COUNT(*) FROM {}{}", from, filter.where_clause());
    conn.query_row(&sql, filter.params().as_slice(), |row| row.get(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn db_time_is_fixed_width_and_round_trips() {
        let ts = DateTime::parse_from_rfc3339("2026-01-02T03:04:05Z").unwrap().with_timezone(&Utc);
        let text = to_db_time(&ts);
        assert_eq!(text, "2026-01-02T03:04:05.000000Z");
        assert_eq!(parse_db_time(0, &text).unwrap(), ts);
    }

    #[test]
    fn filter_builds_clause_and_params_in_order() {
        let mut filter = SqlFilter::new();
        filter
            .eq("status", "APPROVED")
            .eq_opt::<i64>("post_id", None)
            .is_null("parent_id")
            .search(&["content", "author_name"], Some("  50%  "));
        assert_eq!(
            filter.where_clause(),
            " WHERE status = ? AND parent_id IS NULL AND (content LIKE ? ESCAPE '\\' OR author_name LIKE ? ESCAPE '\\')"
        );
        assert_eq!(filter.params().len(), 3);
    }

    #[test]
    fn search_matches_case_insensitively_and_literally() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (body TEXT);
             INSERT INTO t VALUES ('Hello World'), ('100% sure'), ('100 percent');",
        )
        .unwrap();
        let mut filter = SqlFilter::new();
        filter.search(&["body"], Some("hello"));
        assert_eq!(count_where(&conn, "t", &filter).unwrap(), 1);

        let mut literal = SqlFilter::new();
        literal.search(&["body"], Some("100%"));
        assert_eq!(count_where(&conn, "t", &literal).unwrap(), 1);
    }

    #[test]
    fn empty_in_list_matches_nothing() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (id INTEGER); INSERT INTO t VALUES (1);").unwrap();
        let mut filter = SqlFilter::new();
        filter.in_list::<i64>("id", &[]);
        assert_eq!(count_where(&conn, "t", &filter).unwrap(), 0);
    }
}

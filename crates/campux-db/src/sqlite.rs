use std::path::Path;
use std::sync::Mutex;

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params_from_iter};
use serde_json::Value;
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::store::{Document, DocumentStore, FindOptions, Filter, Sort, SortOrder, validate_name};

/// Document store backed by a single SQLite table.
///
/// Every collection lives in the table named after the configured database;
/// each row holds the collection name and the document as JSON text. Filters,
/// sorts and unique indexes are expressed with SQLite's JSON functions.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    table: String,
}

impl SqliteStore {
    pub fn open(path: &Path, database: &str) -> StoreResult<Self> {
        let conn = Connection::open(path)?;

        // WAL mode for concurrent readers
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let store = Self::with_connection(conn, database)?;
        info!("Document store opened at {} (database {})", path.display(), database);
        Ok(store)
    }

    pub fn open_in_memory(database: &str) -> StoreResult<Self> {
        Self::with_connection(Connection::open_in_memory()?, database)
    }

    fn with_connection(conn: Connection, database: &str) -> StoreResult<Self> {
        validate_name(database)?;

        conn.execute_batch(&format!(
            "
            CREATE TABLE IF NOT EXISTS {t} (
                seq         INTEGER PRIMARY KEY AUTOINCREMENT,
                collection  TEXT NOT NULL,
                body        TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_{t}_collection
                ON {t}(collection, seq);
            ",
            t = database
        ))?;

        Ok(Self {
            conn: Mutex::new(conn),
            table: database.to_string(),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&Connection) -> StoreResult<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }
}

impl DocumentStore for SqliteStore {
    fn ping(&self) -> StoreResult<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
    }

    fn insert(&self, collection: &str, doc: Document) -> StoreResult<()> {
        validate_name(collection)?;
        let body = serde_json::to_string(&doc)?;
        let sql = format!("INSERT INTO {} (collection, body) VALUES (?1, ?2)", self.table);

        self.with_conn(|conn| {
            conn.execute(&sql, (collection, body))?;
            Ok(())
        })
    }

    fn find_one(
        &self,
        collection: &str,
        filter: &Filter,
        sort: Option<&Sort>,
    ) -> StoreResult<Option<Document>> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT body FROM {} WHERE {} ORDER BY {} LIMIT 1",
            self.table,
            where_clause(collection, filter, &mut params)?,
            order_clause(sort)?,
        );

        let body = self.with_conn(|conn| {
            Ok(conn
                .query_row(&sql, params_from_iter(params.iter()), |row| row.get::<_, String>(0))
                .optional()?)
        })?;

        body.map(|b| parse_body(&b)).transpose()
    }

    fn find_many(
        &self,
        collection: &str,
        filter: &Filter,
        options: &FindOptions,
    ) -> StoreResult<Vec<Document>> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT body FROM {} WHERE {} ORDER BY {} LIMIT ? OFFSET ?",
            self.table,
            where_clause(collection, filter, &mut params)?,
            order_clause(options.sort.as_ref())?,
        );
        // A negative LIMIT means no limit in SQLite.
        params.push(SqlValue::Integer(options.limit.map(clamp_i64).unwrap_or(-1)));
        params.push(SqlValue::Integer(clamp_i64(options.skip)));

        let bodies = self.with_conn(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(params.iter()), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        bodies.iter().map(|b| parse_body(b)).collect()
    }

    fn count(&self, collection: &str, filter: &Filter) -> StoreResult<u64> {
        let mut params = Vec::new();
        let sql = format!(
            "SELECT COUNT(*) FROM {} WHERE {}",
            self.table,
            where_clause(collection, filter, &mut params)?,
        );

        let count = self.with_conn(|conn| {
            Ok(conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get::<_, i64>(0))?)
        })?;

        Ok(count.max(0) as u64)
    }

    fn update_one_set(
        &self,
        collection: &str,
        filter: &Filter,
        fields: Document,
    ) -> StoreResult<u64> {
        let mut params = Vec::new();
        let mut set_args = String::new();
        for (field, value) in &fields {
            validate_name(field)?;
            set_args.push_str(&format!(", '$.{}', json(?)", field));
            params.push(SqlValue::Text(serde_json::to_string(value)?));
        }
        let set_expr = if set_args.is_empty() {
            "body".to_string()
        } else {
            format!("json_set(body{})", set_args)
        };

        let sql = format!(
            "UPDATE {t} SET body = {set} WHERE seq = (SELECT seq FROM {t} WHERE {w} ORDER BY seq LIMIT 1)",
            t = self.table,
            set = set_expr,
            w = where_clause(collection, filter, &mut params)?,
        );

        let changed = self.with_conn(|conn| Ok(conn.execute(&sql, params_from_iter(params.iter()))?))?;
        Ok(changed as u64)
    }

    fn ensure_unique_index(&self, collection: &str, field: &str) -> StoreResult<()> {
        validate_name(collection)?;
        validate_name(field)?;

        let sql = format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS uniq_{t}_{c}_{f}
                ON {t}(json_extract(body, '$.{f}'))
                WHERE collection = '{c}'",
            t = self.table,
            c = collection,
            f = field,
        );

        self.with_conn(|conn| {
            conn.execute_batch(&sql)?;
            Ok(())
        })?;

        info!("Unique index ensured on {}.{}", collection, field);
        Ok(())
    }
}

fn where_clause(collection: &str, filter: &Filter, params: &mut Vec<SqlValue>) -> StoreResult<String> {
    validate_name(collection)?;
    params.push(SqlValue::Text(collection.to_string()));

    let mut sql = String::from("collection = ?");
    for (field, value) in filter.conditions() {
        validate_name(field)?;
        if value.is_null() {
            // json_extract cannot tell an explicit null from a missing field
            sql.push_str(&format!(" AND json_type(body, '$.{}') = 'null'", field));
        } else {
            sql.push_str(&format!(" AND json_extract(body, '$.{}') = ?", field));
            params.push(to_sql(value));
        }
    }
    Ok(sql)
}

fn order_clause(sort: Option<&Sort>) -> StoreResult<String> {
    let Some(sort) = sort else {
        return Ok("seq".to_string());
    };
    validate_name(&sort.field)?;

    let direction = match sort.order {
        SortOrder::Ascending => "ASC",
        SortOrder::Descending => "DESC",
    };
    Ok(format!("json_extract(body, '$.{}') {}, seq", sort.field, direction))
}

fn to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        // json_extract yields minified JSON text for arrays and objects
        other => SqlValue::Text(other.to_string()),
    }
}

fn parse_body(body: &str) -> StoreResult<Document> {
    Ok(serde_json::from_str(body)?)
}

fn clamp_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Postgres, Row as _, Sqlite, TypeInfo, ValueRef};

use super::{Dialect, Row, SqlValue};
use crate::error::{DbErrorKind, EvolutionError, Result};

/// An open database transaction: one unit of work.
///
/// Dropping a transaction without committing rolls it back.
pub enum Transaction {
    Postgres(sqlx::Transaction<'static, Postgres>),
    Sqlite(sqlx::Transaction<'static, Sqlite>),
}

impl Transaction {
    pub fn dialect(&self) -> Dialect {
        match self {
            Transaction::Postgres(_) => Dialect::Postgres,
            Transaction::Sqlite(_) => Dialect::Sqlite,
        }
    }

    /// Execute a statement, returning the number of affected rows.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> Result<u64> {
        match self {
            Transaction::Postgres(tx) => bind_pg(sqlx::query(sql), params)
                .execute(&mut **tx)
                .await
                .map(|r| r.rows_affected())
                .map_err(map_pg_error),
            Transaction::Sqlite(tx) => bind_sqlite(sqlx::query(sql), params)
                .execute(&mut **tx)
                .await
                .map(|r| r.rows_affected())
                .map_err(map_sqlite_error),
        }
    }

    /// Run a query and decode every returned row.
    pub async fn fetch_all(&mut self, sql: &str, params: &[SqlValue]) -> Result<Vec<Row>> {
        match self {
            Transaction::Postgres(tx) => {
                let rows = bind_pg(sqlx::query(sql), params)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(map_pg_error)?;
                rows.iter().map(decode_pg_row).collect()
            }
            Transaction::Sqlite(tx) => {
                let rows = bind_sqlite(sqlx::query(sql), params)
                    .fetch_all(&mut **tx)
                    .await
                    .map_err(map_sqlite_error)?;
                rows.iter().map(decode_sqlite_row).collect()
            }
        }
    }

    pub async fn commit(self) -> Result<()> {
        match self {
            Transaction::Postgres(tx) => tx.commit().await.map_err(map_pg_error),
            Transaction::Sqlite(tx) => tx.commit().await.map_err(map_sqlite_error),
        }
    }

    pub async fn rollback(self) -> Result<()> {
        match self {
            Transaction::Postgres(tx) => tx.rollback().await.map_err(map_pg_error),
            Transaction::Sqlite(tx) => tx.rollback().await.map_err(map_sqlite_error),
        }
    }
}

fn bind_pg<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &[SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param.clone() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Float(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Bytes(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
        };
    }
    query
}

fn bind_sqlite<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    params: &[SqlValue],
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for param in params {
        query = match param.clone() {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(v),
            SqlValue::Int(v) => query.bind(v),
            SqlValue::Float(v) => query.bind(v),
            SqlValue::Text(v) => query.bind(v),
            SqlValue::Bytes(v) => query.bind(v),
            SqlValue::Timestamp(v) => query.bind(v),
        };
    }
    query
}

fn decode_pg_row(row: &PgRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (idx, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());

        if row.try_get_raw(idx)?.is_null() {
            values.push(SqlValue::Null);
            continue;
        }

        let value = match column.type_info().name() {
            "BOOL" => SqlValue::Bool(row.try_get(idx)?),
            "INT2" => SqlValue::Int(row.try_get::<i16, _>(idx)? as i64),
            "INT4" => SqlValue::Int(row.try_get::<i32, _>(idx)? as i64),
            "INT8" => SqlValue::Int(row.try_get(idx)?),
            "FLOAT4" => SqlValue::Float(row.try_get::<f32, _>(idx)? as f64),
            "FLOAT8" => SqlValue::Float(row.try_get(idx)?),
            "BYTEA" => SqlValue::Bytes(row.try_get(idx)?),
            "TIMESTAMPTZ" => SqlValue::Timestamp(row.try_get::<DateTime<Utc>, _>(idx)?),
            "TIMESTAMP" => SqlValue::Timestamp(row.try_get::<NaiveDateTime, _>(idx)?.and_utc()),
            _ => SqlValue::Text(row.try_get(idx)?),
        };
        values.push(value);
    }

    Ok(Row::new(columns, values))
}

fn decode_sqlite_row(row: &SqliteRow) -> Result<Row> {
    let mut columns = Vec::with_capacity(row.len());
    let mut values = Vec::with_capacity(row.len());

    for (idx, column) in row.columns().iter().enumerate() {
        columns.push(column.name().to_string());

        // SQLite is dynamically typed: decode by the storage class of the
        // value itself, not the declared column type.
        let storage = {
            let raw = row.try_get_raw(idx)?;
            if raw.is_null() {
                None
            } else {
                Some(raw.type_info().name().to_string())
            }
        };

        let value = match storage.as_deref() {
            None => SqlValue::Null,
            Some("INTEGER") => SqlValue::Int(row.try_get(idx)?),
            Some("REAL") => SqlValue::Float(row.try_get(idx)?),
            Some("BLOB") => SqlValue::Bytes(row.try_get(idx)?),
            Some(_) => SqlValue::Text(row.try_get(idx)?),
        };
        values.push(value);
    }

    Ok(Row::new(columns, values))
}

/// Map a PostgreSQL failure, keeping duplicate/undefined table causes apart.
pub fn map_pg_error(err: sqlx::Error) -> EvolutionError {
    match &err {
        sqlx::Error::Database(db) => {
            let kind = match db.code().as_deref() {
                Some("42P07") => DbErrorKind::DuplicateTable,
                Some("42P01") => DbErrorKind::UndefinedTable,
                _ => DbErrorKind::Other,
            };
            EvolutionError::Database {
                kind,
                message: db.message().to_string(),
            }
        }
        _ => EvolutionError::Sql(err),
    }
}

/// Map a SQLite failure. SQLite reports both table conflicts under the
/// generic SQLITE_ERROR code, so the message is the only discriminator.
pub fn map_sqlite_error(err: sqlx::Error) -> EvolutionError {
    match &err {
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            let kind = if message.starts_with("table") && message.contains("already exists") {
                DbErrorKind::DuplicateTable
            } else if message.starts_with("no such table") {
                DbErrorKind::UndefinedTable
            } else {
                DbErrorKind::Other
            };
            EvolutionError::Database { kind, message }
        }
        _ => EvolutionError::Sql(err),
    }
}

//! Table-agnostic record helpers.
//!
//! Every statement is assembled with [`QueryBuilder`]: identifiers come from a
//! fixed allow-list per [`Table`] and all values are bound parameters, so no
//! caller-supplied text is ever spliced into SQL.
//!
//! The `try_*` helpers take any SQLite executor, so they run equally against
//! the pool or inside a transaction (`&mut *tx`).

use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, FromRow, Pool, QueryBuilder, Sqlite};
use tracing::{debug, instrument};

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table {
    Students,
    Attendance,
    User,
}

const STUDENT_COLUMNS: &[&str] = &[
    "id",
    "idno",
    "lastname",
    "firstname",
    "course",
    "level",
    "avatar",
];

const ATTENDANCE_COLUMNS: &[&str] = &["id", "idno", "name", "course_level", "time_in", "date"];

const USER_COLUMNS: &[&str] = &["id", "email", "password"];

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Students => "students",
            Table::Attendance => "attendance",
            Table::User => "user",
        }
    }

    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Table::Students => STUDENT_COLUMNS,
            Table::Attendance => ATTENDANCE_COLUMNS,
            Table::User => USER_COLUMNS,
        }
    }

    /// Resolves `name` against the allow-list, returning the canonical identifier.
    pub fn column(&self, name: &str) -> Result<&'static str, AppError> {
        self.columns()
            .iter()
            .find(|column| **column == name)
            .copied()
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "Unknown column '{}' for table {}",
                    name,
                    self.name()
                ))
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Text(String),
    Null,
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<&String> for Value {
    fn from(value: &String) -> Self {
        Value::Text(value.clone())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn as_sql(&self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// Column/value pairs, used both for assignments and for equality filters.
pub type Fields<'a> = [(&'a str, Value)];

fn push_value(builder: &mut QueryBuilder<'_, Sqlite>, value: &Value) {
    match value {
        Value::Integer(i) => {
            builder.push_bind(*i);
        }
        Value::Text(s) => {
            builder.push_bind(s.clone());
        }
        Value::Null => {
            builder.push_bind(None::<String>);
        }
    }
}

fn push_filter(
    builder: &mut QueryBuilder<'_, Sqlite>,
    table: Table,
    filter: &Fields<'_>,
) -> Result<(), AppError> {
    builder.push(" WHERE ");
    for (i, (column, value)) in filter.iter().enumerate() {
        if i > 0 {
            builder.push(" AND ");
        }
        builder.push(table.column(column)?);
        builder.push(" = ");
        push_value(builder, value);
    }
    Ok(())
}

fn require_non_empty(fields: &Fields<'_>, what: &str, table: Table) -> Result<(), AppError> {
    if fields.is_empty() {
        return Err(AppError::Validation(format!(
            "Refusing to run a statement on {} without {}",
            table.name(),
            what
        )));
    }
    Ok(())
}

#[instrument(skip(executor))]
pub async fn try_fetch_all<'c, T, E>(
    executor: E,
    table: Table,
    order_by: &[(&str, Direction)],
) -> Result<Vec<T>, AppError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    E: Executor<'c, Database = Sqlite>,
{
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM ");
    builder.push(table.name());

    if !order_by.is_empty() {
        builder.push(" ORDER BY ");
        for (i, (column, direction)) in order_by.iter().enumerate() {
            if i > 0 {
                builder.push(", ");
            }
            builder.push(table.column(column)?);
            builder.push(" ");
            builder.push(direction.as_sql());
        }
    }

    debug!(sql = %builder.sql(), "Fetching all records");
    let rows = builder.build_query_as::<T>().fetch_all(executor).await?;
    Ok(rows)
}

#[instrument(skip(executor))]
pub async fn try_fetch_where<'c, T, E>(
    executor: E,
    table: Table,
    filter: &Fields<'_>,
) -> Result<Vec<T>, AppError>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
    E: Executor<'c, Database = Sqlite>,
{
    require_non_empty(filter, "a filter", table)?;

    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM ");
    builder.push(table.name());
    push_filter(&mut builder, table, filter)?;

    debug!(sql = %builder.sql(), "Fetching filtered records");
    let rows = builder.build_query_as::<T>().fetch_all(executor).await?;
    Ok(rows)
}

#[instrument(skip(executor))]
pub async fn try_insert<'c, E>(
    executor: E,
    table: Table,
    values: &Fields<'_>,
) -> Result<i64, AppError>
where
    E: Executor<'c, Database = Sqlite>,
{
    require_non_empty(values, "values", table)?;

    let mut builder = QueryBuilder::<Sqlite>::new("INSERT INTO ");
    builder.push(table.name());
    builder.push(" (");
    for (i, (column, _)) in values.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(table.column(column)?);
    }
    builder.push(") VALUES (");
    for (i, (_, value)) in values.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        push_value(&mut builder, value);
    }
    builder.push(")");

    debug!(sql = %builder.sql(), "Inserting record");
    let res = builder.build().execute(executor).await?;
    Ok(res.last_insert_rowid())
}

#[instrument(skip(executor))]
pub async fn try_update<'c, E>(
    executor: E,
    table: Table,
    values: &Fields<'_>,
    filter: &Fields<'_>,
) -> Result<u64, AppError>
where
    E: Executor<'c, Database = Sqlite>,
{
    require_non_empty(values, "values", table)?;
    require_non_empty(filter, "a filter", table)?;

    let mut builder = QueryBuilder::<Sqlite>::new("UPDATE ");
    builder.push(table.name());
    builder.push(" SET ");
    for (i, (column, value)) in values.iter().enumerate() {
        if i > 0 {
            builder.push(", ");
        }
        builder.push(table.column(column)?);
        builder.push(" = ");
        push_value(&mut builder, value);
    }
    push_filter(&mut builder, table, filter)?;

    debug!(sql = %builder.sql(), "Updating records");
    let res = builder.build().execute(executor).await?;
    Ok(res.rows_affected())
}

#[instrument(skip(executor))]
pub async fn try_delete<'c, E>(
    executor: E,
    table: Table,
    filter: &Fields<'_>,
) -> Result<u64, AppError>
where
    E: Executor<'c, Database = Sqlite>,
{
    require_non_empty(filter, "a filter", table)?;

    let mut builder = QueryBuilder::<Sqlite>::new("DELETE FROM ");
    builder.push(table.name());
    push_filter(&mut builder, table, filter)?;

    debug!(sql = %builder.sql(), "Deleting records");
    let res = builder.build().execute(executor).await?;
    Ok(res.rows_affected())
}

// Degrading forms: failures are logged and surface as an empty list or `false`.

pub async fn get_all<T>(pool: &Pool<Sqlite>, table: Table, order_by: &[(&str, Direction)]) -> Vec<T>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    try_fetch_all(pool, table, order_by)
        .await
        .unwrap_or_else(|err| {
            err.log_and_record(&format!("get_all on {}", table.name()));
            Vec::new()
        })
}

pub async fn get_record<T>(pool: &Pool<Sqlite>, table: Table, filter: &Fields<'_>) -> Vec<T>
where
    T: for<'r> FromRow<'r, SqliteRow> + Send + Unpin,
{
    try_fetch_where(pool, table, filter)
        .await
        .unwrap_or_else(|err| {
            err.log_and_record(&format!("get_record on {}", table.name()));
            Vec::new()
        })
}

pub async fn add_record(pool: &Pool<Sqlite>, table: Table, values: &Fields<'_>) -> bool {
    match try_insert(pool, table, values).await {
        Ok(_) => true,
        Err(err) => {
            err.log_and_record(&format!("add_record on {}", table.name()));
            false
        }
    }
}

pub async fn update_record(
    pool: &Pool<Sqlite>,
    table: Table,
    values: &Fields<'_>,
    filter: &Fields<'_>,
) -> bool {
    match try_update(pool, table, values, filter).await {
        Ok(_) => true,
        Err(err) => {
            err.log_and_record(&format!("update_record on {}", table.name()));
            false
        }
    }
}

pub async fn delete_record(pool: &Pool<Sqlite>, table: Table, filter: &Fields<'_>) -> bool {
    match try_delete(pool, table, filter).await {
        Ok(_) => true,
        Err(err) => {
            err.log_and_record(&format!("delete_record on {}", table.name()));
            false
        }
    }
}

//! Bind serde_json values onto sqlx queries with the matching Postgres type.

use serde_json::Value;
use sqlx::postgres::{PgArguments, Postgres};
use sqlx::query::QueryScalar;
use sqlx::types::Json;

use super::QueryBuf;

/// Bind one JSON value. Strings bind as text (columns with a declared type get a cast in the SQL),
/// integers as int8, other numbers as float8, arrays and objects as jsonb.
pub fn bind_value<'q, O>(
    query: QueryScalar<'q, Postgres, O, PgArguments>,
    v: &'q Value,
) -> QueryScalar<'q, Postgres, O, PgArguments>
where
    O: Send + Unpin,
    (O,): for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>,
{
    match v {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64()),
        },
        Value::String(s) => query.bind(s.as_str()),
        Value::Array(_) | Value::Object(_) => query.bind(Json(v)),
    }
}

/// Scalar query over `q.sql` with every param bound in order.
pub fn scalar_query<O>(q: &QueryBuf) -> QueryScalar<'_, Postgres, O, PgArguments>
where
    O: Send + Unpin,
    (O,): for<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow>,
{
    let mut query = sqlx::query_scalar::<_, O>(&q.sql);
    for p in &q.params {
        query = bind_value(query, p);
    }
    query
}

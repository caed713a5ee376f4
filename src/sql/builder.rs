//! Builds parameterized SELECT, COUNT, INSERT, UPSERT, DELETE from a resource schema.
//! Rows come back as one JSONB value each (`to_jsonb(main)`).

use crate::paging::PageDescriptor;
use crate::store::{Condition, Filter, OrderBy, ResourceSchema, SortDirection};
use serde_json::{Map, Value};

const MAIN_ALIAS: &str = "main";

/// Quote identifier for PostgreSQL (safe: only from schema).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

/// Main table with its alias, e.g. `"public"."books" AS main`.
fn main_table(resource: &ResourceSchema) -> String {
    format!(
        "{} AS {}",
        qualified_table(&resource.schema_name, &resource.table_name),
        MAIN_ALIAS
    )
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    fn push_param(&mut self, v: Value) -> u32 {
        let n = self.params.len() as u32 + 1;
        self.params.push(v);
        n
    }

    /// Push a value destined for `column`, returning its placeholder with the column's cast if declared.
    fn placeholder(&mut self, resource: &ResourceSchema, column: &str, v: Value) -> String {
        let n = self.push_param(v);
        resource
            .column_info(column)
            .and_then(|c| c.pg_type.as_deref())
            .map(|t| format!("${}::{}", n, t))
            .unwrap_or_else(|| format!("${}", n))
    }
}

/// WHERE clause for `filter`; unknown fields and relations are skipped.
fn where_clause(resource: &ResourceSchema, filter: &Filter, q: &mut QueryBuf) -> String {
    let mut parts = Vec::new();
    for condition in &filter.conditions {
        match condition {
            Condition::Eq { field, value } => {
                let Some(col) = resource.column_info(field) else { continue };
                if col.pg_type.is_some() {
                    let ph = q.placeholder(resource, field, value.clone());
                    parts.push(format!("{}.{} = {}", MAIN_ALIAS, quoted(field), ph));
                } else {
                    // untyped column: compare textually so string path params match any type
                    let n = q.push_param(Value::String(text_of(value)));
                    parts.push(format!("{}.{}::text = ${}", MAIN_ALIAS, quoted(field), n));
                }
            }
            Condition::Related { relation, id } => {
                let Some(rel) = resource.relation_info(relation) else { continue };
                let n = q.push_param(Value::String(id.clone()));
                parts.push(format!(
                    "EXISTS (SELECT 1 FROM {} j WHERE j.{} = {}.{} AND j.{}::text = ${})",
                    qualified_table(&resource.schema_name, &rel.join_table),
                    quoted(&rel.owner_column),
                    MAIN_ALIAS,
                    quoted(&resource.primary_key),
                    quoted(&rel.target_column),
                    n
                ));
            }
        }
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn text_of(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// SELECT by primary key. The id is the sole param.
pub fn select_by_id(resource: &ResourceSchema, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = &resource.primary_key;
    let ph = q.placeholder(resource, pk, Value::String(id.to_string()));
    q.sql = format!(
        "SELECT to_jsonb({alias}) FROM {} WHERE {alias}.{} = {}",
        main_table(resource),
        quoted(pk),
        ph,
        alias = MAIN_ALIAS
    );
    q
}

/// SELECT matching rows. Without ordering, rows come back by primary key so pages are stable.
pub fn select_page(
    resource: &ResourceSchema,
    filter: &Filter,
    order: &[OrderBy],
    page: Option<PageDescriptor>,
) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(resource, filter, &mut q);
    let mut order_parts: Vec<String> = order
        .iter()
        .filter(|o| resource.has_field(&o.field))
        .map(|o| {
            let dir = match o.direction {
                SortDirection::Asc => "ASC",
                SortDirection::Desc => "DESC",
            };
            format!("{}.{} {}", MAIN_ALIAS, quoted(&o.field), dir)
        })
        .collect();
    order_parts.push(format!("{}.{}", MAIN_ALIAS, quoted(&resource.primary_key)));
    let page_sql = page
        .map(|p| format!(" LIMIT {} OFFSET {}", p.take, p.skip))
        .unwrap_or_default();
    q.sql = format!(
        "SELECT to_jsonb({}) FROM {}{} ORDER BY {}{}",
        MAIN_ALIAS,
        main_table(resource),
        where_sql,
        order_parts.join(", "),
        page_sql
    );
    q
}

/// COUNT(*) over the same filter as [`select_page`], ignoring paging.
pub fn count(resource: &ResourceSchema, filter: &Filter) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(resource, filter, &mut q);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", main_table(resource), where_sql);
    q
}

/// Known columns present in `data`, in schema order.
fn known_columns<'a>(resource: &'a ResourceSchema, data: &Map<String, Value>) -> Vec<&'a str> {
    resource
        .columns
        .iter()
        .filter(|c| data.contains_key(&c.name))
        .map(|c| c.name.as_str())
        .collect()
}

/// INSERT of the known columns in `data`; columns left out take their DB default.
pub fn insert(resource: &ResourceSchema, data: &Map<String, Value>) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = known_columns(resource, data);
    let placeholders: Vec<String> = cols
        .iter()
        .map(|c| q.placeholder(resource, c, data[*c].clone()))
        .collect();
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING to_jsonb({})",
        main_table(resource),
        cols.iter().map(|c| quoted(c)).collect::<Vec<_>>().join(", "),
        placeholders.join(", "),
        MAIN_ALIAS
    );
    q
}

/// INSERT .. ON CONFLICT (pk) DO UPDATE of the known columns in `data`.
pub fn upsert(resource: &ResourceSchema, data: &Map<String, Value>) -> QueryBuf {
    let mut q = insert(resource, data);
    let pk = &resource.primary_key;
    let mut sets: Vec<String> = known_columns(resource, data)
        .into_iter()
        .filter(|c| *c != pk.as_str())
        .map(|c| format!("{} = EXCLUDED.{}", quoted(c), quoted(c)))
        .collect();
    if sets.is_empty() {
        // DO NOTHING would return no row
        sets.push(format!("{} = EXCLUDED.{}", quoted(pk), quoted(pk)));
    }
    let returning = format!(" RETURNING to_jsonb({})", MAIN_ALIAS);
    let head = q.sql.trim_end_matches(&returning).to_string();
    q.sql = format!(
        "{} ON CONFLICT ({}) DO UPDATE SET {}{}",
        head,
        quoted(pk),
        sets.join(", "),
        returning
    );
    q
}

/// DELETE by id, returning the primary key of the removed row.
pub fn delete(resource: &ResourceSchema, id: &str) -> QueryBuf {
    let mut q = QueryBuf::new();
    let pk = &resource.primary_key;
    let ph = q.placeholder(resource, pk, Value::String(id.to_string()));
    q.sql = format!(
        "DELETE FROM {} WHERE {alias}.{pk} = {} RETURNING {alias}.{pk}::text",
        main_table(resource),
        ph,
        alias = MAIN_ALIAS,
        pk = quoted(pk)
    );
    q
}

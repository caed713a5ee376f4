//! Resource schema: the known scalar fields and relations of one resource, used for filtering and SQL generation.

use super::{Filter, ID_FIELD};
use std::collections::HashMap;

/// Suffix that turns a relation name into a path parameter (`author` -> `authorId`).
const RELATION_PARAM_SUFFIX: &str = "Id";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub name: String,
    /// PostgreSQL type used to cast bound text values (e.g. "uuid", "timestamptz").
    pub pg_type: Option<String>,
}

/// To-many relation resolved through a table holding (owner, target) pairs.
/// For a plain child table the target column is the child's primary key.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RelationInfo {
    pub name: String,
    pub join_table: String,
    /// Column in the join table referencing this resource's primary key.
    pub owner_column: String,
    /// Column in the join table holding the related entity's id.
    pub target_column: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceSchema {
    /// Resource name, used in messages and logs.
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub primary_key: String,
    pub columns: Vec<ColumnInfo>,
    pub relations: Vec<RelationInfo>,
    /// Fields that must be unique across records.
    pub unique: Vec<String>,
}

impl ResourceSchema {
    /// Schema for `name` stored in `public.<name>` with a text `id` primary key.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        ResourceSchema {
            table_name: name.clone(),
            name,
            schema_name: "public".into(),
            primary_key: ID_FIELD.into(),
            columns: vec![ColumnInfo {
                name: ID_FIELD.into(),
                pg_type: None,
            }],
            relations: Vec::new(),
            unique: Vec::new(),
        }
    }

    pub fn in_schema(mut self, schema_name: impl Into<String>) -> Self {
        self.schema_name = schema_name.into();
        self
    }

    pub fn table(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = table_name.into();
        self
    }

    pub fn column(self, name: impl Into<String>) -> Self {
        self.push_column(name.into(), None)
    }

    pub fn typed_column(self, name: impl Into<String>, pg_type: impl Into<String>) -> Self {
        self.push_column(name.into(), Some(pg_type.into()))
    }

    /// Mark an existing or new column as unique.
    pub fn unique(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.has_field(&name) {
            self = self.column(name.clone());
        }
        if !self.unique.contains(&name) {
            self.unique.push(name);
        }
        self
    }

    pub fn relation(
        mut self,
        name: impl Into<String>,
        join_table: impl Into<String>,
        owner_column: impl Into<String>,
        target_column: impl Into<String>,
    ) -> Self {
        self.relations.push(RelationInfo {
            name: name.into(),
            join_table: join_table.into(),
            owner_column: owner_column.into(),
            target_column: target_column.into(),
        });
        self
    }

    fn push_column(mut self, name: String, pg_type: Option<String>) -> Self {
        match self.columns.iter_mut().find(|c| c.name == name) {
            Some(existing) => existing.pg_type = pg_type.or(existing.pg_type.take()),
            None => self.columns.push(ColumnInfo { name, pg_type }),
        }
        self
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn column_info(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn relation_info(&self, name: &str) -> Option<&RelationInfo> {
        self.relations.iter().find(|r| r.name == name)
    }

    /// Filter from request path parameters: known scalar fields match by equality,
    /// `<relation>Id` parameters require a related entity with that id, anything else is ignored.
    pub fn filter_from_params(&self, params: &HashMap<String, String>) -> Filter {
        let mut keys: Vec<&String> = params.keys().collect();
        keys.sort();
        let mut filter = Filter::new();
        for key in keys {
            let value = &params[key];
            if self.has_field(key) {
                filter = filter.eq(key.as_str(), value.as_str());
            } else if let Some(relation) = key.strip_suffix(RELATION_PARAM_SUFFIX) {
                if self.relation_info(relation).is_some() {
                    filter = filter.related(relation, value.as_str());
                }
            }
        }
        filter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Condition;
    use serde_json::json;

    fn books() -> ResourceSchema {
        ResourceSchema::new("books")
            .column("title")
            .column("shelf")
            .relation("author", "book_authors", "book_id", "author_id")
    }

    #[test]
    fn id_column_is_always_known() {
        assert!(ResourceSchema::new("x").has_field("id"));
    }

    #[test]
    fn scalar_params_become_equality_conditions() {
        let params = HashMap::from([("shelf".to_string(), "s1".to_string())]);
        let filter = books().filter_from_params(&params);
        assert_eq!(
            filter.conditions,
            vec![Condition::Eq {
                field: "shelf".into(),
                value: json!("s1")
            }]
        );
    }

    #[test]
    fn relation_id_params_become_related_conditions() {
        let params = HashMap::from([
            ("authorId".to_string(), "a1".to_string()),
            ("unknownId".to_string(), "zzz".to_string()),
            ("other".to_string(), "ignored".to_string()),
        ]);
        let filter = books().filter_from_params(&params);
        assert_eq!(
            filter.conditions,
            vec![Condition::Related {
                relation: "author".into(),
                id: "a1".into()
            }]
        );
    }

    #[test]
    fn unique_adds_missing_column() {
        let schema = ResourceSchema::new("users").unique("email");
        assert!(schema.has_field("email"));
        assert_eq!(schema.unique, vec!["email".to_string()]);
    }
}

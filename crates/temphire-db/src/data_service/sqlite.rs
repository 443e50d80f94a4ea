//! # SQLite Data Service
//!
//! Stores entities as JSON documents in one `entities` table and answers
//! entity-manager reads and commits from it.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  entities                                                               │
//! │  ───────────────────────────────────────────────────────────────────── │
//! │  entity_type       │ entity_key │ resource_name     │ payload (JSON)   │
//! │  StaffingResource  │ 7f3c…      │ StaffingResources │ {"firstName":…}  │
//! │  State             │ 1          │ State             │ {"shortName":…}  │
//! │                                                                         │
//! │  PRIMARY KEY (entity_type, entity_key)                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Predicate Translation
//! Predicates become `WHERE` clauses over `json_extract(payload, '$.field')`
//! with every value bound as a parameter. Each comparison is wrapped in
//! `COALESCE(…, 0)` so SQL's three-valued logic never disagrees with
//! in-memory evaluation (`NOT` over a missing field stays true).

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use sqlx::{Sqlite, SqlitePool};
use temphire_core::{CompareOp, ComparePredicate, EntityKey, EntityState, EntityType, Predicate};
use tracing::{debug, info};

use super::{DataService, Fetched, SaveBundle};
use crate::error::{DbError, DbResult};
use crate::query::EntityQuery;

/// [`DataService`] backed by the local SQLite database.
#[derive(Debug, Clone)]
pub struct SqliteDataService {
    pool: SqlitePool,
}

impl SqliteDataService {
    /// Creates a data service over an existing pool.
    pub fn new(pool: SqlitePool) -> Self {
        SqliteDataService { pool }
    }

    /// Counts stored entities of one type (for diagnostics and seeding).
    pub async fn count(&self, entity_type: &str) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities WHERE entity_type = ?1")
            .bind(entity_type)
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    async fn load_by_key(&self, entity_type: &EntityType, key: &EntityKey) -> DbResult<Option<Value>> {
        let payload: Option<String> = sqlx::query_scalar(
            "SELECT payload FROM entities WHERE entity_type = ?1 AND entity_key = ?2",
        )
        .bind(&entity_type.name)
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;

        payload
            .map(|p| serde_json::from_str(&p).map_err(DbError::from))
            .transpose()
    }

    async fn load_query(
        &self,
        query: &EntityQuery,
        entity_type: Option<&EntityType>,
    ) -> DbResult<Option<Vec<Value>>> {
        let mut params = Vec::new();
        let (scope_sql, scope) = match entity_type {
            Some(entity_type) => ("entity_type = ?", entity_type.name.clone()),
            None => ("resource_name = ?", query.resource_name().to_string()),
        };
        params.push(SqlParam::Text(scope));

        let filter = predicate_sql(query.predicate(), &mut params);
        let sql = format!(
            "SELECT payload FROM entities WHERE {} AND ({}) ORDER BY entity_key",
            scope_sql, filter
        );

        let mut statement = sqlx::query_scalar::<Sqlite, String>(&sql);
        for param in &params {
            statement = match param {
                SqlParam::Text(s) => statement.bind(s.as_str()),
                SqlParam::Integer(i) => statement.bind(*i),
                SqlParam::Real(f) => statement.bind(*f),
            };
        }
        let rows: Vec<String> = statement.fetch_all(&self.pool).await?;

        // An unmapped resource with nothing stored under its name does not exist
        if rows.is_empty() && entity_type.is_none() {
            let exists: i64 =
                sqlx::query_scalar("SELECT COUNT(*) FROM entities WHERE resource_name = ?1")
                    .bind(query.resource_name())
                    .fetch_one(&self.pool)
                    .await?;
            if exists == 0 {
                return Ok(None);
            }
        }

        let values = rows
            .iter()
            .map(|row| serde_json::from_str(row))
            .collect::<Result<Vec<Value>, _>>()?;
        Ok(Some(values))
    }
}

#[async_trait]
impl DataService for SqliteDataService {
    async fn fetch_by_key(&self, entity_type: &EntityType, key: &EntityKey) -> Fetched<Value> {
        debug!(entity_type = %entity_type.name, key = %key, "Loading entity");

        match self.load_by_key(entity_type, key).await {
            Ok(Some(value)) => Fetched::Found(value),
            Ok(None) => Fetched::NotFound,
            Err(err) => Fetched::Failure(err),
        }
    }

    async fn execute_query(
        &self,
        query: &EntityQuery,
        entity_type: Option<&EntityType>,
    ) -> Fetched<Vec<Value>> {
        debug!(resource = %query.resource_name(), "Running stored query");

        match self.load_query(query, entity_type).await {
            Ok(Some(values)) => Fetched::Found(values),
            Ok(None) => Fetched::NotFound,
            Err(err) => Fetched::Failure(err),
        }
    }

    async fn save_changes(&self, bundle: &SaveBundle) -> DbResult<()> {
        if bundle.is_empty() {
            return Ok(());
        }

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(format!("Failed to start transaction: {}", e)))?;

        for change in &bundle.changes {
            let payload = serde_json::to_string(&change.values)?;

            match change.state {
                EntityState::Added => {
                    sqlx::query(
                        r#"
                        INSERT INTO entities (
                            entity_type, entity_key, resource_name, payload, updated_at
                        ) VALUES (?1, ?2, ?3, ?4, ?5)
                        "#,
                    )
                    .bind(&change.entity_type)
                    .bind(change.key.as_str())
                    .bind(&change.resource_name)
                    .bind(&payload)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                }
                EntityState::Modified => {
                    let result = sqlx::query(
                        r#"
                        UPDATE entities SET
                            resource_name = ?3,
                            payload = ?4,
                            updated_at = ?5
                        WHERE entity_type = ?1 AND entity_key = ?2
                        "#,
                    )
                    .bind(&change.entity_type)
                    .bind(change.key.as_str())
                    .bind(&change.resource_name)
                    .bind(&payload)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;

                    if result.rows_affected() == 0 {
                        return Err(DbError::invalid_state(
                            &change.entity_type,
                            &change.key,
                            "no longer exists in storage",
                        ));
                    }
                }
                EntityState::Deleted => {
                    sqlx::query("DELETE FROM entities WHERE entity_type = ?1 AND entity_key = ?2")
                        .bind(&change.entity_type)
                        .bind(change.key.as_str())
                        .execute(&mut *tx)
                        .await?;
                }
                EntityState::Unchanged | EntityState::Detached => {}
            }
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(changes = bundle.len(), "Saved change bundle");
        Ok(())
    }
}

// =============================================================================
// Predicate → SQL
// =============================================================================

/// Bound parameter for a generated statement.
#[derive(Debug, Clone, PartialEq)]
enum SqlParam {
    Text(String),
    Integer(i64),
    Real(f64),
}

fn json_path(field: &str) -> SqlParam {
    SqlParam::Text(format!("$.{}", field))
}

fn scalar_param(value: &Value) -> Option<SqlParam> {
    match value {
        Value::String(s) => Some(SqlParam::Text(s.clone())),
        Value::Bool(b) => Some(SqlParam::Integer(i64::from(*b))),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Some(SqlParam::Integer(i)),
            None => n.as_f64().map(SqlParam::Real),
        },
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// `json_type` values a bound scalar may be compared against.
fn json_types_for(value: &Value) -> &'static str {
    match value {
        Value::String(_) => "('text')",
        Value::Bool(_) => "('true', 'false')",
        Value::Number(_) => "('integer', 'real')",
        _ => "('null')",
    }
}

fn like_pattern(text: &str, prefix_only: bool) -> String {
    let escaped = text
        .to_ascii_lowercase()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    if prefix_only {
        format!("{}%", escaped)
    } else {
        format!("%{}%", escaped)
    }
}

fn predicate_sql(predicate: &Predicate, params: &mut Vec<SqlParam>) -> String {
    match predicate {
        Predicate::True => "1".to_string(),
        Predicate::False => "0".to_string(),
        Predicate::And(parts) if parts.is_empty() => "1".to_string(),
        Predicate::Or(parts) if parts.is_empty() => "0".to_string(),
        Predicate::And(parts) => join_parts(parts, " AND ", params),
        Predicate::Or(parts) => join_parts(parts, " OR ", params),
        Predicate::Not(inner) => format!("NOT ({})", predicate_sql(inner, params)),
        Predicate::IsNull { field } => {
            params.push(json_path(field));
            "(json_extract(payload, ?) IS NULL)".to_string()
        }
        Predicate::Compare(cmp) => compare_sql(cmp, params),
    }
}

fn join_parts(parts: &[Predicate], separator: &str, params: &mut Vec<SqlParam>) -> String {
    let sql: Vec<String> = parts.iter().map(|p| predicate_sql(p, params)).collect();
    format!("({})", sql.join(separator))
}

fn compare_sql(cmp: &ComparePredicate, params: &mut Vec<SqlParam>) -> String {
    let column = "json_extract(payload, ?)";

    let body = match cmp.op {
        CompareOp::Eq | CompareOp::Ne => {
            let negate = cmp.op == CompareOp::Ne;
            match scalar_param(&cmp.value) {
                None => {
                    params.push(json_path(&cmp.field));
                    if negate {
                        format!("{} IS NOT NULL", column)
                    } else {
                        format!("{} IS NULL", column)
                    }
                }
                Some(param) => {
                    params.push(json_path(&cmp.field));
                    params.push(json_path(&cmp.field));
                    params.push(param);
                    let equal = format!(
                        "json_type(payload, ?) IN {} AND {} = ?",
                        json_types_for(&cmp.value),
                        column
                    );
                    // a missing field is "not equal", never unknown
                    if negate {
                        format!("NOT COALESCE(({}), 0)", equal)
                    } else {
                        equal
                    }
                }
            }
        }
        CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
            let operator = match cmp.op {
                CompareOp::Lt => "<",
                CompareOp::Lte => "<=",
                CompareOp::Gt => ">",
                _ => ">=",
            };
            match scalar_param(&cmp.value) {
                None => "0".to_string(),
                Some(param) => {
                    params.push(json_path(&cmp.field));
                    params.push(json_path(&cmp.field));
                    params.push(param);
                    format!(
                        "json_type(payload, ?) IN {} AND {} {} ?",
                        json_types_for(&cmp.value),
                        column,
                        operator
                    )
                }
            }
        }
        CompareOp::In => {
            let candidates = match &cmp.value {
                Value::Array(items) => items.as_slice(),
                _ => &[],
            };
            let clauses: Vec<String> = candidates
                .iter()
                .map(|candidate| {
                    let eq = ComparePredicate::new(cmp.field.clone(), CompareOp::Eq, candidate.clone());
                    compare_sql(&eq, params)
                })
                .collect();
            if clauses.is_empty() {
                "0".to_string()
            } else {
                clauses.join(" OR ")
            }
        }
        CompareOp::Contains | CompareOp::StartsWith => match &cmp.value {
            Value::String(text) => {
                params.push(json_path(&cmp.field));
                params.push(json_path(&cmp.field));
                params.push(SqlParam::Text(like_pattern(
                    text,
                    cmp.op == CompareOp::StartsWith,
                )));
                format!(
                    "json_type(payload, ?) = 'text' AND lower({}) LIKE ? ESCAPE '\\'",
                    column
                )
            }
            _ => "0".to_string(),
        },
    };

    format!("COALESCE(({}), 0)", body)
}

// =============================================================================
// Unit Tests
// =============================================================================

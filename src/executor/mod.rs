//! Statement execution + nested-result assembly (spec.md §4.8, component C9).
//!
//! Runs every statement the compiler emitted, then walks the query tree once
//! more to stitch join result sets back onto their parent rows (spec.md §4.8
//! step 5). Never opens a transaction — the read path relies on the
//! database's own snapshot isolation (spec.md §5); only [`crate::mutation`]
//! does.

pub mod bind;
pub mod cell;
mod decode;

pub use cell::{CellValue, ResultSet};

use std::collections::HashMap;

use crate::compiler::StatementMap;
use crate::db::Pool;
use crate::error::EngineError;
use crate::model::{DbModel, Table};
use crate::query_tree::{FilterValue, JoinKind, TableQuery};

use bind::{bind_mysql, bind_postgres, bind_sqlite};

/// Runs every statement in `stmts`, binding `params` by the half-open range
/// each statement addresses, then assembles the nested JSON response for
/// `root` (spec.md §4.8 steps 1-5).
pub async fn run(
    root: &TableQuery,
    stmts: &StatementMap,
    params: &[FilterValue],
    pool: &Pool,
    model: &DbModel,
) -> Result<serde_json::Value, EngineError> {
    let results = execute_statements(stmts, params, pool).await?;
    assemble_root(root, &results, model)
}

async fn execute_statements(
    stmts: &StatementMap,
    params: &[FilterValue],
    pool: &Pool,
) -> Result<HashMap<String, ResultSet>, EngineError> {
    match pool {
        Pool::Sqlite(p) => execute_sqlite(stmts, params, p).await,
        Pool::Postgres(p) => execute_postgres(stmts, params, p).await,
        Pool::MySql(p) => execute_mysql(stmts, params, p).await,
        #[cfg(feature = "mssql")]
        Pool::Mssql(p) => execute_mssql(stmts, params, p).await,
    }
}

fn exec_failed(sql: &str, e: impl std::fmt::Display) -> EngineError {
    EngineError::ExecutionFailed {
        statement: sql.to_string(),
        param_names: Vec::new(),
        source: anyhow::anyhow!(e.to_string()),
    }
}

/// SQLite has no concept of multiplexing several result sets over one round
/// trip (spec.md §4.8 step 3; `Engine::supports_batched_result_sets` is
/// `false` for it), so it always runs one statement at a time on the same
/// connection, in statement-map order.
async fn execute_sqlite(
    stmts: &StatementMap,
    params: &[FilterValue],
    pool: &sqlx::SqlitePool,
) -> Result<HashMap<String, ResultSet>, EngineError> {
    let mut conn = pool.acquire().await.map_err(|e| EngineError::ConnectionFailed(e.into()))?;
    let mut out = HashMap::new();
    for (name, sql, range) in stmts.iter() {
        let mut q = sqlx::query(sql);
        for v in &params[range] {
            q = bind_sqlite(q, v);
        }
        let rows = q.fetch_all(&mut *conn).await.map_err(|e| exec_failed(sql, e))?;
        out.insert(name.to_string(), decode::decode_sqlx_rows(rows));
    }
    Ok(out)
}

/// `sqlx`'s Postgres/MySQL pools don't expose a generic "one round trip, many
/// result sets" API the way tiberius does, so despite `Engine::Postgres`/
/// `Engine::MySql` reporting `supports_batched_result_sets() == true`, this
/// executes the same statement-at-a-time sequence SQLite does, over one
/// borrowed connection. True multiplexing would need driver-specific
/// pipelining; tracked as a simplification in DESIGN.md rather than modeled
/// here.
async fn execute_postgres(
    stmts: &StatementMap,
    params: &[FilterValue],
    pool: &sqlx::PgPool,
) -> Result<HashMap<String, ResultSet>, EngineError> {
    let mut conn = pool.acquire().await.map_err(|e| EngineError::ConnectionFailed(e.into()))?;
    let mut out = HashMap::new();
    for (name, sql, range) in stmts.iter() {
        let mut q = sqlx::query(sql);
        for v in &params[range] {
            q = bind_postgres(q, v);
        }
        let rows = q.fetch_all(&mut *conn).await.map_err(|e| exec_failed(sql, e))?;
        out.insert(name.to_string(), decode::decode_sqlx_rows(rows));
    }
    Ok(out)
}

async fn execute_mysql(
    stmts: &StatementMap,
    params: &[FilterValue],
    pool: &sqlx::MySqlPool,
) -> Result<HashMap<String, ResultSet>, EngineError> {
    let mut conn = pool.acquire().await.map_err(|e| EngineError::ConnectionFailed(e.into()))?;
    let mut out = HashMap::new();
    for (name, sql, range) in stmts.iter() {
        let mut q = sqlx::query(sql);
        for v in &params[range] {
            q = bind_mysql(q, v);
        }
        let rows = q.fetch_all(&mut *conn).await.map_err(|e| exec_failed(sql, e))?;
        out.insert(name.to_string(), decode::decode_sqlx_rows(rows));
    }
    Ok(out)
}

/// tiberius *can* multiplex: a semicolon-joined batch of statements, bound
/// against the whole shared parameter vector in order, returns one result set
/// per statement via `into_results()` (spec.md §4.8 step 3).
#[cfg(feature = "mssql")]
async fn execute_mssql(
    stmts: &StatementMap,
    params: &[FilterValue],
    pool: &crate::db::MssqlPool,
) -> Result<HashMap<String, ResultSet>, EngineError> {
    use bind::bind_mssql;

    if stmts.is_empty() {
        return Ok(HashMap::new());
    }

    let mut client = pool.acquire().await.map_err(|e| exec_failed("acquire", e))?;
    let names: Vec<String> = stmts.iter().map(|(name, ..)| name.to_string()).collect();
    let batch: String = stmts.iter().map(|(_, sql, _)| sql).collect::<Vec<_>>().join("; ");

    let mut query = tiberius::Query::new(batch);
    for v in params {
        bind_mssql(&mut query, v);
    }

    let stream = query.query(&mut *client).await.map_err(|e| exec_failed("batch", e))?;
    let result_sets = stream.into_results().await.map_err(|e| exec_failed("batch", e))?;

    let mut out = HashMap::new();
    for (name, rows) in names.into_iter().zip(result_sets.into_iter()) {
        out.insert(name, decode::decode_mssql_rows(rows));
    }
    Ok(out)
}

fn missing_result(name: &str) -> EngineError {
    EngineError::ExecutionFailed {
        statement: name.to_string(),
        param_names: Vec::new(),
        source: anyhow::anyhow!("no result set returned for statement '{name}'"),
    }
}

fn cell_key(cell: &CellValue) -> String {
    match cell {
        CellValue::String(s) => s.clone(),
        CellValue::Int(i) => i.to_string(),
        CellValue::Float(f) => f.to_string(),
        CellValue::Bool(b) => b.to_string(),
        CellValue::Null => String::new(),
    }
}

fn cell_to_i64(cell: &CellValue) -> i64 {
    match cell {
        CellValue::Int(i) => *i,
        CellValue::Float(f) => *f as i64,
        _ => 0,
    }
}

/// Turns one decoded row into a (graphql-keyed JSON object, raw-column-keyed
/// lookup table) pair — the JSON object is what resolvers ultimately see; the
/// raw lookup is what join attachment below correlates on, since
/// `Join::from_column` names a raw column, not necessarily its GraphQL alias.
fn row_maps(table: &Table, columns: &[String], cells: &[CellValue]) -> (serde_json::Map<String, serde_json::Value>, HashMap<String, CellValue>) {
    let mut json = serde_json::Map::new();
    let mut raw = HashMap::new();
    for (col, cell) in columns.iter().zip(cells.iter()) {
        raw.insert(col.clone(), cell.clone());
        let key = table.column_by_name(col).map(|c| c.graphql_name.clone()).unwrap_or_else(|| col.clone());
        json.insert(key, cell.clone().into_json());
    }
    (json, raw)
}

fn assemble_root(root: &TableQuery, results: &HashMap<String, ResultSet>, model: &DbModel) -> Result<serde_json::Value, EngineError> {
    let table = model.table_by_raw_name(&root.table).ok_or_else(|| EngineError::UnknownLink {
        table: root.table.clone(),
        link: String::new(),
    })?;
    let base = results.get(root.statement_key()).ok_or_else(|| missing_result(root.statement_key()))?;
    let rows = assemble_rows(root, root.statement_key(), base, table, model, results)?;

    if root.include_meta {
        let count_name = format!("{}_count", root.statement_key());
        let count_rs = results.get(&count_name).ok_or_else(|| missing_result(&count_name))?;
        let total = count_rs.rows.first().and_then(|r| r.first()).map(cell_to_i64).unwrap_or(0);
        Ok(serde_json::json!({ "data": rows, "total": total }))
    } else {
        Ok(serde_json::Value::Array(rows))
    }
}

/// Builds JSON rows for `query`'s own projection (`base`), then attaches every
/// join's correlated children, recursing depth-first so a join's own nested
/// joins are attached before this level groups and attaches its rows onto the
/// parent (spec.md §4.8 step 5).
fn assemble_rows(
    query: &TableQuery,
    own_stmt_name: &str,
    base: &ResultSet,
    table: &Table,
    model: &DbModel,
    results: &HashMap<String, ResultSet>,
) -> Result<Vec<serde_json::Value>, EngineError> {
    let mut rows: Vec<(serde_json::Map<String, serde_json::Value>, HashMap<String, CellValue>)> =
        base.rows.iter().map(|cells| row_maps(table, &base.columns, cells)).collect();

    for join in &query.joins {
        let join_stmt = format!("{own_stmt_name}->{}", join.statement_key());
        let join_rs = results.get(&join_stmt).ok_or_else(|| missing_result(&join_stmt))?;
        let child_table = model.table_by_raw_name(&join.to_table).ok_or_else(|| EngineError::UnknownLink {
            table: join.to_table.clone(),
            link: join.name.clone(),
        })?;

        // join_rs columns are `[src_id, <child cols...>]`; strip the grouping
        // key off before recursing so the child's own nested joins see the
        // same shape a root statement's result set would have.
        let child_cols = join_rs.columns.get(1..).unwrap_or_default().to_vec();
        let synthetic = ResultSet {
            columns: child_cols,
            rows: join_rs.rows.iter().map(|r| r.get(1..).unwrap_or_default().to_vec()).collect(),
        };
        let keys: Vec<String> = join_rs.rows.iter().map(|r| cell_key(&r[0])).collect();
        let nested = assemble_rows(&join.child, &join_stmt, &synthetic, child_table, model, results)?;

        let mut grouped: HashMap<String, Vec<serde_json::Value>> = HashMap::new();
        for (key, row) in keys.into_iter().zip(nested.into_iter()) {
            grouped.entry(key).or_default().push(row);
        }

        for (json_row, raw_row) in &mut rows {
            let key = raw_row.get(&join.from_column).map(cell_key).unwrap_or_default();
            let children = grouped.get(&key).cloned().unwrap_or_default();
            let value = match join.kind {
                JoinKind::Multi => serde_json::Value::Array(children),
                JoinKind::Single => children.into_iter().next().unwrap_or(serde_json::Value::Null),
            };
            json_row.insert(join.name.clone(), value);
        }
    }

    Ok(rows.into_iter().map(|(json, _)| serde_json::Value::Object(json)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MetadataOverlay;
    use crate::model::DbModelBuilder;
    use crate::query_tree::{Join, JoinOrigin};
    use crate::schema_reader::{RawColumn, RawForeignKey, RawTable, SchemaData};

    fn workshops_sessions_model() -> DbModel {
        let schema = SchemaData {
            tables: vec![
                RawTable { schema: String::new(), name: "workshops".into(), is_view: false },
                RawTable { schema: String::new(), name: "sessions".into(), is_view: false },
            ],
            columns: vec![
                RawColumn { schema: String::new(), table: "workshops".into(), name: "id".into(), data_type: "int".into(), is_nullable: false, is_primary_key: true, is_identity: true, ordinal_position: 0 },
                RawColumn { schema: String::new(), table: "sessions".into(), name: "sid".into(), data_type: "int".into(), is_nullable: false, is_primary_key: true, is_identity: true, ordinal_position: 0 },
                RawColumn { schema: String::new(), table: "sessions".into(), name: "status".into(), data_type: "text".into(), is_nullable: true, is_primary_key: false, is_identity: false, ordinal_position: 1 },
                RawColumn { schema: String::new(), table: "sessions".into(), name: "workshopid".into(), data_type: "int".into(), is_nullable: false, is_primary_key: false, is_identity: false, ordinal_position: 2 },
            ],
            foreign_keys: vec![RawForeignKey {
                child_schema: String::new(), child_table: "sessions".into(), child_column: "workshopid".into(),
                parent_schema: String::new(), parent_table: "workshops".into(), parent_column: "id".into(),
            }],
        };
        DbModelBuilder::new(schema, MetadataOverlay::empty()).build()
    }

    #[test]
    fn assembles_multi_join_children_under_parent_rows() {
        let model = workshops_sessions_model();

        let mut root = TableQuery::new("workshops");
        root.columns = vec!["id".into()];
        let mut child = TableQuery::new("sessions");
        child.columns = vec!["sid".into(), "status".into()];
        root.joins.push(Join {
            name: "_join_sessions".into(),
            alias: None,
            kind: JoinKind::Multi,
            origin: JoinOrigin::Dynamic,
            from_table: "workshops".into(),
            from_column: "id".into(),
            to_table: "sessions".into(),
            to_column: "workshopid".into(),
            child: Box::new(child),
        });

        let mut results = HashMap::new();
        results.insert(
            "workshops".to_string(),
            ResultSet { columns: vec!["id".into()], rows: vec![vec![CellValue::Int(1)], vec![CellValue::Int(2)]] },
        );
        results.insert(
            "workshops->_join_sessions".to_string(),
            ResultSet {
                columns: vec!["src_id".into(), "sid".into(), "status".into()],
                rows: vec![
                    vec![CellValue::Int(1), CellValue::Int(10), CellValue::String("open".into())],
                    vec![CellValue::Int(1), CellValue::Int(11), CellValue::String("closed".into())],
                ],
            },
        );

        let assembled = assemble_root(&root, &results, &model).unwrap();
        let rows = assembled.as_array().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0]["_join_sessions"].as_array().unwrap().len(), 2);
        assert_eq!(rows[1]["_join_sessions"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn wraps_paged_envelope_with_total() {
        let model = workshops_sessions_model();
        let mut root = TableQuery::new("workshops");
        root.columns = vec!["id".into()];
        root.include_meta = true;

        let mut results = HashMap::new();
        results.insert("workshops".to_string(), ResultSet { columns: vec!["id".into()], rows: vec![vec![CellValue::Int(1)]] });
        results.insert("workshops_count".to_string(), ResultSet { columns: vec!["".into()], rows: vec![vec![CellValue::Int(7)]] });

        let assembled = assemble_root(&root, &results, &model).unwrap();
        assert_eq!(assembled["total"], 7);
        assert_eq!(assembled["data"].as_array().unwrap().len(), 1);
    }
}

//! SQL compiler (spec.md §4.6, component C7).
//!
//! Turns a (pipeline-transformed) [`TableQuery`] into a deterministic,
//! insertion-ordered map from statement name to parameterized SQL, plus the
//! single accumulating [`ParamCollection`] every statement draws from.

mod filter_sql;
mod join;
mod params;
mod statement_map;

pub use filter_sql::{render_filter, render_where_clause};
pub use params::ParamCollection;
pub use statement_map::StatementMap;

use std::collections::HashSet;

use crate::dialect::Dialect;
use crate::error::EngineError;
use crate::model::DbModel;
use crate::query_tree::{FilterValue, Join, JoinKind, JoinOrigin, TableQuery};

use join::compile_join_statement;

/// Compiles `root` against `model`/`dialect`, resolving any remaining
/// implicit link navigations first (spec.md §4.6 step 1).
pub fn compile(
    root: &mut TableQuery,
    model: &DbModel,
    dialect: &dyn Dialect,
) -> Result<(StatementMap, Vec<FilterValue>), EngineError> {
    resolve_links(root, model)?;

    let mut params = ParamCollection::new();
    let mut stmts = StatementMap::new();

    emit_root_statements(root, model, dialect, &mut params, &mut stmts)?;
    walk_and_emit_joins(root, root.statement_key(), &[root], &[], model, dialect, &mut params, &mut stmts)?;

    Ok((stmts, params.into_values()))
}

/// Resolves every pending link navigation into a concrete [`Join`], recursing
/// into join children too. Unknown link names fail with `UnknownLink`.
fn resolve_links(query: &mut TableQuery, model: &DbModel) -> Result<(), EngineError> {
    let table = model.table_by_raw_name(&query.table).ok_or_else(|| EngineError::UnknownLink {
        table: query.table.clone(),
        link: String::new(),
    })?;

    let pending = std::mem::take(&mut query.links);
    for pl in pending {
        let is_single = table.single_links.contains_key(&pl.field_name);
        let link_idx = table
            .single_links
            .get(&pl.field_name)
            .or_else(|| table.multi_links.get(&pl.field_name))
            .copied()
            .ok_or_else(|| EngineError::UnknownLink {
                table: query.table.clone(),
                link: pl.field_name.clone(),
            })?;
        let link = model.link(link_idx);

        let (from_column, to_table, to_column) = if is_single {
            (link.child_column.clone(), model.tables[link.parent_table].name.clone(), link.parent_column.clone())
        } else {
            (link.parent_column.clone(), model.tables[link.child_table].name.clone(), link.child_column.clone())
        };

        let mut child = *pl.child;
        resolve_links(&mut child, model)?;

        query.joins.push(Join {
            name: pl.field_name,
            alias: pl.alias,
            kind: if is_single { JoinKind::Single } else { JoinKind::Multi },
            origin: JoinOrigin::Resolved,
            from_table: query.table.clone(),
            from_column,
            to_table,
            to_column,
            child: Box::new(child),
        });
    }

    for join in &mut query.joins {
        resolve_links(&mut join.child, model)?;
    }

    Ok(())
}

/// Projected columns = explicit columns ∪ join-key columns, deduplicated
/// case-insensitively (spec.md §4.6 step 2) — join keys must be projected so
/// children can correlate against them.
fn effective_columns(query: &TableQuery) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut cols = Vec::new();
    for c in &query.columns {
        if seen.insert(c.to_ascii_lowercase()) {
            cols.push(c.clone());
        }
    }
    for j in &query.joins {
        if !j.from_column.is_empty() && seen.insert(j.from_column.to_ascii_lowercase()) {
            cols.push(j.from_column.clone());
        }
    }
    cols
}

fn emit_root_statements(
    root: &TableQuery,
    model: &DbModel,
    dialect: &dyn Dialect,
    params: &mut ParamCollection,
    stmts: &mut StatementMap,
) -> Result<(), EngineError> {
    let table = model.table_by_raw_name(&root.table).ok_or_else(|| EngineError::UnknownLink {
        table: root.table.clone(),
        link: String::new(),
    })?;
    let tableref = dialect.table_ref(&table.schema, &table.name);

    let cols = effective_columns(root);
    let projected = cols
        .iter()
        .map(|c| {
            let e = dialect.escape_identifier(c);
            format!("{e} {e}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    params.begin_statement();
    let before = params.len();
    let where_clause = render_where_clause(root.filter.as_ref(), dialect, params)?;
    let after = params.len();
    let sort: Vec<String> = root.sort.iter().map(|s| s.to_sql(|c| dialect.escape_identifier(c))).collect();
    let pagination = dialect.paginate(&sort, root.effective_offset(), root.effective_limit());

    let mut sql = format!("SELECT {projected} FROM {tableref}{where_clause}");
    if !pagination.is_empty() {
        sql.push(' ');
        sql.push_str(&pagination);
    }
    stmts.insert(root.statement_key().to_string(), sql, before..after);

    if root.include_meta {
        // Reuses the already-rendered where_clause text verbatim, so it
        // addresses the exact same parameter slice rather than pushing (and
        // binding) the same values a second time under new placeholder numbers.
        let count_sql = format!("SELECT COUNT(*) FROM {tableref}{where_clause}");
        stmts.insert(format!("{}_count", root.statement_key()), count_sql, before..after);
    }

    Ok(())
}

/// Recursively emits one statement per join reachable from `query`, including
/// transitively through join children (spec.md §4.6 step 5).
fn walk_and_emit_joins<'a>(
    query: &'a TableQuery,
    parent_statement_name: &str,
    ancestor_queries: &[&'a TableQuery],
    ancestor_edges: &[&'a Join],
    model: &DbModel,
    dialect: &dyn Dialect,
    params: &mut ParamCollection,
    stmts: &mut StatementMap,
) -> Result<(), EngineError> {
    for join in &query.joins {
        let stmt_name = format!("{parent_statement_name}->{}", join.statement_key());
        params.begin_statement();
        let before = params.len();
        let sql = compile_join_statement(ancestor_queries, ancestor_edges, join, model, dialect, params)?;
        let after = params.len();
        stmts.insert(stmt_name.clone(), sql, before..after);

        let mut next_queries = ancestor_queries.to_vec();
        next_queries.push(join.child.as_ref());
        let mut next_edges = ancestor_edges.to_vec();
        next_edges.push(join);

        walk_and_emit_joins(join.child.as_ref(), &stmt_name, &next_queries, &next_edges, model, dialect, params, stmts)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::MssqlDialect;
    use crate::model::DbModelBuilder;
    use crate::query_tree::{Filter, FilterOp, FilterValue, SortEntry};
    use crate::schema_reader::{RawColumn, RawForeignKey, RawTable, SchemaData};
    use crate::config::MetadataOverlay;

    fn workshops_sessions_model() -> DbModel {
        let schema = SchemaData {
            tables: vec![
                RawTable { schema: String::new(), name: "workshops".into(), is_view: false },
                RawTable { schema: String::new(), name: "sessions".into(), is_view: false },
            ],
            columns: vec![
                RawColumn { schema: String::new(), table: "workshops".into(), name: "id".into(), data_type: "int".into(), is_nullable: false, is_primary_key: true, is_identity: true, ordinal_position: 0 },
                RawColumn { schema: String::new(), table: "workshops".into(), name: "number".into(), data_type: "text".into(), is_nullable: true, is_primary_key: false, is_identity: false, ordinal_position: 1 },
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
    fn scenario_a_simple_projection() {
        let model = workshops_sessions_model();
        let mut q = TableQuery::new("workshops");
        q.columns = vec!["id".into(), "number".into()];
        let (stmts, _params) = compile(&mut q, &model, &MssqlDialect).unwrap();
        assert_eq!(
            stmts.get("workshops").unwrap(),
            "SELECT [id] [id], [number] [number] FROM [workshops] ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 100 ROWS ONLY"
        );
    }

    #[test]
    fn scenario_b_paged_envelope() {
        let model = workshops_sessions_model();
        let mut q = TableQuery::new("workshops");
        q.columns = vec!["id".into()];
        q.limit = Some(10);
        q.include_meta = true;
        let (stmts, _params) = compile(&mut q, &model, &MssqlDialect).unwrap();
        assert_eq!(
            stmts.get("workshops").unwrap(),
            "SELECT [id] [id] FROM [workshops] ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 10 ROWS ONLY"
        );
        assert_eq!(stmts.get("workshops_count").unwrap(), "SELECT COUNT(*) FROM [workshops]");
    }

    #[test]
    fn scenario_c_dynamic_join() {
        let model = workshops_sessions_model();
        let mut q = TableQuery::new("workshops");
        q.columns = vec!["id".into()];

        let mut child = TableQuery::new("sessions");
        child.columns = vec!["sid".into(), "status".into()];
        q.joins.push(Join {
            name: "sess".into(),
            alias: Some("sess".into()),
            kind: JoinKind::Multi,
            origin: JoinOrigin::Dynamic,
            from_table: "workshops".into(),
            from_column: "id".into(),
            to_table: "sessions".into(),
            to_column: "workshopid".into(),
            child: Box::new(child),
        });

        let (stmts, _params) = compile(&mut q, &model, &MssqlDialect).unwrap();
        assert_eq!(
            stmts.get("workshops->sess").unwrap(),
            "SELECT a.JoinId AS src_id, b.[sid] AS [sid], b.[status] AS [status] FROM (SELECT DISTINCT [id] AS JoinId FROM [workshops]) a INNER JOIN [sessions] b ON a.JoinId = b.[workshopid] ORDER BY (SELECT NULL) OFFSET 0 ROWS FETCH NEXT 100 ROWS ONLY"
        );
    }

    #[test]
    fn scenario_e_filter_sort_compound() {
        let model = workshops_sessions_model();
        // reuse sessions table as a stand-in for "users" shape since the fixture
        // model only declares workshops/sessions; the SQL skeleton is what's tested.
        let mut q = TableQuery::new("workshops");
        q.columns = vec!["id".into(), "number".into()];
        q.filter = Some(Filter::Or(vec![
            Filter::leaf("number", FilterOp::Eq, FilterValue::String("admin".into())),
            Filter::leaf("number", FilterOp::Eq, FilterValue::String("editor".into())),
        ]));
        q.sort = vec![SortEntry { column: "number".into(), descending: false }];
        q.limit = Some(25);

        let (stmts, params) = compile(&mut q, &model, &MssqlDialect).unwrap();
        assert_eq!(
            stmts.get("workshops").unwrap(),
            "SELECT [id] [id], [number] [number] FROM [workshops] WHERE (([number] = @p1) OR ([number] = @p2)) ORDER BY [number] asc OFFSET 0 ROWS FETCH NEXT 25 ROWS ONLY"
        );
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn postgres_join_statement_numbers_placeholders_relative_to_its_own_slice() {
        // { workshops(filter:{number:{_eq:"x"}}) { id sess:_join_sessions(on:["id","workshopid"]) { sid } } }
        // The root statement pushes one param first; the join statement (which
        // re-renders the root's filter as part of its parent-id projection,
        // spec.md §4.6 step 5) must still start its own placeholders at $1,
        // since `execute_postgres` binds only this statement's own slice.
        let model = workshops_sessions_model();
        let mut q = TableQuery::new("workshops");
        q.columns = vec!["id".into()];
        q.filter = Some(Filter::leaf("number", FilterOp::Eq, FilterValue::String("x".into())));

        let mut child = TableQuery::new("sessions");
        child.columns = vec!["sid".into()];
        q.joins.push(Join {
            name: "sess".into(),
            alias: Some("sess".into()),
            kind: JoinKind::Multi,
            origin: JoinOrigin::Dynamic,
            from_table: "workshops".into(),
            from_column: "id".into(),
            to_table: "sessions".into(),
            to_column: "workshopid".into(),
            child: Box::new(child),
        });

        use crate::dialect::PostgresDialect;
        let (stmts, params) = compile(&mut q, &model, &PostgresDialect).unwrap();

        assert_eq!(stmts.get("workshops").unwrap(), "SELECT \"id\" \"id\" FROM \"workshops\" WHERE (\"number\" = $1) LIMIT 100 OFFSET 0");
        assert_eq!(stmts.param_range("workshops").unwrap(), 0..1);

        // The join statement's own projection re-renders the same root
        // filter, so it pushes a second value onto the shared vector — but
        // its SQL text must reference $1 (its own first bound value), not
        // $2 (the value's position in the global vector).
        let join_sql = stmts.get("workshops->sess").unwrap();
        assert!(join_sql.contains("WHERE (\"number\" = $1)"), "join statement should number its own filter param as $1, got: {join_sql}");
        assert_eq!(stmts.param_range("workshops->sess").unwrap(), 1..2);
        assert_eq!(params.len(), 2);
    }
}

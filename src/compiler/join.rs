//! Join statement compilation: parent-id projection + wrap (spec.md §4.6 step 5).

use crate::dialect::Dialect;
use crate::error::EngineError;
use crate::model::DbModel;
use crate::query_tree::{Join, JoinKind, TableQuery};

use super::filter_sql::render_where_clause;
use super::params::ParamCollection;
use super::effective_columns;

/// Compiles the statement for one join, given the chain of ancestor queries
/// and edges from the root down to (and including) the query that owns it.
///
/// `ancestor_queries[0]` is the root; `ancestor_queries.last()` is the
/// TableQuery that declares `join`. `ancestor_edges[i]` connects
/// `ancestor_queries[i]` to `ancestor_queries[i + 1]`.
pub fn compile_join_statement(
    ancestor_queries: &[&TableQuery],
    ancestor_edges: &[&Join],
    join: &Join,
    model: &DbModel,
    dialect: &dyn Dialect,
    params: &mut ParamCollection,
) -> Result<String, EngineError> {
    let projection = compile_parent_id_projection(ancestor_queries, ancestor_edges, join, model, dialect, params)?;

    let child = join.child.as_ref();
    let child_table = model.table_by_raw_name(&join.to_table).ok_or_else(|| EngineError::UnknownLink {
        table: join.to_table.clone(),
        link: join.name.clone(),
    })?;
    let child_tableref = dialect.table_ref(&child_table.schema, &child_table.name);

    let cols = effective_columns(child);
    let projected = cols
        .iter()
        .map(|c| {
            let e = dialect.escape_identifier(c);
            format!("b.{e} AS {e}")
        })
        .collect::<Vec<_>>()
        .join(", ");

    let where_clause = render_where_clause(child.filter.as_ref(), dialect, params)?;
    let to_col = dialect.escape_identifier(&join.to_column);

    let mut sql = format!(
        "SELECT a.JoinId AS src_id, {projected} FROM ({projection}) a INNER JOIN {child_tableref} b ON a.JoinId = b.{to_col}{where_clause}"
    );

    if !matches!(join.kind, JoinKind::Single) {
        let sort: Vec<String> = child.sort.iter().map(|s| s.to_sql(|c| dialect.escape_identifier(c))).collect();
        let pagination = dialect.paginate(&sort, child.effective_offset(), child.effective_limit());
        if !pagination.is_empty() {
            sql.push(' ');
            sql.push_str(&pagination);
        }
    }

    Ok(sql)
}

fn compile_parent_id_projection(
    ancestor_queries: &[&TableQuery],
    ancestor_edges: &[&Join],
    join: &Join,
    model: &DbModel,
    dialect: &dyn Dialect,
    params: &mut ParamCollection,
) -> Result<String, EngineError> {
    let root = ancestor_queries[0];
    let root_table = model.table_by_raw_name(&root.table).ok_or_else(|| EngineError::UnknownLink {
        table: root.table.clone(),
        link: join.name.clone(),
    })?;
    let root_tableref = dialect.table_ref(&root_table.schema, &root_table.name);
    let first_col = ancestor_edges.first().map(|e| e.from_column.as_str()).unwrap_or(&join.from_column);
    let root_where = render_where_clause(root.filter.as_ref(), dialect, params)?;

    let mut sql = format!(
        "SELECT DISTINCT {} AS JoinId FROM {root_tableref}{root_where}",
        dialect.escape_identifier(first_col)
    );

    for i in 1..ancestor_queries.len() {
        let q = ancestor_queries[i];
        let incoming_edge = ancestor_edges[i - 1];
        let project_col = if i < ancestor_edges.len() { ancestor_edges[i].from_column.as_str() } else { &join.from_column };
        let table = model.table_by_raw_name(&q.table).ok_or_else(|| EngineError::UnknownLink {
            table: q.table.clone(),
            link: join.name.clone(),
        })?;
        let tableref = dialect.table_ref(&table.schema, &table.name);
        let where_clause = render_where_clause(q.filter.as_ref(), dialect, params)?;
        let to_col = dialect.escape_identifier(&incoming_edge.to_column);
        let col = dialect.escape_identifier(project_col);

        sql = format!(
            "SELECT DISTINCT b.{col} AS JoinId FROM {tableref} b INNER JOIN ({sql}) a ON a.JoinId = b.{to_col}{where_clause}"
        );
    }

    Ok(sql)
}

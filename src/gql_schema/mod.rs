//! GraphQL schema builder (spec.md §4.4, component C4).
//!
//! Derives a dynamic `async-graphql` schema mechanically from a [`DbModel`]:
//! one object type per table, shared filter/mutation input types, paged
//! envelopes, and the `_dbSchema` reflection query. Every field resolver
//! follows the same shape — a root field does the expensive work (visit,
//! transform, compile, execute) once and hands the result down as an opaque
//! [`serde_json::Value`]; every descendant field just plucks its own key out
//! of that value (`ctx.parent_value.try_downcast_ref`), the way dynamic
//! schema consumers elsewhere in the ecosystem pass already-resolved data
//! through a tree of generated types.

mod db_schema;
pub mod filter_input;
pub mod mutation_input;
pub mod types;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_graphql::context::SelectionField;
use async_graphql::dynamic::{Field, FieldFuture, FieldValue, InputValue, Object, Schema, TypeRef};

use crate::compiler;
use crate::db::Pool;
use crate::error::EngineError;
use crate::executor;
use crate::model::{DbModel, Table};
use crate::mutation::{self, MutationInput};
use crate::pipeline::{MutationOp, ObserverPhase, Pipeline, UserContext};
use crate::query_tree::{visitor, Filter, FilterOp, FilterValue};

use filter_input::filter_input_name;
use mutation_input::{delete_input_name, insert_input_name, update_input_name, upsert_input_name};
use types::column_type_ref;

/// A built dynamic schema. Thin wrapper so [`crate::cache::CacheEntry`] has a
/// concrete, `Clone`-able type to hold — `async_graphql::dynamic::Schema` is
/// itself cheap to clone (it's `Arc`-backed internally).
#[derive(Clone)]
pub struct GqlSchema(Schema);

impl GqlSchema {
    pub async fn execute(&self, request: impl Into<async_graphql::Request>) -> async_graphql::Response {
        self.0.execute(request).await
    }
}

/// Everything a resolver needs once the schema has been built: the catalog
/// snapshot it was derived from, the pool to run statements against, and the
/// module pipeline to run every query/mutation through.
#[derive(Clone)]
pub struct EngineCtx {
    pub model: Arc<DbModel>,
    pub pool: Pool,
    pub pipeline: Arc<Pipeline>,
    /// Per-request statement timeout (spec.md §5, default 30s); wraps the
    /// executor/mutation-engine await points so a hung driver call surfaces
    /// as `EngineError::Cancelled` instead of stalling the request forever.
    pub statement_timeout: Duration,
}

/// Waits on `fut` for at most `timeout`, turning an expiry into
/// `EngineError::Cancelled` (spec.md §5 "Cancellation / timeouts").
async fn with_timeout<T>(timeout: Duration, fut: impl std::future::Future<Output = Result<T, EngineError>>) -> Result<T, EngineError> {
    tokio::time::timeout(timeout, fut).await.unwrap_or(Err(EngineError::Cancelled))
}

/// Builds the full schema for `model`. `pool`/`pipeline` are captured into
/// every resolver closure via [`EngineCtx`], read back out of the request at
/// execute time via `ctx.ctx.data_unchecked::<EngineCtx>()` (set by the
/// transport, see [`crate::cache::PathCache`]/`main.rs`).
pub fn build_schema(model: Arc<DbModel>, pool: Pool, pipeline: Arc<Pipeline>, statement_timeout: Duration) -> Result<GqlSchema, EngineError> {
    let mut query = Object::new("Query");
    let mut mutation = Object::new("Mutation");
    let mut builder = Schema::build("Query", Some("Mutation"), None);

    for kind_input in filter_input::build_scalar_filter_inputs() {
        builder = builder.register(kind_input);
    }

    for table in &model.tables {
        builder = builder.register(build_table_object(table, &model));
        builder = builder.register(filter_input::build_table_filter_input(table));
        builder = builder.register(mutation_input::build_insert_input(table));
        builder = builder.register(mutation_input::build_update_input(table));
        builder = builder.register(mutation_input::build_upsert_input(table));
        builder = builder.register(mutation_input::build_delete_input(table));
        builder = builder.register(build_paged_object(table));

        query = query.field(root_list_field(table));
        query = query.field(root_paged_field(table));
        mutation = mutation.field(mutation_field(table));
    }

    let db_schema_value = Arc::new(db_schema::build_value(&model));
    builder = db_schema::register_types(builder);
    query = query.field(db_schema_field(db_schema_value));

    builder = builder.register(query).register(mutation);

    let schema = builder
        .data(EngineCtx { model, pool, pipeline, statement_timeout })
        .finish()
        .map_err(|e| EngineError::SchemaRead(anyhow::anyhow!(e.to_string())))?;

    Ok(GqlSchema(schema))
}

/// Converts one JSON value into the `FieldValue` a dynamic resolver returns:
/// `null` resolves to `None`, objects/arrays are handed down opaquely for
/// further `json_field` resolution, and scalars convert to an
/// `async_graphql::Value` directly.
fn value_to_field_value(value: &serde_json::Value) -> Option<FieldValue<'static>> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Array(items) => {
            Some(FieldValue::list(items.iter().filter_map(value_to_field_value)))
        }
        serde_json::Value::Object(_) => Some(FieldValue::owned_any(value.clone())),
        scalar => Some(FieldValue::value(json_scalar_to_gql(scalar))),
    }
}

fn json_scalar_to_gql(value: &serde_json::Value) -> async_graphql::Value {
    match value {
        serde_json::Value::String(s) => async_graphql::Value::String(s.clone()),
        serde_json::Value::Bool(b) => async_graphql::Value::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                async_graphql::Value::Number(i.into())
            } else if let Some(f) = n.as_f64() {
                async_graphql::Value::Number(f.into())
            } else {
                async_graphql::Value::Null
            }
        }
        _ => async_graphql::Value::Null,
    }
}

/// A field whose resolver plucks `name` out of the parent's JSON value —
/// every column, link, and join-sentinel field on a table object type is one
/// of these; the expensive work already happened in the root resolver that
/// produced the JSON this field's ancestors are walking.
fn json_field(name: &str, type_ref: TypeRef) -> Field {
    let key = name.to_string();
    Field::new(name, type_ref, move |ctx| {
        let key = key.clone();
        FieldFuture::new(async move {
            let parent = ctx.parent_value.try_downcast_ref::<serde_json::Value>()?;
            Ok(parent.get(key.as_str()).and_then(value_to_field_value))
        })
    })
}

fn pascal(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn paged_type_name(table: &Table) -> String {
    format!("{}_paged", table.graphql_name)
}

fn build_paged_object(table: &Table) -> Object {
    Object::new(paged_type_name(table))
        .field(json_field("data", TypeRef::named_nn_list_nn(&table.graphql_name)))
        .field(json_field("total", TypeRef::named_nn(TypeRef::INT)))
}

/// One object type per table: a field per column, a field per declared link
/// (scalar for single, list for multi), and an explicit `_join_<T>`/
/// `_single_<T>` pair for every table in the model (spec.md §4.4).
fn build_table_object(table: &Table, model: &DbModel) -> Object {
    let mut obj = Object::new(&table.graphql_name);

    for column in &table.columns {
        obj = obj.field(json_field(&column.graphql_name, column_type_ref(column)));
    }

    for (name, &link_idx) in &table.single_links {
        let link = model.link(link_idx);
        let target = &model.tables[link.parent_table];
        obj = obj.field(json_field(name, TypeRef::named(&target.graphql_name)));
    }
    for (name, &link_idx) in &table.multi_links {
        let link = model.link(link_idx);
        let target = &model.tables[link.child_table];
        obj = obj.field(json_field(name, TypeRef::named_list(&target.graphql_name)));
    }

    for target in &model.tables {
        let join_args = |f: Field, target: &Table| {
            f.argument(InputValue::new("on", TypeRef::named_list(TypeRef::STRING)))
                .argument(InputValue::new("filter", TypeRef::named(filter_input_name(target))))
                .argument(InputValue::new("sort", TypeRef::named_list(TypeRef::STRING)))
                .argument(InputValue::new("limit", TypeRef::named(TypeRef::INT)))
                .argument(InputValue::new("offset", TypeRef::named(TypeRef::INT)))
        };

        let join_name = format!("_join_{}", target.graphql_name);
        obj = obj.field(join_args(json_field(&join_name, TypeRef::named_list(&target.graphql_name)), target));

        let single_name = format!("_single_{}", target.graphql_name);
        obj = obj.field(join_args(json_field(&single_name, TypeRef::named(&target.graphql_name)), target));
    }

    obj
}

fn root_arguments(field: Field, table: &Table) -> Field {
    field
        .argument(InputValue::new("filter", TypeRef::named(filter_input_name(table))))
        .argument(InputValue::new("sort", TypeRef::named_list(TypeRef::STRING)))
        .argument(InputValue::new("limit", TypeRef::named(TypeRef::INT)))
        .argument(InputValue::new("offset", TypeRef::named(TypeRef::INT)))
}

/// Runs the full read pipeline for a root selection: visit the selection set
/// into a [`crate::query_tree::TableQuery`], apply every registered filter
/// transformer, compile to SQL, execute, and reassemble the nested result
/// (spec.md §4.5-§4.8).
async fn run_read(
    ectx: &EngineCtx,
    table: &Table,
    selection: SelectionField<'_>,
    include_meta: bool,
    user_ctx: &UserContext,
) -> Result<serde_json::Value, EngineError> {
    let mut query = visitor::build_table_query(selection, table, &ectx.model, include_meta)?;
    ectx.pipeline.notify(ObserverPhase::Parsed, &query, user_ctx);
    ectx.pipeline.apply_filters(&mut query, user_ctx)?;
    ectx.pipeline.notify(ObserverPhase::Transformed, &query, user_ctx);

    let dialect = ectx.pool.engine().dialect();
    let (stmts, params) = compiler::compile(&mut query, &ectx.model, dialect)?;

    ectx.pipeline.notify(ObserverPhase::BeforeExecute, &query, user_ctx);
    let assembled = with_timeout(ectx.statement_timeout, executor::run(&query, &stmts, &params, &ectx.pool, &ectx.model)).await?;
    ectx.pipeline.notify(ObserverPhase::AfterExecute, &query, user_ctx);

    Ok(assembled)
}

fn user_context(ctx: &async_graphql::Context<'_>) -> UserContext {
    ctx.data_opt::<UserContext>().cloned().unwrap_or_default()
}

fn root_list_field(table: &Table) -> Field {
    let table_idx_name = table.name.clone();
    let field_name = table.graphql_name.clone();
    let type_name = table.graphql_name.clone();

    let field = Field::new(&field_name, TypeRef::named_nn_list_nn(&type_name), move |ctx| {
        let table_name = table_idx_name.clone();
        FieldFuture::new(async move {
            let ectx = ctx.ctx.data_unchecked::<EngineCtx>();
            let table = ectx.model.table_by_raw_name(&table_name).expect("table present at schema build time");
            let user_ctx = user_context(ctx.ctx);
            let assembled = run_read(ectx, table, ctx.ctx.field(), false, &user_ctx).await?;
            Ok(value_to_field_value(&assembled))
        })
    });
    root_arguments(field, table)
}

fn root_paged_field(table: &Table) -> Field {
    let table_name = table.name.clone();
    let field_name = format!("{}_paged", table.graphql_name);
    let type_name = paged_type_name(table);

    let field = Field::new(&field_name, TypeRef::named_nn(&type_name), move |ctx| {
        let table_name = table_name.clone();
        FieldFuture::new(async move {
            let ectx = ctx.ctx.data_unchecked::<EngineCtx>();
            let table = ectx.model.table_by_raw_name(&table_name).expect("table present at schema build time");
            let user_ctx = user_context(ctx.ctx);
            let assembled = run_read(ectx, table, ctx.ctx.field(), true, &user_ctx).await?;
            Ok(value_to_field_value(&assembled))
        })
    });
    root_arguments(field, table)
}

fn db_schema_field(value: Arc<serde_json::Value>) -> Field {
    Field::new("_dbSchema", TypeRef::named_nn(db_schema::TYPE), move |_ctx| {
        let value = value.clone();
        FieldFuture::new(async move { Ok(Some(FieldValue::owned_any((*value).clone()))) })
    })
}

/// Splits a mutation input's fields into the primary-key subset (matching
/// `table`'s PK columns) and the rest, both keyed by GraphQL column name —
/// the shape [`crate::mutation::MutationInput`]'s variants expect.
fn split_pk(table: &Table, mut fields: HashMap<String, FilterValue>) -> (HashMap<String, FilterValue>, HashMap<String, FilterValue>) {
    let mut pk = HashMap::new();
    for col in table.primary_key() {
        if let Some(v) = fields.remove(&col.graphql_name) {
            pk.insert(col.graphql_name.clone(), v);
        }
    }
    (pk, fields)
}

/// Re-reads the row identified by `pk` through the same read pipeline as a
/// root selection, so a mutation's response honors whatever links/joins the
/// client asked for. Primary key values are matched as an AND of `_eq`
/// leaves on the table's raw column names.
async fn read_back(
    ectx: &EngineCtx,
    table: &Table,
    pk: &HashMap<String, FilterValue>,
    selection: SelectionField<'_>,
    user_ctx: &UserContext,
) -> Result<Option<serde_json::Value>, EngineError> {
    let mut query = visitor::build_table_query(selection, table, &ectx.model, false)?;

    let filter = pk.iter().fold(None, |acc, (gql_name, value)| {
        let raw = table.column_by_graphql_name(gql_name).map(|c| c.name.clone()).unwrap_or_else(|| gql_name.clone());
        let leaf = Filter::leaf(raw, FilterOp::Eq, value.clone());
        Some(match acc {
            Some(existing) => Filter::and_with(existing, leaf),
            None => leaf,
        })
    });
    query.filter = filter;
    query.limit = Some(1);

    ectx.pipeline.apply_filters(&mut query, user_ctx)?;
    let dialect = ectx.pool.engine().dialect();
    let (stmts, params) = compiler::compile(&mut query, &ectx.model, dialect)?;
    let assembled = with_timeout(ectx.statement_timeout, executor::run(&query, &stmts, &params, &ectx.pool, &ectx.model)).await?;
    Ok(assembled.as_array().and_then(|rows| rows.first().cloned()))
}

/// One field per table, named after the table itself, accepting `insert`/
/// `update`/`upsert`/`delete` input-object arguments (spec.md §4.9) — not the
/// `create<T>`/`update<T>`/`delete<T>` convention some schema builders use.
fn mutation_field(table: &Table) -> Field {
    let table_name = table.name.clone();
    let field_name = table.graphql_name.clone();
    let type_name = table.graphql_name.clone();

    let field = Field::new(&field_name, TypeRef::named(&type_name), move |ctx| {
        let table_name = table_name.clone();
        FieldFuture::new(async move {
            let ectx = ctx.ctx.data_unchecked::<EngineCtx>();
            let table = ectx.model.table_by_raw_name(&table_name).expect("table present at schema build time");
            let user_ctx = user_context(ctx.ctx);
            let selection = ctx.ctx.field();

            let args = selection.arguments().map_err(|e| EngineError::MissingVariable(e.message))?;
            let mut chosen = None;
            for (name, value) in &args {
                let op = match name.as_str() {
                    "insert" => Some(MutationOp::Insert),
                    "update" => Some(MutationOp::Update),
                    "upsert" => Some(MutationOp::Upsert),
                    "delete" => Some(MutationOp::Delete),
                    _ => None,
                };
                if let Some(op) = op {
                    chosen = Some((op, value.clone()));
                    break;
                }
            }
            let (op, raw_value) = chosen
                .ok_or_else(|| EngineError::Validation("one of insert/update/upsert/delete is required".to_string()))?;

            let fields = visitor::object_to_values(&raw_value)?;
            let (pk_map, data_map) = split_pk(table, fields);
            let (op, data_map) = ectx.pipeline.apply_mutation(op, data_map, &table.name, &user_ctx)?;

            let dialect = ectx.pool.engine().dialect();
            let input = match op {
                MutationOp::Insert => MutationInput::Insert { data: data_map },
                MutationOp::Update => MutationInput::Update { pk: pk_map.clone(), data: data_map },
                MutationOp::Upsert => MutationInput::Upsert { pk: pk_map.clone(), data: data_map },
                MutationOp::Delete => MutationInput::Delete { pk: pk_map.clone() },
            };
            let statements = mutation::compile(&input, table, dialect)?;
            let identity = with_timeout(ectx.statement_timeout, mutation::run_mutation(&ectx.pool, &statements, dialect)).await?;

            if matches!(op, MutationOp::Delete) {
                return Ok(None);
            }

            let mut final_pk = pk_map;
            // PostgreSQL has no session-global last-identity; `run_mutation`
            // reports rows_affected there instead of a real key (see
            // `mutation::exec`), so only trust it as a PK value on engines
            // that actually return one.
            if !matches!(ectx.pool.engine(), crate::dialect::Engine::Postgres) {
                if let (Some(ident), Some(pk_col)) = (identity, table.primary_key().into_iter().find(|c| c.is_identity)) {
                    final_pk.insert(pk_col.graphql_name.clone(), ident);
                }
            }
            if final_pk.is_empty() {
                return Ok(None);
            }

            let row = read_back(ectx, table, &final_pk, selection, &user_ctx).await?;
            Ok(row.and_then(|v| value_to_field_value(&v)))
        })
    });

    field
        .argument(InputValue::new("insert", TypeRef::named(insert_input_name(table))))
        .argument(InputValue::new("update", TypeRef::named(update_input_name(table))))
        .argument(InputValue::new("upsert", TypeRef::named(upsert_input_name(table))))
        .argument(InputValue::new("delete", TypeRef::named(delete_input_name(table))))
}

//! Error taxonomy for the query engine core.
//!
//! Every component returns `Result<_, EngineError>`. The GraphQL transport seam
//! (see [`crate::gql_schema`]) converts an `EngineError` into an `async_graphql::Error`
//! with an `extensions.code` matching the variant name, per the propagation table in
//! the specification: most variants abort the whole request (no partial `data`),
//! `ObserverError` is caught, logged, and swallowed instead.

use thiserror::Error;

/// Every way a request can fail, from GraphQL parsing down to statement execution.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("parse error at {line}:{column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("missing variable: ${0}")]
    MissingVariable(String),

    #[error("unknown link {link} on table {table}")]
    UnknownLink { table: String, link: String },

    #[error("filter type error on column {column}: {message}")]
    FilterType { column: String, message: String },

    #[error("{0}")]
    UserVisible(String),

    #[error("could not acquire a database connection")]
    ConnectionFailed(#[source] anyhow::Error),

    #[error("statement {statement} failed")]
    ExecutionFailed {
        statement: String,
        param_names: Vec<String>,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to read catalog schema")]
    SchemaRead(#[source] anyhow::Error),

    #[error("request was cancelled")]
    Cancelled,

    #[error("observer error (swallowed): {0}")]
    Observer(String),
}

impl EngineError {
    /// Stable string used as `extensions.code` on the GraphQL error and for log correlation.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::Parse { .. } => "PARSE_ERROR",
            EngineError::Validation(_) => "VALIDATION_ERROR",
            EngineError::MissingVariable(_) => "MISSING_VARIABLE",
            EngineError::UnknownLink { .. } => "UNKNOWN_LINK",
            EngineError::FilterType { .. } => "FILTER_TYPE_ERROR",
            EngineError::UserVisible(_) => "USER_VISIBLE_ERROR",
            EngineError::ConnectionFailed(_) => "CONNECTION_FAILED",
            EngineError::ExecutionFailed { .. } => "EXECUTION_FAILED",
            EngineError::SchemaRead(_) => "SCHEMA_READ_ERROR",
            EngineError::Cancelled => "CANCELLED",
            EngineError::Observer(_) => "OBSERVER_ERROR",
        }
    }

    /// The message that is safe to put in the GraphQL response. Driver/connection
    /// detail is logged via `tracing` but never echoed to the client.
    pub fn user_message(&self) -> String {
        match self {
            EngineError::ConnectionFailed(_) => "could not connect to the database".to_string(),
            EngineError::ExecutionFailed { statement, .. } => {
                format!("statement '{statement}' failed to execute")
            }
            other => other.to_string(),
        }
    }
}

impl From<EngineError> for async_graphql::Error {
    fn from(err: EngineError) -> Self {
        if let EngineError::ExecutionFailed { source, statement, .. } = &err {
            tracing::error!(statement = %statement, error = %source, "execution failed");
        }
        if let EngineError::ConnectionFailed(source) = &err {
            tracing::error!(error = %source, "connection failed");
        }
        async_graphql::Error::new(err.user_message())
            .extend_with(|_, e| e.set("code", err.code()))
    }
}

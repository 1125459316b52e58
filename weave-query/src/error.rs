//! Error types for compilation, resolution and write operations.
//!
//! Every failure carries an [`ErrorCode`] for programmatic handling plus an
//! [`ErrorContext`] naming the model, field and SQL involved.
//!
//! # Error Codes
//!
//! Error codes follow a pattern: W{category}{number}
//! - 1xxx: Validation errors (bad filter, bad value, bad include)
//! - 2xxx: Not found
//! - 3xxx: Access denied
//! - 4xxx: Invariant violations (corrupt or contradictory stored data)
//! - 5xxx: Storage errors propagated from the persistence layer
//! - 7xxx: Configuration errors
//! - 9xxx: Internal errors
//!
//! ```rust
//! use weave_query::{ErrorCategory, ErrorCode, QueryError};
//!
//! let err = QueryError::invalid_filter("title__length", "'abc' is not a valid integer");
//! assert_eq!(err.code, ErrorCode::InvalidFilter);
//! assert_eq!(err.code.category(), ErrorCategory::Validation);
//! assert!(err.to_string().contains("W1001"));
//! ```

use std::fmt;
use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Broad classes of failure, mirroring how callers are expected to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Caller supplied something malformed; recoverable.
    Validation,
    /// Requested record does not exist.
    NotFound,
    /// Access policy denied visibility.
    Forbidden,
    /// Stored data or declarations are inconsistent; aborts the whole call.
    Invariant,
    /// Failure reported by the persistence layer, passed through verbatim.
    Storage,
    /// Invalid engine or adapter configuration.
    Configuration,
    /// Bug in the engine.
    Internal,
}

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors (1xxx)
    /// Invalid filter parameter (W1001).
    InvalidFilter = 1001,
    /// Invalid attribute or relationship value (W1002).
    InvalidValue = 1002,
    /// Invalid include path (W1003).
    InvalidInclude = 1003,
    /// Invalid page parameters (W1004).
    InvalidPagination = 1004,
    /// Invalid sort parameter (W1005).
    InvalidSort = 1005,
    /// Unknown model type (W1006).
    UnknownModel = 1006,
    /// Unknown field or parameter (W1007).
    UnknownField = 1007,
    /// Referenced record does not exist (W1008).
    MissingReference = 1008,

    // Not found (2xxx)
    /// Record not found (W2001).
    RecordNotFound = 2001,

    // Access (3xxx)
    /// Access denied by policy (W3001).
    AccessDenied = 3001,

    // Invariant violations (4xxx)
    /// Contradictory rows for a to-one relationship (W4001).
    ContradictoryRelation = 4001,
    /// Duplicate base rows with differing values (W4002).
    DuplicateRow = 4002,
    /// Default producer returned the wrong shape (W4003).
    MalformedDefault = 4003,
    /// Stored reference names an unknown or disallowed type (W4004).
    UnknownTarget = 4004,
    /// Stored value could not be decoded (W4005).
    DecodeFailure = 4005,

    // Storage errors (5xxx)
    /// General database error (W5001).
    DatabaseError = 5001,
    /// Transaction failed (W5002).
    TransactionFailed = 5002,

    // Configuration errors (7xxx)
    /// Invalid configuration (W7001).
    InvalidConfiguration = 7001,

    // Internal errors (9xxx)
    /// Internal error (W9001).
    Internal = 9001,
}

impl ErrorCode {
    /// Get the error code string (e.g., "W1001").
    pub fn code(&self) -> String {
        format!("W{}", *self as u16)
    }

    /// Get a short description of the error code.
    pub fn description(&self) -> &'static str {
        match self {
            Self::InvalidFilter => "Invalid filter parameter",
            Self::InvalidValue => "Invalid value",
            Self::InvalidInclude => "Invalid include path",
            Self::InvalidPagination => "Invalid page parameters",
            Self::InvalidSort => "Invalid sort parameter",
            Self::UnknownModel => "Unknown model type",
            Self::UnknownField => "Unknown field or parameter",
            Self::MissingReference => "Referenced record does not exist",
            Self::RecordNotFound => "Record not found",
            Self::AccessDenied => "Access denied",
            Self::ContradictoryRelation => "Contradictory relationship rows",
            Self::DuplicateRow => "Duplicate base rows",
            Self::MalformedDefault => "Malformed default value",
            Self::UnknownTarget => "Unknown relationship target",
            Self::DecodeFailure => "Stored value could not be decoded",
            Self::DatabaseError => "Database error",
            Self::TransactionFailed => "Transaction failed",
            Self::InvalidConfiguration => "Invalid configuration",
            Self::Internal => "Internal error",
        }
    }

    /// Get the category this code belongs to.
    pub fn category(&self) -> ErrorCategory {
        match *self as u16 {
            1000..=1999 => ErrorCategory::Validation,
            2000..=2999 => ErrorCategory::NotFound,
            3000..=3999 => ErrorCategory::Forbidden,
            4000..=4999 => ErrorCategory::Invariant,
            5000..=5999 => ErrorCategory::Storage,
            7000..=7999 => ErrorCategory::Configuration,
            _ => ErrorCategory::Internal,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Additional context for an error.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// The operation that was being performed.
    pub operation: Option<String>,
    /// The model involved.
    pub model: Option<String>,
    /// The field, relationship or parameter involved.
    pub field: Option<String>,
    /// The SQL statement (if available).
    pub sql: Option<String>,
    /// Suggestions for fixing the error.
    pub suggestions: Vec<String>,
    /// Help text.
    pub help: Option<String>,
}

/// Errors that can occur during query operations.
#[derive(Error, Debug)]
pub struct QueryError {
    /// The error code.
    pub code: ErrorCode,
    /// The error message.
    pub message: String,
    /// Additional context.
    pub context: ErrorContext,
    /// The source error (if any).
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code.code(), self.message)
    }
}

impl QueryError {
    /// Create a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add context about the operation.
    pub fn with_context(mut self, operation: impl Into<String>) -> Self {
        self.context.operation = Some(operation.into());
        self
    }

    /// Add a suggestion for fixing the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context.suggestions.push(suggestion.into());
        self
    }

    /// Add help text.
    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.context.help = Some(help.into());
        self
    }

    /// Set the model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.context.model = Some(model.into());
        self
    }

    /// Set the field.
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.context.field = Some(field.into());
        self
    }

    /// Set the SQL statement.
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Set the source error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    // ============== Validation ==============

    /// Create an invalid filter error naming the offending parameter.
    pub fn invalid_filter(param: impl Into<String>, message: impl Into<String>) -> Self {
        let param = param.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidFilter,
            format!("Invalid filter {}: {}", param, message),
        )
        .with_field(&param)
    }

    /// Create an invalid value error for an attribute or relationship.
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidValue,
            format!("Invalid value for {}: {}", field, message),
        )
        .with_field(&field)
    }

    /// Create an invalid include error.
    pub fn invalid_include(path: impl Into<String>, message: impl Into<String>) -> Self {
        let path = path.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidInclude,
            format!("Invalid include {}: {}", path, message),
        )
        .with_field(&path)
    }

    /// Create an invalid pagination error.
    pub fn invalid_pagination(param: impl Into<String>, message: impl Into<String>) -> Self {
        let param = param.into();
        let message = message.into();
        Self::new(
            ErrorCode::InvalidPagination,
            format!("Invalid {}: {}", param, message),
        )
        .with_field(&param)
    }

    /// Create an invalid sort error.
    pub fn invalid_sort(key: impl Into<String>, message: impl Into<String>) -> Self {
        let key = key.into();
        let message = message.into();
        Self::new(ErrorCode::InvalidSort, format!("Invalid sort {}: {}", key, message))
            .with_field(&key)
    }

    /// Create an unknown model error.
    pub fn unknown_model(type_name: impl Into<String>) -> Self {
        let type_name = type_name.into();
        Self::new(
            ErrorCode::UnknownModel,
            format!("No model is registered for type {}", type_name),
        )
        .with_model(&type_name)
    }

    /// Create an unknown field or parameter error.
    pub fn unknown_field(model: impl Into<String>, field: impl Into<String>) -> Self {
        let model = model.into();
        let field = field.into();
        Self::new(
            ErrorCode::UnknownField,
            format!("{} has no field or parameter named {}", model, field),
        )
        .with_model(&model)
        .with_field(&field)
    }

    /// Create a missing reference error for a relationship write.
    pub fn missing_reference(field: impl Into<String>, type_name: &str, id: &str) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::MissingReference,
            format!("{} references {}/{} which does not exist", field, type_name, id),
        )
        .with_field(&field)
        .with_model(type_name)
    }

    // ============== Not found / access ==============

    /// Create a not found error.
    pub fn not_found(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::RecordNotFound,
            format!("No {} record found matching the query", model),
        )
        .with_model(&model)
    }

    /// Create an access denied error.
    pub fn forbidden(model: impl Into<String>) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::AccessDenied,
            format!("Access to one or more {} records was denied", model),
        )
        .with_model(&model)
    }

    // ============== Invariant violations ==============

    /// Create a contradictory to-one relationship error.
    pub fn contradictory_relation(
        model: impl Into<String>,
        field: impl Into<String>,
        owner_id: &str,
    ) -> Self {
        let model = model.into();
        let field = field.into();
        Self::new(
            ErrorCode::ContradictoryRelation,
            format!(
                "{}/{} has more than one value for to-one relationship {}",
                model, owner_id, field
            ),
        )
        .with_model(&model)
        .with_field(&field)
        .with_help("Stored data is inconsistent; the relationship must resolve to at most one row")
    }

    /// Create a duplicate row error.
    pub fn duplicate_row(model: impl Into<String>, id: &str) -> Self {
        let model = model.into();
        Self::new(
            ErrorCode::DuplicateRow,
            format!("{}/{} was loaded twice with different attribute values", model, id),
        )
        .with_model(&model)
    }

    /// Create a malformed default error.
    pub fn malformed_default(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::MalformedDefault,
            format!("Default for {} has the wrong shape: {}", field, message),
        )
        .with_field(&field)
    }

    /// Create an unknown target error for a stored reference.
    pub fn unknown_target(field: impl Into<String>, type_name: &str) -> Self {
        let field = field.into();
        Self::new(
            ErrorCode::UnknownTarget,
            format!("{} references type {} which is not a valid target", field, type_name),
        )
        .with_field(&field)
    }

    /// Create a decode failure error.
    pub fn decode(field: impl Into<String>, message: impl Into<String>) -> Self {
        let field = field.into();
        let message = message.into();
        Self::new(
            ErrorCode::DecodeFailure,
            format!("Could not decode stored value for {}: {}", field, message),
        )
        .with_field(&field)
    }

    // ============== Storage ==============

    /// Create a general database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DatabaseError, message.into())
    }

    /// Create a transaction error.
    pub fn transaction(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::TransactionFailed, format!("Transaction error: {}", message))
    }

    // ============== Configuration / internal ==============

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(
            ErrorCode::InvalidConfiguration,
            format!("Invalid configuration: {}", message),
        )
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(ErrorCode::Internal, format!("Internal error: {}", message))
    }

    // ============== Error Checks ==============

    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    /// Check if this is a validation error.
    pub fn is_validation(&self) -> bool {
        self.category() == ErrorCategory::Validation
    }

    /// Check if this is a not found error.
    pub fn is_not_found(&self) -> bool {
        self.code == ErrorCode::RecordNotFound
    }

    /// Check if access was denied.
    pub fn is_forbidden(&self) -> bool {
        self.category() == ErrorCategory::Forbidden
    }

    /// Check if this is an invariant violation.
    pub fn is_invariant(&self) -> bool {
        self.category() == ErrorCategory::Invariant
    }

    /// Check if this error came from the persistence layer.
    pub fn is_storage(&self) -> bool {
        self.category() == ErrorCategory::Storage
    }
}

/// Helper for creating errors with context.
#[macro_export]
macro_rules! query_error {
    ($code:expr, $msg:expr) => {
        $crate::error::QueryError::new($code, $msg)
    };
    ($code:expr, $msg:expr, $($key:ident = $value:expr),+ $(,)?) => {{
        let mut err = $crate::error::QueryError::new($code, $msg);
        $(
            err = err.$key($value);
        )+
        err
    }};
}

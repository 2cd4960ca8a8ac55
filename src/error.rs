//! Error taxonomy shared by every core operation.
//!
//! Four classes: configuration (missing tenant context, fatal), conflict
//! (disallowed transition, concurrent resolution, cross-tenant reference),
//! not-found (absent and invisible are the same shape), and storage.
//! Notification failures never enter this taxonomy.

use axum::{http::StatusCode, response::IntoResponse, Json};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Tenant context was required but not bound. Request aborted.
    #[error("tenant context is not set for this operation")]
    MissingTenantContext,

    /// Operation rejected by a state-machine precondition or by a
    /// constraint/ownership check. Not retried automatically.
    #[error("conflict: {reason}")]
    Conflict { reason: String },

    /// Unresolvable tenant, order, item, or token. Deliberately identical
    /// for "does not exist" and "exists but not visible".
    #[error("not found")]
    NotFound,

    #[error("storage error: {0}")]
    Storage(sqlx::Error),

    #[error("invalid request: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

impl Error {
    pub fn conflict(reason: impl Into<String>) -> Self {
        Error::Conflict { reason: reason.into() }
    }

    /// Stable machine classification, independent of the human reason.
    pub fn classification(&self) -> &'static str {
        match self {
            Error::MissingTenantContext => "configuration",
            Error::Conflict { .. } => "conflict",
            Error::NotFound => "not_found",
            Error::Storage(_) => "storage",
            Error::Validation(_) => "validation",
        }
    }
}

/// Translate storage-engine failures into the taxonomy. Unique and foreign
/// key violations surface as conflicts; a row the policy hides surfaces as
/// not-found rather than leaking the raw engine error.
impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Error::NotFound,
            sqlx::Error::Database(db) => {
                if db.is_unique_violation() || db.is_foreign_key_violation() {
                    Error::Conflict { reason: db.message().to_string() }
                } else {
                    Error::Storage(err)
                }
            }
            _ => Error::Storage(err),
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            Error::MissingTenantContext => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Conflict { .. } => StatusCode::CONFLICT,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Error::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        };
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(serde_json::json!({
            "error": self.classification(),
            "reason": self.to_string(),
        }));
        (status, body).into_response()
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: Error = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, Error::NotFound));
        assert_eq!(err.classification(), "not_found");
    }

    #[test]
    fn not_found_shape_is_uniform() {
        // An absent token and an invisible row produce the same value.
        let absent = Error::NotFound;
        let invisible: Error = sqlx::Error::RowNotFound.into();
        assert_eq!(absent.to_string(), invisible.to_string());
        assert_eq!(absent.classification(), invisible.classification());
    }

    #[test]
    fn conflict_keeps_reason() {
        let err = Error::conflict("already resolved");
        assert_eq!(err.classification(), "conflict");
        assert!(err.to_string().contains("already resolved"));
    }
}

//! Response envelope shared by all `/api/v1` handlers.

use serde::Serialize;

/// `{ "data": T }` wrapper; errors use `{ "error", "code" }` instead
/// (see [`crate::error::AppError`]).
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}

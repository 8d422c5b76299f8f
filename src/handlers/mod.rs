pub mod graph;
pub mod health;

use axum::extract::Request;

use crate::error::AppError;

/// JSON 404 for anything the router does not know.
pub async fn not_found(req: Request) -> AppError {
    AppError::NotFound(req.uri().path().to_owned())
}

//! Protocol discovery on the upload collection.
//!
//! `CorsLayer` answers every OPTIONS request itself, preflight or not. This layer
//! sits outside it: OPTIONS on the collection is answered by the tus capability
//! handler, carrying over whatever CORS headers the inner layer produced.

use crate::constants::RESUMABLE_UPLOAD_PATH;
use crate::handlers::resumable_upload::upload_options;
use crate::state::UploadState;
use axum::{
    extract::{Request, State},
    http::{header, Method},
    middleware::Next,
    response::Response,
};

pub async fn tus_options_middleware(
    State(uploads): State<UploadState>,
    request: Request,
    next: Next,
) -> Response {
    if *request.method() != Method::OPTIONS || request.uri().path() != RESUMABLE_UPLOAD_PATH {
        return next.run(request).await;
    }

    let cors_response = next.run(request).await;
    let mut response = upload_options(State(uploads)).await;

    for (name, value) in cors_response.headers() {
        if name.as_str().starts_with("access-control-") || *name == header::VARY {
            response.headers_mut().append(name.clone(), value.clone());
        }
    }

    response
}

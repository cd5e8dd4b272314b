pub(crate) mod bearer;
pub(crate) mod correlation_id;

use axum::response::Response;

type RejectionType = Response;

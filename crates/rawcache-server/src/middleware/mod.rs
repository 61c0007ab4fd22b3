//! Middleware stack applied to every request:
//! - `RequestIdLayer`: genera o propaga X-Request-Id
//! - `LoggingLayer`: un span por request, con status, duracion y X-Cache

mod logging;
mod request_id;

pub use logging::{LoggingLayer, LoggingMiddleware};
pub use request_id::{MAX_REQUEST_ID_LEN, REQUEST_ID_HEADER, RequestIdLayer, RequestIdMiddleware};

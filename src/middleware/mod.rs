pub mod auth;
pub mod response;

pub use auth::{extract_bearer_token, request_gate_middleware, BypassRule, RequestGate};
pub use response::{ApiResult, ExtJson, ExtJsonBody};

pub mod auth;
pub mod headers;
pub mod policy;
pub mod response;
pub mod security;

pub use auth::{authenticate, extract_jwt_from_headers, AuthFailure};
pub use policy::{PolicyTable, RouteMatch, RouteParams, RoutePolicy};
pub use response::{ApiResponse, ApiResult};
pub use security::{client_ip, security_middleware, RequestContext};

// handlers/protected/mod.rs - Protected handlers (bearer token required)
//
// The security middleware has already authenticated the caller and applied
// the route's role and permission policy. Handlers receive the `Principal`
// and `RequestOrigin` through request extensions and delegate to the service
// layer, which enforces the per-record rules.
pub mod audit;
pub mod auth;
pub mod clients;
pub mod inquiries;
pub mod interactions;
pub mod tasks;
pub mod users;

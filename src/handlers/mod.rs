// handlers/mod.rs - Handler tiers
//
// Public (no token) and Protected (bearer token). Both tiers sit behind the
// same security middleware; the policy table decides what each route demands.
pub mod protected;
pub mod public;

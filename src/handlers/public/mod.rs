// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Rate limiting, attack screening and the baseline headers still apply.
pub mod inquiries;
pub mod root;

pub use inquiries::submit as inquiry_submit;
pub use root::{health, root};

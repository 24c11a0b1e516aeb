pub mod catalog;
pub mod check;
pub mod roles;
pub mod scan;
pub mod token;

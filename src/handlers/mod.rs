pub mod auth;
pub mod course;
pub mod user;

pub use auth::*;

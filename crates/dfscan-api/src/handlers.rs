//! Request handlers.

pub mod analysis;
pub mod detect;
pub mod health;
pub mod jobs;
pub mod models;

pub use analysis::*;
pub use detect::*;
pub use health::*;
pub use jobs::*;
pub use models::*;

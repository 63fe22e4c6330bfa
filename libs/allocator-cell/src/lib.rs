pub mod collaborators;
pub mod models;
pub mod services;

pub use collaborators::*;
pub use models::*;
pub use services::*;

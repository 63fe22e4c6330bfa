pub mod appointment;
pub mod doctor;
pub mod error;
pub mod interval;

pub use appointment::*;
pub use doctor::*;
pub use error::*;
pub use interval::*;

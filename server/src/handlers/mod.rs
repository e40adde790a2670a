pub mod appointment;
pub mod patient;
pub mod session;

pub use appointment::*;
pub use patient::*;
pub use session::*;

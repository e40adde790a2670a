pub mod appointment;
pub mod case;
pub mod de;
pub mod outcome;
pub mod patient;
pub mod record_id;

pub use appointment::*;
pub use case::*;
pub use outcome::*;
pub use patient::*;
pub use record_id::*;

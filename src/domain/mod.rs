pub mod calendar;
pub mod schedule;
pub mod tariff;
pub mod types;

pub use schedule::*;
pub use tariff::*;
pub use types::*;

pub mod prices;
pub mod profile;
pub mod sensors;
pub mod target;

pub use prices::*;
pub use profile::*;
pub use sensors::*;
pub use target::*;

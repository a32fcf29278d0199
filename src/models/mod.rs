pub mod enums;
pub mod schedule;

pub use enums::*;
pub use schedule::*;

mod visit;

pub use visit::{DayCount, Visitor};

pub mod model;
pub mod time;

pub use time::Clock;

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod error;
pub mod model;
pub mod time;

pub use aggregate::{Aggregation, aggregate};
pub use error::Error;
pub use time::Clock;

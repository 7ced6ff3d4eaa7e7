#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod time;

pub use error::DomainError;
pub use time::Clock;

#![forbid(unsafe_code)]

pub mod error;
pub mod flatten;
pub mod model;
pub mod progress;
pub mod sheet;
pub mod time;

pub use error::Error;
pub use flatten::{FlatQuestion, flatten};
pub use progress::{Classification, ProgressSnapshot, classify, recompute, risk_score};
pub use sheet::ResponseSheet;
pub use time::Clock;

pub mod status;

pub use status::{Clock, FixedClock, ProductMetrics, SystemClock};

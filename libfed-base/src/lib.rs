mod error;
mod rng;

pub use error::{err, Error, Result};
pub use rng::random_cost_in_range;

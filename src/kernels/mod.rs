pub mod conv1d;
pub mod fixed;
pub mod numeric;
pub mod utils;
pub use conv1d::{conv_1d, Conv1d, Conv1dConfig, DefaultConv1dConfig};
pub use fixed::ApFixed;
pub use numeric::{Accumulate, CastFrom, Zero};

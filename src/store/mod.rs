pub mod memory;

pub use memory::{PriceSeriesStore, SeriesReader};

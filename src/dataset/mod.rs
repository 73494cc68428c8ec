//! Synthetic content recommendation dataset

mod generator;
mod model;

pub use generator::{DatasetGenerator, DatasetSize};
pub use model::{ContentType, Dataset, Region, RegionalTrend};

#[cfg(test)]
pub use model::EngagementMetrics;

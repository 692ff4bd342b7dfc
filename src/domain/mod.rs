//! Core data model (`§3`): the aggregates flowing through the pipeline.

mod aggregate_stats;
mod checkpoint;
mod converted_zip;
mod discovered_image;
mod ids;
mod scan_job;

pub use aggregate_stats::{AggregateStats, CategoryStat, MimeTypeStat, StatsContribution};
pub use checkpoint::CrawlCheckpoint;
pub use converted_zip::ConvertedImageZip;
pub use discovered_image::DiscoveredImage;
pub use ids::{ScanId, SubmitterAddr};
pub use scan_job::{ScanJob, ScanStatus};

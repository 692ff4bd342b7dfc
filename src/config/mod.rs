//! Application configuration: one immutable record per `§6` config group.

mod builder;
mod getters;
mod methods;
mod types;

pub use builder::AppConfigBuilder;
pub use types::{
    AppConfig, CrawlerConfig, EmailConfig, QueueConfig, RetentionConfig, SecurityConfig,
    WebpConversionConfig,
};

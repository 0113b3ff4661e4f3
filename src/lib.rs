pub mod cli;
pub mod config;
pub mod freshness;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod pipeline;
pub mod projection;
pub mod quality;
pub mod snapshot;
pub mod summary;
pub mod time;
pub mod timeline;
pub mod usage;

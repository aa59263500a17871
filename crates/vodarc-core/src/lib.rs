pub mod config;
pub mod logging;

pub mod downloader;
pub mod estimate;
pub mod model;
pub mod proxy;
pub mod retry;
pub mod runstore;
pub mod scheduler;

//! Data models for the portal automation pipeline.

pub mod config;
pub mod record;

pub use config::{
    CaptchaConfig, Config, ExportApiConfig, ListApiConfig, LoginApiConfig, LoginConfig,
    PaginationConfig, PasswordScheme, ProcessingConfig, RunConfig,
};
pub use record::{ListingPage, TrainRecord};

#![forbid(unsafe_code)]

pub mod app_services;
pub mod catalog;
pub mod config;
pub mod error;
pub mod progress_service;

pub use progress_core::Clock;

pub use app_services::AppServices;
pub use catalog::{CatalogShapeResolver, InMemoryCatalog};
pub use config::ProgressConfig;
pub use error::{AppServicesError, CatalogError, ErrorKind, ProgressServiceError};
pub use progress_service::ProgressService;

mod app_config;

pub use app_config::{
    AppConfig, CacheBackend, CacheConfig, DatabaseConfig, LogFormat, LoggingConfig, ServerConfig,
};

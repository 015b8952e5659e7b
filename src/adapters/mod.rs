// Adapters - External system implementations

pub mod media_libav;
pub mod memory_media;
pub mod toml_config;
pub mod tracing_log;

// Re-export adapters
pub use media_libav::LibavToolkit;
pub use memory_media::MemoryToolkit;
pub use toml_config::TomlConfigAdapter;
pub use tracing_log::TracingLogAdapter;

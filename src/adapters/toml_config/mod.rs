// TOML config adapter - Merge settings loaded from a TOML file

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{PoisonError, RwLock};

use crate::domain::model::MergeSettings;
use crate::error::ConfigError;
use crate::ports::ConfigPort;

/// File consulted when no config path is given
pub const DEFAULT_CONFIG_FILE: &str = "reelmerge.toml";

/// TOML configuration adapter
#[derive(Debug, Default)]
pub struct TomlConfigAdapter {
    settings: RwLock<MergeSettings>,
    config_file_path: RwLock<Option<PathBuf>>,
}

impl TomlConfigAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: MergeSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
            config_file_path: RwLock::new(None),
        }
    }

    /// Parse and validate a TOML document. Missing sections and keys keep
    /// their defaults.
    pub fn parse(content: &str) -> Result<MergeSettings, ConfigError> {
        let settings: MergeSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read and parse `path` without touching adapter state
    pub fn read_file(path: &str) -> Result<MergeSettings, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_string(),
            source,
        })?;
        Self::parse(&content)
    }
}

#[async_trait]
impl ConfigPort for TomlConfigAdapter {
    async fn load_config(&self, file_path: &str) -> Result<(), ConfigError> {
        let settings = Self::read_file(file_path)?;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
        *self
            .config_file_path
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(PathBuf::from(file_path));
        tracing::debug!("Loaded configuration from {}", file_path);
        Ok(())
    }

    async fn settings(&self) -> MergeSettings {
        self.settings
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn update_settings(&self, settings: MergeSettings) -> Result<(), ConfigError> {
        settings.validate()?;
        *self.settings.write().unwrap_or_else(PoisonError::into_inner) = settings;
        Ok(())
    }

    async fn get_config_file_path(&self) -> String {
        self.config_file_path
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|path| path.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_parse_partial_document() {
        let settings = TomlConfigAdapter::parse(
            r#"
            [watermark]
            text = "Holiday"
            opacity = 200

            [encoder]
            crf = 23
            "#,
        )
        .unwrap();

        assert_eq!(settings.watermark.text, "Holiday");
        assert_eq!(settings.watermark.opacity, 200);
        assert_eq!(settings.encoder.crf, 23);
        assert_eq!(settings.encoder.preset, "veryfast");
        assert!(settings.output.faststart);
    }

    #[test]
    fn test_parse_rejects_invalid_values() {
        let err = TomlConfigAdapter::parse("[encoder]\ncrf = 60\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));

        let err = TomlConfigAdapter::parse("[watermark\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseFailed(_)));
    }

    #[tokio::test]
    async fn test_load_config_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[output]\norientation_hint = 90").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let adapter = TomlConfigAdapter::new();
        assert_eq!(adapter.get_config_file_path().await, DEFAULT_CONFIG_FILE);
        adapter.load_config(&path).await.unwrap();

        assert_eq!(adapter.settings().await.output.orientation_hint, Some(90));
        assert_eq!(adapter.get_config_file_path().await, path);
    }

    #[tokio::test]
    async fn test_missing_file_is_read_failure() {
        let adapter = TomlConfigAdapter::new();
        let err = adapter.load_config("/nonexistent/reelmerge.toml").await.unwrap_err();
        assert!(matches!(err, ConfigError::ReadFailed { .. }));
    }

    #[tokio::test]
    async fn test_update_settings_validates() {
        let adapter = TomlConfigAdapter::new();
        let mut settings = MergeSettings::default();
        settings.output.orientation_hint = Some(45);
        assert!(adapter.update_settings(settings).await.is_err());
        assert_eq!(adapter.settings().await, MergeSettings::default());
    }
}

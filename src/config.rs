use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Buffered data items kept per device.
pub const DEFAULT_BUFFER_SIZE: usize = 10;

/// Fraction of an axis range a recorded movement must cover.
pub const RECORD_AXIS_THRESHOLD: f64 = 0.25;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineConfig {
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
    #[serde(default = "default_record_axis_threshold")]
    pub record_axis_threshold: f64,
    #[serde(default = "default_polling_thread_name")]
    pub polling_thread_name: String,
    #[serde(default = "default_delivery_thread_name")]
    pub delivery_thread_name: String,
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}
fn default_record_axis_threshold() -> f64 {
    RECORD_AXIS_THRESHOLD
}
fn default_polling_thread_name() -> String {
    "inputbind_poll".to_string()
}
fn default_delivery_thread_name() -> String {
    "inputbind_record".to_string()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
            record_axis_threshold: default_record_axis_threshold(),
            polling_thread_name: default_polling_thread_name(),
            delivery_thread_name: default_delivery_thread_name(),
        }
    }
}

impl EngineConfig {
    /// Load config from file, or create default if not exists
    pub fn load_or_create<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        if !path.as_ref().exists() {
            let default_config = Self::default();
            default_config.save_to_file(&path)?;
            return Ok(default_config);
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: EngineConfig = toml::from_str(&content)?;
        Ok(config.validated())
    }

    /// Clamps every field into its usable range.
    pub fn validated(mut self) -> Self {
        if self.buffer_size < 1 {
            self.buffer_size = 1;
        }
        if !(self.record_axis_threshold > 0.0 && self.record_axis_threshold < 1.0) {
            self.record_axis_threshold = if self.record_axis_threshold >= 1.0 {
                0.99
            } else {
                RECORD_AXIS_THRESHOLD
            };
        }
        if self.polling_thread_name.trim().is_empty() {
            self.polling_thread_name = default_polling_thread_name();
        }
        if self.delivery_thread_name.trim().is_empty() {
            self.delivery_thread_name = default_delivery_thread_name();
        }
        self
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let commented = format!(
            "buffer_size = {}                # Buffered data items kept per device (min 1)\n\
             record_axis_threshold = {:?}   # Share of an axis range a recorded movement must cover (0-1)\n\
             polling_thread_name = \"{}\"     # Name of the device polling thread\n\
             delivery_thread_name = \"{}\"    # Name of the recorded gesture delivery thread\n",
            self.buffer_size,
            self.record_axis_threshold,
            self.polling_thread_name,
            self.delivery_thread_name,
        );

        fs::write(path, commented)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = EngineConfig::default();
        assert_eq!(config.buffer_size, 10);
        assert_eq!(config.record_axis_threshold, 0.25);
        assert!(!config.polling_thread_name.is_empty());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: EngineConfig = toml::from_str("buffer_size = 32").unwrap();
        assert_eq!(config.buffer_size, 32);
        assert_eq!(config.record_axis_threshold, RECORD_AXIS_THRESHOLD);
        assert_eq!(config.delivery_thread_name, "inputbind_record");
    }

    #[test]
    fn test_validated_clamps() {
        let config = EngineConfig {
            buffer_size: 0,
            record_axis_threshold: 3.0,
            polling_thread_name: " ".to_string(),
            ..EngineConfig::default()
        }
        .validated();

        assert_eq!(config.buffer_size, 1);
        assert!(config.record_axis_threshold < 1.0);
        assert_eq!(config.polling_thread_name, "inputbind_poll");

        let negative = EngineConfig {
            record_axis_threshold: -0.5,
            ..EngineConfig::default()
        }
        .validated();
        assert_eq!(negative.record_axis_threshold, RECORD_AXIS_THRESHOLD);
    }
}

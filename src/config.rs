//! Session configuration

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Execution provider preference for both inference contexts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// CUDA, falling back to CPU when the provider cannot be registered
    Cuda,
    Cpu,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// ONNX image encoder
    pub encoder_model: PathBuf,
    /// ONNX prompt/mask decoder
    pub decoder_model: PathBuf,
    pub provider: Provider,
    pub intra_threads: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            encoder_model: PathBuf::from("models/sam_encoder.onnx"),
            decoder_model: PathBuf::from("models/sam_decoder.onnx"),
            provider: Provider::Cuda,
            intra_threads: 4,
        }
    }
}

impl SessionConfig {
    /// Read a TOML config file; missing keys take their defaults
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("Failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.intra_threads == 0 || self.intra_threads > 64 {
            anyhow::bail!("intra_threads must be between 1 and 64");
        }
        if self.encoder_model.as_os_str().is_empty() {
            anyhow::bail!("encoder_model path is empty");
        }
        if self.decoder_model.as_os_str().is_empty() {
            anyhow::bail!("decoder_model path is empty");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.provider, Provider::Cuda);
        assert_eq!(config.intra_threads, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "provider = \"cpu\"").unwrap();
        writeln!(file, "decoder_model = \"/opt/models/decoder.onnx\"").unwrap();

        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.provider, Provider::Cpu);
        assert_eq!(config.decoder_model, PathBuf::from("/opt/models/decoder.onnx"));
        assert_eq!(config.encoder_model, PathBuf::from("models/sam_encoder.onnx"));
    }

    #[test]
    fn test_config_validation_threads() {
        let mut config = SessionConfig::default();
        config.intra_threads = 0;
        assert!(config.validate().is_err());

        config.intra_threads = 65;
        assert!(config.validate().is_err());

        config.intra_threads = 64;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_rejects_unknown_provider() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "provider = \"webgpu\"").unwrap();
        assert!(SessionConfig::from_file(file.path()).is_err());
    }
}

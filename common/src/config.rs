use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::WardenError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct WardenConfig {
    pub report: ReportConfig,
    pub evidence: EvidenceConfig,
}

impl WardenConfig {
    #[allow(clippy::missing_errors_doc)]
    pub fn validate(&self) -> Result<(), WardenError> {
        self.report.validate()?;
        self.evidence.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Binary,
    Hash,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct ReportConfig {
    pub format: ReportFormat,
    pub output_path: Option<PathBuf>,
    pub include_verdict: bool,
}

impl ReportConfig {
    #[allow(clippy::missing_errors_doc)]
    pub fn validate(&self) -> Result<(), WardenError> {
        if matches!(self.format, ReportFormat::Binary | ReportFormat::Hash)
            && self.output_path.is_none()
        {
            return Err(WardenError::ConfigError {
                message: "binary/hash 格式必须设置 report.output_path".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EvidenceConfig {
    pub include_drives: bool,
    pub include_network: bool,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            include_drives: true,
            include_network: true,
        }
    }
}

impl EvidenceConfig {
    #[allow(clippy::missing_errors_doc)]
    pub fn validate(&self) -> Result<(), WardenError> {
        Ok(())
    }
}

#[allow(clippy::missing_errors_doc)]
pub fn load_yaml_file(path: &Path) -> Result<WardenConfig, WardenError> {
    let text = std::fs::read_to_string(path).map_err(WardenError::IoError)?;
    serde_yaml::from_str::<WardenConfig>(&text).map_err(|e| WardenError::ConfigError {
        message: format!("解析配置 YAML 失败: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let cfg = WardenConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.report.format, ReportFormat::Text);
        assert!(cfg.evidence.include_drives);
        assert!(cfg.evidence.include_network);
    }

    #[test]
    fn binary_format_without_output_path_is_rejected() {
        let cfg = WardenConfig {
            report: ReportConfig {
                format: ReportFormat::Binary,
                output_path: None,
                include_verdict: false,
            },
            ..WardenConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn hash_format_with_output_path_is_accepted() {
        let cfg = WardenConfig {
            report: ReportConfig {
                format: ReportFormat::Hash,
                output_path: Some(PathBuf::from("./fingerprint.bin")),
                include_verdict: false,
            },
            ..WardenConfig::default()
        };
        assert!(cfg.validate().is_ok());
    }
}

//! 配置命令
//!
//! 打印默认配置，或校验并打印指定配置文件的完整内容（未写出的字段取默认值）。

use anyhow::{Context, Result};
use calibur_tools::TurretConfig;
use clap::Args;
use std::path::PathBuf;

/// 配置命令参数
#[derive(Args, Debug)]
pub struct ConfigCommand {
    /// 要校验的配置文件（不指定时打印默认配置）
    #[arg(short, long)]
    pub check: Option<PathBuf>,

    /// 把结果写入文件而不是标准输出
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

impl ConfigCommand {
    pub fn execute(&self) -> Result<()> {
        let config = match &self.check {
            Some(path) => TurretConfig::load_from_file(path)
                .with_context(|| format!("Invalid config file {}", path.display()))?,
            None => TurretConfig::default(),
        };

        match &self.output {
            Some(path) => {
                config
                    .save_to_file(path)
                    .with_context(|| format!("Failed to write {}", path.display()))?;
                println!("✅ Config written to {}", path.display());
            },
            None => print!("{}", config.to_toml_string()?),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_default_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("turret.toml");
        let cmd = ConfigCommand {
            check: None,
            output: Some(path.clone()),
        };
        cmd.execute().unwrap();

        let loaded = TurretConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded, TurretConfig::default());
    }

    #[test]
    fn test_check_rejects_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[estimator]\nparticle_count = 0\n").unwrap();

        let cmd = ConfigCommand {
            check: Some(path),
            output: None,
        };
        assert!(cmd.execute().is_err());
    }
}

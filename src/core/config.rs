use crate::core::error::{PlayerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 预加载秒数：每路帧队列最多缓存约 1 秒的解码数据
pub const PRELOAD_SECONDS: f64 = 1.0;

/// 播放器配置（可选 JSON 文件，缺省字段使用默认值）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// 帧队列缓存上限对应的秒数
    pub preload_seconds: f64,
    /// 轮询等待时使用退避（yield/短暂休眠），false 时纯自旋
    pub idle_backoff: bool,
    /// 打开声卡输出；false 时按实时速率在后台线程拉取音频
    pub audio_output: bool,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            preload_seconds: PRELOAD_SECONDS,
            idle_backoff: true,
            audio_output: true,
        }
    }
}

impl PlayerConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)
            .map_err(|e| PlayerError::ConfigError(format!("解析配置失败: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&json)
    }

    fn validate(&self) -> Result<()> {
        if !(self.preload_seconds.is_finite() && self.preload_seconds > 0.0) {
            return Err(PlayerError::ConfigError(format!(
                "preload_seconds 必须为正数: {}",
                self.preload_seconds
            )));
        }
        Ok(())
    }
}

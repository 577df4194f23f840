use anyhow::{anyhow, Result};
use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use std::sync::{Arc, RwLock};

lazy_static! {
    static ref GLOBAL_CONFIG_MANAGER: RwLock<Option<Arc<ConfigManager>>> = RwLock::new(None);
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("配置项 '{key}' 不存在")]
    KeyNotFound { key: String },
    #[error("配置项 '{key}' 类型转换失败: {message}")]
    TypeConversionError { key: String, message: String },
    #[error("配置初始化失败: {message}")]
    InitializationError { message: String },
}

/// 配置管理器
///
/// 分层加载：development.toml -> default.toml -> production.toml -> 环境变量，
/// 后加入的源优先生效，环境变量前缀为 `YOUQU`。
pub struct ConfigManager {
    config: Config,
}

impl ConfigManager {
    pub fn new() -> Result<Self> {
        Self::with_sources(vec![])
    }

    /// 使用指定的配置源创建配置管理器，额外的源追加在默认源之后
    pub fn with_sources(sources: Vec<ConfigSource>) -> Result<Self> {
        let mut builder = Config::builder();

        let default_sources = vec![
            ConfigSource::File {
                path: "config/development.toml".to_string(),
                required: false,
            },
            ConfigSource::File {
                path: "config/default.toml".to_string(),
                required: false,
            },
            ConfigSource::File {
                path: "config/production.toml".to_string(),
                required: false,
            },
            ConfigSource::Env {
                prefix: "YOUQU".to_string(),
                separator: "_",
            },
        ];

        for source in default_sources.into_iter().chain(sources) {
            // 可选文件不存在时跳过而不是报错
            if let ConfigSource::File { path, required } = &source {
                let exists = std::path::Path::new(path).exists();
                if !exists && *required {
                    return Err(anyhow!("必需的配置文件不存在: {}", path));
                }
                if !exists {
                    continue;
                }
            }
            builder = source.add_to_builder(builder)?;
        }

        let config = builder
            .build()
            .map_err(|e| anyhow!("构建配置失败: {}", e))?;
        Ok(Self { config })
    }

    /// 获取指定 key 的配置值
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        self.config
            .get(key)
            .map_err(|e| anyhow!("获取配置 '{}' 失败: {}", key, e))
    }

    /// 获取指定 key 的配置值，不存在时返回默认值
    pub fn get_or<T: DeserializeOwned>(&self, key: &str, default: T) -> T {
        self.get(key).unwrap_or(default)
    }

    /// 安全获取配置值，返回详细错误信息
    pub fn get_safe<T: DeserializeOwned>(&self, key: &str) -> std::result::Result<T, ConfigError> {
        self.config.get(key).map_err(|e| {
            if e.to_string().contains("not found") {
                ConfigError::KeyNotFound {
                    key: key.to_string(),
                }
            } else {
                ConfigError::TypeConversionError {
                    key: key.to_string(),
                    message: e.to_string(),
                }
            }
        })
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        self.get(key)
    }
    pub fn get_int(&self, key: &str) -> Result<i64> {
        self.get(key)
    }
    pub fn get_bool(&self, key: &str) -> Result<bool> {
        self.get(key)
    }

    /// 检查配置项是否存在
    pub fn exists(&self, key: &str) -> bool {
        self.config.get::<serde_json::Value>(key).is_ok()
    }
}

/// 配置源类型
pub enum ConfigSource {
    /// 文件配置源（TOML）
    File { path: String, required: bool },
    /// 环境变量配置源
    Env {
        prefix: String,
        separator: &'static str,
    },
    /// 字符串配置源（测试用）
    String { content: String, format: FileFormat },
}

impl ConfigSource {
    fn add_to_builder(
        self,
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<ConfigBuilder<config::builder::DefaultState>> {
        match self {
            ConfigSource::File { path, required } => {
                let file_source = File::with_name(&path).format(FileFormat::Toml);
                Ok(builder.add_source(file_source.required(required)))
            }
            ConfigSource::Env { prefix, separator } => Ok(builder.add_source(
                Environment::with_prefix(&prefix)
                    .separator(separator)
                    .prefix_separator("_")
                    .ignore_empty(true),
            )),
            ConfigSource::String { content, format } => {
                Ok(builder.add_source(File::from_str(&content, format)))
            }
        }
    }
}

/// 获取全局配置管理器实例（单例模式）
pub fn get_global_config_manager() -> Result<Arc<ConfigManager>> {
    {
        let manager = GLOBAL_CONFIG_MANAGER
            .read()
            .map_err(|e| anyhow!("读取全局配置管理器锁失败: {}", e))?;
        if let Some(ref config_manager) = *manager {
            return Ok(Arc::clone(config_manager));
        }
    }
    let mut manager = GLOBAL_CONFIG_MANAGER
        .write()
        .map_err(|e| anyhow!("获取全局配置管理器写锁失败: {}", e))?;
    if let Some(ref config_manager) = *manager {
        return Ok(Arc::clone(config_manager));
    }
    let config_manager =
        Arc::new(ConfigManager::new().map_err(|e| anyhow!("创建配置管理器失败: {}", e))?);
    *manager = Some(Arc::clone(&config_manager));
    Ok(config_manager)
}

/// 全局配置获取函数（使用单例）
pub fn get_config<T: DeserializeOwned>(key: &str) -> Result<T> {
    let manager = get_global_config_manager()?;
    manager.get(key)
}

#[cfg(test)]
mod tests {
    use super::{ConfigManager, ConfigSource};
    use config::FileFormat;

    #[test]
    fn test_config_manager_new() {
        let manager = ConfigManager::new();
        assert!(manager.is_ok());
    }

    #[test]
    fn test_config_from_string() {
        let toml_content = "[server]\nport = 8080".to_string();
        let source = ConfigSource::String {
            content: toml_content,
            format: FileFormat::Toml,
        };
        let manager = ConfigManager::with_sources(vec![source]).unwrap();
        assert_eq!(manager.get::<i64>("server.port").unwrap(), 8080);
    }

    #[test]
    fn test_config_get_or_falls_back() {
        let source = ConfigSource::String {
            content: "[jwt]\naccess_secret = \"s1\"".to_string(),
            format: FileFormat::Toml,
        };
        let manager = ConfigManager::with_sources(vec![source]).unwrap();
        assert_eq!(
            manager.get_or::<String>("security.expires_in", "1d".to_string()),
            "1d"
        );
        assert_eq!(
            manager.get_string("jwt.access_secret").unwrap(),
            "s1"
        );
    }

    #[test]
    fn test_config_exists() {
        let source = ConfigSource::String {
            content: "[redis]\nurl = \"redis://127.0.0.1:6379\"".to_string(),
            format: FileFormat::Toml,
        };
        let manager = ConfigManager::with_sources(vec![source]).unwrap();
        assert!(manager.exists("redis.url"));
        assert!(!manager.exists("redis.password"));
    }
}

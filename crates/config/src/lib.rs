//! 统一配置中心
//!
//! 提供应用的全局配置管理，包括：
//! - 服务监听地址
//! - 中继行为（历史容量、出站缓冲、投递范围）
//! - 日志过滤
//!
//! 加载优先级：默认值 -> 可选配置文件（`CHAT_CONFIG_FILE`）-> 环境变量（`CHAT_*`，`__` 分隔层级）。

use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// 配置文件路径环境变量
pub const CONFIG_FILE_ENV: &str = "CHAT_CONFIG_FILE";
/// 环境变量前缀
pub const ENV_PREFIX: &str = "CHAT_";

/// 全局应用配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, Validate)]
pub struct AppConfig {
    /// 服务配置
    #[serde(default)]
    #[validate(nested)]
    pub server: ServerConfig,
    /// 中继配置
    #[serde(default)]
    #[validate(nested)]
    pub relay: RelayConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    #[validate(range(min = 1))]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 私聊消息的投递范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryScope {
    /// 发给所有连接，由接收方自行过滤
    #[default]
    Everyone,
    /// 只发给发送者与收件人
    Participants,
}

/// 改名冲突通知的范围
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeScope {
    /// 作为系统通知广播并写入历史
    #[default]
    Everyone,
    /// 只通知发起请求的连接
    Requester,
}

/// 中继配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RelayConfig {
    /// 历史记录容量，`None` 表示不限制；超出时淘汰最旧的记录
    #[serde(default)]
    #[validate(range(min = 1))]
    pub history_capacity: Option<usize>,
    /// 每个连接的出站队列长度，队列写满的连接会被断开
    #[validate(range(min = 1))]
    pub outbound_buffer: usize,
    #[serde(default)]
    pub private_delivery: DeliveryScope,
    #[serde(default)]
    pub rename_conflict_notice: NoticeScope,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            history_capacity: None,
            outbound_buffer: 256,
            private_delivery: DeliveryScope::default(),
            rename_conflict_notice: NoticeScope::default(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `RUST_LOG` 未设置时使用的过滤规则
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

/// 配置错误类型
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),
    #[error("invalid configuration: {0}")]
    Invalid(#[from] validator::ValidationErrors),
}

impl From<figment::Error> for ConfigError {
    fn from(value: figment::Error) -> Self {
        ConfigError::Load(Box::new(value))
    }
}

impl AppConfig {
    /// 按默认值 -> 配置文件 -> 环境变量的顺序加载并校验配置
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// 构建加载用的 figment，方便测试时替换数据源
    pub fn figment() -> Figment {
        let mut fig = Figment::new().merge(Serialized::defaults(AppConfig::default()));
        if let Ok(path) = std::env::var(CONFIG_FILE_ENV) {
            if path.ends_with(".yml") || path.ends_with(".yaml") {
                fig = fig.merge(Yaml::file(path));
            } else if path.ends_with(".json") {
                fig = fig.merge(Json::file(path));
            } else {
                fig = fig.merge(Toml::file(path));
            }
        }
        fig.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn from_figment(fig: Figment) -> Result<Self, ConfigError> {
        let cfg: AppConfig = fig.extract()?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.bind_address(), "127.0.0.1:3000");
        assert_eq!(config.relay.history_capacity, None);
        assert_eq!(config.relay.private_delivery, DeliveryScope::Everyone);
        assert_eq!(config.relay.rename_conflict_notice, NoticeScope::Everyone);
    }

    #[test]
    fn env_overrides_nested_values() {
        Jail::expect_with(|jail| {
            jail.set_env("CHAT_SERVER__PORT", "4000");
            jail.set_env("CHAT_RELAY__PRIVATE_DELIVERY", "participants");
            jail.set_env("CHAT_RELAY__HISTORY_CAPACITY", "100");

            let config = AppConfig::load().expect("load");
            assert_eq!(config.server.port, 4000);
            assert_eq!(config.relay.private_delivery, DeliveryScope::Participants);
            assert_eq!(config.relay.history_capacity, Some(100));
            Ok(())
        });
    }

    #[test]
    fn file_is_merged_before_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "relay.toml",
                r#"
                [server]
                host = "0.0.0.0"
                port = 5000

                [relay]
                outbound_buffer = 8
                rename_conflict_notice = "requester"
                "#,
            )?;
            jail.set_env(CONFIG_FILE_ENV, "relay.toml");
            jail.set_env("CHAT_SERVER__PORT", "5001");

            let config = AppConfig::load().expect("load");
            assert_eq!(config.server.host, "0.0.0.0");
            assert_eq!(config.server.port, 5001);
            assert_eq!(config.relay.outbound_buffer, 8);
            assert_eq!(config.relay.rename_conflict_notice, NoticeScope::Requester);
            Ok(())
        });
    }

    #[test]
    fn zero_sized_buffers_are_rejected() {
        let mut config = AppConfig::default();
        config.relay.outbound_buffer = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.relay.history_capacity = Some(0);
        assert!(config.validate().is_err());
    }
}

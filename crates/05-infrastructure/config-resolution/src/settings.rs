//! 解析器设置

use infrastructure_common::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

/// 环境变量覆盖的默认前缀，例如 `CONFIG_RESOLVER__MAX_ROUNDS=16`
pub const DEFAULT_ENV_PREFIX: &str = "CONFIG_RESOLVER";

/// 解析器设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverSettings {
    /// 带这些前缀的父类型终止父类型遍历
    pub platform_type_prefixes: Vec<String>,
    /// 默认导入排除前缀
    pub excluded_import_prefixes: Vec<String>,
    /// 存在错误级别问题时以 `ResolutionError::Problems` 失败
    pub fail_on_problems: bool,
    /// 不动点迭代的最大轮数
    pub max_rounds: usize,
    /// 对完整模式配置源调用增强钩子
    pub enhance_full_configurations: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            platform_type_prefixes: vec!["core.".to_string()],
            excluded_import_prefixes: vec![
                "core.annotation.".to_string(),
                "di.stereotype.".to_string(),
            ],
            fail_on_problems: true,
            max_rounds: 64,
            enhance_full_configurations: true,
        }
    }
}

impl ResolverSettings {
    /// 从 TOML 文本读取，缺省字段取默认值
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::ParseError {
            path: "<inline>".to_string(),
            source: Box::new(e),
        })
    }

    /// 从配置文件（可选）与环境变量加载，环境变量优先
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_with_prefix(path, DEFAULT_ENV_PREFIX)
    }

    pub fn load_with_prefix(path: Option<&Path>, env_prefix: &str) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::FileNotFound {
                    path: path.display().to_string(),
                });
            }
            builder = builder.add_source(config::File::from(path));
        }
        let shown = path
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| format!("<env:{}>", env_prefix));

        let settings = builder
            .add_source(
                config::Environment::with_prefix(env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize::<ResolverSettings>())
            .map_err(|e| ConfigError::ParseError {
                path: shown.clone(),
                source: Box::new(e),
            })?;
        debug!("解析器设置加载完成 ({}): {:?}", shown, settings);
        Ok(settings)
    }

    /// 是否为平台类型
    pub fn is_platform_type(&self, type_name: &str) -> bool {
        self.platform_type_prefixes
            .iter()
            .any(|prefix| type_name.starts_with(prefix.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings = ResolverSettings::from_toml_str("max_rounds = 3\n").unwrap();
        assert_eq!(settings.max_rounds, 3);
        assert!(settings.fail_on_problems);
        assert_eq!(settings.platform_type_prefixes, vec!["core."]);
        assert!(settings.is_platform_type("core.Object"));
        assert!(!settings.is_platform_type("app.Base"));
    }

    #[test]
    fn test_invalid_toml() {
        let err = ResolverSettings::from_toml_str("max_rounds = \"many\"").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn test_load_file_with_env_override() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "fail_on_problems = false\nmax_rounds = 5").unwrap();
        std::env::set_var("RESOLVER_SETTINGS_TEST__MAX_ROUNDS", "9");
        let settings =
            ResolverSettings::load_with_prefix(Some(file.path()), "RESOLVER_SETTINGS_TEST")
                .unwrap();
        std::env::remove_var("RESOLVER_SETTINGS_TEST__MAX_ROUNDS");
        assert!(!settings.fail_on_problems);
        assert_eq!(settings.max_rounds, 9);
        assert!(settings.enhance_full_configurations);
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let settings = ResolverSettings::load_with_prefix(None, "RESOLVER_SETTINGS_UNSET").unwrap();
        assert_eq!(settings, ResolverSettings::default());
    }

    #[test]
    fn test_missing_settings_file() {
        let err = ResolverSettings::load(Some(Path::new("/no/such/resolver.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));
    }
}

//! 基于文件的组件定义读取器
//!
//! 文件格式（TOML 示例）：
//!
//! ```toml
//! [definitions.dataSource]
//! type_name = "app.PooledDataSource"
//! primary = true
//!
//! [aliases]
//! ds = "dataSource"
//! ```

use di_abstractions::{
    ComponentDefinition, DefinitionOrigin, DefinitionRegistry, ResourceDefinitionReader,
};
use indexmap::IndexMap;
use infrastructure_common::{ConfigError, ResolutionError};
use serde::Deserialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Default, Deserialize)]
struct DefinitionFile {
    #[serde(default)]
    definitions: IndexMap<String, ComponentDefinition>,
    /// 别名 -> 名称
    #[serde(default)]
    aliases: IndexMap<String, String>,
}

/// 读取 TOML / JSON / YAML 格式的定义文件
#[derive(Debug, Default, Clone)]
pub struct FileDefinitionReader {
    base_dir: Option<PathBuf>,
}

impl FileDefinitionReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    fn resolve_path(&self, location: &str) -> PathBuf {
        let raw = location
            .strip_prefix("file:")
            .or_else(|| location.strip_prefix("classpath:"))
            .unwrap_or(location);
        let path = PathBuf::from(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    fn parse(&self, path: &PathBuf, content: &str) -> Result<DefinitionFile, ConfigError> {
        let display = path.display().to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "toml" => toml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: display,
                source: Box::new(e),
            }),
            "json" => serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
                path: display,
                source: Box::new(e),
            }),
            "yaml" | "yml" => serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
                path: display,
                source: Box::new(e),
            }),
            _ => Err(ConfigError::UnsupportedFormat { path: display }),
        }
    }
}

impl ResourceDefinitionReader for FileDefinitionReader {
    fn extensions(&self) -> &[&'static str] {
        &["toml", "json", "yaml", "yml"]
    }

    fn load_definitions(
        &self,
        location: &str,
        registry: &mut dyn DefinitionRegistry,
    ) -> Result<usize, ResolutionError> {
        let path = self.resolve_path(location);
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let content = std::fs::read_to_string(&path).map_err(ConfigError::from)?;
        let file = self.parse(&path, &content)?;

        let count = file.definitions.len();
        for (name, mut definition) in file.definitions {
            definition.origin = DefinitionOrigin::Resource {
                location: location.to_string(),
            };
            registry.register(&name, definition)?;
        }
        for (alias, name) in &file.aliases {
            registry.register_alias(name, alias)?;
        }
        info!("从资源 {} 加载了 {} 个组件定义", location, count);
        Ok(count)
    }
}

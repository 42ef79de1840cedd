//! 属性源实现
//!
//! 包括内存属性源、组合属性源以及基于文件（TOML / JSON / YAML / properties）的属性源加载。

use config_abstractions::PropertySource;
use indexmap::IndexMap;
use infrastructure_common::ConfigError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// 基于键值表的属性源
#[derive(Debug, Clone)]
pub struct MapPropertySource {
    name: String,
    values: IndexMap<String, Value>,
}

impl MapPropertySource {
    /// 创建新的属性源
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            values: IndexMap::new(),
        }
    }

    /// 从键值对创建
    pub fn from_pairs<K, V>(
        name: impl Into<String>,
        pairs: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let mut source = Self::new(name);
        for (key, value) in pairs {
            source.insert(key, value);
        }
        source
    }

    /// 以新名称返回同一组属性，作为组合属性源成员时使用
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// 插入属性
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn contains_property(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    fn property_names(&self) -> Vec<String> {
        self.values.keys().cloned().collect()
    }
}

/// 组合属性源
///
/// 多个同名属性源合并为一个，成员按顺序查找，排在前面的优先。
#[derive(Debug, Clone)]
pub struct CompositePropertySource {
    name: String,
    sources: Vec<Arc<dyn PropertySource>>,
}

impl CompositePropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: Vec::new(),
        }
    }

    /// 追加成员（最低优先级）
    pub fn add_last(&mut self, source: Arc<dyn PropertySource>) {
        self.sources.push(source);
    }

    /// 插入成员（最高优先级）
    pub fn add_first(&mut self, source: Arc<dyn PropertySource>) {
        self.sources.insert(0, source);
    }

    pub fn sources(&self) -> &[Arc<dyn PropertySource>] {
        &self.sources
    }
}

impl PropertySource for CompositePropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        self.sources.iter().find_map(|s| s.get_property(key))
    }

    fn property_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();
        for source in &self.sources {
            for name in source.property_names() {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn nested_sources(&self) -> Option<Vec<Arc<dyn PropertySource>>> {
        Some(self.sources.clone())
    }
}

/// 属性文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyFileFormat {
    Toml,
    Json,
    Yaml,
    Properties,
}

impl PropertyFileFormat {
    /// 根据扩展名推断格式
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            "yaml" | "yml" => Some(Self::Yaml),
            "properties" => Some(Self::Properties),
            _ => None,
        }
    }
}

/// 文件属性源加载器
#[derive(Debug, Default, Clone)]
pub struct PropertySourceLoader {
    base_dir: Option<PathBuf>,
}

impl PropertySourceLoader {
    pub fn new() -> Self {
        Self::default()
    }

    /// 相对路径的解析基准目录
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = Some(dir.into());
        self
    }

    /// 把位置字符串解析为文件路径，支持 `file:` 前缀
    pub fn resolve_path(&self, location: &str) -> PathBuf {
        let raw = location.strip_prefix("file:").unwrap_or(location);
        let path = PathBuf::from(raw);
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path,
        }
    }

    /// 加载属性源
    pub fn load(&self, name: &str, location: &str) -> Result<MapPropertySource, ConfigError> {
        let path = self.resolve_path(location);
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let format =
            PropertyFileFormat::from_path(&path).ok_or_else(|| ConfigError::UnsupportedFormat {
                path: path.display().to_string(),
            })?;

        debug!("加载属性文件: {} ({:?})", path.display(), format);
        let content = std::fs::read_to_string(&path)?;
        let path_text = path.display().to_string();

        let mut source = MapPropertySource::new(name);
        match format {
            PropertyFileFormat::Toml => {
                let parsed: toml::Value =
                    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
                        path: path_text.clone(),
                        source: Box::new(e),
                    })?;
                flatten_into(&toml_to_json(&parsed), String::new(), &mut source);
            }
            PropertyFileFormat::Json => {
                let parsed: Value =
                    serde_json::from_str(&content).map_err(|e| ConfigError::ParseError {
                        path: path_text.clone(),
                        source: Box::new(e),
                    })?;
                flatten_into(&parsed, String::new(), &mut source);
            }
            PropertyFileFormat::Yaml => {
                let parsed: Value =
                    serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
                        path: path_text.clone(),
                        source: Box::new(e),
                    })?;
                flatten_into(&parsed, String::new(), &mut source);
            }
            PropertyFileFormat::Properties => parse_properties(&content, &mut source),
        }

        debug!("属性文件加载完成: {}, {} 个属性", path_text, source.len());
        Ok(source)
    }
}

/// 将 TOML 值转换为 JSON 值
fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::Number(serde_json::Number::from(*i)),
        toml::Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Array(arr) => Value::Array(arr.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect(),
        ),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
    }
}

/// 递归展开嵌套对象为点分键
fn flatten_into(value: &Value, prefix: String, out: &mut MapPropertySource) {
    match value {
        Value::Object(map) => {
            for (key, nested) in map {
                let full_key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(nested, full_key, out);
            }
        }
        leaf if !prefix.is_empty() => out.insert(prefix, leaf.clone()),
        _ => {}
    }
}

fn parse_properties(content: &str, out: &mut MapPropertySource) {
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        let split_at = line.find(['=', ':']);
        let (key, value) = match split_at {
            Some(idx) => (line[..idx].trim(), line[idx + 1..].trim()),
            None => (line, ""),
        };
        out.insert(key, Value::String(value.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_load_toml_flattens_tables() {
        let file = write_temp(".toml", "[app]\nname = \"demo\"\n[app.pool]\nsize = 8\n");
        let source = PropertySourceLoader::new()
            .load("app", file.path().to_str().unwrap())
            .unwrap();
        assert_eq!(source.get_property("app.name"), Some(Value::String("demo".into())));
        assert_eq!(source.get_property("app.pool.size"), Some(Value::from(8)));
        assert!(!source.contains_property("app"));
    }

    #[test]
    fn test_load_yaml_and_properties() {
        let yaml = write_temp(".yml", "server:\n  port: 8080\n");
        let source = PropertySourceLoader::new()
            .load("yaml", yaml.path().to_str().unwrap())
            .unwrap();
        assert_eq!(source.get_property("server.port"), Some(Value::from(8080)));

        let props = write_temp(".properties", "# comment\nfeature.enabled=true\nname: demo\n");
        let source = PropertySourceLoader::new()
            .load("props", &format!("file:{}", props.path().display()))
            .unwrap();
        assert_eq!(source.get_property("feature.enabled"), Some(Value::String("true".into())));
        assert_eq!(source.get_property("name"), Some(Value::String("demo".into())));
    }

    #[test]
    fn test_missing_and_unsupported_files() {
        let err = PropertySourceLoader::new()
            .load("missing", "/definitely/not/here.toml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound { .. }));

        let file = write_temp(".ini", "a=b");
        let err = PropertySourceLoader::new()
            .load("ini", file.path().to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat { .. }));
    }

    #[test]
    fn test_composite_prefers_first_member() {
        let mut composite = CompositePropertySource::new("shared");
        composite.add_last(Arc::new(MapPropertySource::from_pairs(
            "old",
            [("k", "old"), ("only.old", "x")],
        )));
        composite.add_first(Arc::new(MapPropertySource::from_pairs("new", [("k", "new")])));
        assert_eq!(composite.get_property("k"), Some(Value::String("new".into())));
        assert_eq!(composite.get_property("only.old"), Some(Value::String("x".into())));
        assert_eq!(composite.property_names(), vec!["k".to_string(), "only.old".to_string()]);
    }
}

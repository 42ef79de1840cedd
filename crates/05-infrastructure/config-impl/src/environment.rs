//! 运行环境
//!
//! 维护按优先级排列的属性源列表，并提供属性查找与占位符解析。

use crate::providers::MapPropertySource;
use config_abstractions::{value_to_string, PropertyResolver, PropertySource};
use infrastructure_common::ConfigError;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const PLACEHOLDER_PREFIX: &str = "${";
const PLACEHOLDER_SUFFIX: char = '}';
const VALUE_SEPARATOR: char = ':';

/// 系统环境变量属性源名称
pub const SYSTEM_ENVIRONMENT_SOURCE: &str = "systemEnvironment";

/// 可变属性源列表，排在前面的优先级更高
#[derive(Debug, Default, Clone)]
pub struct MutablePropertySources {
    sources: Vec<Arc<dyn PropertySource>>,
}

impl MutablePropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以最高优先级添加，同名属性源先被移除
    pub fn add_first(&mut self, source: Arc<dyn PropertySource>) {
        self.remove(source.name());
        self.sources.insert(0, source);
    }

    /// 以最低优先级添加，同名属性源先被移除
    pub fn add_last(&mut self, source: Arc<dyn PropertySource>) {
        self.remove(source.name());
        self.sources.push(source);
    }

    /// 紧挨在 `relative` 之前添加
    pub fn add_before(
        &mut self,
        relative: &str,
        source: Arc<dyn PropertySource>,
    ) -> Result<(), ConfigError> {
        if relative == source.name() {
            return self.replace(relative, source);
        }
        self.remove(source.name());
        let index = self.index_of(relative).ok_or_else(|| ConfigError::PropertySourceNotFound {
            name: relative.to_string(),
        })?;
        self.sources.insert(index, source);
        Ok(())
    }

    /// 紧挨在 `relative` 之后添加
    pub fn add_after(
        &mut self,
        relative: &str,
        source: Arc<dyn PropertySource>,
    ) -> Result<(), ConfigError> {
        if relative == source.name() {
            return self.replace(relative, source);
        }
        self.remove(source.name());
        let index = self.index_of(relative).ok_or_else(|| ConfigError::PropertySourceNotFound {
            name: relative.to_string(),
        })?;
        self.sources.insert(index + 1, source);
        Ok(())
    }

    /// 原位替换同名属性源
    pub fn replace(
        &mut self,
        name: &str,
        source: Arc<dyn PropertySource>,
    ) -> Result<(), ConfigError> {
        let index = self.index_of(name).ok_or_else(|| ConfigError::PropertySourceNotFound {
            name: name.to_string(),
        })?;
        self.sources[index] = source;
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn PropertySource>> {
        let index = self.index_of(name)?;
        Some(self.sources.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn PropertySource>> {
        self.sources.iter().find(|s| s.name() == name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// 按优先级排列的名称
    pub fn names(&self) -> Vec<String> {
        self.sources.iter().map(|s| s.name().to_string()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn PropertySource>> {
        self.sources.iter()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn index_of(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|s| s.name() == name)
    }
}

/// 运行环境
#[derive(Debug, Default, Clone)]
pub struct Environment {
    property_sources: MutablePropertySources,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以系统环境变量作为最低优先级属性源
    pub fn with_system_environment(mut self) -> Self {
        let source = MapPropertySource::from_pairs(SYSTEM_ENVIRONMENT_SOURCE, std::env::vars());
        debug!("加载系统环境变量属性源: {} 个", source.len());
        self.property_sources.add_last(Arc::new(source));
        self
    }

    pub fn property_sources(&self) -> &MutablePropertySources {
        &self.property_sources
    }

    pub fn property_sources_mut(&mut self) -> &mut MutablePropertySources {
        &mut self.property_sources
    }

    fn lookup(&self, key: &str) -> Option<String> {
        self.property_sources
            .iter()
            .find_map(|source| source.get_property(key))
            .map(|value| value_to_string(&value))
    }

    fn resolve(
        &self,
        text: &str,
        strict: bool,
        visiting: &mut HashSet<String>,
    ) -> Result<String, ConfigError> {
        let mut result = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(start) = rest.find(PLACEHOLDER_PREFIX) {
            result.push_str(&rest[..start]);
            let after_prefix = &rest[start + PLACEHOLDER_PREFIX.len()..];
            let Some(end) = find_placeholder_end(after_prefix) else {
                // 未闭合的占位符按字面量处理
                result.push_str(&rest[start..]);
                return Ok(result);
            };

            let raw = &after_prefix[..end];
            let placeholder = self.resolve(raw, strict, visiting)?;
            let (key, default) = split_default(&placeholder);

            if !visiting.insert(key.to_string()) {
                return Err(ConfigError::CircularPlaceholder {
                    placeholder: key.to_string(),
                });
            }
            let resolved = match self.lookup(key) {
                Some(value) => Some(self.resolve(&value, strict, visiting)?),
                None => match default {
                    Some(default) => Some(self.resolve(default, strict, visiting)?),
                    None => None,
                },
            };
            visiting.remove(key);

            match resolved {
                Some(value) => result.push_str(&value),
                None if strict => {
                    return Err(ConfigError::UnresolvablePlaceholder {
                        placeholder: key.to_string(),
                        value: text.to_string(),
                    })
                }
                None => {
                    result.push_str(PLACEHOLDER_PREFIX);
                    result.push_str(raw);
                    result.push(PLACEHOLDER_SUFFIX);
                }
            }
            rest = &after_prefix[end + 1..];
        }

        result.push_str(rest);
        Ok(result)
    }
}

impl PropertyResolver for Environment {
    fn get_property(&self, key: &str) -> Option<String> {
        self.lookup(key)
    }

    fn resolve_placeholders(&self, text: &str) -> String {
        match self.resolve(text, false, &mut HashSet::new()) {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!("占位符解析失败，保留原值: {}", e);
                text.to_string()
            }
        }
    }

    fn resolve_required_placeholders(&self, text: &str) -> Result<String, ConfigError> {
        self.resolve(text, true, &mut HashSet::new())
    }
}

/// 查找与开头 `${` 匹配的 `}`，支持嵌套
fn find_placeholder_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, ch)) = chars.next() {
        match ch {
            '$' if matches!(chars.peek(), Some((_, '{'))) => {
                chars.next();
                depth += 1;
            }
            PLACEHOLDER_SUFFIX if depth == 0 => return Some(idx),
            PLACEHOLDER_SUFFIX => depth -= 1,
            _ => {}
        }
    }
    None
}

fn split_default(placeholder: &str) -> (&str, Option<&str>) {
    match placeholder.find(VALUE_SEPARATOR) {
        Some(idx) => (&placeholder[..idx], Some(&placeholder[idx + 1..])),
        None => (placeholder, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn environment(pairs: &[(&str, &str)]) -> Environment {
        let mut env = Environment::new();
        env.property_sources_mut().add_last(Arc::new(MapPropertySource::from_pairs(
            "test",
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())),
        )));
        env
    }

    #[test]
    fn test_nested_placeholders_and_defaults() {
        let env = environment(&[
            ("app.name", "demo"),
            ("profile", "prod"),
            ("dir.prod", "/srv/${app.name}"),
        ]);
        assert_eq!(env.resolve_placeholders("conf/${app.name}.toml"), "conf/demo.toml");
        assert_eq!(env.resolve_placeholders("${dir.${profile}}/x"), "/srv/demo/x");
        assert_eq!(env.resolve_placeholders("${missing:fallback}"), "fallback");
        assert_eq!(env.resolve_placeholders("${missing:${app.name}}"), "demo");
    }

    #[test]
    fn test_unresolvable_placeholders() {
        let env = environment(&[]);
        assert_eq!(env.resolve_placeholders("a/${missing}/b"), "a/${missing}/b");
        let err = env.resolve_required_placeholders("a/${missing}/b").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::UnresolvablePlaceholder { ref placeholder, .. } if placeholder == "missing"
        ));
    }

    #[test]
    fn test_circular_placeholder_detected() {
        let env = environment(&[("a", "${b}"), ("b", "${a}")]);
        let err = env.resolve_required_placeholders("${a}").unwrap_err();
        assert!(matches!(err, ConfigError::CircularPlaceholder { .. }));
        assert_eq!(env.resolve_placeholders("${a}"), "${a}");
    }

    #[test]
    fn test_source_ordering_operations() {
        let mut sources = MutablePropertySources::new();
        sources.add_last(Arc::new(MapPropertySource::from_pairs("base", [("k", "base")])));
        sources.add_first(Arc::new(MapPropertySource::from_pairs("top", [("k", "top")])));
        sources
            .add_before(
                "base",
                Arc::new(MapPropertySource::from_pairs("middle", [("k", "middle")])),
            )
            .unwrap();
        assert_eq!(sources.names(), vec!["top", "middle", "base"]);

        sources.add_last(Arc::new(MapPropertySource::from_pairs("top", [("k", "moved")])));
        assert_eq!(sources.names(), vec!["middle", "base", "top"]);

        let err = sources
            .add_before("absent", Arc::new(MapPropertySource::new("x")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::PropertySourceNotFound { .. }));
        assert!(!sources.contains("x"));
    }

    #[test]
    fn test_first_source_wins_lookup() {
        let mut env = environment(&[("k", "low")]);
        env.property_sources_mut()
            .add_first(Arc::new(MapPropertySource::from_pairs("high", [("k", "high")])));
        assert_eq!(env.get_property("k").as_deref(), Some("high"));
        assert_eq!(env.get_property_or("absent", "d"), "d");
    }
}

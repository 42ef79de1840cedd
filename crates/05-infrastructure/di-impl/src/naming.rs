//! 组件命名策略实现

use di_abstractions::{ComponentDefinition, DefinitionRegistry, NameGenerator};
use infrastructure_common::markers::STEREOTYPE_PREFIX;
use infrastructure_common::{short_name_of, MarkerIndex, ResolutionError, TypeLoader};
use std::sync::Arc;

/// 基于构造型标记的命名策略
///
/// 构造型标记的 `value` 属性给出显式名称，多个构造型给出不同名称时视为声明歧义。
/// 未声明名称时使用首字母小写的简短类型名。
#[derive(Debug, Default)]
pub struct MarkerNameGenerator {
    markers: Option<MarkerIndex>,
}

impl MarkerNameGenerator {
    /// 仅识别 `di.stereotype.*` 标记
    pub fn new() -> Self {
        Self::default()
    }

    /// 同时识别以组件构造型为元标记的自定义标记
    pub fn with_types(types: Arc<dyn TypeLoader>) -> Self {
        Self {
            markers: Some(MarkerIndex::new(types)),
        }
    }

    fn is_stereotype(&self, marker_name: &str) -> bool {
        marker_name.starts_with(STEREOTYPE_PREFIX)
            || self
                .markers
                .as_ref()
                .map(|index| index.is_stereotype(marker_name))
                .unwrap_or(false)
    }

    fn explicit_name(
        &self,
        definition: &ComponentDefinition,
    ) -> Result<Option<String>, ResolutionError> {
        let mut found: Option<(String, String)> = None;
        for marker in &definition.markers {
            if !self.is_stereotype(&marker.name) {
                continue;
            }
            let Some(value) = marker.attributes.get_str("value") else {
                continue;
            };
            match &found {
                Some((first, _)) if first != value => {
                    return Err(ResolutionError::AmbiguousDeclaration {
                        source_type: definition.type_name.clone(),
                        marker: marker.name.clone(),
                        attribute: "value".to_string(),
                        first: first.clone(),
                        second: value.to_string(),
                    });
                }
                Some(_) => {}
                None => found = Some((value.to_string(), marker.name.clone())),
            }
        }
        Ok(found.map(|(name, _)| name))
    }
}

impl NameGenerator for MarkerNameGenerator {
    fn generate_name(
        &self,
        definition: &ComponentDefinition,
        _registry: &dyn DefinitionRegistry,
    ) -> Result<String, ResolutionError> {
        if let Some(name) = self.explicit_name(definition)? {
            return Ok(name);
        }
        if definition.type_name.is_empty() {
            return Err(ResolutionError::invalid_definition(
                definition.to_string(),
                "无法为没有类型名的定义生成名称",
            ));
        }
        Ok(decapitalize(&short_name_of(&definition.type_name)))
    }
}

/// 使用全限定类型名作为组件名称
#[derive(Debug, Default, Clone, Copy)]
pub struct FullyQualifiedNameGenerator;

impl NameGenerator for FullyQualifiedNameGenerator {
    fn generate_name(
        &self,
        definition: &ComponentDefinition,
        _registry: &dyn DefinitionRegistry,
    ) -> Result<String, ResolutionError> {
        if definition.type_name.is_empty() {
            return Err(ResolutionError::invalid_definition(
                definition.to_string(),
                "无法为没有类型名的定义生成名称",
            ));
        }
        Ok(definition.type_name.clone())
    }
}

/// 首字母小写；前两个字母均为大写时保持原样（如 `URLHandler`）
pub fn decapitalize(name: &str) -> String {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let second = chars.next();
    if first.is_uppercase() && second.map(char::is_uppercase).unwrap_or(false) {
        return name.to_string();
    }
    let mut result: String = first.to_lowercase().collect();
    result.push_str(&name[first.len_utf8()..]);
    result
}

//! 默认组件定义注册表

use di_abstractions::{ComponentDefinition, DefinitionRegistry};
use indexmap::IndexMap;
use infrastructure_common::ResolutionError;
use tracing::{debug, info};

/// 基于有序表的注册表实现
#[derive(Debug, Clone)]
pub struct DefaultDefinitionRegistry {
    definitions: IndexMap<String, ComponentDefinition>,
    /// 别名 -> 名称
    aliases: IndexMap<String, String>,
    allow_override: bool,
}

impl Default for DefaultDefinitionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DefaultDefinitionRegistry {
    /// 创建允许覆盖的注册表
    pub fn new() -> Self {
        Self {
            definitions: IndexMap::new(),
            aliases: IndexMap::new(),
            allow_override: true,
        }
    }

    pub fn with_allow_override(mut self, allow: bool) -> Self {
        self.allow_override = allow;
        self
    }

    pub fn set_allow_override(&mut self, allow: bool) {
        self.allow_override = allow;
    }

    /// 按注册顺序遍历定义
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ComponentDefinition)> {
        self.definitions.iter()
    }

    /// 把别名解析为规范名称
    pub fn canonical_name<'a>(&'a self, name: &'a str) -> &'a str {
        let mut current = name;
        while let Some(target) = self.aliases.get(current) {
            current = target;
        }
        current
    }

    fn alias_chain_reaches(&self, from: &str, target: &str) -> bool {
        let mut current = from;
        let mut steps = 0;
        while let Some(next) = self.aliases.get(current) {
            if next == target {
                return true;
            }
            current = next;
            steps += 1;
            if steps > self.aliases.len() {
                break;
            }
        }
        false
    }
}

impl DefinitionRegistry for DefaultDefinitionRegistry {
    fn register(
        &mut self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), ResolutionError> {
        if name.trim().is_empty() {
            return Err(ResolutionError::invalid_definition(name, "组件名称不能为空"));
        }
        if let Some(existing) = self.definitions.get(name) {
            if !self.allow_override {
                return Err(ResolutionError::naming_conflict(
                    name,
                    existing.to_string(),
                    definition.to_string(),
                    "注册表不允许覆盖同名定义",
                ));
            }
            info!("覆盖组件定义 '{}': {} -> {}", name, existing, definition);
            self.definitions.insert(name.to_string(), definition);
            return Ok(());
        }
        // 新定义占用同名别名时解除该别名
        self.aliases.shift_remove(name);
        debug!("注册组件定义 '{}': {}", name, definition);
        self.definitions.insert(name.to_string(), definition);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> Option<ComponentDefinition> {
        let removed = self.definitions.shift_remove(name)?;
        self.aliases.retain(|_, target| target != name);
        debug!("移除组件定义 '{}'", name);
        Some(removed)
    }

    fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    fn get(&self, name: &str) -> Option<&ComponentDefinition> {
        self.definitions.get(name)
    }

    fn get_mut(&mut self, name: &str) -> Option<&mut ComponentDefinition> {
        self.definitions.get_mut(name)
    }

    fn register_alias(&mut self, name: &str, alias: &str) -> Result<(), ResolutionError> {
        if alias == name {
            self.aliases.shift_remove(alias);
            return Ok(());
        }
        if let Some(existing) = self.aliases.get(alias) {
            if existing == name {
                return Ok(());
            }
            if !self.allow_override {
                return Err(ResolutionError::naming_conflict(
                    alias,
                    existing.clone(),
                    name,
                    "别名已指向其他组件",
                ));
            }
        }
        if self.definitions.contains_key(alias) && !self.allow_override {
            return Err(ResolutionError::naming_conflict(
                alias,
                alias,
                name,
                "别名与已注册的组件名称相同",
            ));
        }
        if self.alias_chain_reaches(name, alias) {
            return Err(ResolutionError::invalid_definition(
                alias,
                format!("别名 '{}' 与 '{}' 形成循环引用", alias, name),
            ));
        }
        debug!("注册别名 '{}' -> '{}'", alias, name);
        self.aliases.insert(alias.to_string(), name.to_string());
        Ok(())
    }

    fn aliases(&self, name: &str) -> Vec<String> {
        self.aliases
            .iter()
            .filter(|(_, target)| target.as_str() == name)
            .map(|(alias, _)| alias.clone())
            .collect()
    }

    fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    fn names(&self) -> Vec<String> {
        self.definitions.keys().cloned().collect()
    }

    fn len(&self) -> usize {
        self.definitions.len()
    }

    fn allows_override(&self) -> bool {
        self.allow_override
    }
}

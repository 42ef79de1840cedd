//! 组件定义注册表抽象接口

use crate::definition::ComponentDefinition;
use infrastructure_common::ResolutionError;

/// 组件定义注册表 trait
///
/// 配置解析在一次 `resolve()` 期间独占注册表。
pub trait DefinitionRegistry: Send {
    /// 注册定义，名称已存在且不允许覆盖时返回命名冲突
    fn register(
        &mut self,
        name: &str,
        definition: ComponentDefinition,
    ) -> Result<(), ResolutionError>;

    /// 移除定义及其别名
    fn remove(&mut self, name: &str) -> Option<ComponentDefinition>;

    /// 是否存在该名称的定义（不含别名）
    fn contains(&self, name: &str) -> bool;

    fn get(&self, name: &str) -> Option<&ComponentDefinition>;

    fn get_mut(&mut self, name: &str) -> Option<&mut ComponentDefinition>;

    /// 注册别名
    fn register_alias(&mut self, name: &str, alias: &str) -> Result<(), ResolutionError>;

    /// 名称的全部别名
    fn aliases(&self, name: &str) -> Vec<String>;

    /// 是否为已注册别名
    fn is_alias(&self, name: &str) -> bool;

    /// 按注册顺序返回全部名称
    fn names(&self) -> Vec<String>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 是否允许同名定义覆盖
    fn allows_override(&self) -> bool;

    /// 名称是否已被定义或别名占用
    fn is_name_in_use(&self, name: &str) -> bool {
        self.contains(name) || self.is_alias(name)
    }
}

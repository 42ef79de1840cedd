//! 组件定义

use infrastructure_common::markers::{DEPENDS_ON, DESCRIPTION, LAZY, PRIMARY, ROLE};
use infrastructure_common::Marker;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 组件角色，数值越大越偏向框架内部
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Application,
    Support,
    Infrastructure,
}

impl Role {
    /// 从标记属性值解析，兼容数字形式 0/1/2
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "application" | "0" => Some(Role::Application),
            "support" | "1" => Some(Role::Support),
            "infrastructure" | "2" => Some(Role::Infrastructure),
            _ => None,
        }
    }
}

/// 配置源模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigurationMode {
    /// 工厂方法调用需要被增强拦截
    Full,
    /// 普通组件上的工厂方法
    Lite,
}

/// 定义来源
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DefinitionOrigin {
    /// 外部直接注册
    #[default]
    External,
    /// 组件扫描发现
    Scanned,
    /// 被导入的配置源自身
    ConfigurationSource { source: String },
    /// 配置源上的工厂方法
    FactoryMethod {
        source: String,
        method: String,
        /// 非静态方法所依附的组件名
        factory_component: Option<String>,
        is_static: bool,
        /// 同一配置源存在同名重载
        #[serde(default)]
        non_unique: bool,
    },
    /// 注册器产生
    Registrar { registrar: String },
    /// 外部资源文件读取
    Resource { location: String },
}

impl DefinitionOrigin {
    /// 是否由配置解析过程产生
    pub fn is_configuration_derived(&self) -> bool {
        matches!(
            self,
            DefinitionOrigin::ConfigurationSource { .. } | DefinitionOrigin::FactoryMethod { .. }
        )
    }
}

/// 组件定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentDefinition {
    /// 组件类型名，工厂方法定义为其返回类型
    pub type_name: String,
    #[serde(default)]
    pub origin: DefinitionOrigin,
    /// 类型（或工厂方法）上直接声明的标记
    #[serde(default)]
    pub markers: Vec<Marker>,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub primary: bool,
    #[serde(default)]
    pub lazy_init: bool,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// 配置源候选检查的结果
    #[serde(default)]
    pub configuration_mode: Option<ConfigurationMode>,
    #[serde(default)]
    pub order: Option<i32>,
}

impl ComponentDefinition {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            origin: DefinitionOrigin::External,
            markers: Vec::new(),
            role: Role::Application,
            primary: false,
            lazy_init: false,
            depends_on: Vec::new(),
            description: None,
            configuration_mode: None,
            order: None,
        }
    }

    pub fn with_origin(mut self, origin: DefinitionOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn with_markers(mut self, markers: Vec<Marker>) -> Self {
        self.markers = markers;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// 应用通用定义标记：primary、lazy、depends-on、role、description
    pub fn apply_markers(&mut self, markers: &[Marker]) {
        for marker in markers {
            let attrs = &marker.attributes;
            match marker.name.as_str() {
                PRIMARY => self.primary = true,
                LAZY => self.lazy_init = attrs.get_bool("value", true),
                DEPENDS_ON => {
                    for name in attrs.get_list("value") {
                        if !self.depends_on.contains(&name) {
                            self.depends_on.push(name);
                        }
                    }
                }
                ROLE => {
                    let declared = attrs.get("value").map(|v| v.as_list().join(""));
                    if let Some(role) = declared.as_deref().and_then(Role::parse) {
                        self.role = role;
                    }
                }
                DESCRIPTION => {
                    if let Some(text) = attrs.get_str("value") {
                        self.description = Some(text.to_string());
                    }
                }
                _ => {}
            }
        }
    }

    /// 是否为工厂方法定义
    pub fn is_factory_method(&self) -> bool {
        matches!(self.origin, DefinitionOrigin::FactoryMethod { .. })
    }

    /// 工厂方法定义所在的配置源
    pub fn declaring_source(&self) -> Option<&str> {
        match &self.origin {
            DefinitionOrigin::FactoryMethod { source, .. } => Some(source),
            DefinitionOrigin::ConfigurationSource { source } => Some(source),
            _ => None,
        }
    }
}

impl fmt::Display for ComponentDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.origin {
            DefinitionOrigin::External => write!(f, "外部定义 [{}]", self.type_name),
            DefinitionOrigin::Scanned => write!(f, "扫描定义 [{}]", self.type_name),
            DefinitionOrigin::ConfigurationSource { source } => write!(f, "配置源 [{}]", source),
            DefinitionOrigin::FactoryMethod { source, method, .. } => {
                write!(f, "工厂方法 [{}::{}] -> {}", source, method, self.type_name)
            }
            DefinitionOrigin::Registrar { registrar } => {
                write!(f, "注册器定义 [{}] (来自 {})", self.type_name, registrar)
            }
            DefinitionOrigin::Resource { location } => {
                write!(f, "资源定义 [{}] (来自 {})", self.type_name, location)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_common_markers() {
        let mut definition = ComponentDefinition::new("app.Service");
        definition.apply_markers(&[
            Marker::new(PRIMARY),
            Marker::new(LAZY),
            Marker::new(DEPENDS_ON).with("value", vec!["a", "b"]),
            Marker::new(ROLE).with("value", "infrastructure"),
            Marker::new(DESCRIPTION).with("value", "核心服务"),
            Marker::new("app.Unrelated"),
        ]);
        assert!(definition.primary);
        assert!(definition.lazy_init);
        assert_eq!(definition.depends_on, vec!["a", "b"]);
        assert_eq!(definition.role, Role::Infrastructure);
        assert_eq!(definition.description.as_deref(), Some("核心服务"));
    }

    #[test]
    fn test_role_parse_and_ordering() {
        assert_eq!(Role::parse("2"), Some(Role::Infrastructure));
        assert_eq!(Role::parse("Support"), Some(Role::Support));
        assert!(Role::Infrastructure > Role::Application);
        assert_eq!(Role::parse("unknown"), None);
    }
}

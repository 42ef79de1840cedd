//! 属性解析抽象接口

use infrastructure_common::ConfigError;

/// 属性解析器 trait
///
/// 按属性源优先级查找属性，并解析 `${key:default}` 形式的占位符
pub trait PropertyResolver: Send + Sync {
    /// 获取属性的字符串值
    fn get_property(&self, key: &str) -> Option<String>;

    /// 检查属性是否存在
    fn contains_property(&self, key: &str) -> bool {
        self.get_property(key).is_some()
    }

    /// 获取属性，缺失时返回默认值
    fn get_property_or(&self, key: &str, default: &str) -> String {
        self.get_property(key).unwrap_or_else(|| default.to_string())
    }

    /// 解析占位符，无法解析的占位符原样保留
    fn resolve_placeholders(&self, text: &str) -> String;

    /// 解析占位符，无法解析时返回错误
    fn resolve_required_placeholders(&self, text: &str) -> Result<String, ConfigError>;
}

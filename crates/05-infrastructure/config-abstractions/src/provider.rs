//! 属性源抽象接口

use serde_json::Value;
use std::fmt::Debug;
use std::sync::Arc;

/// 属性源 trait
///
/// 一个具名的键值集合，键采用点分路径，例如 `app.datasource.url`
pub trait PropertySource: Debug + Send + Sync {
    /// 属性源名称
    fn name(&self) -> &str;

    /// 获取属性值
    fn get_property(&self, key: &str) -> Option<Value>;

    /// 检查属性是否存在
    fn contains_property(&self, key: &str) -> bool {
        self.get_property(key).is_some()
    }

    /// 获取所有属性键
    fn property_names(&self) -> Vec<String>;

    /// 组合属性源返回其成员，按优先级从高到低
    fn nested_sources(&self) -> Option<Vec<Arc<dyn PropertySource>>> {
        None
    }
}

/// 将属性值转换为字符串形式
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        Value::Array(items) => items
            .iter()
            .map(value_to_string)
            .collect::<Vec<_>>()
            .join(","),
        other => other.to_string(),
    }
}

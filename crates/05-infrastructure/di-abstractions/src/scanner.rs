//! 组件扫描器抽象接口
//!
//! 提供按包路径发现候选组件类型的能力

use infrastructure_common::{MarkerIndex, MetadataView, ResolutionError};
use std::sync::Arc;

/// 类型过滤器
///
/// 文本形式为 `kind:pattern`，kind 取 `marker`、`assignable` 或 `regex`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeFilter {
    /// 带有指定标记（含元标记）
    Marker(String),
    /// 可赋值给指定类型（自身、父类型链或接口）
    AssignableTo(String),
    /// 全限定名匹配正则表达式
    Regex(String),
}

impl TypeFilter {
    pub fn parse(text: &str) -> Option<Self> {
        let (kind, pattern) = text.split_once(':')?;
        let pattern = pattern.trim().to_string();
        if pattern.is_empty() {
            return None;
        }
        match kind.trim() {
            "marker" | "annotation" => Some(TypeFilter::Marker(pattern)),
            "assignable" => Some(TypeFilter::AssignableTo(pattern)),
            "regex" => Some(TypeFilter::Regex(pattern)),
            _ => None,
        }
    }
}

/// 组件扫描指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanDirective {
    /// 声明扫描的类型
    pub declaring_type: String,
    /// 已解析占位符的基础包
    pub base_packages: Vec<String>,
    pub include_filters: Vec<TypeFilter>,
    pub exclude_filters: Vec<TypeFilter>,
    /// 是否以构造型标记作为默认包含条件
    pub use_default_filters: bool,
    /// 扫描到的定义是否延迟初始化
    pub lazy_init: bool,
}

impl ScanDirective {
    pub fn new(declaring_type: impl Into<String>, base_packages: Vec<String>) -> Self {
        Self {
            declaring_type: declaring_type.into(),
            base_packages,
            include_filters: Vec::new(),
            exclude_filters: Vec::new(),
            use_default_filters: true,
            lazy_init: false,
        }
    }
}

/// 组件扫描器 trait
pub trait ComponentScanner: Send + Sync {
    /// 返回满足扫描指令的候选类型，按发现顺序
    fn scan(
        &self,
        directive: &ScanDirective,
        markers: &MarkerIndex,
    ) -> Result<Vec<Arc<dyn MetadataView>>, ResolutionError>;
}

//! 错误类型定义

use crate::problems::ProblemReport;
use thiserror::Error;

/// 配置错误类型
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("配置文件不存在: {path}")]
    FileNotFound { path: String },

    #[error("配置文件读取失败: {source}")]
    FileReadError {
        #[from]
        source: std::io::Error,
    },

    #[error("配置解析失败: {path}, 原因: {source}")]
    ParseError {
        path: String,
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("不支持的配置文件格式: {path}")]
    UnsupportedFormat { path: String },

    #[error("无法解析占位符 '{placeholder}'，原始值: \"{value}\"")]
    UnresolvablePlaceholder { placeholder: String, value: String },

    #[error("检测到循环占位符引用: {placeholder}")]
    CircularPlaceholder { placeholder: String },

    #[error("属性源不存在: {name}")]
    PropertySourceNotFound { name: String },

    #[error("配置键不存在: {key}")]
    KeyNotFound { key: String },
}

/// 元数据读取错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("无法加载类型元数据: {type_name}")]
    TypeNotFound { type_name: String },

    #[error("类型元数据无效: {type_name}, 原因: {message}")]
    InvalidMetadata { type_name: String, message: String },
}

/// 配置解析错误类型
///
/// 命名冲突与声明歧义在检测点立即终止解析；结构性问题汇总在
/// [`ProblemReport`] 中，于解析结束时作为 [`ResolutionError::Problems`] 一次性抛出。
#[derive(Error, Debug)]
pub enum ResolutionError {
    #[error("组件名称冲突: '{name}' (已存在: {existing}, 新定义: {candidate}) - {message}")]
    NamingConflict {
        name: String,
        existing: String,
        candidate: String,
        message: String,
    },

    #[error("声明歧义: {source_type} 的 {marker}.{attribute} 取值不一致: '{first}' / '{second}'")]
    AmbiguousDeclaration {
        source_type: String,
        marker: String,
        attribute: String,
        first: String,
        second: String,
    },

    #[error("资源加载失败: {location} (声明于 {source_type}), 原因: {source}")]
    ResourceLoad {
        location: String,
        source_type: String,
        #[source]
        source: ConfigError,
    },

    #[error("元数据错误: {source}")]
    Metadata {
        #[from]
        source: MetadataError,
    },

    #[error("配置错误: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("组件定义无效: {name}, 原因: {message}")]
    InvalidDefinition { name: String, message: String },

    #[error("组件扫描声明无效: {source_type}, 原因: {message}")]
    InvalidScanDirective { source_type: String, message: String },

    #[error("注册器执行失败: {registrar}, 原因: {message}")]
    Registrar { registrar: String, message: String },

    #[error("配置解析在 {rounds} 轮后仍未收敛")]
    FixpointNotReached { rounds: usize },

    #[error("配置解析发现 {} 个问题:\n{report}", .report.error_count())]
    Problems { report: ProblemReport },
}

impl ResolutionError {
    /// 创建命名冲突错误
    pub fn naming_conflict(
        name: impl Into<String>,
        existing: impl Into<String>,
        candidate: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::NamingConflict {
            name: name.into(),
            existing: existing.into(),
            candidate: candidate.into(),
            message: message.into(),
        }
    }

    /// 创建定义无效错误
    pub fn invalid_definition(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            name: name.into(),
            message: message.into(),
        }
    }
}

/// 结果类型别名
pub type ConfigResult<T> = Result<T, ConfigError>;
pub type MetadataResult<T> = Result<T, MetadataError>;
pub type ResolutionResult<T> = Result<T, ResolutionError>;

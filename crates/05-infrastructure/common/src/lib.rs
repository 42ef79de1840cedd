//! # Infrastructure Common
//!
//! 配置解析基础设施的公共类型与工具。
//!
//! ## 核心组件
//!
//! - [`MetadataView`] - 类型元数据统一视图
//! - [`TypeLoader`] - 类型元数据加载器
//! - [`MarkerIndex`] - 元标记闭包缓存
//! - [`ResolutionError`] - 配置解析错误
//! - [`ProblemReport`] - 结构性问题报告

pub mod errors;
pub mod markers;
pub mod metadata;
pub mod problems;

pub use errors::*;
pub use markers::MarkerIndex;
pub use metadata::*;
pub use problems::*;

//! # Configuration Abstractions
//!
//! 配置抽象层，定义属性源与属性解析的核心接口。
//!
//! ## 核心接口
//!
//! - [`PropertySource`] - 属性源接口
//! - [`PropertyResolver`] - 属性解析接口

pub mod provider;
pub mod resolver;

pub use provider::*;
pub use resolver::*;

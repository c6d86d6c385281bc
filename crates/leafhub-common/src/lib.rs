//! Leaf Hub Common - 跨模块共享的数据模型与错误类型
//!
//! 该模块提供 spec-sync 各组件共享的资源包模型、资源访问接口和统一的错误类型。

pub mod models;
pub mod error;

/// 重新导出常用类型，方便使用
pub use error::Error;
pub use error::Result;
pub use models::bundle::*;

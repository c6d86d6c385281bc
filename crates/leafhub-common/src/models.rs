//! 数据模型模块
//!
//! 该模块定义了从中心集群接收的资源包及其中资源对象的数据模型。

pub mod bundle;

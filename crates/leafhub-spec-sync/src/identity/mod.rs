//! 身份管理模块
//!
//! 该模块负责从对象注解中解析操作者身份，并为每个身份维护一个模拟该用户的集群客户端。

mod identity_resolver;
mod impersonation_manager;

pub use identity_resolver::resolve_identity;
pub use impersonation_manager::ImpersonationManager;

//! 数据库查询网关公共模块
//!
//! 提供各服务共享的基础设施：
//! - 配置加载
//! - 错误类型与 HTTP 错误响应
//! - 统一响应包装
//! - 共享数据模型
//! - 中间件与工具函数

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;

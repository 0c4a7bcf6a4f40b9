// 电影目录后端库
//
// 本库提供电影目录 JSON API 的核心功能，包括：
// - API 路由
// - 数据库操作（全文搜索、分页、乐观并发）
// - 进程生命周期与优雅关闭
// - 搜索历史的后台记录与清理

pub mod api;
pub mod config;
pub mod database;
pub mod lifecycle;
pub mod models;
pub mod services;

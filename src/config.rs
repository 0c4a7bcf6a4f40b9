use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::models::SortField;

/// `MAX_PAGE_SIZE` 允许的最大值
pub const PAGE_SIZE_CEILING: i64 = 1_000;

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} has an invalid value '{value}': {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// 数据库配置
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub query_timeout: Duration,
}

/// 列表查询配置，注入过滤参数验证器
#[derive(Debug, Clone)]
pub struct QueryConfig {
    pub sort_safelist: Vec<SortField>,
    pub default_page_size: i64,
    pub max_page_size: i64,
}

/// 应用配置，从环境变量加载
///
/// | Env Var                          | Default                             |
/// |----------------------------------|-------------------------------------|
/// | `HOST`                           | `0.0.0.0`                           |
/// | `PORT`                           | `4000`                              |
/// | `APP_ENV`                        | `development`                       |
/// | `DATABASE_URL`                   | `sqlite:./movies.db?mode=rwc`       |
/// | `DB_MAX_CONNECTIONS`             | `5`                                 |
/// | `DB_QUERY_TIMEOUT_SECS`          | `3`                                 |
/// | `SHUTDOWN_GRACE_SECS`            | `5`                                 |
/// | `DEFAULT_PAGE_SIZE`              | `20`                                |
/// | `MAX_PAGE_SIZE`                  | `100`                               |
/// | `SORT_SAFELIST`                  | `id,title,year,runtime,relevance`   |
/// | `SEARCH_HISTORY_RETENTION_DAYS`  | `30`                                |
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub environment: String,
    pub database: DatabaseConfig,
    pub query: QueryConfig,
    pub shutdown_grace_period: Duration,
    pub search_history_retention: chrono::Duration,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 从任意键值来源加载（测试中不必修改进程环境变量）
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port: u16 = parse_or(&lookup, "PORT", 4000)?;
        let environment = lookup("APP_ENV").unwrap_or_else(|| "development".to_string());

        let database = DatabaseConfig {
            url: lookup("DATABASE_URL")
                .unwrap_or_else(|| "sqlite:./movies.db?mode=rwc".to_string()),
            max_connections: parse_or(&lookup, "DB_MAX_CONNECTIONS", 5)?,
            query_timeout: Duration::from_secs(parse_or(&lookup, "DB_QUERY_TIMEOUT_SECS", 3)?),
        };

        let default_page_size: i64 = parse_or(&lookup, "DEFAULT_PAGE_SIZE", 20)?;
        let max_page_size: i64 = parse_or(&lookup, "MAX_PAGE_SIZE", 100)?;
        if max_page_size <= 0 || max_page_size > PAGE_SIZE_CEILING {
            return Err(invalid(
                "MAX_PAGE_SIZE",
                max_page_size,
                format!("must be between 1 and {}", PAGE_SIZE_CEILING),
            ));
        }
        if default_page_size <= 0 || default_page_size > max_page_size {
            return Err(invalid(
                "DEFAULT_PAGE_SIZE",
                default_page_size,
                "must be between 1 and MAX_PAGE_SIZE",
            ));
        }

        let sort_safelist = match lookup("SORT_SAFELIST") {
            Some(raw) => parse_safelist(&raw)?,
            None => SortField::ALL.to_vec(),
        };

        let shutdown_grace_period =
            Duration::from_secs(parse_or(&lookup, "SHUTDOWN_GRACE_SECS", 5)?);
        let retention_days: i64 = parse_or(&lookup, "SEARCH_HISTORY_RETENTION_DAYS", 30)?;
        let search_history_retention = chrono::Duration::try_days(retention_days)
            .filter(|_| retention_days >= 0)
            .ok_or_else(|| {
                invalid(
                    "SEARCH_HISTORY_RETENTION_DAYS",
                    retention_days,
                    "must be a non-negative number of days within range",
                )
            })?;

        Ok(Self {
            host,
            port,
            environment,
            database,
            query: QueryConfig {
                sort_safelist,
                default_page_size,
                max_page_size,
            },
            shutdown_grace_period,
            search_history_retention,
        })
    }
}

fn parse_or<T, F>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(key, raw, e.to_string())),
        None => Ok(default),
    }
}

/// 逗号分隔的排序字段名，未知字段在启动时报错
fn parse_safelist(raw: &str) -> Result<Vec<SortField>, ConfigError> {
    let mut fields = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        let field = name
            .parse::<SortField>()
            .map_err(|reason| invalid("SORT_SAFELIST", raw, reason))?;
        if !fields.contains(&field) {
            fields.push(field);
        }
    }

    if fields.is_empty() {
        return Err(invalid("SORT_SAFELIST", raw, "must name at least one field"));
    }
    Ok(fields)
}

fn invalid(key: &'static str, value: impl ToString, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        value: value.to_string(),
        reason: reason.into(),
    }
}

// ==========================================
// 产线排产核心 - 日志初始化
// ==========================================
// 过滤: RUST_LOG（默认 info），例如
//   RUST_LOG=production_aps::engine::scheduler=debug
// 格式: PRODUCTION_APS_LOG_FORMAT=json 时输出 JSON（供日志采集），否则为文本
// 输出: stderr（stdout 留给命令行的 JSON 结果）
// ==========================================

use std::str::FromStr;
use tracing_subscriber::{fmt, EnvFilter};

/// 日志格式环境变量
pub const LOG_FORMAT_ENV: &str = "PRODUCTION_APS_LOG_FORMAT";

/// 日志输出格式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("未知日志格式: {}", other)),
        }
    }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 按环境变量选择格式并初始化；格式非法时退回文本格式
///
/// ```no_run
/// production_aps::logging::init();
/// ```
pub fn init() {
    let format = std::env::var(LOG_FORMAT_ENV)
        .ok()
        .and_then(|raw| raw.parse::<LogFormat>().ok())
        .unwrap_or_default();
    init_with(format);
}

/// 以指定格式初始化（重复调用无副作用）
pub fn init_with(format: LogFormat) {
    match format {
        LogFormat::Text => init_text(),
        LogFormat::Json => init_json(),
    }
}

fn init_text() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .with_line_number(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// JSON 格式，附带当前 span（订单ID、批次等 instrument 字段）
pub fn init_json() {
    let _ = fmt()
        .json()
        .with_env_filter(env_filter())
        .with_current_span(true)
        .with_span_list(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// 测试日志: debug 级别，走 libtest 捕获
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parsing() {
        assert_eq!("JSON".parse::<LogFormat>(), Ok(LogFormat::Json));
        assert_eq!(" pretty ".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert_eq!("".parse::<LogFormat>(), Ok(LogFormat::Text));
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_repeated_init_is_harmless() {
        init_test();
        init_with(LogFormat::Text);
    }
}

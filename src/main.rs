// ==========================================
// 产线排产核心 - 命令行入口
// ==========================================
// 用法:
//   production-aps [--db <path>] <command> [args...]
//
// 命令:
//   init                                         建库建表
//   import <kind> <csv>                          导入参考数据
//   create-order <product> <qty> [planned_date] [sales_line_id]
//   reserve <order_id>                           重新评估物料预留
//   arrival <raw_material_id>                    到料重评
//   receive-lot <raw_material_id> <qty> [expiry] [lot_id]
//   quarantine-lot <lot_id>                      批次质量冻结
//   schedule                                     约束排产
//   replan <simulated_date> [lookahead_days]     产能日历重排
//   finish <order_id>                            订单完工结算
//   cancel <order_id>                            取消订单
//   wo-start|wo-complete|wo-cancel <wo_id>
//   wo-output <wo_id> <gross>
//   wo-waste <wo_id> <qty> [reason]
//   config-set <key> <value>
//   config-show
// ==========================================

use anyhow::{anyhow, bail, Context, Result};
use chrono::NaiveDate;
use production_aps::config::ConfigManager;
use production_aps::db::{read_schema_version, Database};
use production_aps::engine::NewProductionOrder;
use production_aps::importer::{ImportKind, ReferenceImporter};
use production_aps::{logging, PlanningApi};
use serde::Serialize;
use std::path::PathBuf;

const DB_PATH_ENV: &str = "PRODUCTION_APS_DB_PATH";
const DEFAULT_LOOKAHEAD_DAYS: i64 = 14;

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let db_path = take_db_path(&mut args)?;
    let mut args = args.into_iter();
    let command = args.next().ok_or_else(|| anyhow!("缺少命令，参见文件头部用法说明"))?;
    let rest: Vec<String> = args.collect();

    tracing::info!(version = production_aps::VERSION, db = %db_path, command = %command, "{}", production_aps::APP_NAME);

    let db = Database::open(&db_path).with_context(|| format!("无法打开数据库: {}", db_path))?;
    let now = chrono::Local::now().naive_local();

    match command.as_str() {
        "init" => {
            let version = {
                let conn = db.get_conn()?;
                read_schema_version(&conn)?
            };
            print_json(&serde_json::json!({ "db_path": db_path, "schema_version": version }))
        }
        "import" => {
            let kind: ImportKind = arg(&rest, 0, "kind")?.parse()?;
            let path = PathBuf::from(arg(&rest, 1, "csv")?);
            let summary = ReferenceImporter::new(db).import_file(kind, &path, now)?;
            print_json(&summary)
        }
        "config-set" => {
            let manager = ConfigManager::from_connection(db.shared_connection())?;
            let key = arg(&rest, 0, "key")?;
            let value = arg(&rest, 1, "value")?;
            manager.set_value(key, value)?;
            println!("{}", manager.get_config_snapshot()?);
            Ok(())
        }
        "config-show" => {
            let manager = ConfigManager::from_connection(db.shared_connection())?;
            println!("{}", manager.get_config_snapshot()?);
            Ok(())
        }
        _ => run_planning_command(PlanningApi::new(db)?, &command, &rest).await,
    }
}

async fn run_planning_command(api: PlanningApi, command: &str, rest: &[String]) -> Result<()> {
    match command {
        "create-order" => {
            let request = NewProductionOrder {
                order_id: None,
                product_id: arg(rest, 0, "product_id")?.to_string(),
                quantity: parse_arg(rest, 1, "quantity")?,
                planned_date: rest.get(2).map(|s| parse_date(s)).transpose()?,
                sales_order_line_id: rest.get(3).cloned(),
            };
            print_json(&api.create_production_order(request)?)
        }
        "reserve" => print_json(&api.reserve_materials_for_order(arg(rest, 0, "order_id")?)?),
        "arrival" => print_json(&api.reevaluate_on_material_arrival(arg(rest, 0, "raw_material_id")?)?),
        "receive-lot" => {
            let material = arg(rest, 0, "raw_material_id")?;
            let quantity: f64 = parse_arg(rest, 1, "quantity")?;
            let expiry = rest.get(2).map(|s| parse_date(s)).transpose()?;
            print_json(&api.receive_lot(rest.get(3).cloned(), material, quantity, expiry)?)
        }
        "quarantine-lot" => print_json(&api.quarantine_lot(arg(rest, 0, "lot_id")?)?),
        "schedule" => print_json(&api.schedule_pending_orders().await?),
        "replan" => {
            let simulated = parse_date(arg(rest, 0, "simulated_date")?)?;
            let lookahead = match rest.get(1) {
                Some(v) => v.parse().with_context(|| format!("lookahead_days 格式错误: {}", v))?,
                None => DEFAULT_LOOKAHEAD_DAYS,
            };
            print_json(&api.replan_active_orders(simulated, lookahead).await?)
        }
        "finish" => print_json(&api.finish_production_order(arg(rest, 0, "order_id")?)?),
        "cancel" => print_json(&api.cancel_production_order(arg(rest, 0, "order_id")?)?),
        "wo-start" => print_json(&api.start_work_order(arg(rest, 0, "work_order_id")?)?),
        "wo-output" => print_json(&api.record_gross_output(
            arg(rest, 0, "work_order_id")?,
            parse_arg(rest, 1, "gross_output")?,
        )?),
        "wo-waste" => print_json(&api.record_waste(
            arg(rest, 0, "work_order_id")?,
            parse_arg(rest, 1, "quantity")?,
            rest.get(2).cloned(),
        )?),
        "wo-complete" => print_json(&api.complete_work_order(arg(rest, 0, "work_order_id")?)?),
        "wo-cancel" => print_json(&api.cancel_work_order(arg(rest, 0, "work_order_id")?)?),
        other => bail!("未知命令: {}", other),
    }
}

/// 解析 `--db <path>`，其次环境变量，最后用户数据目录
fn take_db_path(args: &mut Vec<String>) -> Result<String> {
    if let Some(pos) = args.iter().position(|a| a == "--db") {
        if pos + 1 >= args.len() {
            bail!("--db 缺少路径参数");
        }
        let path = args.remove(pos + 1);
        args.remove(pos);
        return Ok(path);
    }
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return Ok(trimmed.to_string());
        }
    }
    Ok(default_db_path())
}

fn default_db_path() -> String {
    let mut path = PathBuf::from("./production_aps.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("production-aps");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("production_aps.db");
        }
    }
    path.to_string_lossy().to_string()
}

fn arg<'a>(rest: &'a [String], idx: usize, name: &str) -> Result<&'a str> {
    rest.get(idx)
        .map(|s| s.as_str())
        .ok_or_else(|| anyhow!("缺少参数: {}", name))
}

fn parse_arg<T>(rest: &[String], idx: usize, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw = arg(rest, idx, name)?;
    raw.parse::<T>()
        .with_context(|| format!("参数 {} 格式错误: {}", name, raw))
}

fn parse_date(raw: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").with_context(|| format!("日期格式错误(YYYY-MM-DD): {}", raw))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

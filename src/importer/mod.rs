// ==========================================
// 产线排产核心 - 导入层
// ==========================================
// 职责: 外部参考数据导入（产线/产能/供应商/原料/配方/期初批次/销售订单）
// 支持: CSV
// ==========================================

pub mod error;
pub mod file_parser;
pub mod reference_importer;

// 重导出核心类型
pub use error::{ImportError, ImportResult};
pub use file_parser::{CsvParser, RawRow};
pub use reference_importer::{ImportKind, ImportSummary, ReferenceImporter, RowViolation};

// ==========================================
// 产线排产核心 - CSV 文件解析
// ==========================================
// 输出: 每行一个 表头 → 单元格 的映射（值已 trim）
// ==========================================

use crate::importer::error::{ImportError, ImportResult};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// 原始行（行号从 2 开始，与表格软件一致）
#[derive(Debug, Clone, PartialEq)]
pub struct RawRow {
    pub row_number: usize,
    pub cells: HashMap<String, String>,
}

impl RawRow {
    /// 取非空单元格
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells
            .get(column)
            .map(|v| v.as_str())
            .filter(|v| !v.is_empty())
    }
}

pub struct CsvParser;

impl CsvParser {
    /// 解析 CSV 文件
    pub fn parse_file(file_path: &Path) -> ImportResult<Vec<RawRow>> {
        if !file_path.exists() {
            return Err(ImportError::FileNotFound(file_path.display().to_string()));
        }
        if let Some(ext) = file_path.extension() {
            if !ext.eq_ignore_ascii_case("csv") {
                return Err(ImportError::UnsupportedFormat(ext.to_string_lossy().to_string()));
            }
        }
        Self::parse_reader(File::open(file_path)?)
    }

    /// 解析任意输入流
    pub fn parse_reader<R: Read>(input: R) -> ImportResult<Vec<RawRow>> {
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .trim(csv::Trim::All)
            .from_reader(input);

        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim().to_ascii_lowercase())
            .collect();

        let mut rows = Vec::new();
        for (idx, result) in reader.records().enumerate() {
            let record = result?;
            let cells: HashMap<String, String> = headers
                .iter()
                .cloned()
                .zip(record.iter().map(|v| v.to_string()))
                .collect();

            // 跳过完全空白的行
            if cells.values().all(|v| v.is_empty()) {
                continue;
            }
            rows.push(RawRow {
                row_number: idx + 2,
                cells,
            });
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reader_normalises_headers_and_skips_blank_rows() {
        let data = "Line_ID , name\nL1, 一号线\n,\nL2,二号线\n";
        let rows = CsvParser::parse_reader(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("line_id"), Some("L1"));
        assert_eq!(rows[0].get("name"), Some("一号线"));
        assert_eq!(rows[1].row_number, 4);
    }

    #[test]
    fn test_rejects_non_csv_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lines.xlsx");
        std::fs::write(&path, "line_id\nL1\n").unwrap();
        assert!(matches!(
            CsvParser::parse_file(&path),
            Err(ImportError::UnsupportedFormat(_))
        ));
    }
}

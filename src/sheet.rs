//! Spreadsheet boundary.
//!
//! Everything downstream of the export artifact works on a [`Sheet`]: one
//! header row plus string cells. Reading goes through calamine, writing
//! through rust_xlsxwriter; nothing else in the crate touches xlsx
//! internals.

use std::path::Path;

use calamine::{Data, Reader, Xlsx, open_workbook};
use rust_xlsxwriter::Workbook;

use crate::error::{AppError, Result};

/// In-memory table: header names plus rows of string cells.
///
/// Every row has exactly `header.len()` cells.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sheet {
    pub header: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn new(header: Vec<String>) -> Self {
        Self {
            header,
            rows: Vec::new(),
        }
    }

    /// Index of a column by header name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read an xlsx file into a [`Sheet`].
///
/// `sheet_name: None` reads the first worksheet, which is what the portal's
/// export artifact needs since its sheet name is not under our control. The
/// first non-empty row becomes the header; rows are padded to header width.
pub fn read_xlsx(path: &Path, sheet_name: Option<&str>) -> Result<Sheet> {
    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let name = match sheet_name {
        Some(name) => name.to_string(),
        None => workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| AppError::data(format!("{} contains no worksheets", path.display())))?,
    };
    let range = workbook.worksheet_range(&name)?;

    let mut rows_iter = range.rows();
    let header: Vec<String> = loop {
        match rows_iter.next() {
            Some(row) if !row_is_empty(row) => break row.iter().map(cell_to_string).collect(),
            Some(_) => continue,
            None => return Ok(Sheet::default()),
        }
    };

    let width = header.len();
    let rows = rows_iter
        .filter(|row| !row_is_empty(row))
        .map(|row| {
            let mut cells: Vec<String> = row.iter().map(cell_to_string).collect();
            cells.resize(width, String::new());
            cells
        })
        .collect();

    Ok(Sheet { header, rows })
}

/// Write a [`Sheet`] to an xlsx file, creating parent directories.
pub fn write_xlsx(path: &Path, sheet_name: &str, sheet: &Sheet) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    worksheet.set_name(sheet_name)?;

    for (col, name) in sheet.header.iter().enumerate() {
        worksheet.write_string(0, col as u16, name)?;
    }
    for (row_index, row) in sheet.rows.iter().enumerate() {
        for (col, cell) in row.iter().enumerate() {
            if !cell.is_empty() {
                worksheet.write_string(row_index as u32 + 1, col as u16, cell)?;
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

fn row_is_empty(row: &[Data]) -> bool {
    row.iter()
        .all(|cell| matches!(cell, Data::Empty) || cell.to_string().trim().is_empty())
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample_sheet() -> Sheet {
        Sheet {
            header: vec!["委托客户".to_string(), "实际订舱客户".to_string(), "箱量".to_string()],
            rows: vec![
                vec!["客户甲".to_string(), "A".to_string(), "3".to_string()],
                vec!["客户乙".to_string(), "B".to_string(), String::new()],
            ],
        }
    }

    #[test]
    fn write_then_read_preserves_cells() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.xlsx");
        write_xlsx(&path, "data", &sample_sheet()).unwrap();

        let read = read_xlsx(&path, Some("data")).unwrap();
        assert_eq!(read, sample_sheet());
    }

    #[test]
    fn reads_first_sheet_when_unnamed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.xlsx");
        write_xlsx(&path, "任意表名", &sample_sheet()).unwrap();

        let read = read_xlsx(&path, None).unwrap();
        assert_eq!(read.header, sample_sheet().header);
    }

    #[test]
    fn numeric_cells_read_without_float_suffix() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nums.xlsx");

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "qty").unwrap();
        worksheet.write_number(1, 0, 1.0).unwrap();
        worksheet.write_number(2, 0, 2.5).unwrap();
        workbook.save(&path).unwrap();

        let read = read_xlsx(&path, None).unwrap();
        assert_eq!(read.rows[0][0], "1");
        assert_eq!(read.rows[1][0], "2.5");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(read_xlsx(&dir.path().join("absent.xlsx"), None).is_err());
    }

    #[test]
    fn column_index_finds_headers() {
        let sheet = sample_sheet();
        assert_eq!(sheet.column_index("实际订舱客户"), Some(1));
        assert_eq!(sheet.column_index("不存在"), None);
    }
}

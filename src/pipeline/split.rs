//! Split the export spreadsheet into one file per booking partner.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::error::{AppError, Result};
use crate::models::ProcessingConfig;
use crate::sheet::{self, Sheet};

/// Replace characters that are unsafe in filenames, then trim.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

/// Split `input_path` into one spreadsheet per partition value.
///
/// Rows are first filtered on the consignor column when a filter value is
/// given, then rows carrying the excluded partition value are dropped. The
/// remainder is grouped by the partition column in first-seen order; groups
/// with a blank name are skipped. Each group is written under the output
/// directory, merging with an existing file of the same name when configured
/// and deduplicating on the key columns (the whole row when none are set).
///
/// Returns `(partition value, output path)` pairs in write order.
pub fn split_sheet(
    input_path: &Path,
    config: &ProcessingConfig,
    consignor: Option<&str>,
) -> Result<Vec<(String, PathBuf)>> {
    if !input_path.exists() {
        return Err(AppError::data(format!(
            "input spreadsheet not found: {}",
            input_path.display()
        )));
    }
    let input = sheet::read_xlsx(input_path, None)?;

    let mut rows: Vec<&Vec<String>> = input.rows.iter().collect();

    if let Some(value) = consignor {
        let column = require_column(&input, &config.consignor_field)?;
        rows.retain(|row| cell(row, column) == value);
    }

    let partition_column = require_column(&input, &config.partition_field)?;

    if !config.exclude_value.is_empty() {
        rows.retain(|row| cell(row, partition_column) != config.exclude_value);
    }

    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Vec<String>>> = HashMap::new();
    let mut skipped = 0usize;
    for row in rows {
        let partition = cell(row, partition_column).to_string();
        if partition.trim().is_empty() {
            skipped += 1;
            continue;
        }
        if !groups.contains_key(&partition) {
            order.push(partition.clone());
        }
        groups.entry(partition).or_default().push(row.clone());
    }
    if skipped > 0 {
        log::warn!(
            "Skipped {skipped} rows with an empty {} value",
            config.partition_field
        );
    }

    let output_root = Path::new(&config.output_dir);
    let mut outputs = Vec::new();
    for partition in order {
        let group = groups.remove(&partition).unwrap_or_default();
        let file_name = config
            .output_template
            .replace("{partition}", &sanitize_filename(&partition));
        let path = output_root.join(file_name);

        let fresh = Sheet {
            header: input.header.clone(),
            rows: group,
        };
        let merged = if config.merge_existing && path.exists() {
            merge_with_existing(&path, &config.sheet_name, fresh, &config.dedup_keys)?
        } else {
            dedup_rows(fresh, &config.dedup_keys)?
        };
        sheet::write_xlsx(&path, &config.sheet_name, &merged)?;
        log::info!(
            "Partition {partition}: {} rows -> {}",
            merged.rows.len(),
            path.display()
        );
        outputs.push((partition, path));
    }
    Ok(outputs)
}

fn merge_with_existing(
    path: &Path,
    sheet_name: &str,
    new: Sheet,
    dedup_keys: &[String],
) -> Result<Sheet> {
    let existing = sheet::read_xlsx(path, Some(sheet_name))?;
    if existing.header != new.header {
        log::warn!(
            "Header changed in {}; replacing instead of merging",
            path.display()
        );
        return dedup_rows(new, dedup_keys);
    }
    let mut combined = existing;
    combined.rows.extend(new.rows);
    dedup_rows(combined, dedup_keys)
}

/// Drop duplicate rows, keeping the first occurrence. Earlier rows win, so
/// during a merge the rows already on disk survive over refetched copies.
fn dedup_rows(mut sheet: Sheet, dedup_keys: &[String]) -> Result<Sheet> {
    let key_columns: Vec<usize> = if dedup_keys.is_empty() {
        (0..sheet.header.len()).collect()
    } else {
        dedup_keys
            .iter()
            .map(|name| {
                sheet
                    .column_index(name)
                    .ok_or_else(|| AppError::data(format!("missing dedup column: {name}")))
            })
            .collect::<Result<_>>()?
    };
    let mut seen: HashSet<Vec<String>> = HashSet::new();
    sheet.rows.retain(|row| {
        let key: Vec<String> = key_columns
            .iter()
            .map(|column| cell(row, *column).to_string())
            .collect();
        seen.insert(key)
    });
    Ok(sheet)
}

fn require_column(sheet: &Sheet, name: &str) -> Result<usize> {
    sheet
        .column_index(name)
        .ok_or_else(|| AppError::data(format!("missing column: {name}")))
}

fn cell(row: &[String], column: usize) -> &str {
    row.get(column).map(String::as_str).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn config_in(dir: &Path) -> ProcessingConfig {
        ProcessingConfig {
            output_dir: dir.join("out").to_string_lossy().into_owned(),
            ..ProcessingConfig::default()
        }
    }

    fn write_input(dir: &Path, rows: &[(&str, &str, &str)]) -> PathBuf {
        let sheet = Sheet {
            header: vec!["委托客户".into(), "实际订舱客户".into(), "箱号".into()],
            rows: rows
                .iter()
                .map(|(a, b, c)| vec![a.to_string(), b.to_string(), c.to_string()])
                .collect(),
        };
        let path = dir.join("input.xlsx");
        sheet::write_xlsx(&path, "export", &sheet).unwrap();
        path
    }

    #[test]
    fn sanitize_replaces_unsafe_characters() {
        assert_eq!(sanitize_filename("A/B镇"), "A_B镇");
        assert_eq!(sanitize_filename(r#" a\b:c*d?e"f<g>h|i "#), "a_b_c_d_e_f_g_h_i");
        assert_eq!(sanitize_filename("plain"), "plain");
    }

    #[test]
    fn splits_by_partition_with_consignor_filter() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            dir.path(),
            &[
                ("目标客户", "A/B", "X1"),
                ("目标客户", "C", "X2"),
                ("其他客户", "D", "X3"),
                ("目标客户", "A/B", "X4"),
            ],
        );
        let config = config_in(dir.path());
        let outputs = split_sheet(&input, &config, Some("目标客户")).unwrap();

        let names: Vec<&str> = outputs.iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["A/B", "C"]);
        assert!(outputs[0].1.ends_with("A_B.xlsx"));

        let ab = sheet::read_xlsx(&outputs[0].1, Some("data")).unwrap();
        assert_eq!(ab.rows.len(), 2);
        assert_eq!(ab.rows[0][2], "X1");
        let c = sheet::read_xlsx(&outputs[1].1, Some("data")).unwrap();
        assert_eq!(c.rows.len(), 1);
    }

    #[test]
    fn splits_everything_without_consignor_filter() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            dir.path(),
            &[("甲", "A", "X1"), ("乙", "B", "X2")],
        );
        let config = config_in(dir.path());
        let outputs = split_sheet(&input, &config, None).unwrap();
        assert_eq!(outputs.len(), 2);
    }

    #[test]
    fn drops_excluded_partition_value() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            dir.path(),
            &[("甲", "陆海新通道", "X1"), ("甲", "B", "X2")],
        );
        let config = config_in(dir.path());
        let outputs = split_sheet(&input, &config, None).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, "B");
    }

    #[test]
    fn skips_blank_partition_names() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            dir.path(),
            &[("甲", "  ", "X1"), ("甲", "B", "X2")],
        );
        let config = config_in(dir.path());
        let outputs = split_sheet(&input, &config, None).unwrap();
        assert_eq!(outputs.len(), 1);
        assert_eq!(outputs[0].0, "B");
    }

    #[test]
    fn missing_columns_are_reported() {
        let dir = TempDir::new().unwrap();
        let sheet = Sheet {
            header: vec!["其他".into()],
            rows: vec![vec!["x".into()]],
        };
        let input = dir.path().join("input.xlsx");
        sheet::write_xlsx(&input, "export", &sheet).unwrap();
        let config = config_in(dir.path());

        let err = split_sheet(&input, &config, Some("甲")).unwrap_err();
        assert!(err.to_string().contains("委托客户"));
        let err = split_sheet(&input, &config, None).unwrap_err();
        assert!(err.to_string().contains("实际订舱客户"));
    }

    #[test]
    fn missing_input_is_an_error() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let err = split_sheet(&dir.path().join("absent.xlsx"), &config, None).unwrap_err();
        assert!(err.to_string().contains("absent.xlsx"));
    }

    #[test]
    fn rerun_with_merge_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let input = write_input(dir.path(), &[("甲", "A", "X1"), ("甲", "A", "X2")]);
        let config = config_in(dir.path());

        let first = split_sheet(&input, &config, None).unwrap();
        let after_first = sheet::read_xlsx(&first[0].1, Some("data")).unwrap();
        let second = split_sheet(&input, &config, None).unwrap();
        let after_second = sheet::read_xlsx(&second[0].1, Some("data")).unwrap();

        assert_eq!(after_first, after_second);
        assert_eq!(after_second.rows.len(), 2);
    }

    #[test]
    fn merge_appends_only_new_rows() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());

        let input1 = write_input(dir.path(), &[("甲", "A", "X1")]);
        split_sheet(&input1, &config, None).unwrap();

        let input2_path = dir.path().join("input2.xlsx");
        let input2 = Sheet {
            header: vec!["委托客户".into(), "实际订舱客户".into(), "箱号".into()],
            rows: vec![
                vec!["甲".into(), "A".into(), "X1".into()],
                vec!["甲".into(), "A".into(), "X9".into()],
            ],
        };
        sheet::write_xlsx(&input2_path, "export", &input2).unwrap();
        let outputs = split_sheet(&input2_path, &config, None).unwrap();

        let merged = sheet::read_xlsx(&outputs[0].1, Some("data")).unwrap();
        let boxes: Vec<&str> = merged.rows.iter().map(|row| row[2].as_str()).collect();
        assert_eq!(boxes, vec!["X1", "X9"]);
    }

    #[test]
    fn dedup_keys_restrict_the_comparison() {
        let dir = TempDir::new().unwrap();
        let input = write_input(
            dir.path(),
            &[("甲", "A", "X1"), ("乙", "A", "X1"), ("甲", "A", "X2")],
        );
        let config = ProcessingConfig {
            dedup_keys: vec!["箱号".into()],
            ..config_in(dir.path())
        };
        let outputs = split_sheet(&input, &config, None).unwrap();
        let sheet = sheet::read_xlsx(&outputs[0].1, Some("data")).unwrap();
        // Second X1 row differs only outside the key column, so it is dropped
        // and the first one survives.
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[0][0], "甲");
    }

    #[test]
    fn missing_dedup_key_column_is_an_error() {
        let dir = TempDir::new().unwrap();
        let input = write_input(dir.path(), &[("甲", "A", "X1")]);
        let config = ProcessingConfig {
            dedup_keys: vec!["不存在".into()],
            ..config_in(dir.path())
        };
        let err = split_sheet(&input, &config, None).unwrap_err();
        assert!(err.to_string().contains("不存在"));
    }

    #[test]
    fn overwrites_when_merge_disabled() {
        let dir = TempDir::new().unwrap();
        let config = ProcessingConfig {
            merge_existing: false,
            ..config_in(dir.path())
        };

        let input1 = write_input(dir.path(), &[("甲", "A", "X1")]);
        split_sheet(&input1, &config, None).unwrap();

        let input2_path = dir.path().join("input2.xlsx");
        let input2 = Sheet {
            header: vec!["委托客户".into(), "实际订舱客户".into(), "箱号".into()],
            rows: vec![vec!["甲".into(), "A".into(), "X9".into()]],
        };
        sheet::write_xlsx(&input2_path, "export", &input2).unwrap();
        let outputs = split_sheet(&input2_path, &config, None).unwrap();

        let sheet = sheet::read_xlsx(&outputs[0].1, Some("data")).unwrap();
        assert_eq!(sheet.rows.len(), 1);
        assert_eq!(sheet.rows[0][2], "X9");
    }
}

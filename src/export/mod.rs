//! Spreadsheet export of recent chat sessions.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::Utc;
use rust_xlsxwriter::{Format, Workbook};

use crate::core::config::ExportConfig;
use crate::core::errors::ExportError;
use crate::core::models::ChatSession;

/// Longest sheet name produced.
pub const SHEET_NAME_MAX_CHARS: usize = 30;

/// Longest text a spreadsheet cell accepts.
const CELL_MAX_CHARS: usize = 32_767;

const INVALID_SHEET_CHARS: &[char] = &['[', ']', ':', '*', '?', '/', '\\'];

const HEADERS: [&str; 4] = ["#", "Role", "Content", "Timestamp"];

/// Result of a successful export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportSummary {
    /// Written workbook.
    pub path: PathBuf,
    /// Number of sessions exported.
    pub session_count: usize,
    /// Sheet names in workbook order.
    pub sheet_names: Vec<String>,
}

impl ExportSummary {
    /// Number of sessions exported.
    #[must_use]
    pub const fn count(&self) -> usize {
        self.session_count
    }
}

/// The `max_sessions` most recently active sessions, newest first.
#[must_use]
pub fn select_recent(sessions: &[ChatSession], max_sessions: usize) -> Vec<&ChatSession> {
    let mut recent: Vec<&ChatSession> = sessions.iter().collect();
    recent.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    recent.truncate(max_sessions);
    recent
}

/// Sheet name with invalid characters removed, cut to 30 characters.
#[must_use]
pub fn sanitize_sheet_name(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !INVALID_SHEET_CHARS.contains(c) && !c.is_control())
        .collect();
    let cleaned = cleaned.trim().trim_matches('\'').trim();
    cleaned.chars().take(SHEET_NAME_MAX_CHARS).collect::<String>().trim_end().to_string()
}

/// Sheet names for `titles`, unique ignoring case.
fn unique_sheet_names<'a>(titles: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut taken = HashSet::new();
    let mut names = Vec::new();

    for (index, title) in titles.into_iter().enumerate() {
        let base = sanitize_sheet_name(title);
        let base = if base.is_empty() {
            format!("Chat {}", index + 1)
        } else {
            base
        };

        let mut candidate = base.clone();
        let mut n = 2;
        while !taken.insert(candidate.to_lowercase()) {
            let suffix = format!(" ({n})");
            let keep = SHEET_NAME_MAX_CHARS.saturating_sub(suffix.chars().count());
            let stem: String = base.chars().take(keep).collect();
            candidate = format!("{}{suffix}", stem.trim_end());
            n += 1;
        }
        names.push(candidate);
    }
    names
}

fn cell_text(content: &str) -> String {
    if content.chars().count() <= CELL_MAX_CHARS {
        content.to_string()
    } else {
        content.chars().take(CELL_MAX_CHARS).collect()
    }
}

/// Export the `max_sessions` most recent sessions into `out_dir`.
///
/// # Errors
/// Returns [`ExportError::NothingToExport`] when no session is selected, or
/// an error if the workbook cannot be written.
pub fn export_to_spreadsheet(
    sessions: &[ChatSession],
    max_sessions: usize,
    out_dir: &Path,
) -> Result<ExportSummary, ExportError> {
    let config = ExportConfig {
        max_sessions,
        ..ExportConfig::default()
    };
    export_with_config(sessions, &config, out_dir)
}

/// Export using the limits and product name from `config`.
///
/// # Errors
/// Returns [`ExportError::NothingToExport`] when no session is selected, or
/// an error if the workbook cannot be written.
pub fn export_with_config(
    sessions: &[ChatSession],
    config: &ExportConfig,
    out_dir: &Path,
) -> Result<ExportSummary, ExportError> {
    let selected = select_recent(sessions, config.max_sessions);
    if selected.is_empty() {
        return Err(ExportError::NothingToExport);
    }

    let sheet_names = unique_sheet_names(selected.iter().map(|s| s.title.as_str()));
    let header = Format::new().set_bold();
    let mut workbook = Workbook::new();

    for (session, name) in selected.iter().zip(&sheet_names) {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(name)?;

        for (col, title) in (0u16..).zip(HEADERS) {
            worksheet.write_string_with_format(0, col, title, &header)?;
        }
        worksheet.set_column_width(0, 6)?;
        worksheet.set_column_width(1, 12)?;
        worksheet.set_column_width(2, 80)?;
        worksheet.set_column_width(3, 20)?;

        tracing::debug!("Exporting session {} as sheet {name}", session.id);
        for (row, message) in (1u32..).zip(&session.messages) {
            worksheet.write_number(row, 0, f64::from(row))?;
            worksheet.write_string(row, 1, message.role.label())?;
            worksheet.write_string(row, 2, cell_text(&message.content))?;
            worksheet.write_string(
                row,
                3,
                message.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
            )?;
        }
    }

    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(format!(
        "{}_Chats_{}.xlsx",
        config.product_name,
        Utc::now().format("%Y-%m-%d")
    ));
    workbook.save(&path)?;

    tracing::info!("Exported {} chats to {}", selected.len(), path.display());
    Ok(ExportSummary {
        path,
        session_count: selected.len(),
        sheet_names,
    })
}

//! File name rules for managed attachments. Pure: no I/O, no hidden state.
//!
//! Lengths are counted in characters (Unicode scalar values), not bytes.

use super::AttachmentError;

/// Used when an upload's base name is empty after cleaning.
pub const FALLBACK_BASE_NAME: &str = "attachment";

const INVALID_CHARS: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Split at the last `.` into `(base, extension)`; the extension keeps its dot.
///
/// A name whose only dots are leading (`.bashrc`, `..`) has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if !name[..idx].chars().all(|c| c == '.') => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Reduce an uploaded name to a single safe path segment.
///
/// Directory components are dropped and characters that are invalid in file
/// names are replaced with `_` in the base name. The extension is kept as is.
pub fn clean_file_name(original: &str) -> String {
    let last = original
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or(original);
    let (base, ext) = split_extension(last);

    let mut clean: String = base
        .chars()
        .map(|c| if INVALID_CHARS.contains(&c) || c.is_control() { '_' } else { c })
        .collect();
    if clean.trim().is_empty() {
        clean = FALLBACK_BASE_NAME.to_string();
    }
    clean.push_str(ext);
    clean
}

/// Fit `name` into `budget` characters by cutting the end of the base name.
///
/// The extension is never shortened. Fails when the budget is zero or smaller
/// than the extension alone.
pub fn truncate_file_name(name: &str, budget: usize) -> Result<String, AttachmentError> {
    let (base, ext) = split_extension(name);
    let ext_len = ext.chars().count();
    if budget == 0 || ext_len > budget {
        return Err(AttachmentError::NameTooLong {
            budget,
            required: ext_len.max(1),
        });
    }

    let base_len = base.chars().count();
    if base_len + ext_len <= budget {
        return Ok(name.to_string());
    }

    let mut fitted: String = base.chars().take(budget - ext_len).collect();
    fitted.push_str(ext);
    Ok(fitted)
}

/// Clean then fit: the sanitized name component of a managed file.
pub fn sanitize_file_name(original: &str, budget: usize) -> Result<String, AttachmentError> {
    truncate_file_name(&clean_file_name(original), budget)
}

/// Whether `segment` can be used as one directory level under the archive root.
pub fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && !segment
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
}

/// Builds canonical managed paths: `{user}/{visit_record_id}_{attachment_id}_{name}`.
///
/// The file name segment never exceeds `max_name_len` characters. Distinct
/// attachment ids always yield distinct paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttachmentNamer {
    max_name_len: usize,
}

impl AttachmentNamer {
    pub fn new(max_name_len: usize) -> Self {
        Self { max_name_len }
    }

    pub fn max_name_len(&self) -> usize {
        self.max_name_len
    }

    pub fn prefix(visit_record_id: i64, attachment_id: i64) -> String {
        format!("{visit_record_id}_{attachment_id}_")
    }

    /// The managed file name (last path segment).
    pub fn file_name(
        &self,
        visit_record_id: i64,
        attachment_id: i64,
        original_name: &str,
    ) -> Result<String, AttachmentError> {
        if visit_record_id <= 0 {
            return Err(AttachmentError::InvalidId {
                field: "visit_record_id",
                value: visit_record_id,
            });
        }
        if attachment_id <= 0 {
            return Err(AttachmentError::InvalidId {
                field: "attachment_id",
                value: attachment_id,
            });
        }

        let prefix = Self::prefix(visit_record_id, attachment_id);
        let prefix_len = prefix.chars().count();
        let budget = self
            .max_name_len
            .checked_sub(prefix_len)
            .filter(|b| *b > 0)
            .ok_or(AttachmentError::NameTooLong {
                budget: self.max_name_len,
                required: prefix_len + 1,
            })?;

        let name = sanitize_file_name(original_name, budget).map_err(|e| match e {
            AttachmentError::NameTooLong { required, .. } => AttachmentError::NameTooLong {
                budget: self.max_name_len,
                required: prefix_len + required,
            },
            other => other,
        })?;
        Ok(format!("{prefix}{name}"))
    }

    /// The path relative to the archive root, always `/`-separated.
    pub fn managed_path(
        &self,
        user: &str,
        visit_record_id: i64,
        attachment_id: i64,
        original_name: &str,
    ) -> Result<String, AttachmentError> {
        if !is_valid_segment(user) {
            return Err(AttachmentError::InvalidPath(format!("user segment '{user}'")));
        }
        let file_name = self.file_name(visit_record_id, attachment_id, original_name)?;
        Ok(format!("{user}/{file_name}"))
    }
}

impl Default for AttachmentNamer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_MAX_NAME_LEN)
    }
}

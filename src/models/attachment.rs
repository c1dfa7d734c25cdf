use std::path::Path;

use serde::{Deserialize, Serialize};

/// A managed file belonging to one visit.
///
/// `file_path` is relative to the archive root: `{user}/{visit}_{id}_{name}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRecord {
    pub id: i64,
    pub visit_record_id: i64,
    pub file_path: String,
}

impl AttachmentRecord {
    /// Final path segment, i.e. the managed file name.
    pub fn file_name(&self) -> &str {
        self.file_path
            .rsplit('/')
            .next()
            .unwrap_or(self.file_path.as_str())
    }

    /// The user-facing name: the managed name without its id prefix.
    pub fn display_name(&self) -> &str {
        let name = self.file_name();
        let prefix = format!("{}_{}_", self.visit_record_id, self.id);
        name.strip_prefix(prefix.as_str()).unwrap_or(name)
    }

    pub fn extension(&self) -> Option<&str> {
        Path::new(self.file_name()).extension().and_then(|e| e.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_derived_from_path() {
        let record = AttachmentRecord {
            id: 345,
            visit_record_id: 12,
            file_path: "alice/12_345_blood panel.pdf".into(),
        };
        assert_eq!(record.file_name(), "12_345_blood panel.pdf");
        assert_eq!(record.display_name(), "blood panel.pdf");
        assert_eq!(record.extension(), Some("pdf"));
    }
}

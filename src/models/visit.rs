use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// One clinic visit as stored in `visit_records`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisitRecord {
    pub id: i64,
    pub date: NaiveDate,
    pub hospital: Option<String>,
    pub department: Option<String>,
    pub doctor: Option<String>,
    pub organ_system: Option<String>,
    pub reason: Option<String>,
    pub diagnosis: Option<String>,
    pub medication: Option<String>,
    pub remark: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// User-editable visit fields, used for both creation and edits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisitFields {
    pub date: NaiveDate,
    #[serde(default)]
    pub hospital: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub doctor: Option<String>,
    #[serde(default)]
    pub organ_system: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub diagnosis: Option<String>,
    #[serde(default)]
    pub medication: Option<String>,
    #[serde(default)]
    pub remark: Option<String>,
}

impl VisitFields {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            ..Self::default()
        }
    }

    /// Trim every text field and turn blank input into `None`,
    /// matching what a form submission stores.
    pub fn normalized(mut self) -> Self {
        for field in [
            &mut self.hospital,
            &mut self.department,
            &mut self.doctor,
            &mut self.organ_system,
            &mut self.reason,
            &mut self.diagnosis,
            &mut self.medication,
            &mut self.remark,
        ] {
            *field = field
                .take()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());
        }
        self
    }
}

impl VisitRecord {
    /// Text fields joined for keyword search.
    pub fn searchable_text(&self) -> String {
        [
            Some(self.date.to_string()),
            self.hospital.clone(),
            self.department.clone(),
            self.doctor.clone(),
            self.organ_system.clone(),
            self.reason.clone(),
            self.diagnosis.clone(),
            self.medication.clone(),
            self.remark.clone(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalized_trims_and_drops_blank_fields() {
        let fields = VisitFields {
            hospital: Some("  City Hospital ".into()),
            doctor: Some("   ".into()),
            remark: Some(String::new()),
            ..VisitFields::new(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        }
        .normalized();

        assert_eq!(fields.hospital.as_deref(), Some("City Hospital"));
        assert!(fields.doctor.is_none());
        assert!(fields.remark.is_none());
    }
}

//! Repository layer: entity-scoped database operations.
//!
//! Free functions over a borrowed `Connection`, so callers decide where
//! transactions begin and end.

mod attachment;
mod history;
mod visit_record;

// Re-export all public items from sub-modules
pub use attachment::*;
pub use history::*;
pub use visit_record::*;

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::db::sqlite::open_memory_database;
    use crate::db::DatabaseError;
    use crate::models::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn visit(on: NaiveDate, hospital: &str, doctor: &str) -> VisitFields {
        VisitFields {
            hospital: Some(hospital.into()),
            doctor: Some(doctor.into()),
            ..VisitFields::new(on)
        }
    }

    // ─── Visit records ───

    #[test]
    fn insert_and_get_visit_record() {
        let conn = open_memory_database().unwrap();
        let fields = VisitFields {
            department: Some("Cardiology".into()),
            organ_system: Some("Circulatory".into()),
            reason: Some("Chest tightness".into()),
            diagnosis: Some("Benign palpitations".into()),
            medication: Some("None".into()),
            remark: Some("Follow up in 6 months".into()),
            ..visit(date(2024, 5, 20), "City Hospital", "Dr. Wang")
        };
        let id = insert_visit_record(&conn, &fields).unwrap();

        let stored = get_visit_record(&conn, id).unwrap().unwrap();
        assert_eq!(stored.id, id);
        assert_eq!(stored.date, date(2024, 5, 20));
        assert_eq!(stored.hospital.as_deref(), Some("City Hospital"));
        assert_eq!(stored.department.as_deref(), Some("Cardiology"));
        assert_eq!(stored.remark.as_deref(), Some("Follow up in 6 months"));
        assert_ne!(stored.created_at, chrono::NaiveDateTime::default());
    }

    #[test]
    fn get_missing_visit_returns_none() {
        let conn = open_memory_database().unwrap();
        assert!(get_visit_record(&conn, 42).unwrap().is_none());
        assert!(!visit_record_exists(&conn, 42).unwrap());
    }

    #[test]
    fn visit_ids_are_assigned_in_order() {
        let conn = open_memory_database().unwrap();
        let a = insert_visit_record(&conn, &VisitFields::new(date(2024, 1, 1))).unwrap();
        let b = insert_visit_record(&conn, &VisitFields::new(date(2024, 1, 1))).unwrap();
        assert!(b > a);
        assert!(visit_record_exists(&conn, a).unwrap());
    }

    #[test]
    fn update_visit_record_changes_fields() {
        let conn = open_memory_database().unwrap();
        let id = insert_visit_record(&conn, &visit(date(2024, 1, 3), "A", "X")).unwrap();

        let edited = VisitFields {
            diagnosis: Some("Influenza".into()),
            ..visit(date(2024, 1, 4), "B", "Y")
        };
        update_visit_record(&conn, id, &edited).unwrap();

        let stored = get_visit_record(&conn, id).unwrap().unwrap();
        assert_eq!(stored.date, date(2024, 1, 4));
        assert_eq!(stored.hospital.as_deref(), Some("B"));
        assert_eq!(stored.diagnosis.as_deref(), Some("Influenza"));
        assert!(stored.updated_at >= stored.created_at);
    }

    #[test]
    fn update_missing_visit_is_not_found() {
        let conn = open_memory_database().unwrap();
        let err = update_visit_record(&conn, 7, &VisitFields::new(date(2024, 1, 1))).unwrap_err();
        assert!(matches!(err, DatabaseError::NotFound { .. }));
    }

    #[test]
    fn list_visits_newest_first() {
        let conn = open_memory_database().unwrap();
        insert_visit_record(&conn, &VisitFields::new(date(2023, 12, 1))).unwrap();
        insert_visit_record(&conn, &VisitFields::new(date(2024, 6, 1))).unwrap();
        insert_visit_record(&conn, &VisitFields::new(date(2024, 2, 1))).unwrap();

        let dates: Vec<NaiveDate> = list_visit_records(&conn)
            .unwrap()
            .into_iter()
            .map(|v| v.date)
            .collect();
        assert_eq!(dates, vec![date(2024, 6, 1), date(2024, 2, 1), date(2023, 12, 1)]);
    }

    #[test]
    fn deleting_visit_cascades_attachment_rows() {
        let conn = open_memory_database().unwrap();
        let visit_id = insert_visit_record(&conn, &VisitFields::new(date(2024, 1, 1))).unwrap();
        let a = insert_attachment_placeholder(&conn, visit_id).unwrap();
        set_attachment_path(&conn, a, "alice/1_1_scan.png").unwrap();
        let b = insert_attachment_placeholder(&conn, visit_id).unwrap();
        set_attachment_path(&conn, b, "alice/1_2_scan.png").unwrap();

        delete_visit_record_row(&conn, visit_id).unwrap();

        assert!(get_attachment(&conn, a).unwrap().is_none());
        assert!(get_attachment(&conn, b).unwrap().is_none());
        assert_eq!(count_attachments(&conn, visit_id).unwrap(), 0);
    }

    #[test]
    fn delete_missing_visit_is_not_found() {
        let conn = open_memory_database().unwrap();
        assert!(matches!(
            delete_visit_record_row(&conn, 99),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    // ─── Attachments ───

    #[test]
    fn attachment_requires_existing_visit() {
        let conn = open_memory_database().unwrap();
        let result = insert_attachment_placeholder(&conn, 123);
        assert!(matches!(result, Err(DatabaseError::Sqlite(_))));
    }

    #[test]
    fn placeholder_hidden_until_path_set() {
        let conn = open_memory_database().unwrap();
        let visit_id = insert_visit_record(&conn, &VisitFields::new(date(2024, 1, 1))).unwrap();
        let id = insert_attachment_placeholder(&conn, visit_id).unwrap();
        assert!(list_attachments_for_visit(&conn, visit_id).unwrap().is_empty());

        set_attachment_path(&conn, id, "alice/1_1_report.pdf").unwrap();
        let listed = list_attachments_for_visit(&conn, visit_id).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].file_path, "alice/1_1_report.pdf");
        assert_eq!(list_attachments(&conn).unwrap(), listed);
    }

    #[test]
    fn duplicate_file_paths_rejected() {
        let conn = open_memory_database().unwrap();
        let visit_id = insert_visit_record(&conn, &VisitFields::new(date(2024, 1, 1))).unwrap();
        let a = insert_attachment_placeholder(&conn, visit_id).unwrap();
        let b = insert_attachment_placeholder(&conn, visit_id).unwrap();
        set_attachment_path(&conn, a, "alice/same.pdf").unwrap();
        assert!(set_attachment_path(&conn, b, "alice/same.pdf").is_err());
    }

    #[test]
    fn placeholders_can_be_swept() {
        let conn = open_memory_database().unwrap();
        let visit_id = insert_visit_record(&conn, &VisitFields::new(date(2024, 1, 1))).unwrap();
        let a = insert_attachment_placeholder(&conn, visit_id).unwrap();
        let b = insert_attachment_placeholder(&conn, visit_id).unwrap();
        set_attachment_path(&conn, b, "alice/kept.pdf").unwrap();

        let pending = list_attachment_placeholders(&conn).unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a);
        assert_eq!(delete_attachment_placeholders(&conn).unwrap(), 1);
        assert!(list_attachment_placeholders(&conn).unwrap().is_empty());
        assert!(get_attachment(&conn, b).unwrap().is_some());
    }

    #[test]
    fn delete_attachment_row_then_missing() {
        let conn = open_memory_database().unwrap();
        let visit_id = insert_visit_record(&conn, &VisitFields::new(date(2024, 1, 1))).unwrap();
        let id = insert_attachment_placeholder(&conn, visit_id).unwrap();
        delete_attachment_row(&conn, id).unwrap();
        assert!(matches!(
            delete_attachment_row(&conn, id),
            Err(DatabaseError::NotFound { .. })
        ));
    }

    // ─── History and search ───

    #[test]
    fn field_history_distinct_and_most_recent_first() {
        let conn = open_memory_database().unwrap();
        insert_visit_record(&conn, &visit(date(2024, 1, 1), "Alpha Clinic", "Dr. A")).unwrap();
        insert_visit_record(&conn, &visit(date(2024, 1, 2), "Beta Hospital", "Dr. B")).unwrap();
        insert_visit_record(&conn, &visit(date(2024, 1, 3), "Alpha Clinic", "Dr. C")).unwrap();
        insert_visit_record(&conn, &VisitFields::new(date(2024, 1, 4))).unwrap();

        let hospitals = get_field_history(&conn, HistoryField::Hospital, 5).unwrap();
        assert_eq!(hospitals, vec!["Alpha Clinic".to_string(), "Beta Hospital".to_string()]);

        let limited = get_field_history(&conn, HistoryField::Doctor, 2).unwrap();
        assert_eq!(limited, vec!["Dr. C".to_string(), "Dr. B".to_string()]);
    }

    #[test]
    fn doctors_filtered_by_hospital() {
        let conn = open_memory_database().unwrap();
        insert_visit_record(&conn, &visit(date(2024, 1, 1), "Alpha Clinic", "Dr. A")).unwrap();
        insert_visit_record(&conn, &visit(date(2024, 1, 2), "Beta Hospital", "Dr. B")).unwrap();
        insert_visit_record(&conn, &visit(date(2024, 1, 3), "Alpha Clinic", "Dr. C")).unwrap();

        let doctors = get_doctors_by_hospital(&conn, "Alpha Clinic", 5).unwrap();
        assert_eq!(doctors, vec!["Dr. C".to_string(), "Dr. A".to_string()]);
        assert!(get_doctors_by_hospital(&conn, "Nowhere", 5).unwrap().is_empty());
    }

    #[test]
    fn suggestions_filter_by_typed_text() {
        let conn = open_memory_database().unwrap();
        insert_visit_record(&conn, &visit(date(2024, 1, 1), "Alpha Clinic", "Dr. A")).unwrap();
        insert_visit_record(&conn, &visit(date(2024, 1, 2), "Beta Hospital", "Dr. B")).unwrap();

        let hits = suggest_field_values(&conn, HistoryField::Hospital, "hosp", 5).unwrap();
        assert_eq!(hits, vec!["Beta Hospital".to_string()]);
        let all = suggest_field_values(&conn, HistoryField::Hospital, "  ", 5).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn suggestions_reach_values_older_than_recent_history() {
        let conn = open_memory_database().unwrap();
        insert_visit_record(&conn, &visit(date(2023, 1, 1), "Harbor Clinic", "Dr. H")).unwrap();
        for n in 0..25 {
            let hospital = format!("City Hospital {n}");
            insert_visit_record(&conn, &visit(date(2024, 1, 1), &hospital, "Dr. C")).unwrap();
        }

        let hits = suggest_field_values(&conn, HistoryField::Hospital, "harbor", 5).unwrap();
        assert_eq!(hits, vec!["Harbor Clinic".to_string()]);

        let capped = suggest_field_values(&conn, HistoryField::Hospital, "city", 3).unwrap();
        assert_eq!(capped.len(), 3);
    }

    #[test]
    fn keyword_matching_requires_every_keyword() {
        assert!(matches_keywords("City Hospital cardiology", "city CARDIO"));
        assert!(!matches_keywords("City Hospital cardiology", "city dental"));
        assert!(matches_keywords("anything", "   "));
        assert!(!matches_keywords("", "city"));
        assert!(matches_keywords("", ""));
        assert!(matches_keywords("北京协和医院 心内科", "协和 心内"));
    }

    #[test]
    fn search_visits_by_keywords_and_dates() {
        let conn = open_memory_database().unwrap();
        let flu = insert_visit_record(
            &conn,
            &VisitFields {
                diagnosis: Some("Influenza A".into()),
                ..visit(date(2024, 1, 10), "City Hospital", "Dr. Li")
            },
        )
        .unwrap();
        insert_visit_record(
            &conn,
            &VisitFields {
                diagnosis: Some("Sprained ankle".into()),
                ..visit(date(2024, 3, 5), "City Hospital", "Dr. Zhao")
            },
        )
        .unwrap();
        insert_visit_record(&conn, &visit(date(2023, 7, 1), "Harbor Clinic", "Dr. Li")).unwrap();

        let hits = search_visit_records(&conn, &VisitFilter::keywords("influenza city")).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, flu);

        let dr_li = search_visit_records(&conn, &VisitFilter::keywords("dr. li")).unwrap();
        assert_eq!(dr_li.len(), 2);

        let in_2024 = search_visit_records(
            &conn,
            &VisitFilter {
                date_from: Some(date(2024, 1, 1)),
                date_to: Some(date(2024, 12, 31)),
                ..VisitFilter::default()
            },
        )
        .unwrap();
        assert_eq!(in_2024.len(), 2);

        let harbor = search_visit_records(
            &conn,
            &VisitFilter {
                hospital: Some("Harbor Clinic".into()),
                ..VisitFilter::default()
            },
        )
        .unwrap();
        assert_eq!(harbor.len(), 1);

        let everything = search_visit_records(&conn, &VisitFilter::default()).unwrap();
        assert_eq!(everything.len(), 3);
    }
}

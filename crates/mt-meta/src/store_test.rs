//! Behavioural tests run against both store implementations.

use super::*;
use crate::{MemoryStore, MetaDb, MetaError};
use mt_core::{parse_timestamp, ModelName, Schedule};
use std::collections::BTreeMap;

fn ts(s: &str) -> NaiveDateTime {
    parse_timestamp(s).unwrap()
}

fn stores() -> Vec<(&'static str, Box<dyn MetaStore>)> {
    vec![
        ("memory", Box::new(MemoryStore::new())),
        ("duckdb", Box::new(MetaDb::open_memory().unwrap())),
    ]
}

fn model_id() -> ModelId {
    ModelId::new(ProjectName::new("proj"), ModelName::new("task_model"))
}

fn model_record() -> ModelRecord {
    ModelRecord {
        id: model_id(),
        engine: "dummy".to_string(),
        active_version: None,
        last_version: 0,
        created_at: ts("2024-01-01 00:00:00"),
    }
}

fn version(n: u32, tag: &str) -> ModelVersion {
    let mut options = BTreeMap::new();
    options.insert("k".to_string(), "v".to_string());
    ModelVersion {
        model: model_id(),
        version: n,
        status: VersionStatus::Generating,
        engine: "dummy".to_string(),
        predict: Some("b".to_string()),
        tag: Some(tag.to_string()),
        training_query: Some("select * from files.tasks".to_string()),
        options,
        activate_on_complete: true,
        error: None,
        created_at: ts("2024-01-01 00:00:00"),
        completed_at: None,
    }
}

fn job(name: &str, next: &str) -> Job {
    Job {
        id: JobId::new(ProjectName::new("proj"), JobName::new(name)),
        query: "select 1".to_string(),
        start_at: ts(next),
        end_at: None,
        next_run_at: Some(ts(next)),
        schedule: Some(Schedule::parse("every hour").unwrap()),
        active: true,
        created_at: ts("2024-01-01 00:00:00"),
    }
}

#[test]
fn test_model_lifecycle_rows() {
    for (label, store) in stores() {
        store.create_model(&model_record()).unwrap();
        assert!(
            matches!(
                store.create_model(&model_record()),
                Err(MetaError::AlreadyExists { .. })
            ),
            "{label}"
        );

        assert_eq!(store.allocate_version(&model_id()).unwrap(), 1, "{label}");
        store.insert_version(&version(1, "first")).unwrap();
        assert_eq!(store.allocate_version(&model_id()).unwrap(), 2, "{label}");
        store.insert_version(&version(2, "second")).unwrap();

        store
            .set_version_status(
                &model_id(),
                1,
                VersionStatus::Complete,
                None,
                Some(ts("2024-01-01 00:01:00")),
            )
            .unwrap();
        store.set_active_version(&model_id(), Some(1)).unwrap();

        let v1 = store.get_version(&model_id(), 1).unwrap().unwrap();
        assert_eq!(v1.status, VersionStatus::Complete, "{label}");
        assert_eq!(v1.options.get("k").map(String::as_str), Some("v"));
        assert_eq!(v1.completed_at, Some(ts("2024-01-01 00:01:00")));

        let model = store.get_model(&model_id()).unwrap().unwrap();
        assert_eq!(model.active_version, Some(1), "{label}");
        assert_eq!(model.last_version, 2, "{label}");

        let tags: Vec<_> = store
            .list_versions(&model_id())
            .unwrap()
            .into_iter()
            .map(|v| v.tag.unwrap())
            .collect();
        assert_eq!(tags, vec!["first", "second"], "{label}");

        assert!(store.delete_version(&model_id(), 2).unwrap(), "{label}");
        assert!(!store.delete_version(&model_id(), 2).unwrap(), "{label}");
        assert_eq!(
            store.allocate_version(&model_id()).unwrap(),
            3,
            "{label}: numbers are not reused"
        );

        assert!(store.delete_model(&model_id()).unwrap(), "{label}");
        assert!(store.get_model(&model_id()).unwrap().is_none(), "{label}");
        assert!(store.list_versions(&model_id()).unwrap().is_empty(), "{label}");
        assert!(matches!(
            store.allocate_version(&model_id()),
            Err(MetaError::NotFound { .. })
        ));
    }
}

#[test]
fn test_model_lookup_is_case_insensitive() {
    for (label, store) in stores() {
        store.create_model(&model_record()).unwrap();
        let upper = ModelId::new(ProjectName::new("PROJ"), ModelName::new("Task_Model"));
        assert!(store.get_model(&upper).unwrap().is_some(), "{label}");
        assert_eq!(
            store.list_models(Some(&ProjectName::new("Proj"))).unwrap().len(),
            1,
            "{label}"
        );
        assert!(store
            .list_models(Some(&ProjectName::new("other")))
            .unwrap()
            .is_empty());
        assert_eq!(store.list_models(None).unwrap().len(), 1, "{label}");
    }
}

#[test]
fn test_claim_run_is_compare_and_set() {
    for (label, store) in stores() {
        let j = job("j1", "2024-01-01 10:00:00");
        store.insert_job(&j).unwrap();
        assert!(matches!(
            store.insert_job(&j),
            Err(MetaError::AlreadyExists { .. })
        ));

        let next = Some(ts("2024-01-01 11:00:00"));
        assert!(store.claim_run(&j.id, ts("2024-01-01 10:00:00"), next).unwrap(), "{label}");
        assert!(
            !store.claim_run(&j.id, ts("2024-01-01 10:00:00"), next).unwrap(),
            "{label}: second claim of the same instant must fail"
        );
        assert_eq!(store.get_job(&j.id).unwrap().unwrap().next_run_at, next);

        assert!(store.set_job_active(&j.id, false).unwrap());
        assert!(
            !store.claim_run(&j.id, ts("2024-01-01 11:00:00"), None).unwrap(),
            "{label}: inactive jobs cannot be claimed"
        );
        let stored = store.get_job(&j.id).unwrap().unwrap();
        assert!(!stored.active);
        assert_eq!(stored.schedule.unwrap().as_str(), "every hour");

        assert!(store.update_next_run(&j.id, None).unwrap());
        assert_eq!(store.get_job(&j.id).unwrap().unwrap().next_run_at, None);
    }
}

#[test]
fn test_history_outlives_job() {
    for (label, store) in stores() {
        let j = job("j1", "2024-01-01 10:00:00");
        store.insert_job(&j).unwrap();
        for (start, error) in [
            ("2024-01-01 10:00:00", None),
            ("2024-01-01 11:00:00", Some("boom".to_string())),
        ] {
            store
                .append_history(&JobHistoryEntry {
                    project: j.id.project.clone(),
                    job_name: j.id.name.clone(),
                    query: j.query.clone(),
                    started_at: ts(start),
                    finished_at: ts(start),
                    error,
                })
                .unwrap();
        }
        assert_eq!(
            store.last_successful_start(&j.id).unwrap(),
            Some(ts("2024-01-01 10:00:00")),
            "{label}"
        );

        assert!(store.delete_job(&j.id).unwrap());
        assert!(store.get_job(&j.id).unwrap().is_none());
        let history = store
            .list_history(Some(&j.id.project), Some(&j.id.name))
            .unwrap();
        assert_eq!(history.len(), 2, "{label}");
        assert_eq!(history[1].error.as_deref(), Some("boom"));
        assert!(store
            .list_history(Some(&ProjectName::new("other")), None)
            .unwrap()
            .is_empty());
    }
}

#[test]
fn test_views() {
    for (label, store) in stores() {
        let view = ViewRecord {
            project: ProjectName::new("proj"),
            name: ViewName::new("vtasks"),
            query: "select * from files.tasks".to_string(),
            created_at: ts("2024-01-01 00:00:00"),
        };
        store.create_view(&view).unwrap();
        assert!(matches!(
            store.create_view(&view),
            Err(MetaError::AlreadyExists { .. })
        ));
        assert_eq!(
            store.get_view(&view.project, "VTASKS").unwrap(),
            Some(view.clone()),
            "{label}"
        );
        assert_eq!(store.list_views(None).unwrap().len(), 1);
        assert!(store.drop_view(&view.project, "vtasks").unwrap());
        assert!(store.get_view(&view.project, "vtasks").unwrap().is_none());
    }
}

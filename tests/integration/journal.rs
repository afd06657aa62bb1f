use casecoord::error::JournalError;
use casecoord::journal::{IngestJobStatus, JobJournal, JournalOptions};
use chrono::{TimeZone, Utc};
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

#[test]
fn racing_processes_share_one_case_and_job_row() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("journal").join("jobs.db");
    // Create the schema up front so every racer starts from the same state
    JobJournal::open(&db, &JournalOptions::default())
        .unwrap()
        .close()
        .unwrap();

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let db = db.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let journal = JobJournal::open(&db, &JournalOptions::default()).unwrap();
                barrier.wait();
                let created = Utc.timestamp_opt(1_000 + i, 0).unwrap();
                let case = journal
                    .get_or_create_case_record("Burglary", Some(created))
                    .unwrap();
                let job = journal
                    .get_or_create_job_record(case.id, "laptop.e01")
                    .unwrap();
                (case.id, case.created_date, job.id)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let case_ids: HashSet<_> = results.iter().map(|r| r.0).collect();
    let created_dates: HashSet<_> = results.iter().map(|r| r.1).collect();
    let job_ids: HashSet<_> = results.iter().map(|r| r.2).collect();
    assert_eq!(case_ids.len(), 1);
    assert_eq!(created_dates.len(), 1);
    assert_eq!(job_ids.len(), 1);
}

#[test]
fn job_lifecycle_is_observable_by_status() {
    let journal = JobJournal::open_in_memory().unwrap();
    let case = journal.get_or_create_case_record("Fraud", None).unwrap();
    let first = journal.get_or_create_job_record(case.id, "phone.tar").unwrap();
    let second = journal.get_or_create_job_record(case.id, "disk.e01").unwrap();

    let pending: Vec<_> = journal
        .get_jobs(IngestJobStatus::Pending)
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(pending, vec![first.id, second.id]);

    let t1 = Utc.timestamp_opt(100, 0).unwrap();
    let t2 = Utc.timestamp_opt(200, 0).unwrap();
    journal
        .set_job_status(first.id, IngestJobStatus::Running, t1)
        .unwrap();
    let running: Vec<_> = journal
        .get_jobs(IngestJobStatus::Running)
        .unwrap()
        .into_iter()
        .map(|j| j.id)
        .collect();
    assert_eq!(running, vec![first.id]);

    journal
        .set_job_status(first.id, IngestJobStatus::Done, t2)
        .unwrap();
    assert!(journal.get_jobs(IngestJobStatus::Running).unwrap().is_empty());
    let done = journal.get_jobs(IngestJobStatus::Done).unwrap();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].id, first.id);
    assert_eq!(done[0].start_time, Some(t1));
    assert_eq!(done[0].end_time, Some(t2));

    assert_eq!(journal.get_jobs_for_case(case.id).unwrap().len(), 2);
}

#[test]
fn backwards_transition_is_allowed_and_keeps_times() {
    let journal = JobJournal::open_in_memory().unwrap();
    let case = journal.get_or_create_case_record("Fraud", None).unwrap();
    let job = journal.get_or_create_job_record(case.id, "phone.tar").unwrap();
    let t1 = Utc.timestamp_opt(100, 0).unwrap();
    journal
        .set_job_status(job.id, IngestJobStatus::Running, t1)
        .unwrap();
    let pending = journal
        .set_job_status(job.id, IngestJobStatus::Pending, Utc::now())
        .unwrap();
    assert_eq!(pending.status, IngestJobStatus::Pending);
    assert_eq!(pending.start_time, Some(t1));
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("jobs.db");
    let job_id = {
        let journal = JobJournal::open(&db, &JournalOptions::default()).unwrap();
        let case = journal.get_or_create_case_record("Arson", None).unwrap();
        let job = journal.get_or_create_job_record(case.id, "usb.img").unwrap();
        journal.set_job_error(job.id, true).unwrap();
        journal.close().unwrap();
        job.id
    };

    let journal = JobJournal::open(&db, &JournalOptions::default()).unwrap();
    let job = journal.get_job(job_id).unwrap().unwrap();
    assert!(job.error_occurred);
    assert_eq!(job.case_name, "Arson");
    assert_eq!(journal.schema_version().major, 1);
    assert!(journal.get_case_record("Arson").unwrap().is_some());
    assert!(journal.get_case_record("Unknown").unwrap().is_none());
}

#[test]
fn updates_of_unknown_jobs_fail() {
    let journal = JobJournal::open_in_memory().unwrap();
    assert!(matches!(
        journal.set_job_status(404, IngestJobStatus::Done, Utc::now()),
        Err(JournalError::NotFound { .. })
    ));
}

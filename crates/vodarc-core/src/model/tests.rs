use super::*;

fn job(status: JobStatus) -> Job {
    Job {
        job_id: "chan:1:abcdef123".into(),
        index: 1,
        item_id: "abcdef123".into(),
        item_url: "https://example.test/watch?v=abcdef123".into(),
        title: "first".into(),
        status,
        reason: "before".into(),
        attempts: 2,
        last_error: Some("old".into()),
        last_attempt_at: None,
        completed_at: None,
    }
}

fn allowed(from: Option<JobStatus>) -> Vec<JobStatus> {
    use JobStatus::*;
    match from {
        None => vec![Pending, SkippedPrivate],
        Some(Pending) => vec![Pending, Running, FailedRetryable, FailedPermanent, SkippedPrivate],
        Some(Running) => vec![Running, Completed, FailedRetryable, FailedPermanent],
        Some(Completed) => vec![Completed, Pending, FailedRetryable, FailedPermanent],
        Some(FailedRetryable) => {
            vec![FailedRetryable, Running, Pending, FailedPermanent, SkippedPrivate]
        }
        Some(FailedPermanent) => vec![FailedPermanent, Running, Pending, SkippedPrivate],
        Some(SkippedPrivate) => vec![SkippedPrivate, Pending],
    }
}

#[test]
fn transition_matrix_matches_table() {
    for from in JobStatus::ALL {
        let ok = allowed(Some(from));
        for to in JobStatus::ALL {
            let mut j = job(from);
            let before = j.clone();
            let res = j.transition(to, "why");
            if ok.contains(&to) {
                assert!(res.is_ok(), "{from} -> {to} should be allowed");
                assert_eq!(j.status, to);
                assert_eq!(j.reason, "why");
            } else {
                let err = res.unwrap_err();
                assert_eq!(err.from, Some(from));
                assert_eq!(err.to, to);
                assert_eq!(j, before, "{from} -> {to} must leave the record unchanged");
            }
        }
    }
}

#[test]
fn initial_edge_only_allows_pending_and_skipped() {
    for to in JobStatus::ALL {
        assert_eq!(can_transition(None, to), allowed(None).contains(&to));
    }
    assert!(Job::new("s:1:x", 1, "x", "u", "t", JobStatus::Pending, "").is_ok());
    assert!(Job::new("s:1:x", 1, "x", "u", "t", JobStatus::SkippedPrivate, "private").is_ok());
    let err = Job::new("s:1:x", 1, "x", "u", "t", JobStatus::Completed, "").unwrap_err();
    assert_eq!(err.from, None);
}

#[test]
fn invalid_transition_message_names_job_and_states() {
    let mut j = job(JobStatus::SkippedPrivate);
    let err = j.transition(JobStatus::Completed, "").unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid job status transition: \"skipped_private\" -> \"completed\" \
         (job_id=chan:1:abcdef123 item_id=abcdef123)"
    );
}

#[test]
fn status_string_roundtrip() {
    for status in JobStatus::ALL {
        assert_eq!(status.as_str().parse::<JobStatus>().unwrap(), status);
    }
    assert!("done".parse::<JobStatus>().is_err());
}

#[test]
fn runnable_statuses() {
    assert!(JobStatus::Pending.is_runnable(false));
    assert!(JobStatus::FailedRetryable.is_runnable(false));
    assert!(!JobStatus::FailedPermanent.is_runnable(false));
    assert!(JobStatus::FailedPermanent.is_runnable(true));
    assert!(!JobStatus::Completed.is_runnable(true));
    assert!(!JobStatus::Running.is_runnable(true));
    assert!(!JobStatus::SkippedPrivate.is_runnable(true));
}

#[test]
fn recompute_counters_empty_and_mixed() {
    let mut m = Manifest::new("run", SourceInfo::default(), Vec::new());
    assert_eq!(m.counts, StatusCounts::default());

    m.jobs = vec![
        job(JobStatus::Pending),
        job(JobStatus::Pending),
        job(JobStatus::Running),
        job(JobStatus::Completed),
        job(JobStatus::FailedRetryable),
        job(JobStatus::FailedPermanent),
        job(JobStatus::SkippedPrivate),
    ];
    m.recompute_counters();
    m.recompute_counters();
    assert_eq!(m.counts.total, 7);
    for status in JobStatus::ALL {
        let expected = m.jobs.iter().filter(|j| j.status == status).count();
        assert_eq!(m.counts.get(status), expected, "{status}");
    }
    assert_eq!(m.counts.remaining(), 4);
}

#[test]
fn truncate_error_counts_characters() {
    let long = "é".repeat(LAST_ERROR_MAX_CHARS + 10);
    let cut = truncate_error(&long);
    assert_eq!(cut.chars().count(), LAST_ERROR_MAX_CHARS);
    assert_eq!(truncate_error("  short \n"), "short");
}

#[test]
fn manifest_json_omits_empty_optionals_and_rejects_unknown_status() {
    let mut j = job(JobStatus::Pending);
    j.reason.clear();
    j.attempts = 0;
    j.last_error = None;
    let m = Manifest::new("r1", SourceInfo::default(), vec![j]);
    let text = serde_json::to_string(&m).unwrap();
    assert!(text.contains("\"status\":\"pending\""));
    assert!(text.contains("\"pending\":1"));
    assert!(!text.contains("last_error"));
    assert!(!text.contains("\"attempts\""));

    let back: Manifest = serde_json::from_str(&text).unwrap();
    assert_eq!(back, m);

    let bad = text.replace("\"status\":\"pending\"", "\"status\":\"paused\"");
    assert!(serde_json::from_str::<Manifest>(&bad).is_err());
}

//! Multi-run behavior of the coordinator over shared sheets
//!
//! Each test drives several invocations against the same ledger and report
//! sheets, the way a scheduler would, and checks the persisted state between
//! them.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

use fleetreport::account::AccountId;
use fleetreport::coordinator::{RunCoordinator, RunSummary};
use fleetreport::directory::StaticDirectory;
use fleetreport::fetch::{DispatchConfig, FetchError, ReportFetcher, ReportQuery, SourceRow};
use fleetreport::humanize::ByteSize;
use fleetreport::ledger::{CompletionMap, DayKey, KeyValueLedger, purge_stale};
use fleetreport::report::ReportWriter;
use fleetreport::sheet::{MemorySheet, SheetHandle, TabularStore, Workbook};
use fleetreport::storage::StorageClient;

/// Returns one row per account; accounts in `failing` error out
#[derive(Default)]
struct FlakyFetcher {
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
}

impl FlakyFetcher {
    fn fail(&self, account: &str) {
        self.failing.lock().unwrap().insert(account.to_string());
    }

    fn recover(&self, account: &str) {
        self.failing.lock().unwrap().remove(account);
    }
}

#[async_trait]
impl ReportFetcher for FlakyFetcher {
    async fn fetch(
        &self,
        account: &AccountId,
        _query: &ReportQuery,
    ) -> Result<Vec<SourceRow>, FetchError> {
        self.calls.lock().unwrap().push(account.to_string());
        if self.failing.lock().unwrap().contains(account.as_str()) {
            return Err(FetchError::Unavailable("rate limited".to_string()));
        }
        let row = json!({"ExternalCustomerId": account.as_str(), "Clicks": 3});
        Ok(vec![row.as_object().cloned().unwrap()])
    }
}

struct Harness {
    ledger: SheetHandle,
    report: SheetHandle,
    fetcher: Arc<FlakyFetcher>,
    accounts: Vec<&'static str>,
}

impl Harness {
    fn in_memory(accounts: Vec<&'static str>) -> Self {
        Self {
            ledger: Arc::new(MemorySheet::new("_remoteStorage")),
            report: Arc::new(MemorySheet::new("Report")),
            fetcher: Arc::new(FlakyFetcher::default()),
            accounts,
        }
    }

    fn coordinator(&self, ceiling: usize) -> RunCoordinator {
        let query = Arc::new(ReportQuery {
            fields: vec!["ExternalCustomerId".to_string(), "Clicks".to_string()],
            ..Default::default()
        });
        RunCoordinator::builder()
            .ledger_sheet(self.ledger.clone())
            .report(ReportWriter::new(self.report.clone(), query.header(), 30))
            .directory(Arc::new(StaticDirectory::new(self.accounts.clone())))
            .fetcher(self.fetcher.clone())
            .query(query)
            .dispatch(DispatchConfig {
                max_in_flight: ceiling,
                account_timeout: Duration::from_secs(5),
            })
            .build()
    }

    async fn run(&self, day: &str) -> RunSummary {
        self.coordinator(2).run(day_key(day)).await.unwrap()
    }

    async fn completion(&self, day: &str) -> Option<CompletionMap> {
        let ledger = KeyValueLedger::open(self.ledger.clone()).await.unwrap();
        ledger.get(day).await.unwrap()
    }

    async fn ledger_keys(&self) -> Vec<Value> {
        self.ledger
            .read_all()
            .await
            .unwrap()
            .into_iter()
            .map(|row| row[0].clone())
            .collect()
    }
}

fn day_key(text: &str) -> DayKey {
    text.parse().unwrap()
}

fn ids(values: &[&str]) -> Vec<AccountId> {
    values.iter().map(|v| AccountId::from(*v)).collect()
}

fn completed(values: &[&str]) -> CompletionMap {
    values.iter().copied().collect()
}

#[tokio::test]
async fn test_fleet_drains_then_restarts_next_day() {
    let harness = Harness::in_memory(vec!["A", "B", "C", "D", "E"]);

    let run1 = harness.run("20240101").await;
    assert_eq!(run1.batch, ids(&["A", "B"]));
    assert_eq!(run1.deferred, 3);
    assert_eq!(harness.completion("20240101").await, Some(completed(&["A", "B"])));

    let run2 = harness.run("20240101").await;
    assert_eq!(run2.batch, ids(&["C", "D"]));
    assert_eq!(
        harness.completion("20240101").await,
        Some(completed(&["A", "B", "C", "D"]))
    );

    let run3 = harness.run("20240101").await;
    assert_eq!(run3.batch, ids(&["E"]));

    let run4 = harness.run("20240101").await;
    assert!(run4.is_noop());
    assert_eq!(run4.already_processed, 5);

    // header + one row per account
    assert_eq!(harness.report.read_all().await.unwrap().len(), 6);

    let run5 = harness.run("20240102").await;
    assert_eq!(run5.batch, ids(&["A", "B"]));
    assert_eq!(run5.metrics.ledger_entries_purged, 1);
    assert_eq!(harness.ledger_keys().await, vec![json!("20240102")]);
    assert_eq!(harness.completion("20240101").await, None);
}

#[tokio::test]
async fn test_failed_account_is_retried() {
    let harness = Harness::in_memory(vec!["A", "B", "C", "D", "E"]);
    harness.fetcher.fail("B");

    let run1 = harness.run("20240101").await;
    assert_eq!(run1.succeeded, ids(&["A"]));
    assert_eq!(run1.failed, ids(&["B"]));
    assert_eq!(harness.completion("20240101").await, Some(completed(&["A"])));

    harness.fetcher.recover("B");
    let run2 = harness.run("20240101").await;
    assert_eq!(run2.batch, ids(&["B", "C"]));
    assert_eq!(
        harness.completion("20240101").await,
        Some(completed(&["A", "B", "C"]))
    );
}

#[tokio::test]
async fn test_all_failures_still_save_empty_map() {
    let harness = Harness::in_memory(vec!["A"]);
    harness.fetcher.fail("A");

    let summary = harness.run("20240101").await;
    assert_eq!(summary.failed, ids(&["A"]));
    assert_eq!(harness.completion("20240101").await, Some(CompletionMap::new()));

    // Header still written even with nothing to append
    assert_eq!(harness.report.read_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_convergence_for_any_ceiling() {
    let accounts = vec!["a1", "a2", "a3", "a4", "a5", "a6", "a7"];
    for ceiling in 1..=8 {
        let harness = Harness::in_memory(accounts.clone());
        let expected_runs = accounts.len().div_ceil(ceiling);

        let mut runs = 0;
        loop {
            let summary = harness
                .coordinator(ceiling)
                .run(day_key("20240101"))
                .await
                .unwrap();
            if summary.is_noop() {
                break;
            }
            runs += 1;
            assert!(summary.batch.len() <= ceiling);
        }
        assert_eq!(runs, expected_runs, "ceiling {}", ceiling);
        assert_eq!(harness.fetcher.calls.lock().unwrap().len(), accounts.len());
    }
}

#[tokio::test]
async fn test_new_accounts_join_same_day() {
    let mut harness = Harness::in_memory(vec!["A", "B"]);
    harness.run("20240101").await;

    harness.accounts = vec!["A", "X", "B"];
    let summary = harness.run("20240101").await;
    assert_eq!(summary.batch, ids(&["X"]));
    assert_eq!(summary.already_processed, 2);
}

#[tokio::test]
async fn test_purge_twice_is_noop() {
    let ledger: SheetHandle = Arc::new(MemorySheet::with_rows(
        "_remoteStorage",
        vec![
            vec![json!("20231230"), json!("{}")],
            vec![json!("20240101"), json!(r#"{"A":true}"#)],
            vec![json!("20231231"), json!("{}")],
            vec![json!("not-a-day"), json!("1")],
        ],
    ));

    let today = day_key("20240101");
    let mut store = KeyValueLedger::open(ledger.clone()).await.unwrap();
    assert_eq!(purge_stale(&mut store, &today).await.unwrap(), 3);
    let after_once = ledger.read_all().await.unwrap();

    let mut store = KeyValueLedger::open(ledger.clone()).await.unwrap();
    assert_eq!(purge_stale(&mut store, &today).await.unwrap(), 0);
    assert_eq!(ledger.read_all().await.unwrap(), after_once);
    assert_eq!(after_once.len(), 1);
}

#[tokio::test]
async fn test_expired_report_rows_purged_on_run() {
    let harness = Harness::in_memory(vec!["A"]);
    let header = vec![json!("ExternalCustomerId"), json!("Clicks"), json!("Timestamp")];
    let rows = vec![
        header,
        vec![json!("old"), json!(1), json!("20231101")],
        vec![json!("new"), json!(1), json!("20231225")],
    ];
    harness.report.append_rows(rows).await.unwrap();
    harness.report.set_frozen_rows(1).await.unwrap();

    let summary = harness.run("20240101").await;
    assert_eq!(summary.metrics.rows_purged, 1);

    let stamps: Vec<Value> = harness
        .report
        .read_all()
        .await
        .unwrap()
        .into_iter()
        .map(|row| row[0].clone())
        .collect();
    assert_eq!(stamps, vec![json!("ExternalCustomerId"), json!("new"), json!("A")]);
}

#[tokio::test]
async fn test_state_survives_restart_on_local_disk() {
    let temp_dir = TempDir::new().unwrap();
    let fetcher = Arc::new(FlakyFetcher::default());

    let open = |root: &std::path::Path| {
        let storage = StorageClient::local(root).unwrap();
        let workbook = Workbook::new(storage, "fleet-report", ByteSize::mib(16));
        let ledger: SheetHandle = Arc::new(workbook.sheet("_remoteStorage"));
        let report: SheetHandle = Arc::new(workbook.sheet("Report"));
        Harness {
            ledger,
            report,
            fetcher: fetcher.clone(),
            accounts: vec!["A", "B", "C"],
        }
    };

    let first = open(temp_dir.path());
    assert_eq!(first.run("20240101").await.batch, ids(&["A", "B"]));
    drop(first);

    // Fresh process: new storage client, new sheets, same directory
    let second = open(temp_dir.path());
    assert_eq!(second.run("20240101").await.batch, ids(&["C"]));
    assert!(second.run("20240101").await.is_noop());

    let ledger_file = temp_dir.path().join("fleet-report").join("_remoteStorage.json");
    let text = std::fs::read_to_string(ledger_file).unwrap();
    assert!(text.contains("20240101"));
}

#[test]
fn test_day_key_format() {
    let day = DayKey::from_date(NaiveDate::from_ymd_opt(2024, 3, 7).unwrap());
    assert_eq!(day.to_string(), "20240307");
}

use feibra_report::aggregate::{aggregate, Dimension, Mode, RowOrder};
use feibra_report::branches::reassign_by_area;
use feibra_report::config::{BranchStaff, Role, TargetBracket, ZeroTargetPolicy};
use feibra_report::filter::RecordFilter;
use feibra_report::loader::{load_batch, UploadedFile};
use feibra_report::reconcile::{reconcile_all, to_rows};
use feibra_report::reports::{distributor_detail, filter_by_role};
use feibra_report::tags::{split_tags, tag_counts};
use feibra_report::types::{Outcome, TargetRatio};
use feibra_report::Config;

const CONTROLS: &str = "\
FILIALE,ERFASSER,NAME/VT/ABNEHMER,GEBIET,ZUSATZINFO,KONTROLLE,TYPE,ERFASST
Fil03,Gruber Thomas,Meier,2500BADEN,SACKGASSE FALSCHE_ABGABESTELLE,NICHT_OK,FLUGBLATT,01.09.2026 08:00:00
Fil12,Gruber Thomas,Meier,2500BADEN,SACKGASSE,OK,FLUGBLATT,01.09.2026 09:00:00
Fil05,Novak Petra,,1070WIEN,,OK,KATALOG,02.09.2026 10:30:00
";

fn controls() -> UploadedFile {
    UploadedFile::new("kontrollen.csv", CONTROLS)
}

#[test]
fn regular_upload_end_to_end() {
    let cfg = Config::default();
    let batch = load_batch(&[controls()], &cfg);
    assert!(batch.errors.is_empty());
    let table = batch.regular.expect("regular table");

    // Fil12 row is gone
    assert_eq!(table.len(), 2);
    assert!(table.records.iter().all(|r| r.branch.as_deref() != Some("Fil12")));

    let first = &table.records[0];
    assert_eq!(first.outcome, Some(Outcome::PerfNotOk));
    assert_eq!(first.outcome.as_ref().map(|o| o.to_string()).as_deref(), Some("PERF. NICHT_OK"));

    let third = &table.records[1];
    assert_eq!(third.postal_prefix.as_deref(), Some("1070"));
    assert_eq!(third.distributor.as_deref(), Some("Verteiler unbekannt"));

    let (by_area, _) = reassign_by_area(&table, &cfg);
    assert_eq!(by_area.records[1].branch.as_deref(), Some("Fil01"));
    assert_eq!(by_area.records[0].branch.as_deref(), Some("Fil03"));
}

#[test]
fn missing_roster_person_is_synthesized() {
    let cfg = Config {
        branch_staff: vec![BranchStaff { branch: "BranchX".into(), names: vec!["A".into()] }],
        target_brackets: vec![TargetBracket { target: 100, names: vec!["A".into()] }],
        ..Config::default()
    };
    let sheet = UploadedFile::new("soll_ist.csv", "FILIALE,ERFASSER,IST,SOLL\nBranchY,B,5,10\n");
    let batch = load_batch(&[sheet], &cfg);
    assert_eq!(batch.special.len(), 1);
    assert!(batch.regular.is_none());

    let reconciled = reconcile_all(&batch.special, &cfg);
    let synthesized: Vec<_> = reconciled.iter().filter(|r| r.synthesized).collect();
    assert_eq!(synthesized.len(), 1);
    let a = synthesized[0];
    assert_eq!(a.branch.as_deref(), Some("BranchX"));
    assert_eq!(a.name.as_deref(), Some("A"));
    assert_eq!(a.actual, 0.0);
    assert_eq!(a.target, 100.0);
    assert_eq!(a.difference, -100.0);
    assert_eq!(a.ratio, TargetRatio::Percent(0.0));

    let b = reconciled.iter().find(|r| r.name.as_deref() == Some("B")).expect("B kept");
    assert_eq!(b.ratio, TargetRatio::Percent(50.0));
}

#[test]
fn target_sheets_are_reconciled_separately() {
    let cfg = Config {
        branch_staff: vec![BranchStaff { branch: "B1".into(), names: vec!["A".into()] }],
        target_brackets: vec![],
        zero_target_policy: ZeroTargetPolicy::Infinite,
        ..Config::default()
    };
    let files = vec![
        UploadedFile::new("w1.csv", "FILIALE,ERFASSER,IST,SOLL\nB1,A,10,\n"),
        UploadedFile::new("w2.csv", "FILIALE,ERFASSER,IST,SOLL\nB2,C,7,14\n"),
    ];
    let batch = load_batch(&files, &cfg);
    let reconciled = reconcile_all(&batch.special, &cfg);
    // w1: A present; w2: C kept plus synthesized A
    assert_eq!(reconciled.len(), 3);
    let rows = to_rows(&reconciled, &cfg);
    assert_eq!(rows[0].percent_of_target, "∞%");
    assert_eq!(rows[0].reference, "100%");
    assert_eq!(rows[1].percent_of_target, "50.0%");
}

#[test]
fn filtered_percentages_and_tags() {
    let cfg = Config::default();
    let batch = load_batch(&[controls()], &cfg);
    let table = batch.regular.expect("regular table");

    let pivot = aggregate(&table.records, Dimension::Branch, Mode::Percentage, RowOrder::Default);
    for row in &pivot.rows {
        let sum: f64 = row.values.iter().sum();
        assert!((sum - 100.0).abs() < 1e-9);
    }
    assert_eq!(pivot.categories[0], "PERF. NICHT_OK");

    let filter = RecordFilter { outcomes: vec![Outcome::PerfNotOk], ..Default::default() };
    let only_faults = filter.apply(&table);
    assert_eq!(only_faults.len(), 1);
    let counts = tag_counts(&split_tags(&only_faults));
    assert_eq!(counts.len(), 2);
    assert!(counts.iter().all(|c| c.count == 1));
}

#[test]
fn fault_view_detail_and_role_benchmark() {
    let cfg = Config::default();
    let batch = load_batch(&[controls()], &cfg);
    let table = batch.regular.expect("regular table");

    let performance = RecordFilter { outcomes: vec![Outcome::PerfNotOk], ..Default::default() };
    let view = performance.apply(&table);
    let pivot = aggregate(&view.records, Dimension::DistributorWithBranch, Mode::Count, RowOrder::for_filter(&performance));
    assert_eq!(pivot.categories, vec!["PERF. NICHT_OK"]);
    assert_eq!(pivot.value("Meier (Fil03)", "PERF. NICHT_OK"), Some(1.0));

    let detail = distributor_detail(&table.records, "Meier");
    assert_eq!(detail.total, 1);
    assert_eq!(detail.days.len(), 1);
    assert_eq!(detail.days[0].perf_not_ok, 1);

    let sheet = UploadedFile::new("soll_ist.csv", "FILIALE,ERFASSER,IST,SOLL\nFil01,Gruber Thomas,30,120\n");
    let reconciled = reconcile_all(&load_batch(&[sheet], &cfg).special, &cfg);
    let leads = filter_by_role(&reconciled, Role::Regionalleiter, &cfg);
    assert_eq!(leads.len(), 1);
    assert_eq!(leads[0].actual, 30.0);
    assert!(leads.iter().all(|r| r.name.as_deref().and_then(|n| cfg.roles.role_of(n)) == Some(Role::Regionalleiter)));
}

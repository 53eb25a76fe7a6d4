//! End-to-end pipeline tests: normalize → store → reload → dashboard.

use chrono::NaiveDate;
use std::collections::BTreeMap;
use vigia_core::aggregate::TopErrors;
use vigia_core::classify::{AllowListClassifier, HeuristicClassifier, StatusClassifier};
use vigia_core::dashboard::{DashboardOptions, DashboardOutcome, WindowSummary, build_dashboard};
use vigia_core::db::{Store, load_all_or_empty};
use vigia_core::error::IngestError;
use vigia_core::model::IntegrationRecord;
use vigia_core::normalize::{Normalizer, SchemaVariant};
use vigia_core::window::Window;

fn day(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid test date")
}

fn key_sums(records: &[IntegrationRecord]) -> BTreeMap<(String, NaiveDate, String, Option<String>), u64> {
    let mut sums = BTreeMap::new();
    for r in records {
        *sums
            .entry((r.status.clone(), r.event_date, r.category.clone(), r.parent_type.clone()))
            .or_insert(0) += r.count;
    }
    sums
}

const SCENARIO_CSV: &str = "\
qtd;status;data_integracao;tipo
10;sucesso;2024-01-01;X
5;erro;2024-01-01;X
5;erro;2024-01-01;X
";

#[test]
fn scenario_merges_and_reports() {
    let records = Normalizer::new(SchemaVariant::Basic)
        .normalize(SCENARIO_CSV)
        .expect("normalize");
    assert_eq!(records.len(), 3);

    let mut store = Store::open_in_memory().expect("store");
    let summary = store.replace_all(&records).expect("replace");
    assert_eq!(summary.rows_written, 2);

    let loaded = store.load_all().expect("load");
    let erro = loaded.iter().find(|r| r.status == "erro").expect("erro row");
    assert_eq!(erro.count, 10);

    let DashboardOutcome::Ready(dashboard) = build_dashboard(
        &loaded,
        &HeuristicClassifier::default(),
        &DashboardOptions::default(),
    ) else {
        panic!("expected a dashboard");
    };
    assert_eq!(dashboard.reference_day, day("2024-01-01"));
    for report in &dashboard.windows {
        let kpi = report.summary.kpi().expect("populated");
        assert_eq!((kpi.total, kpi.errors, kpi.success), (20, 10, 10));
    }
}

#[test]
fn round_trip_preserves_per_key_sums() {
    let csv = "\
QTD , Status ,Data_Integracao,TIPO
3,ok,2024-02-01,a
4,ok,2024-02-01,a
1,erro,2024-02-02T08:15:00,b
abc,erro,2024-02-02,b
7,falha,not a date,c
";
    let records = Normalizer::new(SchemaVariant::Basic)
        .normalize(csv)
        .expect("normalize");
    assert_eq!(records.len(), 4, "the undated row is dropped");

    let mut store = Store::open_in_memory().expect("store");
    store.replace_all(&records).expect("replace");
    let loaded = store.load_all().expect("load");

    assert_eq!(key_sums(&loaded), key_sums(&records));
}

#[test]
fn replacing_twice_matches_replacing_once() {
    let records = Normalizer::new(SchemaVariant::Basic)
        .normalize(SCENARIO_CSV)
        .expect("normalize");

    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join(".vigia/vigia.db");

    let mut store = Store::open(&path).expect("open");
    store.replace_all(&records).expect("first");
    let once = store.load_all().expect("load");
    store.replace_all(&records).expect("second");
    drop(store);

    assert_eq!(load_all_or_empty(&path), once);
}

#[test]
fn missing_columns_leave_store_untouched() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("vigia.db");
    let mut store = Store::open(&path).expect("open");
    let seeded = Normalizer::new(SchemaVariant::Basic)
        .normalize(SCENARIO_CSV)
        .expect("normalize");
    store.replace_all(&seeded).expect("seed");

    let err = Normalizer::new(SchemaVariant::ParentType)
        .normalize(SCENARIO_CSV)
        .expect_err("parent_type is required");
    match err {
        IngestError::MissingColumns { missing } => {
            assert_eq!(missing, vec!["parent_type".to_string()]);
        }
        other => panic!("expected missing columns, got {other:?}"),
    }

    assert_eq!(store.row_count().expect("count"), 2);
}

#[test]
fn parent_type_alias_feeds_breakdown() {
    let csv = "\
qtd,status,data_integracao,tipo,sis.parent_type
2,erro,2024-03-01,nfe,fiscal
3,erro,2024-03-01,cte,fiscal
4,erro,2024-03-01,pedido,vendas
9,sucesso,2024-03-01,pedido,vendas
";
    let records = Normalizer::new(SchemaVariant::ParentType)
        .normalize(csv)
        .expect("normalize");

    let mut store = Store::open_in_memory().expect("store");
    store.replace_all(&records).expect("replace");
    let loaded = store.load_all().expect("load");

    let options = DashboardOptions {
        dimension: SchemaVariant::ParentType.breakdown(),
        windows: vec![Window::Today],
        ..DashboardOptions::default()
    };
    let DashboardOutcome::Ready(dashboard) =
        build_dashboard(&loaded, &HeuristicClassifier::default(), &options)
    else {
        panic!("expected a dashboard");
    };
    let WindowSummary::Populated { top_errors, .. } = &dashboard.windows[0].summary else {
        panic!("expected populated window");
    };
    let TopErrors::Ranked { ranking, .. } = top_errors else {
        panic!("expected ranked errors");
    };
    let names: Vec<&str> = ranking.iter().map(|c| c.category.as_str()).collect();
    assert_eq!(names, vec!["fiscal", "vendas"]);
    assert_eq!(ranking[0].qtd, 5);
}

#[test]
fn allow_list_replaces_heuristic() {
    let records = vec![
        IntegrationRecord::new("erro", day("2024-01-01"), "X", 5),
        IntegrationRecord::new("nok", day("2024-01-01"), "X", 2),
    ];
    let override_classifier = StatusClassifier::from_settings(["nok"], false);

    let DashboardOutcome::Ready(dashboard) =
        build_dashboard(&records, &override_classifier, &DashboardOptions::default())
    else {
        panic!("expected a dashboard");
    };
    let kpi = dashboard
        .window(Window::Today)
        .and_then(|w| w.summary.kpi())
        .expect("populated");
    assert_eq!(kpi.errors, 2);
    assert_eq!(kpi.success, 5);

    let direct = build_dashboard(
        &records,
        &AllowListClassifier::new(["NOK "]),
        &DashboardOptions::default(),
    );
    assert_eq!(
        direct,
        DashboardOutcome::Ready(dashboard),
        "config-built and direct allow-lists agree"
    );
}

#[test]
fn report_output_ignores_input_order() {
    let mut records = Normalizer::new(SchemaVariant::Basic)
        .normalize(
            "qtd,status,data_integracao,tipo\n\
             1,erro,2024-01-05,a\n\
             2,ok,2024-01-04,b\n\
             3,erro,2024-01-04,b\n\
             4,falha,2024-01-01,c\n\
             5,ok,2024-01-05,a\n",
        )
        .expect("normalize");

    let forward = build_dashboard(
        &records,
        &HeuristicClassifier::default(),
        &DashboardOptions::default(),
    );
    records.reverse();
    let reversed = build_dashboard(
        &records,
        &HeuristicClassifier::default(),
        &DashboardOptions::default(),
    );
    assert_eq!(forward, reversed);
}

#[test]
fn empty_store_reports_no_data() {
    let dir = tempfile::tempdir().expect("temp dir");
    let records = load_all_or_empty(&dir.path().join("never-created.db"));
    assert_eq!(
        build_dashboard(
            &records,
            &HeuristicClassifier::default(),
            &DashboardOptions::default()
        ),
        DashboardOutcome::NoData
    );
}

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use std::collections::BTreeMap;
use vigia_core::aggregate::{BreakdownDimension, Kpi, TopErrors, top_error_categories};
use vigia_core::classify::HeuristicClassifier;
use vigia_core::dashboard::{DashboardOptions, build_dashboard};
use vigia_core::db::Store;
use vigia_core::model::{IntegrationRecord, merge_by_key};
use vigia_core::window::{reference_day, select};

const STATUSES: &[&str] = &["sucesso", "erro", "Falha", "nok", "ok", "parcialmente integrado"];
const CATEGORIES: &[&str] = &["A", "B", "C", "D", "E"];

fn base_day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).expect("valid base date")
}

fn arb_record() -> impl Strategy<Value = IntegrationRecord> {
    (
        prop::sample::select(STATUSES),
        0_u64..45,
        prop::sample::select(CATEGORIES),
        0_u64..1_000,
    )
        .prop_map(|(status, offset, category, count)| {
            let date = base_day()
                .checked_add_days(Days::new(offset))
                .expect("date in range");
            IntegrationRecord::new(status, date, category, count)
        })
}

fn arb_dataset() -> impl Strategy<Value = Vec<IntegrationRecord>> {
    prop::collection::vec(arb_record(), 0..60)
}

fn sums_by_key(records: &[IntegrationRecord]) -> BTreeMap<(String, NaiveDate, String), u64> {
    let mut sums = BTreeMap::new();
    for r in records {
        *sums
            .entry((r.status.clone(), r.event_date, r.category.clone()))
            .or_insert(0) += r.count;
    }
    sums
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn dashboard_is_order_independent(
        records in arb_dataset().prop_flat_map(|r| (Just(r.clone()), Just(r).prop_shuffle()))
    ) {
        let (a, b) = records;
        let classifier = HeuristicClassifier::default();
        let options = DashboardOptions::default();
        prop_assert_eq!(
            build_dashboard(&a, &classifier, &options),
            build_dashboard(&b, &classifier, &options)
        );
    }

    #[test]
    fn merge_preserves_per_key_sums(records in arb_dataset()) {
        let merged = merge_by_key(&records);
        prop_assert_eq!(sums_by_key(&merged), sums_by_key(&records));

        let mut keys: Vec<_> = merged.iter().map(IntegrationRecord::key).collect();
        let before = keys.len();
        keys.dedup();
        prop_assert_eq!(keys.len(), before, "merged keys are unique and sorted");
    }

    #[test]
    fn one_day_window_is_seven_day_window_on_reference(records in arb_dataset()) {
        if let Some(reference) = reference_day(&records) {
            let one = select(&records, reference, 1);
            let seven: Vec<_> = select(&records, reference, 7)
                .into_iter()
                .filter(|r| r.day() == reference)
                .collect();
            prop_assert_eq!(one, seven);
        }
    }

    #[test]
    fn windows_nest(records in arb_dataset()) {
        if let Some(reference) = reference_day(&records) {
            let classifier = HeuristicClassifier::default();
            let one = Kpi::compute(&select(&records, reference, 1), &classifier);
            let seven = Kpi::compute(&select(&records, reference, 7), &classifier);
            let thirty = Kpi::compute(&select(&records, reference, 30), &classifier);
            prop_assert!(one.total <= seven.total && seven.total <= thirty.total);
            prop_assert!(one.errors <= seven.errors && seven.errors <= thirty.errors);
            prop_assert_eq!(thirty.total, thirty.errors + thirty.success);
        }
    }

    #[test]
    fn ranking_respects_limit_and_order(records in arb_dataset(), n in 1_usize..6) {
        let refs: Vec<_> = records.iter().collect();
        let top = top_error_categories(
            &refs,
            &HeuristicClassifier::default(),
            BreakdownDimension::Category,
            n,
        );
        if let TopErrors::Ranked { ranking, daily, .. } = top {
            prop_assert!(ranking.len() <= n);
            for pair in ranking.windows(2) {
                prop_assert!(
                    pair[0].qtd > pair[1].qtd
                        || (pair[0].qtd == pair[1].qtd && pair[0].category < pair[1].category)
                );
            }
            prop_assert!(daily.iter().all(|d| ranking.iter().any(|c| c.category == d.category)));
        }
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(32))]

    #[test]
    fn replace_all_is_idempotent(records in arb_dataset()) {
        let mut store = Store::open_in_memory().expect("store");
        store.replace_all(&records).expect("first replace");
        let once = store.load_all().expect("load once");
        store.replace_all(&records).expect("second replace");
        let twice = store.load_all().expect("load twice");
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(sums_by_key(&once), sums_by_key(&records));
    }
}

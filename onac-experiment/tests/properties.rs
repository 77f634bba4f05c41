mod common;

use common::{bare_config, frame, harness, read_csv, secs, Fixture};
use onac_core::stimulus::BLACK;
use onac_core::{Key, KeySet, Scene, TriggerCode};
use onac_experiment::{ResponseWindow, TrialPlan};
use proptest::prelude::*;
use std::time::Duration;

fn plan(duration: Duration, end_on_response: bool) -> TrialPlan {
    let plan = TrialPlan::passive(duration)
        .with_trigger(Some(TriggerCode::from_char('T').unwrap()))
        .with_window(ResponseWindow::whole(duration, KeySet::Any));
    if end_on_response {
        plan.ending_on_response()
    } else {
        plan
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn trial_loop_contract(
        duration_ms in 200u64..3_000,
        key_ms in proptest::option::of(50u64..4_000),
        end_on_response in any::<bool>(),
    ) {
        let duration = Duration::from_millis(duration_ms);
        let script: Vec<(f64, Key)> = key_ms.map(|k| (k as f64 / 1e3, Key::Space)).into_iter().collect();
        let mut h = harness(bare_config(), &script);

        let outcome = h.session.run_trial(&plan(duration, end_on_response), |_| Scene::blank(BLACK)).unwrap();

        prop_assert_eq!(h.trigger.sent().len(), 1);
        prop_assert_eq!(outcome.frames, h.session.display.flips());

        let d = secs(duration);
        let f = secs(frame());
        match key_ms.map(|k| k as f64 / 1e3) {
            Some(k) if k + 2.0 * f < d => {
                let response = outcome.first_response().cloned();
                prop_assert!(response.is_some());
                let rt = response.map(|r| r.rt_secs()).unwrap_or_default();
                prop_assert!((rt - (k - f)).abs() < 1e-6, "rt {} for key at {}", rt, k);
                if end_on_response {
                    prop_assert!(secs(outcome.elapsed) <= k + 2.0 * f);
                } else {
                    prop_assert!(secs(outcome.elapsed) >= d);
                }
            }
            Some(k) if k <= d + 2.0 * f => {}
            _ => {
                prop_assert!(outcome.first_response().is_none());
                prop_assert!(secs(outcome.elapsed) >= d);
            }
        }
    }

    #[test]
    fn result_rows_match_executed_trials(
        trials in 1usize..6,
        escape_ms in proptest::option::of(100u64..6_000),
    ) {
        let fixture = Fixture::new("rows");
        let script: Vec<(f64, Key)> =
            escape_ms.map(|e| (e as f64 / 1e3, Key::Escape)).into_iter().collect();
        let mut h = harness(fixture.config(), &script);
        let duration = Duration::from_secs(1);

        let mut writer = h.session.results("rows", &["trial", "reaction_time"]).unwrap();
        let mut executed = 0;
        for i in 0..trials {
            match h.session.run_trial(&plan(duration, false), |_| Scene::blank(BLACK)) {
                Ok(outcome) => {
                    writer
                        .append(&(i, outcome.first_response().map(|r| r.rt_secs())))
                        .unwrap();
                    executed += 1;
                }
                Err(e) => {
                    prop_assert!(e.is_escape());
                    break;
                }
            }
        }
        h.session.shutdown().unwrap();

        let rows = read_csv(writer.path()).len() - 1;
        prop_assert_eq!(rows, executed);
        prop_assert_eq!(h.trigger.sent().len(), executed + usize::from(executed < trials));
        if escape_ms.is_none() {
            prop_assert_eq!(executed, trials);
        }
        prop_assert!(h.session.display.is_closed());
    }
}

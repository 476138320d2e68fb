//! Property tests: the parallel pipeline agrees with a sequential
//! reference model, and results do not depend on the worker count.

use proptest::prelude::*;

use parajoin::{Engine, EngineConfig, Relation};

fn engine_with_workers(workers: usize, relations: Vec<Relation>) -> Engine {
    let mut engine = Engine::new(EngineConfig::with_workers(workers)).unwrap();
    for relation in relations {
        engine.register_relation(relation);
    }
    engine
}

fn split_pairs(pairs: &[(u64, u64)]) -> Vec<Vec<u64>> {
    vec![
        pairs.iter().map(|p| p.0).collect(),
        pairs.iter().map(|p| p.1).collect(),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    // Filter output is the ascending subsequence a sequential scan keeps.
    #[test]
    fn filter_matches_sequential_reference(
        rows in prop::collection::vec((0u64..64, 0u64..1000), 0..96),
        constant in 0u64..64,
    ) {
        let (mut expected_key_sum, mut expected_val_sum, mut expected_rows) = (0u64, 0u64, 0u64);
        for &(key, value) in &rows {
            if key > constant {
                expected_key_sum = expected_key_sum.wrapping_add(key);
                expected_val_sum = expected_val_sum.wrapping_add(value);
                expected_rows += 1;
            }
        }

        for workers in [1usize, 2, 8] {
            let engine = engine_with_workers(
                workers,
                vec![Relation::new(split_pairs(&rows)).unwrap()],
            );
            let result = engine.execute(&format!("0|0.0>{constant}|0.0 0.1")).unwrap();
            prop_assert_eq!(result.result_size, expected_rows);
            prop_assert_eq!(&result.checksums, &vec![expected_key_sum, expected_val_sum]);
        }
    }

    // Join row count and checksums match the nested-loop reference,
    // independent of which side ends up as build side.
    #[test]
    fn join_matches_nested_loop_reference(
        left in prop::collection::vec((0u64..8, 0u64..1000), 0..96),
        right in prop::collection::vec((0u64..8, 0u64..1000), 0..96),
        constant in 0u64..1000,
    ) {
        let (mut sum_left, mut sum_right, mut rows) = (0u64, 0u64, 0u64);
        for &(lk, lv) in &left {
            if lv > constant {
                for &(rk, rv) in &right {
                    if lk == rk {
                        sum_left = sum_left.wrapping_add(lv);
                        sum_right = sum_right.wrapping_add(rv);
                        rows += 1;
                    }
                }
            }
        }

        for workers in [1usize, 3, 8] {
            let engine = engine_with_workers(
                workers,
                vec![
                    Relation::new(split_pairs(&left)).unwrap(),
                    Relation::new(split_pairs(&right)).unwrap(),
                ],
            );
            let result = engine
                .execute(&format!("0 1|0.0=1.0&0.1>{constant}|0.1 1.1"))
                .unwrap();
            prop_assert_eq!(result.result_size, rows);
            prop_assert_eq!(&result.checksums, &vec![sum_left, sum_right]);
        }
    }

    // Self-join keeps exactly the rows whose two columns agree.
    #[test]
    fn self_join_matches_sequential_reference(
        rows in prop::collection::vec((0u64..4, 0u64..4, 0u64..1000), 0..96),
    ) {
        let (mut expected_sum, mut expected_rows) = (0u64, 0u64);
        for &(a, b, v) in &rows {
            if a == b {
                expected_sum = expected_sum.wrapping_add(v);
                expected_rows += 1;
            }
        }

        let columns = vec![
            rows.iter().map(|r| r.0).collect(),
            rows.iter().map(|r| r.1).collect(),
            rows.iter().map(|r| r.2).collect(),
        ];
        for workers in [1usize, 8] {
            let engine = engine_with_workers(workers, vec![Relation::new(columns.clone()).unwrap()]);
            let result = engine.execute("0|0.0=0.1|0.2").unwrap();
            prop_assert_eq!(result.result_size, expected_rows);
            prop_assert_eq!(&result.checksums, &vec![expected_sum]);
        }
    }
}

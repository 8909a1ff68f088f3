#![cfg(test)]

// Property tests for VarMap kept inside the crate so they exercise the
// packed-record layout directly alongside the public API.

use crate::var_map::VarMap;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::HashMap;

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys, pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Insert(usize, Vec<u8>),
    InsertZeroed(usize, usize),
    Remove(usize),
    Get(usize),
    Iterate,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<Op>)> {
    proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..6), 1..=8).prop_flat_map(
        |pool| {
            let idxs: Vec<usize> = (0..pool.len()).collect();
            let idx = proptest::sample::select(idxs);
            let op = prop_oneof![
                (
                    idx.clone(),
                    proptest::collection::vec(any::<u8>(), 0..24)
                )
                    .prop_map(|(i, v)| Op::Insert(i, v)),
                (idx.clone(), 0usize..24).prop_map(|(i, n)| Op::InsertZeroed(i, n)),
                idx.clone().prop_map(Op::Remove),
                idx.clone().prop_map(Op::Get),
                Just(Op::Iterate),
            ];
            proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
        },
    )
}

fn run_scenario(bucket_count: usize, pool: Vec<Vec<u8>>, ops: Vec<Op>) -> Result<(), TestCaseError> {
    let mut sut = VarMap::new(bucket_count);
    let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(i, v) => {
                sut.insert(&pool[i], &v);
                model.insert(pool[i].clone(), v);
            }
            Op::InsertZeroed(i, n) => {
                sut.insert_zeroed(&pool[i], n);
                model.insert(pool[i].clone(), vec![0u8; n]);
            }
            Op::Remove(i) => {
                let removed = sut.remove(&pool[i]);
                let model_removed = model.remove(&pool[i]).is_some();
                prop_assert_eq!(removed, model_removed);
            }
            Op::Get(i) => {
                let got = sut.get_value(&pool[i]);
                prop_assert_eq!(got, model.get(&pool[i]).map(|v| v.as_slice()));
                if let Some(entry) = sut.get(&pool[i]) {
                    prop_assert_eq!(entry.key, pool[i].as_slice());
                }
            }
            Op::Iterate => {
                let mut seen: Vec<(Vec<u8>, Vec<u8>)> = sut
                    .iter()
                    .map(|e| (e.key.to_vec(), e.value.to_vec()))
                    .collect();
                let mut expected: Vec<(Vec<u8>, Vec<u8>)> =
                    model.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
                seen.sort();
                expected.sort();
                prop_assert_eq!(&seen, &expected);
                // Keys yielded are pairwise distinct under the comparator.
                let distinct = seen.windows(2).all(|w| w[0].0 != w[1].0);
                prop_assert!(distinct, "iteration yielded a duplicate key");
            }
        }

        // Post-conditions after each op.
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }
    Ok(())
}

// Property: State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - `get` after `insert` returns bytes identical to the inserted value.
// - Re-inserting an existing key replaces in place without changing the
//   entry count or other entries' associations.
// - `remove` then `get` yields absent; removing an absent key mutates
//   nothing.
// - Iteration yields exactly N entries with pairwise-distinct keys.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(8, pool, ops)?;
    }
}

// Property: Same invariants with a single bucket, the worst case where
// every record shares one packed buffer and every replace and remove
// slides every other entry's bytes.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_single_bucket((pool, ops) in arb_scenario()) {
        run_scenario(1, pool, ops)?;
    }
}

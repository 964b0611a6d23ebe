#![cfg(test)]

// Property tests for SlotTable kept inside the crate so they can reach the
// crate-private backing table directly.

use crate::config::{MapConfig, MAX_CAPACITY};
use crate::table::{SlotId, SlotTable};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeSet, HashMap};
use std::hash::BuildHasher;

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Put(usize, i32),
    Remove(usize),
    RemoveWhere(usize),
    Find(usize),
    Mutate(usize, i32),
    Iterate,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>, usize, f32)> {
    let pool = proptest::collection::vec("[a-z]{0,5}", 1..=8);
    let cfg = (0usize..8, prop_oneof![Just(0.25f32), Just(0.75f32), Just(1.5f32)]);
    (pool, cfg).prop_flat_map(|(pool, (cap, lf))| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Put(i, v)),
            2 => idx.clone().prop_map(OpI::Remove),
            1 => idx.clone().prop_map(OpI::RemoveWhere),
            2 => idx.clone().prop_map(OpI::Find),
            2 => (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            1 => Just(OpI::Iterate),
            1 => Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops, cap, lf))
    })
}

// State-machine equivalence against std::collections::HashMap.
// Invariants exercised across random operation sequences:
// - A put on a present key replaces the value in place and keeps the slot id.
// - `find` parity with the model; ids of live entries are stable.
// - `remove(id)` returns the owned pair and invalidates the id; stale ids
//   never resolve, even after slot reuse.
// - `iter` yields each live entry exactly once.
// - The modification count moves exactly on structural changes.
// - `len`/`is_empty` parity; the logical capacity keeps `len` within the
//   load-factor threshold.
fn run<F>(pool: &[String], ops: Vec<OpI>, config: MapConfig, hash: F) -> Result<(), TestCaseError>
where
    F: Fn(&str) -> u64,
{
    let mut sut: SlotTable<String, i32> = SlotTable::with_config(config);
    let mut model: HashMap<String, i32> = HashMap::new();
    let mut live: HashMap<String, SlotId> = HashMap::new();
    let mut stale: Vec<SlotId> = Vec::new();

    for op in ops {
        let before = sut.mod_count();
        let mut structural = false;
        match op {
            OpI::Put(i, v) => {
                let k = &pool[i];
                let h = hash(k);
                match sut.find(h, |e| e == k) {
                    Some(id) => {
                        prop_assert_eq!(Some(&id), live.get(k));
                        let old = sut.replace(id, v);
                        prop_assert_eq!(old, model.insert(k.clone(), v));
                    }
                    None => {
                        prop_assert!(!model.contains_key(k));
                        let id = sut.insert_new(h, k.clone(), v);
                        live.insert(k.clone(), id);
                        model.insert(k.clone(), v);
                        structural = true;
                    }
                }
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                if let Some(id) = live.remove(k) {
                    let (kk, vv) = sut.remove(id).expect("live id removes");
                    prop_assert_eq!(&kk, k);
                    prop_assert_eq!(Some(vv), model.remove(k));
                    stale.push(id);
                    structural = true;
                } else {
                    prop_assert!(sut.find(hash(k), |e| e == k).is_none());
                }
            }
            OpI::RemoveWhere(i) => {
                let k = &pool[i];
                let removed = sut.remove_where(hash(k), |e| e == k);
                prop_assert_eq!(removed.map(|(_, v)| v), model.remove(k));
                if let Some(id) = live.remove(k) {
                    stale.push(id);
                    structural = true;
                }
            }
            OpI::Find(i) => {
                let k = &pool[i];
                let found = sut.find(hash(k), |e| e == k);
                prop_assert_eq!(found.as_ref(), live.get(k));
                prop_assert_eq!(found.and_then(|id| sut.value(id)), model.get(k));
            }
            OpI::Mutate(i, d) => {
                let k = &pool[i];
                if let Some(&id) = live.get(k) {
                    let vr = sut.value_mut(id).expect("live id resolves");
                    *vr = vr.saturating_add(d);
                    if let Some(mv) = model.get_mut(k) {
                        *mv = mv.saturating_add(d);
                    }
                }
            }
            OpI::Iterate => {
                let s_keys: Vec<String> = sut.iter().map(|(_, k, _)| k.clone()).collect();
                let uniq: BTreeSet<_> = s_keys.iter().cloned().collect();
                prop_assert_eq!(s_keys.len(), uniq.len(), "each entry once");
                let m_keys: BTreeSet<_> = model.keys().cloned().collect();
                prop_assert_eq!(uniq, m_keys);
            }
            OpI::Clear => {
                let n = sut.clear();
                prop_assert_eq!(n, model.len());
                structural = n > 0;
                model.clear();
                stale.extend(live.drain().map(|(_, id)| id));
            }
        }

        prop_assert_eq!(sut.mod_count() != before, structural);
        for &id in &stale {
            prop_assert!(sut.value(id).is_none());
        }
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        prop_assert!(sut.len() <= sut.load_limit());
        prop_assert!(sut.capacity() <= MAX_CAPACITY);
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops, cap, lf) in arb_scenario()) {
        let s = RandomState::new();
        run(&pool, ops, MapConfig::new(cap, lf), |k| s.hash_one(k))?;
    }

    // Same invariants under worst-case collision behavior (constant hash),
    // which stresses equality probing and identity unlinking in the index.
    #[test]
    fn prop_state_machine_with_collisions((pool, ops, cap, lf) in arb_scenario()) {
        run(&pool, ops, MapConfig::new(cap, lf), |_| 0)?;
    }
}

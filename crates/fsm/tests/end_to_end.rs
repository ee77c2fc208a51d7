//! End-to-end scenarios exercising the public API the way a caller
//! outside this workspace would, one test per named scenario.

use fsm::sequence::ads::get_adaptive_distinguishing_sequence;
use fsm::sequence::pds::get_preset_distinguishing_sequence;
use fsm::sequence::separating::shortest_separating_sequences;
use fsm::sequence::sync_homing::{get_homing_sequence, get_synchronizing_sequence};
use fsm::Dfsm;
use fsm_core::MachineKind;

/// Lets `RUST_LOG=debug cargo test` surface the search/fallback `debug!`
/// calls scattered across `fsm::sequence::*` while these scenarios run.
fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn two_state_mealy() -> Dfsm {
    let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
    m.set_transition(0, 0, 0, Some(0)).unwrap();
    m.set_transition(0, 1, 1, Some(0)).unwrap();
    m.set_transition(1, 0, 0, Some(0)).unwrap();
    m.set_transition(1, 1, 1, Some(1)).unwrap();
    m
}

fn three_state_moore_no_pds() -> Dfsm {
    let mut m = Dfsm::create(3, 2, 2, MachineKind::Moore);
    m.set_output(0, 0, None).unwrap();
    m.set_output(1, 0, None).unwrap();
    m.set_output(2, 1, None).unwrap();
    m.set_transition(0, 0, 1, None).unwrap();
    m.set_transition(0, 1, 2, None).unwrap();
    m.set_transition(1, 0, 0, None).unwrap();
    m.set_transition(1, 1, 2, None).unwrap();
    m.set_transition(2, 0, 2, None).unwrap();
    m.set_transition(2, 1, 1, None).unwrap();
    m
}

/// Full-permutation 3-state Mealy: input `a` is a 3-cycle, input `b`
/// swaps states 0 and 1 and fixes state 2. Every input is a bijection
/// on the state set, so no sequence can ever collapse it — there is no
/// synchronizing sequence — while a homing sequence still exists,
/// since observing `b`'s output already tells 2 apart from {0,1} and a
/// further `a` then tells 0 apart from 1.
fn full_permutation_mealy() -> Dfsm {
    let mut m = Dfsm::create(3, 2, 2, MachineKind::Mealy);
    m.set_transition(0, 0, 1, Some(0)).unwrap();
    m.set_transition(1, 0, 2, Some(0)).unwrap();
    m.set_transition(2, 0, 0, Some(1)).unwrap();
    m.set_transition(0, 1, 1, Some(0)).unwrap();
    m.set_transition(1, 1, 0, Some(0)).unwrap();
    m.set_transition(2, 1, 2, Some(1)).unwrap();
    m
}

#[test]
fn scenario_1_two_state_mealy_pds() {
    init_tracing();
    let m = two_state_mealy();
    let seq = shortest_separating_sequences(&m, true);
    assert_eq!(seq[fsm::sequence::pair_index::idx(0, 1)], vec![1]);
    assert_eq!(get_preset_distinguishing_sequence(&m, true), Some(vec![1]));

    let suite = fsm::testing::w_method(&m).cases();
    assert!(suite.contains(&vec![1]));
}

#[test]
fn scenario_2_moore_no_pds_has_ads() {
    init_tracing();
    let m = three_state_moore_no_pds();
    assert_eq!(get_preset_distinguishing_sequence(&m, false), None);

    let tree = get_adaptive_distinguishing_sequence(&m).expect("a reduced machine always has an ADS");
    assert!(tree.is_complete());
    for (i, j) in fsm::sequence::pair_index::all_pairs(m.num_states()) {
        assert!(tree.distinguished.contains_key(&fsm::sequence::pair_index::idx(i, j)));
    }
}

#[test]
fn scenario_5_fault_coverage_weak_suite() {
    init_tracing();
    let m = two_state_mealy();
    let results = fsm::fault_coverage::indistinguishable_machines(&m, &[vec![0]], 0);
    assert!(
        results.len() >= 2,
        "expected at least two machines indistinguishable from the reference on [0], got {}",
        results.len()
    );
    for candidate in &results {
        assert_eq!(
            candidate.get_output_along_path(0, &[0]),
            m.get_output_along_path(0, &[0])
        );
    }
}

#[test]
fn scenario_6_homing_without_synchronizing() {
    init_tracing();
    let m = full_permutation_mealy();
    assert_eq!(
        get_synchronizing_sequence(&m),
        None,
        "a machine of pure permutations can never be synchronized"
    );

    let homing = get_homing_sequence(&m).expect("a homing sequence exists even without a synchronizing one");
    // Applying it from every starting state resolves the end state: two
    // starting states that land on the same observed output must also
    // land on the same actual end state.
    let mut by_output: std::collections::HashMap<Vec<fsm_core::Output>, fsm_core::StateId> = std::collections::HashMap::new();
    for s in m.states() {
        let out = m.get_output_along_path(s, &homing);
        let end = m.get_end_path_state(s, &homing);
        if let Some(&other_end) = by_output.get(&out) {
            assert_eq!(other_end, end, "homing sequence must resolve the end state from its output alone");
        } else {
            by_output.insert(out, end);
        }
    }
}

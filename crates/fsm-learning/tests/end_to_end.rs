//! End-to-end learning scenarios driven entirely through the public
//! `BlackBox`/`Teacher` surface, the way an external caller would.

use fsm::Dfsm;
use fsm_core::MachineKind;
use fsm_learning::blackbox::ModelBackedBlackBox;
use fsm_learning::learn::{learn_lstar, learn_observation_pack, CounterexampleProcessing};
use fsm_learning::Teacher;

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// Accepts strings over {0,1} of even length: q0 accepting, q1 not.
fn even_length_acceptor() -> Dfsm {
    let mut m = Dfsm::create(2, 2, 2, MachineKind::Dfa);
    m.set_output(0, 1, None).unwrap();
    m.set_output(1, 0, None).unwrap();
    m.set_transition(0, 0, 1, None).unwrap();
    m.set_transition(0, 1, 1, None).unwrap();
    m.set_transition(1, 0, 0, None).unwrap();
    m.set_transition(1, 1, 0, None).unwrap();
    m
}

/// 4-state Mealy with no PDS but with an ADS (two independent
/// 2-cycles distinguished only by output, so no single sequence works
/// preset but an adaptive one does).
fn four_state_mealy_no_pds() -> Dfsm {
    let mut m = Dfsm::create(4, 2, 2, MachineKind::Mealy);
    m.set_transition(0, 0, 1, Some(0)).unwrap();
    m.set_transition(0, 1, 2, Some(0)).unwrap();
    m.set_transition(1, 0, 0, Some(1)).unwrap();
    m.set_transition(1, 1, 3, Some(0)).unwrap();
    m.set_transition(2, 0, 3, Some(0)).unwrap();
    m.set_transition(2, 1, 0, Some(1)).unwrap();
    m.set_transition(3, 0, 2, Some(1)).unwrap();
    m.set_transition(3, 1, 1, Some(1)).unwrap();
    m
}

#[test]
fn scenario_3_lstar_on_even_length_acceptor() {
    init_tracing();
    let reference = even_length_acceptor();
    let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
    let mut hyp = learn_lstar(&teacher, CounterexampleProcessing::AllPrefixes, false, 2);

    let mut minimized_ref = reference.clone();
    minimized_ref.minimize();
    hyp.minimize();
    assert!(hyp.are_isomorphic(&minimized_ref));
    assert_eq!(hyp.num_states(), 2);

    let verify = Teacher::new(ModelBackedBlackBox::new(reference), false);
    assert!(verify.equivalence_query(&hyp, 0).is_none());
}

#[test]
fn scenario_4_observation_pack_bounded_queries() {
    init_tracing();
    let reference = four_state_mealy_no_pds();
    let teacher = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
    let hyp = learn_observation_pack(&teacher, 4);

    let verify = Teacher::new(ModelBackedBlackBox::new(reference.clone()), false);
    assert!(verify.equivalence_query(&hyp, 0).is_none());

    let n = reference.num_states() as u64;
    let num_inputs = reference.num_inputs() as u64;
    assert!(
        teacher.oq_count() <= n * n * num_inputs,
        "observation-pack issued {} output queries, expected at most N^2*|I| = {}",
        teacher.oq_count(),
        n * n * num_inputs
    );
}

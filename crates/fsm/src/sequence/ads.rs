//! C3.3 (adaptive half): the Adaptive Distinguishing Sequence,
//! expressed as a view over the [`SplittingTree`] (spec §3.6, §4.3.3).

use fsm_core::{Input, Output};

use crate::Dfsm;

use super::splitting_tree::SplittingTree;

/// An adaptive distinguishing sequence: the splitting tree of `m`,
/// guaranteed complete (every leaf a genuine singleton). Replay it
/// against a black box by calling [`SplittingTree::branch`] with the
/// outputs observed along each node's `distinguishing_seq`, stopping
/// at [`SplittingTree::identified_state`].
///
/// # Example
/// ```
/// use fsm::Dfsm;
/// use fsm::sequence::ads::get_adaptive_distinguishing_sequence;
/// use fsm_core::{MachineKind, STOUT_INPUT};
///
/// let mut m = Dfsm::create(3, 2, 2, MachineKind::Moore);
/// m.set_output(0, 0, None).unwrap();
/// m.set_output(1, 0, None).unwrap();
/// m.set_output(2, 1, None).unwrap();
/// m.set_transition(0, 0, 1, None).unwrap();
/// m.set_transition(0, 1, 0, None).unwrap();
/// m.set_transition(1, 0, 2, None).unwrap();
/// m.set_transition(1, 1, 1, None).unwrap();
/// m.set_transition(2, 0, 2, None).unwrap();
/// m.set_transition(2, 1, 0, None).unwrap();
/// let ads = get_adaptive_distinguishing_sequence(&m).unwrap();
/// // A pure-Moore machine can only be split by reading state output,
/// // so the root witness is always a bare STOUT.
/// assert_eq!(ads.node(ads.root).distinguishing_seq, Some(vec![STOUT_INPUT]));
/// ```
pub fn get_adaptive_distinguishing_sequence(m: &Dfsm) -> Option<SplittingTree> {
    let tree = SplittingTree::build(m, false);
    tree.is_complete().then_some(tree)
}

/// Replays an ADS against `m` starting from state `s`, returning the
/// unique state it identifies (always `s` itself, for a correct ADS
/// and a correctly-behaving `m` — useful for property tests).
pub fn replay(tree: &SplittingTree, m: &Dfsm, s: fsm_core::StateId) -> Option<fsm_core::StateId> {
    let mut node = tree.root;
    let mut cur = s;
    loop {
        if let Some(identified) = tree.identified_state(node) {
            return Some(identified);
        }
        let seq: &[Input] = tree.node(node).distinguishing_seq.as_ref()?;
        let out: Vec<Output> = m.get_output_along_path(cur, seq);
        cur = m.get_end_path_state(cur, seq);
        node = tree.branch(node, &out)?;
    }
}

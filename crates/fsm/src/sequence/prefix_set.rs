//! C2: the prefix set, a trie of input sequences (spec §3.4, §4.2).

use fsm_core::Input;

/// One trie node: a single input symbol plus a sibling link (the next
/// input tried at the same depth) and a child link (continuation).
/// Arena-indexed rather than owning-pointer based (spec §9 "shared
/// ownership cycles"), so detaching a branch is just pointer surgery.
#[derive(Debug, Clone)]
struct Node {
    symbol: Input,
    sibling: Option<usize>,
    child: Option<usize>,
    /// Set iff some inserted sequence ends exactly at this node.
    terminal: bool,
}

/// A trie over input sequences.
///
/// # Example
/// ```
/// use fsm::sequence::PrefixSet;
///
/// let mut ps = PrefixSet::new();
/// ps.insert(&[0, 1, 2]);
/// assert_eq!(ps.contains(&[0, 1]), 2);
/// assert_eq!(ps.contains(&[0, 1, 2, 3]), 3);
/// assert_eq!(ps.get_maximal_sequences(), vec![vec![0, 1, 2]]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct PrefixSet {
    nodes: Vec<Node>,
    root: Option<usize>,
}

impl PrefixSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Inserts `seq`, returning `true` iff at least one new node was
    /// created (i.e. `seq` was not already fully present as a prefix).
    pub fn insert(&mut self, seq: &[Input]) -> bool {
        if seq.is_empty() {
            return false;
        }
        let mut created = false;
        let mut parent: Option<usize> = None;
        for (depth, &sym) in seq.iter().enumerate() {
            let head = match parent {
                None => self.root,
                Some(p) => self.nodes[p].child,
            };
            let found = self.find_in_chain(head, sym);
            let idx = match found {
                Some(idx) => idx,
                None => {
                    let idx = self.nodes.len();
                    self.nodes.push(Node {
                        symbol: sym,
                        sibling: head,
                        child: None,
                        terminal: false,
                    });
                    match parent {
                        None => self.root = Some(idx),
                        Some(p) => self.nodes[p].child = Some(idx),
                    }
                    created = true;
                    idx
                }
            };
            if depth + 1 == seq.len() {
                self.nodes[idx].terminal = true;
            }
            parent = Some(idx);
        }
        created
    }

    fn find_in_chain(&self, head: Option<usize>, sym: Input) -> Option<usize> {
        let mut cur = head;
        while let Some(idx) = cur {
            if self.nodes[idx].symbol == sym {
                return Some(idx);
            }
            cur = self.nodes[idx].sibling;
        }
        None
    }

    /// Length of the longest prefix of `seq` present in the trie (the
    /// full length if `seq` is entirely contained), or `-1` if `seq`
    /// is empty.
    pub fn contains(&self, seq: &[Input]) -> i64 {
        if seq.is_empty() {
            return -1;
        }
        let mut cur = self.root;
        let mut matched = 0i64;
        for &sym in seq {
            match self.find_in_chain(cur, sym) {
                Some(idx) => {
                    matched += 1;
                    cur = self.nodes[idx].child;
                }
                None => break,
            }
        }
        matched
    }

    fn find_path(&self, seq: &[Input]) -> Option<Vec<usize>> {
        let mut path = Vec::with_capacity(seq.len());
        let mut cur = self.root;
        for &sym in seq {
            let idx = self.find_in_chain(cur, sym)?;
            path.push(idx);
            cur = self.nodes[idx].child;
        }
        Some(path)
    }

    fn collect_from(&self, node: usize, path: &mut Vec<Input>, out: &mut Vec<Vec<Input>>) {
        path.push(self.nodes[node].symbol);
        match self.nodes[node].child {
            None => out.push(path.clone()),
            Some(first_child) => {
                let mut c = Some(first_child);
                while let Some(idx) = c {
                    self.collect_from(idx, path, out);
                    c = self.nodes[idx].sibling;
                }
            }
        }
        path.pop();
    }

    /// Every maximal (root-to-leaf) sequence. Prefix-free by
    /// construction and covers every inserted sequence.
    pub fn get_maximal_sequences(&self) -> Vec<Vec<Input>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        let mut c = self.root;
        while let Some(idx) = c {
            self.collect_from(idx, &mut path, &mut out);
            c = self.nodes[idx].sibling;
        }
        out
    }

    /// Unlinks `idx` from the sibling chain at `parent`'s child slot
    /// (or the trie root, when `parent` is `None`), patching sibling
    /// pointers so the rest of the chain survives intact.
    fn unlink(&mut self, parent: Option<usize>, idx: usize) {
        let head = match parent {
            None => self.root,
            Some(p) => self.nodes[p].child,
        };
        if head == Some(idx) {
            let new_head = self.nodes[idx].sibling;
            match parent {
                None => self.root = new_head,
                Some(p) => self.nodes[p].child = new_head,
            }
        } else {
            let mut cur = head;
            while let Some(cidx) = cur {
                if self.nodes[cidx].sibling == Some(idx) {
                    self.nodes[cidx].sibling = self.nodes[idx].sibling;
                    break;
                }
                cur = self.nodes[cidx].sibling;
            }
        }
    }

    /// Detaches the given root-to-leaf index path, removing trailing
    /// nodes bottom-up as long as they become unused (no remaining
    /// child and not an endpoint of another inserted sequence), while
    /// leaving every sibling branch untouched.
    fn detach_path(&mut self, path: &[usize]) {
        if path.is_empty() {
            return;
        }
        let mut depth = path.len();
        let mut idx = path[depth - 1];
        loop {
            depth -= 1;
            let parent = if depth == 0 { None } else { Some(path[depth - 1]) };
            self.unlink(parent, idx);
            let Some(p) = parent else { break };
            if self.nodes[p].child.is_none() && !self.nodes[p].terminal {
                idx = p;
                continue;
            }
            break;
        }
    }

    /// Pops one maximal sequence (an arbitrary root-to-leaf path),
    /// removing it from the trie while preserving all sibling
    /// branches. `None` if the trie is empty.
    pub fn pop_maximal_sequence(&mut self) -> Option<Vec<Input>> {
        self.root?;
        let mut path = Vec::new();
        let mut cur = self.root;
        while let Some(idx) = cur {
            path.push(idx);
            cur = self.nodes[idx].child;
        }
        let seq = path.iter().map(|&i| self.nodes[i].symbol).collect();
        self.detach_path(&path);
        Some(seq)
    }

    /// Finds a longest branch continuing `prefix`, then detaches it
    /// (preserving siblings), returning the full sequence `prefix ++
    /// continuation`. `None` if `prefix` is not present in the trie.
    pub fn pop_maximal_sequence_with_given_prefix(&mut self, prefix: &[Input]) -> Option<Vec<Input>> {
        if prefix.is_empty() {
            return self.pop_maximal_sequence();
        }
        let mut path = self.find_path(prefix)?;
        let mut cur = self.nodes[*path.last().unwrap()].child;
        while let Some(idx) = cur {
            path.push(idx);
            cur = self.nodes[idx].child;
        }
        let seq = path.iter().map(|&i| self.nodes[i].symbol).collect();
        self.detach_path(&path);
        Some(seq)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_contains() {
        let mut ps = PrefixSet::new();
        assert!(ps.insert(&[1, 2, 3]));
        assert!(!ps.insert(&[1, 2]));
        assert_eq!(ps.contains(&[1, 2]), 2);
        assert_eq!(ps.contains(&[1, 2, 3, 4]), 3);
        assert_eq!(ps.contains(&[9]), 0);
        assert_eq!(ps.contains(&[]), -1);
    }

    #[test]
    fn maximal_sequences_are_prefix_free_and_cover_inserts() {
        let mut ps = PrefixSet::new();
        ps.insert(&[0, 1]);
        ps.insert(&[0, 2]);
        ps.insert(&[1]);
        let mut maximal = ps.get_maximal_sequences();
        maximal.sort();
        assert_eq!(maximal, vec![vec![0, 1], vec![0, 2], vec![1]]);
        for a in &maximal {
            for b in &maximal {
                if a != b {
                    assert!(!b.starts_with(a.as_slice()));
                }
            }
        }
    }

    #[test]
    fn pop_maximal_sequence_preserves_siblings() {
        let mut ps = PrefixSet::new();
        ps.insert(&[0, 1]);
        ps.insert(&[0, 2]);
        let popped = ps.pop_maximal_sequence().unwrap();
        assert!(popped == vec![0, 1] || popped == vec![0, 2]);
        let remaining = ps.get_maximal_sequences();
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0], popped);
    }

    #[test]
    fn pop_with_given_prefix() {
        let mut ps = PrefixSet::new();
        ps.insert(&[0, 1, 2]);
        ps.insert(&[0, 1, 3]);
        ps.insert(&[5]);
        let popped = ps.pop_maximal_sequence_with_given_prefix(&[0, 1]).unwrap();
        assert!(popped == vec![0, 1, 2] || popped == vec![0, 1, 3]);
        let remaining = ps.get_maximal_sequences();
        assert!(remaining.iter().any(|s| s == &vec![5]));
        assert_eq!(remaining.len(), 2);
    }

    #[test]
    fn pop_missing_prefix_is_none() {
        let mut ps = PrefixSet::new();
        ps.insert(&[0, 1]);
        assert!(ps.pop_maximal_sequence_with_given_prefix(&[9]).is_none());
    }
}

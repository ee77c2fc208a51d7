//! Loading and saving the on-disk `.fsm` file format, and the
//! human-readable sequence string form used by diagnostics (spec §6).

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use fsm_core::{FsmError, Input, MachineKind, STOUT_INPUT};

use crate::Dfsm;

fn kind_from_token(token: &str) -> Result<MachineKind, FsmError> {
    match token {
        "Mealy" => Ok(MachineKind::Mealy),
        "Moore" => Ok(MachineKind::Moore),
        "Dfa" => Ok(MachineKind::Dfa),
        "Dfsm" => Ok(MachineKind::Dfsm),
        other => Err(FsmError::Parse(format!("unknown machine kind '{other}'"))),
    }
}

fn kind_token(kind: MachineKind) -> &'static str {
    match kind {
        MachineKind::Mealy => "Mealy",
        MachineKind::Moore => "Moore",
        MachineKind::Dfa => "Dfa",
        MachineKind::Dfsm => "Dfsm",
    }
}

/// Parses the `.fsm` text format (spec §6): header `numStates numInputs
/// numOutputs kind`, then (for kinds with a state output) one
/// state-output row, then one transition block per state listing
/// `numInputs` `next/[output]` entries, `-` marking an absent
/// transition. A malformed or kind-inconsistent file returns
/// [`FsmError::Parse`]; callers must treat that as "skip this file",
/// never as a partially-built model.
///
/// # Example
/// ```
/// use fsm::io::{load_str, save_str};
/// use fsm::Dfsm;
/// use fsm_core::MachineKind;
///
/// let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
/// m.set_transition(0, 0, 0, Some(0)).unwrap();
/// m.set_transition(0, 1, 1, Some(0)).unwrap();
/// m.set_transition(1, 0, 0, Some(0)).unwrap();
/// m.set_transition(1, 1, 1, Some(1)).unwrap();
/// let text = save_str(&m);
/// let loaded = load_str(&text).unwrap();
/// assert!(m.are_isomorphic(&loaded));
/// ```
pub fn load_str(text: &str) -> Result<Dfsm, FsmError> {
    let mut lines = text.lines().filter(|l| !l.trim().is_empty());
    let header = lines
        .next()
        .ok_or_else(|| FsmError::Parse("empty file".into()))?;
    let mut header_fields = header.split_whitespace();
    let mut next_u32 = |field: &str| -> Result<u32, FsmError> {
        header_fields
            .next()
            .ok_or_else(|| FsmError::Parse(format!("missing {field} in header")))?
            .parse::<u32>()
            .map_err(|e| FsmError::Parse(format!("bad {field}: {e}")))
    };
    let num_states = next_u32("numStates")?;
    let num_inputs = next_u32("numInputs")?;
    let num_outputs = next_u32("numOutputs")?;
    let kind_token = header_fields
        .next()
        .ok_or_else(|| FsmError::Parse("missing kind in header".into()))?;
    let kind = kind_from_token(kind_token)?;

    let mut m = Dfsm::create(num_states, num_inputs, num_outputs, kind);

    if kind.has_state_output() {
        for s in 0..num_states {
            let line = lines
                .next()
                .ok_or_else(|| FsmError::Parse(format!("missing state-output row for state {s}")))?;
            let out = line
                .trim()
                .parse::<u32>()
                .map_err(|e| FsmError::Parse(format!("bad state output for state {s}: {e}")))?;
            m.set_output(s, out, None)?;
        }
    }

    for s in 0..num_states {
        let line = lines
            .next()
            .ok_or_else(|| FsmError::Parse(format!("missing transition row for state {s}")))?;
        for (i, field) in line.split_whitespace().enumerate() {
            let i = i as u32;
            if i >= num_inputs {
                break;
            }
            if field == "-" {
                continue;
            }
            if kind.has_transition_output() {
                let (t, out) = field
                    .split_once('/')
                    .ok_or_else(|| FsmError::Parse(format!("state {s} input {i}: expected 'next/output'")))?;
                let t = t
                    .parse::<u32>()
                    .map_err(|e| FsmError::Parse(format!("state {s} input {i}: bad next state: {e}")))?;
                let out = out
                    .parse::<u32>()
                    .map_err(|e| FsmError::Parse(format!("state {s} input {i}: bad output: {e}")))?;
                m.set_transition(s, i, t, Some(out))?;
            } else {
                let t = field
                    .parse::<u32>()
                    .map_err(|e| FsmError::Parse(format!("state {s} input {i}: bad next state: {e}")))?;
                m.set_transition(s, i, t, None)?;
            }
        }
    }

    Ok(m)
}

/// Renders `m` in the `.fsm` text format understood by [`load_str`].
pub fn save_str(m: &Dfsm) -> String {
    let mut out = String::new();
    writeln!(
        out,
        "{} {} {} {}",
        m.num_states(),
        m.num_inputs(),
        m.num_outputs(),
        kind_token(m.kind())
    )
    .unwrap();

    if m.kind().has_state_output() {
        for s in m.states() {
            writeln!(out, "{}", m.get_state_output(s)).unwrap();
        }
    }

    for s in m.states() {
        let mut row = String::new();
        for i in m.inputs() {
            if i > 0 {
                row.push(' ');
            }
            if !m.has_transition(s, i) {
                row.push('-');
                continue;
            }
            let t = m.get_next_state(s, i);
            if m.kind().has_transition_output() {
                write!(row, "{}/{}", t, m.get_output(s, i)).unwrap();
            } else {
                write!(row, "{t}").unwrap();
            }
        }
        writeln!(out, "{row}").unwrap();
    }
    out
}

/// Loads an FSM from a `.fsm` file on disk.
pub fn load_file(path: impl AsRef<Path>) -> Result<Dfsm, FsmError> {
    let text = fs::read_to_string(path)?;
    load_str(&text)
}

/// Writes `m` to a `.fsm` file on disk.
pub fn save_file(m: &Dfsm, path: impl AsRef<Path>) -> Result<(), FsmError> {
    fs::write(path, save_str(m))?;
    Ok(())
}

/// The human-readable sequence string form of spec §6: comma-separated
/// inputs, with [`STOUT_INPUT`] rendered as `S` and every other input
/// as its decimal value.
///
/// # Example
/// ```
/// use fsm::io::sequence_to_string;
/// use fsm_core::STOUT_INPUT;
///
/// assert_eq!(sequence_to_string(&[0, 1, STOUT_INPUT]), "0,1,S");
/// ```
pub fn sequence_to_string(seq: &[Input]) -> String {
    seq.iter()
        .map(|&i| if i == STOUT_INPUT { "S".to_string() } else { i.to_string() })
        .collect::<Vec<_>>()
        .join(",")
}

/// Parses the inverse of [`sequence_to_string`].
pub fn sequence_from_string(s: &str) -> Result<Vec<Input>, FsmError> {
    if s.trim().is_empty() {
        return Ok(Vec::new());
    }
    s.split(',')
        .map(|tok| {
            let tok = tok.trim();
            if tok == "S" {
                Ok(STOUT_INPUT)
            } else {
                tok.parse::<u32>()
                    .map_err(|e| FsmError::Parse(format!("bad input token '{tok}': {e}")))
            }
        })
        .collect()
}

/// Every `.fsm` file directly inside `dir`, in directory-listing order
/// (spec §6 "Directory traversal picks every `.fsm` file"). A file that
/// fails to parse is reported rather than silently dropped, so a
/// caller building a CSV report (spec §6) can emit one diagnostic row
/// per bad file instead of skipping it invisibly.
pub fn load_directory(dir: impl AsRef<Path>) -> Result<Vec<(String, Result<Dfsm, FsmError>)>, FsmError> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("fsm") {
            continue;
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        out.push((name, load_file(&path)));
    }
    out.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use fsm_core::MachineKind;

    fn two_state_mealy() -> Dfsm {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 0, Some(0)).unwrap();
        m.set_transition(0, 1, 1, Some(0)).unwrap();
        m.set_transition(1, 0, 0, Some(0)).unwrap();
        m.set_transition(1, 1, 1, Some(1)).unwrap();
        m
    }

    fn reduced_moore_example() -> Dfsm {
        let mut m = Dfsm::create(3, 2, 2, MachineKind::Moore);
        m.set_output(0, 0, None).unwrap();
        m.set_output(1, 0, None).unwrap();
        m.set_output(2, 1, None).unwrap();
        m.set_transition(0, 0, 1, None).unwrap();
        m.set_transition(0, 1, 0, None).unwrap();
        m.set_transition(1, 0, 2, None).unwrap();
        m.set_transition(1, 1, 1, None).unwrap();
        m.set_transition(2, 0, 2, None).unwrap();
        m.set_transition(2, 1, 0, None).unwrap();
        m
    }

    #[test]
    fn round_trip_mealy() {
        let m = two_state_mealy();
        let loaded = load_str(&save_str(&m)).unwrap();
        assert!(m.are_isomorphic(&loaded));
    }

    #[test]
    fn round_trip_moore() {
        let m = reduced_moore_example();
        let loaded = load_str(&save_str(&m)).unwrap();
        assert!(m.are_isomorphic(&loaded));
    }

    #[test]
    fn round_trip_with_absent_transition() {
        let mut m = Dfsm::create(2, 2, 2, MachineKind::Mealy);
        m.set_transition(0, 0, 1, Some(0)).unwrap();
        let loaded = load_str(&save_str(&m)).unwrap();
        assert!(!loaded.has_transition(0, 1));
        assert!(!loaded.has_transition(1, 0));
        assert!(!loaded.has_transition(1, 1));
    }

    #[test]
    fn inconsistent_kind_header_fails() {
        let text = "2 1 1 NotAKind\n0\n1\n";
        assert!(load_str(text).is_err());
    }

    #[test]
    fn sequence_string_round_trip() {
        let seq = vec![0, 1, STOUT_INPUT, 3];
        let s = sequence_to_string(&seq);
        assert_eq!(s, "0,1,S,3");
        assert_eq!(sequence_from_string(&s).unwrap(), seq);
    }

    #[test]
    fn empty_sequence_string_round_trip() {
        assert_eq!(sequence_to_string(&[]), "");
        assert_eq!(sequence_from_string("").unwrap(), Vec::<Input>::new());
    }

    #[test]
    fn directory_round_trip() {
        let dir = std::env::temp_dir().join(format!("fsm-io-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        let m = two_state_mealy();
        save_file(&m, dir.join("a.fsm")).unwrap();
        fs::write(dir.join("not-an-fsm.txt"), "ignored").unwrap();
        let loaded = load_directory(&dir).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].0, "a.fsm");
        assert!(loaded[0].1.as_ref().unwrap().are_isomorphic(&m));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn not_compact_still_loads_since_this_implementation_is_always_compact() {
        let m = two_state_mealy();
        assert!(m.is_compact());
        let loaded = load_str(&save_str(&m)).unwrap();
        assert!(loaded.is_compact());
    }
}

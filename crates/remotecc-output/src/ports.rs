//! Output port selection

/// Name fragments used by virtual MIDI port drivers
const VIRTUAL_KEYWORDS: &[&str] = &[
    "loopmidi",
    "loop midi",
    "midi controller",
    "remotecc",
    "remote cc",
    "virtual midi",
    "breathcontrol",
    "breath control",
];

/// Built-in synth ports that are never auto-selected
const SYSTEM_PORTS: &[&str] = &["microsoft gs wavetable synth"];

/// Whether a port name looks like a virtual MIDI port
pub fn is_virtual_port(name: &str) -> bool {
    let lower = name.to_lowercase();
    if SYSTEM_PORTS.iter().any(|s| lower.contains(s)) {
        return false;
    }
    VIRTUAL_KEYWORDS.iter().any(|k| lower.contains(k))
}

/// Index of the single virtual port in `names`.
///
/// Returns `None` when there is no candidate or more than one, leaving the
/// choice to the operator.
pub fn auto_select_port<S: AsRef<str>>(names: &[S]) -> Option<usize> {
    let mut candidates = names
        .iter()
        .enumerate()
        .filter(|(_, name)| is_virtual_port(name.as_ref()));

    match (candidates.next(), candidates.next()) {
        (Some((index, _)), None) => Some(index),
        _ => None,
    }
}

/// Index of the first port whose name contains `needle` (case-insensitive)
pub fn find_port_by_name<S: AsRef<str>>(names: &[S], needle: &str) -> Option<usize> {
    let needle = needle.to_lowercase();
    names
        .iter()
        .position(|name| name.as_ref().to_lowercase().contains(&needle))
}

//! Probe naming and scanning of instrumented sources and compiler output.
//!
//! Probes are named `<prefix><id>_`, declared `void <prefix><id>_(void);` at
//! file scope and never defined. A probe whose call survives in the
//! generated assembly is alive; every other declared probe was eliminated.

use std::collections::BTreeSet;

/// Default probe prefix.
pub const DEFAULT_PREFIX: &str = "DCEMarker";

pub fn marker_symbol(prefix: &str, id: usize) -> String {
    format!("{prefix}{id}_")
}

/// Call statement placed at a probe site.
pub fn marker_call(prefix: &str, id: usize) -> String {
    format!("{}();", marker_symbol(prefix, id))
}

/// File-scope forward declaration of a probe.
pub fn marker_declaration(prefix: &str, id: usize) -> String {
    format!("void {}(void);", marker_symbol(prefix, id))
}

/// Whether `prefix` can start a C identifier and contains only identifier
/// characters.
pub fn is_valid_prefix(prefix: &str) -> bool {
    let mut chars = prefix.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Id of a probe symbol, tolerating a relocation suffix (`@PLT`) and the
/// leading underscore some object formats add.
pub fn parse_marker_id(symbol: &str, prefix: &str) -> Option<usize> {
    let symbol = symbol.split('@').next().unwrap_or(symbol);
    let rest = match symbol.strip_prefix(prefix) {
        Some(rest) => rest,
        None => symbol.strip_prefix('_')?.strip_prefix(prefix)?,
    };
    let digits = rest.strip_suffix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Number of probes declared in an instrumented source: the highest declared
/// id plus one, or zero.
pub fn declared_marker_count(source: &str, prefix: &str) -> usize {
    source
        .lines()
        .filter_map(|line| {
            let symbol = line
                .trim()
                .strip_prefix("void ")?
                .trim_start()
                .strip_suffix("(void);")?;
            parse_marker_id(symbol, prefix)
        })
        .max()
        .map_or(0, |id| id + 1)
}

fn is_branch(mnemonic: &str) -> bool {
    mnemonic.starts_with("call")
        || mnemonic.starts_with('j')
        || matches!(mnemonic, "b" | "bl" | "tail")
}

/// Probe ids still called or jumped to in `asm`.
pub fn alive_markers(asm: &str, prefix: &str) -> BTreeSet<usize> {
    let mut alive = BTreeSet::new();
    for line in asm.lines() {
        let mut words = line.split_whitespace();
        let Some(mnemonic) = words.next() else {
            continue;
        };
        if !is_branch(mnemonic) {
            continue;
        }
        for operand in words {
            let operand = operand.trim_matches(|c: char| c == ',' || c == '*' || c == '$');
            if let Some(id) = parse_marker_id(operand, prefix) {
                alive.insert(id);
            }
        }
    }
    alive
}

/// Declared probes not in `alive`.
pub fn dead_markers(total: usize, alive: &BTreeSet<usize>) -> Vec<usize> {
    (0..total).filter(|id| !alive.contains(id)).collect()
}

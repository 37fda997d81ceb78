//! Parity flags between semantically linked pack values

use super::PackSet;
use serde_json::Value;
use std::collections::BTreeMap;

/// One parity pair: `(flag, (left slot, pointer), (right slot, pointer))`
pub type ParityRule = (&'static str, (u8, &'static str), (u8, &'static str));

/// Every parity flag, each reported individually
pub static PARITY_RULES: &[ParityRule] = &[
    ("02_vs_14", (2, "/gates"), (14, "/gates")),
    ("11_vs_02", (11, "/pass_gates"), (2, "/gates")),
    ("12_vs_01", (12, "/environment"), (1, "/agent/environment")),
];

fn lookup<'a>(packs: &PackSet<'a>, (ordinal, pointer): (u8, &str)) -> Option<&'a Value> {
    packs.payload(ordinal)?.pointer(pointer)
}

/// `true` only when both sides are present and equal
pub fn check_parity(packs: &PackSet<'_>) -> BTreeMap<String, bool> {
    PARITY_RULES
        .iter()
        .map(|&(flag, left, right)| {
            let agree = match (lookup(packs, left), lookup(packs, right)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            (flag.to_string(), agree)
        })
        .collect()
}

//! Short human-usable labels for calls and invocations.
//!
//! Labels look like `brave_otter`. When a requested name collides, candidates
//! are derived from it (`adder_otter`). Once half of the attempt budget is
//! spent a numeric suffix is appended to widen the space. The loop is bounded
//! and reports [`ReplError::NameGeneration`] when it runs out.

use rand::Rng;

use crate::error::{ReplError, Result};

/// Default number of candidates tried before giving up.
pub const DEFAULT_NAME_ATTEMPTS: usize = 64;

const ADJECTIVES: &[&str] = &[
    "amber", "bold", "brave", "brisk", "calm", "clever", "crisp", "dusty", "eager", "fancy",
    "gentle", "glad", "golden", "happy", "icy", "jolly", "keen", "lively", "lucky", "mellow",
    "misty", "nimble", "proud", "quiet", "rapid", "shy", "silver", "sunny", "swift", "witty",
];

const NOUNS: &[&str] = &[
    "badger", "beetle", "crane", "dingo", "eagle", "falcon", "ferret", "gecko", "heron", "ibis",
    "jackal", "koala", "lemur", "lynx", "marten", "newt", "ocelot", "otter", "panda", "quail",
    "raven", "salmon", "tapir", "urchin", "viper", "walrus", "wombat", "yak", "zebra", "finch",
];

/// Pick a name not rejected by `taken`.
///
/// A `requested` name that is free is returned unchanged.
///
/// # Arguments
///
/// * `kind` - Registry kind, used in the error
/// * `requested` - Preferred name, if any
/// * `attempts` - Maximum number of generated candidates
/// * `taken` - Returns true if a candidate already exists in the registry
pub fn unique_name(
    kind: &'static str,
    requested: Option<&str>,
    attempts: usize,
    taken: impl Fn(&str) -> bool,
) -> Result<String> {
    if let Some(name) = requested {
        if !taken(name) {
            return Ok(name.to_string());
        }
    }

    let mut rng = rand::rng();
    for attempt in 0..attempts {
        let mut candidate = match requested {
            Some(base) => format!("{}_{}", base, pick(&mut rng, NOUNS)),
            None => format!("{}_{}", pick(&mut rng, ADJECTIVES), pick(&mut rng, NOUNS)),
        };
        if attempt >= (attempts / 2).max(1) {
            candidate = format!("{}_{}", candidate, rng.random_range(0..10_000u32));
        }
        if !taken(&candidate) {
            return Ok(candidate);
        }
    }

    Err(ReplError::NameGeneration { kind, attempts })
}

fn pick<'a>(rng: &mut impl Rng, words: &[&'a str]) -> &'a str {
    words[rng.random_range(0..words.len())]
}

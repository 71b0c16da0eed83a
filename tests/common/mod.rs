#![allow(dead_code)]

pub use procwarden_test_utils::{builders, fake_killer, init_tracing, with_timeout};

use procwarden::args::{SubstitutionChain, SubstitutionMap};

/// Chain holding a single map built from `pairs`.
pub fn chain_of(pairs: &[(&str, &str)]) -> SubstitutionChain {
    let mut chain = SubstitutionChain::new();
    chain.push(pairs.iter().copied().collect::<SubstitutionMap>());
    chain
}

// tests/argument_properties.rs

mod common;
use crate::common::chain_of;

use proptest::prelude::*;
use procwarden::args::{ArgumentList, tokenize};

// Pieces of an argument line; joined with spaces they always form a
// well-formed line (balanced quotes, closed scopes and placeholders).
fn piece_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,6}".prop_map(|s| s),
        "[a-z]{1,6}".prop_map(|s| format!("--{s}")),
        Just("${x}".to_string()),
        Just("${y}".to_string()),
        Just("${missing}".to_string()),
        Just("'quoted words'".to_string()),
        "[a-z]{1,4}".prop_map(|s| format!("$[ -{s} ${{x}} ]")),
        "[a-z]{1,4}".prop_map(|s| format!("$[ -{s} ${{!missing}} ]")),
    ]
}

fn line_strategy() -> impl Strategy<Value = String> {
    proptest::collection::vec(piece_strategy(), 0..10).prop_map(|pieces| pieces.join(" "))
}

proptest! {
    #[test]
    fn resolving_twice_yields_identical_vectors(line in line_strategy()) {
        let chain = chain_of(&[("x", "1"), ("y", "two words")]);
        let mut args = ArgumentList::new();
        args.add_line(&line).unwrap();

        let first = args.resolve(&chain).unwrap();
        let second = args.resolve(&chain).unwrap();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn plain_words_tokenize_to_themselves(words in proptest::collection::vec("[a-zA-Z0-9_./-]{1,8}", 0..12)) {
        let line = words.join("  ");
        prop_assert_eq!(tokenize(&line).unwrap(), words);
    }

    #[test]
    fn quoting_a_word_never_changes_it(words in proptest::collection::vec("[a-z ]{0,6}[a-z]", 1..6)) {
        let line = words
            .iter()
            .map(|w| format!("'{w}'"))
            .collect::<Vec<_>>()
            .join(" ");
        prop_assert_eq!(tokenize(&line).unwrap(), words);
    }
}

// src/args/tokenize.rs

//! Quote-aware splitting of an argument line into tokens.

use crate::errors::{ProcwardenError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    Normal,
    InSingleQuote,
    InDoubleQuote,
}

/// Split `line` on unquoted whitespace.
///
/// `'...'` and `"..."` group characters (including whitespace) into one
/// token; the quote characters themselves are removed. Quotes do not nest and
/// there are no escapes, so `"it's"` yields `it's`. An empty quoted token
/// (`""`) survives only when it is the very last token of the line.
///
/// Fails with [`ProcwardenError::UnbalancedQuote`] if the line ends inside a
/// quote.
pub fn tokenize(line: &str) -> Result<Vec<String>> {
    let mut state = QuoteState::Normal;
    let mut tokens = Vec::new();
    let mut current = String::new();
    // Set when a quote just closed and nothing unquoted followed it yet.
    let mut last_token_quoted = false;

    for ch in line.chars() {
        match state {
            QuoteState::InSingleQuote => {
                if ch == '\'' {
                    state = QuoteState::Normal;
                    last_token_quoted = true;
                } else {
                    current.push(ch);
                }
            }
            QuoteState::InDoubleQuote => {
                if ch == '"' {
                    state = QuoteState::Normal;
                    last_token_quoted = true;
                } else {
                    current.push(ch);
                }
            }
            QuoteState::Normal => {
                match ch {
                    '\'' => state = QuoteState::InSingleQuote,
                    '"' => state = QuoteState::InDoubleQuote,
                    c if c.is_whitespace() => {
                        if !current.is_empty() {
                            tokens.push(std::mem::take(&mut current));
                        }
                    }
                    c => current.push(c),
                }
                last_token_quoted = false;
            }
        }
    }

    if state != QuoteState::Normal {
        return Err(ProcwardenError::UnbalancedQuote {
            line: line.to_string(),
        });
    }

    if last_token_quoted || !current.is_empty() {
        tokens.push(current);
    }

    Ok(tokens)
}

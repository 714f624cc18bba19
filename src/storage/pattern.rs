//! Glob pattern matching for the KEYS scan.
//!
//! Supported syntax:
//! - `*` matches zero or more of any character
//! - `?` matches exactly one character
//! - `\` escapes the next character (so `\*` matches a literal `*`)
//! - everything else matches itself, case-sensitively
//!
//! Matching is anchored: the whole key must match the whole pattern. An
//! empty pattern matches only the empty key.
//!
//! The matcher is iterative with single-star backtracking, which is
//! O(pattern * key) in the worst case, so a hostile pattern cannot blow up a
//! scan the way naive recursive globbing can.

use crate::storage::engine::StoreError;

/// A compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    tokens: Vec<Token>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    /// `*`
    Any,
    /// `?`
    One,
    /// a literal character (including escaped `*`, `?`, `\`)
    Literal(char),
}

impl GlobPattern {
    /// Compiles a pattern, validating the escape syntax.
    ///
    /// The only malformed pattern is one ending in a bare backslash, which
    /// fails with [`StoreError::InvalidPattern`].
    pub fn compile(pattern: &str) -> Result<Self, StoreError> {
        let mut tokens = Vec::with_capacity(pattern.len());
        let mut chars = pattern.chars();

        while let Some(c) = chars.next() {
            match c {
                '*' => {
                    // Consecutive stars are equivalent to one.
                    if tokens.last() != Some(&Token::Any) {
                        tokens.push(Token::Any);
                    }
                }
                '?' => tokens.push(Token::One),
                '\\' => match chars.next() {
                    Some(escaped) => tokens.push(Token::Literal(escaped)),
                    None => {
                        return Err(StoreError::InvalidPattern(format!(
                            "pattern '{pattern}' ends with a bare backslash"
                        )))
                    }
                },
                literal => tokens.push(Token::Literal(literal)),
            }
        }

        Ok(Self { tokens })
    }

    /// Returns whether `text` matches the whole pattern.
    pub fn matches(&self, text: &str) -> bool {
        let text: Vec<char> = text.chars().collect();

        let mut t = 0; // position in text
        let mut p = 0; // position in tokens
        let mut star: Option<usize> = None; // token index after the last `*`
        let mut star_t = 0; // text position where that `*` started matching

        while t < text.len() {
            match self.tokens.get(p) {
                Some(Token::One) => {
                    t += 1;
                    p += 1;
                }
                Some(Token::Literal(c)) if *c == text[t] => {
                    t += 1;
                    p += 1;
                }
                Some(Token::Any) => {
                    // Tentatively match zero characters; remember where to
                    // come back if the rest fails.
                    p += 1;
                    star = Some(p);
                    star_t = t;
                }
                _ => match star {
                    // Grow the last star's match by one character and retry.
                    Some(after_star) => {
                        star_t += 1;
                        t = star_t;
                        p = after_star;
                    }
                    None => return false,
                },
            }
        }

        // Only trailing stars may remain unconsumed.
        self.tokens[p..].iter().all(|tok| *tok == Token::Any)
    }
}

//! Parser configuration.

use super::error::ParseError;

/// Options accepted by [`crate::math_interpreter::parse`]. The two
/// `pub(crate)` fields are parser-internal state that travels with the
/// option set: `parsing_integral_expr` is raised inside `\int` bodies and
/// `one_char_token` restricts the next numeric token to one character
/// (the LaTeX single-character-scope convention after `^` and `_`).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Options {
    /// Enables the implicit `,` thousands separator during number scanning.
    pub allow_thousands_separator: bool,
    /// Characters recognized as thousands separators.
    pub set_thousands_separator: Vec<char>,
    /// Characters recognized as decimal separators; defaults to `.`.
    pub set_decimal_separator: Vec<char>,
    /// Round numeric literals to this scale.
    pub decimal_places: Option<u32>,
    /// Preserve original literal text in NUM and make any unknown primary
    /// token fatal.
    pub strict: bool,
    /// Disable flattening of ADD chains.
    pub compare_grouping: bool,
    /// Preserve whitespace inside `\text{...}`.
    pub keep_text_whitespace: bool,
    /// Treat `\text{...}` as whitespace.
    pub ignore_text: bool,

    pub(crate) parsing_integral_expr: bool,
    pub(crate) one_char_token: bool,
}

impl Options {
    /// The thousands separators in effect, empty when disabled.
    pub fn thousands_separators(&self) -> Vec<char> {
        if !self.set_thousands_separator.is_empty() {
            self.set_thousands_separator.clone()
        } else if self.allow_thousands_separator {
            vec![',']
        } else {
            vec![]
        }
    }

    /// The decimal separators in effect; `.` when unset.
    pub fn decimal_separators(&self) -> Vec<char> {
        if self.set_decimal_separator.is_empty() {
            vec!['.']
        } else {
            self.set_decimal_separator.clone()
        }
    }

    /// Reject separator sets that overlap.
    pub fn validate(&self) -> Result<(), ParseError> {
        let decimals = self.decimal_separators();
        for c in self.thousands_separators() {
            if decimals.contains(&c) {
                return Err(ParseError::new(1008, &[&c.to_string()]));
            }
        }
        Ok(())
    }
}

//! Fatal parse errors.
//!
//! Every syntactic problem carries a numeric code in the reserved range
//! 1000..=1999 together with a formatted message. There is no partial
//! recovery: the parser either returns a complete tree or one of these.

use colored::*;
use std::error::Error;
use std::fmt;

/// A fatal error raised by the scanner or the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    code: u32,
    message: String,
    text: Option<String>,
}

/// Message templates. `%1`, `%2`, ... are replaced by positional arguments.
fn template(code: u32) -> &'static str {
    match code {
        1000 => "internal error: %1",
        1001 => "syntax error: expected %1, found %2",
        1002 => "multiple decimal separators: %1",
        1003 => "extra input after the end of the expression: %1",
        1004 => "invalid character: %1",
        1005 => "misplaced thousands separator",
        1006 => "expression expected: found %1",
        1007 => "unexpected character in number: %1",
        1008 => "thousands and decimal separators conflict: %1",
        1009 => "missing argument for %1",
        1010 => "expecting an operator between numbers",
        1011 => "invalid grouping bracket: %1",
        1012 => "misplaced subscript: %1",
        1013 => "mismatched thousands separators: %1 and %2",
        1014 => "missing integration variable",
        _ => "unknown error",
    }
}

impl ParseError {
    pub fn new(code: u32, args: &[&str]) -> Self {
        let mut message = template(code).to_string();
        for (i, arg) in args.iter().enumerate() {
            message = message.replace(&format!("%{}", i + 1), arg);
        }
        // Drop placeholders no argument was supplied for
        while let Some(at) = message.find('%') {
            let end = message[at + 1..]
                .find(|c: char| !c.is_ascii_digit())
                .map(|n| at + 1 + n)
                .unwrap_or(message.len());
            message.replace_range(at..end, "");
        }
        ParseError {
            code,
            message: message.trim_end_matches([':', ' ']).to_string(),
            text: None,
        }
    }

    pub fn internal(detail: &str) -> Self {
        ParseError::new(1000, &[detail])
    }

    /// Attach the source text being parsed, for rendering.
    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn code(&self) -> u32 {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// Terminal-friendly rendering with the offending source underneath.
    pub fn render(&self) -> String {
        let mut ret = format!(
            "{} ({}): {}\n",
            "Error".red().bold(),
            self.code,
            self.message
        );
        if let Some(text) = &self.text {
            ret.push_str(&format!("{}\n", text));
            ret.push_str(&format!("{}\n", "^".repeat(text.len()).red().bold()));
        }
        ret
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "({}) {}", self.code, self.message)
    }
}

impl Error for ParseError {}

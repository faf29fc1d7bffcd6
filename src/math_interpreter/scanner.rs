//! A custom scanner for LaTeX math.
//!
//! The scanner is a single-pass character cursor. Each call to
//! [`Scanner::start`] skips whitespace and produces exactly one token; the
//! lexeme of that token stays readable through [`Scanner::lexeme`] until the
//! next call. Lookahead is the parser's job, not ours.
//!
//! Description of the implementation:
//! 1. The source is pre-normalized: control-character runs collapse to tabs
//!    (`strip_invisible`) and Unicode math code points are rewritten to
//!    their LaTeX spelling, so `α≤β` scans exactly like `\alpha \le \beta`.
//! 1. Backslash-led control sequences are looked up in `COMMAND_TABLE`.
//!    Unknown ones become VAR tokens keeping the backslash in the lexeme.
//! 1. `\text{...}`, `\operatorname{...}` and friends consume their brace
//!    argument as the lexeme.
//! 1. A single alphabetic character is a VAR; when the environment knows
//!    longer identifiers (unit names like `kg` or `\mu g`), the run is
//!    extended greedily as long as it remains a prefix of a known
//!    identifier, and falls back to the single character otherwise.
//! 1. Digit runs honour the configured decimal and thousands separators,
//!    including the `{,}` form and explicit `\ ` spaces.

use super::error::ParseError;
use super::options::Options;
use super::token::{TokenKind, COMMAND_TABLE, OPERATOR_NAME_TABLE, UNICODE_TABLE, WHITESPACE_COMMANDS};

/// Collapse control-character runs to tabs, preserving the character
/// immediately following a backslash.
pub fn strip_invisible(src: &str) -> String {
    let mut out = String::new();
    let mut chars = src.chars().peekable();
    let mut in_run = false;
    while let Some(c) = chars.next() {
        if c == '\\' {
            out.push(c);
            if let Some(&n) = chars.peek() {
                out.push(n);
                chars.next();
            }
            in_run = false;
        } else if c.is_control() && c != '\n' && c != '\r' && c != '\t' {
            if !in_run {
                out.push('\t');
            }
            in_run = true;
        } else {
            out.push(c);
            in_run = false;
        }
    }
    out
}

pub struct Scanner {
    chars: Vec<char>,
    pos: usize,
    lexeme: String,
    /// Original spelling of the current token (NUM keeps separators here).
    raw: String,
    sep_count: u32,
    last_sep_index: Option<usize>,
    /// Last-seen thousands-separator character, for mismatch detection.
    last_sep_char: Option<char>,
    /// Identifiers known to the environment, for greedy matching.
    idents: Vec<String>,
}

impl Scanner {
    pub fn new(src: &str, idents: Vec<String>) -> Self {
        let mut chars: Vec<char> = Vec::new();
        for c in strip_invisible(src).chars() {
            match UNICODE_TABLE.get(&c) {
                Some(lexeme) => {
                    chars.extend(lexeme.chars());
                    if lexeme.len() > 1 {
                        // keep a following letter from gluing onto the
                        // substituted control word
                        chars.push(' ');
                    }
                }
                None => chars.push(c),
            }
        }
        Scanner {
            chars,
            pos: 0,
            lexeme: String::new(),
            raw: String::new(),
            sep_count: 0,
            last_sep_index: None,
            last_sep_char: None,
            idents,
        }
    }

    pub fn lexeme(&self) -> &str {
        &self.lexeme
    }

    pub fn raw_lexeme(&self) -> &str {
        &self.raw
    }

    pub fn separator_count(&self) -> u32 {
        self.sep_count
    }

    pub fn last_separator_index(&self) -> Option<usize> {
        self.last_sep_index
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, k: usize) -> Option<char> {
        self.chars.get(self.pos + k).copied()
    }

    /// True when the characters at the cursor spell `word`.
    fn looking_at(&self, word: &str) -> bool {
        word.chars()
            .enumerate()
            .all(|(i, w)| self.peek_at(i) == Some(w))
    }

    fn set_lexeme(&mut self, s: &str) {
        self.lexeme = s.to_string();
        self.raw = s.to_string();
    }

    /// Advance past whitespace and produce exactly one token.
    pub fn start(&mut self, opts: &Options) -> Result<TokenKind, ParseError> {
        self.lexeme.clear();
        self.raw.clear();
        self.sep_count = 0;
        self.last_sep_index = None;

        loop {
            while let Some(c) = self.peek() {
                match c {
                    ' ' | '\t' | '\n' | '\r' | '\u{A0}' | '\u{200B}' => self.pos += 1,
                    '&' if self.looking_at("&nbsp;") => self.pos += 6,
                    _ => break,
                }
            }

            let c = match self.peek() {
                Some(c) => c,
                None => return Ok(TokenKind::None),
            };

            return match c {
                '0'..='9' => self.number(opts),
                '.' => {
                    if opts.decimal_separators().contains(&'.')
                        && (matches!(self.peek_at(1), Some('0'..='9'))
                            || self.overline_follows(1))
                    {
                        self.number(opts)
                    } else {
                        self.pos += 1;
                        self.set_lexeme(".");
                        Ok(TokenKind::Period)
                    }
                }
                '\\' => match self.backslash(opts)? {
                    Some(tk) => Ok(tk),
                    // whitespace control sequence: try again
                    None => continue,
                },
                '\'' => {
                    while self.peek() == Some('\'') {
                        self.lexeme.push('\'');
                        self.pos += 1;
                    }
                    self.raw = self.lexeme.clone();
                    Ok(TokenKind::Var)
                }
                c if c.is_alphabetic() => Ok(self.ident(c)),
                _ => self.operator(c),
            };
        }
    }

    /// ASCII operators, with the two-character fusions.
    fn operator(&mut self, c: char) -> Result<TokenKind, ParseError> {
        use TokenKind::*;
        let two = |s: &mut Scanner, lex: &str, tk: TokenKind| {
            s.pos += 2;
            s.set_lexeme(lex);
            Ok(tk)
        };
        let one = |s: &mut Scanner, tk: TokenKind| {
            s.pos += 1;
            s.set_lexeme(&c.to_string());
            Ok(tk)
        };
        match c {
            '+' => one(self, Add),
            '-' => {
                if self.peek_at(1) == Some('>') {
                    two(self, "->", RightArrowTk)
                } else {
                    one(self, Sub)
                }
            }
            '*' => {
                if self.peek_at(1) == Some('*') {
                    two(self, "**", Caret)
                } else {
                    one(self, Star)
                }
            }
            '/' => one(self, Slash),
            '=' => one(self, Equal),
            '<' => {
                if self.peek_at(1) == Some('=') {
                    two(self, "<=", Le)
                } else {
                    one(self, Lt)
                }
            }
            '>' => {
                if self.peek_at(1) == Some('=') {
                    two(self, ">=", Ge)
                } else {
                    one(self, Gt)
                }
            }
            '!' => {
                if self.peek_at(1) == Some('=') {
                    two(self, "!=", Ne)
                } else {
                    one(self, Bang)
                }
            }
            '^' => one(self, Caret),
            '_' => one(self, Underscore),
            '(' => one(self, LeftParen),
            ')' => one(self, RightParen),
            '[' => one(self, LeftBracket),
            ']' => one(self, RightBracket),
            '{' => one(self, LeftBrace),
            '}' => one(self, RightBrace),
            ',' => one(self, Comma),
            ';' => one(self, Semicolon),
            ':' => one(self, Colon),
            '%' => one(self, Percent),
            '|' => one(self, Pipe),
            '&' => one(self, NewCol),
            _ => Err(ParseError::new(1004, &[&c.to_string()])),
        }
    }

    /// Backslash-led control sequences. `Ok(None)` means the sequence only
    /// produced whitespace and scanning should continue.
    fn backslash(&mut self, opts: &Options) -> Result<Option<TokenKind>, ParseError> {
        use TokenKind::*;
        match self.peek_at(1) {
            Option::None => Err(ParseError::new(1004, &["\\"])),
            Some('\\') => {
                self.pos += 2;
                self.set_lexeme("\\\\");
                Ok(Some(NewRow))
            }
            Some('{') => {
                self.pos += 2;
                self.set_lexeme("\\{");
                Ok(Some(LeftBraceSet))
            }
            Some('}') => {
                self.pos += 2;
                self.set_lexeme("\\}");
                Ok(Some(RightBraceSet))
            }
            Some('|') => {
                self.pos += 2;
                self.set_lexeme("\\|");
                Ok(Some(VerticalBar))
            }
            Some(' ') | Some(',') | Some(';') | Some(':') | Some('!') => {
                self.pos += 2;
                Ok(Option::None)
            }
            Some('%') => {
                self.pos += 2;
                self.set_lexeme("\\%");
                Ok(Some(Percent))
            }
            Some(c) if c.is_alphabetic() => {
                let start = self.pos;
                self.pos += 1;
                let mut name = String::new();
                while let Some(c) = self.peek() {
                    if c.is_alphabetic() {
                        name.push(c);
                        self.pos += 1;
                    } else {
                        break;
                    }
                }

                if WHITESPACE_COMMANDS.contains(&name.as_str()) {
                    return Ok(Option::None);
                }
                match name.as_str() {
                    "text" | "textrm" | "textit" | "textbf" => {
                        let content = self.brace_content(&name)?;
                        if opts.ignore_text {
                            return Ok(Option::None);
                        }
                        self.lexeme = if opts.keep_text_whitespace {
                            content.clone()
                        } else {
                            content.chars().filter(|c| !c.is_whitespace()).collect()
                        };
                        self.raw = content;
                        Ok(Some(Text))
                    }
                    "operatorname" => {
                        let content = self.brace_content(&name)?;
                        self.set_lexeme(&content);
                        match OPERATOR_NAME_TABLE.get(content.as_str()) {
                            Some(&tk) => Ok(Some(tk)),
                            Option::None => Ok(Some(Var)),
                        }
                    }
                    "begin" | "end" => {
                        let content = self.brace_content(&name)?;
                        self.set_lexeme(&content);
                        Ok(Some(if name == "begin" { Begin } else { End }))
                    }
                    "varepsilon" => {
                        self.set_lexeme("\\epsilon");
                        Ok(Some(Var))
                    }
                    "emptyset" => {
                        self.set_lexeme("\\varnothing");
                        Ok(Some(Var))
                    }
                    "infty" => {
                        self.set_lexeme("\\infty");
                        Ok(Some(Num))
                    }
                    _ => match COMMAND_TABLE.get(name.as_str()) {
                        Some(&tk) => {
                            let spelled: String = self.chars[start..self.pos].iter().collect();
                            self.set_lexeme(&spelled);
                            Ok(Some(tk))
                        }
                        Option::None => {
                            // unknown control sequence: a VAR, possibly the
                            // start of a multi-character environment
                            // identifier such as `\mu g`
                            let spelled: String = self.chars[start..self.pos].iter().collect();
                            self.lexeme = spelled;
                            self.greedy_extend();
                            self.raw = self.lexeme.clone();
                            Ok(Some(Var))
                        }
                    },
                }
            }
            Some(c) => Err(ParseError::new(1004, &[&format!("\\{}", c)])),
        }
    }

    /// Read a `{...}` argument for the command `name`; the cursor must sit
    /// right after the command word.
    fn brace_content(&mut self, name: &str) -> Result<String, ParseError> {
        while self.peek() == Some(' ') {
            self.pos += 1;
        }
        if self.peek() != Some('{') {
            return Err(ParseError::new(1009, &[&format!("\\{}", name)]));
        }
        self.pos += 1;
        let mut content = String::new();
        loop {
            match self.peek() {
                Some('}') => {
                    self.pos += 1;
                    return Ok(content);
                }
                Some(c) => {
                    content.push(c);
                    self.pos += 1;
                }
                None => return Err(ParseError::new(1009, &[&format!("\\{}", name)])),
            }
        }
    }

    /// A single alphabetic character is a VAR by default; known environment
    /// identifiers extend the run greedily.
    fn ident(&mut self, c: char) -> TokenKind {
        self.pos += 1;
        self.lexeme.push(c);
        self.greedy_extend();
        self.raw = self.lexeme.clone();
        TokenKind::Var
    }

    /// Extend the current lexeme while it stays a prefix of some known
    /// identifier; commit to the longest exact match, otherwise backtrack
    /// to the original lexeme.
    fn greedy_extend(&mut self) {
        if self.idents.is_empty() {
            return;
        }
        let mut candidate = self.lexeme.clone();
        let mut best: Option<(String, usize)> = None;
        let mut j = self.pos;
        loop {
            if self.idents.iter().any(|k| *k == candidate) {
                best = Some((candidate.clone(), j));
            }
            let c = match self.chars.get(j) {
                Some(&c) if c.is_alphabetic() || c == ' ' => c,
                _ => break,
            };
            candidate.push(c);
            j += 1;
            if !self.idents.iter().any(|k| k.starts_with(&candidate)) {
                break;
            }
        }
        match best {
            Some((lexeme, end)) if lexeme.len() > self.lexeme.len() => {
                debug!("scanner: greedy identifier match {:?}", lexeme);
                self.lexeme = lexeme;
                self.pos = end;
            }
            _ => {}
        }
    }

    /// True when `\overline` or `\dot` starts `k` characters ahead.
    fn overline_follows(&self, k: usize) -> bool {
        let rest: String = self
            .chars
            .iter()
            .skip(self.pos + k)
            .take(9)
            .collect();
        rest.starts_with("\\overline") || rest.starts_with("\\dot")
    }

    /// Digit runs with configurable separators. The canonical lexeme erases
    /// thousands separators and spells the decimal separator as `.`; the
    /// raw lexeme keeps the original text for strict mode.
    fn number(&mut self, opts: &Options) -> Result<TokenKind, ParseError> {
        let thousands = opts.thousands_separators();
        let decimals = opts.decimal_separators();
        let mut seen_decimal = false;
        let mut group_count: u32 = 0;
        let mut digits_in_group: usize = 0;

        // a leading `.` (".5", or "." right before \overline) gets a zero
        if self.peek() == Some('.') && decimals.contains(&'.') {
            self.lexeme.push('0');
        }

        loop {
            let c = match self.peek() {
                Some(c) => c,
                None => break,
            };
            match c {
                '0'..='9' => {
                    self.lexeme.push(c);
                    self.raw.push(c);
                    self.pos += 1;
                    digits_in_group += 1;
                    if opts.one_char_token {
                        return Ok(TokenKind::Num);
                    }
                }
                c if decimals.contains(&c) && !seen_decimal => {
                    if group_count > 0 && digits_in_group != 3 {
                        return Err(ParseError::new(1005, &[]));
                    }
                    seen_decimal = true;
                    self.sep_count += 1;
                    self.last_sep_index = Some(self.lexeme.len());
                    self.lexeme.push('.');
                    self.raw.push(c);
                    self.pos += 1;
                    digits_in_group = 0;
                }
                c if decimals.contains(&c) && seen_decimal => {
                    // `1.2.3`: only one decimal separator is allowed; a
                    // trailing list separator never reaches here because it
                    // is not followed by a digit
                    if matches!(self.peek_at(1), Some('0'..='9')) {
                        return Err(ParseError::new(1002, &[&c.to_string()]));
                    }
                    break;
                }
                c if thousands.contains(&c) && !seen_decimal => {
                    if !matches!(self.peek_at(1), Some('0'..='9')) {
                        break;
                    }
                    self.raw.push(c);
                    self.pos += 1;
                    self.thousands_separator(c, group_count, digits_in_group)?;
                    group_count += 1;
                    digits_in_group = 0;
                }
                c if thousands.contains(&c) && seen_decimal => {
                    if matches!(self.peek_at(1), Some('0'..='9')) {
                        return Err(ParseError::new(1005, &[]));
                    }
                    break;
                }
                '{' => {
                    // the `{,}` spelling of a separator
                    match (self.peek_at(1), self.peek_at(2)) {
                        (Some(s), Some('}')) if thousands.contains(&s) && !seen_decimal => {
                            self.raw.push('{');
                            self.raw.push(s);
                            self.raw.push('}');
                            self.pos += 3;
                            self.thousands_separator(s, group_count, digits_in_group)?;
                            group_count += 1;
                            digits_in_group = 0;
                        }
                        _ => break,
                    }
                }
                '\\' => {
                    // an explicit space `\ ` is a potential separator
                    if self.peek_at(1) == Some(' ')
                        && thousands.contains(&' ')
                        && !seen_decimal
                        && matches!(self.peek_at(2), Some('0'..='9'))
                    {
                        self.raw.push(' ');
                        self.pos += 2;
                        self.thousands_separator(' ', group_count, digits_in_group)?;
                        group_count += 1;
                        digits_in_group = 0;
                    } else {
                        break;
                    }
                }
                _ => break,
            }
        }

        if !seen_decimal && group_count > 0 && digits_in_group != 3 {
            return Err(ParseError::new(1005, &[]));
        }
        Ok(TokenKind::Num)
    }

    fn thousands_separator(
        &mut self,
        c: char,
        group_count: u32,
        digits_in_group: usize,
    ) -> Result<(), ParseError> {
        if let Some(prev) = self.last_sep_char {
            if prev != c {
                return Err(ParseError::new(
                    1013,
                    &[&prev.to_string(), &c.to_string()],
                ));
            }
        }
        self.last_sep_char = Some(c);
        let valid = if group_count == 0 {
            (1..=3).contains(&digits_in_group)
        } else {
            digits_in_group == 3
        };
        if !valid {
            return Err(ParseError::new(1005, &[]));
        }
        self.sep_count += 1;
        self.last_sep_index = Some(self.lexeme.len());
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn scan_all(src: &str, opts: &Options) -> Vec<(TokenKind, String)> {
        let mut s = Scanner::new(src, vec![]);
        let mut out = vec![];
        loop {
            let tk = s.start(opts).unwrap();
            if tk == TokenKind::None {
                break;
            }
            out.push((tk, s.lexeme().to_string()));
        }
        out
    }

    #[test]
    fn test_strip_invisible() {
        assert_eq!(strip_invisible("a\u{0001}\u{0002}b"), "a\tb");
        assert_eq!(strip_invisible("\\\u{0007}x"), "\\\u{0007}x");
    }

    #[test]
    fn test_simple_expression() {
        let tokens = scan_all("1 + 2", &Options::default());
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Num, "1".into()),
                (TokenKind::Add, "+".into()),
                (TokenKind::Num, "2".into()),
            ]
        );
    }

    #[test]
    fn test_commands() {
        let tokens = scan_all(r"\frac{1}{2}", &Options::default());
        assert_eq!(tokens[0], (TokenKind::Frac, r"\frac".into()));
        assert_eq!(tokens[1], (TokenKind::LeftBrace, "{".into()));
        assert_eq!(tokens[2], (TokenKind::Num, "1".into()));
    }

    #[test]
    fn test_unknown_command_is_var() {
        let tokens = scan_all(r"\alpha", &Options::default());
        assert_eq!(tokens, vec![(TokenKind::Var, r"\alpha".into())]);
    }

    #[test]
    fn test_whitespace_commands() {
        let tokens = scan_all(r"1 \quad \, \big + 2", &Options::default());
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].0, TokenKind::Add);
    }

    #[test]
    fn test_two_char_fusions() {
        let tokens = scan_all("a != b ** 2 -> c <= d", &Options::default());
        let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.0).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Var,
                TokenKind::Ne,
                TokenKind::Var,
                TokenKind::Caret,
                TokenKind::Num,
                TokenKind::RightArrowTk,
                TokenKind::Var,
                TokenKind::Le,
                TokenKind::Var,
            ]
        );
    }

    #[test]
    fn test_primes() {
        let tokens = scan_all("f''", &Options::default());
        assert_eq!(tokens[0], (TokenKind::Var, "f".into()));
        assert_eq!(tokens[1], (TokenKind::Var, "''".into()));
    }

    #[test]
    fn test_escaped_set_braces() {
        let tokens = scan_all(r"\{1\}", &Options::default());
        assert_eq!(tokens[0].0, TokenKind::LeftBraceSet);
        assert_eq!(tokens[2].0, TokenKind::RightBraceSet);
    }

    #[test]
    fn test_text_strips_whitespace() {
        let tokens = scan_all(r"\text{k m}", &Options::default());
        assert_eq!(tokens, vec![(TokenKind::Text, "km".into())]);

        let opts = Options {
            keep_text_whitespace: true,
            ..Default::default()
        };
        let tokens = scan_all(r"\text{k m}", &opts);
        assert_eq!(tokens, vec![(TokenKind::Text, "k m".into())]);
    }

    #[test]
    fn test_ignore_text() {
        let opts = Options {
            ignore_text: true,
            ..Default::default()
        };
        let tokens = scan_all(r"1\text{apples}", &opts);
        assert_eq!(tokens, vec![(TokenKind::Num, "1".into())]);
    }

    #[test]
    fn test_operatorname() {
        let tokens = scan_all(r"\operatorname{gcd}", &Options::default());
        assert_eq!(tokens, vec![(TokenKind::GcdTk, "gcd".into())]);
        let tokens = scan_all(r"\operatorname{foo}", &Options::default());
        assert_eq!(tokens, vec![(TokenKind::Var, "foo".into())]);
    }

    #[test]
    fn test_begin_end_capture_environment_name() {
        let tokens = scan_all(r"\begin{matrix}1\end{matrix}", &Options::default());
        assert_eq!(tokens[0], (TokenKind::Begin, "matrix".into()));
        assert_eq!(tokens[2], (TokenKind::End, "matrix".into()));
    }

    #[test]
    fn test_aliases() {
        let tokens = scan_all(r"\varepsilon\emptyset\infty", &Options::default());
        assert_eq!(tokens[0], (TokenKind::Var, r"\epsilon".into()));
        assert_eq!(tokens[1], (TokenKind::Var, r"\varnothing".into()));
        assert_eq!(tokens[2], (TokenKind::Num, r"\infty".into()));
    }

    #[test]
    fn test_unicode_normalization() {
        let tokens = scan_all("α≤β", &Options::default());
        assert_eq!(
            tokens,
            vec![
                (TokenKind::Var, r"\alpha".into()),
                (TokenKind::Le, r"\le".into()),
                (TokenKind::Var, r"\beta".into()),
            ]
        );
        // U+2212 minus normalizes to '-'
        let tokens = scan_all("1\u{2212}2", &Options::default());
        assert_eq!(tokens[1].0, TokenKind::Sub);
    }

    #[test]
    fn test_nbsp_entity_is_whitespace() {
        let tokens = scan_all("1&nbsp;+&nbsp;2", &Options::default());
        assert_eq!(tokens.len(), 3);
        assert_eq!(tokens[1].0, TokenKind::Add);
    }

    #[test]
    fn test_decimal_number() {
        let mut s = Scanner::new("12.5", vec![]);
        assert_eq!(s.start(&Options::default()).unwrap(), TokenKind::Num);
        assert_eq!(s.lexeme(), "12.5");
        assert_eq!(s.separator_count(), 1);
        assert_eq!(s.last_separator_index(), Some(2));
    }

    #[test]
    fn test_leading_dot() {
        let mut s = Scanner::new(".5", vec![]);
        assert_eq!(s.start(&Options::default()).unwrap(), TokenKind::Num);
        assert_eq!(s.lexeme(), "0.5");
    }

    #[test]
    fn test_dot_before_overline_becomes_zero() {
        let mut s = Scanner::new(r".\overline{3}", vec![]);
        assert_eq!(s.start(&Options::default()).unwrap(), TokenKind::Num);
        assert_eq!(s.lexeme(), "0.");
        assert_eq!(s.start(&Options::default()).unwrap(), TokenKind::OverlineTk);
    }

    #[test]
    fn test_lone_period_token() {
        let tokens = scan_all(r"\left. x \right.", &Options::default());
        assert_eq!(tokens[0].0, TokenKind::Left);
        assert_eq!(tokens[1].0, TokenKind::Period);
        assert_eq!(tokens[4].0, TokenKind::Period);
    }

    #[test]
    fn test_thousands_separator() {
        let opts = Options {
            set_thousands_separator: vec![','],
            ..Default::default()
        };
        let mut s = Scanner::new("1,234.5", vec![]);
        assert_eq!(s.start(&opts).unwrap(), TokenKind::Num);
        assert_eq!(s.lexeme(), "1234.5");
        assert_eq!(s.raw_lexeme(), "1,234.5");
        assert_eq!(s.separator_count(), 2);
    }

    #[test]
    fn test_braced_thousands_separator() {
        let opts = Options {
            set_thousands_separator: vec![','],
            ..Default::default()
        };
        let mut s = Scanner::new("1{,}234.5", vec![]);
        assert_eq!(s.start(&opts).unwrap(), TokenKind::Num);
        assert_eq!(s.lexeme(), "1234.5");
        assert_eq!(s.separator_count(), 2);
    }

    #[test]
    fn test_separator_not_consumed_without_digit() {
        let opts = Options {
            allow_thousands_separator: true,
            ..Default::default()
        };
        let mut s = Scanner::new("1, x", vec![]);
        assert_eq!(s.start(&opts).unwrap(), TokenKind::Num);
        assert_eq!(s.lexeme(), "1");
        assert_eq!(s.start(&opts).unwrap(), TokenKind::Comma);
    }

    #[test]
    fn test_misplaced_thousands_separator() {
        let opts = Options {
            allow_thousands_separator: true,
            ..Default::default()
        };
        let mut s = Scanner::new("1,23", vec![]);
        assert_eq!(s.start(&opts).unwrap_err().code(), 1005);
    }

    #[test]
    fn test_mismatched_thousands_separators() {
        let opts = Options {
            set_thousands_separator: vec![',', ' '],
            ..Default::default()
        };
        let mut s = Scanner::new("1,234 567", vec![]);
        assert_eq!(s.start(&opts).unwrap_err().code(), 1013);
    }

    #[test]
    fn test_multiple_decimal_separators() {
        let mut s = Scanner::new("1.2.3", vec![]);
        assert_eq!(s.start(&Options::default()).unwrap_err().code(), 1002);
    }

    #[test]
    fn test_one_char_token() {
        let opts = Options {
            one_char_token: true,
            ..Default::default()
        };
        let mut s = Scanner::new("23", vec![]);
        assert_eq!(s.start(&opts).unwrap(), TokenKind::Num);
        assert_eq!(s.lexeme(), "2");
        assert_eq!(s.start(&opts).unwrap(), TokenKind::Num);
        assert_eq!(s.lexeme(), "3");
    }

    #[test]
    fn test_greedy_identifier() {
        let idents = vec!["kg".to_string(), "mol".to_string()];
        let mut s = Scanner::new("kg", idents.clone());
        assert_eq!(s.start(&Options::default()).unwrap(), TokenKind::Var);
        assert_eq!(s.lexeme(), "kg");

        // no matching identifier: backtrack to the single character
        let mut s = Scanner::new("km", idents);
        assert_eq!(s.start(&Options::default()).unwrap(), TokenKind::Var);
        assert_eq!(s.lexeme(), "k");
        assert_eq!(s.start(&Options::default()).unwrap(), TokenKind::Var);
        assert_eq!(s.lexeme(), "m");
    }

    #[test]
    fn test_greedy_identifier_with_command_prefix() {
        let idents = vec!["\\mu g".to_string()];
        let mut s = Scanner::new(r"\mu g", idents);
        assert_eq!(s.start(&Options::default()).unwrap(), TokenKind::Var);
        assert_eq!(s.lexeme(), "\\mu g");
    }

    #[test]
    fn test_invalid_character() {
        let mut s = Scanner::new("#", vec![]);
        assert_eq!(s.start(&Options::default()).unwrap_err().code(), 1004);
    }
}

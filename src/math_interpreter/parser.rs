//! Recursive-descent operator-precedence parser for LaTeX math.
//!
//! Each precedence level is a function, from loosest to tightest binding:
//!
//! commaExpr -> impliesExpr -> equalExpr -> relationalExpr -> ratioExpr
//!   -> additiveExpr -> multiplicativeExpr -> fractionExpr -> subscriptExpr
//!   -> unaryExpr -> postfixExpr -> exponentialExpr -> primaryExpr
//!
//! The parser owns a scanner and a single token of lookahead (`hd`/`next`),
//! plus a one-slot pushback for the few places that must peek past a
//! consumed token (the `|_{...}` postfix and chemistry ion suffixes).
//! Adjacency of factors is implicit multiplication; multiplicativeExpr
//! disambiguates it against mixed numbers, repeating decimals, E-notation
//! and scientific form, prime attachment, molar mass and degree units.
//!
//! Chains of relations reify as COMMA-of-pairs: `a=b=c` reads as
//! `, (= a b) (= b c)` with the shared operand deep-copied, never aliased.

use super::ast::{Arg, Node, Op};
use super::error::ParseError;
use super::model::Environment;
use super::options::Options;
use super::scanner::Scanner;
use super::token::TokenKind;
use crate::utils;

type Result<T> = std::result::Result<T, ParseError>;

/// One token of lookahead, with the numeric bookkeeping NUM tokens carry.
#[derive(Debug, Clone)]
struct Look {
    tk: TokenKind,
    lexeme: String,
    raw: String,
    sep_count: u32,
    last_sep: Option<usize>,
}

pub struct Parser {
    scan: Scanner,
    options: Options,
    src: String,
    look: Option<Look>,
    pushed: Option<Look>,
    bracket_count: u32,
    pipe_count: u32,
    chemistry: bool,
}

/// Parse `src` under `options`, reading identifiers from `env`. An empty
/// source is not an error; it yields the canonical NONE node.
pub fn parse(options: &Options, src: &str, env: &Environment) -> Result<Node> {
    Parser::new(options, src, env)?.expr()
}

impl Parser {
    pub fn new(options: &Options, src: &str, env: &Environment) -> Result<Parser> {
        options.validate()?;
        Ok(Parser {
            scan: Scanner::new(src, env.identifiers()),
            options: options.clone(),
            src: src.to_string(),
            look: None,
            pushed: None,
            bracket_count: 0,
            pipe_count: 0,
            chemistry: env.is_chemistry(),
        })
    }

    /// Produce the root node or fail; there is no partial recovery.
    pub fn expr(&mut self) -> Result<Node> {
        let src = self.src.clone();
        self.expr_inner().map_err(|e| e.with_text(&src))
    }

    fn expr_inner(&mut self) -> Result<Node> {
        if self.hd()? == TokenKind::None {
            return Ok(Node::none());
        }
        let node = self.comma_expr(true)?;
        if self.hd()? != TokenKind::None {
            let found = self.found_text();
            return Err(ParseError::new(1003, &[&found]));
        }
        Ok(node)
    }

    // ---- lookahead -------------------------------------------------------

    fn hd(&mut self) -> Result<TokenKind> {
        if self.look.is_none() {
            if let Some(p) = self.pushed.take() {
                self.look = Some(p);
            } else {
                let tk = self.scan.start(&self.options)?;
                self.look = Some(Look {
                    tk,
                    lexeme: self.scan.lexeme().to_string(),
                    raw: self.scan.raw_lexeme().to_string(),
                    sep_count: self.scan.separator_count(),
                    last_sep: self.scan.last_separator_index(),
                });
            }
        }
        Ok(self.look.as_ref().map(|l| l.tk).unwrap_or(TokenKind::None))
    }

    fn lexeme(&self) -> &str {
        self.look.as_ref().map(|l| l.lexeme.as_str()).unwrap_or("")
    }

    fn next(&mut self) {
        self.look = None;
    }

    /// Undo one `next`; at most one token deep.
    fn unread(&mut self, look: Look) {
        self.pushed = self.look.take();
        self.look = Some(look);
    }

    fn saved_look(&self) -> Result<Look> {
        self.look
            .clone()
            .ok_or_else(|| ParseError::internal("lookahead missing"))
    }

    fn found_text(&self) -> String {
        match &self.look {
            Some(l) if l.tk == TokenKind::None => "end of input".to_string(),
            Some(l) if !l.lexeme.is_empty() => l.lexeme.clone(),
            Some(l) => format!("{:?}", l.tk),
            None => "end of input".to_string(),
        }
    }

    fn err_expected(&self, what: &str) -> ParseError {
        ParseError::new(1001, &[what, &self.found_text()])
    }

    fn expect(&mut self, tk: TokenKind, what: &str) -> Result<()> {
        if self.hd()? == tk {
            self.next();
            Ok(())
        } else {
            Err(self.err_expected(what))
        }
    }

    // ---- precedence ladder ----------------------------------------------

    /// Comma-separated sequence; `;` joins the same list when allowed.
    fn comma_expr(&mut self, allow_semicolon: bool) -> Result<Node> {
        let first = self.implies_expr()?;
        let mut items = vec![first];
        loop {
            let tk = self.hd()?;
            let is_sep =
                tk == TokenKind::Comma || (allow_semicolon && tk == TokenKind::Semicolon);
            if !is_sep {
                break;
            }
            self.next();
            if self.hd()?.is_list_break() {
                break;
            }
            items.push(self.implies_expr()?);
        }
        if items.len() == 1 {
            Ok(items.swap_remove(0))
        } else {
            Ok(Node::nary(Op::Comma, items))
        }
    }

    fn implies_expr(&mut self) -> Result<Node> {
        let mut node = self.equal_expr()?;
        loop {
            let op = match self.hd()? {
                TokenKind::Implies => Op::Implies,
                TokenKind::Iff => Op::Iff,
                _ => break,
            };
            self.next();
            let rhs = self.equal_expr()?;
            node = Node::binary(op, node, rhs, false);
        }
        Ok(node)
    }

    fn equal_expr(&mut self) -> Result<Node> {
        let mut operands = vec![self.relational_expr()?];
        let mut ops = vec![];
        loop {
            let op = match self.hd()? {
                TokenKind::Equal => Op::Eql,
                TokenKind::Ne => Op::Ne,
                TokenKind::Approx => Op::Approx,
                TokenKind::RightArrowTk => Op::RightArrow,
                _ => break,
            };
            self.next();
            operands.push(self.relational_expr()?);
            ops.push(op);
        }
        Ok(reify_chain(operands, ops))
    }

    fn relational_expr(&mut self) -> Result<Node> {
        let mut operands = vec![self.ratio_expr()?];
        let mut ops = vec![];
        loop {
            // `\not` folds into the relational operator that follows
            let negate = self.hd()? == TokenKind::Not;
            if negate {
                self.next();
            }
            let op = match self.hd()? {
                TokenKind::Lt => Op::Lt,
                TokenKind::Le => Op::Le,
                TokenKind::Gt => Op::Gt,
                TokenKind::Ge => Op::Ge,
                TokenKind::Ngtr => Op::Ngtr,
                TokenKind::Nless => Op::Nless,
                TokenKind::InTk => Op::In,
                TokenKind::NotInTk => Op::NotIn,
                TokenKind::Ni => Op::Ni,
                TokenKind::To => Op::To,
                TokenKind::Perp => Op::Perp,
                TokenKind::Propto => Op::Propto,
                TokenKind::Subset => Op::Subset,
                TokenKind::SubsetEq => Op::SubsetEq,
                TokenKind::Supset => Op::Supset,
                TokenKind::SupsetEq => Op::SupsetEq,
                TokenKind::Parallel => Op::Parallel,
                TokenKind::NParallel => Op::NParallel,
                TokenKind::Sim => Op::Sim,
                TokenKind::Cong => Op::Cong,
                TokenKind::Equal if negate => Op::Eql,
                _ if negate => return Err(self.err_expected("a relational operator")),
                _ => break,
            };
            self.next();
            let op = if negate { negate_relation(op)? } else { op };
            operands.push(self.ratio_expr()?);
            ops.push(op);
        }
        Ok(reify_chain(operands, ops))
    }

    fn ratio_expr(&mut self) -> Result<Node> {
        let node = self.additive_expr()?;
        if self.hd()? != TokenKind::Colon {
            return Ok(node);
        }
        let mut items = vec![node];
        while self.hd()? == TokenKind::Colon {
            self.next();
            items.push(self.additive_expr()?);
        }
        Ok(Node::nary(Op::Colon, items))
    }

    fn additive_expr(&mut self) -> Result<Node> {
        let mut node = self.multiplicative_expr(false)?;
        loop {
            let (op, flatten) = match self.hd()? {
                TokenKind::Add => (Op::Add, !self.options.compare_grouping),
                TokenKind::Sub => (Op::Sub, false),
                TokenKind::Pm => (Op::Pm, false),
                TokenKind::Mp => (Op::Mp, false),
                TokenKind::SetMinus => (Op::SetMinus, false),
                TokenKind::Cup => (Op::Cup, false),
                TokenKind::Cap => (Op::Cap, false),
                _ => break,
            };
            self.next();
            let mut rhs = self.multiplicative_expr(false)?;
            if matches!(op, Op::Cup | Op::Cap | Op::SetMinus) {
                node = wrap_set(node);
                rhs = wrap_set(rhs);
            }
            let flatten = flatten && !rhs.flags.is_mixed_number;
            node = Node::binary(op, node, rhs, flatten);
        }
        Ok(node)
    }

    /// The disambiguation engine. With `implicit_only`, stop on explicit
    /// multiplicative operators and on function tokens so that `\sin 2x`
    /// binds `2x` and nothing more.
    fn multiplicative_expr(&mut self, implicit_only: bool) -> Result<Node> {
        let mut node = self.fraction_expr()?;
        loop {
            let tk = self.hd()?;
            match tk {
                TokenKind::Star | TokenKind::Cdot => {
                    if implicit_only {
                        break;
                    }
                    self.next();
                    let rhs = self.fraction_expr()?;
                    node = Node::binary(Op::Mul, node, rhs, true);
                }
                TokenKind::Times => {
                    if implicit_only {
                        break;
                    }
                    self.next();
                    let rhs = self.fraction_expr()?;
                    let scientific = node.is_num() && is_pow_of_ten(&rhs);
                    let mut mul = Node::binary(Op::Mul, node, rhs, !scientific);
                    if scientific {
                        mul.flags.is_scientific = true;
                    }
                    node = mul;
                }
                TokenKind::DivTk => {
                    if implicit_only {
                        break;
                    }
                    self.next();
                    let rhs = self.fraction_expr()?;
                    node = Node::binary(Op::Frac, node, rhs, false);
                }
                _ => {
                    if !self.starts_factor(tk, implicit_only) {
                        break;
                    }
                    node = self.implicit_factor(node)?;
                }
            }
        }
        Ok(node)
    }

    fn starts_factor(&self, tk: TokenKind, implicit_only: bool) -> bool {
        use TokenKind::*;
        match tk {
            Num | Var | Text | LeftParen | LeftBrace | LeftBraceSet | Left | LeftAngle
            | Frac | Sqrt | VecTk | OverlineTk | DotTk | MathBf | Overset | Underset
            | DeltaTk | Begin | DegreeTk => true,
            LeftBracket => self.bracket_count == 0,
            Pipe | VerticalBar => self.pipe_count == 0,
            t if t.is_function() => !implicit_only,
            _ => false,
        }
    }

    /// One implicit factor following `node`, choosing among mixed number,
    /// repeating decimal, E-notation, prime attachment, molar mass, degree
    /// attachment and plain juxtaposition.
    fn implicit_factor(&mut self, node: Node) -> Result<Node> {
        use TokenKind::*;
        match self.hd()? {
            Num if ends_in_num(&node) => Err(ParseError::new(1010, &[])),
            OverlineTk | DotTk if node.is_decimal() => {
                let over = self.primary_expr()?;
                Ok(make_repeating(node, over))
            }
            Frac if node.is_integer() => {
                let frac = self.primary_expr()?;
                if is_simple_fraction(&frac) {
                    let mut add = Node::binary(Op::Add, node, frac, false);
                    add.flags.is_mixed_number = true;
                    Ok(add)
                } else {
                    Ok(mul_implicit(node, frac))
                }
            }
            Text if node.is_num() && matches!(self.lexeme(), "e" | "E") => {
                self.e_notation(node)
            }
            Var if node.op == Op::Var && self.lexeme().starts_with('\'') => {
                let primes = Node::var(self.lexeme());
                self.next();
                Ok(Node::binary(Op::Pow, node, primes, false))
            }
            LeftParen if self.chemistry && node.is_var_named("M") => {
                let arg = self.primary_expr()?;
                Ok(Node::unary(Op::MolarMass, arg))
            }
            DegreeTk => {
                self.next();
                Ok(attach_degree(node))
            }
            _ => {
                let rhs = self.fraction_expr()?;
                Ok(mul_implicit(node, rhs))
            }
        }
    }

    /// `1.5e3` written as number, TEXT `e`, signed number.
    fn e_notation(&mut self, mantissa: Node) -> Result<Node> {
        let marker = self.saved_look()?;
        self.next();
        let negative = match self.hd()? {
            TokenKind::Sub => {
                self.next();
                true
            }
            TokenKind::Add => {
                self.next();
                false
            }
            TokenKind::Num => false,
            _ => {
                // not E-notation after all; the marker is a plain factor
                self.unread(marker);
                let rhs = self.fraction_expr()?;
                return Ok(mul_implicit(mantissa, rhs));
            }
        };
        if self.hd()? != TokenKind::Num {
            return Err(self.err_expected("an exponent"));
        }
        let mut digits = self.lexeme().to_string();
        self.next();
        if negative {
            digits.insert(0, '-');
        }
        let pow = Node::binary(Op::Pow, Node::num("10"), Node::num(&digits), false);
        let mut mul = Node::binary(Op::Mul, mantissa, pow, false);
        mul.flags.is_scientific = true;
        Ok(mul)
    }

    fn fraction_expr(&mut self) -> Result<Node> {
        let mut node = self.subscript_expr()?;
        while self.hd()? == TokenKind::Slash {
            self.next();
            let rhs = self.subscript_expr()?;
            let mut frac = Node::binary(Op::Frac, node, rhs, false);
            frac.flags.is_slash = true;
            node = frac;
        }
        Ok(node)
    }

    /// Folds `_`-chains and interleaved `^` so that `x^2_1` and `x_1^2`
    /// produce the same POW-of-SUBSCRIPT shape.
    fn subscript_expr(&mut self) -> Result<Node> {
        let mut node = self.unary_expr()?;
        loop {
            match self.hd()? {
                TokenKind::Underscore => {
                    self.next();
                    let sub = self.scoped_unit()?;
                    node = merge_subscript(node, sub)?;
                }
                TokenKind::Caret => {
                    self.next();
                    let exp = self.scoped_unit()?;
                    node = Node::binary(Op::Pow, node, exp, false);
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn unary_expr(&mut self) -> Result<Node> {
        match self.hd()? {
            TokenKind::Add => {
                self.next();
                Ok(Node::unary(Op::Add, self.unary_expr()?))
            }
            TokenKind::Sub => {
                self.next();
                Ok(Node::unary(Op::Sub, self.unary_expr()?))
            }
            TokenKind::Not => {
                self.next();
                Ok(Node::unary(Op::Not, self.unary_expr()?))
            }
            TokenKind::Pm => {
                self.next();
                Ok(Node::unary(Op::Pm, self.multiplicative_expr(false)?))
            }
            TokenKind::Caret => {
                // a standalone `^` introducer, as in isotope charges
                self.next();
                let exp = self.scoped_unit()?;
                Ok(Node::binary(Op::Pow, Node::none(), exp, false))
            }
            TokenKind::Underscore => {
                self.next();
                let sub = self.scoped_unit()?;
                Ok(Node::binary(Op::Subscript, Node::none(), sub, false))
            }
            _ => self.postfix_expr(),
        }
    }

    fn postfix_expr(&mut self) -> Result<Node> {
        let mut node = self.exponential_expr()?;
        loop {
            match self.hd()? {
                TokenKind::Percent => {
                    self.next();
                    node = Node::unary(Op::Percent, node);
                }
                TokenKind::Bang => {
                    self.next();
                    node = Node::unary(Op::Fact, node);
                }
                TokenKind::Pipe if self.pipe_count == 0 => {
                    // `|_{...}`; a bare `|` starts a new absolute value
                    let pipe = self.saved_look()?;
                    self.next();
                    if self.hd()? == TokenKind::Underscore {
                        self.next();
                        let sub = self.scoped_unit()?;
                        node = Node::binary(Op::Pipe, node, sub, false);
                    } else {
                        self.unread(pipe);
                        break;
                    }
                }
                TokenKind::Add | TokenKind::Sub if self.chemistry => {
                    // ion suffix right before a closing brace
                    let sign = self.saved_look()?;
                    self.next();
                    if self.hd()? == TokenKind::RightBrace {
                        node = Node::binary(Op::Pow, node, Node::var(&sign.lexeme), false);
                    } else {
                        self.unread(sign);
                        break;
                    }
                }
                _ => break,
            }
        }
        Ok(node)
    }

    fn exponential_expr(&mut self) -> Result<Node> {
        let base = self.primary_expr()?;
        if self.hd()? != TokenKind::Caret {
            return Ok(base);
        }
        let mut exps: Vec<Node> = vec![];
        while self.hd()? == TokenKind::Caret {
            self.next();
            exps.push(self.scoped_unit()?);
        }
        // the \circ superscript denotes degree units
        if exps.len() == 1 && exps[0].is_var_named("\\circ") {
            let mut node = Node::binary(Op::Mul, base, Node::var("\\degree"), false);
            if matches!(self.hd()?, TokenKind::Text | TokenKind::Var)
                && matches!(self.lexeme(), "K" | "C" | "F")
            {
                let unit = Node::var(self.lexeme());
                self.next();
                node = Node::binary(Op::Mul, node, unit, true);
            }
            return Ok(node);
        }
        let mut exp = match exps.pop() {
            Some(e) => e,
            None => return Err(ParseError::internal("empty exponent chain")),
        };
        while let Some(prev) = exps.pop() {
            exp = Node::binary(Op::Pow, prev, exp, false);
        }
        Ok(Node::binary(Op::Pow, base, exp, false))
    }

    /// The single-character scope that follows `^` and `_`. A brace group
    /// lifts the restriction; a bare sign with nothing attachable after it
    /// is an ion charge and reads as a VAR.
    fn scoped_unit(&mut self) -> Result<Node> {
        self.options.one_char_token = true;
        let result = self.scoped_unit_inner();
        self.options.one_char_token = false;
        result
    }

    fn scoped_unit_inner(&mut self) -> Result<Node> {
        match self.hd()? {
            TokenKind::LeftBrace => {
                self.options.one_char_token = false;
                self.brace_expr(TokenKind::LeftBrace, false)
            }
            tk @ (TokenKind::Add | TokenKind::Sub) => {
                self.next();
                let after = self.hd()?;
                // in chemistry mode a bare sign is the whole exponent (an
                // ion charge); otherwise a sign glues onto what follows
                let signed = !self.chemistry
                    && (self.starts_factor(after, false)
                        || matches!(after, TokenKind::Add | TokenKind::Sub));
                if signed {
                    let inner = self.scoped_unit_inner()?;
                    Ok(Node::unary(
                        if tk == TokenKind::Sub { Op::Sub } else { Op::Add },
                        inner,
                    ))
                } else {
                    Ok(Node::var(if tk == TokenKind::Sub { "-" } else { "+" }))
                }
            }
            TokenKind::Circ => {
                self.next();
                Ok(Node::var("\\circ"))
            }
            _ => self.primary_expr(),
        }
    }

    // ---- primaries -------------------------------------------------------

    fn primary_expr(&mut self) -> Result<Node> {
        use TokenKind::*;
        let tk = self.hd()?;
        match tk {
            Num => self.number_node(),
            Var => {
                let name = self.lexeme().to_string();
                self.next();
                Ok(Node::var(&name))
            }
            Text => {
                let content = self.lexeme().to_string();
                self.next();
                Ok(Node::text(&content))
            }
            LeftBrace | LeftBraceSet => self.brace_expr(tk, false),
            LeftParen | LeftBracket | RightBracket => self.paren_expr(tk, false),
            Left => self.left_expr(),
            LeftAngle => self.angle_expr(false),
            Pipe | VerticalBar => self.abs_expr(tk, false),
            Frac => self.frac_expr(),
            Sqrt => self.sqrt_expr(),
            VecTk => self.command_unary(Op::Vec, "\\vec"),
            OverlineTk => self.command_unary(Op::Overline, "\\overline"),
            DotTk => self.dot_expr(),
            MathBf => self.command_unary(Op::MathBf, "\\mathbf"),
            Overset | Underset => self.overset_expr(),
            DeltaTk => self.delta_expr(),
            Begin => self.matrix_expr(),
            Int => self.integral_expr(1),
            IInt => self.integral_expr(2),
            IIInt => self.integral_expr(3),
            SumTk => self.bounded_expr(Op::Sum),
            ProdTk => self.bounded_expr(Op::Prod),
            BigCup => self.bounded_expr(Op::BigCup),
            BigCap => self.bounded_expr(Op::BigCap),
            LimTk => self.lim_expr(),
            Ln | Lg | LogTk => self.log_expr(tk),
            Circ => {
                self.next();
                Ok(Node::var("\\circ"))
            }
            DegreeTk => {
                self.next();
                Ok(Node::var("\\degree"))
            }
            None => Err(ParseError::new(1006, &["end of input"])),
            t if t.is_function() => self.function_expr(t),
            _ => {
                if self.options.strict {
                    Err(ParseError::new(1006, &[&self.found_text()]))
                } else {
                    warn!("parser: no expression at {:?}", self.found_text());
                    Ok(Node::none())
                }
            }
        }
    }

    fn number_node(&mut self) -> Result<Node> {
        let look = self.saved_look()?;
        self.next();
        let mut lexeme = if self.options.strict {
            look.raw
        } else {
            look.lexeme
        };
        if !self.options.strict && lexeme != "\\infty" {
            if let Some(places) = self.options.decimal_places {
                lexeme = utils::round_decimal(&lexeme, places);
            }
        }
        let mut node = Node::num(&lexeme);
        node.separator_count = look.sep_count;
        node.last_separator_index = look.last_sep;
        Ok(node)
    }

    // ---- brackets --------------------------------------------------------

    /// `{...}` and `\{...\}`; with `left_form`, `\left\{ ... \right<any>`.
    /// Empty braces yield a COMMA of zero arguments.
    fn brace_expr(&mut self, open: TokenKind, left_form: bool) -> Result<Node> {
        self.next();
        let close_expected = if open == TokenKind::LeftBrace {
            TokenKind::RightBrace
        } else {
            TokenKind::RightBraceSet
        };
        let empty = self.hd()? == close_expected || (left_form && self.hd()? == TokenKind::Right);
        let mut node = if empty {
            Node::nary(Op::Comma, vec![])
        } else {
            self.comma_expr(true)?
        };
        let close = if left_form {
            self.expect(TokenKind::Right, "\\right")?;
            let c = self.hd()?;
            if c.bracket_char().is_none() {
                return Err(self.err_expected("a closing delimiter"));
            }
            self.next();
            c
        } else {
            self.expect(close_expected, "a closing brace")?;
            close_expected
        };
        node.lbrk = Some(open);
        node.rbrk = Some(close);
        Ok(node)
    }

    /// `( ... )` and `[ ... ]`, including intervals, French brackets and
    /// `\left ... \right` forms.
    fn paren_expr(&mut self, open: TokenKind, left_form: bool) -> Result<Node> {
        self.next();
        if open != TokenKind::LeftParen {
            self.bracket_count += 1;
        }
        let empty = matches!(self.hd()?, TokenKind::RightParen | TokenKind::RightBracket)
            || (left_form && self.hd()? == TokenKind::Right);
        let contents = if empty {
            Node::nary(Op::Comma, vec![])
        } else {
            self.comma_expr(true)?
        };
        let close = if left_form {
            self.expect(TokenKind::Right, "\\right")?;
            let c = self.hd()?;
            if c.bracket_char().is_none() {
                return Err(self.err_expected("a closing delimiter"));
            }
            self.next();
            c
        } else {
            let c = self.hd()?;
            match c {
                TokenKind::RightParen | TokenKind::RightBracket | TokenKind::LeftBracket => {
                    self.next();
                    c
                }
                _ => return Err(self.err_expected("`)` or `]`")),
            }
        };
        if open != TokenKind::LeftParen {
            self.bracket_count -= 1;
        }
        classify_group(open, close, contents)
    }

    /// `\left<delim>`: dispatch on the delimiter that follows.
    fn left_expr(&mut self) -> Result<Node> {
        self.next();
        let delim = self.hd()?;
        match delim {
            TokenKind::LeftParen | TokenKind::LeftBracket | TokenKind::RightBracket => {
                self.paren_expr(delim, true)
            }
            TokenKind::LeftBrace | TokenKind::LeftBraceSet => self.brace_expr(delim, true),
            TokenKind::Pipe | TokenKind::VerticalBar => self.abs_expr(delim, true),
            TokenKind::LeftAngle => self.angle_expr(true),
            TokenKind::Period => self.evalat_expr(),
            _ => Err(self.err_expected("a delimiter after \\left")),
        }
    }

    /// `\left. expr \right|` evaluated-at; the subscript attaches above.
    fn evalat_expr(&mut self) -> Result<Node> {
        self.next();
        let contents = self.comma_expr(true)?;
        self.expect(TokenKind::Right, "\\right")?;
        let close = self.hd()?;
        if close.bracket_char().is_none() {
            return Err(self.err_expected("a closing delimiter"));
        }
        self.next();
        match close {
            TokenKind::Pipe | TokenKind::VerticalBar => {
                Ok(Node::unary(Op::EvalAt, contents)
                    .with_brackets(TokenKind::Period, close))
            }
            _ => Ok(Node::unary(Op::Paren, contents).with_brackets(TokenKind::Period, close)),
        }
    }

    fn abs_expr(&mut self, open: TokenKind, left_form: bool) -> Result<Node> {
        self.next();
        self.pipe_count += 1;
        let contents = self.comma_expr(true)?;
        if left_form {
            self.expect(TokenKind::Right, "\\right")?;
        }
        let close = self.hd()?;
        if !matches!(close, TokenKind::Pipe | TokenKind::VerticalBar) {
            return Err(self.err_expected("a closing `|`"));
        }
        self.next();
        self.pipe_count -= 1;
        Ok(Node::unary(Op::Abs, contents).with_brackets(open, close))
    }

    fn angle_expr(&mut self, left_form: bool) -> Result<Node> {
        self.next();
        let contents = self.comma_expr(true)?;
        if left_form {
            self.expect(TokenKind::Right, "\\right")?;
        }
        self.expect(TokenKind::RightAngle, "\\rangle")?;
        Ok(Node::unary(Op::AngleBracket, contents)
            .with_brackets(TokenKind::LeftAngle, TokenKind::RightAngle))
    }

    // ---- commands --------------------------------------------------------

    /// A brace-delimited command argument; the single-token shorthand
    /// (`\frac12`) is honoured through the scoped unit.
    fn cmd_arg(&mut self, command: &str) -> Result<Node> {
        match self.hd()? {
            TokenKind::LeftBrace => {
                let mut node = self.brace_expr(TokenKind::LeftBrace, false)?;
                node.lbrk = None;
                node.rbrk = None;
                Ok(node)
            }
            TokenKind::None => Err(ParseError::new(1009, &[command])),
            _ => self.scoped_unit(),
        }
    }

    fn command_unary(&mut self, op: Op, command: &str) -> Result<Node> {
        self.next();
        let arg = self.cmd_arg(command)?;
        Ok(Node::unary(op, arg))
    }

    fn frac_expr(&mut self) -> Result<Node> {
        self.next();
        let numerator = self.cmd_arg("\\frac")?;
        let denominator = self.cmd_arg("\\frac")?;
        if let Some(deriv) = self.derivative(&numerator, &denominator)? {
            return Ok(deriv);
        }
        let mut frac = Node::binary(Op::Frac, numerator, denominator, false);
        frac.flags.is_fraction = true;
        Ok(frac)
    }

    /// `\frac{dy}{dx}` and `\frac{d}{dx} expr` are derivatives.
    fn derivative(&mut self, numerator: &Node, denominator: &Node) -> Result<Option<Node>> {
        let wrt = match differential_var(denominator) {
            Some(v) => v,
            None => return Ok(None),
        };
        if numerator.is_var_named("d") {
            let body = self.multiplicative_expr(true)?;
            return Ok(Some(Node::binary(Op::Deriv, body, wrt, false)));
        }
        if let Some(body) = differential_body(numerator) {
            return Ok(Some(Node::binary(Op::Deriv, body, wrt, false)));
        }
        Ok(None)
    }

    fn sqrt_expr(&mut self) -> Result<Node> {
        self.next();
        let index = if self.hd()? == TokenKind::LeftBracket {
            self.next();
            let idx = self.comma_expr(true)?;
            self.expect(TokenKind::RightBracket, "`]`")?;
            Some(idx)
        } else {
            None
        };
        let arg = self.cmd_arg("\\sqrt")?;
        Ok(match index {
            Some(idx) => Node::binary(Op::NthRoot, idx, arg, false),
            None => Node::unary(Op::Sqrt, arg),
        })
    }

    /// `\dot{3}45\dot{6}` builds an OVERLINE over the concatenation of
    /// every digit between the two dots.
    fn dot_expr(&mut self) -> Result<Node> {
        self.next();
        let first = self.cmd_arg("\\dot")?;
        let mut digits = match first.lexeme() {
            Some(s) if first.is_num() => s.to_string(),
            _ => return Err(self.err_expected("a digit under \\dot")),
        };
        loop {
            match self.hd()? {
                TokenKind::Num => {
                    digits.push_str(self.lexeme());
                    self.next();
                }
                TokenKind::DotTk => {
                    self.next();
                    let last = self.cmd_arg("\\dot")?;
                    match last.lexeme() {
                        Some(s) if last.is_num() => digits.push_str(s),
                        _ => return Err(self.err_expected("a digit under \\dot")),
                    }
                    break;
                }
                _ => break,
            }
        }
        Ok(Node::unary(Op::Overline, Node::num(&digits)))
    }

    /// `\overset{a}{s}`: the annotation joins the base symbol's args.
    fn overset_expr(&mut self) -> Result<Node> {
        self.next();
        let annotation = self.cmd_arg("\\overset")?;
        let mut base = self.overset_base()?;
        base.args.push(Arg::Node(annotation));
        Ok(base)
    }

    fn overset_base(&mut self) -> Result<Node> {
        if self.hd()? != TokenKind::LeftBrace {
            return self.scoped_unit();
        }
        self.next();
        if is_bare_operator(self.hd()?) {
            let lexeme = self.lexeme().to_string();
            let saved = self.saved_look()?;
            self.next();
            if self.hd()? == TokenKind::RightBrace {
                self.next();
                return Ok(Node::var(&lexeme));
            }
            self.unread(saved);
        }
        let node = self.comma_expr(true)?;
        self.expect(TokenKind::RightBrace, "a closing brace")?;
        Ok(node)
    }

    /// `\Delta x` names the variable `Delta_x`.
    fn delta_expr(&mut self) -> Result<Node> {
        self.next();
        if self.hd()? == TokenKind::Var {
            let name = format!("Delta_{}", self.lexeme());
            self.next();
            Ok(Node::var(&name))
        } else {
            Ok(Node::var("\\Delta"))
        }
    }

    // ---- big operators ---------------------------------------------------

    fn bounds(&mut self) -> Result<(Option<Node>, Option<Node>)> {
        let mut lower = None;
        let mut upper = None;
        loop {
            match self.hd()? {
                TokenKind::Underscore if lower.is_none() => {
                    self.next();
                    lower = Some(self.scoped_unit()?);
                }
                TokenKind::Caret if upper.is_none() => {
                    self.next();
                    upper = Some(self.scoped_unit()?);
                }
                _ => break,
            }
        }
        Ok((lower, upper))
    }

    /// `\int`, `\iint`, `\iiint`. The integrand must end in `d<var>`;
    /// multiple integrals strip one differential per nesting level.
    fn integral_expr(&mut self, depth: u32) -> Result<Node> {
        self.next();
        let (lower, upper) = self.bounds()?;

        let saved = self.options.parsing_integral_expr;
        self.options.parsing_integral_expr = true;
        let body = self.additive_expr();
        self.options.parsing_integral_expr = saved;
        let mut node = body?;

        // trailing differentials come off outermost-first
        let mut vars = vec![];
        for _ in 0..depth {
            match strip_dx(&node) {
                Some((stripped, var)) => {
                    node = stripped;
                    vars.push(var);
                }
                None => return Err(ParseError::new(1014, &[])),
            }
        }
        let mut result = node;
        let outermost = vars.len();
        for (i, var) in vars.into_iter().rev().enumerate() {
            let mut args = vec![];
            if i + 1 == outermost {
                if let Some(l) = lower.clone() {
                    args.push(l);
                }
                if let Some(u) = upper.clone() {
                    args.push(u);
                }
            }
            args.push(result);
            args.push(var);
            result = Node::nary(Op::Integral, args);
        }
        Ok(result)
    }

    /// `\sum`, `\prod`, `\bigcup`, `\bigcap` with optional bounds.
    fn bounded_expr(&mut self, op: Op) -> Result<Node> {
        self.next();
        let (lower, upper) = self.bounds()?;
        let body = self.multiplicative_expr(false)?;
        let mut args = vec![];
        if let Some(l) = lower {
            args.push(l);
        }
        if let Some(u) = upper {
            args.push(u);
        }
        args.push(body);
        Ok(Node::nary(op, args))
    }

    fn lim_expr(&mut self) -> Result<Node> {
        self.next();
        let bound = if self.hd()? == TokenKind::Underscore {
            self.next();
            Some(self.scoped_unit()?)
        } else {
            None
        };
        let body = self.multiplicative_expr(false)?;
        let mut args = vec![];
        if let Some(b) = bound {
            args.push(b);
        }
        args.push(body);
        Ok(Node::nary(Op::Lim, args))
    }

    // ---- named functions -------------------------------------------------

    /// Trig and friends. A single `^{-1}` exponent rewrites to the arc
    /// variant; other exponents wrap the applied function. The argument is
    /// the next bracketed group if present, otherwise an implicit-only
    /// multiplicative expression, so `\sin 2x` binds `2x` tightly.
    fn function_expr(&mut self, tk: TokenKind) -> Result<Node> {
        self.next();
        let mut exps: Vec<Node> = vec![];
        while self.hd()? == TokenKind::Caret {
            self.next();
            exps.push(self.scoped_unit()?);
        }
        let mut op = function_op(tk)?;
        if exps.len() == 1 && is_neg_one(&exps[0]) {
            if let Some(inverse) = inverse_of(op) {
                op = inverse;
                exps.clear();
            }
        }
        let (arg, differential) = self.function_arg()?;
        let mut node = Node::unary(op, arg);
        if let Some(mut exp) = exps.pop() {
            while let Some(prev) = exps.pop() {
                exp = Node::binary(Op::Pow, prev, exp, false);
            }
            node = Node::binary(Op::Pow, node, exp, false);
        }
        Ok(reattach_differential(node, differential))
    }

    /// `\log_b x`; `\ln` and `\lg` fix the base, `\log` defaults to 10.
    fn log_expr(&mut self, tk: TokenKind) -> Result<Node> {
        self.next();
        let base = match tk {
            TokenKind::Ln => Node::var("e"),
            TokenKind::Lg => Node::num("10"),
            _ => {
                if self.hd()? == TokenKind::Underscore {
                    self.next();
                    self.scoped_unit()?
                } else {
                    Node::num("10")
                }
            }
        };
        let (arg, differential) = self.function_arg()?;
        let node = Node::binary(Op::Log, base, arg, false);
        Ok(reattach_differential(node, differential))
    }

    /// The function argument, with the trailing differential split off in
    /// integral context so the integral above us can find it again.
    fn function_arg(&mut self) -> Result<(Node, Option<Node>)> {
        let arg = match self.hd()? {
            TokenKind::LeftParen | TokenKind::Left | TokenKind::LeftBrace => {
                self.primary_expr()?
            }
            _ => self.multiplicative_expr(true)?,
        };
        if self.options.parsing_integral_expr && has_dx(&arg) {
            if let Some((stripped, var)) = strip_dx(&arg) {
                return Ok((stripped, Some(var)));
            }
        }
        Ok((arg, None))
    }

    // ---- matrices --------------------------------------------------------

    fn matrix_expr(&mut self) -> Result<Node> {
        use TokenKind::*;
        let name = self.lexeme().to_string();
        let brackets = match name.as_str() {
            "matrix" | "smallmatrix" | "array" => Option::None,
            "pmatrix" => Some((LeftParen, RightParen)),
            "bmatrix" => Some((LeftBracket, RightBracket)),
            "Bmatrix" => Some((LeftBraceSet, RightBraceSet)),
            "vmatrix" | "Vmatrix" => Some((Pipe, Pipe)),
            _ => return Err(self.err_expected("a matrix environment")),
        };
        self.next();
        if name == "array" && self.hd()? == LeftBrace {
            // the column alignment spec carries no meaning here
            self.next();
            loop {
                match self.hd()? {
                    RightBrace => {
                        self.next();
                        break;
                    }
                    None => return Err(self.err_expected("a closing brace")),
                    _ => self.next(),
                }
            }
        }
        let mut rows = vec![];
        loop {
            rows.push(self.row_expr()?);
            match self.hd()? {
                NewRow => {
                    self.next();
                    if self.hd()? == End {
                        break;
                    }
                }
                End => break,
                _ => return Err(self.err_expected("\\\\ or \\end")),
            }
        }
        if self.lexeme() != name {
            return Err(self.err_expected(&format!("\\end{{{}}}", name)));
        }
        self.next();
        let matrix = Node::nary(Op::Matrix, rows);
        Ok(match brackets {
            Some((l, r)) => matrix.with_brackets(l, r),
            Option::None => matrix,
        })
    }

    fn row_expr(&mut self) -> Result<Node> {
        use TokenKind::*;
        let mut cols = vec![];
        loop {
            let cell = if matches!(self.hd()?, NewCol | NewRow | End) {
                Node::none()
            } else {
                self.comma_expr(true)?
            };
            cols.push(Node::unary(Op::Col, cell));
            if self.hd()? == NewCol {
                self.next();
            } else {
                break;
            }
        }
        Ok(Node::nary(Op::Row, cols))
    }
}

// ---- free helpers --------------------------------------------------------

/// Chains of relations of length > 1 become COMMA-of-pairs; the shared
/// middle operands are deep-copied, never aliased.
fn reify_chain(mut operands: Vec<Node>, ops: Vec<Op>) -> Node {
    match ops.len() {
        0 => operands.swap_remove(0),
        1 => {
            let rhs = operands.swap_remove(1);
            let lhs = operands.swap_remove(0);
            Node::binary(ops[0], lhs, rhs, false)
        }
        _ => {
            let mut pairs = Vec::with_capacity(ops.len());
            for (i, op) in ops.iter().enumerate() {
                let lhs = operands[i].deep_copy();
                let rhs = operands[i + 1].deep_copy();
                pairs.push(Node::binary(*op, lhs, rhs, false));
            }
            Node::nary(Op::Comma, pairs)
        }
    }
}

fn negate_relation(op: Op) -> std::result::Result<Op, ParseError> {
    match op {
        Op::Lt => Ok(Op::Nless),
        Op::Gt => Ok(Op::Ngtr),
        Op::In => Ok(Op::NotIn),
        Op::Parallel => Ok(Op::NParallel),
        Op::Eql => Ok(Op::Ne),
        _ => Err(ParseError::new(
            1001,
            &["a negatable relation", &format!("{:?}", op)],
        )),
    }
}

/// Operands of `\cup`, `\cap` and `\setminus` written with `\{...\}`
/// brackets are sets.
fn wrap_set(node: Node) -> Node {
    if node.lbrk == Some(TokenKind::LeftBraceSet) && node.op != Op::Set {
        Node::unary(Op::Set, node)
    } else {
        node
    }
}

fn mul_implicit(lhs: Node, rhs: Node) -> Node {
    let mut mul = Node::binary(Op::Mul, lhs, rhs, true);
    mul.flags.is_implicit = true;
    mul
}

/// `0.` followed by `\overline{3}` is the repeating decimal `0.333...`.
fn make_repeating(decimal: Node, over: Node) -> Node {
    let digits = match (&over.op, over.child(0)) {
        (Op::Overline, Some(tail)) if tail.is_num() => tail.clone(),
        _ => return mul_implicit(decimal, over),
    };
    let mut decimal = decimal;
    let mut digits = digits;
    decimal.flags.is_repeating = true;
    digits.flags.is_repeating = true;
    let mut add = Node::binary(Op::Add, decimal, digits, false);
    add.flags.is_repeating = true;
    add
}

/// A proper fraction of two integer literals, as mixed numbers require.
fn is_simple_fraction(node: &Node) -> bool {
    if node.op != Op::Frac || node.arity() != 2 {
        return false;
    }
    match (node.child(0), node.child(1)) {
        (Some(n), Some(d)) if n.is_integer() && d.is_integer() => {
            match (
                n.lexeme().and_then(|s| s.parse::<u64>().ok()),
                d.lexeme().and_then(|s| s.parse::<u64>().ok()),
            ) {
                (Some(n), Some(d)) => n < d,
                _ => false,
            }
        }
        _ => false,
    }
}

/// Whether the rightmost literal of `node` is numeric; adjacency with
/// another literal then needs an explicit operator.
fn ends_in_num(node: &Node) -> bool {
    match node.op {
        Op::Num => true,
        Op::Mul => node.last_child().map(ends_in_num).unwrap_or(false),
        Op::Sub | Op::Add if node.arity() == 1 => {
            node.child(0).map(ends_in_num).unwrap_or(false)
        }
        _ => false,
    }
}

fn is_pow_of_ten(node: &Node) -> bool {
    node.op == Op::Pow
        && node
            .child(0)
            .map(|b| b.is_num() && b.lexeme() == Some("10"))
            .unwrap_or(false)
}

fn is_neg_one(node: &Node) -> bool {
    node.op == Op::Sub
        && node.arity() == 1
        && node
            .child(0)
            .map(|c| c.is_num() && c.lexeme() == Some("1"))
            .unwrap_or(false)
}

fn attach_degree(node: Node) -> Node {
    let degree = Node::var("\\degree");
    let mut node = node;
    if node.op == Op::Sub
        && node.args.len() == 1
        && matches!(node.args.last(), Some(Arg::Node(_)))
    {
        if let Some(Arg::Node(inner)) = node.args.pop() {
            return Node::unary(Op::Sub, Node::binary(Op::Mul, inner, degree, false));
        }
    }
    Node::binary(Op::Mul, node, degree, false)
}

fn merge_subscript(node: Node, sub: Node) -> std::result::Result<Node, ParseError> {
    match node.op {
        Op::Subscript => Err(ParseError::new(1012, &["_"])),
        Op::Pow if node.arity() == 2 => {
            // x^2_1 is x_1^2
            let mut it = node.args.into_iter();
            match (it.next(), it.next()) {
                (Some(Arg::Node(base)), Some(Arg::Node(exp))) => {
                    if base.op == Op::Subscript {
                        return Err(ParseError::new(1012, &["_"]));
                    }
                    let based = Node::binary(Op::Subscript, base, sub, false);
                    Ok(Node::binary(Op::Pow, based, exp, false))
                }
                _ => Err(ParseError::internal("malformed POW")),
            }
        }
        _ => Ok(Node::binary(Op::Subscript, node, sub, false)),
    }
}

fn is_bare_operator(tk: TokenKind) -> bool {
    use TokenKind::*;
    matches!(
        tk,
        Equal | Add | Sub | Star | Cdot | Times | Lt | Le | Gt | Ge | Ne | Approx | Sim
    )
}

fn function_op(tk: TokenKind) -> std::result::Result<Op, ParseError> {
    use TokenKind::*;
    Ok(match tk {
        Sin => Op::Sin,
        Cos => Op::Cos,
        Tan => Op::Tan,
        Sec => Op::Sec,
        Csc => Op::Csc,
        Cot => Op::Cot,
        Sinh => Op::Sinh,
        Cosh => Op::Cosh,
        Tanh => Op::Tanh,
        Sech => Op::Sech,
        Csch => Op::Csch,
        Coth => Op::Coth,
        Arcsin => Op::Arcsin,
        Arccos => Op::Arccos,
        Arctan => Op::Arctan,
        Arcsec => Op::Arcsec,
        Arccsc => Op::Arccsc,
        Arccot => Op::Arccot,
        MinTk => Op::Min,
        MaxTk => Op::Max,
        GcdTk => Op::Gcd,
        LcmTk => Op::Lcm,
        ModTk => Op::Mod,
        _ => return Err(ParseError::internal("not a function token")),
    })
}

fn inverse_of(op: Op) -> Option<Op> {
    match op {
        Op::Sin => Some(Op::Arcsin),
        Op::Cos => Some(Op::Arccos),
        Op::Tan => Some(Op::Arctan),
        Op::Sec => Some(Op::Arcsec),
        Op::Csc => Some(Op::Arccsc),
        Op::Cot => Some(Op::Arccot),
        _ => None,
    }
}

fn reattach_differential(node: Node, differential: Option<Node>) -> Node {
    match differential {
        Some(var) => {
            let mut mul = Node::binary(Op::Mul, node, Node::var("d"), false);
            mul.args.push(Arg::Node(var));
            mul.flags.is_implicit = true;
            mul
        }
        None => node,
    }
}

/// The numerator of a `\frac{dy}{dx}` denominator: MUL(d, v).
fn differential_var(node: &Node) -> Option<Node> {
    if node.op == Op::Mul && node.arity() == 2 {
        let d = node.child(0)?;
        let v = node.child(1)?;
        if d.is_var_named("d") && v.op == Op::Var {
            return Some(v.clone());
        }
    }
    None
}

/// The body under a `\frac{d body}{dx}` numerator.
fn differential_body(node: &Node) -> Option<Node> {
    if node.op != Op::Mul || node.arity() < 2 {
        return None;
    }
    if !node.child(0)?.is_var_named("d") {
        return None;
    }
    if node.arity() == 2 {
        return node.child(1).cloned();
    }
    let rest: Vec<Node> = node
        .args
        .iter()
        .skip(1)
        .filter_map(|a| match a {
            Arg::Node(n) => Some(n.clone()),
            Arg::Str(_) => None,
        })
        .collect();
    Some(Node::nary(Op::Mul, rest))
}

/// Whether the right spine of `node` ends in a `d<var>` pair. The walk
/// descends through MUL tails, FRAC numerators and additive tails.
pub(crate) fn has_dx(node: &Node) -> bool {
    strip_dx(node).is_some()
}

/// Remove the trailing differential; returns the stripped body and the
/// integration variable. Stripping the whole product leaves NUM 1, so
/// `\int \frac{dx}{x}` reads as the integral of 1/x.
pub(crate) fn strip_dx(node: &Node) -> Option<(Node, Node)> {
    match node.op {
        Op::Mul => {
            let n = node.arity();
            if n < 2 {
                return None;
            }
            if let (Some(d), Some(v)) = (node.child(n - 2), node.child(n - 1)) {
                if d.is_var_named("d") && v.op == Op::Var {
                    let var = v.clone();
                    let remaining: Vec<Node> = node.args[..n - 2]
                        .iter()
                        .filter_map(|a| match a {
                            Arg::Node(c) => Some(c.clone()),
                            Arg::Str(_) => None,
                        })
                        .collect();
                    let body = match remaining.len() {
                        0 => Node::num("1"),
                        1 => match remaining.into_iter().next() {
                            Some(b) => b,
                            None => Node::num("1"),
                        },
                        _ => {
                            let mut mul = Node::nary(Op::Mul, remaining);
                            mul.flags = node.flags;
                            mul
                        }
                    };
                    return Some((body, var));
                }
            }
            let last = node.last_child()?;
            let (stripped, var) = strip_dx(last)?;
            let mut rebuilt = node.clone();
            rebuilt.args.pop();
            rebuilt.args.push(Arg::Node(stripped));
            Some((rebuilt, var))
        }
        Op::Frac => {
            let (stripped, var) = strip_dx(node.child(0)?)?;
            let mut rebuilt = node.clone();
            rebuilt.args[0] = Arg::Node(stripped);
            Some((rebuilt, var))
        }
        Op::Add | Op::Sub if node.arity() >= 2 => {
            let last = node.last_child()?;
            let (stripped, var) = strip_dx(last)?;
            let mut rebuilt = node.clone();
            rebuilt.args.pop();
            rebuilt.args.push(Arg::Node(stripped));
            Some((rebuilt, var))
        }
        Op::Sub if node.arity() == 1 => {
            let (stripped, var) = strip_dx(node.child(0)?)?;
            Some((Node::unary(Op::Sub, stripped), var))
        }
        _ => None,
    }
}

fn classify_group(
    open: TokenKind,
    close: TokenKind,
    contents: Node,
) -> std::result::Result<Node, ParseError> {
    use TokenKind::*;
    // French style normalizes: `]` as opener reads `(`, `[` as closer `)`
    let norm_open = if open == RightBracket { LeftParen } else { open };
    let norm_close = if close == LeftBracket { RightParen } else { close };

    if contents.op == Op::Comma && contents.arity() == 2 {
        let op = match (norm_open, norm_close) {
            (LeftParen, RightParen) => Some(Op::IntervalOpen),
            (LeftBracket, RightBracket) => Some(Op::Interval),
            (LeftParen, RightBracket) => Some(Op::IntervalLeftOpen),
            (LeftBracket, RightParen) => Some(Op::IntervalRightOpen),
            _ => Option::None,
        };
        if let Some(op) = op {
            return Ok(Node::unary(op, contents).with_brackets(norm_open, norm_close));
        }
    }
    match (norm_open, norm_close) {
        (LeftParen, RightParen) | (LeftParen, Period) => {
            Ok(Node::unary(Op::Paren, contents).with_brackets(norm_open, norm_close))
        }
        (LeftBracket, RightBracket) | (LeftBracket, Period) => {
            Ok(Node::unary(Op::Bracket, contents).with_brackets(norm_open, norm_close))
        }
        _ => {
            let spelled = format!(
                "{}{}",
                norm_open.bracket_char().unwrap_or('?'),
                norm_close.bracket_char().unwrap_or('?')
            );
            Err(ParseError::new(1011, &[&spelled]))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math_interpreter::ast::NumberFormat;
    use crate::math_interpreter::model::SymbolKind;

    fn p(src: &str) -> Node {
        parse(&Options::default(), src, &Environment::new()).unwrap()
    }

    fn perr(src: &str) -> ParseError {
        parse(&Options::default(), src, &Environment::new()).unwrap_err()
    }

    fn tree(src: &str) -> String {
        format!("{}", p(src))
    }

    fn chem_env() -> Environment {
        let mut env = Environment::new();
        env.insert("H", SymbolKind::Element);
        env.insert("Na", SymbolKind::Element);
        env.insert("Cl", SymbolKind::Element);
        env
    }

    #[test]
    fn test_addition() {
        assert_eq!(tree("1 + 2"), "Add()\n├── Num(1)\n└── Num(2)");
    }

    #[test]
    fn test_add_chain_flattens() {
        let n = p("1+2+3");
        assert_eq!(n.op, Op::Add);
        assert_eq!(n.arity(), 3);
    }

    #[test]
    fn test_compare_grouping_keeps_nesting() {
        let opts = Options {
            compare_grouping: true,
            ..Default::default()
        };
        let n = parse(&opts, "1+2+3", &Environment::new()).unwrap();
        assert_eq!(n.arity(), 2);
    }

    #[test]
    fn test_empty_input_is_none() {
        assert_eq!(p("").op, Op::None);
        assert_eq!(p("   ").op, Op::None);
    }

    #[test]
    fn test_fraction() {
        let n = p(r"\frac{1}{2}");
        assert_eq!(format!("{}", n), "Frac()\n├── Num(1)\n└── Num(2)");
        assert!(n.flags.is_fraction);
    }

    #[test]
    fn test_mixed_number() {
        let n = p(r"3\frac{1}{2}");
        assert_eq!(
            format!("{}", n),
            "Add()\n├── Num(3)\n└── Frac()\n    ├── Num(1)\n    └── Num(2)"
        );
        assert!(n.flags.is_mixed_number);
    }

    #[test]
    fn test_improper_fraction_is_not_mixed() {
        let n = p(r"3\frac{5}{2}");
        assert_eq!(n.op, Op::Mul);
        assert!(n.flags.is_implicit);
    }

    #[test]
    fn test_mixed_number_blocks_add_flattening() {
        let n = p(r"1 + 3\frac{1}{2}");
        assert_eq!(n.op, Op::Add);
        assert_eq!(n.arity(), 2);
        assert!(n.child(1).unwrap().flags.is_mixed_number);
    }

    #[test]
    fn test_inverse_sine() {
        assert_eq!(
            tree(r"\sin^{-1}(x)"),
            "Arcsin()\n└── Paren()\n    └── Var(x)"
        );
    }

    #[test]
    fn test_sine_squared() {
        let n = p(r"\sin^2 x");
        assert_eq!(n.op, Op::Pow);
        assert_eq!(n.child(0).unwrap().op, Op::Sin);
    }

    #[test]
    fn test_sine_binds_implicit_argument() {
        // \sin 2x \cos y reads as MUL(SIN(2x), COS(y))
        let n = p(r"\sin 2x \cos y");
        assert_eq!(n.op, Op::Mul);
        assert_eq!(n.child(0).unwrap().op, Op::Sin);
        assert_eq!(n.child(1).unwrap().op, Op::Cos);
    }

    #[test]
    fn test_integral() {
        assert_eq!(
            tree(r"\int_0^1 x\,dx"),
            "Integral()\n├── Num(0)\n├── Num(1)\n├── Var(x)\n└── Var(x)"
        );
    }

    #[test]
    fn test_integral_without_bounds() {
        assert_eq!(tree(r"\int x dx"), "Integral()\n├── Var(x)\n└── Var(x)");
    }

    #[test]
    fn test_integral_missing_variable() {
        assert_eq!(perr(r"\int x").code(), 1014);
    }

    #[test]
    fn test_integral_of_bare_dx() {
        assert_eq!(tree(r"\int dx"), "Integral()\n├── Num(1)\n└── Var(x)");
    }

    #[test]
    fn test_integral_through_fraction_numerator() {
        assert_eq!(
            tree(r"\int \frac{dx}{x}"),
            "Integral()\n├── Frac()\n│   ├── Num(1)\n│   └── Var(x)\n└── Var(x)"
        );
    }

    #[test]
    fn test_integral_of_sine() {
        assert_eq!(
            tree(r"\int \sin x dx"),
            "Integral()\n├── Sin()\n│   └── Var(x)\n└── Var(x)"
        );
    }

    #[test]
    fn test_double_integral_nests() {
        let n = p(r"\iint x dx dy");
        assert_eq!(n.op, Op::Integral);
        assert_eq!(n.arity(), 2);
        let inner = n.child(0).unwrap();
        assert_eq!(inner.op, Op::Integral);
        assert_eq!(inner.child(1).unwrap().lexeme(), Some("x"));
        assert_eq!(n.child(1).unwrap().lexeme(), Some("y"));
    }

    #[test]
    fn test_repeating_decimal() {
        let n = p(r"0.\overline{3}");
        assert_eq!(format!("{}", n), "Add()\n├── Num(0.)\n└── Num(3)");
        assert!(n.flags.is_repeating);
        assert!(n.child(0).unwrap().flags.is_repeating);
        assert!(n.child(1).unwrap().flags.is_repeating);
        assert_eq!(
            n.child(0).unwrap().number_format,
            Some(NumberFormat::Decimal)
        );
    }

    #[test]
    fn test_repeating_decimal_with_dots() {
        let n = p(r"2.\dot{3}4\dot{5}");
        assert_eq!(format!("{}", n), "Add()\n├── Num(2.)\n└── Num(345)");
        assert!(n.flags.is_repeating);
    }

    #[test]
    fn test_thousands_separator_bookkeeping() {
        let opts = Options {
            set_thousands_separator: vec![','],
            ..Default::default()
        };
        let n = parse(&opts, "1{,}234.5", &Environment::new()).unwrap();
        assert_eq!(n.lexeme(), Some("1234.5"));
        assert_eq!(n.number_format, Some(NumberFormat::Decimal));
        assert_eq!(n.separator_count, 2);
        assert_eq!(n.last_separator_index, Some(4));
    }

    #[test]
    fn test_interval_classification() {
        let n = p("[1,2)");
        assert_eq!(n.op, Op::IntervalRightOpen);
        assert_eq!(n.lbrk, Some(TokenKind::LeftBracket));
        assert_eq!(n.rbrk, Some(TokenKind::RightParen));
        assert_eq!(n.child(0).unwrap().op, Op::Comma);

        assert_eq!(p("(1,2)").op, Op::IntervalOpen);
        assert_eq!(p("[1,2]").op, Op::Interval);
        assert_eq!(p("(1,2]").op, Op::IntervalLeftOpen);
    }

    #[test]
    fn test_french_interval_normalizes() {
        let n = p("]0,1[");
        assert_eq!(n.op, Op::IntervalOpen);
        assert_eq!(n.lbrk, Some(TokenKind::LeftParen));
        assert_eq!(n.rbrk, Some(TokenKind::RightParen));

        assert_eq!(p("]0,1]").op, Op::IntervalLeftOpen);
    }

    #[test]
    fn test_paren_is_not_an_interval() {
        assert_eq!(p("(1+2)").op, Op::Paren);
        assert_eq!(p("(1,2,3)").op, Op::Paren);
    }

    #[test]
    fn test_mismatched_brackets() {
        assert_eq!(perr("(1]").code(), 1011);
    }

    #[test]
    fn test_equality_chain_reifies() {
        let n = p("a=b=c");
        assert_eq!(
            format!("{}", n),
            "Comma()\n├── Eql()\n│   ├── Var(a)\n│   └── Var(b)\n└── Eql()\n    ├── Var(b)\n    └── Var(c)"
        );
        // the shared operand is a copy, not an alias
        assert_eq!(
            n.child(0).unwrap().child(1).unwrap(),
            n.child(1).unwrap().child(0).unwrap()
        );
    }

    #[test]
    fn test_relational_chain() {
        let n = p("a<b<c");
        assert_eq!(n.op, Op::Comma);
        assert_eq!(n.child(0).unwrap().op, Op::Lt);
        assert_eq!(n.child(1).unwrap().op, Op::Lt);
    }

    #[test]
    fn test_not_folds_into_relation() {
        assert_eq!(p(r"a \not< b").op, Op::Nless);
        assert_eq!(p(r"a \not> b").op, Op::Ngtr);
        assert_eq!(p(r"a \not\in b").op, Op::NotIn);
        assert_eq!(p(r"a \not= b").op, Op::Ne);
    }

    #[test]
    fn test_ratio_chain_flattens() {
        let n = p("a:b:c");
        assert_eq!(n.op, Op::Colon);
        assert_eq!(n.arity(), 3);
    }

    #[test]
    fn test_two_numbers_need_an_operator() {
        assert_eq!(perr("2 3").code(), 1010);
    }

    #[test]
    fn test_implicit_multiplication() {
        let n = p("2x");
        assert_eq!(n.op, Op::Mul);
        assert!(n.flags.is_implicit);
        assert_eq!(format!("{}", n), "Mul()\n├── Num(2)\n└── Var(x)");
    }

    #[test]
    fn test_e_notation() {
        let n = p(r"1.5\text{E}3");
        assert!(n.flags.is_scientific);
        assert_eq!(
            format!("{}", n),
            "Mul()\n├── Num(1.5)\n└── Pow()\n    ├── Num(10)\n    └── Num(3)"
        );
        let n = p(r"2\text{e}-4");
        assert!(n.flags.is_scientific);
        assert_eq!(n.child(1).unwrap().child(1).unwrap().lexeme(), Some("-4"));
    }

    #[test]
    fn test_scientific_form() {
        let n = p(r"1.5\times 10^3");
        assert!(n.flags.is_scientific);
        assert_eq!(n.op, Op::Mul);
        assert_eq!(n.child(1).unwrap().op, Op::Pow);
    }

    #[test]
    fn test_plain_times_is_not_scientific() {
        let n = p(r"2\times 3");
        assert!(!n.flags.is_scientific);
    }

    #[test]
    fn test_prime_attachment() {
        let n = p("f''");
        assert_eq!(n.op, Op::Pow);
        assert_eq!(n.child(1).unwrap().lexeme(), Some("''"));
    }

    #[test]
    fn test_slash_fraction() {
        let n = p("a/b");
        assert_eq!(n.op, Op::Frac);
        assert!(n.flags.is_slash);
        assert!(!n.flags.is_fraction);
    }

    #[test]
    fn test_division_sign() {
        assert_eq!(p(r"6\div 2").op, Op::Frac);
    }

    #[test]
    fn test_subscript_exponent_commute() {
        let a = p("x^2_1");
        let b = p("x_1^2");
        assert_eq!(format!("{}", a), format!("{}", b));
        assert_eq!(a.op, Op::Pow);
        assert_eq!(a.child(0).unwrap().op, Op::Subscript);
    }

    #[test]
    fn test_double_subscript_is_misplaced() {
        assert_eq!(perr("x_1_2").code(), 1012);
    }

    #[test]
    fn test_exponent_chain_is_right_associative() {
        let n = p("2^3^4");
        assert_eq!(n.op, Op::Pow);
        let inner = n.child(1).unwrap();
        assert_eq!(inner.op, Op::Pow);
        assert_eq!(inner.child(0).unwrap().lexeme(), Some("3"));
    }

    #[test]
    fn test_postfix_percent_and_factorial() {
        let n = p(r"50\%");
        assert_eq!(n.op, Op::Percent);
        let n = p("5!");
        assert_eq!(n.op, Op::Fact);
    }

    #[test]
    fn test_absolute_value() {
        let n = p("|x|");
        assert_eq!(n.op, Op::Abs);
        let n = p(r"\left|x+1\right|");
        assert_eq!(n.op, Op::Abs);
    }

    #[test]
    fn test_evaluated_at() {
        let n = p(r"\left. x^2 \right|_{x=2}");
        assert_eq!(n.op, Op::Subscript);
        let evalat = n.child(0).unwrap();
        assert_eq!(evalat.op, Op::EvalAt);
        assert_eq!(evalat.rbrk, Some(TokenKind::Pipe));
    }

    #[test]
    fn test_pipe_postfix() {
        let n = p("f(x)|_{x=2}");
        assert_eq!(n.op, Op::Mul);
        let piped = n.child(1).unwrap();
        assert_eq!(piped.op, Op::Pipe);
        assert_eq!(piped.child(0).unwrap().op, Op::Paren);
    }

    #[test]
    fn test_angle_brackets() {
        let n = p(r"\langle a, b \rangle");
        assert_eq!(n.op, Op::AngleBracket);
        assert_eq!(n.child(0).unwrap().op, Op::Comma);
    }

    #[test]
    fn test_set_wrapping_under_union() {
        let n = p(r"\{1,2\} \cup \{3\}");
        assert_eq!(n.op, Op::Cup);
        assert_eq!(n.child(0).unwrap().op, Op::Set);
        assert_eq!(n.child(1).unwrap().op, Op::Set);
    }

    #[test]
    fn test_empty_braces() {
        let n = p("{}");
        assert_eq!(n.op, Op::Comma);
        assert_eq!(n.arity(), 0);
    }

    #[test]
    fn test_matrix() {
        let n = p(r"\begin{pmatrix}1 & 2\\3 & 4\end{pmatrix}");
        assert_eq!(n.op, Op::Matrix);
        assert_eq!(n.lbrk, Some(TokenKind::LeftParen));
        assert_eq!(n.arity(), 2);
        let row = n.child(0).unwrap();
        assert_eq!(row.op, Op::Row);
        assert_eq!(row.arity(), 2);
        assert_eq!(row.child(0).unwrap().op, Op::Col);
    }

    #[test]
    fn test_array_with_column_spec() {
        let n = p(r"\begin{array}{cc}1 & 2\end{array}");
        assert_eq!(n.op, Op::Matrix);
        assert_eq!(n.arity(), 1);
    }

    #[test]
    fn test_mismatched_environment() {
        assert_eq!(perr(r"\begin{matrix}1\end{pmatrix}").code(), 1001);
    }

    #[test]
    fn test_sum_with_bounds() {
        let n = p(r"\sum_{i=1}^{10} i");
        assert_eq!(n.op, Op::Sum);
        assert_eq!(n.arity(), 3);
        assert_eq!(n.child(0).unwrap().op, Op::Eql);
        assert_eq!(n.child(1).unwrap().lexeme(), Some("10"));
    }

    #[test]
    fn test_limit() {
        let n = p(r"\lim_{x \to 0} f");
        assert_eq!(n.op, Op::Lim);
        assert_eq!(n.arity(), 2);
        assert_eq!(n.child(0).unwrap().op, Op::To);
    }

    #[test]
    fn test_logarithms() {
        let n = p(r"\log_2 8");
        assert_eq!(format!("{}", n), "Log()\n├── Num(2)\n└── Num(8)");
        let n = p(r"\ln x");
        assert_eq!(n.child(0).unwrap().lexeme(), Some("e"));
        let n = p(r"\log x");
        assert_eq!(n.child(0).unwrap().lexeme(), Some("10"));
        let n = p(r"\lg x");
        assert_eq!(n.child(0).unwrap().lexeme(), Some("10"));
    }

    #[test]
    fn test_square_roots() {
        assert_eq!(p(r"\sqrt{x}").op, Op::Sqrt);
        let n = p(r"\sqrt[3]{x}");
        assert_eq!(n.op, Op::NthRoot);
        assert_eq!(n.child(0).unwrap().lexeme(), Some("3"));
    }

    #[test]
    fn test_derivatives() {
        assert_eq!(
            tree(r"\frac{dy}{dx}"),
            "Deriv()\n├── Var(y)\n└── Var(x)"
        );
        let n = p(r"\frac{d}{dx} x^2");
        assert_eq!(n.op, Op::Deriv);
        assert_eq!(n.child(0).unwrap().op, Op::Pow);
    }

    #[test]
    fn test_degree_attachment() {
        let n = p(r"30\degree");
        assert_eq!(n.op, Op::Mul);
        assert_eq!(n.child(1).unwrap().lexeme(), Some("\\degree"));

        // a negative scalar re-enters as -(n * degree)
        let n = p(r"-30\degree");
        assert_eq!(n.op, Op::Sub);
        assert_eq!(n.child(0).unwrap().op, Op::Mul);
    }

    #[test]
    fn test_circ_superscript_is_degrees() {
        let n = p(r"90^\circ");
        assert_eq!(n.op, Op::Mul);
        assert_eq!(n.child(1).unwrap().lexeme(), Some("\\degree"));
    }

    #[test]
    fn test_delta_variable() {
        assert_eq!(p(r"\Delta x").lexeme(), Some("Delta_x"));
    }

    #[test]
    fn test_overset_annotation() {
        let n = p(r"\overset{a}{=}");
        assert_eq!(n.op, Op::Var);
        assert_eq!(n.lexeme(), Some("="));
        assert_eq!(n.arity(), 2);
    }

    #[test]
    fn test_chemistry_ion_charge() {
        let opts = Options::default();
        let n = parse(&opts, r"Na^+ + Cl^-", &chem_env()).unwrap();
        assert_eq!(n.op, Op::Add);
        let na = n.child(0).unwrap();
        assert_eq!(na.op, Op::Pow);
        assert_eq!(na.child(0).unwrap().lexeme(), Some("Na"));
        assert_eq!(na.child(1).unwrap().lexeme(), Some("+"));
    }

    #[test]
    fn test_chemistry_ion_suffix_in_braces() {
        let n = parse(&Options::default(), r"{Na+}", &chem_env()).unwrap();
        assert_eq!(n.op, Op::Pow);
        assert_eq!(n.child(1).unwrap().lexeme(), Some("+"));
    }

    #[test]
    fn test_chemistry_molar_mass() {
        let n = parse(&Options::default(), r"M(H)", &chem_env()).unwrap();
        assert_eq!(n.op, Op::MolarMass);
        assert_eq!(n.child(0).unwrap().op, Op::Paren);
    }

    #[test]
    fn test_molar_mass_needs_chemistry_mode() {
        let n = p(r"M(H)");
        assert_eq!(n.op, Op::Mul);
    }

    #[test]
    fn test_strict_unknown_primary() {
        let opts = Options {
            strict: true,
            ..Default::default()
        };
        assert_eq!(
            parse(&opts, r"\cdot x", &Environment::new())
                .unwrap_err()
                .code(),
            1006
        );
        assert!(parse(&Options::default(), r"\cdot x", &Environment::new()).is_ok());
    }

    #[test]
    fn test_strict_preserves_literal_text() {
        let opts = Options {
            strict: true,
            set_thousands_separator: vec![','],
            ..Default::default()
        };
        let n = parse(&opts, "1,234", &Environment::new()).unwrap();
        assert_eq!(n.lexeme(), Some("1,234"));
    }

    #[test]
    fn test_decimal_places_rounds() {
        let opts = Options {
            decimal_places: Some(2),
            ..Default::default()
        };
        let n = parse(&opts, "0.125", &Environment::new()).unwrap();
        assert_eq!(n.lexeme(), Some("0.13"));
    }

    #[test]
    fn test_infinity_literal() {
        let n = p(r"\infty");
        assert_eq!(n.op, Op::Num);
        assert_eq!(n.lexeme(), Some("\\infty"));
    }

    #[test]
    fn test_extra_input() {
        assert_eq!(perr("1)").code(), 1003);
    }

    #[test]
    fn test_missing_command_argument() {
        assert_eq!(perr(r"\frac{1}").code(), 1009);
    }

    #[test]
    fn test_missing_expression() {
        assert_eq!(perr("1+").code(), 1006);
    }

    #[test]
    fn test_pm_and_setminus() {
        assert_eq!(p(r"a \pm b").op, Op::Pm);
        assert_eq!(p(r"A \setminus B").op, Op::SetMinus);
        assert_eq!(p(r"\pm 2x").op, Op::Pm);
    }

    #[test]
    fn test_implication() {
        assert_eq!(p(r"a \implies b").op, Op::Implies);
        assert_eq!(p(r"a \iff b").op, Op::Iff);
        assert_eq!(p(r"a \rightarrow b").op, Op::RightArrow);
    }

    #[test]
    fn test_semicolon_joins_list() {
        let n = p("1, 2; 3");
        assert_eq!(n.op, Op::Comma);
        assert_eq!(n.arity(), 3);
    }

    #[test]
    fn test_unary_minus() {
        let n = p("-x^2");
        assert_eq!(n.op, Op::Sub);
        assert_eq!(n.arity(), 1);
        assert_eq!(n.child(0).unwrap().op, Op::Pow);
    }

    #[test]
    fn test_environment_units() {
        let mut env = Environment::new();
        env.insert("kg", SymbolKind::Unit);
        let n = parse(&Options::default(), "2 kg", &env).unwrap();
        assert_eq!(n.op, Op::Mul);
        assert_eq!(n.child(1).unwrap().lexeme(), Some("kg"));
    }

    #[test]
    fn test_text_node() {
        let n = p(r"\text{apples}");
        assert_eq!(n.op, Op::Text);
        assert_eq!(n.lexeme(), Some("apples"));
    }
}

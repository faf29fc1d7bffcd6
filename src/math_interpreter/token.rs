//! Valid tokens for LaTeX math are defined here.
//!
//! A token is a `(TokenKind, lexeme)` pair. The lexeme is ignored for most
//! kinds; NUM, VAR and TEXT carry their payload in it. Control sequences are
//! looked up in [`struct@COMMAND_TABLE`]; Unicode math code points are first
//! normalized to their LaTeX spelling through [`struct@UNICODE_TABLE`].

use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};

#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum TokenKind {
    /// End of source.
    None,

    // Payload-carrying kinds
    Num,
    Var,
    Text,

    // Single characters and two-character fusions
    Add,          // +
    Sub,          // -
    Star,         // * (`**` scans as Caret)
    Slash,        // /
    Equal,        // =
    Lt,           // <
    Le,           // <= and \le \leq
    Gt,           // >
    Ge,           // >= and \ge \geq
    Ne,           // != and \ne \neq
    Caret,        // ^ and **
    Underscore,   // _
    LeftParen,    // (
    RightParen,   // )
    LeftBracket,  // [
    RightBracket, // ]
    LeftBrace,    // {
    RightBrace,   // }
    Comma,        // ,
    Semicolon,    // ;
    Colon,        // :
    Bang,         // !
    Percent,      // %
    Pipe,         // |
    Period,       // a lone `.` that does not start a number (\left. \right.)
    RightArrowTk, // -> and \rightarrow

    // Backslash-led structural tokens
    NewRow,        // \\
    NewCol,        // &
    LeftBraceSet,  // \{
    RightBraceSet, // \}
    VerticalBar,   // \|
    Left,          // \left
    Right,         // \right
    Begin,         // \begin{...}; the environment name is the lexeme
    End,           // \end{...}

    // Operators
    Cdot,
    Times,
    DivTk,
    Pm,
    Mp,
    Cup,
    Cap,
    SetMinus,
    BigCup,
    BigCap,
    InTk,
    NotInTk,
    Ni,
    To,
    Perp,
    Propto,
    Subset,
    SubsetEq,
    Supset,
    SupsetEq,
    Parallel,
    NParallel,
    Sim,
    Cong,
    Approx,
    Ngtr,
    Nless,
    Not,
    Implies,
    Iff,
    LeftAngle,
    RightAngle,

    // Commands with arguments
    Frac,
    Sqrt,
    VecTk,
    OverlineTk,
    DotTk,
    MathBf,
    Overset,
    Underset,
    DeltaTk,
    Circ,
    DegreeTk,

    // Named functions
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Sinh,
    Cosh,
    Tanh,
    Sech,
    Csch,
    Coth,
    Arcsin,
    Arccos,
    Arctan,
    Arcsec,
    Arccsc,
    Arccot,
    Ln,
    Lg,
    LogTk,
    MinTk,
    MaxTk,
    GcdTk,
    LcmTk,
    ModTk,

    // Big operators
    Int,
    IInt,
    IIInt,
    SumTk,
    ProdTk,
    LimTk,
}

/// A scanned token. For most kinds the lexeme repeats the source spelling;
/// for NUM it is the canonical numeric string after separator erasure.
#[derive(Debug, PartialEq, Eq, Hash, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub lexeme: String,
}

impl Token {
    pub fn new(kind: TokenKind, lexeme: String) -> Self {
        Token { kind, lexeme }
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:?}({:?})", self.kind, self.lexeme)
    }
}

impl TokenKind {
    /// True for the functions whose spelled name heads a primary expression.
    pub fn is_function(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            Sin | Cos
                | Tan
                | Sec
                | Csc
                | Cot
                | Sinh
                | Cosh
                | Tanh
                | Sech
                | Csch
                | Coth
                | Arcsin
                | Arccos
                | Arctan
                | Arcsec
                | Arccsc
                | Arccot
                | Ln
                | Lg
                | LogTk
                | MinTk
                | MaxTk
                | GcdTk
                | LcmTk
                | ModTk
                | Int
                | IInt
                | IIInt
                | SumTk
                | ProdTk
                | LimTk
                | BigCup
                | BigCap
        )
    }

    /// Tokens that terminate a comma-separated list.
    pub fn is_list_break(self) -> bool {
        use TokenKind::*;
        matches!(
            self,
            None | RightParen
                | RightBracket
                | RightBrace
                | RightBraceSet
                | RightAngle
                | Right
                | NewRow
                | NewCol
                | End
        )
    }

    /// The delimiter character recorded in intern-pool keys.
    pub fn bracket_char(self) -> Option<char> {
        use TokenKind::*;
        match self {
            LeftParen => Some('('),
            RightParen => Some(')'),
            LeftBracket => Some('['),
            RightBracket => Some(']'),
            LeftBrace => Some('{'),
            RightBrace => Some('}'),
            LeftBraceSet => Some('{'),
            RightBraceSet => Some('}'),
            Pipe | VerticalBar => Some('|'),
            LeftAngle => Some('\u{27E8}'),
            RightAngle => Some('\u{27E9}'),
            Period => Some('.'),
            _ => Option::None,
        }
    }
}

lazy_static! {
    /// Alphabetic control sequences with a dedicated token kind. Everything
    /// absent from this table scans as a VAR whose lexeme keeps the
    /// backslash.
    pub static ref COMMAND_TABLE: HashMap<&'static str, TokenKind> = {
        use TokenKind::*;
        let mut m = HashMap::new();
        m.insert("frac", Frac);
        m.insert("dfrac", Frac);
        m.insert("tfrac", Frac);
        m.insert("sqrt", Sqrt);
        m.insert("vec", VecTk);
        m.insert("overline", OverlineTk);
        m.insert("bar", OverlineTk);
        m.insert("dot", DotTk);
        m.insert("mathbf", MathBf);
        m.insert("overset", Overset);
        m.insert("underset", Underset);
        m.insert("Delta", DeltaTk);
        m.insert("circ", Circ);
        m.insert("degree", DegreeTk);

        m.insert("cdot", Cdot);
        m.insert("times", Times);
        m.insert("div", DivTk);
        m.insert("pm", Pm);
        m.insert("mp", Mp);
        m.insert("cup", Cup);
        m.insert("cap", Cap);
        m.insert("setminus", SetMinus);
        m.insert("backslash", SetMinus);
        m.insert("bigcup", BigCup);
        m.insert("bigcap", BigCap);
        m.insert("in", InTk);
        m.insert("notin", NotInTk);
        m.insert("ni", Ni);
        m.insert("to", To);
        m.insert("perp", Perp);
        m.insert("propto", Propto);
        m.insert("subset", Subset);
        m.insert("subseteq", SubsetEq);
        m.insert("supset", Supset);
        m.insert("supseteq", SupsetEq);
        m.insert("parallel", Parallel);
        m.insert("nparallel", NParallel);
        m.insert("sim", Sim);
        m.insert("cong", Cong);
        m.insert("approx", Approx);
        m.insert("ngtr", Ngtr);
        m.insert("nless", Nless);
        m.insert("not", Not);
        m.insert("ne", Ne);
        m.insert("neq", Ne);
        m.insert("le", Le);
        m.insert("leq", Le);
        m.insert("ge", Ge);
        m.insert("geq", Ge);
        m.insert("lt", Lt);
        m.insert("gt", Gt);
        m.insert("implies", Implies);
        m.insert("Rightarrow", Implies);
        m.insert("iff", Iff);
        m.insert("Leftrightarrow", Iff);
        m.insert("rightarrow", RightArrowTk);
        m.insert("langle", LeftAngle);
        m.insert("rangle", RightAngle);
        m.insert("left", Left);
        m.insert("right", Right);
        m.insert("colon", Colon);

        m.insert("sin", Sin);
        m.insert("cos", Cos);
        m.insert("tan", Tan);
        m.insert("sec", Sec);
        m.insert("csc", Csc);
        m.insert("cot", Cot);
        m.insert("sinh", Sinh);
        m.insert("cosh", Cosh);
        m.insert("tanh", Tanh);
        m.insert("sech", Sech);
        m.insert("csch", Csch);
        m.insert("coth", Coth);
        m.insert("arcsin", Arcsin);
        m.insert("arccos", Arccos);
        m.insert("arctan", Arctan);
        m.insert("arcsec", Arcsec);
        m.insert("arccsc", Arccsc);
        m.insert("arccot", Arccot);
        m.insert("ln", Ln);
        m.insert("lg", Lg);
        m.insert("log", LogTk);
        m.insert("min", MinTk);
        m.insert("max", MaxTk);
        m.insert("gcd", GcdTk);
        m.insert("lcm", LcmTk);
        m.insert("bmod", ModTk);
        m.insert("mod", ModTk);

        m.insert("int", Int);
        m.insert("iint", IInt);
        m.insert("iiint", IIInt);
        m.insert("sum", SumTk);
        m.insert("prod", ProdTk);
        m.insert("lim", LimTk);
        m
    };

    /// Names recognized inside `\operatorname{...}`.
    pub static ref OPERATOR_NAME_TABLE: HashMap<&'static str, TokenKind> = {
        use TokenKind::*;
        let mut m = HashMap::new();
        m.insert("gcd", GcdTk);
        m.insert("lcm", LcmTk);
        m.insert("min", MinTk);
        m.insert("max", MaxTk);
        m.insert("mod", ModTk);
        m
    };

    /// Control sequences that only produce horizontal space.
    pub static ref WHITESPACE_COMMANDS: Vec<&'static str> = vec![
        "quad", "qquad", "big", "Big", "bigg", "Bigg",
    ];

    /// Fixed mapping from Unicode math code points to LaTeX lexemes.
    /// Applied before scanning proper, so `α ≤ β` scans exactly like
    /// `\alpha \le \beta`.
    pub static ref UNICODE_TABLE: HashMap<char, &'static str> = {
        let mut m = HashMap::new();
        // Arrows, U+2190..U+21FF and U+27F7
        m.insert('\u{2190}', "\\leftarrow");
        m.insert('\u{2192}', "\\rightarrow");
        m.insert('\u{2194}', "\\leftrightarrow");
        m.insert('\u{21D2}', "\\Rightarrow");
        m.insert('\u{21D4}', "\\Leftrightarrow");
        m.insert('\u{27F7}', "\\leftrightarrow");
        // Mathematical operators, U+2200..U+22FF
        m.insert('\u{2208}', "\\in");
        m.insert('\u{2209}', "\\notin");
        m.insert('\u{220B}', "\\ni");
        m.insert('\u{2211}', "\\sum");
        m.insert('\u{220F}', "\\prod");
        m.insert('\u{221A}', "\\sqrt");
        m.insert('\u{221D}', "\\propto");
        m.insert('\u{221E}', "\\infty");
        m.insert('\u{2220}', "\\angle");
        m.insert('\u{2225}', "\\parallel");
        m.insert('\u{2226}', "\\nparallel");
        m.insert('\u{2229}', "\\cap");
        m.insert('\u{222A}', "\\cup");
        m.insert('\u{222B}', "\\int");
        m.insert('\u{222C}', "\\iint");
        m.insert('\u{222D}', "\\iiint");
        m.insert('\u{223C}', "\\sim");
        m.insert('\u{2245}', "\\cong");
        m.insert('\u{2248}', "\\approx");
        m.insert('\u{2260}', "\\ne");
        m.insert('\u{2264}', "\\le");
        m.insert('\u{2265}', "\\ge");
        m.insert('\u{226E}', "\\nless");
        m.insert('\u{226F}', "\\ngtr");
        m.insert('\u{2282}', "\\subset");
        m.insert('\u{2283}', "\\supset");
        m.insert('\u{2286}', "\\subseteq");
        m.insert('\u{2287}', "\\supseteq");
        m.insert('\u{228E}', "\\cup");
        m.insert('\u{2295}', "\\oplus");
        m.insert('\u{22A5}', "\\perp");
        m.insert('\u{22C5}', "\\cdot");
        // Greek, U+0391..U+03F5
        m.insert('\u{0391}', "A");
        m.insert('\u{0392}', "B");
        m.insert('\u{0393}', "\\Gamma");
        m.insert('\u{0394}', "\\Delta");
        m.insert('\u{0398}', "\\Theta");
        m.insert('\u{039B}', "\\Lambda");
        m.insert('\u{039E}', "\\Xi");
        m.insert('\u{03A0}', "\\Pi");
        m.insert('\u{03A3}', "\\Sigma");
        m.insert('\u{03A6}', "\\Phi");
        m.insert('\u{03A8}', "\\Psi");
        m.insert('\u{03A9}', "\\Omega");
        m.insert('\u{03B1}', "\\alpha");
        m.insert('\u{03B2}', "\\beta");
        m.insert('\u{03B3}', "\\gamma");
        m.insert('\u{03B4}', "\\delta");
        m.insert('\u{03B5}', "\\epsilon");
        m.insert('\u{03B6}', "\\zeta");
        m.insert('\u{03B7}', "\\eta");
        m.insert('\u{03B8}', "\\theta");
        m.insert('\u{03B9}', "\\iota");
        m.insert('\u{03BA}', "\\kappa");
        m.insert('\u{03BB}', "\\lambda");
        m.insert('\u{03BC}', "\\mu");
        m.insert('\u{03BD}', "\\nu");
        m.insert('\u{03BE}', "\\xi");
        m.insert('\u{03C0}', "\\pi");
        m.insert('\u{03C1}', "\\rho");
        m.insert('\u{03C2}', "\\sigma");
        m.insert('\u{03C3}', "\\sigma");
        m.insert('\u{03C4}', "\\tau");
        m.insert('\u{03C5}', "\\upsilon");
        m.insert('\u{03C6}', "\\phi");
        m.insert('\u{03C7}', "\\chi");
        m.insert('\u{03C8}', "\\psi");
        m.insert('\u{03C9}', "\\omega");
        m.insert('\u{03D5}', "\\phi");
        m.insert('\u{03F5}', "\\epsilon");
        // Bold epsilon, transmitted by some clients as a surrogate pair
        m.insert('\u{1D6C6}', "\\epsilon");
        // Misc
        m.insert('\u{00A2}', "\\cent");
        m.insert('\u{00B0}', "\\degree");
        m.insert('\u{00B1}', "\\pm");
        m.insert('\u{00D7}', "\\times");
        m.insert('\u{00F7}', "\\div");
        m.insert('\u{2212}', "-");
        m.insert('\u{2215}', "/");
        m.insert('\u{2217}', "*");
        m.insert('\u{2236}', ":");
        m.insert('\u{27E8}', "\\langle");
        m.insert('\u{27E9}', "\\rangle");
        m.insert('\u{2205}', "\\varnothing");
        m
    };
}

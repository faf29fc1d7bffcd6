//! The node which constitutes the abstract syntax tree for LaTeX math.
//!
//! Every node is an operator tag plus an ordered argument sequence. Leaves
//! (NUM, VAR, TEXT) keep a single string payload in their argument list;
//! everything else holds child nodes. Boolean flags record the grammatical
//! shape chosen during parsing (mixed number, repeating decimal, scientific
//! notation, ...) for downstream plugins.

use std::fmt;

use super::token::TokenKind;

/// Closed enumeration of operator tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    None,
    Num,
    Var,
    Text,

    Add,
    Sub,
    Mul,
    Frac,
    Pow,
    Subscript,
    Comma,
    Colon,

    Eql,
    Ne,
    Approx,
    RightArrow,
    Implies,
    Iff,

    Lt,
    Le,
    Gt,
    Ge,
    Ngtr,
    Nless,
    In,
    NotIn,
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

    Cup,
    Cap,
    SetMinus,
    Pm,
    Mp,
    Not,

    Paren,
    Bracket,
    Set,
    Interval,
    IntervalOpen,
    IntervalLeftOpen,
    IntervalRightOpen,
    AngleBracket,
    EvalAt,
    Pipe,
    Abs,

    Percent,
    Fact,
    Vec,
    Overline,
    MathBf,

    Sqrt,
    NthRoot,
    Log,
    Deriv,

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
    Min,
    Max,
    Gcd,
    Lcm,
    Mod,

    Integral,
    Sum,
    Prod,
    Lim,
    BigCup,
    BigCap,

    Matrix,
    Row,
    Col,

    MolarMass,
}

/// One entry of a node's argument list.
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    Str(String),
    Node(Node),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberFormat {
    Integer,
    Decimal,
}

/// Grammatical-shape flags, consumed by downstream plugins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeFlags {
    pub is_fraction: bool,
    pub is_mixed_number: bool,
    pub is_scientific: bool,
    pub is_repeating: bool,
    pub is_implicit: bool,
    pub is_polynomial: bool,
    pub is_slash: bool,
    pub is_polynomial_term: bool,
}

/// A node in the AST.
///
/// The tree is plain owned data, so `Clone` is a genuine deep copy; chained
/// relations rely on that when the middle operand is reused.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub op: Op,
    pub args: Vec<Arg>,
    /// Opening/closing delimiter the node originated inside, if any.
    pub lbrk: Option<TokenKind>,
    pub rbrk: Option<TokenKind>,
    /// NUM only.
    pub number_format: Option<NumberFormat>,
    pub separator_count: u32,
    pub last_separator_index: Option<usize>,
    pub flags: NodeFlags,
    /// Source position tag attached by callers.
    pub location: Option<String>,
}

impl Node {
    fn bare(op: Op) -> Self {
        Node {
            op,
            args: vec![],
            lbrk: None,
            rbrk: None,
            number_format: None,
            separator_count: 0,
            last_separator_index: None,
            flags: NodeFlags::default(),
            location: None,
        }
    }

    /// The canonical empty-input node.
    pub fn none() -> Self {
        Node::bare(Op::None)
    }

    pub fn leaf(op: Op, lexeme: &str) -> Self {
        let mut n = Node::bare(op);
        n.args.push(Arg::Str(lexeme.to_string()));
        n
    }

    pub fn var(name: &str) -> Self {
        Node::leaf(Op::Var, name)
    }

    pub fn text(content: &str) -> Self {
        Node::leaf(Op::Text, content)
    }

    /// NUM leaf; `number_format` is derived from the canonical lexeme.
    pub fn num(lexeme: &str) -> Self {
        let mut n = Node::leaf(Op::Num, lexeme);
        n.number_format = Some(if lexeme.contains('.') {
            NumberFormat::Decimal
        } else {
            NumberFormat::Integer
        });
        n
    }

    pub fn unary(op: Op, arg: Node) -> Self {
        let mut n = Node::bare(op);
        n.args.push(Arg::Node(arg));
        n
    }

    /// Binary constructor. With `flatten`, a left operand already carrying
    /// the same operator absorbs the right operand instead of nesting;
    /// n-ary flattening is only ever requested for ADD, MUL and COMMA.
    pub fn binary(op: Op, lhs: Node, rhs: Node, flatten: bool) -> Self {
        if flatten
            && lhs.op == op
            && lhs.lbrk.is_none()
            && !lhs.flags.is_mixed_number
            && !lhs.flags.is_scientific
            && !lhs.flags.is_repeating
        {
            let mut n = lhs;
            n.args.push(Arg::Node(rhs));
            return n;
        }
        let mut n = Node::bare(op);
        n.args.push(Arg::Node(lhs));
        n.args.push(Arg::Node(rhs));
        n
    }

    pub fn nary(op: Op, children: Vec<Node>) -> Self {
        let mut n = Node::bare(op);
        n.args = children.into_iter().map(Arg::Node).collect();
        n
    }

    /// Leaf payload, if this is a leaf.
    pub fn lexeme(&self) -> Option<&str> {
        match self.args.first() {
            Some(Arg::Str(s)) => Some(s),
            _ => None,
        }
    }

    /// The `i`-th child node, skipping no entries; `None` when the entry is
    /// a string payload or out of range.
    pub fn child(&self, i: usize) -> Option<&Node> {
        match self.args.get(i) {
            Some(Arg::Node(n)) => Some(n),
            _ => None,
        }
    }

    pub fn child_mut(&mut self, i: usize) -> Option<&mut Node> {
        match self.args.get_mut(i) {
            Some(Arg::Node(n)) => Some(n),
            _ => None,
        }
    }

    pub fn last_child(&self) -> Option<&Node> {
        match self.args.last() {
            Some(Arg::Node(n)) => Some(n),
            _ => None,
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn is_num(&self) -> bool {
        self.op == Op::Num
    }

    /// An integer NUM leaf with no shape flags.
    pub fn is_integer(&self) -> bool {
        self.op == Op::Num
            && self.number_format == Some(NumberFormat::Integer)
            && self.flags == NodeFlags::default()
            && self.lexeme() != Some("\\infty")
    }

    pub fn is_decimal(&self) -> bool {
        self.op == Op::Num && self.number_format == Some(NumberFormat::Decimal)
    }

    pub fn is_var_named(&self, name: &str) -> bool {
        self.op == Op::Var && self.lexeme() == Some(name)
    }

    /// Explicit deep copy; `Clone` already recurses through owned
    /// children, the alias states the intent at call sites.
    pub fn deep_copy(&self) -> Node {
        self.clone()
    }

    pub fn with_brackets(mut self, lbrk: TokenKind, rbrk: TokenKind) -> Node {
        self.lbrk = Some(lbrk);
        self.rbrk = Some(rbrk);
        self
    }
}

/// Displays the node with the output format of bash `tree`, one node per
/// line, payloads in parentheses.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn label(node: &Node) -> String {
            let payload = node.lexeme().unwrap_or("");
            format!("{:?}({})", node.op, payload)
        }

        fn aux(node: &Node) -> Vec<String> {
            let mut ret: Vec<String> = vec![label(node)];

            let children: Vec<&Node> = node
                .args
                .iter()
                .filter_map(|a| match a {
                    Arg::Node(n) => Some(n),
                    Arg::Str(_) => None,
                })
                .collect();
            for (i, child) in children.iter().enumerate() {
                let child_display = aux(child);
                let (head, rail) = if i != children.len() - 1 {
                    ("├── ", "│   ")
                } else {
                    ("└── ", "    ")
                };
                for (j, line) in child_display.iter().enumerate() {
                    if j == 0 {
                        ret.push(format!("{}{}", head, line));
                    } else {
                        ret.push(format!("{}{}", rail, line));
                    }
                }
            }
            ret
        }

        write!(f, "{}", aux(self).join("\n"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_num_format() {
        assert_eq!(Node::num("12").number_format, Some(NumberFormat::Integer));
        assert_eq!(Node::num("1.5").number_format, Some(NumberFormat::Decimal));
        assert!(Node::num("3").is_integer());
        assert!(!Node::num("3.0").is_integer());
    }

    #[test]
    fn test_binary_flatten() {
        let a = Node::binary(Op::Add, Node::num("1"), Node::num("2"), true);
        let b = Node::binary(Op::Add, a, Node::num("3"), true);
        assert_eq!(b.op, Op::Add);
        assert_eq!(b.arity(), 3);

        // Nesting is kept when flattening is not requested
        let a = Node::binary(Op::Add, Node::num("1"), Node::num("2"), false);
        let b = Node::binary(Op::Add, a, Node::num("3"), false);
        assert_eq!(b.arity(), 2);
    }

    #[test]
    fn test_bracketed_operand_does_not_flatten() {
        let grouped = Node::binary(Op::Add, Node::num("1"), Node::num("2"), true)
            .with_brackets(TokenKind::LeftParen, TokenKind::RightParen);
        let sum = Node::binary(Op::Add, grouped, Node::num("3"), true);
        assert_eq!(sum.arity(), 2);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let original = Node::binary(Op::Eql, Node::var("a"), Node::var("b"), false);
        let mut copy = original.deep_copy();
        copy.args[0] = Arg::Node(Node::var("c"));
        assert_eq!(original.child(0).map(|n| n.lexeme()), Some(Some("a")));
    }

    #[test]
    fn test_display_tree() {
        let n = Node::binary(Op::Add, Node::num("1"), Node::num("2"), true);
        let out = format!("{}", n);
        assert_eq!(out, "Add()\n├── Num(1)\n└── Num(2)");
    }
}

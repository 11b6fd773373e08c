//! Abstract syntax tree.
//!
//! Nodes carry their source span throughout the pipeline. The resolver
//! annotates identifiers with a [`Binding`], marks captured binding sites,
//! and fills each function literal's capture list; the tail-call analyzer
//! sets the `tail` / `tail_recursive` flags the emitter consumes.

use santa_core::builtins::BuiltinId;
use santa_core::span::Span;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Program {
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum Item {
    Section(Section),
    Statement(Stmt),
}

#[derive(Debug, Clone, Serialize)]
pub struct Section {
    pub name: String,
    pub body: SectionBody,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum SectionBody {
    Expr(Expr),
    /// A `test:` section: named sub-blocks, each a string literal.
    TestBlocks(Vec<TestBlock>),
}

#[derive(Debug, Clone, Serialize)]
pub struct TestBlock {
    pub name: String,
    pub value: String,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Stmt {
    pub kind: StmtKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum StmtKind {
    Expr(Expr),
    Let {
        mutable: bool,
        pattern: Pattern,
        value: Expr,
    },
    Return(Option<Expr>),
    Break(Option<Expr>),
}

/// Origin of an identifier, filled in by the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Binding {
    Local,
    Captured,
    Global,
    Builtin(BuiltinId),
}

#[derive(Debug, Clone, Serialize)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Pipeline,
    Compose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum UnOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Serialize)]
pub enum ExprKind {
    Int(i64),
    Decimal(f64),
    Str(String),
    Bool(bool),
    Nil,
    Ident {
        name: String,
        binding: Option<Binding>,
    },
    /// `_`; removed by desugaring.
    Placeholder,
    List(Vec<Element>),
    Set(Vec<Element>),
    Dict(Vec<DictEntry>),
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Assign {
        name: String,
        binding: Option<Binding>,
        value: Box<Expr>,
    },
    Range {
        start: Box<Expr>,
        end: Option<Box<Expr>>,
        inclusive: bool,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Element>,
        /// Self-call in tail position of a tail-recursive function.
        tail: bool,
    },
    Index {
        target: Box<Expr>,
        index: Box<Expr>,
    },
    Function(FunctionLit),
    Block(Vec<Stmt>),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        alt: Option<Box<Expr>>,
    },
    IfLet {
        pattern: Pattern,
        value: Box<Expr>,
        then: Box<Expr>,
        alt: Option<Box<Expr>>,
    },
    Match {
        subject: Box<Expr>,
        arms: Vec<MatchArm>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionLit {
    pub params: Vec<Param>,
    pub body: Box<Expr>,
    /// Free variables, in declaration order of the captured bindings.
    pub captures: Vec<String>,
    pub tail_recursive: bool,
}

#[derive(Debug, Clone, Serialize)]
pub enum Param {
    Named { name: String, captured: bool },
    /// Removed by desugaring in favor of a fresh name plus a leading
    /// destructuring `let`.
    Pattern(Pattern),
}

/// A list/set element or call argument, possibly spread (`..xs`).
#[derive(Debug, Clone, Serialize)]
pub struct Element {
    pub spread: bool,
    pub value: Expr,
}

#[derive(Debug, Clone, Serialize)]
pub enum DictEntry {
    Pair { key: Expr, value: Expr },
    /// `#{a}` ≡ `#{"a": a}`
    Shorthand { name: String, span: Span },
    Spread(Expr),
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchArm {
    pub pattern: Pattern,
    pub body: Expr,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub struct Pattern {
    pub kind: PatternKind,
    pub span: Span,
}

#[derive(Debug, Clone, Serialize)]
pub enum PatternKind {
    Wildcard,
    Ident {
        name: String,
        captured: bool,
    },
    /// `..` / `..name`, only inside a list pattern.
    Rest {
        name: Option<String>,
        captured: bool,
    },
    List(Vec<Pattern>),
    Int(i64),
    Decimal(f64),
    Str(String),
    Bool(bool),
    Nil,
    Range {
        start: Option<i64>,
        end: Option<i64>,
        inclusive: bool,
    },
}

/// `let f = |…| …` and `let f = memoize(|…| …)` declare `f` before the
/// right-hand side resolves, so references inside the lambda reach the slot
/// that will hold the (possibly memoized) wrapper.
pub fn recursive_let_name<'a>(pattern: &'a Pattern, value: &Expr) -> Option<&'a str> {
    let PatternKind::Ident { name, .. } = &pattern.kind else {
        return None;
    };
    match &value.kind {
        ExprKind::Function(_) => Some(name),
        ExprKind::Call { callee, args, .. } => {
            let ExprKind::Ident {
                name: callee_name, ..
            } = &callee.kind
            else {
                return None;
            };
            let memoized_lambda = callee_name == "memoize"
                && args.len() == 1
                && !args[0].spread
                && matches!(args[0].value.kind, ExprKind::Function(_));
            memoized_lambda.then_some(name.as_str())
        }
        _ => None,
    }
}

impl Pattern {
    /// Names this pattern binds, left to right.
    pub fn bound_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_names(&mut names);
        names
    }

    fn collect_names<'a>(&'a self, names: &mut Vec<&'a str>) {
        match &self.kind {
            PatternKind::Ident { name, .. } => names.push(name),
            PatternKind::Rest { name: Some(name), .. } => names.push(name),
            PatternKind::List(items) => {
                for item in items {
                    item.collect_names(names);
                }
            }
            _ => {}
        }
    }
}

// パス: src/ast.rs
// 役割: ホスト言語の抽象構文木と位置情報（Span）を定義する
// 意図: パーサ・型推論・REPL 合成器で共有する中立的な木構造を提供する
// 関連ファイル: src/parser/mod.rs, src/infer.rs, src/repl/definitions.rs
//! 抽象構文木（AST）
//!
//! 目的:
//! - 構文解析結果を型推論・ラッパ合成・低レベル化で共用できる表現に落とし込む。
//!
//! 設計ノート:
//! - すべてのノードはバイトオフセットの `Span` を保持し、診断の位置表示に使う。
//! - 文は閉じた列挙（`Stmt`）で表し、式文と宣言文を型で区別する。
//! - コンパイラが合成した束縛は `Modifiers::synthetic` で明示し、名前規約には頼らない。
//! - `Display` は再パース可能なソース風の表記を出力する（テストの比較にも使う）。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 入力テキスト中の半開区間 `[start, end)`（バイトオフセット）。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// `self` の先頭から `other` の末尾までを覆う区間を返す。
    pub fn to(self, other: Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UnaryOp {
    Neg,
    Not,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Concat,
    Mul,
    Div,
    Rem,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Or => "||",
            BinOp::And => "&&",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Concat => "++",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
        }
    }

    /// 結合の強さ（大きいほど強い）。表示時の括弧判定に使う。
    pub fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne => 3,
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => 4,
            BinOp::Add | BinOp::Sub | BinOp::Concat => 5,
            BinOp::Mul | BinOp::Div | BinOp::Rem => 6,
        }
    }
}

// 式ノード
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Expr {
    Int {
        value: i64,
        span: Span,
    },
    Bool {
        value: bool,
        span: Span,
    },
    Str {
        value: String,
        span: Span,
    },
    Unit {
        span: Span,
    },
    Ident {
        name: String,
        span: Span,
    },
    /// `Module.member` 形式の修飾参照。
    Select {
        module: String,
        member: String,
        span: Span,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
        span: Span,
    },
    Binary {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    If {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
        span: Span,
    },
    /// `{ s1; s2; e }`。`result` が無い場合の値は `()`。
    Block {
        stmts: Vec<Stmt>,
        result: Option<Box<Expr>>,
        span: Span,
    },
    /// `x := e`（型は Unit）。
    Assign {
        target: String,
        target_span: Span,
        value: Box<Expr>,
        span: Span,
    },
}

impl Expr {
    pub fn span(&self) -> Span {
        match self {
            Expr::Int { span, .. }
            | Expr::Bool { span, .. }
            | Expr::Str { span, .. }
            | Expr::Unit { span }
            | Expr::Ident { span, .. }
            | Expr::Select { span, .. }
            | Expr::Unary { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Call { span, .. }
            | Expr::If { span, .. }
            | Expr::Block { span, .. }
            | Expr::Assign { span, .. } => *span,
        }
    }

    pub fn ident(name: impl Into<String>, span: Span) -> Self {
        Expr::Ident {
            name: name.into(),
            span,
        }
    }

    /// 副作用を持たないことが構文上明らかな式かどうか。
    pub fn is_pure(&self) -> bool {
        match self {
            Expr::Int { .. }
            | Expr::Bool { .. }
            | Expr::Str { .. }
            | Expr::Unit { .. }
            | Expr::Ident { .. }
            | Expr::Select { .. } => true,
            Expr::Unary { operand, .. } => operand.is_pure(),
            Expr::Binary { left, right, .. } => left.is_pure() && right.is_pure(),
            _ => false,
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            Expr::Assign { .. } | Expr::If { .. } => 0,
            Expr::Binary { op, .. } => op.precedence(),
            Expr::Unary { .. } => 7,
            _ => 8,
        }
    }
}

/// 宣言に付与される修飾子。
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Modifiers {
    /// 継承・再定義不可のコンテナ。
    pub is_final: bool,
    /// コンパイラが合成した要素（利用者の表示対象外）。
    pub synthetic: bool,
}

impl Modifiers {
    pub fn synthetic() -> Self {
        Self {
            is_final: false,
            synthetic: true,
        }
    }
}

// 型式（注釈用）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeExpr {
    Named {
        name: String,
        span: Span,
    },
    Fun {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
        span: Span,
    },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Named { span, .. } | TypeExpr::Fun { span, .. } => *span,
        }
    }
}

/// `val` / `var` 宣言。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValDef {
    pub name: String,
    pub mutable: bool,
    pub ty: Option<TypeExpr>,
    pub rhs: Expr,
    pub span: Span,
    pub mods: Modifiers,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: TypeExpr,
    pub span: Span,
}

/// `def f(a: T): R = body`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefDef {
    pub name: String,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Expr,
    pub span: Span,
}

/// 名前空間コンテナ（REPL のセッションモジュールなど）。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDef {
    pub name: String,
    pub body: Vec<Stmt>,
    pub span: Span,
    pub mods: Modifiers,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImportSelector {
    /// `import M._`
    Wildcard,
    /// `import M.x`
    Member(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Import {
    pub module: String,
    pub selector: ImportSelector,
    pub span: Span,
}

impl Import {
    pub fn wildcard(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            selector: ImportSelector::Wildcard,
            span: Span::default(),
        }
    }
}

// 文（トップレベル/ブロック/コンテナ本体で共通）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stmt {
    Expr(Expr),
    Val(ValDef),
    Def(DefDef),
    Import(Import),
    Object(ObjectDef),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Expr(e) => e.span(),
            Stmt::Val(v) => v.span,
            Stmt::Def(d) => d.span,
            Stmt::Import(i) => i.span,
            Stmt::Object(o) => o.span,
        }
    }

    /// 値を持つ式文かどうか（宣言・インポートは false）。
    pub fn is_term(&self) -> bool {
        matches!(self, Stmt::Expr(_))
    }

    /// 宣言が導入する名前（式文・インポートは `None`）。
    pub fn defined_name(&self) -> Option<&str> {
        match self {
            Stmt::Val(v) => Some(&v.name),
            Stmt::Def(d) => Some(&d.name),
            Stmt::Object(o) => Some(&o.name),
            Stmt::Expr(_) | Stmt::Import(_) => None,
        }
    }
}

fn write_child(f: &mut fmt::Formatter<'_>, child: &Expr, min_prec: u8) -> fmt::Result {
    if child.precedence() < min_prec {
        write!(f, "({child})")
    } else {
        write!(f, "{child}")
    }
}

fn write_string_literal(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for ch in s.chars() {
        match ch {
            '\n' => f.write_str("\\n")?,
            '\t' => f.write_str("\\t")?,
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int { value, .. } => write!(f, "{value}"),
            Expr::Bool { value, .. } => write!(f, "{value}"),
            Expr::Str { value, .. } => write_string_literal(f, value),
            Expr::Unit { .. } => write!(f, "()"),
            Expr::Ident { name, .. } => write!(f, "{name}"),
            Expr::Select { module, member, .. } => write!(f, "{module}.{member}"),
            Expr::Unary { op, operand, .. } => {
                write!(f, "{}", op.symbol())?;
                write_child(f, operand, self.precedence())
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                let prec = op.precedence();
                write_child(f, left, prec)?;
                write!(f, " {} ", op.symbol())?;
                // 左結合なので右側は同順位でも括弧を付ける
                write_child(f, right, prec + 1)
            }
            Expr::Call { func, args, .. } => {
                write_child(f, func, 8)?;
                let parts: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => write!(f, "if ({cond}) {then_branch} else {else_branch}"),
            Expr::Block { stmts, result, .. } => {
                let mut parts: Vec<String> = stmts.iter().map(|s| s.to_string()).collect();
                if let Some(r) = result {
                    parts.push(r.to_string());
                }
                if parts.is_empty() {
                    write!(f, "{{}}")
                } else {
                    write!(f, "{{ {} }}", parts.join("; "))
                }
            }
            Expr::Assign { target, value, .. } => write!(f, "{target} := {value}"),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named { name, .. } => write!(f, "{name}"),
            TypeExpr::Fun { params, ret, .. } => {
                let parts: Vec<String> = params.iter().map(|p| p.to_string()).collect();
                write!(f, "({}) => {}", parts.join(", "), ret)
            }
        }
    }
}

impl fmt::Display for Import {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.selector {
            ImportSelector::Wildcard => write!(f, "import {}._", self.module),
            ImportSelector::Member(m) => write!(f, "import {}.{}", self.module, m),
        }
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Expr(e) => write!(f, "{e}"),
            Stmt::Val(v) => {
                let kw = if v.mutable { "var" } else { "val" };
                match &v.ty {
                    Some(t) => write!(f, "{kw} {}: {} = {}", v.name, t, v.rhs),
                    None => write!(f, "{kw} {} = {}", v.name, v.rhs),
                }
            }
            Stmt::Def(d) => {
                let ps: Vec<String> = d
                    .params
                    .iter()
                    .map(|p| format!("{}: {}", p.name, p.ty))
                    .collect();
                write!(f, "def {}({})", d.name, ps.join(", "))?;
                if let Some(r) = &d.ret {
                    write!(f, ": {r}")?;
                }
                write!(f, " = {}", d.body)
            }
            Stmt::Import(i) => write!(f, "{i}"),
            Stmt::Object(o) => {
                if o.mods.is_final {
                    write!(f, "final ")?;
                }
                writeln!(f, "object {} {{", o.name)?;
                for s in &o.body {
                    writeln!(f, "  {s}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

// パス: src/pipeline/refchecks.rs
// 役割: 型付け後の参照検査（値が捨てられる純粋な式への警告）
// 意図: 型付けと低レベル化の間に置く軽量な lint 段階
// 関連ファイル: src/pipeline/mod.rs, src/ast.rs

use super::{CompilationUnit, Context, Phase, PhaseId};
use crate::ast::{Expr, Stmt};
use crate::errors::{Diagnostic, DiagnosticKind};
use crate::infer::TypedStmt;

pub struct RefChecks;

impl Phase for RefChecks {
    fn id(&self) -> PhaseId {
        PhaseId::RefChecks
    }

    fn name(&self) -> &'static str {
        "refchecks"
    }

    fn run(&self, unit: &mut CompilationUnit, ctx: &mut Context) {
        let Some(typed) = &unit.typed else {
            return;
        };
        let mut found = Vec::new();
        for stmt in &typed.body {
            match stmt {
                TypedStmt::Binding(b) => match &b.tree {
                    Stmt::Val(v) => walk_expr(&v.rhs, &mut found),
                    Stmt::Def(d) => walk_expr(&d.body, &mut found),
                    _ => {}
                },
                TypedStmt::Expr { expr, .. } => walk_statement(expr, &mut found),
                TypedStmt::Import(_) => {}
            }
        }
        for expr in found {
            ctx.diagnostics_mut().report(Diagnostic::warning(
                DiagnosticKind::Lint,
                "LNT001",
                format!("a pure expression does nothing in statement position: {expr}"),
                expr.span(),
            ));
        }
    }
}

/// 値が捨てられる位置に置かれた式。
fn walk_statement<'a>(e: &'a Expr, found: &mut Vec<&'a Expr>) {
    if e.is_pure() {
        found.push(e);
    } else {
        walk_expr(e, found);
    }
}

fn walk_expr<'a>(e: &'a Expr, found: &mut Vec<&'a Expr>) {
    match e {
        Expr::Unary { operand, .. } => walk_expr(operand, found),
        Expr::Binary { left, right, .. } => {
            walk_expr(left, found);
            walk_expr(right, found);
        }
        Expr::Call { func, args, .. } => {
            walk_expr(func, found);
            for a in args {
                walk_expr(a, found);
            }
        }
        Expr::If {
            cond,
            then_branch,
            else_branch,
            ..
        } => {
            walk_expr(cond, found);
            walk_expr(then_branch, found);
            walk_expr(else_branch, found);
        }
        Expr::Block { stmts, result, .. } => {
            for s in stmts {
                match s {
                    Stmt::Expr(inner) => walk_statement(inner, found),
                    Stmt::Val(v) => walk_expr(&v.rhs, found),
                    Stmt::Def(d) => walk_expr(&d.body, found),
                    Stmt::Import(_) | Stmt::Object(_) => {}
                }
            }
            if let Some(r) = result {
                walk_expr(r, found);
            }
        }
        Expr::Assign { value, .. } => walk_expr(value, found),
        Expr::Int { .. }
        | Expr::Bool { .. }
        | Expr::Str { .. }
        | Expr::Unit { .. }
        | Expr::Ident { .. }
        | Expr::Select { .. } => {}
    }
}

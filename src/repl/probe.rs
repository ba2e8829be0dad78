// パス: src/repl/probe.rs
// 役割: 式 1 個の型を、セッション状態を変えずに調べる（`:type` 用）
// 意図: 使い捨てのコンテナで束縛 `expr` を型付けし、その型だけを取り出す
// 関連ファイル: src/repl/adapter.rs, src/repl/imports.rs, src/repl/cmd.rs
//! 式の型調査
//!
//! 1. 構文解析。何も回復できなければ入力全体を指す 1 件の診断「could not parse expression」。
//!    回復つきの解析はエラー許容時だけ先へ進む。
//! 2. `val expr = { 文...; 最後の式 }` を持つコンテナを作る（過去の import は引き継ぐ）。
//!    この束縛は合成扱いなので、右辺の `expr` はセッション側の同名束縛を指す。
//! 3. import 連鎖は現在のモジュール番号で作る。コンテナ自身は登録しない。
//! 4. フロントエンドだけを実行する。
//! 5. 束縛 `expr` を取り出す。見つからなければ「invalid expression」。

use tracing::debug;

use super::adapter::ReplPipeline;
use super::imports::import_chain;
use super::state::SessionState;
use crate::ast::{Expr, Import, Modifiers, ObjectDef, Span, Stmt, ValDef};
use crate::errors::{DiagnosticKind, Diagnostics, ReplResult};
use crate::infer::TypedBinding;
use crate::parser::{parse_source, ParseOutcome};
use crate::pipeline::{collected_failure, CompilationUnit, Context};

pub const PROBE_WRAPPER: &str = "$wrapper";
pub const PROBE_BINDING: &str = "expr";

/// 取り出した束縛と、型付けに使った文脈。
#[derive(Clone, Debug)]
pub struct Probed {
    pub binding: TypedBinding,
    pub context: Context,
}

impl Probed {
    pub fn type_display(&self) -> String {
        self.binding.type_display()
    }
}

fn unparseable(text: &str) -> Diagnostics {
    Diagnostics::error(
        DiagnosticKind::Parse,
        "PAR000",
        "could not parse expression",
        Span::new(0, text.len()),
    )
}

/// 文の列を、最後の式を値とするブロックにする。
fn block_of(mut stmts: Vec<Stmt>) -> Expr {
    let span = match (stmts.first(), stmts.last()) {
        (Some(first), Some(last)) => first.span().to(last.span()),
        _ => Span::default(),
    };
    let result = match stmts.pop() {
        Some(Stmt::Expr(e)) => Some(Box::new(e)),
        Some(other) => {
            stmts.push(other);
            None
        }
        None => None,
    };
    Expr::Block {
        stmts,
        result,
        span,
    }
}

fn probe_tree(stmts: Vec<Stmt>, state: &SessionState) -> ObjectDef {
    let block = block_of(stmts);
    let span = block.span();
    let mut body: Vec<Stmt> = state
        .imports()
        .iter()
        .map(|b| {
            Stmt::Import(Import {
                span: Span::default(),
                ..b.import.clone()
            })
        })
        .collect();
    body.push(Stmt::Val(ValDef {
        name: PROBE_BINDING.to_string(),
        mutable: false,
        ty: None,
        rhs: block,
        span,
        mods: Modifiers::synthetic(),
    }));
    ObjectDef {
        name: PROBE_WRAPPER.to_string(),
        body,
        span,
        mods: Modifiers {
            is_final: true,
            synthetic: true,
        },
    }
}

/// 式を型付けし、束縛 `expr` を返す。
pub fn type_check(
    pipeline: &ReplPipeline,
    text: &str,
    state: &SessionState,
    ctx: &Context,
    errors_allowed: bool,
) -> ReplResult<Probed> {
    let stmts = match parse_source(text) {
        ParseOutcome::Unparseable { .. } => return Err(unparseable(text)),
        ParseOutcome::Recovered { diagnostics, .. } if !errors_allowed => {
            return Err(
                Diagnostics::from_collected(diagnostics).unwrap_or_else(|| unparseable(text)),
            );
        }
        ParseOutcome::Recovered { stmts, .. } | ParseOutcome::Clean(stmts) => stmts,
    };
    if stmts.is_empty() {
        return Err(unparseable(text));
    }

    let mut unit = CompilationUnit::synthetic(probe_tree(stmts, state));
    let mut run_ctx = ctx
        .fresh()
        .with_root_imports(import_chain(state.object_index()));
    let typed = pipeline.run_front_end_only(&mut unit, &mut run_ctx);
    if run_ctx.diagnostics().has_errors() && !errors_allowed {
        debug!(expr = text, "probe failed in front end");
        return Err(collected_failure(&mut run_ctx));
    }

    let Some(binding) = typed.and_then(|t| t.binding(PROBE_BINDING).cloned()) else {
        return Err(Diagnostics::error(
            DiagnosticKind::Extraction,
            "EXT001",
            "invalid expression",
            Span::new(0, text.len()),
        ));
    };
    debug!(expr = text, ty = %binding.type_display(), "probed");
    Ok(Probed {
        binding,
        context: run_ctx,
    })
}

/// 型を表示用の文字列で返す。構文エラーは許容しない。
pub fn type_of(
    pipeline: &ReplPipeline,
    text: &str,
    state: &SessionState,
    ctx: &Context,
) -> ReplResult<String> {
    type_check(pipeline, text, state, ctx, false).map(|p| p.type_display())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(text: &str) -> ReplResult<String> {
        type_of(
            &ReplPipeline::new(),
            text,
            &SessionState::new(),
            &Context::default(),
        )
    }

    #[test]
    fn simple_expressions_have_types() {
        assert_eq!(probe("1 + 2").unwrap(), "Int");
        assert_eq!(probe("render(true)").unwrap(), "String");
        assert_eq!(probe("Math.max").unwrap(), "(Int, Int) => Int");
    }

    #[test]
    /// 複数の文はブロックとして扱われ、最後の式の型になる。
    fn several_statements_yield_the_last() {
        assert_eq!(probe("val a = 1; a > 0").unwrap(), "Bool");
        assert_eq!(probe("val a = 1").unwrap(), "Unit");
    }

    #[test]
    /// 解析できない入力は入力全体を指す 1 件の診断になる。
    fn unparseable_input_spans_whole_text() {
        let err = probe("1 +").unwrap_err();
        assert_eq!(err.as_slice().len(), 1);
        assert_eq!(err.primary().message, "could not parse expression");
        assert_eq!(err.primary().span, Span::new(0, 3));
    }

    #[test]
    fn type_errors_are_reported() {
        let err = probe("1 + true").unwrap_err();
        assert_eq!(err.primary().code, "TYP001");
    }

    #[test]
    /// エラー許容時は回復できた部分で型付けを続ける。
    fn recovered_parse_proceeds_when_errors_are_allowed() {
        let pipeline = ReplPipeline::new();
        let state = SessionState::new();
        let ctx = Context::default();
        let text = "val a = ;\n\"x\"";
        assert!(type_check(&pipeline, text, &state, &ctx, false).is_err());
        let probed = type_check(&pipeline, text, &state, &ctx, true).unwrap();
        assert_eq!(probed.type_display(), "String");
    }

    #[test]
    /// セッションに `expr` という束縛があっても、調査用の束縛に捕まらずその型が返る。
    fn session_binding_named_expr_keeps_its_type() {
        let compiler = crate::repl::compiler::ReplCompiler::new();
        let out = compiler
            .compile_source("val expr = \"s\"", &SessionState::new(), &Context::default())
            .unwrap();
        let ty = type_of(compiler.pipeline(), "expr", &out.state, &out.context).unwrap();
        assert_eq!(ty, "String");
        let ty = type_of(compiler.pipeline(), "expr ++ \"!\"", &out.state, &out.context);
        assert_eq!(ty.unwrap(), "String");
    }

    #[test]
    /// 型調査はレジストリにコンテナを登録しない。
    fn probe_leaves_no_module_behind() {
        let ctx = Context::default();
        let probed =
            type_check(&ReplPipeline::new(), "1", &SessionState::new(), &ctx, false).unwrap();
        assert!(!probed.context.registry().contains(PROBE_WRAPPER));
        assert!(ctx.store().borrow().paths().is_empty());
    }
}

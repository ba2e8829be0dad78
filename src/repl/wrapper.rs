// パス: src/repl/wrapper.rs
// 役割: 合成した文の列をセッションモジュール `ReplSession$N` で包み、コンパイル単位にする
// 意図: 対話ごとに一意な名前空間を作り、後続の対話から import できるようにする
// 関連ファイル: src/repl/state.rs, src/repl/imports.rs, src/pipeline/mod.rs

use tracing::trace;

use super::state::SessionState;
use crate::ast::{Modifiers, ObjectDef, Stmt};
use crate::errors::{DiagnosticKind, Diagnostics, ReplResult};
use crate::pipeline::CompilationUnit;

pub const WRAPPER_PREFIX: &str = "ReplSession$";

pub fn wrapper_name(object_index: usize) -> String {
    format!("{WRAPPER_PREFIX}{object_index}")
}

/// 文の列を final かつ合成のコンテナで包む。空の列は包めない。
pub fn wrap(stmts: Vec<Stmt>, state: &SessionState) -> ReplResult<CompilationUnit> {
    let (Some(first), Some(last)) = (stmts.first(), stmts.last()) else {
        return Err(Diagnostics::error(
            DiagnosticKind::Wrap,
            "WRAP001",
            "cannot wrap an empty batch of statements",
            Default::default(),
        ));
    };
    let span = first.span().to(last.span());
    let tree = ObjectDef {
        name: state.module_name(),
        body: stmts,
        span,
        mods: Modifiers {
            is_final: true,
            synthetic: true,
        },
    };
    trace!(module = %tree.name, statements = tree.body.len(), "wrapped");
    Ok(CompilationUnit::synthetic(tree))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::parser::parse_source;

    #[test]
    /// 名前はモジュール番号から決まり、範囲は最初の文から最後の文まで。
    fn wraps_into_numbered_final_container() {
        let stmts = parse_source("val a = 1\nval b = 2").into_result().unwrap();
        let state = SessionState::new().next_object(Vec::new());
        let unit = wrap(stmts, &state).unwrap();
        let tree = unit.tree().unwrap();
        assert_eq!(unit.name, "ReplSession$1");
        assert_eq!(tree.name, "ReplSession$1");
        assert!(tree.mods.is_final && tree.mods.synthetic);
        assert_eq!(tree.span, Span::new(0, 19));
        assert_eq!(tree.body.len(), 2);
    }

    #[test]
    fn empty_input_is_a_wrap_error() {
        let err = wrap(Vec::new(), &SessionState::new()).unwrap_err();
        assert_eq!(err.primary().code, "WRAP001");
        assert_eq!(err.primary().kind, DiagnosticKind::Wrap);
    }
}

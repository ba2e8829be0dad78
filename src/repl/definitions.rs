// パス: src/repl/definitions.rs
// 役割: 1 回の対話の文を、結果束縛（resN）と表示用束縛（xShow）へ展開する
// 意図: 式の値に名前を付け、あとで表示層が合成束縛を見つけられるようにする
// 関連ファイル: src/repl/state.rs, src/repl/wrapper.rs, src/registry.rs
//! 定義の合成
//!
//! 出力の順序は「import（過去の対話から引き継いだもの → 今回のもの）→ 式由来の束縛 → 宣言由来の束縛」。
//! 式と宣言はそれぞれの中で元の順序を保つ。
//!
//! - 式 `e`（番号 n）: `val resN = e` と合成束縛 `val resNShow = render(resN)`。
//! - 代入 `x := e`: 代入文をそのまま残し、`val resN = x` と `resNShow` を追加する。
//! - `val`/`var` 宣言 `x`: 宣言に続けて合成束縛 `val xShow = render(x)`。
//! - それ以外の宣言（`def` など）はそのまま。

use tracing::trace;

use super::state::SessionState;
use crate::ast::{Expr, Import, Modifiers, Span, Stmt, ValDef};
use crate::registry::RENDER_FN;

pub const RES_PREFIX: &str = "res";
pub const SHOW_SUFFIX: &str = "Show";

/// 合成結果と、結果番号を進めた新しい状態。
#[derive(Clone, Debug, PartialEq)]
pub struct Definitions {
    pub stmts: Vec<Stmt>,
    pub state: SessionState,
}

pub fn result_name(index: usize) -> String {
    format!("{RES_PREFIX}{index}")
}

pub fn show_name(name: &str) -> String {
    format!("{name}{SHOW_SUFFIX}")
}

fn binding(name: String, rhs: Expr, span: Span, mods: Modifiers) -> Stmt {
    Stmt::Val(ValDef {
        name,
        mutable: false,
        ty: None,
        rhs,
        span,
        mods,
    })
}

/// `val <name>Show = render(<name>)`（合成マーク付き）。
fn show_binding(name: &str, span: Span) -> Stmt {
    let call = Expr::Call {
        func: Box::new(Expr::ident(RENDER_FN, span)),
        args: vec![Expr::ident(name, span)],
        span,
    };
    binding(show_name(name), call, span, Modifiers::synthetic())
}

/// 過去の対話で導入された import。元のテキストはもう無いので位置情報は持たない。
fn carried_imports(state: &SessionState) -> impl Iterator<Item = Stmt> + '_ {
    state.imports().iter().map(|b| {
        Stmt::Import(Import {
            span: Span::default(),
            ..b.import.clone()
        })
    })
}

/// 文の列から合成定義を作る。構文的に正しい入力に対しては失敗しない。
pub fn definitions(stmts: &[Stmt], state: &SessionState) -> Definitions {
    let mut imports: Vec<Stmt> = carried_imports(state).collect();
    let mut from_exprs = Vec::new();
    let mut from_decls = Vec::new();
    let mut index = state.val_index();

    for stmt in stmts {
        match stmt {
            Stmt::Import(_) => imports.push(stmt.clone()),
            Stmt::Expr(expr) => {
                let name = result_name(index);
                let span = expr.span();
                match expr {
                    Expr::Assign {
                        target,
                        target_span,
                        ..
                    } => {
                        from_exprs.push(stmt.clone());
                        from_exprs.push(binding(
                            name.clone(),
                            Expr::ident(target.clone(), *target_span),
                            span,
                            Modifiers::default(),
                        ));
                    }
                    _ => from_exprs.push(binding(
                        name.clone(),
                        expr.clone(),
                        span,
                        Modifiers::default(),
                    )),
                }
                from_exprs.push(show_binding(&name, span));
                index += 1;
            }
            Stmt::Val(v) => {
                from_decls.push(stmt.clone());
                from_decls.push(show_binding(&v.name, v.span));
            }
            Stmt::Def(_) | Stmt::Object(_) => from_decls.push(stmt.clone()),
        }
    }

    trace!(
        expressions = index - state.val_index(),
        declarations = from_decls.len(),
        "definitions synthesized"
    );
    imports.extend(from_exprs);
    imports.extend(from_decls);
    Definitions {
        stmts: imports,
        state: state.with_val_index(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn synth(src: &str, state: &SessionState) -> Definitions {
        definitions(&parse_source(src).into_result().unwrap(), state)
    }

    fn rendered(d: &Definitions) -> Vec<String> {
        d.stmts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    /// 式は resN と resNShow になり、番号が進む。
    fn expression_gets_result_and_show_bindings() {
        let d = synth("1 + 1", &SessionState::new());
        assert_eq!(
            rendered(&d),
            vec!["val res0 = 1 + 1", "val res0Show = render(res0)"]
        );
        assert_eq!(d.state.val_index(), 1);
        match &d.stmts[1] {
            Stmt::Val(v) => assert!(v.mods.synthetic),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn val_declaration_gets_show_binding_only() {
        let d = synth("val x = 5", &SessionState::new());
        assert_eq!(rendered(&d), vec!["val x = 5", "val xShow = render(x)"]);
        assert_eq!(d.state.val_index(), 0);
    }

    #[test]
    /// 代入はそのまま残り、代入先の値が resN に束縛される。
    fn assignment_is_kept_and_target_captured() {
        let d = synth("x := 10", &SessionState::new().with_val_index(2));
        assert_eq!(
            rendered(&d),
            vec!["x := 10", "val res2 = x", "val res2Show = render(res2)"]
        );
        assert_eq!(d.state.val_index(), 3);
    }

    #[test]
    /// import → 式由来 → 宣言由来 の順に並び替えられる。
    fn orders_imports_then_expressions_then_declarations() {
        let d = synth(
            "val a = 1\ndef f(n: Int) = n\nf(a)\nimport Math._\n2",
            &SessionState::new(),
        );
        assert_eq!(
            rendered(&d),
            vec![
                "import Math._",
                "val res0 = f(a)",
                "val res0Show = render(res0)",
                "val res1 = 2",
                "val res1Show = render(res1)",
                "val a = 1",
                "val aShow = render(a)",
                "def f(n: Int) = n",
            ]
        );
    }

    #[test]
    /// 過去の対話の import が先頭に再挿入される。
    fn carried_imports_come_first() {
        let state = SessionState::new().next_object(vec![Import::wildcard("Strings")]);
        let d = synth("import Math.abs\n1", &state);
        assert_eq!(rendered(&d)[..2], ["import Strings._", "import Math.abs"]);
        assert_eq!(d.stmts[0].span(), Span::default());
    }
}

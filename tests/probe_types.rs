// パス: tests/probe_types.rs
// 役割: `:type` 用の型調査をセッション文脈つきで検証する統合テスト
// 意図: 調査がセッション状態を変えず、過去の定義と import を見られることを保証する
// 関連ファイル: src/repl/probe.rs, src/repl/compiler.rs, tests/test_support.rs
#[path = "test_support.rs"]
mod support;

use replc::ast::Span;
use replc::errors::DiagnosticKind;
use support::{codes, SessionFixture};

fn module_names(session: &SessionFixture) -> Vec<String> {
    session
        .context
        .registry()
        .module_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

#[test]
/// 解析できない入力は入力全体を指す診断 1 件だけになる。
fn unparseable_text_yields_single_diagnostic() {
    let session = SessionFixture::new();
    let err = session
        .compiler
        .type_of("1 +", &session.state, &session.context)
        .unwrap_err();
    assert_eq!(err.as_slice().len(), 1);
    assert_eq!(err.primary().kind, DiagnosticKind::Parse);
    assert_eq!(err.primary().message, "could not parse expression");
    assert_eq!(err.primary().span, Span::new(0, 3));
}

#[test]
fn probe_sees_earlier_sessions_and_imports() {
    let mut session = SessionFixture::new();
    session.run("val n = 3\nimport Strings._");
    assert_eq!(session.type_of("n * 2"), "Int");
    assert_eq!(session.type_of("upper"), "String => String");
    assert_eq!(session.type_of("render(n)"), "String");
}

#[test]
/// 同じ式を何度調べても結果は同じで、状態も登録も変わらない。
fn probing_is_idempotent() {
    let mut session = SessionFixture::new();
    session.run("val a = 1");
    let state = session.state.clone();
    let modules: Vec<String> = module_names(&session);

    let first = session.type_of("a > 0");
    let second = session.type_of("a > 0");
    assert_eq!(first, "Bool");
    assert_eq!(first, second);
    assert_eq!(session.state, state);
    let after = module_names(&session);
    assert_eq!(after, modules);

    let next = session.run("a");
    assert_eq!(next.unit.name, "ReplSession$1");
}

#[test]
fn unknown_names_are_type_errors() {
    let session = SessionFixture::new();
    let err = session
        .compiler
        .type_of("nope + 1", &session.state, &session.context)
        .unwrap_err();
    assert_eq!(codes(&err), vec!["TYP010"]);
}

#[test]
/// エラー許容の調査は回復できた文だけで型を決める。
fn errors_allowed_probe_uses_recovered_statements() {
    let session = SessionFixture::new();
    let probed = session
        .compiler
        .type_check("val a = ;\n1 + 2", &session.state, &session.context, true)
        .unwrap();
    assert_eq!(probed.type_display(), "Int");
    assert_eq!(probed.binding.name, "expr");
}

#[test]
/// セッションの束縛名が調査用の束縛名と同じでも、その型がそのまま返る。
fn binding_named_like_the_result_is_typed_correctly() {
    let mut session = SessionFixture::new();
    session.run("val expr = \"s\"");
    assert_eq!(session.type_of("expr"), "String");
}

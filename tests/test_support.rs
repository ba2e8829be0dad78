// パス: tests/test_support.rs
// 役割: 統合テスト共通の補助関数とフィクスチャを提供する
// 意図: 対話の連続実行や診断コードの取り出しを一元化してテストを簡潔に保つ
// 関連ファイル: tests/session_flow.rs, tests/probe_types.rs, tests/pipeline_phases.rs
#![allow(dead_code)]
use replc::errors::Diagnostics;
use replc::pipeline::Context;
use replc::repl::{Compiled, ReplCompiler, SessionState};

/// 成功した対話の状態と文脈を引き継ぎながら入力を順に流すフィクスチャ。
pub struct SessionFixture {
    pub compiler: ReplCompiler,
    pub state: SessionState,
    pub context: Context,
}

impl SessionFixture {
    pub fn new() -> Self {
        Self::with_context(Context::default())
    }

    pub fn with_context(context: Context) -> Self {
        Self {
            compiler: ReplCompiler::new(),
            state: SessionState::new(),
            context,
        }
    }

    /// 成功を前提に 1 回の対話を実行し、状態を進める。
    pub fn run(&mut self, src: &str) -> Compiled {
        let compiled = self
            .compiler
            .compile_source(src, &self.state, &self.context)
            .unwrap_or_else(|d| panic!("compile {src:?} failed:\n{}", d.render(src)));
        self.state = compiled.state.clone();
        self.context = compiled.context.clone();
        compiled
    }

    /// 失敗を前提に 1 回の対話を実行する。状態は進めない。
    pub fn fail(&self, src: &str) -> Diagnostics {
        match self.compiler.compile_source(src, &self.state, &self.context) {
            Ok(_) => panic!("compile {src:?} unexpectedly succeeded"),
            Err(d) => d,
        }
    }

    pub fn type_of(&self, expr: &str) -> String {
        self.compiler
            .type_of(expr, &self.state, &self.context)
            .unwrap_or_else(|d| panic!("type of {expr:?} failed:\n{}", d.render(expr)))
    }
}

/// 成功した対話で利用者に見える束縛を `kind name: Type` 形式で返す。
pub fn member_lines(compiled: &Compiled) -> Vec<String> {
    compiled
        .visible_members()
        .into_iter()
        .map(|b| format!("{} {}: {}", b.kind, b.name, b.type_display()))
        .collect()
}

/// 診断コードだけを並べる。
pub fn codes(diags: &Diagnostics) -> Vec<String> {
    diags.iter().map(|d| d.code.to_string()).collect()
}

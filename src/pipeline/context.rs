// パス: src/pipeline/context.rs
// 役割: コンパイル文脈（設定・モジュール表・成果物ストア・ルート import・診断収集器）
// 意図: 暗黙の大域状態を使わず、各フェーズへ明示的に渡す
// 関連ファイル: src/pipeline/mod.rs, src/repl/compiler.rs, src/repl/probe.rs
//! コンパイル文脈
//!
//! - `Context` は 1 回のパイプライン実行ぶんの状態。対話ごとに `fresh` で複製してから使うので、
//!   失敗した試行が呼び出し側の文脈を変えることはない。
//! - 成果物ストアだけは `Rc` で共有される（追記型）。

use std::rc::Rc;

use crate::artifact::{MemoryStore, SharedStore};
use crate::ast::Import;
use crate::config::Settings;
use crate::errors::{Diagnostic, Severity};
use crate::registry::ModuleRegistry;

/// 診断の収集器。`has_errors` と `drain` を公開する。
#[derive(Debug, Clone)]
pub struct DiagnosticCollector {
    records: Vec<Diagnostic>,
    max_errors: usize,
    fatal_warnings: bool,
    dropped: usize,
}

impl DiagnosticCollector {
    pub fn new(max_errors: usize, fatal_warnings: bool) -> Self {
        Self {
            records: Vec::new(),
            max_errors: max_errors.max(1),
            fatal_warnings,
            dropped: 0,
        }
    }

    pub fn report(&mut self, mut diagnostic: Diagnostic) {
        if self.fatal_warnings && diagnostic.severity == Severity::Warning {
            diagnostic.severity = Severity::Error;
        }
        if diagnostic.is_error() && self.error_count() >= self.max_errors {
            self.dropped += 1;
            return;
        }
        self.records.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        for d in diagnostics {
            self.report(d);
        }
    }

    pub fn has_errors(&self) -> bool {
        self.dropped > 0 || self.records.iter().any(Diagnostic::is_error)
    }

    pub fn error_count(&self) -> usize {
        self.records.iter().filter(|d| d.is_error()).count()
    }

    /// 上限を超えて捨てたエラーの数。
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.records
            .iter()
            .filter(|d| d.severity == Severity::Warning)
    }

    /// 記録済みの診断をすべて取り出す。
    pub fn drain(&mut self) -> Vec<Diagnostic> {
        self.dropped = 0;
        std::mem::take(&mut self.records)
    }
}

#[derive(Debug, Clone)]
pub struct Context {
    settings: Settings,
    registry: ModuleRegistry,
    store: SharedStore,
    root_imports: Vec<Import>,
    diagnostics: DiagnosticCollector,
}

impl Context {
    /// 組み込みモジュールとメモリストアを持つ文脈。
    pub fn new(settings: Settings) -> Self {
        Self::with_store(settings, MemoryStore::shared())
    }

    pub fn with_store(settings: Settings, store: SharedStore) -> Self {
        let diagnostics = DiagnosticCollector::new(settings.max_errors, settings.fatal_warnings);
        Self {
            settings,
            registry: ModuleRegistry::with_builtins(),
            store,
            root_imports: Vec::new(),
            diagnostics,
        }
    }

    /// 新しい診断収集器を持ち、ルート import が空の複製。
    pub fn fresh(&self) -> Self {
        Self {
            settings: self.settings.clone(),
            registry: self.registry.clone(),
            store: Rc::clone(&self.store),
            root_imports: Vec::new(),
            diagnostics: DiagnosticCollector::new(
                self.settings.max_errors,
                self.settings.fatal_warnings,
            ),
        }
    }

    pub fn with_root_imports(mut self, imports: Vec<Import>) -> Self {
        self.root_imports = imports;
        self
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ModuleRegistry {
        &mut self.registry
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    pub fn root_imports(&self) -> &[Import] {
        &self.root_imports
    }

    pub fn diagnostics(&self) -> &DiagnosticCollector {
        &self.diagnostics
    }

    pub fn diagnostics_mut(&mut self) -> &mut DiagnosticCollector {
        &mut self.diagnostics
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Span;
    use crate::errors::DiagnosticKind;

    fn warning() -> Diagnostic {
        Diagnostic::warning(DiagnosticKind::Lint, "LNT001", "w", Span::default())
    }

    fn error() -> Diagnostic {
        Diagnostic::error(DiagnosticKind::TypeCheck, "TYP001", "e", Span::default())
    }

    #[test]
    /// 警告だけならエラー扱いにならない。
    fn warnings_do_not_count_as_errors() {
        let mut c = DiagnosticCollector::new(10, false);
        c.report(warning());
        assert!(!c.has_errors());
        assert_eq!(c.warnings().count(), 1);
    }

    #[test]
    fn fatal_warnings_promote_to_errors() {
        let mut c = DiagnosticCollector::new(10, true);
        c.report(warning());
        assert!(c.has_errors());
        assert_eq!(c.records()[0].severity, Severity::Error);
    }

    #[test]
    /// 上限を超えたエラーは捨てられるが失敗であることは保たれる。
    fn max_errors_truncates_but_keeps_failure() {
        let mut c = DiagnosticCollector::new(2, false);
        c.extend(vec![error(), error(), error()]);
        assert_eq!(c.error_count(), 2);
        assert_eq!(c.dropped(), 1);
        assert!(c.has_errors());
        assert_eq!(c.drain().len(), 2);
        assert!(!c.has_errors());
    }

    #[test]
    /// fresh はストアを共有し、診断とルート import を持ち越さない。
    fn fresh_shares_store_but_not_diagnostics() {
        let mut ctx = Context::default().with_root_imports(vec![Import::wildcard("Math")]);
        ctx.diagnostics_mut().report(error());
        let f = ctx.fresh();
        assert!(Rc::ptr_eq(f.store(), ctx.store()));
        assert!(f.root_imports().is_empty());
        assert!(!f.diagnostics().has_errors());
    }
}

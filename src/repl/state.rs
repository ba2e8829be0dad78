// パス: src/repl/state.rs
// 役割: 対話をまたいで引き継ぐセッション状態（import 束縛・結果番号・モジュール番号）
// 意図: 状態は不変値として扱い、遷移のたびに新しい値を作る
// 関連ファイル: src/repl/definitions.rs, src/repl/compiler.rs, src/repl/imports.rs
//! セッション状態
//!
//! - `val_index` は `resN` の次の番号、`object_index` は次に生成するモジュールの番号。
//! - 失敗した対話では呼び出し側は古い値をそのまま使い続ける（ここには失敗遷移がない）。

use serde::{Deserialize, Serialize};

use super::wrapper::wrapper_name;
use crate::ast::Import;

/// 利用者が書いた import と、それを導入した対話のモジュール番号。
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportBinding {
    pub import: Import,
    pub module_index: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    imports: Vec<ImportBinding>,
    val_index: usize,
    object_index: usize,
}

impl SessionState {
    /// 起動時の状態（import なし、番号はともに 0）。
    pub fn new() -> Self {
        Self::default()
    }

    pub fn imports(&self) -> &[ImportBinding] {
        &self.imports
    }

    pub fn val_index(&self) -> usize {
        self.val_index
    }

    pub fn object_index(&self) -> usize {
        self.object_index
    }

    /// 次に生成するセッションモジュールの名前。
    pub fn module_name(&self) -> String {
        wrapper_name(self.object_index)
    }

    pub fn with_val_index(&self, val_index: usize) -> Self {
        Self {
            val_index,
            ..self.clone()
        }
    }

    /// 対話の成功後の状態。モジュール番号を 1 進め、その対話の import を追加する。
    pub fn next_object(&self, new_imports: impl IntoIterator<Item = Import>) -> Self {
        let mut imports = self.imports.clone();
        imports.extend(new_imports.into_iter().map(|import| ImportBinding {
            import,
            module_index: self.object_index,
        }));
        Self {
            imports,
            val_index: self.val_index,
            object_index: self.object_index + 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_is_empty() {
        let s = SessionState::new();
        assert!(s.imports().is_empty());
        assert_eq!((s.val_index(), s.object_index()), (0, 0));
        assert_eq!(s.module_name(), "ReplSession$0");
    }

    #[test]
    /// 遷移は元の値を変更しない。
    fn transitions_produce_new_values() {
        let s = SessionState::new();
        let t = s.with_val_index(3).next_object(vec![Import::wildcard("Math")]);
        assert_eq!(s, SessionState::new());
        assert_eq!((t.val_index(), t.object_index()), (3, 1));
        assert_eq!(t.imports()[0].module_index, 0);
        assert_eq!(t.imports()[0].import.module, "Math");
    }

    #[test]
    /// チェックポイントとして JSON へ保存して復元できる。
    fn state_survives_a_json_checkpoint() {
        let s = SessionState::new()
            .with_val_index(2)
            .next_object(vec![Import::wildcard("Strings")]);
        let json = serde_json::to_string(&s).unwrap();
        let back: SessionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
    }
}

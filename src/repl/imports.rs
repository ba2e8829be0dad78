// パス: src/repl/imports.rs
// 役割: セッションの import 連鎖（表示ユーティリティ → ReplSession$0 .. $(N-1)）を作る
// 意図: 以前の対話の定義を修飾なしで参照でき、後の対話が前の対話を隠すようにする
// 関連ファイル: src/repl/wrapper.rs, src/infer.rs, src/repl/compiler.rs

use std::iter;

use super::wrapper::wrapper_name;
use crate::ast::Import;
use crate::registry::SHOW_MODULE;

/// 長さは常に `object_index + 1`。順序が後ほど優先される。
pub fn import_chain(object_index: usize) -> Vec<Import> {
    iter::once(Import::wildcard(SHOW_MODULE))
        .chain((0..object_index).map(|i| Import::wildcard(wrapper_name(i))))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::ImportSelector;

    #[test]
    fn chain_starts_with_show_module() {
        let chain = import_chain(0);
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].module, "ReplShow");
    }

    #[test]
    /// すべてワイルドカード import で、番号の昇順に並ぶ。
    fn chain_lists_previous_sessions_in_order() {
        let names: Vec<String> = import_chain(3).into_iter().map(|i| i.to_string()).collect();
        assert_eq!(
            names,
            vec![
                "import ReplShow._",
                "import ReplSession$0._",
                "import ReplSession$1._",
                "import ReplSession$2._",
            ]
        );
        assert!(import_chain(3)
            .iter()
            .all(|i| i.selector == ImportSelector::Wildcard));
    }
}

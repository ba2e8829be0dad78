// パス: src/ir.rs
// 役割: 型付きモジュールを低レベル化したスタックマシン IR のデータ構造を定義する
// 意図: コード生成段階が JSON として書き出し、呼び出し側のローダが読み込める形式を確立する
// 関連ファイル: src/pipeline/lower.rs, src/pipeline/codegen.rs, src/repl/adapter.rs
//! モジュール IR
//!
//! - 1 モジュール = フィールド（val/var）、メソッド（def）、初期化コード列。
//! - ジャンプ先は同じコード列内の絶対添字。
//! - 自モジュール以外の名前は `LoadName` のまま残し、`imports` の順（後勝ち）でローダが解決する。

use serde::{Deserialize, Serialize};

use crate::registry::BindingKind;

/// 成果物ファイルの拡張子。
pub const IR_EXTENSION: &str = "tlir";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "instr", rename_all = "snake_case")]
pub enum Instr {
    PushInt { value: i64 },
    PushBool { value: bool },
    PushStr { value: String },
    PushUnit,
    LoadLocal { name: String },
    StoreLocal { name: String },
    /// 自モジュールのメンバー。
    LoadField { module: String, name: String },
    StoreField { module: String, name: String },
    /// import 連鎖から解決される名前。
    LoadName { name: String },
    StoreName { name: String },
    /// `Module.member` 形式の修飾参照。
    LoadQualified { module: String, name: String },
    Unary { op: String },
    Binary { op: String },
    Call { argc: usize },
    Jump { target: usize },
    JumpIfFalse { target: usize },
    /// ブロック内の局所 def。関数値を積む。
    Closure { method: MethodIr },
    Pop,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldIr {
    pub name: String,
    pub kind: BindingKind,
    /// 表示用の型。
    pub ty: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub synthetic: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodIr {
    pub name: String,
    pub params: Vec<String>,
    pub code: Vec<Instr>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleIr {
    pub name: String,
    /// `import M._` / `import M.x` の表記。ルートの連鎖を含め、開いた順。
    pub imports: Vec<String>,
    pub fields: Vec<FieldIr>,
    pub methods: Vec<MethodIr>,
    pub init: Vec<Instr>,
}

impl ModuleIr {
    /// 成果物の相対パス（`<module>.tlir`）。
    pub fn artifact_path(&self) -> String {
        artifact_path(&self.name)
    }

    pub fn to_json(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec_pretty(self)
    }

    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

pub fn artifact_path(module: &str) -> String {
    format!("{module}.{IR_EXTENSION}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// 命令は instr タグ付きの JSON になる。
    fn instructions_serialize_with_instr_tag() {
        let json = serde_json::to_string(&Instr::PushInt { value: 3 }).unwrap();
        assert_eq!(json, r#"{"instr":"push_int","value":3}"#);
        let json = serde_json::to_string(&Instr::Pop).unwrap();
        assert_eq!(json, r#"{"instr":"pop"}"#);
    }

    #[test]
    /// 演算子を持つ命令の `op` はタグと衝突せず、そのまま読み戻せる。
    fn operator_field_survives_json() {
        let instr = Instr::Binary { op: "+".into() };
        let json = serde_json::to_string(&instr).unwrap();
        assert_eq!(json, r#"{"instr":"binary","op":"+"}"#);
        let back: Instr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, instr);
    }

    #[test]
    fn artifact_path_uses_module_name() {
        assert_eq!(artifact_path("ReplSession$4"), "ReplSession$4.tlir");
    }

    #[test]
    /// 合成フラグは false のとき省略され、読み戻しで既定値に戻る。
    fn synthetic_flag_is_omitted_when_false() {
        let f = FieldIr {
            name: "x".into(),
            kind: BindingKind::Val,
            ty: "Int".into(),
            synthetic: false,
        };
        let json = serde_json::to_string(&f).unwrap();
        assert!(!json.contains("synthetic"));
        let back: FieldIr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, f);
    }
}

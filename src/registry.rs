// パス: src/registry.rs
// 役割: コンパイル済みモジュールのシグネチャ表と組み込みモジュールを管理する
// 意図: 後続の対話が以前のセッションモジュールを import できるようにする
// 関連ファイル: src/infer.rs, src/pipeline/codegen.rs, src/repl/adapter.rs
//! モジュールレジストリ
//!
//! - `ModuleRegistry` はモジュール名からシグネチャ（`ModuleSig`）への表。
//! - 組み込みモジュール `ReplShow` / `Math` / `Strings` は常に登録済み。
//! - コード生成が成功したモジュールだけが登録される。

use std::collections::HashMap;
use std::fmt;

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::typesys::{generalize, t_fun, t_int, t_string, Scheme, TVarSupply};

/// 値の表示用ユーティリティのモジュール名。
pub const SHOW_MODULE: &str = "ReplShow";
/// 表示関数の名前（`render: a => String`）。
pub const RENDER_FN: &str = "render";

/// 束縛の種類。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BindingKind {
    Val,
    Var,
    Def,
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingKind::Val => f.write_str("val"),
            BindingKind::Var => f.write_str("var"),
            BindingKind::Def => f.write_str("def"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MemberSig {
    pub name: String,
    pub scheme: Scheme,
    pub kind: BindingKind,
    /// コンパイラが合成したメンバー（表示用束縛など）。
    pub synthetic: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleSig {
    pub name: String,
    pub members: Vec<MemberSig>,
}

impl ModuleSig {
    pub fn member(&self, name: &str) -> Option<&MemberSig> {
        self.members.iter().find(|m| m.name == name)
    }
}

fn builtin(name: &str, members: Vec<(&str, Scheme)>) -> ModuleSig {
    ModuleSig {
        name: name.into(),
        members: members
            .into_iter()
            .map(|(n, scheme)| MemberSig {
                name: n.into(),
                scheme,
                kind: BindingKind::Def,
                synthetic: false,
            })
            .collect(),
    }
}

static BUILTINS: Lazy<Vec<ModuleSig>> = Lazy::new(|| {
    let mut supply = TVarSupply::new();
    let a = supply.fresh_type();
    let render = generalize(&Default::default(), t_fun(vec![a], t_string()));
    let int2 = || Scheme::mono(t_fun(vec![t_int(), t_int()], t_int()));
    vec![
        builtin(SHOW_MODULE, vec![(RENDER_FN, render)]),
        builtin(
            "Math",
            vec![
                ("abs", Scheme::mono(t_fun(vec![t_int()], t_int()))),
                ("max", int2()),
                ("min", int2()),
            ],
        ),
        builtin(
            "Strings",
            vec![
                ("length", Scheme::mono(t_fun(vec![t_string()], t_int()))),
                ("upper", Scheme::mono(t_fun(vec![t_string()], t_string()))),
                (
                    "concat",
                    Scheme::mono(t_fun(vec![t_string(), t_string()], t_string())),
                ),
            ],
        ),
    ]
});

/// モジュール名 → シグネチャの表。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModuleRegistry {
    modules: HashMap<String, ModuleSig>,
}

impl ModuleRegistry {
    /// 組み込みモジュールだけを含む表を作る。
    pub fn with_builtins() -> Self {
        let modules = BUILTINS
            .iter()
            .map(|m| (m.name.clone(), m.clone()))
            .collect();
        Self { modules }
    }

    pub fn get(&self, name: &str) -> Option<&ModuleSig> {
        self.modules.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    /// 同名のモジュールは置き換える。
    pub fn register(&mut self, sig: ModuleSig) {
        self.modules.insert(sig.name.clone(), sig);
    }

    /// 名前順のモジュール一覧。
    pub fn module_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.modules.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_builtin(name: &str) -> bool {
        BUILTINS.iter().any(|m| m.name == name)
    }
}

impl Default for ModuleRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typesys::pp_scheme;

    #[test]
    /// 表示ユーティリティは常に登録されており多相である。
    fn show_module_is_always_available() {
        let reg = ModuleRegistry::with_builtins();
        let sig = reg.get(SHOW_MODULE).unwrap();
        let render = sig.member(RENDER_FN).unwrap();
        assert_eq!(pp_scheme(&render.scheme), "a => String");
        assert_eq!(render.scheme.vars.len(), 1);
    }

    #[test]
    fn register_replaces_by_name() {
        let mut reg = ModuleRegistry::default();
        reg.register(ModuleSig {
            name: "ReplSession$0".into(),
            members: Vec::new(),
        });
        assert!(reg.contains("ReplSession$0"));
        assert!(!ModuleRegistry::is_builtin("ReplSession$0"));
        assert!(ModuleRegistry::is_builtin("Math"));
        assert_eq!(
            reg.module_names(),
            vec!["Math", "ReplSession$0", "ReplShow", "Strings"]
        );
    }
}

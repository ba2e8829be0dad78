// パス: src/typesys.rs
// 役割: 型表現・置換・単一化・一般化/インスタンス化・型の表示
// 意図: フロントエンド（infer.rs）とレジストリが共有する型の基礎機能を提供する
// 関連ファイル: src/infer.rs, src/registry.rs, src/repl/probe.rs
//! 型システム（typesys）
//!
//! 目的:
//! - 型表現（`Type`）、置換（`Subst`）、単一化（`unify`）、
//!   一般化/インスタンス化といった Hindley-Milner の基礎機能を提供する。
//!
//! 補足:
//! - `Type::TError` はエラー回復用の型で、どの型とも単一化に成功する。
//!   1 件の型エラーから連鎖的に診断が増えるのを防ぐ。
//! - `pp_type` は型変数を出現順に a, b, c... と命名して表示する。

use std::collections::{HashMap, HashSet};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// 型変数を一意に識別するための構造体。
pub struct TVar {
    pub id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// 型コンストラクタの名前を表す構造体。
pub struct TCon {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// 多引数関数型。引数は 0 個以上。
pub struct TFun {
    pub params: Vec<Type>,
    pub ret: Box<Type>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// 型システムで利用する型バリアント。
pub enum Type {
    TVar(TVar),
    TCon(TCon),
    TFun(TFun),
    /// エラー回復用。
    TError,
}

fn t_con(name: &str) -> Type {
    Type::TCon(TCon { name: name.into() })
}
pub fn t_int() -> Type {
    t_con("Int")
}
pub fn t_bool() -> Type {
    t_con("Bool")
}
pub fn t_string() -> Type {
    t_con("String")
}
pub fn t_unit() -> Type {
    t_con("Unit")
}
/// 関数型を構築する。
pub fn t_fun(params: Vec<Type>, ret: Type) -> Type {
    Type::TFun(TFun {
        params,
        ret: Box::new(ret),
    })
}

/// 基本型の名前（型注釈で使用可能なもの）。
pub const BASE_TYPES: &[&str] = &["Int", "Bool", "String", "Unit"];

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
/// 全称型変数を含む型スキーム。
pub struct Scheme {
    pub vars: Vec<TVar>,
    pub r#type: Type,
}

impl Scheme {
    /// 量化変数を持たないスキーム。
    pub fn mono(t: Type) -> Self {
        Self {
            vars: Vec::new(),
            r#type: t,
        }
    }
}

// 置換
pub type Subst = HashMap<i64, Type>;

/// 型に含まれる自由型変数集合を求める。
pub fn ftv(t: &Type) -> HashSet<i64> {
    match t {
        Type::TVar(TVar { id }) => HashSet::from([*id]),
        Type::TCon(_) | Type::TError => HashSet::new(),
        Type::TFun(TFun { params, ret }) => {
            let mut s = ftv(ret);
            for p in params {
                s.extend(ftv(p));
            }
            s
        }
    }
}

/// スキームの自由型変数（束縛変数を除く）。
pub fn ftv_scheme(sc: &Scheme) -> HashSet<i64> {
    let mut s = ftv(&sc.r#type);
    for tv in &sc.vars {
        s.remove(&tv.id);
    }
    s
}

/// 型に置換を適用する。
pub fn apply_subst_t(s: &Subst, t: &Type) -> Type {
    match t {
        Type::TVar(TVar { id }) => s.get(id).cloned().unwrap_or_else(|| t.clone()),
        Type::TCon(_) | Type::TError => t.clone(),
        Type::TFun(TFun { params, ret }) => Type::TFun(TFun {
            params: params.iter().map(|p| apply_subst_t(s, p)).collect(),
            ret: Box::new(apply_subst_t(s, ret)),
        }),
    }
}

/// スキームへ置換を適用する（束縛変数は除外）。
pub fn apply_subst_s(s: &Subst, sc: &Scheme) -> Scheme {
    let bound: HashSet<i64> = sc.vars.iter().map(|tv| tv.id).collect();
    let s2: Subst = s
        .iter()
        .filter(|(k, _)| !bound.contains(k))
        .map(|(k, v)| (*k, v.clone()))
        .collect();
    Scheme {
        vars: sc.vars.clone(),
        r#type: apply_subst_t(&s2, &sc.r#type),
    }
}

/// 2つの置換を合成する。
pub fn compose(a: &Subst, b: &Subst) -> Subst {
    // a ∘ b（先に b を適用してから a）
    let mut out: Subst = b.iter().map(|(k, v)| (*k, apply_subst_t(a, v))).collect();
    for (k, v) in a {
        out.insert(*k, v.clone());
    }
    out
}

#[derive(Clone, Debug, Default)]
/// 新しい型変数番号を供給する構造体。
pub struct TVarSupply {
    next: i64,
}

impl TVarSupply {
    pub fn new() -> Self {
        Self { next: 0 }
    }

    /// 既存のスキームと衝突しないよう、開始番号を指定して初期化する。
    pub fn starting_at(next: i64) -> Self {
        Self { next }
    }

    /// 未使用の型変数を生成する。
    pub fn fresh(&mut self) -> TVar {
        let id = self.next;
        self.next += 1;
        TVar { id }
    }

    pub fn fresh_type(&mut self) -> Type {
        Type::TVar(self.fresh())
    }
}

/// 環境に現れない型変数を量化してスキームを作る。
pub fn generalize(env_vars: &HashSet<i64>, t: Type) -> Scheme {
    let mut vars: Vec<TVar> = ftv(&t)
        .difference(env_vars)
        .map(|id| TVar { id: *id })
        .collect();
    vars.sort_by_key(|tv| tv.id);
    Scheme { vars, r#type: t }
}

/// スキームの束縛変数を新しい型変数で置き換える。
pub fn instantiate(sc: &Scheme, supply: &mut TVarSupply) -> Type {
    let mut sub: Subst = Subst::new();
    for tv in &sc.vars {
        sub.insert(tv.id, Type::TVar(supply.fresh()));
    }
    apply_subst_t(&sub, &sc.r#type)
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// 単一化が失敗したときの情報。
pub struct UnifyError {
    pub code: &'static str, // TYP001/TYP002/TYP003
    pub message: String,
}

impl UnifyError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// 2つの型を突き合わせて最小の置換を得る。
pub fn unify(t1: Type, t2: Type) -> Result<Subst, UnifyError> {
    match (t1, t2) {
        (Type::TError, _) | (_, Type::TError) => Ok(Subst::new()),
        (Type::TVar(tv), t) => bind(tv, t),
        (t, Type::TVar(tv)) => bind(tv, t),
        (Type::TCon(a), Type::TCon(b)) => {
            if a.name == b.name {
                Ok(Subst::new())
            } else {
                Err(UnifyError::new(
                    "TYP001",
                    format!("type mismatch: {} vs {}", a.name, b.name),
                ))
            }
        }
        (Type::TFun(a), Type::TFun(b)) => {
            if a.params.len() != b.params.len() {
                return Err(UnifyError::new(
                    "TYP003",
                    format!(
                        "function arity mismatch: {} vs {} parameters",
                        a.params.len(),
                        b.params.len()
                    ),
                ));
            }
            let mut s = Subst::new();
            for (pa, pb) in a.params.iter().zip(b.params.iter()) {
                let step = unify(apply_subst_t(&s, pa), apply_subst_t(&s, pb))?;
                s = compose(&step, &s);
            }
            let step = unify(apply_subst_t(&s, &a.ret), apply_subst_t(&s, &b.ret))?;
            Ok(compose(&step, &s))
        }
        (x, y) => {
            let shown = pp_types(&[&x, &y]);
            Err(UnifyError::new(
                "TYP001",
                format!("type mismatch: {} vs {}", shown[0], shown[1]),
            ))
        }
    }
}

/// 型変数と型を結び付けて置換とする。
pub fn bind(tv: TVar, t: Type) -> Result<Subst, UnifyError> {
    if let Type::TVar(TVar { id }) = &t {
        if *id == tv.id {
            return Ok(Subst::new());
        }
    }
    if ftv(&t).contains(&tv.id) {
        return Err(UnifyError::new("TYP002", "occurs check failed (infinite type)"));
    }
    let mut s = Subst::new();
    s.insert(tv.id, t);
    Ok(s)
}

fn var_name(index: usize) -> String {
    let letter = (b'a' + (index % 26) as u8) as char;
    if index < 26 {
        letter.to_string()
    } else {
        format!("{}{}", letter, index / 26)
    }
}

fn collect_var_order(t: &Type, order: &mut Vec<i64>) {
    match t {
        Type::TVar(TVar { id }) => {
            if !order.contains(id) {
                order.push(*id);
            }
        }
        Type::TCon(_) | Type::TError => {}
        Type::TFun(TFun { params, ret }) => {
            for p in params {
                collect_var_order(p, order);
            }
            collect_var_order(ret, order);
        }
    }
}

fn render(t: &Type, names: &HashMap<i64, String>) -> String {
    match t {
        Type::TVar(TVar { id }) => names.get(id).cloned().unwrap_or_else(|| format!("t{id}")),
        Type::TCon(TCon { name }) => name.clone(),
        Type::TError => "<error>".into(),
        Type::TFun(TFun { params, ret }) => {
            let ret_s = render(ret, names);
            match params.as_slice() {
                [single] if !matches!(single, Type::TFun(_)) => {
                    format!("{} => {}", render(single, names), ret_s)
                }
                _ => {
                    let ps: Vec<String> = params.iter().map(|p| render(p, names)).collect();
                    format!("({}) => {}", ps.join(", "), ret_s)
                }
            }
        }
    }
}

/// 複数の型を同じ命名規則（出現順に a, b, ...）で表示する。
pub fn pp_types(ts: &[&Type]) -> Vec<String> {
    let mut order = Vec::new();
    for t in ts {
        collect_var_order(t, &mut order);
    }
    let names: HashMap<i64, String> = order
        .iter()
        .enumerate()
        .map(|(i, id)| (*id, var_name(i)))
        .collect();
    ts.iter().map(|t| render(t, &names)).collect()
}

/// 型を表示用文字列にする。
pub fn pp_type(t: &Type) -> String {
    pp_types(&[t]).pop().unwrap_or_default()
}

/// スキームを表示する（量化は暗黙）。
pub fn pp_scheme(sc: &Scheme) -> String {
    pp_type(&sc.r#type)
}

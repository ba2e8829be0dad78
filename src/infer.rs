// パス: src/infer.rs
// 役割: コンテナ（object）単位の名前解決と Hindley–Milner 型推論を実装する
// 意図: フロントエンド段階として、型付きモジュールと診断を生成する
// 関連ファイル: src/typesys.rs, src/registry.rs, src/pipeline/frontend.rs
//! 型推論モジュール
//!
//! - スコープはフレームの積み重ねで表す。外側から順に
//!   「ルートの import 連鎖（1 件 1 フレーム）」「本体内の import」「メンバー」「局所」。
//!   後に積んだフレームが先に引かれるので、後の import が前の import を隠す。
//! - メンバーは本体を型付けする前にすべて仮宣言する。したがって本体の後方にある
//!   宣言を前方の束縛から参照できる。
//! - 型が本体から決まるメンバー（注釈のない val/var、結果型のない def）どうしの参照を記録し、
//!   循環があれば注釈を求めるエラーにする。合成された val は自分自身を参照できない。
//! - エラーは診断として記録して処理を続け、失敗した式には `TError` を割り当てる。

use std::collections::{HashMap, HashSet};

use crate::ast::{
    BinOp, DefDef, Expr, Import, ImportSelector, ObjectDef, Span, Stmt, TypeExpr, UnaryOp, ValDef,
};
use crate::errors::{Diagnostic, DiagnosticKind};
use crate::registry::{BindingKind, MemberSig, ModuleRegistry, ModuleSig};
use crate::typesys::*;

/// 型付けが完了した束縛。
#[derive(Clone, Debug, PartialEq)]
pub struct TypedBinding {
    pub name: String,
    pub kind: BindingKind,
    pub scheme: Scheme,
    pub synthetic: bool,
    pub span: Span,
    /// 元の宣言文（低レベル化で使う）。
    pub tree: Stmt,
}

impl TypedBinding {
    /// 表示用の型文字列。
    pub fn type_display(&self) -> String {
        pp_scheme(&self.scheme)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum TypedStmt {
    Binding(TypedBinding),
    /// 本体に直接置かれた式（代入など）。初期化時に評価される。
    Expr { expr: Expr, ty: Type },
    Import(Import),
}

/// 型付きコンテナ。
#[derive(Clone, Debug, PartialEq)]
pub struct TypedModule {
    pub name: String,
    pub body: Vec<TypedStmt>,
    pub span: Span,
}

impl TypedModule {
    pub fn members(&self) -> impl Iterator<Item = &TypedBinding> {
        self.body.iter().filter_map(|s| match s {
            TypedStmt::Binding(b) => Some(b),
            _ => None,
        })
    }

    pub fn binding(&self, name: &str) -> Option<&TypedBinding> {
        self.members().find(|b| b.name == name)
    }

    /// レジストリへ登録するためのシグネチャ。
    pub fn signature(&self) -> ModuleSig {
        ModuleSig {
            name: self.name.clone(),
            members: self
                .members()
                .map(|b| MemberSig {
                    name: b.name.clone(),
                    scheme: b.scheme.clone(),
                    kind: b.kind,
                    synthetic: b.synthetic,
                })
                .collect(),
        }
    }
}

#[derive(Clone, Debug)]
struct Entry {
    scheme: Scheme,
    kind: BindingKind,
}

#[derive(Clone, Debug, Default)]
struct Frame {
    names: HashMap<String, Entry>,
}

#[derive(Clone, Debug, Default)]
/// 型変数供給源と置換テーブルを束ねる推論ステート。
pub struct InferState {
    pub supply: TVarSupply,
    pub subst: Subst,
}

/// 型付け途中のメンバー（一般化は本体全体の型付け後に行う）。
struct Pending {
    index: usize,
    name: String,
    kind: BindingKind,
    ty: Type,
    synthetic: bool,
    span: Span,
    tree: Stmt,
}

enum Slot {
    Member(Pending),
    Expr(Expr, Type),
    Import(Import),
}

struct Typer<'a> {
    registry: &'a ModuleRegistry,
    state: InferState,
    frames: Vec<Frame>,
    /// 結果型注釈のない def の本体を型付け中なら、その名前と宣言フレーム。
    recursion_guard: Option<(String, usize)>,
    /// メンバーを仮宣言したフレーム。
    member_frame: Option<usize>,
    /// 右辺・本体を型付け中のメンバー名。
    current_member: Option<String>,
    /// 型が本体から決まるメンバー。
    inferred_members: HashSet<String>,
    /// メンバー間の参照（参照元, 参照先, 位置）。
    member_refs: Vec<(String, String, Span)>,
    diags: &'a mut Vec<Diagnostic>,
}

/// コンテナ 1 個を型付けする。診断は `diags` に追記される。
pub fn type_module(
    obj: &ObjectDef,
    root_imports: &[Import],
    registry: &ModuleRegistry,
    diags: &mut Vec<Diagnostic>,
) -> TypedModule {
    let mut typer = Typer {
        registry,
        state: InferState::default(),
        frames: Vec::new(),
        recursion_guard: None,
        member_frame: None,
        current_member: None,
        inferred_members: HashSet::new(),
        member_refs: Vec::new(),
        diags,
    };
    typer.type_object(obj, root_imports)
}

impl<'a> Typer<'a> {
    fn type_object(&mut self, obj: &ObjectDef, root_imports: &[Import]) -> TypedModule {
        for imp in root_imports {
            self.open_import(imp);
        }
        for stmt in &obj.body {
            if let Stmt::Import(imp) = stmt {
                self.open_import(imp);
            }
        }

        // メンバーの仮宣言
        self.frames.push(Frame::default());
        let member_frame = self.frames.len() - 1;
        self.member_frame = Some(member_frame);
        let mut declared: HashMap<String, Type> = HashMap::new();
        let mut duplicates: HashSet<usize> = HashSet::new();
        for (index, stmt) in obj.body.iter().enumerate() {
            let (name, kind, ty, inferred) = match stmt {
                Stmt::Val(v) => (
                    v.name.clone(),
                    val_kind(v),
                    self.declared_val_type(v),
                    v.ty.is_none(),
                ),
                Stmt::Def(d) => (
                    d.name.clone(),
                    BindingKind::Def,
                    self.declared_def_type(d),
                    d.ret.is_none(),
                ),
                _ => continue,
            };
            if declared.contains_key(&name) {
                self.error(
                    "TYP030",
                    format!("{} is already defined in {}", name, obj.name),
                    stmt.span(),
                );
                duplicates.insert(index);
                continue;
            }
            if inferred {
                self.inferred_members.insert(name.clone());
            }
            declared.insert(name.clone(), ty.clone());
            self.frames[member_frame].names.insert(
                name,
                Entry {
                    scheme: Scheme::mono(ty),
                    kind,
                },
            );
        }

        let mut slots = Vec::new();
        for (index, stmt) in obj.body.iter().enumerate() {
            match stmt {
                Stmt::Import(imp) => slots.push(Slot::Import(imp.clone())),
                Stmt::Val(v) => {
                    let found = self.type_val_rhs(v, member_frame);
                    if duplicates.contains(&index) {
                        continue;
                    }
                    let ty = declared.get(&v.name).cloned().unwrap_or(Type::TError);
                    self.unify_at(&ty, &found, v.rhs.span());
                    slots.push(Slot::Member(Pending {
                        index,
                        name: v.name.clone(),
                        kind: val_kind(v),
                        ty,
                        synthetic: v.mods.synthetic,
                        span: v.span,
                        tree: stmt.clone(),
                    }));
                }
                Stmt::Def(d) => {
                    let ty = declared.get(&d.name).cloned().unwrap_or(Type::TError);
                    self.current_member = Some(d.name.clone());
                    self.type_def_body(d, &ty, member_frame);
                    self.current_member = None;
                    if duplicates.contains(&index) {
                        continue;
                    }
                    slots.push(Slot::Member(Pending {
                        index,
                        name: d.name.clone(),
                        kind: BindingKind::Def,
                        ty,
                        synthetic: false,
                        span: d.span,
                        tree: stmt.clone(),
                    }));
                }
                Stmt::Expr(e) => {
                    let ty = self.infer(e);
                    slots.push(Slot::Expr(e.clone(), ty));
                }
                Stmt::Object(o) => self.error(
                    "TYP090",
                    format!("nested object {} is not supported", o.name),
                    o.span,
                ),
            }
        }
        self.report_member_cycles();

        let body = slots
            .into_iter()
            .map(|slot| match slot {
                Slot::Member(p) => TypedStmt::Binding(self.finish_member(p)),
                Slot::Expr(expr, ty) => TypedStmt::Expr {
                    ty: apply_subst_t(&self.state.subst, &ty),
                    expr,
                },
                Slot::Import(imp) => TypedStmt::Import(imp),
            })
            .collect();
        TypedModule {
            name: obj.name.clone(),
            body,
            span: obj.span,
        }
    }

    /// val の右辺を型付けする。合成された val の右辺からは自分自身が見えない。
    fn type_val_rhs(&mut self, v: &ValDef, member_frame: usize) -> Type {
        let hidden = if v.mods.synthetic {
            self.frames[member_frame]
                .names
                .remove(&v.name)
                .map(|entry| (v.name.clone(), entry))
        } else {
            None
        };
        self.current_member = Some(v.name.clone());
        let found = self.infer(&v.rhs);
        self.current_member = None;
        if let Some((name, entry)) = hidden {
            self.frames[member_frame].names.insert(name, entry);
        }
        found
    }

    /// 型が本体から決まるメンバーの参照が自分へ戻ってくるなら、そのメンバーを報告する。
    /// def の直接の自己再帰は TYP050 で扱うので除く。
    fn report_member_cycles(&mut self) {
        let mut edges: HashMap<&str, Vec<&str>> = HashMap::new();
        let mut first_ref: Vec<(&str, Span)> = Vec::new();
        for (from, to, span) in &self.member_refs {
            if from == to && !self.is_value_member(from) {
                continue;
            }
            edges.entry(from.as_str()).or_default().push(to.as_str());
            if !first_ref.iter().any(|(name, _)| *name == from.as_str()) {
                first_ref.push((from.as_str(), *span));
            }
        }
        let mut cyclic = Vec::new();
        for (name, span) in &first_ref {
            let mut seen: HashSet<&str> = HashSet::new();
            let mut stack: Vec<&str> = edges.get(name).cloned().unwrap_or_default();
            while let Some(next) = stack.pop() {
                if next == *name {
                    cyclic.push((name.to_string(), *span));
                    break;
                }
                if seen.insert(next) {
                    stack.extend(edges.get(next).into_iter().flatten().copied());
                }
            }
        }
        for (name, span) in cyclic {
            self.error(
                "TYP051",
                format!("recursive value {} needs a type annotation", name),
                span,
            );
        }
    }

    fn is_value_member(&self, name: &str) -> bool {
        self.member_frame
            .and_then(|f| self.frames[f].names.get(name))
            .map_or(false, |e| e.kind != BindingKind::Def)
    }

    fn finish_member(&mut self, p: Pending) -> TypedBinding {
        let ty = apply_subst_t(&self.state.subst, &p.ty);
        let scheme = if p.kind == BindingKind::Var {
            if !ftv(&ty).is_empty() {
                self.error(
                    "TYP060",
                    format!(
                        "cannot infer a concrete type for var {}; add a type annotation",
                        p.name
                    ),
                    p.span,
                );
            }
            Scheme::mono(ty)
        } else {
            generalize(&HashSet::new(), ty)
        };
        tracing::trace!(
            member = %p.name,
            index = p.index,
            ty = %pp_scheme(&scheme),
            "member typed"
        );
        TypedBinding {
            name: p.name,
            kind: p.kind,
            scheme,
            synthetic: p.synthetic,
            span: p.span,
            tree: p.tree,
        }
    }

    fn declared_val_type(&mut self, v: &ValDef) -> Type {
        match &v.ty {
            Some(t) => self.resolve_type(t),
            None => self.state.supply.fresh_type(),
        }
    }

    fn declared_def_type(&mut self, d: &DefDef) -> Type {
        let params = d.params.iter().map(|p| self.resolve_type(&p.ty)).collect();
        let ret = match &d.ret {
            Some(t) => self.resolve_type(t),
            None => self.state.supply.fresh_type(),
        };
        t_fun(params, ret)
    }

    /// def 本体を型付けし、仮宣言された関数型と照合する。
    fn type_def_body(&mut self, d: &DefDef, declared: &Type, decl_frame: usize) {
        let (param_tys, ret) = match declared {
            Type::TFun(TFun { params, ret }) => (params.clone(), (**ret).clone()),
            _ => (vec![Type::TError; d.params.len()], Type::TError),
        };
        let mut frame = Frame::default();
        for (p, ty) in d.params.iter().zip(param_tys) {
            frame.names.insert(
                p.name.clone(),
                Entry {
                    scheme: Scheme::mono(ty),
                    kind: BindingKind::Val,
                },
            );
        }
        self.frames.push(frame);
        let saved_guard = self.recursion_guard.take();
        if d.ret.is_none() {
            self.recursion_guard = Some((d.name.clone(), decl_frame));
        }
        let body_ty = self.infer(&d.body);
        self.recursion_guard = saved_guard;
        self.frames.pop();
        self.unify_at(&ret, &body_ty, d.body.span());
    }

    fn resolve_type(&mut self, t: &TypeExpr) -> Type {
        match t {
            TypeExpr::Named { name, span } => match name.as_str() {
                "Int" => t_int(),
                "Bool" => t_bool(),
                "String" => t_string(),
                "Unit" => t_unit(),
                _ => {
                    self.error(
                        "TYP031",
                        format!(
                            "not found: type {} (known types: {})",
                            name,
                            BASE_TYPES.join(", ")
                        ),
                        *span,
                    );
                    Type::TError
                }
            },
            TypeExpr::Fun { params, ret, .. } => {
                let ps = params.iter().map(|p| self.resolve_type(p)).collect();
                let r = self.resolve_type(ret);
                t_fun(ps, r)
            }
        }
    }

    /// import 1 件ぶんのフレームを積む。
    fn open_import(&mut self, imp: &Import) {
        let registry = self.registry;
        let Some(sig) = registry.get(&imp.module) else {
            self.error(
                "TYP020",
                format!("not found: module {} in import", imp.module),
                imp.span,
            );
            return;
        };
        let mut frame = Frame::default();
        match &imp.selector {
            ImportSelector::Wildcard => {
                for m in &sig.members {
                    frame.names.insert(m.name.clone(), entry_of(m));
                }
            }
            ImportSelector::Member(name) => match sig.member(name) {
                Some(m) => {
                    frame.names.insert(m.name.clone(), entry_of(m));
                }
                None => {
                    let message = format!("{} is not a member of {}", name, imp.module);
                    self.error("TYP012", message, imp.span);
                    return;
                }
            },
        }
        self.frames.push(frame);
    }

    /// 型が本体から決まるメンバーへの参照を記録する。
    fn note_member_ref(&mut self, name: &str, frame: usize, span: Span) {
        if self.member_frame != Some(frame) || !self.inferred_members.contains(name) {
            return;
        }
        if let Some(from) = &self.current_member {
            self.member_refs.push((from.clone(), name.to_string(), span));
        }
    }

    fn lookup(&self, name: &str) -> Option<(Entry, usize)> {
        self.frames
            .iter()
            .enumerate()
            .rev()
            .find_map(|(i, f)| f.names.get(name).map(|e| (e.clone(), i)))
    }

    fn infer(&mut self, e: &Expr) -> Type {
        match e {
            Expr::Int { .. } => t_int(),
            Expr::Bool { .. } => t_bool(),
            Expr::Str { .. } => t_string(),
            Expr::Unit { .. } => t_unit(),
            Expr::Ident { name, span } => match self.lookup(name) {
                Some((entry, frame)) => {
                    self.note_member_ref(name, frame, *span);
                    let recursive = matches!(
                        &self.recursion_guard,
                        Some((guarded, guard_frame)) if guarded == name && *guard_frame == frame
                    );
                    if recursive {
                        self.error(
                            "TYP050",
                            format!("recursive method {} needs a result type", name),
                            *span,
                        );
                    }
                    instantiate(&entry.scheme, &mut self.state.supply)
                }
                None => {
                    self.error("TYP010", format!("not found: value {}", name), *span);
                    Type::TError
                }
            },
            Expr::Select {
                module,
                member,
                span,
            } => {
                let registry = self.registry;
                let Some(sig) = registry.get(module) else {
                    self.error("TYP011", format!("not found: module {}", module), *span);
                    return Type::TError;
                };
                match sig.member(member) {
                    Some(m) => instantiate(&m.scheme, &mut self.state.supply),
                    None => {
                        let message = format!("{} is not a member of {}", member, module);
                        self.error("TYP012", message, *span);
                        Type::TError
                    }
                }
            }
            Expr::Unary { op, operand, .. } => {
                let t = self.infer(operand);
                let expected = match op {
                    UnaryOp::Neg => t_int(),
                    UnaryOp::Not => t_bool(),
                };
                self.unify_at(&expected, &t, operand.span());
                expected
            }
            Expr::Binary {
                op, left, right, ..
            } => self.infer_binary(*op, left, right),
            Expr::Call { func, args, span } => self.infer_call(func, args, *span),
            Expr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                let ct = self.infer(cond);
                self.unify_at(&t_bool(), &ct, cond.span());
                let tt = self.infer(then_branch);
                let et = self.infer(else_branch);
                self.unify_at(&tt, &et, else_branch.span());
                apply_subst_t(&self.state.subst, &tt)
            }
            Expr::Block { stmts, result, .. } => {
                let depth = self.frames.len();
                self.frames.push(Frame::default());
                for s in stmts {
                    self.type_local(s);
                }
                let t = match result {
                    Some(r) => self.infer(r),
                    None => t_unit(),
                };
                self.frames.truncate(depth);
                t
            }
            Expr::Assign {
                target,
                target_span,
                value,
                ..
            } => {
                let vt = self.infer(value);
                match self.lookup(target) {
                    Some((entry, _)) if entry.kind == BindingKind::Var => {
                        let t = instantiate(&entry.scheme, &mut self.state.supply);
                        self.unify_at(&t, &vt, value.span());
                    }
                    Some((entry, _)) => self.error(
                        "TYP040",
                        format!("reassignment to {} {}", entry.kind, target),
                        *target_span,
                    ),
                    None => {
                        self.error("TYP010", format!("not found: value {}", target), *target_span)
                    }
                }
                t_unit()
            }
        }
    }

    fn infer_binary(&mut self, op: BinOp, left: &Expr, right: &Expr) -> Type {
        let lt = self.infer(left);
        let rt = self.infer(right);
        let (operand, result) = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => (t_int(), t_int()),
            BinOp::Concat => (t_string(), t_string()),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => (t_int(), t_bool()),
            BinOp::And | BinOp::Or => (t_bool(), t_bool()),
            BinOp::Eq | BinOp::Ne => {
                self.unify_at(&lt, &rt, right.span());
                return t_bool();
            }
        };
        self.unify_at(&operand, &lt, left.span());
        self.unify_at(&operand, &rt, right.span());
        result
    }

    fn infer_call(&mut self, func: &Expr, args: &[Expr], span: Span) -> Type {
        let ft = self.infer(func);
        let arg_tys: Vec<Type> = args.iter().map(|a| self.infer(a)).collect();
        match apply_subst_t(&self.state.subst, &ft) {
            Type::TFun(TFun { params, ret }) => {
                if params.len() != args.len() {
                    self.error(
                        "TYP021",
                        format!(
                            "wrong number of arguments for {}: expected {}, found {}",
                            func,
                            params.len(),
                            args.len()
                        ),
                        span,
                    );
                    return Type::TError;
                }
                for ((p, a), arg) in params.iter().zip(arg_tys.iter()).zip(args) {
                    self.unify_at(p, a, arg.span());
                }
                apply_subst_t(&self.state.subst, &ret)
            }
            Type::TVar(_) => {
                let ret = self.state.supply.fresh_type();
                let expected = t_fun(arg_tys, ret.clone());
                self.unify_at(&ft, &expected, func.span());
                apply_subst_t(&self.state.subst, &ret)
            }
            Type::TError => Type::TError,
            other => {
                self.error(
                    "TYP022",
                    format!("{} of type {} does not take parameters", func, pp_type(&other)),
                    func.span(),
                );
                Type::TError
            }
        }
    }

    /// ブロック内の文を型付けし、宣言を現在のフレームへ追加する。
    fn type_local(&mut self, s: &Stmt) {
        match s {
            Stmt::Val(v) => {
                let found = self.infer(&v.rhs);
                let ty = match &v.ty {
                    Some(t) => {
                        let annotated = self.resolve_type(t);
                        self.unify_at(&annotated, &found, v.rhs.span());
                        annotated
                    }
                    None => found,
                };
                let ty = apply_subst_t(&self.state.subst, &ty);
                self.declare_local(&v.name, ty, val_kind(v), v.span);
            }
            Stmt::Def(d) => {
                let ty = self.declared_def_type(d);
                self.declare_local(&d.name, ty.clone(), BindingKind::Def, d.span);
                let frame = self.frames.len() - 1;
                self.type_def_body(d, &ty, frame);
            }
            Stmt::Import(imp) => self.open_import(imp),
            Stmt::Expr(e) => {
                self.infer(e);
            }
            Stmt::Object(o) => self.error(
                "TYP090",
                format!("nested object {} is not supported", o.name),
                o.span,
            ),
        }
    }

    fn declare_local(&mut self, name: &str, ty: Type, kind: BindingKind, span: Span) {
        let duplicate = self
            .frames
            .last()
            .map_or(false, |f| f.names.contains_key(name));
        if duplicate {
            self.error(
                "TYP030",
                format!("{} is already defined in this block", name),
                span,
            );
            return;
        }
        let Some(frame) = self.frames.last_mut() else {
            return;
        };
        frame.names.insert(
            name.to_string(),
            Entry {
                scheme: Scheme::mono(ty),
                kind,
            },
        );
    }

    /// `expected` と `found` を単一化し、失敗したら `span` で診断を出す。
    fn unify_at(&mut self, expected: &Type, found: &Type, span: Span) {
        let e = apply_subst_t(&self.state.subst, expected);
        let f = apply_subst_t(&self.state.subst, found);
        match unify(e.clone(), f.clone()) {
            Ok(s) => self.state.subst = compose(&s, &self.state.subst),
            Err(err) if err.code == "TYP001" => {
                let shown = pp_types(&[&e, &f]);
                self.error(
                    "TYP001",
                    format!("type mismatch: expected {}, found {}", shown[0], shown[1]),
                    span,
                );
            }
            Err(err) => self.error(err.code, err.message, span),
        }
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diags.push(Diagnostic::error(
            DiagnosticKind::TypeCheck,
            code,
            message,
            span,
        ));
    }
}

fn val_kind(v: &ValDef) -> BindingKind {
    if v.mutable {
        BindingKind::Var
    } else {
        BindingKind::Val
    }
}

fn entry_of(m: &MemberSig) -> Entry {
    Entry {
        scheme: m.scheme.clone(),
        kind: m.kind,
    }
}

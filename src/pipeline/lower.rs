// パス: src/pipeline/lower.rs
// 役割: 型付きモジュールをスタックマシン IR（src/ir.rs）へ変換する
// 意図: コード生成段階が成果物として書き出せる、ターゲット非依存の表現を作る
// 関連ファイル: src/ir.rs, src/infer.rs, src/pipeline/codegen.rs
//! 低レベル化
//!
//! 名前の解決順は型付けと同じく「局所 → 自モジュールのメンバー → import」。
//! 局所は `LoadLocal`、メンバーは `LoadField`、それ以外は `LoadName` になる。

use std::collections::HashSet;

use super::{CompilationUnit, Context, Phase, PhaseId};
use crate::ast::{BinOp, DefDef, Expr, Import, Stmt};
use crate::errors::{Diagnostic, DiagnosticKind};
use crate::infer::{TypedModule, TypedStmt};
use crate::ir::{FieldIr, Instr, MethodIr, ModuleIr};

pub struct Lower;

impl Phase for Lower {
    fn id(&self) -> PhaseId {
        PhaseId::Lower
    }

    fn name(&self) -> &'static str {
        "lower"
    }

    fn run(&self, unit: &mut CompilationUnit, ctx: &mut Context) {
        match &unit.typed {
            Some(typed) => unit.ir = Some(lower_module(typed, ctx.root_imports())),
            None => ctx.diagnostics_mut().report(Diagnostic::error(
                DiagnosticKind::Codegen,
                "GEN010",
                format!("unit {} has no typed tree to lower", unit.name),
                Default::default(),
            )),
        }
    }
}

/// 型付きモジュール 1 個を IR にする。
pub fn lower_module(module: &TypedModule, root_imports: &[Import]) -> ModuleIr {
    let members: HashSet<&str> = module.members().map(|b| b.name.as_str()).collect();
    let mut imports: Vec<String> = root_imports.iter().map(|i| i.to_string()).collect();
    let mut fields = Vec::new();
    let mut methods = Vec::new();
    let mut init = Lowerer::new(&module.name, &members, Vec::new());

    for stmt in &module.body {
        match stmt {
            TypedStmt::Import(i) => imports.push(i.to_string()),
            TypedStmt::Expr { expr, .. } => {
                init.expr(expr);
                init.emit(Instr::Pop);
            }
            TypedStmt::Binding(b) => match &b.tree {
                Stmt::Val(v) => {
                    fields.push(FieldIr {
                        name: b.name.clone(),
                        kind: b.kind,
                        ty: b.type_display(),
                        synthetic: b.synthetic,
                    });
                    init.expr(&v.rhs);
                    init.emit(Instr::StoreField {
                        module: module.name.clone(),
                        name: b.name.clone(),
                    });
                }
                Stmt::Def(d) => methods.push(init.method(d)),
                Stmt::Expr(_) | Stmt::Import(_) | Stmt::Object(_) => {}
            },
        }
    }

    ModuleIr {
        name: module.name.clone(),
        imports,
        fields,
        methods,
        init: init.finish(),
    }
}

struct Lowerer<'a> {
    module: &'a str,
    members: &'a HashSet<&'a str>,
    scopes: Vec<HashSet<String>>,
    code: Vec<Instr>,
}

impl<'a> Lowerer<'a> {
    fn new(module: &'a str, members: &'a HashSet<&'a str>, scopes: Vec<HashSet<String>>) -> Self {
        Self {
            module,
            members,
            scopes,
            code: Vec::new(),
        }
    }

    fn finish(self) -> Vec<Instr> {
        self.code
    }

    fn emit(&mut self, instr: Instr) -> usize {
        self.code.push(instr);
        self.code.len() - 1
    }

    /// ジャンプ先を現在位置に書き換える。
    fn patch(&mut self, at: usize) {
        let here = self.code.len();
        if let Some(Instr::Jump { target } | Instr::JumpIfFalse { target }) = self.code.get_mut(at)
        {
            *target = here;
        }
    }

    fn is_local(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|s| s.contains(name))
    }

    fn declare(&mut self, name: &str) {
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn load(&mut self, name: &str) {
        let instr = if self.is_local(name) {
            Instr::LoadLocal { name: name.into() }
        } else if self.members.contains(name) {
            Instr::LoadField {
                module: self.module.into(),
                name: name.into(),
            }
        } else {
            Instr::LoadName { name: name.into() }
        };
        self.emit(instr);
    }

    fn store(&mut self, name: &str) {
        let instr = if self.is_local(name) {
            Instr::StoreLocal { name: name.into() }
        } else if self.members.contains(name) {
            Instr::StoreField {
                module: self.module.into(),
                name: name.into(),
            }
        } else {
            Instr::StoreName { name: name.into() }
        };
        self.emit(instr);
    }

    /// def 本体を別のコード列へ。外側の局所はそのまま見える（捕捉）。
    fn method(&self, d: &DefDef) -> MethodIr {
        let mut scopes = self.scopes.clone();
        scopes.push(d.params.iter().map(|p| p.name.clone()).collect());
        let mut inner = Lowerer::new(self.module, self.members, scopes);
        inner.expr(&d.body);
        MethodIr {
            name: d.name.clone(),
            params: d.params.iter().map(|p| p.name.clone()).collect(),
            code: inner.finish(),
        }
    }

    fn expr(&mut self, e: &Expr) {
        match e {
            Expr::Int { value, .. } => {
                self.emit(Instr::PushInt { value: *value });
            }
            Expr::Bool { value, .. } => {
                self.emit(Instr::PushBool { value: *value });
            }
            Expr::Str { value, .. } => {
                self.emit(Instr::PushStr {
                    value: value.clone(),
                });
            }
            Expr::Unit { .. } => {
                self.emit(Instr::PushUnit);
            }
            Expr::Ident { name, .. } => self.load(name),
            Expr::Select { module, member, .. } => {
                self.emit(Instr::LoadQualified {
                    module: module.clone(),
                    name: member.clone(),
                });
            }
            Expr::Unary { op, operand, .. } => {
                self.expr(operand);
                self.emit(Instr::Unary {
                    op: op.symbol().into(),
                });
            }
            // 短絡評価
            Expr::Binary {
                op: BinOp::And,
                left,
                right,
                ..
            } => {
                self.expr(left);
                let to_false = self.emit(Instr::JumpIfFalse { target: 0 });
                self.expr(right);
                let to_end = self.emit(Instr::Jump { target: 0 });
                self.patch(to_false);
                self.emit(Instr::PushBool { value: false });
                self.patch(to_end);
            }
            Expr::Binary {
                op: BinOp::Or,
                left,
                right,
                ..
            } => {
                self.expr(left);
                let to_rhs = self.emit(Instr::JumpIfFalse { target: 0 });
                self.emit(Instr::PushBool { value: true });
                let to_end = self.emit(Instr::Jump { target: 0 });
                self.patch(to_rhs);
                self.expr(right);
                self.patch(to_end);
            }
            Expr::Binary {
                op, left, right, ..
            } => {
                self.expr(left);
                self.expr(right);
                self.emit(Instr::Binary {
                    op: op.symbol().into(),
                });
            }
            Expr::Call { func, args, .. } => {
                self.expr(func);
                for a in args {
                    self.expr(a);
                }
                self.emit(Instr::Call { argc: args.len() });
            }
            Expr::If {
                cond,
                then_branch,
                else_branch,
                ..
            } => {
                self.expr(cond);
                let to_else = self.emit(Instr::JumpIfFalse { target: 0 });
                self.expr(then_branch);
                let to_end = self.emit(Instr::Jump { target: 0 });
                self.patch(to_else);
                self.expr(else_branch);
                self.patch(to_end);
            }
            Expr::Block { stmts, result, .. } => {
                self.scopes.push(HashSet::new());
                for s in stmts {
                    self.block_stmt(s);
                }
                match result {
                    Some(r) => self.expr(r),
                    None => {
                        self.emit(Instr::PushUnit);
                    }
                }
                self.scopes.pop();
            }
            Expr::Assign { target, value, .. } => {
                self.expr(value);
                self.store(target);
                self.emit(Instr::PushUnit);
            }
        }
    }

    fn block_stmt(&mut self, s: &Stmt) {
        match s {
            Stmt::Expr(e) => {
                self.expr(e);
                self.emit(Instr::Pop);
            }
            Stmt::Val(v) => {
                self.expr(&v.rhs);
                self.declare(&v.name);
                self.emit(Instr::StoreLocal {
                    name: v.name.clone(),
                });
            }
            Stmt::Def(d) => {
                self.declare(&d.name);
                let method = self.method(d);
                self.emit(Instr::Closure { method });
                self.emit(Instr::StoreLocal {
                    name: d.name.clone(),
                });
            }
            // ブロック内 import は型付け時に解決済み
            Stmt::Import(_) | Stmt::Object(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Modifiers, ObjectDef, Span};
    use crate::parser::parse_source;
    use crate::pipeline::frontend::type_object;

    fn lower(src: &str) -> ModuleIr {
        let tree = ObjectDef {
            name: "M".into(),
            body: parse_source(src).into_result().unwrap(),
            span: Span::new(0, src.len()),
            mods: Modifiers::default(),
        };
        let mut ctx = Context::default().with_root_imports(vec![Import::wildcard("ReplShow")]);
        let typed = type_object(&tree, &mut ctx);
        assert!(!ctx.diagnostics().has_errors(), "{:?}", ctx.diagnostics());
        lower_module(&typed, ctx.root_imports())
    }

    #[test]
    /// メンバーはフィールド参照、局所は局所参照、それ以外は名前参照になる。
    fn resolves_names_by_scope() {
        let ir = lower("val a = 1\nval b = { val c = a; c + length(render(c)) }\nimport Strings._");
        assert_eq!(ir.imports, vec!["import ReplShow._", "import Strings._"]);
        assert_eq!(ir.fields.len(), 2);
        assert!(ir.init.contains(&Instr::LoadField {
            module: "M".into(),
            name: "a".into()
        }));
        assert!(ir.init.contains(&Instr::LoadLocal { name: "c".into() }));
        assert!(ir.init.contains(&Instr::LoadName {
            name: "render".into()
        }));
    }

    #[test]
    fn if_expression_patches_jumps() {
        let ir = lower("val a = if (true) 1 else 2");
        assert_eq!(
            ir.init,
            vec![
                Instr::PushBool { value: true },
                Instr::JumpIfFalse { target: 4 },
                Instr::PushInt { value: 1 },
                Instr::Jump { target: 5 },
                Instr::PushInt { value: 2 },
                Instr::StoreField {
                    module: "M".into(),
                    name: "a".into()
                },
            ]
        );
    }

    #[test]
    /// def はメソッドになり、引数は局所として参照される。
    fn defs_become_methods() {
        let ir = lower("def twice(x: Int): Int = x * 2");
        assert_eq!(ir.methods.len(), 1);
        let m = &ir.methods[0];
        assert_eq!(m.params, vec!["x"]);
        assert_eq!(m.code[0], Instr::LoadLocal { name: "x".into() });
        assert!(ir.fields.is_empty());
    }
}

//! Typed lowering from the source AST to the vernacular target.
//!
//! The translator walks a resolved, type-checked [`Package`] bottom-up and
//! builds target declarations. It consults the static type of every base
//! expression to decide between value and pointer forms, reorders composite
//! literal fields to declaration order, threads an explicit accumulator
//! through loops, and rewrites calls into the recognized primitive packages
//! to their `FS.*`/`Data.*`/`Globals.*` counterparts.
//!
//! Nothing here aborts on the first problem: constructs outside the
//! translatable subset append a positioned diagnostic to the sink and the
//! walk continues, so one run reports every issue. A translation with a
//! non-empty sink fails as a whole and its partial output is discarded.

use std::collections::BTreeMap;

use heron_ast as ast;
use heron_ast::{
    BinOp, CallTarget, DeclKind, ExprKind, ForStmt, IdentKind, Lit, Pos, StmtKind, UnaryOp,
};
use heron_diag::{DiagSink, Diagnostic, SourceLocation, TranslationError};
use heron_vernac as vernac;
use heron_vernac::{
    Binding, BlockExpr, Expr, FieldAccessExpr, FieldDecl, File, ForLoopExpr, IfExpr, MapIterExpr,
    StoreExpr, StructLiteral, struct_method,
};

/// Translation options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Config {
    /// Prefix each declaration's comment with its source `file:line` origin.
    pub add_source_comments: bool,
    /// Emit a typing theorem after each function definition.
    pub add_types: bool,
}

/// Translate a whole package.
///
/// Returns the assembled output file, or every diagnostic the walk produced,
/// in source-position order.
pub fn translate_package(pkg: &ast::Package, config: &Config) -> Result<File, TranslationError> {
    let mut translator = Translator::new(pkg, config);
    let decls = translator.translate_decls();
    if translator.sink.is_empty() {
        Ok(File {
            package: pkg.path.clone(),
            decls,
        })
    } else {
        Err(TranslationError::from_sink(translator.sink))
    }
}

/// What the fall-through end of a statement list must evaluate to.
#[derive(Debug, Clone, PartialEq)]
enum Terminator {
    /// The unit value: function bodies, nested blocks, branch bodies.
    Unit,
    /// Re-enter the enclosing loop carrying its accumulator.
    ContinueLoop(Option<String>),
}

impl Terminator {
    fn terminal_expr(&self) -> Expr {
        match self {
            Terminator::Unit => Expr::Unit,
            Terminator::ContinueLoop(acc) => Expr::loop_continue(acc_value(acc)),
        }
    }
}

/// The accumulator value of a loop frame: the induction variable, or unit
/// for loops without one.
fn acc_value(acc: &Option<String>) -> Expr {
    match acc {
        Some(name) => Expr::var(name.clone()),
        None => Expr::Unit,
    }
}

/// An enclosing iteration construct, for resolving `break`/`continue`.
#[derive(Debug, Clone, PartialEq)]
enum LoopFrame {
    /// A lowered loop with the given accumulator.
    Loop(Option<String>),
    /// A map iteration, whose body admits neither `break` nor `continue`.
    MapIter,
}

struct Translator<'a> {
    pkg: &'a ast::Package,
    config: &'a Config,
    /// Struct name to its fields, in declaration order.
    structs: BTreeMap<String, Vec<ast::Field>>,
    /// Alias name to its underlying type.
    aliases: BTreeMap<String, ast::Type>,
    /// Declared results of the function being translated, for bare returns.
    results: Vec<ast::ResultParam>,
    /// Innermost-last stack of enclosing loops.
    loops: Vec<LoopFrame>,
    sink: DiagSink,
}

impl<'a> Translator<'a> {
    fn new(pkg: &'a ast::Package, config: &'a Config) -> Self {
        let mut structs = BTreeMap::new();
        let mut aliases = BTreeMap::new();
        for decl in &pkg.decls {
            match &decl.kind {
                DeclKind::Struct(s) => {
                    structs.insert(s.name.clone(), s.fields.clone());
                }
                DeclKind::Alias(a) => {
                    aliases.insert(a.name.clone(), a.ty.clone());
                }
                _ => {}
            }
        }
        Self {
            pkg,
            config,
            structs,
            aliases,
            results: Vec::new(),
            loops: Vec::new(),
            sink: DiagSink::new(),
        }
    }

    fn loc(&self, pos: Pos) -> SourceLocation {
        SourceLocation::new(pos.file.0, pos.line, pos.column)
    }

    fn unsupported(&mut self, pos: Pos, message: impl Into<String>) {
        self.sink
            .push(Diagnostic::unsupported(message).at(self.loc(pos)));
    }

    fn expected(&mut self, pos: Pos, message: impl Into<String>) {
        self.sink
            .push(Diagnostic::expected(message).at(self.loc(pos)));
    }

    fn todo(&mut self, pos: Pos, message: impl Into<String>) {
        self.sink.push(Diagnostic::todo(message).at(self.loc(pos)));
    }

    fn invalid(&mut self, pos: Pos, message: impl Into<String>) {
        self.sink
            .push(Diagnostic::invalid(message).at(self.loc(pos)));
    }

    /// Resolve aliases down to the defining type. Struct names resolve to
    /// themselves.
    fn underlying<'t>(&'t self, ty: &'t ast::Type) -> &'t ast::Type {
        let mut ty = ty;
        while let ast::Type::Named(name) = ty {
            match self.aliases.get(name) {
                Some(next) => ty = next,
                None => break,
            }
        }
        ty
    }

    fn is_struct(&self, name: &str) -> bool {
        self.structs.contains_key(name)
    }

    /// The struct name behind a base expression's type, with the
    /// through-pointer flag, when there is one.
    fn struct_base(&self, ty: &ast::Type) -> Option<(String, bool)> {
        match ty {
            ast::Type::Named(name) if self.is_struct(name) => Some((name.clone(), false)),
            ast::Type::Pointer(inner) => match inner.as_ref() {
                ast::Type::Named(name) if self.is_struct(name) => Some((name.clone(), true)),
                _ => None,
            },
            _ => None,
        }
    }

    // -----------------------------------------------------------------------
    // Types
    // -----------------------------------------------------------------------

    fn translate_type(&mut self, ty: &ast::Type, pos: Pos) -> vernac::Type {
        match ty {
            ast::Type::Bool => vernac::Type::ident("bool"),
            ast::Type::String => vernac::Type::ident("string"),
            ast::Type::Byte => vernac::Type::ident("byte"),
            ast::Type::Uint32 => vernac::Type::ident("uint32"),
            ast::Type::Uint64 => vernac::Type::ident("uint64"),
            ast::Type::Named(name) => {
                if self.is_struct(name) {
                    vernac::Type::Struct(name.clone())
                } else {
                    vernac::Type::Ident(name.clone())
                }
            }
            ast::Type::Pointer(inner) => match inner.as_ref() {
                // A pointer to a struct is the struct's own heap reference;
                // the struct module defines its pointer type.
                ast::Type::Named(name) if self.is_struct(name) => {
                    vernac::Type::Ident(format!("{name}.Ptr"))
                }
                other => vernac::Type::Ptr(Box::new(self.translate_type(other, pos))),
            },
            ast::Type::Slice(elem) => {
                vernac::Type::Slice(Box::new(self.translate_type(elem, pos)))
            }
            ast::Type::Map(key, value) => {
                if self.underlying(key) != &ast::Type::Uint64 {
                    self.expected(pos, "maps must have uint64 keys");
                }
                vernac::Type::Map(Box::new(self.translate_type(value, pos)))
            }
            ast::Type::Tuple(types) => {
                let types = types.iter().map(|t| self.translate_type(t, pos)).collect();
                vernac::Type::tuple(types)
            }
            ast::Type::Func => {
                self.unsupported(pos, "function types are only supported as direct call targets");
                vernac::Type::unit()
            }
            ast::Type::Interface => {
                self.unsupported(pos, "interface types are not translatable");
                vernac::Type::unit()
            }
            ast::Type::Chan => {
                self.unsupported(pos, "channel types are not translatable");
                vernac::Type::unit()
            }
        }
    }

    /// The explicit zero value of a type, for composite-literal fill-ins.
    fn zero_value(&mut self, ty: &ast::Type, pos: Pos) -> Expr {
        match self.underlying(ty).clone() {
            ast::Type::Bool => Expr::Bool(false),
            ast::Type::String => Expr::Str(String::new()),
            ast::Type::Byte | ast::Type::Uint64 => Expr::Int(0),
            ast::Type::Uint32 => Expr::Int32(0),
            ast::Type::Slice(_) => Expr::gallina("slice.nil"),
            ast::Type::Named(name) if self.is_struct(&name) => {
                Expr::gallina(format!("{name}.zero"))
            }
            other => {
                self.todo(pos, format!("zero value for {other:?}"));
                Expr::Unit
            }
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn translate_expr(&mut self, expr: &ast::Expr) -> Expr {
        let pos = expr.pos;
        match &expr.kind {
            ExprKind::Lit(lit) => self.translate_lit(lit, &expr.ty),
            ExprKind::Ident(ident) => self.translate_ident(ident, pos),
            ExprKind::Call(call) => self.translate_call(call, pos),
            ExprKind::Conversion { to, arg } => self.translate_conversion(to, arg, pos),
            ExprKind::New(ty) => {
                let zero = self.zero_value(ty, pos);
                Expr::Ref(Box::new(zero))
            }
            ExprKind::Make { ty, len } => self.translate_make(ty, len.as_deref(), pos),
            ExprKind::Len(base) => {
                if !matches!(self.underlying(&base.ty), ast::Type::Slice(_)) {
                    self.unsupported(pos, "len is only supported on slices");
                }
                let base = self.translate_expr(base);
                Expr::call("slice.length", vec![base])
            }
            ExprKind::Append { slice, arg, spread } => {
                let slice = self.translate_expr(slice);
                let arg = self.translate_expr(arg);
                if *spread {
                    Expr::call("Data.sliceAppendSlice", vec![slice, arg])
                } else {
                    Expr::call("Data.sliceAppend", vec![slice, arg])
                }
            }
            ExprKind::Deref(base) => {
                let base = self.translate_expr(base);
                Expr::Deref(Box::new(base))
            }
            ExprKind::AddrOf(inner) => match &inner.kind {
                ExprKind::Composite(lit) => self.translate_composite(lit, pos, true),
                _ => {
                    self.unsupported(pos, "address-of is only supported on composite literals");
                    Expr::Unit
                }
            },
            ExprKind::FieldAccess { base, field } => self.translate_field_access(base, field, pos),
            ExprKind::Index { base, index } => {
                let container = self.underlying(&base.ty).clone();
                let base = self.translate_expr(base);
                let index = self.translate_expr(index);
                match container {
                    ast::Type::Map(_, _) => Expr::call("Data.mapGet", vec![base, index]),
                    ast::Type::Slice(_) => Expr::call("Data.sliceRead", vec![base, index]),
                    _ => {
                        self.unsupported(pos, "indexing is only supported on maps and slices");
                        Expr::Unit
                    }
                }
            }
            ExprKind::SliceExpr { base, low, high } => {
                let base = self.translate_expr(base);
                match (low, high) {
                    (Some(low), Some(high)) => {
                        let low = self.translate_expr(low);
                        let high = self.translate_expr(high);
                        Expr::call("slice.subslice", vec![low, high, base])
                    }
                    (Some(low), None) => {
                        let low = self.translate_expr(low);
                        Expr::call("slice.skip", vec![low, base])
                    }
                    (None, Some(high)) => {
                        let high = self.translate_expr(high);
                        Expr::call("slice.take", vec![high, base])
                    }
                    (None, None) => base,
                }
            }
            ExprKind::Composite(lit) => self.translate_composite(lit, pos, false),
            ExprKind::Unary { op, operand } => {
                let UnaryOp::Not = op;
                let operand = self.translate_expr(operand);
                Expr::Not(Box::new(operand))
            }
            ExprKind::Binary { op, left, right } => self.translate_binary(*op, left, right),
        }
    }

    fn translate_lit(&mut self, lit: &Lit, ty: &ast::Type) -> Expr {
        match lit {
            Lit::Int(n) => match self.underlying(ty) {
                ast::Type::Uint32 => Expr::Int32(*n as u32),
                _ => Expr::Int(*n),
            },
            Lit::Str(s) => Expr::Str(s.clone()),
            Lit::Bool(b) => Expr::Bool(*b),
        }
    }

    fn translate_ident(&mut self, ident: &ast::Ident, pos: Pos) -> Expr {
        match ident.kind {
            IdentKind::Local | IdentKind::Param => Expr::var(ident.name.clone()),
            IdentKind::Func | IdentKind::Const => Expr::gallina(ident.name.clone()),
            IdentKind::TypeName | IdentKind::Package => {
                self.invalid(pos, format!("`{}` used as a value", ident.name));
                Expr::Unit
            }
        }
    }

    /// Target names of the calls into the recognized primitive packages.
    fn rewrite_package_call(&mut self, package: &str, name: &str, pos: Pos) -> Option<String> {
        let target = match (package, name) {
            ("filesys", "Open") => "FS.open",
            ("filesys", "Create") => "FS.create",
            ("filesys", "Close") => "FS.close",
            ("filesys", "ReadAt") => "FS.readAt",
            ("filesys", "Append") => "FS.append",
            ("filesys", "List") => "FS.list",
            ("filesys", "Delete") => "FS.delete",
            ("filesys", "Link") => "FS.link",
            ("filesys", "AtomicCreate") => "FS.atomicCreate",
            ("machine", "NewPtr") => "Data.newPtr",
            ("machine", "ReadPtr") => "Data.readPtr",
            ("machine", "WritePtr") => "Data.writePtr",
            ("machine", "UInt64Get") => "Data.uint64Get",
            ("machine", "UInt64Put") => "Data.uint64Put",
            ("machine", "RandomUint64") => "Data.randomUint64",
            ("machine", "NewLock") => "Data.newLock",
            ("machine", "LockAcquire") => "Data.lockAcquire",
            ("machine", "LockRelease") => "Data.lockRelease",
            ("globals", "GetX") => "Globals.getX",
            ("globals", "SetX") => "Globals.setX",
            _ => {
                self.unsupported(pos, format!("call to unrecognized import {package}.{name}"));
                return None;
            }
        };
        Some(target.to_string())
    }

    /// Constants of the recognized primitive packages (lock modes).
    fn rewrite_package_const(&mut self, package: &str, name: &str, pos: Pos) -> Expr {
        match (package, name) {
            ("machine", "Reader") => Expr::gallina("Reader"),
            ("machine", "Writer") => Expr::gallina("Writer"),
            _ => {
                self.unsupported(
                    pos,
                    format!("reference to unrecognized import {package}.{name}"),
                );
                Expr::Unit
            }
        }
    }

    fn translate_call(&mut self, call: &ast::CallExpr, pos: Pos) -> Expr {
        if call.variadic {
            self.unsupported(pos, "variadic calls are not translatable");
            return Expr::Unit;
        }
        let args: Vec<Expr> = call.args.iter().map(|a| self.translate_expr(a)).collect();
        match &call.target {
            CallTarget::Func(name) => Expr::call(name.clone(), args),
            CallTarget::Package { package, name } => {
                match self.rewrite_package_call(package, name, pos) {
                    Some(method) => Expr::call(method, args),
                    None => Expr::Unit,
                }
            }
            CallTarget::Method { recv, name } => match self.struct_base(&recv.ty) {
                Some((struct_name, true)) => {
                    let mut all_args = vec![self.translate_expr(recv)];
                    all_args.extend(args);
                    Expr::call(struct_method(&struct_name, name), all_args)
                }
                _ => {
                    self.unsupported(
                        pos,
                        "methods are only supported on pointer-to-struct receivers",
                    );
                    Expr::Unit
                }
            },
        }
    }

    fn translate_conversion(&mut self, to: &ast::Type, arg: &ast::Expr, pos: Pos) -> Expr {
        let from = self.underlying(&arg.ty).clone();
        let to = self.underlying(to).clone();
        let arg = self.translate_expr(arg);
        if from == to {
            return arg;
        }
        let ints = [ast::Type::Byte, ast::Type::Uint32, ast::Type::Uint64];
        if !ints.contains(&from) || !ints.contains(&to) {
            self.unsupported(pos, "only conversions between integer types are supported");
            return Expr::Unit;
        }
        let method = match to {
            ast::Type::Byte => "to_byte",
            ast::Type::Uint32 => "to_u32",
            _ => "to_u64",
        };
        Expr::call(method, vec![arg])
    }

    fn translate_make(&mut self, ty: &ast::Type, len: Option<&ast::Expr>, pos: Pos) -> Expr {
        match self.underlying(ty).clone() {
            ast::Type::Map(key, value) => {
                if self.underlying(&key) != &ast::Type::Uint64 {
                    self.expected(pos, "maps must have uint64 keys");
                }
                let value = self.translate_type(&value, pos);
                Expr::call("Data.newMap", vec![Expr::gallina(value.render())])
            }
            ast::Type::Slice(elem) => {
                let elem = self.translate_type(&elem, pos);
                let len = match len {
                    Some(len) => self.translate_expr(len),
                    None => Expr::Int(0),
                };
                Expr::call("Data.newSlice", vec![Expr::gallina(elem.render()), len])
            }
            _ => {
                self.unsupported(pos, "make is only supported for maps and slices");
                Expr::Unit
            }
        }
    }

    fn translate_field_access(&mut self, base: &ast::Expr, field: &str, pos: Pos) -> Expr {
        // A package-qualified name parses as a field access whose base is the
        // package identifier.
        if let ExprKind::Ident(ident) = &base.kind
            && ident.kind == IdentKind::Package
        {
            let package = ident.name.clone();
            return self.rewrite_package_const(&package, field, pos);
        }
        match self.struct_base(&base.ty) {
            Some((struct_name, through_pointer)) => {
                let base = self.translate_expr(base);
                Expr::FieldAccess(FieldAccessExpr {
                    struct_name,
                    field: field.to_string(),
                    base: Box::new(base),
                    through_pointer,
                })
            }
            None => {
                self.invalid(pos, format!("field access `{field}` on a non-struct value"));
                Expr::Unit
            }
        }
    }

    fn translate_composite(
        &mut self,
        lit: &ast::CompositeLit,
        pos: Pos,
        allocation: bool,
    ) -> Expr {
        let Some(decl_fields) = self.structs.get(&lit.name).cloned() else {
            self.invalid(pos, format!("composite literal of unknown struct `{}`", lit.name));
            return Expr::Unit;
        };
        for (name, _) in &lit.fields {
            if !decl_fields
                .iter()
                .any(|f| f.name.as_deref() == Some(name.as_str()))
            {
                self.invalid(
                    pos,
                    format!("`{}` has no field `{name}`", lit.name),
                );
            }
        }
        let mut out = StructLiteral::new(lit.name.clone());
        out.allocation = allocation;
        // Emit in declaration order regardless of the order written, filling
        // omitted fields with explicit zero values.
        for field in &decl_fields {
            let Some(field_name) = field.name.as_deref() else {
                continue;
            };
            match lit.fields.iter().find(|(name, _)| name == field_name) {
                Some((_, value)) => {
                    let value = self.translate_expr(value);
                    out.add_field(field_name, value);
                }
                None => {
                    let zero = self.zero_value(&field.ty, pos);
                    out.add_field(field_name, zero);
                }
            }
        }
        Expr::StructLiteral(out)
    }

    fn translate_binary(&mut self, op: BinOp, left: &ast::Expr, right: &ast::Expr) -> Expr {
        let string_operands = self.underlying(&left.ty) == &ast::Type::String;
        let left = self.translate_expr(left);
        let right = self.translate_expr(right);
        let op = match op {
            BinOp::Add if string_operands => vernac::BinOp::Append,
            BinOp::Add => vernac::BinOp::Add,
            BinOp::Sub => vernac::BinOp::Sub,
            BinOp::Mul => vernac::BinOp::Mul,
            BinOp::Lt => vernac::BinOp::Lt,
            BinOp::Gt => vernac::BinOp::Gt,
            BinOp::Le => vernac::BinOp::Le,
            BinOp::Ge => vernac::BinOp::Ge,
            BinOp::Eq => vernac::BinOp::Eq,
            BinOp::Ne => {
                let eq = Expr::binary(left, vernac::BinOp::Eq, right);
                return Expr::Not(Box::new(eq));
            }
        };
        Expr::binary(left, op, right)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    /// Lower a statement list into a block obeying `term` at fall-through.
    fn translate_stmts(&mut self, stmts: &[ast::Stmt], term: &Terminator) -> BlockExpr {
        let mut bindings = Vec::new();
        let mut terminated = false;

        let mut index = 0;
        while index < stmts.len() {
            let stmt = &stmts[index];
            let last = index == stmts.len() - 1;
            match &stmt.kind {
                StmtKind::Return(exprs) => {
                    if !self.loops.is_empty() {
                        self.unsupported(
                            stmt.pos,
                            "return from inside a loop body is not translatable",
                        );
                    }
                    let value = self.translate_return(exprs, stmt.pos);
                    bindings.push(Binding::anon(Expr::Return(Box::new(value))));
                    if !last {
                        self.invalid(stmts[index + 1].pos, "unreachable statements after return");
                    }
                    terminated = true;
                    break;
                }
                StmtKind::Break => {
                    bindings.push(Binding::anon(self.loop_exit(stmt.pos, true)));
                    if !last {
                        self.invalid(stmts[index + 1].pos, "unreachable statements after break");
                    }
                    terminated = true;
                    break;
                }
                StmtKind::Continue => {
                    bindings.push(Binding::anon(self.loop_exit(stmt.pos, false)));
                    if !last {
                        self.invalid(
                            stmts[index + 1].pos,
                            "unreachable statements after continue",
                        );
                    }
                    terminated = true;
                    break;
                }
                StmtKind::If(ifstmt)
                    if !last && ifstmt.els.is_none() && ends_in_jump(&ifstmt.then) =>
                {
                    // Guard form: the then branch leaves the block early, so
                    // the remaining statements become the else branch.
                    let cond = self.translate_expr(&ifstmt.cond);
                    let then = Expr::Block(self.translate_stmts(&ifstmt.then.stmts, term));
                    let els = Expr::Block(self.translate_stmts(&stmts[index + 1..], term));
                    bindings.push(Binding::anon(Expr::If(Box::new(IfExpr { cond, then, els }))));
                    terminated = true;
                    break;
                }
                StmtKind::If(ifstmt) if last => {
                    let value = self.translate_if(ifstmt, term);
                    bindings.push(Binding::anon(value));
                    terminated = true;
                }
                StmtKind::Expr(expr)
                    if last
                        && *term == Terminator::Unit
                        && matches!(expr.kind, ExprKind::Call(_))
                        && expr.ty == ast::Type::Tuple(vec![]) =>
                {
                    // A trailing unit-valued call is the block's value.
                    let value = self.translate_expr(expr);
                    bindings.push(Binding::anon(value));
                    terminated = true;
                }
                _ => {
                    if let Some(binding) = self.translate_stmt(stmt) {
                        bindings.push(binding);
                    }
                }
            }
            index += 1;
        }

        if !terminated {
            bindings.push(Binding::anon(term.terminal_expr()));
        }
        BlockExpr::new(bindings)
    }

    /// The expression for `break` (`exit` true) or `continue` in the
    /// innermost loop.
    fn loop_exit(&mut self, pos: Pos, exit: bool) -> Expr {
        match self.loops.last().cloned() {
            Some(LoopFrame::Loop(acc)) => {
                if exit {
                    Expr::loop_ret(acc_value(&acc))
                } else {
                    Expr::loop_continue(acc_value(&acc))
                }
            }
            Some(LoopFrame::MapIter) => {
                self.unsupported(pos, "break/continue inside a map iteration");
                Expr::Unit
            }
            None => {
                let which = if exit { "break" } else { "continue" };
                self.invalid(pos, format!("{which} outside any loop"));
                Expr::Unit
            }
        }
    }

    /// Lower one non-terminal statement to its binding. `None` means the
    /// statement produced only diagnostics.
    fn translate_stmt(&mut self, stmt: &ast::Stmt) -> Option<Binding> {
        let pos = stmt.pos;
        match &stmt.kind {
            StmtKind::ShortVar { names, value } => self.translate_short_var(names, value, pos),
            StmtKind::Assign { target, value } => self.translate_assign(target, value, pos),
            StmtKind::Incr(name) => {
                self.todo(
                    pos,
                    format!("increment of `{name}` outside a loop post-clause"),
                );
                None
            }
            StmtKind::If(ifstmt) => {
                // A mid-block if evaluates to unit and continues with the
                // rest of the block; control flow inside it would not.
                if contains_jump(&ifstmt.then) || ifstmt.els.as_ref().is_some_and(contains_jump) {
                    self.unsupported(pos, "control flow inside a non-terminal if");
                }
                let value = self.translate_if(ifstmt, &Terminator::Unit);
                Some(Binding::anon(value))
            }
            StmtKind::For(for_stmt) => {
                let value = self.translate_for(for_stmt, pos);
                Some(Binding::anon(value))
            }
            StmtKind::Go(call) => {
                let value = self.translate_call(call, pos);
                Some(Binding::anon(Expr::Spawn(BlockExpr::new(vec![
                    Binding::anon(value),
                ]))))
            }
            StmtKind::Expr(expr) => {
                if !matches!(expr.kind, ExprKind::Call(_)) {
                    self.unsupported(pos, "expression statements must be calls");
                    return None;
                }
                let value = self.translate_expr(expr);
                Some(Binding::anon(value))
            }
            StmtKind::Block(block) => {
                let value = Expr::Block(self.translate_stmts(&block.stmts, &Terminator::Unit));
                Some(Binding::anon(value))
            }
            StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => {
                unreachable!("terminal statements are handled by translate_stmts")
            }
        }
    }

    fn translate_short_var(
        &mut self,
        names: &[String],
        value: &ast::Expr,
        pos: Pos,
    ) -> Option<Binding> {
        match names {
            [name] => {
                if matches!(
                    (&value.kind, self.underlying(&value.ty)),
                    (ExprKind::Index { .. }, ast::Type::Tuple(_))
                ) {
                    self.todo(pos, "single-name map reads must also bind the ok flag");
                    return None;
                }
                let value = self.translate_expr(value);
                Some(Binding::one(name.clone(), value))
            }
            [a, b] => {
                match &value.ty {
                    ast::Type::Tuple(parts) if parts.len() == 2 => {}
                    _ => {
                        self.invalid(pos, "destructuring requires a two-result right-hand side");
                        return None;
                    }
                }
                let value = self.translate_expr(value);
                Some(Binding::new(vec![a.clone(), b.clone()], value))
            }
            _ => {
                self.unsupported(pos, "destructuring more than two results");
                None
            }
        }
    }

    fn translate_assign(
        &mut self,
        target: &ast::Expr,
        value: &ast::Expr,
        pos: Pos,
    ) -> Option<Binding> {
        match &target.kind {
            // *p = v and p = v for pointer-typed p both store through the
            // reference.
            ExprKind::Deref(ptr) => {
                let dst = self.translate_expr(ptr);
                let value = self.translate_expr(value);
                Some(Binding::anon(Expr::Store(StoreExpr {
                    dst: Box::new(dst),
                    value: Box::new(value),
                })))
            }
            ExprKind::Ident(ident)
                if matches!(self.underlying(&target.ty), ast::Type::Pointer(_)) =>
            {
                let dst = self.translate_ident(ident, pos);
                let value = self.translate_expr(value);
                Some(Binding::anon(Expr::Store(StoreExpr {
                    dst: Box::new(dst),
                    value: Box::new(value),
                })))
            }
            ExprKind::FieldAccess { base, field } => match self.struct_base(&base.ty) {
                Some((struct_name, true)) => {
                    let base = self.translate_expr(base);
                    let value = self.translate_expr(value);
                    Some(Binding::anon(Expr::call(
                        "struct.storeF",
                        vec![
                            vernac::struct_desc(&struct_name),
                            Expr::GallinaString(field.clone()),
                            base,
                            value,
                        ],
                    )))
                }
                _ => {
                    self.unsupported(pos, "field stores require a pointer-to-struct base");
                    None
                }
            },
            ExprKind::Index { base, index } => {
                match self.underlying(&base.ty).clone() {
                    ast::Type::Map(_, _) => {
                        let base = self.translate_expr(base);
                        let index = self.translate_expr(index);
                        let value = self.translate_expr(value);
                        Some(Binding::anon(Expr::call(
                            "Data.mapAlter",
                            vec![base, index, Expr::HashTableInsert(Box::new(value))],
                        )))
                    }
                    ast::Type::Slice(_) => {
                        self.todo(pos, "slice element assignment");
                        None
                    }
                    _ => {
                        self.invalid(pos, "assignment through an index of a non-container");
                        None
                    }
                }
            }
            _ => {
                self.unsupported(pos, "re-assignment of local variables");
                None
            }
        }
    }

    fn translate_if(&mut self, ifstmt: &ast::IfStmt, term: &Terminator) -> Expr {
        let cond = self.translate_expr(&ifstmt.cond);
        let then = Expr::Block(self.translate_stmts(&ifstmt.then.stmts, term));
        let els = match &ifstmt.els {
            Some(els) => Expr::Block(self.translate_stmts(&els.stmts, term)),
            None => term.terminal_expr(),
        };
        Expr::If(Box::new(IfExpr { cond, then, els }))
    }

    fn translate_for(&mut self, for_stmt: &ForStmt, pos: Pos) -> Expr {
        match for_stmt {
            ForStmt::ThreeClause {
                init,
                cond,
                post,
                body,
            } => self.translate_three_clause(
                init.as_deref(),
                cond.as_ref(),
                post.as_deref(),
                body,
                pos,
            ),
            ForStmt::While { cond, body } => {
                let cond = self.translate_expr(cond);
                self.unit_loop(cond, body)
            }
            ForStmt::Infinite { body } => self.unit_loop(Expr::Bool(true), body),
            ForStmt::RangeMap {
                key,
                value,
                map,
                body,
            } => {
                let map = self.translate_expr(map);
                self.loops.push(LoopFrame::MapIter);
                let body = self.translate_stmts(&body.stmts, &Terminator::Unit);
                self.loops.pop();
                Expr::MapIter(Box::new(MapIterExpr {
                    key: key.clone(),
                    value: value.clone(),
                    map,
                    body,
                }))
            }
            ForStmt::RangeSlice {
                index,
                value,
                slice,
                body,
            } => {
                let slice = self.translate_expr(slice);
                let acc = Some(index.clone());
                self.loops.push(LoopFrame::Loop(acc.clone()));
                let mut bindings = vec![Binding::one(
                    value.clone(),
                    Expr::call("Data.sliceRead", vec![slice.clone(), Expr::var(index.clone())]),
                )];
                let inner = self.translate_stmts(&body.stmts, &Terminator::ContinueLoop(acc));
                self.loops.pop();
                bindings.extend(inner.bindings);
                Expr::ForLoop(Box::new(ForLoopExpr {
                    init: Binding::one(index.clone(), Expr::Int(0)),
                    cond: Expr::binary(
                        Expr::var(index.clone()),
                        vernac::BinOp::Lt,
                        Expr::call("slice.length", vec![slice]),
                    ),
                    post: Expr::binary(Expr::var(index.clone()), vernac::BinOp::Add, Expr::Int(1)),
                    body: BlockExpr::new(bindings),
                }))
            }
        }
    }

    /// A loop with no induction variable: unit accumulator, unit post.
    fn unit_loop(&mut self, cond: Expr, body: &ast::Block) -> Expr {
        self.loops.push(LoopFrame::Loop(None));
        let body = self.translate_stmts(&body.stmts, &Terminator::ContinueLoop(None));
        self.loops.pop();
        Expr::ForLoop(Box::new(ForLoopExpr {
            init: Binding::one("_", Expr::Unit),
            cond,
            post: Expr::Unit,
            body,
        }))
    }

    fn translate_three_clause(
        &mut self,
        init: Option<&ast::Stmt>,
        cond: Option<&ast::Expr>,
        post: Option<&ast::Stmt>,
        body: &ast::Block,
        pos: Pos,
    ) -> Expr {
        let (Some(init), Some(post)) = (init, post) else {
            // Without both clauses there is no induction variable; treat the
            // condition as a plain gate.
            if post.is_some() || init.is_some() {
                self.todo(pos, "for loops with only one of init/post");
                return Expr::Unit;
            }
            let cond = match cond {
                Some(cond) => self.translate_expr(cond),
                None => Expr::Bool(true),
            };
            return self.unit_loop(cond, body);
        };

        let StmtKind::ShortVar { names, value } = &init.kind else {
            self.todo(init.pos, "loop init must declare the induction variable");
            return Expr::Unit;
        };
        let [induction] = names.as_slice() else {
            self.todo(init.pos, "loop init must declare a single induction variable");
            return Expr::Unit;
        };
        match &post.kind {
            StmtKind::Incr(name) if name == induction => {}
            _ => {
                self.todo(
                    post.pos,
                    "loop post must be an increment of the induction variable",
                );
                return Expr::Unit;
            }
        }

        let init_value = self.translate_expr(value);
        let cond = match cond {
            Some(cond) => self.translate_expr(cond),
            None => Expr::Bool(true),
        };
        let acc = Some(induction.clone());
        self.loops.push(LoopFrame::Loop(acc.clone()));
        let body = self.translate_stmts(&body.stmts, &Terminator::ContinueLoop(acc));
        self.loops.pop();
        Expr::ForLoop(Box::new(ForLoopExpr {
            init: Binding::one(induction.clone(), init_value),
            cond,
            post: Expr::binary(
                Expr::var(induction.clone()),
                vernac::BinOp::Add,
                Expr::Int(1),
            ),
            body,
        }))
    }

    fn translate_return(&mut self, exprs: &[ast::Expr], pos: Pos) -> Expr {
        if !exprs.is_empty() {
            let values = exprs.iter().map(|e| self.translate_expr(e)).collect();
            return Expr::tuple(values);
        }
        if self.results.is_empty() {
            return Expr::Unit;
        }
        // A bare return in a function with named results reads the named
        // locals.
        let mut values = Vec::new();
        for result in self.results.clone() {
            match result.name {
                Some(name) => values.push(Expr::var(name)),
                None => {
                    self.invalid(pos, "bare return in a function with unnamed results");
                    values.push(Expr::Unit);
                }
            }
        }
        Expr::tuple(values)
    }

    // -----------------------------------------------------------------------
    // Declarations
    // -----------------------------------------------------------------------

    fn translate_decls(&mut self) -> Vec<vernac::Decl> {
        self.pkg
            .decls
            .iter()
            .map(|decl| self.translate_decl(decl))
            .collect()
    }

    fn decl_comment(&self, decl: &ast::Decl) -> Option<String> {
        let doc = decl.doc.as_deref().map(str::trim_end);
        if !self.config.add_source_comments {
            return doc.map(str::to_string);
        }
        let file = self
            .pkg
            .files
            .get(decl.pos.file.0 as usize)
            .map(String::as_str)
            .unwrap_or("<unknown>");
        let origin = format!("{file}:{}", decl.pos.line);
        match doc {
            Some(doc) => Some(format!("{origin}\n{doc}")),
            None => Some(origin),
        }
    }

    fn translate_decl(&mut self, decl: &ast::Decl) -> vernac::Decl {
        let comment = self.decl_comment(decl);
        match &decl.kind {
            DeclKind::Func(func) => {
                vernac::Decl::Func(self.translate_func(func, comment, decl.pos))
            }
            DeclKind::Struct(strct) => {
                let mut fields = Vec::new();
                for field in &strct.fields {
                    let Some(name) = &field.name else {
                        self.unsupported(decl.pos, "embedded struct fields");
                        continue;
                    };
                    let ty = self.translate_type(&field.ty, decl.pos);
                    fields.push(FieldDecl::new(name.clone(), ty));
                }
                vernac::Decl::Struct(vernac::StructDecl {
                    name: strct.name.clone(),
                    fields,
                    comment,
                })
            }
            DeclKind::Alias(alias) => {
                let body = self.translate_type(&alias.ty, decl.pos);
                vernac::Decl::TypeDef(vernac::TypeDecl {
                    name: alias.name.clone(),
                    body,
                })
            }
            DeclKind::Const(konst) => {
                let (ty, value) = match &konst.value {
                    Lit::Int(n) => (vernac::Type::ident("uint64"), Expr::Int(*n)),
                    Lit::Str(s) => (vernac::Type::ident("string"), Expr::Str(s.clone())),
                    Lit::Bool(b) => (vernac::Type::ident("bool"), Expr::Bool(*b)),
                };
                vernac::Decl::Const(vernac::ConstDecl {
                    name: konst.name.clone(),
                    ty,
                    value,
                    comment,
                })
            }
        }
    }

    fn translate_func(
        &mut self,
        func: &ast::FuncDecl,
        comment: Option<String>,
        pos: Pos,
    ) -> vernac::FuncDecl {
        let mut args = Vec::new();
        let name = match &func.receiver {
            Some(receiver) => match self.struct_base(&receiver.ty) {
                Some((struct_name, true)) => {
                    let ty = self.translate_type(&receiver.ty, pos);
                    args.push(FieldDecl::new(receiver.name.clone(), ty));
                    struct_method(&struct_name, &func.name)
                }
                _ => {
                    self.unsupported(pos, "methods are only supported on pointer-to-struct receivers");
                    func.name.clone()
                }
            },
            None => func.name.clone(),
        };
        for param in &func.params {
            let ty = self.translate_type(&param.ty, pos);
            args.push(FieldDecl::new(param.name.clone(), ty));
        }
        let return_type = if func.results.is_empty() {
            vernac::Type::unit()
        } else {
            let types = func
                .results
                .iter()
                .map(|r| self.translate_type(&r.ty, pos))
                .collect();
            vernac::Type::tuple(types)
        };
        self.results = func.results.clone();
        let body = Expr::Block(self.translate_stmts(&func.body.stmts, &Terminator::Unit));
        self.results = Vec::new();
        vernac::FuncDecl {
            name,
            args,
            return_type,
            body,
            comment,
            add_types: self.config.add_types,
        }
    }
}

/// Whether a block's last statement leaves the enclosing block early
/// (return, break, or continue), making the block a valid guard body.
fn ends_in_jump(block: &ast::Block) -> bool {
    matches!(
        block.stmts.last(),
        Some(ast::Stmt {
            kind: StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue,
            ..
        })
    )
}

/// Whether a block contains early control flow anywhere outside a nested
/// loop.
fn contains_jump(block: &ast::Block) -> bool {
    block.stmts.iter().any(|stmt| match &stmt.kind {
        StmtKind::Return(_) | StmtKind::Break | StmtKind::Continue => true,
        StmtKind::If(ifstmt) => {
            contains_jump(&ifstmt.then) || ifstmt.els.as_ref().is_some_and(contains_jump)
        }
        StmtKind::Block(block) => contains_jump(block),
        _ => false,
    })
}

#[cfg(test)]
mod translate_tests;

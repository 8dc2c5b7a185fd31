//! Target AST and vernacular pretty-printer for heron.
//!
//! The target language models computations in a `proc T` monad: effects are
//! primitive operations (`Data.*`, `FS.*`, `Globals.*`) and control flow is
//! sequencing of bindings, `if:`, loops with an explicit accumulator, and
//! `Fork`. This crate owns the closed set of declaration and expression
//! variants and their one capability: rendering to vernacular text.
//!
//! Nodes are built bottom-up by the translator and are immutable once
//! constructed. Rendering never fails; malformed trees (a binding
//! destructuring three names) are programmer errors and panic at
//! construction time.

use std::io;

pub mod printer;
pub mod skeleton;

use printer::{Buffer, add_parens, binder, quote, reindent};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A target type.
///
/// Structurally similar to [`Expr`] but kept separate as an annotation of
/// where types are expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    /// A type-level identifier, rendered literally.
    Ident(String),
    /// A struct type referenced by name, rendered `Name.T`.
    Struct(String),
    /// A map with `uint64` keys, rendered `mapT V`.
    Map(Box<Type>),
    /// A slice, rendered `slice.T E`.
    Slice(Box<Type>),
    /// A reference cell, rendered `refT T`.
    Ptr(Box<Type>),
    /// A product, rendered `(T1 * T2 * …)`.
    Tuple(Vec<Type>),
}

impl Type {
    pub fn ident(name: impl Into<String>) -> Type {
        Type::Ident(name.into())
    }

    /// The unit type used for functions with no parameters or results.
    pub fn unit() -> Type {
        Type::Ident("unitT".to_string())
    }

    /// Wrap several types in a tuple; a single type stays itself.
    pub fn tuple(mut types: Vec<Type>) -> Type {
        if types.len() == 1 {
            types.remove(0)
        } else {
            Type::Tuple(types)
        }
    }

    pub fn render(&self) -> String {
        match self {
            Type::Ident(name) => name.clone(),
            Type::Struct(name) => format!("{name}.T"),
            Type::Map(value) => format!("mapT {}", add_parens(&value.render())),
            Type::Slice(value) => format!("slice.T {}", add_parens(&value.render())),
            Type::Ptr(value) => format!("refT {}", add_parens(&value.render())),
            Type::Tuple(types) => {
                let comps: Vec<String> = types.iter().map(Type::render).collect();
                format!("({})", comps.join(" * "))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Expressions
// ---------------------------------------------------------------------------

/// The supported binary operators. `Append` is string concatenation, which
/// shares the `+` symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Eq,
    Lt,
    Gt,
    Le,
    Ge,
    Append,
}

impl BinOp {
    fn symbol(self) -> &'static str {
        match self {
            BinOp::Add | BinOp::Append => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Eq => "=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "≤",
            BinOp::Ge => "≥",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// An identifier of the target language itself, rendered literally.
    Gallina(String),
    /// A program-level variable, rendered quoted.
    Var(String),
    /// A target-level string, rendered quoted (semantically distinct from
    /// [`Expr::Var`] even though the rendering coincides).
    GallinaString(String),
    /// A program-level string literal, rendered `#(str"…")`.
    Str(String),
    /// A 64-bit integer literal, rendered `#n`.
    Int(u64),
    /// A 32-bit integer literal, rendered `#(U32 n)`.
    Int32(u32),
    Bool(bool),
    /// The unit value `#()`.
    Unit,
    Call(CallExpr),
    FieldAccess(FieldAccessExpr),
    StructLiteral(StructLiteral),
    Tuple(Vec<Expr>),
    Binary(BinaryExpr),
    /// Logical negation, rendered `~ x`.
    Not(Box<Expr>),
    /// Pointer load, rendered `!x`.
    Deref(Box<Expr>),
    /// Pointer allocation, rendered `ref x`.
    Ref(Box<Expr>),
    /// Pointer store, rendered `dst <- v`.
    Store(StoreExpr),
    If(Box<IfExpr>),
    Block(BlockExpr),
    ForLoop(Box<ForLoopExpr>),
    MapIter(Box<MapIterExpr>),
    /// Fork a computation, rendered `Fork (body)`.
    Spawn(BlockExpr),
    /// A return position; renders as its value (return is implicit in the
    /// monadic form).
    Return(Box<Expr>),
    /// The map-alter updater `(fun _ => Some v)`.
    HashTableInsert(Box<Expr>),
}

/// A call to a primitive or another function, rendered prefix-style with
/// conservatively parenthesized arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub method: String,
    pub args: Vec<Expr>,
}

impl CallExpr {
    /// A zero-argument call receives the unit value as its only argument.
    pub fn new(method: impl Into<String>, args: Vec<Expr>) -> Self {
        let args = if args.is_empty() {
            vec![Expr::Unit]
        } else {
            args
        };
        Self {
            method: method.into(),
            args,
        }
    }

    fn render(&self) -> String {
        let mut comps = vec![self.method.clone()];
        for arg in &self.args {
            comps.push(add_parens(&arg.render()));
        }
        comps.join(" ")
    }
}

/// Access to a struct field, through a pointer or by value.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldAccessExpr {
    pub struct_name: String,
    pub field: String,
    pub base: Box<Expr>,
    /// True iff the base expression has pointer-to-struct type in the source.
    pub through_pointer: bool,
}

/// The struct descriptor expression `Name.S`.
pub fn struct_desc(name: &str) -> Expr {
    Expr::Gallina(format!("{name}.S"))
}

impl FieldAccessExpr {
    fn render(&self) -> String {
        if self.through_pointer {
            Expr::call(
                "struct.loadF",
                vec![
                    struct_desc(&self.struct_name),
                    Expr::GallinaString(self.field.clone()),
                    (*self.base).clone(),
                ],
            )
            .render()
        } else {
            Expr::call(
                format!("{}.get", self.struct_name),
                vec![
                    Expr::GallinaString(self.field.clone()),
                    (*self.base).clone(),
                ],
            )
            .render()
        }
    }
}

/// A record construction using named fields.
///
/// Field order is whatever the caller provides; the printer does not
/// reorder. The translator is responsible for supplying fields in the
/// declaration order the target constructor expects.
#[derive(Debug, Clone, PartialEq)]
pub struct StructLiteral {
    pub struct_name: String,
    fields: Vec<(String, Expr)>,
    /// True when the struct is being allocated on the heap.
    pub allocation: bool,
}

impl StructLiteral {
    pub fn new(struct_name: impl Into<String>) -> Self {
        Self {
            struct_name: struct_name.into(),
            fields: Vec::new(),
            allocation: false,
        }
    }

    pub fn add_field(&mut self, field: impl Into<String>, value: Expr) {
        self.fields.push((field.into(), value));
    }

    pub fn fields(&self) -> &[(String, Expr)] {
        &self.fields
    }

    fn render(&self) -> String {
        let mut pp = Buffer::new();
        let method = if self.allocation {
            "struct.new"
        } else {
            "struct.mk"
        };
        pp.add(format_args!(
            "{method} {} [",
            struct_desc(&self.struct_name).render()
        ));
        pp.indent(2);
        for (i, (field, value)) in self.fields.iter().enumerate() {
            let terminator = if i == self.fields.len() - 1 { "" } else { ";" };
            pp.add(format_args!(
                "{} ::= {}{terminator}",
                quote(field),
                value.render()
            ));
        }
        pp.indent(-2);
        pp.add_line("]");
        pp.build()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BinaryExpr {
    pub op: BinOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoreExpr {
    pub dst: Box<Expr>,
    pub value: Box<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IfExpr {
    pub cond: Expr,
    pub then: Expr,
    pub els: Expr,
}

impl IfExpr {
    fn render(&self) -> String {
        let mut pp = Buffer::new();
        pp.add(format_args!("(if: {}", self.cond.render()));
        flow_branch(&mut pp, "then", &self.then, "");
        flow_branch(&mut pp, "else", &self.els, ")");
        pp.build()
    }
}

/// Emit an `if` branch: compact single-line form when the branch renders on
/// one line, indented block form otherwise.
fn flow_branch(pp: &mut Buffer, prefix: &str, e: &Expr, suffix: &str) {
    let code = format!("{}{suffix}", e.render());
    if !code.contains('\n') {
        pp.block(&format!("{prefix} "), &code);
        pp.indent(-((prefix.len() + 1) as isize));
        return;
    }
    pp.add_line(prefix);
    pp.indent(2);
    pp.add_line(&code);
    pp.indent(-2);
}

// ---------------------------------------------------------------------------
// Bindings and blocks
// ---------------------------------------------------------------------------

/// One line of a sequenced block.
///
/// A binding is not an expression: emitting it requires knowing whether it
/// is the last of its block (the terminal binding renders bare). Handling
/// that at printing time is easier than a cons-shaped representation.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Zero names for an anonymous binding, one for `let:`, two for a
    /// tuple-destructuring `let:`.
    pub names: Vec<String>,
    pub expr: Expr,
}

impl Binding {
    /// An anonymous binding for an expression evaluated for its effects.
    pub fn anon(expr: Expr) -> Self {
        Self {
            names: Vec::new(),
            expr,
        }
    }

    pub fn one(name: impl Into<String>, expr: Expr) -> Self {
        Self {
            names: vec![name.into()],
            expr,
        }
    }

    /// A binding destructuring `names`. Panics on three or more names; the
    /// target notation destructures at most a pair.
    pub fn new(names: Vec<String>, expr: Expr) -> Self {
        assert!(
            names.len() <= 2,
            "no support for destructuring more than two values"
        );
        Self { names, expr }
    }

    pub fn is_anonymous(&self) -> bool {
        self.names.is_empty()
    }

    /// Emit this binding as a non-terminal line of a block.
    fn add_to(&self, pp: &mut Buffer) {
        match self.names.as_slice() {
            [] => pp.add(format_args!("{};;", self.expr.render())),
            [name] => pp.add(format_args!(
                "let: {} := {} in",
                binder(name),
                self.expr.render()
            )),
            [a, b] => pp.add(format_args!(
                "let: ({}, {}) := {} in",
                binder(a),
                binder(b),
                self.expr.render()
            )),
            _ => unreachable!("bindings hold at most two names"),
        }
    }
}

/// A sequence of bindings ending in a terminal expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockExpr {
    pub bindings: Vec<Binding>,
}

impl BlockExpr {
    pub fn new(bindings: Vec<Binding>) -> Self {
        Self { bindings }
    }

    fn render(&self) -> String {
        let mut pp = Buffer::new();
        for (i, binding) in self.bindings.iter().enumerate() {
            if i == self.bindings.len() - 1 {
                pp.add_line(&binding.expr.render());
            } else {
                binding.add_to(&mut pp);
            }
        }
        pp.build()
    }
}

// ---------------------------------------------------------------------------
// Loops, iteration, forking
// ---------------------------------------------------------------------------

/// A loop with one explicit accumulator, initialized by `init` and threaded
/// through the body via `Continue`/`LoopRet`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoopExpr {
    pub init: Binding,
    pub cond: Expr,
    pub post: Expr,
    pub body: BlockExpr,
}

impl ForLoopExpr {
    fn render(&self) -> String {
        let mut pp = Buffer::new();
        self.init.add_to(&mut pp);
        pp.add(format_args!(
            "(for: ({}); ({}) :=",
            self.cond.render(),
            self.post.render()
        ));
        pp.indent(2);
        pp.add(format_args!("{})", self.body.render()));
        pp.build()
    }
}

/// A call to the map iteration helper. The target support for this call does
/// the looping itself; key and value are free in the body.
#[derive(Debug, Clone, PartialEq)]
pub struct MapIterExpr {
    pub key: String,
    pub value: String,
    pub map: Expr,
    pub body: BlockExpr,
}

impl MapIterExpr {
    fn render(&self) -> String {
        let mut pp = Buffer::new();
        pp.add(format_args!(
            "Data.mapIter {} (λ: {} {},",
            add_parens(&self.map.render()),
            binder(&self.key),
            binder(&self.value)
        ));
        pp.indent(2);
        pp.add(format_args!("{})", self.body.render()));
        pp.build()
    }
}

impl Expr {
    pub fn gallina(name: impl Into<String>) -> Expr {
        Expr::Gallina(name.into())
    }

    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    pub fn call(method: impl Into<String>, args: Vec<Expr>) -> Expr {
        Expr::Call(CallExpr::new(method, args))
    }

    /// Wrap several expressions in a tuple; a single expression stays itself.
    pub fn tuple(mut exprs: Vec<Expr>) -> Expr {
        if exprs.len() == 1 {
            exprs.remove(0)
        } else {
            Expr::Tuple(exprs)
        }
    }

    pub fn binary(left: Expr, op: BinOp, right: Expr) -> Expr {
        Expr::Binary(BinaryExpr {
            op,
            left: Box::new(left),
            right: Box::new(right),
        })
    }

    /// Re-enter the loop carrying the accumulator.
    pub fn loop_continue(acc: Expr) -> Expr {
        Expr::call("Continue", vec![acc])
    }

    /// Leave the loop carrying the accumulator.
    pub fn loop_ret(acc: Expr) -> Expr {
        Expr::call("LoopRet", vec![acc])
    }

    pub fn render(&self) -> String {
        match self {
            Expr::Gallina(name) => name.clone(),
            Expr::Var(name) => quote(name),
            Expr::GallinaString(s) => quote(s),
            Expr::Str(s) => format!("#(str\"{s}\")"),
            Expr::Int(n) => format!("#{n}"),
            Expr::Int32(n) => format!("#(U32 {n})"),
            Expr::Bool(true) => "#true".to_string(),
            Expr::Bool(false) => "#false".to_string(),
            Expr::Unit => "#()".to_string(),
            Expr::Call(call) => call.render(),
            Expr::FieldAccess(access) => access.render(),
            Expr::StructLiteral(lit) => lit.render(),
            Expr::Tuple(exprs) => {
                let comps: Vec<String> = exprs.iter().map(Expr::render).collect();
                format!("({})", reindent(1, &comps.join(", ")))
            }
            Expr::Binary(bin) => format!(
                "{} {} {}",
                bin.left.render(),
                bin.op.symbol(),
                bin.right.render()
            ),
            Expr::Not(x) => format!("~ {}", add_parens(&x.render())),
            Expr::Deref(x) => format!("!{}", add_parens(&x.render())),
            Expr::Ref(x) => Expr::call("ref", vec![(**x).clone()]).render(),
            Expr::Store(store) => {
                format!("{} <- {}", store.dst.render(), store.value.render())
            }
            Expr::If(ife) => ife.render(),
            Expr::Block(block) => block.render(),
            Expr::ForLoop(fl) => fl.render(),
            Expr::MapIter(mi) => mi.render(),
            Expr::Spawn(body) => {
                let mut pp = Buffer::new();
                pp.block("Fork (", &format!("{})", body.render()));
                pp.build()
            }
            Expr::Return(value) => value.render(),
            Expr::HashTableInsert(value) => {
                format!("(fun _ => Some {})", add_parens(&value.render()))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Declarations
// ---------------------------------------------------------------------------

/// A `name: type` pair, used for struct fields and function binders.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: Type,
}

impl FieldDecl {
    pub fn new(name: impl Into<String>, ty: Type) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }

    fn binder(&self) -> String {
        binder(&self.name)
    }
}

/// Mangled name of a method on a struct.
pub fn struct_method(struct_name: &str, method_name: &str) -> String {
    format!("{struct_name}__{method_name}")
}

/// A function definition, emitted as a `Definition … : val` vernacular
/// command, optionally followed by a typing theorem.
#[derive(Debug, Clone, PartialEq)]
pub struct FuncDecl {
    pub name: String,
    pub args: Vec<FieldDecl>,
    pub return_type: Type,
    pub body: Expr,
    pub comment: Option<String>,
    /// Also emit a typing theorem with a canned proof.
    pub add_types: bool,
}

impl FuncDecl {
    /// The binder list of the definition; an empty parameter list renders as
    /// the single wildcard binder.
    fn signature(&self) -> String {
        if self.args.is_empty() {
            return "<>".to_string();
        }
        self.args
            .iter()
            .map(FieldDecl::binder)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// The arrow type used by the typing theorem; an empty parameter list
    /// stands in as `unitT`.
    fn type_signature(&self) -> String {
        let mut types: Vec<String> = self.args.iter().map(|a| a.ty.render()).collect();
        if types.is_empty() {
            types.push(Type::unit().render());
        }
        types.push(self.return_type.render());
        types.join(" -> ")
    }

    fn render(&self) -> String {
        let mut pp = Buffer::new();
        pp.add_comment(self.comment.as_deref().unwrap_or(""));
        pp.add(format_args!("Definition {}: val :=", self.name));
        pp.indent(2);
        pp.add(format_args!("λ: {},", self.signature()));
        pp.indent(2);
        pp.add(format_args!("{}.", self.body.render()));
        pp.indent(-4);
        if self.add_types {
            pp.add(format_args!(
                "Theorem {name}_t: ⊢ {name} : ({ty}).",
                name = self.name,
                ty = self.type_signature()
            ));
            pp.add_line("Proof. typecheck. Qed.");
            pp.add(format_args!("Hint Resolve {}_t : types.", self.name));
        }
        pp.build()
    }
}

/// A record declaration for a source struct.
///
/// Wrapped in a module named after the struct, which namespaces the record's
/// field accessors. The module carries the record description, its value and
/// pointer types, a zero-value instance, and the accessor section.
#[derive(Debug, Clone, PartialEq)]
pub struct StructDecl {
    pub name: String,
    pub fields: Vec<FieldDecl>,
    pub comment: Option<String>,
}

impl StructDecl {
    fn render(&self) -> String {
        let mut pp = Buffer::new();
        pp.add(format_args!("Module {}.", self.name));
        pp.indent(2);
        pp.add_comment(self.comment.as_deref().unwrap_or(""));
        pp.add_line("Definition S := struct.decl [");
        pp.indent(2);
        for (i, field) in self.fields.iter().enumerate() {
            let sep = if i == self.fields.len() - 1 { "" } else { ";" };
            pp.add(format_args!(
                "{} :: {}{sep}",
                quote(&field.name),
                field.ty.render()
            ));
        }
        pp.indent(-2);
        pp.add_line("].");
        pp.add_line("Definition T: ty := struct.t S.");
        pp.add_line("Definition Ptr: ty := struct.ptrT S.");
        pp.add_line("Definition zero := struct.zero S.");
        pp.add_line("Global Instance t_zero: HasZero T := zero.");
        pp.add_line("Section fields.");
        pp.indent(2);
        pp.add_line("Context `{ext_ty: ext_types}.");
        pp.add_line("Definition get := struct.get S.");
        pp.indent(-2);
        pp.add_line("End fields.");
        pp.indent(-2);
        pp.add(format_args!("End {}.", self.name));
        pp.build()
    }
}

/// A named type definition.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDecl {
    pub name: String,
    pub body: Type,
}

impl TypeDecl {
    fn render(&self) -> String {
        format!("Definition {}: ty := {}.", self.name, self.body.render())
    }
}

/// A constant definition. The type is recorded for the translator's benefit
/// but the vernacular form does not print it.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstDecl {
    pub name: String,
    pub ty: Type,
    pub value: Expr,
    pub comment: Option<String>,
}

impl ConstDecl {
    fn render(&self) -> String {
        let mut pp = Buffer::new();
        pp.add_comment(self.comment.as_deref().unwrap_or(""));
        pp.block(
            "Definition ",
            &format!("{} : expr := {}.", self.name, self.value.render()),
        );
        pp.build()
    }
}

/// A top-level comment; pretends to be a declaration so it can sit among
/// declarations in a file.
#[derive(Debug, Clone, PartialEq)]
pub struct CommentDecl(pub String);

impl CommentDecl {
    /// Create a comment declaration with trailing whitespace trimmed.
    pub fn new(s: &str) -> Self {
        Self(s.trim_end().to_string())
    }

    fn render(&self) -> String {
        let mut pp = Buffer::new();
        pp.add_comment(&self.0);
        pp.build()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Func(FuncDecl),
    Struct(StructDecl),
    TypeDef(TypeDecl),
    Const(ConstDecl),
    Comment(CommentDecl),
}

impl Decl {
    pub fn render(&self) -> String {
        match self {
            Decl::Func(d) => d.render(),
            Decl::Struct(d) => d.render(),
            Decl::TypeDef(d) => d.render(),
            Decl::Const(d) => d.render(),
            Decl::Comment(d) => d.render(),
        }
    }
}

// ---------------------------------------------------------------------------
// Files
// ---------------------------------------------------------------------------

/// The fixed prelude imported at the top of every emitted file.
const IMPORT_HEADER: &str = "From ProcLang Require Import prelude.

(* disk FFI *)
From ProcLang Require Import ffi.disk_prelude.";

/// A complete output file: a sequence of declarations for one source
/// package.
#[derive(Debug, Clone, PartialEq)]
pub struct File {
    /// Import path of the source package, recorded in the notice comment.
    pub package: String,
    pub decls: Vec<Decl>,
}

impl File {
    fn autogenerated_notice(&self) -> CommentDecl {
        CommentDecl::new(&format!("autogenerated from {}", self.package))
    }

    /// Render the whole file: notice, prelude, blank line, then one
    /// declaration per source declaration separated by blank lines.
    pub fn render(&self) -> String {
        let mut out = String::new();
        out.push_str(&self.autogenerated_notice().render());
        out.push('\n');
        out.push_str(IMPORT_HEADER);
        out.push('\n');
        out.push('\n');
        for (i, decl) in self.decls.iter().enumerate() {
            out.push_str(&decl.render());
            out.push('\n');
            if i != self.decls.len() - 1 {
                out.push('\n');
            }
        }
        out
    }

    pub fn write(&self, w: &mut impl io::Write) -> io::Result<()> {
        w.write_all(self.render().as_bytes())
    }
}

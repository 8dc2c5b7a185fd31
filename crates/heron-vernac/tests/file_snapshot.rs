//! Golden rendering of a representative output file.

use heron_vernac::{
    BinOp, Binding, BlockExpr, CommentDecl, ConstDecl, Decl, Expr, FieldDecl, File, FuncDecl,
    StructDecl, Type, TypeDecl,
};
use insta::assert_snapshot;

#[test]
fn representative_file_renders_stably() {
    let lookup_body = Expr::Block(BlockExpr::new(vec![
        Binding::new(
            vec!["v".to_string(), "ok".to_string()],
            Expr::call("Data.mapGet", vec![Expr::var("m"), Expr::var("k")]),
        ),
        Binding::anon(Expr::tuple(vec![Expr::var("v"), Expr::var("ok")])),
    ]));

    let file = File {
        package: "simpledb".to_string(),
        decls: vec![
            Decl::Comment(CommentDecl::new("table layout")),
            Decl::Struct(StructDecl {
                name: "Entry".to_string(),
                fields: vec![
                    FieldDecl::new("Key", Type::ident("uint64")),
                    FieldDecl::new("Value", Type::Slice(Box::new(Type::ident("byte")))),
                ],
                comment: Some("An Entry pairs a key with its payload.".to_string()),
            }),
            Decl::TypeDef(TypeDecl {
                name: "Table".to_string(),
                body: Type::Map(Box::new(Type::Slice(Box::new(Type::ident("byte"))))),
            }),
            Decl::Const(ConstDecl {
                name: "MaxKey".to_string(),
                ty: Type::ident("uint64"),
                value: Expr::Int(1024),
                comment: None,
            }),
            Decl::Func(FuncDecl {
                name: "Lookup".to_string(),
                args: vec![
                    FieldDecl::new("m", Type::Map(Box::new(Type::Slice(Box::new(Type::ident(
                        "byte",
                    )))))),
                    FieldDecl::new("k", Type::ident("uint64")),
                ],
                return_type: Type::tuple(vec![
                    Type::Slice(Box::new(Type::ident("byte"))),
                    Type::ident("bool"),
                ]),
                body: lookup_body,
                comment: None,
                add_types: true,
            }),
            Decl::Func(FuncDecl {
                name: "Bound".to_string(),
                args: vec![FieldDecl::new("k", Type::ident("uint64"))],
                return_type: Type::ident("uint64"),
                body: Expr::If(Box::new(heron_vernac::IfExpr {
                    cond: Expr::binary(Expr::var("k"), BinOp::Lt, Expr::gallina("MaxKey")),
                    then: Expr::var("k"),
                    els: Expr::gallina("MaxKey"),
                })),
                comment: None,
                add_types: false,
            }),
        ],
    };

    assert_snapshot!(file.render(), @r#"
(* autogenerated from simpledb *)
From ProcLang Require Import prelude.

(* disk FFI *)
From ProcLang Require Import ffi.disk_prelude.

(* table layout *)

Module Entry.
  (* An Entry pairs a key with its payload. *)
  Definition S := struct.decl [
    "Key" :: uint64;
    "Value" :: slice.T byte
  ].
  Definition T: ty := struct.t S.
  Definition Ptr: ty := struct.ptrT S.
  Definition zero := struct.zero S.
  Global Instance t_zero: HasZero T := zero.
  Section fields.
    Context `{ext_ty: ext_types}.
    Definition get := struct.get S.
  End fields.
End Entry.

Definition Table: ty := mapT (slice.T byte).

Definition MaxKey : expr := #1024.

Definition Lookup: val :=
  λ: "m" "k",
    let: ("v", "ok") := Data.mapGet "m" "k" in
    ("v", "ok").
Theorem Lookup_t: ⊢ Lookup : (mapT (slice.T byte) -> uint64 -> (slice.T byte * bool)).
Proof. typecheck. Qed.
Hint Resolve Lookup_t : types.

Definition Bound: val :=
  λ: "k",
    (if: "k" < MaxKey
    then "k"
    else MaxKey).
"#);
}

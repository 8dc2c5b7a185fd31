use super::*;
use heron_ast::{
    AliasDecl, Block, ConstDecl, Decl, Expr as SExpr, Field, FileId, FuncDecl, Ident, IfStmt,
    Package, Param, ResultParam, Stmt, StructDecl, Type,
};
use heron_diag::Kind;

fn pos(line: u32) -> Pos {
    Pos::new(FileId(0), line, 1)
}

fn expr(kind: ExprKind, ty: Type, line: u32) -> SExpr {
    SExpr::new(kind, ty, pos(line))
}

fn local(name: &str, ty: Type, line: u32) -> SExpr {
    expr(
        ExprKind::Ident(Ident::new(name, IdentKind::Local)),
        ty,
        line,
    )
}

fn param(name: &str, ty: Type, line: u32) -> SExpr {
    expr(
        ExprKind::Ident(Ident::new(name, IdentKind::Param)),
        ty,
        line,
    )
}

fn int(n: u64, line: u32) -> SExpr {
    expr(ExprKind::Lit(Lit::Int(n)), Type::Uint64, line)
}

fn unit_ty() -> Type {
    Type::Tuple(vec![])
}

fn pkg_call(package: &str, name: &str, args: Vec<SExpr>, ty: Type, line: u32) -> SExpr {
    expr(
        ExprKind::Call(ast::CallExpr {
            target: CallTarget::Package {
                package: package.to_string(),
                name: name.to_string(),
            },
            args,
            variadic: false,
        }),
        ty,
        line,
    )
}

fn stmt(kind: StmtKind, line: u32) -> Stmt {
    Stmt::new(kind, pos(line))
}

fn func_decl(name: &str, params: Vec<Param>, results: Vec<ResultParam>, body: Vec<Stmt>) -> Decl {
    Decl::new(
        DeclKind::Func(FuncDecl {
            name: name.to_string(),
            receiver: None,
            params,
            results,
            body: Block::new(body),
        }),
        pos(1),
    )
}

fn package(decls: Vec<Decl>) -> Package {
    Package {
        name: "example".to_string(),
        path: "example/simple".to_string(),
        files: vec!["simple.src".to_string()],
        decls,
    }
}

fn translate(decls: Vec<Decl>) -> File {
    translate_package(&package(decls), &Config::default()).expect("translation should succeed")
}

fn translate_err(decls: Vec<Decl>) -> TranslationError {
    translate_package(&package(decls), &Config::default())
        .expect_err("translation should report diagnostics")
}

#[test]
fn empty_function_body_is_unit() {
    let file = translate(vec![func_decl("Empty", vec![], vec![], vec![])]);
    assert_eq!(
        file.decls[0].render(),
        "Definition Empty: val :=\n  λ: <>,\n    #()."
    );
}

#[test]
fn declaration_order_is_preserved() {
    let decls = vec![
        Decl::new(
            DeclKind::Const(ConstDecl {
                name: "MaxSize".to_string(),
                value: Lit::Int(4096),
            }),
            pos(1),
        ),
        Decl::new(
            DeclKind::Struct(StructDecl {
                name: "Entry".to_string(),
                fields: vec![Field {
                    name: Some("Key".to_string()),
                    ty: Type::Uint64,
                }],
            }),
            pos(3),
        ),
        Decl::new(
            DeclKind::Alias(AliasDecl {
                name: "Key".to_string(),
                ty: Type::Uint64,
            }),
            pos(7),
        ),
        func_decl("Empty", vec![], vec![], vec![]),
    ];
    let file = translate(decls);
    assert_eq!(file.decls.len(), 4);

    let reparsed = vernac::skeleton::parse(&file.render());
    assert_eq!(reparsed, vernac::skeleton::of_file(&file));
    let names: Vec<&str> = reparsed.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["MaxSize", "Entry", "Key", "Empty"]);
}

#[test]
fn pointer_use_sequences_allocate_store_load_store() {
    let ptr_ty = Type::Pointer(Box::new(Type::Uint64));
    let body = vec![
        stmt(
            StmtKind::ShortVar {
                names: vec!["p".to_string()],
                value: expr(ExprKind::New(Type::Uint64), ptr_ty.clone(), 2),
            },
            2,
        ),
        stmt(
            StmtKind::Assign {
                target: expr(
                    ExprKind::Deref(Box::new(local("p", ptr_ty.clone(), 3))),
                    Type::Uint64,
                    3,
                ),
                value: int(1, 3),
            },
            3,
        ),
        stmt(
            StmtKind::ShortVar {
                names: vec!["x".to_string()],
                value: expr(
                    ExprKind::Deref(Box::new(local("p", ptr_ty.clone(), 4))),
                    Type::Uint64,
                    4,
                ),
            },
            4,
        ),
        stmt(
            StmtKind::Assign {
                target: expr(
                    ExprKind::Deref(Box::new(local("p", ptr_ty.clone(), 5))),
                    Type::Uint64,
                    5,
                ),
                value: local("x", Type::Uint64, 5),
            },
            5,
        ),
    ];
    let file = translate(vec![func_decl("UsePtr", vec![], vec![], body)]);
    assert_eq!(
        file.decls[0].render(),
        "Definition UsePtr: val :=\n\
         \x20\x20λ: <>,\n\
         \x20\x20\x20\x20let: \"p\" := ref #0 in\n\
         \x20\x20\x20\x20\"p\" <- #1;;\n\
         \x20\x20\x20\x20let: \"x\" := !\"p\" in\n\
         \x20\x20\x20\x20\"p\" <- \"x\";;\n\
         \x20\x20\x20\x20#()."
    );
}

#[test]
fn two_name_bindings_require_two_results() {
    let body = vec![stmt(
        StmtKind::ShortVar {
            names: vec!["a".to_string(), "b".to_string()],
            value: int(1, 2),
        },
        2,
    )];
    let err = translate_err(vec![func_decl("Bad", vec![], vec![], body)]);
    assert_eq!(err.diagnostics().len(), 1);
    assert_eq!(err.diagnostics()[0].kind, Kind::Invalid);
}

#[test]
fn more_than_two_results_are_rejected() {
    let body = vec![stmt(
        StmtKind::ShortVar {
            names: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            value: int(1, 2),
        },
        2,
    )];
    let err = translate_err(vec![func_decl("Bad", vec![], vec![], body)]);
    assert_eq!(err.diagnostics()[0].kind, Kind::Unsupported);
}

#[test]
fn map_writes_use_the_alter_updater() {
    let map_ty = Type::Map(Box::new(Type::Uint64), Box::new(Type::Uint64));
    let body = vec![stmt(
        StmtKind::Assign {
            target: expr(
                ExprKind::Index {
                    base: Box::new(param("m", map_ty.clone(), 2)),
                    index: Box::new(int(1, 2)),
                },
                Type::Tuple(vec![Type::Uint64, Type::Bool]),
                2,
            ),
            value: int(7, 2),
        },
        2,
    )];
    let file = translate(vec![func_decl(
        "Put",
        vec![Param::new("m", map_ty)],
        vec![],
        body,
    )]);
    let rendered = file.decls[0].render();
    assert!(rendered.contains("Data.mapAlter \"m\" #1 (fun _ => Some #7);;"));
}

#[test]
fn guard_if_consumes_the_rest_of_the_block() {
    // if ok { return 0 }; return k
    let body = vec![
        stmt(
            StmtKind::If(IfStmt {
                cond: param("ok", Type::Bool, 2),
                then: Block::new(vec![stmt(StmtKind::Return(vec![int(0, 3)]), 3)]),
                els: None,
            }),
            2,
        ),
        stmt(StmtKind::Return(vec![param("k", Type::Uint64, 5)]), 5),
    ];
    let file = translate(vec![func_decl(
        "Guard",
        vec![Param::new("ok", Type::Bool), Param::new("k", Type::Uint64)],
        vec![ResultParam {
            name: None,
            ty: Type::Uint64,
        }],
        body,
    )]);
    assert_eq!(
        file.decls[0].render(),
        "Definition Guard: val :=\n\
         \x20\x20λ: \"ok\" \"k\",\n\
         \x20\x20\x20\x20(if: \"ok\"\n\
         \x20\x20\x20\x20then #0\n\
         \x20\x20\x20\x20else \"k\")."
    );
}

#[test]
fn range_over_map_lowers_to_map_iter() {
    let map_ty = Type::Map(Box::new(Type::Uint64), Box::new(Type::Uint64));
    let body = vec![stmt(
        StmtKind::For(ForStmt::RangeMap {
            key: "k".to_string(),
            value: "v".to_string(),
            map: param("m", map_ty.clone(), 2),
            body: Block::new(vec![stmt(
                StmtKind::Expr(pkg_call(
                    "globals",
                    "SetX",
                    vec![local("v", Type::Uint64, 3)],
                    unit_ty(),
                    3,
                )),
                3,
            )]),
        }),
        2,
    )];
    let file = translate(vec![func_decl(
        "Walk",
        vec![Param::new("m", map_ty)],
        vec![],
        body,
    )]);
    let rendered = file.decls[0].render();
    assert!(rendered.contains("Data.mapIter \"m\" (λ: \"k\" \"v\","));
    assert!(rendered.contains("Globals.setX \"v\""));
}

#[test]
fn range_over_slice_reads_elements_by_index() {
    let slice_ty = Type::Slice(Box::new(Type::Uint64));
    let body = vec![stmt(
        StmtKind::For(ForStmt::RangeSlice {
            index: "i".to_string(),
            value: "x".to_string(),
            slice: param("s", slice_ty.clone(), 2),
            body: Block::new(vec![stmt(
                StmtKind::Expr(pkg_call(
                    "globals",
                    "SetX",
                    vec![local("x", Type::Uint64, 3)],
                    unit_ty(),
                    3,
                )),
                3,
            )]),
        }),
        2,
    )];
    let file = translate(vec![func_decl(
        "Each",
        vec![Param::new("s", slice_ty)],
        vec![],
        body,
    )]);
    let rendered = file.decls[0].render();
    assert!(rendered.contains("let: \"i\" := #0 in"));
    assert!(rendered.contains("(for: (\"i\" < slice.length \"s\"); (\"i\" + #1) :="));
    assert!(rendered.contains("let: \"x\" := Data.sliceRead \"s\" \"i\" in"));
    assert!(rendered.contains("Continue \"i\")"));
}

#[test]
fn break_and_continue_carry_the_accumulator() {
    // for { if done { break }; continue }
    let body = vec![stmt(
        StmtKind::For(ForStmt::Infinite {
            body: Block::new(vec![
                stmt(
                    StmtKind::If(IfStmt {
                        cond: param("done", Type::Bool, 3),
                        then: Block::new(vec![stmt(StmtKind::Break, 4)]),
                        els: None,
                    }),
                    3,
                ),
                stmt(StmtKind::Continue, 5),
            ]),
        }),
        2,
    )];
    let file = translate(vec![func_decl(
        "Spin",
        vec![Param::new("done", Type::Bool)],
        vec![],
        body,
    )]);
    let rendered = file.decls[0].render();
    assert!(rendered.contains("let: <> := #() in"));
    assert!(rendered.contains("(for: (#true); (#()) :="));
    assert!(rendered.contains("LoopRet #()"));
    assert!(rendered.contains("Continue #()"));
}

#[test]
fn go_statements_fork_the_call() {
    let body = vec![stmt(
        StmtKind::Go(ast::CallExpr {
            target: CallTarget::Package {
                package: "filesys".to_string(),
                name: "Close".to_string(),
            },
            args: vec![param("f", Type::Uint64, 2)],
            variadic: false,
        }),
        2,
    )];
    let file = translate(vec![func_decl(
        "CloseLater",
        vec![Param::new("f", Type::Uint64)],
        vec![],
        body,
    )]);
    let rendered = file.decls[0].render();
    assert!(rendered.contains("Fork (FS.close \"f\");;"));
}

#[test]
fn named_results_feed_bare_returns() {
    let body = vec![stmt(StmtKind::Return(vec![]), 2)];
    let file = translate(vec![func_decl(
        "Pair",
        vec![
            Param::new("a", Type::Uint64),
            Param::new("b", Type::Bool),
        ],
        vec![
            ResultParam {
                name: Some("a".to_string()),
                ty: Type::Uint64,
            },
            ResultParam {
                name: Some("b".to_string()),
                ty: Type::Bool,
            },
        ],
        body,
    )]);
    let rendered = file.decls[0].render();
    assert!(rendered.contains("(\"a\", \"b\")."));
}

#[test]
fn methods_mangle_through_the_struct_name() {
    let table = Decl::new(
        DeclKind::Struct(StructDecl {
            name: "Table".to_string(),
            fields: vec![Field {
                name: Some("Index".to_string()),
                ty: Type::Uint64,
            }],
        }),
        pos(1),
    );
    let recv_ty = Type::Pointer(Box::new(Type::Named("Table".to_string())));
    let method = Decl::new(
        DeclKind::Func(FuncDecl {
            name: "Index".to_string(),
            receiver: Some(Param::new("t", recv_ty.clone())),
            params: vec![],
            results: vec![ResultParam {
                name: None,
                ty: Type::Uint64,
            }],
            body: Block::new(vec![stmt(
                StmtKind::Return(vec![expr(
                    ExprKind::FieldAccess {
                        base: Box::new(param("t", recv_ty, 6)),
                        field: "Index".to_string(),
                    },
                    Type::Uint64,
                    6,
                )]),
                6,
            )]),
        }),
        pos(5),
    );
    let file = translate(vec![table, method]);
    let rendered = file.decls[1].render();
    assert!(rendered.starts_with("Definition Table__Index: val :="));
    assert!(rendered.contains("struct.loadF Table.S \"Index\" \"t\""));
}

#[test]
fn conversions_between_integer_widths() {
    let body = vec![stmt(
        StmtKind::Return(vec![expr(
            ExprKind::Conversion {
                to: Type::Uint64,
                arg: Box::new(param("n", Type::Uint32, 2)),
            },
            Type::Uint64,
            2,
        )]),
        2,
    )];
    let file = translate(vec![func_decl(
        "Widen",
        vec![Param::new("n", Type::Uint32)],
        vec![ResultParam {
            name: None,
            ty: Type::Uint64,
        }],
        body,
    )]);
    assert!(file.decls[0].render().contains("to_u64 \"n\"."));
}

#[test]
fn string_concat_and_inequality() {
    let concat = expr(
        ExprKind::Binary {
            op: BinOp::Add,
            left: Box::new(param("a", Type::String, 2)),
            right: Box::new(param("b", Type::String, 2)),
        },
        Type::String,
        2,
    );
    let neq = expr(
        ExprKind::Binary {
            op: BinOp::Ne,
            left: Box::new(concat.clone()),
            right: Box::new(param("b", Type::String, 2)),
        },
        Type::Bool,
        2,
    );
    let body = vec![stmt(StmtKind::Return(vec![neq]), 2)];
    let file = translate(vec![func_decl(
        "Differs",
        vec![
            Param::new("a", Type::String),
            Param::new("b", Type::String),
        ],
        vec![ResultParam {
            name: None,
            ty: Type::Bool,
        }],
        body,
    )]);
    assert!(
        file.decls[0]
            .render()
            .contains("~ (\"a\" + \"b\" = \"b\").")
    );
}

#[test]
fn diagnostics_accumulate_and_sort_by_position() {
    let chan_param = func_decl(
        "TakesChan",
        vec![Param::new("c", Type::Chan)],
        vec![],
        vec![],
    );
    let variadic_body = vec![stmt(
        StmtKind::Expr(expr(
            ExprKind::Call(ast::CallExpr {
                target: CallTarget::Func("TakesChan".to_string()),
                args: vec![],
                variadic: true,
            }),
            unit_ty(),
            9,
        )),
        9,
    )];
    let mut variadic = func_decl("CallsVariadic", vec![], vec![], variadic_body);
    variadic.pos = pos(8);

    // Declared out of source order on purpose; the report must still be
    // position-sorted.
    let err = translate_err(vec![variadic, chan_param]);
    let kinds: Vec<Kind> = err.diagnostics().iter().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![Kind::Unsupported, Kind::Unsupported]);
    let lines: Vec<u32> = err
        .diagnostics()
        .iter()
        .map(|d| d.location.expect("located").line)
        .collect();
    assert_eq!(lines, vec![1, 9]);
    assert!(err.diagnostics()[1].message.contains("variadic"));
}

#[test]
fn non_uint64_map_keys_are_an_expectation_failure() {
    let map_ty = Type::Map(Box::new(Type::String), Box::new(Type::Uint64));
    let err = translate_err(vec![func_decl(
        "BadKeys",
        vec![Param::new("m", map_ty)],
        vec![],
        vec![],
    )]);
    assert_eq!(err.diagnostics()[0].kind, Kind::Expected);
}

#[test]
fn source_comments_prefix_declaration_origin() {
    let decl = func_decl("Empty", vec![], vec![], vec![]).with_doc("Empty does nothing.");
    let config = Config {
        add_source_comments: true,
        add_types: false,
    };
    let file = translate_package(&package(vec![decl]), &config).expect("translates");
    assert!(
        file.decls[0]
            .render()
            .starts_with("(* simple.src:1\n   Empty does nothing. *)")
    );
}

#[test]
fn unknown_imports_are_reported_not_fatal_mid_walk() {
    let body = vec![
        stmt(
            StmtKind::Expr(pkg_call("time", "Sleep", vec![], unit_ty(), 2)),
            2,
        ),
        stmt(
            StmtKind::Expr(pkg_call("fmt", "Println", vec![], unit_ty(), 3)),
            3,
        ),
    ];
    let err = translate_err(vec![func_decl("Uses", vec![], vec![], body)]);
    // Both calls reported; the walk did not stop at the first.
    assert_eq!(err.diagnostics().len(), 2);
}

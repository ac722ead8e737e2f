//! Awkward-shape units: initializer allocations, anonymous and local
//! classes, deeply nested expressions, scanner reuse across units.

use crate::fixtures::*;
use crate::{InitializerPolicy, LineIndex, ScanOptions, SiteScanner, StandardRepr};
use anyhow::Result;
use syntax::{Node, NodeKind, SymbolTable};

fn padded_source() -> String {
    " ".repeat(512)
}

#[test]
fn allocation_found_under_deep_nesting() -> Result<()> {
    let src = padded_source();
    let line_map = LineIndex::new(&src);

    let mut table = SymbolTable::new();
    let foo = class_sym(&mut table, "com.example.Foo");
    let bar = method_sym(&mut table, foo, "bar", &[], "void");

    // switch (0) { case: try (x = () -> (new Baz())) {} }
    let lambda = Node::new(
        0,
        NodeKind::Lambda {
            body: Box::new(Node::new(
                0,
                NodeKind::Parens {
                    expr: Box::new(new_class(ident(7, "Baz"), "com.example.Baz")),
                },
            )),
            params: Vec::new(),
        },
    );
    let try_stmt = Node::new(
        0,
        NodeKind::Try {
            resources: vec![var_decl_init(lambda)],
            body: Box::new(block(Vec::new())),
            catches: Vec::new(),
            finalizer: None,
        },
    );
    let switch = Node::new(
        0,
        NodeKind::Switch {
            selector: Box::new(literal(0, "0")),
            cases: vec![Node::new(
                0,
                NodeKind::Case {
                    pat: None,
                    stats: vec![try_stmt],
                },
            )],
        },
    );
    let root = unit(vec![class_decl(
        foo,
        vec![method_decl(0, bar, "bar", vec![switch])],
    )]);

    let mut scanner = SiteScanner::new(&table, &line_map, &StandardRepr);
    scanner.scan_unit(&root)?;

    assert!(scanner
        .ir()
        .allocations
        .contains_key("com.example.Foo.bar/new com.example.Baz/0"));
    Ok(())
}

#[test]
fn initializer_allocation_uses_synthetic_context_by_default() -> Result<()> {
    let src = padded_source();
    let line_map = LineIndex::new(&src);

    let mut table = SymbolTable::new();
    let foo = class_sym(&mut table, "com.example.Foo");
    let bar = method_sym(&mut table, foo, "bar", &[], "void");

    // A field initializer placed after a method declaration.
    let root = unit(vec![class_decl(
        foo,
        vec![
            method_decl(0, bar, "bar", Vec::new()),
            var_decl_init(new_class(ident(9, "Baz"), "com.example.Baz")),
        ],
    )]);

    let mut scanner = SiteScanner::new(&table, &line_map, &StandardRepr);
    scanner.scan_unit(&root)?;

    assert!(scanner
        .ir()
        .allocations
        .contains_key("com.example.Foo.<clinit>/new com.example.Baz/0"));
    Ok(())
}

#[test]
fn initializer_allocation_reuses_stale_context_when_asked() -> Result<()> {
    let src = padded_source();
    let line_map = LineIndex::new(&src);

    let mut table = SymbolTable::new();
    let foo = class_sym(&mut table, "com.example.Foo");
    let bar = method_sym(&mut table, foo, "bar", &[], "void");

    let root = unit(vec![class_decl(
        foo,
        vec![
            method_decl(0, bar, "bar", Vec::new()),
            var_decl_init(new_class(ident(9, "Baz"), "com.example.Baz")),
        ],
    )]);

    let options = ScanOptions {
        initializer_policy: InitializerPolicy::ReuseLastMethod,
    };
    let mut scanner = SiteScanner::with_options(&table, &line_map, &StandardRepr, options);
    scanner.scan_unit(&root)?;

    assert!(scanner
        .ir()
        .allocations
        .contains_key("com.example.Foo.bar/new com.example.Baz/0"));
    Ok(())
}

#[test]
fn initializer_allocation_before_any_method_never_panics() -> Result<()> {
    let src = padded_source();
    let line_map = LineIndex::new(&src);

    let mut table = SymbolTable::new();
    let foo = class_sym(&mut table, "com.example.Foo");

    let root = unit(vec![class_decl(
        foo,
        vec![var_decl_init(new_class(ident(3, "Baz"), "com.example.Baz"))],
    )]);

    let options = ScanOptions {
        initializer_policy: InitializerPolicy::ReuseLastMethod,
    };
    let mut scanner = SiteScanner::with_options(&table, &line_map, &StandardRepr, options);
    scanner.scan_unit(&root)?;

    assert!(scanner
        .ir()
        .allocations
        .contains_key("com.example.Foo.<clinit>/new com.example.Baz/0"));
    Ok(())
}

fn anonymous_body_unit(table: &mut SymbolTable) -> Node {
    let foo = class_sym(table, "com.example.Foo");
    let bar = method_sym(table, foo, "bar", &[], "void");
    let anon = class_sym(table, "com.example.Foo$1");
    let run = method_sym(table, anon, "run", &[], "void");

    let anon_body = class_decl(
        anon,
        vec![method_decl(
            20,
            run,
            "run",
            vec![expr_stmt(new_class(ident(30, "Baz"), "com.example.Baz"))],
        )],
    );
    let outer_alloc = new_class_with_body(
        ident(10, "Runnable"),
        "java.lang.Runnable",
        Some(anon_body),
    );
    unit(vec![class_decl(
        foo,
        vec![method_decl(0, bar, "bar", vec![expr_stmt(outer_alloc)])],
    )])
}

#[test]
fn anonymous_body_restores_enclosing_method_context() -> Result<()> {
    let src = padded_source();
    let line_map = LineIndex::new(&src);

    let mut table = SymbolTable::new();
    let root = anonymous_body_unit(&mut table);

    let mut scanner = SiteScanner::new(&table, &line_map, &StandardRepr);
    scanner.scan_unit(&root)?;
    let ir = scanner.into_ir();

    // The allocation inside the anonymous run() names the anonymous class;
    // the outer allocation, recorded after its body was scanned, still
    // names the enclosing method.
    assert!(ir
        .allocations
        .contains_key("com.example.Foo$1.run/new com.example.Baz/0"));
    assert!(ir
        .allocations
        .contains_key("com.example.Foo.bar/new java.lang.Runnable/0"));
    Ok(())
}

#[test]
fn anonymous_body_leaks_context_under_reuse_last_method() -> Result<()> {
    let src = padded_source();
    let line_map = LineIndex::new(&src);

    let mut table = SymbolTable::new();
    let root = anonymous_body_unit(&mut table);

    let options = ScanOptions {
        initializer_policy: InitializerPolicy::ReuseLastMethod,
    };
    let mut scanner = SiteScanner::with_options(&table, &line_map, &StandardRepr, options);
    scanner.scan_unit(&root)?;
    let ir = scanner.into_ir();

    // The historical behavior: the outer allocation is recorded with the
    // anonymous run() still cached as current method.
    assert!(ir
        .allocations
        .contains_key("com.example.Foo$1.run/new java.lang.Runnable/0"));
    Ok(())
}

#[test]
fn local_class_restores_outer_scope() -> Result<()> {
    let src = padded_source();
    let line_map = LineIndex::new(&src);

    let mut table = SymbolTable::new();
    let foo = class_sym(&mut table, "com.example.Foo");
    let bar = method_sym(&mut table, foo, "bar", &[], "void");
    let local = class_sym(&mut table, "com.example.Foo$Local");
    let qux = method_sym(&mut table, local, "qux", &[], "void");

    let root = unit(vec![class_decl(
        foo,
        vec![method_decl(
            0,
            bar,
            "bar",
            vec![
                class_decl(local, vec![method_decl(15, qux, "qux", Vec::new())]),
                expr_stmt(new_class(ident(40, "Baz"), "com.example.Baz")),
            ],
        )],
    )]);

    let mut scanner = SiteScanner::new(&table, &line_map, &StandardRepr);
    scanner.scan_unit(&root)?;

    assert!(scanner
        .ir()
        .allocations
        .contains_key("com.example.Foo.bar/new com.example.Baz/0"));
    Ok(())
}

#[test]
fn reused_scanner_accumulates_across_units() -> Result<()> {
    let src = padded_source();
    let line_map = LineIndex::new(&src);

    let mut table = SymbolTable::new();
    let foo = class_sym(&mut table, "com.example.Foo");
    let bar = method_sym(&mut table, foo, "bar", &[], "void");

    let build = || {
        unit(vec![class_decl(
            foo,
            vec![method_decl(
                0,
                bar,
                "bar",
                vec![expr_stmt(new_class(ident(12, "Baz"), "com.example.Baz"))],
            )],
        )])
    };

    let mut scanner = SiteScanner::new(&table, &line_map, &StandardRepr);
    scanner.scan_unit(&build())?;
    scanner.scan_unit(&build())?;
    let ir = scanner.into_ir();

    // The allocation counter keeps running across units, the method map
    // keys on the same signature both times.
    assert_eq!(ir.allocations.len(), 2);
    assert!(ir
        .allocations
        .contains_key("com.example.Foo.bar/new com.example.Baz/0"));
    assert!(ir
        .allocations
        .contains_key("com.example.Foo.bar/new com.example.Baz/1"));
    assert_eq!(ir.methods.len(), 1);
    Ok(())
}

#[test]
fn empty_unit_produces_empty_ir() -> Result<()> {
    let line_map = LineIndex::new("");
    let table = SymbolTable::new();

    let mut scanner = SiteScanner::new(&table, &line_map, &StandardRepr);
    scanner.scan_unit(&unit(Vec::new()))?;

    assert!(scanner.ir().is_empty());
    Ok(())
}

#[test]
fn every_statement_and_expression_position_is_reached() -> Result<()> {
    let src = padded_source();
    let line_map = LineIndex::new(&src);

    let mut table = SymbolTable::new();
    let foo = class_sym(&mut table, "com.example.Foo");
    let sink = method_sym(&mut table, foo, "sink", &[], "void");

    let a = |pos: u32| new_class(ident(pos, "T"), "com.example.T");
    let empty_var = || {
        Node::new(
            0,
            NodeKind::VarDecl {
                mods: Box::new(modifiers()),
                var_type: None,
                name_expr: None,
                init: None,
            },
        )
    };

    let stats = vec![
        Node::new(
            0,
            NodeKind::For {
                init: vec![expr_stmt(a(1))],
                cond: Some(Box::new(a(2))),
                step: vec![expr_stmt(a(3))],
                body: Box::new(block(vec![expr_stmt(a(4))])),
            },
        ),
        Node::new(
            0,
            NodeKind::DoWhile {
                body: Box::new(block(Vec::new())),
                cond: Box::new(a(5)),
            },
        ),
        Node::new(
            0,
            NodeKind::ForEach {
                var: Box::new(empty_var()),
                expr: Box::new(a(6)),
                body: Box::new(block(Vec::new())),
            },
        ),
        Node::new(
            0,
            NodeKind::Labeled {
                body: Box::new(expr_stmt(a(7))),
            },
        ),
        Node::new(
            0,
            NodeKind::Switch {
                selector: Box::new(a(8)),
                cases: vec![Node::new(
                    0,
                    NodeKind::Case {
                        pat: None,
                        stats: vec![expr_stmt(a(9))],
                    },
                )],
            },
        ),
        Node::new(
            0,
            NodeKind::Synchronized {
                lock: Box::new(a(10)),
                body: Box::new(block(Vec::new())),
            },
        ),
        Node::new(
            0,
            NodeKind::Try {
                resources: vec![var_decl_init(a(11))],
                body: Box::new(block(Vec::new())),
                catches: vec![Node::new(
                    0,
                    NodeKind::Catch {
                        param: Box::new(empty_var()),
                        body: Box::new(block(vec![expr_stmt(a(12))])),
                    },
                )],
                finalizer: Some(Box::new(block(vec![expr_stmt(a(13))]))),
            },
        ),
        expr_stmt(Node::new(
            0,
            NodeKind::Conditional {
                cond: Box::new(literal(0, "true")),
                then_part: Box::new(literal(0, "0")),
                else_part: Box::new(a(14)),
            },
        )),
        Node::new(
            0,
            NodeKind::Assert {
                cond: Box::new(literal(0, "true")),
                detail: Some(Box::new(a(15))),
            },
        ),
        expr_stmt(Node::new(
            0,
            NodeKind::Lambda {
                body: Box::new(a(16)),
                params: Vec::new(),
            },
        )),
        expr_stmt(Node::new(
            0,
            NodeKind::TypeCast {
                clazz: Box::new(ident(0, "Object")),
                expr: Box::new(a(17)),
            },
        )),
        expr_stmt(Node::new(
            0,
            NodeKind::NewArray {
                annotations: Vec::new(),
                elem_type: Some(Box::new(ident(0, "T"))),
                dims: Vec::new(),
                dim_annotations: Vec::new(),
                elems: vec![a(18)],
            },
        )),
        expr_stmt(Node::new(
            0,
            NodeKind::MemberReference {
                expr: Box::new(a(19)),
                type_args: Vec::new(),
            },
        )),
        expr_stmt(Node::new(
            0,
            NodeKind::LetExpr {
                defs: Vec::new(),
                expr: Box::new(a(20)),
            },
        )),
        Node::new(0, NodeKind::Empty),
        Node::new(0, NodeKind::Erroneous),
    ];

    let root = unit(vec![class_decl(
        foo,
        vec![method_decl(0, sink, "sink", stats)],
    )]);

    let mut scanner = SiteScanner::new(&table, &line_map, &StandardRepr);
    scanner.scan_unit(&root)?;
    let ir = scanner.into_ir();

    // Twenty allocations of the same base identifier, one per construct,
    // numbered in traversal order.
    assert_eq!(ir.allocations.len(), 20);
    let base = "com.example.Foo.sink/new com.example.T";
    for seq in 0..20 {
        assert!(
            ir.allocations.contains_key(&format!("{}/{}", base, seq)),
            "missing sequence number {}",
            seq
        );
    }
    Ok(())
}

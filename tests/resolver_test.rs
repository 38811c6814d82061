use ferrox::interpreter::context::BufferedContext;
use ferrox::lexer::Lexer;
use ferrox::parser::Parser;
use ferrox::resolver::{ResolutionError, ResolvedAst, Resolver, Slot};
use ferrox::session::{RunStatus, Session};

fn resolve(source: &str) -> Result<ResolvedAst, Vec<ResolutionError>> {
    let (tokens, scan_errors) = Lexer::new(source).scan();
    assert!(scan_errors.is_empty(), "unexpected scan errors: {scan_errors:?}");
    let (ast, parse_errors) = Parser::new(source, tokens).parse();
    assert!(parse_errors.is_empty(), "unexpected parse errors: {parse_errors:?}");
    Resolver::new().resolve(ast)
}

fn slots(source: &str) -> Vec<Slot> {
    let program = resolve(source).expect("program should resolve");
    let mut slots: Vec<Slot> = program.resolution().values().copied().collect();
    slots.sort_by_key(|slot| (slot.depth, slot.index));
    slots
}

/// Runs the full pipeline and returns the diagnostics as printed.
fn diagnostics(source: &str) -> String {
    let session = Session::new(false);
    let mut context = BufferedContext::new();
    let status = session.run(source, &mut context);
    assert_eq!(status, RunStatus::HadError);
    context.into_data()
}

#[test]
fn globals_get_no_resolution_entries() {
    assert_eq!(slots("var a = 1; print a; a = 2;"), Vec::new());
}

#[test]
fn block_locals_resolve_to_declaration_slots() {
    let slots = slots("{ var first = 1; var second = 2; { print second; print first; } }");
    assert_eq!(
        slots,
        vec![Slot { depth: 1, index: 0 }, Slot { depth: 1, index: 1 }]
    );
}

#[test]
fn parameters_occupy_the_leading_slots() {
    let slots = slots("fun add(left, right) { return left + right; }\nprint add(1, 2);");
    assert_eq!(
        slots,
        vec![Slot { depth: 0, index: 0 }, Slot { depth: 0, index: 1 }]
    );
}

#[test]
fn unused_parameters_are_rejected_too() {
    assert_eq!(
        diagnostics("fun pick(left, right) { return left; }\nprint pick(1, 2);"),
        "[line 1] Error at 'right': Unused variable\n"
    );
}

#[test]
fn this_resolves_to_slot_zero_one_hop_out() {
    let program = resolve("class Holder { get() { return this; } }\nprint Holder().get();")
        .expect("program should resolve");
    let slots: Vec<Slot> = program.resolution().values().copied().collect();
    assert_eq!(slots, vec![Slot { depth: 1, index: 0 }]);
}

#[test]
fn closures_count_environment_hops() {
    let source = "\
fun outer() {
  var captured = 1;
  fun inner() { return captured; }
  return inner;
}
print outer()();
";
    let program = resolve(source).expect("program should resolve");
    // `captured` read from one frame out; `captured` and `inner` are the
    // declaration-order slots of `outer`'s frame.
    assert!(program
        .resolution()
        .values()
        .any(|slot| *slot == Slot { depth: 1, index: 0 }));
    assert!(program
        .resolution()
        .values()
        .any(|slot| *slot == Slot { depth: 0, index: 1 }));
}

#[test]
fn reading_a_local_in_its_own_initializer_is_rejected() {
    assert_eq!(
        diagnostics("{\n  var a = a;\n  print a;\n}"),
        "[line 2] Error at 'a': Can't read local variable in its own initializer.\n"
    );
}

#[test]
fn reading_a_global_in_its_own_initializer_is_rejected() {
    assert_eq!(
        diagnostics("var a = a;"),
        "[line 1] Error at 'a': Can't read local variable in its own initializer.\n"
    );
}

#[test]
fn duplicate_declaration_in_one_scope_is_rejected() {
    assert_eq!(
        diagnostics("{\n  var a = 1;\n  print a;\n  var a = 2;\n}"),
        "[line 4] Error at 'a': Already a variable with this name in this scope.\n"
    );
}

#[test]
fn unused_locals_are_hard_errors_in_declaration_order() {
    assert_eq!(
        diagnostics("{\n  var one = 1;\n  var two = 2;\n}"),
        "[line 2] Error at 'one': Unused variable\n\
         [line 3] Error at 'two': Unused variable\n"
    );
}

#[test]
fn assigning_to_a_local_counts_as_use() {
    assert!(resolve("{ var a = 1; a = 2; }").is_ok());
}

#[test]
fn top_level_return_is_rejected() {
    assert_eq!(
        diagnostics("return 1;"),
        "[line 1] Error at 'return': Can't return from top-level code.\n"
    );
}

#[test]
fn returning_a_value_from_an_initializer_is_rejected() {
    assert_eq!(
        diagnostics("class C { init() { return 1; } }"),
        "[line 1] Error at 'return': Can't return a value from an initializer.\n"
    );
}

#[test]
fn bare_return_in_an_initializer_is_allowed() {
    assert!(resolve("class C { init() { return; } }").is_ok());
}

#[test]
fn break_outside_a_loop_is_rejected() {
    assert_eq!(
        diagnostics("break;"),
        "[line 1] Error at 'break': Can't use 'break' outside of loop\n"
    );
}

#[test]
fn break_does_not_cross_a_function_boundary() {
    assert_eq!(
        diagnostics("while (true) {\n  fun leak() { break; }\n  leak();\n}"),
        "[line 2] Error at 'break': Can't use 'break' outside of loop\n"
    );
}

#[test]
fn break_inside_a_loop_resolves() {
    assert!(resolve("while (true) break;").is_ok());
    assert!(resolve("for (;;) break;").is_ok());
}

#[test]
fn this_outside_a_class_is_rejected() {
    assert_eq!(
        diagnostics("print this;"),
        "[line 1] Error at 'this': Can't use 'this' outside of a class.\n"
    );
    assert_eq!(
        diagnostics("fun loose() { print this; }\nloose();"),
        "[line 1] Error at 'this': Can't use 'this' outside of a class.\n"
    );
}

#[test]
fn methods_never_trip_the_unused_rule_for_this() {
    // `nothing` never touches `this`; only the parameter rule applies.
    assert!(resolve("class Quiet { nothing() { return 1; } }\nprint Quiet().nothing();").is_ok());
}

#[test]
fn resolution_errors_accumulate() {
    let output = diagnostics("return 1;\nbreak;");
    assert_eq!(
        output,
        "[line 1] Error at 'return': Can't return from top-level code.\n\
         [line 2] Error at 'break': Can't use 'break' outside of loop\n"
    );
}

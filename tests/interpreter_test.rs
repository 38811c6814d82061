use ferrox::interpreter::context::BufferedContext;
use ferrox::session::{RunStatus, Session};

fn run(source: &str) -> (RunStatus, String) {
    let session = Session::new(false);
    let mut context = BufferedContext::new();
    let status = session.run(source, &mut context);
    (status, context.into_data())
}

fn check_output(source: &str, expected: &str) {
    let (status, output) = run(source);
    assert_eq!(status, RunStatus::Ok, "unexpected diagnostics:\n{output}");
    assert_eq!(output, expected);
}

fn check_runtime_error(source: &str, expected: &str) {
    let (status, output) = run(source);
    assert_eq!(status, RunStatus::HadRuntimeError);
    assert_eq!(output, expected);
}

#[test]
fn arithmetic() {
    check_output("print 1 + 2;", "3\n");
    check_output("print 2 + 3 * 4;", "14\n");
    check_output("print (2 + 3) * 4;", "20\n");
    check_output("print 10 - 4 / 2;", "8\n");
    check_output("print -(-3);", "3\n");
}

#[test]
fn number_stringification() {
    check_output("print 3.0;", "3\n");
    check_output("print 2.5;", "2.5\n");
    check_output("print 10 / 4;", "2.5\n");
    check_output("print 0.0;", "0\n");
}

#[test]
fn division_by_zero_follows_ieee() {
    check_output("print 1 / 0;", "inf\n");
}

#[test]
fn string_concatenation() {
    check_output("var a = \"hi\"; a = a + \"!\"; print a;", "hi!\n");
}

#[test]
fn literals_print_their_canonical_forms() {
    check_output("print nil; print true; print false; print \"s\";", "nil\ntrue\nfalse\ns\n");
}

#[test]
fn truthiness_of_zero_and_friends() {
    check_output("print !0;", "true\n");
    check_output("print !1;", "false\n");
    check_output("print !nil;", "true\n");
    check_output("print !\"\";", "false\n");
    check_output("if (0) print \"then\"; else print \"zero is falsey\";", "zero is falsey\n");
}

#[test]
fn logical_operators_yield_the_deciding_operand() {
    check_output("print \"a\" or \"b\";", "a\n");
    check_output("print nil or \"b\";", "b\n");
    check_output("print nil and \"b\";", "nil\n");
    check_output("print 1 and 2;", "2\n");
}

#[test]
fn logical_operators_short_circuit() {
    // The right-hand side would blow up if evaluated.
    check_output("print true or missing;", "true\n");
    check_output("print false and missing;", "false\n");
}

#[test]
fn equality_is_structural_for_atoms() {
    check_output("print 1 == 1;", "true\n");
    check_output("print 1 == \"1\";", "false\n");
    check_output("print nil == nil;", "true\n");
    check_output("print nil == false;", "false\n");
    check_output("print \"a\" == \"a\";", "true\n");
    check_output("print 1 != 2;", "true\n");
}

#[test]
fn equality_is_identity_for_functions_and_instances() {
    check_output("fun f() {} print f == f;", "true\n");
    check_output(
        "class C {}\nvar i = C();\nprint i == i;\nprint C() == C();\nprint C == C;",
        "true\nfalse\ntrue\n",
    );
}

#[test]
fn while_loops() {
    check_output(
        "var i = 0; while (i < 3) { print i; i = i + 1; }",
        "0\n1\n2\n",
    );
}

#[test]
fn for_loops() {
    check_output("for (var i = 0; i < 3; i = i + 1) print i;", "0\n1\n2\n");
}

#[test]
fn break_exits_the_innermost_loop() {
    check_output(
        "var i = 0;\nwhile (true) {\n  i = i + 1;\n  if (i == 3) break;\n}\nprint i;",
        "3\n",
    );
    check_output(
        "var total = 0;\n\
         for (var i = 0; i < 3; i = i + 1) {\n\
           while (true) { total = total + 1; break; }\n\
         }\n\
         print total;",
        "3\n",
    );
}

#[test]
fn functions_and_returns() {
    check_output(
        "fun add(a, b) { return a + b; }\nprint add(1, 2);\nprint add;",
        "3\n<fn add>\n",
    );
    // Falling off the end or a bare return yields nil.
    check_output("fun noop(x) { x; } print noop(1);", "nil\n");
    check_output("fun bail(x) { if (x) return; } print bail(1);", "nil\n");
}

#[test]
fn return_unwinds_out_of_loops() {
    check_output(
        "fun firstOver(limit) {\n\
           var i = 0;\n\
           while (true) {\n\
             if (i > limit) return i;\n\
             i = i + 1;\n\
           }\n\
         }\n\
         print firstOver(3);",
        "4\n",
    );
}

#[test]
fn recursion() {
    check_output(
        "fun fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }\nprint fib(10);",
        "55\n",
    );
}

#[test]
fn closures_capture_their_declaration_environment() {
    check_output(
        "fun makeCounter() { var n = 0; fun count() { n = n + 1; print n; } return count; }\n\
         var c = makeCounter(); c(); c(); c();",
        "1\n2\n3\n",
    );
}

#[test]
fn counters_from_separate_calls_are_independent() {
    check_output(
        "fun makeCounter() { var n = 0; fun count() { n = n + 1; return n; } return count; }\n\
         var a = makeCounter();\n\
         var b = makeCounter();\n\
         print a();\nprint a();\nprint b();",
        "1\n2\n1\n",
    );
}

#[test]
fn resolution_is_lexical_not_dynamic() {
    check_output(
        "var a = \"global\";\n\
         {\n\
           fun show() { print a; }\n\
           show();\n\
           var a = \"local\";\n\
           show();\n\
           print a;\n\
         }",
        "global\nglobal\nlocal\n",
    );
}

#[test]
fn classes_and_methods() {
    check_output(
        "class Greeter { greet(name) { print \"hi \" + name; } }\nGreeter().greet(\"world\");",
        "hi world\n",
    );
    check_output("class Greeter {}\nprint Greeter;\nprint Greeter();", "Greeter\nGreeter instance\n");
}

#[test]
fn fields_are_per_instance_and_shadow_methods() {
    check_output(
        "class Box { label() { return \"method\"; } }\n\
         var box = Box();\n\
         print box.label();\n\
         box.label = \"field\";\n\
         print box.label;",
        "method\nfield\n",
    );
}

#[test]
fn set_yields_the_stored_value() {
    check_output("class Bag {}\nvar bag = Bag();\nprint bag.x = 7;", "7\n");
}

#[test]
fn initializers_bind_this_and_yield_the_instance() {
    check_output(
        "class Point { init(x, y) { this.x = x; this.y = y; } }\n\
         var p = Point(3, 4);\n\
         print p.x + p.y;\n\
         print p;",
        "7\nPoint instance\n",
    );
    // An early bare return still yields the instance.
    check_output(
        "class Freeze { init() { this.done = true; return; } }\nprint Freeze().done;",
        "true\n",
    );
}

#[test]
fn bound_methods_remember_their_instance() {
    check_output(
        "class Counter {\n\
           init() { this.count = 0; }\n\
           increment() { this.count = this.count + 1; return this.count; }\n\
         }\n\
         var counter = Counter();\n\
         var bump = counter.increment;\n\
         print bump();\n\
         print counter.increment();",
        "1\n2\n",
    );
}

#[test]
fn methods_can_reach_their_class_by_name() {
    check_output(
        "class Wrapper { make() { return Wrapper(); } }\nprint Wrapper().make();",
        "Wrapper instance\n",
    );
    // Same forward reference, but through a local binding.
    check_output(
        "{\n\
           class Pair { clone() { return Pair(); } }\n\
           var p = Pair().clone();\n\
           print p;\n\
         }",
        "Pair instance\n",
    );
}

#[test]
fn clock_is_injected() {
    check_output("print clock;", "<native fn>\n");
    check_output("print clock() > 0;", "true\n");
}

#[test]
fn undefined_variable_reads_are_runtime_errors() {
    check_runtime_error("print missing;", "Undefined variable 'missing'.\n[line 1]\n");
}

#[test]
fn assignment_never_creates_a_binding() {
    check_runtime_error("ghost = 1;", "Undefined variable 'ghost'.\n[line 1]\n");
}

#[test]
fn unary_operand_must_be_a_number() {
    check_runtime_error("print -\"x\";", "Operand must be a number.\n[line 1]\n");
}

#[test]
fn mixed_addition_is_rejected() {
    check_runtime_error(
        "print 1 + \"x\";",
        "Binary operator values not compatible\n[line 1]\n",
    );
}

#[test]
fn comparisons_require_numbers() {
    check_runtime_error("print \"a\" < \"b\";", "Operands must be numbers.\n[line 1]\n");
}

#[test]
fn only_callables_can_be_called() {
    check_runtime_error("print 1();", "Can only call functions and classes.\n[line 1]\n");
}

#[test]
fn arity_is_checked() {
    check_runtime_error(
        "fun f(a, b) { return a + b; }\nprint f(1);",
        "Expected 2 arguments but got 1.\n[line 2]\n",
    );
    check_runtime_error(
        "class Point { init(x, y) { this.x = x; this.y = y; } }\nPoint(1);",
        "Expected 2 arguments but got 1.\n[line 2]\n",
    );
    check_runtime_error("clock(1);", "Expected 0 arguments but got 1.\n[line 1]\n");
}

#[test]
fn property_access_requires_instances() {
    check_runtime_error(
        "print \"s\".length;",
        "Only instances have properties\n[line 1]\n",
    );
    check_runtime_error("1.x = 2;", "Only instances have fields\n[line 1]\n");
}

#[test]
fn undefined_properties_are_runtime_errors() {
    check_runtime_error(
        "class Empty {}\nprint Empty().missing;",
        "Undefined property 'missing'.\n[line 2]\n",
    );
}

#[test]
fn runtime_errors_stop_the_run() {
    check_runtime_error(
        "print \"before\";\nprint missing;\nprint \"after\";",
        "before\nUndefined variable 'missing'.\n[line 2]\n",
    );
}

#[test]
fn runtime_error_lines_follow_the_operator() {
    check_runtime_error(
        "var a = 1;\nvar b = \"s\";\nprint a\n  *\n  b;",
        "Operands must be numbers.\n[line 4]\n",
    );
}

#[test]
fn repl_echoes_top_level_expressions_and_keeps_globals() {
    let session = Session::new(true);
    let mut context = BufferedContext::new();
    assert_eq!(session.run("var greeting = \"hi\";", &mut context), RunStatus::Ok);
    assert_eq!(session.run("greeting + \"!\";", &mut context), RunStatus::Ok);
    // Only top-level expression statements echo.
    assert_eq!(session.run("{ 1 + 1; }", &mut context), RunStatus::Ok);
    assert_eq!(context.into_data(), "hi!\n");
}

#[test]
fn repl_errors_do_not_poison_later_lines() {
    let session = Session::new(true);
    let mut context = BufferedContext::new();
    assert_eq!(session.run("print missing;", &mut context), RunStatus::HadRuntimeError);
    assert_eq!(session.run("var x = 1;", &mut context), RunStatus::Ok);
    assert_eq!(session.run("print x;", &mut context), RunStatus::Ok);
    assert_eq!(
        context.into_data(),
        "Undefined variable 'missing'.\n[line 1]\n1\n"
    );
}

#[test]
fn repl_closures_survive_across_lines() {
    let session = Session::new(true);
    let mut context = BufferedContext::new();
    let setup = "fun tally() { var n = 0; fun bump() { n = n + 1; return n; } return bump; }\n\
                 var c = tally();";
    assert_eq!(session.run(setup, &mut context), RunStatus::Ok);
    assert_eq!(session.run("print c();", &mut context), RunStatus::Ok);
    assert_eq!(session.run("print c();", &mut context), RunStatus::Ok);
    assert_eq!(context.into_data(), "1\n2\n");
}

#[test]
fn file_mode_does_not_echo_expressions() {
    check_output("1 + 2;", "");
}

#[test]
fn scan_errors_suppress_execution() {
    let (status, output) = run("print 1; @");
    assert_eq!(status, RunStatus::HadError);
    assert_eq!(output, "[line 1] Error: Unexpected character.\n");
}

#[test]
fn unterminated_string_reports_and_suppresses() {
    let (status, output) = run("print \"abc");
    assert_eq!(status, RunStatus::HadError);
    assert_eq!(
        output,
        "[line 1] Error: Unterminated string.\n\
         [line 1] Error at end: Expect expression.\n"
    );
}

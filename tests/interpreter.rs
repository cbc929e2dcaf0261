#[cfg(test)]
mod interpreter_tests {
    use std::cell::RefCell;
    use std::io::{self, Write};
    use std::rc::Rc;

    use sprig::diagnostics::{CollectingReporter, Severity};
    use sprig::interpreter::Interpreter;
    use sprig::parser::parse;
    use sprig::scanner::scan;
    use sprig::session::{Outcome, Session};
    use sprig::value::Value;

    /// `print` sink the test can read back after the session is done.
    #[derive(Clone, Default)]
    struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

    impl Write for SharedBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.borrow_mut().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuffer {
        fn lines(&self) -> Vec<String> {
            String::from_utf8_lossy(&self.0.borrow())
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    struct Harness {
        session: Session,
        output: SharedBuffer,
        reporter: CollectingReporter,
    }

    impl Harness {
        fn new() -> Self {
            let output = SharedBuffer::default();
            Self {
                session: Session::with_output(Box::new(output.clone())),
                output,
                reporter: CollectingReporter::new(),
            }
        }

        fn run(&mut self, source: &str) -> Outcome {
            self.session.run(source, &mut self.reporter)
        }

        fn errors(&self) -> Vec<&str> {
            self.reporter
                .diagnostics
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .map(|d| d.message.as_str())
                .collect()
        }
    }

    /// Runs a program that is expected to succeed and returns what it printed.
    fn output_of(source: &str) -> Vec<String> {
        let mut harness = Harness::new();
        let outcome = harness.run(source);
        assert_eq!(
            outcome,
            Outcome::Ok,
            "program failed: {:?}",
            harness.reporter.messages()
        );
        harness.output.lines()
    }

    /// Runs a program that is expected to fail at run time.
    fn runtime_failure(source: &str) -> (Vec<String>, String) {
        let mut harness = Harness::new();
        assert_eq!(harness.run(source), Outcome::RuntimeError);
        assert!(harness.reporter.has_errors());

        let errors = harness.errors();
        assert_eq!(errors.len(), 1, "unexpected diagnostics: {:?}", errors);
        let message = errors[0].to_string();

        (harness.output.lines(), message)
    }

    // ───────────────────────── scoping ─────────────────────────

    #[test]
    fn block_shadowing_restores_outer_binding() {
        assert_eq!(
            output_of("let a = 1; { let a = 2; print a; } print a;"),
            vec!["2", "1"]
        );
    }

    #[test]
    fn assignment_reaches_enclosing_scope() {
        assert_eq!(
            output_of("let a = 1; { a = 2; { a = a + 1; } } print a;"),
            vec!["3"]
        );
    }

    #[test]
    fn assignment_to_undeclared_name_is_an_error() {
        let (printed, message) = runtime_failure("print 1; b = 2; print 3;");

        assert_eq!(printed, vec!["1"]);
        assert_eq!(message, "Undefined variable 'b'.");

        let mut harness = Harness::new();
        harness.run("b = 2;");
        assert_eq!(harness.run("print b;"), Outcome::RuntimeError);
    }

    #[test]
    fn reading_undeclared_name_is_an_error() {
        let (_, message) = runtime_failure("print nope;");
        assert_eq!(message, "Undefined variable 'nope'.");
    }

    #[test]
    fn uninitialized_variable_is_nil() {
        assert_eq!(output_of("let a; print a;"), vec!["nil"]);
    }

    #[test]
    fn global_can_be_redeclared() {
        assert_eq!(output_of("let a = 1; let a = a + 1; print a;"), vec!["2"]);
    }

    // ───────────────────────── arithmetic ──────────────────────

    #[test]
    fn precedence_and_number_formatting() {
        assert_eq!(
            output_of("print 1 + 2 * 3; print (1 + 2) * 3; print 7 / 2; print -3 - 1.5;"),
            vec!["7", "9", "3.5", "-4.5"]
        );
    }

    #[test]
    fn plus_concatenates_strings_only() {
        assert_eq!(output_of("print \"a\" + 'b';"), vec!["ab"]);

        let (_, message) = runtime_failure("print 1 + \"a\";");
        assert_eq!(message, "Operands must be two numbers or two strings.");
    }

    #[test]
    fn comparisons_need_numbers() {
        assert_eq!(
            output_of("print 1 < 2; print 2 <= 2; print 3 > 4; print 4 >= 5;"),
            vec!["true", "true", "false", "false"]
        );

        let (_, message) = runtime_failure("print \"a\" < \"b\";");
        assert_eq!(message, "Operands must be numbers.");
    }

    #[test]
    fn negation_needs_a_number() {
        let (_, message) = runtime_failure("print -\"x\";");
        assert_eq!(message, "Operand must be a number.");
    }

    #[test]
    fn division_by_zero_is_an_error() {
        let (_, message) = runtime_failure("print 1 / 0;");
        assert_eq!(message, "Division by zero.");
    }

    #[test]
    fn compound_assignment_updates_in_place() {
        assert_eq!(
            output_of("let x = 5; x += 2; x *= 3; print x; x -= 1; x /= 4; print x;"),
            vec!["21", "5"]
        );
        assert_eq!(output_of("let s = 'a'; s += 'b'; print s;"), vec!["ab"]);
    }

    // ───────────────────────── logic ───────────────────────────

    #[test]
    fn truthiness_only_rejects_nil_and_false() {
        assert_eq!(
            output_of(
                "if (0) print \"zero\"; if (\"\") print \"empty\"; \
                 if (nil) print \"nil\"; else print \"no nil\"; \
                 if (false) print \"false\";"
            ),
            vec!["zero", "empty", "no nil"]
        );
    }

    #[test]
    fn not_inverts_truthiness() {
        assert_eq!(
            output_of("print not nil; print not 0; print not not \"\";"),
            vec!["true", "false", "true"]
        );
    }

    #[test]
    fn logical_operators_return_an_operand() {
        assert_eq!(
            output_of("print nil or \"yes\"; print 1 and 2; print false and 1; print 0 or 1;"),
            vec!["yes", "2", "false", "0"]
        );
    }

    #[test]
    fn logical_operators_short_circuit() {
        let source = "
            let calls = 0;
            func touch() { calls = calls + 1; return true; }
            print false and touch();
            print true or touch();
            print calls;
            print true and touch();
            print calls;";

        assert_eq!(output_of(source), vec!["false", "true", "0", "true", "1"]);
    }

    #[test]
    fn equality_is_strict() {
        assert_eq!(
            output_of(
                "print 1 == 1; print 1 == \"1\"; print nil == false; \
                 print nil == nil; print \"a\" != \"a\"; print true == 1;"
            ),
            vec!["true", "false", "false", "true", "false", "false"]
        );
    }

    // ───────────────────────── control flow ────────────────────

    #[test]
    fn while_loop_runs_until_condition_fails() {
        assert_eq!(
            output_of("let i = 0; while (i < 3) { print i; i = i + 1; }"),
            vec!["0", "1", "2"]
        );
    }

    #[test]
    fn for_loop_counts() {
        assert_eq!(
            output_of("for (let i = 0; i < 3; i = i + 1) print i;"),
            vec!["0", "1", "2"]
        );
    }

    #[test]
    fn for_loop_variable_does_not_leak() {
        let (printed, message) =
            runtime_failure("for (let i = 0; i < 1; i = i + 1) print i; print i;");

        assert_eq!(printed, vec!["0"]);
        assert_eq!(message, "Undefined variable 'i'.");
    }

    #[test]
    fn loop_body_declarations_are_fresh_each_iteration() {
        let source = "
            let first; let last;
            for (let i = 0; i < 3; i = i + 1) {
                let j = i;
                func show() { return j; }
                if (first == nil) first = show;
                last = show;
            }
            print first();
            print last();";

        assert_eq!(output_of(source), vec!["0", "2"]);
    }

    #[test]
    fn else_binds_to_nearest_if() {
        assert_eq!(
            output_of("if (true) if (false) print 1; else print 2;"),
            vec!["2"]
        );
    }

    // ───────────────────────── functions ───────────────────────

    #[test]
    fn recursion() {
        let source = "
            func fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(10);";

        assert_eq!(output_of(source), vec!["55"]);
    }

    #[test]
    fn function_without_return_yields_nil() {
        assert_eq!(
            output_of("func f() { 1; } print f(); func g() { return; } print g();"),
            vec!["nil", "nil"]
        );
    }

    #[test]
    fn return_unwinds_nested_loops_and_blocks() {
        let source = "
            func find() {
                let i = 0;
                while (true) {
                    for (let j = 0; j < 10; j = j + 1) {
                        { if (i * 10 + j == 23) return i * 100 + j; }
                    }
                    i = i + 1;
                }
            }
            print find();";

        assert_eq!(output_of(source), vec!["203"]);
    }

    #[test]
    fn scope_is_restored_after_early_return() {
        let source = "
            let a = \"global\";
            func f() { let a = \"local\"; return a; }
            print f();
            print a;";

        assert_eq!(output_of(source), vec!["local", "global"]);
    }

    #[test]
    fn arity_mismatch_stops_execution() {
        let (printed, message) =
            runtime_failure("func f(a, b) {} print \"before\"; f(1); print \"after\";");

        assert_eq!(printed, vec!["before"]);
        assert_eq!(message, "Expected 2 arguments but got 1.");
    }

    #[test]
    fn only_functions_are_callable() {
        let (_, message) = runtime_failure("let x = 1; x();");
        assert_eq!(message, "Can only call functions.");

        let (_, message) = runtime_failure("\"text\"(1);");
        assert_eq!(message, "Can only call functions.");
    }

    #[test]
    fn functions_print_by_name() {
        assert_eq!(
            output_of("func add(a, b) { return a + b; } print add; print clock;"),
            vec!["<fn add>", "<native fn clock>"]
        );
    }

    #[test]
    fn clock_is_a_non_negative_number() {
        assert_eq!(
            output_of("let t = clock(); print t >= 0; print clock() - t >= 0;"),
            vec!["true", "true"]
        );
    }

    #[test]
    fn functions_are_first_class() {
        let source = "
            func twice(f, x) { return f(f(x)); }
            func inc(n) { return n + 1; }
            let g = inc;
            print twice(g, 1);
            print g == inc;";

        assert_eq!(output_of(source), vec!["3", "true"]);
    }

    #[test]
    fn runaway_recursion_is_a_runtime_error() {
        // Hitting the call limit needs more native stack than the default
        // test thread has in a debug build.
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let mut harness = Harness::new();

                let outcome = harness.run("func f(n) { return f(n + 1); } f(0);");
                let errors: Vec<String> =
                    harness.errors().into_iter().map(str::to_string).collect();

                let after = harness.run("print f;");
                let nested = harness.run(
                    "func down(n) { if (n == 0) return 0; return down(n - 1); } print down(100);",
                );

                (outcome, errors, after, nested, harness.output.lines())
            })
            .unwrap();

        let (outcome, errors, after, nested, printed) = handle.join().unwrap();

        assert_eq!(outcome, Outcome::RuntimeError);
        assert_eq!(errors, vec!["Stack overflow."]);
        assert_eq!(after, Outcome::Ok);
        assert_eq!(nested, Outcome::Ok);
        assert_eq!(printed, vec!["<fn f>", "0"]);
    }

    #[test]
    fn recursion_within_the_limit_is_fine() {
        use sprig::interpreter::MAX_CALL_DEPTH;

        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let source = format!(
                    "func down(n) {{ if (n == 0) return \"done\"; return down(n - 1); }} print down({});",
                    MAX_CALL_DEPTH - 1
                );
                output_of(&source)
            })
            .unwrap();

        assert_eq!(handle.join().unwrap(), vec!["done"]);
    }

    // ───────────────────────── closures ────────────────────────

    #[test]
    fn counter_closure_keeps_its_state() {
        let source = "
            func makeCounter() {
                let i = 0;
                func count() { i = i + 1; print i; }
                return count;
            }
            let counter = makeCounter();
            counter();
            counter();
            let other = makeCounter();
            other();";

        assert_eq!(output_of(source), vec!["1", "2", "1"]);
    }

    #[test]
    fn closure_outlives_the_scope_that_created_it() {
        let source = "
            let keep;
            {
                let message = \"kept\";
                func show() { print message; }
                keep = show;
            }
            keep();";

        assert_eq!(output_of(source), vec!["kept"]);
    }

    #[test]
    fn closure_observes_later_mutation() {
        let source = "
            {
                let a = 1;
                func get() { return a; }
                a = 2;
                print get();
            }";

        assert_eq!(output_of(source), vec!["2"]);
    }

    #[test]
    fn resolution_is_lexical_not_dynamic() {
        let source = "
            let a = \"global\";
            {
                func showA() { print a; }
                showA();
                let a = \"block\";
                showA();
            }";

        assert_eq!(output_of(source), vec!["global", "global"]);
    }

    // ───────────────────────── static errors ───────────────────

    #[test]
    fn syntax_error_prevents_any_execution() {
        let mut harness = Harness::new();

        assert_eq!(
            harness.run("print \"first\";\nprint 2\nprint 3;"),
            Outcome::StaticError
        );
        assert!(harness.output.lines().is_empty());
        assert_eq!(harness.errors().len(), 1);
    }

    #[test]
    fn resolve_error_prevents_any_execution() {
        let mut harness = Harness::new();

        assert_eq!(
            harness.run("print \"first\"; return 1;"),
            Outcome::StaticError
        );
        assert!(harness.output.lines().is_empty());
        assert_eq!(harness.errors(), vec!["Can't return from top-level code."]);
    }

    #[test]
    fn recovering_session_reports_every_syntax_error() {
        let output = SharedBuffer::default();
        let mut session = Session::with_output(Box::new(output.clone())).recovering();
        let mut reporter = CollectingReporter::new();

        let outcome = session.run("print ;\nprint 1;\nlet = 2;", &mut reporter);

        assert_eq!(outcome, Outcome::StaticError);
        assert_eq!(reporter.diagnostics.len(), 2);
        assert!(output.lines().is_empty());
    }

    #[test]
    fn unterminated_string_is_a_static_error() {
        let mut harness = Harness::new();

        assert_eq!(harness.run("print \"open;"), Outcome::StaticError);
        assert_eq!(harness.errors(), vec!["Unterminated string."]);
    }

    #[test]
    fn unknown_character_is_only_a_warning() {
        let mut harness = Harness::new();

        assert_eq!(harness.run("print 1 @;"), Outcome::Ok);
        assert_eq!(harness.output.lines(), vec!["1"]);
        assert!(!harness.reporter.has_errors());
        assert_eq!(harness.reporter.diagnostics.len(), 1);
        assert_eq!(harness.reporter.diagnostics[0].severity, Severity::Warning);
    }

    // ───────────────────────── sessions ────────────────────────

    #[test]
    fn session_keeps_globals_between_units() {
        let mut harness = Harness::new();

        assert_eq!(harness.run("let a = 40;"), Outcome::Ok);
        assert_eq!(
            harness.run("func add(n) { let b = 1; return a + n + b; }"),
            Outcome::Ok
        );
        assert_eq!(harness.run("print add(1);"), Outcome::Ok);

        assert_eq!(harness.output.lines(), vec!["42"]);
    }

    #[test]
    fn closures_from_earlier_units_keep_working() {
        let mut harness = Harness::new();

        harness.run(
            "func makeCounter() { let i = 0; func count() { i = i + 1; return i; } return count; }",
        );
        harness.run("let c = makeCounter();");
        harness.run("c();");
        harness.run("print c();");

        assert_eq!(harness.output.lines(), vec!["2"]);
        assert!(harness.errors().is_empty());
    }

    #[test]
    fn runtime_error_keeps_earlier_effects() {
        let mut harness = Harness::new();

        assert_eq!(
            harness.run("let a = 1; a = 2; print nope; a = 3;"),
            Outcome::RuntimeError
        );
        assert_eq!(harness.run("print a;"), Outcome::Ok);

        assert_eq!(harness.output.lines(), vec!["2"]);
    }

    #[test]
    fn runtime_errors_carry_a_position() {
        let mut harness = Harness::new();

        harness.run("let x = 1;\n\nprint -nil;");

        let diagnostic = &harness.reporter.diagnostics[0];
        assert_eq!(diagnostic.position.map(|p| p.line), Some(3));
        assert!(diagnostic.to_string().starts_with("[line 3:7] error:"));
    }

    // ───────────────────────── direct interpreter use ──────────

    #[test]
    fn unresolved_top_level_return_is_reported() {
        let mut reporter = CollectingReporter::new();
        let tokens = scan("return 1;", &mut reporter).unwrap();
        let statements = parse(&tokens, &mut reporter).unwrap();

        let mut interpreter = Interpreter::with_output(Box::new(io::sink()));
        let err = interpreter
            .interpret(&statements, Default::default())
            .unwrap_err();

        assert!(err.is_runtime());
        assert!(err.to_string().contains("Can't return from top-level code."));
    }

    /// Accepts writes but can never flush.
    struct BrokenFlush;

    impl Write for BrokenFlush {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    fn interpret_into_broken_output(source: &str) -> sprig::error::SprigError {
        let mut reporter = CollectingReporter::new();
        let tokens = scan(source, &mut reporter).unwrap();
        let statements = parse(&tokens, &mut reporter).unwrap();
        let locals = sprig::resolver::resolve(&statements).unwrap();

        let mut interpreter = Interpreter::with_output(Box::new(BrokenFlush));
        interpreter.interpret(&statements, locals).unwrap_err()
    }

    #[test]
    fn runtime_error_wins_over_a_failed_flush() {
        let err = interpret_into_broken_output("print 1; print nope;");

        assert!(err.is_runtime());
        assert!(err.to_string().contains("Undefined variable 'nope'."));
    }

    #[test]
    fn failed_flush_is_reported_after_a_clean_run() {
        let err = interpret_into_broken_output("print 1;");

        assert!(matches!(err, sprig::error::SprigError::Io(_)));
    }

    #[test]
    fn native_functions_can_be_added() {
        use sprig::callable::NativeFunction;

        let output = SharedBuffer::default();
        let mut session = Session::with_output(Box::new(output.clone()));
        session.interpreter().define_native(NativeFunction::new(
            "half",
            1,
            Box::new(|args: &[Value]| match &args[0] {
                Value::Number(n) => Ok(Value::Number(n / 2.0)),
                other => Err(format!("Can't halve a {}.", other.type_name())),
            }),
        ));

        let mut reporter = CollectingReporter::new();
        assert_eq!(session.run("print half(5);", &mut reporter), Outcome::Ok);
        assert_eq!(
            session.run("half(\"x\");", &mut reporter),
            Outcome::RuntimeError
        );

        assert_eq!(output.lines(), vec!["2.5"]);
        assert_eq!(reporter.messages(), vec!["Can't halve a string."]);
    }
}

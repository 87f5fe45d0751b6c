use crate::{
    ast::Program, environment::Environment, evaluator, object::Object, parser,
    type_checker::TypeChecker,
};

pub fn format_errors<E: ToString>(e: &[E]) -> Vec<String> {
    e.iter().map(ToString::to_string).collect()
}

/// Parses and evaluates the source in a fresh environment, ignoring parse
/// errors.
pub fn eval_src(src: &str) -> Object {
    let program = match parser::parse_program(src) {
        Ok(program) | Err((program, _)) => program,
    };
    evaluator::eval_program(&program, &Environment::new())
}

/// Each variant contains the input.
pub enum Test {
    /// The tree is the rendered program.
    Parser(&'static str),
    /// The tree is the inspected result of evaluating the program.
    Eval(&'static str),
    /// The tree is the type of the program's last statement.
    Checker(&'static str),
}

pub enum Assertion {
    TreeOk(&'static str),
    TreeError(&'static str),
    ExpectedErrors(&'static [&'static str]),
}

#[track_caller]
pub fn run_pipeline(test: Test) -> (String, Vec<String>) {
    match test {
        Test::Parser(src) => {
            let (program, errors) = parse(src);
            (program.to_string(), format_errors(&errors))
        }
        Test::Eval(src) => {
            let (program, errors) = parse(src);
            let tree = evaluator::eval_program(&program, &Environment::new()).inspect();
            (tree, format_errors(&errors))
        }
        Test::Checker(src) => {
            let (program, errors) = parse(src);
            let mut errors = format_errors(&errors);

            let (ty, type_errors) = TypeChecker::new().check_program(&program);
            errors.extend(type_errors);
            (ty.to_string(), errors)
        }
    }
}

fn parse(src: &str) -> (Program, Vec<parser::Error>) {
    match parser::parse_program(src) {
        Ok(program) => (program, vec![]),
        Err((program, errors)) => (program, errors),
    }
}

#[track_caller]
pub fn run_assertion(
    assertion: Assertion,
    formatted_actual_tree: &str,
    formatted_actual_errors: &[String],
) {
    match assertion {
        Assertion::TreeOk(expected_tree) => {
            let expected_errors: &[&str] = &[];
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::TreeError(expected_tree) => {
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim());
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors);
        }
    }
}

macro_rules! tree_tests {
    (
        use $test_kind:ident;

        $(
            fn $test_name:ident() {
                let $source_kind:ident = $source:expr;
                $($assertions_tt:tt)*
            }
        )*
    ) => {
        $(
            #[test]
            fn $test_name() {
                let test: crate::util::test_utils::Test =
                    tree_tests!(@@get_test($test_kind, $source_kind), ::indoc::indoc! { $source });
                let (formatted_actual_tree, formatted_actual_errors) =
                    crate::util::test_utils::run_pipeline(test);
                let ctx = (&formatted_actual_tree, &formatted_actual_errors);
                tree_tests!(@@expand_assertions, ctx, [$($assertions_tt)*]);
            }
        )*
    };

    (@@expand_assertions, $ctx:expr, []) => {};
    (@@expand_assertions, $ctx:expr, [
        let $assertion:ident = $assertion_expected:expr;
        $($rest_assertions_tt:tt)*
    ]) => {
        crate::util::test_utils::run_assertion(
            tree_tests!(@@assertion, $assertion, $assertion_expected),
            $ctx.0,
            $ctx.1,
        );
        tree_tests!(@@expand_assertions, $ctx, [$($rest_assertions_tt)*]);
    };

    (@@assertion, tree_ok, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeOk(::indoc::indoc! { $expected })
    };
    (@@assertion, tree_error, $expected:expr) => {
        crate::util::test_utils::Assertion::TreeError(::indoc::indoc! { $expected })
    };
    (@@assertion, expected_errors, $expected:expr) => {
        crate::util::test_utils::Assertion::ExpectedErrors($expected)
    };

    (@@get_test(parser, src), $source:expr) => {
        crate::util::test_utils::Test::Parser($source)
    };
    (@@get_test(eval, src), $source:expr) => {
        crate::util::test_utils::Test::Eval($source)
    };
    (@@get_test(checker, src), $source:expr) => {
        crate::util::test_utils::Test::Checker($source)
    };
}
pub(crate) use tree_tests;

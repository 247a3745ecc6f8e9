use crate::{
    ast::Ast,
    ast_builder::build_ast,
    cst::CstTree,
    diagnostic::Diagnostics,
    lexer, parser,
    token::Spanned,
    type_checker::{Analysis, Checker},
    util::fmt::tree,
};

pub fn format_errors<E>(e: &[Spanned<E>]) -> Vec<String>
where
    Spanned<E>: std::fmt::Display,
{
    e.iter().map(|e| format!("{e:#}")).collect()
}

/// Runs the front end on `src` up to the type checker.
///
/// Panics if the program does not lex or parse.
#[track_caller]
pub fn analyze(src: &str) -> (Ast, Analysis, Diagnostics) {
    let cst = parse(src).expect("program should parse");
    let mut ast = build_ast(&cst);
    let mut diagnostics = Diagnostics::new();
    let analysis = Checker::new(&mut diagnostics).check(&mut ast);
    (ast, analysis, diagnostics)
}

#[track_caller]
fn parse(src: &str) -> parser::ParseResult<CstTree> {
    let out = lexer::lex_str(src);
    let errors = format_errors(&out.errors().collect::<Vec<_>>());
    assert!(errors.is_empty(), "unexpected lex errors: {errors:?}");
    parser::parse_program(&out.tokens)
}

/// Each variant contains the input.
pub enum Test {
    Parser(&'static str),
    Ast(&'static str),
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
        Test::Parser(input) => {
            let (cst, errors) = match parse(input) {
                Ok(cst) => (cst, vec![]),
                Err((cst, error)) => (cst, vec![error]),
            };
            (tree::print_cst_string(&cst), format_errors(&errors))
        }
        Test::Ast(input) => {
            let (cst, errors) = match parse(input) {
                Ok(cst) => (cst, vec![]),
                Err((cst, error)) => (cst, vec![error]),
            };
            let ast = build_ast(&cst);
            (tree::print_ast_string(&ast), format_errors(&errors))
        }
        Test::Checker(input) => {
            let (cst, errors) = match parse(input) {
                Ok(cst) => (cst, vec![]),
                Err((cst, error)) => (cst, vec![error]),
            };
            let mut fmt_errors = format_errors(&errors);

            let mut ast = build_ast(&cst);
            let mut diagnostics = Diagnostics::new();
            let analysis = Checker::new(&mut diagnostics).check(&mut ast);
            fmt_errors.extend(format_errors(&analysis.errors));

            (tree::print_ast_string(&ast), fmt_errors)
        }
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
            ::pretty_assertions::assert_eq!(formatted_actual_tree.trim(), expected_tree.trim())
        }
        Assertion::ExpectedErrors(expected_errors) => {
            ::pretty_assertions::assert_eq!(formatted_actual_errors, expected_errors)
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
                    tree_tests!(@@get_test($test_kind, $source_kind), $source);
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

    (@@get_test(parser, program), $source:expr) => {
        crate::util::test_utils::Test::Parser($source)
    };
    (@@get_test(ast, program), $source:expr) => {
        crate::util::test_utils::Test::Ast($source)
    };
    (@@get_test(checker, program), $source:expr) => {
        crate::util::test_utils::Test::Checker($source)
    };
}
pub(crate) use tree_tests;

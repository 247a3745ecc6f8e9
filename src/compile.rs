//! Runs the whole pipeline over each program unit of a source file.

use crate::{
    ast::Ast,
    ast_builder::build_ast,
    codegen::{self, Image},
    cst::CstTree,
    diagnostic::{Diagnostics, Stage},
    lexer, parser,
    scope::ScopeTree,
    token::{Pos, Token},
    type_checker::Checker,
};

/// Everything produced for one program unit. Later stages are `None` when an
/// earlier one failed.
#[derive(Debug)]
pub struct ProgramOutput {
    /// 1-based.
    pub index: usize,
    pub diagnostics: Diagnostics,
    pub tokens: Vec<Token>,
    pub cst: Option<CstTree>,
    pub ast: Option<Ast>,
    pub scopes: Option<ScopeTree>,
    pub image: Option<Image>,
}

impl ProgramOutput {
    fn new(index: usize) -> ProgramOutput {
        ProgramOutput {
            index,
            diagnostics: Diagnostics::new(),
            tokens: Vec::new(),
            cst: None,
            ast: None,
            scopes: None,
            image: None,
        }
    }

    pub fn is_ok(&self) -> bool {
        self.image.is_some()
    }
}

/// Compiles every program unit in `src`, in order. Units are separated by `$`
/// and keep counting lines and columns from where the previous one ended.
pub fn compile_source(src: &str) -> Vec<ProgramOutput> {
    let mut outputs = Vec::new();
    let (mut rest, mut pos) = (src, Pos::START);
    while let Some((output, next, next_pos)) = compile_program(rest, pos, outputs.len() + 1) {
        outputs.push(output);
        rest = next;
        pos = next_pos;
    }
    report_trailing(rest, pos, &mut outputs);
    outputs
}

/// Input holding no tokens can still leave a comment or string open. Its
/// warnings go to the last unit, or to a unit of their own if there is none.
fn report_trailing(rest: &str, pos: Pos, outputs: &mut Vec<ProgramOutput>) {
    let trailing = lexer::lex(rest, pos);
    let warnings: Vec<_> = trailing
        .warnings()
        .into_iter()
        .filter(|w| w.inner != lexer::Warning::MissingEop)
        .collect();
    if warnings.is_empty() {
        return;
    }
    if outputs.is_empty() {
        outputs.push(ProgramOutput::new(1));
    }
    if let Some(last) = outputs.last_mut() {
        for warning in &warnings {
            last.diagnostics.warning(Stage::Lexer, format!("{warning:#}"));
        }
    }
}

/// Compiles the first program unit of `src`, which starts at `start`.
///
/// Returns `None` if no tokens are left. Otherwise, also returns the input
/// following the unit and the position it starts at.
pub fn compile_program(src: &str, start: Pos, index: usize) -> Option<(ProgramOutput, &str, Pos)> {
    let lexed = lexer::lex(src, start);
    if lexed.tokens.is_empty() {
        return None;
    }
    let mut output = ProgramOutput::new(index);
    let d = &mut output.diagnostics;

    d.info(Stage::Lexer, format!("Lexing program {index}..."));
    let lex_errors = lexer::report(&lexed, d);
    output.tokens = lexed.tokens;
    let rest = (lexed.remaining, lexed.next);
    if lex_errors > 0 {
        d.info(Stage::Parser, "Parsing skipped due to lex errors");
        return Some((output, rest.0, rest.1));
    }

    d.info(Stage::Parser, format!("Parsing program {index}..."));
    let (cst, error) = match parser::parse_program(&output.tokens) {
        Ok(cst) => (cst, None),
        Err((cst, error)) => (cst, Some(error)),
    };
    parser::report(&cst, error.as_ref(), d);
    let cst = output.cst.insert(cst);
    if error.is_some() {
        d.info(Stage::Ast, "AST and semantic analysis skipped due to parse errors");
        return Some((output, rest.0, rest.1));
    }

    d.info(Stage::Ast, format!("Building AST for program {index}..."));
    let mut ast = build_ast(cst);

    d.info(Stage::Semantic, format!("Analyzing program {index}..."));
    let analysis = Checker::new(d).check(&mut ast);
    let ast = output.ast.insert(ast);
    let scopes = output.scopes.insert(analysis.scopes);
    if !analysis.errors.is_empty() {
        d.info(Stage::CodeGen, "Code generation skipped due to semantic errors");
        return Some((output, rest.0, rest.1));
    }

    d.info(Stage::CodeGen, format!("Generating code for program {index}..."));
    match codegen::generate(ast, scopes, d) {
        Ok(image) => output.image = Some(image),
        Err(error) => d.error(Stage::CodeGen, error.to_string()),
    }
    Some((output, rest.0, rest.1))
}

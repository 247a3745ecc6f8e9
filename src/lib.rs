/// The lexer takes the source input, mapping it into a sequence of tokens, one
/// program unit at a time.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into a concrete syntax
/// tree.
pub mod parser;

/// The AST builder takes a concrete syntax tree and strips it down to an
/// abstract one.
pub mod ast_builder;

/// The type checker builds the scope tree of an AST, checks the soundness of
/// its types, and annotates its identifiers.
pub mod type_checker;

/// The code generator takes a checked AST, mapping it into a 256-byte image.
pub mod codegen;

/// Runs every stage over a source file, gating each one on the success of the
/// previous.
pub mod compile;

pub mod ast;
pub mod cst;
pub mod diagnostic;
pub mod scope;
pub mod token;
pub mod tree;
pub mod vm;

pub mod util {
    pub mod fmt;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

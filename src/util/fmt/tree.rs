use std::fmt;

use crate::{
    ast::{Ast, AstNode},
    cst::{Cst, CstTree},
    tree::Tree,
};

const INDENT_WIDTH: usize = 2;

/// One line per node, children indented under their parent:
///
/// ```text
/// <Program> (1:0)
///   <Block> (1:0)
///     [{] (1:0)
/// ```
pub fn print_cst_string(cst: &CstTree) -> String {
    Printer {
        tree: cst,
        suffix: no_suffix,
    }
    .to_string()
}

/// Like [`print_cst_string`]; identifiers resolved by the type checker are
/// followed by their type and declaring scope, as in `[a] (1:5): int@0`.
pub fn print_ast_string(ast: &Ast) -> String {
    Printer {
        tree: ast,
        suffix: write_info,
    }
    .to_string()
}

fn no_suffix(_: &Cst, _: &mut fmt::Formatter<'_>) -> fmt::Result {
    Ok(())
}

fn write_info(node: &AstNode, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match node.info {
        Some(info) => write!(f, ": {}@{}", info.ty, info.scope),
        None => Ok(()),
    }
}

struct Printer<'t, L> {
    tree: &'t Tree<L>,
    suffix: fn(&L, &mut fmt::Formatter<'_>) -> fmt::Result,
}

impl<L: fmt::Display> fmt::Display for Printer<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(root) = self.tree.root() else {
            return Ok(());
        };
        let mut stack = vec![(root, 0)];
        while let Some((id, depth)) = stack.pop() {
            let node = self.tree.get(id);
            sp(f, depth)?;
            write!(f, "{}", node.label)?;
            if let Some(pos) = node.pos {
                write!(f, " ({pos})")?;
            }
            (self.suffix)(&node.label, f)?;
            writeln!(f)?;
            stack.extend(node.children.iter().rev().map(|c| (*c, depth + 1)));
        }
        Ok(())
    }
}

fn sp(f: &mut fmt::Formatter<'_>, i: usize) -> fmt::Result {
    write!(f, "{:width$}", "", width = i * INDENT_WIDTH)
}

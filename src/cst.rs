use std::fmt;

use crate::{token::Token, tree::Tree};

pub type CstTree = Tree<Cst>;

/// Concrete syntax tree labels, one per grammar symbol.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Cst {
    Program,
    Block,
    StatementList,
    Statement,
    PrintStatement,
    AssignmentStatement,
    VarDecl,
    WhileStatement,
    IfStatement,
    Expression,
    IntExpression,
    StringExpression,
    BooleanExpression,
    Id,
    CharList,
    Char,
    Type,
    Digit,
    IntOp,
    BoolOp,
    BoolVal,
    /// A consumed token.
    Terminal(Token),
}

impl Cst {
    pub fn terminal(&self) -> Option<&Token> {
        match self {
            Cst::Terminal(token) => Some(token),
            _ => None,
        }
    }
}

impl Cst {
    /// The production name, or `Terminal` for consumed tokens.
    pub fn name(&self) -> &'static str {
        match self {
            Cst::Program => "Program",
            Cst::Block => "Block",
            Cst::StatementList => "StatementList",
            Cst::Statement => "Statement",
            Cst::PrintStatement => "PrintStatement",
            Cst::AssignmentStatement => "AssignmentStatement",
            Cst::VarDecl => "VarDecl",
            Cst::WhileStatement => "WhileStatement",
            Cst::IfStatement => "IfStatement",
            Cst::Expression => "Expression",
            Cst::IntExpression => "IntExpression",
            Cst::StringExpression => "StringExpression",
            Cst::BooleanExpression => "BooleanExpression",
            Cst::Id => "Id",
            Cst::CharList => "CharList",
            Cst::Char => "Char",
            Cst::Type => "Type",
            Cst::Digit => "Digit",
            Cst::IntOp => "IntOp",
            Cst::BoolOp => "BoolOp",
            Cst::BoolVal => "BoolVal",
            Cst::Terminal(_) => "Terminal",
        }
    }
}

impl fmt::Display for Cst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cst::Terminal(token) => write!(f, "[{}]", token.text),
            production => write!(f, "<{}>", production.name()),
        }
    }
}

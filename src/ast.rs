// program   ::= block
// block     ::= '{' statement* '}'
// statement ::= VariableDeclaration(type, id)
//             | AssignmentStatement(id, expr)
//             | PrintStatement(expr)
//             | WhileStatement(cond, block)
//             | IfStatement(cond, block)
//             | block
// cond      ::= Equals(expr, expr) | NotEquals(expr, expr) | bool
// expr      ::= Addition(int, expr) | cond | int | string | id

use std::fmt;

use crate::{scope::ScopeId, tree::Tree};

pub type Ast = Tree<AstNode>;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AstNode {
    pub kind: AstKind,
    /// Filled in by the type checker on identifier leaves.
    pub info: Option<Info>,
}

impl AstNode {
    pub fn new(kind: AstKind) -> AstNode {
        AstNode { kind, info: None }
    }
}

/// The resolved type of an identifier and the scope declaring it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Info {
    pub ty: Type,
    pub scope: ScopeId,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AstKind {
    Program,
    Block,
    VariableDeclaration,
    AssignmentStatement,
    PrintStatement,
    WhileStatement,
    IfStatement,
    Equals,
    NotEquals,
    /// Left operand is always an integer literal.
    Addition,

    Type(Type),
    Id(char),
    Int(u8),
    Str(Box<str>),
    Bool(bool),
}

impl fmt::Display for AstNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.kind.fmt(f)
    }
}

impl AstKind {
    pub fn is_comparison(&self) -> bool {
        matches!(self, AstKind::Equals | AstKind::NotEquals)
    }
}

impl fmt::Display for AstKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AstKind::Program => "Program",
            AstKind::Block => "Block",
            AstKind::VariableDeclaration => "VariableDeclaration",
            AstKind::AssignmentStatement => "AssignmentStatement",
            AstKind::PrintStatement => "PrintStatement",
            AstKind::WhileStatement => "WhileStatement",
            AstKind::IfStatement => "IfStatement",
            AstKind::Equals => "Equals",
            AstKind::NotEquals => "NotEquals",
            AstKind::Addition => "Addition",
            AstKind::Type(ty) => return write!(f, "[{ty}]"),
            AstKind::Id(name) => return write!(f, "[{name}]"),
            AstKind::Int(n) => return write!(f, "[{n}]"),
            AstKind::Str(s) => return write!(f, "[\"{s}\"]"),
            AstKind::Bool(b) => return write!(f, "[{b}]"),
        };
        write!(f, "<{name}>")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int,
    String,
    Boolean,
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Type::Int => "int",
            Type::String => "string",
            Type::Boolean => "boolean",
        })
    }
}

use crate::{
    ast::{Ast, AstKind, AstNode, Type},
    cst::{Cst, CstTree},
    token::{Keyword, Pos, Token, TokenKind},
    tree::{NodeId, TreeBuilder},
};

/// Rewrites a complete CST into the AST.
///
/// Punctuation, `Expression` wrappers and statement lists disappear; comparisons
/// and additions become branches holding their operands; string literals are
/// folded into a single leaf. CST shapes that don't fit are dropped.
pub fn build_ast(cst: &CstTree) -> Ast {
    let mut builder = AstBuilder {
        cst,
        ast: TreeBuilder::new(),
    };
    if let Some(root) = cst.root() {
        builder.visit(root);
    }
    builder.ast.finish()
}

struct AstBuilder<'cst> {
    cst: &'cst CstTree,
    ast: TreeBuilder<AstNode>,
}

impl<'cst> AstBuilder<'cst> {
    fn visit(&mut self, id: NodeId) {
        let cst = self.cst;
        let node = cst.get(id);
        let pos = node.pos;
        let children = node.children.as_slice();
        match node.label {
            Cst::Program => self.branch(AstKind::Program, pos, |b| b.visit_all(children)),
            Cst::Block => self.branch(AstKind::Block, pos, |b| b.visit_all(children)),
            Cst::VarDecl => {
                let ty = children.first().and_then(|t| self.var_type(*t));
                let name = children.get(1).and_then(|i| self.id_leaf(*i));
                if let (Some(ty), Some(name)) = (ty, name) {
                    self.branch(AstKind::VariableDeclaration, pos, |b| {
                        b.leaf(AstKind::Type(ty.0), Some(ty.1));
                        b.leaf(AstKind::Id(name.0), Some(name.1));
                    });
                }
            }
            Cst::AssignmentStatement => {
                let name = children.first().and_then(|i| self.id_leaf(*i));
                if let (Some(name), Some(&expr)) = (name, children.get(2)) {
                    self.branch(AstKind::AssignmentStatement, pos, |b| {
                        b.leaf(AstKind::Id(name.0), Some(name.1));
                        b.visit(expr);
                    });
                }
            }
            Cst::PrintStatement => self.branch(AstKind::PrintStatement, pos, |b| {
                if let Some(&expr) = children.get(2) {
                    b.visit(expr);
                }
            }),
            Cst::WhileStatement => self.branch(AstKind::WhileStatement, pos, |b| {
                b.visit_all(children.get(1..).unwrap_or_default());
            }),
            Cst::IfStatement => self.branch(AstKind::IfStatement, pos, |b| {
                b.visit_all(children.get(1..).unwrap_or_default());
            }),
            Cst::BooleanExpression => self.boolean_expression(children),
            Cst::IntExpression => self.int_expression(children, pos),
            Cst::StringExpression => {
                let text = children.get(1).map(|l| self.char_list(*l));
                if let Some(text) = text {
                    self.leaf(AstKind::Str(text.into_boxed_str()), pos);
                }
            }
            Cst::Id => {
                if let Some((name, pos)) = self.id_leaf(id) {
                    self.leaf(AstKind::Id(name), Some(pos));
                }
            }
            Cst::StatementList | Cst::Statement | Cst::Expression => self.visit_all(children),
            Cst::CharList
            | Cst::Char
            | Cst::Type
            | Cst::Digit
            | Cst::IntOp
            | Cst::BoolOp
            | Cst::BoolVal
            | Cst::Terminal(_) => (),
        }
    }

    fn visit_all(&mut self, children: &[NodeId]) {
        for child in children {
            self.visit(*child);
        }
    }

    /// `( left op right )` becomes `Equals`/`NotEquals` positioned at the
    /// operator; a literal becomes a boolean leaf.
    fn boolean_expression(&mut self, children: &[NodeId]) {
        if let [_, left, op, right, ..] = *children {
            let Some(op) = self.token(op) else {
                return;
            };
            let kind = match op.kind {
                TokenKind::EqEq => AstKind::Equals,
                TokenKind::NotEq => AstKind::NotEquals,
                _ => return,
            };
            self.branch(kind, Some(op.pos), |b| {
                b.visit(left);
                b.visit(right);
            });
        } else if let Some(token) = children.first().and_then(|v| self.token(*v)) {
            if let TokenKind::Boolean(value) = token.kind {
                self.leaf(AstKind::Bool(value), Some(token.pos));
            }
        }
    }

    /// `Digit` alone is an integer leaf; `Digit + Expression` becomes an
    /// `Addition` with the digit on the left and the visited rest on the right.
    fn int_expression(&mut self, children: &[NodeId], pos: Option<Pos>) {
        let Some(digit) = children.first().and_then(|d| self.token(*d)) else {
            return;
        };
        let Ok(value) = digit.text.parse::<u8>() else {
            return;
        };
        let digit_pos = digit.pos;
        match children.get(2) {
            None => self.leaf(AstKind::Int(value), Some(digit_pos)),
            Some(&rest) => self.branch(AstKind::Addition, pos, |b| {
                b.leaf(AstKind::Int(value), Some(digit_pos));
                b.visit(rest);
            }),
        }
    }

    fn char_list(&self, mut list: NodeId) -> String {
        let mut text = String::new();
        loop {
            let children = self.cst.children(list);
            let [ch, next] = *children else {
                break;
            };
            if let Some(token) = self.token(ch) {
                text.push_str(&token.text);
            }
            list = next;
        }
        text
    }

    /// The token under a wrapper node such as `Digit`, `Id` or `BoolVal`.
    fn token(&self, id: NodeId) -> Option<&'cst Token> {
        let first = *self.cst.children(id).first()?;
        self.cst.label(first).terminal()
    }

    fn id_leaf(&self, id: NodeId) -> Option<(char, Pos)> {
        if *self.cst.label(id) != Cst::Id {
            return None;
        }
        let token = self.token(id)?;
        Some((token.text.chars().next()?, token.pos))
    }

    fn var_type(&self, id: NodeId) -> Option<(Type, Pos)> {
        let token = self.token(id)?;
        let ty = match token.kind {
            TokenKind::Keyword(Keyword::Int) => Type::Int,
            TokenKind::Keyword(Keyword::String) => Type::String,
            TokenKind::Keyword(Keyword::Boolean) => Type::Boolean,
            _ => return None,
        };
        Some((ty, token.pos))
    }
}

impl AstBuilder<'_> {
    fn branch(&mut self, kind: AstKind, pos: Option<Pos>, f: impl FnOnce(&mut Self)) {
        self.ast.add_branch(AstNode::new(kind), pos);
        f(self);
        self.ast.close_children();
    }

    fn leaf(&mut self, kind: AstKind, pos: Option<Pos>) {
        self.ast.add_leaf(AstNode::new(kind), pos);
    }
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use ast;

        fn test_declarations_and_assignments() {
            let program = r#"{int a a = 1 string s s = "hi there"}$"#;
            let tree_ok = r#"
                <Program> (1:0)
                  <Block> (1:0)
                    <VariableDeclaration> (1:1)
                      [int] (1:1)
                      [a] (1:5)
                    <AssignmentStatement> (1:7)
                      [a] (1:7)
                      [1] (1:11)
                    <VariableDeclaration> (1:13)
                      [string] (1:13)
                      [s] (1:20)
                    <AssignmentStatement> (1:22)
                      [s] (1:22)
                      ["hi there"] (1:26)
            "#;
        }

        fn test_addition_nests_right() {
            let program = "{print(1 + 2 + a)}$";
            let tree_ok = "
                <Program> (1:0)
                  <Block> (1:0)
                    <PrintStatement> (1:1)
                      <Addition> (1:7)
                        [1] (1:7)
                        <Addition> (1:11)
                          [2] (1:11)
                          [a] (1:15)
            ";
        }

        fn test_comparisons() {
            let program = "{while (a != (b == true)) { if false {} }}$";
            let tree_ok = "
                <Program> (1:0)
                  <Block> (1:0)
                    <WhileStatement> (1:1)
                      <NotEquals> (1:10)
                        [a] (1:8)
                        <Equals> (1:16)
                          [b] (1:14)
                          [true] (1:19)
                      <Block> (1:26)
                        <IfStatement> (1:28)
                          [false] (1:31)
                          <Block> (1:37)
            ";
        }

        fn test_empty_string_and_nested_block() {
            let program = r#"{{s = ""}}$"#;
            let tree_ok = r#"
                <Program> (1:0)
                  <Block> (1:0)
                    <Block> (1:1)
                      <AssignmentStatement> (1:2)
                        [s] (1:2)
                        [""] (1:6)
            "#;
        }
    );
}

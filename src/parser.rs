use crate::{
    cst::{Cst, CstTree},
    diagnostic::{Diagnostics, Stage},
    token::{Keyword, Pos, Spanned, Token, TokenKind},
    tree::{NodeKind, TreeBuilder},
};

type Result<T = (), E = Spanned<Error>> = std::result::Result<T, E>;

/// On failure the tree built up to the offending token is returned along with
/// the error.
pub type ParseResult<T> = Result<T, (T, Spanned<Error>)>;

/// Parses one program unit. The token slice is expected to end with an `$`
/// token, as produced by the lexer.
pub fn parse_program(tokens: &[Token]) -> ParseResult<CstTree> {
    let mut p = Parser::new(tokens);
    let result = p.parse_program();
    let cst = p.cst.finish();
    match result {
        Ok(()) => Ok(cst),
        Err(error) => Err((cst, error)),
    }
}

/// Logs the productions recorded in `cst`, then the outcome of the parse.
pub fn report(cst: &CstTree, error: Option<&Spanned<Error>>, diagnostics: &mut Diagnostics) {
    cst.walk(|id, _| {
        let node = cst.get(id);
        if node.kind == NodeKind::Branch {
            diagnostics.debug(Stage::Parser, format!("parse{}()", node.label.name()));
        }
    });
    match error {
        None => diagnostics.info(Stage::Parser, "Parse completed successfully"),
        Some(error) => {
            diagnostics.error(Stage::Parser, format!("{error:#}"));
            diagnostics.error(Stage::Parser, "Parse failed with 1 error");
        }
    }
}

struct Parser<'tok> {
    tokens: &'tok [Token],
    cursor: usize,
    cst: TreeBuilder<Cst>,
    eop: Token,
}

impl Parser<'_> {
    fn parse_program(&mut self) -> Result {
        self.production(Cst::Program, |p| {
            p.parse_block()?;
            p.consume(TokenKind::Eop, Expected::Eop)?;
            Ok(())
        })
    }

    fn parse_block(&mut self) -> Result {
        self.production(Cst::Block, |p| {
            p.consume(TokenKind::LBrace, Expected::BlockStart)?;
            p.parse_statement_list()?;
            p.consume(TokenKind::RBrace, Expected::BlockEnd)?;
            Ok(())
        })
    }

    fn parse_statement_list(&mut self) -> Result {
        self.production(Cst::StatementList, |p| {
            while !p.is(TokenKind::RBrace) && !p.is(TokenKind::Eop) {
                p.parse_statement()?;
            }
            Ok(())
        })
    }

    fn parse_statement(&mut self) -> Result {
        self.production(Cst::Statement, |p| match p.peek().kind {
            TokenKind::Keyword(Keyword::Print) => p.parse_print_statement(),
            TokenKind::Keyword(Keyword::While) => p.parse_while_statement(),
            TokenKind::Keyword(Keyword::If) => p.parse_if_statement(),
            TokenKind::Keyword(Keyword::Int | Keyword::String | Keyword::Boolean) => {
                p.parse_var_decl()
            }
            TokenKind::Id => p.parse_assignment_statement(),
            TokenKind::LBrace => p.parse_block(),
            _ => Err(p.unexpected(Error::UnexpectedToken)),
        })
    }

    fn parse_print_statement(&mut self) -> Result {
        self.production(Cst::PrintStatement, |p| {
            p.advance();
            p.consume(TokenKind::LParen, Expected::PrintOpen)?;
            p.parse_expression()?;
            p.consume(TokenKind::RParen, Expected::ExprClose)?;
            Ok(())
        })
    }

    fn parse_assignment_statement(&mut self) -> Result {
        self.production(Cst::AssignmentStatement, |p| {
            p.parse_id()?;
            p.consume(TokenKind::Assign, Expected::Assign)?;
            p.parse_expression()
        })
    }

    fn parse_var_decl(&mut self) -> Result {
        self.production(Cst::VarDecl, |p| {
            p.production(Cst::Type, |p| {
                p.advance();
                Ok(())
            })?;
            p.parse_id()
        })
    }

    fn parse_while_statement(&mut self) -> Result {
        self.production(Cst::WhileStatement, |p| {
            p.advance();
            p.parse_boolean_expression()?;
            p.parse_block()
        })
    }

    fn parse_if_statement(&mut self) -> Result {
        self.production(Cst::IfStatement, |p| {
            p.advance();
            p.parse_boolean_expression()?;
            p.parse_block()
        })
    }

    fn parse_expression(&mut self) -> Result {
        self.production(Cst::Expression, |p| match p.peek().kind {
            TokenKind::Number => p.parse_int_expression(),
            TokenKind::Quote => p.parse_string_expression(),
            TokenKind::Boolean(_) | TokenKind::LParen => p.parse_boolean_expression(),
            TokenKind::Id => p.parse_id(),
            _ => Err(p.unexpected(Error::UnexpectedInExpr)),
        })
    }

    /// `Digit ("+" Expression)?`, so addition nests to the right.
    fn parse_int_expression(&mut self) -> Result {
        self.production(Cst::IntExpression, |p| {
            p.production(Cst::Digit, |p| {
                let token = p.advance();
                match token.text.parse::<u8>() {
                    Ok(_) => Ok(()),
                    Err(_) => Err(token.pos.wrap(Error::IntOutOfRange(token.text))),
                }
            })?;
            if p.is(TokenKind::Plus) {
                p.production(Cst::IntOp, |p| {
                    p.advance();
                    Ok(())
                })?;
                p.parse_expression()?;
            }
            Ok(())
        })
    }

    fn parse_string_expression(&mut self) -> Result {
        self.production(Cst::StringExpression, |p| {
            p.advance();
            p.parse_char_list();
            if p.is(TokenKind::Quote) {
                p.advance();
                Ok(())
            } else {
                Err(p.unexpected(Error::UnexpectedInString))
            }
        })
    }

    /// `CharList → Char CharList | ε`, built iteratively: every list opens
    /// inside the previous one and all of them are closed at the end.
    fn parse_char_list(&mut self) {
        let mut open = 0;
        loop {
            self.enter(Cst::CharList);
            open += 1;
            if !(self.is(TokenKind::Char) || self.is(TokenKind::Space)) {
                break;
            }
            self.enter(Cst::Char);
            self.advance();
            self.cst.close_children();
        }
        for _ in 0..open {
            self.cst.close_children();
        }
    }

    fn parse_boolean_expression(&mut self) -> Result {
        self.production(Cst::BooleanExpression, |p| {
            if let TokenKind::Boolean(_) = p.peek().kind {
                return p.production(Cst::BoolVal, |p| {
                    p.advance();
                    Ok(())
                });
            }
            p.consume(TokenKind::LParen, Expected::BoolExprOpen)?;
            p.parse_expression()?;
            if !matches!(p.peek().kind, TokenKind::EqEq | TokenKind::NotEq) {
                return Err(p.expected(Expected::BoolOp));
            }
            p.production(Cst::BoolOp, |p| {
                p.advance();
                Ok(())
            })?;
            p.parse_expression()?;
            p.consume(TokenKind::RParen, Expected::BoolExprClose)?;
            Ok(())
        })
    }

    fn parse_id(&mut self) -> Result {
        self.production(Cst::Id, |p| {
            p.consume(TokenKind::Id, Expected::VarName)?;
            Ok(())
        })
    }
}

impl<'tok> Parser<'tok> {
    fn new(tokens: &'tok [Token]) -> Parser<'tok> {
        let eop_pos = tokens.last().map_or(Pos::START, |t| t.pos);
        Parser {
            tokens,
            cursor: 0,
            cst: TreeBuilder::new(),
            eop: Token::new(TokenKind::Eop, "$", eop_pos),
        }
    }

    /// Records a branch for `label` at the current token, runs `f` inside it
    /// and closes it. On failure the branch is left open, since parsing stops.
    fn production(&mut self, label: Cst, f: impl FnOnce(&mut Self) -> Result) -> Result {
        self.enter(label);
        f(self)?;
        self.cst.close_children();
        Ok(())
    }

    fn enter(&mut self, label: Cst) {
        let pos = self.peek().pos;
        self.cst.add_branch(label, Some(pos));
    }

    /// Returns the current token. Past the end, a `$` is returned.
    fn peek(&self) -> &Token {
        self.tokens.get(self.cursor).unwrap_or(&self.eop)
    }

    /// Records the current token as a terminal and advances.
    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        self.cst
            .add_leaf(Cst::Terminal(token.clone()), Some(token.pos));
        if self.cursor < self.tokens.len() {
            self.cursor += 1;
        }
        token
    }

    /// Checks whether the current token matches the given one.
    fn is(&self, expect: TokenKind) -> bool {
        self.peek().kind == expect
    }

    /// Advances if the current token matches the provided one. If not, fails
    /// with the given expectation.
    fn consume(&mut self, expect: TokenKind, expected: Expected) -> Result<Token> {
        if self.is(expect) {
            Ok(self.advance())
        } else {
            Err(self.expected(expected))
        }
    }

    fn expected(&self, expected: Expected) -> Spanned<Error> {
        let found = self.peek();
        found.pos.wrap(Error::Expected {
            expected,
            found: found.text.clone(),
        })
    }

    fn unexpected(&self, error: fn(Box<str>) -> Error) -> Spanned<Error> {
        let found = self.peek();
        found.pos.wrap(error(found.text.clone()))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Expected { expected: Expected, found: Box<str> },
    /// A token that cannot start a statement.
    UnexpectedToken(Box<str>),
    UnexpectedInExpr(Box<str>),
    UnexpectedInString(Box<str>),
    /// An integer literal wider than one byte.
    IntOutOfRange(Box<str>),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Expected {
    BlockStart,
    BlockEnd,
    Eop,
    PrintOpen,
    ExprClose,
    Assign,
    VarName,
    BoolExprOpen,
    BoolOp,
    BoolExprClose,
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use parser;

        fn test_print_int() {
            let program = "{print(1)}$";
            let tree_ok = "
                <Program> (1:0)
                  <Block> (1:0)
                    [{] (1:0)
                    <StatementList> (1:1)
                      <Statement> (1:1)
                        <PrintStatement> (1:1)
                          [print] (1:1)
                          [(] (1:6)
                          <Expression> (1:7)
                            <IntExpression> (1:7)
                              <Digit> (1:7)
                                [1] (1:7)
                          [)] (1:8)
                    [}] (1:9)
                  [$] (1:10)
            ";
        }

        fn test_declaration_and_string() {
            let program = r#"{string s s="a b"}$"#;
            let tree_ok = r#"
                <Program> (1:0)
                  <Block> (1:0)
                    [{] (1:0)
                    <StatementList> (1:1)
                      <Statement> (1:1)
                        <VarDecl> (1:1)
                          <Type> (1:1)
                            [string] (1:1)
                          <Id> (1:8)
                            [s] (1:8)
                      <Statement> (1:10)
                        <AssignmentStatement> (1:10)
                          <Id> (1:10)
                            [s] (1:10)
                          [=] (1:11)
                          <Expression> (1:12)
                            <StringExpression> (1:12)
                              ["] (1:12)
                              <CharList> (1:13)
                                <Char> (1:13)
                                  [a] (1:13)
                                <CharList> (1:14)
                                  <Char> (1:14)
                                    [ ] (1:14)
                                  <CharList> (1:15)
                                    <Char> (1:15)
                                      [b] (1:15)
                                    <CharList> (1:16)
                              ["] (1:16)
                    [}] (1:17)
                  [$] (1:18)
            "#;
        }

        fn test_if_with_comparison_and_addition() {
            let program = "{if(1+a==b){}}$";
            let tree_ok = "
                <Program> (1:0)
                  <Block> (1:0)
                    [{] (1:0)
                    <StatementList> (1:1)
                      <Statement> (1:1)
                        <IfStatement> (1:1)
                          [if] (1:1)
                          <BooleanExpression> (1:3)
                            [(] (1:3)
                            <Expression> (1:4)
                              <IntExpression> (1:4)
                                <Digit> (1:4)
                                  [1] (1:4)
                                <IntOp> (1:5)
                                  [+] (1:5)
                                <Expression> (1:6)
                                  <Id> (1:6)
                                    [a] (1:6)
                            <BoolOp> (1:7)
                              [==] (1:7)
                            <Expression> (1:9)
                              <Id> (1:9)
                                [b] (1:9)
                            [)] (1:10)
                          <Block> (1:11)
                            [{] (1:11)
                            <StatementList> (1:12)
                            [}] (1:12)
                    [}] (1:13)
                  [$] (1:14)
            ";
        }

        fn test_while_true_nested_block() {
            let program = "{while true {{}}}$";
            let tree_ok = "
                <Program> (1:0)
                  <Block> (1:0)
                    [{] (1:0)
                    <StatementList> (1:1)
                      <Statement> (1:1)
                        <WhileStatement> (1:1)
                          [while] (1:1)
                          <BooleanExpression> (1:7)
                            <BoolVal> (1:7)
                              [true] (1:7)
                          <Block> (1:12)
                            [{] (1:12)
                            <StatementList> (1:13)
                              <Statement> (1:13)
                                <Block> (1:13)
                                  [{] (1:13)
                                  <StatementList> (1:14)
                                  [}] (1:14)
                            [}] (1:15)
                    [}] (1:16)
                  [$] (1:17)
            ";
        }

        fn test_missing_block_start() {
            let program = "int x x = 5";
            let tree_error = "
                <Program> (1:0)
                  <Block> (1:0)
            ";
            let expected_errors = &["1:0: Expected { at start of block, found [ int ]"];
        }

        fn test_missing_print_paren() {
            let program = "{ print 1 }$";
            let expected_errors = &["1:8: Expected ( after print, found [ 1 ]"];
        }

        fn test_missing_block_end() {
            let program = "{print(a)";
            let expected_errors = &["1:9: Expected } at end of block, found [ $ ]"];
        }

        fn test_assignment_is_not_comparison() {
            let program = "{ if (a = b) {} }$";
            let expected_errors = &["1:8: Expected == or != in boolean expression, found [ = ]"];
        }

        fn test_missing_assign() {
            let program = "{ a 1 }$";
            let expected_errors = &["1:4: Expected = in assignment, found [ 1 ]"];
        }

        fn test_missing_declared_name() {
            let program = "{ int 1 }$";
            let expected_errors = &["1:6: Expected variable name, found [ 1 ]"];
        }

        fn test_statement_start() {
            let program = "{ 5 }$";
            let expected_errors = &["1:2: Unexpected token [ 5 ]"];
        }

        fn test_expression_start() {
            let program = "{ print() }$";
            let expected_errors = &["1:8: Unexpected token in expression [ ) ]"];
        }

        fn test_unterminated_string() {
            let program = r#"{ a = "ab"#;
            let expected_errors = &["1:9: Unexpected token in string [ $ ]"];
        }

        fn test_int_out_of_range() {
            let program = "{ a = 300 }$";
            let expected_errors = &["1:6: Integer literal 300 does not fit in one byte"];
        }

        fn test_missing_close_paren_in_bool() {
            let program = "{ while (a == b {} }$";
            let expected_errors = &["1:16: Expected ) in boolean expression, found [ { ]"];
        }

        fn test_missing_print_close() {
            let program = "{ print(a }$";
            let expected_errors = &["1:10: Expected ) after expression, found [ } ]"];
        }

        fn test_bool_expr_open() {
            let program = "{ if a {} }$";
            let expected_errors = &["1:5: Expected ( in boolean expression, found [ a ]"];
        }
    );

    #[test]
    fn report_lists_productions() {
        use crate::{diagnostic::Diagnostics, lexer};
        let out = lexer::lex_str("{}$");
        let cst = super::parse_program(&out.tokens);
        assert!(cst.is_ok());
        let mut d = Diagnostics::new();
        if let Ok(cst) = &cst {
            super::report(cst, None, &mut d);
        }
        let messages: Vec<_> = d.iter().map(|d| d.message.as_str()).collect();
        pretty_assertions::assert_eq!(
            messages,
            [
                "parseProgram()",
                "parseBlock()",
                "parseStatementList()",
                "Parse completed successfully",
            ]
        );
    }
}

use crate::{
    ast::{Ast, AstKind, Info, Type},
    diagnostic::{plural, Diagnostics, Stage},
    scope::{ScopeId, ScopeTree, SymbolInfo},
    token::{Pos, Spanned},
    tree::NodeId,
};

/// What the checker leaves behind besides the annotated AST.
#[derive(Debug)]
pub struct Analysis {
    pub scopes: ScopeTree,
    pub errors: Vec<Spanned<Error>>,
    pub warnings: Vec<Spanned<Warning>>,
}

impl Analysis {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

pub struct Checker<'d> {
    scopes: ScopeTree,
    current: Option<ScopeId>,
    errors: Vec<Spanned<Error>>,
    diagnostics: &'d mut Diagnostics,
}

impl Checker<'_> {
    pub fn new(diagnostics: &mut Diagnostics) -> Checker<'_> {
        Checker {
            scopes: ScopeTree::new(),
            current: None,
            errors: Vec::with_capacity(8),
            diagnostics,
        }
    }

    /// Builds the scope tree, type checks every statement and annotates each
    /// identifier leaf of `ast` with its type and declaring scope. Errors
    /// never stop the walk.
    pub fn check(mut self, ast: &mut Ast) -> Analysis {
        if let Some(root) = ast.root() {
            self.visit(ast, root);
        }
        let warnings = self.collect_warnings();

        let warning_count = plural(warnings.len(), "warning");
        if self.errors.is_empty() {
            self.diagnostics.info(
                Stage::Semantic,
                format!("Semantic analysis completed with 0 errors and {warning_count}"),
            );
        } else {
            let error_count = plural(self.errors.len(), "error");
            self.diagnostics.error(
                Stage::Semantic,
                format!("Semantic analysis failed with {error_count} and {warning_count}"),
            );
        }

        Analysis {
            scopes: self.scopes,
            errors: self.errors,
            warnings,
        }
    }

    fn visit(&mut self, ast: &mut Ast, id: NodeId) {
        let children = ast.children(id).to_vec();
        match ast.label(id).kind {
            AstKind::Program => {
                for child in children {
                    self.visit(ast, child);
                }
            }
            AstKind::Block => {
                let scope = self.scopes.push(self.current);
                let depth = self.scopes.get(scope).depth;
                self.debug(format!("Entering scope {scope} (depth {depth})"));
                self.current = Some(scope);
                for child in children {
                    self.visit(ast, child);
                }
                self.debug(format!("Leaving scope {scope}"));
                self.current = self.scopes.get(scope).parent;
            }
            AstKind::VariableDeclaration => {
                if let [ty, name] = children[..] {
                    self.declare(ast, ty, name);
                }
            }
            AstKind::AssignmentStatement => {
                if let [target, expr] = children[..] {
                    self.assign(ast, target, expr);
                }
            }
            AstKind::PrintStatement => {
                if let Some(&expr) = children.first() {
                    self.type_of(ast, expr);
                }
            }
            AstKind::WhileStatement | AstKind::IfStatement => {
                if let [cond, block] = children[..] {
                    self.type_of(ast, cond);
                    self.visit(ast, block);
                }
            }
            // Expressions are only reached through `type_of`.
            AstKind::Equals
            | AstKind::NotEquals
            | AstKind::Addition
            | AstKind::Type(_)
            | AstKind::Id(_)
            | AstKind::Int(_)
            | AstKind::Str(_)
            | AstKind::Bool(_) => {}
        }
    }

    fn declare(&mut self, ast: &mut Ast, ty_node: NodeId, name_node: NodeId) {
        let (AstKind::Type(ty), AstKind::Id(name)) =
            (&ast.label(ty_node).kind, &ast.label(name_node).kind)
        else {
            return;
        };
        let (ty, name) = (*ty, *name);
        let Some(scope) = self.current else {
            return;
        };
        let pos = pos_of(ast, name_node);

        let symbol = SymbolInfo::new(name, ty, pos);
        match self.scopes.declare(scope, symbol) {
            Ok(()) => {
                self.debug(format!("Declared {ty} {name} in scope {scope}"));
            }
            Err(previous) => {
                let previous = previous.pos;
                self.error(pos.wrap(Error::Redeclared { name, previous }));
            }
        }
        annotate(ast, name_node, ty, scope);
    }

    fn assign(&mut self, ast: &mut Ast, target: NodeId, expr: NodeId) {
        let AstKind::Id(name) = ast.label(target).kind else {
            return;
        };
        let pos = pos_of(ast, target);
        let declared = self.resolve(name);
        if declared.is_none() {
            self.error(pos.wrap(Error::UndeclaredAssignment(name)));
        }

        let value = self.type_of(ast, expr);

        let Some((scope, expected)) = declared else {
            return;
        };
        annotate(ast, target, expected, scope);
        match value {
            Some(found) if found != expected => {
                self.error(pos.wrap(Error::AssignmentMismatch {
                    name,
                    expected,
                    found,
                }));
            }
            Some(_) => {
                if let Some(symbol) = self.scopes.lookup_mut(scope, name) {
                    symbol.initialized = true;
                }
                self.debug(format!("Assigned {expected} {name} in scope {scope}"));
            }
            // Already reported.
            None => {}
        }
    }

    /// Computes the type of an expression, marking identifiers as used.
    /// `None` stands for an unknown type, after an error was reported.
    fn type_of(&mut self, ast: &mut Ast, id: NodeId) -> Option<Type> {
        let pos = pos_of(ast, id);
        match ast.label(id).kind {
            AstKind::Int(_) => Some(Type::Int),
            AstKind::Str(_) => Some(Type::String),
            AstKind::Bool(_) => Some(Type::Boolean),
            AstKind::Id(name) => self.use_id(ast, id, name, pos),
            AstKind::Addition => {
                let [left, right] = ast.children(id)[..] else {
                    return None;
                };
                let left = self.type_of(ast, left)?;
                let right = self.type_of(ast, right)?;
                match (left, right) {
                    (Type::Int, Type::Int) => Some(Type::Int),
                    (Type::Int, other) | (other, _) => {
                        self.error(pos.wrap(Error::AdditionMismatch(other)));
                        None
                    }
                }
            }
            AstKind::Equals | AstKind::NotEquals => {
                let [left, right] = ast.children(id)[..] else {
                    return None;
                };
                let left = self.type_of(ast, left);
                let right = self.type_of(ast, right);
                let (left, right) = (left?, right?);
                if left == right {
                    Some(Type::Boolean)
                } else {
                    self.error(pos.wrap(Error::ComparisonMismatch { left, right }));
                    None
                }
            }
            AstKind::Program
            | AstKind::Block
            | AstKind::VariableDeclaration
            | AstKind::AssignmentStatement
            | AstKind::PrintStatement
            | AstKind::WhileStatement
            | AstKind::IfStatement
            | AstKind::Type(_) => None,
        }
    }

    fn use_id(&mut self, ast: &mut Ast, id: NodeId, name: char, pos: Pos) -> Option<Type> {
        let Some((scope, ty)) = self.resolve(name) else {
            self.error(pos.wrap(Error::Undeclared(name)));
            return None;
        };
        if let Some(symbol) = self.scopes.lookup_mut(scope, name) {
            symbol.used = true;
            if !symbol.initialized {
                symbol.used_before_init = true;
            }
        }
        annotate(ast, id, ty, scope);
        Some(ty)
    }

    fn resolve(&self, name: char) -> Option<(ScopeId, Type)> {
        let (scope, symbol) = self.scopes.lookup(self.current?, name)?;
        Some((scope, symbol.ty))
    }

    /// Scans every symbol, scopes in creation order and names in order.
    fn collect_warnings(&mut self) -> Vec<Spanned<Warning>> {
        let mut warnings = Vec::new();
        for scope in self.scopes.iter() {
            for symbol in scope.symbols.values() {
                let name = symbol.name;
                if !symbol.used && !symbol.initialized {
                    warnings.push(symbol.pos.wrap(Warning::Unused(name)));
                }
                if symbol.used_before_init {
                    warnings.push(symbol.pos.wrap(Warning::UsedBeforeInit(name)));
                }
                if symbol.initialized && !symbol.used {
                    warnings.push(symbol.pos.wrap(Warning::InitializedButUnused(name)));
                }
            }
        }
        for warning in &warnings {
            self.diagnostics
                .warning(Stage::Semantic, format!("{warning:#}"));
        }
        warnings
    }

    fn error(&mut self, error: Spanned<Error>) {
        self.diagnostics.error(Stage::Semantic, format!("{error:#}"));
        self.errors.push(error);
    }

    fn debug(&mut self, message: String) {
        self.diagnostics.debug(Stage::Semantic, message);
    }
}

fn pos_of(ast: &Ast, id: NodeId) -> Pos {
    ast.get(id).pos.unwrap_or(Pos::START)
}

fn annotate(ast: &mut Ast, id: NodeId, ty: Type, scope: ScopeId) {
    ast.get_mut(id).label.info = Some(Info { ty, scope });
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Error {
    Redeclared { name: char, previous: Pos },
    UndeclaredAssignment(char),
    Undeclared(char),
    AssignmentMismatch { name: char, expected: Type, found: Type },
    /// Carries the offending operand type.
    AdditionMismatch(Type),
    ComparisonMismatch { left: Type, right: Type },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Warning {
    /// Neither initialized nor used.
    Unused(char),
    UsedBeforeInit(char),
    InitializedButUnused(char),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::test_utils::{analyze, tree_tests};
    use pretty_assertions::assert_eq;

    tree_tests!(
        use checker;

        fn test_annotates_identifiers() {
            let program = "{int a a = 1 {boolean a a = true print(a)} print(1 + a)}$";
            let tree_ok = "
                <Program> (1:0)
                  <Block> (1:0)
                    <VariableDeclaration> (1:1)
                      [int] (1:1)
                      [a] (1:5): int@0
                    <AssignmentStatement> (1:7)
                      [a] (1:7): int@0
                      [1] (1:11)
                    <Block> (1:13)
                      <VariableDeclaration> (1:14)
                        [boolean] (1:14)
                        [a] (1:22): boolean@1
                      <AssignmentStatement> (1:24)
                        [a] (1:24): boolean@1
                        [true] (1:28)
                      <PrintStatement> (1:33)
                        [a] (1:39): boolean@1
                    <PrintStatement> (1:43)
                      <Addition> (1:49)
                        [1] (1:49)
                        [a] (1:53): int@0
            ";
        }

        fn test_redeclaration_in_same_scope() {
            let program = "{int a\nstring a}$";
            let expected_errors = &["2:7: Variable 'a' already declared in this scope at 1:5"];
        }

        fn test_undeclared() {
            let program = "{a = 1 print(b)}$";
            let expected_errors = &[
                "1:1: Assignment to undeclared variable 'a'",
                "1:13: Variable 'b' used but never declared",
            ];
        }

        fn test_assignment_mismatch() {
            let program = r#"{int a a = "no"}$"#;
            let expected_errors = &["1:7: Type mismatch: cannot assign string to 'a' of type int"];
        }

        fn test_addition_mismatch() {
            let program = "{boolean b int a a = 1 + b}$";
            let expected_errors = &["1:21: Type mismatch: cannot add boolean to int"];
        }

        fn test_comparison_mismatch() {
            let program = r#"{if (1 == "a") {}}$"#;
            let expected_errors = &["1:7: Type mismatch: cannot compare int with string"];
        }

        fn test_unknown_operands_do_not_cascade() {
            let program = "{int a a = 1 + z}$";
            let expected_errors = &["1:15: Variable 'z' used but never declared"];
        }
    );

    #[test]
    fn shadowing_in_nested_block_is_allowed() {
        let (_, analysis, _) = analyze("{int a a = 1 {int a a = 2 print(a)} print(a)}$");
        assert!(analysis.is_ok());
        assert_eq!(analysis.scopes.len(), 2);
        assert!(analysis.warnings.is_empty());
    }

    #[test]
    fn warnings_in_declaration_order() {
        let (_, analysis, _) = analyze("{int c int b int a print(b) a = 1}$");
        let warnings: Vec<_> = analysis
            .warnings
            .iter()
            .map(|w| format!("{w:#}"))
            .collect();
        assert_eq!(
            warnings,
            [
                "1:17: Variable 'a' declared and initialized but never used",
                "1:11: Variable 'b' used before being initialized",
                "1:5: Variable 'c' declared but never used",
            ]
        );
    }

    #[test]
    fn failed_assignment_does_not_initialize() {
        let (_, analysis, _) = analyze("{int a a = true}$");
        assert_eq!(analysis.errors.len(), 1);
        let symbol = analysis
            .scopes
            .lookup(ScopeId::GLOBAL, 'a')
            .map(|(_, s)| s.initialized);
        assert_eq!(symbol, Some(false));
        assert_eq!(analysis.warnings.len(), 1);
    }

    #[test]
    fn reports_summary() {
        let (_, _, diagnostics) = analyze("{int a int b b = 2 print(b)}$");
        let last = diagnostics.iter().last().map(|d| d.message.clone());
        assert_eq!(
            last.as_deref(),
            Some("Semantic analysis completed with 0 errors and 1 warning")
        );
    }
}

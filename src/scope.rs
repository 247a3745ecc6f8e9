//! Lexical scopes, built alongside the AST walk of the type checker.

use std::{collections::BTreeMap, fmt};

use crate::{ast::Type, token::Pos};

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub const GLOBAL: ScopeId = ScopeId(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for ScopeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SymbolInfo {
    pub name: char,
    pub ty: Type,
    /// Where it was declared.
    pub pos: Pos,
    pub initialized: bool,
    pub used: bool,
    pub used_before_init: bool,
}

impl SymbolInfo {
    pub fn new(name: char, ty: Type, pos: Pos) -> SymbolInfo {
        SymbolInfo {
            name,
            ty,
            pos,
            initialized: false,
            used: false,
            used_before_init: false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Scope {
    pub id: ScopeId,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    pub depth: u32,
    pub symbols: BTreeMap<char, SymbolInfo>,
}

/// All scopes of a program, indexed by [`ScopeId`] in creation order. The
/// first scope created is the global one.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
}

impl ScopeTree {
    pub fn new() -> ScopeTree {
        ScopeTree::default()
    }

    /// Opens a scope nested in `parent` (or the root scope if `None`).
    pub fn push(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).unwrap_or(u32::MAX));
        let depth = parent.map_or(0, |p| self.get(p).depth + 1);
        if let Some(parent) = parent {
            self.get_mut(parent).children.push(id);
        }
        self.scopes.push(Scope {
            id,
            parent,
            children: Vec::new(),
            depth,
            symbols: BTreeMap::new(),
        });
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    /// Adds `symbol` to `scope`. If the name is already declared in that very
    /// scope, the existing declaration is returned instead.
    pub fn declare(&mut self, scope: ScopeId, symbol: SymbolInfo) -> Result<(), &SymbolInfo> {
        use std::collections::btree_map::Entry;
        match self.get_mut(scope).symbols.entry(symbol.name) {
            Entry::Vacant(entry) => {
                entry.insert(symbol);
                Ok(())
            }
            Entry::Occupied(entry) => Err(&*entry.into_mut()),
        }
    }

    /// Finds the nearest declaration of `name`, walking outwards from `scope`.
    pub fn resolve(&self, scope: ScopeId, name: char) -> Option<ScopeId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let scope = self.get(id);
            if scope.symbols.contains_key(&name) {
                return Some(id);
            }
            current = scope.parent;
        }
        None
    }

    pub fn lookup(&self, scope: ScopeId, name: char) -> Option<(ScopeId, &SymbolInfo)> {
        let id = self.resolve(scope, name)?;
        Some((id, self.get(id).symbols.get(&name)?))
    }

    pub fn lookup_mut(&mut self, scope: ScopeId, name: char) -> Option<&mut SymbolInfo> {
        let id = self.resolve(scope, name)?;
        self.get_mut(id).symbols.get_mut(&name)
    }

    /// Scopes in creation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Scope> {
        self.scopes.iter()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Renders the symbol table, one symbol per row.
impl fmt::Display for ScopeTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Name  Type     Scope  Line:Col")?;
        for scope in &self.scopes {
            for symbol in scope.symbols.values() {
                writeln!(
                    f,
                    "{:<5} {:<8} {:<6} {}",
                    symbol.name,
                    symbol.ty.to_string(),
                    scope.id.to_string(),
                    symbol.pos
                )?;
            }
        }
        Ok(())
    }
}

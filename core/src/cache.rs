//! # Symbolic Variable Cache
//!
//! Maps the entities the encodings talk about to SAT variables. Asking for an
//! entity twice yields the same variable; two different entities never share
//! a variable. Entries can be forgotten back to a mark, which is how a
//! session retracts a scope.

use rustsat::{
    instances::ManageVars,
    types::{RsHashMap, Var},
};

use crate::{
    graph::{Edge, VertexId},
    types::EdgeKey,
    Error, Stage,
};

/// An entity that is represented by a SAT variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Symbol {
    /// `order(vertex) >= threshold` in the order encoding
    Order { vertex: VertexId, threshold: u32 },
    /// `first` precedes `second` in a linear order, with `first < second`
    Precedes { first: VertexId, second: VertexId },
    /// The edge is part of the feedback arc set
    Cut(Edge),
    /// Selector of a tracked constraint
    Selector(EdgeKey),
}

#[derive(Debug, Clone, Default)]
pub struct SymbolCache {
    vars: RsHashMap<Symbol, Var>,
    symbols: RsHashMap<Var, Symbol>,
    /// Symbols in creation order
    history: Vec<Symbol>,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the variable of a symbol, creating it if needed
    pub fn get_or_create(
        &mut self,
        symbol: Symbol,
        var_manager: &mut dyn ManageVars,
    ) -> Result<Var, Error> {
        if let Some(&var) = self.vars.get(&symbol) {
            return Ok(var);
        }
        self.insert(symbol, var_manager)
    }

    /// Creates the selector variable of a tracked constraint. Fails if the
    /// name is already in use.
    pub fn track(&mut self, name: EdgeKey, var_manager: &mut dyn ManageVars) -> Result<Var, Error> {
        let symbol = Symbol::Selector(name);
        if self.vars.contains_key(&symbol) {
            return Err(Error::NameCollision {
                name: name.to_string(),
                stage: Stage::Encoding,
            });
        }
        self.insert(symbol, var_manager)
    }

    fn insert(&mut self, symbol: Symbol, var_manager: &mut dyn ManageVars) -> Result<Var, Error> {
        let var = var_manager.new_var();
        if let Some(other) = self.symbols.get(&var) {
            return Err(Error::NameCollision {
                name: format!("{var:?} (held by {other:?})"),
                stage: Stage::Encoding,
            });
        }
        self.vars.insert(symbol, var);
        self.symbols.insert(var, symbol);
        self.history.push(symbol);
        Ok(var)
    }

    pub fn get(&self, symbol: Symbol) -> Option<Var> {
        self.vars.get(&symbol).copied()
    }

    /// Reverse lookup of the symbol a variable stands for
    pub fn lookup(&self, var: Var) -> Option<Symbol> {
        self.symbols.get(&var).copied()
    }

    /// A mark to later forget all symbols created after it
    pub fn mark(&self) -> usize {
        self.history.len()
    }

    /// Forgets all symbols created after `mark`
    pub fn forget_from(&mut self, mark: usize) {
        for symbol in self.history.drain(mark..) {
            if let Some(var) = self.vars.remove(&symbol) {
                self.symbols.remove(&var);
            }
        }
    }

    pub fn clear(&mut self) {
        self.vars.clear();
        self.symbols.clear();
        self.history.clear();
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }
}

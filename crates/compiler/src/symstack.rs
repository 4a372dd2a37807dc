//! Stack of scope frames.
//!
//! The bottom frame is always the global frame and is the only one holding
//! function symbols. Lookup walks from the top; the first match wins. Every
//! frame gets a unique id from a counter owned by the stack — ids are
//! monotonic and never reused, which is the sole property the emitter needs
//! to make all synthesized labels and variable names globally unique.

use crate::symtable::{SymTable, Symbol, SymbolKind};

/// What kind of construct opened a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Function,
    WhileLoop,
    RepeatUntilLoop,
    ForLoop,
    Condition,
    Global,
}

impl ScopeKind {
    pub fn is_loop(self) -> bool {
        matches!(
            self,
            ScopeKind::WhileLoop | ScopeKind::RepeatUntilLoop | ScopeKind::ForLoop
        )
    }
}

/// Identity of one scope frame.
#[derive(Debug, Clone, Copy)]
pub struct ScopeInfo {
    pub kind: ScopeKind,
    pub level: usize,
    pub unique_id: u64,
}

struct Frame {
    table: SymTable,
    info: ScopeInfo,
    /// Set only on `Function` frames.
    fun_name: Option<String>,
}

/// The scope stack. Creating one pushes the global frame.
pub struct ScopeStack {
    frames: Vec<Frame>,
    next_id: u64,
}

impl ScopeStack {
    pub fn new() -> ScopeStack {
        let mut stack = ScopeStack {
            frames: Vec::new(),
            next_id: 0,
        };
        stack.push(ScopeKind::Global, None);
        stack
    }

    /// Push a fresh frame; allocates the next unique id.
    pub fn push(&mut self, kind: ScopeKind, fun_name: Option<&str>) {
        let info = ScopeInfo {
            kind,
            level: self.frames.len(),
            unique_id: self.next_id,
        };
        self.next_id += 1;
        tracing::debug!(?kind, id = info.unique_id, level = info.level, "push scope");
        self.frames.push(Frame {
            table: SymTable::new(),
            info,
            fun_name: fun_name.map(str::to_string),
        });
    }

    /// Pop the top frame, dropping every symbol it owns. The global frame is
    /// never popped.
    pub fn pop(&mut self) {
        debug_assert!(self.frames.len() > 1, "attempt to pop the global frame");
        if self.frames.len() > 1 {
            let frame = self.frames.pop().expect("len checked");
            tracing::debug!(id = frame.info.unique_id, "pop scope");
        }
    }

    /// Identity of the innermost scope.
    pub fn scope_info(&self) -> ScopeInfo {
        self.frames.last().expect("global frame always present").info
    }

    /// Walk from the top frame down, returning the first symbol with this
    /// name and the frame it lives in.
    pub fn get_symbol(&self, name: &str) -> Option<(&Symbol, ScopeInfo)> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.table.get(name).map(|symbol| (symbol, frame.info)))
    }

    /// As [`get_symbol`](Self::get_symbol), but stops before the global
    /// frame. Used to decide whether an identifier is a local variable.
    pub fn get_local_symbol(&self, name: &str) -> Option<(&Symbol, ScopeInfo)> {
        self.frames
            .iter()
            .skip(1)
            .rev()
            .find_map(|frame| frame.table.get(name).map(|symbol| (symbol, frame.info)))
    }

    /// Insert a symbol into the innermost scope.
    pub fn put_symbol(&mut self, name: &str, kind: SymbolKind) -> &mut Symbol {
        let frame = self.frames.last_mut().expect("global frame always present");
        frame.table.put(name, kind, frame.info.unique_id)
    }

    /// True when the innermost scope already declares `name`.
    pub fn top_contains(&self, name: &str) -> bool {
        self.frames
            .last()
            .expect("global frame always present")
            .table
            .contains(name)
    }

    /// The global frame's table (function symbols, builtins).
    pub fn global(&self) -> &SymTable {
        &self.frames[0].table
    }

    /// Insert a function symbol into the global frame regardless of the
    /// current nesting.
    pub fn put_function(&mut self, name: &str, kind: SymbolKind) -> &mut Symbol {
        let id = self.frames[0].info.unique_id;
        self.frames[0].table.put(name, kind, id)
    }

    /// Name of the function whose body is being parsed, if any.
    pub fn enclosing_function_name(&self) -> Option<&str> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.info.kind == ScopeKind::Function)
            .and_then(|frame| frame.fun_name.as_deref())
    }

    /// Unique id of the nearest enclosing loop frame. `break` is legal
    /// exactly when this returns `Some`, and jumps to that frame's end
    /// label.
    pub fn enclosing_loop_id(&self) -> Option<u64> {
        self.frames
            .iter()
            .rev()
            .find(|frame| frame.info.kind.is_loop())
            .map(|frame| frame.info.unique_id)
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}

//! Builtin function registry.
//!
//! Builtins are ordinary function symbols in the global frame, pre-marked
//! declared, defined, and builtin, with both signature records filled. Their
//! bodies are emitted by the generator's runtime library; the parser treats
//! a call to them like any other call, except `write`, which is variadic and
//! has its own lowering.

use crate::semantics::FuncSemantics;
use crate::symstack::ScopeStack;
use crate::symtable::SymbolKind;

/// Name and signature of one builtin.
pub struct Builtin {
    pub name: &'static str,
    pub params: &'static str,
    pub returns: &'static str,
    pub variadic: bool,
}

/// The builtin library of the language.
pub const BUILTINS: &[Builtin] = &[
    Builtin {
        name: "reads",
        params: "",
        returns: "s",
        variadic: false,
    },
    Builtin {
        name: "readi",
        params: "",
        returns: "i",
        variadic: false,
    },
    Builtin {
        name: "readn",
        params: "",
        returns: "f",
        variadic: false,
    },
    Builtin {
        name: "write",
        params: "",
        returns: "",
        variadic: true,
    },
    Builtin {
        name: "tointeger",
        params: "f",
        returns: "i",
        variadic: false,
    },
    Builtin {
        name: "substr",
        params: "sff",
        returns: "s",
        variadic: false,
    },
    Builtin {
        name: "ord",
        params: "si",
        returns: "i",
        variadic: false,
    },
    Builtin {
        name: "chr",
        params: "i",
        returns: "s",
        variadic: false,
    },
];

/// Register every builtin into the global frame of `scopes`.
pub fn register(scopes: &mut ScopeStack) {
    for builtin in BUILTINS {
        let symbol = scopes.put_function(builtin.name, SymbolKind::FuncDef);
        symbol.func = Some(FuncSemantics::builtin(
            builtin.params,
            builtin.returns,
            builtin.variadic,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_fills_global_frame() {
        let mut scopes = ScopeStack::new();
        register(&mut scopes);
        let (symbol, _) = scopes.get_symbol("substr").unwrap();
        let func = symbol.func.as_ref().unwrap();
        assert!(func.is_builtin && func.is_defined);
        assert_eq!(func.effective().params, "sff");
        assert_eq!(func.effective().returns, "s");
    }

    #[test]
    fn test_write_is_variadic() {
        let mut scopes = ScopeStack::new();
        register(&mut scopes);
        let (symbol, _) = scopes.get_symbol("write").unwrap();
        assert!(symbol.func.as_ref().unwrap().variadic);
    }
}

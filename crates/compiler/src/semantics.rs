//! Type codes, function signatures, and compatibility rules.
//!
//! Types are single-character codes so that whole signatures compare as
//! strings: `'s'` string, `'b'` boolean, `'i'` integer, `'f'` number,
//! `'n'` nil. A function carries *two* signature records, one from its
//! declaration and one from its definition, so the two may arrive in either
//! order and are checked for byte-equality once both exist.

/// Type code for a string value.
pub const T_STRING: char = 's';
/// Type code for a boolean value.
pub const T_BOOL: char = 'b';
/// Type code for an integer value.
pub const T_INT: char = 'i';
/// Type code for a number (float) value.
pub const T_FLOAT: char = 'f';
/// Type code for nil.
pub const T_NIL: char = 'n';

/// Operators recognized by the expression parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Add,
    Sub,
    Mul,
    Div,
    IDiv,
    Mod,
    Pow,
    Concat,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
    // unary
    Neg,
    Len,
    Not,
}

impl Op {
    pub fn as_str(self) -> &'static str {
        match self {
            Op::Add => "+",
            Op::Sub => "-",
            Op::Mul => "*",
            Op::Div => "/",
            Op::IDiv => "//",
            Op::Mod => "%",
            Op::Pow => "^",
            Op::Concat => "..",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Eq => "==",
            Op::Ne => "~=",
            Op::And => "and",
            Op::Or => "or",
            Op::Neg => "-",
            Op::Len => "#",
            Op::Not => "not",
        }
    }
}

/// Which operand(s) of a reduction receive the integer-to-float promotion
/// before the arithmetic opcode is emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Conv {
    None,
    First,
    Second,
    Both,
}

/// One signature record: ordered parameter and return type codes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FuncInfo {
    pub params: String,
    pub returns: String,
}

/// Semantic record of a function symbol.
///
/// Declaration and definition keep separate [`FuncInfo`]s; either may be
/// filled first. `variadic` is set only for the builtin `write`.
#[derive(Debug, Clone, Default)]
pub struct FuncSemantics {
    pub declaration: FuncInfo,
    pub definition: FuncInfo,
    pub is_declared: bool,
    pub is_defined: bool,
    pub is_builtin: bool,
    pub variadic: bool,
}

impl FuncSemantics {
    pub fn new(declared: bool, defined: bool) -> FuncSemantics {
        FuncSemantics {
            is_declared: declared,
            is_defined: defined,
            ..FuncSemantics::default()
        }
    }

    pub fn builtin(params: &str, returns: &str, variadic: bool) -> FuncSemantics {
        FuncSemantics {
            declaration: FuncInfo {
                params: params.into(),
                returns: returns.into(),
            },
            definition: FuncInfo {
                params: params.into(),
                returns: returns.into(),
            },
            is_declared: true,
            is_defined: true,
            is_builtin: true,
            variadic,
        }
    }

    /// The signature call sites check against: the definition when one
    /// exists, otherwise the declaration.
    pub fn effective(&self) -> &FuncInfo {
        if self.is_defined {
            &self.definition
        } else {
            &self.declaration
        }
    }

    /// Byte-equality of the declared and defined signatures.
    pub fn signatures_match(&self) -> bool {
        self.declaration.params == self.definition.params
            && self.declaration.returns == self.definition.returns
    }

    /// Callable from an expression or call statement.
    pub fn is_callable(&self) -> bool {
        self.is_declared || self.is_defined || self.is_builtin
    }
}

fn is_numeric(t: char) -> bool {
    t == T_INT || t == T_FLOAT
}

/// Promotion tag for a numeric operand pair, assuming both are numeric.
fn numeric_conv(lhs: char, rhs: char) -> Conv {
    match (lhs, rhs) {
        (T_INT, T_FLOAT) => Conv::First,
        (T_FLOAT, T_INT) => Conv::Second,
        _ => Conv::None,
    }
}

/// Result type and conversion tag of a binary reduction, or `None` when the
/// operand types are incompatible with the operator.
///
/// The rules:
/// - `+ - * /` want two numerics; the result is float when either side is,
///   integer otherwise, and the integer side of a mixed pair is promoted.
/// - `//` and `%` want two integers.
/// - `^` coerces both sides to float.
/// - `..` wants two strings.
/// - `< <= > >=` compare two numerics (with promotion) or two strings.
/// - `==` and `~=` additionally accept boolean pairs, nil pairs, and nil
///   against anything.
/// - `and`/`or` want two booleans.
pub fn check_binary(op: Op, lhs: char, rhs: char) -> Option<(char, Conv)> {
    match op {
        Op::Add | Op::Sub | Op::Mul | Op::Div => {
            if is_numeric(lhs) && is_numeric(rhs) {
                let result = if lhs == T_FLOAT || rhs == T_FLOAT {
                    T_FLOAT
                } else {
                    T_INT
                };
                Some((result, numeric_conv(lhs, rhs)))
            } else {
                None
            }
        }
        Op::IDiv | Op::Mod => {
            if lhs == T_INT && rhs == T_INT {
                Some((T_INT, Conv::None))
            } else {
                None
            }
        }
        Op::Pow => {
            if is_numeric(lhs) && is_numeric(rhs) {
                let conv = match (lhs, rhs) {
                    (T_INT, T_INT) => Conv::Both,
                    (T_INT, T_FLOAT) => Conv::First,
                    (T_FLOAT, T_INT) => Conv::Second,
                    _ => Conv::None,
                };
                Some((T_FLOAT, conv))
            } else {
                None
            }
        }
        Op::Concat => {
            if lhs == T_STRING && rhs == T_STRING {
                Some((T_STRING, Conv::None))
            } else {
                None
            }
        }
        Op::Lt | Op::Le | Op::Gt | Op::Ge => {
            if (is_numeric(lhs) && is_numeric(rhs)) || (lhs == T_STRING && rhs == T_STRING) {
                Some((T_BOOL, numeric_conv(lhs, rhs)))
            } else {
                None
            }
        }
        Op::Eq | Op::Ne => {
            let compatible = (is_numeric(lhs) && is_numeric(rhs))
                || (lhs == T_STRING && rhs == T_STRING)
                || (lhs == T_BOOL && rhs == T_BOOL)
                || lhs == T_NIL
                || rhs == T_NIL;
            if compatible {
                Some((T_BOOL, numeric_conv(lhs, rhs)))
            } else {
                None
            }
        }
        Op::And | Op::Or => {
            if lhs == T_BOOL && rhs == T_BOOL {
                Some((T_BOOL, Conv::None))
            } else {
                None
            }
        }
        Op::Neg | Op::Len | Op::Not => None,
    }
}

/// Result type of a unary reduction, or `None` on incompatibility.
pub fn check_unary(op: Op, operand: char) -> Option<char> {
    match op {
        Op::Neg if is_numeric(operand) => Some(operand),
        Op::Len if operand == T_STRING => Some(T_INT),
        Op::Not if operand == T_BOOL => Some(T_BOOL),
        _ => None,
    }
}

/// Whether a value of type `received` may flow into a slot of type
/// `expected` (assignment position, call argument, return value).
///
/// Returns the conversion needed on the value: integers promote into float
/// slots, and nil is a valid source for any type. `None` means incompatible.
pub fn check_assign(expected: char, received: char) -> Option<Conv> {
    if expected == received || received == T_NIL {
        Some(Conv::None)
    } else if expected == T_FLOAT && received == T_INT {
        Some(Conv::Second)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic_result_types() {
        assert_eq!(check_binary(Op::Add, 'i', 'i'), Some(('i', Conv::None)));
        assert_eq!(check_binary(Op::Add, 'i', 'f'), Some(('f', Conv::First)));
        assert_eq!(check_binary(Op::Add, 'f', 'i'), Some(('f', Conv::Second)));
        assert_eq!(check_binary(Op::Div, 'i', 'i'), Some(('i', Conv::None)));
        assert_eq!(check_binary(Op::Add, 's', 'i'), None);
    }

    #[test]
    fn test_integer_only_operators() {
        assert_eq!(check_binary(Op::IDiv, 'i', 'i'), Some(('i', Conv::None)));
        assert_eq!(check_binary(Op::IDiv, 'i', 'f'), None);
        assert_eq!(check_binary(Op::Mod, 'f', 'i'), None);
    }

    #[test]
    fn test_power_coerces_to_float() {
        assert_eq!(check_binary(Op::Pow, 'i', 'i'), Some(('f', Conv::Both)));
        assert_eq!(check_binary(Op::Pow, 'f', 'i'), Some(('f', Conv::Second)));
        assert_eq!(check_binary(Op::Pow, 'f', 'f'), Some(('f', Conv::None)));
    }

    #[test]
    fn test_equality_accepts_nil() {
        assert_eq!(check_binary(Op::Eq, 'n', 's'), Some(('b', Conv::None)));
        assert_eq!(check_binary(Op::Ne, 'b', 'b'), Some(('b', Conv::None)));
        assert_eq!(check_binary(Op::Lt, 'n', 's'), None);
        assert_eq!(check_binary(Op::Eq, 'b', 's'), None);
    }

    #[test]
    fn test_unary() {
        assert_eq!(check_unary(Op::Neg, 'i'), Some('i'));
        assert_eq!(check_unary(Op::Neg, 'f'), Some('f'));
        assert_eq!(check_unary(Op::Len, 's'), Some('i'));
        assert_eq!(check_unary(Op::Len, 'i'), None);
        assert_eq!(check_unary(Op::Not, 'b'), Some('b'));
    }

    #[test]
    fn test_assign_compatibility() {
        assert_eq!(check_assign('f', 'i'), Some(Conv::Second));
        assert_eq!(check_assign('i', 'f'), None);
        assert_eq!(check_assign('s', 'n'), Some(Conv::None));
        assert_eq!(check_assign('b', 'b'), Some(Conv::None));
    }

    #[test]
    fn test_signature_records_are_independent() {
        let mut sem = FuncSemantics::new(true, false);
        sem.declaration.params = "if".into();
        assert!(sem.definition.params.is_empty());
        sem.definition.params = "if".into();
        sem.definition.returns = "s".into();
        assert!(!sem.signatures_match());
        sem.declaration.returns = "s".into();
        assert!(sem.signatures_match());
    }

    #[test]
    fn test_effective_prefers_definition() {
        let mut sem = FuncSemantics::new(true, true);
        sem.declaration.returns = "i".into();
        sem.definition.returns = "s".into();
        assert_eq!(sem.effective().returns, "s");
    }
}

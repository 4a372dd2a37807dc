//! Runtime library of the generated program.
//!
//! Everything here is emitted once per compilation: the prologue header with
//! the scratch registers and error traps, the internal `$$` helpers, and the
//! bodies of the language builtins. Helpers live in the prologue stream;
//! builtin bodies are function definitions and go to the functions stream.
//!
//! Calling convention: arguments arrive in `TF@%0..` and a `PUSHFRAME`
//! promotes them to `LF@%0..`; return values leave in `LF@%return<i>`,
//! visible to the caller as `TF@%return<i>` after the callee pops its frame.
//! Stack-transforming helpers (`$$power`, `$$modulo`, the recasts) instead
//! work directly on the data stack and the `GF@%expr_result*` registers.

/// Program header: IR magic line, the three global scratch registers, the
/// jump over the helper bodies, and the runtime error traps.
pub(super) const PROLOGUE_HEAD: &str = "\
.IFJcode21
DEFVAR GF@%expr_result
MOVE GF@%expr_result nil@nil
DEFVAR GF@%expr_result2
MOVE GF@%expr_result2 nil@nil
DEFVAR GF@%expr_result3
MOVE GF@%expr_result3 nil@nil
JUMP $$MAIN
LABEL $$ERROR_NIL
EXIT int@8
LABEL $$ERROR_DIV_BY_ZERO
EXIT int@9";

/// Exponentiation by repeated multiplication. Pops exponent then base,
/// both float; a negative exponent inverts the base (trapping on zero).
const POWER: &str = "\
LABEL $$power
CREATEFRAME
PUSHFRAME
MOVE GF@%expr_result2 float@0x1p+0
DEFVAR LF@%exp
POPS LF@%exp
DEFVAR LF@%base
POPS LF@%base
JUMPIFEQ $$ERROR_NIL LF@%base nil@nil
JUMPIFEQ $$ERROR_NIL LF@%exp nil@nil
FLOAT2INT LF@%exp LF@%exp
INT2FLOAT LF@%exp LF@%exp
LT GF@%expr_result LF@%exp float@0x0p+0
JUMPIFEQ $$power$loop GF@%expr_result bool@false
JUMPIFEQ $$ERROR_DIV_BY_ZERO LF@%base float@0x0p+0
DIV LF@%base float@0x1p+0 LF@%base
MUL LF@%exp LF@%exp float@-0x1p+0
LABEL $$power$loop
JUMPIFEQ $$power$end LF@%exp float@0x0p+0
MUL GF@%expr_result2 GF@%expr_result2 LF@%base
SUB LF@%exp LF@%exp float@0x1p+0
JUMP $$power$loop
LABEL $$power$end
POPFRAME
PUSHS GF@%expr_result2
RETURN";

/// `a % b` as `a - (a // b) * b`, trapping on a zero divisor.
const MODULO: &str = "\
LABEL $$modulo
CREATEFRAME
PUSHFRAME
DEFVAR LF@%divisor
POPS LF@%divisor
DEFVAR LF@%divident
POPS LF@%divident
JUMPIFEQ $$ERROR_NIL LF@%divident nil@nil
JUMPIFEQ $$ERROR_NIL LF@%divisor nil@nil
JUMPIFEQ $$ERROR_DIV_BY_ZERO LF@%divisor int@0
IDIV GF@%expr_result LF@%divident LF@%divisor
MUL GF@%expr_result GF@%expr_result LF@%divisor
SUB GF@%expr_result LF@%divident GF@%expr_result
POPFRAME
PUSHS GF@%expr_result
RETURN";

/// Unary minus: multiplies the top of the stack by -1 of the matching type.
const MINUS: &str = "\
LABEL $$minus
POPS GF@%expr_result2
JUMPIFEQ $$ERROR_NIL GF@%expr_result2 nil@nil
TYPE GF@%expr_result3 GF@%expr_result2
JUMPIFNEQ $$minus$float GF@%expr_result3 string@int
PUSHS int@-1
JUMP $$minus$end
LABEL $$minus$float
PUSHS float@-0x1p+0
LABEL $$minus$end
PUSHS GF@%expr_result2
MULS
RETURN";

/// Pops two operands, traps if either is nil, pushes them back.
const NIL_CHECK: &str = "\
LABEL $$nil_check
POPS GF@%expr_result2
POPS GF@%expr_result
JUMPIFEQ $$ERROR_NIL GF@%expr_result nil@nil
JUMPIFEQ $$ERROR_NIL GF@%expr_result2 nil@nil
PUSHS GF@%expr_result
PUSHS GF@%expr_result2
RETURN";

/// Truthiness of `GF@%expr_result`: nil maps to false, anything else true.
const RECAST_TO_BOOL: &str = "\
LABEL $$recast_to_bool
JUMPIFNEQ $$recast_to_bool$not_nil GF@%expr_result nil@nil
MOVE GF@%expr_result bool@false
JUMP $$recast_to_bool$end
LABEL $$recast_to_bool$not_nil
MOVE GF@%expr_result bool@true
LABEL $$recast_to_bool$end
RETURN";

/// Promote the deeper of the two stack operands from int to float; nil and
/// non-int values pass through unchanged.
const RECAST_TO_FLOAT_FIRST: &str = "\
LABEL $$recast_to_float_first
POPS GF@%expr_result2
POPS GF@%expr_result
JUMPIFEQ $$recast_to_float_first$end GF@%expr_result nil@nil
TYPE GF@%expr_result3 GF@%expr_result
JUMPIFNEQ $$recast_to_float_first$end GF@%expr_result3 string@int
INT2FLOAT GF@%expr_result GF@%expr_result
LABEL $$recast_to_float_first$end
PUSHS GF@%expr_result
PUSHS GF@%expr_result2
RETURN";

/// Promote the top stack operand from int to float.
const RECAST_TO_FLOAT_SECOND: &str = "\
LABEL $$recast_to_float_second
POPS GF@%expr_result
JUMPIFEQ $$recast_to_float_second$end GF@%expr_result nil@nil
TYPE GF@%expr_result3 GF@%expr_result
JUMPIFNEQ $$recast_to_float_second$end GF@%expr_result3 string@int
INT2FLOAT GF@%expr_result GF@%expr_result
LABEL $$recast_to_float_second$end
PUSHS GF@%expr_result
RETURN";

/// Promote both stack operands from int to float.
const RECAST_TO_FLOAT_BOTH: &str = "\
LABEL $$recast_to_float_both
POPS GF@%expr_result2
POPS GF@%expr_result
JUMPIFEQ $$recast_to_float_both$second GF@%expr_result nil@nil
TYPE GF@%expr_result3 GF@%expr_result
JUMPIFNEQ $$recast_to_float_both$second GF@%expr_result3 string@int
INT2FLOAT GF@%expr_result GF@%expr_result
LABEL $$recast_to_float_both$second
JUMPIFEQ $$recast_to_float_both$end GF@%expr_result2 nil@nil
TYPE GF@%expr_result3 GF@%expr_result2
JUMPIFNEQ $$recast_to_float_both$end GF@%expr_result3 string@int
INT2FLOAT GF@%expr_result2 GF@%expr_result2
LABEL $$recast_to_float_both$end
PUSHS GF@%expr_result
PUSHS GF@%expr_result2
RETURN";

/// Internal helpers emitted into the prologue stream, after the error
/// traps. Control never falls into them; they are only ever `CALL`ed.
pub(super) const RUNTIME_HELPERS: &[&str] = &[
    POWER,
    MODULO,
    MINUS,
    NIL_CHECK,
    RECAST_TO_BOOL,
    RECAST_TO_FLOAT_FIRST,
    RECAST_TO_FLOAT_SECOND,
    RECAST_TO_FLOAT_BOTH,
];

const READS: &str = "\
LABEL $reads
PUSHFRAME
DEFVAR LF@%return0
READ LF@%return0 string
POPFRAME
RETURN";

const READI: &str = "\
LABEL $readi
PUSHFRAME
DEFVAR LF@%return0
READ LF@%return0 int
POPFRAME
RETURN";

const READN: &str = "\
LABEL $readn
PUSHFRAME
DEFVAR LF@%return0
READ LF@%return0 float
POPFRAME
RETURN";

/// Prints one term from `GF@%expr_result`; nil prints as the text `nil`.
const WRITE: &str = "\
LABEL $write
JUMPIFNEQ $write$not_nil GF@%expr_result nil@nil
WRITE string@nil
JUMP $write$end
LABEL $write$not_nil
WRITE GF@%expr_result
LABEL $write$end
RETURN";

/// `tointeger(f)`: float to integer, nil stays nil.
const TOINTEGER: &str = "\
LABEL $tointeger
PUSHFRAME
DEFVAR LF@%return0
JUMPIFNEQ $tointeger$not_nil LF@%0 nil@nil
MOVE LF@%return0 nil@nil
JUMP $tointeger$end
LABEL $tointeger$not_nil
FLOAT2INT LF@%return0 LF@%0
LABEL $tointeger$end
POPFRAME
RETURN";

/// `chr(i)`: character for an ordinal in 0..=255, nil outside the range.
const CHR: &str = "\
LABEL $chr
PUSHFRAME
JUMPIFEQ $$ERROR_NIL LF@%0 nil@nil
DEFVAR LF@%return0
MOVE LF@%return0 nil@nil
DEFVAR LF@check
LT LF@check LF@%0 int@0
JUMPIFEQ $chr$end LF@check bool@true
GT LF@check LF@%0 int@255
JUMPIFEQ $chr$end LF@check bool@true
INT2CHAR LF@%return0 LF@%0
LABEL $chr$end
POPFRAME
RETURN";

/// `ord(s, i)`: ordinal of the i-th character (1-based), nil out of range.
const ORD: &str = "\
LABEL $ord
PUSHFRAME
JUMPIFEQ $$ERROR_NIL LF@%0 nil@nil
JUMPIFEQ $$ERROR_NIL LF@%1 nil@nil
DEFVAR LF@%return0
MOVE LF@%return0 nil@nil
DEFVAR LF@str_len
STRLEN LF@str_len LF@%0
DEFVAR LF@check
LT LF@check LF@%1 int@1
JUMPIFEQ $ord$end LF@check bool@true
GT LF@check LF@%1 LF@str_len
JUMPIFEQ $ord$end LF@check bool@true
SUB LF@%1 LF@%1 int@1
STRI2INT LF@%return0 LF@%0 LF@%1
LABEL $ord$end
POPFRAME
RETURN";

/// `substr(s, i, j)`: characters i..=j (1-based), empty string when the
/// range is invalid. The number indices are truncated to integers after the
/// nil checks.
const SUBSTR: &str = "\
LABEL $substr
PUSHFRAME
DEFVAR LF@%return0
MOVE LF@%return0 string@
JUMPIFEQ $$ERROR_NIL LF@%0 nil@nil
JUMPIFEQ $$ERROR_NIL LF@%1 nil@nil
JUMPIFEQ $$ERROR_NIL LF@%2 nil@nil
FLOAT2INT LF@%1 LF@%1
FLOAT2INT LF@%2 LF@%2
DEFVAR LF@check
LT LF@check LF@%1 int@1
JUMPIFEQ $substr$end LF@check bool@true
LT LF@check LF@%2 int@1
JUMPIFEQ $substr$end LF@check bool@true
DEFVAR LF@str_len
STRLEN LF@str_len LF@%0
GT LF@check LF@%1 LF@str_len
JUMPIFEQ $substr$end LF@check bool@true
GT LF@check LF@%2 LF@str_len
JUMPIFEQ $substr$end LF@check bool@true
LT LF@check LF@%2 LF@%1
JUMPIFEQ $substr$end LF@check bool@true
SUB LF@%1 LF@%1 int@1
DEFVAR LF@tmp_char
LABEL $substr$loop
GETCHAR LF@tmp_char LF@%0 LF@%1
CONCAT LF@%return0 LF@%return0 LF@tmp_char
ADD LF@%1 LF@%1 int@1
LT LF@check LF@%1 LF@%2
JUMPIFEQ $substr$loop LF@check bool@true
LABEL $substr$end
POPFRAME
RETURN";

/// Builtin function definitions, emitted into the functions stream before
/// any user function.
pub(super) const BUILTIN_BODIES: &[&str] = &[
    ORD, CHR, SUBSTR, READS, READI, READN, WRITE, TOINTEGER,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_helper_returns() {
        for helper in RUNTIME_HELPERS.iter().chain(BUILTIN_BODIES.iter()) {
            assert!(helper.ends_with("RETURN"), "helper must end in RETURN");
        }
    }

    #[test]
    fn test_frame_discipline() {
        for body in RUNTIME_HELPERS.iter().chain(BUILTIN_BODIES.iter()) {
            let pushes = body.matches("PUSHFRAME").count();
            let pops = body.matches("POPFRAME").count();
            assert_eq!(pushes, pops, "unbalanced frames in:\n{body}");
        }
    }

    #[test]
    fn test_local_jump_targets_exist() {
        for body in RUNTIME_HELPERS.iter().chain(BUILTIN_BODIES.iter()) {
            let labels: Vec<&str> = body
                .lines()
                .filter_map(|l| l.strip_prefix("LABEL "))
                .collect();
            for line in body.lines() {
                let target = line
                    .strip_prefix("JUMP ")
                    .or_else(|| line.strip_prefix("JUMPIFEQ "))
                    .or_else(|| line.strip_prefix("JUMPIFNEQ "))
                    .map(|rest| rest.split_whitespace().next().unwrap());
                if let Some(target) = target {
                    if target.starts_with("$$ERROR") || target == "$$MAIN" {
                        continue; // prologue traps
                    }
                    assert!(labels.contains(&target), "dangling target {target}");
                }
            }
        }
    }
}

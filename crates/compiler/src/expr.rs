//! Operator-precedence expression parsing.
//!
//! Embedded inside the recursive-descent driver: the statement parser hands
//! control over at every expression site and gets it back with the cursor on
//! the first token that could not extend the expression. Parsing is
//! precedence-driven over a binding-power table, one row per operator level;
//! every reduction runs its type rule, records the integer-to-float
//! conversion tag, and emits the postfix stack code for the reduction on the
//! spot, so a finished expression has left exactly its result value on the
//! data stack.

use crate::errors::CompileError;
use crate::generator::Generator;
use crate::parser::Parser;
use crate::scanner::{Keyword, SourcePos, TokenKind};
use crate::semantics::{self, Op, T_BOOL, T_FLOAT, T_INT, T_NIL, T_STRING};

/// Binding power of the prefix operators (`-` `#` `not`): tighter than any
/// binary operator except `^`.
const UNARY_BP: u8 = 13;

/// What a right-hand-side expression produced.
pub enum ExprOutcome {
    /// A single value, already pushed on the data stack.
    Single(char),
    /// The expression was exactly one function call; its return values are
    /// still in `TF@%return<i>` and nothing is pushed yet. The string is
    /// the callee's return signature.
    Call(String),
}

fn binary_op(kind: &TokenKind) -> Option<Op> {
    Some(match kind {
        TokenKind::Plus => Op::Add,
        TokenKind::Minus => Op::Sub,
        TokenKind::Star => Op::Mul,
        TokenKind::Slash => Op::Div,
        TokenKind::SlashSlash => Op::IDiv,
        TokenKind::Percent => Op::Mod,
        TokenKind::Caret => Op::Pow,
        TokenKind::Concat => Op::Concat,
        TokenKind::Lt => Op::Lt,
        TokenKind::Le => Op::Le,
        TokenKind::Gt => Op::Gt,
        TokenKind::Ge => Op::Ge,
        TokenKind::Eq => Op::Eq,
        TokenKind::Ne => Op::Ne,
        TokenKind::Kw(Keyword::And) => Op::And,
        TokenKind::Kw(Keyword::Or) => Op::Or,
        _ => return None,
    })
}

/// Left and right binding power per operator. A right-associative operator
/// has its right power below its left one, so an equal operator on the
/// right re-enters the loop.
fn binding_power(op: Op) -> (u8, u8) {
    match op {
        Op::Or => (1, 2),
        Op::And => (3, 4),
        Op::Lt | Op::Le | Op::Gt | Op::Ge | Op::Eq | Op::Ne => (5, 6),
        Op::Concat => (8, 7),
        Op::Add | Op::Sub => (9, 10),
        Op::Mul | Op::Div | Op::IDiv | Op::Mod => (11, 12),
        Op::Pow => (16, 15),
        Op::Neg | Op::Len | Op::Not => unreachable!("prefix operators have no infix power"),
    }
}

/// True when a token can open an expression.
pub fn starts_expression(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::IntLit(_)
            | TokenKind::FloatLit(_)
            | TokenKind::StrLit(_)
            | TokenKind::Id(_)
            | TokenKind::LParen
            | TokenKind::Minus
            | TokenKind::Hash
            | TokenKind::Kw(Keyword::Not)
            | TokenKind::Kw(Keyword::True)
            | TokenKind::Kw(Keyword::False)
            | TokenKind::Kw(Keyword::Nil)
    )
}

fn expr_type_err(pos: SourcePos, op: Op) -> CompileError {
    CompileError::ExprType {
        pos,
        op: op.as_str().to_string(),
    }
}

/// Parse one expression that must yield exactly one value on the data
/// stack. A bare call to a function with no return values is an error.
pub fn parse_single(p: &mut Parser) -> Result<char, CompileError> {
    parse_expr(p, 0)
}

/// Parse one right-hand-side expression without deciding yet how many
/// values a trailing bare call contributes; the caller inspects the
/// outcome. Anything other than a bare call is evaluated to a single
/// pushed value.
pub fn parse_rhs(p: &mut Parser) -> Result<ExprOutcome, CompileError> {
    if let TokenKind::Id(name) = p.cursor.current().clone() {
        if p.resolve_var(&name).is_none() && p.resolve_function(&name).is_some() {
            let pos = p.cursor.pos();
            p.cursor.advance()?;
            if !matches!(p.cursor.current(), TokenKind::LParen) {
                // a function name is not a value
                return Err(CompileError::Definition { pos, name });
            }
            let returns = p.parse_call(&name, pos)?;
            if binary_op(p.cursor.current()).is_some() {
                // the call is an operand of a larger expression: it
                // contributes its first return value only
                let first = first_return(&returns, pos, &name)?;
                p.generator.push_retval(0);
                let result = parse_binary_rest(p, first, 0)?;
                return Ok(ExprOutcome::Single(result));
            }
            return Ok(ExprOutcome::Call(returns));
        }
    }
    parse_expr(p, 0).map(ExprOutcome::Single)
}

fn first_return(returns: &str, pos: SourcePos, name: &str) -> Result<char, CompileError> {
    returns
        .chars()
        .next()
        .ok_or_else(|| CompileError::FunctionSemantics {
            pos,
            what: format!("function '{name}' returns no value"),
        })
}

fn parse_expr(p: &mut Parser, min_bp: u8) -> Result<char, CompileError> {
    let lhs = parse_prefix(p)?;
    parse_binary_rest(p, lhs, min_bp)
}

/// The shift/reduce loop: consume infix operators binding at least
/// `min_bp`, reducing as their right operands complete. Returns on the
/// first token that is not an operator strong enough to extend the
/// expression, leaving it in the cursor.
fn parse_binary_rest(p: &mut Parser, mut lhs: char, min_bp: u8) -> Result<char, CompileError> {
    loop {
        let Some(op) = binary_op(p.cursor.current()) else {
            break;
        };
        let (lbp, rbp) = binding_power(op);
        if lbp < min_bp {
            break;
        }
        let pos = p.cursor.pos();
        p.cursor.advance()?;

        if matches!(op, Op::And | Op::Or) {
            // short-circuit: branch past the right operand while it is
            // still unevaluated
            if lhs != T_BOOL {
                return Err(expr_type_err(pos, op));
            }
            let scope_id = p.scopes.scope_info().unique_id;
            let seq = p.generator.short_circuit_begin(op, scope_id);
            let rhs = parse_expr(p, rbp)?;
            if rhs != T_BOOL {
                return Err(expr_type_err(pos, op));
            }
            p.generator.short_circuit_end(op, scope_id, seq);
            lhs = T_BOOL;
            continue;
        }

        let rhs = parse_expr(p, rbp)?;
        let Some((result, conv)) = semantics::check_binary(op, lhs, rhs) else {
            return Err(expr_type_err(pos, op));
        };
        p.generator.binary(op, conv, result);
        lhs = result;
    }
    Ok(lhs)
}

/// One operand: a literal, an identifier (variable or call), a
/// parenthesized expression, or a prefix operator application.
fn parse_prefix(p: &mut Parser) -> Result<char, CompileError> {
    let pos = p.cursor.pos();
    match p.cursor.current().clone() {
        kind @ TokenKind::IntLit(_) => {
            p.generator.push_operand(&Generator::literal(&kind));
            p.cursor.advance()?;
            Ok(T_INT)
        }
        kind @ TokenKind::FloatLit(_) => {
            p.generator.push_operand(&Generator::literal(&kind));
            p.cursor.advance()?;
            Ok(T_FLOAT)
        }
        kind @ TokenKind::StrLit(_) => {
            p.generator.push_operand(&Generator::literal(&kind));
            p.cursor.advance()?;
            Ok(T_STRING)
        }
        kind @ TokenKind::Kw(Keyword::True | Keyword::False) => {
            p.generator.push_operand(&Generator::literal(&kind));
            p.cursor.advance()?;
            Ok(T_BOOL)
        }
        kind @ TokenKind::Kw(Keyword::Nil) => {
            p.generator.push_operand(&Generator::literal(&kind));
            p.cursor.advance()?;
            Ok(T_NIL)
        }
        TokenKind::LParen => {
            p.cursor.advance()?;
            let inner = parse_expr(p, 0)?;
            p.expect(&TokenKind::RParen)?;
            Ok(inner)
        }
        TokenKind::Minus => {
            p.cursor.advance()?;
            let operand = parse_expr(p, UNARY_BP)?;
            if semantics::check_unary(Op::Neg, operand).is_none() {
                return Err(expr_type_err(pos, Op::Neg));
            }
            p.generator.unary(Op::Neg);
            Ok(operand)
        }
        TokenKind::Hash => {
            p.cursor.advance()?;
            let operand = parse_expr(p, UNARY_BP)?;
            let Some(result) = semantics::check_unary(Op::Len, operand) else {
                return Err(expr_type_err(pos, Op::Len));
            };
            p.generator.unary(Op::Len);
            Ok(result)
        }
        TokenKind::Kw(Keyword::Not) => {
            p.cursor.advance()?;
            let operand = parse_expr(p, UNARY_BP)?;
            let Some(result) = semantics::check_unary(Op::Not, operand) else {
                return Err(expr_type_err(pos, Op::Not));
            };
            p.generator.unary(Op::Not);
            Ok(result)
        }
        TokenKind::Id(name) => {
            p.cursor.advance()?;
            // a local variable shadows a function of the same name
            if let Some((kind, owner)) = p.resolve_var(&name) {
                p.generator.push_operand(&Generator::var(owner, &name));
                return Ok(kind.type_code());
            }
            if p.resolve_function(&name).is_some() {
                if !matches!(p.cursor.current(), TokenKind::LParen) {
                    return Err(CompileError::Definition { pos, name });
                }
                let returns = p.parse_call(&name, pos)?;
                let first = first_return(&returns, pos, &name)?;
                p.generator.push_retval(0);
                return Ok(first);
            }
            Err(CompileError::Definition { pos, name })
        }
        other => Err(CompileError::Syntax {
            pos,
            expected: "an expression".into(),
            got: other.describe(),
        }),
    }
}

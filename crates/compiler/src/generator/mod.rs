//! IFJcode21 emission.
//!
//! The generator fills three instruction streams in parallel — `prologue`,
//! `functions`, and `main` — and concatenates them in that order at the end.
//! The statement parser switches the active stream at scope boundaries
//! (function entry/exit); everything else appends to whichever stream is
//! selected.
//!
//! The generator is correctness-only: every precondition (operand types,
//! symbol existence, conversion decisions) is established by the parsers and
//! the semantic checks before the corresponding emit call is made, so no
//! method here can fail.
//!
//! # Module Structure
//!
//! - `mod.rs`: streams, naming, expression and call emission
//! - `control_flow.rs`: conditionals, loops, `break`, `DEFVAR` hoisting
//! - `runtime.rs`: prologue text and the runtime helper library

mod control_flow;
mod runtime;

use crate::config::CompilerConfig;
use crate::scanner::{Keyword, TokenKind};
use crate::semantics::{Conv, Op};

/// The three output streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Prologue,
    Functions,
    Main,
}

/// Instruction assembler for one compilation.
pub struct Generator {
    prologue: Vec<String>,
    functions: Vec<String>,
    main: Vec<String>,
    active: Stream,
    /// Partial line under construction (multi-piece variable names).
    line: String,
    /// Inside at least one loop; `DEFVAR`s are being hoisted.
    in_loop: bool,
    /// Insertion index just before the outermost loop header.
    hoist_at: Option<usize>,
    /// Scope id of the outermost loop, to know when to stop hoisting.
    outer_loop_id: Option<u64>,
    /// Sequence counter for short-circuit labels within a scope.
    label_seq: u64,
    comments: bool,
}

impl Generator {
    pub fn new(config: &CompilerConfig) -> Generator {
        Generator {
            prologue: Vec::new(),
            functions: Vec::new(),
            main: Vec::new(),
            active: Stream::Prologue,
            line: String::new(),
            in_loop: false,
            hoist_at: None,
            outer_loop_id: None,
            label_seq: 0,
            comments: config.comments,
        }
    }

    fn list(&mut self) -> &mut Vec<String> {
        match self.active {
            Stream::Prologue => &mut self.prologue,
            Stream::Functions => &mut self.functions,
            Stream::Main => &mut self.main,
        }
    }

    /// Switch the active stream.
    pub fn select(&mut self, stream: Stream) {
        self.active = stream;
    }

    /// Append one finished instruction line (or block of lines) to the
    /// active stream.
    pub fn emit(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.list().push(text);
    }

    /// Append a piece of the current partial line.
    fn part(&mut self, text: &str) {
        self.line.push_str(text);
    }

    /// Finish the current partial line into the active stream.
    fn flush(&mut self) {
        let line = std::mem::take(&mut self.line);
        self.list().push(line);
    }

    /// Emit a `#` comment when comments are enabled.
    pub fn comment(&mut self, text: &str) {
        if self.comments {
            self.emit(format!("# {text}"));
        }
    }

    /// Stitch the three streams into the final program text.
    pub fn assemble(self) -> String {
        let mut out = String::new();
        for line in self
            .prologue
            .iter()
            .chain(self.functions.iter())
            .chain(self.main.iter())
        {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    // ------------------------------------------------------------------
    // Names and literals
    // ------------------------------------------------------------------

    /// IR name of a local variable: `LF@%<owning scope id>%<source name>`.
    ///
    /// Unique by construction: scope ids are unique and a name may be
    /// declared only once per scope.
    pub fn var(scope_id: u64, name: &str) -> String {
        format!("LF@%{scope_id}%{name}")
    }

    /// IR literal for a token operand.
    pub fn literal(kind: &TokenKind) -> String {
        match kind {
            TokenKind::IntLit(v) => format!("int@{v}"),
            TokenKind::FloatLit(v) => format!("float@{}", hex_float(*v)),
            TokenKind::StrLit(s) => format!("string@{}", escape_string(s)),
            TokenKind::Kw(Keyword::True) => "bool@true".into(),
            TokenKind::Kw(Keyword::False) => "bool@false".into(),
            TokenKind::Kw(Keyword::Nil) => "nil@nil".into(),
            other => unreachable!("not a literal token: {other:?}"),
        }
    }

    // ------------------------------------------------------------------
    // Variables
    // ------------------------------------------------------------------

    /// `DEFVAR` for a variable, hoisted before the outermost loop header
    /// when inside a loop. The target IR forbids a second `DEFVAR` of the
    /// same variable on a repeated path, so declarations inside loop bodies
    /// must execute before the loop is entered.
    pub fn defvar(&mut self, var: &str) {
        self.part("DEFVAR ");
        self.part(var);
        if self.in_loop {
            let at = self.hoist_at.expect("hoist point set while in a loop");
            let line = std::mem::take(&mut self.line);
            self.list().insert(at, line);
            self.hoist_at = Some(at + 1);
        } else {
            self.flush();
        }
    }

    /// Declaration without initializer: the variable starts as nil.
    pub fn var_declaration(&mut self, scope_id: u64, name: &str) {
        let var = Self::var(scope_id, name);
        self.defvar(&var);
        self.emit(format!("MOVE {var} nil@nil"));
    }

    /// Declaration with initializer; the value is expected in
    /// `GF@%expr_result`.
    pub fn var_definition(&mut self, scope_id: u64, name: &str) {
        let var = Self::var(scope_id, name);
        self.defvar(&var);
        self.emit(format!("MOVE {var} GF@%expr_result"));
    }

    /// Pop the top of the data stack into an already-declared variable.
    pub fn var_assignment(&mut self, scope_id: u64, name: &str) {
        self.emit(format!("POPS {}", Self::var(scope_id, name)));
    }

    // ------------------------------------------------------------------
    // Expression evaluation
    // ------------------------------------------------------------------

    /// Push one operand (literal or variable) onto the data stack.
    pub fn push_operand(&mut self, operand: &str) {
        self.emit(format!("PUSHS {operand}"));
    }

    pub fn push_nil(&mut self) {
        self.emit("PUSHS nil@nil");
    }

    /// Pop the expression result into the scratch register.
    pub fn pop_result(&mut self) {
        self.emit("POPS GF@%expr_result");
    }

    pub fn push_result(&mut self) {
        self.emit("PUSHS GF@%expr_result");
    }

    /// Integer-to-float promotion of stack operand(s) as tagged by the
    /// semantic check. Nil values pass through the helpers unchanged.
    pub fn recast(&mut self, conv: Conv) {
        match conv {
            Conv::None => {}
            Conv::First => self.emit("CALL $$recast_to_float_first"),
            Conv::Second => self.emit("CALL $$recast_to_float_second"),
            Conv::Both => self.emit("CALL $$recast_to_float_both"),
        }
    }

    /// Map `GF@%expr_result` to a boolean: nil becomes false, anything else
    /// true. Used on condition expressions whose static type is not
    /// boolean.
    pub fn recast_to_bool(&mut self) {
        self.emit("CALL $$recast_to_bool");
    }

    fn nil_check(&mut self) {
        self.emit("CALL $$nil_check");
    }

    /// Trap on a zero divisor at the top of the stack.
    fn division_check(&mut self, integer: bool) {
        self.emit("POPS GF@%expr_result");
        if integer {
            self.emit("JUMPIFEQ $$ERROR_DIV_BY_ZERO GF@%expr_result int@0");
        } else {
            self.emit("JUMPIFEQ $$ERROR_DIV_BY_ZERO GF@%expr_result float@0x0p+0");
        }
        self.emit("PUSHS GF@%expr_result");
    }

    /// Emit a binary reduction. Operands are on the data stack; `conv` was
    /// computed by the semantic check and `result` is the reduction's type
    /// code (it decides integer vs float division).
    pub fn binary(&mut self, op: Op, conv: Conv, result: char) {
        self.recast(conv);
        match op {
            Op::Add => {
                self.nil_check();
                self.emit("ADDS");
            }
            Op::Sub => {
                self.nil_check();
                self.emit("SUBS");
            }
            Op::Mul => {
                self.nil_check();
                self.emit("MULS");
            }
            Op::Div => {
                self.nil_check();
                if result == 'i' {
                    self.division_check(true);
                    self.emit("IDIVS");
                } else {
                    self.division_check(false);
                    self.emit("DIVS");
                }
            }
            Op::IDiv => {
                self.nil_check();
                self.division_check(true);
                self.emit("IDIVS");
            }
            Op::Mod => {
                self.emit("CALL $$modulo");
            }
            Op::Pow => {
                self.emit("CALL $$power");
            }
            Op::Lt => {
                self.nil_check();
                self.emit("LTS");
            }
            Op::Gt => {
                self.nil_check();
                self.emit("GTS");
            }
            Op::Le => {
                self.emit(
                    "POPS GF@%expr_result2\n\
                     POPS GF@%expr_result\n\
                     JUMPIFEQ $$ERROR_NIL GF@%expr_result nil@nil\n\
                     JUMPIFEQ $$ERROR_NIL GF@%expr_result2 nil@nil\n\
                     LT GF@%expr_result3 GF@%expr_result GF@%expr_result2\n\
                     EQ GF@%expr_result2 GF@%expr_result GF@%expr_result2\n\
                     OR GF@%expr_result GF@%expr_result2 GF@%expr_result3\n\
                     PUSHS GF@%expr_result",
                );
            }
            Op::Ge => {
                self.emit(
                    "POPS GF@%expr_result2\n\
                     POPS GF@%expr_result\n\
                     JUMPIFEQ $$ERROR_NIL GF@%expr_result nil@nil\n\
                     JUMPIFEQ $$ERROR_NIL GF@%expr_result2 nil@nil\n\
                     GT GF@%expr_result3 GF@%expr_result GF@%expr_result2\n\
                     EQ GF@%expr_result2 GF@%expr_result GF@%expr_result2\n\
                     OR GF@%expr_result GF@%expr_result2 GF@%expr_result3\n\
                     PUSHS GF@%expr_result",
                );
            }
            Op::Eq => {
                self.emit("EQS");
            }
            Op::Ne => {
                self.emit("EQS\nNOTS");
            }
            Op::Concat => {
                self.emit(
                    "POPS GF@%expr_result2\n\
                     POPS GF@%expr_result\n\
                     JUMPIFEQ $$ERROR_NIL GF@%expr_result nil@nil\n\
                     JUMPIFEQ $$ERROR_NIL GF@%expr_result2 nil@nil\n\
                     CONCAT GF@%expr_result GF@%expr_result GF@%expr_result2\n\
                     PUSHS GF@%expr_result",
                );
            }
            Op::And | Op::Or => {
                unreachable!("and/or lower through the short-circuit path")
            }
            Op::Neg | Op::Len | Op::Not => unreachable!("unary operator in binary emission"),
        }
    }

    /// Emit a unary reduction on the top of the data stack.
    pub fn unary(&mut self, op: Op) {
        match op {
            Op::Neg => self.emit("CALL $$minus"),
            Op::Len => {
                self.emit(
                    "POPS GF@%expr_result2\n\
                     JUMPIFEQ $$ERROR_NIL GF@%expr_result2 nil@nil\n\
                     STRLEN GF@%expr_result GF@%expr_result2\n\
                     PUSHS GF@%expr_result",
                );
            }
            Op::Not => {
                self.emit(
                    "POPS GF@%expr_result2\n\
                     JUMPIFEQ $$ERROR_NIL GF@%expr_result2 nil@nil\n\
                     PUSHS GF@%expr_result2\n\
                     NOTS",
                );
            }
            other => unreachable!("binary operator in unary emission: {other:?}"),
        }
    }

    /// Open a short-circuit evaluation of `and`/`or`: the left operand is on
    /// the stack; branch past the right operand when it already decides the
    /// result. Returns the label sequence number for
    /// [`short_circuit_end`](Self::short_circuit_end).
    ///
    /// Labels lead with the current scope's unique id so every label id
    /// segment still names a live scope.
    pub fn short_circuit_begin(&mut self, op: Op, scope_id: u64) -> u64 {
        let seq = self.label_seq;
        self.label_seq += 1;
        let (name, decide) = match op {
            Op::And => ("and", "bool@false"),
            Op::Or => ("or", "bool@true"),
            other => unreachable!("not a short-circuit operator: {other:?}"),
        };
        self.emit(format!(
            "POPS GF@%expr_result\n\
             JUMPIFEQ $$ERROR_NIL GF@%expr_result nil@nil\n\
             JUMPIFEQ ${name}${scope_id}${seq}$short GF@%expr_result {decide}"
        ));
        seq
    }

    /// Close a short-circuit evaluation: the right operand is on the stack.
    pub fn short_circuit_end(&mut self, op: Op, scope_id: u64, seq: u64) {
        let (name, decide) = match op {
            Op::And => ("and", "bool@false"),
            Op::Or => ("or", "bool@true"),
            other => unreachable!("not a short-circuit operator: {other:?}"),
        };
        self.emit(format!(
            "POPS GF@%expr_result\n\
             JUMPIFEQ $$ERROR_NIL GF@%expr_result nil@nil\n\
             PUSHS GF@%expr_result\n\
             JUMP ${name}${scope_id}${seq}$end\n\
             LABEL ${name}${scope_id}${seq}$short\n\
             PUSHS {decide}\n\
             LABEL ${name}${scope_id}${seq}$end"
        ));
    }

    // ------------------------------------------------------------------
    // Function definitions
    // ------------------------------------------------------------------

    /// Open a function definition: switches to the `functions` stream.
    pub fn func_start(&mut self, name: &str) {
        self.select(Stream::Functions);
        self.comment(&format!("function {name}"));
        self.emit(format!("LABEL ${name}"));
        self.emit("PUSHFRAME");
    }

    /// Bind the `index`-th parameter to its local variable.
    pub fn func_param(&mut self, scope_id: u64, name: &str, index: usize) {
        let var = Self::var(scope_id, name);
        self.defvar(&var);
        self.emit(format!("MOVE {var} LF@%{index}"));
    }

    /// Declare all return slots, nil-initialized. Missing returned values
    /// stay nil.
    pub fn return_defvars(&mut self, count: usize) {
        for index in 0..count {
            self.emit(format!("DEFVAR LF@%return{index}"));
            self.emit(format!("MOVE LF@%return{index} nil@nil"));
        }
    }

    /// Store one returned value: recast when tagged, then move the popped
    /// result into its return slot.
    pub fn pass_return(&mut self, index: usize, conv: Conv) {
        if conv != Conv::None {
            self.emit("CALL $$recast_to_float_second");
        }
        self.pop_result();
        self.emit(format!("MOVE LF@%return{index} GF@%expr_result"));
    }

    /// Jump to the function's exit label after a `return`.
    pub fn return_jump(&mut self, fun_name: &str) {
        self.emit(format!("JUMP ${fun_name}$end"));
    }

    /// Close a function definition and fall back to the `main` stream.
    pub fn func_end(&mut self, name: &str) {
        self.emit(format!("LABEL ${name}$end"));
        self.emit("POPFRAME");
        self.emit("RETURN");
        self.select(Stream::Main);
    }

    // ------------------------------------------------------------------
    // Function calls
    // ------------------------------------------------------------------

    /// Move `count` evaluated arguments from the data stack into a fresh
    /// temporary frame.
    ///
    /// All arguments are evaluated (and recast) onto the stack before the
    /// frame is created, so calls nested in argument position cannot clobber
    /// the frame under construction. Pops run in reverse: the last argument
    /// is on top.
    pub fn call_args(&mut self, count: usize) {
        self.emit("CREATEFRAME");
        for index in (0..count).rev() {
            self.emit(format!("DEFVAR TF@%{index}"));
            self.emit(format!("POPS TF@%{index}"));
        }
    }

    pub fn call(&mut self, name: &str) {
        self.emit(format!("CALL ${name}"));
    }

    /// Push the `index`-th return value of the last call.
    pub fn push_retval(&mut self, index: usize) {
        self.emit(format!("PUSHS TF@%return{index}"));
    }

    /// Variadic `write` lowering: `count` argument values are on the data
    /// stack; print them in source order.
    pub fn write_call(&mut self, count: usize) {
        self.emit("CREATEFRAME");
        for index in (0..count).rev() {
            self.emit(format!("DEFVAR TF@%write{index}"));
            self.emit(format!("POPS TF@%write{index}"));
        }
        for index in 0..count {
            self.emit(format!("MOVE GF@%expr_result TF@%write{index}"));
            self.call("write");
        }
    }

    // ------------------------------------------------------------------
    // Program framing
    // ------------------------------------------------------------------

    /// Emit the program prologue (header, scratch registers, error traps,
    /// runtime helpers), the builtin bodies, and open the main block.
    pub fn prog_start(&mut self) {
        self.select(Stream::Prologue);
        self.emit(runtime::PROLOGUE_HEAD);
        for helper in runtime::RUNTIME_HELPERS {
            self.emit(*helper);
        }
        self.select(Stream::Functions);
        for body in runtime::BUILTIN_BODIES {
            self.emit(*body);
        }
        self.select(Stream::Main);
        self.comment("main scope");
        self.emit("LABEL $$MAIN");
        self.emit("CREATEFRAME");
        self.emit("PUSHFRAME");
    }

    /// Close the main block.
    pub fn main_end(&mut self) {
        self.select(Stream::Main);
        self.emit("LABEL $$MAIN$end");
        self.emit("CLEARS");
    }
}

/// Render a float the way the target IR wants it: C `%a` hexadecimal
/// notation (`0x1.8p+1`).
pub(crate) fn hex_float(value: f64) -> String {
    if value == 0.0 {
        return if value.is_sign_negative() {
            "-0x0p+0".into()
        } else {
            "0x0p+0".into()
        };
    }
    let bits = value.to_bits();
    let sign = if bits >> 63 == 1 { "-" } else { "" };
    let biased = ((bits >> 52) & 0x7ff) as i64;
    let mantissa = bits & 0x000f_ffff_ffff_ffff;
    if biased == 0 {
        // subnormal: no implicit leading one
        let mut digits = format!("{mantissa:013x}");
        while digits.ends_with('0') {
            digits.pop();
        }
        return format!("{sign}0x0.{digits}p-1022");
    }
    let exponent = biased - 1023;
    let mut digits = format!("{mantissa:013x}");
    while digits.ends_with('0') {
        digits.pop();
    }
    if digits.is_empty() {
        format!("{sign}0x1p{exponent:+}")
    } else {
        format!("{sign}0x1.{digits}p{exponent:+}")
    }
}

/// Escape a string literal for `string@` operands: control bytes, space,
/// `#`, `\` and non-printable bytes become `\DDD` decimal escapes.
pub(crate) fn escape_string(text: &str) -> String {
    let mut out = String::new();
    for &b in text.as_bytes() {
        if b <= 32 || b == b'#' || b == b'\\' || b > 126 {
            out.push_str(&format!("\\{b:03}"));
        } else {
            out.push(b as char);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator() -> Generator {
        Generator::new(&CompilerConfig::default())
    }

    #[test]
    fn test_hex_float() {
        assert_eq!(hex_float(0.0), "0x0p+0");
        assert_eq!(hex_float(1.0), "0x1p+0");
        assert_eq!(hex_float(-1.0), "-0x1p+0");
        assert_eq!(hex_float(3.0), "0x1.8p+1");
        assert_eq!(hex_float(0.5), "0x1p-1");
        assert_eq!(hex_float(1.5), "0x1.8p+0");
    }

    #[test]
    fn test_escape_string() {
        assert_eq!(escape_string("hi"), "hi");
        assert_eq!(escape_string("a b"), "a\\032b");
        assert_eq!(escape_string("#\\"), "\\035\\092");
        assert_eq!(escape_string("a\nb"), "a\\010b");
    }

    #[test]
    fn test_literals() {
        assert_eq!(Generator::literal(&TokenKind::IntLit(7)), "int@7");
        assert_eq!(Generator::literal(&TokenKind::FloatLit(1.0)), "float@0x1p+0");
        assert_eq!(
            Generator::literal(&TokenKind::StrLit("hi".into())),
            "string@hi"
        );
        assert_eq!(
            Generator::literal(&TokenKind::Kw(Keyword::Nil)),
            "nil@nil"
        );
    }

    #[test]
    fn test_streams_concatenate_in_order() {
        let mut generator = generator();
        generator.select(Stream::Main);
        generator.emit("MAIN1");
        generator.select(Stream::Prologue);
        generator.emit("PRO1");
        generator.select(Stream::Functions);
        generator.emit("FUN1");
        assert_eq!(generator.assemble(), "PRO1\nFUN1\nMAIN1\n");
    }

    #[test]
    fn test_defvar_hoisting_into_loop_header() {
        let mut generator = generator();
        generator.select(Stream::Functions);
        generator.loop_begin(5);
        generator.emit("LABEL $while$5");
        generator.defvar("LF@%6%x");
        generator.emit("MOVE LF@%6%x nil@nil");
        generator.loop_end(5);
        let out = generator.assemble();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec!["DEFVAR LF@%6%x", "LABEL $while$5", "MOVE LF@%6%x nil@nil"]
        );
    }

    #[test]
    fn test_nested_loops_hoist_to_outermost() {
        let mut generator = generator();
        generator.select(Stream::Functions);
        generator.loop_begin(1);
        generator.emit("LABEL $while$1");
        generator.loop_begin(2);
        generator.emit("LABEL $while$2");
        generator.defvar("LF@%3%y");
        generator.loop_end(2);
        generator.loop_end(1);
        let out = generator.assemble();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(
            lines,
            vec!["DEFVAR LF@%3%y", "LABEL $while$1", "LABEL $while$2"]
        );
    }

    #[test]
    fn test_comments_disabled_by_default() {
        let mut generator = generator();
        generator.select(Stream::Main);
        generator.comment("not emitted");
        assert_eq!(generator.assemble(), "");
    }
}

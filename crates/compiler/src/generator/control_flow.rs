//! Control-flow emission: conditionals, loops, `break`.
//!
//! Every label bakes in the unique id of the scope frame the construct
//! pushed, so labels are globally unique without any mangling pass. The
//! condition value is always expected in `GF@%expr_result` (the parser pops
//! it there, recasting to bool first when the expression's static type is
//! not boolean).

use super::Generator;

impl Generator {
    // ------------------------------------------------------------------
    // if / elseif / else
    // ------------------------------------------------------------------

    /// Branch past this arm when the condition does not hold:
    /// `JUMPIFNEQ $if$<id>$<branch> GF@%expr_result bool@true`.
    pub fn cond_if(&mut self, if_id: u64, branch: usize) {
        self.emit(format!(
            "JUMPIFNEQ $if${if_id}${branch} GF@%expr_result bool@true"
        ));
    }

    /// Close the previous arm and open the next one: jump to the shared end
    /// label, then place the entry label the previous condition targets.
    pub fn cond_next(&mut self, if_id: u64, branch: usize) {
        self.emit(format!("JUMP $if${if_id}$end"));
        self.emit(format!("LABEL $if${if_id}${branch}"));
    }

    /// Shared end label of the whole chain.
    pub fn cond_end(&mut self, if_id: u64) {
        self.emit(format!("LABEL $if${if_id}$end"));
    }

    /// Entry label for the fall-through case of a chain without `else`.
    pub fn cond_tail_label(&mut self, if_id: u64, branch: usize) {
        self.emit(format!("LABEL $if${if_id}${branch}"));
    }

    // ------------------------------------------------------------------
    // Loop DEFVAR hoisting
    // ------------------------------------------------------------------

    /// Note that a loop is about to emit its header. For the outermost loop
    /// this records the insertion point that every `DEFVAR` emitted inside
    /// the loop is hoisted to.
    pub fn loop_begin(&mut self, scope_id: u64) {
        if !self.in_loop {
            self.in_loop = true;
            self.outer_loop_id = Some(scope_id);
            let at = self.list().len();
            self.hoist_at = Some(at);
        }
    }

    /// Leave a loop; hoisting stops when the outermost loop closes.
    pub fn loop_end(&mut self, scope_id: u64) {
        if self.outer_loop_id == Some(scope_id) {
            self.in_loop = false;
            self.outer_loop_id = None;
            self.hoist_at = None;
        }
    }

    // ------------------------------------------------------------------
    // while
    // ------------------------------------------------------------------

    pub fn while_header(&mut self, scope_id: u64) {
        self.emit(format!("LABEL $while${scope_id}"));
    }

    pub fn while_cond(&mut self, scope_id: u64) {
        self.emit(format!(
            "JUMPIFNEQ $end${scope_id} GF@%expr_result bool@true"
        ));
    }

    pub fn while_end(&mut self, scope_id: u64) {
        self.emit(format!("JUMP $while${scope_id}"));
        self.end_label(scope_id);
    }

    // ------------------------------------------------------------------
    // repeat / until
    // ------------------------------------------------------------------

    pub fn repeat_header(&mut self, scope_id: u64) {
        self.emit(format!("LABEL $repeat${scope_id}"));
    }

    /// Loop back while the `until` condition is false, then place the end
    /// label `break` targets.
    pub fn repeat_cond(&mut self, scope_id: u64) {
        self.emit(format!(
            "JUMPIFNEQ $repeat${scope_id} GF@%expr_result bool@true"
        ));
        self.end_label(scope_id);
    }

    // ------------------------------------------------------------------
    // for
    // ------------------------------------------------------------------

    /// Define a float-typed loop bookkeeping variable from
    /// `GF@%expr_result`: declare it, promote an integer value, trap on nil.
    /// Used for the control variable, the terminating condition, and the
    /// step.
    pub fn for_float_var(&mut self, scope_id: u64, name: &str) {
        let var = Self::var(scope_id, name);
        self.defvar(&var);
        self.push_result();
        self.emit("CALL $$recast_to_float_second");
        self.emit(format!("POPS {var}"));
        self.emit(format!("JUMPIFEQ $$ERROR_NIL {var} nil@nil"));
    }

    /// Default step of `1.0` when the third header expression is absent.
    pub fn for_default_step(&mut self, scope_id: u64) {
        let var = Self::var(scope_id, "for%step");
        self.defvar(&var);
        self.emit(format!("MOVE {var} float@0x1p+0"));
    }

    /// Emit the desugared loop header. The shadow variable carries the
    /// control value across iterations; the user-visible variable is
    /// refreshed from it at the top of every iteration, so assignments to it
    /// inside the body do not affect the iteration count. The sign of the
    /// step picks `i <= cond` or `i >= cond` as the continuation predicate.
    pub fn for_header(&mut self, scope_id: u64, name: &str) {
        let var = Self::var(scope_id, name);
        let shadow = format!("LF@%for%{scope_id}%{name}");
        let step = Self::var(scope_id, "for%step");
        let cond = Self::var(scope_id, "for%terminating_cond");
        self.defvar(&shadow);
        self.emit(format!("MOVE {shadow} {var}"));
        self.emit(format!("LABEL $for${scope_id}"));
        self.emit(format!("MOVE {var} {shadow}"));
        self.emit(format!("LT GF@%expr_result {step} float@0x0p+0"));
        self.emit(format!(
            "JUMPIFEQ $for${scope_id}$step_le GF@%expr_result bool@true"
        ));
        // step >= 0: continue while i <= cond
        self.emit(format!("GT GF@%expr_result3 {shadow} {cond}"));
        self.emit(format!(
            "JUMPIFEQ $end${scope_id} GF@%expr_result3 bool@true"
        ));
        self.emit(format!("JUMP $for${scope_id}$body"));
        // step < 0: continue while i >= cond
        self.emit(format!("LABEL $for${scope_id}$step_le"));
        self.emit(format!("LT GF@%expr_result3 {shadow} {cond}"));
        self.emit(format!(
            "JUMPIFEQ $end${scope_id} GF@%expr_result3 bool@true"
        ));
        self.emit(format!("LABEL $for${scope_id}$body"));
    }

    /// Advance the shadow variable by the step and loop.
    pub fn for_step(&mut self, scope_id: u64, name: &str) {
        let shadow = format!("LF@%for%{scope_id}%{name}");
        let step = Self::var(scope_id, "for%step");
        self.emit(format!("ADD {shadow} {shadow} {step}"));
        self.emit(format!("JUMP $for${scope_id}"));
        self.end_label(scope_id);
    }

    // ------------------------------------------------------------------
    // break and loop ends
    // ------------------------------------------------------------------

    /// `break`: jump to the end label of the nearest enclosing loop. The
    /// caller finds that loop's scope id by walking the scope stack.
    pub fn break_jump(&mut self, loop_scope_id: u64) {
        self.emit(format!("JUMP $end${loop_scope_id}"));
    }

    /// `LABEL $end$<id>` — the exit point shared by a loop's normal
    /// termination and its `break`s.
    fn end_label(&mut self, scope_id: u64) {
        self.emit(format!("LABEL $end${scope_id}"));
    }
}

#[cfg(test)]
mod tests {
    use super::super::{Generator, Stream};
    use crate::config::CompilerConfig;

    fn lines(generator: Generator) -> Vec<String> {
        generator.assemble().lines().map(str::to_string).collect()
    }

    fn generator() -> Generator {
        let mut generator = Generator::new(&CompilerConfig::default());
        generator.select(Stream::Functions);
        generator
    }

    #[test]
    fn test_while_labels_pair_up() {
        let mut generator = generator();
        generator.loop_begin(3);
        generator.while_header(3);
        generator.while_cond(3);
        generator.while_end(3);
        generator.loop_end(3);
        assert_eq!(
            lines(generator),
            vec![
                "LABEL $while$3",
                "JUMPIFNEQ $end$3 GF@%expr_result bool@true",
                "JUMP $while$3",
                "LABEL $end$3",
            ]
        );
    }

    #[test]
    fn test_repeat_jumps_back_on_false() {
        let mut generator = generator();
        generator.repeat_header(9);
        generator.repeat_cond(9);
        assert_eq!(
            lines(generator),
            vec![
                "LABEL $repeat$9",
                "JUMPIFNEQ $repeat$9 GF@%expr_result bool@true",
                "LABEL $end$9",
            ]
        );
    }

    #[test]
    fn test_if_chain_shares_one_end_label() {
        let mut generator = generator();
        generator.cond_if(4, 1);
        generator.cond_next(4, 1);
        generator.cond_if(4, 2);
        generator.cond_next(4, 2);
        generator.cond_end(4);
        let out = lines(generator);
        assert_eq!(out.iter().filter(|l| **l == "LABEL $if$4$end").count(), 1);
        assert!(out.contains(&"JUMPIFNEQ $if$4$1 GF@%expr_result bool@true".to_string()));
        assert!(out.contains(&"LABEL $if$4$2".to_string()));
    }

    #[test]
    fn test_for_header_has_all_labels() {
        let mut generator = generator();
        generator.loop_begin(7);
        generator.for_header(7, "i");
        generator.for_step(7, "i");
        generator.loop_end(7);
        let out = lines(generator).join("\n");
        for label in [
            "LABEL $for$7",
            "LABEL $for$7$step_le",
            "LABEL $for$7$body",
            "LABEL $end$7",
        ] {
            assert!(out.contains(label), "missing {label}");
        }
    }

    #[test]
    fn test_break_targets_loop_end() {
        let mut generator = generator();
        generator.break_jump(12);
        assert_eq!(lines(generator), vec!["JUMP $end$12"]);
    }
}

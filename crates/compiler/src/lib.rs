//! IFJ21 compiler library.
//!
//! Compiles the statically-typed, Lua-like IFJ21 language into the
//! IFJcode21 stack-machine IR in a single pass: the recursive-descent
//! statement parser and the operator-precedence expression parser share one
//! token cursor, consult the scope stack and the semantic checks, and mirror
//! every accepted construct straight into the code generator's three
//! instruction streams.
//!
//! ```rust,ignore
//! use ifjc::{CompilerConfig, compile};
//!
//! let ir = compile("require \"ifj21\"", &CompilerConfig::default())?;
//! print!("{ir}");
//! ```

pub mod builtins;
pub mod config;
pub mod errors;
pub mod expr;
pub mod generator;
pub mod parser;
pub mod scanner;
pub mod semantics;
pub mod symstack;
pub mod symtable;

pub use config::CompilerConfig;
pub use errors::CompileError;
pub use parser::Parser;

/// Compile IFJ21 source text to IFJcode21.
///
/// On success the returned string is the complete IR program: prologue,
/// function definitions, and the main block, in that order. On failure the
/// error carries the source position and maps to the documented exit
/// status via [`CompileError::exit_code`].
pub fn compile(source: &str, config: &CompilerConfig) -> Result<String, CompileError> {
    Parser::compile(source, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compile_ok(source: &str) -> String {
        compile(source, &CompilerConfig::default()).expect("program should compile")
    }

    fn compile_err(source: &str) -> CompileError {
        compile(source, &CompilerConfig::default()).expect_err("program should be rejected")
    }

    /// Collect `LABEL` names and jump targets from an IR dump.
    fn labels_and_targets(ir: &str) -> (Vec<&str>, Vec<&str>) {
        let mut labels = Vec::new();
        let mut targets = Vec::new();
        for line in ir.lines().map(str::trim) {
            if let Some(label) = line.strip_prefix("LABEL ") {
                labels.push(label.trim());
            } else if let Some(rest) = line
                .strip_prefix("JUMP ")
                .or_else(|| line.strip_prefix("JUMPIFEQ "))
                .or_else(|| line.strip_prefix("JUMPIFNEQ "))
            {
                targets.push(rest.split_whitespace().next().unwrap());
            }
        }
        (labels, targets)
    }

    #[test]
    fn test_empty_program() {
        let ir = compile_ok("require \"ifj21\"");
        assert!(ir.starts_with(".IFJcode21\n"));
        assert!(ir.contains("LABEL $$MAIN"));
        assert!(ir.ends_with("LABEL $$MAIN$end\nCLEARS\n"));
    }

    #[test]
    fn test_output_is_deterministic() {
        let source = r#"require "ifj21"
        function main()
          local i : integer = 3
          while i > 0 do write(i) i = i - 1 end
        end
        main()"#;
        assert_eq!(compile_ok(source), compile_ok(source));
    }

    #[test]
    fn test_hello_world() {
        // scenario S1
        let ir = compile_ok("require \"ifj21\"\nfunction main() write(\"hi\") end\nmain()");
        assert!(ir.contains("LABEL $main"));
        assert!(ir.contains("PUSHS string@hi"));
        assert!(ir.contains("CALL $write"));
        assert!(ir.contains("CALL $main"));
    }

    #[test]
    fn test_too_many_return_values() {
        // scenario S2
        let err = compile_err("require \"ifj21\"\nfunction f() : integer return 1, 2 end");
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_declaration_definition_signature_mismatch() {
        // scenario S3
        let err = compile_err(
            "require \"ifj21\"\n\
             global foo : function(integer) : integer\n\
             function foo(x : string) : integer return 0 end",
        );
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_promotion_on_first_operand_only() {
        // scenario S4
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               local a : integer = 1\n\
               local b : number  = a + 0.5\n\
             end\n\
             main()",
        );
        // the addition promotes its integer left operand; helper bodies in
        // the prologue aside, no other promotion call is emitted
        let body = &ir[ir.find("LABEL $main").unwrap()..];
        assert_eq!(body.matches("CALL $$recast_to_float_first").count(), 1);
        assert_eq!(body.matches("CALL $$recast_to_float_second").count(), 0);
        assert_eq!(body.matches("CALL $$recast_to_float_both").count(), 0);
    }

    #[test]
    fn test_undefined_identifier() {
        // scenario S5
        let err = compile_err(
            "require \"ifj21\"\nfunction main() local x : integer = ghost end\nmain()",
        );
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_wrong_prolog() {
        // scenario S6
        let err = compile_err("while true do end");
        assert_eq!(err.exit_code(), 7);
        let err = compile_err("require \"lua\"");
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_every_jump_target_exists() {
        let ir = compile_ok(
            r#"require "ifj21"
            function fib(n : integer) : integer
              if n < 2 then return n
              elseif n < 3 then return 1
              else return fib(n - 1) + fib(n - 2)
              end
            end
            function main()
              local i : integer = 0
              while i < 10 do
                write(fib(i), "\n")
                i = i + 1
              end
              for j = 1.0, 3.0 do
                write(j)
              end
              repeat
                i = i - 1
              until i <= 0
            end
            main()"#,
        );
        let (labels, targets) = labels_and_targets(&ir);
        for target in targets {
            assert!(labels.contains(&target), "dangling jump target {target}");
        }
    }

    #[test]
    fn test_defvar_hoisted_out_of_loop() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               while true do\n\
                 local t : integer = 1\n\
               end\n\
             end\n\
             main()",
        );
        let defvar = ir.find("DEFVAR LF@%2%t").expect("t is declared");
        let header = ir.find("LABEL $while$2").expect("loop header");
        assert!(defvar < header, "DEFVAR must precede the loop header");
    }

    #[test]
    fn test_variable_names_carry_scope_ids() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               local x : integer = 1\n\
               if true then\n\
                 local x : string = \"s\"\n\
                 write(x)\n\
               end\n\
               write(x)\n\
             end\n\
             main()",
        );
        // the two `x`s live in different scopes and get distinct IR names
        assert!(ir.contains("DEFVAR LF@%1%x"));
        assert!(ir.contains("DEFVAR LF@%2%x"));
        assert!(ir.contains("PUSHS string@s"));
    }

    #[test]
    fn test_multi_assignment_with_call_tail() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function two() : integer, integer return 1, 2 end\n\
             function main()\n\
               local a : integer\n\
               local b : integer\n\
               a, b = two()\n\
             end\n\
             main()",
        );
        assert!(ir.contains("PUSHS TF@%return0"));
        assert!(ir.contains("PUSHS TF@%return1"));
    }

    #[test]
    fn test_multi_assignment_discards_extras() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function one() : integer return 1 end\n\
             function main()\n\
               local a : integer\n\
               local b : integer\n\
               a, b = one(), 2, 3\n\
             end\n\
             main()",
        );
        // three values for two names: the extra is popped off the stack
        // before the targets are filled right-to-left
        let main_body = &ir[ir.find("LABEL $main").unwrap()..];
        let discard = main_body.find("POPS GF@%expr_result").expect("extra dropped");
        let assign_b = main_body.find("POPS LF@%1%b").expect("b assigned");
        let assign_a = main_body.find("POPS LF@%1%a").expect("a assigned");
        assert!(discard < assign_b && assign_b < assign_a);
    }

    #[test]
    fn test_multi_assignment_nil_fills_missing() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               local a : integer\n\
               local b : integer\n\
               a, b = 1\n\
             end\n\
             main()",
        );
        let main_body = &ir[ir.find("LABEL $main").unwrap()..];
        assert!(main_body.contains("PUSHS nil@nil"));
    }

    #[test]
    fn test_nil_assignable_to_any_type() {
        compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               local s : string = nil\n\
               local i : integer = nil\n\
             end\n\
             main()",
        );
    }

    #[test]
    fn test_assignment_type_mismatch() {
        let err = compile_err(
            "require \"ifj21\"\n\
             function main()\n\
               local i : integer = 1.5\n\
             end\n\
             main()",
        );
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_expression_operator_type_error() {
        let err = compile_err(
            "require \"ifj21\"\nfunction main() local x : integer = 1 + \"s\" end\nmain()",
        );
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_integer_division_requires_integers() {
        let err = compile_err(
            "require \"ifj21\"\nfunction main() local x : integer = 1 // 2.0 end\nmain()",
        );
        assert_eq!(err.exit_code(), 6);
    }

    #[test]
    fn test_break_placement() {
        compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               while true do\n\
                 if true then break end\n\
               end\n\
             end\n\
             main()",
        );
        let err = compile_err("require \"ifj21\"\nfunction main() break end\nmain()");
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_break_targets_nearest_loop_end() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               while true do\n\
                 if true then break end\n\
               end\n\
             end\n\
             main()",
        );
        // the while frame is scope 2 (global 0, main 1); break inside the
        // nested condition still jumps to the loop's end label
        assert!(ir.contains("JUMP $end$2"));
    }

    #[test]
    fn test_redeclaration_in_same_scope() {
        let err = compile_err(
            "require \"ifj21\"\n\
             function main()\n\
               local x : integer\n\
               local x : string\n\
             end\n\
             main()",
        );
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_declared_but_never_defined() {
        let err = compile_err("require \"ifj21\"\nglobal f : function() : integer");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_declaration_then_matching_definition() {
        compile_ok(
            "require \"ifj21\"\n\
             global f : function(integer) : integer\n\
             function f(x : integer) : integer return x end",
        );
    }

    #[test]
    fn test_call_before_definition_via_declaration() {
        compile_ok(
            "require \"ifj21\"\n\
             global f : function() : integer\n\
             function main() local x : integer = f() end\n\
             function f() : integer return 7 end\n\
             main()",
        );
    }

    #[test]
    fn test_wrong_argument_count() {
        let err = compile_err(
            "require \"ifj21\"\n\
             function f(x : integer) return end\n\
             function main() f(1, 2) end\n\
             main()",
        );
        assert_eq!(err.exit_code(), 5);
    }

    #[test]
    fn test_argument_promotion() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function f(x : number) return end\n\
             function main() f(3) end\n\
             main()",
        );
        let body = &ir[ir.find("LABEL $main").unwrap()..];
        assert!(body.contains("CALL $$recast_to_float_second"));
    }

    #[test]
    fn test_short_circuit_emits_branches_not_helpers() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               local b : boolean = true and false or true\n\
             end\n\
             main()",
        );
        assert!(!ir.contains("$$ands_short"));
        assert!(!ir.contains("$$ors_short"));
        assert!(ir.contains("LABEL $and$"));
        assert!(ir.contains("LABEL $or$"));
    }

    #[test]
    fn test_power_and_modulo_use_helpers() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               local a : number  = 2 ^ 8\n\
               local b : integer = 7 % 3\n\
             end\n\
             main()",
        );
        let body = &ir[ir.find("LABEL $main").unwrap()..];
        assert!(body.contains("CALL $$power"));
        assert!(body.contains("CALL $$modulo"));
        // both power operands are integers, promoted together
        assert!(body.contains("CALL $$recast_to_float_both"));
    }

    #[test]
    fn test_concat_and_length() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               local s : string = \"a\" .. \"b\"\n\
               local n : integer = #s\n\
             end\n\
             main()",
        );
        assert!(ir.contains("CONCAT"));
        assert!(ir.contains("STRLEN"));
    }

    #[test]
    fn test_nonboolean_condition_goes_through_truthiness() {
        let ir = compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               local s : string\n\
               if s then write(\"y\") end\n\
             end\n\
             main()",
        );
        let body = &ir[ir.find("LABEL $main").unwrap()..];
        assert!(body.contains("CALL $$recast_to_bool"));
    }

    #[test]
    fn test_calling_undefined_function() {
        let err = compile_err("require \"ifj21\"\nmain()");
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_repeat_until_sees_body_scope() {
        compile_ok(
            "require \"ifj21\"\n\
             function main()\n\
               repeat\n\
                 local done : boolean = true\n\
               until done\n\
             end\n\
             main()",
        );
    }

    #[test]
    fn test_comments_appear_when_enabled() {
        let config = CompilerConfig {
            comments: true,
            ..CompilerConfig::default()
        };
        let source = "require \"ifj21\"\nfunction main() end\nmain()";
        let ir = compile(source, &config).unwrap();
        assert!(ir.contains("# function main"));
        assert!(ir.contains("# main scope"));
        // default output carries no comments at all
        let quiet = compile(source, &CompilerConfig::default()).unwrap();
        assert!(!quiet.lines().any(|line| line.starts_with('#')));
    }

    #[test]
    fn test_lexical_error_exit_code() {
        let err = compile_err("require \"ifj21\" @");
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn test_syntax_error_exit_code() {
        let err = compile_err("require \"ifj21\"\nfunction main( end\nmain()");
        assert_eq!(err.exit_code(), 2);
    }
}

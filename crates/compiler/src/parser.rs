//! Recursive-descent statement parser.
//!
//! Single pass: syntax, semantic checks, and code emission happen together.
//! The parser owns the token cursor, the scope stack, and the generator;
//! expression sites hand control to [`crate::expr`] and get the cursor back
//! on the first token past the expression.
//!
//! Grammar (terminals lowercase):
//!
//! ```text
//! Program    := "require" "\"ifj21\"" { Stmt }
//! Stmt       := FuncDecl | FuncDef | FuncCall
//! FuncDecl   := "global" id ":" "function" "(" [ Type { "," Type } ] ")" RetTypes
//! FuncDef    := "function" id "(" [ id ":" Type { "," id ":" Type } ] ")" RetTypes Body "end"
//! RetTypes   := [ ":" Type { "," Type } ]
//! Body       := { Local | Assign | FuncCall | If | While | Repeat | For | Return | Break }
//! Local      := "local" id ":" Type [ "=" Expr ]
//! Assign     := id { "," id } "=" Expr { "," Expr }
//! If         := "if" Expr "then" Body { "elseif" Expr "then" Body } [ "else" Body ] "end"
//! While      := "while" Expr "do" Body "end"
//! Repeat     := "repeat" Body "until" Expr
//! For        := "for" id "=" Expr "," Expr [ "," Expr ] "do" Body "end"
//! Return     := "return" [ Expr { "," Expr } ]
//! ```

use crate::builtins;
use crate::config::CompilerConfig;
use crate::errors::CompileError;
use crate::expr::{self, ExprOutcome};
use crate::generator::Generator;
use crate::scanner::{Keyword, SourcePos, TokenCursor, TokenKind};
use crate::semantics::{self, Conv, FuncSemantics, T_BOOL, T_FLOAT};
use crate::symstack::ScopeStack;
use crate::symtable::SymbolKind;

/// The compiler driver state: one cursor, one scope stack, one generator.
pub struct Parser {
    pub(crate) cursor: TokenCursor,
    pub(crate) scopes: ScopeStack,
    pub(crate) generator: Generator,
}

impl Parser {
    /// Compile one translation unit to IR text.
    pub fn compile(source: &str, config: &CompilerConfig) -> Result<String, CompileError> {
        let cursor = TokenCursor::new(source)?;
        let mut scopes = ScopeStack::new();
        builtins::register(&mut scopes);
        let mut generator = Generator::new(config);
        generator.prog_start();
        let mut parser = Parser {
            cursor,
            scopes,
            generator,
        };
        parser.program()?;
        parser.generator.main_end();
        Ok(parser.generator.assemble())
    }

    // ------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------

    pub(crate) fn syntax(&self, expected: impl Into<String>) -> CompileError {
        CompileError::Syntax {
            pos: self.cursor.pos(),
            expected: expected.into(),
            got: self.cursor.current().describe(),
        }
    }

    /// Consume the current token if it matches `kind` (payloads ignored).
    pub(crate) fn expect(&mut self, kind: &TokenKind) -> Result<(), CompileError> {
        if self.cursor.current().same_kind(kind) {
            self.cursor.advance()
        } else {
            Err(self.syntax(kind.describe()))
        }
    }

    fn expect_kw(&mut self, kw: Keyword) -> Result<(), CompileError> {
        match self.cursor.current() {
            TokenKind::Kw(found) if *found == kw => self.cursor.advance(),
            _ => Err(self.syntax(format!("'{}'", kw.as_str()))),
        }
    }

    fn expect_id(&mut self) -> Result<String, CompileError> {
        match self.cursor.current().clone() {
            TokenKind::Id(name) => {
                self.cursor.advance()?;
                Ok(name)
            }
            _ => Err(self.syntax("identifier")),
        }
    }

    fn at_kw(&self, kw: Keyword) -> bool {
        matches!(self.cursor.current(), TokenKind::Kw(found) if *found == kw)
    }

    // ------------------------------------------------------------------
    // Symbol helpers
    // ------------------------------------------------------------------

    /// Resolve an identifier to a local variable (excludes the global
    /// frame), returning its kind and owning scope id.
    pub(crate) fn resolve_var(&self, name: &str) -> Option<(SymbolKind, u64)> {
        self.scopes
            .get_local_symbol(name)
            .filter(|(symbol, _)| !symbol.kind.is_function())
            .map(|(symbol, _)| (symbol.kind, symbol.parent_scope_id))
    }

    /// Resolve an identifier to a function in the global frame.
    pub(crate) fn resolve_function(&self, name: &str) -> Option<FuncSemantics> {
        self.scopes
            .global()
            .get(name)
            .and_then(|symbol| symbol.func.clone())
    }

    /// One parsed type keyword.
    fn type_keyword(&mut self) -> Result<SymbolKind, CompileError> {
        let kind = match self.cursor.current() {
            TokenKind::Kw(Keyword::String) => SymbolKind::String,
            TokenKind::Kw(Keyword::Integer) => SymbolKind::Integer,
            TokenKind::Kw(Keyword::Number) => SymbolKind::Number,
            TokenKind::Kw(Keyword::Boolean) => SymbolKind::Boolean,
            _ => return Err(self.syntax("a type")),
        };
        self.cursor.advance()?;
        Ok(kind)
    }

    // ------------------------------------------------------------------
    // Program structure
    // ------------------------------------------------------------------

    fn program(&mut self) -> Result<(), CompileError> {
        // prolog: require "ifj21"
        let pos = self.cursor.pos();
        if !self.at_kw(Keyword::Require) {
            return Err(CompileError::Semantic {
                pos,
                what: "missing 'require \"ifj21\"' prolog".into(),
            });
        }
        self.cursor.advance()?;
        match self.cursor.current() {
            TokenKind::StrLit(text) if text == "ifj21" => self.cursor.advance()?,
            _ => {
                return Err(CompileError::Semantic {
                    pos,
                    what: "wrong prolog: expected \"ifj21\"".into(),
                });
            }
        }

        loop {
            match self.cursor.current() {
                TokenKind::Eof => break,
                TokenKind::Kw(Keyword::Global) => self.func_declaration()?,
                TokenKind::Kw(Keyword::Function) => self.func_definition()?,
                TokenKind::Id(_) => self.top_level_call()?,
                _ => {
                    return Err(self.syntax("'global', 'function', or a function call"));
                }
            }
        }

        // every declared function must have been defined by now
        for symbol in self.scopes.global().symbols() {
            if let Some(func) = &symbol.func {
                if func.is_declared && !func.is_defined && !func.is_builtin {
                    return Err(CompileError::Definition {
                        pos: self.cursor.pos(),
                        name: symbol.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// `global id : function ( types ) [: types]`
    fn func_declaration(&mut self) -> Result<(), CompileError> {
        self.cursor.advance()?;
        let pos = self.cursor.pos();
        let name = self.expect_id()?;
        if let Some(func) = self.resolve_function(&name) {
            if func.is_declared {
                return Err(CompileError::Definition { pos, name });
            }
        }
        self.expect(&TokenKind::Colon)?;
        self.expect_kw(Keyword::Function)?;
        self.expect(&TokenKind::LParen)?;
        let mut params = String::new();
        if !matches!(self.cursor.current(), TokenKind::RParen) {
            loop {
                params.push(self.type_keyword()?.type_code());
                if matches!(self.cursor.current(), TokenKind::Comma) {
                    self.cursor.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let returns = self.return_types()?;

        tracing::debug!(%name, %params, %returns, "function declared");
        let symbol = self.scopes.put_function(&name, SymbolKind::FuncDecl);
        let func = symbol.func.as_mut().expect("function symbol");
        func.declaration.params = params;
        func.declaration.returns = returns;
        if func.is_defined && !func.signatures_match() {
            return Err(CompileError::Definition { pos, name });
        }
        Ok(())
    }

    /// `function id ( id : type, ... ) [: types] body end`
    fn func_definition(&mut self) -> Result<(), CompileError> {
        self.cursor.advance()?;
        let pos = self.cursor.pos();
        let name = self.expect_id()?;
        if let Some(func) = self.resolve_function(&name) {
            if func.is_defined {
                return Err(CompileError::Definition { pos, name });
            }
        }
        self.expect(&TokenKind::LParen)?;
        let mut params = String::new();
        let mut param_names: Vec<(String, SymbolKind)> = Vec::new();
        if !matches!(self.cursor.current(), TokenKind::RParen) {
            loop {
                let param_pos = self.cursor.pos();
                let param = self.expect_id()?;
                self.expect(&TokenKind::Colon)?;
                let kind = self.type_keyword()?;
                if param_names.iter().any(|(existing, _)| *existing == param)
                    || self.resolve_function(&param).is_some()
                {
                    return Err(CompileError::Definition {
                        pos: param_pos,
                        name: param,
                    });
                }
                params.push(kind.type_code());
                param_names.push((param, kind));
                if matches!(self.cursor.current(), TokenKind::Comma) {
                    self.cursor.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        let returns = self.return_types()?;

        tracing::debug!(%name, %params, %returns, "function defined");
        {
            let symbol = self.scopes.put_function(&name, SymbolKind::FuncDef);
            let func = symbol.func.as_mut().expect("function symbol");
            func.definition.params = params;
            func.definition.returns = returns.clone();
            if func.is_declared && !func.signatures_match() {
                return Err(CompileError::Definition { pos, name });
            }
        }

        self.scopes.push(crate::symstack::ScopeKind::Function, Some(&name));
        let scope_id = self.scopes.scope_info().unique_id;
        self.generator.func_start(&name);
        for (index, (param, kind)) in param_names.iter().enumerate() {
            self.scopes.put_symbol(param, *kind);
            self.generator.func_param(scope_id, param, index);
        }
        self.generator.return_defvars(returns.len());

        self.fun_body()?;
        self.expect_kw(Keyword::End)?;
        self.generator.func_end(&name);
        self.scopes.pop();
        Ok(())
    }

    /// `[: type { "," type }]` after a parameter list.
    fn return_types(&mut self) -> Result<String, CompileError> {
        let mut returns = String::new();
        if matches!(self.cursor.current(), TokenKind::Colon) {
            self.cursor.advance()?;
            loop {
                returns.push(self.type_keyword()?.type_code());
                if matches!(self.cursor.current(), TokenKind::Comma) {
                    self.cursor.advance()?;
                } else {
                    break;
                }
            }
        }
        Ok(returns)
    }

    /// A function call as a top-level statement, emitted into the main
    /// stream.
    fn top_level_call(&mut self) -> Result<(), CompileError> {
        let pos = self.cursor.pos();
        let name = self.expect_id()?;
        if !matches!(self.cursor.current(), TokenKind::LParen) {
            return Err(self.syntax("'('"));
        }
        if self.resolve_function(&name).is_none() {
            return Err(CompileError::Definition { pos, name });
        }
        self.parse_call(&name, pos)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Function bodies
    // ------------------------------------------------------------------

    /// Statements until a token that closes the enclosing construct
    /// (`end`, `elseif`, `else`, `until`).
    fn fun_body(&mut self) -> Result<(), CompileError> {
        loop {
            match self.cursor.current() {
                TokenKind::Kw(Keyword::Local) => self.local_decl()?,
                TokenKind::Kw(Keyword::If) => self.if_stmt()?,
                TokenKind::Kw(Keyword::While) => self.while_stmt()?,
                TokenKind::Kw(Keyword::Repeat) => self.repeat_stmt()?,
                TokenKind::Kw(Keyword::For) => self.for_stmt()?,
                TokenKind::Kw(Keyword::Return) => self.return_stmt()?,
                TokenKind::Kw(Keyword::Break) => self.break_stmt()?,
                TokenKind::Id(_) => self.assign_or_call()?,
                _ => return Ok(()),
            }
        }
    }

    /// `local id : type [= expr]`
    fn local_decl(&mut self) -> Result<(), CompileError> {
        self.cursor.advance()?;
        let pos = self.cursor.pos();
        let name = self.expect_id()?;
        if self.scopes.top_contains(&name) || self.resolve_function(&name).is_some() {
            return Err(CompileError::Definition { pos, name });
        }
        self.expect(&TokenKind::Colon)?;
        let kind = self.type_keyword()?;
        let scope_id = self.scopes.scope_info().unique_id;

        if matches!(self.cursor.current(), TokenKind::Assign) {
            self.cursor.advance()?;
            // the initializer must not see the variable being declared,
            // so the symbol is inserted only after the expression
            let value = expr::parse_single(self)?;
            let conv = semantics::check_assign(kind.type_code(), value).ok_or(
                CompileError::AssignmentType {
                    pos,
                    name: name.clone(),
                },
            )?;
            if conv != Conv::None {
                self.generator.recast(Conv::Second);
            }
            self.generator.pop_result();
            self.generator.var_definition(scope_id, &name);
        } else {
            self.generator.var_declaration(scope_id, &name);
        }
        self.scopes.put_symbol(&name, kind);
        Ok(())
    }

    /// Either a call statement or a (possibly multi-value) assignment.
    fn assign_or_call(&mut self) -> Result<(), CompileError> {
        let pos = self.cursor.pos();
        let name = self.expect_id()?;

        if matches!(self.cursor.current(), TokenKind::LParen) {
            if self.resolve_var(&name).is_some() || self.resolve_function(&name).is_none() {
                return Err(CompileError::Definition { pos, name });
            }
            self.parse_call(&name, pos)?;
            return Ok(());
        }

        // assignment target list
        struct Target {
            name: String,
            scope_id: u64,
            type_code: char,
        }
        let mut targets = Vec::new();
        let mut push_target = |parser: &Parser, name: String, pos: SourcePos| {
            match parser.resolve_var(&name) {
                Some((kind, scope_id)) => {
                    targets.push(Target {
                        name,
                        scope_id,
                        type_code: kind.type_code(),
                    });
                    Ok(())
                }
                None => Err(CompileError::Definition { pos, name }),
            }
        };
        push_target(self, name, pos)?;
        while matches!(self.cursor.current(), TokenKind::Comma) {
            self.cursor.advance()?;
            let pos = self.cursor.pos();
            let next = self.expect_id()?;
            push_target(self, next, pos)?;
        }
        self.expect(&TokenKind::Assign)?;

        // right-hand sides, left to right; only a call in the last
        // position contributes its full return tuple
        let rhs_pos = self.cursor.pos();
        let mut sig = String::new();
        loop {
            let outcome = expr::parse_rhs(self)?;
            let more = matches!(self.cursor.current(), TokenKind::Comma);
            match outcome {
                ExprOutcome::Single(type_code) => sig.push(type_code),
                ExprOutcome::Call(returns) => {
                    if more {
                        let first =
                            returns
                                .chars()
                                .next()
                                .ok_or(CompileError::FunctionSemantics {
                                    pos: rhs_pos,
                                    what: "call yields no value".into(),
                                })?;
                        self.generator.push_retval(0);
                        sig.push(first);
                    } else {
                        for index in 0..returns.len() {
                            self.generator.push_retval(index);
                        }
                        sig.push_str(&returns);
                    }
                }
            }
            if more {
                self.cursor.advance()?;
            } else {
                break;
            }
        }

        // pair-wise type compatibility, with i->f promotion and nil as a
        // universal source
        let count = targets.len();
        let received = sig.len();
        let mut convs = vec![Conv::None; count];
        for (index, target) in targets.iter().enumerate() {
            if let Some(value) = sig.chars().nth(index) {
                convs[index] = semantics::check_assign(target.type_code, value).ok_or(
                    CompileError::AssignmentType {
                        pos: rhs_pos,
                        name: target.name.clone(),
                    },
                )?;
            }
        }

        // discard extras, nil-fill the missing, then pop right-to-left
        for _ in count..received {
            self.generator.pop_result();
        }
        for _ in received..count {
            self.generator.push_nil();
        }
        for (index, target) in targets.iter().enumerate().rev() {
            if index < received && convs[index] != Conv::None {
                self.generator.recast(Conv::Second);
            }
            self.generator.var_assignment(target.scope_id, &target.name);
        }
        Ok(())
    }

    /// Shared call parsing for expressions and call statements. The caller
    /// has consumed the function name; the cursor is at `(`. Returns the
    /// callee's return signature; return values are left in
    /// `TF@%return<i>`.
    pub(crate) fn parse_call(
        &mut self,
        name: &str,
        pos: SourcePos,
    ) -> Result<String, CompileError> {
        let func = self
            .resolve_function(name)
            .ok_or_else(|| CompileError::Definition {
                pos,
                name: name.to_string(),
            })?;
        if !func.is_callable() {
            return Err(CompileError::Definition {
                pos,
                name: name.to_string(),
            });
        }
        self.expect(&TokenKind::LParen)?;
        let params = func.effective().params.clone();

        let mut count = 0usize;
        if !matches!(self.cursor.current(), TokenKind::RParen) {
            loop {
                let arg_pos = self.cursor.pos();
                let value = expr::parse_single(self)?;
                if !func.variadic {
                    let expected = params.chars().nth(count).ok_or_else(|| {
                        CompileError::FunctionSemantics {
                            pos: arg_pos,
                            what: format!("too many arguments in call to '{name}'"),
                        }
                    })?;
                    let conv = semantics::check_assign(expected, value).ok_or_else(|| {
                        CompileError::FunctionSemantics {
                            pos: arg_pos,
                            what: format!(
                                "argument {} of '{name}' has the wrong type",
                                count + 1
                            ),
                        }
                    })?;
                    if conv != Conv::None {
                        self.generator.recast(Conv::Second);
                    }
                }
                count += 1;
                if matches!(self.cursor.current(), TokenKind::Comma) {
                    self.cursor.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(&TokenKind::RParen)?;
        if !func.variadic && count != params.len() {
            return Err(CompileError::FunctionSemantics {
                pos,
                what: format!(
                    "'{name}' takes {} argument(s), {count} given",
                    params.len()
                ),
            });
        }

        tracing::debug!(name, count, "call");
        if func.variadic {
            self.generator.write_call(count);
        } else {
            self.generator.call_args(count);
            self.generator.call(name);
        }
        Ok(func.effective().returns.clone())
    }

    // ------------------------------------------------------------------
    // Control flow
    // ------------------------------------------------------------------

    /// Evaluate a condition into `GF@%expr_result`, mapping non-boolean
    /// results through the truthiness helper.
    fn condition_expr(&mut self) -> Result<(), CompileError> {
        let value = expr::parse_single(self)?;
        self.generator.pop_result();
        if value != T_BOOL {
            self.generator.recast_to_bool();
        }
        Ok(())
    }

    /// `if … then … { elseif … then … } [ else … ] end`
    ///
    /// Every branch gets its own scope frame; labels are numbered under the
    /// first branch's scope id.
    fn if_stmt(&mut self) -> Result<(), CompileError> {
        self.cursor.advance()?;
        self.scopes.push(crate::symstack::ScopeKind::Condition, None);
        let if_id = self.scopes.scope_info().unique_id;
        let mut branch = 1usize;

        self.condition_expr()?;
        self.generator.cond_if(if_id, branch);
        self.expect_kw(Keyword::Then)?;
        self.fun_body()?;

        let mut has_else = false;
        loop {
            if self.at_kw(Keyword::Elseif) {
                self.cursor.advance()?;
                self.generator.cond_next(if_id, branch);
                branch += 1;
                self.scopes.pop();
                self.scopes.push(crate::symstack::ScopeKind::Condition, None);
                self.condition_expr()?;
                self.generator.cond_if(if_id, branch);
                self.expect_kw(Keyword::Then)?;
                self.fun_body()?;
            } else if self.at_kw(Keyword::Else) {
                self.cursor.advance()?;
                self.generator.cond_next(if_id, branch);
                has_else = true;
                self.scopes.pop();
                self.scopes.push(crate::symstack::ScopeKind::Condition, None);
                self.fun_body()?;
                break;
            } else {
                break;
            }
        }
        self.expect_kw(Keyword::End)?;
        self.generator.cond_end(if_id);
        if !has_else {
            self.generator.cond_tail_label(if_id, branch);
        }
        self.scopes.pop();
        Ok(())
    }

    /// `while … do … end`
    fn while_stmt(&mut self) -> Result<(), CompileError> {
        self.cursor.advance()?;
        self.scopes.push(crate::symstack::ScopeKind::WhileLoop, None);
        let id = self.scopes.scope_info().unique_id;
        self.generator.loop_begin(id);
        self.generator.while_header(id);
        self.condition_expr()?;
        self.generator.while_cond(id);
        self.expect_kw(Keyword::Do)?;
        self.fun_body()?;
        self.expect_kw(Keyword::End)?;
        self.generator.while_end(id);
        self.generator.loop_end(id);
        self.scopes.pop();
        Ok(())
    }

    /// `repeat … until …` — the condition sees the body's scope.
    fn repeat_stmt(&mut self) -> Result<(), CompileError> {
        self.cursor.advance()?;
        self.scopes
            .push(crate::symstack::ScopeKind::RepeatUntilLoop, None);
        let id = self.scopes.scope_info().unique_id;
        self.generator.loop_begin(id);
        self.generator.repeat_header(id);
        self.fun_body()?;
        self.expect_kw(Keyword::Until)?;
        self.condition_expr()?;
        self.generator.repeat_cond(id);
        self.generator.loop_end(id);
        self.scopes.pop();
        Ok(())
    }

    /// `for id = e1, e2 [, e3] do … end`
    ///
    /// Desugared to a while-style loop over float values: the control
    /// variable, the terminating condition, and the step are all promoted
    /// to float on entry; the step defaults to 1.0.
    fn for_stmt(&mut self) -> Result<(), CompileError> {
        self.cursor.advance()?;
        self.scopes.push(crate::symstack::ScopeKind::ForLoop, None);
        let id = self.scopes.scope_info().unique_id;
        let pos = self.cursor.pos();
        let name = self.expect_id()?;
        if self.resolve_function(&name).is_some() {
            return Err(CompileError::Definition { pos, name });
        }
        self.expect(&TokenKind::Assign)?;

        let mut header_value = |parser: &mut Parser, var: &str| -> Result<(), CompileError> {
            let value_pos = parser.cursor.pos();
            let value = expr::parse_single(parser)?;
            semantics::check_assign(T_FLOAT, value).ok_or(CompileError::AssignmentType {
                pos: value_pos,
                name: var.to_string(),
            })?;
            parser.generator.pop_result();
            parser.generator.for_float_var(id, var);
            Ok(())
        };
        header_value(self, &name)?;
        self.expect(&TokenKind::Comma)?;
        header_value(self, "for%terminating_cond")?;
        if matches!(self.cursor.current(), TokenKind::Comma) {
            self.cursor.advance()?;
            header_value(self, "for%step")?;
        } else {
            self.generator.for_default_step(id);
        }
        self.expect_kw(Keyword::Do)?;

        // the control variable exists only from here on; the header
        // expressions must not see it
        self.scopes.put_symbol(&name, SymbolKind::Number);
        self.generator.loop_begin(id);
        self.generator.for_header(id, &name);
        self.fun_body()?;
        self.expect_kw(Keyword::End)?;
        self.generator.for_step(id, &name);
        self.generator.loop_end(id);
        self.scopes.pop();
        Ok(())
    }

    /// `return [ expr { "," expr } ]`
    ///
    /// Matched pair-wise against the enclosing function's return
    /// signature: surplus expressions are an error, missing values stay
    /// nil (the return slots are nil-initialized on entry).
    fn return_stmt(&mut self) -> Result<(), CompileError> {
        let pos = self.cursor.pos();
        self.cursor.advance()?;
        let fun_name = self
            .scopes
            .enclosing_function_name()
            .ok_or_else(|| CompileError::Semantic {
                pos,
                what: "'return' outside a function".into(),
            })?
            .to_string();
        let returns = self
            .resolve_function(&fun_name)
            .expect("enclosing function is registered")
            .effective()
            .returns
            .clone();

        if expr::starts_expression(self.cursor.current()) {
            let mut index = 0usize;
            loop {
                let value_pos = self.cursor.pos();
                if index >= returns.len() {
                    return Err(CompileError::FunctionSemantics {
                        pos: value_pos,
                        what: format!("'{fun_name}' returns at most {} value(s)", returns.len()),
                    });
                }
                let value = expr::parse_single(self)?;
                let expected = returns.chars().nth(index).expect("index checked");
                let conv = semantics::check_assign(expected, value).ok_or(
                    CompileError::FunctionSemantics {
                        pos: value_pos,
                        what: format!("return value {} has the wrong type", index + 1),
                    },
                )?;
                self.generator.pass_return(index, conv);
                index += 1;
                if matches!(self.cursor.current(), TokenKind::Comma) {
                    self.cursor.advance()?;
                } else {
                    break;
                }
            }
        }
        self.generator.return_jump(&fun_name);
        Ok(())
    }

    /// `break` — legal only with a loop frame somewhere on the scope
    /// stack; jumps to that loop's end label.
    fn break_stmt(&mut self) -> Result<(), CompileError> {
        let pos = self.cursor.pos();
        self.cursor.advance()?;
        let loop_id = self
            .scopes
            .enclosing_loop_id()
            .ok_or_else(|| CompileError::Semantic {
                pos,
                what: "'break' outside a loop".into(),
            })?;
        self.generator.break_jump(loop_id);
        Ok(())
    }
}

//! The recursive-descent parser and semantic core.
//!
//! Each grammar production is a method that consumes tokens from the lexer,
//! resolves names through the scope chain, checks types, and drives the IR
//! builder as constructs are recognized. There is no syntax tree and no error
//! recovery: the first failure propagates straight out of [`Parser::parse`].
//!
//! Token cursor protocol, shared by every production: on entry the current
//! token is the production's first token; on exit the production has consumed
//! its last token, and any lookahead it took beyond that has been pushed back
//! with `unscan`. The caller scans to move on.
//!
//! Expression layers, lowest to highest binding: boolean (`&`, `|`), additive
//! (`+`, `-`), relational, multiplicative (`*`, `/`), factor. Additive
//! recurses into relational, so a comparison binds tighter than `+`/`-`; that
//! is a property of the grammar, not an accident.

use tracing::debug;

use crate::backend::ir::{BinaryOp, IrBuilder, IrFunction, IrStorage, IrValue, UnaryOp};
use crate::frontend::diagnostics::{CompileError, ErrorKind};
use crate::frontend::lexer::Lexer;
use crate::frontend::symbols::{ScopeChain, ScopeSelector, Symbol, SymbolId, SymbolRole};
use crate::frontend::token::{ArithOp, BoolOp, Keyword, LiteralValue, RelOp, TermOp, TokenKind};
use crate::frontend::types::{self, ValueType};

/// Recursion ceiling across expressions and statements. Deeply nested source
/// fails with a diagnostic instead of exhausting the stack.
const MAX_NESTING_DEPTH: u32 = 200;

type ParseResult<T> = Result<T, CompileError>;

/// A typed value flowing up from an expression production.
#[derive(Debug, Clone, Copy)]
struct Typed {
    ty: ValueType,
    value: IrValue,
}

/// The procedure whose body is currently being parsed.
#[derive(Debug)]
struct ProcFrame {
    handle: IrFunction,
    return_type: ValueType,
    /// Value of the last RETURN statement parsed in this body, already
    /// converted to the declared return type.
    return_value: Option<IrValue>,
}

pub struct Parser<'a, 'b> {
    lexer: Lexer<'a>,
    scopes: ScopeChain,
    builder: &'b mut dyn IrBuilder,
    /// Combined expression/statement nesting depth.
    depth: u32,
    /// Stack of procedure bodies under parse, innermost last. Empty while
    /// parsing the program body.
    procs: Vec<ProcFrame>,
}

impl<'a, 'b> Parser<'a, 'b> {
    pub fn new(source: &'a str, builder: &'b mut dyn IrBuilder) -> Self {
        Self {
            lexer: Lexer::new(source),
            scopes: ScopeChain::new(),
            builder,
            depth: 0,
            procs: Vec::new(),
        }
    }

    /// The scope chain, with every symbol the parse declared. Meaningful
    /// after [`Parser::parse`] returns.
    pub fn scopes(&self) -> &ScopeChain {
        &self.scopes
    }

    /// Run the single pass over the whole source.
    ///
    /// Lexical errors never stop the lexer, but they fail the compilation: a
    /// structurally valid parse over a damaged token stream still reports the
    /// first lexical error. When the structure fails after a lexical error,
    /// the lexical error wins; it is the earlier fault.
    #[tracing::instrument(skip_all)]
    pub fn parse(&mut self) -> Result<(), CompileError> {
        self.lexer.scan();
        let result = self.program().and_then(|()| {
            self.lexer.scan();
            if self.lexer.current().kind == TokenKind::Eof {
                Ok(())
            } else {
                Err(self.expected("end of file"))
            }
        });
        match self.lexer.errors().first() {
            Some(lexical) => Err(lexical.clone()),
            None => result,
        }
    }

    // ========================================================================
    // Token helpers
    // ========================================================================

    fn err(&self, kind: ErrorKind) -> CompileError {
        CompileError::new(kind, self.lexer.line())
    }

    /// Expected a concrete token spelling, found the current token.
    fn expect(&mut self, expected: &TokenKind, spelling: &str) -> ParseResult<()> {
        if &self.lexer.current().kind == expected {
            Ok(())
        } else {
            Err(self.err(ErrorKind::ExpectedToken {
                expected: spelling.to_string(),
                found: self.lexer.current().kind.describe(),
            }))
        }
    }

    /// Expected a token class (identifier, type, statement, ...).
    fn expected(&self, what: &str) -> CompileError {
        self.err(ErrorKind::Expected {
            expected: what.to_string(),
            found: self.lexer.current().kind.describe(),
        })
    }

    fn expect_ident(&mut self) -> ParseResult<String> {
        match &self.lexer.current().kind {
            TokenKind::Ident(name) => Ok(name.clone()),
            _ => Err(self.expected("identifier")),
        }
    }

    fn enter(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            Err(self.err(ErrorKind::NestingTooDeep))
        } else {
            Ok(())
        }
    }

    // ========================================================================
    // Type coercion
    // ========================================================================

    fn coerce(&mut self, operand: Typed, target: ValueType) -> IrValue {
        self.builder.emit_convert(operand.value, operand.ty, target)
    }

    /// Common type of two checked operands, numeric promotion first: a float
    /// side makes the operation float, otherwise an int side makes it int.
    fn promote(&mut self, lhs: Typed, rhs: Typed) -> (IrValue, IrValue, ValueType) {
        let ty = if lhs.ty == ValueType::Float || rhs.ty == ValueType::Float {
            ValueType::Float
        } else if lhs.ty == ValueType::Int || rhs.ty == ValueType::Int {
            ValueType::Int
        } else {
            lhs.ty
        };
        let l = self.coerce(lhs, ty);
        let r = self.coerce(rhs, ty);
        (l, r, ty)
    }

    // ========================================================================
    // Program structure
    // ========================================================================

    /// `PROGRAM id IS program_body .`
    fn program(&mut self) -> ParseResult<()> {
        self.expect(&TokenKind::Keyword(Keyword::Program), "PROGRAM")?;
        self.lexer.scan();
        let name = self.expect_ident()?;
        debug!(program = %name, "parsing program");
        self.scopes.declare(ScopeSelector::Global, Symbol::program_name(name.clone()));
        self.lexer.scan();
        self.expect(&TokenKind::Keyword(Keyword::Is), "IS")?;
        self.lexer.scan();
        self.program_body(&name)?;
        self.lexer.scan();
        self.expect(&TokenKind::Period, ".")
    }

    /// `{declaration}* BEGIN {statement}* END PROGRAM`
    ///
    /// Declarations before BEGIN are top-level and therefore global. The
    /// program body itself becomes a function with no return value.
    fn program_body(&mut self, program_name: &str) -> ParseResult<()> {
        while self.lexer.current().kind != TokenKind::Keyword(Keyword::Begin) {
            self.declaration(true)?;
            self.lexer.scan();
        }
        self.lexer.scan();
        let handle = self.builder.begin_function(program_name, ValueType::None, &[]);
        while self.lexer.current().kind != TokenKind::Keyword(Keyword::End) {
            self.statement()?;
            self.lexer.scan();
        }
        self.lexer.scan();
        self.expect(&TokenKind::Keyword(Keyword::Program), "PROGRAM")?;
        self.builder.end_function(handle, None);
        Ok(())
    }

    // ========================================================================
    // Declarations
    // ========================================================================

    /// `[GLOBAL] (VARIABLE variable_declaration | PROCEDURE procedure_declaration) ;`
    fn declaration(&mut self, top_level: bool) -> ParseResult<()> {
        self.enter()?;
        let result = self.declaration_inner(top_level);
        self.depth -= 1;
        result
    }

    fn declaration_inner(&mut self, top_level: bool) -> ParseResult<()> {
        let mut global = top_level;
        if self.lexer.current().kind == TokenKind::Keyword(Keyword::Global) {
            global = true;
            self.lexer.scan();
        }
        match self.lexer.current().kind {
            TokenKind::Keyword(Keyword::Procedure) => {
                self.lexer.scan();
                self.procedure_declaration(global)?;
            }
            TokenKind::Keyword(Keyword::Variable) => {
                self.lexer.scan();
                self.variable_declaration(global, false)?;
            }
            _ => return Err(self.expected("declaration")),
        }
        self.lexer.scan();
        self.expect(&TokenKind::Semicolon, ";")
    }

    /// `id : TYPE [ [int-literal] ]`
    ///
    /// Declares the name in the selected scope and allocates its backing
    /// storage. Parameters skip storage here; it is allocated once their
    /// owning function begins.
    fn variable_declaration(&mut self, global: bool, parameter: bool) -> ParseResult<SymbolId> {
        let name = self.expect_ident()?;
        if self.scopes.lookup_current(&name).is_some()
            || (global && self.scopes.lookup_global(&name).is_some())
        {
            return Err(self.err(ErrorKind::DuplicateDeclaration(name)));
        }
        self.lexer.scan();
        self.expect(&TokenKind::Colon, ":")?;
        self.lexer.scan();
        let TokenKind::TypeWord(type_word) = self.lexer.current().kind else {
            return Err(self.expected("type"));
        };
        self.lexer.scan();
        let (is_array, len) = self.array_suffix()?;

        let ty = ValueType::from_declared(type_word, is_array);
        let selector = if global { ScopeSelector::Global } else { ScopeSelector::Current };
        let mut symbol = Symbol::variable(name.clone(), ty, len);
        if !parameter {
            symbol.storage = Some(self.builder.declare_storage(&name, ty, len));
        }
        Ok(self.scopes.declare(selector, symbol))
    }

    /// Optional `[ int-literal ]`. Returns `(is_array, element count)`.
    fn array_suffix(&mut self) -> ParseResult<(bool, i64)> {
        if self.lexer.current().kind != TokenKind::LBracket {
            self.lexer.unscan();
            return Ok((false, 1));
        }
        self.lexer.scan();
        let len = match self.lexer.current().kind {
            TokenKind::Literal(LiteralValue::Int(v)) if v >= 1 => v,
            _ => return Err(self.err(ErrorKind::IllegalArrayLength)),
        };
        self.lexer.scan();
        self.expect(&TokenKind::RBracket, "]")?;
        Ok((true, len))
    }

    /// `id : TYPE [ [int-literal] ] ( [VARIABLE parameter_list] ) procedure_body`
    ///
    /// The procedure's name lives in the enclosing scope; a fresh scope is
    /// opened before the parameter list so parameters shadow outer names, and
    /// closed on every exit path, success or failure.
    fn procedure_declaration(&mut self, global: bool) -> ParseResult<()> {
        let name = self.expect_ident()?;
        if self.scopes.lookup_current(&name).is_some()
            || (global && self.scopes.lookup_global(&name).is_some())
        {
            return Err(self.err(ErrorKind::DuplicateDeclaration(name)));
        }
        self.lexer.scan();
        self.expect(&TokenKind::Colon, ":")?;
        self.lexer.scan();
        let TokenKind::TypeWord(type_word) = self.lexer.current().kind else {
            return Err(self.expected("type"));
        };
        self.lexer.scan();
        let (is_array, len) = self.array_suffix()?;

        let return_type = ValueType::from_declared(type_word, is_array);
        let selector = if global { ScopeSelector::Global } else { ScopeSelector::Current };
        let proc_id = self
            .scopes
            .declare(selector, Symbol::procedure(name.clone(), return_type, len));
        debug!(procedure = %name, %return_type, "parsing procedure");

        self.scopes.push_scope();
        let result = self.procedure_scope(proc_id);
        self.scopes.pop_scope();
        result
    }

    /// Everything inside the procedure's own scope: parameters, then the
    /// declarations and statements of the body.
    fn procedure_scope(&mut self, proc_id: SymbolId) -> ParseResult<()> {
        self.lexer.scan();
        self.expect(&TokenKind::LParen, "(")?;
        self.lexer.scan();
        let param_ids = if self.lexer.current().kind == TokenKind::Keyword(Keyword::Variable) {
            self.lexer.scan();
            self.parameter_list(proc_id)?
        } else {
            self.lexer.unscan();
            Vec::new()
        };
        self.lexer.scan();
        self.expect(&TokenKind::RParen, ")")?;

        let proc = self.scopes.symbol(proc_id);
        let name = proc.name.clone();
        let return_type = proc.ty;
        let param_types = proc.params.clone();
        let handle = self.builder.begin_function(&name, return_type, &param_types);
        // Parameters were declared before the function existed; give them
        // their storage now that it does.
        for id in param_ids {
            let (param_name, param_ty, param_len) = {
                let sym = self.scopes.symbol(id);
                (sym.name.clone(), sym.ty, sym.len)
            };
            let storage = self.builder.declare_storage(&param_name, param_ty, param_len);
            self.scopes.symbol_mut(id).storage = Some(storage);
        }

        self.procs.push(ProcFrame {
            handle,
            return_type,
            return_value: None,
        });
        self.lexer.scan();
        let result = self.procedure_body();
        let frame = self.procs.pop().expect("INVARIANT: procedure frame pushed above");
        result?;
        self.builder.end_function(frame.handle, frame.return_value);
        Ok(())
    }

    /// `variable_declaration { , VARIABLE variable_declaration }`
    ///
    /// Each parameter is recorded, in order, on the owning procedure's
    /// symbol for call-site checking.
    fn parameter_list(&mut self, proc_id: SymbolId) -> ParseResult<Vec<SymbolId>> {
        let mut ids = Vec::new();
        loop {
            let id = self.variable_declaration(false, true)?;
            let ty = self.scopes.symbol(id).ty;
            self.scopes.symbol_mut(proc_id).params.push(ty);
            ids.push(id);
            self.lexer.scan();
            if self.lexer.current().kind == TokenKind::Comma {
                self.lexer.scan();
                self.expect(&TokenKind::Keyword(Keyword::Variable), "VARIABLE")?;
                self.lexer.scan();
            } else {
                self.lexer.unscan();
                return Ok(ids);
            }
        }
    }

    /// `{declaration}* BEGIN {statement}* END PROCEDURE`
    fn procedure_body(&mut self) -> ParseResult<()> {
        while self.lexer.current().kind != TokenKind::Keyword(Keyword::Begin) {
            self.declaration(false)?;
            self.lexer.scan();
        }
        self.lexer.scan();
        while self.lexer.current().kind != TokenKind::Keyword(Keyword::End) {
            self.statement()?;
            self.lexer.scan();
        }
        self.lexer.scan();
        self.expect(&TokenKind::Keyword(Keyword::Procedure), "PROCEDURE")
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn statement(&mut self) -> ParseResult<()> {
        self.enter()?;
        let result = match self.lexer.current().kind {
            TokenKind::Ident(_) => self.assignment_statement(),
            TokenKind::Keyword(Keyword::If) => self.if_statement(),
            TokenKind::Keyword(Keyword::For) => self.for_statement(),
            TokenKind::Keyword(Keyword::Return) => self.return_statement(),
            _ => Err(self.expected("statement")),
        };
        self.depth -= 1;
        result
    }

    /// `location := expression ;`
    fn assignment_statement(&mut self) -> ParseResult<()> {
        let (place_ty, storage) = self.location()?;
        self.lexer.scan();
        self.expect(&TokenKind::Assign, ":=")?;
        self.lexer.scan();
        let expr = self.expression()?;
        if place_ty != expr.ty && !types::compatible(place_ty, expr.ty) {
            return Err(self.err(ErrorKind::IncompatibleAssignment {
                expected: place_ty,
                found: expr.ty,
            }));
        }
        let value = self.coerce(expr, place_ty);
        self.builder.store(value, storage);
        self.lexer.scan();
        self.expect(&TokenKind::Semicolon, ";")
    }

    /// `IF ( expression ) THEN {statement}* [ELSE {statement}*] END IF ;`
    fn if_statement(&mut self) -> ParseResult<()> {
        self.expect(&TokenKind::Keyword(Keyword::If), "IF")?;
        self.lexer.scan();
        self.expect(&TokenKind::LParen, "(")?;
        self.lexer.scan();
        let cond = self.condition()?;
        self.lexer.scan();
        self.expect(&TokenKind::RParen, ")")?;
        self.lexer.scan();
        self.expect(&TokenKind::Keyword(Keyword::Then), "THEN")?;
        self.lexer.scan();

        let mut branch = self.builder.begin_if(cond);
        while self.lexer.current().kind != TokenKind::Keyword(Keyword::End)
            && self.lexer.current().kind != TokenKind::Keyword(Keyword::Else)
        {
            self.statement()?;
            self.lexer.scan();
        }
        if self.lexer.current().kind == TokenKind::Keyword(Keyword::Else) {
            self.builder.else_branch(&mut branch);
            self.lexer.scan();
            while self.lexer.current().kind != TokenKind::Keyword(Keyword::End) {
                self.statement()?;
                self.lexer.scan();
            }
        }
        self.builder.merge_if(branch, None, None);
        self.lexer.scan();
        self.expect(&TokenKind::Keyword(Keyword::If), "IF")?;
        self.lexer.scan();
        self.expect(&TokenKind::Semicolon, ";")
    }

    /// `FOR ( assignment_statement expression ) {statement}* END FOR ;`
    ///
    /// The loop is checked like any other construct; its condition and body
    /// emit straight-line IR. Structured loop emission is not part of the
    /// builder contract.
    fn for_statement(&mut self) -> ParseResult<()> {
        self.expect(&TokenKind::Keyword(Keyword::For), "FOR")?;
        self.lexer.scan();
        self.expect(&TokenKind::LParen, "(")?;
        self.lexer.scan();
        self.assignment_statement()?;
        self.lexer.scan();
        self.condition()?;
        self.lexer.scan();
        self.expect(&TokenKind::RParen, ")")?;
        self.lexer.scan();
        while self.lexer.current().kind != TokenKind::Keyword(Keyword::End) {
            self.statement()?;
            self.lexer.scan();
        }
        self.lexer.scan();
        self.expect(&TokenKind::Keyword(Keyword::For), "FOR")?;
        self.lexer.scan();
        self.expect(&TokenKind::Semicolon, ";")
    }

    /// A parenthesized condition's expression: must be BOOL or coercible to
    /// it. Returns the condition value as BOOL.
    fn condition(&mut self) -> ParseResult<IrValue> {
        let expr = self.expression()?;
        if expr.ty != ValueType::Bool && !types::compatible(expr.ty, ValueType::Bool) {
            return Err(self.err(ErrorKind::NonBoolCondition));
        }
        Ok(self.coerce(expr, ValueType::Bool))
    }

    /// `RETURN expression ;`
    ///
    /// Legal only inside a procedure body. The value must be convertible to
    /// the declared return type; the conversion is emitted here and the
    /// result delivered when the body ends.
    fn return_statement(&mut self) -> ParseResult<()> {
        self.expect(&TokenKind::Keyword(Keyword::Return), "RETURN")?;
        self.lexer.scan();
        let expr = self.expression()?;
        let Some(frame) = self.procs.last() else {
            return Err(self.err(ErrorKind::ReturnOutsideProcedure));
        };
        let return_type = frame.return_type;
        if !types::convertible(expr.ty, return_type) {
            return Err(self.err(ErrorKind::IncompatibleReturnType {
                expected: return_type,
                found: expr.ty,
            }));
        }
        let value = self.coerce(expr, return_type);
        if let Some(frame) = self.procs.last_mut() {
            frame.return_value = Some(value);
        }
        self.lexer.scan();
        self.expect(&TokenKind::Semicolon, ";")
    }

    /// An assignable place: `id` or `id [ expression ]`. Returns the place's
    /// value type and its storage handle.
    fn location(&mut self) -> ParseResult<(ValueType, IrStorage)> {
        let name = self.expect_ident()?;
        let Some(id) = self.scopes.lookup_visible(&name) else {
            return Err(self.err(ErrorKind::UndeclaredSymbol(name)));
        };
        let symbol = self.scopes.symbol(id);
        if symbol.role != SymbolRole::Variable {
            return Err(self.err(ErrorKind::NotAVariable(name)));
        }
        let ty = symbol.ty;
        let storage = symbol
            .storage
            .expect("INVARIANT: variables have storage once declared");
        self.lexer.scan();
        if self.lexer.current().kind == TokenKind::LBracket {
            if !ty.is_array() {
                return Err(self.err(ErrorKind::NotAnArray(name)));
            }
            self.lexer.scan();
            self.index_expression()?;
            Ok((ty.element_type(), storage))
        } else {
            self.lexer.unscan();
            Ok((ty, storage))
        }
    }

    /// The `expression ]` part of a subscript. The index must be INTEGER.
    fn index_expression(&mut self) -> ParseResult<IrValue> {
        let index = self.expression()?;
        if index.ty != ValueType::Int {
            return Err(self.err(ErrorKind::IllegalArrayIndex));
        }
        self.lexer.scan();
        self.expect(&TokenKind::RBracket, "]")?;
        Ok(index.value)
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    /// `[NOT] arith_op { (&||) arith_op }`
    fn expression(&mut self) -> ParseResult<Typed> {
        self.enter()?;
        let result = self.expression_inner();
        self.depth -= 1;
        result
    }

    fn expression_inner(&mut self) -> ParseResult<Typed> {
        let first = if self.lexer.current().kind == TokenKind::Keyword(Keyword::Not) {
            self.lexer.scan();
            let operand = self.arith_op()?;
            if operand.ty != ValueType::Int && operand.ty != ValueType::Bool {
                return Err(self.err(ErrorKind::InvalidOperandType {
                    op: "NOT".to_string(),
                    operand: operand.ty,
                }));
            }
            Typed {
                ty: operand.ty,
                value: self.builder.emit_unary(UnaryOp::Not, operand.value, operand.ty),
            }
        } else {
            self.arith_op()?
        };
        self.lexer.scan();
        self.expression_chain(first)
    }

    /// Left-associative `&`/`|` chain. Operands must be INTEGER or BOOL; a
    /// BOOL is a one-bit INTEGER for these, so an INTEGER side makes the
    /// result INTEGER.
    fn expression_chain(&mut self, mut last: Typed) -> ParseResult<Typed> {
        loop {
            let op = match self.lexer.current().kind {
                TokenKind::BoolOp(op) => op,
                _ => {
                    self.lexer.unscan();
                    return Ok(last);
                }
            };
            if last.ty != ValueType::Int && last.ty != ValueType::Bool {
                return Err(self.operand_error(op.as_str(), last.ty));
            }
            self.lexer.scan();
            let rhs = self.arith_op()?;
            if rhs.ty != ValueType::Int && rhs.ty != ValueType::Bool {
                return Err(self.operand_error(op.as_str(), rhs.ty));
            }
            let (l, r, ty) = self.promote(last, rhs);
            let bin = match op {
                BoolOp::And => BinaryOp::And,
                BoolOp::Or => BinaryOp::Or,
            };
            last = Typed {
                ty,
                value: self.builder.emit_binary(bin, l, r, ty),
            };
            self.lexer.scan();
        }
    }

    /// `relation { (+|-) relation }`. Operands must be INTEGER or FLOAT; a
    /// FLOAT side promotes the whole operation.
    fn arith_op(&mut self) -> ParseResult<Typed> {
        let first = self.relation()?;
        self.lexer.scan();
        let mut last = first;
        loop {
            let op = match self.lexer.current().kind {
                TokenKind::ArithOp(op) => op,
                _ => {
                    self.lexer.unscan();
                    return Ok(last);
                }
            };
            if last.ty != ValueType::Int && last.ty != ValueType::Float {
                return Err(self.operand_error(op.as_str(), last.ty));
            }
            self.lexer.scan();
            let rhs = self.relation()?;
            if rhs.ty != ValueType::Int && rhs.ty != ValueType::Float {
                return Err(self.operand_error(op.as_str(), rhs.ty));
            }
            let (l, r, ty) = self.promote(last, rhs);
            let bin = match op {
                ArithOp::Plus => BinaryOp::Add,
                ArithOp::Minus => BinaryOp::Sub,
            };
            last = Typed {
                ty,
                value: self.builder.emit_binary(bin, l, r, ty),
            };
            self.lexer.scan();
        }
    }

    /// `term { relop term }`. No array operands; STRING only for `==`/`!=`.
    /// Each link's result is BOOL and feeds the next comparison.
    fn relation(&mut self) -> ParseResult<Typed> {
        let first = self.term()?;
        self.lexer.scan();
        let mut last = first;
        loop {
            let op = match self.lexer.current().kind {
                TokenKind::RelOp(op) => op,
                _ => {
                    self.lexer.unscan();
                    return Ok(last);
                }
            };
            self.check_relational_operand(op, last.ty)?;
            self.lexer.scan();
            let rhs = self.term()?;
            self.check_relational_operand(op, rhs.ty)?;
            if last.ty != rhs.ty && !types::compatible(last.ty, rhs.ty) {
                return Err(self.err(ErrorKind::IncompatibleOperands {
                    op: op.as_str().to_string(),
                    lhs: last.ty,
                    rhs: rhs.ty,
                }));
            }
            let (l, r, operand_ty) = self.promote(last, rhs);
            let bin = match op {
                RelOp::Less => BinaryOp::Less,
                RelOp::LessEq => BinaryOp::LessEq,
                RelOp::Greater => BinaryOp::Greater,
                RelOp::GreaterEq => BinaryOp::GreaterEq,
                RelOp::Equal => BinaryOp::Equal,
                RelOp::NotEqual => BinaryOp::NotEqual,
            };
            last = Typed {
                ty: ValueType::Bool,
                value: self.builder.emit_binary(bin, l, r, operand_ty),
            };
            self.lexer.scan();
        }
    }

    fn check_relational_operand(&self, op: RelOp, ty: ValueType) -> ParseResult<()> {
        let string_misuse = ty == ValueType::Str && op != RelOp::Equal && op != RelOp::NotEqual;
        if string_misuse || ty.is_array() {
            Err(self.err(ErrorKind::InvalidOperandType {
                op: op.as_str().to_string(),
                operand: ty,
            }))
        } else {
            Ok(())
        }
    }

    /// `factor { (*|/) factor }`. Operands must be INTEGER or FLOAT.
    fn term(&mut self) -> ParseResult<Typed> {
        let first = self.factor()?;
        self.lexer.scan();
        let mut last = first;
        loop {
            let op = match self.lexer.current().kind {
                TokenKind::TermOp(op) => op,
                _ => {
                    self.lexer.unscan();
                    return Ok(last);
                }
            };
            if last.ty != ValueType::Int && last.ty != ValueType::Float {
                return Err(self.operand_error(op.as_str(), last.ty));
            }
            self.lexer.scan();
            let rhs = self.factor()?;
            if rhs.ty != ValueType::Int && rhs.ty != ValueType::Float {
                return Err(self.operand_error(op.as_str(), rhs.ty));
            }
            let (l, r, ty) = self.promote(last, rhs);
            let bin = match op {
                TermOp::Star => BinaryOp::Mul,
                TermOp::Slash => BinaryOp::Div,
            };
            last = Typed {
                ty,
                value: self.builder.emit_binary(bin, l, r, ty),
            };
            self.lexer.scan();
        }
    }

    fn operand_error(&self, op: &str, operand: ValueType) -> CompileError {
        self.err(ErrorKind::InvalidOperandType {
            op: op.to_string(),
            operand,
        })
    }

    /// `( expression )` | `- (id | numeric literal)` | `id ident_tail` |
    /// literal.
    ///
    /// Unary minus applies only to an identifier or a numeric literal, never
    /// to a parenthesized sub-expression.
    fn factor(&mut self) -> ParseResult<Typed> {
        match self.lexer.current().kind.clone() {
            TokenKind::LParen => {
                self.enter()?;
                self.lexer.scan();
                let expr = self.expression();
                self.depth -= 1;
                let expr = expr?;
                self.lexer.scan();
                self.expect(&TokenKind::RParen, ")")?;
                Ok(expr)
            }
            TokenKind::ArithOp(ArithOp::Minus) => {
                self.lexer.scan();
                match self.lexer.current().kind.clone() {
                    TokenKind::Ident(name) => {
                        let id = self.resolve(&name)?;
                        self.lexer.scan();
                        let operand = self.ident_tail(id)?;
                        Ok(Typed {
                            ty: operand.ty,
                            value: self.builder.emit_unary(UnaryOp::Negate, operand.value, operand.ty),
                        })
                    }
                    TokenKind::Literal(lit @ (LiteralValue::Int(_) | LiteralValue::Float(_))) => {
                        Ok(Typed {
                            ty: ValueType::from_literal(&lit),
                            value: self.builder.emit_literal(&lit, true),
                        })
                    }
                    _ => Err(self.expected("identifier or numeric literal")),
                }
            }
            TokenKind::Ident(name) => {
                let id = self.resolve(&name)?;
                self.lexer.scan();
                self.ident_tail(id)
            }
            TokenKind::Literal(lit) => Ok(Typed {
                ty: ValueType::from_literal(&lit),
                value: self.builder.emit_literal(&lit, false),
            }),
            _ => Err(self.expected("expression")),
        }
    }

    fn resolve(&self, name: &str) -> ParseResult<SymbolId> {
        self.scopes
            .lookup_visible(name)
            .ok_or_else(|| self.err(ErrorKind::UndeclaredSymbol(name.to_string())))
    }

    /// After an identifier in factor position: a subscript, a call, or the
    /// bare value.
    fn ident_tail(&mut self, id: SymbolId) -> ParseResult<Typed> {
        match self.lexer.current().kind {
            TokenKind::LBracket => {
                let symbol = self.scopes.symbol(id);
                if !symbol.ty.is_array() {
                    return Err(self.err(ErrorKind::NotAnArray(symbol.name.clone())));
                }
                let (elem_ty, storage) = (
                    symbol.ty.element_type(),
                    symbol.storage.expect("INVARIANT: variables have storage once declared"),
                );
                self.lexer.scan();
                self.index_expression()?;
                Ok(Typed {
                    ty: elem_ty,
                    value: self.builder.load(storage),
                })
            }
            TokenKind::LParen => {
                let symbol = self.scopes.symbol(id);
                if symbol.role != SymbolRole::Procedure {
                    return Err(self.err(ErrorKind::NotAProcedure(symbol.name.clone())));
                }
                self.lexer.scan();
                let args = self.argument_list(id)?;
                self.lexer.scan();
                self.expect(&TokenKind::RParen, ")")?;
                let symbol = self.scopes.symbol(id);
                let (name, return_type) = (symbol.name.clone(), symbol.ty);
                Ok(Typed {
                    ty: return_type,
                    value: self.builder.emit_call(&name, &args, return_type),
                })
            }
            _ => {
                self.lexer.unscan();
                let symbol = self.scopes.symbol(id);
                if symbol.role != SymbolRole::Variable {
                    return Err(self.err(ErrorKind::NotAVariable(symbol.name.clone())));
                }
                let (ty, storage) = (
                    symbol.ty,
                    symbol.storage.expect("INVARIANT: variables have storage once declared"),
                );
                Ok(Typed {
                    ty,
                    value: self.builder.load(storage),
                })
            }
        }
    }

    /// The arguments of a call, current token being the first one past `(`.
    /// Arity must match exactly and each argument's type must equal the
    /// declared parameter type positionally; no coercion at call sites.
    fn argument_list(&mut self, proc_id: SymbolId) -> ParseResult<Vec<IrValue>> {
        let (name, params) = {
            let symbol = self.scopes.symbol(proc_id);
            (symbol.name.clone(), symbol.params.clone())
        };
        if self.lexer.current().kind == TokenKind::RParen {
            if !params.is_empty() {
                return Err(self.arity_error(&name, params.len()));
            }
            self.lexer.unscan();
            return Ok(Vec::new());
        }
        if params.is_empty() {
            return Err(self.arity_error(&name, 0));
        }

        let mut args = Vec::new();
        loop {
            let position = args.len();
            let arg = self.expression()?;
            if arg.ty != params[position] {
                return Err(self.err(ErrorKind::InvalidArgumentType {
                    name: name.clone(),
                    position: position + 1,
                    expected: params[position],
                    found: arg.ty,
                }));
            }
            args.push(arg.value);
            self.lexer.scan();
            if self.lexer.current().kind == TokenKind::Comma {
                if args.len() >= params.len() {
                    return Err(self.arity_error(&name, params.len()));
                }
                self.lexer.scan();
            } else {
                self.lexer.unscan();
                break;
            }
        }
        if args.len() != params.len() {
            return Err(self.arity_error(&name, params.len()));
        }
        Ok(args)
    }

    fn arity_error(&self, name: &str, expected: usize) -> CompileError {
        self.err(ErrorKind::WrongArgumentCount {
            name: name.to_string(),
            expected,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ir::NullBuilder;

    fn parse(source: &str) -> Result<(), CompileError> {
        let mut builder = NullBuilder::new();
        Parser::new(source, &mut builder).parse()
    }

    fn parse_err(source: &str) -> ErrorKind {
        parse(source).expect_err("source must be rejected").kind
    }

    #[test]
    fn test_minimal_valid_program() {
        assert_eq!(parse("PROGRAM P IS BEGIN END PROGRAM ."), Ok(()));
    }

    #[test]
    fn test_scenario_global_assignment() {
        let source = "PROGRAM P IS GLOBAL VARIABLE X: INTEGER; BEGIN X := 1 + 2; END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
    }

    #[test]
    fn test_case_insensitive_source() {
        let source = "program p is variable x: integer; begin X := 3; end program .";
        assert_eq!(parse(source), Ok(()));
    }

    #[test]
    fn test_missing_semicolon() {
        let source = "PROGRAM P IS VARIABLE X: INTEGER BEGIN END PROGRAM .";
        assert_eq!(
            parse_err(source),
            ErrorKind::ExpectedToken {
                expected: ";".to_string(),
                found: "BEGIN".to_string(),
            }
        );
    }

    #[test]
    fn test_undeclared_symbol() {
        let source = "PROGRAM P IS BEGIN X := 1; END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::UndeclaredSymbol("X".to_string()));
    }

    #[test]
    fn test_duplicate_declaration_same_scope() {
        let source = "PROGRAM P IS VARIABLE X: INTEGER; VARIABLE X: FLOAT; BEGIN END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::DuplicateDeclaration("X".to_string()));
    }

    #[test]
    fn test_duplicate_global_across_procedures_is_rejected() {
        let source = "PROGRAM P IS \
                      GLOBAL VARIABLE X: INTEGER; \
                      PROCEDURE Q: INTEGER () \
                      GLOBAL VARIABLE X: INTEGER; \
                      BEGIN RETURN 1; END PROCEDURE; \
                      BEGIN END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::DuplicateDeclaration("X".to_string()));
    }

    #[test]
    fn test_same_local_name_in_two_procedures_is_legal() {
        let source = "PROGRAM P IS \
                      PROCEDURE Q: INTEGER () VARIABLE T: INTEGER; \
                      BEGIN T := 1; RETURN T; END PROCEDURE; \
                      PROCEDURE R: INTEGER () VARIABLE T: INTEGER; \
                      BEGIN T := 2; RETURN T; END PROCEDURE; \
                      BEGIN END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
    }

    #[test]
    fn test_parameter_shadows_global() {
        let source = "PROGRAM P IS \
                      GLOBAL VARIABLE X: INTEGER; \
                      PROCEDURE Q: FLOAT (VARIABLE X: FLOAT) \
                      BEGIN RETURN X; END PROCEDURE; \
                      BEGIN X := 1; END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
    }

    #[test]
    fn test_zero_array_length_rejected() {
        let source = "PROGRAM P IS VARIABLE A: INTEGER[0]; BEGIN END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::IllegalArrayLength);
    }

    #[test]
    fn test_array_indexing() {
        let source = "PROGRAM P IS VARIABLE A: INTEGER[4]; BEGIN A[2] := 7; END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
    }

    #[test]
    fn test_float_array_index_rejected() {
        let source = "PROGRAM P IS VARIABLE A: INTEGER[4]; BEGIN A[1.5] := 7; END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::IllegalArrayIndex);
    }

    #[test]
    fn test_subscript_of_scalar_rejected() {
        let source = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X[1] := 7; END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::NotAnArray("X".to_string()));
    }

    #[test]
    fn test_return_outside_procedure() {
        let source = "PROGRAM P IS BEGIN RETURN 1; END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::ReturnOutsideProcedure);
    }

    #[test]
    fn test_return_type_convertible_not_reverse() {
        let ok = "PROGRAM P IS PROCEDURE Q: FLOAT () \
                  BEGIN RETURN 1; END PROCEDURE; BEGIN END PROGRAM .";
        assert_eq!(parse(ok), Ok(()));
        // FLOAT does not convert back to INTEGER.
        let bad = "PROGRAM P IS PROCEDURE Q: INTEGER () \
                   BEGIN RETURN 1.5; END PROCEDURE; BEGIN END PROGRAM .";
        assert_eq!(
            parse_err(bad),
            ErrorKind::IncompatibleReturnType {
                expected: ValueType::Int,
                found: ValueType::Float,
            }
        );
    }

    #[test]
    fn test_call_arity_and_types() {
        let declaration = "PROGRAM P IS \
                           VARIABLE Y: INTEGER; \
                           PROCEDURE Q: INTEGER (VARIABLE A: INTEGER, VARIABLE B: FLOAT) \
                           BEGIN RETURN A; END PROCEDURE; \
                           BEGIN ";
        let ok = format!("{declaration}Y := Q(1, 2.5); END PROGRAM .");
        assert_eq!(parse(&ok), Ok(()));

        let too_few = format!("{declaration}Y := Q(1); END PROGRAM .");
        assert_eq!(
            parse_err(&too_few),
            ErrorKind::WrongArgumentCount {
                name: "Q".to_string(),
                expected: 2,
            }
        );

        let too_many = format!("{declaration}Y := Q(1, 2.5, 3); END PROGRAM .");
        assert_eq!(
            parse_err(&too_many),
            ErrorKind::WrongArgumentCount {
                name: "Q".to_string(),
                expected: 2,
            }
        );

        let wrong_type = format!("{declaration}Y := Q(\"no\", 2.5); END PROGRAM .");
        assert_eq!(
            parse_err(&wrong_type),
            ErrorKind::InvalidArgumentType {
                name: "Q".to_string(),
                position: 1,
                expected: ValueType::Int,
                found: ValueType::Str,
            }
        );
    }

    #[test]
    fn test_call_site_requires_exact_types() {
        // INTEGER argument for a FLOAT parameter: compatible, but call sites
        // require equality.
        let source = "PROGRAM P IS \
                      VARIABLE Y: FLOAT; \
                      PROCEDURE Q: FLOAT (VARIABLE A: FLOAT) \
                      BEGIN RETURN A; END PROCEDURE; \
                      BEGIN Y := Q(1); END PROGRAM .";
        assert_eq!(
            parse_err(source),
            ErrorKind::InvalidArgumentType {
                name: "Q".to_string(),
                position: 1,
                expected: ValueType::Float,
                found: ValueType::Int,
            }
        );
    }

    #[test]
    fn test_calling_a_variable_rejected() {
        let source = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := X(); END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::NotAProcedure("X".to_string()));
    }

    #[test]
    fn test_assigning_to_procedure_rejected() {
        let source = "PROGRAM P IS PROCEDURE Q: INTEGER () \
                      BEGIN RETURN 1; END PROCEDURE; \
                      BEGIN Q := 1; END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::NotAVariable("Q".to_string()));
    }

    #[test]
    fn test_relational_binds_tighter_than_additive() {
        // 1 + 2 < 3 groups as 1 + (2 < 3): the comparison yields BOOL, which
        // is not a legal additive operand, so the whole expression is
        // rejected at the '+'.
        let source = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := 1 + 2 < 3; END PROGRAM .";
        assert_eq!(
            parse_err(source),
            ErrorKind::InvalidOperandType {
                op: "+".to_string(),
                operand: ValueType::Bool,
            }
        );
        // The same grouping is fine where a BOOL operand is legal.
        let boolean = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := 1 & 2 < 3; END PROGRAM .";
        assert_eq!(parse(boolean), Ok(()));
    }

    #[test]
    fn test_mixed_numeric_promotion() {
        let source = "PROGRAM P IS VARIABLE F: FLOAT; BEGIN F := 1 + 2.5 * 3; END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
    }

    #[test]
    fn test_int_float_assignment_compatibility() {
        let source = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := 2.5; END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
        let bad = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := \"text\"; END PROGRAM .";
        assert_eq!(
            parse_err(bad),
            ErrorKind::IncompatibleAssignment {
                expected: ValueType::Int,
                found: ValueType::Str,
            }
        );
    }

    #[test]
    fn test_string_relational_only_equality() {
        let ok = "PROGRAM P IS VARIABLE B: BOOL; VARIABLE S: STRING; \
                  BEGIN B := S == \"x\"; END PROGRAM .";
        assert_eq!(parse(ok), Ok(()));
        let bad = "PROGRAM P IS VARIABLE B: BOOL; VARIABLE S: STRING; \
                   BEGIN B := S < \"x\"; END PROGRAM .";
        assert_eq!(
            parse_err(bad),
            ErrorKind::InvalidOperandType {
                op: "<".to_string(),
                operand: ValueType::Str,
            }
        );
    }

    #[test]
    fn test_nonbool_condition_rejected() {
        let source = "PROGRAM P IS VARIABLE X: INTEGER; \
                      BEGIN IF (2.5) THEN X := 1; END IF; END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::NonBoolCondition);
    }

    #[test]
    fn test_if_else_and_for() {
        let source = "PROGRAM P IS VARIABLE I: INTEGER; VARIABLE X: INTEGER; \
                      BEGIN \
                      IF (I < 10) THEN X := 1; ELSE X := 2; END IF; \
                      FOR (I := 0; I < 10) X := X + I; END FOR; \
                      END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
    }

    #[test]
    fn test_unary_minus_literal_and_identifier() {
        let source = "PROGRAM P IS VARIABLE X: INTEGER; \
                      BEGIN X := -3; X := -X; END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
    }

    #[test]
    fn test_unary_minus_of_paren_rejected() {
        let source = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := -(3); END PROGRAM .";
        assert_eq!(
            parse_err(source),
            ErrorKind::Expected {
                expected: "identifier or numeric literal".to_string(),
                found: "(".to_string(),
            }
        );
    }

    #[test]
    fn test_not_operator() {
        let source = "PROGRAM P IS VARIABLE B: BOOL; BEGIN B := NOT B; END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
        let bad = "PROGRAM P IS VARIABLE B: BOOL; BEGIN B := NOT 2.5; END PROGRAM .";
        assert_eq!(
            parse_err(bad),
            ErrorKind::InvalidOperandType {
                op: "NOT".to_string(),
                operand: ValueType::Float,
            }
        );
    }

    #[test]
    fn test_trailing_garbage_after_period() {
        let source = "PROGRAM P IS BEGIN END PROGRAM . extra";
        assert_eq!(
            parse_err(source),
            ErrorKind::Expected {
                expected: "end of file".to_string(),
                found: "identifier".to_string(),
            }
        );
    }

    #[test]
    fn test_lexical_error_fails_valid_structure() {
        // The lone '!' is dropped by the lexer, leaving a structurally valid
        // stream; the parse must still fail with the lexical error.
        let source = "PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := 1 ! ; END PROGRAM .";
        assert_eq!(parse_err(source), ErrorKind::UnrecognizedToken("!".to_string()));
    }

    #[test]
    fn test_scope_balance_after_failed_procedure_body() {
        let source = "PROGRAM P IS \
                      PROCEDURE Q: INTEGER (VARIABLE A: INTEGER) \
                      BEGIN RETURN Z; END PROCEDURE; \
                      BEGIN END PROGRAM .";
        let mut builder = NullBuilder::new();
        let mut parser = Parser::new(source, &mut builder);
        assert!(parser.parse().is_err());
        // The failed body's scope was still popped.
        assert_eq!(parser.scopes().depth(), 2);
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let depth = 300;
        let mut source = String::from("PROGRAM P IS VARIABLE X: INTEGER; BEGIN X := ");
        source.push_str(&"(".repeat(depth));
        source.push('1');
        source.push_str(&")".repeat(depth));
        source.push_str("; END PROGRAM .");
        assert_eq!(parse_err(&source), ErrorKind::NestingTooDeep);
    }

    #[test]
    fn test_nested_procedure_sees_outer_local() {
        let source = "PROGRAM P IS \
                      PROCEDURE OUTER: INTEGER () \
                      VARIABLE T: INTEGER; \
                      PROCEDURE INNER: INTEGER () \
                      BEGIN RETURN T; END PROCEDURE; \
                      BEGIN T := INNER(); RETURN T; END PROCEDURE; \
                      BEGIN END PROGRAM .";
        assert_eq!(parse(source), Ok(()));
    }
}

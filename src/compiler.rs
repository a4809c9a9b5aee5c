//! Lox compiler
//!
//! A single-pass Pratt parser: scanning, precedence-climbing expression
//! parsing, scope/name resolution, and bytecode emission all happen in one
//! walk over the token stream, with no intermediate AST.

use std::cell::RefCell;
use std::rc::Rc;

use crate::chunk::{OpCode, UpvalueDesc};
use crate::error::InterpretError;
use crate::object::{FunctionObject, Object};
use crate::scanner::{Scanner, Token, TokenType};
use crate::value::Value;
use crate::vm::VM;

/// Precedence levels, lowest to highest
#[derive(
    Debug,
    Copy,
    Clone,
    PartialOrd,
    Ord,
    PartialEq,
    Eq,
    strum_macros::Display,
    strum_macros::AsRefStr,
    strum_macros::FromRepr,
)]
enum Precedence {
    None,
    Assignment, // =
    Or,         // or
    And,        // and
    Equality,   // ==, !=
    Comparison, // < > <= >=
    Term,       // + -
    Factor,     // * /
    Unary,      // ! -
    Call,       // . ()
    Primary,
}

impl Precedence {
    #[inline]
    fn next(&self) -> Self {
        Self::from_repr(*self as usize + 1).unwrap()
    }
}

impl TokenType {
    /// Pratt Parser precedence rule
    #[inline]
    fn precedence(&self) -> Precedence {
        match self {
            Self::Or => Precedence::Or,
            Self::And => Precedence::And,
            Self::BangEqual | Self::EqualEqual => Precedence::Equality,
            Self::Greater | Self::GreaterEqual | Self::Less | Self::LessEqual => {
                Precedence::Comparison
            }
            Self::Minus | Self::Plus => Precedence::Term,
            Self::Slash | Self::Star => Precedence::Factor,
            Self::LeftParen | Self::Dot => Precedence::Call,
            _ => Precedence::None,
        }
    }
}

const LOCALS_MAX: usize = std::u8::MAX as usize + 1;
const UPVALUES_MAX: usize = std::u8::MAX as usize + 1;

/// What kind of function body is currently being compiled
///
/// Distinguishes the implicit top-level script from user functions and
/// methods, and separates `init` methods out since they implicitly return
/// `this` instead of `nil`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum FunctionType {
    Script,
    Function,
    Method,
    Initializer,
}

/// Local variable state
#[derive(Debug, Clone, Copy)]
struct Local<'a> {
    name: Token<'a>,
    depth: Option<usize>,
    is_captured: bool,
}

/// One function body's worth of compiler state
///
/// Frames live in a flat `Vec` on the `Parser` rather than a linked chain of
/// `enclosing` pointers: entering a nested function pushes a frame, leaving
/// it pops one, and upvalue resolution walks the vector by index instead of
/// following pointers.
#[derive(Debug)]
struct Frame<'a> {
    function: FunctionObject,
    function_type: FunctionType,
    locals: Vec<Local<'a>>,
    upvalues: Vec<UpvalueDesc>,
    scope_depth: usize,
}

impl<'a> Frame<'a> {
    fn new(function_type: FunctionType, name: Rc<str>) -> Self {
        // slot 0 is reserved: `this` for methods/initializers, unnamed
        // otherwise (the callee's own closure/function slot)
        let reserved_name = match function_type {
            FunctionType::Method | FunctionType::Initializer => "this",
            _ => "",
        };

        Self {
            function: FunctionObject::new(name),
            function_type,
            locals: vec![Local {
                name: Token {
                    r#type: TokenType::Identifier,
                    lexeme: Some(reserved_name),
                    line: 0,
                },
                depth: Some(0),
                is_captured: false,
            }],
            upvalues: Vec::new(),
            scope_depth: 0,
        }
    }
}

/// Tracks whether the class currently being compiled has a superclass, so
/// `super` can be rejected outside a class or in a class with no parent.
#[derive(Debug)]
struct ClassScope {
    has_superclass: bool,
}

/// Lox parser/compiler
///
/// Sort of implements the Pratt Parser from the book but without building
/// the table - prefix/infix rules are plain `match` dispatch instead.
#[derive(Debug)]
struct Parser<'a> {
    vm: &'a VM,
    scanner: RefCell<Scanner<'a>>,

    frames: RefCell<Vec<Frame<'a>>>,
    class_scopes: RefCell<Vec<ClassScope>>,

    current: RefCell<Token<'a>>,
    previous: RefCell<Token<'a>>,

    had_error: RefCell<bool>,
    panic_mode: RefCell<bool>,
}

impl<'a> Parser<'a> {
    fn new(scanner: Scanner<'a>, vm: &'a VM) -> Self {
        Self {
            vm,
            scanner: RefCell::new(scanner),
            frames: RefCell::new(Vec::new()),
            class_scopes: RefCell::new(Vec::new()),
            current: RefCell::new(Token::default()),
            previous: RefCell::new(Token::default()),
            had_error: RefCell::new(false),
            panic_mode: RefCell::new(false),
        }
    }

    #[inline]
    fn had_error(&self) -> bool {
        *self.had_error.borrow()
    }

    #[inline]
    fn is_panic_mode(&self) -> bool {
        *self.panic_mode.borrow()
    }

    fn advance(&self) {
        *self.previous.borrow_mut() = *self.current.borrow();

        loop {
            let token = self.scanner.borrow_mut().scan_token();
            *self.current.borrow_mut() = token;
            if !self.check(TokenType::Error) {
                break;
            }

            self.error_at_current(self.current.borrow().lexeme.unwrap());
        }
    }

    #[inline]
    fn check(&self, r#type: TokenType) -> bool {
        self.current.borrow().r#type == r#type
    }

    fn r#match(&self, r#type: TokenType) -> bool {
        if !self.check(r#type) {
            return false;
        }

        self.advance();
        true
    }

    fn consume(&self, r#type: TokenType, error_message: impl AsRef<str>) {
        if self.check(r#type) {
            self.advance();
            return;
        }

        self.error_at_current(error_message);
    }

    /// Pratt Parser prefix parsing rule
    fn prefix(&self, r#type: TokenType, can_assign: bool) -> bool {
        match r#type {
            TokenType::Nil | TokenType::False | TokenType::True => self.literal(),
            TokenType::LeftParen => self.grouping(),
            TokenType::Minus | TokenType::Bang => self.unary(),
            TokenType::String => self.string(),
            TokenType::Number => self.number(),
            TokenType::Identifier => self.variable(can_assign),
            TokenType::This => self.this_expr(),
            TokenType::Super => self.super_expr(),
            _ => return false,
        }

        true
    }

    /// Pratt Parser infix parsing rule
    fn infix(&self, r#type: TokenType, can_assign: bool) -> bool {
        match r#type {
            TokenType::BangEqual
            | TokenType::EqualEqual
            | TokenType::Greater
            | TokenType::GreaterEqual
            | TokenType::Less
            | TokenType::LessEqual
            | TokenType::Minus
            | TokenType::Plus
            | TokenType::Slash
            | TokenType::Star => self.binary(),
            TokenType::And => self.and_expr(),
            TokenType::Or => self.or_expr(),
            TokenType::LeftParen => self.call(),
            TokenType::Dot => self.dot(can_assign),
            _ => return false,
        }

        true
    }

    fn parse_precedence(&self, precedence: Precedence) {
        self.advance();

        // assignment is only allowed for lower precedences
        let can_assign = precedence <= Precedence::Assignment;

        let r#type = self.previous.borrow().r#type;
        if !self.prefix(r#type, can_assign) {
            self.error("Expect expression.");
            return;
        }

        loop {
            let current = self.current.borrow().r#type.precedence();
            if precedence > current {
                break;
            }

            self.advance();

            let r#type = self.previous.borrow().r#type;
            self.infix(r#type, can_assign);
        }

        if can_assign && self.r#match(TokenType::Equal) {
            self.error("Invalid assignment target.");
        }
    }

    // -- current-frame helpers ------------------------------------------

    fn emit_instruction(&self, instruction: OpCode) -> usize {
        let line = self.previous.borrow().line;
        self.frames
            .borrow_mut()
            .last_mut()
            .unwrap()
            .function
            .chunk
            .write(instruction, line)
    }

    fn emit_instructions(&self, instructions: impl AsRef<[OpCode]>) {
        for instruction in instructions.as_ref() {
            self.emit_instruction(instruction.clone());
        }
    }

    fn current_chunk_size(&self) -> usize {
        self.frames.borrow().last().unwrap().function.chunk.size()
    }

    fn patch_jump(&self, idx: usize) {
        let too_far = {
            let frames = self.frames.borrow();
            let chunk = &frames.last().unwrap().function.chunk;
            chunk.size() - idx - 1 > std::u16::MAX as usize
        };

        if too_far {
            self.error("Too much code to jump over.");
            return;
        }

        self.frames
            .borrow_mut()
            .last_mut()
            .unwrap()
            .function
            .chunk
            .patch_jump(idx);
    }

    fn emit_loop(&self, loop_start: usize) {
        let too_far = {
            let frames = self.frames.borrow();
            let chunk = &frames.last().unwrap().function.chunk;
            // +1 accounts for the Loop instruction itself, not yet emitted
            // when this distance is computed; mirrors chunk.rs's emit_loop.
            chunk.size() + 1 - loop_start > std::u16::MAX as usize
        };

        if too_far {
            self.error("Loop body too large.");
            return;
        }

        let line = self.previous.borrow().line;
        self.frames
            .borrow_mut()
            .last_mut()
            .unwrap()
            .function
            .chunk
            .emit_loop(loop_start, line);
    }

    fn make_constant(&self, value: Value) -> u8 {
        let idx = self
            .frames
            .borrow_mut()
            .last_mut()
            .unwrap()
            .function
            .chunk
            .add_constant(value);

        if idx > u8::MAX as usize {
            self.error("Too many constants in one chunk.");
            return 0;
        }
        idx as u8
    }

    fn emit_constant(&self, value: Value) {
        let constant = self.make_constant(value);
        self.emit_instruction(OpCode::Constant(constant));
    }

    fn emit_return(&self) {
        let function_type = self.frames.borrow().last().unwrap().function_type;
        if function_type == FunctionType::Initializer {
            self.emit_instruction(OpCode::GetLocal(0));
        } else {
            self.emit_instruction(OpCode::Nil);
        }
        self.emit_instruction(OpCode::Return);
    }

    fn end_compiler(&self) -> Frame<'a> {
        self.emit_return();

        let frame = self.frames.borrow_mut().pop().unwrap();

        #[cfg(feature = "debug_code")]
        if !self.had_error() {
            let label = if frame.function.name.is_empty() {
                "<script>"
            } else {
                &frame.function.name
            };
            frame.function.chunk.disassemble(label);
        }

        frame
    }

    // -- scopes and locals ------------------------------------------------

    fn is_local_scope(&self) -> bool {
        self.frames.borrow().last().unwrap().scope_depth > 0
    }

    fn begin_scope(&self) {
        self.frames.borrow_mut().last_mut().unwrap().scope_depth += 1;
    }

    fn end_scope(&self) {
        let ops = {
            let mut frames = self.frames.borrow_mut();
            let frame = frames.last_mut().unwrap();
            frame.scope_depth -= 1;
            let scope_depth = frame.scope_depth;

            let mut ops = Vec::new();
            while let Some(local) = frame.locals.last() {
                if local.depth.map_or(false, |depth| depth > scope_depth) {
                    ops.push(if local.is_captured {
                        OpCode::CloseUpvalue
                    } else {
                        OpCode::Pop
                    });
                    frame.locals.pop();
                } else {
                    break;
                }
            }
            ops
        };

        for op in ops {
            self.emit_instruction(op);
        }
    }

    fn push_local(&self, name: Token<'a>) {
        self.frames.borrow_mut().last_mut().unwrap().locals.push(Local {
            name,
            depth: None,
            is_captured: false,
        });
    }

    fn declare_variable(&self) {
        if !self.is_local_scope() {
            return;
        }

        let name = *self.previous.borrow();
        let lexeme = name.lexeme.unwrap();

        let duplicate = {
            let frames = self.frames.borrow();
            let frame = frames.last().unwrap();
            let scope_depth = frame.scope_depth;

            frame
                .locals
                .iter()
                .rev()
                .take_while(|local| local.depth.map_or(true, |depth| depth >= scope_depth))
                .any(|local| local.name.lexeme.unwrap() == lexeme)
        };

        if duplicate {
            self.error("Already a variable with this name in this scope.");
            return;
        }

        let too_many = self.frames.borrow().last().unwrap().locals.len() >= LOCALS_MAX;
        if too_many {
            self.error("Too many local variables in function.");
            return;
        }

        self.push_local(name);
    }

    fn mark_initialized(&self) {
        let mut frames = self.frames.borrow_mut();
        let frame = frames.last_mut().unwrap();
        if frame.scope_depth == 0 {
            // global function declaration, not a local slot
            return;
        }
        let depth = frame.scope_depth;
        let idx = frame.locals.len() - 1;
        frame.locals[idx].depth = Some(depth);
    }

    fn resolve_local(&self, frame_idx: usize, name: &str) -> Result<Option<u8>, (u8, &'static str)> {
        let frames = self.frames.borrow();
        let frame = &frames[frame_idx];

        for (idx, local) in frame.locals.iter().enumerate().rev() {
            if local.name.lexeme.unwrap() == name {
                if local.depth.is_none() {
                    return Err((idx as u8, "Can't read local variable in its own initializer."));
                }
                return Ok(Some(idx as u8));
            }
        }

        Ok(None)
    }

    fn resolve_upvalue(&self, frame_idx: usize, name: &str) -> Result<Option<u8>, (u8, &'static str)> {
        if frame_idx == 0 {
            return Ok(None);
        }
        let enclosing_idx = frame_idx - 1;

        if let Some(local_idx) = self.resolve_local(enclosing_idx, name)? {
            self.frames.borrow_mut()[enclosing_idx].locals[local_idx as usize].is_captured = true;
            return Ok(Some(self.add_upvalue(frame_idx, local_idx, true)));
        }

        if let Some(upvalue_idx) = self.resolve_upvalue(enclosing_idx, name)? {
            return Ok(Some(self.add_upvalue(frame_idx, upvalue_idx, false)));
        }

        Ok(None)
    }

    fn add_upvalue(&self, frame_idx: usize, index: u8, is_local: bool) -> u8 {
        {
            let frames = self.frames.borrow();
            let frame = &frames[frame_idx];

            for (i, upvalue) in frame.upvalues.iter().enumerate() {
                if upvalue.index == index && upvalue.is_local == is_local {
                    return i as u8;
                }
            }
        }

        let too_many = self.frames.borrow()[frame_idx].upvalues.len() >= UPVALUES_MAX;
        if too_many {
            self.error("Too many closure variables in function.");
            return 0;
        }

        let mut frames = self.frames.borrow_mut();
        let frame = &mut frames[frame_idx];
        frame.upvalues.push(UpvalueDesc { index, is_local });
        frame.function.upvalue_count = frame.upvalues.len();
        (frame.upvalues.len() - 1) as u8
    }

    fn identifier_constant(&self, name: &str) -> u8 {
        let obj = self.vm.intern(name);
        self.make_constant(obj.into())
    }

    fn parse_variable(&self, error_message: impl AsRef<str>) -> u8 {
        self.consume(TokenType::Identifier, error_message);

        self.declare_variable();

        // local variables don't go in the constants table
        if self.is_local_scope() {
            return 0;
        }

        let name = self.previous.borrow().lexeme.unwrap();
        self.identifier_constant(name)
    }

    fn define_variable(&self, idx: u8) {
        if self.is_local_scope() {
            self.mark_initialized();
            return;
        }

        self.emit_instruction(OpCode::DefineGlobal(idx));
    }

    fn named_variable(&self, name: &str, can_assign: bool) {
        let frame_idx = self.frames.borrow().len() - 1;

        let (get, set) = match self.resolve_local(frame_idx, name) {
            Ok(Some(idx)) => (OpCode::GetLocal(idx), OpCode::SetLocal(idx)),
            Ok(None) => match self.resolve_upvalue(frame_idx, name) {
                Ok(Some(idx)) => (OpCode::GetUpvalue(idx), OpCode::SetUpvalue(idx)),
                Ok(None) => {
                    let idx = self.identifier_constant(name);
                    (OpCode::GetGlobal(idx), OpCode::SetGlobal(idx))
                }
                Err((idx, err)) => {
                    self.error(err);
                    (OpCode::GetLocal(idx), OpCode::SetLocal(idx))
                }
            },
            Err((idx, err)) => {
                self.error(err);
                (OpCode::GetLocal(idx), OpCode::SetLocal(idx))
            }
        };

        if can_assign && self.r#match(TokenType::Equal) {
            self.expression();
            self.emit_instruction(set);
        } else {
            self.emit_instruction(get);
        }
    }

    // -- declarations and statements --------------------------------------

    fn declaration(&self) {
        if self.r#match(TokenType::Class) {
            self.class_declaration();
        } else if self.r#match(TokenType::Fun) {
            self.fun_declaration();
        } else if self.r#match(TokenType::Var) {
            self.var_declaration();
        } else {
            self.statement();
        }

        if self.is_panic_mode() {
            self.synchronize();
        }
    }

    fn class_declaration(&self) {
        self.consume(TokenType::Identifier, "Expect class name.");
        let class_name = self.previous.borrow().lexeme.unwrap();
        let name_constant = self.identifier_constant(class_name);
        self.declare_variable();

        self.emit_instruction(OpCode::Class(name_constant));
        self.define_variable(name_constant);

        self.class_scopes.borrow_mut().push(ClassScope {
            has_superclass: false,
        });

        if self.r#match(TokenType::Less) {
            self.consume(TokenType::Identifier, "Expect superclass name.");
            let superclass_name = self.previous.borrow().lexeme.unwrap();
            self.variable(false);

            if superclass_name == class_name {
                self.error("A class can't inherit from itself.");
            }

            self.begin_scope();
            self.push_local(Token {
                r#type: TokenType::Identifier,
                lexeme: Some("super"),
                line: 0,
            });
            self.mark_initialized();

            self.named_variable(class_name, false);
            self.emit_instruction(OpCode::Inherit);
            self.class_scopes.borrow_mut().last_mut().unwrap().has_superclass = true;
        }

        self.named_variable(class_name, false);
        self.consume(TokenType::LeftBrace, "Expect '{' before class body.");
        while !self.check(TokenType::RightBrace) && !self.check(TokenType::Eof) {
            self.method();
        }
        self.consume(TokenType::RightBrace, "Expect '}' after class body.");
        self.emit_instruction(OpCode::Pop);

        if self.class_scopes.borrow().last().unwrap().has_superclass {
            self.end_scope();
        }

        self.class_scopes.borrow_mut().pop();
    }

    fn method(&self) {
        self.consume(TokenType::Identifier, "Expect method name.");
        let name = self.previous.borrow().lexeme.unwrap();
        let constant = self.identifier_constant(name);

        let function_type = if name == "init" {
            FunctionType::Initializer
        } else {
            FunctionType::Method
        };

        self.function(function_type);
        self.emit_instruction(OpCode::Method(constant));
    }

    fn fun_declaration(&self) {
        let global = self.parse_variable("Expect function name.");
        self.mark_initialized();
        self.function(FunctionType::Function);
        self.define_variable(global);
    }

    fn function(&self, function_type: FunctionType) {
        let name = self.previous.borrow().lexeme.unwrap();
        let name_obj = self.vm.intern_name(name);

        self.frames.borrow_mut().push(Frame::new(function_type, name_obj));

        self.begin_scope();

        self.consume(TokenType::LeftParen, "Expect '(' after function name.");
        if !self.check(TokenType::RightParen) {
            loop {
                {
                    let mut frames = self.frames.borrow_mut();
                    frames.last_mut().unwrap().function.arity += 1;
                }
                if self.frames.borrow().last().unwrap().function.arity > 255 {
                    self.error_at_current("Can't have more than 255 parameters.");
                }

                let constant = self.parse_variable("Expect parameter name.");
                self.define_variable(constant);

                if !self.r#match(TokenType::Comma) {
                    break;
                }
            }
        }
        self.consume(TokenType::RightParen, "Expect ')' after parameters.");
        self.consume(TokenType::LeftBrace, "Expect '{' before function body.");
        self.block_statement();

        let frame = self.end_compiler();
        let upvalues = frame.upvalues.clone();
        let function_obj = self.vm.alloc_function(frame.function);
        let constant = self.make_constant(function_obj.into());
        self.emit_instruction(OpCode::Closure(constant, upvalues));
    }

    fn var_declaration(&self) {
        // variable_declaration -> "var" IDENTIFIER ( "=" expression )? ";"

        let global = self.parse_variable("Expect variable name.");

        if self.r#match(TokenType::Equal) {
            self.expression();
        } else {
            self.emit_instruction(OpCode::Nil);
        }

        self.consume(
            TokenType::Semicolon,
            "Expect ';' after variable declaration.",
        );

        self.define_variable(global);
    }

    fn statement(&self) {
        if self.r#match(TokenType::Print) {
            self.print_statement();
        } else if self.r#match(TokenType::If) {
            self.if_statement();
        } else if self.r#match(TokenType::Return) {
            self.return_statement();
        } else if self.r#match(TokenType::While) {
            self.while_statement();
        } else if self.r#match(TokenType::For) {
            self.for_statement();
        } else if self.r#match(TokenType::LeftBrace) {
            self.begin_scope();
            self.block_statement();
            self.end_scope();
        } else {
            self.expression_statement();
        }
    }

    fn print_statement(&self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after value.");
        self.emit_instruction(OpCode::Print);
    }

    fn if_statement(&self) {
        self.consume(TokenType::LeftParen, "Expect '(' after 'if'.");
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after condition.");

        let then_idx = self.emit_instruction(OpCode::JumpIfFalse(0));
        self.emit_instruction(OpCode::Pop);
        self.statement();

        let else_idx = self.emit_instruction(OpCode::Jump(0));

        self.patch_jump(then_idx);
        self.emit_instruction(OpCode::Pop);

        if self.r#match(TokenType::Else) {
            self.statement();
        }
        self.patch_jump(else_idx);
    }

    fn while_statement(&self) {
        let loop_start = self.current_chunk_size();

        self.consume(TokenType::LeftParen, "Expect '(' after 'while'.");
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after condition.");

        let exit_idx = self.emit_instruction(OpCode::JumpIfFalse(0));
        self.emit_instruction(OpCode::Pop);
        self.statement();
        self.emit_loop(loop_start);

        self.patch_jump(exit_idx);
        self.emit_instruction(OpCode::Pop);
    }

    fn for_statement(&self) {
        self.begin_scope();
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.");

        if self.r#match(TokenType::Semicolon) {
            // no initializer
        } else if self.r#match(TokenType::Var) {
            self.var_declaration();
        } else {
            self.expression_statement();
        }

        let mut loop_start = self.current_chunk_size();

        let mut exit_idx = None;
        if !self.r#match(TokenType::Semicolon) {
            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after loop condition.");

            exit_idx = Some(self.emit_instruction(OpCode::JumpIfFalse(0)));
            self.emit_instruction(OpCode::Pop);
        }

        if !self.r#match(TokenType::RightParen) {
            let body_idx = self.emit_instruction(OpCode::Jump(0));

            let increment_start = self.current_chunk_size();
            self.expression();
            self.emit_instruction(OpCode::Pop);
            self.consume(TokenType::RightParen, "Expect ')' after for clauses.");

            self.emit_loop(loop_start);
            loop_start = increment_start;
            self.patch_jump(body_idx);
        }

        self.statement();
        self.emit_loop(loop_start);

        if let Some(exit_idx) = exit_idx {
            self.patch_jump(exit_idx);
            self.emit_instruction(OpCode::Pop);
        }

        self.end_scope();
    }

    fn return_statement(&self) {
        let function_type = self.frames.borrow().last().unwrap().function_type;
        if function_type == FunctionType::Script {
            self.error("Can't return from top-level code.");
        }

        if self.r#match(TokenType::Semicolon) {
            self.emit_return();
        } else {
            if function_type == FunctionType::Initializer {
                self.error("Can't return a value from an initializer.");
            }

            self.expression();
            self.consume(TokenType::Semicolon, "Expect ';' after return value.");
            self.emit_instruction(OpCode::Return);
        }
    }

    fn expression_statement(&self) {
        self.expression();
        self.consume(TokenType::Semicolon, "Expect ';' after expression.");
        self.emit_instruction(OpCode::Pop);
    }

    fn block_statement(&self) {
        loop {
            if self.check(TokenType::RightBrace) || self.check(TokenType::Eof) {
                break;
            }

            self.declaration();
        }

        self.consume(TokenType::RightBrace, "Expect '}' after block.");
    }

    // -- expressions -------------------------------------------------------

    fn expression(&self) {
        self.parse_precedence(Precedence::Assignment);
    }

    fn grouping(&self) {
        self.expression();
        self.consume(TokenType::RightParen, "Expect ')' after expression.");
    }

    fn and_expr(&self) {
        let end_idx = self.emit_instruction(OpCode::JumpIfFalse(0));
        self.emit_instruction(OpCode::Pop);
        self.parse_precedence(Precedence::And);
        self.patch_jump(end_idx);
    }

    fn or_expr(&self) {
        let else_idx = self.emit_instruction(OpCode::JumpIfFalse(0));
        let end_idx = self.emit_instruction(OpCode::Jump(0));

        self.patch_jump(else_idx);
        self.emit_instruction(OpCode::Pop);

        self.parse_precedence(Precedence::Or);
        self.patch_jump(end_idx);
    }

    fn binary(&self) {
        let operator = self.previous.borrow().r#type;
        self.parse_precedence(operator.precedence().next());

        match operator {
            // a != b == !(a == b)
            TokenType::BangEqual => self.emit_instructions([OpCode::Equal, OpCode::Not]),
            TokenType::EqualEqual => {
                self.emit_instruction(OpCode::Equal);
            }
            TokenType::Greater => {
                self.emit_instruction(OpCode::Greater);
            }
            // a >= b == !(a < b)
            TokenType::GreaterEqual => self.emit_instructions([OpCode::Less, OpCode::Not]),
            TokenType::Less => {
                self.emit_instruction(OpCode::Less);
            }
            // a <= b == !(a > b)
            TokenType::LessEqual => self.emit_instructions([OpCode::Greater, OpCode::Not]),
            TokenType::Plus => {
                self.emit_instruction(OpCode::Add);
            }
            TokenType::Minus => {
                self.emit_instruction(OpCode::Subtract);
            }
            TokenType::Star => {
                self.emit_instruction(OpCode::Multiply);
            }
            TokenType::Slash => {
                self.emit_instruction(OpCode::Divide);
            }
            _ => unreachable!(),
        }
    }

    fn unary(&self) {
        let operator = self.previous.borrow().r#type;

        self.parse_precedence(Precedence::Unary);

        match operator {
            TokenType::Minus => {
                self.emit_instruction(OpCode::Negate);
            }
            TokenType::Bang => {
                self.emit_instruction(OpCode::Not);
            }
            _ => unreachable!(),
        }
    }

    fn call(&self) {
        let argc = self.argument_list();
        self.emit_instruction(OpCode::Call(argc));
    }

    fn argument_list(&self) -> u8 {
        let mut argc: u8 = 0;

        if !self.check(TokenType::RightParen) {
            loop {
                self.expression();

                if argc == 255 {
                    self.error("Can't have more than 255 arguments.");
                } else {
                    argc += 1;
                }

                if !self.r#match(TokenType::Comma) {
                    break;
                }
            }
        }

        self.consume(TokenType::RightParen, "Expect ')' after arguments.");
        argc
    }

    fn dot(&self, can_assign: bool) {
        self.consume(TokenType::Identifier, "Expect property name after '.'.");
        let name = self.previous.borrow().lexeme.unwrap();
        let constant = self.identifier_constant(name);

        if can_assign && self.r#match(TokenType::Equal) {
            self.expression();
            self.emit_instruction(OpCode::SetProperty(constant));
        } else if self.r#match(TokenType::LeftParen) {
            let argc = self.argument_list();
            self.emit_instruction(OpCode::Invoke(constant, argc));
        } else {
            self.emit_instruction(OpCode::GetProperty(constant));
        }
    }

    fn this_expr(&self) {
        if self.class_scopes.borrow().is_empty() {
            self.error("Can't use 'this' outside of a class.");
            return;
        }

        self.named_variable("this", false);
    }

    fn super_expr(&self) {
        match self.class_scopes.borrow().last() {
            None => {
                self.error("Can't use 'super' outside of a class.");
            }
            Some(scope) if !scope.has_superclass => {
                self.error("Can't use 'super' in a class with no superclass.");
            }
            Some(_) => {}
        }

        self.consume(TokenType::Dot, "Expect '.' after 'super'.");
        self.consume(TokenType::Identifier, "Expect superclass method name.");
        let name = self.previous.borrow().lexeme.unwrap();
        let constant = self.identifier_constant(name);

        self.named_variable("this", false);

        if self.r#match(TokenType::LeftParen) {
            let argc = self.argument_list();
            self.named_variable("super", false);
            self.emit_instruction(OpCode::SuperInvoke(constant, argc));
        } else {
            self.named_variable("super", false);
            self.emit_instruction(OpCode::GetSuper(constant));
        }
    }

    fn string(&self) {
        let value = self.previous.borrow().lexeme.unwrap();

        // string lexemes include the quotes, so we need to cut them off
        let value = &value[1..value.len() - 1];

        let obj = self.vm.intern(value);
        self.emit_constant(obj.into());
    }

    fn number(&self) {
        let value = self
            .previous
            .borrow()
            .lexeme
            .unwrap()
            .parse::<f64>()
            .unwrap();
        self.emit_constant(value.into());
    }

    fn variable(&self, can_assign: bool) {
        let name = self.previous.borrow().lexeme.unwrap();
        self.named_variable(name, can_assign);
    }

    fn literal(&self) {
        match self.previous.borrow().r#type {
            TokenType::Nil => {
                self.emit_instruction(OpCode::Nil);
            }
            TokenType::False => {
                self.emit_instruction(OpCode::False);
            }
            TokenType::True => {
                self.emit_instruction(OpCode::True);
            }
            _ => unreachable!(),
        }
    }

    // -- error handling ------------------------------------------------

    fn error_at_current(&self, message: impl AsRef<str>) {
        self.error_at(&self.current.borrow(), message);
    }

    fn error(&self, message: impl AsRef<str>) {
        self.error_at(&self.previous.borrow(), message);
    }

    fn error_at(&self, token: &Token, message: impl AsRef<str>) {
        // only print the first error
        if self.is_panic_mode() {
            return;
        }
        *self.panic_mode.borrow_mut() = true;

        tracing::error!(
            "[line {}] Error{}: {}",
            token.line,
            if token.r#type == TokenType::Eof {
                " at end".to_owned()
            } else if token.r#type == TokenType::Error {
                "".to_owned()
            } else {
                format!(" at '{}'", token.lexeme.unwrap())
            },
            message.as_ref()
        );

        *self.had_error.borrow_mut() = true;
    }

    fn synchronize(&self) {
        *self.panic_mode.borrow_mut() = false;

        loop {
            if self.check(TokenType::Eof) {
                break;
            }

            if self.previous.borrow().r#type == TokenType::Semicolon {
                return;
            }

            match self.current.borrow().r#type {
                TokenType::Class
                | TokenType::Fun
                | TokenType::Var
                | TokenType::For
                | TokenType::If
                | TokenType::While
                | TokenType::Print
                | TokenType::Return => return,
                _ => (),
            }

            self.advance();
        }
    }
}

/// Compiles Lox source into the top-level script function
///
/// program -> declaration* EOF
pub fn compile(input: impl AsRef<str>, vm: &VM) -> Result<Rc<Object>, InterpretError> {
    let scanner = Scanner::new(input.as_ref());
    let parser = Parser::new(scanner, vm);

    parser
        .frames
        .borrow_mut()
        .push(Frame::new(FunctionType::Script, "".into()));

    parser.advance();

    loop {
        if parser.r#match(TokenType::Eof) {
            break;
        }

        parser.declaration();
    }

    let frame = parser.end_compiler();

    if parser.had_error() {
        Err(InterpretError::Compile)
    } else {
        Ok(vm.alloc_function(frame.function))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::OpCode;

    fn script_chunk(source: &str) -> crate::chunk::Chunk {
        let vm = VM::new();
        let function = compile(source, &vm).expect("should compile");
        // script functions carry their chunk directly
        match Rc::try_unwrap(function) {
            Ok(Object::Function(f)) => f.chunk,
            _ => panic!("expected a top-level function object"),
        }
    }

    #[test]
    fn compiles_arithmetic_with_correct_opcodes() {
        let chunk = script_chunk("1 + 2 * 3;");
        let ops: Vec<_> = (0..chunk.size()).map(|i| chunk.read(i).to_string()).collect();
        assert_eq!(
            ops,
            vec!["OP_CONSTANT", "OP_CONSTANT", "OP_CONSTANT", "OP_MULTIPLY", "OP_ADD", "OP_POP", "OP_NIL", "OP_RETURN"]
        );
    }

    #[test]
    fn reports_error_on_bad_assignment_target() {
        let vm = VM::new();
        let result = compile("1 = 2;", &vm);
        assert!(matches!(result, Err(InterpretError::Compile)));
    }

    #[test]
    fn while_loop_emits_loop_instruction() {
        let chunk = script_chunk("while (true) { print 1; }");
        let has_loop = (0..chunk.size()).any(|i| matches!(chunk.read(i), OpCode::Loop(_)));
        assert!(has_loop);
    }

    #[test]
    fn function_declaration_emits_closure() {
        let chunk = script_chunk("fun f() { return 1; }");
        let has_closure = (0..chunk.size()).any(|i| matches!(chunk.read(i), OpCode::Closure(..)));
        assert!(has_closure);
    }

    #[test]
    fn shadowed_local_resolves_differently_than_outer_global() {
        let chunk = script_chunk("var a = 1; { var a = 2; print a; } print a;");
        let ops: Vec<_> = (0..chunk.size()).map(|i| chunk.read(i).to_string()).collect();

        let inner_print = ops.iter().position(|op| op == "OP_GET_LOCAL").unwrap();
        let outer_print = ops.iter().rposition(|op| op == "OP_GET_GLOBAL").unwrap();
        assert!(inner_print < outer_print);
    }

    #[test]
    fn nested_function_closes_over_outer_local() {
        let chunk = script_chunk(
            "fun outer() { var x = 1; fun inner() { print x; } inner(); }",
        );

        let upvalue_desc = (0..chunk.size()).find_map(|i| match chunk.read(i) {
            OpCode::Closure(_, upvalues) if !upvalues.is_empty() => Some(upvalues.clone()),
            _ => None,
        });
        let upvalues = upvalue_desc.expect("inner closure should capture an upvalue");
        assert_eq!(upvalues.len(), 1);
        assert!(upvalues[0].is_local);
    }

    #[test]
    fn global_compound_assignment_emits_get_then_set() {
        let chunk = script_chunk("var a; a = a + 1;");
        let ops: Vec<_> = (0..chunk.size()).map(|i| chunk.read(i).to_string()).collect();
        assert_eq!(
            ops,
            vec![
                "OP_NIL",
                "OP_DEFINE_GLOBAL",
                "OP_GET_GLOBAL",
                "OP_CONSTANT",
                "OP_ADD",
                "OP_SET_GLOBAL",
                "OP_POP",
                "OP_NIL",
                "OP_RETURN",
            ]
        );
    }

    #[test]
    fn super_call_emits_super_invoke() {
        let chunk = script_chunk(
            "class A {} class B < A { greet() { super.greet(); } }",
        );
        // find B's greet() closure and check its chunk for SUPER_INVOKE
        let found = (0..chunk.size()).any(|i| match chunk.read(i) {
            OpCode::Closure(idx, _) => match chunk.get_constant(*idx as usize) {
                Value::Object(obj) => {
                    let inner = &obj.as_function().chunk;
                    (0..inner.size()).any(|j| matches!(inner.read(j), OpCode::SuperInvoke(..)))
                }
                _ => false,
            },
            _ => false,
        });
        assert!(found);
    }

    #[test]
    fn reads_local_in_own_initializer_is_an_error() {
        let vm = VM::new();
        let result = compile("{ var a = a; }", &vm);
        assert!(matches!(result, Err(InterpretError::Compile)));
    }

    #[test]
    fn duplicate_local_declaration_is_an_error() {
        let vm = VM::new();
        let result = compile("{ var x; var x; }", &vm);
        assert!(matches!(result, Err(InterpretError::Compile)));
    }

    #[test]
    fn class_inheriting_from_itself_is_an_error() {
        let vm = VM::new();
        let result = compile("class A < A {}", &vm);
        assert!(matches!(result, Err(InterpretError::Compile)));
    }

    #[test]
    fn invalid_assignment_target_is_an_error() {
        let vm = VM::new();
        let result = compile("a + b = c;", &vm);
        assert!(matches!(result, Err(InterpretError::Compile)));
    }
}

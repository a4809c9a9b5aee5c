//! Bytecode chunks

use crate::value::{Value, ValueArray};

/// Describes where a closure's captured upvalue comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpvalueDesc {
    /// Index into the enclosing function's locals (if `is_local`) or its
    /// own upvalues (otherwise)
    pub index: u8,

    /// Does this upvalue capture a local of the immediately enclosing
    /// function, or does it capture one of *that* function's upvalues?
    pub is_local: bool,
}

/// Bytecode operation codes
///
/// Each variant is one logical instruction; operands that C's bytecode
/// stream would encode as trailing bytes are embedded directly in the
/// variant instead.
#[derive(Debug, Clone, strum_macros::Display, strum_macros::EnumCount)]
pub enum OpCode {
    #[strum(serialize = "OP_CONSTANT")]
    Constant(u8),
    #[strum(serialize = "OP_NIL")]
    Nil,
    #[strum(serialize = "OP_TRUE")]
    True,
    #[strum(serialize = "OP_FALSE")]
    False,
    #[strum(serialize = "OP_POP")]
    Pop,
    #[strum(serialize = "OP_GET_LOCAL")]
    GetLocal(u8),
    #[strum(serialize = "OP_SET_LOCAL")]
    SetLocal(u8),
    #[strum(serialize = "OP_GET_GLOBAL")]
    GetGlobal(u8),
    #[strum(serialize = "OP_DEFINE_GLOBAL")]
    DefineGlobal(u8),
    #[strum(serialize = "OP_SET_GLOBAL")]
    SetGlobal(u8),
    #[strum(serialize = "OP_GET_UPVALUE")]
    GetUpvalue(u8),
    #[strum(serialize = "OP_SET_UPVALUE")]
    SetUpvalue(u8),
    #[strum(serialize = "OP_GET_PROPERTY")]
    GetProperty(u8),
    #[strum(serialize = "OP_SET_PROPERTY")]
    SetProperty(u8),
    #[strum(serialize = "OP_GET_SUPER")]
    GetSuper(u8),
    #[strum(serialize = "OP_EQUAL")]
    Equal,
    #[strum(serialize = "OP_GREATER")]
    Greater,
    #[strum(serialize = "OP_LESS")]
    Less,
    #[strum(serialize = "OP_ADD")]
    Add,
    #[strum(serialize = "OP_SUBTRACT")]
    Subtract,
    #[strum(serialize = "OP_MULTIPLY")]
    Multiply,
    #[strum(serialize = "OP_DIVIDE")]
    Divide,
    #[strum(serialize = "OP_NOT")]
    Not,
    #[strum(serialize = "OP_NEGATE")]
    Negate,
    #[strum(serialize = "OP_PRINT")]
    Print,
    #[strum(serialize = "OP_JUMP")]
    Jump(u16),
    #[strum(serialize = "OP_JUMP_IF_FALSE")]
    JumpIfFalse(u16),
    #[strum(serialize = "OP_LOOP")]
    Loop(u16),
    #[strum(serialize = "OP_CALL")]
    Call(u8),
    #[strum(serialize = "OP_INVOKE")]
    Invoke(u8, u8),
    #[strum(serialize = "OP_SUPER_INVOKE")]
    SuperInvoke(u8, u8),
    #[strum(serialize = "OP_CLOSURE")]
    Closure(u8, Vec<UpvalueDesc>),
    #[strum(serialize = "OP_CLOSE_UPVALUE")]
    CloseUpvalue,
    #[strum(serialize = "OP_RETURN")]
    Return,
    #[strum(serialize = "OP_CLASS")]
    Class(u8),
    #[strum(serialize = "OP_INHERIT")]
    Inherit,
    #[strum(serialize = "OP_METHOD")]
    Method(u8),
}

impl OpCode {
    /// Disassemble the opcode to stdout
    pub fn disassemble(&self, offset: usize, chunk: &Chunk) -> usize {
        match self {
            Self::Constant(idx) => {
                println!(
                    "{:<16} {:>4} '{}'",
                    self,
                    idx,
                    chunk.get_constant(*idx as usize)
                );
            }
            Self::GetLocal(idx)
            | Self::SetLocal(idx)
            | Self::GetGlobal(idx)
            | Self::DefineGlobal(idx)
            | Self::SetGlobal(idx)
            | Self::GetUpvalue(idx)
            | Self::SetUpvalue(idx)
            | Self::Call(idx) => {
                println!("{:<16} {:>4}", self, idx);
            }
            Self::GetProperty(idx) | Self::SetProperty(idx) | Self::GetSuper(idx) => {
                println!(
                    "{:<16} {:>4} '{}'",
                    self,
                    idx,
                    chunk.get_constant(*idx as usize)
                );
            }
            Self::Class(idx) | Self::Method(idx) => {
                println!(
                    "{:<16} {:>4} '{}'",
                    self,
                    idx,
                    chunk.get_constant(*idx as usize)
                );
            }
            Self::Invoke(idx, argc) | Self::SuperInvoke(idx, argc) => {
                println!(
                    "{:<16} ({} args) {:>4} '{}'",
                    self,
                    argc,
                    idx,
                    chunk.get_constant(*idx as usize)
                );
            }
            Self::Jump(dist) | Self::JumpIfFalse(dist) => {
                println!("{:<16} -> {}", self, offset as isize + 1 + *dist as isize);
            }
            Self::Loop(dist) => {
                println!("{:<16} -> {}", self, offset as isize + 1 - *dist as isize);
            }
            Self::Closure(idx, upvalues) => {
                println!(
                    "{:<16} {:>4} '{}'",
                    self,
                    idx,
                    chunk.get_constant(*idx as usize)
                );
                for upvalue in upvalues {
                    println!(
                        "                         {} {}",
                        if upvalue.is_local { "local" } else { "upvalue" },
                        upvalue.index
                    );
                }
            }
            _ => println!("{}", self),
        }

        offset + 1
    }
}

/// Chunk of bytecode
#[derive(Debug, Default)]
pub struct Chunk {
    /// Bytecode instructions
    code: Vec<OpCode>,

    /// Source line for each instruction, parallel to `code`
    lines: Vec<usize>,

    /// Constant pool
    constants: ValueArray,
}

impl Chunk {
    /// Create a new chunk of bytecode
    pub fn new() -> Self {
        Self {
            // 8 here to match what GROW_CAPACITY starts with
            code: Vec::with_capacity(8),
            lines: Vec::with_capacity(8),
            constants: ValueArray::new(),
        }
    }

    /// Write an instruction to the chunk, returning its index
    pub fn write(&mut self, instruction: OpCode, line: usize) -> usize {
        self.code.push(instruction);
        self.lines.push(line);
        self.code.len() - 1
    }

    /// Number of instructions currently in the chunk
    #[inline]
    pub fn size(&self) -> usize {
        self.code.len()
    }

    /// Read the instruction at `ip`
    #[inline]
    pub fn read(&self, ip: usize) -> &OpCode {
        &self.code[ip]
    }

    /// The source line the instruction at `ip` came from
    #[inline]
    pub fn line_at(&self, ip: usize) -> usize {
        self.lines[ip]
    }

    /// Add a value to the constant pool, returning its index
    pub fn add_constant(&mut self, value: Value) -> usize {
        self.constants.push(value);
        self.constants.len() - 1
    }

    /// Read a constant by index
    #[inline]
    pub fn get_constant(&self, idx: usize) -> &Value {
        &self.constants[idx]
    }

    /// Patch a previously emitted forward jump to land at the current end
    /// of the chunk.
    ///
    /// `idx` is the index of the `Jump`/`JumpIfFalse` instruction. The
    /// distance is measured in instructions, not bytes: the VM advances its
    /// instruction pointer past the jump instruction itself before applying
    /// the offset, so the distance is `code.len() - idx - 1`.
    pub fn patch_jump(&mut self, idx: usize) {
        let distance = self.code.len() - idx - 1;
        let distance = distance as u16;

        self.code[idx] = match &self.code[idx] {
            OpCode::Jump(_) => OpCode::Jump(distance),
            OpCode::JumpIfFalse(_) => OpCode::JumpIfFalse(distance),
            other => unreachable!("patch_jump called on non-jump instruction {:?}", other),
        };
    }

    /// Emit a backward jump (`Loop`) from the current end of the chunk to
    /// `loop_start`.
    pub fn emit_loop(&mut self, loop_start: usize, line: usize) {
        // +1 accounts for the Loop instruction itself, which is not yet
        // pushed when this distance is computed.
        let offset = (self.code.len() + 1 - loop_start) as u16;
        self.write(OpCode::Loop(offset), line);
    }

    /// Disassemble the chunk to stdout
    pub fn disassemble(&self, name: impl AsRef<str>) {
        println!("== {} ==", name.as_ref());

        for offset in 0..self.code.len() {
            self.disassemble_instruction(offset);
        }
    }

    fn disassemble_instruction(&self, offset: usize) -> usize {
        print!("{:0>4} ", offset);

        if offset > 0 && self.lines[offset] == self.lines[offset - 1] {
            print!("   | ");
        } else {
            print!("{:>4} ", self.lines[offset]);
        }

        self.code[offset].clone().disassemble(offset, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_track_index_and_line() {
        let mut chunk = Chunk::new();
        let idx = chunk.write(OpCode::Nil, 7);
        assert_eq!(idx, 0);
        assert_eq!(chunk.line_at(0), 7);
        assert_eq!(chunk.size(), 1);
    }

    #[test]
    fn patch_jump_computes_instruction_distance() {
        let mut chunk = Chunk::new();
        let jump_idx = chunk.write(OpCode::JumpIfFalse(0), 1);
        chunk.write(OpCode::Pop, 1);
        chunk.write(OpCode::Nil, 1);
        chunk.patch_jump(jump_idx);

        match chunk.read(jump_idx) {
            OpCode::JumpIfFalse(dist) => assert_eq!(*dist, 2),
            other => panic!("expected JumpIfFalse, got {:?}", other),
        }
    }

    #[test]
    fn emit_loop_computes_backward_distance() {
        let mut chunk = Chunk::new();
        let loop_start = chunk.size();
        chunk.write(OpCode::Nil, 1);
        chunk.write(OpCode::Pop, 1);
        chunk.emit_loop(loop_start, 1);

        match chunk.read(2) {
            OpCode::Loop(dist) => assert_eq!(*dist, 3),
            other => panic!("expected Loop, got {:?}", other),
        }
    }

    #[test]
    fn constants_are_appended_in_order() {
        let mut chunk = Chunk::new();
        let a = chunk.add_constant(Value::Number(1.0));
        let b = chunk.add_constant(Value::Number(2.0));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(chunk.get_constant(a), &Value::Number(1.0));
    }
}

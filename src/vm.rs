//! Lox Virtual Machine
//!
//! A stack-based interpreter for the bytecode `compiler` produces. Runtime
//! state (value stack, call frames, globals, open upvalues, the string
//! heap) lives behind `RefCell`s so the public methods can take `&self`
//! rather than `&mut self`, matching the compiler's interior-mutability
//! style.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::chunk::{OpCode, UpvalueDesc};
use crate::compiler;
use crate::error::InterpretError;
use crate::gc::Heap;
use crate::object::{
    BoundMethodObject, ClassObject, ClosureObject, FunctionObject, InstanceObject, NativeObject,
    Object, UpvalueObject,
};
use crate::value::Value;

const FRAMES_MAX: usize = 64;

#[derive(Debug)]
struct CallFrame {
    closure: Rc<Object>,
    ip: usize,
    slot_base: usize,
}

/// Lox virtual machine
#[derive(Debug)]
pub struct VM {
    heap: RefCell<Heap>,
    stack: RefCell<Vec<Value>>,
    frames: RefCell<Vec<CallFrame>>,
    globals: RefCell<HashMap<Rc<str>, Value>>,
    open_upvalues: RefCell<Vec<Rc<Object>>>,
}

impl Default for VM {
    fn default() -> Self {
        Self::new()
    }
}

impl VM {
    /// Creates a new VM, with the native `clock()` function already defined
    pub fn new() -> Self {
        let vm = Self {
            heap: RefCell::new(Heap::new()),
            stack: RefCell::new(Vec::with_capacity(256)),
            frames: RefCell::new(Vec::with_capacity(FRAMES_MAX)),
            globals: RefCell::new(HashMap::new()),
            open_upvalues: RefCell::new(Vec::new()),
        };

        vm.define_native("clock", clock_native);
        vm
    }

    /// Compiles and runs a Lox program
    pub fn interpret(&self, source: impl AsRef<str>) -> Result<(), InterpretError> {
        let function = compiler::compile(source, self)?;

        let closure = Rc::new(Object::Closure(ClosureObject::new(function, 0)));
        self.push(Value::Object(closure.clone()));
        self.call(closure, 0)?;

        let result = self.run();
        self.heap.borrow().assert_no_leaks();
        result
    }

    // -- heap access, shared with the compiler ----------------------------

    /// Interns a string and wraps it as a heap string `Object`
    pub fn intern(&self, s: impl AsRef<str>) -> Rc<Object> {
        Rc::new(Object::String(self.heap.borrow_mut().intern(s)))
    }

    /// Interns a bare name (e.g. a function name), without wrapping it
    pub fn intern_name(&self, s: impl AsRef<str>) -> Rc<str> {
        self.heap.borrow_mut().intern(s)
    }

    /// Wraps a compiled function body as a heap `Object`
    pub fn alloc_function(&self, function: FunctionObject) -> Rc<Object> {
        Rc::new(Object::Function(function))
    }

    fn define_native(&self, name: &str, function: crate::object::NativeFn) {
        let name = self.intern_name(name);
        let native = Rc::new(Object::Native(NativeObject {
            name: name.clone(),
            function,
        }));
        self.globals.borrow_mut().insert(name, Value::Object(native));
    }

    // -- stack helpers ------------------------------------------------

    fn push(&self, value: Value) {
        self.stack.borrow_mut().push(value);
    }

    fn pop(&self) -> Value {
        self.stack.borrow_mut().pop().expect("stack underflow")
    }

    fn peek(&self, distance: usize) -> Value {
        let stack = self.stack.borrow();
        stack[stack.len() - 1 - distance].clone()
    }

    fn frame_slot_base(&self) -> usize {
        self.frames.borrow().last().unwrap().slot_base
    }

    fn current_closure(&self) -> Rc<Object> {
        self.frames.borrow().last().unwrap().closure.clone()
    }

    fn read_instruction(&self) -> OpCode {
        let mut frames = self.frames.borrow_mut();
        let frame = frames.last_mut().unwrap();
        let instruction = frame
            .closure
            .as_closure()
            .function
            .as_function()
            .chunk
            .read(frame.ip)
            .clone();
        frame.ip += 1;
        instruction
    }

    fn read_constant(&self, idx: u8) -> Value {
        self.current_closure()
            .as_closure()
            .function
            .as_function()
            .chunk
            .get_constant(idx as usize)
            .clone()
    }

    // -- the dispatch loop --------------------------------------------

    fn run(&self) -> Result<(), InterpretError> {
        loop {
            #[cfg(feature = "debug_trace")]
            self.trace_stack();

            let instruction = self.read_instruction();

            match instruction {
                OpCode::Constant(idx) => {
                    let value = self.read_constant(idx);
                    self.push(value);
                }
                OpCode::Nil => self.push(Value::Nil),
                OpCode::True => self.push(Value::Bool(true)),
                OpCode::False => self.push(Value::Bool(false)),
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal(idx) => {
                    let slot = self.frame_slot_base() + idx as usize;
                    let value = self.stack.borrow()[slot].clone();
                    self.push(value);
                }
                OpCode::SetLocal(idx) => {
                    let slot = self.frame_slot_base() + idx as usize;
                    let value = self.peek(0);
                    self.stack.borrow_mut()[slot] = value;
                }
                OpCode::GetGlobal(idx) => {
                    let name = self.read_constant(idx).as_object().unwrap().as_string().clone();
                    let value = self.globals.borrow().get(&name).cloned();
                    match value {
                        Some(value) => self.push(value),
                        None => {
                            return self.runtime_error(&format!("Undefined variable '{}'.", name))
                        }
                    }
                }
                OpCode::DefineGlobal(idx) => {
                    let name = self.read_constant(idx).as_object().unwrap().as_string().clone();
                    let value = self.pop();
                    self.globals.borrow_mut().insert(name, value);
                }
                OpCode::SetGlobal(idx) => {
                    let name = self.read_constant(idx).as_object().unwrap().as_string().clone();
                    let value = self.peek(0);
                    if !self.globals.borrow().contains_key(&name) {
                        return self.runtime_error(&format!("Undefined variable '{}'.", name));
                    }
                    self.globals.borrow_mut().insert(name, value);
                }
                OpCode::GetUpvalue(idx) => {
                    let upvalue = self.current_closure().as_closure().upvalues[idx as usize].clone();
                    let value = self.read_upvalue(&upvalue);
                    self.push(value);
                }
                OpCode::SetUpvalue(idx) => {
                    let upvalue = self.current_closure().as_closure().upvalues[idx as usize].clone();
                    let value = self.peek(0);
                    self.write_upvalue(&upvalue, value);
                }
                OpCode::GetProperty(idx) => self.get_property(idx)?,
                OpCode::SetProperty(idx) => self.set_property(idx)?,
                OpCode::GetSuper(idx) => self.get_super(idx)?,
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b));
                }
                OpCode::Greater => self.binary_cmp(|a, b| a > b)?,
                OpCode::Less => self.binary_cmp(|a, b| a < b)?,
                OpCode::Add => self.add()?,
                OpCode::Subtract => self.binary_arith(|a, b| a - b)?,
                OpCode::Multiply => self.binary_arith(|a, b| a * b)?,
                OpCode::Divide => self.divide()?,
                OpCode::Not => {
                    let value = self.pop();
                    self.push(Value::Bool(value.is_falsey()));
                }
                OpCode::Negate => match self.peek(0).as_number() {
                    Some(n) => {
                        self.pop();
                        self.push(Value::Number(-n));
                    }
                    None => return self.runtime_error("Operand must be a number."),
                },
                OpCode::Print => {
                    let value = self.pop();
                    println!("{}", value);
                }
                OpCode::Jump(dist) => {
                    self.frames.borrow_mut().last_mut().unwrap().ip += dist as usize;
                }
                OpCode::JumpIfFalse(dist) => {
                    if self.peek(0).is_falsey() {
                        self.frames.borrow_mut().last_mut().unwrap().ip += dist as usize;
                    }
                }
                OpCode::Loop(dist) => {
                    self.frames.borrow_mut().last_mut().unwrap().ip -= dist as usize;
                }
                OpCode::Call(argc) => {
                    let callee = self.peek(argc as usize);
                    self.call_value(callee, argc)?;
                }
                OpCode::Invoke(idx, argc) => self.invoke(idx, argc)?,
                OpCode::SuperInvoke(idx, argc) => self.super_invoke(idx, argc)?,
                OpCode::Closure(idx, upvalues) => self.make_closure(idx, &upvalues),
                OpCode::CloseUpvalue => {
                    let top = self.stack.borrow().len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let frame = self.frames.borrow_mut().pop().unwrap();
                    self.close_upvalues(frame.slot_base);

                    if self.frames.borrow().is_empty() {
                        self.pop();
                        return Ok(());
                    }

                    self.stack.borrow_mut().truncate(frame.slot_base);
                    self.push(result);
                }
                OpCode::Class(idx) => {
                    let name = self.read_constant(idx).as_object().unwrap().as_string().clone();
                    let class = Rc::new(Object::Class(ClassObject::new(name)));
                    self.push(Value::Object(class));
                }
                OpCode::Inherit => self.inherit()?,
                OpCode::Method(idx) => self.define_method(idx),
            }
        }
    }

    #[cfg(feature = "debug_trace")]
    fn trace_stack(&self) {
        print!("          ");
        for value in self.stack.borrow().iter() {
            print!("[ {} ]", value);
        }
        println!();
    }

    // -- arithmetic and comparison -----------------------------------

    fn binary_arith(&self, op: impl Fn(f64, f64) -> f64) -> Result<(), InterpretError> {
        let (a, b) = match (self.peek(1).as_number(), self.peek(0).as_number()) {
            (Some(a), Some(b)) => (a, b),
            _ => return self.runtime_error("Operands must be numbers."),
        };

        self.pop();
        self.pop();
        self.push(Value::Number(op(a, b)));
        Ok(())
    }

    fn binary_cmp(&self, op: impl Fn(f64, f64) -> bool) -> Result<(), InterpretError> {
        let (a, b) = match (self.peek(1).as_number(), self.peek(0).as_number()) {
            (Some(a), Some(b)) => (a, b),
            _ => return self.runtime_error("Operands must be numbers."),
        };

        self.pop();
        self.pop();
        self.push(Value::Bool(op(a, b)));
        Ok(())
    }

    fn add(&self) -> Result<(), InterpretError> {
        let a = self.peek(1);
        let b = self.peek(0);

        if let (Some(a), Some(b)) = (a.as_number(), b.as_number()) {
            self.pop();
            self.pop();
            self.push(Value::Number(a + b));
            return Ok(());
        }

        if a.is_string() && b.is_string() {
            self.pop();
            self.pop();
            let concatenated = self.intern(format!("{}{}", a, b));
            self.push(Value::Object(concatenated));
            return Ok(());
        }

        #[cfg(feature = "extended_string_concat")]
        if a.is_string() || b.is_string() {
            self.pop();
            self.pop();
            let concatenated = self.intern(format!("{}{}", a, b));
            self.push(Value::Object(concatenated));
            return Ok(());
        }

        self.runtime_error("Operands must be two numbers or two strings.")
    }

    fn divide(&self) -> Result<(), InterpretError> {
        let (a, b) = match (self.peek(1).as_number(), self.peek(0).as_number()) {
            (Some(a), Some(b)) => (a, b),
            _ => return self.runtime_error("Operands must be numbers."),
        };

        #[cfg(not(feature = "allow_divide_by_zero"))]
        if b == 0.0 {
            return self.runtime_error("Division by zero.");
        }

        self.pop();
        self.pop();
        self.push(Value::Number(a / b));
        Ok(())
    }

    // -- calls ----------------------------------------------------------

    fn call_value(&self, callee: Value, argc: u8) -> Result<(), InterpretError> {
        let object = match callee.as_object() {
            Some(obj) => obj.clone(),
            None => return self.runtime_error("Can only call functions and classes."),
        };

        match object.as_ref() {
            Object::Closure(_) => self.call(object, argc),
            Object::Native(native) => {
                let start = self.stack.borrow().len() - argc as usize;
                let args: Vec<Value> = self.stack.borrow()[start..].to_vec();
                match (native.function)(&args) {
                    Ok(result) => {
                        self.stack.borrow_mut().truncate(start - 1);
                        self.push(result);
                        Ok(())
                    }
                    Err(message) => self.runtime_error(&message),
                }
            }
            Object::Class(_) => {
                let instance = Rc::new(Object::Instance(InstanceObject::new(object.clone())));
                let start = self.stack.borrow().len() - argc as usize - 1;
                self.stack.borrow_mut()[start] = Value::Object(instance);

                let initializer = object.as_class().methods.borrow().get("init").cloned();
                match initializer {
                    Some(initializer) => self.call(initializer, argc),
                    None if argc != 0 => {
                        self.runtime_error(&format!("Expected 0 arguments but got {}.", argc))
                    }
                    None => Ok(()),
                }
            }
            Object::BoundMethod(bound) => {
                let method = bound.method.clone();
                let start = self.stack.borrow().len() - argc as usize - 1;
                self.stack.borrow_mut()[start] = bound.receiver.clone();
                self.call(method, argc)
            }
            _ => self.runtime_error("Can only call functions and classes."),
        }
    }

    fn call(&self, closure: Rc<Object>, argc: u8) -> Result<(), InterpretError> {
        let arity = closure.as_closure().function.as_function().arity;

        if argc as usize != arity {
            return self.runtime_error(&format!(
                "Expected {} arguments but got {}.",
                arity, argc
            ));
        }

        if self.frames.borrow().len() >= FRAMES_MAX {
            return self.runtime_error("Stack overflow.");
        }

        let slot_base = self.stack.borrow().len() - argc as usize - 1;
        self.frames.borrow_mut().push(CallFrame {
            closure,
            ip: 0,
            slot_base,
        });
        Ok(())
    }

    fn invoke_from_class(&self, class: &Rc<Object>, name: &str, argc: u8) -> Result<(), InterpretError> {
        let method = class.as_class().methods.borrow().get(name).cloned();
        match method {
            Some(method) => self.call(method, argc),
            None => self.runtime_error(&format!("Undefined property '{}'.", name)),
        }
    }

    fn invoke(&self, idx: u8, argc: u8) -> Result<(), InterpretError> {
        let name = self.read_constant(idx).as_object().unwrap().as_string().clone();
        let receiver = self.peek(argc as usize);

        let instance_obj = match receiver.as_object() {
            Some(obj) if matches!(obj.as_ref(), Object::Instance(_)) => obj.clone(),
            _ => return self.runtime_error("Only instances have methods."),
        };
        let instance = instance_obj.as_instance();

        if let Some(field) = instance.fields.borrow().get(&name).cloned() {
            let start = self.stack.borrow().len() - argc as usize - 1;
            self.stack.borrow_mut()[start] = field.clone();
            return self.call_value(field, argc);
        }

        self.invoke_from_class(&instance.class, &name, argc)
    }

    fn super_invoke(&self, idx: u8, argc: u8) -> Result<(), InterpretError> {
        let name = self.read_constant(idx).as_object().unwrap().as_string().clone();
        let superclass = self.pop();
        let superclass = superclass.as_object().unwrap().clone();
        self.invoke_from_class(&superclass, &name, argc)
    }

    // -- properties -------------------------------------------------------

    fn get_property(&self, idx: u8) -> Result<(), InterpretError> {
        let name = self.read_constant(idx).as_object().unwrap().as_string().clone();

        let receiver = self.peek(0);
        let instance_obj = match receiver.as_object() {
            Some(obj) if matches!(obj.as_ref(), Object::Instance(_)) => obj.clone(),
            _ => return self.runtime_error("Only instances have properties."),
        };
        let instance = instance_obj.as_instance();

        if let Some(value) = instance.fields.borrow().get(&name).cloned() {
            self.pop();
            self.push(value);
            return Ok(());
        }

        let method = instance.class.as_class().methods.borrow().get(&name).cloned();
        match method {
            Some(method) => {
                self.pop();
                let bound = Rc::new(Object::BoundMethod(BoundMethodObject { receiver, method }));
                self.push(Value::Object(bound));
                Ok(())
            }
            None => self.runtime_error(&format!("Undefined property '{}'.", name)),
        }
    }

    fn set_property(&self, idx: u8) -> Result<(), InterpretError> {
        let name = self.read_constant(idx).as_object().unwrap().as_string().clone();

        let receiver = self.peek(1);
        let instance_obj = match receiver.as_object() {
            Some(obj) if matches!(obj.as_ref(), Object::Instance(_)) => obj.clone(),
            _ => return self.runtime_error("Only instances have fields."),
        };

        let value = self.peek(0);
        instance_obj.as_instance().fields.borrow_mut().insert(name, value.clone());

        self.pop();
        self.pop();
        self.push(value);
        Ok(())
    }

    fn get_super(&self, idx: u8) -> Result<(), InterpretError> {
        let name = self.read_constant(idx).as_object().unwrap().as_string().clone();
        let superclass = self.pop();
        let superclass = superclass.as_object().unwrap().clone();

        let receiver = self.peek(0);
        let method = superclass.as_class().methods.borrow().get(&name).cloned();

        match method {
            Some(method) => {
                self.pop();
                let bound = Rc::new(Object::BoundMethod(BoundMethodObject { receiver, method }));
                self.push(Value::Object(bound));
                Ok(())
            }
            None => self.runtime_error(&format!("Undefined property '{}'.", name)),
        }
    }

    fn inherit(&self) -> Result<(), InterpretError> {
        let superclass = self.peek(1);
        let subclass = self.peek(0);

        let superclass_obj = match superclass.as_object() {
            Some(obj) if matches!(obj.as_ref(), Object::Class(_)) => obj.clone(),
            _ => return self.runtime_error("Superclass must be a class."),
        };

        let methods = superclass_obj.as_class().methods.borrow().clone();
        subclass
            .as_object()
            .unwrap()
            .as_class()
            .methods
            .borrow_mut()
            .extend(methods);

        self.pop();
        Ok(())
    }

    fn define_method(&self, idx: u8) {
        let name = self.read_constant(idx).as_object().unwrap().as_string().clone();
        let method = self.pop();
        let method_obj = method.as_object().unwrap().clone();

        let class = self.peek(0);
        class
            .as_object()
            .unwrap()
            .as_class()
            .methods
            .borrow_mut()
            .insert(name, method_obj);
    }

    // -- closures and upvalues ---------------------------------------

    fn make_closure(&self, idx: u8, upvalue_descs: &[UpvalueDesc]) {
        let function = self.read_constant(idx);
        let function_obj = function.as_object().unwrap().clone();

        let mut closure = ClosureObject::new(function_obj, upvalue_descs.len());

        for desc in upvalue_descs {
            if desc.is_local {
                let slot = self.frame_slot_base() + desc.index as usize;
                closure.upvalues.push(self.capture_upvalue(slot));
            } else {
                let upvalue = self.current_closure().as_closure().upvalues[desc.index as usize].clone();
                closure.upvalues.push(upvalue);
            }
        }

        self.push(Value::Object(Rc::new(Object::Closure(closure))));
    }

    fn capture_upvalue(&self, slot: usize) -> Rc<Object> {
        {
            let open = self.open_upvalues.borrow();
            for upvalue in open.iter() {
                if let UpvalueObject::Open(s) = *upvalue.as_upvalue().borrow() {
                    if s == slot {
                        return upvalue.clone();
                    }
                }
            }
        }

        let upvalue = Rc::new(Object::Upvalue(RefCell::new(UpvalueObject::Open(slot))));
        self.open_upvalues.borrow_mut().push(upvalue.clone());
        upvalue
    }

    fn read_upvalue(&self, upvalue: &Rc<Object>) -> Value {
        match &*upvalue.as_upvalue().borrow() {
            UpvalueObject::Open(slot) => self.stack.borrow()[*slot].clone(),
            UpvalueObject::Closed(value) => value.clone(),
        }
    }

    fn write_upvalue(&self, upvalue: &Rc<Object>, value: Value) {
        let slot = match &*upvalue.as_upvalue().borrow() {
            UpvalueObject::Open(slot) => Some(*slot),
            UpvalueObject::Closed(_) => None,
        };

        match slot {
            Some(slot) => self.stack.borrow_mut()[slot] = value,
            None => *upvalue.as_upvalue().borrow_mut() = UpvalueObject::Closed(value),
        }
    }

    fn close_upvalues(&self, from_slot: usize) {
        let mut open = self.open_upvalues.borrow_mut();
        let mut i = 0;
        while i < open.len() {
            let should_close =
                matches!(&*open[i].as_upvalue().borrow(), UpvalueObject::Open(s) if *s >= from_slot);

            if should_close {
                let upvalue = open.remove(i);
                let slot = match &*upvalue.as_upvalue().borrow() {
                    UpvalueObject::Open(s) => *s,
                    UpvalueObject::Closed(_) => unreachable!(),
                };
                let value = self.stack.borrow()[slot].clone();
                *upvalue.as_upvalue().borrow_mut() = UpvalueObject::Closed(value);
            } else {
                i += 1;
            }
        }
    }

    // -- errors -----------------------------------------------------------

    fn runtime_error(&self, message: &str) -> Result<(), InterpretError> {
        tracing::error!("{}", message);

        for frame in self.frames.borrow().iter().rev() {
            let function_obj = frame.closure.as_closure().function.clone();
            let function = function_obj.as_function();
            let line = function.chunk.line_at(frame.ip.saturating_sub(1));
            let name = if function.name.is_empty() {
                "script"
            } else {
                &function.name
            };
            tracing::error!("[line {}] in {}", line, name);
        }

        self.stack.borrow_mut().clear();
        self.frames.borrow_mut().clear();

        Err(InterpretError::Runtime)
    }
}

fn clock_native(_args: &[Value]) -> Result<Value, String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| e.to_string())?;
    Ok(Value::Number(now.as_secs_f64()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interprets_arithmetic() {
        let vm = VM::new();
        assert!(vm.interpret("print 1 + 2 * 3;").is_ok());
    }

    #[test]
    fn interprets_string_concatenation() {
        let vm = VM::new();
        assert!(vm.interpret("print \"foo\" + \"bar\";").is_ok());
    }

    #[test]
    fn interprets_global_and_local_variables() {
        let vm = VM::new();
        let source = "var a = 1; { var b = 2; print a + b; }";
        assert!(vm.interpret(source).is_ok());
    }

    #[test]
    fn interprets_recursive_fibonacci() {
        let vm = VM::new();
        let source = r#"
            fun fib(n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            print fib(10);
        "#;
        assert!(vm.interpret(source).is_ok());
    }

    #[test]
    fn interprets_closures_over_locals() {
        let vm = VM::new();
        let source = r#"
            fun makeCounter() {
                var count = 0;
                fun increment() {
                    count = count + 1;
                    return count;
                }
                return increment;
            }
            var counter = makeCounter();
            print counter();
            print counter();
        "#;
        assert!(vm.interpret(source).is_ok());
    }

    #[test]
    fn interprets_classes_init_and_methods() {
        let vm = VM::new();
        let source = r#"
            class Orchard {
                init(trees) {
                    this.trees = trees;
                }
                count() {
                    return this.trees;
                }
            }
            var o = Orchard(3);
            print o.count();
        "#;
        assert!(vm.interpret(source).is_ok());
    }

    #[test]
    fn interprets_inheritance_and_super() {
        let vm = VM::new();
        let source = r#"
            class Fruit {
                describe() {
                    return "a fruit";
                }
            }
            class Apple < Fruit {
                describe() {
                    return super.describe() + ", specifically an apple";
                }
            }
            print Apple().describe();
        "#;
        assert!(vm.interpret(source).is_ok());
    }

    #[test]
    fn reports_undefined_variable_as_runtime_error() {
        let vm = VM::new();
        let result = vm.interpret("print undefinedVariable;");
        assert!(matches!(result, Err(InterpretError::Runtime)));
    }

    #[test]
    fn reports_type_mismatch_as_runtime_error() {
        let vm = VM::new();
        let result = vm.interpret("print 1 + \"two\";");
        assert!(matches!(result, Err(InterpretError::Runtime)));
    }

    #[test]
    fn reports_calling_a_non_callable_as_runtime_error() {
        let vm = VM::new();
        let result = vm.interpret("var x = 1; x();");
        assert!(matches!(result, Err(InterpretError::Runtime)));
    }

    #[test]
    fn reports_compile_error_on_syntax_error() {
        let vm = VM::new();
        let result = vm.interpret("var ;");
        assert!(matches!(result, Err(InterpretError::Compile)));
    }
}

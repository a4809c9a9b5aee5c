//! Heap allocated objects

use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use crate::chunk::Chunk;
use crate::value::Value;

/// An heap allocated value
#[derive(Debug)]
pub enum Object {
    String(Rc<str>),
    Function(FunctionObject),
    Native(NativeObject),
    Closure(ClosureObject),
    Upvalue(RefCell<UpvalueObject>),
    Class(ClassObject),
    Instance(InstanceObject),
    BoundMethod(BoundMethodObject),
}

impl fmt::Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::String(v) => write!(f, "{}", v),
            Self::Function(v) => v.fmt(f),
            Self::Native(_) => write!(f, "<native fn>"),
            Self::Closure(v) => v.function.fmt(f),
            Self::Upvalue(_) => write!(f, "upvalue"),
            Self::Class(v) => write!(f, "{}", v.name),
            Self::Instance(v) => write!(f, "{} instance", v.class_name()),
            Self::BoundMethod(v) => v.method_function().fmt(f),
        }
    }
}

impl Object {
    /// Gets the Object string value
    ///
    /// # Panics
    ///
    /// This will panic if the Object is not a String Object
    pub fn as_string(&self) -> &Rc<str> {
        match self {
            Self::String(v) => v,
            _ => panic!("Invalid Object as String"),
        }
    }

    /// Gets the Object's closure
    ///
    /// # Panics
    ///
    /// This will panic if the Object is not a Closure Object
    pub fn as_closure(&self) -> &ClosureObject {
        match self {
            Self::Closure(v) => v,
            _ => panic!("Invalid Object as Closure"),
        }
    }

    /// Gets the Object's function
    ///
    /// # Panics
    ///
    /// This will panic if the Object is not a Function Object
    pub fn as_function(&self) -> &FunctionObject {
        match self {
            Self::Function(v) => v,
            _ => panic!("Invalid Object as Function"),
        }
    }

    /// Gets the Object's native function
    ///
    /// # Panics
    ///
    /// This will panic if the Object is not a Native Object
    pub fn as_native(&self) -> &NativeObject {
        match self {
            Self::Native(v) => v,
            _ => panic!("Invalid Object as Native"),
        }
    }

    /// Gets the Object's class
    ///
    /// # Panics
    ///
    /// This will panic if the Object is not a Class Object
    pub fn as_class(&self) -> &ClassObject {
        match self {
            Self::Class(v) => v,
            _ => panic!("Invalid Object as Class"),
        }
    }

    /// Gets the Object's instance
    ///
    /// # Panics
    ///
    /// This will panic if the Object is not an Instance Object
    pub fn as_instance(&self) -> &InstanceObject {
        match self {
            Self::Instance(v) => v,
            _ => panic!("Invalid Object as Instance"),
        }
    }

    /// Gets the Object's upvalue cell
    ///
    /// # Panics
    ///
    /// This will panic if the Object is not an Upvalue Object
    pub fn as_upvalue(&self) -> &RefCell<UpvalueObject> {
        match self {
            Self::Upvalue(v) => v,
            _ => panic!("Invalid Object as Upvalue"),
        }
    }

    /// Gets the Object's bound method
    ///
    /// # Panics
    ///
    /// This will panic if the Object is not a BoundMethod Object
    pub fn as_bound_method(&self) -> &BoundMethodObject {
        match self {
            Self::BoundMethod(v) => v,
            _ => panic!("Invalid Object as BoundMethod"),
        }
    }
}

/// A compiled function body
#[derive(Debug)]
pub struct FunctionObject {
    pub arity: usize,
    pub upvalue_count: usize,
    pub chunk: Chunk,
    pub name: Rc<str>,
}

impl fmt::Display for FunctionObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "<script>")
        } else {
            write!(f, "<fn {}>", self.name)
        }
    }
}

impl FunctionObject {
    pub fn new(name: Rc<str>) -> Self {
        Self {
            arity: 0,
            upvalue_count: 0,
            chunk: Chunk::new(),
            name,
        }
    }
}

/// A Rust-implemented native function, callable from Lox code
pub type NativeFn = fn(args: &[Value]) -> Result<Value, String>;

pub struct NativeObject {
    pub name: Rc<str>,
    pub function: NativeFn,
}

impl fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("NativeObject").field("name", &self.name).finish()
    }
}

/// A function closed over its captured upvalues
#[derive(Debug)]
pub struct ClosureObject {
    pub function: Rc<Object>,
    pub upvalues: Vec<Rc<Object>>,
}

impl ClosureObject {
    pub fn new(function: Rc<Object>, upvalue_count: usize) -> Self {
        Self {
            function,
            upvalues: Vec::with_capacity(upvalue_count),
        }
    }
}

/// A captured local variable
///
/// While open, it points at a stack slot in the currently executing frame;
/// once that frame returns the value is hoisted (closed) into the cell
/// itself.
#[derive(Debug)]
pub enum UpvalueObject {
    Open(usize),
    Closed(Value),
}

/// A class definition
#[derive(Debug)]
pub struct ClassObject {
    pub name: Rc<str>,
    pub methods: RefCell<HashMap<Rc<str>, Rc<Object>>>,
}

impl ClassObject {
    pub fn new(name: Rc<str>) -> Self {
        Self {
            name,
            methods: RefCell::new(HashMap::new()),
        }
    }
}

/// A runtime instance of a class
#[derive(Debug)]
pub struct InstanceObject {
    pub class: Rc<Object>,
    pub fields: RefCell<HashMap<Rc<str>, Value>>,
}

impl InstanceObject {
    pub fn new(class: Rc<Object>) -> Self {
        Self {
            class,
            fields: RefCell::new(HashMap::new()),
        }
    }

    fn class_name(&self) -> &str {
        &self.class.as_class().name
    }
}

/// A method value bound to the instance it was looked up on
#[derive(Debug)]
pub struct BoundMethodObject {
    pub receiver: Value,
    pub method: Rc<Object>,
}

impl BoundMethodObject {
    fn method_function(&self) -> &FunctionObject {
        self.method.as_closure().function.as_function()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_display_names_script_and_named_functions() {
        let script = FunctionObject::new("".into());
        assert_eq!(script.to_string(), "<script>");

        let named = FunctionObject::new("orchard".into());
        assert_eq!(named.to_string(), "<fn orchard>");
    }
}

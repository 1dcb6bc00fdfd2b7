use crate::time_layout::Timestamp;
use std::fmt;
use std::time::Duration;

/// Target kind of a bound field, with bit width for numeric kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    String,
    Bool,
    Int(u32),
    Uint(u32),
    Float(u32),
    Timestamp,
    Duration,
    /// Any other type; converting into it always fails
    Unsupported(&'static str),
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKind::String => f.write_str("string"),
            FieldKind::Bool => f.write_str("bool"),
            FieldKind::Int(bits) => write!(f, "int{bits}"),
            FieldKind::Uint(bits) => write!(f, "uint{bits}"),
            FieldKind::Float(bits) => write!(f, "float{bits}"),
            FieldKind::Timestamp => f.write_str("timestamp"),
            FieldKind::Duration => f.write_str("duration"),
            FieldKind::Unsupported(name) => f.write_str(name),
        }
    }
}

/// Typed mutable reference to one field of a request instance.
#[derive(Debug)]
pub enum FieldSlot<'a> {
    Str(&'a mut String),
    Bool(&'a mut bool),
    I8(&'a mut i8),
    I16(&'a mut i16),
    I32(&'a mut i32),
    I64(&'a mut i64),
    Isize(&'a mut isize),
    U8(&'a mut u8),
    U16(&'a mut u16),
    U32(&'a mut u32),
    U64(&'a mut u64),
    Usize(&'a mut usize),
    F32(&'a mut f32),
    F64(&'a mut f64),
    Timestamp(&'a mut Timestamp),
    Duration(&'a mut Duration),
    /// Field of a type the converter does not handle, named for error reporting
    Unsupported(&'static str),
}

impl FieldSlot<'_> {
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldSlot::Str(_) => FieldKind::String,
            FieldSlot::Bool(_) => FieldKind::Bool,
            FieldSlot::I8(_) => FieldKind::Int(8),
            FieldSlot::I16(_) => FieldKind::Int(16),
            FieldSlot::I32(_) => FieldKind::Int(32),
            FieldSlot::I64(_) => FieldKind::Int(64),
            FieldSlot::Isize(_) => FieldKind::Int(isize::BITS),
            FieldSlot::U8(_) => FieldKind::Uint(8),
            FieldSlot::U16(_) => FieldKind::Uint(16),
            FieldSlot::U32(_) => FieldKind::Uint(32),
            FieldSlot::U64(_) => FieldKind::Uint(64),
            FieldSlot::Usize(_) => FieldKind::Uint(usize::BITS),
            FieldSlot::F32(_) => FieldKind::Float(32),
            FieldSlot::F64(_) => FieldKind::Float(64),
            FieldSlot::Timestamp(_) => FieldKind::Timestamp,
            FieldSlot::Duration(_) => FieldKind::Duration,
            FieldSlot::Unsupported(name) => FieldKind::Unsupported(name),
        }
    }
}

macro_rules! slot_from {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl<'a> From<&'a mut $ty> for FieldSlot<'a> {
                fn from(value: &'a mut $ty) -> Self {
                    FieldSlot::$variant(value)
                }
            }
        )*
    };
}

slot_from! {
    String => Str,
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    isize => Isize,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    usize => Usize,
    f32 => F32,
    f64 => F64,
    Timestamp => Timestamp,
    Duration => Duration,
}

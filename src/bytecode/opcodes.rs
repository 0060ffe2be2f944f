use strum::{EnumCount, EnumIter, IntoEnumIterator, IntoStaticStr};

/// Primary opcodes, stored in the high nibble of the first instruction byte.
///
/// The low nibble is the operand of the primary opcode, or the sub-opcode for the three
/// extended pages.
///
/// ## Operand Forms
///
/// - **Inline operand**: `LoadSmallLiteral`, `LoadVar1`, `LoadScoped1`, `LoadArg1`,
///   `Call1`, `FixedArrayNew1`, `Call5`, `StoreVar1`, `StoreScoped1`, `ArrayGet1`,
///   `ArraySet1` carry a 4-bit operand
/// - **Operation selector**: `NumOp` and `BitOp` select the arithmetic or bitwise operation
/// - **Extended pages**: `Extended1`, `Extended2`, `Extended3` select a sub-opcode from
///   [`OpcodeEx1`], [`OpcodeEx2`] and [`OpcodeEx3`]
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum Opcode {
    /// Pushes one of 16 small literals (0x0)
    LoadSmallLiteral = 0x0,
    /// Pushes a local variable by 4-bit stack index (0x1)
    LoadVar1 = 0x1,
    /// Pushes a closure-scoped variable by 4-bit index (0x2)
    LoadScoped1 = 0x2,
    /// Pushes an argument by 4-bit index (0x3)
    LoadArg1 = 0x3,
    /// Calls a short-call table entry by 4-bit index (0x4)
    Call1 = 0x4,
    /// Creates a fixed-length array of up to 15 elements (0x5)
    FixedArrayNew1 = 0x5,
    /// Extended page without payload, see [`OpcodeEx1`] (0x6)
    Extended1 = 0x6,
    /// Extended page with an 8-bit payload, see [`OpcodeEx2`] (0x7)
    Extended2 = 0x7,
    /// Extended page with a 16-bit payload, see [`OpcodeEx3`] (0x8)
    Extended3 = 0x8,
    /// Calls the function on the stack with a 4-bit argument count (0x9)
    Call5 = 0x9,
    /// Stores to a local variable by 4-bit stack index (0xA)
    StoreVar1 = 0xA,
    /// Stores to a closure-scoped variable by 4-bit index (0xB)
    StoreScoped1 = 0xB,
    /// Reads an array element at a 4-bit constant index (0xC)
    ArrayGet1 = 0xC,
    /// Writes an array element at a 4-bit constant index (0xD)
    ArraySet1 = 0xD,
    /// Numeric operation, see [`NumOp`] (0xE)
    NumOp = 0xE,
    /// Bitwise operation, see [`BitOp`] (0xF)
    BitOp = 0xF,
}

/// Sub-opcodes of [`Opcode::Extended1`], no payload.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum OpcodeEx1 {
    /// Returns from the current function
    Return = 0x0,
    /// Throws the value on top of the stack
    Throw = 0x1,
    /// Creates a closure over the current scope
    ClosureNew = 0x2,
    /// Constructs an object
    New = 0x3,
    /// Pushes a new closure scope
    ScopePush = 0x5,
    /// Replaces the top of the stack with its type code
    TypeCodeOf = 0x6,
    /// Discards the top of the stack
    Pop = 0x7,
    /// Replaces the top of the stack with its `typeof` string
    TypeOf = 0x8,
    /// Creates an empty object
    ObjectNew = 0x9,
    /// Logical negation
    LogicalNot = 0xA,
    /// Reads a property named by the stack
    ObjectGet1 = 0xB,
    /// Addition or concatenation
    Add = 0xC,
    /// Strict equality
    Equal = 0xD,
    /// Strict inequality
    NotEqual = 0xE,
    /// Writes a property named by the stack
    ObjectSet1 = 0xF,
}

/// Sub-opcodes of [`Opcode::Extended2`], followed by an 8-bit payload.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum OpcodeEx2 {
    /// Conditional branch, signed 8-bit relative offset
    Branch1 = 0x0,
    /// Stores to an argument by 8-bit index
    StoreArg = 0x1,
    /// Stores to a closure-scoped variable by 8-bit index
    StoreScoped2 = 0x2,
    /// Stores to a local variable by 8-bit stack index
    StoreVar2 = 0x3,
    /// Unconditional jump, signed 8-bit relative offset
    Jump1 = 0x4,
    /// Calls a short-call table entry by 8-bit index
    Call2 = 0x5,
    /// Calls a function at a literal address; payload is the argument count and a 16-bit
    /// address follows
    Call3 = 0x6,
    /// Creates an array with 8-bit initial capacity
    ArrayNew = 0x7,
    /// Pushes a local variable by 8-bit stack index
    LoadVar2 = 0x8,
    /// Pushes a closure-scoped variable by 8-bit index
    LoadScoped2 = 0x9,
    /// Pushes an argument by 8-bit index
    LoadArg2 = 0xA,
}

/// Sub-opcodes of [`Opcode::Extended3`], followed by a 16-bit payload.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum OpcodeEx3 {
    /// Conditional branch, signed 16-bit relative offset
    Branch2 = 0x0,
    /// Unconditional jump, signed 16-bit relative offset
    Jump2 = 0x1,
    /// Pushes a signed 16-bit literal
    LoadLiteral = 0x2,
    /// Pushes a global by 16-bit index
    LoadGlobal3 = 0x3,
    /// Stores to a global by 16-bit index
    StoreGlobal3 = 0x4,
    /// Reads a property by 16-bit interned key
    ObjectGet2 = 0x5,
    /// Writes a property by 16-bit interned key
    ObjectSet2 = 0x6,
}

/// Operation selectors of [`Opcode::NumOp`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum NumOp {
    /// `<`
    LessThan = 0x0,
    /// `>`
    GreaterThan = 0x1,
    /// `<=`
    LessEqual = 0x2,
    /// `>=`
    GreaterEqual = 0x3,
    /// Binary `+` on numbers
    AddNum = 0x4,
    /// Binary `-`
    Subtract = 0x5,
    /// `*`
    Multiply = 0x6,
    /// `/`
    Divide = 0x7,
    /// Integer division
    DivideTrunc = 0x8,
    /// `%`
    Remainder = 0x9,
    /// `**`
    Power = 0xA,
    /// Unary `-`
    Negate = 0xB,
    /// Unary `+`
    UnaryPlus = 0xC,
}

/// Operation selectors of [`Opcode::BitOp`].
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, EnumIter, EnumCount, IntoStaticStr)]
pub enum BitOp {
    /// `>>`
    ShiftRightArithmetic = 0x0,
    /// `>>>`
    ShiftRightLogical = 0x1,
    /// `<<`
    ShiftLeft = 0x2,
    /// `|`
    Or = 0x4,
    /// `&`
    And = 0x5,
    /// `^`
    Xor = 0x6,
    /// `~`
    Not = 0x7,
}

/// Encoding shared by every opcode enum: a 4-bit value and a display name.
pub trait Nibble: Copy + Into<&'static str> {
    /// The 4-bit encoding.
    fn nibble(self) -> u8;

    /// Decodes a 4-bit value, `None` for unassigned values.
    fn from_nibble(nibble: u8) -> Option<Self>;

    /// Name used as diagnostic label.
    fn name(self) -> &'static str {
        self.into()
    }
}

macro_rules! impl_nibble {
    ($($ty:ty),+) => {
        $(
            impl Nibble for $ty {
                fn nibble(self) -> u8 {
                    self as u8
                }

                fn from_nibble(nibble: u8) -> Option<Self> {
                    <$ty>::iter().find(|op| op.nibble() == nibble)
                }
            }
        )+
    };
}

impl_nibble!(Opcode, OpcodeEx1, OpcodeEx2, OpcodeEx3, NumOp, BitOp);

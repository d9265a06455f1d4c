//////////////////////////////////////////////////////////////////
/// runtime.rs
///
/// Forth Runtime Engine
///
/// This module defines the opcode catalog dispatched by the inner interpreter
/// (§4.4) and the `Vm` struct that wires the dictionary (kernel.rs), the I/O
/// surface, and the diagnostic sink together. `Vm::new` is the cold start:
/// it installs one tiny arena fragment `opcode; EXIT` per builtin primitive
/// and records `builtin_count`, the boundary the image serializer restores.
///
use crate::error::CoreError;
use crate::internals::io::IoSurface;
use crate::internals::messages::Msg;
use crate::kernel::{
    Addr, Cell, Kernel, DEFAULT_ARENA_CAPACITY, DEFAULT_CONTROL_STACK_DEPTH,
    DEFAULT_DATA_STACK_DEPTH, DEFAULT_RETURN_STACK_DEPTH, FALSE, TRUE,
};

/// The opcode catalog (§4.4). Each variant is one dispatch byte in the arena.
/// `CALL`, `LIT`, `BRANCH`, `BRANCH_IF_ZERO` and `LOOP` carry a trailing
/// operand (an address or a cell) that the inner interpreter reads itself;
/// everything else is a single byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Op {
    Exit = 0,
    Lit = 1,
    Call = 2,
    Branch = 3,
    BranchIfZero = 4,

    Do = 5,
    Loop = 6,
    I = 7,

    Dup = 8,
    Drop = 9,
    Swap = 10,
    Over = 11,
    Rot = 12,
    TwoDup = 13,
    TwoDrop = 14,
    Nip = 15,
    Tuck = 16,
    QDup = 17,

    ToR = 18,
    RFrom = 19,
    RFetch = 20,

    Add = 21,
    Sub = 22,
    Mul = 23,
    Div = 24,
    Mod = 25,
    DivMod = 26,
    Negate = 27,
    Abs = 28,
    Min = 29,
    Max = 30,
    OnePlus = 31,
    OneMinus = 32,

    And = 33,
    Or = 34,
    Xor = 35,
    Not = 36,

    Lt = 37,
    Gt = 38,
    Eq = 39,
    Le = 40,
    Ge = 41,
    Ne = 42,
    ZeroEq = 43,
    ZeroLt = 44,
    ZeroNe = 45,

    Load = 46,
    Store = 47,
    LoadByte = 48,
    StoreByte = 49,
    PlusStore = 50,
    Allot = 51,
    Here = 52,

    Emit = 53,
    Key = 54,
    Cr = 55,
    Type = 56,
    Dot = 57,
    DotS = 58,
    Depth = 59,
    Clear = 60,
    Words = 61,
}

pub const OPCODE_COUNT: u8 = 62;

impl Op {
    pub fn from_byte(b: u8) -> Option<Op> {
        if b >= OPCODE_COUNT {
            return None;
        }
        // Safety net for the match in `decode`: every discriminant 0..OPCODE_COUNT
        // is assigned above, so this table doubles as documentation of the catalog.
        Some(decode(b))
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Whether this opcode is followed by a 2-byte address operand.
    pub fn has_addr_operand(self) -> bool {
        matches!(self, Op::Call | Op::Branch | Op::BranchIfZero | Op::Loop)
    }

    /// Whether this opcode is followed by a 4-byte cell operand.
    pub fn has_cell_operand(self) -> bool {
        matches!(self, Op::Lit)
    }
}

fn decode(b: u8) -> Op {
    use Op::*;
    match b {
        0 => Exit,
        1 => Lit,
        2 => Call,
        3 => Branch,
        4 => BranchIfZero,
        5 => Do,
        6 => Loop,
        7 => I,
        8 => Dup,
        9 => Drop,
        10 => Swap,
        11 => Over,
        12 => Rot,
        13 => TwoDup,
        14 => TwoDrop,
        15 => Nip,
        16 => Tuck,
        17 => QDup,
        18 => ToR,
        19 => RFrom,
        20 => RFetch,
        21 => Add,
        22 => Sub,
        23 => Mul,
        24 => Div,
        25 => Mod,
        26 => DivMod,
        27 => Negate,
        28 => Abs,
        29 => Min,
        30 => Max,
        31 => OnePlus,
        32 => OneMinus,
        33 => And,
        34 => Or,
        35 => Xor,
        36 => Not,
        37 => Lt,
        38 => Gt,
        39 => Eq,
        40 => Le,
        41 => Ge,
        42 => Ne,
        43 => ZeroEq,
        44 => ZeroLt,
        45 => ZeroNe,
        46 => Load,
        47 => Store,
        48 => LoadByte,
        49 => StoreByte,
        50 => PlusStore,
        51 => Allot,
        52 => Here,
        53 => Emit,
        54 => Key,
        55 => Cr,
        56 => Type,
        57 => Dot,
        58 => DotS,
        59 => Depth,
        60 => Clear,
        61 => Words,
        _ => unreachable!("Op::from_byte guards against out-of-range bytes"),
    }
}

/// (name, opcode, doc) table used both to bootstrap the word table at cold
/// start and to print `?` help / `SEE` output for builtins.
pub const BUILTIN_TABLE: &[(&str, Op, &str)] = &[
    ("DUP", Op::Dup, "( n -- n n ) duplicate the top of the data stack"),
    ("DROP", Op::Drop, "( n -- ) remove the top of the data stack"),
    ("SWAP", Op::Swap, "( a b -- b a ) swap the top two stack entries"),
    ("OVER", Op::Over, "( a b -- a b a ) copy the second entry to the top"),
    ("ROT", Op::Rot, "( a b c -- b c a ) rotate the third entry to the top"),
    ("2DUP", Op::TwoDup, "( a b -- a b a b ) duplicate the top pair"),
    ("2DROP", Op::TwoDrop, "( a b -- ) drop the top pair"),
    ("NIP", Op::Nip, "( a b -- b ) drop the second entry"),
    ("TUCK", Op::Tuck, "( a b -- b a b ) copy the top under the second entry"),
    ("?DUP", Op::QDup, "( n -- n n | 0 ) duplicate only if non-zero"),
    (">R", Op::ToR, "( n -- ) ( R: -- n ) move to the return stack"),
    ("R>", Op::RFrom, "( -- n ) ( R: n -- ) move off the return stack"),
    ("R@", Op::RFetch, "( -- n ) ( R: n -- n ) copy the top of the return stack"),
    ("+", Op::Add, "( a b -- a+b )"),
    ("-", Op::Sub, "( a b -- a-b )"),
    ("*", Op::Mul, "( a b -- a*b )"),
    ("/", Op::Div, "( a b -- a/b ) 0 if b is 0"),
    ("MOD", Op::Mod, "( a b -- a%b ) 0 if b is 0"),
    ("/MOD", Op::DivMod, "( a b -- rem quot ) 0 0 if b is 0"),
    ("NEGATE", Op::Negate, "( n -- -n )"),
    ("ABS", Op::Abs, "( n -- |n| )"),
    ("MIN", Op::Min, "( a b -- min )"),
    ("MAX", Op::Max, "( a b -- max )"),
    ("1+", Op::OnePlus, "( n -- n+1 )"),
    ("1-", Op::OneMinus, "( n -- n-1 )"),
    ("AND", Op::And, "( a b -- a&b )"),
    ("OR", Op::Or, "( a b -- a|b )"),
    ("XOR", Op::Xor, "( a b -- a^b )"),
    ("NOT", Op::Not, "( n -- ~n ) bitwise complement"),
    ("<", Op::Lt, "( a b -- f )"),
    (">", Op::Gt, "( a b -- f )"),
    ("=", Op::Eq, "( a b -- f )"),
    ("<=", Op::Le, "( a b -- f )"),
    (">=", Op::Ge, "( a b -- f )"),
    ("<>", Op::Ne, "( a b -- f )"),
    ("0=", Op::ZeroEq, "( n -- f )"),
    ("0<", Op::ZeroLt, "( n -- f )"),
    ("0<>", Op::ZeroNe, "( n -- f )"),
    ("@", Op::Load, "( addr -- n ) fetch a cell"),
    ("!", Op::Store, "( n addr -- ) store a cell"),
    ("C@", Op::LoadByte, "( addr -- c ) fetch a byte"),
    ("C!", Op::StoreByte, "( c addr -- ) store a byte"),
    ("+!", Op::PlusStore, "( n addr -- ) add n to the cell at addr"),
    ("ALLOT", Op::Allot, "( n -- ) advance HERE by n bytes, n > 0 only"),
    ("HERE", Op::Here, "( -- addr ) push the current high-water mark"),
    ("EMIT", Op::Emit, "( c -- ) write one character"),
    ("KEY", Op::Key, "( -- c | 0 ) read one character, 0 if none available"),
    ("CR", Op::Cr, "( -- ) write a newline"),
    ("TYPE", Op::Type, "( addr len -- ) write len characters starting at addr"),
    (".", Op::Dot, "( n -- ) print n as signed decimal, followed by a space"),
    (".S", Op::DotS, "( -- ) non-destructively print the data stack"),
    ("DEPTH", Op::Depth, "( -- n ) push the current data-stack depth"),
    ("CLEAR", Op::Clear, "( ... -- ) empty the data stack"),
    ("WORDS", Op::Words, "( -- ) list every word in the dictionary"),
];

pub struct Vm {
    pub kernel: Kernel,
    pub msg: Msg,
    pub io: Box<dyn IoSurface>,
    pub compiling: bool,
    pub exit_flag: bool,
    /// Name of the word currently being defined, set between `:` and `;`.
    pub defining_name: Option<String>,
}

impl Vm {
    pub fn new(io: Box<dyn IoSurface>) -> Vm {
        let mut vm = Vm {
            kernel: Kernel::new(
                DEFAULT_ARENA_CAPACITY,
                DEFAULT_DATA_STACK_DEPTH,
                DEFAULT_RETURN_STACK_DEPTH,
                DEFAULT_CONTROL_STACK_DEPTH,
            ),
            msg: Msg::new(),
            io,
            compiling: false,
            exit_flag: false,
            defining_name: None,
        };
        vm.cold_start();
        vm
    }

    pub fn with_capacities(
        io: Box<dyn IoSurface>,
        arena_capacity: usize,
        data_depth: usize,
        return_depth: usize,
        control_depth: usize,
    ) -> Vm {
        let mut vm = Vm {
            kernel: Kernel::new(arena_capacity, data_depth, return_depth, control_depth),
            msg: Msg::new(),
            io,
            compiling: false,
            exit_flag: false,
            defining_name: None,
        };
        vm.cold_start();
        vm
    }

    /// Installs every builtin as a two-byte arena fragment `opcode; EXIT`
    /// and a matching word-table entry, then records `builtin_count` as the
    /// split the image serializer must restore on load.
    fn cold_start(&mut self) {
        for (name, op, _doc) in BUILTIN_TABLE {
            let addr = self.kernel.here();
            let _ = self.kernel.emit_byte(op.as_byte());
            let _ = self.kernel.emit_byte(Op::Exit.as_byte());
            self.kernel.add_word(name, addr);
        }
        // I is reachable by name (for WORDS/SEE) but the compiler always
        // inlines it rather than emitting CALL — see compiler.rs.
        let i_addr = self.kernel.here();
        let _ = self.kernel.emit_byte(Op::I.as_byte());
        let _ = self.kernel.emit_byte(Op::Exit.as_byte());
        self.kernel.add_word("I", i_addr);

        self.kernel.mark_builtins_done();
    }

    pub fn should_exit(&self) -> bool {
        self.exit_flag
    }

    pub fn bye(&mut self) {
        self.exit_flag = true;
    }

    pub fn push(&mut self, v: Cell) {
        self.kernel.push(v);
    }

    pub fn pop(&mut self) -> Cell {
        self.kernel.pop()
    }

    pub fn push_bool(&mut self, b: bool) {
        self.kernel.push(if b { TRUE } else { FALSE });
    }

    /// Abandon the current compile/line state after a compile-time error
    /// (§4.5, "failure policy"): the stray partial work is simply left as
    /// whatever it was, per spec, but we do clear the compile-time control
    /// stack so a later `;` or top-level line doesn't trip over dangling
    /// patch sites from the abandoned definition.
    pub fn abandon_line(&mut self) {
        self.kernel.control_clear();
    }

    pub fn report(&mut self, err: &CoreError) {
        let text = err.to_string();
        self.msg.error(&mut *self.io, "outer", &text, None::<bool>);
    }
}

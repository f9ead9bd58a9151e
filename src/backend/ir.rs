//! The IR-building contract consumed by the parser.
//!
//! The front end drives IR construction through [`IrBuilder`] as each
//! construct is recognized; it never inspects the handles it gets back.
//! [`IrValue`], [`IrFunction`] and [`IrStorage`] are opaque tokens threaded
//! through production results, and [`IrBranch`] is the context of one
//! conditional under construction.
//!
//! Two implementations ship with the crate: [`crate::backend::ssa::SsaModule`]
//! builds a printable SSA module, and [`NullBuilder`] satisfies the contract
//! with fresh handles for check-only runs and tests.

use crate::frontend::token::LiteralValue;
use crate::frontend::types::ValueType;

/// Opaque handle to an IR value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrValue(pub(crate) usize);

/// Opaque handle to a function under construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrFunction(pub(crate) usize);

/// Opaque handle to a unit of allocated backing storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IrStorage(pub(crate) usize);

/// Context of one `if` construct between `begin_if` and `merge_if`.
#[derive(Debug)]
pub struct IrBranch {
    pub(crate) then_block: usize,
    pub(crate) else_block: usize,
    pub(crate) merge_block: usize,
    pub(crate) has_else: bool,
}

/// Unary IR operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    Negate,
}

impl UnaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            UnaryOp::Not => "not",
            UnaryOp::Negate => "neg",
        }
    }
}

/// Binary IR operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Less,
    LessEq,
    Greater,
    GreaterEq,
    Equal,
    NotEqual,
    And,
    Or,
}

impl BinaryOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Less => "lt",
            BinaryOp::LessEq => "le",
            BinaryOp::Greater => "gt",
            BinaryOp::GreaterEq => "ge",
            BinaryOp::Equal => "eq",
            BinaryOp::NotEqual => "ne",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }
}

/// Capability set the parser requires from an IR backend.
///
/// Functions may nest: a `begin_function` may arrive before the enclosing
/// function's `end_function` (nested procedure declarations). Implementations
/// keep a function stack.
pub trait IrBuilder {
    /// Emit a constant. `negate` applies the sign of a unary minus directly
    /// to the constant.
    fn emit_literal(&mut self, lit: &LiteralValue, negate: bool) -> IrValue;

    fn emit_unary(&mut self, op: UnaryOp, value: IrValue, ty: ValueType) -> IrValue;

    fn emit_binary(&mut self, op: BinaryOp, lhs: IrValue, rhs: IrValue, ty: ValueType) -> IrValue;

    /// Convert a value to `target`. Implementations may return the value
    /// unchanged when no conversion is needed.
    fn emit_convert(&mut self, value: IrValue, source: ValueType, target: ValueType) -> IrValue;

    fn begin_function(&mut self, name: &str, return_type: ValueType, params: &[ValueType]) -> IrFunction;

    fn end_function(&mut self, handle: IrFunction, return_value: Option<IrValue>);

    /// Call a procedure by its canonical name. Arity and argument types have
    /// already been checked by the caller.
    fn emit_call(&mut self, name: &str, args: &[IrValue], return_type: ValueType) -> IrValue;

    fn begin_if(&mut self, condition: IrValue) -> IrBranch;

    fn else_branch(&mut self, ctx: &mut IrBranch);

    /// Close the conditional, phi-merging the branch values when both are
    /// present.
    fn merge_if(&mut self, ctx: IrBranch, then_value: Option<IrValue>, else_value: Option<IrValue>)
    -> Option<IrValue>;

    /// Allocate backing storage for a declared name. `len` is the element
    /// count (1 for scalars).
    fn declare_storage(&mut self, name: &str, ty: ValueType, len: i64) -> IrStorage;

    fn store(&mut self, value: IrValue, handle: IrStorage);

    fn load(&mut self, handle: IrStorage) -> IrValue;
}

/// Backend that builds nothing. Handles are fresh but meaningless; used when
/// only the front end's verdict matters.
#[derive(Debug, Default)]
pub struct NullBuilder {
    next_value: usize,
    next_function: usize,
    next_storage: usize,
    next_block: usize,
}

impl NullBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn fresh_value(&mut self) -> IrValue {
        self.next_value += 1;
        IrValue(self.next_value - 1)
    }
}

impl IrBuilder for NullBuilder {
    fn emit_literal(&mut self, _lit: &LiteralValue, _negate: bool) -> IrValue {
        self.fresh_value()
    }

    fn emit_unary(&mut self, _op: UnaryOp, _value: IrValue, _ty: ValueType) -> IrValue {
        self.fresh_value()
    }

    fn emit_binary(&mut self, _op: BinaryOp, _lhs: IrValue, _rhs: IrValue, _ty: ValueType) -> IrValue {
        self.fresh_value()
    }

    fn emit_convert(&mut self, value: IrValue, source: ValueType, target: ValueType) -> IrValue {
        if source == target { value } else { self.fresh_value() }
    }

    fn begin_function(&mut self, _name: &str, _return_type: ValueType, _params: &[ValueType]) -> IrFunction {
        self.next_function += 1;
        IrFunction(self.next_function - 1)
    }

    fn end_function(&mut self, _handle: IrFunction, _return_value: Option<IrValue>) {}

    fn emit_call(&mut self, _name: &str, _args: &[IrValue], _return_type: ValueType) -> IrValue {
        self.fresh_value()
    }

    fn begin_if(&mut self, _condition: IrValue) -> IrBranch {
        let base = self.next_block;
        self.next_block += 3;
        IrBranch {
            then_block: base,
            else_block: base + 1,
            merge_block: base + 2,
            has_else: false,
        }
    }

    fn else_branch(&mut self, ctx: &mut IrBranch) {
        ctx.has_else = true;
    }

    fn merge_if(
        &mut self,
        _ctx: IrBranch,
        then_value: Option<IrValue>,
        else_value: Option<IrValue>,
    ) -> Option<IrValue> {
        match (then_value, else_value) {
            (Some(_), Some(_)) => Some(self.fresh_value()),
            _ => None,
        }
    }

    fn declare_storage(&mut self, _name: &str, _ty: ValueType, _len: i64) -> IrStorage {
        self.next_storage += 1;
        IrStorage(self.next_storage - 1)
    }

    fn store(&mut self, _value: IrValue, _handle: IrStorage) {}

    fn load(&mut self, _handle: IrStorage) -> IrValue {
        self.fresh_value()
    }
}

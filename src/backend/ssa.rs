//! Textual SSA module builder.
//!
//! Implements [`IrBuilder`] with a printable module: named globals, functions
//! made of labelled basic blocks, numbered values and phi merges. Conversions
//! follow the usual widening operations (`sitofp`, `sext`, `trunc`).
//!
//! Values are numbered per function. Nested procedure declarations suspend
//! the enclosing function on a stack and resume it when the inner one ends.

use std::fmt::Write as _;

use crate::backend::ir::{BinaryOp, IrBranch, IrBuilder, IrFunction, IrStorage, IrValue, UnaryOp};
use crate::frontend::token::LiteralValue;
use crate::frontend::types::ValueType;

#[derive(Debug)]
struct Block {
    label: String,
    instructions: Vec<String>,
    terminator: Option<String>,
}

impl Block {
    fn new(label: String) -> Self {
        Self {
            label,
            instructions: Vec::new(),
            terminator: None,
        }
    }
}

#[derive(Debug)]
struct Function {
    name: String,
    return_type: ValueType,
    params: Vec<ValueType>,
    blocks: Vec<Block>,
    current_block: usize,
    next_value: usize,
    next_label: usize,
}

impl Function {
    fn new(name: &str, return_type: ValueType, params: &[ValueType]) -> Self {
        Self {
            name: name.to_string(),
            return_type,
            params: params.to_vec(),
            blocks: vec![Block::new("entry".to_string())],
            current_block: 0,
            next_value: 0,
            next_label: 0,
        }
    }
}

#[derive(Debug)]
struct Storage {
    name: String,
    ty: ValueType,
    len: i64,
    /// Module-level slots are declared outside any function.
    global: bool,
}

/// An SSA module under construction.
#[derive(Debug, Default)]
pub struct SsaModule {
    functions: Vec<Function>,
    storages: Vec<Storage>,
    /// Stack of functions under construction; the top receives emissions.
    open: Vec<usize>,
}

impl SsaModule {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&mut self) -> &mut Function {
        let idx = *self.open.last().expect("INVARIANT: emission outside any function");
        &mut self.functions[idx]
    }

    fn fresh_value(&mut self) -> IrValue {
        let func = self.current();
        func.next_value += 1;
        IrValue(func.next_value - 1)
    }

    fn push_instruction(&mut self, text: String) {
        let func = self.current();
        let block = func.current_block;
        func.blocks[block].instructions.push(text);
    }

    fn terminate(&mut self, text: String) {
        let func = self.current();
        let block = &mut func.blocks[func.current_block];
        if block.terminator.is_none() {
            block.terminator = Some(text);
        }
    }

    fn start_block(&mut self, index: usize) {
        self.current().current_block = index;
    }

    fn new_block(&mut self, label: String) -> usize {
        let func = self.current();
        func.blocks.push(Block::new(label));
        func.blocks.len() - 1
    }

    fn block_label(&mut self, index: usize) -> String {
        self.current().blocks[index].label.clone()
    }

    fn storage_ref(&self, handle: IrStorage) -> String {
        let storage = &self.storages[handle.0];
        if storage.global {
            format!("@{}", storage.name)
        } else {
            format!("%{}", storage.name)
        }
    }

    /// Render the module as text.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for storage in self.storages.iter().filter(|s| s.global) {
            let _ = writeln!(out, "global {} @{}[{}]", storage.ty, storage.name, storage.len);
        }
        for func in &self.functions {
            if !out.is_empty() {
                out.push('\n');
            }
            let params = func
                .params
                .iter()
                .map(|p| p.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(out, "define {} @{}({}) {{", func.return_type, func.name, params);
            for block in &func.blocks {
                let _ = writeln!(out, "{}:", block.label);
                for inst in &block.instructions {
                    let _ = writeln!(out, "  {inst}");
                }
                if let Some(term) = &block.terminator {
                    let _ = writeln!(out, "  {term}");
                }
            }
            let _ = writeln!(out, "}}");
        }
        out
    }
}

impl IrBuilder for SsaModule {
    fn emit_literal(&mut self, lit: &LiteralValue, negate: bool) -> IrValue {
        let value = self.fresh_value();
        let text = match lit {
            LiteralValue::Int(v) => format!("const INTEGER {}", if negate { -v } else { *v }),
            LiteralValue::Float(v) => format!("const FLOAT {}", if negate { -v } else { *v }),
            LiteralValue::True => "const BOOL 1".to_string(),
            LiteralValue::False => "const BOOL 0".to_string(),
            LiteralValue::Str(s) => format!("const STRING {s:?}"),
        };
        self.push_instruction(format!("%{} = {}", value.0, text));
        value
    }

    fn emit_unary(&mut self, op: UnaryOp, value: IrValue, ty: ValueType) -> IrValue {
        let result = self.fresh_value();
        self.push_instruction(format!("%{} = {} {} %{}", result.0, op.mnemonic(), ty, value.0));
        result
    }

    fn emit_binary(&mut self, op: BinaryOp, lhs: IrValue, rhs: IrValue, ty: ValueType) -> IrValue {
        let result = self.fresh_value();
        self.push_instruction(format!(
            "%{} = {} {} %{}, %{}",
            result.0,
            op.mnemonic(),
            ty,
            lhs.0,
            rhs.0
        ));
        result
    }

    fn emit_convert(&mut self, value: IrValue, source: ValueType, target: ValueType) -> IrValue {
        if source == target {
            return value;
        }
        let mnemonic = match (source, target) {
            (ValueType::Int, ValueType::Float) => "sitofp",
            (ValueType::Bool, ValueType::Int) => "sext",
            (ValueType::Int, ValueType::Bool) => "trunc",
            (ValueType::Bool, ValueType::Float) => "uitofp",
            _ => "bitcast",
        };
        let result = self.fresh_value();
        self.push_instruction(format!("%{} = {} %{} to {}", result.0, mnemonic, value.0, target));
        result
    }

    fn begin_function(&mut self, name: &str, return_type: ValueType, params: &[ValueType]) -> IrFunction {
        self.functions.push(Function::new(name, return_type, params));
        let idx = self.functions.len() - 1;
        self.open.push(idx);
        IrFunction(idx)
    }

    fn end_function(&mut self, handle: IrFunction, return_value: Option<IrValue>) {
        let top = self.open.pop().expect("INVARIANT: end_function without begin_function");
        debug_assert_eq!(top, handle.0, "INVARIANT: function end out of order");
        let func = &mut self.functions[handle.0];
        let block = &mut func.blocks[func.current_block];
        if block.terminator.is_none() {
            block.terminator = Some(match return_value {
                Some(v) => format!("ret %{}", v.0),
                None => "ret".to_string(),
            });
        }
    }

    fn emit_call(&mut self, name: &str, args: &[IrValue], return_type: ValueType) -> IrValue {
        let result = self.fresh_value();
        let args = args
            .iter()
            .map(|a| format!("%{}", a.0))
            .collect::<Vec<_>>()
            .join(", ");
        self.push_instruction(format!("%{} = call {} @{}({})", result.0, return_type, name, args));
        result
    }

    fn begin_if(&mut self, condition: IrValue) -> IrBranch {
        let id = self.current().next_label;
        self.current().next_label += 1;
        let then_block = self.new_block(format!("then{id}"));
        let else_block = self.new_block(format!("else{id}"));
        let merge_block = self.new_block(format!("merge{id}"));
        let then_label = self.block_label(then_block);
        let else_label = self.block_label(else_block);
        self.terminate(format!("br %{}, label {}, label {}", condition.0, then_label, else_label));
        self.start_block(then_block);
        IrBranch {
            then_block,
            else_block,
            merge_block,
            has_else: false,
        }
    }

    fn else_branch(&mut self, ctx: &mut IrBranch) {
        let merge_label = self.block_label(ctx.merge_block);
        self.terminate(format!("br label {merge_label}"));
        self.start_block(ctx.else_block);
        ctx.has_else = true;
    }

    fn merge_if(
        &mut self,
        ctx: IrBranch,
        then_value: Option<IrValue>,
        else_value: Option<IrValue>,
    ) -> Option<IrValue> {
        let merge_label = self.block_label(ctx.merge_block);
        if !ctx.has_else {
            // No ELSE: the else block is an empty fallthrough.
            self.terminate(format!("br label {merge_label}"));
            self.start_block(ctx.else_block);
        }
        self.terminate(format!("br label {merge_label}"));
        self.start_block(ctx.merge_block);

        if let (Some(t), Some(e)) = (then_value, else_value) {
            let then_label = self.block_label(ctx.then_block);
            let else_label = self.block_label(ctx.else_block);
            let result = self.fresh_value();
            self.push_instruction(format!(
                "%{} = phi [%{}, {}], [%{}, {}]",
                result.0, t.0, then_label, e.0, else_label
            ));
            Some(result)
        } else {
            None
        }
    }

    fn declare_storage(&mut self, name: &str, ty: ValueType, len: i64) -> IrStorage {
        let global = self.open.is_empty();
        self.storages.push(Storage {
            name: name.to_string(),
            ty,
            len,
            global,
        });
        let handle = IrStorage(self.storages.len() - 1);
        if !global {
            let reference = self.storage_ref(handle);
            self.push_instruction(format!("{reference} = alloca {ty}[{len}]"));
        }
        handle
    }

    fn store(&mut self, value: IrValue, handle: IrStorage) {
        let reference = self.storage_ref(handle);
        self.push_instruction(format!("store %{}, {}", value.0, reference));
    }

    fn load(&mut self, handle: IrStorage) -> IrValue {
        let result = self.fresh_value();
        let reference = self.storage_ref(handle);
        self.push_instruction(format!("%{} = load {}", result.0, reference));
        result
    }
}

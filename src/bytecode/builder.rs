//! FunctionBuilder - helper for assembling function packages
//!
//! Provides block allocation, a deduplicating constant pool, local slot
//! allocation and nested try regions. `finish` runs the validator.

use crate::error::ValidationError;
use crate::prelude::*;
use crate::value::JsString;

use super::op::{BlockId, ConstantIndex, Op, SlotIndex};
use super::package::{
    Constant, FunctionFlags, FunctionPackage, ImportEntry, PackageParts, ScopeLayout, SlotKind,
};
use super::validate::validate;

/// Slots every activation reserves before its parameters (receiver, new-target)
pub const RESERVED_SLOTS: u32 = 2;

/// Slot holding the receiver
pub const RECEIVER_SLOT: SlotIndex = 0;

/// Slot holding `new.target`
pub const NEW_TARGET_SLOT: SlotIndex = 1;

struct BlockData {
    ops: Vec<Op>,
    handler: Option<BlockId>,
}

/// Try region still being emitted
struct OpenRegion {
    handler: BlockId,
    first_block: u32,
}

/// Builder for constructing function packages
pub struct FunctionBuilder {
    name: Option<JsString>,
    flags: FunctionFlags,
    param_count: u32,
    blocks: Vec<BlockData>,
    current: BlockId,
    constants: Vec<Constant>,
    /// String constant deduplication map
    string_map: FxHashMap<JsString, ConstantIndex>,
    /// Number constant deduplication map (by bit pattern)
    number_map: FxHashMap<u64, ConstantIndex>,
    slot_kinds: Vec<SlotKind>,
    open_regions: Vec<OpenRegion>,
    regions: Vec<(u32, u32, BlockId)>,
}

impl FunctionBuilder {
    /// Create a builder with an empty entry block selected
    pub fn new(name: Option<&str>, param_count: u32) -> Self {
        let mut builder = Self {
            name: name.map(JsString::from),
            flags: FunctionFlags::default(),
            param_count,
            blocks: Vec::new(),
            current: BlockId(0),
            constants: Vec::new(),
            string_map: FxHashMap::default(),
            number_map: FxHashMap::default(),
            slot_kinds: vec![SlotKind::Value; (RESERVED_SLOTS + param_count) as usize],
            open_regions: Vec::new(),
            regions: Vec::new(),
        };
        builder.current = builder.new_block();
        builder
    }

    pub fn with_flags(mut self, flags: FunctionFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn flags_mut(&mut self) -> &mut FunctionFlags {
        &mut self.flags
    }

    /// Slot of the `index`th positional parameter
    pub fn param_slot(index: u32) -> SlotIndex {
        RESERVED_SLOTS + index
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Blocks
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Allocate a block. It inherits the innermost open try handler.
    pub fn new_block(&mut self) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        let handler = self.open_regions.last().map(|region| region.handler);
        self.blocks.push(BlockData {
            ops: Vec::new(),
            handler,
        });
        id
    }

    /// Direct subsequent `emit` calls to `block`
    pub fn switch_to(&mut self, block: BlockId) {
        self.current = block;
    }

    pub fn current_block(&self) -> BlockId {
        self.current
    }

    /// Append an instruction to the current block
    pub fn emit(&mut self, op: Op) {
        if let Some(block) = self.blocks.get_mut(self.current.0 as usize) {
            block.ops.push(op);
        }
    }

    /// Open a try region: every block allocated until the matching
    /// `exit_try` is covered by `handler`. The handler block must already
    /// exist or be allocated after `exit_try`.
    pub fn enter_try(&mut self, handler: BlockId) {
        self.open_regions.push(OpenRegion {
            handler,
            first_block: self.blocks.len() as u32,
        });
    }

    /// Close the innermost try region
    pub fn exit_try(&mut self) {
        if let Some(region) = self.open_regions.pop() {
            self.regions
                .push((region.first_block, self.blocks.len() as u32, region.handler));
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Constants
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Add a string constant to the pool (with deduplication)
    pub fn add_string(&mut self, s: &str) -> ConstantIndex {
        if let Some(&idx) = self.string_map.get(s) {
            return idx;
        }
        let s = JsString::from(s);
        let idx = self.push_constant(Constant::String(s.clone()));
        self.string_map.insert(s, idx);
        idx
    }

    /// Add a number constant to the pool (with deduplication)
    pub fn add_number(&mut self, n: f64) -> ConstantIndex {
        let bits = n.to_bits();
        if let Some(&idx) = self.number_map.get(&bits) {
            return idx;
        }
        let idx = self.push_constant(Constant::Number(n));
        self.number_map.insert(bits, idx);
        idx
    }

    /// Add a nested function. The same package is pooled once.
    pub fn add_function(&mut self, package: Rc<FunctionPackage>) -> ConstantIndex {
        let existing = self.constants.iter().position(|c| match c {
            Constant::Function(f) => Rc::ptr_eq(f, &package),
            _ => false,
        });
        match existing {
            Some(idx) => idx as ConstantIndex,
            None => self.push_constant(Constant::Function(package)),
        }
    }

    pub fn add_scope(&mut self, layout: ScopeLayout) -> ConstantIndex {
        self.push_constant(Constant::Scope(Rc::new(layout)))
    }

    pub fn add_import(&mut self, specifier: &str, import_name: &str, local_name: &str) -> ConstantIndex {
        self.push_constant(Constant::Import(ImportEntry {
            specifier: JsString::from(specifier),
            import_name: JsString::from(import_name),
            local_name: JsString::from(local_name),
        }))
    }

    fn push_constant(&mut self, constant: Constant) -> ConstantIndex {
        let idx = self.constants.len() as ConstantIndex;
        self.constants.push(constant);
        idx
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Locals
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Allocate a temporary slot of the given kind
    pub fn alloc_slot(&mut self, kind: SlotKind) -> SlotIndex {
        let slot = self.slot_kinds.len() as SlotIndex;
        self.slot_kinds.push(kind);
        slot
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Emission helpers
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Push a number, using `PushInt` when it is an exact int32
    pub fn emit_number(&mut self, n: f64) {
        let as_int = n as i32;
        if f64::from(as_int) == n && !(n == 0.0 && n.is_sign_negative()) {
            self.emit(Op::PushInt(as_int));
        } else {
            let idx = self.add_number(n);
            self.emit(Op::PushConst(idx));
        }
    }

    pub fn emit_string(&mut self, s: &str) {
        let idx = self.add_string(s);
        self.emit(Op::PushConst(idx));
    }

    // ═══════════════════════════════════════════════════════════════════════════════
    // Finish
    // ═══════════════════════════════════════════════════════════════════════════════

    /// Lay out the package and validate it
    pub fn finish(self) -> Result<FunctionPackage, ValidationError> {
        if !self.open_regions.is_empty() {
            return Err(ValidationError::UnclosedRegion(self.open_regions.len()));
        }
        let package = self.finish_unvalidated();
        validate(&package)?;
        Ok(package)
    }

    /// Lay out the package without validation. Malformed packages surface
    /// as internal VM errors when executed.
    pub fn finish_unvalidated(self) -> FunctionPackage {
        FunctionPackage::from_parts(PackageParts {
            name: self.name,
            flags: self.flags,
            param_count: self.param_count,
            entry: BlockId(0),
            blocks: self
                .blocks
                .into_iter()
                .map(|block| (block.ops, block.handler))
                .collect(),
            constants: self.constants,
            slot_kinds: self.slot_kinds,
            regions: self.regions,
        })
    }
}

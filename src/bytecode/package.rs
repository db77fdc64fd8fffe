//! Function/IR package
//!
//! The immutable per-function artifact the interpreter executes: blocks laid
//! out in creation order over one flat code vector, a constant pool, local
//! slot kinds and the handler regions covering the code.

use crate::prelude::*;
use crate::value::JsString;

use super::op::{BlockId, ConstantIndex, Op};

/// Static kind of a local slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// Unboxed 32-bit integer, supports in-place increment
    Int,
    /// Any language value
    Value,
}

/// Function flags set by the front end
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FunctionFlags {
    pub strict: bool,
    pub generator: bool,
    pub is_async: bool,
    /// Arrow functions capture the receiver and new-target of their creator
    pub arrow: bool,
    /// Methods and accessors are never constructors
    pub method: bool,
    /// Class constructor with an `extends` clause
    pub derived: bool,
}

impl FunctionFlags {
    /// Generator and async activations both run as resumable coroutines
    pub fn is_coroutine(&self) -> bool {
        self.generator || self.is_async
    }
}

/// A binding declared by a scope
#[derive(Debug, Clone, PartialEq)]
pub struct ScopeBinding {
    pub name: JsString,
    pub mutable: bool,
}

/// Bindings created, uninitialized, when a declarative or module record is
/// pushed. A binding's slot is its position in the layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopeLayout {
    pub bindings: Vec<ScopeBinding>,
}

impl ScopeLayout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `let`-style binding
    pub fn mutable(mut self, name: &str) -> Self {
        self.bindings.push(ScopeBinding {
            name: JsString::from(name),
            mutable: true,
        });
        self
    }

    /// Add a `const`-style binding
    pub fn immutable(mut self, name: &str) -> Self {
        self.bindings.push(ScopeBinding {
            name: JsString::from(name),
            mutable: false,
        });
        self
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

/// `import { import_name as local_name } from "specifier"`
#[derive(Debug, Clone, PartialEq)]
pub struct ImportEntry {
    pub specifier: JsString,
    pub import_name: JsString,
    pub local_name: JsString,
}

/// Constant pool entry
#[derive(Debug, Clone)]
pub enum Constant {
    Number(f64),
    String(JsString),
    /// Nested function template instantiated by `CreateClosure`/`CreateClass`
    Function(Rc<FunctionPackage>),
    /// Layout for `PushDeclarativeEnv`/`PushModuleEnv`
    Scope(Rc<ScopeLayout>),
    Import(ImportEntry),
}

impl Constant {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Constant::Number(_) => "number",
            Constant::String(_) => "string",
            Constant::Function(_) => "function",
            Constant::Scope(_) => "scope",
            Constant::Import(_) => "import",
        }
    }
}

/// Placement of one block inside the flat code vector
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub start: usize,
    pub end: usize,
    /// Innermost handler active when the block was created
    pub handler: Option<BlockId>,
}

/// `[start, end)` code range protected by a handler block
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HandlerRegion {
    pub start: usize,
    pub end: usize,
    pub handler: BlockId,
}

impl HandlerRegion {
    pub fn covers(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }
}

/// Immutable bytecode for one function
#[derive(Debug, Clone)]
pub struct FunctionPackage {
    name: Option<JsString>,
    flags: FunctionFlags,
    param_count: u32,
    entry: BlockId,
    code: Vec<Op>,
    blocks: Vec<Block>,
    constants: Vec<Constant>,
    slot_kinds: Vec<SlotKind>,
    regions: Vec<HandlerRegion>,
}

/// Raw parts handed to [`FunctionPackage::from_parts`]
pub struct PackageParts {
    pub name: Option<JsString>,
    pub flags: FunctionFlags,
    pub param_count: u32,
    pub entry: BlockId,
    /// Ops of each block, indexed by block id
    pub blocks: Vec<(Vec<Op>, Option<BlockId>)>,
    pub constants: Vec<Constant>,
    pub slot_kinds: Vec<SlotKind>,
    /// `(first block, one past last block, handler)`
    pub regions: Vec<(u32, u32, BlockId)>,
}

impl FunctionPackage {
    /// Lay out blocks in id order and compute region offsets. No validation.
    pub fn from_parts(parts: PackageParts) -> Self {
        let mut code = Vec::new();
        let mut blocks = Vec::with_capacity(parts.blocks.len());
        for (index, (ops, handler)) in parts.blocks.into_iter().enumerate() {
            let start = code.len();
            code.extend(ops);
            blocks.push(Block {
                id: BlockId(index as u32),
                start,
                end: code.len(),
                handler,
            });
        }

        let block_start = |index: u32| -> usize {
            blocks
                .get(index as usize)
                .map_or(code.len(), |block| block.start)
        };

        let regions: Vec<HandlerRegion> = parts
            .regions
            .into_iter()
            .map(|(first, last, handler)| HandlerRegion {
                start: block_start(first),
                end: block_start(last),
                handler,
            })
            .filter(|region| region.start < region.end)
            .collect();

        Self {
            name: parts.name,
            flags: parts.flags,
            param_count: parts.param_count,
            entry: parts.entry,
            code,
            blocks,
            constants: parts.constants,
            slot_kinds: parts.slot_kinds,
            regions,
        }
    }

    pub fn name(&self) -> Option<&JsString> {
        self.name.as_ref()
    }

    pub fn flags(&self) -> FunctionFlags {
        self.flags
    }

    pub fn is_strict(&self) -> bool {
        self.flags.strict
    }

    pub fn param_count(&self) -> u32 {
        self.param_count
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn code(&self) -> &[Op] {
        &self.code
    }

    pub fn op_at(&self, offset: usize) -> Option<&Op> {
        self.code.get(offset)
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize)
    }

    /// Code offset of a block's first instruction
    pub fn block_offset(&self, id: BlockId) -> Option<usize> {
        self.block(id).map(|block| block.start)
    }

    pub fn block_ops(&self, id: BlockId) -> Option<&[Op]> {
        let block = self.block(id)?;
        self.code.get(block.start..block.end)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn constant(&self, index: ConstantIndex) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    pub fn slot_kinds(&self) -> &[SlotKind] {
        &self.slot_kinds
    }

    pub fn local_count(&self) -> usize {
        self.slot_kinds.len()
    }

    pub fn regions(&self) -> &[HandlerRegion] {
        &self.regions
    }

    pub fn region(&self, index: usize) -> Option<&HandlerRegion> {
        self.regions.get(index)
    }

    /// Regions covering `to` that do not cover `from`. These are the
    /// regions a control transfer from `from` enters.
    pub fn regions_entered(
        &self,
        from: Option<usize>,
        to: usize,
    ) -> impl Iterator<Item = (usize, &HandlerRegion)> + '_ {
        self.regions.iter().enumerate().filter(move |(_, region)| {
            region.covers(to) && !from.is_some_and(|from| region.covers(from))
        })
    }

    /// Innermost region covering `offset`: latest start, then earliest end
    pub fn innermost_region(&self, offset: usize) -> Option<usize> {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, region)| region.covers(offset))
            .min_by(|(ia, a), (ib, b)| {
                b.start
                    .cmp(&a.start)
                    .then(a.end.cmp(&b.end))
                    .then(ia.cmp(ib))
            })
            .map(|(index, _)| index)
    }
}

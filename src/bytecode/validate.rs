//! IR validator
//!
//! Checks the structural rules the interpreter relies on: block shape,
//! in-range targets/constants/slots, handler placement and a simulated
//! operand-stack height that never goes negative and agrees at joins.

use crate::error::ValidationError;
use crate::prelude::*;

use super::builder::RESERVED_SLOTS;
use super::op::{BlockId, ConstantIndex, Op, SlotIndex};
use super::package::{Constant, FunctionPackage, SlotKind};

/// Validate a package
pub fn validate(package: &FunctionPackage) -> Result<(), ValidationError> {
    if package.blocks().is_empty() {
        return Err(ValidationError::NoBlocks);
    }
    if package.block(package.entry()).is_none() {
        return Err(ValidationError::MissingEntry(package.entry()));
    }

    let reserved = RESERVED_SLOTS + package.param_count();
    let reserved_ok = (0..reserved).all(|slot| {
        package.slot_kinds().get(slot as usize) == Some(&SlotKind::Value)
    });
    if !reserved_ok {
        return Err(ValidationError::ReservedSlotKind(reserved));
    }

    let coroutine = package.flags().is_coroutine();
    for block in package.blocks() {
        let ops = package.block_ops(block.id).unwrap_or(&[]);
        check_block_shape(block.id, ops)?;
        for op in ops {
            if op.requires_coroutine() && !coroutine {
                return Err(ValidationError::CoroutineOpInPlainFunction {
                    block: block.id,
                    op: op.name(),
                });
            }
            check_operands(package, block.id, op)?;
        }
    }

    for region in package.regions() {
        if package.block(region.handler).is_none() {
            return Err(ValidationError::UnknownTarget {
                block: region.handler,
                target: region.handler,
            });
        }
        let inside = package
            .block_offset(region.handler)
            .is_some_and(|offset| region.covers(offset));
        if inside {
            return Err(ValidationError::HandlerInsideRegion(region.handler));
        }
    }

    check_stack_heights(package)
}

fn check_block_shape(id: BlockId, ops: &[Op]) -> Result<(), ValidationError> {
    let Some((last, body)) = ops.split_last() else {
        return Err(ValidationError::EmptyBlock(id));
    };
    if let Some(op) = body.iter().find(|op| op.is_terminator()) {
        return Err(ValidationError::TerminatorMidBlock {
            block: id,
            op: op.name(),
        });
    }
    if !last.is_terminator() {
        return Err(ValidationError::MissingTerminator(id));
    }
    Ok(())
}

fn check_operands(package: &FunctionPackage, block: BlockId, op: &Op) -> Result<(), ValidationError> {
    for target in op.successors() {
        if package.block(target).is_none() {
            return Err(ValidationError::UnknownTarget { block, target });
        }
    }

    let slot = |slot: SlotIndex, kind: SlotKind| -> Result<(), ValidationError> {
        match package.slot_kinds().get(slot as usize) {
            Some(actual) if *actual == kind => Ok(()),
            _ => Err(ValidationError::BadSlot { block, slot }),
        }
    };
    let constant = |index: ConstantIndex, expected: &'static str, ok: fn(&Constant) -> bool| {
        match package.constant(index) {
            Some(c) if ok(c) => Ok(()),
            _ => Err(ValidationError::BadConstant {
                block,
                index,
                expected,
            }),
        }
    };
    let string = |index: ConstantIndex| constant(index, "string", |c| matches!(c, Constant::String(_)));
    let function =
        |index: ConstantIndex| constant(index, "function", |c| matches!(c, Constant::Function(_)));
    let scope = |index: ConstantIndex| constant(index, "scope", |c| matches!(c, Constant::Scope(_)));

    match op {
        Op::LoadValue(s) | Op::StoreValue(s) => slot(*s, SlotKind::Value),
        Op::LoadInt(s) | Op::StoreInt(s) | Op::IncInt { slot: s, .. } => slot(*s, SlotKind::Int),
        Op::PushConst(idx) => constant(*idx, "number or string", |c| {
            matches!(c, Constant::Number(_) | Constant::String(_))
        }),
        Op::GetNamed(idx)
        | Op::SetNamed(idx)
        | Op::DefineField(idx)
        | Op::DeclareGlobalVar(idx)
        | Op::DeclareGlobalLexical { name: idx, .. }
        | Op::InitializeGlobalLexical(idx)
        | Op::LoadGlobal(idx)
        | Op::StoreGlobal(idx)
        | Op::TypeofGlobal(idx)
        | Op::LoadVariable(idx)
        | Op::StoreVariable(idx)
        | Op::LoadModuleVar(idx)
        | Op::StoreModuleVar(idx)
        | Op::ThrowConstantReassignment(idx)
        | Op::ThrowLexicalAccessError(idx)
        | Op::AttachClassMethod { name: idx, .. }
        | Op::LoadSuperProperty(idx) => string(*idx),
        Op::CreateClosure(idx) | Op::CreateClass { constructor: idx, .. } => function(*idx),
        Op::PushDeclarativeEnv(idx) | Op::PushModuleEnv(idx) => scope(*idx),
        Op::CreateImportBinding(idx) => {
            constant(*idx, "import", |c| matches!(c, Constant::Import(_)))
        }
        _ => Ok(()),
    }
}

/// Propagate entry heights through the CFG. Every edge that crosses into a
/// region from outside enters it, and all of them must agree on the height.
/// The handler is entered at that height plus the exception value.
fn check_stack_heights(package: &FunctionPackage) -> Result<(), ValidationError> {
    let mut heights: FxHashMap<BlockId, usize> = FxHashMap::default();
    let mut region_heights: FxHashMap<usize, usize> = FxHashMap::default();
    // (offset of the transferring instruction, target block, height)
    let mut worklist: Vec<(Option<usize>, BlockId, usize)> = vec![(None, package.entry(), 0)];

    while let Some((from, block, height)) = worklist.pop() {
        let Some(offset) = package.block_offset(block) else {
            return Err(ValidationError::UnknownTarget {
                block,
                target: block,
            });
        };

        for (index, region) in package.regions_entered(from, offset) {
            match region_heights.get(&index) {
                Some(&first) if first != height => {
                    return Err(ValidationError::InconsistentRegionHeight {
                        region: index,
                        first,
                        second: height,
                    });
                }
                Some(_) => {}
                None => {
                    region_heights.insert(index, height);
                    worklist.push((Some(offset), region.handler, height + 1));
                }
            }
        }

        match heights.get(&block) {
            Some(&first) if first == height => continue,
            Some(&first) => {
                return Err(ValidationError::InconsistentHeight {
                    block,
                    first,
                    second: height,
                });
            }
            None => {
                heights.insert(block, height);
            }
        }

        let ops = package.block_ops(block).unwrap_or(&[]);
        let mut current = height;
        for (index, op) in ops.iter().enumerate() {
            let (pops, pushes) = op.stack_effect();
            current = current
                .checked_sub(pops)
                .ok_or(ValidationError::StackUnderflow { block, index })?;
            if matches!(op, Op::Yield | Op::Await) && current != 0 {
                return Err(ValidationError::UnspilledSuspend {
                    block,
                    op: op.name(),
                    height: current,
                });
            }
            current += pushes;
            for target in op.successors() {
                worklist.push((Some(offset + index), target, current));
            }
        }
    }
    Ok(())
}

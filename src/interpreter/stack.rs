//! Per-activation storage: the operand stack and the typed locals array

use crate::bytecode::{SlotIndex, SlotKind};
use crate::error::VmError;
use crate::value::JsValue;

/// Operand stack of one activation
#[derive(Debug, Default)]
pub struct OperandStack {
    values: Vec<JsValue>,
}

impl OperandStack {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn push(&mut self, value: JsValue) {
        self.values.push(value);
    }

    /// Pop, reporting underflow at `offset`
    pub fn pop(&mut self, offset: usize) -> Result<JsValue, VmError> {
        self.values.pop().ok_or(VmError::StackUnderflow { offset })
    }

    pub fn peek(&self, offset: usize) -> Result<&JsValue, VmError> {
        self.values.last().ok_or(VmError::StackUnderflow { offset })
    }

    /// Pop the top `n` values, returned in push order
    pub fn pop_n(&mut self, n: usize, offset: usize) -> Result<Vec<JsValue>, VmError> {
        let start = self
            .values
            .len()
            .checked_sub(n)
            .ok_or(VmError::StackUnderflow { offset })?;
        Ok(self.values.split_off(start))
    }

    /// Discard entries above `height`
    pub fn truncate(&mut self, height: usize) {
        self.values.truncate(height);
    }
}

/// A local slot. Int slots hold unboxed integers.
#[derive(Debug, Clone)]
pub enum Local {
    Int(i32),
    Value(JsValue),
}

impl Local {
    fn kind(&self) -> SlotKind {
        match self {
            Local::Int(_) => SlotKind::Int,
            Local::Value(_) => SlotKind::Value,
        }
    }
}

/// Locals array, sized and typed from the package's slot kinds
#[derive(Debug, Clone)]
pub struct Locals {
    slots: Vec<Local>,
}

impl Locals {
    /// Fresh locals: Int slots start at 0, Value slots at undefined
    pub fn new(kinds: &[SlotKind]) -> Self {
        let slots = kinds
            .iter()
            .map(|kind| match kind {
                SlotKind::Int => Local::Int(0),
                SlotKind::Value => Local::Value(JsValue::Undefined),
            })
            .collect();
        Self { slots }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    fn slot(&self, slot: SlotIndex) -> Result<&Local, VmError> {
        self.slots
            .get(slot as usize)
            .ok_or(VmError::SlotOutOfRange { slot })
    }

    fn slot_mut(&mut self, slot: SlotIndex) -> Result<&mut Local, VmError> {
        self.slots
            .get_mut(slot as usize)
            .ok_or(VmError::SlotOutOfRange { slot })
    }

    pub fn get_value(&self, slot: SlotIndex) -> Result<JsValue, VmError> {
        match self.slot(slot)? {
            Local::Value(v) => Ok(v.clone()),
            other => Err(VmError::SlotKind {
                slot,
                expected: SlotKind::Value,
                actual: other.kind(),
            }),
        }
    }

    pub fn set_value(&mut self, slot: SlotIndex, value: JsValue) -> Result<(), VmError> {
        match self.slot_mut(slot)? {
            Local::Value(v) => {
                *v = value;
                Ok(())
            }
            other => Err(VmError::SlotKind {
                slot,
                expected: SlotKind::Value,
                actual: other.kind(),
            }),
        }
    }

    pub fn get_int(&self, slot: SlotIndex) -> Result<i32, VmError> {
        match self.slot(slot)? {
            Local::Int(n) => Ok(*n),
            other => Err(VmError::SlotKind {
                slot,
                expected: SlotKind::Int,
                actual: other.kind(),
            }),
        }
    }

    /// Store a number that must be an exact int32
    pub fn set_int(&mut self, slot: SlotIndex, value: &JsValue) -> Result<(), VmError> {
        let n = match value {
            JsValue::Number(n) if f64::from(*n as i32) == *n => *n as i32,
            _ => return Err(VmError::IntSlotValue { slot }),
        };
        match self.slot_mut(slot)? {
            Local::Int(current) => {
                *current = n;
                Ok(())
            }
            other => Err(VmError::SlotKind {
                slot,
                expected: SlotKind::Int,
                actual: other.kind(),
            }),
        }
    }

    /// In-place add on an Int slot; overflow is an invariant violation
    pub fn increment(&mut self, slot: SlotIndex, delta: i32) -> Result<(), VmError> {
        match self.slot_mut(slot)? {
            Local::Int(current) => {
                *current = current
                    .checked_add(delta)
                    .ok_or(VmError::IntOverflow { slot })?;
                Ok(())
            }
            other => Err(VmError::SlotKind {
                slot,
                expected: SlotKind::Int,
                actual: other.kind(),
            }),
        }
    }
}

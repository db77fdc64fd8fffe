//! Handler regions: catching, stack restoration, nesting and propagation

use std::rc::Rc;

use jsvm::{BinaryOperator, ExecError, FunctionBuilder, JsError, JsValue, Op, SlotKind, VmError};

use super::{eval, run, uncaught};

// ═══════════════════════════════════════════════════════════════════════════════
// Catching
// ═══════════════════════════════════════════════════════════════════════════════

/// Values pushed inside the region are discarded; values below it survive.
#[test]
fn test_catch_restores_region_height() {
    let mut b = FunctionBuilder::new(Some("main"), 0);
    let handler = b.new_block();
    b.enter_try(handler);
    let body = b.new_block();
    b.exit_try();

    b.emit(Op::PushInt(10));
    b.emit(Op::Jump(body));

    b.switch_to(body);
    b.emit(Op::PushInt(1));
    b.emit(Op::PushInt(2));
    b.emit(Op::PushInt(5));
    b.emit(Op::Throw);

    // [10 exception]
    b.switch_to(handler);
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Return);

    assert_eq!(eval(b), JsValue::Number(15.0));
}

#[test]
fn test_caught_type_error_is_an_error_object() {
    let mut b = FunctionBuilder::new(None, 0);
    let handler = b.new_block();
    b.enter_try(handler);
    let body = b.new_block();
    b.exit_try();
    let message = b.add_string("message");
    let prop = b.add_string("x");
    let type_error = b.add_string("TypeError");

    b.emit(Op::Jump(body));
    b.switch_to(body);
    b.emit(Op::PushUndefined);
    b.emit(Op::GetNamed(prop));
    b.emit(Op::Return);

    b.switch_to(handler);
    b.emit(Op::Dup);
    b.emit(Op::LoadGlobal(type_error));
    b.emit(Op::InstanceOf);
    let is_type_error = b.new_block();
    let other = b.new_block();
    b.emit(Op::JumpIf {
        if_true: is_type_error,
        if_false: other,
    });
    b.switch_to(is_type_error);
    b.emit(Op::GetNamed(message));
    b.emit(Op::Return);
    b.switch_to(other);
    b.emit(Op::Return);

    assert_eq!(
        eval(b),
        JsValue::from("Cannot read properties of undefined (reading 'x')")
    );
}

#[test]
fn test_exception_crosses_call_boundary() {
    let mut callee = FunctionBuilder::new(Some("fail"), 0);
    callee.emit_string("from callee");
    callee.emit(Op::Throw);
    let callee = Rc::new(callee.finish().unwrap());

    let mut b = FunctionBuilder::new(None, 0);
    let f = b.add_function(callee);
    let handler = b.new_block();
    b.enter_try(handler);
    let body = b.new_block();
    b.exit_try();

    b.emit(Op::Jump(body));
    b.switch_to(body);
    b.emit(Op::PushUndefined);
    b.emit(Op::CreateClosure(f));
    b.emit(Op::Call(0));
    b.emit(Op::Return);

    b.switch_to(handler);
    b.emit(Op::Return);

    assert_eq!(eval(b), JsValue::from("from callee"));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Nesting
// ═══════════════════════════════════════════════════════════════════════════════

/// outer { inner { throw "x" } } with the inner handler either returning
/// or rethrowing
fn nested(rethrow: bool) -> FunctionBuilder {
    let mut b = FunctionBuilder::new(None, 0);
    let outer_handler = b.new_block();
    b.enter_try(outer_handler);
    let outer_body = b.new_block();
    let inner_handler = b.new_block();
    b.enter_try(inner_handler);
    let inner_body = b.new_block();
    b.exit_try();
    b.exit_try();

    b.emit(Op::Jump(outer_body));
    b.switch_to(outer_body);
    b.emit(Op::Jump(inner_body));
    b.switch_to(inner_body);
    b.emit_string("x");
    b.emit(Op::Throw);

    b.switch_to(inner_handler);
    if rethrow {
        b.emit(Op::Throw);
    } else {
        b.emit(Op::Pop);
        b.emit_string("inner");
        b.emit(Op::Return);
    }

    b.switch_to(outer_handler);
    b.emit_string("outer:");
    b.emit(Op::Swap);
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Return);
    b
}

#[test]
fn test_innermost_handler_wins() {
    assert_eq!(eval(nested(false)), JsValue::from("inner"));
}

#[test]
fn test_rethrow_reaches_outer_handler() {
    assert_eq!(eval(nested(true)), JsValue::from("outer:x"));
}

/// try { try { } catch {} throw "late" } catch (e) { return "outer:" + e }
/// with the inner handler allocated first, so the outer region is entered
/// through the inner body rather than its first block
#[test]
fn test_throw_after_inner_region_reaches_outer_handler() {
    let mut b = FunctionBuilder::new(None, 0);
    let outer_handler = b.new_block();
    b.enter_try(outer_handler);
    let inner_handler = b.new_block();
    b.enter_try(inner_handler);
    let inner_body = b.new_block();
    b.exit_try();
    let after_inner = b.new_block();
    b.exit_try();

    b.emit(Op::PushInt(1));
    b.emit(Op::Jump(inner_body));
    b.switch_to(inner_body);
    b.emit(Op::Jump(after_inner));
    b.switch_to(after_inner);
    b.emit(Op::PushInt(2));
    b.emit_string("late");
    b.emit(Op::Throw);

    b.switch_to(inner_handler);
    b.emit(Op::Return);

    b.switch_to(outer_handler);
    b.emit_string("outer:");
    b.emit(Op::Swap);
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Swap);
    b.emit(Op::Pop);
    b.emit(Op::Return);

    assert_eq!(eval(b), JsValue::from("outer:late"));
}

#[test]
fn test_handler_outside_region_is_not_covered() {
    // A throw after the region has ended escapes the function
    let mut b = FunctionBuilder::new(None, 0);
    let handler = b.new_block();
    b.enter_try(handler);
    let body = b.new_block();
    b.exit_try();
    let after = b.new_block();

    b.emit(Op::Jump(body));
    b.switch_to(body);
    b.emit(Op::Jump(after));
    b.switch_to(after);
    b.emit_string("late");
    b.emit(Op::Throw);
    b.switch_to(handler);
    b.emit(Op::Return);

    assert_eq!(uncaught(run(b.finish().unwrap())), "Uncaught late");
}

// ═══════════════════════════════════════════════════════════════════════════════
// Uncaught and internal errors
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_uncaught_type_error_message() {
    let mut b = FunctionBuilder::new(None, 0);
    let prop = b.add_string("x");
    b.emit(Op::PushNull);
    b.emit(Op::GetNamed(prop));
    b.emit(Op::Return);
    let err = run(b.finish().unwrap()).unwrap_err();
    assert!(matches!(err, ExecError::Runtime(JsError::TypeError { .. })));
    assert_eq!(
        err.to_string(),
        "Uncaught TypeError: Cannot read properties of null (reading 'x')"
    );
}

#[test]
fn test_constant_reassignment() {
    let mut b = FunctionBuilder::new(None, 0);
    let name = b.add_string("k");
    b.emit(Op::ThrowConstantReassignment(name));
    assert_eq!(
        uncaught(run(b.finish().unwrap())),
        "Uncaught TypeError: Assignment to constant variable."
    );
}

#[test]
fn test_internal_error_skips_handlers() {
    let mut b = FunctionBuilder::new(None, 0);
    let slot = b.alloc_slot(SlotKind::Int);
    let half = b.add_number(0.5);
    let handler = b.new_block();
    b.enter_try(handler);
    let body = b.new_block();
    b.exit_try();

    b.emit(Op::Jump(body));
    b.switch_to(body);
    b.emit(Op::PushConst(half));
    b.emit(Op::StoreInt(slot));
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    b.switch_to(handler);
    b.emit_string("caught");
    b.emit(Op::Return);

    let err = run(b.finish().unwrap()).unwrap_err();
    assert!(matches!(
        err,
        ExecError::Internal(VmError::IntSlotValue { slot: s }) if s == slot
    ));
}

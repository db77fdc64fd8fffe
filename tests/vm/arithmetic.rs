//! Operators, coercions and straight-line control flow

use jsvm::{BinaryOperator, FunctionBuilder, JsValue, Op, SlotKind, UnaryOperator};

use super::{eval, run};

fn binary(lhs: JsValue, rhs: JsValue, op: Op) -> JsValue {
    let mut b = FunctionBuilder::new(None, 0);
    for value in [lhs, rhs] {
        match value {
            JsValue::Number(n) => b.emit_number(n),
            JsValue::String(s) => b.emit_string(s.as_str()),
            JsValue::Boolean(v) => b.emit(Op::PushBool(v)),
            JsValue::Null => b.emit(Op::PushNull),
            _ => b.emit(Op::PushUndefined),
        }
    }
    b.emit(op);
    b.emit(Op::Return);
    eval(b)
}

// ═══════════════════════════════════════════════════════════════════════════════
// Binary operators
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_add_numbers() {
    let result = binary(1.into(), 2.into(), Op::Binary(BinaryOperator::Add));
    assert_eq!(result, JsValue::Number(3.0));
}

#[test]
fn test_add_concatenates_strings() {
    let result = binary("a".into(), 1.into(), Op::Binary(BinaryOperator::Add));
    assert_eq!(result, JsValue::from("a1"));
    let result = binary(1.into(), "2".into(), Op::Binary(BinaryOperator::Add));
    assert_eq!(result, JsValue::from("12"));
}

#[test]
fn test_right_operand_on_top() {
    let result = binary(10.into(), 4.into(), Op::Binary(BinaryOperator::Sub));
    assert_eq!(result, JsValue::Number(6.0));
    let result = binary(1.into(), 4.into(), Op::Binary(BinaryOperator::Div));
    assert_eq!(result, JsValue::Number(0.25));
}

#[test]
fn test_numeric_coercion() {
    let result = binary("6".into(), "3".into(), Op::Binary(BinaryOperator::Mul));
    assert_eq!(result, JsValue::Number(18.0));
    let result = binary(true.into(), JsValue::Null, Op::Binary(BinaryOperator::Add));
    assert_eq!(result, JsValue::Number(1.0));

    let result = binary(JsValue::Undefined, 1.into(), Op::Binary(BinaryOperator::Add));
    assert!(matches!(result, JsValue::Number(n) if n.is_nan()));
}

#[test]
fn test_bitwise_and_shifts() {
    assert_eq!(
        binary((-1).into(), 28.into(), Op::Binary(BinaryOperator::UShr)),
        JsValue::Number(15.0)
    );
    assert_eq!(
        binary(1.into(), 33.into(), Op::Binary(BinaryOperator::Shl)),
        JsValue::Number(2.0)
    );
    assert_eq!(
        binary(6.into(), 3.into(), Op::Binary(BinaryOperator::BitXor)),
        JsValue::Number(5.0)
    );
}

#[test]
fn test_exponent_and_remainder() {
    assert_eq!(
        binary(2.into(), 10.into(), Op::Binary(BinaryOperator::Exp)),
        JsValue::Number(1024.0)
    );
    assert_eq!(
        binary((-7).into(), 3.into(), Op::Binary(BinaryOperator::Mod)),
        JsValue::Number(-1.0)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Comparisons
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_equality_operators() {
    assert_eq!(binary("1".into(), 1.into(), Op::LooseEquals), JsValue::Boolean(true));
    assert_eq!(binary("1".into(), 1.into(), Op::StrictEquals), JsValue::Boolean(false));
    assert_eq!(
        binary(JsValue::Null, JsValue::Undefined, Op::LooseEquals),
        JsValue::Boolean(true)
    );
    assert_eq!(
        binary(JsValue::Null, 0.into(), Op::LooseNotEquals),
        JsValue::Boolean(true)
    );
}

#[test]
fn test_relational_operators() {
    assert_eq!(binary(1.into(), 2.into(), Op::LessThan), JsValue::Boolean(true));
    assert_eq!(binary(2.into(), 2.into(), Op::GreaterThanOrEqual), JsValue::Boolean(true));
    assert_eq!(binary("b".into(), "a".into(), Op::GreaterThan), JsValue::Boolean(true));
    assert_eq!(
        binary(JsValue::Undefined, 1.into(), Op::LessThanOrEqual),
        JsValue::Boolean(false)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Unary operators
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_unary_operators() {
    let mut b = FunctionBuilder::new(None, 0);
    b.emit_string("5");
    b.emit(Op::Unary(UnaryOperator::Minus));
    b.emit(Op::Unary(UnaryOperator::BitNot));
    b.emit(Op::Return);
    assert_eq!(eval(b), JsValue::Number(4.0));

    let mut b = FunctionBuilder::new(None, 0);
    b.emit_string("");
    b.emit(Op::Unary(UnaryOperator::Not));
    b.emit(Op::Return);
    assert_eq!(eval(b), JsValue::Boolean(true));
}

#[test]
fn test_typeof() {
    for (push, expected) in [
        (Op::PushNull, "object"),
        (Op::PushUndefined, "undefined"),
        (Op::PushBool(false), "boolean"),
        (Op::PushInt(3), "number"),
        (Op::CreateObject, "object"),
    ] {
        let mut b = FunctionBuilder::new(None, 0);
        b.emit(push);
        b.emit(Op::Typeof);
        b.emit(Op::Return);
        assert_eq!(eval(b), JsValue::from(expected));
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// Control flow and locals
// ═══════════════════════════════════════════════════════════════════════════════

/// let acc = 0; for (let i = 1; i <= 10; i++) acc += i; return acc;
#[test]
fn test_counting_loop_with_int_slot() {
    let mut b = FunctionBuilder::new(Some("sum"), 0);
    let acc = b.alloc_slot(SlotKind::Value);
    let i = b.alloc_slot(SlotKind::Int);
    let head = b.new_block();
    let body = b.new_block();
    let exit = b.new_block();

    b.emit(Op::PushInt(0));
    b.emit(Op::StoreValue(acc));
    b.emit(Op::PushInt(1));
    b.emit(Op::StoreInt(i));
    b.emit(Op::Jump(head));

    b.switch_to(head);
    b.emit(Op::LoadInt(i));
    b.emit(Op::PushInt(10));
    b.emit(Op::LessThanOrEqual);
    b.emit(Op::JumpIf {
        if_true: body,
        if_false: exit,
    });

    b.switch_to(body);
    b.emit(Op::LoadValue(acc));
    b.emit(Op::LoadInt(i));
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::StoreValue(acc));
    b.emit(Op::IncInt { slot: i, delta: 1 });
    b.emit(Op::Jump(head));

    b.switch_to(exit);
    b.emit(Op::LoadValue(acc));
    b.emit(Op::Return);

    assert_eq!(eval(b), JsValue::Number(55.0));
}

#[test]
fn test_jump_table_dispatch() {
    let mut b = FunctionBuilder::new(None, 0);
    let first = b.new_block();
    let second = b.new_block();
    b.emit(Op::PushInt(1));
    b.emit(Op::JumpTable(vec![first, second]));
    b.switch_to(first);
    b.emit_string("first");
    b.emit(Op::Return);
    b.switch_to(second);
    b.emit_string("second");
    b.emit(Op::Return);
    assert_eq!(eval(b), JsValue::from("second"));
}

#[test]
fn test_jump_if_nullish() {
    let mut b = FunctionBuilder::new(None, 0);
    let nullish = b.new_block();
    let otherwise = b.new_block();
    b.emit(Op::PushNull);
    b.emit(Op::JumpIfNullish {
        if_nullish: nullish,
        otherwise,
    });
    b.switch_to(nullish);
    b.emit(Op::PushInt(1));
    b.emit(Op::Return);
    b.switch_to(otherwise);
    b.emit(Op::PushInt(2));
    b.emit(Op::Return);
    assert_eq!(eval(b), JsValue::Number(1.0));
}

#[test]
fn test_stack_shuffles() {
    // [1 2] DupUnder -> [2 1 2]; Sub -> [2 -1]; Swap -> [-1 2]; Sub -> [-3]
    let mut b = FunctionBuilder::new(None, 0);
    b.emit(Op::PushInt(1));
    b.emit(Op::PushInt(2));
    b.emit(Op::DupUnder);
    b.emit(Op::Binary(BinaryOperator::Sub));
    b.emit(Op::Swap);
    b.emit(Op::Binary(BinaryOperator::Sub));
    b.emit(Op::Return);
    assert_eq!(eval(b), JsValue::Number(-3.0));
}

#[test]
fn test_fractional_jump_table_index_is_internal() {
    let mut b = FunctionBuilder::new(None, 0);
    let target = b.new_block();
    b.emit_number(0.5);
    b.emit(Op::JumpTable(vec![target]));
    b.switch_to(target);
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    let err = run(b.finish().unwrap()).unwrap_err();
    assert!(err.is_internal());
}

//! Environment records: block scopes, closures, TDZ and the global record

use std::rc::Rc;

use jsvm::{BinaryOperator, FunctionBuilder, FunctionFlags, JsValue, Op, ScopeLayout, SlotKind};

use super::{create_agent, eval, run, uncaught};

// ═══════════════════════════════════════════════════════════════════════════════
// Block scopes
// ═══════════════════════════════════════════════════════════════════════════════

/// let x = 1; { let x = 2; inner = x } return inner * 10 + x
#[test]
fn test_shadowing_ends_at_pop_env() {
    let mut b = FunctionBuilder::new(None, 0);
    let x = b.add_string("x");
    let block = b.add_scope(ScopeLayout::new().mutable("x"));
    let inner = b.alloc_slot(SlotKind::Value);

    b.emit(Op::DeclareGlobalLexical { name: x, mutable: true });
    b.emit(Op::PushInt(1));
    b.emit(Op::InitializeGlobalLexical(x));

    b.emit(Op::PushDeclarativeEnv(block));
    b.emit(Op::PushInt(2));
    b.emit(Op::InitializeLexical(0));
    b.emit(Op::LoadVariable(x));
    b.emit(Op::StoreValue(inner));
    b.emit(Op::PopEnv);

    b.emit(Op::LoadValue(inner));
    b.emit(Op::PushInt(10));
    b.emit(Op::Binary(BinaryOperator::Mul));
    b.emit(Op::LoadVariable(x));
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Return);

    assert_eq!(eval(b), JsValue::Number(21.0));
}

#[test]
fn test_static_access_by_distance() {
    // { let a = 1; { let b = 2; return a + b } } with slot/distance addressing
    let mut b = FunctionBuilder::new(None, 0);
    let outer = b.add_scope(ScopeLayout::new().mutable("a"));
    let inner = b.add_scope(ScopeLayout::new().mutable("b"));
    b.emit(Op::PushDeclarativeEnv(outer));
    b.emit(Op::PushInt(1));
    b.emit(Op::InitializeLexical(0));
    b.emit(Op::PushDeclarativeEnv(inner));
    b.emit(Op::PushInt(2));
    b.emit(Op::InitializeLexical(0));
    b.emit(Op::LoadLexical { slot: 0, distance: 1 });
    b.emit(Op::PushInt(40));
    b.emit(Op::StoreLexical { slot: 0, distance: 0 });
    b.emit(Op::LoadLexical { slot: 0, distance: 0 });
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Return);
    assert_eq!(eval(b), JsValue::Number(41.0));
}

#[test]
fn test_tdz_read_raises_reference_error() {
    let mut b = FunctionBuilder::new(None, 0);
    let k = b.add_string("k");
    let block = b.add_scope(ScopeLayout::new().immutable("k"));
    b.emit(Op::PushDeclarativeEnv(block));
    b.emit(Op::LoadLexical { slot: 0, distance: 0 });
    b.emit(Op::ThrowLexicalAccessError(k));
    b.emit(Op::Return);
    assert_eq!(
        uncaught(run(b.finish().unwrap())),
        "Uncaught ReferenceError: Cannot access 'k' before initialization"
    );
}

#[test]
fn test_const_binding_rejects_store() {
    let mut b = FunctionBuilder::new(None, 0);
    let block = b.add_scope(ScopeLayout::new().immutable("k"));
    b.emit(Op::PushDeclarativeEnv(block));
    b.emit(Op::PushInt(1));
    b.emit(Op::InitializeLexical(0));
    b.emit(Op::PushInt(2));
    b.emit(Op::StoreLexical { slot: 0, distance: 0 });
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    assert_eq!(
        uncaught(run(b.finish().unwrap())),
        "Uncaught TypeError: Assignment to constant variable."
    );
}

#[test]
fn test_pop_env_past_global_is_internal() {
    let mut b = FunctionBuilder::new(None, 0);
    b.emit(Op::PopEnv);
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    assert!(run(b.finish().unwrap()).unwrap_err().is_internal());
}

// ═══════════════════════════════════════════════════════════════════════════════
// Closures
// ═══════════════════════════════════════════════════════════════════════════════

/// { let n = 0; f = () => ++n } f(); f(); return f()
#[test]
fn test_closure_keeps_record_alive_after_pop() {
    let mut inc = FunctionBuilder::new(Some("inc"), 0);
    inc.flags_mut().arrow = true;
    inc.emit(Op::LoadLexical { slot: 0, distance: 0 });
    inc.emit(Op::PushInt(1));
    inc.emit(Op::Binary(BinaryOperator::Add));
    inc.emit(Op::Dup);
    inc.emit(Op::StoreLexical { slot: 0, distance: 0 });
    inc.emit(Op::Return);
    let inc = Rc::new(inc.finish().unwrap());

    let mut b = FunctionBuilder::new(None, 0);
    let scope = b.add_scope(ScopeLayout::new().mutable("n"));
    let inc = b.add_function(inc);
    let f = b.alloc_slot(SlotKind::Value);

    b.emit(Op::PushDeclarativeEnv(scope));
    b.emit(Op::PushInt(0));
    b.emit(Op::InitializeLexical(0));
    b.emit(Op::CreateClosure(inc));
    b.emit(Op::StoreValue(f));
    b.emit(Op::PopEnv);
    for _ in 0..2 {
        b.emit(Op::PushUndefined);
        b.emit(Op::LoadValue(f));
        b.emit(Op::Call(0));
        b.emit(Op::Pop);
    }
    b.emit(Op::PushUndefined);
    b.emit(Op::LoadValue(f));
    b.emit(Op::Call(0));
    b.emit(Op::Return);

    assert_eq!(eval(b), JsValue::Number(3.0));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Global record
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_global_lexical_is_not_a_global_property() {
    let mut b = FunctionBuilder::new(None, 0);
    let y = b.add_string("y");
    let global_this = b.add_string("globalThis");
    b.emit(Op::DeclareGlobalLexical { name: y, mutable: false });
    b.emit(Op::PushInt(5));
    b.emit(Op::InitializeGlobalLexical(y));
    b.emit(Op::LoadGlobal(global_this));
    b.emit(Op::GetNamed(y));
    b.emit(Op::Typeof);
    b.emit(Op::LoadGlobal(y));
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Return);
    assert_eq!(eval(b), JsValue::from("undefined5"));
}

#[test]
fn test_global_var_becomes_property() {
    let mut agent = create_agent();
    let mut b = FunctionBuilder::new(None, 0);
    let v = b.add_string("v");
    b.emit(Op::DeclareGlobalVar(v));
    b.emit(Op::PushInt(3));
    b.emit(Op::StoreGlobal(v));
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    agent.run_script(b.finish().unwrap()).unwrap();

    let global = JsValue::Object(agent.global_object());
    assert_eq!(super::get(&mut agent, &global, "v"), JsValue::Number(3.0));
}

#[test]
fn test_lexical_conflicts_with_var() {
    let mut b = FunctionBuilder::new(None, 0);
    let x = b.add_string("x");
    b.emit(Op::DeclareGlobalVar(x));
    b.emit(Op::DeclareGlobalLexical { name: x, mutable: true });
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    assert_eq!(
        uncaught(run(b.finish().unwrap())),
        "Uncaught SyntaxError: Identifier 'x' has already been declared"
    );
}

#[test]
fn test_typeof_tolerates_only_unresolvable_names() {
    let mut b = FunctionBuilder::new(None, 0);
    let missing = b.add_string("missing");
    b.emit(Op::TypeofGlobal(missing));
    b.emit(Op::Return);
    assert_eq!(eval(b), JsValue::from("undefined"));

    let mut b = FunctionBuilder::new(None, 0);
    let q = b.add_string("q");
    b.emit(Op::DeclareGlobalLexical { name: q, mutable: true });
    b.emit(Op::TypeofGlobal(q));
    b.emit(Op::Return);
    assert_eq!(
        uncaught(run(b.finish().unwrap())),
        "Uncaught ReferenceError: Cannot access 'q' before initialization"
    );
}

#[test]
fn test_strict_store_to_unresolvable_name() {
    let mut b = FunctionBuilder::new(None, 0).with_flags(FunctionFlags {
        strict: true,
        ..FunctionFlags::default()
    });
    let z = b.add_string("z");
    b.emit(Op::PushInt(1));
    b.emit(Op::StoreVariable(z));
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    assert_eq!(
        uncaught(run(b.finish().unwrap())),
        "Uncaught ReferenceError: z is not defined"
    );
}

//! Classes: prototype wiring, methods, static members and `super`

use std::rc::Rc;

use jsvm::{
    BinaryOperator, ConstantIndex, FunctionBuilder, FunctionFlags, FunctionPackage, JsValue,
    MethodKind, Op, SlotKind,
};

use super::{eval, run, uncaught};

/// constructor(v) { this.v = v }
fn base_constructor() -> Rc<FunctionPackage> {
    let mut b = FunctionBuilder::new(Some("A"), 1);
    let v = b.add_string("v");
    b.emit(Op::LoadValue(0));
    b.emit(Op::LoadValue(FunctionBuilder::param_slot(0)));
    b.emit(Op::SetNamed(v));
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    Rc::new(b.finish().unwrap())
}

/// constructor(x) { super(x * 2) }
fn derived_constructor(calls_super: bool) -> Rc<FunctionPackage> {
    let mut b = FunctionBuilder::new(Some("B"), 1).with_flags(FunctionFlags {
        derived: true,
        ..FunctionFlags::default()
    });
    if calls_super {
        b.emit(Op::LoadValue(FunctionBuilder::param_slot(0)));
        b.emit(Op::PushInt(2));
        b.emit(Op::Binary(BinaryOperator::Mul));
        b.emit(Op::LoadValue(1));
        b.emit(Op::GetSuperConstructor);
        b.emit(Op::Construct(1));
        b.emit(Op::StoreValue(0));
    }
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    Rc::new(b.finish().unwrap())
}

fn method(name: &str, build: impl FnOnce(&mut FunctionBuilder)) -> Rc<FunctionPackage> {
    let mut b = FunctionBuilder::new(Some(name), 0);
    b.flags_mut().method = true;
    build(&mut b);
    Rc::new(b.finish().unwrap())
}

/// Emit `CreateClass` plus one attached method; leaves the class on the stack
fn emit_class(
    b: &mut FunctionBuilder,
    constructor: Rc<FunctionPackage>,
    has_heritage: bool,
    method_name: ConstantIndex,
    body: Rc<FunctionPackage>,
    is_static: bool,
) {
    let constructor = b.add_function(constructor);
    let body = b.add_function(body);
    b.emit(Op::CreateClass {
        constructor,
        has_heritage,
    });
    b.emit(Op::CreateClosure(body));
    b.emit(Op::AttachClassMethod {
        name: method_name,
        kind: MethodKind::Method,
        is_static,
    });
}

// ═══════════════════════════════════════════════════════════════════════════════
// Base classes
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_instance_method_reads_receiver() {
    // class A { constructor(v) { this.v = v } get() { return this.v + 1 } }
    // return new A(4).get()
    let mut b = FunctionBuilder::new(None, 0);
    let get = b.add_string("get");
    let a = b.alloc_slot(SlotKind::Value);
    let getter = method("get", |m| {
        let v = m.add_string("v");
        m.emit(Op::LoadValue(0));
        m.emit(Op::GetNamed(v));
        m.emit(Op::PushInt(1));
        m.emit(Op::Binary(BinaryOperator::Add));
        m.emit(Op::Return);
    });
    emit_class(&mut b, base_constructor(), false, get, getter, false);
    b.emit(Op::StoreValue(a));

    b.emit(Op::PushInt(4));
    b.emit(Op::LoadValue(a));
    b.emit(Op::LoadValue(a));
    b.emit(Op::Construct(1));
    b.emit(Op::Dup);
    b.emit(Op::GetNamed(get));
    b.emit(Op::Call(0));
    b.emit(Op::Return);

    assert_eq!(eval(b), JsValue::Number(5.0));
}

#[test]
fn test_static_method_lives_on_class() {
    let mut b = FunctionBuilder::new(None, 0);
    let make = b.add_string("make");
    let body = method("make", |m| {
        m.emit_string("static");
        m.emit(Op::Return);
    });
    emit_class(&mut b, base_constructor(), false, make, body, true);
    b.emit(Op::Dup);
    b.emit(Op::GetNamed(make));
    b.emit(Op::Call(0));
    b.emit(Op::Return);
    assert_eq!(eval(b), JsValue::from("static"));
}

#[test]
fn test_class_requires_new() {
    let mut b = FunctionBuilder::new(None, 0);
    let constructor = b.add_function(base_constructor());
    b.emit(Op::PushUndefined);
    b.emit(Op::CreateClass {
        constructor,
        has_heritage: false,
    });
    b.emit(Op::Call(0));
    b.emit(Op::Return);
    assert_eq!(
        uncaught(run(b.finish().unwrap())),
        "Uncaught TypeError: Class constructor A cannot be invoked without 'new'"
    );
}

#[test]
fn test_methods_are_not_constructors() {
    let mut b = FunctionBuilder::new(None, 0);
    let get = b.add_string("get");
    let body = method("get", |m| {
        m.emit(Op::PushUndefined);
        m.emit(Op::Return);
    });
    emit_class(&mut b, base_constructor(), false, get, body, true);
    b.emit(Op::GetNamed(get));
    b.emit(Op::Dup);
    b.emit(Op::Construct(0));
    b.emit(Op::Return);
    let message = uncaught(run(b.finish().unwrap()));
    assert!(message.ends_with("is not a constructor"), "{}", message);
}

// ═══════════════════════════════════════════════════════════════════════════════
// Derived classes
// ═══════════════════════════════════════════════════════════════════════════════

/// class A { get() { return this.v + 1 } }
/// class B extends A { constructor(x) { super(x * 2) } get() { return super.get() * 10 } }
/// return new B(3).get()
#[test]
fn test_super_call_and_super_property() {
    let mut b = FunctionBuilder::new(None, 0);
    let get = b.add_string("get");
    let a = b.alloc_slot(SlotKind::Value);
    let derived = b.alloc_slot(SlotKind::Value);

    let base_get = method("get", |m| {
        let v = m.add_string("v");
        m.emit(Op::LoadValue(0));
        m.emit(Op::GetNamed(v));
        m.emit(Op::PushInt(1));
        m.emit(Op::Binary(BinaryOperator::Add));
        m.emit(Op::Return);
    });
    let derived_get = method("get", |m| {
        let get = m.add_string("get");
        m.emit(Op::LoadValue(0));
        m.emit(Op::LoadSuperProperty(get));
        m.emit(Op::Call(0));
        m.emit(Op::PushInt(10));
        m.emit(Op::Binary(BinaryOperator::Mul));
        m.emit(Op::Return);
    });

    emit_class(&mut b, base_constructor(), false, get, base_get, false);
    b.emit(Op::StoreValue(a));
    b.emit(Op::LoadValue(a));
    emit_class(&mut b, derived_constructor(true), true, get, derived_get, false);
    b.emit(Op::StoreValue(derived));

    b.emit(Op::PushInt(3));
    b.emit(Op::LoadValue(derived));
    b.emit(Op::LoadValue(derived));
    b.emit(Op::Construct(1));
    b.emit(Op::Dup);
    b.emit(Op::GetNamed(get));
    b.emit(Op::Call(0));
    b.emit(Op::Return);

    assert_eq!(eval(b), JsValue::Number(70.0));
}

#[test]
fn test_derived_constructor_must_call_super() {
    let mut b = FunctionBuilder::new(None, 0);
    let get = b.add_string("get");
    let body = method("get", |m| {
        m.emit(Op::PushUndefined);
        m.emit(Op::Return);
    });
    emit_class(&mut b, base_constructor(), false, get, body.clone(), false);
    emit_class(&mut b, derived_constructor(false), true, get, body, false);
    b.emit(Op::Dup);
    b.emit(Op::Construct(0));
    b.emit(Op::Return);
    assert_eq!(
        uncaught(run(b.finish().unwrap())),
        "Uncaught ReferenceError: Must call super constructor in derived class before accessing 'this' or returning from derived constructor"
    );
}

#[test]
fn test_extends_requires_constructor() {
    let mut b = FunctionBuilder::new(None, 0);
    let constructor = b.add_function(derived_constructor(true));
    b.emit(Op::PushInt(5));
    b.emit(Op::CreateClass {
        constructor,
        has_heritage: true,
    });
    b.emit(Op::Return);
    assert_eq!(
        uncaught(run(b.finish().unwrap())),
        "Uncaught TypeError: Class extends value 5 is not a constructor or null"
    );
}

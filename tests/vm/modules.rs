//! Module records, import linking and live bindings

use std::rc::Rc;

use jsvm::{Agent, BinaryOperator, FunctionBuilder, FunctionPackage, JsValue, Op, ScopeLayout};

use super::{create_agent, run, uncaught};

/// export let count = 0; export function bump() { count++ }
fn counter_module() -> FunctionPackage {
    let mut bump = FunctionBuilder::new(Some("bump"), 0);
    bump.emit(Op::LoadLexical { slot: 0, distance: 0 });
    bump.emit(Op::PushInt(1));
    bump.emit(Op::Binary(BinaryOperator::Add));
    bump.emit(Op::StoreLexical { slot: 0, distance: 0 });
    bump.emit(Op::PushUndefined);
    bump.emit(Op::Return);
    let bump = Rc::new(bump.finish().unwrap());

    let mut b = FunctionBuilder::new(None, 0);
    let scope = b.add_scope(ScopeLayout::new().mutable("count").mutable("bump"));
    let bump = b.add_function(bump);
    b.emit(Op::PushModuleEnv(scope));
    b.emit(Op::PushInt(0));
    b.emit(Op::InitializeLexical(0));
    b.emit(Op::CreateClosure(bump));
    b.emit(Op::InitializeLexical(1));
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    b.finish().unwrap()
}

fn agent_with_counter() -> Agent {
    let mut agent = create_agent();
    agent.run_module("./counter", counter_module()).unwrap();
    agent
}

/// Module body: one import, then `body`
fn importer(
    specifier: &str,
    imports: &[(&str, &str)],
    body: impl FnOnce(&mut FunctionBuilder),
) -> FunctionPackage {
    let mut b = FunctionBuilder::new(None, 0);
    let scope = b.add_scope(ScopeLayout::new());
    b.emit(Op::PushModuleEnv(scope));
    for (import_name, local_name) in imports {
        let entry = b.add_import(specifier, import_name, local_name);
        b.emit(Op::CreateImportBinding(entry));
    }
    body(&mut b);
    b.finish().unwrap()
}

// ═══════════════════════════════════════════════════════════════════════════════
// Linking
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_module_record_is_registered() {
    let agent = agent_with_counter();
    let module = agent.module_env("./counter").unwrap();
    assert!(module.is_module());
    assert!(module.has_own_binding("count"));
    assert!(agent.module_env("./other").is_none());
}

#[test]
fn test_imports_are_live_bindings() {
    let mut agent = agent_with_counter();
    let main = importer("./counter", &[("count", "count"), ("bump", "increment")], |b| {
        let count = b.add_string("count");
        let increment = b.add_string("increment");
        for _ in 0..2 {
            b.emit(Op::PushUndefined);
            b.emit(Op::LoadModuleVar(increment));
            b.emit(Op::Call(0));
            b.emit(Op::Pop);
        }
        b.emit(Op::LoadModuleVar(count));
        b.emit(Op::Return);
    });
    assert_eq!(agent.run_module("./main", main).unwrap(), JsValue::Number(2.0));
}

#[test]
fn test_import_binding_is_read_only() {
    let mut agent = agent_with_counter();
    let main = importer("./counter", &[("count", "count")], |b| {
        let count = b.add_string("count");
        b.emit(Op::PushInt(5));
        b.emit(Op::StoreModuleVar(count));
        b.emit(Op::PushUndefined);
        b.emit(Op::Return);
    });
    assert_eq!(
        uncaught(agent.run_module("./main", main)),
        "Uncaught TypeError: Assignment to constant variable."
    );
}

#[test]
fn test_unknown_module() {
    let mut agent = create_agent();
    let main = importer("./missing", &[("x", "x")], |b| {
        b.emit(Op::PushUndefined);
        b.emit(Op::Return);
    });
    assert_eq!(
        uncaught(agent.run_module("./main", main)),
        "Uncaught SyntaxError: Cannot find module './missing'"
    );
}

#[test]
fn test_missing_export() {
    let mut agent = agent_with_counter();
    let main = importer("./counter", &[("total", "total")], |b| {
        b.emit(Op::PushUndefined);
        b.emit(Op::Return);
    });
    assert_eq!(
        uncaught(agent.run_module("./main", main)),
        "Uncaught SyntaxError: The requested module './counter' does not provide an export named 'total'"
    );
}

#[test]
fn test_module_var_outside_module_is_internal() {
    let mut b = FunctionBuilder::new(None, 0);
    let x = b.add_string("x");
    b.emit(Op::LoadModuleVar(x));
    b.emit(Op::Return);
    assert!(run(b.finish().unwrap()).unwrap_err().is_internal());
}

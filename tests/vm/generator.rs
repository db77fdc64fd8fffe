//! Generator and async suspension: phases, sent values, spilled operands
//! and handler regions that stay live across a yield

use std::rc::Rc;

use jsvm::{
    Agent, AsyncStep, BinaryOperator, ExecError, FunctionBuilder, FunctionFlags, JsValue, Op,
    ResumeMode, SlotKind, ValidationError, VmError,
};

use super::{create_agent, function, get};

fn generator_flags() -> FunctionFlags {
    FunctionFlags {
        generator: true,
        ..FunctionFlags::default()
    }
}

/// Call a generator function and return its generator object
fn start(agent: &mut Agent, builder: FunctionBuilder) -> JsValue {
    let f = function(agent, builder);
    agent.call(&f, JsValue::Undefined, &[]).unwrap()
}

fn unpack(agent: &mut Agent, result: &JsValue) -> (JsValue, bool) {
    let value = get(agent, result, "value");
    let done = get(agent, result, "done");
    (value, done.to_boolean())
}

/// function* counter() {
///   let c = 0;
///   c++; const sent = yield c;
///   c++; const last = yield c;
///   return last + c;
/// }
fn counter() -> FunctionBuilder {
    let mut b = FunctionBuilder::new(Some("counter"), 0).with_flags(generator_flags());
    let c = b.alloc_slot(SlotKind::Int);
    let sent = b.alloc_slot(SlotKind::Value);
    let first = b.new_block();
    let second = b.new_block();
    let third = b.new_block();

    b.emit(Op::GetGeneratorPhase);
    b.emit(Op::JumpTable(vec![first, second, third]));

    b.switch_to(first);
    b.emit(Op::IncInt { slot: c, delta: 1 });
    b.emit(Op::LoadInt(c));
    b.emit(Op::SetGeneratorPhase(1));
    b.emit(Op::Yield);

    b.switch_to(second);
    b.emit(Op::GeneratorSentValue);
    b.emit(Op::StoreValue(sent));
    b.emit(Op::IncInt { slot: c, delta: 1 });
    b.emit(Op::LoadInt(c));
    b.emit(Op::SetGeneratorPhase(2));
    b.emit(Op::Yield);

    b.switch_to(third);
    b.emit(Op::GeneratorSentValue);
    b.emit(Op::LoadInt(c));
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Return);
    b
}

// ═══════════════════════════════════════════════════════════════════════════════
// Next
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_two_yields_three_resumptions() {
    let mut agent = create_agent();
    let generator = start(&mut agent, counter());

    let r = agent.generator_next(&generator, JsValue::Undefined).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Number(1.0), false));

    let r = agent.generator_next(&generator, "ignored".into()).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Number(2.0), false));

    // Locals survive both suspensions: 10 + c where c == 2
    let r = agent.generator_next(&generator, 10.into()).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Number(12.0), true));

    let r = agent.generator_next(&generator, JsValue::Undefined).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Undefined, true));
}

#[test]
fn test_body_does_not_run_before_first_next() {
    let mut agent = create_agent();
    let mut b = FunctionBuilder::new(Some("lazy"), 0).with_flags(generator_flags());
    let name = b.add_string("touched");
    b.emit(Op::PushBool(true));
    b.emit(Op::StoreGlobal(name));
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);

    let generator = start(&mut agent, b);
    assert_eq!(agent.typeof_global(&"touched".into()).unwrap(), JsValue::from("undefined"));
    agent.generator_next(&generator, JsValue::Undefined).unwrap();
    assert_eq!(agent.get_global("touched").unwrap(), JsValue::Boolean(true));
}

#[test]
fn test_next_through_prototype_method() {
    let mut agent = create_agent();
    let generator = start(&mut agent, counter());
    let next = get(&mut agent, &generator, "next");
    let r = agent.call(&next, generator.clone(), &[]).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Number(1.0), false));
}

#[test]
fn test_side_stack_carries_operands_across_yield() {
    // return 40 + (yield 1), with 40 spilled while suspended
    let mut agent = create_agent();
    let mut b = FunctionBuilder::new(None, 0).with_flags(generator_flags());
    let first = b.new_block();
    let resume = b.new_block();
    b.emit(Op::GetGeneratorPhase);
    b.emit(Op::JumpTable(vec![first, resume]));

    b.switch_to(first);
    b.emit(Op::PushInt(40));
    b.emit(Op::PushToGeneratorState);
    b.emit(Op::PushInt(1));
    b.emit(Op::SetGeneratorPhase(1));
    b.emit(Op::Yield);

    b.switch_to(resume);
    b.emit(Op::PopFromGeneratorState);
    b.emit(Op::GeneratorSentValue);
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Return);

    let generator = start(&mut agent, b);
    agent.generator_next(&generator, JsValue::Undefined).unwrap();
    let r = agent.generator_next(&generator, 2.into()).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Number(42.0), true));
}

fn unspilled_yield() -> FunctionBuilder {
    let mut b = FunctionBuilder::new(None, 0).with_flags(generator_flags());
    b.emit(Op::PushInt(1));
    b.emit(Op::PushInt(2));
    b.emit(Op::Yield);
    b
}

#[test]
fn test_yield_with_unspilled_stack_is_rejected() {
    assert!(matches!(
        unspilled_yield().finish().unwrap_err(),
        ValidationError::UnspilledSuspend { op: "Yield", height: 1, .. }
    ));
}

#[test]
fn test_unvalidated_unspilled_yield_is_internal() {
    let mut agent = create_agent();
    let package = Rc::new(unspilled_yield().finish_unvalidated());
    let f = JsValue::Object(agent.create_closure(package, agent.global_env()));
    let generator = agent.call(&f, JsValue::Undefined, &[]).unwrap();
    let err = agent.generator_next(&generator, JsValue::Undefined).unwrap_err();
    assert!(matches!(err, ExecError::Internal(VmError::UnspilledStack("Yield"))));
}

// ═══════════════════════════════════════════════════════════════════════════════
// Return / throw
// ═══════════════════════════════════════════════════════════════════════════════

#[test]
fn test_return_completes_generator() {
    let mut agent = create_agent();
    let generator = start(&mut agent, counter());
    agent.generator_next(&generator, JsValue::Undefined).unwrap();

    let r = agent.generator_return(&generator, 7.into()).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Number(7.0), true));
    let r = agent.generator_next(&generator, JsValue::Undefined).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Undefined, true));
}

#[test]
fn test_throw_before_start_completes() {
    let mut agent = create_agent();
    let generator = start(&mut agent, counter());
    let err = agent.generator_throw(&generator, "early".into()).unwrap_err();
    assert_eq!(err.to_string(), "Uncaught early");
    let r = agent.generator_next(&generator, JsValue::Undefined).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Undefined, true));
}

/// function* g() { try { yield 1 } catch (e) { return "caught " + e } }
#[test]
fn test_throw_into_suspended_try_region() {
    let mut agent = create_agent();
    let mut b = FunctionBuilder::new(Some("g"), 0).with_flags(generator_flags());
    let handler = b.new_block();
    b.enter_try(handler);
    let first = b.new_block();
    let resume = b.new_block();
    b.exit_try();

    b.emit(Op::GetGeneratorPhase);
    b.emit(Op::JumpTable(vec![first, resume]));

    b.switch_to(first);
    b.emit(Op::PushInt(1));
    b.emit(Op::SetGeneratorPhase(1));
    b.emit(Op::Yield);

    b.switch_to(resume);
    b.emit(Op::GeneratorSentValue);
    b.emit(Op::Return);

    b.switch_to(handler);
    b.emit_string("caught ");
    b.emit(Op::Swap);
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Return);

    let generator = start(&mut agent, b);
    let r = agent.generator_next(&generator, JsValue::Undefined).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::Number(1.0), false));

    let r = agent.generator_throw(&generator, "boom".into()).unwrap();
    assert_eq!(unpack(&mut agent, &r), (JsValue::from("caught boom"), true));
}

#[test]
fn test_incompatible_receiver() {
    let mut agent = create_agent();
    let err = agent.generator_next(&JsValue::from(1), JsValue::Undefined).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Uncaught TypeError: Generator.prototype.next called on incompatible receiver 1"
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Async tasks
// ═══════════════════════════════════════════════════════════════════════════════

/// async function f() { return (await 1) + 1 }
fn async_task(agent: &mut Agent) -> JsValue {
    let mut b = FunctionBuilder::new(Some("f"), 0).with_flags(FunctionFlags {
        is_async: true,
        ..FunctionFlags::default()
    });
    let first = b.new_block();
    let resume = b.new_block();
    b.emit(Op::GetGeneratorPhase);
    b.emit(Op::JumpTable(vec![first, resume]));

    b.switch_to(first);
    b.emit(Op::PushInt(1));
    b.emit(Op::SetGeneratorPhase(1));
    b.emit(Op::Await);

    b.switch_to(resume);
    b.emit(Op::GeneratorSentValue);
    b.emit(Op::PushInt(1));
    b.emit(Op::Binary(BinaryOperator::Add));
    b.emit(Op::Return);
    start(agent, b)
}

#[test]
fn test_async_task_awaits_then_completes() {
    let mut agent = create_agent();
    let task = async_task(&mut agent);

    match agent.resume_async(&task, ResumeMode::Next, JsValue::Undefined).unwrap() {
        AsyncStep::Awaiting(value) => assert_eq!(value, JsValue::Number(1.0)),
        other => panic!("expected an await, got {:?}", other),
    }
    match agent.resume_async(&task, ResumeMode::Next, 41.into()).unwrap() {
        AsyncStep::Complete(value) => assert_eq!(value, JsValue::Number(42.0)),
        other => panic!("expected completion, got {:?}", other),
    }
    assert!(agent.resume_async(&task, ResumeMode::Next, JsValue::Undefined).is_err());
}

#[test]
fn test_rejected_await_throws_into_task() {
    let mut agent = create_agent();
    let task = async_task(&mut agent);
    agent.resume_async(&task, ResumeMode::Next, JsValue::Undefined).unwrap();
    let err = agent.resume_async(&task, ResumeMode::Throw, "rejected".into()).unwrap_err();
    assert_eq!(err.to_string(), "Uncaught rejected");
}

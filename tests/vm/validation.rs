//! Load-time validation, configuration and internal invariant failures

use jsvm::{
    BlockId, ExecError, FunctionBuilder, Op, ValidationError, VmConfig, VmError,
};

use super::{create_agent, create_agent_with, run};

#[test]
fn test_run_script_validates_packages() {
    let mut b = FunctionBuilder::new(None, 0);
    b.emit(Op::PushUndefined);
    let err = run(b.finish_unvalidated()).unwrap_err();
    assert!(matches!(
        err,
        ExecError::Validation(ValidationError::MissingTerminator(BlockId(0)))
    ));
    assert!(err.as_js_error().is_none());
}

#[test]
fn test_unvalidated_package_fails_as_internal_error() {
    let mut agent = create_agent_with(VmConfig {
        validate_on_load: false,
        ..VmConfig::default()
    });
    let mut b = FunctionBuilder::new(None, 0);
    b.emit(Op::PushUndefined);
    let err = agent.run_script(b.finish_unvalidated()).unwrap_err();
    assert!(matches!(err, ExecError::Internal(VmError::FellOffEnd(1))));
}

#[test]
fn test_stack_underflow_without_validation() {
    let mut agent = create_agent_with(VmConfig {
        validate_on_load: false,
        ..VmConfig::default()
    });
    let mut b = FunctionBuilder::new(None, 0);
    b.emit(Op::Pop);
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    let err = agent.run_script(b.finish_unvalidated()).unwrap_err();
    assert!(matches!(err, ExecError::Internal(VmError::StackUnderflow { offset: 0 })));
}

#[test]
fn test_handler_inside_its_own_region_rejected() {
    let mut b = FunctionBuilder::new(None, 0);
    b.emit(Op::PushUndefined);
    b.emit(Op::Return);
    b.enter_try(BlockId(1));
    let handler = b.new_block();
    b.exit_try();
    b.switch_to(handler);
    b.emit(Op::Return);
    assert_eq!(
        b.finish().unwrap_err(),
        ValidationError::HandlerInsideRegion(handler)
    );
}

#[test]
fn test_coroutine_ops_rejected_in_plain_function() {
    let mut b = FunctionBuilder::new(None, 0);
    b.emit(Op::GetGeneratorPhase);
    b.emit(Op::Return);
    assert!(matches!(
        b.finish().unwrap_err(),
        ValidationError::CoroutineOpInPlainFunction {
            op: "GetGeneratorPhase",
            ..
        }
    ));
}

#[test]
fn test_config_from_json_keeps_defaults() {
    let config = VmConfig::from_json(r#"{ "max_call_depth": 12 }"#).unwrap();
    assert_eq!(config.max_call_depth, 12);
    assert_eq!(config.initial_stack_capacity, VmConfig::default().initial_stack_capacity);
    assert!(config.validate_on_load);
    assert!(VmConfig::from_json(r#"{ "max_call_depth": "deep" }"#).is_err());
}

#[test]
fn test_agents_are_independent() {
    let mut first = create_agent();
    let second = create_agent();
    first.set_global("shared", 1.into());
    assert!(first.get_global("shared").is_ok());
    assert!(!second.global_object().has_property(&"shared".into()));
}

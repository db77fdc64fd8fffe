//! Integration tests for the VM, organized by feature
//!
//! Every test assembles its bytecode with [`FunctionBuilder`] and runs it
//! through the public [`Agent`] API.
//!
//! Set `RUST_LOG=jsvm=debug` (or `trace` with `trace_dispatch` enabled in
//! the config) to see the VM's logs for a failing test.

mod arithmetic;
mod classes;
mod environment;
mod exceptions;
mod generator;
mod modules;
mod validation;

use std::rc::Rc;

use jsvm::{Agent, ExecError, FunctionBuilder, FunctionPackage, JsValue, PropertyKey, VmConfig};
use tracing_subscriber::EnvFilter;

/// Route VM logs to the test writer. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn create_agent() -> Agent {
    init_tracing();
    Agent::new()
}

pub fn create_agent_with(config: VmConfig) -> Agent {
    init_tracing();
    Agent::with_config(config)
}

/// Run a script package on a fresh agent
pub fn run(package: FunctionPackage) -> Result<JsValue, ExecError> {
    create_agent().run_script(package)
}

/// Run a builder's package and expect a normal completion
pub fn eval(builder: FunctionBuilder) -> JsValue {
    let package = builder.finish().unwrap();
    run(package).unwrap()
}

/// Instantiate a package as a function over the global environment
pub fn function(agent: &Agent, builder: FunctionBuilder) -> JsValue {
    let package = Rc::new(builder.finish().unwrap());
    JsValue::Object(agent.create_closure(package, agent.global_env()))
}

pub fn get(agent: &mut Agent, object: &JsValue, key: &str) -> JsValue {
    agent.get_property(object, &PropertyKey::from(key)).unwrap()
}

/// Message of an uncaught language exception
pub fn uncaught(result: Result<JsValue, ExecError>) -> String {
    result.unwrap_err().to_string()
}

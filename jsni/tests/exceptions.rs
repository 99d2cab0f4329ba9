use jsni::{CallbackInfo, Env, EnvOptions, FatalMode, Value, VmError};

fn new_env() -> Env {
  Env::new(EnvOptions {
    fatal_mode: FatalMode::Panic,
    ..EnvOptions::default()
  })
  .unwrap()
}

fn throw_type_error(env: &mut Env, _info: &CallbackInfo) {
  env.throw_type_error("bad type");
}

fn throw_range_error(env: &mut Env, _info: &CallbackInfo) {
  env.throw_range_error("out of range");
}

fn throw_plain_error(env: &mut Env, _info: &CallbackInfo) {
  env.throw_error("plain");
}

fn throw_number(env: &mut Env, _info: &CallbackInfo) {
  let value = env.new_number(42.0);
  env.throw_error_object(value);
}

/// Calls its first argument, swallows whatever it threw, and returns whether it threw.
fn call_and_clear(env: &mut Env, info: &CallbackInfo) {
  let undefined = env.new_undefined();
  let result = env.call_function(info.arg(0), undefined, &[]);
  let threw = env.has_exception();
  assert_eq!(threw, result.is_empty());
  env.clear_exception();
  assert!(!env.has_exception());
  let threw = env.new_boolean(threw);
  info.set_return_value(env, threw);
}

/// Calls its first argument and leaves any exception pending.
fn call_and_propagate(env: &mut Env, info: &CallbackInfo) {
  let undefined = env.new_undefined();
  env.call_function(info.arg(0), undefined, &[]);
}

fn function(env: &mut Env, callback: jsni::NativeCallback) -> Value {
  let handle = env.new_function(callback);
  env.resolve(handle).unwrap()
}

fn message_of(env: &mut Env, exception: Value) -> String {
  let message = env.get(exception, "message").unwrap();
  env.string_contents(message).unwrap()
}

#[test]
fn thrown_errors_reach_the_host_with_their_kind() {
  let mut env = new_env();
  for (callback, name, message) in [
    (throw_type_error as jsni::NativeCallback, "TypeError", "bad type"),
    (throw_range_error, "RangeError", "out of range"),
    (throw_plain_error, "Error", "plain"),
  ] {
    let func = function(&mut env, callback);
    let Err(VmError::Throw(exception)) = env.call(func, Value::Undefined, &[]) else {
      panic!("expected {name} to be thrown");
    };
    let got_name = env.get(exception, "name").unwrap();
    assert_eq!(env.string_contents(got_name).as_deref(), Some(name));
    assert_eq!(message_of(&mut env, exception), message);

    let handle = env.new_handle(exception);
    assert!(env.is_error(handle));
  }
}

#[test]
fn any_value_can_be_thrown() {
  let mut env = new_env();
  let func = function(&mut env, throw_number);
  assert!(matches!(
    env.call(func, Value::Undefined, &[]),
    Err(VmError::Throw(Value::Number(n))) if n == 42.0
  ));
}

#[test]
fn cleared_exceptions_do_not_propagate() -> Result<(), VmError> {
  let mut env = new_env();
  let thrower = function(&mut env, throw_type_error);
  let catcher = function(&mut env, call_and_clear);
  assert_eq!(
    env.call(catcher, Value::Undefined, &[thrower])?,
    Value::Bool(true)
  );

  let quiet = function(&mut env, call_and_clear);
  let returns = function(&mut env, throw_nothing);
  assert_eq!(
    env.call(quiet, Value::Undefined, &[returns])?,
    Value::Bool(false)
  );
  Ok(())
}

fn throw_nothing(_env: &mut Env, _info: &CallbackInfo) {}

#[test]
fn uncleared_exceptions_propagate_through_native_frames() {
  let mut env = new_env();
  let thrower = function(&mut env, throw_range_error);
  let middle = function(&mut env, call_and_propagate);
  let Err(VmError::Throw(exception)) = env.call(middle, Value::Undefined, &[thrower]) else {
    panic!("expected the exception to propagate");
  };
  assert_eq!(message_of(&mut env, exception), "out of range");
}

/// Throws, then calls a function that returns normally: the earlier exception must survive.
fn throw_then_call(env: &mut Env, info: &CallbackInfo) {
  env.throw_error("outer");
  let undefined = env.new_undefined();
  let result = env.call_function(info.arg(0), undefined, &[]);
  assert!(!result.is_empty());
  assert!(env.has_exception());
}

fn assert_no_exception(env: &mut Env, _info: &CallbackInfo) {
  assert!(!env.has_exception());
}

#[test]
fn callee_does_not_see_or_clear_the_callers_exception() {
  let mut env = new_env();
  let inner = function(&mut env, assert_no_exception);
  let outer = function(&mut env, throw_then_call);
  let Err(VmError::Throw(exception)) = env.call(outer, Value::Undefined, &[inner]) else {
    panic!("expected the outer exception");
  };
  assert_eq!(message_of(&mut env, exception), "outer");
}

#[test]
fn host_level_exceptions_are_taken_once() {
  let mut env = new_env();
  assert!(!env.has_exception());
  env.throw_error("top level");
  assert!(env.has_exception());

  let exception = env.take_exception().unwrap();
  assert_eq!(message_of(&mut env, exception), "top level");
  assert!(env.take_exception().is_none());
}

#[test]
fn new_errors_are_not_thrown() {
  let mut env = new_env();
  let error = env.new_error("e");
  let type_error = env.new_type_error("t");
  let range_error = env.new_range_error("r");
  for handle in [error, type_error, range_error] {
    assert!(env.is_error(handle));
  }
  assert!(!env.has_exception());

  let obj = env.new_object();
  assert!(!env.is_error(obj));

  let range_error = env.resolve(range_error).unwrap();
  let name = env.get(range_error, "name").unwrap();
  assert_eq!(env.string_contents(name).as_deref(), Some("RangeError"));
}

#[test]
fn pending_exception_survives_collection() {
  let mut env = new_env();
  env.throw_type_error("kept");
  env.collect_garbage();
  let exception = env.take_exception().unwrap();
  assert!(env.heap().is_valid_value(exception));
  assert_eq!(message_of(&mut env, exception), "kept");
}

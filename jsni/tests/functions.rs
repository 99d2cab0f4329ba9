use jsni::{CallbackInfo, CallbackKind, Env, EnvOptions, ErrorCode, FatalMode, Value, VmError};

fn new_env() -> Env {
  Env::new(EnvOptions {
    fatal_mode: FatalMode::Panic,
    ..EnvOptions::default()
  })
  .unwrap()
}

fn return_first_arg(env: &mut Env, info: &CallbackInfo) {
  assert_eq!(info.kind(), CallbackKind::Function);
  info.set_return_value(env, info.arg(0));
}

fn return_this(env: &mut Env, info: &CallbackInfo) {
  info.set_return_value(env, info.this());
}

fn count_args(env: &mut Env, info: &CallbackInfo) {
  assert!(info.arg(info.arg_count()).is_empty());
  let count = env.new_number(info.arg_count() as f64);
  info.set_return_value(env, count);
}

#[test]
fn call_function_passes_arguments_and_returns_the_result() {
  let mut env = new_env();
  let func = env.new_function(return_first_arg);
  let undefined = env.new_undefined();
  let arg = env.new_number(200.0);

  let result = env.call_function(func, undefined, &[arg]);
  assert_eq!(env.to_f64(result), 200.0);

  // Missing arguments read as empty, so nothing is returned.
  let result = env.call_function(func, undefined, &[]);
  assert!(env.is_undefined(result));
}

#[test]
fn callbacks_see_their_receiver() {
  let mut env = new_env();
  let func = env.new_function(return_this);
  let receiver = env.new_object();
  let result = env.call_function(func, receiver, &[]);
  assert!(env.strict_equals(result, receiver));
}

#[test]
fn arg_count_is_the_call_arity() -> Result<(), VmError> {
  let mut env = new_env();
  let func = env.new_function(count_args);
  let func = env.resolve(func).unwrap();
  let args = [Value::Null, Value::Bool(true), Value::Number(1.0)];
  assert_eq!(env.call(func, Value::Undefined, &args)?, Value::Number(3.0));
  assert_eq!(env.call(func, Value::Undefined, &[])?, Value::Number(0.0));
  Ok(())
}

#[test]
fn calling_a_non_function_records_function_expected() {
  let mut env = new_env();
  let not_a_function = env.new_object();
  let undefined = env.new_undefined();
  let result = env.call_function(not_a_function, undefined, &[]);
  assert!(result.is_empty());
  assert_eq!(env.get_last_error_info().code, ErrorCode::FunctionExpected);

  let value = env.resolve(not_a_function).unwrap();
  assert!(matches!(
    env.call(value, Value::Undefined, &[]),
    Err(VmError::NotCallable)
  ));
}

fn construct_point(env: &mut Env, info: &CallbackInfo) {
  let new_target = info.new_target(env);
  let constructed = !env.is_undefined(new_target);
  let flag = env.new_boolean(constructed);
  env.set_property(info.this(), "constructed", flag);
  env.set_property(info.this(), "x", info.arg(0));
}

#[test]
fn new_instance_constructs_through_the_prototype() {
  let mut env = new_env();
  let ctor = env.new_function(construct_point);
  let x = env.new_number(4.0);

  let point = env.new_instance(ctor, &[x]);
  assert!(env.is_object(point));
  assert!(env.instance_of(point, ctor));
  let constructed = env.get_property(point, "constructed");
  assert!(env.to_bool(constructed));
  let got = env.get_property(point, "x");
  assert_eq!(env.to_f64(got), 4.0);

  // The same callback invoked as a plain function sees no `new.target`.
  let receiver = env.new_object();
  env.call_function(ctor, receiver, &[x]);
  let constructed = env.get_property(receiver, "constructed");
  assert!(!env.to_bool(constructed));
  assert!(!env.instance_of(receiver, ctor));
}

fn construct_replacement(env: &mut Env, info: &CallbackInfo) {
  let replacement = env.new_object();
  let marker = env.new_boolean(true);
  env.set_property(replacement, "replacement", marker);
  info.set_return_value(env, replacement);
}

#[test]
fn constructor_returning_an_object_overrides_the_instance() {
  let mut env = new_env();
  let ctor = env.new_function(construct_replacement);
  let instance = env.new_instance(ctor, &[]);
  let marker = env.get_property(instance, "replacement");
  assert!(env.to_bool(marker));
  assert!(!env.instance_of(instance, ctor));
}

#[test]
fn instance_of_requires_a_function() {
  let mut env = new_env();
  let obj = env.new_object();
  let other = env.new_object();
  assert!(!env.instance_of(obj, other));
  assert_eq!(env.get_last_error_info().code, ErrorCode::FunctionExpected);
}

#[test]
fn register_method_exports_a_named_function() -> Result<(), VmError> {
  let mut env = new_env();
  let exports = env.new_object();
  assert!(env.register_method(exports, "echo", return_first_arg));

  let exports = env.resolve(exports).unwrap();
  let echo = env.get(exports, "echo")?;
  let name = env.get(echo, "name")?;
  assert_eq!(env.string_contents(name).as_deref(), Some("echo"));
  assert_eq!(
    env.call(echo, exports, &[Value::Number(1.5)])?,
    Value::Number(1.5)
  );

  let number = env.new_number(1.0);
  assert!(!env.register_method(number, "echo", return_first_arg));
  assert_eq!(env.get_last_error_info().code, ErrorCode::ObjectExpected);
  Ok(())
}

fn recurse(env: &mut Env, info: &CallbackInfo) {
  let result = env.call_function(info.this(), info.this(), &[]);
  if !result.is_empty() {
    info.set_return_value(env, result);
  }
}

#[test]
fn deep_recursion_throws_a_range_error() {
  let mut env = Env::new(EnvOptions {
    max_call_depth: 16,
    fatal_mode: FatalMode::Panic,
    ..EnvOptions::default()
  })
  .unwrap();
  let func = env.new_function(recurse);
  let func = env.resolve(func).unwrap();

  let Err(VmError::Throw(exception)) = env.call(func, func, &[]) else {
    panic!("expected the call to throw");
  };
  let message = env.get_own_data_property(exception, "message").unwrap();
  assert_eq!(
    env.string_contents(message).as_deref(),
    Some("Maximum call stack size exceeded")
  );
  let name = env.get(exception, "name").unwrap();
  assert_eq!(env.string_contents(name).as_deref(), Some("RangeError"));
  assert!(!env.has_exception());
}

fn new_target_in_getter(env: &mut Env, info: &CallbackInfo) {
  info.new_target(env);
}

#[test]
#[should_panic(expected = "JSNI fatal error in CallbackInfo::new_target")]
fn new_target_outside_a_function_callback_is_fatal() {
  let mut env = new_env();
  let obj = env.new_object();
  env.define_property(
    obj,
    "x",
    jsni::PropertyDescriptor::accessor(
      Some(new_target_in_getter),
      None,
      jsni::PropertyAttributes::NONE,
      None,
    ),
  );
  env.get_property(obj, "x");
}

fn data_in_function(env: &mut Env, info: &CallbackInfo) {
  info.data(env);
}

#[test]
#[should_panic(expected = "JSNI fatal error in CallbackInfo::data")]
fn data_in_a_function_callback_is_fatal() {
  let mut env = new_env();
  let func = env.new_function(data_in_function);
  let undefined = env.new_undefined();
  env.call_function(func, undefined, &[]);
}

use jsni::{CallbackInfo, Env, EnvOptions, ErrorCode, FatalMode, Handle, Value, VmError};

fn new_env() -> Env {
  Env::new(EnvOptions {
    fatal_mode: FatalMode::Panic,
    ..EnvOptions::default()
  })
  .unwrap()
}

#[test]
fn popping_a_scope_releases_every_handle_created_in_it() {
  let mut env = new_env();
  let before = env.handle_count();

  env.push_local_scope();
  for i in 0..16 {
    env.new_number(i as f64);
  }
  assert_eq!(env.handle_count(), before + 16);
  env.pop_local_scope();

  assert_eq!(env.handle_count(), before);
  assert_eq!(env.scope_depth(), 0);
  assert!(env.get_last_error_info().code.is_ok());
}

#[test]
fn nested_scopes_unwind_in_lifo_order() {
  let mut env = new_env();
  let base = env.handle_count();

  env.push_local_scope();
  env.new_object();
  let outer = env.handle_count();

  env.push_local_scope();
  env.new_object();
  env.new_object();
  assert_eq!(env.scope_depth(), 2);
  env.pop_local_scope();
  assert_eq!(env.handle_count(), outer);

  env.pop_local_scope();
  assert_eq!(env.handle_count(), base);
}

#[test]
fn handles_from_a_popped_scope_resolve_as_empty() {
  let mut env = new_env();
  env.push_local_scope();
  let stale = env.new_number(1.0);
  env.pop_local_scope();

  assert_eq!(env.resolve(stale), None);
  // The slot is reused by the next handle, which must not be reachable through the stale one.
  let fresh = env.new_number(2.0);
  assert_eq!(env.resolve(stale), None);
  assert_eq!(env.resolve(fresh), Some(Value::Number(2.0)));

  assert!(env.to_f64(stale).is_nan());
  assert_eq!(env.get_last_error_info().code, ErrorCode::NumberExpected);
}

#[test]
fn escapable_scope_promotes_exactly_one_handle() {
  let mut env = new_env();
  let before = env.handle_count();

  env.push_escapable_local_scope();
  let kept = env.new_number(200.0);
  for _ in 0..8 {
    env.new_object();
  }
  let escaped = env.pop_escapable_local_scope(kept);

  assert_eq!(env.handle_count(), before + 1);
  assert_eq!(env.to_f64(escaped), 200.0);
}

#[test]
fn escaping_the_empty_handle_returns_empty() {
  let mut env = new_env();
  let before = env.handle_count();
  env.push_escapable_local_scope();
  env.new_object();
  let escaped = env.pop_escapable_local_scope(Handle::EMPTY);
  assert!(escaped.is_empty());
  assert_eq!(env.handle_count(), before);
}

fn make_escaped_object(env: &mut Env, info: &CallbackInfo) {
  env.push_escapable_local_scope();
  let obj = env.new_object();
  let value = env.new_number(200.0);
  assert!(env.set_property(obj, "value", value));
  for _ in 0..32 {
    env.new_object();
  }
  let escaped = env.pop_escapable_local_scope(obj);
  env.collect_garbage();
  info.set_return_value(env, escaped);
}

#[test]
fn escaped_value_survives_a_forced_collection() -> Result<(), VmError> {
  let mut env = new_env();
  let func = env.new_function(make_escaped_object);
  let func = env.resolve(func).unwrap();

  let result = env.call(func, Value::Undefined, &[])?;
  let root = env.new_handle(result);
  env.collect_garbage();

  assert_eq!(env.get(result, "value")?, Value::Number(200.0));
  assert!(env.is_object(root));
  Ok(())
}

fn make_escaped_number(env: &mut Env, info: &CallbackInfo) {
  env.push_escapable_local_scope();
  let value = env.new_number(200.0);
  for _ in 0..32 {
    env.new_object();
  }
  let escaped = env.pop_escapable_local_scope(value);
  env.collect_garbage();
  assert!(env.is_number(escaped));
  assert_eq!(env.to_f64(escaped), 200.0);
  info.set_return_value(env, escaped);
}

#[test]
fn escaped_number_survives_a_forced_collection() -> Result<(), VmError> {
  let mut env = new_env();
  let func = env.new_function(make_escaped_number);
  let func = env.resolve(func).unwrap();

  let result = env.call(func, Value::Undefined, &[])?;
  assert_eq!(result, Value::Number(200.0));
  Ok(())
}

#[test]
fn popping_with_no_scope_reports_underflow() {
  let mut env = new_env();
  env.pop_local_scope();
  assert_eq!(env.get_last_error_info().code, ErrorCode::ScopeUnderflow);
  assert_eq!(env.get_last_error_info().code, ErrorCode::Ok);

  let value = env.new_number(1.0);
  let escaped = env.pop_escapable_local_scope(value);
  assert!(escaped.is_empty());
  assert_eq!(
    env.get_last_error_info().message,
    "LocalScope is out of range"
  );
}

fn pop_enclosing_scope(env: &mut Env, _info: &CallbackInfo) {
  env.pop_local_scope();
}

#[test]
fn a_callback_cannot_pop_its_callers_scope() -> Result<(), VmError> {
  let mut env = new_env();
  let func = env.new_function(pop_enclosing_scope);
  let func = env.resolve(func).unwrap();

  env.push_local_scope();
  env.call(func, Value::Undefined, &[])?;
  assert_eq!(env.get_last_error_info().code, ErrorCode::ScopeUnderflow);
  assert_eq!(env.scope_depth(), 1);
  env.pop_local_scope();
  assert!(env.get_last_error_info().code.is_ok());
  Ok(())
}

fn leave_scopes_open(env: &mut Env, _info: &CallbackInfo) {
  env.push_local_scope();
  env.new_object();
  env.push_escapable_local_scope();
  env.new_object();
}

#[test]
fn scopes_left_open_by_a_callback_are_unwound() -> Result<(), VmError> {
  let mut env = new_env();
  let func = env.new_function(leave_scopes_open);
  let func = env.resolve(func).unwrap();
  let handles = env.handle_count();

  env.call(func, Value::Undefined, &[])?;
  assert_eq!(env.scope_depth(), 0);
  assert_eq!(env.handle_count(), handles);
  Ok(())
}

#[test]
fn plain_pop_discards_an_escapable_scope() {
  let mut env = new_env();
  let before = env.handle_count();
  env.push_escapable_local_scope();
  env.new_number(1.0);
  env.pop_local_scope();
  assert_eq!(env.handle_count(), before);
  assert!(env.get_last_error_info().code.is_ok());
}

#[test]
#[should_panic(expected = "JSNI fatal error in Env::pop_escapable_local_scope")]
fn escapable_pop_of_a_plain_scope_is_fatal() {
  let mut env = new_env();
  env.push_local_scope();
  let value = env.new_number(1.0);
  env.pop_escapable_local_scope(value);
}

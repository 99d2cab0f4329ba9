use jsni::{
  CallbackInfo, Env, EnvOptions, FatalMode, Handle, LoadError, Value, VmError, JSNI_VERSION_1_1,
  JSNI_VERSION_2_0, JSNI_VERSION_2_1,
};
use std::cell::Cell;

thread_local! {
  static INIT_RUNS: Cell<u32> = const { Cell::new(0) };
}

fn new_env() -> Env {
  Env::new(EnvOptions {
    fatal_mode: FatalMode::Panic,
    ..EnvOptions::default()
  })
  .unwrap()
}

fn hello(env: &mut Env, info: &CallbackInfo) {
  let greeting = env.new_string_from_utf8(b"hello from native");
  info.set_return_value(env, greeting);
}

fn init_hello(env: &mut Env, exports: Handle) -> i32 {
  INIT_RUNS.with(|runs| runs.set(runs.get() + 1));
  assert!(env.register_method(exports, "hello", hello));
  let version = env.new_number(f64::from(env.get_version()));
  env.set_property(exports, "version", version);
  JSNI_VERSION_2_1
}

fn init_old(env: &mut Env, exports: Handle) -> i32 {
  env.register_method(exports, "hello", hello);
  JSNI_VERSION_1_1
}

fn init_throws(env: &mut Env, _exports: Handle) -> i32 {
  env.throw_error("init failed");
  JSNI_VERSION_2_0
}

#[test]
fn loaded_module_exports_its_methods() -> Result<(), VmError> {
  let mut env = new_env();
  let exports = env.load_module("hello.node", Some(init_hello)).unwrap();

  let hello = env.get(exports, "hello")?;
  let greeting = env.call(hello, exports, &[])?;
  assert_eq!(
    env.string_contents(greeting).as_deref(),
    Some("hello from native")
  );
  assert_eq!(
    env.get(exports, "version")?,
    Value::Number(f64::from(JSNI_VERSION_2_1))
  );
  Ok(())
}

#[test]
fn modules_are_initialized_once_and_stay_rooted() {
  let mut env = new_env();
  let before = INIT_RUNS.with(Cell::get);
  let first = env.load_module("cached.node", Some(init_hello)).unwrap();
  env.collect_garbage();
  let second = env.load_module("cached.node", Some(init_hello)).unwrap();

  assert_eq!(first, second);
  assert!(env.heap().is_valid_value(first));
  assert_eq!(INIT_RUNS.with(Cell::get), before + 1);
}

#[test]
fn module_without_entry_point_is_rejected() {
  let mut env = new_env();
  let err = env.load_module("empty.node", None).unwrap_err();
  assert!(matches!(err, LoadError::MissingEntryPoint { .. }));
  assert_eq!(
    err.to_string(),
    "empty.node: Native module has no declared entry point: JSNIInit"
  );
}

#[test]
fn old_module_versions_are_rejected() {
  let mut env = new_env();
  let err = env.load_module("old.node", Some(init_old)).unwrap_err();
  assert_eq!(
    err.to_string(),
    "old.node: Native module version mismatch. Expected >= JSNI_VERSION_2_0, got JSNI_VERSION_1_1."
  );

  // A rejected module is not cached, and its exports are not kept alive.
  env.collect_garbage();
  assert!(env.load_module("old.node", None).is_err());
}

#[test]
fn exception_during_init_fails_the_load() {
  let mut env = new_env();
  let err = env.load_module("throws.node", Some(init_throws)).unwrap_err();
  let LoadError::Init {
    source: VmError::Throw(exception),
    ..
  } = &err
  else {
    panic!("expected an init failure, got {err:?}");
  };
  let message = env.get(*exception, "message").unwrap();
  assert_eq!(env.string_contents(message).as_deref(), Some("init failed"));
  assert!(!env.has_exception());
}

#[test]
fn init_handles_are_released_after_loading() {
  let mut env = new_env();
  let handles = env.handle_count();
  env.load_module("scoped.node", Some(init_hello)).unwrap();
  assert_eq!(env.handle_count(), handles);
}

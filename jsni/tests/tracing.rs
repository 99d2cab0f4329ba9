use jsni::{CallbackInfo, Env, EnvOptions, FatalMode, Handle, Value, JSNI_VERSION_2_1};
use std::io;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::format::FmtSpan;

/// Collects formatted log output in memory; each writer handed to the subscriber is a clone.
#[derive(Clone, Default)]
struct Capture(Arc<Mutex<Vec<u8>>>);

impl Capture {
  fn text(&self) -> String {
    String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
  }
}

impl io::Write for Capture {
  fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
    self.0.lock().unwrap().extend_from_slice(buf);
    Ok(buf.len())
  }

  fn flush(&mut self) -> io::Result<()> {
    Ok(())
  }
}

fn noop(_env: &mut Env, _info: &CallbackInfo) {}

fn init(env: &mut Env, exports: Handle) -> i32 {
  env.register_method(exports, "noop", noop);
  JSNI_VERSION_2_1
}

#[test]
fn native_calls_and_collections_are_traced() {
  let capture = Capture::default();
  let sink = capture.clone();
  let subscriber = tracing_subscriber::fmt()
    .with_span_events(FmtSpan::CLOSE)
    .with_max_level(tracing::Level::DEBUG)
    .with_ansi(false)
    .with_writer(move || sink.clone())
    .finish();
  let guard = tracing::subscriber::set_default(subscriber);

  let mut env = Env::new(EnvOptions {
    fatal_mode: FatalMode::Panic,
    ..EnvOptions::default()
  })
  .unwrap();
  let exports = env.load_module("traced.node", Some(init)).unwrap();
  let noop = env.get(exports, "noop").unwrap();
  env.call(noop, Value::Undefined, &[]).unwrap();
  env.collect_garbage();
  env.pop_local_scope();

  drop(guard);
  let output = capture.text();
  assert!(
    output.contains("jsni.callback"),
    "expected callback span output, got: {output}"
  );
  assert!(
    output.contains("native module loaded"),
    "expected module load event"
  );
  assert!(output.contains("heap collected"), "expected gc event");
  assert!(
    output.contains("local scope popped more times than it was pushed"),
    "expected scope underflow warning"
  );
}

use crate::module::Version;
use crate::value::Value;
use std::backtrace::Backtrace;
use std::fmt::Display;

/// Errors produced by the engine model and surfaced to the host.
#[derive(Debug, Clone, thiserror::Error)]
pub enum VmError {
  /// The heap has exceeded its configured memory limit.
  #[error("out of memory")]
  OutOfMemory,

  /// A GC handle was used after the underlying allocation was freed (or the handle is otherwise
  /// malformed).
  #[error("invalid handle")]
  InvalidHandle,

  /// Attempted to call a non-callable value.
  #[error("value is not callable")]
  NotCallable,

  /// Attempted to read a property of a non-object value.
  #[error("value is not an object")]
  NotObject,

  /// The provided property descriptor is invalid.
  #[error("invalid property descriptor: exactly one of data or accessor must be set")]
  InvalidPropertyDescriptor,

  /// A JavaScript `throw` value. This is catchable from JS.
  #[error("uncaught exception")]
  Throw(Value),
}

/// Advisory error codes reported through [`Env::get_last_error_info`](crate::Env::get_last_error_info).
///
/// These never interrupt execution: an operation that detects a type mismatch records the code
/// and returns a sentinel (NaN, `false`, `0` or an empty/undefined handle).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum ErrorCode {
  #[default]
  Ok = 0,
  BooleanExpected = 1,
  NumberExpected = 2,
  FunctionExpected = 3,
  ArrayExpected = 4,
  StringExpected = 5,
  ObjectExpected = 6,
  /// More scope pops than pushes within the current native call.
  ScopeUnderflow = 7,
}

impl ErrorCode {
  pub fn message(self) -> &'static str {
    match self {
      ErrorCode::Ok => "OK",
      ErrorCode::BooleanExpected => "A Boolean value is expected",
      ErrorCode::NumberExpected => "A Number value is expected",
      ErrorCode::FunctionExpected => "A Function value is expected",
      ErrorCode::ArrayExpected => "An Array value is expected",
      ErrorCode::StringExpected => "A String value is expected",
      ErrorCode::ObjectExpected => "An Object value is expected",
      ErrorCode::ScopeUnderflow => "LocalScope is out of range",
    }
  }

  #[inline]
  pub fn is_ok(self) -> bool {
    self == ErrorCode::Ok
  }
}

impl Display for ErrorCode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.message())
  }
}

/// Snapshot of the advisory error channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ErrorInfo {
  pub code: ErrorCode,
  pub message: &'static str,
}

impl From<ErrorCode> for ErrorInfo {
  fn from(code: ErrorCode) -> Self {
    Self {
      code,
      message: code.message(),
    }
  }
}

/// Errors produced while loading a native module.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LoadError {
  #[error("{module}: Native module has no declared entry point: JSNIInit")]
  MissingEntryPoint { module: String },

  #[error("{module}: Native module version mismatch. Expected >= JSNI_VERSION_2_0, got {got}.")]
  VersionMismatch { module: String, got: Version },

  #[error("{module}: native module initialization failed")]
  Init {
    module: String,
    #[source]
    source: VmError,
  },
}

/// How fatal internal consistency violations terminate.
///
/// Fatal conditions (scope-type mismatch, a return value set from a setter, callback data read
/// from a function callback, a descriptor that is both data and accessor) are never recoverable.
/// `Panic` exists so that test harnesses can observe them with `#[should_panic]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FatalMode {
  #[default]
  Abort,
  Panic,
}

#[cold]
pub(crate) fn fatal_error(mode: FatalMode, location: &str, message: &str) -> ! {
  let backtrace = Backtrace::capture();
  tracing::error!(location, reason = message, %backtrace, "JSNI fatal error");
  match mode {
    FatalMode::Abort => {
      eprintln!("\n#\n# JSNI fatal error in {location}\n# {message}\n#\n");
      std::process::abort()
    }
    FatalMode::Panic => panic!("JSNI fatal error in {location}: {message}"),
  }
}

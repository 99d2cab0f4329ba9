use crate::error::LoadError;
use crate::heap::{JsObject, ObjectKind};
use crate::{Env, Handle, RootId, Value, VmError};
use std::fmt;

pub const JSNI_VERSION_1_0: i32 = 0x0001_0000;
pub const JSNI_VERSION_1_1: i32 = 0x0001_0001;
pub const JSNI_VERSION_2_0: i32 = 0x0002_0000;
pub const JSNI_VERSION_2_1: i32 = 0x0002_0001;
pub const JSNI_VERSION_2_2: i32 = 0x0002_0002;
pub const JSNI_VERSION_2_3: i32 = 0x0002_0003;

/// A version tag as returned by a module entry point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(pub i32);

impl fmt::Display for Version {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self.0 {
      JSNI_VERSION_1_0 => "JSNI_VERSION_1_0",
      JSNI_VERSION_1_1 => "JSNI_VERSION_1_1",
      JSNI_VERSION_2_0 => "JSNI_VERSION_2_0",
      JSNI_VERSION_2_1 => "JSNI_VERSION_2_1",
      JSNI_VERSION_2_2 => "JSNI_VERSION_2_2",
      JSNI_VERSION_2_3 => "JSNI_VERSION_2_3",
      _ => return write!(f, "UNKNOWN VERSION ({:#010x})", self.0),
    };
    f.write_str(name)
  }
}

/// A native module's entry point.
///
/// Called once per environment with a fresh `exports` object; the module registers its functions
/// on it and returns the interface version it was written against.
pub type ModuleInitFn = fn(&mut Env, Handle) -> i32;

pub(crate) struct ModuleRecord {
  exports: RootId,
}

impl Env {
  /// The interface version this bridge implements.
  pub fn get_version(&self) -> i32 {
    JSNI_VERSION_2_1
  }

  /// Loads a native module, returning its exports object.
  ///
  /// `init` is `None` when the module declares no entry point. A module is initialized at most
  /// once per environment: later loads under the same name return the cached exports, which stay
  /// rooted for the lifetime of the environment.
  pub fn load_module(&mut self, name: &str, init: Option<ModuleInitFn>) -> Result<Value, LoadError> {
    if let Some(exports) = self
      .modules
      .get(name)
      .and_then(|record| self.heap.get_root(record.exports))
    {
      tracing::debug!(module = name, "native module already loaded");
      return Ok(exports);
    }
    let Some(init) = init else {
      return Err(LoadError::MissingEntryPoint {
        module: name.to_string(),
      });
    };

    let span = tracing::debug_span!("jsni.load_module", module = name);
    let _entered = span.enter();

    let obj = JsObject::new(Some(self.intrinsics.object_prototype), ObjectKind::Ordinary);
    let exports = self
      .heap
      .alloc_object(obj)
      .map_err(|source| LoadError::Init {
        module: name.to_string(),
        source,
      })?;
    let root = self.heap.add_root(Value::Object(exports));

    let outer_exception = self.pending_exception.take();
    self.saved_exceptions.push(outer_exception);
    let version = self.with_native_frame(|env| {
      let exports = env.arena.push(Value::Object(exports));
      init(env, exports)
    });
    let thrown = self.pending_exception.take();
    self.pending_exception = self.saved_exceptions.pop().flatten();

    if let Some(exception) = thrown {
      self.heap.remove_root(root);
      return Err(LoadError::Init {
        module: name.to_string(),
        source: VmError::Throw(exception),
      });
    }
    if version < JSNI_VERSION_2_0 {
      self.heap.remove_root(root);
      tracing::warn!(module = name, version = %Version(version), "native module version too old");
      return Err(LoadError::VersionMismatch {
        module: name.to_string(),
        got: Version(version),
      });
    }

    self
      .modules
      .insert(name.to_string(), ModuleRecord { exports: root });
    tracing::debug!(module = name, version = %Version(version), "native module loaded");
    Ok(Value::Object(exports))
  }
}

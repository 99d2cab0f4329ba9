use crate::error::ErrorCode;
use crate::heap::{JsObject, ObjectKind};
use crate::{Env, GcObject, Handle, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// A byte buffer owned jointly by the host and the typed arrays that view it.
///
/// The buffer is never copied into the heap and is not counted against [`HeapLimits`]; it lives as
/// long as any `Rc` to it does, independently of collection.
///
/// [`HeapLimits`]: crate::HeapLimits
pub type SharedBuffer = Rc<RefCell<Vec<u8>>>;

/// Element kind of a typed array. Only [`TypedArrayType::Uint8`] can currently be created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TypedArrayType {
  /// Not a typed array, or an unsupported element kind.
  #[default]
  None,
  Int8,
  Uint8,
  Uint8Clamped,
  Int16,
  Uint16,
  Int32,
  Uint32,
  Float32,
  Float64,
}

pub(crate) struct TypedArrayStorage {
  kind: TypedArrayType,
  buffer: SharedBuffer,
  /// Element count when the buffer was wrapped. Read without borrowing the buffer, which native
  /// code may be holding mutably.
  len: usize,
}

impl fmt::Debug for TypedArrayStorage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("TypedArrayStorage")
      .field("kind", &self.kind)
      .field("len", &self.len)
      .finish()
  }
}

impl Env {
  /// Wraps `buffer` in a typed array without copying it.
  ///
  /// The view covers the buffer's length at this point; later resizes of the `Vec` do not change
  /// [`Env::typed_array_length`]. Returns an empty handle for element kinds other than `Uint8`, and
  /// for a buffer that is currently borrowed mutably.
  pub fn new_typed_array(&mut self, kind: TypedArrayType, buffer: SharedBuffer) -> Handle {
    self.clear_error_code();
    if kind != TypedArrayType::Uint8 {
      tracing::warn!(?kind, "unsupported typed array element kind");
      return Handle::EMPTY;
    }
    let Ok(len) = buffer.try_borrow().map(|bytes| bytes.len()) else {
      tracing::warn!("typed array buffer is mutably borrowed");
      return Handle::EMPTY;
    };
    let obj = JsObject::new(
      Some(self.intrinsics.object_prototype),
      ObjectKind::TypedArray(TypedArrayStorage { kind, buffer, len }),
    );
    let result = self.heap.alloc_object(obj);
    let obj = self.or_fatal("Env::new_typed_array", result);
    self.arena.push(Value::Object(obj))
  }

  pub fn is_typed_array(&mut self, value: Handle) -> bool {
    self.clear_error_code();
    self.typed_array_storage(value).is_some()
  }

  /// Element kind, or [`TypedArrayType::None`] (with [`ErrorCode::ArrayExpected`]) for anything
  /// that is not a typed array.
  pub fn typed_array_type(&mut self, value: Handle) -> TypedArrayType {
    self.clear_error_code();
    match self.expect_typed_array(value) {
      Some(obj) => self.storage_of(obj).map_or(TypedArrayType::None, |s| s.kind),
      None => TypedArrayType::None,
    }
  }

  /// The buffer behind a typed array. Writes through it are visible to every view.
  pub fn typed_array_data(&mut self, value: Handle) -> Option<SharedBuffer> {
    self.clear_error_code();
    let obj = self.expect_typed_array(value)?;
    self.storage_of(obj).map(|s| Rc::clone(&s.buffer))
  }

  /// Length in elements, as fixed by [`Env::new_typed_array`].
  pub fn typed_array_length(&mut self, value: Handle) -> usize {
    self.clear_error_code();
    match self.expect_typed_array(value) {
      Some(obj) => self.storage_of(obj).map_or(0, |s| s.len),
      None => 0,
    }
  }

  fn typed_array_storage(&self, value: Handle) -> Option<&TypedArrayStorage> {
    match self.resolve(value)? {
      Value::Object(obj) => self.storage_of(obj),
      _ => None,
    }
  }

  fn storage_of(&self, obj: GcObject) -> Option<&TypedArrayStorage> {
    match &self.heap.get_object(obj).ok()?.kind {
      ObjectKind::TypedArray(storage) => Some(storage),
      _ => None,
    }
  }

  fn expect_typed_array(&mut self, value: Handle) -> Option<GcObject> {
    match self.resolve(value) {
      Some(Value::Object(obj)) if self.storage_of(obj).is_some() => Some(obj),
      _ => {
        self.set_error_code(ErrorCode::ArrayExpected);
        None
      }
    }
  }
}

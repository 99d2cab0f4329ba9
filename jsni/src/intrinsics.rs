use crate::exception::ErrorKind;
use crate::heap::{JsObject, ObjectKind};
use crate::property::{PropertyAttributes, PropertyEntry};
use crate::string::JsString;
use crate::{GcObject, Heap, Value, VmError};

/// The prototype objects every environment starts with.
///
/// These are persistent roots so that nothing a native module does to its own objects can let the
/// collector reclaim them.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Intrinsics {
  pub object_prototype: GcObject,
  pub function_prototype: GcObject,
  pub array_prototype: GcObject,
  pub error_prototype: GcObject,
  pub type_error_prototype: GcObject,
  pub range_error_prototype: GcObject,
}

impl Intrinsics {
  pub(crate) fn new(heap: &mut Heap) -> Result<Self, VmError> {
    let alloc = |heap: &mut Heap, obj: JsObject| -> Result<GcObject, VmError> {
      let obj = heap.alloc_object(obj)?;
      heap.add_root(Value::Object(obj));
      Ok(obj)
    };

    let object_prototype = alloc(heap, JsObject::new(None, ObjectKind::Ordinary))?;
    let function_prototype = alloc(
      heap,
      JsObject::new(Some(object_prototype), ObjectKind::Ordinary),
    )?;
    let array_prototype = alloc(
      heap,
      JsObject::new(Some(object_prototype), ObjectKind::Ordinary),
    )?;
    let obj = error_prototype_object(heap, "Error", Some(object_prototype))?;
    let error_prototype = alloc(heap, obj)?;
    let obj = error_prototype_object(heap, "TypeError", Some(error_prototype))?;
    let type_error_prototype = alloc(heap, obj)?;
    let obj = error_prototype_object(heap, "RangeError", Some(error_prototype))?;
    let range_error_prototype = alloc(heap, obj)?;

    Ok(Self {
      object_prototype,
      function_prototype,
      array_prototype,
      error_prototype,
      type_error_prototype,
      range_error_prototype,
    })
  }

  pub(crate) fn error_prototype_for(&self, kind: ErrorKind) -> GcObject {
    match kind {
      ErrorKind::Error => self.error_prototype,
      ErrorKind::TypeError => self.type_error_prototype,
      ErrorKind::RangeError => self.range_error_prototype,
    }
  }
}

fn error_prototype_object(
  heap: &mut Heap,
  name: &str,
  prototype: Option<GcObject>,
) -> Result<JsObject, VmError> {
  let name = heap.alloc_string(JsString::from_rust_str(name))?;
  let mut obj = JsObject::new(prototype, ObjectKind::Ordinary);
  obj.properties.push(PropertyEntry::data(
    "name",
    PropertyAttributes::DONT_ENUM,
    Value::String(name),
  ));
  Ok(obj)
}

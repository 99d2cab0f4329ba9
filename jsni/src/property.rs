use crate::callback::{ExternalData, NativeCallback};
use crate::heap::{Marker, Trace};
use crate::string::JsString;
use crate::{Handle, Value, VmError};
use bitflags::bitflags;
use std::fmt;

bitflags! {
  /// Property attribute flags. The empty set is a writable, enumerable, deletable property.
  #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
  pub struct PropertyAttributes: u8 {
    const READ_ONLY = 0b001;
    const DONT_ENUM = 0b010;
    const DONT_DELETE = 0b100;
  }
}

impl PropertyAttributes {
  pub const NONE: Self = Self::empty();
}

/// Describes a data property: a value plus attributes.
#[derive(Clone, Copy, Debug)]
pub struct DataPropertyDescriptor {
  pub value: Handle,
  pub attributes: PropertyAttributes,
}

/// Describes an accessor property backed by native callbacks.
///
/// `data` is handed to both callbacks through [`CallbackInfo::data`](crate::CallbackInfo::data).
#[derive(Clone)]
pub struct AccessorPropertyDescriptor {
  pub getter: Option<NativeCallback>,
  pub setter: Option<NativeCallback>,
  pub attributes: PropertyAttributes,
  pub data: Option<ExternalData>,
}

impl fmt::Debug for AccessorPropertyDescriptor {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AccessorPropertyDescriptor")
      .field("getter", &self.getter.is_some())
      .field("setter", &self.setter.is_some())
      .field("attributes", &self.attributes)
      .field("data", &self.data.is_some())
      .finish()
  }
}

/// A property descriptor passed to [`Env::define_property`](crate::Env::define_property).
///
/// Exactly one of `data` or `accessor` must be set.
#[derive(Clone, Debug, Default)]
pub struct PropertyDescriptor {
  pub data: Option<DataPropertyDescriptor>,
  pub accessor: Option<AccessorPropertyDescriptor>,
}

impl PropertyDescriptor {
  pub fn data(value: Handle, attributes: PropertyAttributes) -> Self {
    Self {
      data: Some(DataPropertyDescriptor { value, attributes }),
      accessor: None,
    }
  }

  pub fn accessor(
    getter: Option<NativeCallback>,
    setter: Option<NativeCallback>,
    attributes: PropertyAttributes,
    data: Option<ExternalData>,
  ) -> Self {
    Self {
      data: None,
      accessor: Some(AccessorPropertyDescriptor {
        getter,
        setter,
        attributes,
        data,
      }),
    }
  }

  /// Validates that this descriptor is either a data descriptor or an accessor descriptor.
  pub fn validate(&self) -> Result<(), VmError> {
    match (&self.data, &self.accessor) {
      (Some(_), None) | (None, Some(_)) => Ok(()),
      _ => Err(VmError::InvalidPropertyDescriptor),
    }
  }
}

/// Native accessor pair stored on an object.
#[derive(Clone)]
pub(crate) struct NativeAccessor {
  pub getter: Option<NativeCallback>,
  pub setter: Option<NativeCallback>,
  pub data: Option<ExternalData>,
}

#[derive(Clone)]
pub(crate) enum PropertyKind {
  Data(Value),
  Accessor(NativeAccessor),
}

impl Trace for PropertyKind {
  fn trace(&self, marker: &mut Marker<'_>) {
    match self {
      PropertyKind::Data(value) => marker.visit_value(*value),
      // Accessors hold only native callbacks and host data.
      PropertyKind::Accessor(_) => {}
    }
  }
}

#[derive(Clone)]
pub(crate) struct PropertyEntry {
  pub key: JsString,
  pub attributes: PropertyAttributes,
  pub kind: PropertyKind,
}

impl PropertyEntry {
  pub(crate) fn data(key: &str, attributes: PropertyAttributes, value: Value) -> Self {
    Self {
      key: JsString::from_rust_str(key),
      attributes,
      kind: PropertyKind::Data(value),
    }
  }
}

impl fmt::Debug for PropertyEntry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let kind = match &self.kind {
      PropertyKind::Data(value) => format!("Data({value:?})"),
      PropertyKind::Accessor(_) => "Accessor".to_string(),
    };
    f.debug_struct("PropertyEntry")
      .field("key", &self.key)
      .field("attributes", &self.attributes)
      .field("kind", &kind)
      .finish()
  }
}

impl Trace for PropertyEntry {
  fn trace(&self, marker: &mut Marker<'_>) {
    self.kind.trace(marker);
  }
}

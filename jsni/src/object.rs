use crate::callback::{CallbackKind, ExternalData, Invocation};
use crate::error::fatal_error;
use crate::heap::{JsObject, ObjectKind, MAX_PROTOTYPE_CHAIN};
use crate::property::{
  NativeAccessor, PropertyAttributes, PropertyDescriptor, PropertyEntry, PropertyKind,
};
use crate::string::JsString;
use crate::{Env, GcObject, Handle, Value, VmError};

impl Env {
  /// `[[Get]]`: looks `name` up along the prototype chain, running a native getter with
  /// `receiver` as `this` if that is what it finds.
  pub(crate) fn object_get(
    &mut self,
    obj: GcObject,
    receiver: Value,
    name: &str,
  ) -> Result<Value, VmError> {
    let found = self.heap.find_in_chain(obj, |o| {
      if let (ObjectKind::Array(elements), "length") = (&o.kind, name) {
        return Some(PropertyKind::Data(Value::Number(elements.len() as f64)));
      }
      o.own_property(name).map(|prop| prop.kind.clone())
    })?;
    match found {
      None => Ok(Value::Undefined),
      Some(PropertyKind::Data(value)) => Ok(value),
      Some(PropertyKind::Accessor(NativeAccessor { getter, data, .. })) => match getter {
        Some(callback) => self.invoke_native(Invocation {
          callback,
          kind: CallbackKind::Getter,
          this: receiver,
          args: &[],
          new_target: Value::Undefined,
          data,
        }),
        None => Ok(Value::Undefined),
      },
    }
  }

  /// `[[Set]]`: runs a native setter found along the chain, refuses to shadow a read-only data
  /// property, and otherwise creates or updates an own data property.
  pub(crate) fn object_set(
    &mut self,
    obj: GcObject,
    receiver: Value,
    name: &str,
    value: Value,
  ) -> Result<bool, VmError> {
    let found = self.heap.find_in_chain(obj, |o| {
      o.own_property(name)
        .map(|prop| (prop.attributes, prop.kind.clone()))
    })?;
    match found {
      Some((_, PropertyKind::Accessor(NativeAccessor { setter, data, .. }))) => {
        let Some(callback) = setter else {
          return Ok(false);
        };
        self.invoke_native(Invocation {
          callback,
          kind: CallbackKind::Setter,
          this: receiver,
          args: &[value],
          new_target: Value::Undefined,
          data,
        })?;
        Ok(true)
      }
      Some((attributes, PropertyKind::Data(_)))
        if attributes.contains(PropertyAttributes::READ_ONLY) =>
      {
        Ok(false)
      }
      _ => {
        self.heap.with_object_mut(obj, |o| match o.own_property_index(name) {
          Some(idx) => o.properties[idx].kind = PropertyKind::Data(value),
          None => o
            .properties
            .push(PropertyEntry::data(name, PropertyAttributes::NONE, value)),
        })?;
        Ok(true)
      }
    }
  }

  pub fn new_object(&mut self) -> Handle {
    self.clear_error_code();
    let obj = JsObject::new(Some(self.intrinsics.object_prototype), ObjectKind::Ordinary);
    let result = self.heap.alloc_object(obj);
    let obj = self.or_fatal("Env::new_object", result);
    self.arena.push(Value::Object(obj))
  }

  /// Returns `true` if `name` is an own or inherited property of `object`.
  pub fn has_property(&mut self, object: Handle, name: &str) -> bool {
    self.clear_error_code();
    let Some(obj) = self.expect_object(object) else {
      return false;
    };
    let result = self.heap.find_in_chain(obj, |o| {
      let is_length = matches!(o.kind, ObjectKind::Array(_)) && name == "length";
      (is_length || o.own_property(name).is_some()).then_some(())
    });
    self.or_fatal("Env::has_property", result).is_some()
  }

  /// Reads a property, running a native getter if there is one.
  ///
  /// Returns `undefined` for non-objects (recording `ObjectExpected`), and an empty handle if the
  /// getter threw.
  pub fn get_property(&mut self, object: Handle, name: &str) -> Handle {
    self.clear_error_code();
    let Some(obj) = self.expect_object(object) else {
      return self.arena.push(Value::Undefined);
    };
    let result = self.object_get(obj, Value::Object(obj), name);
    self.settle("Env::get_property", result)
  }

  /// Writes a property, running a native setter if there is one. Returns `false` if the write was
  /// rejected or the setter threw.
  pub fn set_property(&mut self, object: Handle, name: &str, value: Handle) -> bool {
    self.clear_error_code();
    let Some(obj) = self.expect_object(object) else {
      return false;
    };
    let value = self.resolve(value).unwrap_or(Value::Undefined);
    let result = self.object_set(obj, Value::Object(obj), name, value);
    self.settle_bool("Env::set_property", result)
  }

  /// Defines (or redefines) an own property from `descriptor`.
  ///
  /// A descriptor that is both data and accessor, or neither, is a fatal error and nothing is
  /// modified. Returns `false` if the existing property is non-configurable (`DONT_DELETE`).
  pub fn define_property(
    &mut self,
    object: Handle,
    name: &str,
    descriptor: PropertyDescriptor,
  ) -> bool {
    if let Err(err) = descriptor.validate() {
      fatal_error(
        self.options().fatal_mode,
        "Env::define_property",
        &err.to_string(),
      );
    }
    self.clear_error_code();
    let Some(obj) = self.expect_object(object) else {
      return false;
    };

    let PropertyDescriptor { data, accessor } = descriptor;
    let (attributes, kind) = match (data, accessor) {
      (Some(data), _) => (
        data.attributes,
        PropertyKind::Data(self.resolve(data.value).unwrap_or(Value::Undefined)),
      ),
      (None, Some(accessor)) => (
        accessor.attributes,
        PropertyKind::Accessor(NativeAccessor {
          getter: accessor.getter,
          setter: accessor.setter,
          data: accessor.data,
        }),
      ),
      // Rejected by `validate` above.
      (None, None) => return false,
    };

    let result = self.heap.with_object_mut(obj, |o| match o.own_property_index(name) {
      Some(idx) if o.properties[idx]
        .attributes
        .contains(PropertyAttributes::DONT_DELETE) =>
      {
        false
      }
      Some(idx) => {
        let prop = &mut o.properties[idx];
        prop.attributes = attributes;
        prop.kind = kind;
        true
      }
      None => {
        o.properties.push(PropertyEntry {
          key: JsString::from_rust_str(name),
          attributes,
          kind,
        });
        true
      }
    });
    let defined = self.or_fatal("Env::define_property", result);
    if !defined {
      tracing::debug!(name, "refusing to redefine a non-configurable property");
    }
    defined
  }

  /// Deletes an own property. Returns `false` for non-configurable properties; deleting a
  /// property that does not exist succeeds.
  pub fn delete_property(&mut self, object: Handle, name: &str) -> bool {
    self.clear_error_code();
    let Some(obj) = self.expect_object(object) else {
      return false;
    };
    let result = self.heap.with_object_mut(obj, |o| match o.own_property_index(name) {
      Some(idx) if o.properties[idx]
        .attributes
        .contains(PropertyAttributes::DONT_DELETE) =>
      {
        false
      }
      Some(idx) => {
        o.properties.remove(idx);
        true
      }
      None => true,
    });
    self.or_fatal("Env::delete_property", result)
  }

  /// The object's prototype, or `null` at the end of the chain.
  pub fn get_prototype(&mut self, object: Handle) -> Handle {
    self.clear_error_code();
    let Some(obj) = self.expect_object(object) else {
      return Handle::EMPTY;
    };
    let result = self.heap.get_object(obj).map(|o| o.prototype);
    let value = match self.or_fatal("Env::get_prototype", result) {
      Some(proto) => Value::Object(proto),
      None => Value::Null,
    };
    self.arena.push(value)
  }

  /// Creates an ordinary object with `count` internal fields, all initially unset.
  ///
  /// Internal fields hold host data only; they are invisible to property access.
  pub fn new_object_with_internal_fields(&mut self, count: usize) -> Handle {
    self.clear_error_code();
    let obj = JsObject::with_internal_fields(Some(self.intrinsics.object_prototype), count);
    let result = self.heap.alloc_object(obj);
    let obj = self.or_fatal("Env::new_object_with_internal_fields", result);
    self.arena.push(Value::Object(obj))
  }

  pub fn internal_field_count(&mut self, object: Handle) -> usize {
    self.clear_error_code();
    let Some(obj) = self.expect_object(object) else {
      return 0;
    };
    let result = self.heap.get_object(obj).map(|o| o.internal_fields.len());
    self.or_fatal("Env::internal_field_count", result)
  }

  /// Stores host data in internal field `index`. An index past the field count is a fatal error.
  pub fn set_internal_field(&mut self, object: Handle, index: usize, field: Option<ExternalData>) {
    self.clear_error_code();
    let Some(obj) = self.expect_object(object) else {
      return;
    };
    let result = self.heap.with_object_mut(obj, |o| match o.internal_fields.get_mut(index) {
      Some(slot) => {
        *slot = field;
        true
      }
      None => false,
    });
    if !self.or_fatal("Env::set_internal_field", result) {
      self.internal_field_out_of_range("Env::set_internal_field", index);
    }
  }

  /// Reads internal field `index`. An index past the field count is a fatal error.
  pub fn get_internal_field(&mut self, object: Handle, index: usize) -> Option<ExternalData> {
    self.clear_error_code();
    let obj = self.expect_object(object)?;
    let result = self
      .heap
      .get_object(obj)
      .map(|o| o.internal_fields.get(index).cloned());
    match self.or_fatal("Env::get_internal_field", result) {
      Some(field) => field,
      None => self.internal_field_out_of_range("Env::get_internal_field", index),
    }
  }

  fn internal_field_out_of_range(&self, location: &str, index: usize) -> ! {
    fatal_error(
      self.options().fatal_mode,
      location,
      &format!("internal field index {index} out of range"),
    )
  }

  /// `object instanceof constructor`: whether the constructor's `prototype` appears on the
  /// object's prototype chain.
  ///
  /// A non-function constructor records `FunctionExpected`.
  pub fn instance_of(&mut self, object: Handle, constructor: Handle) -> bool {
    self.clear_error_code();
    let Some(ctor) = self.expect_function(constructor) else {
      return false;
    };
    let Some(Value::Object(obj)) = self.resolve(object) else {
      return false;
    };
    let Some(Value::Object(target)) = self.own_data_property(ctor, "prototype") else {
      return false;
    };

    let mut current = self.heap.get_object(obj).ok().and_then(|o| o.prototype);
    for _ in 0..MAX_PROTOTYPE_CHAIN {
      let Some(proto) = current else {
        return false;
      };
      if proto == target {
        return true;
      }
      current = self.heap.get_object(proto).ok().and_then(|o| o.prototype);
    }
    false
  }

  pub(crate) fn own_data_property(&self, obj: GcObject, name: &str) -> Option<Value> {
    self.get_own_data_property(Value::Object(obj), name)
  }

  /// Like [`Env::settle`] for operations that report success as a boolean.
  pub(crate) fn settle_bool(&mut self, location: &str, result: Result<bool, VmError>) -> bool {
    match result {
      Ok(done) => done,
      Err(VmError::Throw(exception)) => {
        self.pending_exception = Some(exception);
        false
      }
      Err(err) => fatal_error(self.options().fatal_mode, location, &err.to_string()),
    }
  }
}

#[cfg(test)]
mod tests {
  use crate::{Env, EnvOptions, ErrorCode, FatalMode};

  fn env() -> Env {
    let options = EnvOptions {
      fatal_mode: FatalMode::Panic,
      ..EnvOptions::default()
    };
    match Env::new(options) {
      Ok(env) => env,
      Err(err) => panic!("failed to create env: {err}"),
    }
  }

  #[test]
  fn inherited_properties_are_visible_but_not_deletable_through_the_child() {
    let mut env = env();
    let obj = env.new_object();
    assert!(!env.has_property(obj, "missing"));

    let one = env.new_number(1.0);
    assert!(env.set_property(obj, "x", one));
    assert!(env.has_property(obj, "x"));
    assert!(env.delete_property(obj, "x"));
    assert!(!env.has_property(obj, "x"));
    // Deleting something that is not there succeeds.
    assert!(env.delete_property(obj, "x"));

    let proto = env.get_prototype(obj);
    assert!(env.is_object(proto));
    let root = env.get_prototype(proto);
    assert!(env.is_null(root));
  }

  #[test]
  fn non_objects_report_object_expected() {
    let mut env = env();
    let number = env.new_number(3.0);
    let got = env.get_property(number, "x");
    assert_eq!(env.get_last_error_info().code, ErrorCode::ObjectExpected);
    assert!(env.is_undefined(got));
    assert_eq!(env.internal_field_count(number), 0);
    assert_eq!(env.get_last_error_info().code, ErrorCode::ObjectExpected);
  }
}

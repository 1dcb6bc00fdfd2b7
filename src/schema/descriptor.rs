use super::slot::FieldSlot;
use serde::de::DeserializeOwned;
use std::any::TypeId;
use std::fmt;
use validator::{Validate, ValidationErrors};

/// Type identity used for body-field compatibility checks and diagnostics.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    /// Tag for `T`.
    #[must_use]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    /// Fully qualified type name as reported by the compiler.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Two tags are compatible when they name the same type once `Box` and
    /// reference indirection is stripped from both sides.
    #[must_use]
    pub fn is_compatible(&self, other: &TypeTag) -> bool {
        self.id == other.id || strip_indirection(self.name) == strip_indirection(other.name)
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

fn strip_indirection(mut name: &str) -> &str {
    loop {
        let trimmed = name.trim_start_matches("&mut ").trim_start_matches('&');
        match trimmed
            .strip_prefix("alloc::boxed::Box<")
            .and_then(|inner| inner.strip_suffix('>'))
        {
            Some(inner) => name = inner,
            None => return trimmed,
        }
    }
}

/// Binding tags declared on one field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldTags {
    /// Query-string key (`query = "k"` or `form = "k"`)
    pub query: Option<&'static str>,
    /// Routed path parameter name
    pub path: Option<&'static str>,
    /// Request header name
    pub header: Option<&'static str>,
    /// Field takes part in whole-body JSON decoding
    pub json: bool,
    /// Field receives the decoded body through [`BodyFieldGetter`]
    pub body: bool,
    /// Field carries validation rules
    pub validate: bool,
}

/// One row of a request type's descriptor table.
///
/// Usually emitted by `#[derive(RequestSchema)]`; hand-written impls build
/// rows with the chained setters:
///
/// ```rust
/// use typedhandler::{FieldDescriptor, TypeTag};
///
/// let row = FieldDescriptor::new(0, "city", TypeTag::of::<String>()).query("city");
/// assert_eq!(row.tags.query, Some("city"));
/// assert!(row.exported);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Declaration position, also the key passed to `field_slot`
    pub index: usize,
    /// Rust field name
    pub name: &'static str,
    /// Declared type
    pub type_tag: TypeTag,
    /// Non-exported fields are ignored by analysis
    pub exported: bool,
    /// Declared binding tags
    pub tags: FieldTags,
}

impl FieldDescriptor {
    /// Exported field with no tags.
    #[must_use]
    pub fn new(index: usize, name: &'static str, type_tag: TypeTag) -> Self {
        Self {
            index,
            name,
            type_tag,
            exported: true,
            tags: FieldTags::default(),
        }
    }

    #[must_use]
    pub fn query(mut self, key: &'static str) -> Self {
        self.tags.query = Some(key);
        self
    }

    #[must_use]
    pub fn path(mut self, key: &'static str) -> Self {
        self.tags.path = Some(key);
        self
    }

    #[must_use]
    pub fn header(mut self, key: &'static str) -> Self {
        self.tags.header = Some(key);
        self
    }

    #[must_use]
    pub fn json(mut self) -> Self {
        self.tags.json = true;
        self
    }

    #[must_use]
    pub fn body(mut self) -> Self {
        self.tags.body = true;
        self
    }

    #[must_use]
    pub fn validate(mut self) -> Self {
        self.tags.validate = true;
        self
    }

    /// Mark the field as not exported.
    #[must_use]
    pub fn private(mut self) -> Self {
        self.exported = false;
        self
    }
}

/// Resets an instance to its initial state; preferred over generic zeroing.
pub trait Resettable {
    fn reset(&mut self);
}

/// Custom validation, used instead of the struct validation engine.
///
/// Declaring `#[request(validatable)]` opts the type in on its own: the check
/// runs after every successful bind even when no field carries a
/// `#[validate]` rule. Without this capability, validation only happens for
/// types with at least one `#[validate]` field.
pub trait Validatable {
    fn validate(&self) -> Result<(), ValidationErrors>;
}

/// Exposes the field that receives the decoded request body.
pub trait BodyFieldGetter {
    fn body_field(&mut self) -> Option<&mut dyn BodySlot>;
}

/// A value the JSON codec can decode a request body into.
pub trait BodySlot {
    /// Replace the slot's value with the decoded body.
    fn decode_json(&mut self, body: &[u8]) -> Result<(), serde_json::Error>;

    /// Type of the slot, compared against the declared field type.
    fn slot_type(&self) -> TypeTag;
}

impl<T: DeserializeOwned + 'static> BodySlot for T {
    fn decode_json(&mut self, body: &[u8]) -> Result<(), serde_json::Error> {
        *self = serde_json::from_slice(body)?;
        Ok(())
    }

    fn slot_type(&self) -> TypeTag {
        TypeTag::of::<T>()
    }
}

/// Decodes the whole body into the instance.
pub type WholeBodyDecoder<T> = fn(&mut T, &[u8]) -> Result<(), serde_json::Error>;

/// Default whole-body decoder, used by the derive for types with `json` fields.
pub fn decode_whole_body<T: DeserializeOwned>(
    instance: &mut T,
    body: &[u8],
) -> Result<(), serde_json::Error> {
    *instance = serde_json::from_slice(body)?;
    Ok(())
}

/// Optional behaviors a request type opts into, resolved once per type.
pub struct Capabilities<T> {
    /// [`Resettable::reset`]
    pub reset: Option<fn(&mut T)>,
    /// [`Validatable::validate`]
    pub validate: Option<fn(&T) -> Result<(), ValidationErrors>>,
    /// [`BodyFieldGetter::body_field`]
    pub body_field: Option<fn(&mut T) -> Option<&mut dyn BodySlot>>,
    /// Struct validation engine entry point (`validator::Validate`)
    pub struct_validation: Option<fn(&T) -> Result<(), ValidationErrors>>,
}

impl<T> Capabilities<T> {
    #[must_use]
    pub fn none() -> Self {
        Self {
            reset: None,
            validate: None,
            body_field: None,
            struct_validation: None,
        }
    }

    #[must_use]
    pub fn resettable(mut self) -> Self
    where
        T: Resettable,
    {
        self.reset = Some(<T as Resettable>::reset);
        self
    }

    #[must_use]
    pub fn validatable(mut self) -> Self
    where
        T: Validatable,
    {
        self.validate = Some(<T as Validatable>::validate);
        self
    }

    #[must_use]
    pub fn body_field_getter(mut self) -> Self
    where
        T: BodyFieldGetter,
    {
        self.body_field = Some(<T as BodyFieldGetter>::body_field);
        self
    }

    #[must_use]
    pub fn struct_validation(mut self) -> Self
    where
        T: Validate,
    {
        self.struct_validation = Some(<T as Validate>::validate);
        self
    }
}

impl<T> Clone for Capabilities<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Capabilities<T> {}

impl<T> Default for Capabilities<T> {
    fn default() -> Self {
        Self::none()
    }
}

impl<T> fmt::Debug for Capabilities<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capabilities")
            .field("reset", &self.reset.is_some())
            .field("validate", &self.validate.is_some())
            .field("body_field", &self.body_field.is_some())
            .field("struct_validation", &self.struct_validation.is_some())
            .finish()
    }
}

/// A request type the binder can populate.
///
/// Implemented by `#[derive(RequestSchema)]`. The descriptor table is read
/// once per type by the schema analyzer; `field_slot` is the per-request
/// write path.
pub trait RequestSchema: Default + Send + 'static {
    /// Descriptor table, one row per declared field in declaration order.
    fn fields() -> Vec<FieldDescriptor>;

    /// Mutable access to a bound field. `None` means the field cannot be set.
    fn field_slot(&mut self, index: usize) -> Option<FieldSlot<'_>>;

    /// Decoder used when any field is tagged `json`.
    fn whole_body_decoder() -> Option<WholeBodyDecoder<Self>> {
        None
    }

    /// Capabilities this type implements.
    fn capabilities() -> Capabilities<Self> {
        Capabilities::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_and_plain_types_are_compatible() {
        let plain = TypeTag::of::<Vec<String>>();
        let boxed = TypeTag::of::<Box<Vec<String>>>();
        assert!(plain.is_compatible(&boxed));
        assert!(boxed.is_compatible(&plain));
        assert!(!plain.is_compatible(&TypeTag::of::<Vec<u8>>()));
    }

    #[test]
    fn body_slot_replaces_value() {
        let mut names: Vec<String> = vec!["stale".into()];
        names.decode_json(br#"["a","b"]"#).unwrap();
        assert_eq!(names, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(names.slot_type(), TypeTag::of::<Vec<String>>());
    }
}

//! Static schema descriptors driving generic decode and validation.
//!
//! Each request/response shape is declared once as a static table of
//! [`Field`] entries; the decoder and validator consume those tables
//! generically instead of inspecting types at runtime. Descriptors are built
//! at compile time (all `&'static`) and registered with the gateway at
//! startup, after which they are read-only.

/// A structural type descriptor for one request or response shape.
#[derive(Debug)]
pub struct Shape {
    /// The shape's declared name (used in diagnostics).
    pub name: &'static str,
    /// The declared fields, in wire order.
    pub fields: &'static [Field],
}

impl Shape {
    /// Find a field by its declared (Rust-side) name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&'static Field> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// One declared field of a [`Shape`].
#[derive(Debug)]
pub struct Field {
    /// The field's declared name on the decoded structure.
    pub name: &'static str,
    /// The form/XML wire name.
    pub wire_name: &'static str,
    /// The JSON wire name, when it differs from `wire_name`.
    pub json_name: Option<&'static str>,
    /// The scalar or aggregate kind.
    pub kind: FieldKind,
    /// Whether absence is valid. Optional fields decode to absent keys so
    /// downstream `Option`s can distinguish "not sent" from a default.
    pub optional: bool,
}

impl Field {
    /// Declare an optional field whose JSON name equals its wire name.
    #[must_use]
    pub const fn optional(name: &'static str, wire_name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            wire_name,
            json_name: None,
            kind,
            optional: true,
        }
    }

    /// Declare a required field whose JSON name equals its wire name.
    #[must_use]
    pub const fn required(name: &'static str, wire_name: &'static str, kind: FieldKind) -> Self {
        Self {
            name,
            wire_name,
            json_name: None,
            kind,
            optional: false,
        }
    }

    /// Override the JSON wire name.
    #[must_use]
    pub const fn json(mut self, json_name: &'static str) -> Self {
        self.json_name = Some(json_name);
        self
    }

    /// The name this field carries in JSON payloads: the JSON tag when one
    /// is declared, otherwise the form/XML wire name, otherwise the declared
    /// field name (`wire_name` always exists here, so the last fallback is
    /// implicit in descriptor authoring).
    #[must_use]
    pub fn json_wire_name(&self) -> &'static str {
        self.json_name.unwrap_or(self.wire_name)
    }
}

/// The kind of a declared field.
#[derive(Debug)]
pub enum FieldKind {
    /// UTF-8 text, passed through verbatim.
    String,
    /// 64-bit signed integer, parsed from the literal text on form wires.
    Integer,
    /// 64-bit float.
    Float,
    /// Boolean; form wires accept only the literals `true` and `false`.
    Boolean,
    /// A nested structure.
    Structure(&'static Shape),
    /// A homogeneous list. Form wires use the 1-based
    /// `<Name>.member.<i>` indexed-member convention.
    List(&'static FieldKind),
}

impl FieldKind {
    /// Human-readable kind name for diagnostics.
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Structure(_) => "structure",
            Self::List(_) => "list",
        }
    }
}

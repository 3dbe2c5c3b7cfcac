//! Role records, request shapes, and their schema descriptors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use nimbus_protocol::shape::{Field, FieldKind, Shape};

/// The namespace stamped on every IAM Query response envelope.
pub const IAM_XMLNS: &str = "https://iam.amazonaws.com/doc/2010-05-08/";

/// A stored role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    /// The role's name, unique per account.
    pub role_name: String,
    /// Generated stable identifier.
    pub role_id: String,
    /// Full ARN.
    pub arn: String,
    /// Path, `/` by default.
    pub path: String,
    /// Creation timestamp.
    pub create_date: DateTime<Utc>,
    /// Maximum session duration in seconds.
    pub max_session_duration: i64,
    /// Attached tags, in the order they were supplied.
    pub tags: Vec<Tag>,
}

/// A key/value tag on a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key.
    pub key: String,
    /// Tag value.
    pub value: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct CreateRoleRequest {
    pub role_name: Option<String>,
    pub path: Option<String>,
    pub max_session_duration: Option<i64>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct TagRoleRequest {
    pub role_name: Option<String>,
    pub tags: Option<Vec<Tag>>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct RoleNameRequest {
    pub role_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListRolesRequest {
    pub path_prefix: Option<String>,
}

pub(crate) static TAG_SHAPE: Shape = Shape {
    name: "Tag",
    fields: &[
        Field::required("key", "Key", FieldKind::String),
        Field::required("value", "Value", FieldKind::String),
    ],
};

pub(crate) static CREATE_ROLE_SHAPE: Shape = Shape {
    name: "CreateRoleRequest",
    fields: &[
        Field::required("role_name", "RoleName", FieldKind::String),
        Field::optional("path", "Path", FieldKind::String),
        Field::optional(
            "max_session_duration",
            "MaxSessionDuration",
            FieldKind::Integer,
        ),
        Field::optional(
            "tags",
            "Tags",
            FieldKind::List(&FieldKind::Structure(&TAG_SHAPE)),
        ),
    ],
};

pub(crate) static TAG_ROLE_SHAPE: Shape = Shape {
    name: "TagRoleRequest",
    fields: &[
        Field::required("role_name", "RoleName", FieldKind::String),
        Field::required(
            "tags",
            "Tags",
            FieldKind::List(&FieldKind::Structure(&TAG_SHAPE)),
        ),
    ],
};

pub(crate) static ROLE_NAME_SHAPE: Shape = Shape {
    name: "RoleNameRequest",
    fields: &[Field::required("role_name", "RoleName", FieldKind::String)],
};

pub(crate) static LIST_ROLES_SHAPE: Shape = Shape {
    name: "ListRolesRequest",
    fields: &[Field::optional("path_prefix", "PathPrefix", FieldKind::String)],
};

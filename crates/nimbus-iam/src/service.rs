//! The IAM service: role CRUD over form-encoded requests.

use std::io::{self, Write};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use quick_xml::Writer;
use uuid::Uuid;

use nimbus_core::KvStore;
use nimbus_gateway::{CloudService, RequestContext, ServiceError};
use nimbus_protocol::decode::{DecodeError, from_query};
use nimbus_protocol::encode::{EncodeError, query_success, write_text};
use nimbus_protocol::validate::SchemaRegistry;
use nimbus_protocol::{Request, Response};

use crate::model::{
    CREATE_ROLE_SHAPE, CreateRoleRequest, IAM_XMLNS, LIST_ROLES_SHAPE, ListRolesRequest,
    ROLE_NAME_SHAPE, Role, RoleNameRequest, TAG_ROLE_SHAPE, TagRoleRequest,
};

const ACTIONS: &[&str] = &["CreateRole", "GetRole", "ListRoles", "DeleteRole", "TagRole"];

/// IAM role emulation backed by the shared state store.
#[derive(Debug)]
pub struct IamService {
    store: Arc<KvStore>,
}

impl IamService {
    /// Create the service over the given store.
    #[must_use]
    pub fn new(store: Arc<KvStore>) -> Self {
        Self { store }
    }

    fn create_role(&self, request: &Request) -> Result<Response, ServiceError> {
        let input = from_query::<CreateRoleRequest>(&CREATE_ROLE_SHAPE, &request.body)
            .map_err(decode_error)?;
        let Some(role_name) = input.role_name.filter(|n| !n.is_empty()) else {
            return Err(ServiceError::validation("RoleName is required"));
        };

        let key = role_key(&role_name);
        if self.store.exists(&key) {
            return Err(ServiceError::new(
                http::StatusCode::CONFLICT,
                "EntityAlreadyExists",
                format!("Role with name {role_name} already exists."),
            ));
        }

        let path = input.path.unwrap_or_else(|| "/".to_owned());
        let role = Role {
            arn: format!("arn:aws:iam::000000000000:role{path}{role_name}"),
            role_id: new_role_id(),
            path,
            create_date: Utc::now(),
            max_session_duration: input.max_session_duration.unwrap_or(3600),
            tags: input.tags.unwrap_or_default(),
            role_name,
        };
        self.store.set(&key, &role).map_err(state_error)?;

        query_success("CreateRole", IAM_XMLNS, |w| write_role(w, &role)).map_err(encode_failure)
    }

    fn get_role(&self, request: &Request) -> Result<Response, ServiceError> {
        let role = self.load_named_role(request)?;
        query_success("GetRole", IAM_XMLNS, |w| write_role(w, &role)).map_err(encode_failure)
    }

    fn list_roles(&self, request: &Request) -> Result<Response, ServiceError> {
        let input =
            from_query::<ListRolesRequest>(&LIST_ROLES_SHAPE, &request.body).map_err(decode_error)?;
        let prefix = input.path_prefix.unwrap_or_else(|| "/".to_owned());

        let mut roles = Vec::new();
        for key in self.store.list("iam/role/") {
            if let Some(role) = self.store.get::<Role>(&key).map_err(state_error)? {
                if role.path.starts_with(&prefix) {
                    roles.push(role);
                }
            }
        }
        roles.sort_by(|a, b| a.role_name.cmp(&b.role_name));

        query_success("ListRoles", IAM_XMLNS, |w| {
            w.create_element("Roles").write_inner_content(|w| {
                for role in &roles {
                    write_role(w, role)?;
                }
                Ok::<_, io::Error>(())
            })?;
            write_text(w, "IsTruncated", "false")
        })
        .map_err(encode_failure)
    }

    fn tag_role(&self, request: &Request) -> Result<Response, ServiceError> {
        let input =
            from_query::<TagRoleRequest>(&TAG_ROLE_SHAPE, &request.body).map_err(decode_error)?;
        let Some(role_name) = input.role_name.filter(|n| !n.is_empty()) else {
            return Err(ServiceError::validation("RoleName is required"));
        };
        let tags = input.tags.unwrap_or_default();

        // One atomic read-modify-write; a plain get followed by set would
        // lose tags under concurrent callers.
        self.store
            .update::<Role, _>(&role_key(&role_name), |role| {
                for tag in tags {
                    role.tags.retain(|existing| existing.key != tag.key);
                    role.tags.push(tag);
                }
            })
            .map_err(|err| match err {
                nimbus_core::StateError::KeyNotFound(_) => ServiceError::not_found(
                    "NoSuchEntity",
                    format!("The role with name {role_name} cannot be found."),
                ),
                other => state_error(other),
            })?;

        query_success("TagRole", IAM_XMLNS, |_| Ok(())).map_err(encode_failure)
    }

    fn delete_role(&self, request: &Request) -> Result<Response, ServiceError> {
        let role = self.load_named_role(request)?;
        self.store.delete(&role_key(&role.role_name));
        query_success("DeleteRole", IAM_XMLNS, |_| Ok(())).map_err(encode_failure)
    }

    fn load_named_role(&self, request: &Request) -> Result<Role, ServiceError> {
        let input =
            from_query::<RoleNameRequest>(&ROLE_NAME_SHAPE, &request.body).map_err(decode_error)?;
        let Some(role_name) = input.role_name.filter(|n| !n.is_empty()) else {
            return Err(ServiceError::validation("RoleName is required"));
        };
        self.store
            .get::<Role>(&role_key(&role_name))
            .map_err(state_error)?
            .ok_or_else(|| {
                ServiceError::not_found(
                    "NoSuchEntity",
                    format!("The role with name {role_name} cannot be found."),
                )
            })
    }
}

#[async_trait]
impl CloudService for IamService {
    fn name(&self) -> &'static str {
        "iam"
    }

    async fn handle(
        &self,
        _ctx: &RequestContext,
        request: &Request,
    ) -> Result<Response, ServiceError> {
        match request.action.as_deref() {
            Some("CreateRole") => self.create_role(request),
            Some("GetRole") => self.get_role(request),
            Some("ListRoles") => self.list_roles(request),
            Some("DeleteRole") => self.delete_role(request),
            Some("TagRole") => self.tag_role(request),
            Some(other) => Err(ServiceError::invalid_action(other)),
            None => Err(ServiceError::validation("Action is required")),
        }
    }

    fn supported_actions(&self) -> &'static [&'static str] {
        ACTIONS
    }

    fn register_shapes(&self, registry: &mut SchemaRegistry) {
        registry.register("iam", "CreateRole", &CREATE_ROLE_SHAPE);
        registry.register("iam", "GetRole", &ROLE_NAME_SHAPE);
        registry.register("iam", "ListRoles", &LIST_ROLES_SHAPE);
        registry.register("iam", "DeleteRole", &ROLE_NAME_SHAPE);
        registry.register("iam", "TagRole", &TAG_ROLE_SHAPE);
    }
}

fn role_key(name: &str) -> String {
    format!("iam/role/{name}")
}

fn new_role_id() -> String {
    let tail = Uuid::new_v4().simple().to_string().to_uppercase();
    format!("AROA{}", &tail[..16])
}

fn write_role<W: Write>(w: &mut Writer<W>, role: &Role) -> io::Result<()> {
    w.create_element("Role").write_inner_content(|w| {
        write_text(w, "Path", &role.path)?;
        write_text(w, "RoleName", &role.role_name)?;
        write_text(w, "RoleId", &role.role_id)?;
        write_text(w, "Arn", &role.arn)?;
        write_text(
            w,
            "CreateDate",
            &role.create_date.to_rfc3339_opts(SecondsFormat::Secs, true),
        )?;
        write_text(w, "MaxSessionDuration", &role.max_session_duration.to_string())?;
        if !role.tags.is_empty() {
            w.create_element("Tags").write_inner_content(|w| {
                for tag in &role.tags {
                    w.create_element("member").write_inner_content(|w| {
                        write_text(w, "Key", &tag.key)?;
                        write_text(w, "Value", &tag.value)
                    })?;
                }
                Ok::<_, io::Error>(())
            })?;
        }
        Ok::<_, io::Error>(())
    })?;
    Ok(())
}

fn decode_error(err: DecodeError) -> ServiceError {
    match err {
        DecodeError::Malformed(e) => ServiceError::new(
            http::StatusCode::BAD_REQUEST,
            "SerializationException",
            e.to_string(),
        ),
        DecodeError::InvalidScalar { .. } => ServiceError::validation(err.to_string()),
    }
}

fn state_error(err: nimbus_core::StateError) -> ServiceError {
    ServiceError::internal(err.to_string())
}

fn encode_failure(err: EncodeError) -> ServiceError {
    ServiceError::internal(err.to_string())
}

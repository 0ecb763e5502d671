use crate::db_types::{LegacyId, UserId};

/// A typed attribute attached to a resource at creation time.
#[derive(Debug, Clone)]
pub struct ResourceAttribute {
    pub type_id: i64,
    pub value: String,
}

impl ResourceAttribute {
    pub fn new(type_id: i64, value: impl Into<String>) -> Self {
        Self { type_id, value: value.into() }
    }
}

/// Everything needed to create a resource row and its attribute rows in one transaction.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub project_id: LegacyId,
    pub resource_role_id: i64,
    pub user_id: UserId,
    pub operator_id: UserId,
    pub attributes: Vec<ResourceAttribute>,
}

/// A component inquiry row, recording that a user inspected a component as part of registering.
#[derive(Debug, Clone)]
pub struct NewComponentInquiry {
    pub component_id: i64,
    pub user_id: UserId,
    pub comment: String,
    pub rating: Option<i64>,
    pub phase: Option<i64>,
    pub version: i64,
    pub project_id: LegacyId,
}

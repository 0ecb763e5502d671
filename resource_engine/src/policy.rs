//! Role policy configuration.
//!
//! The mapping between event-source role uuids, legacy numeric role ids and the side-effect rules
//! (who gets notifications, which roles are paid) is deployment configuration, not code. The
//! processor builds a [`RolePolicy`] from the environment and injects it into the flow APIs.
use uuid::uuid;

use crate::db_types::ResourceRoleId;

#[derive(Debug, Clone)]
pub struct RolePolicy {
    /// The event-source uuid of the submitter role. Assignments of this role run the full
    /// registration workflow rather than the direct path.
    pub submitter_role_id: ResourceRoleId,
    /// The event-source uuid of the manager role, which carries a notification carve-out.
    pub manager_role_id: ResourceRoleId,
    /// Roles that never receive timeline notifications.
    pub notification_exempt_roles: Vec<ResourceRoleId>,
    /// Project membership roles that suppress the manager notification.
    pub exempt_project_roles: Vec<String>,
    /// Legacy role ids that are paid as reviewers.
    pub reviewer_role_ids: Vec<i64>,
    /// Legacy role ids that receive a copilot payment annotation.
    pub copilot_role_ids: Vec<i64>,
    /// Challenge type names that resolve to the studio track.
    pub studio_challenge_types: Vec<String>,
    pub reviewer_payment_type_id: i64,
    pub copilot_payment_type_id: i64,
}

impl Default for RolePolicy {
    fn default() -> Self {
        Self {
            submitter_role_id: ResourceRoleId(uuid!("732339e7-8e30-49d7-9198-cccf9451e221")),
            manager_role_id: ResourceRoleId(uuid!("0e9c6879-39e4-4eb6-b8df-92407890faf1")),
            notification_exempt_roles: vec![ResourceRoleId(uuid!("2a4dc376-a31c-4d00-b173-13934d89e286"))],
            exempt_project_roles: vec!["manager".into(), "customer".into()],
            reviewer_role_ids: vec![2, 4, 8, 9],
            copilot_role_ids: vec![12],
            studio_challenge_types: vec!["Design".into(), "Studio".into()],
            reviewer_payment_type_id: 3,
            copilot_payment_type_id: 4,
        }
    }
}

impl RolePolicy {
    pub fn is_submitter(&self, role: ResourceRoleId) -> bool {
        role == self.submitter_role_id
    }

    pub fn is_manager(&self, role: ResourceRoleId) -> bool {
        role == self.manager_role_id
    }

    pub fn is_notification_exempt(&self, role: ResourceRoleId) -> bool {
        self.notification_exempt_roles.contains(&role)
    }

    pub fn is_exempt_project_role(&self, role: &str) -> bool {
        self.exempt_project_roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }

    pub fn is_reviewer_class(&self, legacy_role_id: i64) -> bool {
        self.reviewer_role_ids.contains(&legacy_role_id)
    }

    pub fn is_copilot_class(&self, legacy_role_id: i64) -> bool {
        self.copilot_role_ids.contains(&legacy_role_id)
    }
}

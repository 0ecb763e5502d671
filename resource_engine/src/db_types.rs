use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use lrp_common::Amount;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;
use uuid::Uuid;

/// Legacy resource role id for submitters.
pub const SUBMITTER_LEGACY_ROLE_ID: i64 = 1;
/// Timeline notifications are notification_type_id 1 in the legacy store.
pub const TIMELINE_NOTIFICATION_TYPE_ID: i64 = 1;
/// Registration phases are phase_type_id 1; an open phase has phase_status_id 2.
pub const REGISTRATION_PHASE_TYPE_ID: i64 = 1;
pub const PHASE_STATUS_OPEN: i64 = 2;

/// project_category_id values the workflows branch on.
pub const DESIGN_PROJECT_CATEGORY: i64 = 1;
pub const DEVELOPMENT_PROJECT_CATEGORY: i64 = 2;
pub const COMPONENT_TESTING_PROJECT_CATEGORY: i64 = 5;
pub const COPILOT_POSTING_PROJECT_CATEGORY: i64 = 29;
/// The rating phase for a category is category + 111 (112 = design, 113 = development).
pub const RATING_PHASE_OFFSET: i64 = 111;
pub const DEVELOPMENT_PHASE_ID: i64 = 113;

/// resource_info_type_id values written during registration.
pub const RESOURCE_INFO_EXTERNAL_REF: i64 = 1;
pub const RESOURCE_INFO_HANDLE: i64 = 2;
pub const RESOURCE_INFO_RATING: i64 = 4;
pub const RESOURCE_INFO_RELIABILITY: i64 = 5;
pub const RESOURCE_INFO_REGISTRATION_DATE: i64 = 6;
pub const RESOURCE_INFO_PAYMENT: i64 = 7;
pub const RESOURCE_INFO_STUDIO_PLACEHOLDER: i64 = 8;
pub const RESOURCE_INFO_APPEALS_COMPLETED: i64 = 13;
pub const APPEALS_COMPLETED_NO: &str = "NO";
pub const STUDIO_PLACEHOLDER_VALUE: &str = "N/A";

/// project_info_type_id 2 holds the component id; 4 the developer forum category.
pub const PROJECT_INFO_COMPONENT_ID: i64 = 2;
pub const PROJECT_INFO_FORUM_CATEGORY: i64 = 4;

//--------------------------------------    ChallengeId    -----------------------------------------------------------
/// The event-source challenge identifier (an opaque uuid owned by the upstream platform).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChallengeId(pub Uuid);

impl Display for ChallengeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ChallengeId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

//--------------------------------------   ResourceRoleId   ----------------------------------------------------------
/// The event-source resource-role identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceRoleId(pub Uuid);

impl Display for ResourceRoleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceRoleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

//--------------------------------------      LegacyId      ----------------------------------------------------------
/// The numeric project id in the legacy store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct LegacyId(pub i64);

impl Display for LegacyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<i64> for LegacyId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

//--------------------------------------       UserId       ----------------------------------------------------------
/// A legacy member id. The dispatcher guarantees these are positive before they reach the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

//--------------------------------------    ResourceRole    ----------------------------------------------------------
/// An upstream resource-role definition, correlating the event-source uuid with the legacy numeric id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceRole {
    pub id: ResourceRoleId,
    #[serde(rename = "legacyId")]
    pub legacy_id: i64,
    pub name: String,
}

//--------------------------------------      Challenge     ----------------------------------------------------------
/// An upstream challenge object. Read-only from the engine's perspective; owned by the event source.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Challenge {
    pub id: Option<ChallengeId>,
    #[serde(rename = "legacyId")]
    pub legacy_id: Option<i64>,
    #[serde(rename = "type", default)]
    pub type_name: String,
    #[serde(rename = "prizeSets", default)]
    pub prize_sets: Vec<PrizeSet>,
    #[serde(default)]
    pub metadata: Vec<ChallengeMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrizeSet {
    #[serde(rename = "type")]
    pub prize_type: String,
    #[serde(default)]
    pub prizes: Vec<Prize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prize {
    #[serde(rename = "type", default)]
    pub prize_type: String,
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeMetadata {
    pub name: String,
    pub value: serde_json::Value,
}

impl Challenge {
    /// The studio/software discriminator is derived from the challenge type name.
    pub fn is_studio(&self, studio_types: &[String]) -> bool {
        studio_types.iter().any(|t| t.eq_ignore_ascii_case(&self.type_name))
    }
}

//--------------------------------------      Resource      ----------------------------------------------------------
/// The assignment of a user to a role on a challenge in the legacy store.
#[derive(Debug, Clone, FromRow)]
pub struct Resource {
    pub resource_id: i64,
    pub resource_role_id: i64,
    pub project_id: LegacyId,
    pub user_id: UserId,
    pub create_date: DateTime<Utc>,
    pub modify_date: DateTime<Utc>,
}

/// A legacy role definition row from `resource_role_lu`.
#[derive(Debug, Clone, FromRow)]
pub struct LegacyRole {
    pub resource_role_id: i64,
    pub name: String,
}

//--------------------------------------   ReviewerPayment  ----------------------------------------------------------
#[derive(Debug, Clone, FromRow)]
pub struct ReviewerPayment {
    pub project_payment_id: i64,
    pub resource_id: i64,
    pub amount: Amount,
    pub project_payment_type_id: i64,
    pub manual_ind: i64,
}

/// Whether a payment amount was fixed by hand (challenge configuration) or left to the standard
/// downstream calculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentType {
    Manual,
    Automatic,
}

impl PaymentType {
    pub fn manual_ind(&self) -> i64 {
        match self {
            PaymentType::Manual => 1,
            PaymentType::Automatic => 0,
        }
    }
}

impl Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentType::Manual => write!(f, "Manual"),
            PaymentType::Automatic => write!(f, "Automatic"),
        }
    }
}

/// A resource joined against its (optional) payment row, used by the reconciliation sweep.
#[derive(Debug, Clone, FromRow)]
pub struct ResourcePaymentRow {
    pub resource_id: i64,
    pub resource_role_id: i64,
    pub project_payment_id: Option<i64>,
    pub amount: Option<Amount>,
}

//--------------------------------------     AuditAction    ----------------------------------------------------------
/// Audit trail action types. The audit id is computed as max+1 at insert time, so readers must not
/// assume gap-free ids under concurrent writers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Create,
    Delete,
}

impl AuditAction {
    pub fn type_id(&self) -> i64 {
        match self {
            AuditAction::Create => 1,
            AuditAction::Delete => 2,
        }
    }
}

impl Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuditAction::Create => write!(f, "create"),
            AuditAction::Delete => write!(f, "delete"),
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct AuditRecord {
    pub project_user_audit_id: i64,
    pub project_id: LegacyId,
    pub resource_user_id: UserId,
    pub resource_role_id: i64,
    pub audit_action_type_id: i64,
    pub action_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Error)]
#[error("Invalid audit action: {0}")]
pub struct AuditActionConversionError(String);

impl FromStr for AuditAction {
    type Err = AuditActionConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(Self::Create),
            "delete" => Ok(Self::Delete),
            s => Err(AuditActionConversionError(s.to_string())),
        }
    }
}

//--------------------------------------   Workflow rows    ----------------------------------------------------------
/// The combined answer to the registration pre-checks, assembled from the legacy store.
#[derive(Debug, Clone, Default)]
pub struct RegistrationValidation {
    pub project_category_id: i64,
    pub registration_open: bool,
    pub user_registered: bool,
    pub user_suspended: bool,
    pub user_country_banned: bool,
    pub user_country_missing: bool,
    pub user_is_copilot: bool,
}

#[derive(Debug, Clone, FromRow)]
pub struct UnregistrationValidation {
    pub project_id: LegacyId,
    pub registration_open: bool,
    pub user_registered: bool,
    pub studio: bool,
}

/// Component metadata for a challenge, used by the component-inquiry registration step.
#[derive(Debug, Clone, FromRow)]
pub struct ComponentInfo {
    pub component_id: i64,
    pub comp_vers_id: i64,
    pub phase_id: i64,
    pub version: i64,
    pub comments: String,
    pub project_category_id: i64,
}

impl ComponentInfo {
    /// The user-rating phase derived from the component's project category.
    pub fn rating_phase(&self) -> i64 {
        self.project_category_id + RATING_PHASE_OFFSET
    }
}

/// Context for payment side effects when assigning a role, extracted from the challenge's prize
/// configuration by the dispatcher.
#[derive(Debug, Clone, Copy, Default)]
pub struct PaymentContext {
    pub reviewer_amount: Option<Amount>,
    pub copilot_amount: Option<Amount>,
    pub payment_type: Option<PaymentType>,
}

impl PaymentContext {
    pub fn payment_type(&self) -> PaymentType {
        self.payment_type.unwrap_or(PaymentType::Automatic)
    }
}

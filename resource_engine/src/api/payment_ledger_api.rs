use std::fmt::Debug;

use log::*;
use lrp_common::Amount;
use serde_json::Value;

use crate::{
    api::errors::WorkflowError,
    db_types::{Challenge, LegacyId, PaymentType, UserId},
    policy::RolePolicy,
    traits::LegacyStoreDatabase,
};

const REVIEWER_PRIZE_SET: &str = "reviewer";
const COPILOT_PRIZE_SET: &str = "copilot";
const REVIEWER_PAYMENT_METADATA: &str = "reviewerPayment";

/// `PaymentLedgerApi` keeps the legacy payment rows for reviewer-class resources in step with the
/// amounts configured on the upstream challenge.
pub struct PaymentLedgerApi<B> {
    db: B,
    policy: RolePolicy,
}

impl<B> Debug for PaymentLedgerApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PaymentLedgerApi")
    }
}

impl<B> PaymentLedgerApi<B> {
    pub fn new(db: B, policy: RolePolicy) -> Self {
        Self { db, policy }
    }

    /// Extracts the reviewer amount from a challenge: the structured "reviewer" prize set wins;
    /// the named metadata field is the fallback for challenges configured the old way. `None`
    /// means there is nothing to reconcile.
    pub fn reviewer_amount_from(&self, challenge: &Challenge) -> Option<Amount> {
        if let Some(amount) = prize_set_amount(challenge, REVIEWER_PRIZE_SET) {
            return Some(amount);
        }
        challenge
            .metadata
            .iter()
            .find(|m| m.name == REVIEWER_PAYMENT_METADATA)
            .and_then(|m| metadata_amount(&m.value))
    }

    /// Extracts the copilot amount from the challenge's prize configuration.
    pub fn copilot_amount_from(&self, challenge: &Challenge) -> Option<Amount> {
        prize_set_amount(challenge, COPILOT_PRIZE_SET)
    }
}

impl<B> PaymentLedgerApi<B>
where B: LegacyStoreDatabase
{
    /// Brings every reviewer-class resource on the challenge to the given amount: inserts a manual
    /// payment where none exists, updates the stored amount where it differs, and leaves matching
    /// rows alone. Running it twice with the same amount changes nothing the second time.
    ///
    /// Returns the number of rows inserted or updated.
    pub async fn reconcile(&self, legacy_id: LegacyId, amount: Amount, operator_id: UserId) -> Result<u64, WorkflowError> {
        let rows = self.db.resources_with_payments_by_roles(legacy_id, &self.policy.reviewer_role_ids).await?;
        let mut changed = 0u64;
        for row in &rows {
            match row.project_payment_id {
                None => {
                    self.db
                        .insert_resource_payment(
                            row.resource_id,
                            amount,
                            self.policy.reviewer_payment_type_id,
                            PaymentType::Manual,
                            operator_id,
                        )
                        .await?;
                    changed += 1;
                },
                Some(payment_id) if row.amount != Some(amount) => {
                    self.db.update_payment_amount(payment_id, amount, operator_id).await?;
                    changed += 1;
                },
                Some(_) => {},
            }
        }
        debug!(
            "🔄️💰️ Payment reconciliation on {legacy_id}: {} reviewer resource(s), {changed} row(s) changed to {amount}",
            rows.len()
        );
        Ok(changed)
    }
}

fn prize_set_amount(challenge: &Challenge, set_type: &str) -> Option<Amount> {
    challenge
        .prize_sets
        .iter()
        .find(|ps| ps.prize_type.eq_ignore_ascii_case(set_type))
        .and_then(|ps| ps.prizes.first())
        .and_then(|p| Amount::try_from(p.value).ok())
}

fn metadata_amount(value: &Value) -> Option<Amount> {
    match value {
        Value::Number(n) => n.as_f64().and_then(|v| Amount::try_from(v).ok()),
        Value::String(s) => s.parse::<Amount>().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;
    use crate::db_types::{ChallengeMetadata, Prize, PrizeSet};

    fn challenge_with(prize_sets: Vec<PrizeSet>, metadata: Vec<ChallengeMetadata>) -> Challenge {
        Challenge { prize_sets, metadata, ..Challenge::default() }
    }

    #[test]
    fn prize_set_takes_precedence_over_metadata() {
        let challenge = challenge_with(
            vec![PrizeSet {
                prize_type: "reviewer".into(),
                prizes: vec![Prize { prize_type: "USD".into(), value: 150.0 }],
            }],
            vec![ChallengeMetadata { name: "reviewerPayment".into(), value: json!(99.0) }],
        );
        let api = PaymentLedgerApi::new((), RolePolicy::default());
        assert_eq!(api.reviewer_amount_from(&challenge), Some(Amount::from_dollars(150)));
    }

    #[test]
    fn metadata_fallback_accepts_numbers_and_strings() {
        let api = PaymentLedgerApi::new((), RolePolicy::default());
        let numeric = challenge_with(vec![], vec![ChallengeMetadata {
            name: "reviewerPayment".into(),
            value: json!(42.5),
        }]);
        assert_eq!(api.reviewer_amount_from(&numeric), Some(Amount::from(4250)));
        let stringy = challenge_with(vec![], vec![ChallengeMetadata {
            name: "reviewerPayment".into(),
            value: json!("17.25"),
        }]);
        assert_eq!(api.reviewer_amount_from(&stringy), Some(Amount::from(1725)));
        let junk = challenge_with(vec![], vec![ChallengeMetadata {
            name: "reviewerPayment".into(),
            value: json!({"nope": true}),
        }]);
        assert_eq!(api.reviewer_amount_from(&junk), None);
    }

    #[test]
    fn absent_configuration_means_no_reconciliation() {
        let api = PaymentLedgerApi::new((), RolePolicy::default());
        assert_eq!(api.reviewer_amount_from(&Challenge::default()), None);
        assert_eq!(api.copilot_amount_from(&Challenge::default()), None);
    }
}

//! The message dispatcher: the read side of the processor.
//!
//! One message at a time: parse, validate, check readiness, route. Malformed messages are dropped
//! (they cannot self-heal by retry); messages for challenges that have not reached both systems
//! yet are requeued after a delay; everything else is routed to the flow APIs and its offset is
//! committed whether the handler succeeded or failed.
use std::{sync::Arc, time::Duration};

use log::*;
use resource_engine::{
    db_types::{Challenge, ChallengeId, LegacyId, PaymentContext, PaymentType},
    traits::LegacyStoreDatabase,
    PaymentLedgerApi,
    ResourceFlowApi,
    WorkflowError,
};

use crate::{
    bus::{Delivery, MessageBus},
    config::{ProcessorConfig, TopicConfig},
    errors::ProcessorError,
    messages::{ChallengeEvent, PaymentUpdatePayload, ResourcePayload},
    upstream::{ChallengeApi, UpstreamError},
};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);

pub struct Dispatcher<B> {
    bus: Arc<dyn MessageBus>,
    upstream: Arc<dyn ChallengeApi>,
    db: B,
    flows: ResourceFlowApi<B>,
    ledger: PaymentLedgerApi<B>,
    topics: TopicConfig,
    retry_delay: Duration,
    originator: String,
    mime_type: String,
}

impl<B> Dispatcher<B>
where B: LegacyStoreDatabase
{
    pub fn new(
        bus: Arc<dyn MessageBus>,
        upstream: Arc<dyn ChallengeApi>,
        db: B,
        flows: ResourceFlowApi<B>,
        ledger: PaymentLedgerApi<B>,
        config: &ProcessorConfig,
    ) -> Self {
        Self {
            bus,
            upstream,
            db,
            flows,
            ledger,
            topics: config.topics.clone(),
            retry_delay: config.retry_delay,
            originator: config.originator.clone(),
            mime_type: config.mime_type.clone(),
        }
    }

    /// Consumes messages forever, sleeping briefly when the bus runs dry.
    pub async fn run(&self) {
        info!(
            "📬️ Dispatcher listening on {}, {} and {}",
            self.topics.create, self.topics.delete, self.topics.payment_update
        );
        loop {
            match self.bus.poll().await {
                Ok(Some(delivery)) => self.process(delivery).await,
                Ok(None) => tokio::time::sleep(IDLE_POLL_INTERVAL).await,
                Err(e) => {
                    error!("📬️ Bus poll failed: {e}");
                    tokio::time::sleep(IDLE_POLL_INTERVAL).await;
                },
            }
        }
    }

    /// Processes queued messages until the bus runs dry, then returns. Tests drive the dispatcher
    /// with this instead of [`Dispatcher::run`].
    pub async fn drain(&self) {
        loop {
            match self.bus.poll().await {
                Ok(Some(delivery)) => self.process(delivery).await,
                Ok(None) => return,
                Err(e) => {
                    error!("📬️ Bus poll failed: {e}");
                    return;
                },
            }
        }
    }

    async fn process(&self, delivery: Delivery) {
        let offset = delivery.offset;
        if let Err(e) = self.handle(delivery).await {
            // Business and I/O failures are terminal for the message. Only the readiness path
            // retries, and it does so by republishing before we get here.
            error!("📬️ Message at offset {offset} failed: {e}");
        }
        if let Err(e) = self.bus.commit(offset).await {
            error!("📬️ Could not commit offset {offset}: {e}");
        }
    }

    async fn handle(&self, delivery: Delivery) -> Result<(), ProcessorError> {
        let event: ChallengeEvent = match serde_json::from_str(&delivery.raw) {
            Ok(event) => event,
            Err(e) => {
                warn!("📬️ Dropping malformed message on {}: {e}", delivery.topic);
                return Ok(());
            },
        };
        if event.topic != delivery.topic {
            warn!(
                "📬️ Dropping message: envelope topic {} does not match bus topic {}",
                event.topic, delivery.topic
            );
            return Ok(());
        }
        if delivery.topic == self.topics.create || delivery.topic == self.topics.delete {
            self.handle_resource_event(delivery.topic == self.topics.create, event).await
        } else if delivery.topic == self.topics.payment_update {
            self.handle_payment_update(event).await
        } else {
            warn!("📬️ Dropping message on unhandled topic {}", delivery.topic);
            Ok(())
        }
    }

    async fn handle_resource_event(&self, creation: bool, event: ChallengeEvent) -> Result<(), ProcessorError> {
        let payload: ResourcePayload = match serde_json::from_value(event.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("📬️ Dropping message on {}: payload failed validation: {e}", event.topic);
                return Ok(());
            },
        };
        let user_id = match payload.member() {
            Ok(user_id) => user_id,
            Err(e) => {
                warn!("📬️ Dropping message on {}: {e}", event.topic);
                return Ok(());
            },
        };
        let challenge = match self.resolve_ready_challenge(payload.challenge_id).await? {
            Some(challenge) => challenge,
            None => return self.republish(event).await,
        };
        let role = self.upstream.get_resource_role(payload.role_id).await?;
        if creation {
            let payment = self.payment_context(&challenge);
            self.flows.assign(payload.challenge_id, &challenge, &role, user_id, payment, false).await?;
            info!("📬️ Assigned role {} to user {user_id} on challenge {}", role.name, payload.challenge_id);
        } else {
            self.flows.remove(payload.challenge_id, &challenge, &role, user_id).await?;
            info!("📬️ Removed role {} from user {user_id} on challenge {}", role.name, payload.challenge_id);
        }
        Ok(())
    }

    /// A challenge is ready when the upstream resolves it to a legacy id *and* that legacy id is
    /// already present in the legacy store. Upstream I/O failures are terminal, not a readiness
    /// miss.
    async fn resolve_ready_challenge(&self, id: ChallengeId) -> Result<Option<Challenge>, ProcessorError> {
        let challenge = match self.upstream.get_challenge(id).await {
            Ok(challenge) => challenge,
            Err(UpstreamError::NotFound(_)) => {
                debug!("📬️ Challenge {id} is not resolvable upstream yet");
                return Ok(None);
            },
            Err(e) => return Err(e.into()),
        };
        let Some(legacy_id) = challenge.legacy_id else {
            debug!("📬️ Challenge {id} has no legacy id yet");
            return Ok(None);
        };
        let legacy_id = LegacyId(legacy_id);
        if self.db.challenge_exists(legacy_id).await.map_err(WorkflowError::from)?.is_none() {
            debug!("📬️ Challenge {id} ({legacy_id}) has not reached the legacy store yet");
            return Ok(None);
        }
        Ok(Some(challenge))
    }

    async fn republish(&self, event: ChallengeEvent) -> Result<(), ProcessorError> {
        info!(
            "📬️ Challenge not ready; republishing to {} after {:?}. Requeues are unbounded.",
            event.topic, self.retry_delay
        );
        let requeued = ChallengeEvent::new(&event.topic, &self.originator, &self.mime_type, event.payload);
        let body = serde_json::to_string(&requeued)?;
        self.bus.publish_after(&event.topic, body, self.retry_delay).await?;
        Ok(())
    }

    /// Amounts present in the challenge configuration are operator-fixed, so the resulting payment
    /// rows are tagged manual. No amounts means downstream calculation decides.
    fn payment_context(&self, challenge: &Challenge) -> PaymentContext {
        let reviewer_amount = self.ledger.reviewer_amount_from(challenge);
        let copilot_amount = self.ledger.copilot_amount_from(challenge);
        let payment_type = (reviewer_amount.is_some() || copilot_amount.is_some()).then_some(PaymentType::Manual);
        PaymentContext { reviewer_amount, copilot_amount, payment_type }
    }

    async fn handle_payment_update(&self, event: ChallengeEvent) -> Result<(), ProcessorError> {
        let payload: PaymentUpdatePayload = match serde_json::from_value(event.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("📬️ Dropping message on {}: payload failed validation: {e}", event.topic);
                return Ok(());
            },
        };
        let legacy_id = LegacyId(payload.legacy_id);
        let challenge = payload.as_challenge();
        let Some(amount) = self.ledger.reviewer_amount_from(&challenge) else {
            debug!("📬️ No reviewer amount configured on {legacy_id}; nothing to reconcile");
            return Ok(());
        };
        let changed = self.ledger.reconcile(legacy_id, amount, payload.operator()).await?;
        info!("📬️ Payment update on {legacy_id}: {changed} row(s) reconciled to {amount}");
        Ok(())
    }
}

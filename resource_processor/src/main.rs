use std::{future::Future, pin::Pin, sync::Arc};

use dotenvy::dotenv;
use log::*;
use resource_engine::{
    collaborators::{ForumService, LogOnlyForum, ProjectMembership},
    events::{EventHandlers, EventHooks},
    PaymentLedgerApi,
    RegistrationApi,
    ResourceFlowApi,
    SqliteDatabase,
    UnregistrationApi,
};
use resource_processor::{
    bus::{InMemoryBus, MessageBus},
    config::ProcessorConfig,
    dispatcher::Dispatcher,
    errors::ProcessorError,
    messages::UnregisteredNotice,
    upstream::{ChallengeApi, RestChallengeApi, UpstreamMembership},
};

#[tokio::main]
async fn main() -> Result<(), ProcessorError> {
    dotenv().ok();
    env_logger::init();
    let config = ProcessorConfig::from_env_or_default();
    info!("🚀️ Starting the legacy resource processor");

    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ProcessorError::InitializeError(e.to_string()))?;
    let upstream: Arc<dyn ChallengeApi> = Arc::new(RestChallengeApi::new(&config.challenge_api_url, config.auth.clone())?);
    let membership: Arc<dyn ProjectMembership> = Arc::new(UpstreamMembership::new(upstream.clone()));
    let forum: Arc<dyn ForumService> = Arc::new(LogOnlyForum);

    // In-memory transport until a broker client is wired in. Everything downstream only sees the
    // MessageBus port.
    let bus: Arc<dyn MessageBus> = Arc::new(InMemoryBus::subscribed_to(&[
        &config.topics.create,
        &config.topics.delete,
        &config.topics.payment_update,
    ]));

    let mut hooks = EventHooks::default();
    let outbound_bus = bus.clone();
    let outbound_topic = config.topics.outbound.clone();
    hooks.on_user_unregistered(move |event| {
        let bus = outbound_bus.clone();
        let topic = outbound_topic.clone();
        Box::pin(async move {
            let notice = UnregisteredNotice::from(event);
            match serde_json::to_string(&notice) {
                Ok(body) => {
                    if let Err(e) = bus.publish(&topic, body).await {
                        error!("📬️ Could not publish the unregistration notice: {e}");
                    }
                },
                Err(e) => error!("📬️ Could not serialize the unregistration notice: {e}"),
            }
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(25, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let registration = RegistrationApi::new(db.clone(), forum.clone());
    let unregistration = UnregistrationApi::new(db.clone(), forum, producers.clone());
    let flows =
        ResourceFlowApi::new(db.clone(), config.policy.clone(), membership, registration, unregistration, producers);
    let ledger = PaymentLedgerApi::new(db.clone(), config.policy.clone());

    let dispatcher = Dispatcher::new(bus, upstream, db, flows, ledger, &config);
    dispatcher.run().await;
    Ok(())
}

use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    ResourceAssignedEvent,
    ResourceRemovedEvent,
    UserUnregisteredEvent,
};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub resource_assigned_producer: Vec<EventProducer<ResourceAssignedEvent>>,
    pub resource_removed_producer: Vec<EventProducer<ResourceRemovedEvent>>,
    pub user_unregistered_producer: Vec<EventProducer<UserUnregisteredEvent>>,
}

pub struct EventHandlers {
    pub on_resource_assigned: Option<EventHandler<ResourceAssignedEvent>>,
    pub on_resource_removed: Option<EventHandler<ResourceRemovedEvent>>,
    pub on_user_unregistered: Option<EventHandler<UserUnregisteredEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_resource_assigned = hooks.on_resource_assigned.map(|f| EventHandler::new(buffer_size, f));
        let on_resource_removed = hooks.on_resource_removed.map(|f| EventHandler::new(buffer_size, f));
        let on_user_unregistered = hooks.on_user_unregistered.map(|f| EventHandler::new(buffer_size, f));
        Self { on_resource_assigned, on_resource_removed, on_user_unregistered }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_resource_assigned {
            result.resource_assigned_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_resource_removed {
            result.resource_removed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_user_unregistered {
            result.user_unregistered_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_resource_assigned {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_resource_removed {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
        if let Some(handler) = self.on_user_unregistered {
            tokio::spawn(async move {
                handler.start_handler().await;
            });
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_resource_assigned: Option<Handler<ResourceAssignedEvent>>,
    pub on_resource_removed: Option<Handler<ResourceRemovedEvent>>,
    pub on_user_unregistered: Option<Handler<UserUnregisteredEvent>>,
}

impl EventHooks {
    pub fn on_resource_assigned<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ResourceAssignedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_resource_assigned = Some(Arc::new(f));
        self
    }

    pub fn on_resource_removed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ResourceRemovedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_resource_removed = Some(Arc::new(f));
        self
    }

    pub fn on_user_unregistered<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(UserUnregisteredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_user_unregistered = Some(Arc::new(f));
        self
    }
}

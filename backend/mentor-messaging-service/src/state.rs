use std::sync::Arc;

use crate::{
    config::Config,
    services::{
        MessageLedger, MessagingService, NotificationDispatcher, ReadStateTracker, ThreadRegistry,
    },
    store::DynStore,
    websocket::{ConnectionRegistry, EventBroadcaster},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: DynStore,
    pub registry: ConnectionRegistry,
    pub broadcaster: EventBroadcaster,
    pub threads: ThreadRegistry,
    pub ledger: MessageLedger,
    pub read_state: ReadStateTracker,
    pub notifications: NotificationDispatcher,
    /// Send orchestration shared by the HTTP and WebSocket surfaces
    pub messaging: MessagingService,
}

impl AppState {
    pub fn new(config: Config, store: DynStore) -> Self {
        let registry = ConnectionRegistry::new(config.realtime.connection_buffer);
        let broadcaster = EventBroadcaster::new(registry.clone());

        let threads = ThreadRegistry::new(store.clone());
        let ledger = MessageLedger::new(store.clone(), threads.clone());
        let read_state =
            ReadStateTracker::new(store.clone(), threads.clone(), broadcaster.clone());
        let notifications = NotificationDispatcher::new(
            store.clone(),
            broadcaster.clone(),
            config.notifications.clone(),
        );
        let messaging = MessagingService::new(
            threads.clone(),
            ledger.clone(),
            read_state.clone(),
            broadcaster.clone(),
            notifications.clone(),
        );

        Self {
            config: Arc::new(config),
            store,
            registry,
            broadcaster,
            threads,
            ledger,
            read_state,
            notifications,
            messaging,
        }
    }
}

//! clinicbot-server/src/context.rs
//!
//! Builds the server context: storage, AI gateway, triage pipeline and the
//! background workers, all wired to one event bus.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{info, warn};

use clinicbot_ai::{FallbackReplies, PromptBuilder, Provider, ProviderTranslator, ResponseGateway};
use clinicbot_common::traits::{ConversationRepository, NoopTranslator, TicketRepository, Translator};
use clinicbot_core::config::AppConfig;
use clinicbot_core::crm::CrmDispatcher;
use clinicbot_core::db::Database;
use clinicbot_core::eventbus::EventBus;
use clinicbot_core::notifications;
use clinicbot_core::repositories::{
    InMemoryConversationRepository, InMemoryTicketRepository, PostgresConversationRepository,
    PostgresTicketRepository,
};
use clinicbot_core::services::ConversationService;
use clinicbot_core::tasks::{spawn_crm_resync_task, spawn_crm_sync_worker, spawn_notification_worker, ResyncContext};
use clinicbot_core::tickets::TicketManager;
use clinicbot_core::triage::{LanguageDetector, SentimentAnalyzer};
use clinicbot_core::Error;

/// The global server context (a bag of references to storage, the event
/// bus and the conversation pipeline).
pub struct ServerContext {
    pub config: AppConfig,
    pub event_bus: Arc<EventBus>,
    pub conversation_service: Arc<ConversationService>,
    pub ticket_repo: Arc<dyn TicketRepository>,
    pub conversation_repo: Arc<dyn ConversationRepository>,
    workers: Vec<JoinHandle<()>>,
}

impl ServerContext {
    pub async fn new(config: AppConfig) -> Result<Self, Error> {
        // 1) Storage
        let (conversation_repo, ticket_repo): (Arc<dyn ConversationRepository>, Arc<dyn TicketRepository>) =
            match config.database_url.as_deref() {
                Some(url) => {
                    info!("Using Postgres storage");
                    let db = Database::new(url).await?;
                    db.migrate().await?;
                    (
                        Arc::new(PostgresConversationRepository::new(db.pool().clone())),
                        Arc::new(PostgresTicketRepository::new(db.pool().clone())),
                    )
                }
                None => {
                    warn!("No database configured; conversations and tickets live in memory only");
                    (
                        Arc::new(InMemoryConversationRepository::new()),
                        Arc::new(InMemoryTicketRepository::new()),
                    )
                }
            };

        let event_bus = Arc::new(EventBus::new());

        // 2) AI providers
        let registry = Arc::new(Provider::from_configs(&config.ai.providers).await);
        if registry.get(&config.ai.active_provider).await.is_none() {
            warn!(
                "Active AI provider '{}' is not configured; replies will use the fallback text",
                config.ai.active_provider
            );
        }
        let base = config.language.base;
        let gateway = ResponseGateway::new(registry.clone(), config.ai.active_provider.clone())
            .with_timeout(config.ai.timeout())
            .with_max_retries(config.ai.max_retries)
            .with_prompts(PromptBuilder::new(config.ai.clinic_name.clone(), config.ai.contact_line.clone()))
            .with_fallback(FallbackReplies::new(base));

        let translator: Arc<dyn Translator> = match config.ai.translation_provider.as_deref() {
            Some(name) => match registry.get(name).await {
                Some(backend) => Arc::new(ProviderTranslator::new(backend, config.ai.timeout())),
                None => {
                    warn!("Translation provider '{}' is not configured", name);
                    Arc::new(NoopTranslator)
                }
            },
            None => Arc::new(NoopTranslator),
        };

        // 3) Triage pipeline
        let tickets = Arc::new(TicketManager::new(
            ticket_repo.clone(),
            event_bus.clone(),
            config.triage.high_urgency_threshold,
        ));
        let conversation_service = Arc::new(
            ConversationService::new(
                conversation_repo.clone(),
                tickets,
                LanguageDetector::new(base, config.language.min_chars),
                Arc::new(SentimentAnalyzer::new(base, translator)),
                Arc::new(gateway),
                event_bus.clone(),
            )
            .with_crm_targets(config.crm.enabled_targets())
            .with_history_limit(config.triage.history_limit),
        );

        // 4) Background workers
        let dispatcher = Arc::new(CrmDispatcher::from_config(&config.crm));
        info!("CRM targets: {:?}", config.crm.enabled_targets());

        let mut workers = Vec::new();
        workers.push(spawn_crm_sync_worker(event_bus.clone(), dispatcher.clone(), ticket_repo.clone()).await);
        workers.push(
            spawn_notification_worker(
                event_bus.clone(),
                notifications::from_config(&config.notifications),
                config.notifications.timeout(),
            )
            .await,
        );
        workers.push(spawn_crm_resync_task(
            ResyncContext {
                event_bus: event_bus.clone(),
                dispatcher,
                tickets: ticket_repo.clone(),
                conversations: conversation_repo.clone(),
                batch: config.tasks.resync_batch,
            },
            config.tasks.resync_interval(),
        ));

        Ok(Self {
            config,
            event_bus,
            conversation_service,
            ticket_repo,
            conversation_repo,
            workers,
        })
    }

    /// Signals every worker to stop and waits for them to drain.
    pub async fn shutdown(self) {
        info!("Shutting down workers...");
        self.event_bus.shutdown();
        for handle in self.workers {
            if let Err(e) = handle.await {
                warn!("Worker ended abnormally: {:?}", e);
            }
        }
    }
}

// File: clinicbot-core/tests/triage_flow_tests.rs

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use clinicbot_ai::{GenerationRequest, ModelProvider, Provider, ProviderError, ReplySource, ResponseGateway};
use clinicbot_common::models::{Channel, InboundMessage, LanguageCode, Priority, Sender, Tone};
use clinicbot_common::traits::{ConversationRepository, Notifier, StaffNotice};
use clinicbot_common::Error;
use clinicbot_core::eventbus::{EventBus, TriageEvent};
use clinicbot_core::repositories::{InMemoryConversationRepository, InMemoryTicketRepository};
use clinicbot_core::services::ConversationService;
use clinicbot_core::tasks::spawn_notification_worker;
use clinicbot_core::tickets::TicketManager;
use clinicbot_core::triage::{LanguageDetector, SentimentAnalyzer, TrendDirection};

struct EchoProvider;

#[async_trait]
impl ModelProvider for EchoProvider {
    fn name(&self) -> &str {
        "echo"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, ProviderError> {
        Ok(format!("echo: {}", request.prompt))
    }
}

struct DownProvider;

#[async_trait]
impl ModelProvider for DownProvider {
    fn name(&self) -> &str {
        "down"
    }

    async fn generate(&self, _request: &GenerationRequest) -> Result<String, ProviderError> {
        Err(ProviderError::Transport("connection refused".into()))
    }
}

/// Never answers.
struct StalledNotifier;

#[async_trait]
impl Notifier for StalledNotifier {
    fn name(&self) -> &str {
        "stalled"
    }

    async fn notify(&self, _notice: &StaffNotice) -> Result<(), Error> {
        std::future::pending().await
    }
}

#[derive(Default)]
struct RecordingNotifier {
    seen: Mutex<Vec<StaffNotice>>,
}

impl RecordingNotifier {
    fn seen(&self) -> Vec<StaffNotice> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, notice: &StaffNotice) -> Result<(), Error> {
        self.seen.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

struct Harness {
    service: ConversationService,
    bus: Arc<EventBus>,
    conversations: Arc<InMemoryConversationRepository>,
    tickets: Arc<InMemoryTicketRepository>,
}

async fn harness(provider: &str) -> Harness {
    let registry = Provider::new();
    registry.register(EchoProvider).await;
    registry.register(DownProvider).await;
    let gateway = ResponseGateway::new(Arc::new(registry), provider)
        .with_timeout(Duration::from_secs(1))
        .with_max_retries(1);

    let bus = Arc::new(EventBus::new());
    let conversations = Arc::new(InMemoryConversationRepository::new());
    let tickets = Arc::new(InMemoryTicketRepository::new());
    let manager = Arc::new(TicketManager::new(tickets.clone(), bus.clone(), 0.7));

    let service = ConversationService::new(
        conversations.clone(),
        manager,
        LanguageDetector::new(LanguageCode::En, 8),
        Arc::new(SentimentAnalyzer::new(LanguageCode::En, Arc::new(clinicbot_common::traits::NoopTranslator))),
        Arc::new(gateway),
        bus.clone(),
    )
    .with_crm_targets(vec!["hubspot".to_string()]);

    Harness {
        service,
        bus,
        conversations,
        tickets,
    }
}

/// Waits for the first event matching `pick`.
async fn next_matching<F>(rx: &mut mpsc::Receiver<TriageEvent>, pick: F) -> Option<TriageEvent>
where
    F: Fn(&TriageEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        while let Some(evt) = rx.recv().await {
            if pick(&evt) {
                return Some(evt);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

#[tokio::test]
async fn self_harm_message_opens_critical_ticket() {
    let h = harness("echo").await;
    let mut rx = h.bus.subscribe(None).await;
    let conv = Uuid::new_v4();

    let resp = h
        .service
        .handle_message(InboundMessage::new(conv, "I want to hurt myself", Channel::WebWidget))
        .await;

    assert_eq!(resp.sentiment.urgency_score, 1.0);
    assert!(resp.sentiment.always_escalate);
    assert!(resp.ticket_opened);
    assert_eq!(resp.priority, Priority::Critical);
    assert!(resp.reply.starts_with("echo:"));

    let ticket_id = resp.ticket_id.expect("ticket id");
    let evt = next_matching(&mut rx, |e| matches!(e, TriageEvent::TicketOpened { .. }))
        .await
        .expect("TicketOpened published");
    match evt {
        TriageEvent::TicketOpened { ticket, lead } => {
            assert_eq!(ticket.ticket_id, ticket_id);
            assert_eq!(lead.ticket_id, ticket_id);
            assert_eq!(lead.priority, Priority::Critical);
            assert!(ticket.crm_sync_state.contains_key("hubspot"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert_eq!(h.tickets.tickets_for(conv).len(), 1);
}

#[tokio::test]
async fn informational_question_gets_a_normal_reply() {
    let h = harness("echo").await;
    let conv = Uuid::new_v4();

    let resp = h
        .service
        .handle_message(InboundMessage::new(conv, "What are your visiting hours?", Channel::WhatsApp))
        .await;

    assert!(!resp.ticket_opened);
    assert!(resp.ticket_id.is_none());
    assert!(resp.sentiment.urgency_score < 0.7);
    assert!(matches!(resp.priority, Priority::Low | Priority::Medium));
    assert_eq!(resp.language, LanguageCode::En);
    assert!(matches!(resp.reply_source, ReplySource::Provider { .. }));
    assert!(h.tickets.is_empty());

    let stored = h.conversations.get_conversation(conv).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 2);
    assert_eq!(stored.messages[0].sender, Sender::Patient);
    assert_eq!(stored.messages[1].sender, Sender::Assistant);
}

#[tokio::test]
async fn empty_message_is_neutral() {
    let h = harness("echo").await;
    let resp = h
        .service
        .handle_message(InboundMessage::new(Uuid::new_v4(), "   ", Channel::Cli))
        .await;

    assert_eq!(resp.sentiment.urgency_score, 0.0);
    assert_eq!(resp.sentiment.polarity, 0.0);
    assert_eq!(resp.sentiment.suggested_tone, Tone::Neutral);
    assert!(!resp.ticket_opened);
}

#[tokio::test]
async fn repeated_crisis_messages_share_one_ticket() {
    let h = harness("echo").await;
    let conv = Uuid::new_v4();

    let first = h
        .service
        .handle_message(InboundMessage::new(conv, "I want to hurt myself", Channel::Telegram))
        .await;
    let second = h
        .service
        .handle_message(InboundMessage::new(conv, "I took an overdose, please", Channel::Telegram))
        .await;

    assert!(first.ticket_opened);
    assert!(!second.ticket_opened);
    assert_eq!(second.sentiment.urgency_score, 1.0);
    assert_eq!(h.tickets.tickets_for(conv).len(), 1);
}

#[tokio::test]
async fn provider_outage_falls_back_and_is_announced() {
    let h = harness("down").await;
    let mut rx = h.bus.subscribe(None).await;
    let conv = Uuid::new_v4();

    let resp = h
        .service
        .handle_message(InboundMessage::new(conv, "Can I book an appointment for my son?", Channel::WebWidget))
        .await;

    assert!(!resp.reply.is_empty());
    match &resp.reply_source {
        ReplySource::Fallback(details) => {
            assert_eq!(details.provider, "down");
            assert_eq!(details.attempts, 2);
        }
        other => panic!("expected fallback, got {:?}", other),
    }

    let evt = next_matching(&mut rx, |e| matches!(e, TriageEvent::ProviderUnavailable { .. })).await;
    assert!(matches!(evt, Some(TriageEvent::ProviderUnavailable { conversation_id, .. }) if conversation_id == conv));
}

#[tokio::test]
async fn trend_flags_escalating_conversation() {
    let h = harness("echo").await;
    let conv = Uuid::new_v4();

    for text in [
        "Hello, I would like some information about the clinic",
        "Things are getting bad, I feel hopeless",
        "I want to end my life",
    ] {
        h.service
            .handle_message(InboundMessage::new(conv, text, Channel::WebWidget))
            .await;
    }

    let trend = h.service.conversation_trend(conv).await.unwrap();
    assert_eq!(trend.progression.len(), 3);
    assert!(trend.has_emergency);
    assert_eq!(trend.peak_urgency, 1.0);
    assert_eq!(trend.direction, TrendDirection::Emergency);

    assert!(h.service.conversation_trend(Uuid::new_v4()).await.is_err());
}

#[tokio::test]
async fn replies_and_alerts_survive_stuck_consumers() {
    let h = harness("echo").await;
    let recorder = Arc::new(RecordingNotifier::default());
    let worker = spawn_notification_worker(
        h.bus.clone(),
        vec![Arc::new(StalledNotifier), recorder.clone()],
        Duration::from_millis(100),
    )
    .await;
    // Reads nothing, so its one-slot queue is full after the first event.
    let _stuck = h.bus.subscribe(Some(1)).await;

    let rounds = 12;
    for _ in 0..rounds {
        let conv = Uuid::new_v4();
        let resp = tokio::time::timeout(
            Duration::from_secs(2),
            h.service.handle_message(InboundMessage::new(
                conv,
                "I want to hurt myself, my email is ana@example.com",
                Channel::WebWidget,
            )),
        )
        .await
        .expect("reply is not held up by event consumers");
        assert!(resp.ticket_opened);
    }

    let notices = tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let seen = recorder.seen();
            if seen.len() >= rounds {
                return seen;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("every ticket reaches the working notifier");
    for notice in &notices {
        let contact = notice.contact.as_ref().expect("opened notice carries contact");
        assert_eq!(contact.email.as_deref(), Some("ana@example.com"));
    }

    h.bus.shutdown();
    tokio::time::timeout(Duration::from_secs(2), worker)
        .await
        .expect("worker exits")
        .unwrap();
}

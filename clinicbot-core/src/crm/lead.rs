//! src/crm/lead.rs
//!
//! Builds the `LeadPayload` CRMs receive, pulling whatever contact details
//! the patient typed into the chat.

use once_cell::sync::Lazy;
use regex::Regex;

use clinicbot_common::models::{ContactInfo, Conversation, LeadPayload, Sender, SentimentResult, Ticket};

pub const LEAD_SOURCE: &str = "Chatbot";

/// Words that end a captured name: "my name is João and I need help".
const NAME_STOPWORDS: &[&str] = &[
    "and", "but", "or", "i", "i'm", "im", "e", "mas", "ou", "y", "pero", "et", "mais", "ed", "ma",
];

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b[a-z0-9._%+\-]+@[a-z0-9.\-]+\.[a-z]{2,}\b").expect("static regex")
});

// Optional country code, optional area code in parens, 8-9 digit local part.
static PHONE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+\d{1,3}[\s.-]?)?(?:\(?\d{2,3}\)?[\s.-]?)?\d{4,5}[\s.-]?\d{4}\b").expect("static regex")
});

static NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:my name is|i am called|meu nome é|me chamo|me llamo|mi nombre es|je m'appelle|mon nom est|mi chiamo|il mio nome è)\s+([\p{L}][\p{L}'\-]*(?:\s+[\p{L}][\p{L}'\-]*){0,2})",
    )
    .expect("static regex")
});

/// Scans one message for contact details.
pub fn extract_contact(text: &str) -> ContactInfo {
    let email = EMAIL_RE.find(text).map(|m| m.as_str().to_lowercase());

    // Strip emails first so digits inside them are not read as a phone.
    let without_email = EMAIL_RE.replace_all(text, " ");
    let phone = PHONE_RE.find(&without_email).map(|m| {
        let raw = m.as_str();
        let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
        if raw.trim_start().starts_with('+') {
            format!("+{}", digits)
        } else {
            digits
        }
    });

    let name = NAME_RE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| {
            m.as_str()
                .split_whitespace()
                .take_while(|w| !NAME_STOPWORDS.contains(&w.to_lowercase().as_str()))
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|n| !n.is_empty())
        .map(|n| title_case(&n));

    ContactInfo { name, email, phone }
}

/// Merges details across the patient's messages; the latest mention wins.
pub fn contact_from_conversation(conversation: &Conversation) -> ContactInfo {
    conversation
        .patient_texts()
        .into_iter()
        .map(extract_contact)
        .fold(ContactInfo::default(), |acc, found| ContactInfo {
            name: found.name.or(acc.name),
            email: found.email.or(acc.email),
            phone: found.phone.or(acc.phone),
        })
}

pub fn build_lead(
    ticket: &Ticket,
    conversation: &Conversation,
    sentiment: Option<&SentimentResult>,
    message: &str,
) -> LeadPayload {
    LeadPayload {
        ticket_id: ticket.ticket_id,
        conversation_id: conversation.conversation_id,
        priority: ticket.priority,
        urgency_score: sentiment.map(|s| s.urgency_score).unwrap_or_default(),
        language: conversation.language,
        channel: conversation.channel,
        message: message.to_string(),
        contact: contact_from_conversation(conversation),
        source: LEAD_SOURCE.to_string(),
        transcript: format_transcript(conversation),
    }
}

/// Plain-text chat log for a CRM note. Empty for an empty conversation.
pub fn format_transcript(conversation: &Conversation) -> String {
    if conversation.messages.is_empty() {
        return String::new();
    }
    let mut out = format!(
        "=== Chatbot conversation {} ({}, {}) ===\n\n",
        conversation.conversation_id, conversation.channel, conversation.language
    );
    for m in &conversation.messages {
        let who = match m.sender {
            Sender::Patient => "PATIENT",
            Sender::Assistant => "BOT",
            Sender::Staff => "STAFF",
        };
        out.push_str(&format!("[{}] {}: {}\n", m.timestamp.format("%Y-%m-%d %H:%M UTC"), who, m.text));
    }
    out
}

fn title_case(name: &str) -> String {
    name.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicbot_common::models::{Channel, LanguageCode, Message, Sender};
    use uuid::Uuid;

    #[test]
    fn finds_email_and_phone() {
        let c = extract_contact("pode ligar (11) 98765-4321 ou mandar para Ana.Souza@Mail.com");
        assert_eq!(c.email.as_deref(), Some("ana.souza@mail.com"));
        assert_eq!(c.phone.as_deref(), Some("11987654321"));
        assert!(c.name.is_none());
    }

    #[test]
    fn finds_names_in_several_languages() {
        assert_eq!(extract_contact("Hi, my name is john smith").name.as_deref(), Some("John Smith"));
        assert_eq!(extract_contact("olá, meu nome é maria").name.as_deref(), Some("Maria"));
        assert_eq!(extract_contact("je m'appelle Élodie").name.as_deref(), Some("Élodie"));
        assert_eq!(extract_contact("Buenas, me llamo Carlos").name.as_deref(), Some("Carlos"));
    }

    #[test]
    fn name_stops_at_connectors() {
        assert_eq!(
            extract_contact("my name is João and I need help").name.as_deref(),
            Some("João")
        );
        assert_eq!(
            extract_contact("me chamo ana souza e preciso de ajuda").name.as_deref(),
            Some("Ana Souza")
        );
        assert_eq!(extract_contact("my name is and").name, None);
    }

    #[test]
    fn transcript_lists_every_turn() {
        let id = Uuid::new_v4();
        let mut conv = Conversation::new(id, LanguageCode::En, Channel::WebWidget);
        assert_eq!(format_transcript(&conv), "");

        conv.messages.push(Message::new(id, Sender::Patient, "I need help", LanguageCode::En));
        conv.messages.push(Message::new(id, Sender::Assistant, "We are here for you", LanguageCode::En));
        let transcript = format_transcript(&conv);
        assert!(transcript.starts_with(&format!("=== Chatbot conversation {}", id)));
        assert!(transcript.contains("PATIENT: I need help\n"));
        assert!(transcript.contains("BOT: We are here for you\n"));
    }

    #[test]
    fn international_prefix_is_kept() {
        let c = extract_contact("call me at +44 20 7946 0958");
        assert_eq!(c.phone.as_deref(), Some("+442079460958"));
    }

    #[test]
    fn later_messages_override_earlier_ones() {
        let id = Uuid::new_v4();
        let mut conv = Conversation::new(id, LanguageCode::En, Channel::WebWidget);
        conv.messages.push(Message::new(id, Sender::Patient, "my email is old@example.com", LanguageCode::En));
        conv.messages.push(Message::new(id, Sender::Assistant, "write to help@clinic.com", LanguageCode::En));
        conv.messages.push(Message::new(id, Sender::Patient, "actually use new@example.com", LanguageCode::En));

        let contact = contact_from_conversation(&conv);
        assert_eq!(contact.email.as_deref(), Some("new@example.com"));
        assert!(contact.phone.is_none());
    }
}

// src/repositories/postgres/conversations.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use clinicbot_common::models::{Channel, Conversation, LanguageCode, Message, Sender};
use clinicbot_common::traits::ConversationRepository;
use clinicbot_common::Error;

pub struct PostgresConversationRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresConversationRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn load_messages(&self, conversation_id: Uuid) -> Result<Vec<Message>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT message_id, conversation_id, sender, text, language, created_at
            FROM messages
            WHERE conversation_id = $1
            ORDER BY created_at ASC, seq ASC
            "#,
        )
            .bind(conversation_id)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_message).collect()
    }
}

fn row_to_message(r: &PgRow) -> Result<Message, Error> {
    Ok(Message {
        message_id: r.try_get("message_id")?,
        conversation_id: r.try_get("conversation_id")?,
        sender: r.try_get::<String, _>("sender")?.parse::<Sender>()?,
        text: r.try_get("text")?,
        language: r.try_get::<String, _>("language")?.parse::<LanguageCode>()?,
        timestamp: r.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

#[async_trait]
impl ConversationRepository for PostgresConversationRepository {
    async fn get_or_create(
        &self,
        conversation_id: Uuid,
        language: LanguageCode,
        channel: Channel,
    ) -> Result<Conversation, Error> {
        sqlx::query(
            r#"
            INSERT INTO conversations (conversation_id, language, channel, started_at)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (conversation_id) DO NOTHING
            "#,
        )
            .bind(conversation_id)
            .bind(language.as_str())
            .bind(channel.to_string())
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        self.get_conversation(conversation_id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("conversation {}", conversation_id)))
    }

    async fn get_conversation(&self, conversation_id: Uuid) -> Result<Option<Conversation>, Error> {
        let row = sqlx::query(
            r#"
            SELECT conversation_id, language, channel, started_at
            FROM conversations
            WHERE conversation_id = $1
            "#,
        )
            .bind(conversation_id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(r) = row else {
            return Ok(None);
        };

        let messages = self.load_messages(conversation_id).await?;
        Ok(Some(Conversation {
            conversation_id: r.try_get("conversation_id")?,
            language: r.try_get::<String, _>("language")?.parse::<LanguageCode>()?,
            channel: r.try_get::<String, _>("channel")?.parse::<Channel>()?,
            started_at: r.try_get::<DateTime<Utc>, _>("started_at")?,
            messages,
            active_ticket: None,
        }))
    }

    async fn append_message(&self, message: &Message) -> Result<(), Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO messages (message_id, conversation_id, sender, text, language, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (message_id) DO NOTHING
            "#,
        )
            .bind(message.message_id)
            .bind(message.conversation_id)
            .bind(message.sender.to_string())
            .bind(&message.text)
            .bind(message.language.as_str())
            .bind(message.timestamp)
            .execute(&self.pool)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_foreign_key_violation() => {
                Err(Error::NotFound(format!("conversation {}", message.conversation_id)))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_language(&self, conversation_id: Uuid, language: LanguageCode) -> Result<(), Error> {
        let result = sqlx::query("UPDATE conversations SET language = $1 WHERE conversation_id = $2")
            .bind(language.as_str())
            .bind(conversation_id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("conversation {}", conversation_id)));
        }
        Ok(())
    }
}

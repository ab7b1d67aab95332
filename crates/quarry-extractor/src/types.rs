//! Request types and the batch wire format

use quarry_domain::CorrelationId;
use serde::{Deserialize, Serialize};

/// One outbound extraction request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    /// Correlation id linking the request to its result
    pub correlation_id: CorrelationId,

    /// Category the request extracts
    pub category: String,

    /// Source document name
    pub source_document: String,

    /// System message sent
    pub system_message: String,

    /// User message sent (instructions + document text)
    pub user_message: String,

    /// Model name
    pub model: String,

    /// Completion token cap
    pub max_completion_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl ExtractionRequest {
    /// Encoded correlation id
    pub fn id(&self) -> String {
        self.correlation_id.encode()
    }

    /// Batch API line targeting `url`
    pub fn to_batch_line(&self, url: &str) -> BatchRequestLine {
        BatchRequestLine {
            custom_id: self.id(),
            method: "POST".to_string(),
            url: url.to_string(),
            body: ChatBody {
                model: self.model.clone(),
                messages: vec![
                    ChatMessage {
                        role: "system".to_string(),
                        content: self.system_message.clone(),
                    },
                    ChatMessage {
                        role: "user".to_string(),
                        content: self.user_message.clone(),
                    },
                ],
                max_completion_tokens: self.max_completion_tokens,
                temperature: self.temperature,
            },
        }
    }

    /// Audit entry recording exactly what was sent
    pub fn audit_entry(&self) -> AuditEntry {
        AuditEntry {
            correlation_id: self.id(),
            category: self.category.clone(),
            source_document: self.source_document.clone(),
            model: self.model.clone(),
            system_message: self.system_message.clone(),
            user_message: self.user_message.clone(),
        }
    }
}

/// One line of the batch input file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRequestLine {
    /// Correlation id echoed back in the output
    pub custom_id: String,
    /// HTTP method, always `POST`
    pub method: String,
    /// Target endpoint
    pub url: String,
    /// Chat completion body
    pub body: ChatBody,
}

/// Chat completion request body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatBody {
    /// Model name
    pub model: String,
    /// Conversation
    pub messages: Vec<ChatMessage>,
    /// Completion token cap
    pub max_completion_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// `system` or `user`
    pub role: String,
    /// Message text
    pub content: String,
}

/// Exact instructions sent for one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Correlation id
    pub correlation_id: String,
    /// Category
    pub category: String,
    /// Source document
    pub source_document: String,
    /// Model name
    pub model: String,
    /// System message
    pub system_message: String,
    /// User message
    pub user_message: String,
}

/// Serialize requests to newline-delimited batch lines
pub fn to_jsonl(requests: &[ExtractionRequest], url: &str) -> Result<String, serde_json::Error> {
    let mut out = String::new();
    for request in requests {
        out.push_str(&serde_json::to_string(&request.to_batch_line(url))?);
        out.push('\n');
    }
    Ok(out)
}

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::assistant::{
    client::{ChatModel, DiseasePredictor},
    dto::ChatMessage,
};

/// The model is told to end the interview with this phrase; seeing it in a
/// reply means the symptoms are complete and ready for prediction.
pub const SUMMARY_MARKER: &str = "Here is a summary of your symptoms and information";

pub const SYSTEM_PROMPT: &str = "You are a careful healthcare assistant. Ask the patient short \
follow-up questions about their symptoms, their duration and severity, age and relevant history. \
When you have enough information, reply with a single message that starts with \
\"Here is a summary of your symptoms and information\" followed by a concise summary. \
Do not give a diagnosis yourself.";

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ConverseOutcome {
    Conversation(Vec<ChatMessage>),
    Prediction(Value),
}

pub fn contains_summary(content: &str) -> bool {
    content.contains(SUMMARY_MARKER)
}

/// Append the user's turn, ask the model for the next one, and hand the
/// summary to the predictor once the interview is finished.
pub async fn converse(
    chat: &dyn ChatModel,
    predictor: &dyn DiseasePredictor,
    new_message: &str,
    mut history: Vec<ChatMessage>,
) -> anyhow::Result<ConverseOutcome> {
    history.retain(|m| m.role != "system");
    history.push(ChatMessage::user(new_message));

    let mut prompt = Vec::with_capacity(history.len() + 1);
    prompt.push(ChatMessage::system(SYSTEM_PROMPT));
    prompt.extend(history.iter().cloned());

    let reply = chat.complete(&prompt).await?;
    if contains_summary(&reply.content) {
        info!("symptom summary complete; predicting disease");
        let prediction = predictor.predict(&reply.content).await?;
        return Ok(ConverseOutcome::Prediction(prediction));
    }

    history.push(reply);
    Ok(ConverseOutcome::Conversation(history))
}

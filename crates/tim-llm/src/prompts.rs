//! Prompt text for each oracle and responder capability.

pub const FORGET_SYSTEM: &str = "You maintain an agent's long-term memory of short factual thoughts. \
Identify thoughts that are contradicted by another thought in the list or that describe an outdated state. \
Answer with a JSON array containing the exact text of each thought to remove, or [] if none.";

pub const MERGE_SYSTEM: &str = "You maintain an agent's long-term memory of short factual thoughts. \
Combine thoughts that state different facts about the same entity and relation into one thought. \
Copy every other thought verbatim. Answer with a JSON array of the resulting thoughts.";

pub const RESPOND_SYSTEM: &str = "You are a helpful assistant. \
Use the remembered thoughts when they are relevant to the question and ignore them otherwise.";

pub const POST_THINK_SYSTEM: &str = "Extract the single most useful fact from this exchange as one short \
self-contained sentence, for example \"The capital of China is Beijing.\" \
If the exchange holds nothing worth remembering, answer NONE.";

/// Marker the model uses for "no thought".
pub const NO_THOUGHT: &str = "NONE";

pub fn thought_list(thoughts: &[String]) -> String {
    serde_json::to_string_pretty(thoughts).unwrap_or_else(|_| thoughts.join("\n"))
}

/// User message for the forget and merge capabilities.
pub fn group_user(thoughts: &[String]) -> String {
    format!("Thoughts:\n{}", thought_list(thoughts))
}

pub fn respond_user(query: &str, recalled: &[String]) -> String {
    if recalled.is_empty() {
        return format!("Question: {query}");
    }
    format!(
        "Remembered thoughts:\n{}\n\nQuestion: {query}",
        recalled
            .iter()
            .map(|t| format!("- {t}"))
            .collect::<Vec<_>>()
            .join("\n")
    )
}

pub fn post_think_user(query: &str, response: &str) -> String {
    format!("Question: {query}\nAnswer: {response}")
}

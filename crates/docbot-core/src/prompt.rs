//! Model request assembly.

use crate::conversation::Turn;
use crate::llm::ChatMessage;

/// Separates the system prompt from the corpus in the system entry.
pub const CORPUS_DELIMITER: &str = "\n\n===== [Reference documents] =====\n";

/// System entry text: the prompt, then the corpus when there is one.
pub fn system_content(system_prompt: &str, corpus: &str) -> String {
    if corpus.is_empty() {
        return system_prompt.to_string();
    }
    let mut content =
        String::with_capacity(system_prompt.len() + CORPUS_DELIMITER.len() + corpus.len());
    content.push_str(system_prompt);
    content.push_str(CORPUS_DELIMITER);
    content.push_str(corpus);
    content
}

/// Build the ordered request: system entry, every stored turn, then the
/// question.
pub fn build_request(
    system_prompt: &str,
    corpus: &str,
    turns: &[Turn],
    question: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(turns.len() + 2);
    messages.push(ChatMessage::system(system_content(system_prompt, corpus)));
    messages.extend(turns.iter().map(ChatMessage::from));
    messages.push(ChatMessage::user(question));
    messages
}

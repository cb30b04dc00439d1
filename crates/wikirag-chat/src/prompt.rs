use wikirag_core::types::Passage;

const QA_TEMPLATE: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
{context}\n\nQuestion: {question}\nHelpful Answer:";

const CONDENSE_TEMPLATE: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.\n\n\
Chat History:\n{chat_history}\nFollow Up Input: {question}\nStandalone question:";

/// Passages joined by blank lines, in retrieval order.
pub fn render_context(passages: &[Passage]) -> String {
    passages.iter().map(|p| p.text.as_str()).collect::<Vec<_>>().join("\n\n")
}

pub fn qa_prompt(passages: &[Passage], question: &str) -> String {
    QA_TEMPLATE.replace("{context}", &render_context(passages)).replace("{question}", question)
}

pub fn condense_prompt(chat_history: &str, question: &str) -> String {
    CONDENSE_TEMPLATE.replace("{chat_history}", chat_history).replace("{question}", question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qa_prompt_carries_context_and_question() {
        let passages = vec![
            Passage { text: "Leaves hold chlorophyll.".into(), order: 0, source: 0 },
            Passage { text: "Chlorophyll absorbs light.".into(), order: 1, source: 0 },
        ];
        let p = qa_prompt(&passages, "Why are leaves green?");
        assert!(p.contains("Leaves hold chlorophyll.\n\nChlorophyll absorbs light."));
        assert!(p.ends_with("Question: Why are leaves green?\nHelpful Answer:"));
    }

    #[test]
    fn condense_prompt_lists_history() {
        let p = condense_prompt("Human: What is ATP?\nAssistant: Energy.", "Where is it made?");
        assert!(p.contains("Chat History:\nHuman: What is ATP?"));
        assert!(p.ends_with("Follow Up Input: Where is it made?\nStandalone question:"));
    }
}

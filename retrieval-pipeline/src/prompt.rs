use common::storage::index::ScoredChunk;

/// System prompt for the stuff composition strategy: every retrieved chunk
/// goes straight into the model's context.
pub const ANSWER_SYSTEM_PROMPT: &str =
    "Use the following pieces of context to answer the question at the end. \
     If you don't know the answer, just say that you don't know, don't try to make up an answer.";

pub fn stuff_context(chunks: &[ScoredChunk]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn create_user_message(chunks: &[ScoredChunk], query: &str) -> String {
    format!(
        r"
        Context Information:
        ==================
        {}

        User Question:
        ==================
        {}
        ",
        stuff_context(chunks),
        query
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, position: usize) -> ScoredChunk {
        ScoredChunk {
            text: text.to_string(),
            position,
            score: 0.5,
        }
    }

    #[test]
    fn user_message_contains_every_chunk_and_the_question() {
        let chunks = vec![chunk("first passage", 0), chunk("second passage", 3)];
        let message = create_user_message(&chunks, "what is the second passage?");

        assert!(message.contains("first passage"));
        assert!(message.contains("second passage"));
        assert!(message.contains("what is the second passage?"));
    }

    #[test]
    fn stuff_context_separates_chunks() {
        let context = stuff_context(&[chunk("a", 0), chunk("b", 1)]);
        assert_eq!(context, "a\n\nb");
    }

    #[test]
    fn empty_retrieval_still_produces_a_message() {
        let message = create_user_message(&[], "anything in here?");
        assert!(message.contains("anything in here?"));
    }
}

//! Word-bounded chunking.
//!
//! Text is split on whitespace and regrouped into chunks of at most `max_words` words joined by
//! single spaces. Chunks never overlap and keep the source word order, so concatenating them
//! with spaces reproduces the whitespace-normalized input.

use super::types::ChunkingError;

/// Split `text` into ordered chunks of at most `max_words` words.
///
/// Returns an empty vector for blank input.
pub fn split_text(text: &str, max_words: usize) -> Result<Vec<String>, ChunkingError> {
    if max_words == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }

    let words: Vec<&str> = text.split_whitespace().collect();
    Ok(words
        .chunks(max_words)
        .map(|window| window.join(" "))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn split_text_groups_words() {
        let chunks = split_text("one two three four five", 2).unwrap();
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn split_text_handles_blank_input() {
        assert!(split_text("", 4).unwrap().is_empty());
        assert!(split_text(" \n\t ", 4).unwrap().is_empty());
    }

    #[test]
    fn split_text_normalizes_whitespace() {
        let chunks = split_text("  Artificial\nintelligence   is\ttransforming industries.  ", 50)
            .unwrap();
        assert_eq!(
            chunks,
            vec!["Artificial intelligence is transforming industries."]
        );
    }

    #[test]
    fn split_text_rejects_zero_chunk_size() {
        let error = split_text("hello", 0).unwrap_err();
        assert!(matches!(error, ChunkingError::InvalidChunkSize));
    }

    proptest! {
        #[test]
        fn chunks_reconstruct_the_word_sequence(
            words in prop::collection::vec("[a-zA-Z0-9.,]{1,8}", 0..200),
            max_words in 1usize..40,
        ) {
            let text = words.join(" \n ");
            let chunks = split_text(&text, max_words).unwrap();

            prop_assert_eq!(chunks.join(" "), words.join(" "));
            prop_assert_eq!(chunks.len(), words.len().div_ceil(max_words));
            for chunk in &chunks {
                let count = chunk.split_whitespace().count();
                prop_assert!(count >= 1 && count <= max_words);
            }
        }

        #[test]
        fn splitting_is_deterministic(text in ".{0,300}", max_words in 1usize..20) {
            prop_assert_eq!(split_text(&text, max_words).unwrap(), split_text(&text, max_words).unwrap());
        }
    }
}

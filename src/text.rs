use tracing::debug;

/// Normalize a raw transcript: sentence-case each sentence and collapse
/// whitespace.
///
/// Sentences are delimited by words ending in `.`, `!` or `?`. A trailing
/// run of words without terminal punctuation is kept as a final sentence.
/// The first character of each sentence is upper-cased; a single-character
/// sentence is upper-cased as a whole. Empty input is returned unchanged.
#[must_use]
pub fn normalize(text: &str) -> String {
    if text.is_empty() {
        return text.to_owned();
    }

    let mut sentences: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for word in text.split_whitespace() {
        current.push(word);
        if word.ends_with(['.', '!', '?']) {
            sentences.push(current.join(" "));
            current.clear();
        }
    }
    if !current.is_empty() {
        sentences.push(current.join(" "));
    }

    let processed: Vec<String> = sentences
        .iter()
        .filter(|s| !s.is_empty())
        .map(|s| capitalize(s))
        .collect();

    let result = processed.join(" ");
    debug!(sentences = processed.len(), "transcript normalized");
    result
}

fn capitalize(sentence: &str) -> String {
    let mut chars = sentence.chars();
    match chars.next() {
        None => String::new(),
        Some(first) if sentence.chars().count() == 1 => first.to_uppercase().collect(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capitalizes_sentences() {
        assert_eq!(
            normalize("hello world. this is great!"),
            "Hello world. This is great!"
        );
    }

    #[test]
    fn test_empty_input_unchanged() {
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_trailing_sentence_without_punctuation() {
        assert_eq!(normalize("first part. and then some"), "First part. And then some");
    }

    #[test]
    fn test_single_character_sentence() {
        assert_eq!(normalize("a"), "A");
        assert_eq!(normalize("i. went home."), "I. Went home.");
    }

    #[test]
    fn test_question_and_exclamation_boundaries() {
        assert_eq!(
            normalize("really? yes! of course."),
            "Really? Yes! Of course."
        );
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(normalize("hello   world.  next one."), "Hello world. Next one.");
    }

    #[test]
    fn test_idempotent_on_normalized_text() {
        let once = normalize("some words here. more words there!");
        assert_eq!(normalize(&once), once);
    }

    #[test]
    fn test_sentence_count_preserved() {
        let input = "one. two! three? four";
        let output = normalize(input);
        let count = |s: &str| {
            let mut n = 0;
            let mut open = false;
            for w in s.split_whitespace() {
                open = true;
                if w.ends_with(['.', '!', '?']) {
                    n += 1;
                    open = false;
                }
            }
            if open {
                n += 1;
            }
            n
        };
        assert_eq!(count(input), count(&output));
    }

    #[test]
    fn test_already_capitalized_passthrough() {
        assert_eq!(normalize("Hello there."), "Hello there.");
    }

    #[test]
    fn test_non_ascii_first_character() {
        assert_eq!(normalize("éclair for breakfast."), "Éclair for breakfast.");
    }
}

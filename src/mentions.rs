//! Extraction of trailing `@mention` directives.
//!
//! A message may end with a run of whitespace-separated `@word` tokens that
//! act as per-turn directives (for example `@ground`).  They are removed from
//! the text before it is sent to a model.

/// Splits `text` into the unconsumed prefix and the trailing mentions.
///
/// The scan runs from the end of the string.  Each step skips whitespace
/// (newlines included) and then takes the maximal run of letters and `@`
/// characters that ends there.  The run is a mention only if it starts with
/// `@` and has at least one character after it; otherwise collection stops
/// and everything not yet consumed stays in the prefix.
///
/// Mentions are returned without their `@`, in the order they appear in the
/// input.  The prefix has the trailing mention run and the whitespace
/// separating it removed; trailing whitespace is trimmed even when no
/// mention is found.
///
/// ```
/// use promptline::mentions_from_end;
///
/// let (prefix, mentions) = mentions_from_end("Is it raining? @ground");
/// assert_eq!(prefix, "Is it raining?");
/// assert_eq!(mentions, vec!["ground"]);
///
/// let (prefix, mentions) = mentions_from_end("Some text @excited!");
/// assert_eq!(prefix, "Some text @excited!");
/// assert!(mentions.is_empty());
/// ```
pub fn mentions_from_end(text: &str) -> (&str, Vec<&str>) {
    let mut end = text.len();
    let mut mentions = Vec::new();

    loop {
        let trimmed = text[..end].trim_end();
        end = trimmed.len();
        if trimmed.is_empty() {
            break;
        }
        let token_end = end;
        let token_start = trimmed
            .char_indices()
            .rev()
            .take_while(|(_, c)| c.is_alphabetic() || *c == '@')
            .last()
            .map(|(idx, _)| idx)
            .unwrap_or(token_end);
        let token = &trimmed[token_start..token_end];
        match token.strip_prefix('@') {
            Some(name) if !name.is_empty() && !name.contains('@') => {
                mentions.push(name);
                end = token_start;
            }
            _ => break,
        }
    }

    mentions.reverse();
    (&text[..end], mentions)
}

//! Inline `+tag` parsing.
//!
//! A tag token is a `+` followed by one or more non-space characters, and runs
//! until the next space or the end of the input. Tokens are removed from the
//! text; when the character right before a token is a space, that single
//! space goes with it so `"a +b c"` becomes `"a c"`.

/// Result of [`parse_tags`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTags {
    /// Labels in order of appearance, without the leading `+`.
    pub tags: Vec<String>,
    /// Input with every token removed, trimmed.
    pub rest: String,
}

impl ParsedTags {
    /// Tasks carry a single tag; only the first one counts.
    pub fn first_tag(&self) -> Option<&str> {
        self.tags.first().map(String::as_str)
    }
}

pub fn parse_tags(input: &str) -> ParsedTags {
    let bytes = input.as_bytes();
    let mut tags = Vec::new();
    let mut rest = String::with_capacity(input.len());
    // Start of the text not yet copied into `rest`.
    let mut copied = 0;
    let mut pos = 0;

    while pos < bytes.len() {
        if bytes[pos] != b'+' || !bytes.get(pos + 1).is_some_and(|b| *b != b' ') {
            pos += 1;
            continue;
        }

        let end = bytes[pos + 1..]
            .iter()
            .position(|b| *b == b' ')
            .map_or(bytes.len(), |offset| pos + 1 + offset);
        tags.push(input[pos + 1..end].to_string());

        let cut = if pos > copied && bytes[pos - 1] == b' ' {
            pos - 1
        } else {
            pos
        };
        rest.push_str(&input[copied..cut]);
        copied = end;
        pos = end;
    }
    rest.push_str(&input[copied..]);

    ParsedTags {
        tags,
        rest: rest.trim().to_string(),
    }
}

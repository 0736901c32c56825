//! Outbound message chunking
//!
//! Gateways cap message length (Discord-style gateways at 2000 chars).
//! Replies are split on sentence boundaries where possible, then word
//! boundaries, keeping code fences balanced across chunks. Applied to
//! outbound replies only; stored memory keeps the full text.

/// Split `content` into chunks of at most `max_length` characters
pub fn split_message(content: &str, max_length: usize) -> Vec<String> {
    if max_length == 0 || char_len(content) <= max_length {
        return vec![content.to_string()];
    }

    if content.contains("```") {
        split_with_fences(content, max_length)
    } else {
        split_text(content, max_length)
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Sentence-boundary splitting, falling back to words for oversized
/// sentences
fn split_text(content: &str, max_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for sentence in sentences(content) {
        let len = char_len(sentence);
        if current_len + len > max_length {
            if !current.trim().is_empty() {
                chunks.push(current.trim_end().to_string());
            }
            current.clear();
            current_len = 0;

            if len > max_length {
                let mut parts = split_words(sentence, max_length);
                if let Some(last) = parts.pop() {
                    chunks.extend(parts);
                    current_len = char_len(&last);
                    current = last;
                }
            } else {
                current.push_str(sentence);
                current_len = len;
            }
        } else {
            current.push_str(sentence);
            current_len += len;
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

/// Split after `.`/`!`/`?` followed by whitespace, and after newlines
fn sentences(content: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut previous_terminator = false;

    for (idx, ch) in content.char_indices() {
        if previous_terminator && ch.is_whitespace() {
            let end = idx + ch.len_utf8();
            parts.push(&content[start..end]);
            start = end;
            previous_terminator = false;
            continue;
        }
        previous_terminator = matches!(ch, '.' | '!' | '?') || ch == '\n';
        if ch == '\n' {
            let end = idx + ch.len_utf8();
            parts.push(&content[start..end]);
            start = end;
            previous_terminator = false;
        }
    }
    if start < content.len() {
        parts.push(&content[start..]);
    }
    parts
}

/// Word-boundary splitting, chunking single words that exceed the limit
fn split_words(text: &str, max_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in text.split_whitespace() {
        let len = char_len(word);
        let needed = if current.is_empty() { len } else { len + 1 };

        if current_len + needed > max_length {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if len > max_length {
                let cs: Vec<char> = word.chars().collect();
                for piece in cs.chunks(max_length) {
                    chunks.push(piece.iter().collect());
                }
                continue;
            }
            current.push_str(word);
            current_len = len;
        } else {
            if !current.is_empty() {
                current.push(' ');
            }
            current.push_str(word);
            current_len += needed;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Split while keeping ``` fences balanced in every emitted chunk
fn split_with_fences(content: &str, max_length: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for segment in fence_segments(content) {
        match segment {
            Segment::Text(text) => {
                for part in split_text(text, max_length) {
                    let sep = usize::from(!current.is_empty());
                    if char_len(&current) + sep + char_len(&part) > max_length {
                        if !current.trim().is_empty() {
                            chunks.push(current.trim_end().to_string());
                        }
                        current = part;
                    } else {
                        if !current.is_empty() {
                            current.push('\n');
                        }
                        current.push_str(&part);
                    }
                }
            }
            Segment::Code(block) => {
                let len = char_len(block);
                if len > max_length {
                    if !current.trim().is_empty() {
                        chunks.push(current.trim_end().to_string());
                        current.clear();
                    }
                    chunks.extend(split_code_block(block, max_length));
                } else if char_len(&current) + len > max_length {
                    if !current.trim().is_empty() {
                        chunks.push(current.trim_end().to_string());
                    }
                    current = block.to_string();
                } else {
                    current.push_str(block);
                }
            }
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim_end().to_string());
    }
    chunks
}

enum Segment<'a> {
    Text(&'a str),
    Code(&'a str),
}

/// Alternate text and fenced-code segments; an unterminated fence is
/// treated as plain text
fn fence_segments(content: &str) -> Vec<Segment<'_>> {
    let mut segments = Vec::new();
    let mut rest = content;

    while let Some(open) = rest.find("```") {
        match rest[open + 3..].find("```") {
            Some(close) => {
                let end = open + 3 + close + 3;
                if open > 0 {
                    segments.push(Segment::Text(&rest[..open]));
                }
                segments.push(Segment::Code(&rest[open..end]));
                rest = &rest[end..];
            }
            None => break,
        }
    }
    if !rest.is_empty() {
        segments.push(Segment::Text(rest));
    }
    segments
}

/// Split one oversized code block by lines, re-opening the fence (and
/// its language tag) in every chunk
fn split_code_block(block: &str, max_length: usize) -> Vec<String> {
    let mut lines = block.lines();
    let header = lines.next().unwrap_or("```").to_string();
    let footer = "\n```";
    let budget = max_length.saturating_sub(char_len(&header) + char_len(footer) + 1);

    let mut chunks = Vec::new();
    let mut body = String::new();

    for line in lines {
        if line.trim_end() == "```" {
            continue;
        }
        if char_len(line) > budget {
            // a single oversized line is chunked by chars, like an
            // oversized word in plain text
            if !body.is_empty() {
                chunks.push(format!("{header}\n{body}{footer}"));
                body.clear();
            }
            let cs: Vec<char> = line.chars().collect();
            for piece in cs.chunks(budget.max(1)) {
                let piece: String = piece.iter().collect();
                chunks.push(format!("{header}\n{piece}{footer}"));
            }
            continue;
        }
        if !body.is_empty() && char_len(&body) + char_len(line) + 1 > budget {
            chunks.push(format!("{header}\n{body}{footer}"));
            body.clear();
        }
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str(line);
    }
    if !body.is_empty() {
        chunks.push(format!("{header}\n{body}{footer}"));
    }
    chunks
}

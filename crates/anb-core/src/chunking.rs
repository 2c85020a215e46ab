//! Splitting long replies into messages the chat transport accepts.

/// Pack `text` into chunks of at most `limit` chars, breaking only between lines.
///
/// Concatenating the result gives back `text` exactly, unless a single line is
/// longer than `limit`. Such a line loses its HTML tags and is then cut at char
/// boundaries, never inside an entity like `&amp;`.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut out = Vec::new();
    let mut chunk = String::new();
    let mut chunk_len = 0usize;

    for raw in text.split_inclusive('\n') {
        let mut line = std::borrow::Cow::Borrowed(raw);
        let mut line_len = line.chars().count();
        if line_len > limit {
            line = std::borrow::Cow::Owned(strip_tags(raw));
            line_len = line.chars().count();
        }

        if chunk_len + line_len <= limit {
            chunk.push_str(&line);
            chunk_len += line_len;
            continue;
        }

        if !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
            chunk_len = 0;
        }

        if line_len <= limit {
            chunk.push_str(&line);
            chunk_len = line_len;
            continue;
        }

        let mut rest: &str = &line;
        while !rest.is_empty() {
            let (head, tail) = split_plain(rest, limit);
            if tail.is_empty() {
                chunk.push_str(head);
                chunk_len = head.chars().count();
            } else {
                out.push(head.to_string());
            }
            rest = tail;
        }
    }

    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}

/// Drop `<...>` tags. Rendered text has `<` escaped, so every `<` opens a tag.
fn strip_tags(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_tag = false;
    for c in line.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

// Longest named entity we emit is `&quot;`.
const MAX_ENTITY_CHARS: usize = 6;

/// Cut after at most `max_chars` chars, moving the cut back before an open entity.
fn split_plain(s: &str, max_chars: usize) -> (&str, &str) {
    // (byte index, char position) of an unterminated `&`
    let mut entity: Option<(usize, usize)> = None;
    for (pos, (idx, c)) in s.char_indices().enumerate() {
        if pos == max_chars {
            let cut = match entity {
                Some((start, start_pos)) if start > 0 && pos - start_pos < MAX_ENTITY_CHARS => {
                    start
                }
                _ => idx,
            };
            return s.split_at(cut);
        }
        match c {
            '&' => entity = Some((idx, pos)),
            ';' => entity = None,
            c if c.is_whitespace() => entity = None,
            _ => {}
        }
    }
    (s, "")
}

//! Splitting post content into publishable chunks.

/// Maximum characters in one published message.
pub const MAX_CHUNK_LEN: usize = 4096;

/// Splits `content` into chunks of at most `limit` characters.
///
/// Each cut is placed right after the last whitespace inside the window, so
/// words stay whole and the whitespace ends the preceding chunk. A window with
/// no whitespace is cut at exactly `limit` characters. Concatenating the
/// chunks yields `content` unchanged, and content already within the limit is
/// returned as a single chunk.
///
/// Lengths are counted in characters, never bytes, so a cut never lands inside
/// a multi-byte character.
#[must_use]
pub fn chunk_content(content: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut rest = content;

    while let Some((window_end, _)) = rest.char_indices().nth(limit) {
        let window = &rest[..window_end];
        let cut = window
            .char_indices()
            .rev()
            .find(|(_, c)| c.is_whitespace())
            .map_or(window_end, |(index, c)| index + c.len_utf8());
        let (chunk, tail) = rest.split_at(cut);
        chunks.push(chunk.to_owned());
        rest = tail;
    }

    chunks.push(rest.to_owned());
    chunks
}

/// A piece of the composed message: free text, or an atomic mention token
/// referring to a dataset by file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Mention(String),
}

impl Segment {
    /// Length of this segment in canonical-text characters. A mention
    /// renders as `@name`.
    fn canonical_chars(&self) -> usize {
        match self {
            Segment::Text(s) => s.chars().count(),
            Segment::Mention(name) => 1 + name.chars().count(),
        }
    }
}

/// Cursor position: index of a segment plus a character offset within it.
///
/// After any document mutation the cursor points into a `Text` segment, or
/// to `(segments.len(), 0)` when the document is empty or ends with a
/// mention. A cursor placed directly on a `Mention` segment models the
/// selection sitting inside a chip; the mention-query scan treats that as
/// "no query".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Cursor {
    pub segment: usize,
    pub offset: usize,
}

/// The composer's document: an ordered list of segments and a cursor.
///
/// Invariants kept by `normalize`:
/// - no empty `Text` segments, no two adjacent `Text` segments;
/// - at most one mention per dataset name;
/// - concatenating segments (mentions as `@name`) yields the canonical
///   plain-text form of the message.
#[derive(Debug, Clone, Default)]
pub struct Document {
    segments: Vec<Segment>,
    cursor: Cursor,
}

fn byte_index(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    pub fn set_cursor(&mut self, segment: usize, offset: usize) {
        self.cursor = Cursor { segment, offset };
    }

    /// The plain-text serialization, with mentions rendered as `@name`.
    pub fn canonical_text(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(s) => out.push_str(s),
                Segment::Mention(name) => {
                    out.push('@');
                    out.push_str(name);
                }
            }
        }
        out
    }

    pub fn is_blank(&self) -> bool {
        self.canonical_text().trim().is_empty()
    }

    pub fn token_names(&self) -> Vec<String> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                Segment::Mention(name) => Some(name.clone()),
                Segment::Text(_) => None,
            })
            .collect()
    }

    pub fn contains_token(&self, name: &str) -> bool {
        self.segments
            .iter()
            .any(|s| matches!(s, Segment::Mention(n) if n == name))
    }

    /// Whether the cursor currently sits on a mention chip.
    pub fn cursor_in_mention(&self) -> bool {
        matches!(
            self.segments.get(self.cursor.segment),
            Some(Segment::Mention(_))
        )
    }

    /// Canonical text from the start of the document to the cursor, or
    /// `None` when the cursor sits inside a mention chip.
    pub fn text_before_cursor(&self) -> Option<String> {
        if self.cursor_in_mention() {
            return None;
        }
        let mut out = String::new();
        for (i, segment) in self.segments.iter().enumerate() {
            if i == self.cursor.segment {
                if let Segment::Text(s) = segment {
                    let end = byte_index(s, self.cursor.offset);
                    out.push_str(&s[..end]);
                }
                return Some(out);
            }
            match segment {
                Segment::Text(s) => out.push_str(s),
                Segment::Mention(name) => {
                    out.push('@');
                    out.push_str(name);
                }
            }
        }
        Some(out)
    }

    pub fn clear(&mut self) {
        self.segments.clear();
        self.cursor = Cursor::default();
    }

    pub fn move_cursor_to_end(&mut self) {
        match self.segments.last() {
            Some(Segment::Text(s)) => {
                self.cursor = Cursor {
                    segment: self.segments.len() - 1,
                    offset: s.chars().count(),
                };
            }
            _ => {
                self.cursor = Cursor {
                    segment: self.segments.len(),
                    offset: 0,
                };
            }
        }
    }

    /// Insert plain text at the cursor.
    pub fn insert_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let chars = text.chars().count();
        let cur = self.cursor;
        if self.segments.is_empty() || cur.segment >= self.segments.len() {
            self.segments.push(Segment::Text(text.to_string()));
            self.cursor = Cursor {
                segment: self.segments.len() - 1,
                offset: chars,
            };
        } else {
            match &mut self.segments[cur.segment] {
                Segment::Text(s) => {
                    let at = byte_index(s, cur.offset);
                    s.insert_str(at, text);
                    self.cursor.offset += chars;
                }
                Segment::Mention(_) => {
                    // Before the chip for offset 0, after it otherwise.
                    let insert_at = if cur.offset == 0 {
                        cur.segment
                    } else {
                        cur.segment + 1
                    };
                    self.segments
                        .insert(insert_at, Segment::Text(text.to_string()));
                    self.cursor = Cursor {
                        segment: insert_at,
                        offset: chars,
                    };
                }
            }
        }
        self.normalize();
    }

    /// Insert a mention token at the cursor. Inserting a name that is
    /// already present anywhere in the document is a no-op.
    pub fn insert_mention(&mut self, name: &str) -> bool {
        if self.contains_token(name) {
            return false;
        }
        let cur = self.cursor;
        if self.segments.is_empty() || cur.segment >= self.segments.len() {
            self.segments.push(Segment::Mention(name.to_string()));
            self.cursor = Cursor {
                segment: self.segments.len(),
                offset: 0,
            };
        } else {
            match self.segments[cur.segment].clone() {
                Segment::Text(s) => {
                    let at = byte_index(&s, cur.offset);
                    let (left, right) = s.split_at(at);
                    let mut replacement = Vec::new();
                    if !left.is_empty() {
                        replacement.push(Segment::Text(left.to_string()));
                    }
                    replacement.push(Segment::Mention(name.to_string()));
                    let after_mention = cur.segment + replacement.len();
                    if !right.is_empty() {
                        replacement.push(Segment::Text(right.to_string()));
                    }
                    self.segments
                        .splice(cur.segment..=cur.segment, replacement);
                    self.cursor = Cursor {
                        segment: after_mention,
                        offset: 0,
                    };
                }
                Segment::Mention(_) => {
                    let insert_at = if cur.offset == 0 {
                        cur.segment
                    } else {
                        cur.segment + 1
                    };
                    self.segments
                        .insert(insert_at, Segment::Mention(name.to_string()));
                    self.cursor = Cursor {
                        segment: insert_at + 1,
                        offset: 0,
                    };
                }
            }
        }
        self.normalize();
        true
    }

    /// Append a mention (plus separating spaces) at the end of the document
    /// without disturbing existing content, then move the cursor to the end.
    /// Used when a dataset arrives from the upload pipeline.
    pub fn append_mention_at_end(&mut self, name: &str) -> bool {
        if self.contains_token(name) {
            return false;
        }
        if self.segments.is_empty() {
            self.segments.push(Segment::Mention(name.to_string()));
            self.segments.push(Segment::Text(" ".to_string()));
        } else {
            self.segments.push(Segment::Text(" ".to_string()));
            self.segments.push(Segment::Mention(name.to_string()));
            self.segments.push(Segment::Text(" ".to_string()));
        }
        self.move_cursor_to_end();
        self.normalize();
        true
    }

    /// Remove the mention for `name`, if present.
    pub fn remove_mention(&mut self, name: &str) -> bool {
        let Some(idx) = self
            .segments
            .iter()
            .position(|s| matches!(s, Segment::Mention(n) if n == name))
        else {
            return false;
        };
        self.segments.remove(idx);
        if self.cursor.segment > idx {
            self.cursor.segment -= 1;
        } else if self.cursor.segment == idx {
            self.cursor = Cursor {
                segment: idx,
                offset: 0,
            };
        }
        self.normalize();
        true
    }

    /// Delete the partially-typed `@query` trigger directly before the
    /// cursor and replace it with a mention for `name` followed by a space,
    /// leaving the cursor after the space. Returns false when the current
    /// text segment holds no `@` before the cursor.
    ///
    /// If the document already contains a token for `name`, the trigger text
    /// is still deleted but no second token is inserted.
    pub fn replace_mention_trigger(&mut self, name: &str) -> bool {
        let cur = self.cursor;
        let Some(Segment::Text(s)) = self.segments.get(cur.segment) else {
            return false;
        };
        let prefix_end = byte_index(s, cur.offset);
        let Some(at_byte) = s[..prefix_end].rfind('@') else {
            return false;
        };

        let s = s.clone();
        let left = s[..at_byte].to_string();
        let right = s[prefix_end..].to_string();
        let duplicate = self.contains_token(name);

        let mut replacement = Vec::new();
        if !left.is_empty() {
            replacement.push(Segment::Text(left));
        }
        if !duplicate {
            replacement.push(Segment::Mention(name.to_string()));
        }
        let cursor_segment = cur.segment + replacement.len();
        replacement.push(Segment::Text(format!(" {}", right)));
        self.segments.splice(cur.segment..=cur.segment, replacement);
        self.cursor = Cursor {
            segment: cursor_segment,
            offset: 1,
        };
        self.normalize();
        true
    }

    /// Delete up to `n` characters before the cursor within the current
    /// text segment. Chips are never crossed; use `backspace` to delete one.
    pub fn delete_before_cursor(&mut self, n: usize) {
        let cur = self.cursor;
        if let Some(Segment::Text(s)) = self.segments.get_mut(cur.segment) {
            let remove = n.min(cur.offset);
            if remove == 0 {
                return;
            }
            let start = byte_index(s, cur.offset - remove);
            let end = byte_index(s, cur.offset);
            s.replace_range(start..end, "");
            self.cursor.offset -= remove;
            self.normalize();
        }
    }

    /// Delete one character (or one whole mention chip) before the cursor.
    pub fn backspace(&mut self) {
        let cur = self.cursor;
        if self.segments.is_empty() {
            return;
        }
        if cur.segment >= self.segments.len() {
            // End of a document whose last segment is a mention.
            if matches!(self.segments.last(), Some(Segment::Mention(_))) {
                self.segments.pop();
                self.move_cursor_to_end();
            }
            self.normalize();
            return;
        }
        match &mut self.segments[cur.segment] {
            Segment::Text(s) => {
                if cur.offset > 0 {
                    let start = byte_index(s, cur.offset - 1);
                    let end = byte_index(s, cur.offset);
                    s.replace_range(start..end, "");
                    self.cursor.offset -= 1;
                } else if cur.segment > 0 {
                    // Chips delete atomically.
                    if matches!(self.segments[cur.segment - 1], Segment::Mention(_)) {
                        self.segments.remove(cur.segment - 1);
                        self.cursor.segment -= 1;
                    }
                }
            }
            Segment::Mention(_) => {
                self.segments.remove(cur.segment);
                self.cursor.offset = 0;
            }
        }
        self.normalize();
    }

    /// Logical cursor position in canonical-text characters.
    fn logical_cursor(&self) -> usize {
        let mut pos = 0;
        for (i, segment) in self.segments.iter().enumerate() {
            if i == self.cursor.segment {
                match segment {
                    Segment::Text(s) => {
                        return pos + self.cursor.offset.min(s.chars().count());
                    }
                    Segment::Mention(name) => {
                        return if self.cursor.offset == 0 {
                            pos
                        } else {
                            pos + 1 + name.chars().count()
                        };
                    }
                }
            }
            pos += segment.canonical_chars();
        }
        pos
    }

    /// Merge adjacent text segments, drop empty ones, and re-derive the
    /// cursor from its logical position.
    fn normalize(&mut self) {
        let logical = self.logical_cursor();

        let mut merged: Vec<Segment> = Vec::with_capacity(self.segments.len());
        for segment in self.segments.drain(..) {
            match segment {
                Segment::Text(s) if s.is_empty() => {}
                Segment::Text(s) => {
                    if let Some(Segment::Text(prev)) = merged.last_mut() {
                        prev.push_str(&s);
                    } else {
                        merged.push(Segment::Text(s));
                    }
                }
                mention => merged.push(mention),
            }
        }
        self.segments = merged;

        let mut remaining = logical;
        for (i, segment) in self.segments.iter().enumerate() {
            let span = segment.canonical_chars();
            match segment {
                Segment::Text(_) if remaining <= span => {
                    self.cursor = Cursor {
                        segment: i,
                        offset: remaining,
                    };
                    return;
                }
                Segment::Mention(_) if remaining < span => {
                    // Boundary positions only; land after the chip.
                    self.cursor = Cursor {
                        segment: i + 1,
                        offset: 0,
                    };
                    return;
                }
                _ => remaining -= span,
            }
        }
        self.cursor = Cursor {
            segment: self.segments.len(),
            offset: 0,
        };
    }
}

use crate::models::Dataset;

/// Transient state of the mention dropdown while a `@query` is being typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionQuery {
    /// Text typed after the `@`, possibly empty.
    pub query: String,
    /// Character offset of the `@` in the logical text before the cursor.
    pub trigger_offset: usize,
    /// Index of the highlighted candidate.
    pub selected: usize,
}

impl MentionQuery {
    pub fn new(query: String, trigger_offset: usize) -> Self {
        Self {
            query,
            trigger_offset,
            selected: 0,
        }
    }

    pub fn select_next(&mut self, candidate_count: usize) {
        if candidate_count == 0 {
            return;
        }
        self.selected = if self.selected + 1 < candidate_count {
            self.selected + 1
        } else {
            0
        };
    }

    pub fn select_prev(&mut self, candidate_count: usize) {
        if candidate_count == 0 {
            return;
        }
        self.selected = if self.selected > 0 {
            self.selected - 1
        } else {
            candidate_count - 1
        };
    }
}

/// Scan the logical text before the cursor for an active mention trigger.
///
/// A trigger is the last `@` in the text, active only while nothing after it
/// is whitespace. `None` input means the cursor sits inside a mention chip,
/// which always closes the dropdown.
pub fn extract_query(text_before_cursor: Option<&str>) -> Option<MentionQuery> {
    let text = text_before_cursor?;
    let chars: Vec<char> = text.chars().collect();
    let at_index = chars.iter().rposition(|&c| c == '@')?;
    let after: String = chars[at_index + 1..].iter().collect();
    if after.chars().any(char::is_whitespace) {
        return None;
    }
    Some(MentionQuery::new(after, at_index))
}

/// Candidates for the dropdown: catalog entries whose file name contains the
/// query, case-insensitively.
pub fn filter_candidates<'a>(catalog: &'a [Dataset], query: &str) -> Vec<&'a Dataset> {
    let needle = query.to_lowercase();
    catalog
        .iter()
        .filter(|d| d.name.to_lowercase().contains(&needle))
        .collect()
}

use std::collections::HashSet;
use std::sync::Arc;

use base64::prelude::*;
use regex::Regex;
use tracing::{debug, warn};

use super::document::Document;
use super::mention::{self, MentionQuery};
use crate::models::{ActiveDatasets, Dataset};
use crate::services::DatasetCatalog;

/// Everything the composer hands back on submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub text: String,
    pub images: Vec<String>,
}

/// Keyboard input relevant to the composer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    ArrowDown,
    ArrowUp,
    Enter { shift: bool },
    Tab,
    Escape,
    Backspace,
    Char(char),
}

/// What the embedding surface should do with a key event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyOutcome {
    /// Consumed; suppress the default behavior.
    Handled,
    /// Consumed and produced a message to send.
    Submitted(Submission),
    /// Not for us; let the surface apply its default.
    Ignored,
}

/// A file dropped on (or picked into) the chat surface.
#[derive(Debug, Clone)]
pub struct DroppedFile {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// The rich message input: free text interleaved with atomic dataset chips,
/// an `@`-triggered completion dropdown, and synchronization with the
/// externally-mutable set of active datasets.
pub struct MentionComposer {
    document: Document,
    images: Vec<String>,
    /// Names of datasets this composer has inserted chips for; diffed
    /// against the document after every edit to detect chip deletion.
    mentioned: HashSet<String>,
    dropdown: Option<MentionQuery>,
    active: ActiveDatasets,
    catalog: Arc<dyn DatasetCatalog>,
    mention_pattern: Regex,
}

impl MentionComposer {
    pub fn new(active: ActiveDatasets, catalog: Arc<dyn DatasetCatalog>) -> Self {
        Self {
            document: Document::new(),
            images: Vec::new(),
            mentioned: HashSet::new(),
            dropdown: None,
            active,
            catalog,
            mention_pattern: Regex::new(r"@(\S+\.(h5ad|json))")
                .expect("mention pattern is valid"),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    /// Direct access for the editing surface; call `content_changed` after
    /// applying raw edits.
    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn canonical_text(&self) -> String {
        self.document.canonical_text()
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    pub fn add_image(&mut self, data_url: String) {
        self.images.push(data_url);
    }

    pub fn remove_image(&mut self, index: usize) {
        if index < self.images.len() {
            self.images.remove(index);
        }
    }

    pub fn dropdown(&self) -> Option<&MentionQuery> {
        self.dropdown.as_ref()
    }

    /// Datasets matching the current dropdown query.
    pub fn dropdown_candidates(&self) -> Vec<Dataset> {
        let Some(query) = &self.dropdown else {
            return Vec::new();
        };
        let catalog = self.catalog.list();
        mention::filter_candidates(&catalog, &query.query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Recompute derived state after any document edit: reset a
    /// whitespace-only document to clean empty, detect chips the user
    /// deleted (detaching their datasets), and re-derive the mention query
    /// from the cursor.
    pub fn content_changed(&mut self) {
        if self.document.is_blank() && !self.document.segments().is_empty() {
            self.document.clear();
        }

        let current: HashSet<String> = self.document.token_names().into_iter().collect();
        let removed: Vec<String> = self
            .mentioned
            .iter()
            .filter(|name| !current.contains(*name))
            .cloned()
            .collect();
        for name in removed {
            self.mentioned.remove(&name);
            if self.active.remove(&name) {
                debug!(dataset = %name, "Mention chip deleted, detaching dataset");
            }
        }

        let text_before = self.document.text_before_cursor();
        self.dropdown = mention::extract_query(text_before.as_deref());
    }

    /// Bring the document in line with the active dataset set: any active
    /// dataset without a chip gets one appended at the end. Idempotent under
    /// repeated calls; user content and edits are preserved, with the
    /// selection moved to the end after an insertion.
    pub fn sync_external_datasets(&mut self) {
        let mut inserted = false;
        for dataset in self.active.snapshot() {
            if self.document.contains_token(&dataset.name) {
                self.mentioned.insert(dataset.name);
                continue;
            }
            if self.document.append_mention_at_end(&dataset.name) {
                debug!(dataset = %dataset.name, "Inserted chip for arriving dataset");
                self.mentioned.insert(dataset.name);
                inserted = true;
            }
        }
        if inserted {
            self.content_changed();
        }
    }

    /// Insert plain text at the cursor.
    pub fn insert_text(&mut self, text: &str) {
        self.document.insert_text(text);
        self.content_changed();
    }

    /// Insert a mention chip (plus a trailing space) at the cursor,
    /// attaching the dataset. A name already present in the document is a
    /// no-op.
    pub fn insert_mention_token(&mut self, dataset: &Dataset) -> bool {
        if !self.document.insert_mention(&dataset.name) {
            debug!(dataset = %dataset.name, "Chip already present, skipping insert");
            return false;
        }
        self.document.insert_text(" ");
        self.mentioned.insert(dataset.name.clone());
        if !self.active.contains(&dataset.name) {
            self.active.add(dataset.clone());
        }
        self.content_changed();
        true
    }

    /// Accept a dropdown candidate: delete the typed `@query`, insert the
    /// chip plus a trailing space, attach the dataset, and close the
    /// dropdown with the cursor after the space.
    pub fn select_mention(&mut self, dataset: &Dataset) {
        if !self.document.replace_mention_trigger(&dataset.name) {
            // No trigger under the cursor (e.g. dropdown opened via click);
            // insert at the cursor instead.
            self.document.insert_mention(&dataset.name);
            self.document.insert_text(" ");
        }
        self.mentioned.insert(dataset.name.clone());
        if !self.active.contains(&dataset.name) {
            self.active.add(dataset.clone());
        }
        self.content_changed();
        self.dropdown = None;
    }

    /// Remove a dataset's chip and detach it from the conversation. Used by
    /// the file-chip row outside the text surface.
    pub fn remove_dataset_chip(&mut self, name: &str) {
        self.document.remove_mention(name);
        self.mentioned.remove(name);
        self.active.remove(name);
        self.content_changed();
    }

    /// Scan pasted text for `@<name>.h5ad` / `@<name>.json` references.
    /// Matches naming a catalog entry become chips (attaching the
    /// dataset); everything else is inserted verbatim.
    pub fn paste(&mut self, pasted: &str) {
        let catalog = self.catalog.list();
        let mut last = 0;
        for caps in self.mention_pattern.captures_iter(pasted) {
            let whole = caps.get(0).expect("match has a full capture");
            let filename = caps.get(1).expect("match has a filename group").as_str();
            if whole.start() > last {
                self.document.insert_text(&pasted[last..whole.start()]);
            }
            match catalog.iter().find(|d| d.name == filename) {
                Some(dataset) => {
                    if !self.document.insert_mention(filename) {
                        debug!(dataset = %filename, "Pasted chip already present");
                    }
                    self.mentioned.insert(filename.to_string());
                    if !self.active.contains(filename) {
                        self.active.add(dataset.clone());
                    }
                }
                None => {
                    // Unknown filename stays literal text.
                    self.document.insert_text(whole.as_str());
                }
            }
            last = whole.end();
        }
        if last < pasted.len() {
            self.document.insert_text(&pasted[last..]);
        }
        self.content_changed();
    }

    /// Whether the send control is enabled. The first message of a new chat
    /// additionally requires one `.h5ad` and one `.json` active dataset.
    pub fn can_send(&self, is_new_chat: bool) -> bool {
        let has_content = !self.document.is_blank() || !self.images.is_empty();
        has_content && (!is_new_chat || self.active.has_required_files())
    }

    /// Flush the composed message. Blank text with no images is a silent
    /// no-op; otherwise the document, images, and mention tracking reset.
    pub fn submit(&mut self) -> Option<Submission> {
        let text = self.document.canonical_text();
        if text.trim().is_empty() && self.images.is_empty() {
            return None;
        }
        let submission = Submission {
            text,
            images: std::mem::take(&mut self.images),
        };
        self.document.clear();
        self.mentioned.clear();
        self.dropdown = None;
        Some(submission)
    }

    /// Apply the keyboard contract. While the dropdown is open with
    /// candidates, arrows navigate (wrapping), Enter/Tab accept, Escape
    /// closes. Otherwise plain Enter submits, gated for new chats by the
    /// required-files rule; Shift+Enter inserts a newline.
    pub fn handle_key(&mut self, key: KeyInput, is_new_chat: bool) -> KeyOutcome {
        if let Some(query) = &mut self.dropdown {
            let candidates = {
                let catalog = self.catalog.list();
                mention::filter_candidates(&catalog, &query.query)
                    .into_iter()
                    .cloned()
                    .collect::<Vec<_>>()
            };
            if !candidates.is_empty() {
                match key {
                    KeyInput::ArrowDown => {
                        query.select_next(candidates.len());
                        return KeyOutcome::Handled;
                    }
                    KeyInput::ArrowUp => {
                        query.select_prev(candidates.len());
                        return KeyOutcome::Handled;
                    }
                    KeyInput::Enter { .. } | KeyInput::Tab => {
                        let chosen = candidates[query.selected.min(candidates.len() - 1)].clone();
                        self.select_mention(&chosen);
                        return KeyOutcome::Handled;
                    }
                    KeyInput::Escape => {
                        self.dropdown = None;
                        return KeyOutcome::Handled;
                    }
                    _ => {}
                }
            }
        }

        match key {
            KeyInput::Enter { shift: false } => {
                if is_new_chat && !self.active.has_required_files() {
                    warn!("Send blocked: both .h5ad and .json datasets are required");
                    return KeyOutcome::Handled;
                }
                match self.submit() {
                    Some(submission) => KeyOutcome::Submitted(submission),
                    None => KeyOutcome::Handled,
                }
            }
            KeyInput::Enter { shift: true } => {
                self.insert_text("\n");
                KeyOutcome::Handled
            }
            KeyInput::Char(c) => {
                self.insert_text(&c.to_string());
                KeyOutcome::Handled
            }
            KeyInput::Backspace => {
                self.document.backspace();
                self.content_changed();
                KeyOutcome::Handled
            }
            _ => KeyOutcome::Ignored,
        }
    }

    /// Split dropped/picked files: images become inline data-URL
    /// attachments, everything else is returned for the upload pipeline
    /// (whose completion later shows up via `sync_external_datasets`).
    pub fn handle_file_drop(&mut self, files: Vec<DroppedFile>) -> Vec<DroppedFile> {
        let mut uploads = Vec::new();
        for file in files {
            if file.content_type.starts_with("image/") {
                let encoded = BASE64_STANDARD.encode(&file.bytes);
                self.images
                    .push(format!("data:{};base64,{}", file.content_type, encoded));
            } else {
                uploads.push(file);
            }
        }
        uploads
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryDatasetCatalog;

    fn h5ad(name: &str) -> Dataset {
        Dataset::new(name, 2048, "application/octet-stream")
    }

    fn json(name: &str) -> Dataset {
        Dataset::new(name, 512, "application/json")
    }

    fn composer_with(datasets: Vec<Dataset>) -> (MentionComposer, ActiveDatasets) {
        let active = ActiveDatasets::new();
        let catalog = Arc::new(InMemoryDatasetCatalog::with_datasets(datasets));
        (MentionComposer::new(active.clone(), catalog), active)
    }

    #[test]
    fn test_token_insertion_is_idempotent() {
        let (mut composer, active) = composer_with(vec![h5ad("foo.h5ad")]);
        let foo = h5ad("foo.h5ad");
        assert!(composer.insert_mention_token(&foo));
        assert!(!composer.insert_mention_token(&foo));
        active.add(foo.clone());
        composer.sync_external_datasets();
        composer.sync_external_datasets();
        assert_eq!(composer.document().token_names(), vec!["foo.h5ad"]);
    }

    #[test]
    fn test_external_arrival_appends_without_clobbering_edits() {
        let (mut composer, active) = composer_with(vec![]);
        composer.insert_text("look at this");
        active.add(h5ad("cells.h5ad"));
        composer.sync_external_datasets();
        assert_eq!(composer.canonical_text(), "look at this @cells.h5ad ");
        // Typing continues at the end after the sync.
        composer.insert_text("!");
        assert_eq!(composer.canonical_text(), "look at this @cells.h5ad !");
    }

    #[test]
    fn test_deleting_only_chip_detaches_dataset() {
        let (mut composer, active) = composer_with(vec![json("a.json")]);
        composer.insert_mention_token(&json("a.json"));
        assert!(active.contains("a.json"));
        composer.document_mut().remove_mention("a.json");
        composer.content_changed();
        assert!(!active.contains("a.json"));
    }

    #[test]
    fn test_paste_known_filename_becomes_chip() {
        let (mut composer, active) = composer_with(vec![h5ad("foo.h5ad")]);
        composer.paste("check @foo.h5ad please");
        use crate::composer::document::Segment;
        assert_eq!(
            composer.document().segments(),
            &[
                Segment::Text("check ".to_string()),
                Segment::Mention("foo.h5ad".to_string()),
                Segment::Text(" please".to_string()),
            ]
        );
        assert!(active.contains("foo.h5ad"));
    }

    #[test]
    fn test_paste_unknown_filename_stays_text() {
        let (mut composer, active) = composer_with(vec![]);
        composer.paste("check @foo.h5ad please");
        assert_eq!(composer.canonical_text(), "check @foo.h5ad please");
        assert_eq!(composer.document().token_names().len(), 0);
        assert!(active.is_empty());
    }

    #[test]
    fn test_mention_query_from_cursor() {
        let (mut composer, _) = composer_with(vec![h5ad("proteins.h5ad")]);
        composer.insert_text("analyze @pro");
        let query = composer.dropdown().expect("query should be active");
        assert_eq!(query.query, "pro");
        composer.insert_text(" ");
        assert!(composer.dropdown().is_none());
    }

    #[test]
    fn test_select_mention_replaces_trigger() {
        let (mut composer, active) = composer_with(vec![h5ad("proteins.h5ad")]);
        composer.insert_text("analyze @pro");
        let candidate = composer.dropdown_candidates()[0].clone();
        composer.select_mention(&candidate);
        assert_eq!(composer.canonical_text(), "analyze @proteins.h5ad ");
        assert!(composer.dropdown().is_none());
        assert!(active.contains("proteins.h5ad"));
    }

    #[test]
    fn test_dropdown_keyboard_navigation_wraps() {
        let (mut composer, _) = composer_with(vec![h5ad("a.h5ad"), h5ad("b.h5ad")]);
        composer.insert_text("@");
        assert_eq!(composer.handle_key(KeyInput::ArrowUp, false), KeyOutcome::Handled);
        assert_eq!(composer.dropdown().unwrap().selected, 1);
        composer.handle_key(KeyInput::ArrowDown, false);
        assert_eq!(composer.dropdown().unwrap().selected, 0);
        composer.handle_key(KeyInput::Tab, false);
        assert_eq!(composer.canonical_text(), "@a.h5ad ");
    }

    #[test]
    fn test_escape_closes_dropdown_without_edit() {
        let (mut composer, _) = composer_with(vec![h5ad("a.h5ad")]);
        composer.insert_text("@a");
        assert!(composer.dropdown().is_some());
        composer.handle_key(KeyInput::Escape, false);
        assert!(composer.dropdown().is_none());
        assert_eq!(composer.canonical_text(), "@a");
    }

    #[test]
    fn test_new_chat_submit_gated_on_required_files() {
        let (mut composer, active) = composer_with(vec![]);
        composer.insert_text("hello");
        assert!(!composer.can_send(true));
        assert_eq!(
            composer.handle_key(KeyInput::Enter { shift: false }, true),
            KeyOutcome::Handled
        );
        assert_eq!(composer.canonical_text(), "hello");

        active.add(h5ad("d.h5ad"));
        active.add(json("d.json"));
        assert!(composer.can_send(true));
        let outcome = composer.handle_key(KeyInput::Enter { shift: false }, true);
        match outcome {
            KeyOutcome::Submitted(submission) => assert_eq!(submission.text, "hello"),
            other => panic!("expected submission, got {:?}", other),
        }
        assert_eq!(composer.canonical_text(), "");
    }

    #[test]
    fn test_blank_submit_is_noop() {
        let (mut composer, _) = composer_with(vec![]);
        composer.insert_text("   ");
        assert!(composer.submit().is_none());
        composer.add_image("data:image/png;base64,AA==".to_string());
        let submission = composer.submit().expect("images alone allow submit");
        assert_eq!(submission.images.len(), 1);
        assert!(composer.images().is_empty());
    }

    #[test]
    fn test_submit_resets_mention_tracking() {
        let (mut composer, active) = composer_with(vec![h5ad("a.h5ad")]);
        composer.insert_mention_token(&h5ad("a.h5ad"));
        composer.submit().expect("chip text submits");
        // After reset, a fresh sync re-inserts the still-active dataset.
        composer.sync_external_datasets();
        assert_eq!(composer.document().token_names(), vec!["a.h5ad"]);
        assert!(active.contains("a.h5ad"));
    }

    #[test]
    fn test_file_drop_partitions_images_from_data() {
        let (mut composer, _) = composer_with(vec![]);
        let files = vec![
            DroppedFile {
                name: "plot.png".into(),
                content_type: "image/png".into(),
                bytes: vec![1, 2, 3],
            },
            DroppedFile {
                name: "cells.h5ad".into(),
                content_type: "application/octet-stream".into(),
                bytes: vec![4, 5],
            },
        ];
        let uploads = composer.handle_file_drop(files);
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].name, "cells.h5ad");
        assert_eq!(composer.images().len(), 1);
        assert!(composer.images()[0].starts_with("data:image/png;base64,"));
    }
}

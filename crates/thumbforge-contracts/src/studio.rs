//! Client-side controller: guided answers, prompt derivation, reference
//! upload, history, regeneration.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::answers::{Category, FormAnswers, Style, Vibe};
use crate::history::{History, HistoryItem};
use crate::prompt::{PromptMode, PromptState};
use crate::storage::KeyValueStore;
use crate::theme::{load_theme, save_theme, Theme};
use crate::upload::{PreviewRegistry, UploadedReference};
use crate::wire::{decode_data_url, EditRequest, GenerateRequest, OutboundRequest};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StudioError {
    #[error("Please enter a prompt or fill in the guided fields.")]
    EmptyPrompt,
    #[error("Nothing to regenerate yet.")]
    NothingToRegenerate,
    #[error("No image to download.")]
    NoImage,
    #[error("No history entry at position {0}.")]
    HistoryIndex(usize),
    #[error("{0}")]
    Transport(String),
    #[error("Upload failed: {0}")]
    Upload(String),
    #[error("Download failed: {0}")]
    Download(String),
}

/// Sends a request to the proxy and returns the image data URL.
pub trait ProxyTransport {
    fn send(&self, request: &OutboundRequest) -> Result<String, StudioError>;
}

/// A successful request together with the answers that produced it.
#[derive(Debug, Clone)]
struct RememberedRequest {
    request: OutboundRequest,
    answers: FormAnswers,
}

/// Requests go out through `&mut self`, so a studio never has two in flight.
pub struct Studio<S: KeyValueStore, T: ProxyTransport> {
    store: S,
    transport: T,
    previews: PreviewRegistry,
    answers: FormAnswers,
    prompt: PromptState,
    upload: Option<UploadedReference>,
    history: History,
    theme: Theme,
    last_request: Option<RememberedRequest>,
    current_image: Option<String>,
    error: Option<String>,
}

impl<S: KeyValueStore, T: ProxyTransport> Studio<S, T> {
    /// Starts with default answers and a derived prompt, and loads history and
    /// theme from `store`.
    pub fn new(store: S, transport: T) -> Self {
        let answers = FormAnswers::default();
        let prompt = PromptState::derived(&answers, false);
        let history = History::load(&store);
        let theme = load_theme(&store);
        Self {
            store,
            transport,
            previews: PreviewRegistry::new(),
            answers,
            prompt,
            upload: None,
            history,
            theme,
            last_request: None,
            current_image: None,
            error: None,
        }
    }

    pub fn answers(&self) -> &FormAnswers {
        &self.answers
    }

    pub fn prompt(&self) -> &str {
        self.prompt.text()
    }

    pub fn prompt_mode(&self) -> PromptMode {
        self.prompt.mode()
    }

    pub fn upload(&self) -> Option<&UploadedReference> {
        self.upload.as_ref()
    }

    pub fn previews(&self) -> &PreviewRegistry {
        &self.previews
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn last_request(&self) -> Option<&OutboundRequest> {
        self.last_request
            .as_ref()
            .map(|remembered| &remembered.request)
    }

    pub fn current_image(&self) -> Option<&str> {
        self.current_image.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn set_category(&mut self, category: Category) {
        self.answers.category = category;
        self.refresh_prompt();
    }

    pub fn set_custom_category(&mut self, text: impl Into<String>) {
        self.answers.custom_category = text.into();
        self.refresh_prompt();
    }

    pub fn set_style(&mut self, style: Style) {
        self.answers.style = style;
        self.refresh_prompt();
    }

    pub fn set_custom_style(&mut self, text: impl Into<String>) {
        self.answers.custom_style = text.into();
        self.refresh_prompt();
    }

    pub fn set_vibe(&mut self, vibe: Vibe) {
        self.answers.vibe = vibe;
        self.refresh_prompt();
    }

    pub fn set_custom_vibe(&mut self, text: impl Into<String>) {
        self.answers.custom_vibe = text.into();
        self.refresh_prompt();
    }

    pub fn set_text_overlay(&mut self, text: impl Into<String>) {
        self.answers.text_overlay = text.into();
        self.refresh_prompt();
    }

    pub fn edit_prompt(&mut self, text: impl Into<String>) {
        self.prompt.edit(text);
    }

    pub fn resync_prompt(&mut self) {
        self.prompt.resync(&self.answers, self.upload.is_some());
    }

    /// Replaces any previous upload; the old preview is released.
    pub fn attach_reference(
        &mut self,
        file_name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) {
        self.upload = Some(UploadedReference::new(
            file_name,
            mime_type,
            bytes,
            &self.previews,
        ));
        self.refresh_prompt();
    }

    pub fn attach_reference_path(&mut self, path: &Path) -> Result<(), StudioError> {
        let upload = UploadedReference::from_path(path, &self.previews)
            .map_err(|err| StudioError::Upload(format!("{err:#}")))?;
        self.upload = Some(upload);
        self.refresh_prompt();
        Ok(())
    }

    pub fn clear_reference(&mut self) {
        if self.upload.take().is_some() {
            self.refresh_prompt();
        }
    }

    pub fn toggle_theme(&mut self) -> Theme {
        self.theme = self.theme.toggled();
        save_theme(&mut self.store, self.theme);
        self.theme
    }

    /// Validates the prompt, picks `/edit` when a reference is attached and
    /// `/generate` otherwise, and sends it.
    pub fn submit(&mut self) -> Result<&str, StudioError> {
        let Some(prompt) = self.prompt.effective().map(str::to_string) else {
            return Err(self.fail(StudioError::EmptyPrompt));
        };
        let request = match self.upload.as_ref() {
            Some(upload) => OutboundRequest::Edit(EditRequest {
                prompt,
                base64_image: upload.to_base64(),
                mime_type: upload.mime_type.clone(),
            }),
            None => OutboundRequest::Generate(GenerateRequest { prompt }),
        };
        let answers = self.answers.clone();
        self.dispatch(request, answers)
    }

    /// Re-sends the last successful request exactly as it was issued. The new
    /// history entry carries the answers of that request, not the current form.
    pub fn regenerate(&mut self) -> Result<&str, StudioError> {
        let Some(remembered) = self.last_request.clone() else {
            return Err(self.fail(StudioError::NothingToRegenerate));
        };
        self.dispatch(remembered.request, remembered.answers)
    }

    /// Shows a past result. The prompt mode and the remembered request are
    /// left alone.
    pub fn select_history(&mut self, index: usize) -> Result<&HistoryItem, StudioError> {
        let Some(item) = self.history.get(index).cloned() else {
            return Err(StudioError::HistoryIndex(index));
        };
        self.answers = item.answers;
        self.current_image = Some(item.image);
        self.error = None;
        self.prompt.load(item.prompt);
        self.history
            .get(index)
            .ok_or(StudioError::HistoryIndex(index))
    }

    pub fn clear_history(&mut self) {
        self.history.clear(&mut self.store);
    }

    /// Writes the displayed image to `dir` and returns the file path.
    pub fn download_current(&self, dir: &Path) -> Result<PathBuf, StudioError> {
        let Some(data_url) = self.current_image.as_deref() else {
            return Err(StudioError::NoImage);
        };
        let bytes =
            decode_data_url(data_url).map_err(|err| StudioError::Download(format!("{err:#}")))?;
        std::fs::create_dir_all(dir).map_err(|err| StudioError::Download(err.to_string()))?;
        let path = dir.join(format!(
            "thumbnail-{}.png",
            chrono::Utc::now().timestamp_millis()
        ));
        std::fs::write(&path, bytes).map_err(|err| StudioError::Download(err.to_string()))?;
        Ok(path)
    }

    fn refresh_prompt(&mut self) {
        self.prompt.refresh(&self.answers, self.upload.is_some());
    }

    fn fail(&mut self, err: StudioError) -> StudioError {
        self.error = Some(err.to_string());
        err
    }

    fn dispatch(
        &mut self,
        request: OutboundRequest,
        answers: FormAnswers,
    ) -> Result<&str, StudioError> {
        self.error = None;
        tracing::debug!(path = request.path(), "sending thumbnail request");
        let outcome = self.transport.send(&request);

        let data_url = match outcome {
            Ok(data_url) => data_url,
            Err(err) => {
                tracing::warn!(path = request.path(), "thumbnail request failed: {err}");
                return Err(self.fail(err));
            }
        };

        let item = HistoryItem::new(
            data_url.clone(),
            request.prompt().to_string(),
            answers.clone(),
        );
        self.history.prepend(item, &mut self.store);
        self.last_request = Some(RememberedRequest { request, answers });
        Ok(self.current_image.insert(data_url).as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::VecDeque;

    use pretty_assertions::assert_eq;
    use serde_json::Value;

    use super::*;
    use crate::history::HISTORY_KEY;
    use crate::prompt::REFERENCE_CLAUSE;
    use crate::storage::MemoryStore;
    use crate::wire::png_data_url;

    #[derive(Default)]
    struct ScriptedTransport {
        replies: RefCell<VecDeque<Result<String, StudioError>>>,
        sent: RefCell<Vec<OutboundRequest>>,
    }

    impl ScriptedTransport {
        fn with(replies: Vec<Result<String, StudioError>>) -> Self {
            Self {
                replies: RefCell::new(replies.into()),
                sent: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProxyTransport for &ScriptedTransport {
        fn send(&self, request: &OutboundRequest) -> Result<String, StudioError> {
            self.sent.borrow_mut().push(request.clone());
            self.replies
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Err(StudioError::Transport("no scripted reply".to_string())))
        }
    }

    fn ok(data: &str) -> Result<String, StudioError> {
        Ok(png_data_url(data))
    }

    #[test]
    fn blank_prompt_is_rejected_without_sending() {
        let transport = ScriptedTransport::with(vec![ok("QUJD")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.edit_prompt("   \n ");

        assert_eq!(studio.submit().err(), Some(StudioError::EmptyPrompt));
        assert!(transport.sent.borrow().is_empty());
        assert_eq!(studio.error(), Some(StudioError::EmptyPrompt.to_string().as_str()));
        assert!(studio.history().is_empty());
    }

    #[test]
    fn submit_without_upload_uses_generate_and_records_history() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ok("QUJD")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.set_text_overlay("5 Tips");

        let shown = studio.submit()?.to_string();
        assert_eq!(shown, "data:image/png;base64,QUJD");
        assert_eq!(studio.current_image(), Some(shown.as_str()));

        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].path(), "/generate");
        assert!(sent[0].prompt().contains("Include text overlay: \"5 Tips\"."));

        let history = studio.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history.items()[0].image, shown);
        assert_eq!(history.items()[0].answers.text_overlay, "5 Tips");
        assert_eq!(studio.last_request(), Some(&sent[0]));

        let persisted = studio.store().get(HISTORY_KEY).unwrap_or(Value::Null);
        assert_eq!(persisted.as_array().map(Vec::len), Some(1));
        Ok(())
    }

    #[test]
    fn submit_with_upload_uses_edit_endpoint() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ok("RUZH")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.attach_reference("face.png", "image/png", b"hi".to_vec());
        assert!(studio.prompt().contains(REFERENCE_CLAUSE));

        studio.submit()?;
        let sent = transport.sent.borrow();
        match &sent[0] {
            OutboundRequest::Edit(edit) => {
                assert_eq!(edit.base64_image, "aGk=");
                assert_eq!(edit.mime_type, "image/png");
                assert!(edit.prompt.contains(REFERENCE_CLAUSE));
            }
            other => panic!("expected edit request, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn failure_keeps_history_and_surfaces_message() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![
            ok("QUJD"),
            Err(StudioError::Transport(
                "Generation failed (500): No image returned".to_string(),
            )),
        ]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.submit()?;
        let remembered = studio.last_request().cloned();

        studio.set_category(Category::Gaming);
        let err = studio.submit().err();
        assert!(matches!(err, Some(StudioError::Transport(_))));
        assert_eq!(
            studio.error(),
            Some("Generation failed (500): No image returned")
        );
        assert_eq!(studio.history().len(), 1);
        assert_eq!(studio.last_request().cloned(), remembered);
        Ok(())
    }

    #[test]
    fn failed_request_leaves_studio_ready_for_the_next_one() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![
            Err(StudioError::Transport("Generation failed (502).".to_string())),
            ok("QUJD"),
        ]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        assert!(studio.submit().is_err());
        assert_eq!(studio.error(), Some("Generation failed (502)."));

        studio.submit()?;
        assert_eq!(studio.error(), None);
        assert_eq!(studio.history().len(), 1);
        assert_eq!(transport.sent.borrow().len(), 2);
        Ok(())
    }

    #[test]
    fn regenerate_resends_identical_request() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ok("MQ=="), ok("Mg==")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.attach_reference("ref.jpg", "image/jpeg", b"ref".to_vec());
        studio.submit()?;

        studio.clear_reference();
        studio.edit_prompt("");
        studio.regenerate()?;

        let sent = transport.sent.borrow();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0], sent[1]);
        assert_eq!(sent[0].body()?, sent[1].body()?);
        assert_eq!(studio.history().len(), 2);
        assert_eq!(studio.history().items()[0].image, "data:image/png;base64,Mg==");
        Ok(())
    }

    #[test]
    fn regenerated_entry_keeps_answers_of_original_request() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ok("MQ=="), ok("Mg==")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.set_category(Category::Cooking);
        studio.submit()?;

        studio.set_category(Category::Music);
        studio.regenerate()?;

        let newest = &studio.history().items()[0];
        assert_eq!(newest.answers.category, Category::Cooking);
        assert!(newest.prompt.starts_with("Category: Cooking."));
        assert_eq!(studio.answers().category, Category::Music);
        Ok(())
    }

    #[test]
    fn regenerate_without_previous_request_fails_locally() {
        let transport = ScriptedTransport::default();
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        assert_eq!(
            studio.regenerate().err(),
            Some(StudioError::NothingToRegenerate)
        );
        assert!(transport.sent.borrow().is_empty());
    }

    #[test]
    fn answer_changes_follow_prompt_mode() {
        let transport = ScriptedTransport::default();
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.set_style(Style::Custom);
        studio.set_custom_style("Claymation");
        assert!(studio.prompt().contains("Style: Claymation."));

        studio.edit_prompt("my own words");
        studio.set_vibe(Vibe::Neon);
        assert_eq!(studio.prompt(), "my own words");
        assert_eq!(studio.prompt_mode(), PromptMode::Overridden);

        studio.resync_prompt();
        assert_eq!(studio.prompt_mode(), PromptMode::Derived);
        assert!(studio.prompt().contains("Colors/Vibe: Neon."));
    }

    #[test]
    fn selecting_history_restores_view_but_not_last_request() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ok("MQ=="), ok("Mg==")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.set_category(Category::Cooking);
        studio.submit()?;
        studio.set_category(Category::Music);
        studio.submit()?;
        let remembered = studio.last_request().cloned();

        let selected = studio.select_history(1)?.clone();
        assert_eq!(selected.answers.category, Category::Cooking);
        assert_eq!(studio.answers().category, Category::Cooking);
        assert_eq!(studio.current_image(), Some("data:image/png;base64,MQ=="));
        assert_eq!(studio.prompt(), selected.prompt);
        assert_eq!(studio.prompt_mode(), PromptMode::Derived);
        assert_eq!(studio.last_request().cloned(), remembered);

        assert_eq!(
            studio.select_history(5).err(),
            Some(StudioError::HistoryIndex(5))
        );
        Ok(())
    }

    #[test]
    fn selecting_history_keeps_a_hand_written_prompt_overridden() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ok("QUJD")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.submit()?;
        let derived = studio.history().items()[0].prompt.clone();

        studio.edit_prompt("my hand-written prompt");
        studio.select_history(0)?;
        assert_eq!(studio.prompt_mode(), PromptMode::Overridden);
        assert_eq!(studio.prompt(), derived);

        studio.set_category(Category::Gaming);
        assert_eq!(studio.prompt(), derived);
        assert_eq!(studio.prompt_mode(), PromptMode::Overridden);
        Ok(())
    }

    #[test]
    fn selected_custom_prompt_is_replaced_on_next_change_while_derived() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ok("QUJD")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.edit_prompt("a custom prompt");
        studio.submit()?;
        studio.resync_prompt();

        studio.select_history(0)?;
        assert_eq!(studio.prompt(), "a custom prompt");
        assert_eq!(studio.prompt_mode(), PromptMode::Derived);

        studio.set_vibe(Vibe::Warm);
        assert!(studio.prompt().contains("Colors/Vibe: Warm."));
        Ok(())
    }

    #[test]
    fn clear_history_empties_store() -> anyhow::Result<()> {
        let transport = ScriptedTransport::with(vec![ok("QUJD")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        studio.submit()?;
        studio.clear_history();
        assert!(studio.history().is_empty());
        assert!(!studio.store().contains(HISTORY_KEY));
        Ok(())
    }

    #[test]
    fn replaced_and_cleared_uploads_release_previews() {
        let transport = ScriptedTransport::default();
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        let previews = studio.previews().clone();

        studio.attach_reference("a.png", "image/png", vec![1]);
        studio.attach_reference("b.png", "image/png", vec![2]);
        assert_eq!(previews.live_count(), 1);

        studio.clear_reference();
        assert_eq!(previews.live_count(), 0);
        assert!(!studio.prompt().contains(REFERENCE_CLAUSE));

        studio.attach_reference("c.png", "image/png", vec![3]);
        drop(studio);
        assert_eq!(previews.live_count(), 0);
    }

    #[test]
    fn download_writes_decoded_png() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let transport = ScriptedTransport::with(vec![ok("QUJD")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        assert_eq!(
            studio.download_current(temp.path()).err(),
            Some(StudioError::NoImage)
        );

        studio.submit()?;
        let path = studio.download_current(&temp.path().join("out"))?;
        assert_eq!(std::fs::read(&path)?, b"ABC".to_vec());
        assert!(path
            .file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with("thumbnail-") && name.ends_with(".png"))
            .unwrap_or(false));
        Ok(())
    }

    #[test]
    fn history_and_theme_load_at_startup() {
        let transport = ScriptedTransport::with(vec![ok("QUJD")]);
        let mut studio = Studio::new(MemoryStore::new(), &transport);
        assert_eq!(studio.theme(), Theme::Light);
        assert_eq!(studio.toggle_theme(), Theme::Dark);
        let _ = studio.submit();

        let store = studio.store().clone();
        let reopened = Studio::new(store, &transport);
        assert_eq!(reopened.theme(), Theme::Dark);
        assert_eq!(reopened.history().len(), 1);
        assert_eq!(reopened.last_request(), None);
    }
}

//! Rewrite pipeline: turns a hotkey press into replaced text.
//!
//! Flow: snapshot clipboard → copy selection → validate → rewrite → paste →
//! restore clipboard. Only one run is in flight at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::clipboard::ClipboardAccess;
use crate::input::InputSimulator;
use crate::llm_client::{RewriteRequest, RewriteService};
use crate::notification::{NotificationType, Notifier};
use crate::profile::Profile;
use crate::settings::SettleTiming;

pub const MISSING_KEY_TITLE: &str = "Missing API Key";
pub const MISSING_KEY_MESSAGE: &str = "Please enter and save your OpenAI API Key first.";
pub const SERVICE_ERROR_TITLE: &str = "Rewrite failed";
pub const PASTE_ERROR_TITLE: &str = "Paste failed";

/// Injectable wait between pipeline steps
#[async_trait]
pub trait Delay: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Everything the pipeline talks to
pub struct Collaborators {
    pub clipboard: Arc<dyn ClipboardAccess>,
    pub input: Arc<dyn InputSimulator>,
    pub service: Arc<dyn RewriteService>,
    pub notifier: Arc<dyn Notifier>,
    pub delay: Arc<dyn Delay>,
}

/// One accepted trigger. The credential is resolved by the caller.
#[derive(Debug, Clone)]
pub struct RewriteJob {
    pub profile_name: String,
    pub prompt_template: String,
    pub api_key: Option<String>,
}

impl RewriteJob {
    pub fn for_profile(profile: &Profile, api_key: Option<String>) -> Self {
        Self {
            profile_name: profile.name.clone(),
            prompt_template: profile.prompt.clone(),
            api_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RewriteOutcome {
    Replaced,
    EmptySelection,
    MissingCredential,
    ServiceFailed(String),
    /// Writing the result or pasting it failed; the clipboard was still restored
    ReplaceFailed(String),
    /// Another run was in flight, this trigger was dropped
    Busy,
}

/// Clipboard contents from before the run
enum Snapshot {
    Text(String),
    Empty,
    /// Could not be read, so it is left alone afterwards
    Unreadable,
}

/// Clears the in-flight flag on every exit path
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct RewritePipeline {
    clipboard: Arc<dyn ClipboardAccess>,
    input: Arc<dyn InputSimulator>,
    service: Arc<dyn RewriteService>,
    notifier: Arc<dyn Notifier>,
    delay: Arc<dyn Delay>,
    model: String,
    timing: SettleTiming,
    /// Guard to prevent concurrent runs fighting over the clipboard.
    in_progress: AtomicBool,
}

impl RewritePipeline {
    pub fn new(collaborators: Collaborators, model: impl Into<String>, timing: SettleTiming) -> Self {
        Self {
            clipboard: collaborators.clipboard,
            input: collaborators.input,
            service: collaborators.service,
            notifier: collaborators.notifier,
            delay: collaborators.delay,
            model: model.into(),
            timing,
            in_progress: AtomicBool::new(false),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_progress.load(Ordering::SeqCst)
    }

    /// Run the full pipeline for one trigger. The clipboard holds its
    /// original contents again when this returns.
    pub async fn run(&self, job: RewriteJob) -> RewriteOutcome {
        if self.in_progress.swap(true, Ordering::SeqCst) {
            warn!(profile = %job.profile_name, "Rewrite already in progress, ignoring trigger");
            self.notifier.beep();
            return RewriteOutcome::Busy;
        }
        let _in_flight = InFlight(&self.in_progress);

        let session_id = uuid::Uuid::new_v4().to_string()[..8].to_string();
        let span = info_span!("rewrite", session = %session_id, profile = %job.profile_name);

        async move {
            let snapshot = self.snapshot();
            let outcome = self.run_inner(&job).await;
            self.restore(snapshot);
            info!(outcome = ?outcome, "Rewrite finished");
            outcome
        }
        .instrument(span)
        .await
    }

    fn snapshot(&self) -> Snapshot {
        match self.clipboard.get_text() {
            Ok(Some(text)) => Snapshot::Text(text),
            Ok(None) => Snapshot::Empty,
            Err(e) => {
                warn!("Could not read clipboard before capture: {}", e);
                Snapshot::Unreadable
            }
        }
    }

    async fn run_inner(&self, job: &RewriteJob) -> RewriteOutcome {
        // 1. Capture
        let selection = self.capture_selection().await;

        // 2. Validate selection
        if selection.trim().is_empty() {
            info!("No text selected");
            self.notifier.beep();
            return RewriteOutcome::EmptySelection;
        }

        // 3. Validate credentials
        let Some(api_key) = job
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
        else {
            warn!("No API key available");
            self.notifier
                .show(NotificationType::Warning, MISSING_KEY_TITLE, MISSING_KEY_MESSAGE);
            return RewriteOutcome::MissingCredential;
        };

        // 4. Rewrite call
        let request = RewriteRequest {
            model: self.model.clone(),
            api_key: api_key.to_string(),
            prompt: format!("{}{}", job.prompt_template, selection),
        };
        debug!(selected_len = selection.len(), prompt_len = request.prompt.len(), "Captured selection");

        let rewritten = match self.service.rewrite(&request).await {
            Ok(text) => text,
            Err(e) => {
                let message = e.to_string();
                warn!("Rewrite service failed: {}", message);
                self.notifier.show(
                    NotificationType::Error,
                    SERVICE_ERROR_TITLE,
                    &format!("[OpenAI error] {}", message),
                );
                return RewriteOutcome::ServiceFailed(message);
            }
        };

        // 5. Replace
        match self.replace(&rewritten).await {
            Ok(()) => RewriteOutcome::Replaced,
            Err(message) => {
                warn!("Failed to paste rewritten text: {}", message);
                self.notifier
                    .show(NotificationType::Error, PASTE_ERROR_TITLE, &message);
                RewriteOutcome::ReplaceFailed(message)
            }
        }
    }

    /// Copy the selection and read it back. The clipboard is cleared first so
    /// an empty selection is not mistaken for whatever was already there.
    async fn capture_selection(&self) -> String {
        if let Err(e) = self.clipboard.clear() {
            debug!("Could not clear clipboard before copy: {}", e);
        }
        if let Err(e) = self.input.send_copy() {
            warn!("Failed to send copy: {}", e);
        }

        self.delay.sleep(self.timing.after_copy).await;

        match self.clipboard.get_text() {
            Ok(text) => text.unwrap_or_default(),
            Err(e) => {
                warn!("Failed to read clipboard after copy: {}", e);
                String::new()
            }
        }
    }

    async fn replace(&self, text: &str) -> Result<(), String> {
        self.clipboard.set_text(text).map_err(|e| e.to_string())?;
        self.delay.sleep(self.timing.before_paste).await;
        self.input.send_paste()?;
        // let the target app read the clipboard before it is restored
        self.delay.sleep(self.timing.before_restore).await;
        Ok(())
    }

    /// Best effort: errors are logged and dropped.
    fn restore(&self, snapshot: Snapshot) {
        let result = match snapshot {
            Snapshot::Text(text) => self.clipboard.set_text(&text),
            Snapshot::Empty => self.clipboard.clear(),
            Snapshot::Unreadable => return,
        };
        if let Err(e) = result {
            warn!("Failed to restore clipboard: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::ClipboardError;
    use crate::llm_client::RewriteServiceError;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    /// Clipboard plus the focused app: copy puts the selection on the
    /// clipboard, paste records what the app received.
    #[derive(Default)]
    struct FakeDesktop {
        clipboard: Mutex<Option<String>>,
        selection: Mutex<String>,
        pasted: Mutex<Vec<String>>,
        fail_paste: bool,
        fail_read: bool,
    }

    impl FakeDesktop {
        fn new(clipboard: Option<&str>, selection: &str) -> Self {
            Self {
                clipboard: Mutex::new(clipboard.map(String::from)),
                selection: Mutex::new(selection.to_string()),
                ..Self::default()
            }
        }

        fn clipboard(&self) -> Option<String> {
            self.clipboard.lock().unwrap().clone()
        }

        fn pasted(&self) -> Vec<String> {
            self.pasted.lock().unwrap().clone()
        }
    }

    impl ClipboardAccess for FakeDesktop {
        fn get_text(&self) -> Result<Option<String>, ClipboardError> {
            if self.fail_read {
                return Err(ClipboardError::Read("denied".into()));
            }
            Ok(self.clipboard())
        }

        fn set_text(&self, text: &str) -> Result<(), ClipboardError> {
            *self.clipboard.lock().unwrap() = Some(text.to_string());
            Ok(())
        }

        fn clear(&self) -> Result<(), ClipboardError> {
            *self.clipboard.lock().unwrap() = None;
            Ok(())
        }
    }

    impl InputSimulator for FakeDesktop {
        fn send_copy(&self) -> Result<(), String> {
            let selection = self.selection.lock().unwrap().clone();
            // copying nothing leaves the clipboard as it was
            if !selection.is_empty() {
                *self.clipboard.lock().unwrap() = Some(selection);
            }
            Ok(())
        }

        fn send_paste(&self) -> Result<(), String> {
            if self.fail_paste {
                return Err("paste blocked".to_string());
            }
            let content = self.clipboard().unwrap_or_default();
            self.pasted.lock().unwrap().push(content);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeService {
        reply: Option<String>,
        error: Option<String>,
        requests: Mutex<Vec<RewriteRequest>>,
        started: Option<Arc<Notify>>,
        gate: Option<Arc<Notify>>,
    }

    impl FakeService {
        fn replying(text: &str) -> Self {
            Self {
                reply: Some(text.to_string()),
                ..Self::default()
            }
        }

        fn failing(message: &str) -> Self {
            Self {
                error: Some(message.to_string()),
                ..Self::default()
            }
        }

        fn requests(&self) -> Vec<RewriteRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RewriteService for FakeService {
        async fn rewrite(&self, request: &RewriteRequest) -> Result<String, RewriteServiceError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(started) = &self.started {
                started.notify_one();
            }
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            if let Some(message) = &self.error {
                return Err(RewriteServiceError::Api {
                    status: 429,
                    message: message.clone(),
                });
            }
            Ok(self.reply.clone().unwrap_or_default())
        }
    }

    #[derive(Default)]
    struct FakeNotifier {
        notices: Mutex<Vec<(NotificationType, String, String)>>,
        beeps: AtomicUsize,
    }

    impl FakeNotifier {
        fn notices(&self) -> Vec<(NotificationType, String, String)> {
            self.notices.lock().unwrap().clone()
        }

        fn beeps(&self) -> usize {
            self.beeps.load(Ordering::SeqCst)
        }
    }

    impl Notifier for FakeNotifier {
        fn show(&self, notification_type: NotificationType, title: &str, body: &str) {
            self.notices
                .lock()
                .unwrap()
                .push((notification_type, title.to_string(), body.to_string()));
        }

        fn beep(&self) {
            self.beeps.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct RecordedDelay(Mutex<Vec<Duration>>);

    #[async_trait]
    impl Delay for RecordedDelay {
        async fn sleep(&self, duration: Duration) {
            self.0.lock().unwrap().push(duration);
        }
    }

    struct Harness {
        desktop: Arc<FakeDesktop>,
        service: Arc<FakeService>,
        notifier: Arc<FakeNotifier>,
        delay: Arc<RecordedDelay>,
        pipeline: Arc<RewritePipeline>,
    }

    fn harness(desktop: FakeDesktop, service: FakeService) -> Harness {
        let desktop = Arc::new(desktop);
        let service = Arc::new(service);
        let notifier = Arc::new(FakeNotifier::default());
        let delay = Arc::new(RecordedDelay::default());
        let pipeline = Arc::new(RewritePipeline::new(
            Collaborators {
                clipboard: desktop.clone(),
                input: desktop.clone(),
                service: service.clone(),
                notifier: notifier.clone(),
                delay: delay.clone(),
            },
            "gpt-4o-mini",
            SettleTiming::default(),
        ));
        Harness {
            desktop,
            service,
            notifier,
            delay,
            pipeline,
        }
    }

    fn job(api_key: Option<&str>) -> RewriteJob {
        RewriteJob {
            profile_name: "Hotkey 1".to_string(),
            prompt_template: "Fix this:\n\n".to_string(),
            api_key: api_key.map(String::from),
        }
    }

    #[tokio::test]
    async fn test_successful_rewrite_pastes_and_restores() {
        let h = harness(
            FakeDesktop::new(Some("original clip"), "teh text"),
            FakeService::replying("the text"),
        );

        let outcome = h.pipeline.run(job(Some("sk-test"))).await;

        assert_eq!(outcome, RewriteOutcome::Replaced);
        assert_eq!(h.desktop.pasted(), vec!["the text".to_string()]);
        assert_eq!(h.desktop.clipboard().as_deref(), Some("original clip"));
        assert!(h.notifier.notices().is_empty());
        assert_eq!(h.notifier.beeps(), 0);
        assert!(!h.pipeline.is_busy());
    }

    #[tokio::test]
    async fn test_request_is_template_plus_selection() {
        let h = harness(
            FakeDesktop::new(None, "some words"),
            FakeService::replying("Some words."),
        );

        h.pipeline.run(job(Some("sk-test"))).await;

        let requests = h.service.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].prompt, "Fix this:\n\nsome words");
        assert_eq!(requests[0].model, "gpt-4o-mini");
        assert_eq!(requests[0].api_key, "sk-test");
    }

    #[tokio::test]
    async fn test_settle_delays_in_order() {
        let h = harness(FakeDesktop::new(None, "x"), FakeService::replying("y"));

        h.pipeline.run(job(Some("sk-test"))).await;

        assert_eq!(
            *h.delay.0.lock().unwrap(),
            vec![
                Duration::from_millis(120),
                Duration::from_millis(80),
                Duration::from_millis(150)
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_selection_beeps_without_service_call() {
        let h = harness(
            FakeDesktop::new(Some("keep me"), ""),
            FakeService::replying("unused"),
        );

        let outcome = h.pipeline.run(job(Some("sk-test"))).await;

        assert_eq!(outcome, RewriteOutcome::EmptySelection);
        assert_eq!(h.notifier.beeps(), 1);
        assert!(h.service.requests().is_empty());
        assert_eq!(h.desktop.clipboard().as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_whitespace_selection_counts_as_empty() {
        let h = harness(FakeDesktop::new(None, "  \n\t"), FakeService::replying("unused"));

        assert_eq!(h.pipeline.run(job(Some("sk-test"))).await, RewriteOutcome::EmptySelection);
        assert!(h.service.requests().is_empty());
        assert_eq!(h.desktop.clipboard(), None);
    }

    #[tokio::test]
    async fn test_missing_key_warns_without_service_call() {
        let h = harness(
            FakeDesktop::new(Some("keep me"), "hello"),
            FakeService::replying("unused"),
        );

        let outcome = h.pipeline.run(job(None)).await;

        assert_eq!(outcome, RewriteOutcome::MissingCredential);
        assert!(h.service.requests().is_empty());
        assert_eq!(
            h.notifier.notices(),
            vec![(
                NotificationType::Warning,
                MISSING_KEY_TITLE.to_string(),
                MISSING_KEY_MESSAGE.to_string()
            )]
        );
        assert_eq!(h.desktop.clipboard().as_deref(), Some("keep me"));
        assert!(h.desktop.pasted().is_empty());
    }

    #[tokio::test]
    async fn test_blank_key_is_missing() {
        let h = harness(FakeDesktop::new(None, "hello"), FakeService::replying("unused"));
        assert_eq!(h.pipeline.run(job(Some("  "))).await, RewriteOutcome::MissingCredential);
    }

    #[tokio::test]
    async fn test_service_error_is_surfaced_and_clipboard_restored() {
        let h = harness(
            FakeDesktop::new(Some("keep me"), "hello"),
            FakeService::failing("Rate limit reached"),
        );

        let outcome = h.pipeline.run(job(Some("sk-test"))).await;

        assert_eq!(outcome, RewriteOutcome::ServiceFailed("Rate limit reached".to_string()));
        let notices = h.notifier.notices();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].0, NotificationType::Error);
        assert_eq!(notices[0].2, "[OpenAI error] Rate limit reached");
        assert!(h.desktop.pasted().is_empty());
        assert_eq!(h.desktop.clipboard().as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_paste_failure_still_restores() {
        let desktop = FakeDesktop {
            fail_paste: true,
            ..FakeDesktop::new(Some("keep me"), "hello")
        };
        let h = harness(desktop, FakeService::replying("Hello."));

        let outcome = h.pipeline.run(job(Some("sk-test"))).await;

        assert_eq!(outcome, RewriteOutcome::ReplaceFailed("paste blocked".to_string()));
        assert_eq!(h.desktop.clipboard().as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_empty_original_clipboard_is_cleared_after() {
        let h = harness(FakeDesktop::new(None, "hello"), FakeService::replying("Hello."));

        assert_eq!(h.pipeline.run(job(Some("sk-test"))).await, RewriteOutcome::Replaced);
        assert_eq!(h.desktop.pasted(), vec!["Hello.".to_string()]);
        assert_eq!(h.desktop.clipboard(), None);
    }

    #[tokio::test]
    async fn test_unreadable_clipboard_stops_at_empty_selection() {
        let desktop = FakeDesktop {
            fail_read: true,
            ..FakeDesktop::new(Some("unknown"), "hello")
        };
        let h = harness(desktop, FakeService::replying("unused"));

        assert_eq!(h.pipeline.run(job(Some("sk-test"))).await, RewriteOutcome::EmptySelection);
        assert!(h.service.requests().is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_trigger_is_dropped() {
        let started = Arc::new(Notify::new());
        let gate = Arc::new(Notify::new());
        let service = FakeService {
            started: Some(started.clone()),
            gate: Some(gate.clone()),
            ..FakeService::replying("Hello.")
        };
        let h = harness(FakeDesktop::new(Some("keep me"), "hello"), service);

        let first = tokio::spawn({
            let pipeline = h.pipeline.clone();
            async move { pipeline.run(job(Some("sk-test"))).await }
        });
        started.notified().await;
        assert!(h.pipeline.is_busy());

        let second = h.pipeline.run(job(Some("sk-test"))).await;

        assert_eq!(second, RewriteOutcome::Busy);
        assert_eq!(h.notifier.beeps(), 1);
        assert_eq!(h.service.requests().len(), 1);

        gate.notify_one();
        assert_eq!(first.await.unwrap(), RewriteOutcome::Replaced);
        assert!(!h.pipeline.is_busy());
        assert_eq!(h.desktop.clipboard().as_deref(), Some("keep me"));
    }

    #[tokio::test]
    async fn test_guard_released_after_failure() {
        let h = harness(FakeDesktop::new(None, ""), FakeService::replying("unused"));

        assert_eq!(h.pipeline.run(job(Some("sk-test"))).await, RewriteOutcome::EmptySelection);
        assert!(!h.pipeline.is_busy());
        assert_eq!(h.pipeline.run(job(Some("sk-test"))).await, RewriteOutcome::EmptySelection);
    }

    #[test]
    fn test_job_from_profile() {
        let profile = Profile::builtin_default();
        let job = RewriteJob::for_profile(&profile, Some("sk".into()));
        assert_eq!(job.profile_name, "Hotkey 1");
        assert_eq!(job.prompt_template, profile.prompt);
    }
}

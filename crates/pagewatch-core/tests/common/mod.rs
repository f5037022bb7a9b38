//! Test doubles and common utilities for contract tests
//!
//! This module provides minimal test doubles that script collaborator
//! behavior and record how the core drives them.

#![allow(dead_code)]

use async_trait::async_trait;
use pagewatch_core::config::{AcquisitionEngine, TargetConfig, WatchConfig};
use pagewatch_core::error::{Error, Result};
use pagewatch_core::traits::{
    AcquireRequest, Notifier, PageText, RecipientSource, RenderContext, Renderer, StateStore,
    TextAcquirer,
};
use pagewatch_core::acquire::Sleeper;
use pagewatch_core::watch::StateMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted acquisition result
#[derive(Debug, Clone)]
pub enum Step {
    Text(&'static str),
    NotReady,
    Fail,
}

/// A TextAcquirer that replays scripted results per URL
///
/// The last step for a URL repeats once its queue is drained.
#[derive(Clone)]
pub struct ScriptedAcquirer {
    engine: AcquisitionEngine,
    script: Arc<Mutex<HashMap<String, VecDeque<Step>>>>,
    last: Arc<Mutex<HashMap<String, Step>>>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedAcquirer {
    pub fn new(engine: AcquisitionEngine) -> Self {
        Self {
            engine,
            script: Arc::new(Mutex::new(HashMap::new())),
            last: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Queue steps for a URL
    pub fn script(&self, url: &str, steps: impl IntoIterator<Item = Step>) {
        self.script
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .extend(steps);
    }

    /// Number of acquire() calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextAcquirer for ScriptedAcquirer {
    async fn acquire(&self, request: &AcquireRequest<'_>) -> Result<PageText> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self
            .script
            .lock()
            .unwrap()
            .get_mut(request.url)
            .and_then(VecDeque::pop_front);
        let step = match next {
            Some(step) => {
                self.last
                    .lock()
                    .unwrap()
                    .insert(request.url.to_string(), step.clone());
                step
            }
            None => self
                .last
                .lock()
                .unwrap()
                .get(request.url)
                .cloned()
                .unwrap_or(Step::Fail),
        };

        match step {
            Step::Text(text) => Ok(PageText::Text(text.to_string())),
            Step::NotReady => Ok(PageText::unknown("scripted not ready")),
            Step::Fail => Err(Error::acquisition(format!("scripted failure for {}", request.url))),
        }
    }

    fn engine(&self) -> AcquisitionEngine {
        self.engine
    }
}

/// A Notifier that records deliveries and fails for chosen recipients
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    deliveries: Arc<Mutex<Vec<(String, String)>>>,
    attempts: Arc<AtomicUsize>,
    failing: Arc<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(recipients: &[&str]) -> Self {
        Self {
            failing: Arc::new(recipients.iter().map(|r| r.to_string()).collect()),
            ..Self::default()
        }
    }

    /// Successful (recipient, body) deliveries in order
    pub fn deliveries(&self) -> Vec<(String, String)> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Number of deliver() calls, including failures
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn deliver(&self, recipient: &str, body: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(recipient) {
            return Err(Error::notify(format!("scripted failure for {}", recipient)));
        }
        self.deliveries
            .lock()
            .unwrap()
            .push((recipient.to_string(), body.to_string()));
        Ok(())
    }

    fn notifier_name(&self) -> &'static str {
        "recording"
    }
}

/// A StateStore whose load or save can be made to fail
#[derive(Clone, Default)]
pub struct FlakyStore {
    states: Arc<Mutex<StateMap>>,
    fail_load: bool,
    fail_save: bool,
    saves: Arc<AtomicUsize>,
}

impl FlakyStore {
    pub fn failing_load() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    pub fn failing_save() -> Self {
        Self {
            fail_save: true,
            ..Self::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn load(&self) -> Result<StateMap> {
        if self.fail_load {
            return Err(Error::state_store("scripted load failure"));
        }
        Ok(self.states.lock().unwrap().clone())
    }

    async fn save(&self, states: &StateMap) -> Result<()> {
        if self.fail_save {
            return Err(Error::state_store("scripted save failure"));
        }
        *self.states.lock().unwrap() = states.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn store_name(&self) -> &'static str {
        "flaky"
    }
}

/// A RecipientSource that always fails
pub struct FailingRecipients;

#[async_trait]
impl RecipientSource for FailingRecipients {
    async fn recipients(&self) -> Result<Vec<String>> {
        Err(Error::state_store("scripted recipient list failure"))
    }
}

/// Behavior of one scripted browser context
#[derive(Debug, Clone, Default)]
pub struct ContextScript {
    /// Fail navigation with an unexpected error
    pub navigate_fails: bool,
    /// Visibility checks answering `false` before the anchor appears;
    /// `None` means it never appears
    pub hidden_checks: Option<usize>,
    /// innerText samples in order; the last one repeats
    pub texts: Vec<&'static str>,
    /// Time every visibility check and text read takes on the tokio clock
    pub check_delay: Duration,
}

impl ContextScript {
    pub fn ready_with(texts: &[&'static str]) -> Self {
        Self {
            hidden_checks: Some(0),
            texts: texts.to_vec(),
            ..Self::default()
        }
    }

    pub fn navigate_error() -> Self {
        Self {
            navigate_fails: true,
            ..Self::default()
        }
    }

    pub fn never_visible() -> Self {
        Self {
            hidden_checks: None,
            ..Self::default()
        }
    }

    /// Make every check take `delay` before answering
    pub fn with_check_delay(mut self, delay: Duration) -> Self {
        self.check_delay = delay;
        self
    }
}

/// Shared counters of a ScriptedRenderer
#[derive(Debug, Default)]
pub struct RendererLog {
    pub created: AtomicUsize,
    pub closed: AtomicUsize,
    pub shutdowns: AtomicUsize,
    pub visibility_selectors: Mutex<Vec<String>>,
    pub text_selectors: Mutex<Vec<String>>,
}

/// A Renderer handing out scripted contexts, one script per new_context()
#[derive(Clone)]
pub struct ScriptedRenderer {
    scripts: Arc<Mutex<VecDeque<ContextScript>>>,
    pub log: Arc<RendererLog>,
}

impl ScriptedRenderer {
    pub fn new(scripts: impl IntoIterator<Item = ContextScript>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into_iter().collect())),
            log: Arc::new(RendererLog::default()),
        }
    }

    pub fn created(&self) -> usize {
        self.log.created.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.log.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Renderer for ScriptedRenderer {
    async fn new_context(&self) -> Result<Box<dyn RenderContext>> {
        let script = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| Error::render("no scripted context left"))?;
        self.log.created.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedContext {
            script,
            visibility_checks: 0,
            text_reads: 0,
            log: Arc::clone(&self.log),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.log.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn active_contexts(&self) -> usize {
        self.created() - self.closed()
    }
}

struct ScriptedContext {
    script: ContextScript,
    visibility_checks: usize,
    text_reads: usize,
    log: Arc<RendererLog>,
}

impl ScriptedContext {
    async fn delay(&self) {
        if !self.script.check_delay.is_zero() {
            tokio::time::sleep(self.script.check_delay).await;
        }
    }
}

#[async_trait]
impl RenderContext for ScriptedContext {
    async fn navigate(&mut self, url: &str, _timeout: Duration) -> Result<()> {
        if self.script.navigate_fails {
            return Err(Error::render(format!("scripted navigation failure for {}", url)));
        }
        Ok(())
    }

    async fn wait_for_network_idle(&mut self, _timeout: Duration) -> Result<bool> {
        Ok(false)
    }

    async fn is_visible(&mut self, selector: &str) -> Result<bool> {
        self.log
            .visibility_selectors
            .lock()
            .unwrap()
            .push(selector.to_string());
        self.delay().await;
        self.visibility_checks += 1;
        Ok(match self.script.hidden_checks {
            Some(hidden) => self.visibility_checks > hidden,
            None => false,
        })
    }

    async fn inner_text(&mut self, selector: &str) -> Result<Option<String>> {
        self.log
            .text_selectors
            .lock()
            .unwrap()
            .push(selector.to_string());
        self.delay().await;
        let index = self.text_reads.min(self.script.texts.len().saturating_sub(1));
        self.text_reads += 1;
        Ok(self.script.texts.get(index).map(|t| t.to_string()))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.log.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A Sleeper that records requested durations without waiting
#[derive(Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().unwrap().clone()
    }

    /// Sleeps of at least `min`, i.e. backoff delays rather than poll intervals
    pub fn sleeps_at_least(&self, min: Duration) -> Vec<Duration> {
        self.sleeps().into_iter().filter(|d| *d >= min).collect()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.sleeps.lock().unwrap().push(duration);
    }
}

/// Target with `vacancy` / `full` keywords
pub fn vacancy_target(name: &str) -> TargetConfig {
    TargetConfig::new(name, format!("https://example.com/{}", name))
        .with_appear_keywords(["vacancy"])
        .with_vanish_keywords(["full"])
}

/// Config with a small event channel
pub fn watch_config(targets: Vec<TargetConfig>) -> WatchConfig {
    let mut config = WatchConfig::new(targets);
    config.engine.event_channel_capacity = 100;
    config
}

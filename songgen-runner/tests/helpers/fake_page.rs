//! Scripted in-memory page
//!
//! Elements are registered per selector (page-wide) or per (parent, selector)
//! pair. Interactions are recorded, and effects registered on clicks, typing
//! or navigation mutate the page the way the real application would.
//! Element text can change over (paused tokio) time, which drives the poller.

use async_trait::async_trait;
use songgen_runner::page::{ElementHandle, PageClient, PageError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

/// Mutation applied to the page when an interaction happens
pub type Effect = Arc<dyn Fn(&mut PageState) + Send + Sync>;

/// Everything the fake page knows
pub struct PageState {
    started: Instant,
    pub location: String,
    pub body: String,
    elements: HashMap<String, Vec<ElementHandle>>,
    children: HashMap<(String, String), Vec<ElementHandle>>,
    /// Text timeline per element id: (offset since start, text)
    texts: HashMap<String, Vec<(Duration, String)>>,
    /// Upcoming `ready_state_complete` answers; `true` once exhausted
    pub ready: VecDeque<bool>,
    /// Element ids whose clicks fail with a transport error
    pub broken: HashSet<String>,
    on_click: HashMap<String, Vec<Effect>>,
    on_type: HashMap<String, Vec<Effect>>,
    on_goto: HashMap<String, Vec<Effect>>,

    pub clicks: Vec<String>,
    pub typed: Vec<(String, String)>,
    pub cleared: Vec<String>,
    pub visited: Vec<String>,
    pub refreshes: u32,
    pub quit: bool,
}

impl PageState {
    fn new() -> Self {
        Self {
            started: Instant::now(),
            location: "about:blank".to_string(),
            body: String::new(),
            elements: HashMap::new(),
            children: HashMap::new(),
            texts: HashMap::new(),
            ready: VecDeque::new(),
            broken: HashSet::new(),
            on_click: HashMap::new(),
            on_type: HashMap::new(),
            on_goto: HashMap::new(),
            clicks: Vec::new(),
            typed: Vec::new(),
            cleared: Vec::new(),
            visited: Vec::new(),
            refreshes: 0,
            quit: false,
        }
    }

    /// Time since the page was created
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Make `selector` match exactly `ids`, in order
    pub fn show(&mut self, selector: &str, ids: &[&str]) {
        self.elements
            .insert(selector.to_string(), ids.iter().map(|id| ElementHandle::new(*id)).collect());
    }

    pub fn hide(&mut self, selector: &str) {
        self.elements.remove(selector);
    }

    /// Make `selector` under `parent` match exactly `ids`
    pub fn child(&mut self, parent: &str, selector: &str, ids: &[&str]) {
        self.children.insert(
            (parent.to_string(), selector.to_string()),
            ids.iter().map(|id| ElementHandle::new(*id)).collect(),
        );
    }

    pub fn remove_child(&mut self, parent: &str, selector: &str) {
        self.children.remove(&(parent.to_string(), selector.to_string()));
    }

    /// Replace the element's text from now on
    pub fn set_text(&mut self, id: &str, text: &str) {
        let now = self.started.elapsed();
        let timeline = self.texts.entry(id.to_string()).or_default();
        timeline.retain(|(at, _)| *at < now);
        timeline.push((now, text.to_string()));
    }

    /// Element text switches to `text` once `after` has elapsed since start
    pub fn set_text_after(&mut self, id: &str, after: Duration, text: &str) {
        let timeline = self.texts.entry(id.to_string()).or_default();
        timeline.push((after, text.to_string()));
        timeline.sort_by_key(|(at, _)| *at);
    }

    fn text_of(&self, id: &str) -> String {
        let now = self.started.elapsed();
        self.texts
            .get(id)
            .and_then(|timeline| timeline.iter().rev().find(|(at, _)| *at <= now))
            .map(|(_, text)| text.clone())
            .unwrap_or_default()
    }

    fn effects(map: &HashMap<String, Vec<Effect>>, key: &str) -> Vec<Effect> {
        map.get(key).cloned().unwrap_or_default()
    }
}

/// Cheaply cloneable handle on one shared fake page
#[derive(Clone)]
pub struct FakePage {
    state: Arc<Mutex<PageState>>,
}

impl Default for FakePage {
    fn default() -> Self {
        Self::new()
    }
}

impl FakePage {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PageState::new())),
        }
    }

    /// Run `f` against the page state
    pub fn with<R>(&self, f: impl FnOnce(&mut PageState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn show(&self, selector: &str, ids: &[&str]) {
        self.with(|s| s.show(selector, ids));
    }

    pub fn child(&self, parent: &str, selector: &str, ids: &[&str]) {
        self.with(|s| s.child(parent, selector, ids));
    }

    pub fn set_text(&self, id: &str, text: &str) {
        self.with(|s| s.set_text(id, text));
    }

    pub fn set_text_after(&self, id: &str, after: Duration, text: &str) {
        self.with(|s| s.set_text_after(id, after, text));
    }

    pub fn set_location(&self, url: &str) {
        self.with(|s| s.location = url.to_string());
    }

    pub fn set_body(&self, text: &str) {
        self.with(|s| s.body = text.to_string());
    }

    /// Next `n` ready-state checks report "still loading"
    pub fn not_ready_for(&self, n: usize) {
        self.with(|s| s.ready.extend(std::iter::repeat(false).take(n)));
    }

    pub fn on_click(&self, id: &str, effect: impl Fn(&mut PageState) + Send + Sync + 'static) {
        self.with(|s| s.on_click.entry(id.to_string()).or_default().push(Arc::new(effect)));
    }

    pub fn on_type(&self, id: &str, effect: impl Fn(&mut PageState) + Send + Sync + 'static) {
        self.with(|s| s.on_type.entry(id.to_string()).or_default().push(Arc::new(effect)));
    }

    pub fn on_goto(&self, url: &str, effect: impl Fn(&mut PageState) + Send + Sync + 'static) {
        self.with(|s| s.on_goto.entry(url.to_string()).or_default().push(Arc::new(effect)));
    }

    pub fn clicks(&self) -> Vec<String> {
        self.with(|s| s.clicks.clone())
    }

    pub fn click_count(&self, id: &str) -> usize {
        self.with(|s| s.clicks.iter().filter(|c| c.as_str() == id).count())
    }

    pub fn typed_into(&self, id: &str) -> Vec<String> {
        self.with(|s| {
            s.typed
                .iter()
                .filter(|(target, _)| target == id)
                .map(|(_, text)| text.clone())
                .collect()
        })
    }

    pub fn visited(&self) -> Vec<String> {
        self.with(|s| s.visited.clone())
    }

    pub fn is_quit(&self) -> bool {
        self.with(|s| s.quit)
    }
}

#[async_trait]
impl PageClient for FakePage {
    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, PageError> {
        Ok(self.with(|s| s.elements.get(selector).cloned().unwrap_or_default()))
    }

    async fn find_all_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, PageError> {
        Ok(self.with(|s| {
            s.children
                .get(&(parent.id().to_string(), selector.to_string()))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.with(|s| {
            if s.broken.contains(element.id()) {
                return Err(PageError::Transport(format!("element {} is stale", element.id())));
            }
            s.clicks.push(element.id().to_string());
            for effect in PageState::effects(&s.on_click, element.id()) {
                effect(s);
            }
            Ok(())
        })
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), PageError> {
        self.with(|s| {
            s.typed.push((element.id().to_string(), text.to_string()));
            for effect in PageState::effects(&s.on_type, element.id()) {
                effect(s);
            }
        });
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.with(|s| s.cleared.push(element.id().to_string()));
        Ok(())
    }

    async fn read_text(&self, element: &ElementHandle) -> Result<String, PageError> {
        Ok(self.with(|s| s.text_of(element.id())))
    }

    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.with(|s| {
            s.visited.push(url.to_string());
            s.location = url.to_string();
            for effect in PageState::effects(&s.on_goto, url) {
                effect(s);
            }
        });
        Ok(())
    }

    async fn refresh(&self) -> Result<(), PageError> {
        self.with(|s| s.refreshes += 1);
        Ok(())
    }

    async fn ready_state_complete(&self) -> Result<bool, PageError> {
        Ok(self.with(|s| s.ready.pop_front().unwrap_or(true)))
    }

    async fn current_location(&self) -> Result<String, PageError> {
        Ok(self.with(|s| s.location.clone()))
    }

    async fn page_text(&self) -> Result<String, PageError> {
        Ok(self.with(|s| s.body.clone()))
    }

    async fn quit(&self) -> Result<(), PageError> {
        self.with(|s| s.quit = true);
        Ok(())
    }
}

//! Interactive page client
//!
//! The orchestrator only ever talks to the external application through
//! [`PageClient`]. Locators are opaque strings taken from [`Selectors`]; the
//! core never inspects markup beyond this contract.
//!
//! Single-element lookups go through [`find_one`], which distinguishes zero
//! from many matches. Both collapse to `None` at call sites: an ambiguous
//! match is treated as absence, never as "the first one".

pub mod navigation;
pub mod selectors;
pub mod webdriver;

pub use navigation::{navigate, reload_until_ready, wait_until_ready, NavigationLadder, NavigationSettings};
pub use selectors::Selectors;
pub use webdriver::{BrowserOptions, WebDriverLauncher, WebDriverPage};

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Page client errors
#[derive(Debug, Error)]
pub enum PageError {
    /// The browser endpoint could not be reached
    #[error("Transport error: {0}")]
    Transport(String),

    /// The browser endpoint answered with an error
    #[error("Protocol error ({status}): {message}")]
    Protocol { status: u16, message: String },

    /// The browser endpoint answered with something unexpected
    #[error("Malformed response: {0}")]
    Parse(String),

    #[error("Page {url} failed to load after {attempts} attempts")]
    NavigationFailed { url: String, attempts: u32 },

    /// Browser launch files could not be written
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PageError {
    pub fn kind(&self) -> crate::error::ErrorKind {
        crate::error::ErrorKind::Interaction
    }
}

impl From<reqwest::Error> for PageError {
    fn from(err: reqwest::Error) -> Self {
        PageError::Transport(err.to_string())
    }
}

/// Opaque reference to a rendered element
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle(pub String);

impl ElementHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

/// Outcome of a single-element lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Zero,
    One(ElementHandle),
    Many(usize),
}

impl Lookup {
    fn from_matches(mut matches: Vec<ElementHandle>) -> Self {
        match matches.len() {
            0 => Lookup::Zero,
            1 => Lookup::One(matches.remove(0)),
            n => Lookup::Many(n),
        }
    }

    /// Collapse to `Some` only for exactly one match
    pub fn into_option(self) -> Option<ElementHandle> {
        match self {
            Lookup::One(handle) => Some(handle),
            Lookup::Zero | Lookup::Many(_) => None,
        }
    }
}

/// Capability the orchestrator needs from a rendered page
#[async_trait]
pub trait PageClient: Send + Sync {
    /// Every element matching `selector`, in document order
    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, PageError>;

    /// Every element under `parent` matching `selector`
    async fn find_all_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, PageError>;

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError>;

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), PageError>;

    async fn clear(&self, element: &ElementHandle) -> Result<(), PageError>;

    /// Visible text of an element
    async fn read_text(&self, element: &ElementHandle) -> Result<String, PageError>;

    /// Start loading `url` without waiting for completion
    async fn goto(&self, url: &str) -> Result<(), PageError>;

    async fn refresh(&self) -> Result<(), PageError>;

    /// `document.readyState == "complete"`
    async fn ready_state_complete(&self) -> Result<bool, PageError>;

    async fn current_location(&self) -> Result<String, PageError>;

    /// Visible text of the whole document body
    async fn page_text(&self) -> Result<String, PageError>;

    /// End the browser session
    async fn quit(&self) -> Result<(), PageError>;
}

/// Starts a browser session for one job
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, options: &BrowserOptions) -> Result<Box<dyn PageClient>, PageError>;
}

/// Single-element lookup on the whole page
pub async fn find_one<P: PageClient + ?Sized>(page: &P, selector: &str) -> Result<Lookup, PageError> {
    let lookup = Lookup::from_matches(page.find_all(selector).await?);
    if let Lookup::Many(n) = lookup {
        debug!(selector, matches = n, "Ambiguous lookup treated as absent");
    }
    Ok(lookup)
}

/// Single-element lookup under `parent`
pub async fn find_one_within<P: PageClient + ?Sized>(
    page: &P,
    parent: &ElementHandle,
    selector: &str,
) -> Result<Lookup, PageError> {
    let lookup = Lookup::from_matches(page.find_all_within(parent, selector).await?);
    if let Lookup::Many(n) = lookup {
        debug!(selector, matches = n, "Ambiguous lookup treated as absent");
    }
    Ok(lookup)
}

/// [`find_one`] collapsed to `Option`
pub async fn locate<P: PageClient + ?Sized>(
    page: &P,
    selector: &str,
) -> Result<Option<ElementHandle>, PageError> {
    Ok(find_one(page, selector).await?.into_option())
}

/// [`find_one_within`] collapsed to `Option`
pub async fn locate_within<P: PageClient + ?Sized>(
    page: &P,
    parent: &ElementHandle,
    selector: &str,
) -> Result<Option<ElementHandle>, PageError> {
    Ok(find_one_within(page, parent, selector).await?.into_option())
}

/// All matches, or `None` when nothing matched
pub async fn find_many<P: PageClient + ?Sized>(
    page: &P,
    selector: &str,
) -> Result<Option<Vec<ElementHandle>>, PageError> {
    let matches = page.find_all(selector).await?;
    Ok(if matches.is_empty() { None } else { Some(matches) })
}

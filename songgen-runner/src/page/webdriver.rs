//! W3C WebDriver page client
//!
//! Speaks the WebDriver wire protocol to an already running driver process
//! (chromedriver) over HTTP. Sessions are created with
//! `pageLoadStrategy = none`, so navigation returns immediately and load
//! completion is observed through [`PageClient::ready_state_complete`].

use super::{BrowserLauncher, ElementHandle, PageClient, PageError};
use crate::config::ProxyProfile;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Key under which the protocol returns element references
const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Browser launch settings for one job
#[derive(Debug, Clone)]
pub struct BrowserOptions {
    /// Persistent profile directory (`--user-data-dir`)
    pub profile_dir: PathBuf,
    /// Download target; must be job-exclusive
    pub downloads_dir: PathBuf,
    pub user_agent: String,
    pub headless: bool,
    /// All traffic goes through this proxy; only its host resolves locally
    pub proxy: Option<ProxyProfile>,
    /// Where the proxy credentials extension is unpacked
    pub extension_dir: PathBuf,
}

impl BrowserOptions {
    /// Chrome capabilities for a new session
    pub fn capabilities(&self) -> Value {
        let mut args = vec![
            "--no-sandbox".to_string(),
            "--disable-dev-shm-usage".to_string(),
            "--disable-gpu".to_string(),
            "--disable-infobars".to_string(),
            "--no-first-run".to_string(),
            "--no-service-autorun".to_string(),
            "--password-store=basic".to_string(),
            "--disable-blink-features=AutomationControlled".to_string(),
            "--ignore-certificate-errors".to_string(),
            format!("--user-data-dir={}", self.profile_dir.display()),
            format!("--user-agent={}", self.user_agent),
        ];
        if self.headless {
            args.insert(0, "--headless=new".to_string());
        }
        if let Some(proxy) = &self.proxy {
            args.push(format!("--proxy-server={}", proxy.server()));
            args.push(format!(
                "--host-resolver-rules=MAP * ~NOTFOUND , EXCLUDE {}",
                proxy.address.trim()
            ));
            args.push(format!("--load-extension={}", self.extension_dir.display()));
        }

        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "chrome",
                    "pageLoadStrategy": "none",
                    "goog:chromeOptions": {
                        "args": args,
                        "prefs": {
                            "download.default_directory": self.downloads_dir.display().to_string(),
                            "download.prompt_for_download": false,
                            "download.directory_upgrade": true,
                            "safebrowsing.enabled": true,
                            "credentials_enable_service": false,
                            "profile.password_manager_enabled": false
                        }
                    }
                }
            }
        })
    }
}

/// Manifest and service worker of the extension answering proxy auth challenges
pub fn proxy_auth_extension(proxy: &ProxyProfile) -> (String, String) {
    let manifest = json!({
        "manifest_version": 3,
        "name": "songgen proxy auth",
        "version": "1.0",
        "permissions": ["webRequest", "webRequestAuthProvider"],
        "host_permissions": ["<all_urls>"],
        "background": { "service_worker": "background.js" }
    });

    let background = format!(
        r#"chrome.webRequest.onAuthRequired.addListener(
  (details, callback) => {{
    if (!details.isProxy) {{
      callback({{}});
      return;
    }}
    callback({{ authCredentials: {{ username: {}, password: {} }} }});
  }},
  {{ urls: ["<all_urls>"] }},
  ["asyncBlocking"]
);
"#,
        Value::from(proxy.username.as_str()),
        Value::from(proxy.password.as_str())
    );

    (manifest.to_string(), background)
}

async fn install_proxy_extension(dir: &Path, proxy: &ProxyProfile) -> Result<(), PageError> {
    let (manifest, background) = proxy_auth_extension(proxy);
    tokio::fs::create_dir_all(dir).await?;
    tokio::fs::write(dir.join("manifest.json"), manifest).await?;
    tokio::fs::write(dir.join("background.js"), background).await?;
    debug!(dir = %dir.display(), "Proxy extension installed");
    Ok(())
}

/// A live WebDriver session
pub struct WebDriverPage {
    http_client: reqwest::Client,
    endpoint: String,
    session_id: String,
}

impl WebDriverPage {
    /// Start a browser session on the driver at `endpoint`
    pub async fn connect(endpoint: &str, options: &BrowserOptions) -> Result<Self, PageError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let endpoint = endpoint.trim_end_matches('/').to_string();

        if let Some(proxy) = &options.proxy {
            install_proxy_extension(&options.extension_dir, proxy).await?;
        }

        let response = http_client
            .post(format!("{}/session", endpoint))
            .json(&options.capabilities())
            .send()
            .await?;
        let value = unwrap_response(response).await?;

        let session_id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| PageError::Parse("session response has no sessionId".to_string()))?
            .to_string();

        info!(session_id = %session_id, "WebDriver session started");

        Ok(Self {
            http_client,
            endpoint,
            session_id,
        })
    }

    async fn command(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value, PageError> {
        let url = format!("{}/session/{}{}", self.endpoint, self.session_id, path);
        debug!(%method, path, "WebDriver command");

        let mut request = self.http_client.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        unwrap_response(request.send().await?).await
    }

    async fn find(&self, path: &str, selector: &str) -> Result<Vec<ElementHandle>, PageError> {
        let value = self
            .command(Method::POST, path, Some(json!({"using": "xpath", "value": selector})))
            .await?;
        parse_elements(&value)
    }
}

/// Launches sessions on a fixed driver endpoint
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    endpoint: String,
}

impl WebDriverLauncher {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl BrowserLauncher for WebDriverLauncher {
    async fn launch(&self, options: &BrowserOptions) -> Result<Box<dyn PageClient>, PageError> {
        Ok(Box::new(WebDriverPage::connect(&self.endpoint, options).await?))
    }
}

/// Extract `value` from a protocol response, mapping error payloads
async fn unwrap_response(response: reqwest::Response) -> Result<Value, PageError> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .map_err(|e| PageError::Parse(e.to_string()))?;
    let value = body.get("value").cloned().unwrap_or(Value::Null);

    if !status.is_success() {
        let message = value
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| value.get("error").and_then(Value::as_str))
            .unwrap_or("unknown error")
            .to_string();
        return Err(PageError::Protocol {
            status: status.as_u16(),
            message,
        });
    }

    Ok(value)
}

/// Element references from a find-elements response
fn parse_elements(value: &Value) -> Result<Vec<ElementHandle>, PageError> {
    let items = value
        .as_array()
        .ok_or_else(|| PageError::Parse("expected an array of elements".to_string()))?;

    items
        .iter()
        .map(|item| {
            item.get(ELEMENT_KEY)
                .and_then(Value::as_str)
                .map(ElementHandle::new)
                .ok_or_else(|| PageError::Parse(format!("not an element reference: {}", item)))
        })
        .collect()
}

#[async_trait]
impl PageClient for WebDriverPage {
    async fn find_all(&self, selector: &str) -> Result<Vec<ElementHandle>, PageError> {
        self.find("/elements", selector).await
    }

    async fn find_all_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, PageError> {
        self.find(&format!("/element/{}/elements", parent.id()), selector)
            .await
    }

    async fn click(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.command(Method::POST, &format!("/element/{}/click", element.id()), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn type_text(&self, element: &ElementHandle, text: &str) -> Result<(), PageError> {
        self.command(
            Method::POST,
            &format!("/element/{}/value", element.id()),
            Some(json!({ "text": text })),
        )
        .await?;
        Ok(())
    }

    async fn clear(&self, element: &ElementHandle) -> Result<(), PageError> {
        self.command(Method::POST, &format!("/element/{}/clear", element.id()), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn read_text(&self, element: &ElementHandle) -> Result<String, PageError> {
        let value = self
            .command(Method::GET, &format!("/element/{}/text", element.id()), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn goto(&self, url: &str) -> Result<(), PageError> {
        self.command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn refresh(&self) -> Result<(), PageError> {
        self.command(Method::POST, "/refresh", Some(json!({}))).await?;
        Ok(())
    }

    async fn ready_state_complete(&self) -> Result<bool, PageError> {
        let value = self
            .command(
                Method::POST,
                "/execute/sync",
                Some(json!({ "script": "return document.readyState", "args": [] })),
            )
            .await?;
        Ok(value.as_str() == Some("complete"))
    }

    async fn current_location(&self) -> Result<String, PageError> {
        let value = self.command(Method::GET, "/url", None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn page_text(&self) -> Result<String, PageError> {
        match self.find_all("//body").await?.first() {
            Some(body) => self.read_text(body).await,
            None => Ok(String::new()),
        }
    }

    async fn quit(&self) -> Result<(), PageError> {
        let url = format!("{}/session/{}", self.endpoint, self.session_id);
        match self.http_client.delete(&url).send().await {
            Ok(_) => {
                info!(session_id = %self.session_id, "WebDriver session closed");
                Ok(())
            }
            Err(e) => {
                warn!(session_id = %self.session_id, error = %e, "Failed to close WebDriver session");
                Err(e.into())
            }
        }
    }
}

//! WebDriver-backed session against the records portal.
//!
//! Everything in here is scripted interaction with a third-party UI: the
//! selectors target the portal's markup as it exists today, and the run
//! loop treats any failure below as a per-client failure rather than a
//! reason to abort the batch.

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{Local, NaiveDate};
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::wd::WebDriverCompatibleCommand;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::json;
use tokio::time::sleep;
use tracing::{debug, info, instrument};

use crate::client::{ClientName, ClientProfile, ConsentDoc};
use crate::config::Credentials;
use crate::errors::PortalError;
use crate::runner::ClientProcessor;

pub const DEFAULT_PORTAL_URL: &str = "https://portal.therapyappointment.com";

// Default timeout if none is specified in the options
const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(15);

// Consent forms keep rendering after the navigation itself completes;
// printing too early yields a blank body.
const RENDER_DELAY: Duration = Duration::from_secs(5);

// WebDriver key codepoints
const KEY_ENTER: &str = "\u{E007}";
const KEY_ESCAPE: &str = "\u{E00C}";

#[derive(Debug, Clone)]
pub struct PortalOptions {
    pub portal_url: String,
    pub webdriver_url: String,
    pub headless: bool,
    pub wait_timeout: Duration,
    pub output_dir: PathBuf,
}

impl Default for PortalOptions {
    fn default() -> Self {
        Self {
            portal_url: DEFAULT_PORTAL_URL.to_string(),
            webdriver_url: "http://localhost:9515".to_string(),
            headless: false,
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
            output_dir: PathBuf::from("School Records Requests"),
        }
    }
}

/// One logged-in browser session against the portal.
pub struct PortalSession {
    client: Client,
    portal_url: String,
    wait_timeout: Duration,
    output_dir: PathBuf,
}

impl PortalSession {
    /// Start a WebDriver session. Establishing the session is deliberately
    /// separate from the run loop so that a run with nothing pending never
    /// opens a browser.
    pub async fn connect(options: &PortalOptions) -> Result<Self, PortalError> {
        let mut args = vec!["--window-size=1920,1080".to_string()];
        if options.headless {
            args.push("--headless=new".to_string());
            args.push("--disable-gpu".to_string());
        }
        let mut caps = serde_json::map::Map::new();
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        debug!(url = %options.webdriver_url, "connecting to WebDriver");
        let client = ClientBuilder::rustls()
            .capabilities(caps)
            .connect(&options.webdriver_url)
            .await?;

        Ok(Self {
            client,
            portal_url: options.portal_url.clone(),
            wait_timeout: options.wait_timeout,
            output_dir: options.output_dir.clone(),
        })
    }

    /// Wait for an element to appear, bounded by the session timeout.
    async fn wait_for(&self, locator: Locator<'_>, what: &str) -> Result<Element, PortalError> {
        self.client
            .wait()
            .at_most(self.wait_timeout)
            .for_element(locator)
            .await
            .map_err(|e| match e {
                CmdError::WaitTimeout => PortalError::Timeout(format!(
                    "waited {:?} for {what}",
                    self.wait_timeout
                )),
                other => other.into(),
            })
    }

    #[instrument(skip(self, credentials))]
    pub async fn login(&self, credentials: &Credentials) -> Result<(), PortalError> {
        info!(url = %self.portal_url, "logging in to portal");
        self.client.goto(&self.portal_url).await?;

        let username = self
            .wait_for(Locator::Css("input[name='user_username']"), "username field")
            .await?;
        username.send_keys(&credentials.username).await?;

        let password = self
            .wait_for(Locator::Css("input[name='user_password']"), "password field")
            .await?;
        password.send_keys(&credentials.password).await?;
        password.send_keys(KEY_ENTER).await?;

        // The navigation rail with the Clients entry only renders once the
        // credentials were accepted.
        self.wait_for(
            Locator::XPath("//*[contains(text(), 'Clients')]"),
            "post-login navigation",
        )
        .await
        .map_err(|e| match e {
            PortalError::Timeout(_) => PortalError::LoginFailed(
                "portal navigation did not appear after submitting credentials".to_string(),
            ),
            other => other,
        })?;
        Ok(())
    }

    /// Search for the client and open their profile page.
    #[instrument(skip(self))]
    async fn open_client(&self, name: &ClientName) -> Result<(), PortalError> {
        let clients_nav = self
            .wait_for(
                Locator::XPath("//*[contains(text(), 'Clients')]"),
                "Clients navigation entry",
            )
            .await?;
        clients_nav.click().await?;

        // A reminder dialog sometimes overlays the search form; Escape
        // dismisses it and is harmless otherwise.
        if let Ok(body) = self.client.find(Locator::Css("body")).await {
            let _ = body.send_keys(KEY_ESCAPE).await;
        }

        let first_field = self
            .wait_for(
                Locator::XPath("//label[text()='First Name']/following-sibling::input"),
                "first name field",
            )
            .await?;
        first_field.send_keys(name.first()).await?;

        let last_field = self
            .wait_for(
                Locator::XPath("//label[text()='Last Name']/following-sibling::input"),
                "last name field",
            )
            .await?;
        last_field.send_keys(name.last()).await?;

        let search = self
            .wait_for(Locator::Css("button[aria-label='Search']"), "search button")
            .await?;
        search.click().await?;

        // No profile link within the timeout means the search came up empty.
        let profile_link = self
            .client
            .wait()
            .at_most(self.wait_timeout)
            .for_element(Locator::Css(
                "a[aria-description*='Press Enter to view the profile of']",
            ))
            .await;
        match profile_link {
            Ok(link) => {
                link.click().await?;
                Ok(())
            }
            Err(CmdError::WaitTimeout) => Err(PortalError::ClientNotFound(name.full())),
            Err(e) => Err(e.into()),
        }
    }

    /// Scrape the profile page the search landed on.
    async fn extract_profile(&self) -> Result<ClientProfile, PortalError> {
        let heading = self
            .wait_for(Locator::Css(".text-h4"), "profile heading")
            .await?
            .text()
            .await?;
        let mut words = heading.split_whitespace();
        let first_name = words
            .next()
            .ok_or_else(|| PortalError::ExtractFailed("profile heading was empty".to_string()))?
            .to_string();
        let last_name = words.next_back().unwrap_or(first_name.as_str()).to_string();

        let account_line = self
            .wait_for(
                Locator::XPath("//div[contains(normalize-space(text()), 'Account #')]"),
                "account number",
            )
            .await?
            .text()
            .await?;
        let account_number = account_line
            .split_whitespace()
            .next_back()
            .unwrap_or_default()
            .to_string();

        let dob_line = self
            .wait_for(
                Locator::XPath("//div[contains(normalize-space(text()), 'DOB ')]"),
                "birthdate",
            )
            .await?
            .text()
            .await?;
        let dob_token = dob_line.split_whitespace().next_back().unwrap_or_default();
        let birthdate = NaiveDate::parse_from_str(dob_token, "%m/%d/%Y").map_err(|e| {
            PortalError::ExtractFailed(format!("unparseable birthdate {dob_token:?}: {e}"))
        })?;

        let gender_line = self
            .wait_for(
                Locator::XPath(
                    "//div[contains(normalize-space(text()), 'Gender') and contains(@class, 'v-list-item__title')]/following-sibling::div",
                ),
                "gender",
            )
            .await?
            .text()
            .await?;
        let gender = gender_line
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();

        let profile = ClientProfile {
            first_name,
            last_name,
            account_number,
            birthdate,
            gender,
        };
        debug!(
            account = %profile.account_number,
            age = profile.age_on(Local::now().date_naive()),
            "extracted client profile"
        );
        Ok(profile)
    }

    /// Export both consent documents from the "Docs & Forms" tab as PDFs.
    #[instrument(skip(self, profile))]
    async fn export_consent_docs(&self, profile: &ClientProfile) -> Result<Vec<PathBuf>, PortalError> {
        fs::create_dir_all(&self.output_dir)?;

        let docs_tab = self
            .wait_for(Locator::LinkText("Docs & Forms"), "Docs & Forms tab")
            .await?;
        docs_tab.click().await?;

        let mut saved = Vec::with_capacity(ConsentDoc::ALL.len());
        for doc in ConsentDoc::ALL {
            let link_text = doc.link_text();
            let link = self
                .wait_for(Locator::LinkText(&link_text), &link_text)
                .await?;
            link.click().await?;
            sleep(RENDER_DELAY).await;

            let bytes = self.print_page().await?;
            let path = self.output_dir.join(doc.file_name(profile));
            fs::write(&path, &bytes)?;
            info!(path = %path.display(), "saved consent document");

            self.client.back().await?;
            saved.push(path);
        }

        // Re-expand the collapsed tab rail so the next search starts from a
        // known state.
        if let Ok(chevron) = self.client.find(Locator::Css(".mdi-chevron-double-right")).await {
            let _ = chevron.click().await;
        }

        Ok(saved)
    }

    /// Print the current page through the W3C WebDriver `print` endpoint.
    async fn print_page(&self) -> Result<Vec<u8>, PortalError> {
        let value = self.client.issue_cmd(PrintPage::portrait()).await?;
        let encoded = value.as_str().ok_or_else(|| {
            PortalError::ExportFailed("print endpoint returned a non-string payload".to_string())
        })?;
        BASE64
            .decode(encoded)
            .map_err(|e| PortalError::ExportFailed(format!("invalid base64 from print endpoint: {e}")))
    }

    /// End the WebDriver session.
    pub async fn close(self) -> Result<(), PortalError> {
        self.client.close().await?;
        Ok(())
    }
}

#[async_trait]
impl ClientProcessor for PortalSession {
    async fn process(&self, name: &ClientName) -> Result<(), PortalError> {
        self.open_client(name).await?;
        let profile = self.extract_profile().await?;
        self.export_consent_docs(&profile).await?;
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), PortalError> {
        self.client.clone().close().await?;
        Ok(())
    }
}

/// The W3C WebDriver `print` command; fantoccini has no built-in wrapper
/// for it, so it goes through `issue_cmd`.
#[derive(Debug, Clone)]
struct PrintPage {
    orientation: &'static str,
}

impl PrintPage {
    fn portrait() -> Self {
        Self {
            orientation: "portrait",
        }
    }
}

impl WebDriverCompatibleCommand for PrintPage {
    fn endpoint(
        &self,
        base_url: &url::Url,
        session_id: Option<&str>,
    ) -> Result<url::Url, url::ParseError> {
        base_url.join(&format!("session/{}/print", session_id.unwrap_or_default()))
    }

    fn method_and_body(&self, _request_url: &url::Url) -> (http::Method, Option<String>) {
        (
            http::Method::POST,
            Some(json!({ "orientation": self.orientation }).to_string()),
        )
    }

    fn is_new_session(&self) -> bool {
        false
    }

    fn is_legacy(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn print_command_targets_session_print_endpoint() {
        let base = url::Url::parse("http://localhost:9515/").unwrap();
        let endpoint = PrintPage::portrait()
            .endpoint(&base, Some("abc123"))
            .unwrap();
        assert_eq!(endpoint.as_str(), "http://localhost:9515/session/abc123/print");
    }

    #[test]
    fn print_command_posts_portrait_body() {
        let base = url::Url::parse("http://localhost:9515/").unwrap();
        let cmd = PrintPage::portrait();
        let endpoint = cmd.endpoint(&base, Some("abc123")).unwrap();
        let (method, body) = cmd.method_and_body(&endpoint);
        assert_eq!(method, http::Method::POST);
        let body: serde_json::Value = serde_json::from_str(&body.unwrap()).unwrap();
        assert_eq!(body["orientation"], "portrait");
    }

    #[test]
    fn default_options_match_portal_defaults() {
        let options = PortalOptions::default();
        assert_eq!(options.portal_url, DEFAULT_PORTAL_URL);
        assert_eq!(options.wait_timeout, Duration::from_secs(15));
        assert!(!options.headless);
    }
}

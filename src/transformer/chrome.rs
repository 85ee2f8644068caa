use anyhow::{Context, anyhow};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use std::time::{Duration, Instant};

use super::AffiliateBackend;
use crate::config::LinkConfig;
use crate::utils::error::{AppError, Result};

const EMAIL_INPUT: &str = r#"input[name="email"]"#;
const PASSWORD_INPUT: &str = r#"input[name="password"]"#;
const LINK_INPUT: &str = r#"input[name="link"]"#;
const RESULT_FIELD: &str = "textarea";
const LOGIN_ENTRY_XPATH: &str = "//*[normalize-space(text())='Login']";
const LOGIN_SUBMIT_XPATH: &str = "//button[contains(normalize-space(.), 'Login')]";
const CONVERT_SUBMIT_XPATH: &str = "//button[contains(normalize-space(.), 'Make Profit Link')]";
const POLL_INTERVAL: Duration = Duration::from_millis(250);
const SESSION_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct SessionSettings {
    email: String,
    password: String,
    login_url: String,
    profit_link_url: String,
    chrome_path: Option<String>,
    step_timeout: Duration,
    login_settle: Duration,
}

/// Wall-clock end of one conversion session.
///
/// The blocking browser thread outlives an expired async timeout, so every
/// step checks the deadline itself and never waits past it.
#[derive(Debug, Clone, Copy)]
struct Deadline(Instant);

impl Deadline {
    fn after(budget: Duration) -> Self {
        Deadline(Instant::now() + budget)
    }

    fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    /// How long the next step may wait, or an error once the session is over.
    fn step_budget(&self, step_timeout: Duration) -> anyhow::Result<Duration> {
        let remaining = self.remaining();
        if remaining.is_zero() {
            return Err(anyhow!("Profit link session deadline passed"));
        }
        Ok(remaining.min(step_timeout))
    }
}

/// Drives the affiliate site's "profit link" form in headless Chrome.
///
/// Every call launches its own browser and logs in from scratch; nothing is
/// shared between conversions.
pub struct ChromeAffiliateBackend {
    settings: SessionSettings,
    session_timeout: Duration,
}

impl ChromeAffiliateBackend {
    pub fn from_config(config: &LinkConfig) -> Result<Self> {
        let email = config
            .email
            .clone()
            .ok_or_else(|| {
                AppError::InvalidInput("affiliate email is not configured".to_string())
            })?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| {
                AppError::InvalidInput("affiliate password is not configured".to_string())
            })?;

        let session_timeout = config.session_timeout();

        Ok(Self {
            settings: SessionSettings {
                email,
                password,
                login_url: config.login_url.clone(),
                profit_link_url: config.profit_link_url.clone(),
                chrome_path: config.chrome_path.clone(),
                step_timeout: session_timeout.min(Duration::from_secs(20)),
                login_settle: config.login_settle(),
            },
            session_timeout,
        })
    }
}

#[async_trait]
impl AffiliateBackend for ChromeAffiliateBackend {
    async fn create_profit_link(&self, link: &str) -> Result<String> {
        let settings = self.settings.clone();
        let link = link.to_string();
        let deadline = Deadline::after(self.session_timeout);

        // headless_chrome is blocking; keep it off the async workers.
        let session =
            tokio::task::spawn_blocking(move || convert_in_browser(&settings, deadline, &link));

        // The browser thread stops itself at the deadline; the grace only
        // covers a step wedged outside the tab's own timeouts.
        match tokio::time::timeout(self.session_timeout + SESSION_GRACE, session).await {
            Ok(Ok(Ok(profit_link))) => Ok(profit_link),
            Ok(Ok(Err(e))) => Err(AppError::Browser(format!("{:#}", e))),
            Ok(Err(join_error)) => Err(AppError::Internal(format!(
                "browser task failed: {}",
                join_error
            ))),
            Err(_) => Err(AppError::Transform(format!(
                "profit link session exceeded {}s",
                self.session_timeout.as_secs()
            ))),
        }
    }
}

fn launch_browser(settings: &SessionSettings) -> anyhow::Result<Browser> {
    let mut launch_options = LaunchOptions::default_builder()
        .headless(true)
        .sandbox(false) // Often needed in containerized environments
        .idle_browser_timeout(settings.step_timeout * 3)
        .args(vec![
            std::ffi::OsStr::new("--no-sandbox"),
            std::ffi::OsStr::new("--disable-dev-shm-usage"),
            std::ffi::OsStr::new("--disable-gpu"),
            std::ffi::OsStr::new("--disable-extensions"),
        ])
        .build()
        .map_err(|e| anyhow!("Failed to create launch options: {}", e))?;

    if let Some(chrome_path) = &settings.chrome_path {
        launch_options.path = Some(std::path::PathBuf::from(chrome_path));
    }

    Browser::new(launch_options).context("Failed to launch browser")
}

fn convert_in_browser(
    settings: &SessionSettings,
    deadline: Deadline,
    link: &str,
) -> anyhow::Result<String> {
    deadline.step_budget(settings.step_timeout)?;
    let browser = launch_browser(settings)?;
    let tab = browser.new_tab().context("Failed to create tab")?;

    log_in(&tab, settings, deadline)?;
    let profit_link = submit_link(&tab, settings, deadline, link)?;

    if let Err(e) = tab.close(true) {
        tracing::debug!("Failed to close affiliate tab: {}", e);
    }
    Ok(profit_link)
}

/// Caps the tab's element waits at what is left of the session.
fn arm(tab: &Tab, settings: &SessionSettings, deadline: Deadline) -> anyhow::Result<()> {
    tab.set_default_timeout(deadline.step_budget(settings.step_timeout)?);
    Ok(())
}

fn log_in(tab: &Tab, settings: &SessionSettings, deadline: Deadline) -> anyhow::Result<()> {
    arm(tab, settings, deadline)?;
    tab.navigate_to(&settings.login_url)
        .and_then(|t| t.wait_until_navigated())
        .with_context(|| format!("Failed to open {}", settings.login_url))?;

    arm(tab, settings, deadline)?;
    tab.wait_for_xpath(LOGIN_ENTRY_XPATH)
        .and_then(|el| el.click().map(|_| ()))
        .context("Login entry not found")?;

    arm(tab, settings, deadline)?;
    tab.wait_for_element(EMAIL_INPUT)
        .and_then(|el| el.click().and_then(|el| el.type_into(&settings.email)).map(|_| ()))
        .context("Email field not found")?;

    arm(tab, settings, deadline)?;
    tab.wait_for_element(PASSWORD_INPUT)
        .and_then(|el| el.click().and_then(|el| el.type_into(&settings.password)).map(|_| ()))
        .context("Password field not found")?;

    arm(tab, settings, deadline)?;
    tab.wait_for_xpath(LOGIN_SUBMIT_XPATH)
        .and_then(|el| el.click().map(|_| ()))
        .context("Login button not found")?;

    std::thread::sleep(settings.login_settle.min(deadline.remaining()));
    Ok(())
}

fn submit_link(
    tab: &Tab,
    settings: &SessionSettings,
    deadline: Deadline,
    link: &str,
) -> anyhow::Result<String> {
    arm(tab, settings, deadline)?;
    tab.navigate_to(&settings.profit_link_url)
        .and_then(|t| t.wait_until_navigated())
        .with_context(|| format!("Failed to open {}", settings.profit_link_url))?;

    arm(tab, settings, deadline)?;
    tab.wait_for_element(LINK_INPUT)
        .and_then(|el| el.click().and_then(|el| el.type_into(link)).map(|_| ()))
        .context("Link field not found")?;

    // Never submit once the session deadline has passed.
    arm(tab, settings, deadline)?;
    tab.wait_for_xpath(CONVERT_SUBMIT_XPATH)
        .and_then(|el| el.click().map(|_| ()))
        .context("Convert button not found")?;

    arm(tab, settings, deadline)?;
    let field = tab
        .wait_for_element(RESULT_FIELD)
        .context("Generated link field not found")?;

    // The field can render before the generated link is filled in.
    let poll_deadline = Deadline::after(deadline.step_budget(settings.step_timeout)?);
    loop {
        let value = field
            .call_js_fn("function() { return this.value; }", vec![], false)
            .context("Failed to read generated link")?
            .value
            .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
            .unwrap_or_default();

        if !value.is_empty() {
            return Ok(value);
        }

        if poll_deadline.remaining().is_zero() {
            return Err(anyhow!("Generated link field stayed empty"));
        }

        std::thread::sleep(POLL_INTERVAL.min(poll_deadline.remaining()));
    }
}

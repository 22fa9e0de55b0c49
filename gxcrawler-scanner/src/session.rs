//! Authenticated browsing session against the server dashboard.
//!
//! A [`Session`] owns the cookie jar and the scraped tokens; a
//! [`SessionClient`] performs requests on behalf of a session that is passed
//! in explicitly. The handshake moves the session through
//! `Unauthenticated -> LoggedIn -> ActivityReady`, and every activity grid
//! call requires the last state.

use crate::decoder::{decode_objects, format_request_date};
use crate::error::{CrawlError, Result};
use crate::grid::PAGE_SIZE;
use crate::record::{DateRange, RevisionObject, RevisionRecord};
use crate::token::{extract_activity_auth_token, extract_main_auth_token};
use reqwest::cookie::Jar;
use reqwest::header::{ACCEPT, REFERER};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::{Value, json};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:68.0) Gecko/20100101 Firefox/68.0";

const AUTH_TOKEN_HEADER: &str = "X-GXAUTH-TOKEN";
const AJAX_HEADER: &str = "GxAjaxRequest";
const SPA_MASTER_PAGE_HEADER: &str = "X-SPA-MP";
const SPA_REQUEST_HEADER: &str = "X-SPA-REQUEST";

/// Login details for one server and knowledge base.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user: String,
    pub password: String,
    pub url: String,
    pub kb_name: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("url", &self.url)
            .field("kb_name", &self.kb_name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    LoggedIn,
    ActivityReady,
}

/// Handshake steps, in the order they must run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStep {
    LandingPage,
    Login,
    Dashboard,
    ActivityPage,
}

impl HandshakeStep {
    pub const ALL: [HandshakeStep; 4] = [
        HandshakeStep::LandingPage,
        HandshakeStep::Login,
        HandshakeStep::Dashboard,
        HandshakeStep::ActivityPage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HandshakeStep::LandingPage => "landing page",
            HandshakeStep::Login => "login",
            HandshakeStep::Dashboard => "dashboard",
            HandshakeStep::ActivityPage => "activity page",
        }
    }
}

impl fmt::Display for HandshakeStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cookie jar, scraped tokens and handshake progress for a single crawl.
pub struct Session {
    base_url: String,
    host: String,
    cookie_jar: Arc<Jar>,
    main_auth_token: Option<String>,
    activity_auth_token: Option<String>,
    state: SessionState,
}

impl Session {
    pub fn new(base_url: &str) -> Result<Self> {
        let parsed = Url::parse(base_url)
            .map_err(|e| CrawlError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| CrawlError::InvalidUrl(format!("{} has no host", base_url)))?
            .to_string();

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            host,
            cookie_jar: Arc::new(Jar::default()),
            main_auth_token: None,
            activity_auth_token: None,
            state: SessionState::Unauthenticated,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cookie_jar(&self) -> Arc<Jar> {
        self.cookie_jar.clone()
    }

    /// Both tokens have been scraped.
    pub fn is_valid(&self) -> bool {
        self.main_auth_token.is_some() && self.activity_auth_token.is_some()
    }

    pub fn main_auth_token(&self) -> Option<&str> {
        self.main_auth_token.as_deref()
    }

    /// The activity token, available once the session is `ActivityReady`.
    pub fn activity_auth_token(&self) -> Result<&str> {
        match (&self.state, &self.activity_auth_token) {
            (SessionState::ActivityReady, Some(token)) => Ok(token.as_str()),
            _ => Err(CrawlError::authentication(
                HandshakeStep::ActivityPage.as_str(),
                format!("session is {:?}, activity requests need ActivityReady", self.state),
            )),
        }
    }

    pub fn url(&self, path_and_query: &str) -> String {
        format!("{}/{}", self.base_url, path_and_query)
    }

    fn set_main_auth_token(&mut self, token: String) -> Result<()> {
        if self.main_auth_token.is_some() {
            return Err(CrawlError::authentication(
                HandshakeStep::LandingPage.as_str(),
                "main token already set",
            ));
        }
        self.main_auth_token = Some(token);
        Ok(())
    }

    fn set_activity_auth_token(&mut self, token: String) -> Result<()> {
        if self.activity_auth_token.is_some() {
            return Err(CrawlError::authentication(
                HandshakeStep::ActivityPage.as_str(),
                "activity token already set",
            ));
        }
        self.activity_auth_token = Some(token);
        self.state = SessionState::ActivityReady;
        Ok(())
    }

    fn require_state(&self, step: HandshakeStep, expected: SessionState) -> Result<()> {
        if self.state != expected {
            return Err(CrawlError::authentication(
                step.as_str(),
                format!("session is {:?}, expected {:?}", self.state, expected),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("base_url", &self.base_url)
            .field("host", &self.host)
            .field("state", &self.state)
            .field("main_auth_token", &self.main_auth_token.is_some())
            .field("activity_auth_token", &self.activity_auth_token.is_some())
            .finish()
    }
}

fn no_cache() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// JSON body of the login form's ENTER event.
pub fn login_payload(user: &str, password: &str) -> Value {
    json!({
        "MPage": false,
        "cmpCtx": "W0010",
        "parms": [
            {"s": "Local", "v": [["Local", "Local"]]},
            "Local",
            user,
            password,
            "",
            false,
            false
        ],
        "hsh": [],
        "objClass": "mainlogin",
        "pkgName": "Artech.GeneXusServer",
        "events": ["ENTER"],
        "grids": {}
    })
}

/// JSON body of the activity grid's online-activate event for grid `row`.
pub fn revision_objects_payload(record: &RevisionRecord, row: usize) -> Result<Value> {
    let date = format_request_date(&record.date)?;
    let build: i64 = record.build.trim().parse().map_err(|_| {
        CrawlError::DecodeError(format!("revision build '{}' is not numeric", record.build))
    })?;

    Ok(json!({
        "MPage": false,
        "cmpCtx": "",
        "parms": [
            record.name,
            date,
            record.operation,
            build,
            record.user,
            record.comment,
            true
        ],
        "hsh": [],
        "objClass": "activity",
        "pkgName": "Artech.GeneXusServer",
        "events": ["ACTIVITYGRID.ONLINEACTIVATE"],
        "grid": 45,
        "grids": {"Activitygrid": {"id": 45, "lastRow": 2, "pRow": ""}},
        "row": format!("{:04}", row),
        "pRow": ""
    }))
}

/// HTTP client bound to one session's cookie jar.
pub struct SessionClient {
    client: Client,
    credentials: Credentials,
}

impl SessionClient {
    pub fn new(credentials: Credentials, session: &Session) -> Result<Self> {
        Self::with_timeout(credentials, session, 30)
    }

    pub fn with_timeout(credentials: Credentials, session: &Session, timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .cookie_provider(session.cookie_jar())
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            credentials,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        Ok(response.error_for_status()?)
    }

    /// Run all four handshake steps, reporting each one before it starts.
    pub async fn handshake(
        &self,
        session: &mut Session,
        mut on_step: impl FnMut(HandshakeStep),
    ) -> Result<()> {
        info!("Starting handshake with {}", session.host());

        on_step(HandshakeStep::LandingPage);
        self.fetch_landing_page(session).await?;
        on_step(HandshakeStep::Login);
        self.login(session).await?;
        on_step(HandshakeStep::Dashboard);
        self.fetch_dashboard(session).await?;
        on_step(HandshakeStep::ActivityPage);
        self.fetch_activity_page(session).await?;

        info!("Session ready for knowledge base {}", self.credentials.kb_name);
        Ok(())
    }

    pub async fn fetch_landing_page(&self, session: &mut Session) -> Result<()> {
        let step = HandshakeStep::LandingPage;
        session.require_state(step, SessionState::Unauthenticated)?;

        let url = session.url("main.aspx");
        debug!("Fetching {}", url);
        let request = self
            .client
            .get(&url)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8");
        let body = Self::send(request)
            .await
            .map_err(|e| CrawlError::authentication(step.as_str(), e))?
            .text()
            .await
            .map_err(|e| CrawlError::authentication(step.as_str(), e))?;

        let token = extract_main_auth_token(&body).map_err(|e| CrawlError::authentication(step.as_str(), e))?;
        session.set_main_auth_token(token)
    }

    pub async fn login(&self, session: &mut Session) -> Result<()> {
        let step = HandshakeStep::Login;
        session.require_state(step, SessionState::Unauthenticated)?;
        let token = session
            .main_auth_token()
            .ok_or_else(|| CrawlError::authentication(step.as_str(), "landing page token not scraped"))?
            .to_string();

        let url = session.url(&format!("main.aspx?gxfullajaxEvt,gx-no-cache={}", no_cache()));
        debug!("Logging in as {}", self.credentials.user);
        // The ENTER event is accepted as a GET carrying a JSON body.
        let request = self
            .client
            .get(&url)
            .header(ACCEPT, "*/*")
            .header(AJAX_HEADER, "1")
            .header(AUTH_TOKEN_HEADER, token)
            .header(REFERER, session.url("main.aspx"))
            .json(&login_payload(&self.credentials.user, &self.credentials.password));

        Self::send(request)
            .await
            .map_err(|e| CrawlError::authentication(step.as_str(), e))?;

        session.state = SessionState::LoggedIn;
        Ok(())
    }

    pub async fn fetch_dashboard(&self, session: &Session) -> Result<()> {
        let step = HandshakeStep::Dashboard;
        session.require_state(step, SessionState::LoggedIn)?;

        let url = session.url("dashboard.aspx");
        debug!("Fetching {}", url);
        let request = self
            .client
            .get(&url)
            .header(ACCEPT, "*/*")
            .header(SPA_MASTER_PAGE_HEADER, "masterpagebeforelogin")
            .header(SPA_REQUEST_HEADER, "1")
            .header(REFERER, session.url("main.aspx"));

        Self::send(request)
            .await
            .map_err(|e| CrawlError::authentication(step.as_str(), e))?;
        Ok(())
    }

    pub async fn fetch_activity_page(&self, session: &mut Session) -> Result<()> {
        let step = HandshakeStep::ActivityPage;
        session.require_state(step, SessionState::LoggedIn)?;

        let url = self.activity_page_url(session);
        debug!("Fetching {}", url);
        let request = self
            .client
            .get(&url)
            .header(ACCEPT, "*/*")
            .header(SPA_MASTER_PAGE_HEADER, "masterpage")
            .header(SPA_REQUEST_HEADER, "1")
            .header(REFERER, session.url("dashboard.aspx"));

        let body = Self::send(request)
            .await
            .map_err(|e| CrawlError::authentication(step.as_str(), e))?
            .text()
            .await
            .map_err(|e| CrawlError::authentication(step.as_str(), e))?;

        let token =
            extract_activity_auth_token(&body).map_err(|e| CrawlError::authentication(step.as_str(), e))?;
        session.set_activity_auth_token(token)
    }

    fn activity_page_url(&self, session: &Session) -> String {
        session.url(&format!("activity.aspx?{}", self.credentials.kb_name))
    }

    /// Fetch one page of the activity grid as raw JSON.
    pub async fn refresh_grid(&self, session: &Session, page: u32, range: &DateRange) -> Result<Value> {
        session.activity_auth_token()?;

        let url = session.url(&format!(
            "activity.aspx?gxajaxGridRefresh_Activitygrid,{},{},{},{},,1633,false,gx-no-cache={}",
            PAGE_SIZE,
            page,
            range.start_param(),
            range.end_param(),
            no_cache()
        ));
        debug!("Refreshing activity grid page {}", page);

        let request = self
            .client
            .get(&url)
            .header(ACCEPT, "*/*")
            .header(AJAX_HEADER, "1")
            .header(REFERER, self.activity_page_url(session));
        let body = Self::send(request).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch and decode the objects of the revision shown at grid `row`.
    pub async fn fetch_revision_objects(
        &self,
        session: &Session,
        record: &RevisionRecord,
        row: usize,
    ) -> Result<Vec<RevisionObject>> {
        let token = session.activity_auth_token()?;
        let payload = revision_objects_payload(record, row)?;

        let url = session.url(&format!(
            "activity.aspx?gxfullajaxEvt,{},gx-no-cache={}",
            self.credentials.kb_name,
            no_cache()
        ));
        debug!("Fetching objects of build {} (row {})", record.build, row);

        let request = self
            .client
            .post(&url)
            .header(ACCEPT, "*/*")
            .header(AJAX_HEADER, "1")
            .header(AUTH_TOKEN_HEADER, token)
            .header(REFERER, self.activity_page_url(session))
            .json(&payload);
        let body = Self::send(request).await?.text().await?;
        let value: Value = serde_json::from_str(&body)?;

        decode_objects(&value)
    }
}

//! HTTP client for the planning system's form-authenticated import interface.

use momsync_core::config::PlanningConfig;
use reqwest::{StatusCode, Url};

use crate::error::OutboundError;

/// Fixed command parameter of the import endpoint.
pub const IMPORT_COMMAND: &str = "IMPORTXML2";

/// Holds one cookie-backed session with the planning system.
pub struct PlanningClient {
    http: reqwest::Client,
    login_url: Url,
    import_url: Url,
    logout_url: Url,
    username: String,
    password: String,
}

fn parse_url(raw: &str) -> Result<Url, OutboundError> {
    Url::parse(raw).map_err(|e| OutboundError::InvalidUrl {
        url: raw.to_string(),
        reason: e.to_string(),
    })
}

impl PlanningClient {
    pub fn new(config: &PlanningConfig) -> Result<Self, OutboundError> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            http,
            login_url: parse_url(&config.login_url)?,
            import_url: parse_url(&config.import_url)?,
            logout_url: parse_url(&config.logout_url)?,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Form login. Any non-success answer is an authentication failure.
    pub async fn login(&self) -> Result<(), OutboundError> {
        let resp = self
            .http
            .post(self.login_url.clone())
            .form(&[
                ("j_username", self.username.as_str()),
                ("j_password", self.password.as_str()),
            ])
            .send()
            .await?;
        let status = resp.status();
        if status.is_server_error() {
            return Err(OutboundError::Status(status.as_u16()));
        }
        if !status.is_success() {
            return Err(OutboundError::Auth(format!("login answered HTTP {status}")));
        }
        tracing::debug!(user = %self.username, "logged in to planning system");
        Ok(())
    }

    /// POST one XML document to the import endpoint and interpret the answer.
    pub async fn import(&self, xml: &str) -> Result<(), OutboundError> {
        let resp = self
            .http
            .post(self.import_url.clone())
            .form(&[("command", IMPORT_COMMAND), ("xmlcontent", xml)])
            .send()
            .await?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(OutboundError::Auth(format!("import answered HTTP {status}")));
        }
        // An expired session is answered with a redirect to the login form.
        let redirected = resp.url().path() != self.import_url.path();
        if redirected && resp.url().path() == self.login_url.path() {
            return Err(OutboundError::Auth("redirected to login".to_string()));
        }
        if !status.is_success() {
            return Err(OutboundError::Status(status.as_u16()));
        }

        let body = resp.text().await?;
        check_import_response(&body)
    }

    pub async fn logout(&self) -> Result<(), OutboundError> {
        let resp = self.http.get(self.logout_url.clone()).send().await?;
        if !resp.status().is_success() && !resp.status().is_redirection() {
            return Err(OutboundError::Status(resp.status().as_u16()));
        }
        tracing::debug!("logged out of planning system");
        Ok(())
    }
}

/// An import answer is an XML document; any `error` element means the
/// planning system refused the payload.
pub fn check_import_response(body: &str) -> Result<(), OutboundError> {
    let doc = roxmltree::Document::parse(body)
        .map_err(|e| OutboundError::InvalidResponse(e.to_string()))?;

    let descriptions: Vec<String> = doc
        .descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == "error")
        .map(|err| {
            let text = err
                .children()
                .find(|c| c.is_element() && c.tag_name().name() == "description")
                .and_then(|d| d.text())
                .or_else(|| err.text())
                .map(str::trim)
                .unwrap_or("");
            if text.is_empty() {
                "(no description)".to_string()
            } else {
                text.to_string()
            }
        })
        .collect();

    if descriptions.is_empty() {
        Ok(())
    } else {
        Err(OutboundError::Rejected(descriptions))
    }
}

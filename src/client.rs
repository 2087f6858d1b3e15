use std::time::Duration;

use reqwest::blocking::{Client, Response};

use crate::{
    config::{Config, Naming},
    error::ApiError,
    session::{SessionRecord, parse_sessions},
};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
const XSRF_COOKIE: &str = "_xsrf";

/// The parts of the notebook server REST API the dashboard talks to.
pub trait NotebookServer {
    /// Lists the current sessions in server order.
    ///
    /// Only transport failures are errors; a bad response is an empty list.
    fn sessions(&self) -> Result<Vec<SessionRecord>, ApiError>;

    /// Asks the server to shut down a kernel and returns the HTTP status.
    fn shutdown(&self, kernel_id: &str) -> Result<u16, ApiError>;
}

/// HTTP session against one notebook server, including its cookie jar.
pub struct NotebookClient {
    http: Client,
    base: String,
    naming: Naming,
    xsrf: Option<String>,
}

impl NotebookClient {
    pub fn new(config: &Config) -> Result<Self, ApiError> {
        let base = config.server_label().to_string();
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .cookie_store(true)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|err| ApiError::from_transport(&base, err))?;
        Ok(Self {
            http,
            base,
            naming: config.naming.clone(),
            xsrf: None,
        })
    }

    /// Logs in with a password so later requests carry the session cookie.
    pub fn login(&mut self, password: &str) -> Result<(), ApiError> {
        let login_url = format!("{}/login", self.base);
        let page = self.send(self.http.get(&login_url), &login_url)?;
        let token = xsrf_cookie(&page);
        tracing::debug!(has_xsrf = token.is_some(), "fetched login page");

        let mut form = vec![("password", password.to_string())];
        if let Some(token) = &token {
            form.push((XSRF_COOKIE, token.clone()));
        }
        let response = self.send(self.http.post(&login_url).form(&form), &login_url)?;
        if is_login_page(response.url()) {
            return Err(ApiError::LoginRejected { url: self.base.clone() });
        }
        // The server may rotate the token on login.
        self.xsrf = xsrf_cookie(&response).or(token);
        tracing::info!(server = %self.base, "logged in");
        Ok(())
    }

    fn send(
        &self,
        request: reqwest::blocking::RequestBuilder,
        url: &str,
    ) -> Result<Response, ApiError> {
        request
            .send()
            .map_err(|err| ApiError::from_transport(url, err))
    }
}

impl NotebookServer for NotebookClient {
    fn sessions(&self) -> Result<Vec<SessionRecord>, ApiError> {
        let url = format!("{}/api/sessions", self.base);
        let response = self.send(self.http.get(&url), &url)?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .map_err(|err| ApiError::from_transport(&url, err))?;
        let sessions = parse_sessions(status, &body, &self.naming);
        tracing::debug!(status, sessions = sessions.len(), "fetched sessions");
        Ok(sessions)
    }

    fn shutdown(&self, kernel_id: &str) -> Result<u16, ApiError> {
        let url = format!("{}/api/kernels/{kernel_id}", self.base);
        let mut request = self.http.delete(&url);
        if let Some(token) = &self.xsrf {
            request = request.header("X-XSRFToken", token);
        }
        let status = self.send(request, &url)?.status().as_u16();
        tracing::info!(kernel = kernel_id, status, "requested kernel shutdown");
        Ok(status)
    }
}

/// A rejected password lands back on the login form instead of redirecting.
fn is_login_page(url: &url::Url) -> bool {
    url.path().trim_end_matches('/').ends_with("/login")
}

fn xsrf_cookie(response: &Response) -> Option<String> {
    response
        .cookies()
        .find(|cookie| cookie.name() == XSRF_COOKIE)
        .map(|cookie| cookie.value().to_string())
}

use std::cell::RefCell;
use std::time::Duration;

use log::{debug, error, warn};
use serde::Deserialize;

use crate::config::{Credentials, ScanConfig};
use crate::error::ScanError;
use crate::fetch::{Assessment, AssessmentSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Blocking client for the image assessment API.
///
/// An OAuth2 token is requested on the first assessment call and reused for
/// the rest of the invocation.
pub struct FalconClient {
    http: reqwest::blocking::Client,
    api_base: String,
    report_base: String,
    credentials: Credentials,
    token: RefCell<Option<String>>,
}

impl FalconClient {
    pub fn new(config: &ScanConfig) -> Result<Self, ScanError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            api_base: config.api_base_url(),
            report_base: config.report_base_url(),
            credentials: config.credentials.clone(),
            token: RefCell::new(None),
        })
    }

    /// `Ok(None)` when the token endpoint could not be reached.
    fn token(&self) -> Result<Option<String>, ScanError> {
        if let Some(token) = self.token.borrow().clone() {
            return Ok(Some(token));
        }

        let url = format!("{}/oauth2/token", self.api_base);
        debug!("POST {url}");
        let sent = self
            .http
            .post(&url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .send();

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                warn!("Token request failed: {e}");
                return Ok(None);
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().unwrap_or_default();
            error!("OAuth2 token request failed {status}: {text}");
            return Err(ScanError::RemoteApi(format!(
                "token request failed with {status}"
            )));
        }

        let token: TokenResponse = match response.json() {
            Ok(token) => token,
            Err(e) => {
                warn!("Token response could not be read: {e}");
                return Ok(None);
            }
        };
        *self.token.borrow_mut() = Some(token.access_token.clone());
        Ok(Some(token.access_token))
    }
}

fn not_ready() -> Assessment {
    Assessment {
        status_code: 0,
        body: String::new(),
    }
}

impl AssessmentSource for FalconClient {
    /// Transport failures are reported as status 0 so polling carries on.
    /// A rejected token is dropped and renewed on the next attempt.
    fn get_assessment(&self, repo: &str, tag: &str) -> Result<Assessment, ScanError> {
        let Some(token) = self.token()? else {
            return Ok(not_ready());
        };
        let url = format!("{}/reports", self.report_base);
        debug!("GET {url} repository={repo} tag={tag}");

        let sent = self
            .http
            .get(&url)
            .query(&[("repository", repo), ("tag", tag)])
            .bearer_auth(token)
            .send();

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                warn!("Assessment request failed: {e}");
                return Ok(not_ready());
            }
        };

        let status_code = response.status().as_u16();
        if matches!(status_code, 401 | 403) {
            debug!("Access token rejected with {status_code}, requesting a new one");
            self.token.replace(None);
        }

        match response.text() {
            Ok(body) => Ok(Assessment { status_code, body }),
            Err(e) => {
                warn!("Assessment response could not be read: {e}");
                Ok(not_ready())
            }
        }
    }
}

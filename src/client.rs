use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use crate::logger::MessageLogger;
use crate::mapper::map_record;
use crate::protocol::{ApiRequest, COMFORT_DURATION, ModeUpdate, ThermostatApi};
use crate::session::{DEFAULT_SESSION_CALLS, SessionManager};
use crate::transport::Transport;
use crate::types::*;
use crate::wd5::{self, Wd5Api};
use crate::wg4::{self, Wg4Api};
use crate::{Error, Result};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

enum Credentials {
    Wd5 {
        api_key: String,
        customer_id: i64,
        username: String,
        password: String,
    },
    Wg4 {
        username: String,
        password: String,
    },
}

pub struct OjClientBuilder {
    credentials: Credentials,
    host: Option<String>,
    protocol: String,
    client_sw_version: u32,
    timeout: Duration,
    session_calls: u32,
    http_client: Option<reqwest::Client>,
    log_path: Option<PathBuf>,
}

impl OjClientBuilder {
    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            host: None,
            protocol: "https".to_string(),
            client_sw_version: wd5::DEFAULT_CLIENT_SW_VERSION,
            timeout: DEFAULT_TIMEOUT,
            session_calls: DEFAULT_SESSION_CALLS,
            http_client: None,
            log_path: None,
        }
    }

    /// Host name (optionally with `:port`) of the vendor API.
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    pub fn protocol(mut self, proto: &str) -> Self {
        self.protocol = proto.to_string();
        self
    }

    /// Version reported by WD5 logins. Ignored for WG4.
    pub fn client_sw_version(mut self, version: u32) -> Self {
        self.client_sw_version = version;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn session_calls(mut self, calls: u32) -> Self {
        self.session_calls = calls;
        self
    }

    /// Use a preconfigured HTTP client. Its own timeout applies instead of
    /// [`timeout`](Self::timeout).
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    pub fn message_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    pub fn build(self) -> Result<OjClient> {
        let http = match self.http_client {
            Some(client) => client,
            None => reqwest::Client::builder().timeout(self.timeout).build()?,
        };

        let logger = match self.log_path {
            Some(path) => Some(MessageLogger::new(path)?),
            None => None,
        };

        let (api, default_host): (Box<dyn ThermostatApi>, &str) = match self.credentials {
            Credentials::Wd5 {
                api_key,
                customer_id,
                username,
                password,
            } => (
                Box::new(Wd5Api {
                    api_key,
                    customer_id,
                    username,
                    password,
                    client_sw_version: self.client_sw_version,
                }),
                wd5::DEFAULT_HOST,
            ),
            Credentials::Wg4 { username, password } => {
                (Box::new(Wg4Api { username, password }), wg4::DEFAULT_HOST)
            }
        };

        let host = self.host.unwrap_or_else(|| default_host.to_string());
        let base_url = format!("{}://{}", self.protocol, host);

        Ok(OjClient {
            transport: Transport::new(http, base_url, logger),
            session: SessionManager::new(self.session_calls),
            api,
        })
    }
}

/// Dropping the client releases the HTTP connection pool and the capture file.
pub struct OjClient {
    transport: Transport,
    session: SessionManager,
    api: Box<dyn ThermostatApi>,
}

impl OjClient {
    pub fn wd5(
        api_key: impl Into<String>,
        customer_id: i64,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> OjClientBuilder {
        OjClientBuilder::new(Credentials::Wd5 {
            api_key: api_key.into(),
            customer_id,
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn wg4(username: impl Into<String>, password: impl Into<String>) -> OjClientBuilder {
        OjClientBuilder::new(Credentials::Wg4 {
            username: username.into(),
            password: password.into(),
        })
    }

    pub fn series(&self) -> Series {
        self.api.series()
    }

    pub async fn login(&self) -> Result<()> {
        self.session
            .ensure_authenticated(&self.transport, self.api.as_ref())
            .await
    }

    pub async fn get_thermostats(&self) -> Result<Vec<Thermostat>> {
        let body = self
            .authenticated(|session_id| self.api.list_thermostats_request(session_id))
            .await?;
        let thermostats = self
            .api
            .parse_thermostats_response(&body)?
            .into_iter()
            .map(map_record)
            .collect::<Result<Vec<_>>>()?;
        debug!(count = thermostats.len(), "fetched thermostats");
        Ok(thermostats)
    }

    pub async fn get_thermostat(&self, serial: &str) -> Result<Option<Thermostat>> {
        Ok(self
            .get_thermostats()
            .await?
            .into_iter()
            .find(|t| t.serial_number == serial))
    }

    pub async fn set_regulation_mode(
        &self,
        thermostat: &Thermostat,
        mode: RegulationMode,
        temperature: Option<Temperature>,
    ) -> Result<()> {
        self.set_regulation_mode_for(thermostat, mode, temperature, COMFORT_DURATION)
            .await
    }

    /// Without `temperature`, manual and comfort reuse the thermostat's
    /// configured value. `duration` only applies to comfort.
    pub async fn set_regulation_mode_for(
        &self,
        thermostat: &Thermostat,
        mode: RegulationMode,
        temperature: Option<Temperature>,
        duration: Duration,
    ) -> Result<()> {
        if thermostat.series != self.api.series() {
            return Err(Error::Validation(format!(
                "thermostat {} is {:?}, client is {:?}",
                thermostat.serial_number,
                thermostat.series,
                self.api.series()
            )));
        }

        let update = ModeUpdate::resolve(thermostat, mode, temperature, duration, Utc::now())?;
        debug!(
            serial = %thermostat.serial_number,
            mode = ?update.mode,
            target = ?update.target,
            "setting regulation mode"
        );

        let body = self
            .authenticated(|session_id| self.api.set_mode_request(session_id, thermostat, &update))
            .await?;

        if !self.api.parse_set_mode_response(&body)? {
            return Err(Error::Api(format!(
                "thermostat {} rejected regulation mode {}",
                thermostat.serial_number,
                mode.code()
            )));
        }
        Ok(())
    }

    // A 401/403 drops the session and retries once after a fresh login.
    async fn authenticated(&self, build: impl Fn(&str) -> ApiRequest) -> Result<Value> {
        let mut retried = false;
        loop {
            let session_id = self.session.acquire(&self.transport, self.api.as_ref()).await?;
            let response = self.transport.send(&build(&session_id)).await?;
            if !response.is_auth_rejection() {
                return Ok(response.body);
            }

            self.session.invalidate();
            if retried {
                return Err(Error::Authentication(format!(
                    "session rejected with HTTP {} after re-login",
                    response.status
                )));
            }
            warn!(status = response.status.as_u16(), "session rejected, logging in again");
            retried = true;
        }
    }
}

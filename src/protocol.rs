use std::time::Duration;

use chrono::{DateTime, FixedOffset, Offset, TimeDelta, Utc};
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::types::*;
use crate::wd5::Wd5Thermostat;
use crate::wg4::Wg4Thermostat;
use crate::{Error, Result};

/// How long comfort mode lasts when the caller gives no duration.
pub const COMFORT_DURATION: Duration = Duration::from_secs(4 * 60 * 60);

const BOOST_HOURS: i64 = 1;

pub(crate) const SESSION_PARAM: &str = "sessionid";

#[derive(Debug, Clone)]
pub(crate) struct ApiRequest {
    pub method: Method,
    pub path: &'static str,
    pub query: Vec<(&'static str, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn get(path: &'static str) -> Self {
        Self {
            method: Method::GET,
            path,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn post(path: &'static str, body: Value) -> Self {
        Self {
            method: Method::POST,
            path,
            query: Vec::new(),
            body: Some(body),
        }
    }

    pub fn query(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.query.push((key, value.into()));
        self
    }
}

#[derive(Debug)]
pub(crate) enum ThermostatRecord {
    Wd5(Box<Wd5Thermostat>),
    Wg4(Box<Wg4Thermostat>),
}

pub(crate) trait ThermostatApi: Send + Sync {
    fn series(&self) -> Series;

    fn login_request(&self) -> ApiRequest;

    /// Both families answer a login with `{SessionId, ErrorCode}`.
    fn parse_login_response(&self, body: &Value) -> Result<String> {
        if error_code(body) == Some(1) {
            return Err(Error::Authentication(
                "credentials rejected by the thermostat API".to_string(),
            ));
        }
        body.get("SessionId")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::Protocol("login response has no SessionId".to_string()))
    }

    fn list_thermostats_request(&self, session_id: &str) -> ApiRequest;

    fn parse_thermostats_response(&self, body: &Value) -> Result<Vec<ThermostatRecord>>;

    fn set_mode_request(&self, session_id: &str, thermostat: &Thermostat, update: &ModeUpdate) -> ApiRequest;

    fn parse_set_mode_response(&self, body: &Value) -> Result<bool>;
}

pub(crate) fn error_code(body: &Value) -> Option<i64> {
    body.get("ErrorCode").and_then(Value::as_i64)
}

/// Non-empty thermostat objects nested as `{<groups_key>: [{Thermostats: [..]}]}`.
pub(crate) fn grouped_thermostats<'a>(body: &'a Value, groups_key: &str) -> Result<Vec<&'a Value>> {
    let groups = body
        .get(groups_key)
        .and_then(Value::as_array)
        .ok_or_else(|| Error::Protocol(format!("thermostat listing has no {groups_key}")))?;
    Ok(groups
        .iter()
        .filter_map(|g| g.get("Thermostats").and_then(Value::as_array))
        .flatten()
        .filter(|t| t.as_object().is_some_and(|o| !o.is_empty()))
        .collect())
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ModeUpdate {
    pub mode: RegulationMode,
    pub target: Option<Temperature>,
    pub manual_temperature: Temperature,
    pub comfort_temperature: Temperature,
    pub comfort_end_time: Option<DateTime<FixedOffset>>,
    pub boost_end_time: Option<DateTime<FixedOffset>>,
}

impl ModeUpdate {
    pub fn resolve(
        thermostat: &Thermostat,
        mode: RegulationMode,
        temperature: Option<Temperature>,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !thermostat.supports(mode) {
            return Err(Error::Validation(format!(
                "thermostat {} does not support {mode:?} (code {})",
                thermostat.serial_number,
                mode.code()
            )));
        }

        if let Some(t) = temperature
            && (t < thermostat.min_temperature || t > thermostat.max_temperature)
        {
            return Err(Error::Validation(format!(
                "{t} outside {}..{} for thermostat {}",
                thermostat.min_temperature, thermostat.max_temperature, thermostat.serial_number
            )));
        }

        let offset = thermostat.utc_offset.unwrap_or_else(|| Utc.fix());
        let local_now = now.with_timezone(&offset);

        let mut manual_temperature = thermostat.manual_temperature;
        let mut comfort_temperature = thermostat.comfort_temperature;
        let mut comfort_end_time = thermostat.comfort_end_time;
        let mut boost_end_time = thermostat.boost_end_time;

        match mode {
            RegulationMode::Manual => {
                manual_temperature = temperature.unwrap_or(manual_temperature);
            }
            RegulationMode::Comfort => {
                comfort_temperature = temperature.unwrap_or(comfort_temperature);
                let too_long = || Error::Validation(format!("comfort duration {duration:?} too long"));
                let span = TimeDelta::from_std(duration).map_err(|_| too_long())?;
                comfort_end_time = Some(local_now.checked_add_signed(span).ok_or_else(too_long)?);
            }
            RegulationMode::Boost => {
                let end = local_now
                    .checked_add_signed(TimeDelta::hours(BOOST_HOURS))
                    .ok_or_else(|| Error::Validation("boost end time out of range".to_string()))?;
                boost_end_time = Some(end);
            }
            _ => {
                if temperature.is_some() {
                    debug!(mode = ?mode, "temperature ignored for this regulation mode");
                }
            }
        }

        let target = match mode {
            RegulationMode::Manual => Some(manual_temperature),
            RegulationMode::Comfort => Some(comfort_temperature),
            RegulationMode::Boost => Some(
                thermostat
                    .boost_temperature
                    .unwrap_or(thermostat.max_temperature),
            ),
            other => thermostat.temperature_for_mode(other, now),
        };

        Ok(Self {
            mode,
            target,
            manual_temperature,
            comfort_temperature,
            comfort_end_time,
            boost_end_time,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn wd5() -> Thermostat {
        let data: Value =
            serde_json::from_str(include_str!("../tests/fixtures/wd5_thermostat.json")).unwrap();
        Thermostat::from_wd5_json(&data).unwrap()
    }

    fn wg4() -> Thermostat {
        let data: Value =
            serde_json::from_str(include_str!("../tests/fixtures/wg4_thermostat.json")).unwrap();
        Thermostat::from_wg4_json(&data).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 11, 30, 35).unwrap()
    }

    #[test]
    fn request_builders() {
        let req = ApiRequest::get("api/thermostats").query(SESSION_PARAM, "abc");
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.query, vec![("sessionid", "abc".to_string())]);
        assert!(req.body.is_none());

        let req = ApiRequest::post("api/thermostat", json!({"RegulationMode": 1}));
        assert_eq!(req.method, Method::POST);
        assert_eq!(req.body.unwrap()["RegulationMode"], 1);
    }

    #[test]
    fn grouped_thermostats_skips_empty_entries() {
        let body = json!({"Groups": [
            {"Thermostats": [{"SerialNumber": "1"}, {}]},
            {"Thermostats": [{"SerialNumber": "2"}]},
            {"NoThermostats": true}
        ]});
        let items = grouped_thermostats(&body, "Groups").unwrap();
        assert_eq!(items.len(), 2);
        assert!(grouped_thermostats(&json!({}), "Groups").is_err());
    }

    #[test]
    fn unsupported_mode_is_rejected() {
        let err = ModeUpdate::resolve(&wg4(), RegulationMode::Boost, None, COMFORT_DURATION, now())
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let t = wd5();
        for value in [499, 4001] {
            let err = ModeUpdate::resolve(
                &t,
                RegulationMode::Manual,
                Some(Temperature::from_hundredths(value)),
                COMFORT_DURATION,
                now(),
            )
            .unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "got {err:?}");
        }
    }

    #[test]
    fn boost_targets_max_setpoint_and_ends_in_an_hour() {
        let t = wd5();
        let update = ModeUpdate::resolve(&t, RegulationMode::Boost, None, COMFORT_DURATION, now()).unwrap();
        assert_eq!(update.mode.code(), 8);
        assert_eq!(update.target, Some(t.max_temperature));
        assert_eq!(
            update.boost_end_time.unwrap().with_timezone(&Utc),
            now() + TimeDelta::hours(1)
        );
        assert_eq!(update.comfort_end_time, t.comfort_end_time);
    }

    #[test]
    fn comfort_end_time_follows_duration() {
        let t = wd5();
        let update = ModeUpdate::resolve(
            &t,
            RegulationMode::Comfort,
            Some(Temperature::from_hundredths(2350)),
            Duration::from_secs(360 * 60),
            now(),
        )
        .unwrap();
        assert_eq!(update.comfort_temperature.hundredths(), 2350);
        let end = update.comfort_end_time.unwrap();
        assert_eq!(end.with_timezone(&Utc), now() + TimeDelta::minutes(360));
        assert_eq!(end.offset().local_minus_utc(), 3600);
        assert_eq!(update.boost_end_time, t.boost_end_time);
    }

    #[test]
    fn oversized_comfort_duration_is_rejected() {
        let years = Duration::from_secs(1_000_000 * 365 * 24 * 3600);
        let err = ModeUpdate::resolve(&wd5(), RegulationMode::Comfort, None, years, now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");

        let err = ModeUpdate::resolve(&wd5(), RegulationMode::Comfort, None, Duration::MAX, now()).unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "got {err:?}");
    }

    // Boost from a schedule-mode snapshot with a 25.00 manual setpoint.
    #[test]
    fn boost_from_schedule_targets_max_temperature() {
        let mut data: Value =
            serde_json::from_str(include_str!("../tests/fixtures/wd5_thermostat.json")).unwrap();
        data["RegulationMode"] = json!(1);
        data["ManualModeSetpoint"] = json!(2500);
        let t = Thermostat::from_wd5_json(&data).unwrap();

        let update = ModeUpdate::resolve(&t, RegulationMode::Boost, None, COMFORT_DURATION, now()).unwrap();
        assert_eq!(update.mode.code(), 8);
        assert_eq!(update.target, Some(t.max_temperature));
        assert_eq!(update.target, Some(Temperature::from_hundredths(4000)));
        assert_eq!(update.manual_temperature, Temperature::from_hundredths(2500));
    }

    // Manual and comfort silently reuse the configured temperature when none
    // is given. Kept as-is for compatibility with the vendor apps.
    #[test]
    fn manual_without_temperature_defaults_to_configured_value() {
        let t = wd5();
        let update = ModeUpdate::resolve(&t, RegulationMode::Manual, None, COMFORT_DURATION, now()).unwrap();
        assert_eq!(update.manual_temperature, t.manual_temperature);
        assert_eq!(update.target, Some(Temperature::from_hundredths(2350)));
    }

    #[test]
    fn comfort_without_temperature_defaults_to_configured_value() {
        let t = wg4();
        let update = ModeUpdate::resolve(&t, RegulationMode::Comfort, None, COMFORT_DURATION, now()).unwrap();
        assert_eq!(update.comfort_temperature, Temperature::from_hundredths(2000));
        assert_eq!(
            update.comfort_end_time.unwrap().with_timezone(&Utc),
            now() + TimeDelta::minutes(240)
        );
    }

    #[test]
    fn temperature_ignored_outside_manual_and_comfort() {
        let t = wd5();
        let update = ModeUpdate::resolve(
            &t,
            RegulationMode::Vacation,
            Some(Temperature::from_hundredths(3000)),
            COMFORT_DURATION,
            now(),
        )
        .unwrap();
        assert_eq!(update.manual_temperature, t.manual_temperature);
        assert_eq!(update.comfort_temperature, t.comfort_temperature);
        assert_eq!(update.target, t.vacation_temperature);
    }
}

//! WD5-series thermostats (OWD5, MWD5) behind the group-based JSON API.

use chrono::{DateTime, FixedOffset};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::protocol::{
    ApiRequest, ModeUpdate, SESSION_PARAM, ThermostatApi, ThermostatRecord, error_code,
    grouped_thermostats,
};
use crate::types::*;
use crate::{Error, Result};

pub const DEFAULT_HOST: &str = "ocd5.azurewebsites.net";
pub const DEFAULT_CLIENT_SW_VERSION: u32 = 1060;

pub(crate) const DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

const LOGIN_PATH: &str = "api/UserProfile/SignIn";
const LIST_PATH: &str = "api/Group/GroupContents";
const UPDATE_PATH: &str = "api/Group/UpdateGroup";

/// One entry of `GroupContents[].Thermostats[]`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct Wd5Thermostat {
    pub id: Option<i64>,
    pub serial_number: String,
    #[serde(rename = "SWversion", default)]
    pub sw_version: String,
    #[serde(default)]
    pub group_name: Option<String>,
    #[serde(default)]
    pub group_id: i64,
    #[serde(default)]
    pub thermostat_name: String,
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub heating: bool,
    pub regulation_mode: i64,
    pub sensor_appl: Option<i64>,
    pub adaptive_mode: Option<bool>,
    pub open_window: Option<bool>,
    pub last_primary_mode_is_auto: Option<bool>,
    pub daylight_saving_active: Option<bool>,
    pub vacation_enabled: Option<bool>,
    pub floor_temperature: Option<Temperature>,
    pub room_temperature: Option<Temperature>,
    pub min_setpoint: Temperature,
    pub max_setpoint: Temperature,
    pub comfort_setpoint: Temperature,
    pub manual_mode_setpoint: Temperature,
    pub vacation_temperature: Option<Temperature>,
    pub frost_protection_temperature: Option<Temperature>,
    pub comfort_end_time: Option<String>,
    pub boost_end_time: Option<String>,
    pub vacation_begin_day: Option<String>,
    pub vacation_end_day: Option<String>,
    /// Seconds east of UTC.
    pub time_zone: Option<i32>,
    pub schedule: Option<Value>,
}

pub(crate) struct Wd5Api {
    pub api_key: String,
    pub customer_id: i64,
    pub username: String,
    pub password: String,
    pub client_sw_version: u32,
}

impl ThermostatApi for Wd5Api {
    fn series(&self) -> Series {
        Series::Wd5
    }

    fn login_request(&self) -> ApiRequest {
        ApiRequest::post(
            LOGIN_PATH,
            json!({
                "APIKEY": self.api_key,
                "UserName": self.username,
                "Password": self.password,
                "ClientSWVersion": self.client_sw_version,
                "CustomerId": self.customer_id,
            }),
        )
    }

    fn list_thermostats_request(&self, session_id: &str) -> ApiRequest {
        ApiRequest::get(LIST_PATH)
            .query(SESSION_PARAM, session_id)
            .query("APIKEY", self.api_key.as_str())
    }

    fn parse_thermostats_response(&self, body: &Value) -> Result<Vec<ThermostatRecord>> {
        if error_code(body) == Some(1) {
            return Err(Error::Api("unable to get thermostats".to_string()));
        }
        grouped_thermostats(body, "GroupContents")?
            .into_iter()
            .map(|item| {
                let record: Wd5Thermostat = serde_json::from_value(item.clone())?;
                Ok(ThermostatRecord::Wd5(Box::new(record)))
            })
            .collect()
    }

    fn set_mode_request(&self, session_id: &str, thermostat: &Thermostat, update: &ModeUpdate) -> ApiRequest {
        ApiRequest::post(
            UPDATE_PATH,
            json!({
                "APIKEY": self.api_key,
                "SetGroup": {
                    "ExcludeVacationData": false,
                    "GroupId": thermostat.zone_id,
                    "GroupName": thermostat.zone_name,
                    "BoostEndTime": format_time(update.boost_end_time),
                    "ComfortEndTime": format_time(update.comfort_end_time),
                    "ComfortSetpoint": update.comfort_temperature,
                    "LastPrimaryModeIsAuto": thermostat.regulation_mode == RegulationMode::Schedule,
                    "ManualModeSetpoint": update.manual_temperature,
                    "RegulationMode": update.mode.code(),
                    "Schedule": thermostat.raw_schedule,
                    "VacationEnabled": thermostat.vacation_mode,
                    "VacationBeginDay": format_time(thermostat.vacation_begin_time),
                    "VacationEndDay": format_time(thermostat.vacation_end_time),
                    "VacationTemperature": thermostat.vacation_temperature,
                },
            }),
        )
        .query(SESSION_PARAM, session_id)
    }

    fn parse_set_mode_response(&self, body: &Value) -> Result<bool> {
        // Only an explicit ErrorCode 1 counts as failure.
        Ok(error_code(body) != Some(1))
    }
}

/// Thermostat-local wall-clock time, as the WD5 API expects it.
fn format_time(time: Option<DateTime<FixedOffset>>) -> Option<String> {
    time.map(|t| t.format(DATETIME_FORMAT).to_string())
}

use chrono::{DateTime, FixedOffset, NaiveDateTime, Offset, Utc};
use serde_json::Value;

use crate::protocol::ThermostatRecord;
use crate::schedule::Schedule;
use crate::types::*;
use crate::wd5::{self, Wd5Thermostat};
use crate::wg4::{self, Wg4Thermostat};
use crate::{Error, Result};

const WG4_MODES: [RegulationMode; 3] = [
    RegulationMode::Schedule,
    RegulationMode::Comfort,
    RegulationMode::Manual,
];

pub(crate) fn map_record(record: ThermostatRecord) -> Result<Thermostat> {
    match record {
        ThermostatRecord::Wd5(r) => from_wd5(*r),
        ThermostatRecord::Wg4(r) => from_wg4(*r),
    }
}

impl Thermostat {
    /// Builds a thermostat from one WD5 `Thermostats[]` entry.
    pub fn from_wd5_json(data: &Value) -> Result<Self> {
        let record: Wd5Thermostat = serde_json::from_value(data.clone())?;
        from_wd5(record)
    }

    /// Builds a thermostat from one WG4 `Thermostats[]` entry.
    pub fn from_wg4_json(data: &Value) -> Result<Self> {
        let record: Wg4Thermostat = serde_json::from_value(data.clone())?;
        from_wg4(record)
    }
}

fn regulation_mode(code: i64, serial: &str) -> Result<RegulationMode> {
    RegulationMode::from_code(code).ok_or_else(|| {
        Error::Protocol(format!("thermostat {serial} reports unknown regulation mode {code}"))
    })
}

fn from_wd5(r: Wd5Thermostat) -> Result<Thermostat> {
    let mode = regulation_mode(r.regulation_mode, &r.serial_number)?;

    let utc_offset = match r.time_zone {
        Some(secs) => Some(
            FixedOffset::east_opt(secs)
                .ok_or_else(|| Error::Protocol(format!("invalid TimeZone offset {secs}")))?,
        ),
        None => None,
    };
    let offset = utc_offset.unwrap_or_else(|| Utc.fix());
    let local = |s: &Option<String>| parse_wd5_time(s.as_deref(), offset);

    let schedule = r.schedule.as_ref().map(Schedule::from_json).transpose()?;

    Ok(Thermostat {
        series: Series::Wd5,
        model: "OWD5".to_string(),
        software_version: r.sw_version,
        name: r.thermostat_name,
        zone_name: r.group_name.unwrap_or_default(),
        zone_id: r.group_id,
        online: r.online,
        heating: r.heating,
        regulation_mode: mode,
        supported_regulation_modes: RegulationMode::ALL.to_vec(),
        last_primary_mode_is_auto: r
            .last_primary_mode_is_auto
            .unwrap_or(mode == RegulationMode::Schedule),
        min_temperature: r.min_setpoint,
        max_temperature: r.max_setpoint,
        comfort_temperature: r.comfort_setpoint,
        manual_temperature: r.manual_mode_setpoint,
        comfort_end_time: local(&r.comfort_end_time)?,

        thermostat_id: r.id,
        sensor_mode: r.sensor_appl.and_then(SensorMode::from_code),
        adaptive_mode: r.adaptive_mode,
        open_window_detection: r.open_window,
        daylight_saving_active: r.daylight_saving_active,
        temperature_floor: r.floor_temperature,
        temperature_room: r.room_temperature,
        vacation_mode: r.vacation_enabled,
        vacation_temperature: r.vacation_temperature,
        frost_protection_temperature: r.frost_protection_temperature,
        boost_temperature: Some(r.max_setpoint),
        boost_end_time: local(&r.boost_end_time)?,
        vacation_begin_time: local(&r.vacation_begin_day)?,
        vacation_end_time: local(&r.vacation_end_day)?,
        utc_offset,
        schedule,

        temperature: None,
        set_point_temperature: None,

        raw_schedule: r.schedule,
        serial_number: r.serial_number,
    })
}

fn from_wg4(r: Wg4Thermostat) -> Result<Thermostat> {
    let mode = regulation_mode(r.regulation_mode, &r.serial_number)?;
    let comfort_end_time = match r.comfort_end_time.as_deref() {
        Some(s) if !s.is_empty() => Some(
            DateTime::parse_from_str(s, wg4::DATETIME_FORMAT)
                .map_err(|e| Error::Protocol(format!("bad ComfortEndTime {s:?}: {e}")))?,
        ),
        _ => None,
    };

    Ok(Thermostat {
        series: Series::Wg4,
        model: "UWG4".to_string(),
        software_version: r.sw_version,
        name: r.room,
        zone_name: r.group_name.unwrap_or_default(),
        zone_id: r.group_id,
        online: r.online,
        heating: r.heating,
        regulation_mode: mode,
        supported_regulation_modes: WG4_MODES.to_vec(),
        last_primary_mode_is_auto: r
            .last_primary_mode_is_auto
            .unwrap_or(mode == RegulationMode::Schedule),
        min_temperature: r.min_temp,
        max_temperature: r.max_temp,
        comfort_temperature: r.comfort_temperature,
        manual_temperature: r.manual_temperature,
        comfort_end_time,

        thermostat_id: None,
        sensor_mode: None,
        adaptive_mode: None,
        open_window_detection: None,
        daylight_saving_active: None,
        temperature_floor: None,
        temperature_room: None,
        vacation_mode: None,
        vacation_temperature: None,
        frost_protection_temperature: None,
        boost_temperature: None,
        boost_end_time: None,
        vacation_begin_time: None,
        vacation_end_time: None,
        utc_offset: None,
        schedule: None,

        temperature: r.temperature,
        set_point_temperature: r.set_point_temp,

        raw_schedule: None,
        serial_number: r.serial_number,
    })
}

/// WD5 timestamps are wall-clock times at the thermostat, without offset.
fn parse_wd5_time(value: Option<&str>, offset: FixedOffset) -> Result<Option<DateTime<FixedOffset>>> {
    let Some(s) = value.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let naive = NaiveDateTime::parse_from_str(s, &format!("{}%.f", wd5::DATETIME_FORMAT))
        .map_err(|e| Error::Protocol(format!("bad timestamp {s:?}: {e}")))?;
    naive
        .and_local_timezone(offset)
        .single()
        .map(Some)
        .ok_or_else(|| Error::Protocol(format!("ambiguous timestamp {s:?}")))
}

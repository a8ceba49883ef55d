use std::fmt;

use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schedule::Schedule;
use crate::{Error, Result};

/// Temperature as sent by the vendor API: whole hundredths of a degree Celsius.
/// 21.5°C travels as `2150`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temperature(i32);

impl Temperature {
    pub fn from_hundredths(value: i32) -> Self {
        Self(value)
    }

    pub fn from_celsius(c: f64) -> Self {
        Self((c * 100.0).round() as i32)
    }

    pub fn hundredths(&self) -> i32 {
        self.0
    }

    pub fn celsius(&self) -> f64 {
        f64::from(self.0) / 100.0
    }

    /// Mean of two readings, rounded up to the next hundredth.
    pub(crate) fn mean_ceil(a: Temperature, b: Temperature) -> Self {
        let sum = a.0 + b.0;
        Self(sum.div_euclid(2) + sum.rem_euclid(2))
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}\u{00b0}C", self.celsius())
    }
}

/// Operating strategy of a thermostat. The integer codes are the vendor's
/// wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegulationMode {
    Schedule,
    Comfort,
    Manual,
    Vacation,
    FrostProtection,
    Boost,
    Eco,
}

impl RegulationMode {
    pub const ALL: [RegulationMode; 7] = [
        RegulationMode::Schedule,
        RegulationMode::Comfort,
        RegulationMode::Manual,
        RegulationMode::Vacation,
        RegulationMode::FrostProtection,
        RegulationMode::Boost,
        RegulationMode::Eco,
    ];

    pub fn code(&self) -> u8 {
        match self {
            RegulationMode::Schedule => 1,
            RegulationMode::Comfort => 2,
            RegulationMode::Manual => 3,
            RegulationMode::Vacation => 4,
            RegulationMode::FrostProtection => 6,
            RegulationMode::Boost => 8,
            RegulationMode::Eco => 9,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(RegulationMode::Schedule),
            2 => Some(RegulationMode::Comfort),
            3 => Some(RegulationMode::Manual),
            4 => Some(RegulationMode::Vacation),
            6 => Some(RegulationMode::FrostProtection),
            8 => Some(RegulationMode::Boost),
            9 => Some(RegulationMode::Eco),
            _ => None,
        }
    }
}

impl TryFrom<u8> for RegulationMode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        RegulationMode::from_code(i64::from(code))
            .ok_or_else(|| Error::Validation(format!("unknown regulation mode code {code}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorMode {
    RoomFloor,
    Floor,
    Room,
}

impl SensorMode {
    pub fn code(&self) -> u8 {
        match self {
            SensorMode::RoomFloor => 1,
            SensorMode::Floor => 3,
            SensorMode::Room => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(SensorMode::RoomFloor),
            3 => Some(SensorMode::Floor),
            4 => Some(SensorMode::Room),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Series {
    Wd5,
    Wg4,
}

/// Fields only one series reports stay `None` for the other.
#[derive(Debug, Clone)]
pub struct Thermostat {
    pub series: Series,
    pub model: String,
    pub serial_number: String,
    pub software_version: String,
    pub name: String,
    pub zone_name: String,
    pub zone_id: i64,
    pub online: bool,
    pub heating: bool,
    pub regulation_mode: RegulationMode,
    pub supported_regulation_modes: Vec<RegulationMode>,
    pub last_primary_mode_is_auto: bool,
    pub min_temperature: Temperature,
    pub max_temperature: Temperature,
    pub comfort_temperature: Temperature,
    pub manual_temperature: Temperature,
    pub comfort_end_time: Option<DateTime<FixedOffset>>,

    // WD5 only
    pub thermostat_id: Option<i64>,
    pub sensor_mode: Option<SensorMode>,
    pub adaptive_mode: Option<bool>,
    pub open_window_detection: Option<bool>,
    pub daylight_saving_active: Option<bool>,
    pub temperature_floor: Option<Temperature>,
    pub temperature_room: Option<Temperature>,
    pub vacation_mode: Option<bool>,
    pub vacation_temperature: Option<Temperature>,
    pub frost_protection_temperature: Option<Temperature>,
    pub boost_temperature: Option<Temperature>,
    pub boost_end_time: Option<DateTime<FixedOffset>>,
    pub vacation_begin_time: Option<DateTime<FixedOffset>>,
    pub vacation_end_time: Option<DateTime<FixedOffset>>,
    pub utc_offset: Option<FixedOffset>,
    pub schedule: Option<Schedule>,

    // WG4 only
    pub temperature: Option<Temperature>,
    pub set_point_temperature: Option<Temperature>,

    /// Schedule document exactly as received; WD5 updates send it back.
    pub(crate) raw_schedule: Option<Value>,
}

impl Thermostat {
    pub fn supports(&self, mode: RegulationMode) -> bool {
        self.supported_regulation_modes.contains(&mode)
    }

    /// Measured temperature. Series with separate floor/room sensors report
    /// according to `sensor_mode`; the others report their single reading.
    pub fn get_current_temperature(&self) -> Option<Temperature> {
        if self.temperature_floor.is_some() || self.temperature_room.is_some() {
            return match self.sensor_mode? {
                SensorMode::Room => self.temperature_room,
                SensorMode::Floor => self.temperature_floor,
                SensorMode::RoomFloor => Some(Temperature::mean_ceil(
                    self.temperature_floor?,
                    self.temperature_room?,
                )),
            };
        }
        self.temperature
    }

    pub fn get_target_temperature(&self) -> Option<Temperature> {
        self.get_target_temperature_at(Utc::now())
    }

    /// WG4 reports its setpoint directly; WD5 derives it from the mode.
    pub fn get_target_temperature_at(&self, now: DateTime<Utc>) -> Option<Temperature> {
        if let Some(setpoint) = self.set_point_temperature {
            return Some(setpoint);
        }
        self.temperature_for_mode(self.regulation_mode, now)
    }

    pub fn temperature_for_mode(&self, mode: RegulationMode, now: DateTime<Utc>) -> Option<Temperature> {
        match mode {
            RegulationMode::Schedule => self
                .schedule
                .as_ref()?
                .active_temperature_at(self.local_time(now)),
            RegulationMode::Comfort => Some(self.comfort_temperature),
            RegulationMode::Manual => Some(self.manual_temperature),
            RegulationMode::Vacation => self.vacation_temperature,
            RegulationMode::FrostProtection => self.frost_protection_temperature,
            RegulationMode::Boost => self.boost_temperature,
            RegulationMode::Eco => self.schedule.as_ref()?.lowest_temperature(),
        }
    }

    pub(crate) fn local_time(&self, now: DateTime<Utc>) -> NaiveDateTime {
        match self.utc_offset {
            Some(offset) => now.with_timezone(&offset).naive_local(),
            None => now.naive_utc(),
        }
    }
}

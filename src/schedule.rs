use chrono::{Datelike, NaiveDateTime, NaiveTime, Weekday};
use serde_json::Value;

use crate::types::Temperature;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleEvent {
    pub time: NaiveTime,
    pub temperature: Temperature,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleDay {
    pub weekday: Weekday,
    /// Active events only, sorted by time of day.
    pub events: Vec<ScheduleEvent>,
}

/// Weekly program of a WD5 thermostat.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schedule {
    pub days: Vec<ScheduleDay>,
}

impl Schedule {
    pub fn from_json(data: &Value) -> Result<Self> {
        let raw_days = data
            .get("Days")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Protocol("schedule has no Days".to_string()))?;

        let mut days = Vec::with_capacity(raw_days.len());
        for raw_day in raw_days {
            let group = raw_day
                .get("WeekDayGrpNo")
                .and_then(Value::as_u64)
                .ok_or_else(|| Error::Protocol("schedule day has no WeekDayGrpNo".to_string()))?;
            let weekday = weekday_from_group(group)?;

            let mut events = Vec::new();
            if let Some(Value::Array(raw_events)) = raw_day.get("Events") {
                for raw_event in raw_events {
                    if raw_event.get("Active").and_then(Value::as_bool) != Some(true) {
                        continue;
                    }
                    events.push(parse_event(raw_event)?);
                }
            }
            events.sort_by_key(|e| e.time);

            days.push(ScheduleDay { weekday, events });
        }

        Ok(Self { days })
    }

    pub fn day(&self, weekday: Weekday) -> Option<&ScheduleDay> {
        self.days.iter().find(|d| d.weekday == weekday)
    }

    /// Temperature the program asks for at `now` (thermostat wall-clock time).
    /// Before the first event of a day the last event of the previous day
    /// still applies.
    pub fn active_temperature_at(&self, now: NaiveDateTime) -> Option<Temperature> {
        let today = now.weekday();
        let time = now.time();

        if let Some(day) = self.day(today)
            && let Some(event) = day.events.iter().rev().find(|e| e.time < time)
        {
            return Some(event.temperature);
        }

        self.day(today.pred())?.events.last().map(|e| e.temperature)
    }

    /// Lowest temperature anywhere in the week; the eco setpoint.
    pub fn lowest_temperature(&self) -> Option<Temperature> {
        self.days
            .iter()
            .flat_map(|d| &d.events)
            .map(|e| e.temperature)
            .min()
    }
}

fn weekday_from_group(group: u64) -> Result<Weekday> {
    match group {
        0 => Ok(Weekday::Sun),
        1 => Ok(Weekday::Mon),
        2 => Ok(Weekday::Tue),
        3 => Ok(Weekday::Wed),
        4 => Ok(Weekday::Thu),
        5 => Ok(Weekday::Fri),
        6 => Ok(Weekday::Sat),
        other => Err(Error::Protocol(format!("invalid WeekDayGrpNo {other}"))),
    }
}

fn parse_event(raw: &Value) -> Result<ScheduleEvent> {
    let clock = raw
        .get("Clock")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Protocol("schedule event has no Clock".to_string()))?;
    let time = NaiveTime::parse_from_str(clock, "%H:%M:%S")
        .map_err(|e| Error::Protocol(format!("bad schedule clock {clock:?}: {e}")))?;
    let temperature = raw
        .get("Temperature")
        .and_then(Value::as_i64)
        .ok_or_else(|| Error::Protocol("schedule event has no Temperature".to_string()))?;
    let temperature = i32::try_from(temperature)
        .map_err(|_| Error::Protocol(format!("schedule temperature {temperature} out of range")))?;
    Ok(ScheduleEvent {
        time,
        temperature: Temperature::from_hundredths(temperature),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    fn event(clock: &str, temperature: i32) -> Value {
        json!({"Clock": clock, "Temperature": temperature, "Active": true})
    }

    #[test]
    fn parses_fixture_and_skips_inactive() {
        let fixture: Value =
            serde_json::from_str(include_str!("../tests/fixtures/wd5_thermostat.json")).unwrap();
        let mut data = fixture["Schedule"].clone();
        let schedule = Schedule::from_json(&data).unwrap();
        assert_eq!(schedule.days.len(), 7);
        assert_eq!(schedule.day(Weekday::Mon).unwrap().events.len(), 4);

        data["Days"][0]["Events"][0]["Active"] = json!(false);
        let schedule = Schedule::from_json(&data).unwrap();
        let first_weekday = schedule.days[0].weekday;
        assert_eq!(schedule.day(first_weekday).unwrap().events.len(), 3);
    }

    #[test]
    fn group_zero_is_sunday() {
        let schedule = Schedule::from_json(&json!({"Days": [{"WeekDayGrpNo": 0, "Events": []}]})).unwrap();
        assert_eq!(schedule.days[0].weekday, Weekday::Sun);
    }

    #[test]
    fn invalid_group_is_rejected() {
        let err = Schedule::from_json(&json!({"Days": [{"WeekDayGrpNo": 7, "Events": []}]})).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
    }

    #[test]
    fn oversized_temperature_is_rejected() {
        let data = json!({"Days": [{
            "WeekDayGrpNo": 1,
            "Events": [event("06:00:00", 2300), {"Clock": "08:00:00", "Temperature": 4_294_969_596_i64, "Active": true}]
        }]});
        let err = Schedule::from_json(&data).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)), "got {err:?}");
    }

    #[test]
    fn events_sorted_by_time() {
        let data = json!({"Days": [{
            "WeekDayGrpNo": 1,
            "Events": [event("18:00:00", 2100), event("06:30:00", 2300)]
        }]});
        let schedule = Schedule::from_json(&data).unwrap();
        let times: Vec<_> = schedule.days[0].events.iter().map(|e| e.time).collect();
        assert!(times[0] < times[1]);
    }

    #[test]
    fn active_temperature_uses_last_passed_event() {
        // 2023-01-02 is a Monday.
        let data = json!({"Days": [{
            "WeekDayGrpNo": 1,
            "Events": [event("06:00:00", 2300), event("08:30:00", 1900), event("17:00:00", 2200)]
        }]});
        let schedule = Schedule::from_json(&data).unwrap();
        assert_eq!(
            schedule.active_temperature_at(at(2023, 1, 2, 12, 0)),
            Some(Temperature::from_hundredths(1900))
        );
        assert_eq!(
            schedule.active_temperature_at(at(2023, 1, 2, 23, 0)),
            Some(Temperature::from_hundredths(2200))
        );
    }

    #[test]
    fn active_temperature_falls_back_to_previous_day() {
        // 2023-01-04 is a Wednesday; 06:00 is before its first event.
        let data = json!({"Days": [
            {"WeekDayGrpNo": 2, "Events": [event("08:30:00", 2500)]},
            {"WeekDayGrpNo": 3, "Events": [event("08:30:00", 2600)]}
        ]});
        let schedule = Schedule::from_json(&data).unwrap();
        assert_eq!(
            schedule.active_temperature_at(at(2023, 1, 4, 6, 0)),
            Some(Temperature::from_hundredths(2500))
        );
    }

    #[test]
    fn monday_morning_falls_back_to_sunday() {
        let data = json!({"Days": [
            {"WeekDayGrpNo": 0, "Events": [event("08:30:00", 2500)]},
            {"WeekDayGrpNo": 1, "Events": [event("08:30:00", 2600)]}
        ]});
        let schedule = Schedule::from_json(&data).unwrap();
        assert_eq!(
            schedule.active_temperature_at(at(2023, 1, 2, 6, 0)),
            Some(Temperature::from_hundredths(2500))
        );
    }

    #[test]
    fn lowest_temperature() {
        let data = json!({"Days": [
            {"WeekDayGrpNo": 0, "Events": [event("08:30:00", 2500)]},
            {"WeekDayGrpNo": 1, "Events": [event("08:30:00", 900)]},
            {"WeekDayGrpNo": 2, "Events": [event("08:30:00", 2600)]}
        ]});
        let schedule = Schedule::from_json(&data).unwrap();
        assert_eq!(schedule.lowest_temperature(), Some(Temperature::from_hundredths(900)));

        let empty = Schedule::from_json(&json!({"Days": []})).unwrap();
        assert_eq!(empty.lowest_temperature(), None);
    }
}

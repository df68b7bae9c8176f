//! Virtual-time and wall-clock task scheduler.
//!
//! Unlike `graphics_stub.py::Scheduler`, this type does not hold a reference
//! to the interpreter that runs task bodies — `Rc<RefCell<_>>`-backed `Value`s
//! aren't `Send`, so a scheduler thread couldn't safely drive the interpreter
//! anyway. Instead `step` hands back the bodies that came due and the
//! `Interpreter` (which owns the `Scheduler`) executes them itself, logging a
//! warning on failure rather than silently swallowing it the way the Python
//! original's background thread does.

use chrono::{Datelike, TimeZone, Timelike, Utc};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::ast::Stmt;
use crate::error::GopaError;

struct AfterTask {
    fire_at: f64,
    body: Vec<Stmt>,
}

struct EveryTask {
    interval: f64,
    next_fire: f64,
    body: Vec<Stmt>,
}

struct Job {
    name: String,
    interval: f64,
    next_fire: f64,
    body: Vec<Stmt>,
}

struct CronTask {
    schedule: CronSchedule,
    body: Vec<Stmt>,
    last_fired_minute: Option<i64>,
}

/// A parsed cron schedule: `None` fields are wildcards.
#[derive(Debug, Clone, PartialEq)]
pub struct CronSchedule {
    pub minute: Option<u32>,
    pub hour: Option<u32>,
    pub day: Option<u32>,
    pub month: Option<u32>,
    pub weekday: Option<u32>,
}

pub struct Scheduler {
    virtual_time: bool,
    now: f64,
    after_tasks: Vec<AfterTask>,
    every_tasks: Vec<EveryTask>,
    jobs: Vec<Job>,
    cron_tasks: Vec<CronTask>,
}

impl Scheduler {
    pub fn new(virtual_time: bool) -> Self {
        Scheduler {
            virtual_time,
            now: 0.0,
            after_tasks: Vec::new(),
            every_tasks: Vec::new(),
            jobs: Vec::new(),
            cron_tasks: Vec::new(),
        }
    }

    pub fn is_virtual_time(&self) -> bool {
        self.virtual_time
    }

    /// `wait N seconds`. In virtual-time mode this only advances the clock;
    /// in wall-clock mode it actually blocks the calling thread.
    pub fn wait(&mut self, seconds: f64) {
        if self.virtual_time {
            self.now += seconds;
        } else {
            std::thread::sleep(std::time::Duration::from_secs_f64(seconds.max(0.0)));
        }
    }

    pub fn after(&mut self, seconds: f64, body: Vec<Stmt>) {
        self.after_tasks.push(AfterTask {
            fire_at: self.now + seconds,
            body,
        });
    }

    pub fn every(&mut self, seconds: f64, body: Vec<Stmt>) {
        self.every_tasks.push(EveryTask {
            interval: seconds,
            next_fire: self.now + seconds,
            body,
        });
    }

    /// Registers (or replaces) a named periodic job.
    pub fn job(&mut self, name: String, seconds: f64, body: Vec<Stmt>) {
        self.jobs.retain(|j| j.name != name);
        self.jobs.push(Job {
            name,
            interval: seconds,
            next_fire: self.now + seconds,
            body,
        });
    }

    pub fn stop_job(&mut self, name: &str) {
        self.jobs.retain(|j| j.name != name);
    }

    pub fn cron(&mut self, schedule: &str, body: Vec<Stmt>) -> Result<(), GopaError> {
        let schedule = parse_cron(schedule)?;
        self.cron_tasks.push(CronTask {
            schedule,
            body,
            last_fired_minute: None,
        });
        Ok(())
    }

    /// Advances virtual time by `dt` seconds (real wall-clock elapsed time
    /// when `virtual_time` is false) and returns the bodies of every task
    /// that came due, in firing order: after, every, job, cron.
    pub fn step(&mut self, dt: f64) -> Vec<Vec<Stmt>> {
        self.now += dt;
        let mut due = Vec::new();

        self.after_tasks.retain(|task| {
            if task.fire_at <= self.now {
                due.push(task.body.clone());
                false
            } else {
                true
            }
        });

        for task in &mut self.every_tasks {
            while task.next_fire <= self.now {
                due.push(task.body.clone());
                task.next_fire += task.interval;
            }
        }

        for job in &mut self.jobs {
            while job.next_fire <= self.now {
                due.push(job.body.clone());
                job.next_fire += job.interval;
            }
        }

        // In virtual-time mode, cron fields are matched against a calendar
        // time derived deterministically from the virtual clock (treating
        // `self.now` as a Unix timestamp) rather than the real wall clock,
        // so cron firing is reproducible regardless of when the test runs.
        let wall_now = if self.virtual_time {
            Utc.timestamp_opt(self.now as i64, 0)
                .single()
                .unwrap_or_else(Utc::now)
        } else {
            Utc::now()
        };
        for cron in &mut self.cron_tasks {
            let minute_bucket = wall_now.timestamp() / 60;
            if cron.last_fired_minute == Some(minute_bucket) {
                continue;
            }
            if cron.schedule.matches(&wall_now) {
                due.push(cron.body.clone());
                cron.last_fired_minute = Some(minute_bucket);
            }
        }

        due
    }
}

impl CronSchedule {
    fn matches(&self, now: &chrono::DateTime<Utc>) -> bool {
        field_matches(self.minute, now.minute())
            && field_matches(self.hour, now.hour())
            && field_matches(self.day, now.day())
            && field_matches(self.month, now.month())
            && field_matches(self.weekday, now.weekday().num_days_from_sunday())
    }
}

fn field_matches(field: Option<u32>, actual: u32) -> bool {
    match field {
        Some(expected) => expected == actual,
        None => true,
    }
}

static EVERY_DAY_AT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^every day at (\d{1,2}):(\d{2})$").unwrap());
static EVERY_WEEKDAY_AT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^every (sunday|monday|tuesday|wednesday|thursday|friday|saturday) at (\d{1,2}):(\d{2})$").unwrap()
});

const WEEKDAYS: [&str; 7] = [
    "sunday",
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
];

/// Accepts both friendly phrases (`"every minute"`, `"every hour"`,
/// `"every day at 9:30"`, `"every monday at 8:00"`) and raw 5-field cron
/// strings (`"30 9 * * 1"`), matching `graphics_stub.py::Scheduler.parse_cron`.
pub fn parse_cron(schedule: &str) -> Result<CronSchedule, GopaError> {
    let schedule = schedule.trim();
    let lower = schedule.to_lowercase();

    if lower == "every minute" {
        return Ok(CronSchedule {
            minute: None,
            hour: None,
            day: None,
            month: None,
            weekday: None,
        });
    }
    if lower == "every hour" {
        return Ok(CronSchedule {
            minute: Some(0),
            hour: None,
            day: None,
            month: None,
            weekday: None,
        });
    }
    if let Some(caps) = EVERY_DAY_AT.captures(&lower) {
        return Ok(CronSchedule {
            minute: Some(caps[2].parse().unwrap()),
            hour: Some(caps[1].parse().unwrap()),
            day: None,
            month: None,
            weekday: None,
        });
    }
    if let Some(caps) = EVERY_WEEKDAY_AT.captures(&lower) {
        let weekday = WEEKDAYS.iter().position(|w| *w == &caps[1]).unwrap() as u32;
        return Ok(CronSchedule {
            minute: Some(caps[3].parse().unwrap()),
            hour: Some(caps[2].parse().unwrap()),
            day: None,
            month: None,
            weekday: Some(weekday),
        });
    }

    let fields: Vec<&str> = schedule.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(GopaError::parse(format!(
            "invalid cron schedule '{schedule}'"
        )));
    }
    let parse_field = |f: &str| -> Result<Option<u32>, GopaError> {
        if f == "*" {
            Ok(None)
        } else {
            f.parse()
                .map(Some)
                .map_err(|_| GopaError::parse(format!("invalid cron field '{f}'")))
        }
    };
    Ok(CronSchedule {
        minute: parse_field(fields[0])?,
        hour: parse_field(fields[1])?,
        day: parse_field(fields[2])?,
        month: parse_field(fields[3])?,
        weekday: parse_field(fields[4])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn after_fires_once_past_its_deadline() {
        let mut scheduler = Scheduler::new(true);
        scheduler.after(1.0, vec![Stmt::Stop]);
        assert!(scheduler.step(0.5).is_empty());
        assert_eq!(scheduler.step(0.6).len(), 1);
        assert!(scheduler.step(10.0).is_empty());
    }

    #[test]
    fn every_fires_repeatedly() {
        let mut scheduler = Scheduler::new(true);
        scheduler.every(1.0, vec![Stmt::Stop]);
        assert_eq!(scheduler.step(1.0).len(), 1);
        assert_eq!(scheduler.step(1.0).len(), 1);
    }

    #[test]
    fn job_replaces_prior_registration_with_the_same_name() {
        let mut scheduler = Scheduler::new(true);
        scheduler.job("tick".into(), 1.0, vec![Stmt::Stop]);
        scheduler.job("tick".into(), 2.0, vec![Stmt::Break]);
        assert_eq!(scheduler.jobs.len(), 1);
    }

    #[test]
    fn parse_cron_friendly_phrases() {
        assert_eq!(
            parse_cron("every hour").unwrap(),
            CronSchedule {
                minute: Some(0),
                hour: None,
                day: None,
                month: None,
                weekday: None
            }
        );
        let every_day = parse_cron("every day at 9:30").unwrap();
        assert_eq!(every_day.minute, Some(30));
        assert_eq!(every_day.hour, Some(9));
    }

    #[test]
    fn parse_cron_raw_five_field() {
        let parsed = parse_cron("30 9 * * 1").unwrap();
        assert_eq!(parsed.minute, Some(30));
        assert_eq!(parsed.hour, Some(9));
        assert_eq!(parsed.day, None);
        assert_eq!(parsed.weekday, Some(1));
    }

    #[test]
    fn cron_fires_against_virtual_time_not_the_wall_clock() {
        let mut scheduler = Scheduler::new(true);
        // 1970-01-01T00:01:00Z: minute 1, should match "every minute".
        scheduler.now = 60.0;
        scheduler.cron("every minute", vec![Stmt::Stop]).unwrap();
        assert_eq!(scheduler.step(0.0).len(), 1);
        // Same minute bucket again: must not refire.
        assert!(scheduler.step(0.0).is_empty());
        // Advance into the next minute bucket: fires again.
        assert_eq!(scheduler.step(60.0).len(), 1);
    }
}

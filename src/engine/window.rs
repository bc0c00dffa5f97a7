//! Date window computation for time-series nodes

use super::types::{DateWindow, RunConfig};
use crate::config::Configuration;
use crate::error::{Error, Result};
use crate::source::{
    END_DATE, LAST_REQUESTED_DATE, MAX_FETCHING_DAYS, REIMPORT_LOOKBACK_WINDOW, START_DATE,
};
use crate::types::RunMode;
use chrono::{Days, NaiveDate};

/// Compute the days to fetch on `today`.
///
/// An explicit run range wins. Otherwise a backfill spans `StartDate` to
/// `EndDate` (or yesterday) inclusive, and an incremental run resumes
/// `ReimportLookbackWindow` days before the day after the watermark and
/// stops before `today`. `MaxFetchingDays` caps the result.
pub fn compute_window(run: &RunConfig, config: &Configuration, today: NaiveDate) -> Result<DateWindow> {
    let yesterday = today.pred_opt().unwrap_or(today);

    let window = match (run.start_date, run.mode) {
        (Some(start), _) => {
            let end = run.end_date.unwrap_or(yesterday);
            DateWindow::new(start, (end - start).num_days() + 1)
        }
        (None, RunMode::FullBackfill) => {
            let start = required_start(config)?;
            let end = run
                .end_date
                .or_else(|| config.date(END_DATE))
                .unwrap_or(yesterday);
            DateWindow::new(start, (end - start).num_days() + 1)
        }
        (None, RunMode::Incremental) => {
            let start = match config.date(LAST_REQUESTED_DATE) {
                Some(watermark) => resume_from(watermark, lookback_days(config)),
                None => required_start(config)?,
            };
            DateWindow::new(start, (today - start).num_days())
        }
    };

    Ok(cap_days(window, config))
}

fn required_start(config: &Configuration) -> Result<NaiveDate> {
    config.date(START_DATE).ok_or_else(|| {
        Error::configuration(
            START_DATE,
            "Start date is required when there is no last requested date",
        )
    })
}

fn lookback_days(config: &Configuration) -> i64 {
    config
        .number(REIMPORT_LOOKBACK_WINDOW)
        .map_or(0, |days| days.max(0.0) as i64)
}

/// `watermark + 1 - lookback`
fn resume_from(watermark: NaiveDate, lookback: i64) -> NaiveDate {
    let next = watermark.succ_opt().unwrap_or(watermark);
    u64::try_from(lookback)
        .ok()
        .and_then(|days| next.checked_sub_days(Days::new(days)))
        .unwrap_or(next)
}

fn cap_days(mut window: DateWindow, config: &Configuration) -> DateWindow {
    if let Some(max) = config.number(MAX_FETCHING_DAYS) {
        let max = max.max(0.0) as i64;
        if window.days > max {
            window.days = max;
        }
    }
    window
}

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Local, NaiveDate};
use log::{Level, LevelFilter, Log, Metadata, Record};

/// `log` backend that mirrors records to the console (env_logger) and
/// appends them to one plain-text file per calendar day.
///
/// File lines are `"<local time>: <message>"`; the file is
/// `<dir>/<YYYY-MM-DD>.log` and rolls over when the local date changes.
pub struct DailyFileLogger {
    dir: PathBuf,
    console: env_logger::Logger,
    file_level: LevelFilter,
    current: Mutex<Option<OpenLog>>,
}

struct OpenLog {
    day: NaiveDate,
    file: File,
}

impl DailyFileLogger {
    /// Console filtering follows `RUST_LOG` (default `info`).
    pub fn new(dir: &Path, file_level: LevelFilter) -> Self {
        let console =
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
                .build();
        Self {
            dir: dir.to_path_buf(),
            console,
            file_level,
            current: Mutex::new(None),
        }
    }

    /// Installs this logger as the global `log` backend.
    pub fn init(self) -> Result<(), log::SetLoggerError> {
        let max = self.console.filter().max(self.file_level);
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(max);
        Ok(())
    }

    pub fn log_path(dir: &Path, day: NaiveDate) -> PathBuf {
        dir.join(format!("{}.log", day.format("%Y-%m-%d")))
    }

    pub fn format_line(now: &DateTime<Local>, level: Level, message: &str) -> String {
        let time = now.format("%H:%M:%S");
        match level {
            Level::Error => format!("{time}: ERROR! {message}"),
            Level::Warn => format!("{time}: WARNING! {message}"),
            _ => format!("{time}: {message}"),
        }
    }

    fn append(&self, now: &DateTime<Local>, level: Level, message: &str) -> io::Result<()> {
        let mut guard = match self.current.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let day = now.date_naive();
        let stale = guard.as_ref().map_or(true, |open| open.day != day);
        if stale {
            fs::create_dir_all(&self.dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(Self::log_path(&self.dir, day))?;
            *guard = Some(OpenLog { day, file });
        }

        if let Some(open) = guard.as_mut() {
            writeln!(open.file, "{}", Self::format_line(now, level, message))?;
        }
        Ok(())
    }
}

impl Log for DailyFileLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.file_level || self.console.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if self.console.matches(record) {
            self.console.log(record);
        }
        if record.level() <= self.file_level {
            let message = record.args().to_string();
            if let Err(e) = self.append(&Local::now(), record.level(), &message) {
                eprintln!("Failed to write log file in {}: {e}", self.dir.display());
            }
        }
    }

    fn flush(&self) {
        self.console.flush();
        if let Ok(mut guard) = self.current.lock() {
            if let Some(open) = guard.as_mut() {
                let _ = open.file.flush();
            }
        }
    }
}

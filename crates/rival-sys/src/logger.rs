// logger.rs -- console + optional file logger behind the log facade

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use log::{LevelFilter, Metadata, Record};
use parking_lot::Mutex;

pub struct RivalLogger {
    level: LevelFilter,
    file: Option<Mutex<File>>,
}

impl log::Log for RivalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = format!(
            "{} [{}] {}",
            chrono::Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            record.args()
        );
        eprintln!("{}", line);
        if let Some(file) = &self.file {
            let _ = writeln!(file.lock(), "{}", line);
        }
    }

    fn flush(&self) {
        if let Some(file) = &self.file {
            let _ = file.lock().flush();
        }
    }
}

pub fn init(level: LevelFilter, file: Option<&Path>) -> Result<(), log::SetLoggerError> {
    let file = file.and_then(|p| {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(p)
            .map(Mutex::new)
            .ok()
    });
    log::set_boxed_logger(Box::new(RivalLogger { level, file }))?;
    log::set_max_level(level);
    Ok(())
}

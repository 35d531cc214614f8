//! Registro persistente de eventos, una entrada JSON por linea.
//!
//! Solo se escribe, nunca se lee de vuelta. Si falla la escritura se avisa por
//! el log y se sigue.
use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
    sync::Mutex,
};

use chrono::{DateTime, Local};
use log::{error, Level};
use serde::Serialize;

use crate::errors::CafeError;

#[derive(Debug, Clone, Serialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, message: &str) -> LogEntry {
        LogEntry {
            timestamp: Local::now(),
            level: level.to_string(),
            message: message.to_string(),
        }
    }
}

pub trait EventSink: Send + Sync {
    fn record(&self, level: Level, message: &str);
}

pub struct JsonEventLog {
    file: Mutex<File>,
}

impl JsonEventLog {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<JsonEventLog, CafeError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(JsonEventLog {
            file: Mutex::new(file),
        })
    }

    fn write_entry(&self, entry: &LogEntry) -> Result<(), CafeError> {
        let mut line = serde_json::to_string(entry)?;
        line.push('\n');
        let mut file = self.file.lock()?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

impl EventSink for JsonEventLog {
    fn record(&self, level: Level, message: &str) {
        if let Err(e) = self.write_entry(&LogEntry::new(level, message)) {
            error!("[EVENT LOG] Could not write entry: {}", e);
        }
    }
}

/// Sink en memoria, para los tests
#[cfg(test)]
#[derive(Default)]
pub struct MemoryEventLog {
    entries: Mutex<Vec<LogEntry>>,
}

#[cfg(test)]
impl MemoryEventLog {
    pub fn new() -> MemoryEventLog {
        MemoryEventLog::default()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        match self.entries.lock() {
            Ok(entries) => entries.clone(),
            Err(_) => Vec::new(),
        }
    }

    pub fn contains(&self, level: Level, fragment: &str) -> bool {
        let level = level.to_string();
        self.entries()
            .iter()
            .any(|entry| entry.level == level && entry.message.contains(fragment))
    }
}

#[cfg(test)]
impl EventSink for MemoryEventLog {
    fn record(&self, level: Level, message: &str) {
        match self.entries.lock() {
            Ok(mut entries) => entries.push(LogEntry::new(level, message)),
            Err(_) => error!("[EVENT LOG] Error while taking the memory log lock"),
        }
    }
}

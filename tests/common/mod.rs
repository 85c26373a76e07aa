//! In-memory client library used by the integration tests.

#![allow(dead_code)]

use mysql_drivers::db::{Backend, ClientLibrary, Connection, Cursor, CursorOptions, StaticProbe};
use mysql_drivers::models::{ConnectParams, LibraryError, Params, Row, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// What the fake library saw and what it should fail with next.
#[derive(Default)]
pub struct FakeState {
    pub connects: Mutex<Vec<ConnectParams>>,
    pub cursors: Mutex<Vec<CursorOptions>>,
    pub executed: Mutex<Vec<(String, Params)>>,
    pub execute_failures: Mutex<VecDeque<LibraryError>>,
    pub close_failures: Mutex<VecDeque<LibraryError>>,
    pub escape_calls: AtomicUsize,
    pub closes: AtomicUsize,
}

impl FakeState {
    pub fn fail_next_execute(&self, err: LibraryError) {
        self.execute_failures.lock().unwrap().push_back(err);
    }

    pub fn fail_next_close(&self, err: LibraryError) {
        self.close_failures.lock().unwrap().push_back(err);
    }

    pub fn last_executed(&self) -> Option<(String, Params)> {
        self.executed.lock().unwrap().last().cloned()
    }

    pub fn connect_count(&self) -> usize {
        self.connects.lock().unwrap().len()
    }
}

pub struct FakeLibrary {
    pub state: Arc<FakeState>,
    native: bool,
    /// Escaping an empty buffer fails, like some old runtimes do.
    faults_on_empty_escape: bool,
}

impl FakeLibrary {
    pub fn new() -> Self {
        Self {
            state: Arc::new(FakeState::default()),
            native: false,
            faults_on_empty_escape: false,
        }
    }

    pub fn native() -> Self {
        Self {
            native: true,
            ..Self::new()
        }
    }

    pub fn faulting_on_empty_escape() -> Self {
        Self {
            faults_on_empty_escape: true,
            ..Self::new()
        }
    }
}

impl ClientLibrary for FakeLibrary {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, LibraryError> {
        self.state.connects.lock().unwrap().push(params.clone());
        Ok(Box::new(FakeConnection {
            state: Arc::clone(&self.state),
            open: true,
        }))
    }

    fn binary(&self, data: &[u8]) -> Value {
        Value::Text(format!("_binary:{}", data.len()))
    }

    fn escape_bytes(&self, data: &[u8]) -> Result<Vec<u8>, LibraryError> {
        self.state.escape_calls.fetch_add(1, Ordering::SeqCst);
        if self.faults_on_empty_escape && data.is_empty() {
            return Err(LibraryError::new(
                mysql_drivers::models::ErrorClass::Internal,
                "segmentation fault",
            ));
        }
        Ok(mysql_drivers::db::escape::escape_bytes(data))
    }

    fn has_native_extension(&self) -> bool {
        self.native
    }
}

pub struct FakeConnection {
    state: Arc<FakeState>,
    open: bool,
}

impl Connection for FakeConnection {
    fn cursor(&mut self, options: CursorOptions) -> Result<Box<dyn Cursor + '_>, LibraryError> {
        if !self.open {
            return Err(LibraryError::interface("connection closed"));
        }
        self.state.cursors.lock().unwrap().push(options);
        Ok(Box::new(FakeCursor {
            state: Arc::clone(&self.state),
            rows: Vec::new(),
        }))
    }

    fn set_autocommit(&mut self, _on: bool) -> Result<(), LibraryError> {
        Ok(())
    }

    fn commit(&mut self) -> Result<(), LibraryError> {
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), LibraryError> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.open
    }

    fn close(&mut self) -> Result<(), LibraryError> {
        self.state.closes.fetch_add(1, Ordering::SeqCst);
        self.open = false;
        match self.state.close_failures.lock().unwrap().pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct FakeCursor {
    state: Arc<FakeState>,
    rows: Vec<Row>,
}

impl Cursor for FakeCursor {
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, LibraryError> {
        self.state
            .executed
            .lock()
            .unwrap()
            .push((sql.to_string(), params.clone()));
        if let Some(err) = self.state.execute_failures.lock().unwrap().pop_front() {
            return Err(err);
        }
        self.rows = vec![vec![Value::Int(1)]];
        Ok(1)
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>, LibraryError> {
        Ok(std::mem::take(&mut self.rows))
    }
}

/// Probe with a fresh fake library for each of `backends`.
pub fn probe(backends: &[Backend]) -> StaticProbe {
    backends.iter().fold(StaticProbe::new(), |probe, backend| {
        probe.with(*backend, Arc::new(FakeLibrary::new()))
    })
}

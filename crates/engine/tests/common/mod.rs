//! In-memory stand-in for a database connection.
//!
//! Emulates the ledger table by matching the exact statements rendered by
//! `LedgerQueries`, records every statement it receives and every committed
//! script, and fails scripts containing a configured marker.

#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sqlshift_engine::backends::{MySqlDialect, PostgresDialect};
use sqlshift_engine::migrations::LedgerQueries;
use sqlshift_engine::{
    DatabasePool, DatabaseRow, DatabaseTransaction, DatabaseValue, MigrationError,
    MigrationResult, SqlDialect,
};

pub const TABLE: &str = "migrations";
pub const FAIL_MARKER: &str = "FAIL_HERE";

#[derive(Default)]
pub struct FakeState {
    pub table_created: bool,
    pub next_id: i64,
    pub rows: Vec<(i64, String)>,
    pub statements: Vec<String>,
    pub committed_scripts: Vec<String>,
    pub rolled_back_transactions: usize,
    pub closed: bool,
}

pub struct FakePool {
    dialect: Box<dyn SqlDialect>,
    queries: LedgerQueries,
    state: Arc<Mutex<FakeState>>,
}

impl FakePool {
    pub fn postgres() -> Self {
        Self::with_dialect(Box::new(PostgresDialect))
    }

    pub fn mysql() -> Self {
        Self::with_dialect(Box::new(MySqlDialect))
    }

    fn with_dialect(dialect: Box<dyn SqlDialect>) -> Self {
        let queries = LedgerQueries::new(dialect.as_ref(), TABLE);
        Self {
            dialect,
            queries,
            state: Arc::new(Mutex::new(FakeState {
                next_id: 1,
                ..FakeState::default()
            })),
        }
    }

    pub fn ledger_names(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut rows = state.rows.clone();
        rows.sort_by_key(|(id, _)| *id);
        rows.into_iter().map(|(_, name)| name).collect()
    }

    pub fn ledger_ids(&self) -> Vec<i64> {
        self.state.lock().unwrap().rows.iter().map(|(id, _)| *id).collect()
    }

    pub fn statements(&self) -> Vec<String> {
        self.state.lock().unwrap().statements.clone()
    }

    pub fn committed_scripts(&self) -> Vec<String> {
        self.state.lock().unwrap().committed_scripts.clone()
    }

    pub fn rolled_back_transactions(&self) -> usize {
        self.state.lock().unwrap().rolled_back_transactions
    }

    pub fn table_created(&self) -> bool {
        self.state.lock().unwrap().table_created
    }

    pub fn is_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    fn name_param(params: &[DatabaseValue]) -> MigrationResult<String> {
        params
            .first()
            .and_then(|p| p.as_str())
            .map(str::to_string)
            .ok_or_else(|| MigrationError::persistence("expected a name parameter"))
    }
}

#[async_trait]
impl DatabasePool for FakePool {
    fn dialect(&self) -> &dyn SqlDialect {
        self.dialect.as_ref()
    }

    async fn execute(&self, sql: &str, params: &[DatabaseValue]) -> MigrationResult<u64> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());

        if sql == self.queries.create_table {
            state.table_created = true;
            return Ok(0);
        }
        if !state.table_created {
            return Err(MigrationError::persistence("relation \"migrations\" does not exist"));
        }

        if sql == self.queries.insert {
            let name = Self::name_param(params)?;
            let id = state.next_id;
            state.next_id += 1;
            state.rows.push((id, name));
            Ok(1)
        } else if sql == self.queries.delete {
            let name = Self::name_param(params)?;
            let before = state.rows.len();
            state.rows.retain(|(_, n)| *n != name);
            Ok((before - state.rows.len()) as u64)
        } else {
            Err(MigrationError::persistence(format!("unexpected statement: {}", sql)))
        }
    }

    async fn fetch_all(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Vec<DatabaseRow>> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());
        if !state.table_created {
            return Err(MigrationError::persistence("relation \"migrations\" does not exist"));
        }

        let mut rows = state.rows.clone();
        if sql == self.queries.most_recent {
            let limit = params
                .first()
                .and_then(|p| p.as_i64())
                .ok_or_else(|| MigrationError::persistence("expected a limit parameter"))?;
            rows.sort_by_key(|(id, _)| std::cmp::Reverse(*id));
            Ok(rows
                .into_iter()
                .take(limit as usize)
                .map(|(_, name)| DatabaseRow::new(vec!["name".into()], vec![name.into()]))
                .collect())
        } else if sql == self.queries.list_all {
            rows.sort_by_key(|(id, _)| *id);
            Ok(rows
                .into_iter()
                .map(|(id, name)| {
                    DatabaseRow::new(
                        vec!["id".into(), "name".into(), "created_at".into()],
                        vec![id.into(), name.into(), "2024-01-01 00:00:00".into()],
                    )
                })
                .collect())
        } else {
            Err(MigrationError::persistence(format!("unexpected query: {}", sql)))
        }
    }

    async fn fetch_optional(
        &self,
        sql: &str,
        params: &[DatabaseValue],
    ) -> MigrationResult<Option<DatabaseRow>> {
        let mut state = self.state.lock().unwrap();
        state.statements.push(sql.to_string());
        if sql == self.queries.table_exists {
            return Ok(state
                .table_created
                .then(|| DatabaseRow::new(vec!["present".into()], vec![1i64.into()])));
        }
        if !state.table_created {
            return Err(MigrationError::persistence("relation \"migrations\" does not exist"));
        }
        if sql != self.queries.select_by_name {
            return Err(MigrationError::persistence(format!("unexpected query: {}", sql)));
        }

        let name = Self::name_param(params)?;
        Ok(state
            .rows
            .iter()
            .find(|(_, n)| *n == name)
            .map(|(_, n)| DatabaseRow::new(vec!["name".into()], vec![n.clone().into()])))
    }

    async fn begin_transaction(&self) -> MigrationResult<Box<dyn DatabaseTransaction>> {
        Ok(Box::new(FakeTransaction {
            state: Arc::clone(&self.state),
            pending: Vec::new(),
        }))
    }

    async fn close(&self) {
        self.state.lock().unwrap().closed = true;
    }
}

pub struct FakeTransaction {
    state: Arc<Mutex<FakeState>>,
    pending: Vec<String>,
}

#[async_trait]
impl DatabaseTransaction for FakeTransaction {
    async fn execute_batch(&mut self, sql: &str) -> MigrationResult<()> {
        if sql.contains(FAIL_MARKER) {
            return Err(MigrationError::persistence(format!(
                "syntax error at or near \"{}\"",
                FAIL_MARKER
            )));
        }
        self.pending.push(sql.to_string());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> MigrationResult<()> {
        let mut state = self.state.lock().unwrap();
        state.committed_scripts.extend(self.pending);
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MigrationResult<()> {
        self.state.lock().unwrap().rolled_back_transactions += 1;
        Ok(())
    }
}

/// Write `<root>/<name>/up.sql` and `down.sql`; `None` leaves a file out
pub fn write_migration(root: &Path, name: &str, up: Option<&str>, down: Option<&str>) {
    let dir = root.join(name);
    fs::create_dir_all(&dir).unwrap();
    if let Some(up) = up {
        fs::write(dir.join("up.sql"), up).unwrap();
    }
    if let Some(down) = down {
        fs::write(dir.join("down.sql"), down).unwrap();
    }
}

/// Write a migration creating and dropping a table named after its label
pub fn write_table_migration(root: &Path, name: &str) {
    let table = name.split_once('_').map(|(_, label)| label).unwrap_or(name);
    write_migration(
        root,
        name,
        Some(&format!("CREATE TABLE {} (id INT);", table)),
        Some(&format!("DROP TABLE {};", table)),
    );
}

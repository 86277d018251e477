use anyhow::Result;
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::models::report::{EvaluationRun, ScreenReport};
use crate::models::settings::EvaluatorSettings;

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = data_dir.join("sector_eval.db");
        let conn = Connection::open(db_path)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.conn();
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS settings (
                id TEXT PRIMARY KEY DEFAULT 'default',
                data TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS evaluation_runs (
                id TEXT PRIMARY KEY,
                created_at TEXT NOT NULL,
                request TEXT NOT NULL,
                flow_mode TEXT NOT NULL,
                evaluated INTEGER NOT NULL,
                top_results TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_runs_date ON evaluation_runs(created_at);
            ",
        )?;
        Ok(())
    }

    pub fn save_settings(&self, settings: &EvaluatorSettings) -> Result<()> {
        let conn = self.conn();
        let data = serde_json::to_string(settings)?;
        conn.execute(
            "INSERT OR REPLACE INTO settings (id, data, updated_at) VALUES ('default', ?1, datetime('now'))",
            rusqlite::params![data],
        )?;
        Ok(())
    }

    /// 首次运行写入默认值
    pub fn load_settings(&self) -> Result<EvaluatorSettings> {
        let conn = self.conn();
        let result = conn.query_row(
            "SELECT data FROM settings WHERE id = 'default'",
            [],
            |row| {
                let data: String = row.get(0)?;
                Ok(data)
            },
        );
        match result {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                let default = EvaluatorSettings::default();
                drop(conn);
                self.save_settings(&default)?;
                Ok(default)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// 记录一次批量评估（只保存排名靠前的结果）
    pub fn save_run(&self, report: &ScreenReport) -> Result<EvaluationRun> {
        let run = EvaluationRun {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            request: report.request.clone(),
            flow_mode: report.flow_mode,
            evaluated: report.evaluated,
            top: report.ranked.clone(),
        };
        let conn = self.conn();
        conn.execute(
            "INSERT INTO evaluation_runs (id, created_at, request, flow_mode, evaluated, top_results) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            rusqlite::params![
                run.id,
                run.created_at,
                serde_json::to_string(&run.request)?,
                serde_json::to_string(&run.flow_mode)?,
                run.evaluated as i64,
                serde_json::to_string(&run.top)?,
            ],
        )?;
        Ok(run)
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<EvaluationRun>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, created_at, request, flow_mode, evaluated, top_results FROM evaluation_runs ORDER BY created_at DESC, rowid DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(rusqlite::params![limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut results = Vec::new();
        for row in rows {
            let (id, created_at, request, flow_mode, evaluated, top) = row?;
            results.push(EvaluationRun {
                id,
                created_at,
                request: serde_json::from_str(&request)?,
                flow_mode: serde_json::from_str(&flow_mode)?,
                evaluated: evaluated.max(0) as usize,
                top: serde_json::from_str(&top)?,
            });
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::flow::FlowMode;
    use crate::models::report::ScreenRequest;

    fn report(concept: &str) -> ScreenReport {
        ScreenReport {
            request: ScreenRequest { boards: vec!["创业板".into()], concepts: vec![concept.into()], top_n: Some(5) },
            flow_mode: FlowMode::Proxy,
            universe_size: 600,
            evaluated: 598,
            unknown_boards: vec![],
            ranked: vec![],
            buy_list: vec![],
            sell_list: vec![],
            total_buy: 0,
            total_sell: 0,
            concept_ranking: None,
            as_of: None,
        }
    }

    #[test]
    fn test_settings_default_then_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();
        let loaded = db.load_settings().unwrap();
        assert_eq!(loaded, EvaluatorSettings::default());

        let custom = EvaluatorSettings { detailed_flow_limit: 200, ..EvaluatorSettings::default() };
        db.save_settings(&custom).unwrap();
        drop(db);

        let reopened = Database::new(dir.path()).unwrap();
        assert_eq!(reopened.load_settings().unwrap().detailed_flow_limit, 200);
    }

    #[test]
    fn test_runs_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path()).unwrap();
        let first = db.save_run(&report("AI")).unwrap();
        let second = db.save_run(&report("机器人")).unwrap();
        assert_ne!(first.id, second.id);

        let runs = db.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].request.concepts, vec!["机器人".to_string()]);
        assert_eq!(runs[0].flow_mode, FlowMode::Proxy);
        assert_eq!(runs[1].evaluated, 598);

        assert_eq!(db.recent_runs(1).unwrap().len(), 1);
    }
}

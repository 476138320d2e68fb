/// Execution context handed to every operator `run`
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::execution::monitoring::QueryMetrics;

#[derive(Clone)]
pub struct ExecContext {
    pub config: EngineConfig,
    pub metrics: Arc<QueryMetrics>,
}

impl ExecContext {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            metrics: Arc::new(QueryMetrics::new()),
        }
    }

    /// Worker count for an input of `rows` rows
    pub fn workers_for(&self, rows: usize) -> usize {
        self.config.workers_for(rows)
    }
}

/// Engine facade: relation catalog, configuration, query execution
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::execution::context::ExecContext;
use crate::execution::monitoring::MetricsSummary;
use crate::execution::operators::Operator;
use crate::query::parser;
use crate::query::plan::PlanNode;
use crate::query::planner;
use crate::storage::relation::{Relation, RelationId};

/// Result of one executed query
#[derive(Debug, Clone)]
pub struct QueryResult {
    /// Sums aligned with the query's projection order
    pub checksums: Vec<u64>,
    /// Number of rows feeding the checksums
    pub result_size: u64,
    /// Wall-clock execution time
    pub execution_time_ms: f64,
    /// Per-phase metrics snapshot
    pub metrics: MetricsSummary,
}

pub struct Engine {
    relations: Vec<Arc<Relation>>,
    config: EngineConfig,
    pool: rayon::ThreadPool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        config.validate()?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.worker_count)
            .build()
            .map_err(|e| EngineError::internal(format!("failed to build worker pool: {e}")))?;
        Ok(Self {
            relations: Vec::new(),
            config,
            pool,
        })
    }

    pub fn with_defaults() -> EngineResult<Self> {
        Self::new(EngineConfig::default())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Add a relation to the catalog, returning its id
    pub fn register_relation(&mut self, relation: Relation) -> RelationId {
        let id = self.relations.len() as RelationId;
        self.relations.push(Arc::new(relation));
        id
    }

    /// Load a relation from its binary file and register it
    pub fn load_relation(&mut self, path: &Path) -> EngineResult<RelationId> {
        let relation = Relation::load(path)?;
        info!(
            path = %path.display(),
            rows = relation.size(),
            columns = relation.column_count(),
            "loaded relation"
        );
        Ok(self.register_relation(relation))
    }

    pub fn relation(&self, id: RelationId) -> EngineResult<&Arc<Relation>> {
        self.relations
            .get(id as usize)
            .ok_or_else(|| EngineError::planning(format!("unknown relation {id}")))
    }

    /// Parse, plan, and execute one query in the text format
    pub fn execute(&self, text: &str) -> EngineResult<QueryResult> {
        let query = parser::parse_query(text)?;
        let plan = planner::build_plan(&query)?;
        self.execute_plan(&plan)
    }

    /// Execute a prebuilt plan tree rooted at a checksum node
    pub fn execute_plan(&self, plan: &PlanNode) -> EngineResult<QueryResult> {
        let mut root = planner::build_operators(plan, &self.relations)?;
        let ctx = ExecContext::new(self.config.clone());

        let started = Instant::now();
        self.pool.install(|| root.run(&ctx))?;
        let elapsed = started.elapsed();
        debug!(
            result_size = root.result_size(),
            elapsed_ms = elapsed.as_secs_f64() * 1e3,
            "query complete"
        );

        Ok(QueryResult {
            checksums: root.checksums().to_vec(),
            result_size: root.result_size(),
            execution_time_ms: elapsed.as_secs_f64() * 1e3,
            metrics: ctx.metrics.summary(),
        })
    }
}

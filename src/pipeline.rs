//! The four-stage pipeline: extract → load → transform → render.
//!
//! Stages run strictly in sequence, one run at a time. A single blanket
//! retry count from the configuration applies uniformly to every stage; a
//! stage that isolates its own failures (load, transform, render) only
//! counts as failed — and is retried — when nothing in it succeeded.

use crate::config::PipelineConfig;
use crate::error::{EltError, EltResult};
use crate::extract::{extract, Dataset};
use crate::load::{load, LoadReport};
use crate::render::{render_all, RenderReport};
use crate::store::Store;
use crate::transform::{run_queries, TransformReport};

use colored::Colorize;
use std::future::Future;
use std::time::Duration;

/// Counters for one completed run.
#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub tables_loaded: usize,
    pub tables_failed: usize,
    pub queries_ok: usize,
    pub queries_failed: usize,
    pub charts_written: usize,
    pub charts_failed: usize,
}

/// One configured pipeline run.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run all four stages.
    ///
    /// A failed extract batch degrades to an empty dataset after the
    /// retries are spent: the store keeps whatever the last successful load
    /// wrote, and the downstream stages still run against it.
    pub async fn run(&self) -> EltResult<PipelineSummary> {
        let store = self.connect().await?;
        let dataset = self.run_extract().await;
        let load_report = self.run_load(&dataset, &store).await?;
        let transform_report = self.run_transform(&store).await?;
        let render_report = self.run_render(&transform_report).await?;

        Ok(PipelineSummary {
            tables_loaded: load_report.loaded.len(),
            tables_failed: load_report.failed.len(),
            queries_ok: transform_report.results.len(),
            queries_failed: transform_report.failed.len(),
            charts_written: render_report.written.len(),
            charts_failed: render_report.failed.len(),
        })
    }

    /// Connect to the store, with the stage retry policy.
    pub async fn connect(&self) -> EltResult<Store> {
        let url = &self.config.database_url;
        self.with_retry("connect", move || Store::connect(url)).await
    }

    /// Extract stage. Degrades to an empty dataset on total failure.
    pub async fn run_extract(&self) -> Dataset {
        let config = &self.config;
        match self.with_retry("extract", move || extract(config)).await {
            Ok(dataset) => {
                println!("{} Extracted {} tables", "✓".green(), dataset.len());
                dataset
            }
            Err(e) => {
                println!("{} Extract failed, continuing with no data: {}", "✗".red(), e);
                Dataset::new()
            }
        }
    }

    /// Load stage.
    pub async fn run_load(&self, dataset: &Dataset, store: &Store) -> EltResult<LoadReport> {
        if dataset.is_empty() {
            println!("{} No data to load", "!".yellow());
            return Ok(LoadReport::default());
        }

        let report = self
            .with_retry("load", move || async move {
                let report = load(dataset, store).await;
                if report.loaded.is_empty() {
                    return Err(EltError::Database(format!(
                        "all {} tables failed to load",
                        report.failed.len()
                    )));
                }
                Ok(report)
            })
            .await?;

        for (table, count) in &report.loaded {
            println!("{} Loaded '{}' with {} rows", "✓".green(), table, count);
        }
        for (table, error) in &report.failed {
            println!("{} Failed to load '{}': {}", "✗".red(), table, error);
        }
        Ok(report)
    }

    /// Transform stage: the query catalog against the loaded store.
    pub async fn run_transform(&self, store: &Store) -> EltResult<TransformReport> {
        let config = &self.config;
        let report = self
            .with_retry("transform", move || async move {
                let report = run_queries(store, config).await;
                if report.results.is_empty() && !report.failed.is_empty() {
                    return Err(EltError::Database(format!(
                        "all {} catalog entries failed",
                        report.failed.len()
                    )));
                }
                Ok(report)
            })
            .await?;

        for result in &report.results {
            println!(
                "{} Query '{}' returned {} rows",
                "✓".green(),
                result.name,
                result.frame.len()
            );
        }
        for (name, error) in &report.failed {
            println!("{} Query '{}' failed: {}", "✗".red(), name, error);
        }
        Ok(report)
    }

    /// Render stage: one chart document per result.
    pub async fn run_render(&self, transform: &TransformReport) -> EltResult<RenderReport> {
        let charts_dir = &self.config.charts_dir;
        let year = self.config.holiday_year;
        let report = self
            .with_retry("render", move || async move {
                let report = render_all(transform, charts_dir, year);
                if report.written.is_empty() && !report.failed.is_empty() {
                    return Err(EltError::Database(format!(
                        "all {} charts failed to render",
                        report.failed.len()
                    )));
                }
                Ok(report)
            })
            .await?;

        for (name, path) in &report.written {
            println!("{} Chart '{}' written to {}", "✓".green(), name, path.display());
        }
        for (name, error) in &report.failed {
            println!("{} Chart '{}' failed: {}", "✗".red(), name, error);
        }
        Ok(report)
    }

    /// Run a stage, retrying after the configured delay.
    async fn with_retry<T, F, Fut>(&self, stage: &str, mut f: F) -> EltResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = EltResult<T>>,
    {
        let mut attempt = 0u32;
        loop {
            match f().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.config.retries => {
                    attempt += 1;
                    println!(
                        "{} Stage '{}' failed (attempt {}), retrying in {}s: {}",
                        "!".yellow(),
                        stage,
                        attempt,
                        self.config.retry_delay_secs,
                        e
                    );
                    tokio::time::sleep(Duration::from_secs(self.config.retry_delay_secs)).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn quick_config(retries: u32) -> PipelineConfig {
        PipelineConfig {
            retries,
            retry_delay_secs: 0,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_retry_stops_after_budget() {
        let pipeline = Pipeline::new(quick_config(2));
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result: EltResult<()> = pipeline
            .with_retry("extract", move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(EltError::Config("boom".into()))
            })
            .await;

        assert!(result.is_err());
        // First attempt plus two retries.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_first_success() {
        let pipeline = Pipeline::new(quick_config(3));
        let calls = AtomicU32::new(0);
        let calls = &calls;

        let result = pipeline
            .with_retry("load", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 1 {
                    Err(EltError::Config("transient".into()))
                } else {
                    Ok(n)
                }
            })
            .await
            .expect("should succeed on retry");

        assert_eq!(result, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_empty_dataset_loads_nothing() {
        let pipeline = Pipeline::new(quick_config(0));
        let store = Store::in_memory().await.expect("connect");
        let report = pipeline
            .run_load(&Dataset::new(), &store)
            .await
            .expect("empty load");
        assert!(report.loaded.is_empty());
        assert!(report.failed.is_empty());
    }
}

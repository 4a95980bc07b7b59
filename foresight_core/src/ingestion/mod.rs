//! Ingestion - populating the knowledge store from the web.
//!
//! For every relation the pipeline searches with the relation text, fetches each
//! URL found, cleans and chunks the page, and stores the chunks with provenance.
//! A bad relation or URL is logged, recorded in the [`IngestionReport`] and
//! skipped; the rest of the batch carries on.
//!
//! A batch runs in two passes: every relation is searched, then every
//! `(relation, url)` pair found is fetched and stored. Each pass is a single
//! stream capped at `concurrency`, so no more than that many requests are in
//! flight at once.

mod fetch;
mod report;
mod search;

pub use fetch::*;
pub use report::*;
pub use search::*;

use std::sync::Arc;

use event_graph::Relation;
use futures::stream::{self, StreamExt};
use tracing::{debug, info, warn};

use crate::config::ForesightConfig;
use crate::knowledge_base::{ChunkMetadata, Chunker, KnowledgeStore};
use crate::retry::RetryPolicy;

/// Search, fetch, clean, chunk, store.
pub struct IngestionPipeline {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    store: Arc<dyn KnowledgeStore>,
    chunker: Chunker,
    max_urls_per_relation: usize,
    concurrency: usize,
    retry: RetryPolicy,
}

impl IngestionPipeline {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self::from_config(&ForesightConfig::default(), search, fetcher, store)
    }

    pub fn from_config(
        config: &ForesightConfig,
        search: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
        store: Arc<dyn KnowledgeStore>,
    ) -> Self {
        Self {
            search,
            fetcher,
            store,
            chunker: Chunker::from_config(&config.chunking),
            max_urls_per_relation: config.ingestion.max_urls_per_relation,
            concurrency: config.ingestion.concurrency.max(1),
            retry: config.retry.policy(),
        }
    }

    pub fn with_chunker(mut self, chunker: Chunker) -> Self {
        self.chunker = chunker;
        self
    }

    pub fn with_max_urls(mut self, max_urls: usize) -> Self {
        self.max_urls_per_relation = max_urls;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Policy for store writes, which embed and may hit a transient failure.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Ingest a batch of relations. Never fails as a whole.
    pub async fn ingest(&self, relations: &[Relation]) -> IngestionReport {
        let mut report = IngestionReport {
            relations_processed: relations.len(),
            ..IngestionReport::default()
        };

        let searched: Vec<_> = stream::iter(relations)
            .map(|relation| async move { (relation, self.find_sources(relation).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut sources = Vec::new();
        for (relation, found) in searched {
            match found {
                Ok(urls) => sources.extend(urls.into_iter().map(|url| (relation, url))),
                Err(failure) => report.failures.push(failure),
            }
        }

        let outcomes: Vec<_> = stream::iter(sources)
            .map(|(relation, url)| async move {
                let outcome = self.ingest_source(relation, relation.text.trim(), &url).await;
                (relation, url, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (relation, url, outcome) in outcomes {
            match outcome {
                Ok(chunks) => {
                    report.sources_stored += 1;
                    report.chunks_stored += chunks;
                }
                Err((stage, message)) => report.failures.push(skip(relation, Some(url), stage, message)),
            }
        }

        info!(
            relations = report.relations_processed,
            sources = report.sources_stored,
            chunks = report.chunks_stored,
            failures = report.failures.len(),
            "ingestion finished"
        );
        report
    }

    /// Ingest the sources found for a single relation.
    pub async fn ingest_relation(&self, relation: &Relation) -> IngestionReport {
        self.ingest(std::slice::from_ref(relation)).await
    }

    /// Deduplicated URLs for `relation`, or the Search-stage failure.
    async fn find_sources(&self, relation: &Relation) -> Result<Vec<String>, IngestionItemError> {
        let query = relation.text.trim();
        if query.is_empty() {
            return Err(skip(relation, None, IngestionStage::Search, "relation has no text"));
        }

        let urls = match self.search.find_urls(query, self.max_urls_per_relation).await {
            Ok(urls) => dedup_urls(urls, self.max_urls_per_relation),
            Err(e) => return Err(skip(relation, None, IngestionStage::Search, e.to_string())),
        };
        if urls.is_empty() {
            return Err(skip(relation, None, IngestionStage::Search, "search returned no URLs"));
        }
        debug!(relation_id = %relation.id, urls = urls.len(), "sources found");
        Ok(urls)
    }

    /// Returns the number of chunks stored from `url`.
    async fn ingest_source(
        &self,
        relation: &Relation,
        query: &str,
        url: &str,
    ) -> Result<usize, (IngestionStage, String)> {
        let html = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| (IngestionStage::Fetch, e.to_string()))?;

        let text = extract_main_text(&html);
        let chunks = self.chunker.split(&text);
        if chunks.is_empty() {
            return Err((IngestionStage::Extract, "page has no text content".to_string()));
        }

        let base = ChunkMetadata::for_relation(relation, query).with_source_url(url);
        let metadatas: Vec<ChunkMetadata> = (0..chunks.len())
            .map(|i| base.clone().with_chunk_index(i))
            .collect();

        self.retry
            .run("store.add", || self.store.add(&chunks, &metadatas))
            .await
            .map_err(|exhausted| {
                (
                    IngestionStage::Store,
                    format!("{} (after {} attempts)", exhausted.error, exhausted.attempts),
                )
            })?;

        debug!(relation_id = %relation.id, url, chunks = chunks.len(), "source stored");
        Ok(chunks.len())
    }
}

fn skip(
    relation: &Relation,
    url: Option<String>,
    stage: IngestionStage,
    message: impl Into<String>,
) -> IngestionItemError {
    let error = IngestionItemError {
        relation_id: relation.id,
        url,
        stage,
        message: message.into(),
    };
    warn!(
        relation_id = %error.relation_id,
        url = error.url.as_deref().unwrap_or("-"),
        stage = %error.stage,
        error = %error.message,
        "skipping ingestion item"
    );
    error
}

/// Drop blank and repeated URLs, keeping the provider's order, and cap the count.
fn dedup_urls(urls: Vec<String>, limit: usize) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .take(limit)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge_base::{HashingEmbedder, InMemoryKnowledgeStore};
    use crate::testing::{StaticFetcher, StaticSearch};
    use async_trait::async_trait;
    use event_graph::StakeholderId;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves every URL after a short delay, recording the peak number of
    /// fetches running at once.
    #[derive(Default)]
    struct CountingFetcher {
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl PageFetcher for CountingFetcher {
        async fn fetch(&self, url: &str) -> Result<String, FetchError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            Ok(format!("<p>Report from {url}</p>"))
        }
    }

    fn relation(text: &str) -> Relation {
        Relation::new(text, StakeholderId::new(), StakeholderId::new())
    }

    fn store() -> Arc<InMemoryKnowledgeStore> {
        Arc::new(InMemoryKnowledgeStore::new(Arc::new(HashingEmbedder::new(64))))
    }

    #[test]
    fn test_dedup_urls() {
        let urls = vec![
            "https://a".to_string(),
            " https://a ".to_string(),
            "".to_string(),
            "https://b".to_string(),
            "https://c".to_string(),
        ];
        assert_eq!(dedup_urls(urls, 2), vec!["https://a", "https://b"]);
    }

    #[tokio::test]
    async fn test_ingest_stores_chunks_with_metadata() {
        let rel = relation("Germany and Russia gas trade");
        let search = StaticSearch::new().with_results(&rel.text, ["https://news.example/1"]);
        let fetcher = StaticFetcher::new().with_page(
            "https://news.example/1",
            "<html><body><nav>menu</nav><p>Gas flows through Nord Stream.</p></body></html>",
        );
        let store = store();
        let pipeline = IngestionPipeline::new(Arc::new(search), Arc::new(fetcher), store.clone());

        let report = pipeline.ingest(std::slice::from_ref(&rel)).await;

        assert_eq!(report.relations_processed, 1);
        assert_eq!(report.sources_stored, 1);
        assert_eq!(report.chunks_stored, 1);
        assert!(report.is_clean());

        let stored = store.chunks().await;
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].0, "Gas flows through Nord Stream.");
        assert_eq!(stored[0].1.relation_id, rel.id);
        assert_eq!(stored[0].1.stakeholder_a, rel.stakeholder_a);
        assert_eq!(stored[0].1.original_query, rel.text);
        assert_eq!(stored[0].1.source_url.as_deref(), Some("https://news.example/1"));
    }

    #[tokio::test]
    async fn test_bad_sources_are_skipped() {
        let rel = relation("sanctions");
        let search = StaticSearch::new().with_results(
            "sanctions",
            ["https://ok.example", "https://down.example", "https://empty.example"],
        );
        let fetcher = StaticFetcher::new()
            .with_page("https://ok.example", "<p>Sanctions were extended.</p>")
            .with_page("https://empty.example", "<script>only()</script>");
        let store = store();
        let pipeline = IngestionPipeline::new(Arc::new(search), Arc::new(fetcher), store.clone());

        let report = pipeline.ingest(&[rel]).await;

        assert_eq!(report.sources_stored, 1);
        assert_eq!(report.chunks_stored, 1);
        assert_eq!(report.failures_at(IngestionStage::Fetch).count(), 1);
        assert_eq!(report.failures_at(IngestionStage::Extract).count(), 1);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_long_page_chunk_metadata_is_duplicated() {
        let rel = relation("long read");
        let body = format!("<p>{}</p>", "word ".repeat(200));
        let search = StaticSearch::new().with_results("long read", ["https://long.example"]);
        let fetcher = StaticFetcher::new().with_page("https://long.example", &body);
        let store = store();
        let pipeline = IngestionPipeline::new(Arc::new(search), Arc::new(fetcher), store.clone())
            .with_chunker(Chunker::new(400, 20));

        let report = pipeline.ingest(&[rel.clone()]).await;

        // 999 characters after whitespace collapse: windows start at 0, 380, 760
        assert_eq!(report.chunks_stored, 3);
        let stored = store.chunks().await;
        let indexes: Vec<_> = stored.iter().map(|(_, m)| m.chunk_index).collect();
        assert_eq!(indexes, vec![0, 1, 2]);
        assert!(stored.iter().all(|(_, m)| m.relation_id == rel.id));
    }

    #[tokio::test]
    async fn test_max_urls_caps_fetches() {
        let rel = relation("capped");
        let search = StaticSearch::new().with_results(
            "capped",
            ["https://1.example", "https://2.example", "https://3.example"],
        );
        let fetcher = StaticFetcher::new()
            .with_page("https://1.example", "<p>one</p>")
            .with_page("https://2.example", "<p>two</p>")
            .with_page("https://3.example", "<p>three</p>");
        let pipeline = IngestionPipeline::new(Arc::new(search), Arc::new(fetcher), store()).with_max_urls(2);

        let report = pipeline.ingest(&[rel]).await;
        assert_eq!(report.sources_stored, 2);
    }

    #[tokio::test]
    async fn test_search_failure_skips_only_that_relation() {
        let failing = relation("Black Sea grain corridor");
        let healthy = relation("Baltic pipeline sabotage");
        let search = StaticSearch::new()
            .with_failure(&failing.text, SearchError::Timeout)
            .with_results(&healthy.text, ["https://baltic.example/1", "https://baltic.example/2"]);
        let fetcher = StaticFetcher::new()
            .with_page("https://baltic.example/1", "<p>Divers inspected the damaged pipe.</p>")
            .with_page("https://baltic.example/2", "<p>Gas pressure dropped overnight.</p>");
        let store = store();
        let pipeline = IngestionPipeline::new(Arc::new(search), Arc::new(fetcher), store.clone());

        let report = pipeline.ingest(&[failing.clone(), healthy.clone()]).await;

        assert_eq!(report.relations_processed, 2);
        assert_eq!(report.sources_stored, 2);
        assert_eq!(report.chunks_stored, 2);
        assert_eq!(report.failures.len(), 1);
        let failure = &report.failures[0];
        assert_eq!(failure.stage, IngestionStage::Search);
        assert_eq!(failure.relation_id, failing.id);
        assert_eq!(failure.url, None);
        assert_eq!(failure.message, "request timed out");

        let stored = store.chunks().await;
        assert_eq!(stored.len(), 2);
        assert!(stored.iter().all(|(_, m)| m.relation_id == healthy.id));
    }

    #[tokio::test]
    async fn test_concurrency_caps_the_whole_batch() {
        let relations: Vec<Relation> = (0..4).map(|i| relation(&format!("relation {i}"))).collect();
        let mut search = StaticSearch::new();
        for (i, rel) in relations.iter().enumerate() {
            let urls: Vec<String> = (0..4).map(|j| format!("https://{i}-{j}.example")).collect();
            search = search.with_results(&rel.text, urls);
        }
        let fetcher = Arc::new(CountingFetcher::default());
        let pipeline =
            IngestionPipeline::new(Arc::new(search), fetcher.clone(), store()).with_concurrency(2);

        let report = pipeline.ingest(&relations).await;

        assert_eq!(report.sources_stored, 16);
        assert!(report.is_clean());
        assert!(fetcher.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_ingest_relation_reports_one_relation() {
        let rel = relation("   ");
        let pipeline = IngestionPipeline::new(
            Arc::new(StaticSearch::new()),
            Arc::new(StaticFetcher::new()),
            store(),
        );

        let report = pipeline.ingest_relation(&rel).await;

        assert_eq!(report.relations_processed, 1);
        assert_eq!(report.failures_at(IngestionStage::Search).count(), 1);
    }
}

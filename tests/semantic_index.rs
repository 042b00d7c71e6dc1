//! Index build, persistence and retrieval with the offline hash provider

use approx::assert_relative_eq;
use async_trait::async_trait;
use dbot_rs::config::ChunkingConfig;
use dbot_rs::ml::{
    Embedding, EmbeddingConfig, EmbeddingProvider, HashEmbedding, IndexBuilder, ProviderKind, SearchConfig,
};
use dbot_rs::text::ChunkingStrategy;
use dbot_rs::{Config, DbotError, IndexKind, IndexStore, Indexer, Retriever, SnapshotStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const DIMENSION: usize = 512;

fn sentence_builder(chunk_size: usize) -> IndexBuilder {
    let chunking = ChunkingConfig {
        chunk_size,
        overlap: 0,
        strategy: ChunkingStrategy::Separator {
            separator: ".".to_string(),
        },
    };
    IndexBuilder::new(
        Arc::new(HashEmbedding::new(DIMENSION)),
        chunking,
        &EmbeddingConfig::hash(DIMENSION),
        SearchConfig::default(),
    )
    .unwrap()
}

/// Hash embeddings that fail from the `fail_from`-th request on
struct FlakyEmbedding {
    inner: HashEmbedding,
    calls: AtomicUsize,
    fail_from: usize,
}

impl FlakyEmbedding {
    fn new(fail_from: usize) -> Self {
        Self {
            inner: HashEmbedding::new(DIMENSION),
            calls: AtomicUsize::new(0),
            fail_from,
        }
    }
}

#[async_trait]
impl EmbeddingProvider for FlakyEmbedding {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Hash
    }

    fn model_name(&self) -> &str {
        "hash"
    }

    fn dimension(&self) -> Option<usize> {
        Some(DIMENSION)
    }

    async fn embed_batch(&self, texts: &[String]) -> dbot_rs::Result<Vec<Embedding>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call >= self.fail_from {
            return Err(DbotError::EmbeddingProvider("rate limited".to_string()));
        }
        self.inner.embed_batch(texts).await
    }
}

fn large_snapshot() -> String {
    let mut snapshot = String::from("-- Schema: sales\n\n-- Tables\n");
    for i in 0..80 {
        snapshot.push_str(&format!("CREATE TABLE sales.t{} (id int NOT NULL, note text);\n", i));
    }
    snapshot
}

fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.base_dir = dir.path().join("db");
    config.storage.documents_dir = dir.path().join("pdf");
    config.embedding = EmbeddingConfig::hash(DIMENSION);
    // one paragraph per chunk
    config.document_chunking = ChunkingConfig {
        chunk_size: 80,
        overlap: 10,
        strategy: ChunkingStrategy::recursive_default(),
    };
    config
}

fn indexer(dir: &TempDir) -> Indexer {
    Indexer::with_provider(test_config(dir), Arc::new(HashEmbedding::new(DIMENSION)))
}

#[tokio::test]
async fn test_two_sentence_chunks_and_nearest_neighbor() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let store = IndexStore::new(dir.path());

    let index = sentence_builder(4).build("abc", "A. B. C.", None).await?;
    let texts: Vec<&str> = index.chunks().iter().map(|c| c.text.as_str()).collect();
    assert_eq!(texts, vec!["A. B", " C"]);

    store.save(&index)?;
    let loaded = store.load("abc")?;
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded.structure().len(), 2);

    let query = loaded.embedding(1).cloned().ok_or("missing embedding")?;
    let results = loaded.search(&query, 1)?;
    assert_eq!(results[0].chunk.id, 1);
    assert_relative_eq!(results[0].distance, 0.0, epsilon = 1e-5);
    Ok(())
}

#[tokio::test]
async fn test_exists_requires_both_artifacts() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let store = IndexStore::new(dir.path());
    let index = sentence_builder(4).build("abc", "A. B. C.", None).await?;

    for remove_structure in [true, false] {
        let paths = store.save(&index)?;
        assert!(store.exists("abc"));

        let removed = if remove_structure { &paths.structure } else { &paths.metadata };
        std::fs::remove_file(removed)?;
        assert!(!store.exists("abc"));

        let err = store.load("abc").unwrap_err();
        assert!(matches!(err, DbotError::NotFound(_)), "unexpected {err}");
    }
    Ok(())
}

#[tokio::test]
async fn test_pair_from_different_builds_is_corrupt() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let store = IndexStore::new(dir.path());

    store.save(&sentence_builder(4).build("abc", "A. B. C.", None).await?)?;
    let other = store.save(&sentence_builder(4).build("xyz", "X. Y. Z. W.", None).await?)?;

    let target = store.paths("abc")?;
    std::fs::copy(&other.structure, &target.structure)?;

    assert!(!store.exists("abc"));
    assert!(matches!(store.load("abc"), Err(DbotError::CorruptArtifact(_))));
    Ok(())
}

#[tokio::test]
async fn test_rebuild_replaces_previous_pair() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let store = IndexStore::new(dir.path());

    let first = sentence_builder(4).build("abc", "A. B. C.", None).await?;
    store.save(&first)?;
    let second = sentence_builder(100).build("abc", "A. B. C.", None).await?;
    store.save(&second)?;

    let loaded = store.load("abc")?;
    assert_eq!(loaded.build_id(), second.build_id());
    assert_eq!(loaded.len(), 1);

    let leftovers: Vec<_> = std::fs::read_dir(dir.path())?
        .filter_map(|e| e.ok())
        .filter(|e| e.path().extension().is_some_and(|ext| ext == "tmp"))
        .collect();
    assert!(leftovers.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_schema_index_from_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let indexer = indexer(&dir);

    let err = indexer.index_snapshot("shop").await.unwrap_err();
    assert!(err.is_not_found());

    SnapshotStore::new(dir.path().join("db")).save("shop", &large_snapshot())?;

    let index = indexer.index_snapshot("shop").await?;
    assert!(index.len() > 1);
    assert!(index.chunks().iter().all(|c| c.text.chars().count() <= 1500));
    assert!(indexer.exists(IndexKind::Schema, "shop"));
    assert!(dir.path().join("db").join("shop.idx").is_file());
    assert!(dir.path().join("db").join("shop.meta.json").is_file());

    let mut retriever = indexer.retriever(IndexKind::Schema, "shop")?;
    let results = retriever.search("CREATE TABLE sales.t42", 2).await?;
    assert_eq!(results.len(), 2);
    assert!(results.windows(2).all(|w| w[0].distance <= w[1].distance));
    Ok(())
}

#[tokio::test]
async fn test_document_index_and_retriever() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let indexer = indexer(&dir);

    let path = dir.path().join("returns-policy.md");
    let mut body = String::new();
    for i in 0..30 {
        body.push_str(&format!("Paragraph {} covers shipping rules for region {}.\n\n", i, i));
    }
    body.push_str("Refunds are issued to the original payment method within ten days.\n");
    std::fs::write(&path, body)?;

    let index = indexer.index_document(&path, None).await?;
    assert_eq!(index.name(), "returns-policy");
    assert!(index.len() > 1);
    assert!(dir.path().join("pdf").join("returns-policy.idx").is_file());

    let provider: Arc<dyn EmbeddingProvider> = Arc::new(HashEmbedding::new(DIMENSION));
    let mut retriever = Retriever::new(indexer.load(IndexKind::Document, "returns-policy")?, provider)?;
    let context = retriever.context("refunds original payment method", 1).await?;
    assert_eq!(context, "Refunds are issued to the original payment method within ten days.");
    Ok(())
}

#[tokio::test]
async fn test_unsupported_document_is_rejected() {
    let dir = TempDir::new().unwrap();
    let indexer = indexer(&dir);
    let path = dir.path().join("image.png");
    std::fs::write(&path, [0u8, 1, 2]).unwrap();

    let err = indexer.index_document(&path, None).await.unwrap_err();
    assert!(matches!(err, DbotError::Document(_)));
}

#[tokio::test]
async fn test_failed_batch_aborts_build() -> Result<(), Box<dyn std::error::Error>> {
    let dir = TempDir::new()?;
    let snapshots = SnapshotStore::new(dir.path().join("db"));
    snapshots.save("shop", &large_snapshot())?;
    snapshots.save("fresh", &large_snapshot())?;

    let healthy = indexer(&dir);
    let previous = healthy.index_snapshot("shop").await?;

    let mut config = test_config(&dir);
    config.embedding.batch_size = 1;
    config.embedding.concurrency = 1;
    let flaky = Indexer::with_provider(config, Arc::new(FlakyEmbedding::new(2)));

    let err = flaky.index_snapshot("fresh").await.unwrap_err();
    assert!(matches!(err, DbotError::EmbeddingProvider(_)), "unexpected {err}");
    assert!(!flaky.exists(IndexKind::Schema, "fresh"));

    let err = flaky.index_snapshot("shop").await.unwrap_err();
    assert!(matches!(err, DbotError::EmbeddingProvider(_)), "unexpected {err}");
    assert!(flaky.exists(IndexKind::Schema, "shop"));
    let reloaded = flaky.load(IndexKind::Schema, "shop")?;
    assert_eq!(reloaded.build_id(), previous.build_id());
    Ok(())
}

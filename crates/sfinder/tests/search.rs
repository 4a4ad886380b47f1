//! End-to-end runs of the layered search

use sfinder::cell_graph::MemoryCache;
use sfinder::search::SharedBuffer;
use sfinder::{
    CellGraph, CellGraphComputer, Prover, Reporter, Result, SearchConfig, SearchEngine,
    SearchError, SearchMode, SearchStatus, SearchSummary,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn small() -> SearchConfig {
    SearchConfig {
        max_clauses: 2,
        max_literals_per_clause: 2,
        max_k: 0,
        ..SearchConfig::default()
    }
}

fn run(config: SearchConfig) -> (SearchSummary, String) {
    let buffer = SharedBuffer::new();
    let summary = SearchEngine::builder(config)
        .build(Reporter::new(Box::new(buffer.clone())))
        .unwrap()
        .run()
        .unwrap();
    (summary, buffer.contents())
}

fn candidates(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|l| !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

/// Candidates grouped by the layer that printed them
fn layers(output: &str) -> Vec<Vec<String>> {
    let mut layers = Vec::new();
    let mut current = Vec::new();
    for line in output.lines() {
        if line.starts_with("# finished layer") {
            layers.push(std::mem::take(&mut current));
        } else if !line.starts_with('#') {
            current.push(line.to_string());
        }
    }
    layers
}

#[test]
fn test_first_layer_lists_every_single_literal_sentence_once() {
    let config = SearchConfig {
        max_overall_literals: Some(1),
        ..small()
    };
    let (summary, output) = run(config);
    assert_eq!(summary.status, SearchStatus::Exhausted);
    assert_eq!(summary.last_layer, 1);
    assert_eq!(
        candidates(&output),
        vec![
            "(E x B0(x,x))",
            "(E x E y B0(x,y))",
            "(E x U0(x))",
            "(E x V y B0(x,y))",
            "(V x B0(x,x))",
            "(V x E y B0(x,y))",
            "(V x U0(x))",
            "(V x V y B0(x,y))",
        ]
    );
    assert!(output.starts_with("# starting search with setup: {"));
    assert!(output.contains("# ending with 8 in "));
    assert!(output.ends_with("# the search has ended!\n"));
}

#[test]
fn test_every_candidate_is_unique_across_layers() {
    let (summary, output) = run(small());
    let found = candidates(&output);
    assert_eq!(found.len(), summary.emitted);
    let mut unique = found.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), found.len());
    for layer in layers(&output) {
        let mut sorted = layer.clone();
        sorted.sort();
        assert_eq!(sorted, layer, "layers print in ultra-canonical order");
    }
}

#[test]
fn test_thread_count_does_not_change_the_output() {
    let config = |threads| SearchConfig {
        max_k: 1,
        threads: Some(threads),
        ..small()
    };
    let (_, single) = run(config(1));
    let (_, parallel) = run(config(4));
    assert_eq!(candidates(&single), candidates(&parallel));
}

#[test]
fn test_depth_first_finds_the_sentences_of_the_layers() {
    let config = |mode| SearchConfig {
        mode,
        max_overall_literals: Some(2),
        ..small()
    };
    let (bfs, layered) = run(config(SearchMode::Bfs));
    let (dfs, output) = run(config(SearchMode::Dfs));
    assert_eq!(dfs.status, SearchStatus::Exhausted);
    assert_eq!(dfs.emitted, bfs.emitted);
    let mut expected = candidates(&layered);
    let mut found = candidates(&output);
    // the first sentence opened is the empty one, whose children are the
    // single-clause sentences
    let first_block: Vec<&str> = output
        .lines()
        .skip_while(|l| l.starts_with('#'))
        .take_while(|l| !l.starts_with('#'))
        .collect();
    let mut sorted = first_block.clone();
    sorted.sort();
    assert_eq!(sorted, first_block);
    expected.sort();
    found.sort();
    assert_eq!(found, expected);
    assert!(!output.contains("# finished layer"));
}

#[test]
fn test_seeded_search_extends_the_seed() {
    let config = SearchConfig {
        seed: Some("(V x E y B0(x,y))".to_string()),
        max_overall_literals: Some(2),
        ..small()
    };
    let (summary, output) = run(config);
    assert!(output.contains("# seeds follow\n(V x E y B0(x,y))\n# end of seeds\n"));
    let found: Vec<String> = candidates(&output)
        .into_iter()
        .filter(|l| *l != "(V x E y B0(x,y))")
        .collect();
    assert_eq!(found.len(), summary.emitted);
    assert!(found.iter().all(|s| s.contains(" & ")), "{found:?}");
}

#[test]
fn test_invalid_seed_aborts() {
    let config = SearchConfig {
        seed: Some("(V x U7(x))".to_string()),
        ..small()
    };
    let result = SearchEngine::builder(config)
        .build(Reporter::new(Box::new(std::io::sink())))
        .unwrap()
        .run();
    assert!(matches!(result, Err(SearchError::Seed(_))));
}

#[test]
fn test_invalid_config_is_rejected_before_the_search() {
    let config = SearchConfig {
        variables: 3,
        ..small()
    };
    let result = SearchEngine::builder(config).build(Reporter::new(Box::new(std::io::sink())));
    assert!(matches!(result, Err(SearchError::Config(_))));
}

/// Treats every conjunction of two or more formulas as refutable
#[derive(Default)]
struct ConjunctionRefuter {
    calls: AtomicUsize,
}

impl Prover for ConjunctionRefuter {
    fn name(&self) -> &str {
        "conjunction-refuter"
    }

    fn is_provable(&self, formulas: &str) -> Result<bool> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        Ok(formulas.lines().count() >= 2)
    }
}

#[test]
fn test_contradictions_are_dropped() {
    let prover = Arc::new(ConjunctionRefuter::default());
    let buffer = SharedBuffer::new();
    let summary = SearchEngine::builder(small())
        .prover(Arc::clone(&prover) as Arc<dyn Prover>)
        .build(Reporter::new(Box::new(buffer.clone())))
        .unwrap()
        .run()
        .unwrap();
    let found = candidates(&buffer.contents());
    assert!(summary.emitted > 0);
    assert!(found.iter().all(|s| !s.contains(" & ")), "{found:?}");
    assert!(prover.calls.load(Ordering::Relaxed) > 0);
}

/// One graph per clause count, so sentences only differ by their size
#[derive(Default)]
struct ClauseCountGraphs {
    calls: AtomicUsize,
}

impl CellGraphComputer for ClauseCountGraphs {
    fn name(&self) -> &str {
        "clause-count"
    }

    fn compute(&self, sentences: &[String]) -> Result<Vec<CellGraph>> {
        self.calls.fetch_add(1, Ordering::Relaxed);
        sentences
            .iter()
            .map(|s| CellGraph::parse(&format!("W({}, g0), G(g0)", s.split(" & ").count())))
            .collect()
    }
}

struct FailingGraphs;

impl CellGraphComputer for FailingGraphs {
    fn name(&self) -> &str {
        "failing"
    }

    fn compute(&self, _sentences: &[String]) -> Result<Vec<CellGraph>> {
        Err(SearchError::CellGraph("tool unavailable".to_string()))
    }
}

struct ShortBatch;

impl CellGraphComputer for ShortBatch {
    fn name(&self) -> &str {
        "short"
    }

    fn compute(&self, _sentences: &[String]) -> Result<Vec<CellGraph>> {
        Ok(Vec::new())
    }
}

fn run_with_graphs(
    config: SearchConfig,
    computer: Arc<dyn CellGraphComputer>,
    cache: Option<Arc<MemoryCache>>,
) -> Result<String> {
    let buffer = SharedBuffer::new();
    let mut builder = SearchEngine::builder(config).cell_graphs(computer);
    if let Some(cache) = cache {
        builder = builder.cache(cache);
    }
    builder
        .build(Reporter::new(Box::new(buffer.clone())))?
        .run()?;
    Ok(buffer.contents())
}

#[test]
fn test_isomorphic_cell_graphs_keep_the_smallest_sentence() {
    let config = SearchConfig {
        max_overall_literals: Some(2),
        ..small()
    };
    let output = run_with_graphs(config, Arc::new(ClauseCountGraphs::default()), None).unwrap();
    let layers = layers(&output);
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[0], vec!["(E x B0(x,x))"]);
    // single clauses of two literals repeat the graph of layer one
    assert!(layers[1].len() <= 1);
    assert!(layers[1].iter().all(|s| s.contains(" & ")));
}

#[test]
fn test_canonical_cell_graphs_hide_like_isomorphism() {
    let config = SearchConfig {
        max_overall_literals: Some(2),
        ..small()
    };
    let isomorphic =
        run_with_graphs(config.clone(), Arc::new(ClauseCountGraphs::default()), None).unwrap();
    let canonical = run_with_graphs(
        SearchConfig {
            canonical_cell_graphs: true,
            ..config
        },
        Arc::new(ClauseCountGraphs::default()),
        None,
    )
    .unwrap();
    assert_eq!(candidates(&canonical), candidates(&isomorphic));
    assert_eq!(layers(&canonical)[0], vec!["(E x B0(x,x))"]);
}

#[test]
fn test_cached_cell_graphs_skip_the_tool() {
    let config = SearchConfig {
        max_overall_literals: Some(2),
        ..small()
    };
    let cache = Arc::new(MemoryCache::new());
    let computer = Arc::new(ClauseCountGraphs::default());
    let first = run_with_graphs(
        config.clone(),
        Arc::clone(&computer) as Arc<dyn CellGraphComputer>,
        Some(Arc::clone(&cache)),
    )
    .unwrap();
    assert!(computer.calls.load(Ordering::Relaxed) > 0);
    assert!(!cache.is_empty());

    let second = run_with_graphs(config, Arc::new(FailingGraphs), Some(cache)).unwrap();
    assert_eq!(candidates(&first), candidates(&second));
}

#[test]
fn test_tool_errors_abort_the_search() {
    let config = SearchConfig {
        max_overall_literals: Some(1),
        ..small()
    };
    assert!(matches!(
        run_with_graphs(config.clone(), Arc::new(FailingGraphs), None),
        Err(SearchError::CellGraph(_))
    ));
    assert!(matches!(
        run_with_graphs(config, Arc::new(ShortBatch), None),
        Err(SearchError::CellGraphBatch { expected: 8, received: 0 })
    ));
}

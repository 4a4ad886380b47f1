//! The sentence search
//!
//! Layer `n` holds the sentences with exactly `n` literals beyond the seed.
//! It is built from the layers below by appending basis clauses, then
//! deduplicated by ultra-canonical form, filtered, stored as the frontier
//! for the next layers, and finally printed without the sentences the hide
//! filters and the cell-graph registry hold back.
//!
//! The depth-first mode runs the same steps on the children of a single
//! sentence at a time and keeps a closed list instead of layers.

use super::reporter::{
    Reporter, ENDED, ENDED_ON_TIME_LIMIT, FIELD_DELIMITER, NO_CELL_GRAPH, SETUP_PREFIX,
};
use super::resume::StatesLog;
use crate::cell_graph::{cache, CellGraph, CellGraphCache, CellGraphComputer, CellGraphRegistry, JuliaComputer};
use crate::config::{SearchConfig, SearchMode};
use crate::error::{Result, SearchError};
use crate::fol::{ClauseId, ClauseStore, Interner, LiteralStore, QuantifierLattice, Vocabulary};
use crate::generating::{
    joinable, ClauseBasis, ClauseFilter, ClauseGenerator, ConnectedComponentsFilter,
    ContradictionFilter, DisjunctiveClausesFilter, ForbiddenTuples, JoiningFilter,
    LanguageBiasFilter, MaxClausesFilter, MaxCountingClausesFilter, MaxLiteralsFilter,
    MaxLiteralsPerCountingClauseFilter, MaxOverallLiteralsFilter, NaiveTautologyFilter,
    ReflexiveAtomsFilter, SentenceFilter, TautologyFilter, ThetaSubsumptionFilter,
    TrivialConstraintsFilter, TupleFilter, TwoFormulaeFilter,
};
use crate::matching::{Matcher, Matching};
use crate::prover::{self, Prover};
use crate::sentence::{Canonicalizer, Sentence};
use dashmap::DashMap;
use rayon::prelude::*;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// How a search run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchStatus {
    /// Every layer up to the literal bound was explored, or nothing was
    /// left to extend
    Exhausted,
    /// The wall-clock budget ran out
    TimeLimit,
}

impl fmt::Display for SearchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStatus::Exhausted => write!(f, "{ENDED}"),
            SearchStatus::TimeLimit => write!(f, "{ENDED_ON_TIME_LIMIT}"),
        }
    }
}

/// Outcome of [`SearchEngine::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSummary {
    pub status: SearchStatus,
    /// The last completed layer; depth-first runs report the largest
    /// literal count they reached
    pub last_layer: usize,
    /// Sentences printed over all layers of this run
    pub emitted: usize,
    pub elapsed: Duration,
}

enum LayerOutcome {
    Done,
    TimeLimit,
}

/// How many sentences of a batch were printed and why the others were not
struct Emission {
    shown: usize,
    filter_hidden: usize,
    graph_hidden: usize,
}

/// Collaborators of a search; everything left unset is derived from the
/// configuration
pub struct SearchEngineBuilder {
    config: SearchConfig,
    matcher: Option<Arc<dyn Matcher>>,
    prover: Option<Arc<dyn Prover>>,
    computer: Option<Arc<dyn CellGraphComputer>>,
    cache: Option<Arc<dyn CellGraphCache>>,
    time_limit: Option<Duration>,
}

impl SearchEngineBuilder {
    pub fn matcher(mut self, matcher: Arc<dyn Matcher>) -> Self {
        self.matcher = Some(matcher);
        self
    }

    pub fn prover(mut self, prover: Arc<dyn Prover>) -> Self {
        self.prover = Some(prover);
        self
    }

    pub fn cell_graphs(mut self, computer: Arc<dyn CellGraphComputer>) -> Self {
        self.computer = Some(computer);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn CellGraphCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// A wall-clock budget finer than the whole minutes of the
    /// configuration
    pub fn time_limit(mut self, limit: Duration) -> Self {
        self.time_limit = Some(limit);
        self
    }

    pub fn build(self, reporter: Reporter) -> Result<SearchEngine> {
        let config = self.config;
        config.validate()?;

        let interner = Arc::new(Interner::new());
        let vocabulary = Vocabulary::new(&interner, config.unary_predicates, config.binary_predicates);
        let literals = Arc::new(LiteralStore::new(Arc::clone(&interner)));
        let store = Arc::new(ClauseStore::new(literals));
        let canonicalizer = Canonicalizer::new(Arc::clone(&store), &vocabulary);
        let lattice = Arc::new(QuantifierLattice::generate(
            config.quantifiers,
            config.max_k,
            config.counting(),
            config.double_counting_exist,
        ));
        let matcher = self.matcher.unwrap_or_else(|| Arc::new(Matching::new()));
        let prover = self.prover.unwrap_or_else(|| {
            Arc::from(prover::from_path(
                config.prover9_path.as_deref(),
                config.max_prover9_seconds,
            ))
        });
        let computer = self.computer.or_else(|| {
            config.cell_graph_script.as_ref().map(|script| {
                Arc::new(JuliaComputer::new(
                    script,
                    config.julia_threads,
                    config.cell_time_limit,
                )) as Arc<dyn CellGraphComputer>
            })
        });
        let pool = config
            .threads
            .map(|threads| rayon::ThreadPoolBuilder::new().num_threads(threads).build())
            .transpose()
            .map_err(|e| SearchError::Config(format!("cannot build thread pool: {e}")))?;
        let mut registry = CellGraphRegistry::new(Arc::clone(&interner), Arc::clone(&matcher));
        if config.canonical_cell_graphs {
            registry = registry.with_canonical_forms();
        }
        let time_limit = self.time_limit.or_else(|| config.time_limit());

        Ok(SearchEngine {
            time_limit,
            config,
            vocabulary,
            store,
            canonicalizer,
            lattice,
            matcher,
            prover,
            computer,
            cache: self.cache,
            registry,
            reporter,
            pool,
            basis: ClauseBasis::default(),
            joining: Vec::new(),
            base_filters: Vec::new(),
            sentence_filters: Vec::new(),
            hide_filters: Vec::new(),
            base: Sentence::empty(),
            seeded: false,
            layers: BTreeMap::new(),
            logged_before: FxHashSet::default(),
            emitted: 0,
        })
    }
}

pub struct SearchEngine {
    config: SearchConfig,
    time_limit: Option<Duration>,
    vocabulary: Vocabulary,
    store: Arc<ClauseStore>,
    canonicalizer: Canonicalizer,
    lattice: Arc<QuantifierLattice>,
    matcher: Arc<dyn Matcher>,
    prover: Arc<dyn Prover>,
    computer: Option<Arc<dyn CellGraphComputer>>,
    cache: Option<Arc<dyn CellGraphCache>>,
    registry: CellGraphRegistry,
    reporter: Reporter,
    pool: Option<rayon::ThreadPool>,
    basis: ClauseBasis,
    joining: Vec<Box<dyn JoiningFilter>>,
    /// Filters for single clauses entering the empty sentence
    base_filters: Vec<Box<dyn JoiningFilter>>,
    sentence_filters: Vec<Box<dyn SentenceFilter>>,
    hide_filters: Vec<Box<dyn SentenceFilter>>,
    /// The seed, or the empty sentence
    base: Sentence,
    seeded: bool,
    layers: BTreeMap<usize, Vec<Sentence>>,
    /// Ultra-canonical forms the states log of a resumed depth-first run
    /// holds already
    logged_before: FxHashSet<String>,
    emitted: usize,
}

impl SearchEngine {
    pub fn builder(config: SearchConfig) -> SearchEngineBuilder {
        SearchEngineBuilder {
            config,
            matcher: None,
            prover: None,
            computer: None,
            cache: None,
            time_limit: None,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn clause_store(&self) -> &Arc<ClauseStore> {
        &self.store
    }

    pub fn basis(&self) -> &ClauseBasis {
        &self.basis
    }

    /// Run the search to the end, on the configured thread pool if any
    pub fn run(mut self) -> Result<SearchSummary> {
        match self.pool.take() {
            Some(pool) => pool.install(|| self.search()),
            None => self.search(),
        }
    }

    fn search(&mut self) -> Result<SearchSummary> {
        let start = Instant::now();
        // read before anything is appended to a log that may be the same file
        let resumed = match self.config.resume_from.clone() {
            Some(path) => Some((StatesLog::read(&path)?, path)),
            None => None,
        };
        let setup = self.config.to_json()?;
        self.reporter.comment(&format!("{SETUP_PREFIX}{setup}"))?;

        self.generate_basis(start)?;
        let seed = resumed
            .as_ref()
            .and_then(|(log, _)| log.seed.clone())
            .or_else(|| self.config.seed.clone());
        if let Some(seed) = seed {
            if resumed.is_some() && self.config.seed.as_ref().is_some_and(|s| *s != seed) {
                warn!(seed = %seed, "continuing with the seed of the states log");
            }
            self.base = self.seed_sentence(&seed)?;
            self.seeded = true;
            let fol = self.base.to_fol(&self.store);
            self.reporter.seed(&fol)?;
        }
        self.setup_filters(start)?;

        let (status, last_layer) = match self.config.mode {
            SearchMode::Bfs => self.breadth_first(resumed, start)?,
            SearchMode::Dfs => self.depth_first(resumed, start)?,
        };

        let elapsed = start.elapsed();
        self.reporter
            .comment(&format!("ending with {} in {}", self.emitted, seconds(elapsed)))?;
        self.reporter.comment(&status.to_string())?;
        self.reporter.flush()?;
        info!(emitted = self.emitted, last_layer, elapsed = elapsed.as_secs_f64(), %status, "search finished");
        Ok(SearchSummary {
            status,
            last_layer,
            emitted: self.emitted,
            elapsed,
        })
    }

    /// Layer after layer; returns the last completed layer
    fn breadth_first(
        &mut self,
        resumed: Option<(StatesLog, PathBuf)>,
        start: Instant,
    ) -> Result<(SearchStatus, usize)> {
        let first = match resumed {
            Some((log, path)) => self.resume(log, &path)?,
            None => 1,
        };
        let mut last_layer = first.saturating_sub(1);
        for n in first..=self.config.overall_literals() {
            if !self.can_grow(n) {
                debug!(layer = n, "nothing left to extend");
                break;
            }
            match self.layer(n, start)? {
                LayerOutcome::Done => last_layer = n,
                LayerOutcome::TimeLimit => return Ok((SearchStatus::TimeLimit, last_layer)),
            }
            if self.expired(start) {
                return Ok((SearchStatus::TimeLimit, last_layer));
            }
        }
        Ok((SearchStatus::Exhausted, last_layer))
    }

    /// Sentence after sentence from the base, smallest ultra-canonical form
    /// first; returns the largest literal count reached
    ///
    /// Children are deduplicated and filtered like a layer, then checked
    /// against a closed list of every ultra-canonical form seen, so each
    /// sentence is opened at most once.
    fn depth_first(
        &mut self,
        resumed: Option<(StatesLog, PathBuf)>,
        start: Instant,
    ) -> Result<(SearchStatus, usize)> {
        if let Some((log, path)) = resumed {
            self.resume_depth_first(log, &path)?;
        }
        let base_literals = self.base.count_literals();
        let mut closed: FxHashSet<String> = FxHashSet::default();
        let mut stack = vec![self.base.clone()];
        let mut deepest = 0;
        let mut opened = 0usize;
        while let Some(node) = stack.pop() {
            if self.expired(start) {
                return Ok((SearchStatus::TimeLimit, deepest));
            }
            let node_start = Instant::now();
            let children = self.children(&node);
            let generated = children.len();
            let pruned = self.approved(self.deduplicate(children))?;
            let after_pruning = pruned.len();
            let canonicalizer = &self.canonicalizer;
            let mut fresh: Vec<Sentence> = pruned
                .into_iter()
                .filter(|child| closed.insert(child.ultra_canonical(canonicalizer).to_string()))
                .collect();
            if self.expired(start) {
                return Ok((SearchStatus::TimeLimit, deepest));
            }

            let emission = self.emit(&fresh)?;
            if let Some(literals) = fresh.iter().map(Sentence::count_literals).max() {
                deepest = deepest.max(literals - base_literals);
            }
            opened += 1;
            self.reporter.comment(&format!(
                "opened {} ({} / {} / {}) [{}] in {}\t{}",
                emission.shown,
                fresh.len(),
                after_pruning,
                generated,
                self.emitted,
                seconds(node_start.elapsed()),
                node.ultra_canonical(&self.canonicalizer)
            ))?;
            debug!(opened, stack = stack.len(), closed = closed.len(), "sentence opened");

            // the smallest form ends on top of the stack
            let canonicalizer = &self.canonicalizer;
            fresh.sort_by(|a, b| {
                b.ultra_canonical(canonicalizer)
                    .cmp(a.ultra_canonical(canonicalizer))
            });
            for mut child in fresh {
                child.free_memory();
                stack.push(child);
            }
        }
        info!(opened, closed = closed.len(), "depth-first search exhausted");
        Ok((SearchStatus::Exhausted, deepest))
    }

    /// Every basis clause joinable to `node`, appended to it, in basis order
    fn children(&self, node: &Sentence) -> Vec<Sentence> {
        let max_length = self.config.max_literals_per_clause;
        let (filters, longest) = if node.is_empty() {
            (&self.base_filters, max_length.min(self.config.overall_literals()))
        } else {
            (&self.joining, max_length)
        };
        let clauses: Vec<ClauseId> = (1..=longest)
            .flat_map(|length| self.basis.of_length(length).iter().copied())
            .collect();
        let store = &self.store;
        clauses
            .par_iter()
            .filter(|c| joinable(filters, node, **c))
            .map(|c| node.extend(*c, store))
            .collect()
    }

    fn expired(&self, start: Instant) -> bool {
        self.time_limit
            .is_some_and(|limit| start.elapsed() >= limit)
    }

    /// Whether layer `n` can receive any candidate
    fn can_grow(&self, n: usize) -> bool {
        let max_length = self.config.max_literals_per_clause;
        n <= max_length
            || (n - max_length..n).any(|from| self.layers.get(&from).is_some_and(|l| !l.is_empty()))
    }

    fn generate_basis(&mut self, start: Instant) -> Result<()> {
        let literals = self.vocabulary.literals(self.store.literals());
        self.reporter.comment(&format!(
            "there are {} quantifiers and {} literals",
            self.lattice.len(),
            literals.len()
        ))?;

        let store = &self.store;
        let mut filters: Vec<Box<dyn ClauseFilter>> = vec![
            Box::new(MaxLiteralsFilter::new(Arc::clone(store), self.config.max_literals_per_clause)),
            Box::new(MaxLiteralsPerCountingClauseFilter::new(
                Arc::clone(store),
                self.config.max_literals_per_counting_clause,
            )),
        ];
        if self.config.naive_tautology {
            filters.push(Box::new(NaiveTautologyFilter::new(Arc::clone(store))));
        }
        if self.config.tautology_filter {
            filters.push(Box::new(TautologyFilter::new(Arc::clone(store), Arc::clone(&self.prover))));
        }
        if self.config.subsumption {
            filters.push(Box::new(ThetaSubsumptionFilter::new(Arc::clone(store), Arc::clone(&self.matcher))));
        }

        let generator = ClauseGenerator::new(Arc::clone(store), literals, Arc::clone(&self.lattice));
        let generation = generator.generate(&filters, self.config.max_literals_per_clause)?;
        self.basis = ClauseBasis::new(generation.clauses, store);
        self.reporter.comment(&format!(
            "clause generation produced layers of sizes {:?}, {} clauses in total, within {}",
            generation.layer_sizes,
            self.basis.len(),
            seconds(start.elapsed())
        ))?;

        let printed: Vec<(u32, Arc<str>)> = self
            .basis
            .clauses()
            .iter()
            .map(|c| (c.as_u32(), self.store.canonical(*c)))
            .collect();
        self.reporter
            .basis(printed.iter().map(|(id, canonical)| (*id, &**canonical)))?;
        info!(clauses = self.basis.len(), "clause basis ready");
        Ok(())
    }

    fn setup_filters(&mut self, start: Instant) -> Result<()> {
        let store = &self.store;
        let config = &self.config;
        let mut joining: Vec<Box<dyn JoiningFilter>> =
            vec![Box::new(DisjunctiveClausesFilter::new(Arc::clone(store)))];
        if config.language_bias {
            joining.push(Box::new(LanguageBiasFilter::new(Arc::clone(store), &self.vocabulary)));
            self.base_filters
                .push(Box::new(LanguageBiasFilter::new(Arc::clone(store), &self.vocabulary)));
        }
        joining.push(Box::new(MaxClausesFilter::new(config.max_clauses)));
        joining.push(Box::new(MaxOverallLiteralsFilter::new(
            Arc::clone(store),
            config.overall_literals(),
        )));
        joining.push(Box::new(MaxCountingClausesFilter::new(
            Arc::clone(store),
            config.max_counting_clauses,
        )));
        if config.decomposable_components {
            joining.push(Box::new(ConnectedComponentsFilter::new(Arc::clone(store))));
        }
        if config.trivial_constraints {
            joining.push(Box::new(TrivialConstraintsFilter::new(Arc::clone(store))));
        }
        if config.quantifiers_reducibility {
            let forbidden = Arc::new(ForbiddenTuples::precompute(
                self.basis.clauses(),
                store,
                config.max_clauses,
                config.max_literals_per_clause,
                config.max_k,
            ));
            self.reporter.comment(&format!(
                "quantifiers reducibility forbids {} pairs and {} triples, computed within {}",
                forbidden.pair_count(),
                forbidden.triple_count(),
                seconds(start.elapsed())
            ))?;
            joining.push(Box::new(TwoFormulaeFilter::new(Arc::clone(&forbidden))));
            if config.max_clauses > 2 {
                joining.push(Box::new(TupleFilter::new(Arc::clone(store), forbidden)));
            }
        }
        debug!(
            filters = ?joining.iter().map(|f| f.name().to_string()).collect::<Vec<_>>(),
            "joining filters"
        );
        self.joining = joining;

        if config.contradiction_filter {
            self.sentence_filters.push(Box::new(ContradictionFilter::new(
                Arc::clone(store),
                Arc::clone(&self.prover),
            )));
        }
        if config.reflexive_atoms {
            self.hide_filters
                .push(Box::new(ReflexiveAtomsFilter::new(Arc::clone(store))));
        }
        Ok(())
    }

    /// Basis clauses by canonical form
    fn basis_index(&self) -> FxHashMap<Arc<str>, ClauseId> {
        self.basis
            .clauses()
            .iter()
            .map(|c| (self.store.canonical(*c), *c))
            .collect()
    }

    /// Parse and check a seed sentence
    ///
    /// Every clause must bind exactly the variables it uses and use only
    /// vocabulary predicates applied to variables. Clauses equal to a basis
    /// clause are replaced by it so that the joining filters recognize them.
    pub fn seed_sentence(&self, text: &str) -> Result<Sentence> {
        let parsed = Sentence::parse(text, &self.store).map_err(|e| SearchError::Seed(e.to_string()))?;
        if parsed.is_empty() {
            return Err(SearchError::Seed("the seed has no clauses".to_string()));
        }
        let index = self.basis_index();
        let literals = self.store.literals();
        let mut clauses = Vec::with_capacity(parsed.len());
        for id in parsed.clauses() {
            let entry = self.store.get(*id);
            let clause = entry.clause();
            if clause.variables(literals) != clause.quantifier().used_variables() {
                return Err(SearchError::Seed(format!(
                    "{} must bind exactly the variables it uses",
                    self.store.to_fol(*id)
                )));
            }
            for literal in clause.literals() {
                let literal = literals.get(*literal);
                if literal.literal().args.iter().any(|t| t.as_variable().is_none()) {
                    return Err(SearchError::Seed(format!(
                        "{} is not applied to variables",
                        literal.text()
                    )));
                }
                if !self.vocabulary.contains(&literal.predicate()) {
                    return Err(SearchError::Seed(format!(
                        "{} is not in the vocabulary",
                        literal.text()
                    )));
                }
            }
            clauses.push(index.get(&self.store.canonical(*id)).copied().unwrap_or(*id));
        }
        Ok(Sentence::new(clauses, &self.store))
    }

    fn check_logged_basis(&self, log: &StatesLog) -> Result<()> {
        if !log.basis.is_empty() && log.basis.len() != self.basis.len() {
            return Err(SearchError::Resume(format!(
                "the log holds {} basis clauses, the configuration yields {}",
                log.basis.len(),
                self.basis.len()
            )));
        }
        Ok(())
    }

    /// Restore the cell graphs and the recorded forms of a states log
    ///
    /// The depth-first search starts again from the base; recorded
    /// sentences are opened again but not printed twice.
    fn resume_depth_first(&mut self, log: StatesLog, path: &Path) -> Result<()> {
        self.check_logged_basis(&log)?;
        for logged in &log.sentences {
            let parsed = Sentence::parse(&logged.sentence, &self.store)?;
            self.logged_before
                .insert(parsed.ultra_canonical(&self.canonicalizer).to_string());
            if let Some(graph) = &logged.cell_graph {
                self.registry.incorporate(&CellGraph::parse(graph)?);
            }
        }
        self.reporter.comment(&format!(
            "resuming from {} depth-first with {} recorded sentences and {} cell graphs",
            path.display(),
            self.logged_before.len(),
            self.registry.len()
        ))?;
        info!(recorded = self.logged_before.len(), "depth-first search resumed");
        Ok(())
    }

    /// Load the layers of a states log; returns the first layer to build
    fn resume(&mut self, log: StatesLog, path: &Path) -> Result<usize> {
        self.check_logged_basis(&log)?;
        let index = self.basis_index();
        let base_literals = self.base.count_literals();
        let mut restored = 0;
        for logged in &log.sentences {
            let parsed = Sentence::parse(&logged.sentence, &self.store)?;
            if parsed.count_literals() <= base_literals {
                continue;
            }
            let clauses = parsed
                .clauses()
                .iter()
                .map(|c| index.get(&self.store.canonical(*c)).copied().unwrap_or(*c))
                .collect();
            let sentence = Sentence::new(clauses, &self.store);
            let layer = sentence.count_literals() - base_literals;
            self.layers.entry(layer).or_default().push(sentence);
            restored += 1;
            if let Some(graph) = &logged.cell_graph {
                self.registry.incorporate(&CellGraph::parse(graph)?);
            }
        }

        let first = self.layers.keys().next_back().map_or(1, |last| last + 1);
        let keep_from = first.saturating_sub(self.config.max_literals_per_clause);
        self.layers.retain(|layer, _| *layer >= keep_from);
        self.reporter.comment(&format!(
            "resuming from {} at layer {} with {} sentences and {} cell graphs",
            path.display(),
            first,
            restored,
            self.registry.len()
        ))?;
        Ok(first)
    }

    /// Candidates of layer `n`, in a fixed order: extensions of layer 1
    /// first, single clauses on the base last
    fn generate(&self, n: usize, start: Instant) -> Option<Vec<Sentence>> {
        let max_length = self.config.max_literals_per_clause;
        let store = &self.store;
        let joining = &self.joining;
        let mut candidates = Vec::new();
        for from in n.saturating_sub(max_length).max(1)..n {
            let clauses = self.basis.of_length(n - from);
            let Some(previous) = self.layers.get(&from) else {
                continue;
            };
            if clauses.is_empty() {
                continue;
            }
            let extended: Vec<Sentence> = previous
                .par_iter()
                .flat_map_iter(|sentence| {
                    clauses
                        .iter()
                        .filter(move |c| joinable(joining, sentence, **c))
                        .map(move |c| sentence.extend(*c, store))
                })
                .collect();
            candidates.extend(extended);
            if self.expired(start) {
                return None;
            }
        }
        if n <= max_length {
            let filters = if self.seeded {
                &self.joining
            } else {
                &self.base_filters
            };
            let base = &self.base;
            let single: Vec<Sentence> = self
                .basis
                .of_length(n)
                .par_iter()
                .filter(|c| joinable(filters, base, **c))
                .map(|c| base.extend(*c, store))
                .collect();
            candidates.extend(single);
        }
        Some(candidates)
    }

    /// One representative per ultra-canonical form: the earliest candidate,
    /// whatever the thread schedule
    fn deduplicate(&self, candidates: Vec<Sentence>) -> Vec<Sentence> {
        let canonicalizer = &self.canonicalizer;
        let first: DashMap<&str, usize> = DashMap::new();
        candidates.par_iter().enumerate().for_each(|(i, sentence)| {
            first
                .entry(sentence.ultra_canonical(canonicalizer))
                .and_modify(|j| *j = (*j).min(i))
                .or_insert(i);
        });
        let mut keep = vec![false; candidates.len()];
        for (_, i) in first {
            keep[i] = true;
        }
        candidates
            .into_iter()
            .zip(keep)
            .filter_map(|(sentence, kept)| kept.then_some(sentence))
            .collect()
    }

    fn layer(&mut self, n: usize, start: Instant) -> Result<LayerOutcome> {
        let layer_start = Instant::now();
        let Some(candidates) = self.generate(n, start) else {
            return Ok(LayerOutcome::TimeLimit);
        };
        self.reporter.comment(&format!(
            "there are {} sentences generated within {}",
            candidates.len(),
            seconds(layer_start.elapsed())
        ))?;
        if self.expired(start) {
            return Ok(LayerOutcome::TimeLimit);
        }

        let pruned = self.deduplicate(candidates);
        self.reporter.comment(&format!(
            "there are {} sentence after pruning done within {}",
            pruned.len(),
            seconds(layer_start.elapsed())
        ))?;
        if self.expired(start) {
            return Ok(LayerOutcome::TimeLimit);
        }

        let mut sentences = self.approved(pruned)?;
        self.reporter.comment(&format!(
            "there are {} sentence after filtering within {}",
            sentences.len(),
            seconds(layer_start.elapsed())
        ))?;
        if self.expired(start) {
            return Ok(LayerOutcome::TimeLimit);
        }

        let Emission {
            shown,
            filter_hidden,
            graph_hidden,
        } = self.emit(&sentences)?;
        self.reporter.comment(&format!(
            "there were {} after pruning from which {} were hidden by hiding filters and exactly {} were hidden using cell graph pruning and so {} left",
            sentences.len(),
            filter_hidden,
            graph_hidden,
            shown
        ))?;

        for sentence in &mut sentences {
            sentence.free_memory();
        }
        let count = sentences.len();
        self.layers.insert(n, sentences);
        if let Some(old) = n.checked_sub(self.config.max_literals_per_clause) {
            self.layers.remove(&old);
        }
        let in_memory: usize = self.layers.values().map(Vec::len).sum();
        self.reporter.comment(&format!(
            "info: {} layers with {} sentences in memory, {} clauses interned, {} cell graphs registered",
            self.layers.len(),
            in_memory,
            self.store.len(),
            self.registry.len()
        ))?;
        self.reporter.comment(&format!(
            "finished layer with exactly {} literals, overall time was {}",
            n,
            seconds(start.elapsed())
        ))?;
        info!(
            layer = n,
            sentences = count,
            shown,
            filter_hidden,
            graph_hidden,
            elapsed = layer_start.elapsed().as_secs_f64(),
            "layer finished"
        );
        Ok(LayerOutcome::Done)
    }

    /// Sentences every sentence filter accepts, in input order
    fn approved(&self, sentences: Vec<Sentence>) -> Result<Vec<Sentence>> {
        let filters = &self.sentence_filters;
        let verdicts = sentences
            .par_iter()
            .map(|sentence| approve(filters, sentence))
            .collect::<Result<Vec<bool>>>()?;
        Ok(sentences
            .into_iter()
            .zip(verdicts)
            .filter_map(|(sentence, approved)| approved.then_some(sentence))
            .collect())
    }

    /// Print the sentences nothing hides, in ultra-canonical order, and
    /// record all of them in the states log
    fn emit(&mut self, sentences: &[Sentence]) -> Result<Emission> {
        let canonicalizer = &self.canonicalizer;
        let mut order: Vec<usize> = (0..sentences.len()).collect();
        order.sort_by(|a, b| {
            sentences[*a]
                .ultra_canonical(canonicalizer)
                .cmp(sentences[*b].ultra_canonical(canonicalizer))
        });
        let mut hidden = sentences
            .par_iter()
            .map(|sentence| approve(&self.hide_filters, sentence).map(|approved| !approved))
            .collect::<Result<Vec<bool>>>()?;
        if !self.logged_before.is_empty() {
            for (i, sentence) in sentences.iter().enumerate() {
                if self.logged_before.contains(sentence.ultra_canonical(canonicalizer)) {
                    hidden[i] = true;
                }
            }
        }
        let filter_hidden = hidden.iter().filter(|h| **h).count();
        let graphs = self.hide_by_cell_graphs(sentences, &order, &mut hidden)?;
        let graph_hidden = hidden.iter().filter(|h| **h).count() - filter_hidden;

        let mut shown = 0;
        for i in &order {
            if !hidden[*i] {
                self.reporter
                    .candidate(sentences[*i].ultra_canonical(&self.canonicalizer))?;
                shown += 1;
            }
        }
        if self.reporter.has_log() {
            for i in &order {
                let graph = graphs
                    .as_ref()
                    .map_or_else(|| NO_CELL_GRAPH.to_string(), |graphs| graphs[*i].to_string());
                let line = [
                    sentences[*i].ultra_canonical(&self.canonicalizer).to_string(),
                    sentences[*i].to_fol(&self.store),
                    graph,
                ]
                .join(FIELD_DELIMITER);
                self.reporter.record(&line)?;
            }
        }
        self.emitted += shown;
        Ok(Emission {
            shown,
            filter_hidden,
            graph_hidden,
        })
    }

    /// Compute the cell graphs of a layer and hide sentences with a known
    /// graph; `order` lists the sentences by ultra-canonical form
    fn hide_by_cell_graphs(
        &mut self,
        sentences: &[Sentence],
        order: &[usize],
        hidden: &mut [bool],
    ) -> Result<Option<Vec<CellGraph>>> {
        let Some(computer) = self.computer.clone() else {
            return Ok(None);
        };
        let ultras: Vec<&str> = sentences
            .iter()
            .map(|s| s.ultra_canonical(&self.canonicalizer))
            .collect();

        let mut graphs: Vec<Option<CellGraph>> = match &self.cache {
            Some(store) => ultras
                .iter()
                .map(|u| store.get(&cache::key(u)).map(|text| CellGraph::parse(&text)).transpose())
                .collect::<Result<Vec<_>>>()?,
            None => vec![None; ultras.len()],
        };
        let missing: Vec<usize> = (0..graphs.len()).filter(|i| graphs[*i].is_none()).collect();
        if !missing.is_empty() {
            let batch: Vec<String> = missing.iter().map(|i| ultras[*i].to_string()).collect();
            let computed = computer.compute(&batch)?;
            if computed.len() != batch.len() {
                return Err(SearchError::CellGraphBatch {
                    expected: batch.len(),
                    received: computed.len(),
                });
            }
            for (i, graph) in missing.iter().zip(computed) {
                if let Some(store) = &self.cache {
                    store.set(&cache::key(ultras[*i]), &graph.to_string());
                }
                graphs[*i] = Some(graph);
            }
        }
        let graphs: Vec<CellGraph> = graphs.into_iter().map(Option::unwrap_or_default).collect();

        for i in order {
            if hidden[*i] {
                self.registry.incorporate(&graphs[*i]);
            }
        }
        let visible: Vec<(usize, &CellGraph)> = order
            .iter()
            .filter(|i| !hidden[**i])
            .map(|i| (*i, &graphs[*i]))
            .collect();
        let partition = self.registry.partition(&visible);
        for i in partition.hidden {
            hidden[i] = true;
        }
        // groups keep the input order, so their first member has the
        // smallest ultra-canonical form
        for group in partition.groups {
            for i in group.into_iter().skip(1) {
                hidden[i] = true;
            }
        }
        debug!(
            computed = missing.len(),
            cached = ultras.len() - missing.len(),
            "cell graphs of layer ready"
        );
        Ok(Some(graphs))
    }
}

fn approve(filters: &[Box<dyn SentenceFilter>], sentence: &Sentence) -> Result<bool> {
    for filter in filters {
        if !filter.accepts(sentence)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn seconds(duration: Duration) -> String {
    format!("{:.3}s", duration.as_secs_f64())
}

//! Command-line entry point of the sentence search

use clap::Parser;
use sfinder::search::{Reporter, SearchEngine};
use sfinder::{Result, SearchConfig, SearchMode};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Flags override the fields of `--config`; unset flags keep them
#[derive(Parser, Debug)]
#[command(name = "sfinder")]
#[command(about = "Enumerate FO2/C2 sentences up to predicate relabeling")]
struct Args {
    /// JSON file with a full or partial search configuration
    #[arg(long)]
    config: Option<PathBuf>,

    /// Search mode, bfs or dfs
    #[arg(long)]
    mode: Option<SearchMode>,

    #[arg(long)]
    max_overall_literals: Option<usize>,
    #[arg(long)]
    max_clauses: Option<usize>,
    #[arg(long)]
    max_literals_per_clause: Option<usize>,
    #[arg(long)]
    unary_predicates: Option<usize>,
    #[arg(long)]
    binary_predicates: Option<usize>,
    #[arg(long)]
    variables: Option<usize>,
    /// Enable existential quantifiers
    #[arg(long)]
    quantifiers: Option<bool>,
    /// Largest counting bound; 0 disables counting quantifiers
    #[arg(long)]
    max_k: Option<u32>,
    #[arg(long)]
    max_counting_clauses: Option<usize>,
    #[arg(long)]
    max_literals_per_counting_clause: Option<usize>,
    #[arg(long)]
    double_counting_exist: Option<bool>,
    #[arg(long)]
    decomposable_components: Option<bool>,
    #[arg(long)]
    trivial_constraints: Option<bool>,
    #[arg(long)]
    quantifiers_reducibility: Option<bool>,
    #[arg(long)]
    language_bias: Option<bool>,
    #[arg(long)]
    subsumption: Option<bool>,
    #[arg(long)]
    naive_tautology: Option<bool>,
    #[arg(long)]
    tautology_filter: Option<bool>,
    #[arg(long)]
    contradiction_filter: Option<bool>,
    #[arg(long)]
    reflexive_atoms: Option<bool>,
    #[arg(long)]
    prover9: Option<PathBuf>,
    #[arg(long)]
    max_prover9_seconds: Option<u64>,
    /// Julia script computing cell graphs
    #[arg(long)]
    cell_graph_script: Option<PathBuf>,
    #[arg(long)]
    julia_threads: Option<usize>,
    /// Compare cell graphs by canonical form
    #[arg(long)]
    canonical_cell_graphs: Option<bool>,
    /// Seconds per cell-graph batch
    #[arg(long)]
    cell_time_limit: Option<u64>,
    /// Wall-clock budget in minutes; 0 means no limit
    #[arg(long)]
    time_limit: Option<u64>,
    /// Seed sentence every layer extends, e.g. "(V x U0(x))"
    #[arg(long)]
    seed: Option<String>,
    #[arg(long)]
    states_log: Option<PathBuf>,
    /// States log of an interrupted run
    #[arg(long)]
    resume: Option<PathBuf>,
    #[arg(long)]
    threads: Option<usize>,
}

macro_rules! override_fields {
    ($config:ident, $args:ident, { $($field:ident),* $(,)? }) => {
        $(if let Some(value) = $args.$field { $config.$field = value; })*
    };
}

macro_rules! override_options {
    ($config:ident, $args:ident, { $($field:ident => $target:ident),* $(,)? }) => {
        $(if let Some(value) = $args.$field { $config.$target = Some(value); })*
    };
}

impl Args {
    fn into_config(self) -> Result<SearchConfig> {
        let mut config = match &self.config {
            Some(path) => SearchConfig::from_file(path)?,
            None => SearchConfig::default(),
        };
        let args = self;
        override_fields!(config, args, {
            mode,
            max_clauses,
            max_literals_per_clause,
            unary_predicates,
            binary_predicates,
            variables,
            quantifiers,
            max_k,
            max_counting_clauses,
            max_literals_per_counting_clause,
            double_counting_exist,
            decomposable_components,
            trivial_constraints,
            quantifiers_reducibility,
            language_bias,
            subsumption,
            naive_tautology,
            tautology_filter,
            contradiction_filter,
            reflexive_atoms,
            max_prover9_seconds,
            julia_threads,
            canonical_cell_graphs,
            cell_time_limit,
        });
        override_options!(config, args, {
            max_overall_literals => max_overall_literals,
            prover9 => prover9_path,
            cell_graph_script => cell_graph_script,
            time_limit => time_limit,
            seed => seed,
            states_log => states_log,
            resume => resume_from,
            threads => threads,
        });
        Ok(config)
    }
}

fn run(args: Args) -> Result<()> {
    let config = args.into_config()?;
    let mut reporter = Reporter::stdout();
    if let Some(path) = &config.states_log {
        let append = config.resume_from.as_ref() == Some(path);
        reporter = reporter.with_log(path, append)?;
    }
    let summary = SearchEngine::builder(config).build(reporter)?.run()?;
    tracing::info!(status = %summary.status, emitted = summary.emitted, "done");
    Ok(())
}

fn aborted(reason: &dyn std::fmt::Display) -> String {
    format!("# the search has been aborted: {reason}")
}

/// Panics end the candidate stream with the abort line too
fn install_abort_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        println!("{}", aborted(info));
        default_hook(info);
    }));
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    install_abort_hook();

    if let Err(e) = run(Args::parse()) {
        println!("{}", aborted(&e));
        tracing::error!(error = %e, "search aborted");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abort_line() {
        let line = aborted(&sfinder::SearchError::Config("bad".to_string()));
        assert_eq!(line, "# the search has been aborted: Configuration error: bad");
    }

    #[test]
    fn test_mode_flag() {
        let args = Args::parse_from(["sfinder", "--mode", "dfs", "--canonical-cell-graphs", "true"]);
        let config = args.into_config().unwrap();
        assert_eq!(config.mode, SearchMode::Dfs);
        assert!(config.canonical_cell_graphs);
        assert!(Args::try_parse_from(["sfinder", "--mode", "astar"]).is_err());
    }
}

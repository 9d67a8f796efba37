use std::path::Path;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Parser;
use jobscout::filter_rules::RuleSet;
use jobscout::{
    BrowseFilter, CorpusStore, EngineArgs, Explanation, JobRecord, RankedCandidate,
    SearchEngine, SearchError,
};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(
    name = "jobscout",
    about = "Search job postings by meaning and drop the ones your query rules out"
)]
struct SearchCli {
    /// Free-text description of the job you want
    #[arg(long, required_unless_present = "browse")]
    query: Option<String>,

    /// Ask a chat model to explain the results
    #[arg(long, default_value_t = false)]
    explain: bool,

    /// Print results as JSON
    #[arg(long, default_value_t = false)]
    json: bool,

    /// List postings with field filters instead of searching
    #[arg(long, default_value_t = false, conflicts_with = "query")]
    browse: bool,

    /// Browse: exact company name
    #[arg(long)]
    company: Option<String>,

    /// Browse: exact location
    #[arg(long)]
    location: Option<String>,

    /// Browse: exact job board
    #[arg(long)]
    source: Option<String>,

    /// Browse: text to find in titles or company names
    #[arg(long)]
    term: Option<String>,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Serialize)]
struct JsonOutput<'a> {
    query: &'a str,
    results: &'a [RankedCandidate],
    #[serde(skip_serializing_if = "Option::is_none")]
    explanation: Option<&'a Explanation>,
}

fn main() {
    jobscout::logging::init();
    if let Err(err) = run() {
        eprintln!("error: {err:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = SearchCli::parse();
    if cli.browse {
        return browse(&cli);
    }
    // blocking HTTP clients must be dropped outside the runtime
    let engine = build_engine(&cli)?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(search(&cli, &engine))
}

async fn search(cli: &SearchCli, engine: &SearchEngine) -> Result<()> {
    let query = cli.query.clone().unwrap_or_default();
    let results = match engine.search(&query, None).await {
        Ok(results) => results,
        Err(SearchError::CorpusUnavailable) => {
            bail!(
                "no results available: could not load job vectors from {}",
                cli.engine.vectors.display()
            )
        }
        Err(SearchError::RulesUnavailable) => {
            let path = cli.engine.rules.as_deref().unwrap_or_else(|| Path::new("-"));
            bail!(
                "no results available: could not load filter rules from {}",
                path.display()
            )
        }
        Err(err) => return Err(err.into()),
    };
    let explanation = if cli.explain && !results.is_empty() {
        engine.explain(&query, &results).await
    } else {
        None
    };

    if cli.json {
        let output = JsonOutput {
            query: &query,
            results: &results,
            explanation: explanation.as_ref(),
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&output).context("failed to serialize results")?
        );
        return Ok(());
    }

    if results.is_empty() {
        println!("No results found for \"{query}\".");
        return Ok(());
    }
    if let Some(explanation) = &explanation {
        println!("{}\n", explanation.overall_explanation);
    }
    for (rank, candidate) in results.iter().enumerate() {
        print_job(rank + 1, &candidate.job, Some(candidate.similarity));
        if let Some(text) = explanation
            .as_ref()
            .and_then(|explanation| explanation.for_job(candidate.job_id.as_str()))
        {
            println!("   why: {text}");
        }
        println!();
    }
    Ok(())
}

fn build_engine(cli: &SearchCli) -> Result<SearchEngine> {
    let args = &cli.engine;
    let embedder = args
        .build_embedder()
        .context("failed to build query embedder")?;
    let corpus = Arc::new(CorpusStore::open(args.corpus_source()));
    let mut engine =
        SearchEngine::new(Arc::new(embedder), corpus, RuleSet::empty(), args.build_controls());
    if let Some(path) = &args.rules {
        engine = engine.with_rule_table(path);
    }
    if cli.explain {
        let explainer = args
            .build_explainer()
            .context("failed to build explanation client")?;
        return Ok(engine.with_explainer(explainer));
    }
    Ok(engine)
}

fn browse(cli: &SearchCli) -> Result<()> {
    let store = CorpusStore::open(cli.engine.corpus_source());
    let Some(corpus) = store.snapshot() else {
        bail!(
            "no listings available: could not load {}",
            cli.engine.vectors.display()
        );
    };
    let filter = BrowseFilter {
        company: cli.company.clone(),
        location: cli.location.clone(),
        source: cli.source.clone(),
        term: cli.term.clone(),
    };
    let jobs = filter.apply(corpus.jobs());
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&jobs).context("failed to serialize listings")?
        );
        return Ok(());
    }
    println!("Showing {} of {} jobs\n", jobs.len(), corpus.jobs().len());
    for (idx, job) in jobs.iter().enumerate() {
        print_job(idx + 1, job, None);
        println!();
    }
    Ok(())
}

fn print_job(rank: usize, job: &JobRecord, similarity: Option<f32>) {
    let company: &str = if job.company.is_empty() {
        "Unknown company"
    } else {
        &job.company
    };
    println!("{rank}. {} @ {company}", job.title);
    let mut details = Vec::new();
    if !job.location.is_empty() {
        details.push(job.location.clone());
    }
    if !job.date.is_empty() {
        details.push(job.display_date());
    }
    if !job.source.is_empty() {
        details.push(job.source.clone());
    }
    if let Some(score) = similarity {
        details.push(format!("similarity {score:.4}"));
    }
    if !details.is_empty() {
        println!("   {}", details.join(" | "));
    }
    if !job.link.is_empty() {
        println!("   {}", job.link);
    }
}

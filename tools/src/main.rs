//! risk-runner: replays seeded synthetic exchange traffic through the fraud
//! orchestrator and prints a decision summary.
//!
//! Usage:
//!   risk-runner --seed 12345 --events 10000 --threads 4 --db risk.db
//!   risk-runner --seed 12345 --data-dir ./data --json

use anyhow::Result;
use chrono::Utc;
use risk_core::{
    check_result::FraudCheckResult,
    classifier::LinearClassifier,
    config::RiskConfig,
    denylist::InMemoryDenylist,
    orchestrator::FraudOrchestrator,
    rule_engine::StaticRuleEngine,
    rules::LiveRules,
    store::SqliteStore,
    traffic::{TrafficEvent, TrafficGenerator},
    velocity::SlidingWindowVelocity,
};
use std::env;
use std::sync::Arc;

#[derive(Debug, Default, serde::Serialize)]
struct Summary {
    seed:           u64,
    events:         usize,
    approved:       u64,
    blocked:        u64,
    review:         u64,
    mfa:            u64,
    errors:         u64,
    audit_failures: u64,
    stored_results: i64,
    profiles:       i64,
}

impl Summary {
    fn tally(&mut self, result: &FraudCheckResult) {
        if result.approved {
            self.approved += 1;
        } else {
            self.blocked += 1;
        }
        if result.requires_review {
            self.review += 1;
        }
        if result.requires_mfa {
            self.mfa += 1;
        }
    }

    fn merge(&mut self, other: Summary) {
        self.approved += other.approved;
        self.blocked += other.blocked;
        self.review += other.review;
        self.mfa += other.mfa;
        self.errors += other.errors;
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let events = parse_arg(&args, "--events", 10_000usize);
    let threads = parse_arg(&args, "--threads", 4usize).max(1);
    let json = args.iter().any(|a| a == "--json");
    let db = args
        .windows(2)
        .find(|w| w[0] == "--db")
        .map(|w| w[1].as_str())
        .unwrap_or(":memory:");
    let data_dir = args
        .windows(2)
        .find(|w| w[0] == "--data-dir")
        .map(|w| w[1].as_str())
        .unwrap_or("./data");

    if !json {
        println!("risk-runner");
        println!("  seed:      {seed}");
        println!("  events:    {events}");
        println!("  threads:   {threads}");
        println!("  db:        {db}");
        println!("  data_dir:  {data_dir}");
        println!();
    }

    let config = if std::path::Path::new(data_dir).is_dir() {
        RiskConfig::load(data_dir)?
    } else {
        log::warn!("data dir {data_dir} not found, using built-in defaults");
        RiskConfig::default_test()
    };

    let store = Arc::new(SqliteStore::open(db)?);
    store.migrate()?;

    let rules = Arc::new(LiveRules::new(config.rules.clone()));
    let orchestrator = FraudOrchestrator::with_store(Arc::clone(&rules), Arc::clone(&store))
        .denylist(Arc::new(InMemoryDenylist::from_entries(&config.denylist)))
        .velocity(Arc::new(SlidingWindowVelocity::new(
            rules,
            Arc::new(risk_core::clock::SystemClock),
        )))
        .classifier(Arc::new(LinearClassifier::new(config.classifier.clone())))
        .rule_engine(Arc::new(StaticRuleEngine::new(config.pattern_rules.clone())))
        .build();
    let orchestrator = Arc::new(orchestrator);

    let traffic = TrafficGenerator::new(seed, Utc::now()).generate(events);
    let chunk = traffic.len().div_ceil(threads).max(1);

    let mut summary = Summary { seed, events, ..Summary::default() };
    let partials: Vec<Summary> = std::thread::scope(|s| {
        let handles: Vec<_> = traffic
            .chunks(chunk)
            .map(|batch| {
                let orchestrator = Arc::clone(&orchestrator);
                (batch.len(), s.spawn(move || run_batch(&orchestrator, batch)))
            })
            .collect();
        handles
            .into_iter()
            .enumerate()
            .map(|(worker, (len, h))| worker_summary(worker, len, h.join()))
            .collect()
    });
    for partial in partials {
        summary.merge(partial);
    }

    summary.audit_failures = orchestrator.audit_failures();
    summary.stored_results = store.check_result_count()?;
    summary.profiles = store.risk_profile_count()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn run_batch(orchestrator: &FraudOrchestrator, batch: &[TrafficEvent]) -> Summary {
    let mut summary = Summary::default();
    for event in batch {
        match event.evaluate(orchestrator) {
            Ok(result) => summary.tally(&result),
            Err(e) => {
                summary.errors += 1;
                log::error!("evaluation failed: {e}");
            }
        }
    }
    summary
}

/// A panicked worker counts its whole batch as errors.
fn worker_summary(worker: usize, len: usize, joined: std::thread::Result<Summary>) -> Summary {
    joined.unwrap_or_else(|_| {
        log::error!("worker {worker} panicked; counting its {len} events as errors");
        Summary { errors: len as u64, ..Summary::default() }
    })
}

fn print_summary(s: &Summary) {
    println!("=== RUN SUMMARY ===");
    println!("  events:         {}", s.events);
    println!("  approved:       {}", s.approved);
    println!("  blocked:        {}", s.blocked);
    println!("  review:         {}", s.review);
    println!("  mfa:            {}", s.mfa);
    println!("  errors:         {}", s.errors);
    println!("  audit failures: {}", s.audit_failures);
    println!("  stored results: {}", s.stored_results);
    println!("  risk profiles:  {}", s.profiles);
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

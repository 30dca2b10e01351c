//! meritum-node — the Meritum evaluation-pipeline driver.
//!
//! Runs the full submission evaluation offline from a JSON bundle:
//!   1. Open (or create) the evaluation database
//!   2. Seed timing history from the bundle
//!   3. Wire the fraud, validation, scoring and reward engines
//!   4. Evaluate every bundled task and print the outcomes
//!
//! The wire/RPC layer, submission transport and settlement side effects
//! are external collaborators; the bundle stands in for all of them.

mod bundle;
mod heuristics;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::watch;
use tracing::{info, warn};

use meritum_core::constants::MERITS_PER_MER;
use meritum_core::submission::{Submission, WorkProof};
use meritum_core::task::{DifficultyLevel, Task, TaskKind, TaskStatus, VerificationMethod};
use meritum_core::types::{ContentHash, ParticipantId, SubmissionId, TaskId, Timestamp};
use meritum_core::NetworkSnapshot;
use meritum_fraud::{FraudConfig, FraudEngine};
use meritum_pipeline::{EvaluationOutcome, EvaluationSources, TaskEvaluator};
use meritum_rewards::{RewardConfig, RewardEngine};
use meritum_scoring::{ScoringConfig, ScoringEngine};
use meritum_store::{
    CollusionGraph, EvalDb, ReputationStore, SolutionCorpus, TimingHistory,
};
use meritum_validation::{
    CapabilityRegistry, Certification, ValidationTierRunner, ValidatorProfile,
};

use crate::bundle::{
    BundlePeerVote, BundleSources, CompletionSample, EvaluationBundle, RecordingSinks,
};
use crate::heuristics::BaselineHeuristics;
use meritum_validation::PeerVote;

#[derive(Parser, Debug)]
#[command(
    name = "meritum-node",
    version,
    about = "Meritum evaluation node — validation, fraud screening and settlement for task submissions"
)]
struct Args {
    /// Directory for the persistent evaluation database. Omit for an
    /// ephemeral run (nothing survives the process).
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Evaluate every task in a JSON bundle and print the outcomes.
    Evaluate {
        /// Path to the evaluation bundle.
        bundle: PathBuf,

        /// Settlement revision; 0 for a first settlement, higher to
        /// supersede after a dispute.
        #[arg(long, default_value_t = 0)]
        revision: u32,
    },
    /// Write a synthetic evaluation bundle for local experimentation.
    SampleBundle {
        /// Output path; stdout when omitted.
        #[arg(long)]
        out: Option<PathBuf>,

        /// RNG seed, so regenerated bundles are reproducible.
        #[arg(long, default_value_t = 42)]
        seed: u64,
    },
    /// Print the compiled-in fraud, scoring and reward configuration.
    ShowConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,meritum=debug".parse().unwrap()),
        )
        .init();

    let args = Args::parse();

    match args.command {
        Command::Evaluate { bundle, revision } => {
            let db = open_db(args.data_dir.as_deref())?;
            let mut loaded = EvaluationBundle::load(&bundle)?;
            if loaded.now == 0 {
                loaded.now = chrono::Utc::now().timestamp();
            }
            info!(
                tasks = loaded.tasks.len(),
                submissions = loaded.submissions.len(),
                "bundle loaded"
            );
            let outcomes = run_evaluation(&loaded, db.clone(), revision).await?;
            for (task, outcome) in &outcomes {
                println!("task {}", task.to_hex());
                println!(
                    "{}",
                    serde_json::to_string_pretty(outcome).context("rendering outcome")?
                );
            }
            db.flush()?;
        }
        Command::SampleBundle { out, seed } => {
            let sample = sample_bundle(seed);
            let json =
                serde_json::to_string_pretty(&sample).context("rendering sample bundle")?;
            match out {
                Some(path) => {
                    std::fs::write(&path, json)
                        .with_context(|| format!("writing bundle to {}", path.display()))?;
                    info!(path = %path.display(), "sample bundle written");
                }
                None => println!("{json}"),
            }
        }
        Command::ShowConfig => {
            let rendered = serde_json::json!({
                "fraud": FraudConfig::default(),
                "scoring": ScoringConfig::default(),
                "rewards": RewardConfig::default(),
            });
            println!("{}", serde_json::to_string_pretty(&rendered)?);
        }
    }

    Ok(())
}

fn open_db(data_dir: Option<&Path>) -> anyhow::Result<Arc<EvalDb>> {
    let db = match data_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating data dir {}", dir.display()))?;
            EvalDb::open(dir).context("opening evaluation database")?
        }
        None => {
            warn!("no --data-dir given; using an ephemeral database");
            EvalDb::temporary().context("opening ephemeral database")?
        }
    };
    Ok(Arc::new(db))
}

/// Wires the engines to the database, seeds history from the bundle, and
/// evaluates every bundled task in order.
async fn run_evaluation(
    bundle: &EvaluationBundle,
    db: Arc<EvalDb>,
    revision: u32,
) -> anyhow::Result<Vec<(TaskId, EvaluationOutcome)>> {
    let history: Arc<dyn TimingHistory> = Arc::new(db.timing_history());
    bundle
        .seed_history(history.as_ref())
        .context("seeding timing history")?;

    let corpus: Arc<dyn SolutionCorpus> = Arc::new(db.corpus());
    let graph: Arc<dyn CollusionGraph> = Arc::new(db.collusion_graph());
    let reputation: Arc<dyn ReputationStore> = Arc::new(db.reputation_store());

    let fraud = FraudEngine::new(
        corpus,
        graph,
        history,
        Arc::new(FraudConfig::default()),
    );
    let mut registry = CapabilityRegistry::new();
    registry.register(Arc::new(BaselineHeuristics));
    let runner = ValidationTierRunner::new(registry);
    let scoring = ScoringEngine::new(Arc::new(ScoringConfig::default()));
    let rewards = RewardEngine::new(Arc::new(RewardConfig::default()));

    let evaluator = TaskEvaluator::new(fraud, runner, scoring, rewards, reputation, db);

    let views = BundleSources::new(bundle);
    let sinks = RecordingSinks::default();
    let sources = EvaluationSources {
        tasks: &views,
        submissions: &views,
        votes: &views,
        status: &sinks,
        settlement: &sinks,
    };
    let snapshot = NetworkSnapshot::new(bundle.now, bundle.block_height);
    let (_cancel_tx, cancel_rx) = watch::channel(false);

    let mut outcomes = Vec::with_capacity(bundle.tasks.len());
    for task in &bundle.tasks {
        match evaluator
            .evaluate(&task.id, &sources, &snapshot, cancel_rx.clone(), revision)
            .await
        {
            Ok(outcome) => outcomes.push((task.id.clone(), outcome)),
            Err(err) => {
                warn!(task = %task.id.to_hex(), %err, "evaluation failed");
                return Err(err).with_context(|| format!("evaluating task {}", task.id.to_hex()));
            }
        }
    }
    Ok(outcomes)
}

// ── Sample bundle ────────────────────────────────────────────────────────────

/// Distinct solution bodies so the similarity analyzers have something
/// realistic to chew on without flagging honest work.
const SOLUTION_BODIES: [&str; 3] = [
    "The hot loop reallocates the scratch buffer on every iteration. \
     Hoisting the Vec outside the loop and calling clear() instead drops \
     allocation count from O(n) to O(1).\n\
     Measured 3.4x on the bundled benchmark.\n\
     The remaining cost is the bounds check, which the iterator form removes.",
    "Profiling shows 61% of wall time in the serde path, not the loop body. \
     Switching the inner representation to borrowed strs removes the copies.\n\
     The loop itself is fine once the deserializer stops cloning.\n\
     Patch attached with before and after flamegraphs described inline.",
    "The index arithmetic defeats vectorization because of the modulo. \
     Splitting the loop at the wrap point lets the compiler emit SIMD for \
     both halves.\n\
     Verified the assembly no longer contains the scalar remainder path.\n\
     Throughput roughly doubles at n above 4096.",
];

const AUDIT_BODY: &str =
    "withdraw() writes the balance after the external call, so a reentrant \
     callback drains the escrow before the state update lands.\n\
     Move the balance write ahead of the call, or take the mutex the deposit \
     path already holds.\n\
     The deposit path is not affected; its state update precedes the call.";

/// Builds a reproducible two-task bundle: a beginner code-analysis task
/// under automatic verification with three competing miners, and an
/// advanced security audit under peer review with three gated reviewers.
fn sample_bundle(seed: u64) -> EvaluationBundle {
    let mut rng = StdRng::seed_from_u64(seed);
    let now: Timestamp = 1_756_000_000;

    let publisher = ParticipantId::from_bytes(rng.gen());
    let mut bundle = EvaluationBundle {
        now,
        block_height: rng.gen_range(100_000..200_000),
        ..Default::default()
    };

    // Task 1: automatic verification, three miners.
    let published_at = now - 86_400;
    let code_task = Task {
        id: TaskId::derive(&publisher, published_at, "remove the hot-loop allocations"),
        publisher: publisher.clone(),
        title: "remove the hot-loop allocations".into(),
        kind: TaskKind::CodeAnalysis {
            language: "rust".into(),
            complexity: 4,
        },
        difficulty: DifficultyLevel::Beginner,
        reward_pool: 10 * MERITS_PER_MER,
        required_stake: 2 * MERITS_PER_MER,
        published_at,
        submission_deadline: now - 3_600,
        validation_deadline: now + 82_800,
        quality_threshold: 60,
        verification: VerificationMethod::Automatic,
        status: TaskStatus::UnderValidation,
        status_history: Vec::new(),
    };

    for body in SOLUTION_BODIES {
        let miner = ParticipantId::from_bytes(rng.gen());
        let claimed = rng.gen_range(1_800..3_600_u64);
        let submitted_at = published_at + claimed as i64 + rng.gen_range(600..7_200);
        bundle.submissions.push(Submission {
            id: SubmissionId::derive(&code_task.id, &miner, submitted_at),
            task: code_task.id.clone(),
            participant: miner.clone(),
            submitted_at,
            content: ContentHash::of(body.as_bytes()),
            work_proof: WorkProof {
                claimed_duration_secs: claimed,
                cpu_time_ms: claimed * rng.gen_range(400..900),
                memory_peak_kb: rng.gen_range(4_096..65_536),
                step_chain_root: ContentHash::of(miner.as_bytes()),
                nonce_commitment: rng.gen(),
            },
        });
        bundle.contents.push(body.to_string());
        // Three prior completions near the claimed duration, spread enough
        // that the z-score check sees an ordinary miner.
        bundle.completions.push(CompletionSample {
            participant: miner,
            task_kind: "code-analysis".into(),
            durations_secs: vec![
                claimed.saturating_sub(rng.gen_range(200..500)),
                claimed + rng.gen_range(100..400),
                claimed + rng.gen_range(50..250),
            ],
        });
    }

    // Task 2: peer review, one miner, three eligible reviewers.
    let audit_published = now - 172_800;
    let audit_task = Task {
        id: TaskId::derive(&publisher, audit_published, "audit the escrow contract"),
        publisher: publisher.clone(),
        title: "audit the escrow contract".into(),
        kind: TaskKind::SecurityAudit {
            scope: "escrow-contracts".into(),
            standards: vec!["cwe-top-25".into()],
        },
        difficulty: DifficultyLevel::Advanced,
        reward_pool: 50 * MERITS_PER_MER,
        required_stake: 10 * MERITS_PER_MER,
        published_at: audit_published,
        submission_deadline: now - 43_200,
        validation_deadline: now + 43_200,
        quality_threshold: 75,
        verification: VerificationMethod::PeerReview {
            required_reviewers: 2,
            consensus_threshold: 0.70,
        },
        status: TaskStatus::UnderValidation,
        status_history: Vec::new(),
    };

    let auditor = ParticipantId::from_bytes(rng.gen());
    let audit_claimed = 9_000_u64;
    let audit_submitted = audit_published + audit_claimed as i64 + 3_600;
    let audit_submission = Submission {
        id: SubmissionId::derive(&audit_task.id, &auditor, audit_submitted),
        task: audit_task.id.clone(),
        participant: auditor.clone(),
        submitted_at: audit_submitted,
        content: ContentHash::of(AUDIT_BODY.as_bytes()),
        work_proof: WorkProof {
            claimed_duration_secs: audit_claimed,
            cpu_time_ms: audit_claimed * 600,
            memory_peak_kb: 16_384,
            step_chain_root: ContentHash::of(auditor.as_bytes()),
            nonce_commitment: rng.gen(),
        },
    };
    bundle.contents.push(AUDIT_BODY.to_string());
    bundle.completions.push(CompletionSample {
        participant: auditor,
        task_kind: "security-audit".into(),
        durations_secs: vec![8_600, 9_400, 9_100],
    });

    for (score, confidence) in [(82u8, 0.85), (84, 0.80), (79, 0.90)] {
        let reviewer = ParticipantId::from_bytes(rng.gen());
        bundle.profiles.push(ValidatorProfile {
            participant: reviewer.clone(),
            reputation: rng.gen_range(6_500..8_500),
            stake: rng.gen_range(5..40) * MERITS_PER_MER,
            domains: vec!["escrow-contracts".into(), "rust".into()],
            certifications: vec![Certification {
                domain: "escrow-contracts".into(),
                issued_at: now - 180 * 86_400,
                expires_at: now + 180 * 86_400,
            }],
            validation_accuracy: 0.88 + rng.gen_range(0.0..0.08),
            validations_total: rng.gen_range(30..120),
            validations_in_window: rng.gen_range(0..5),
            employer: None,
            declared_interests: Vec::new(),
        });
        bundle.peer_votes.push(BundlePeerVote {
            submission: audit_submission.id.clone(),
            vote: PeerVote {
                validator: reviewer,
                quality_score: score,
                confidence,
                reviewed_at: now - rng.gen_range(3_600..40_000),
            },
        });
    }
    bundle.submissions.push(audit_submission);

    bundle.tasks = vec![code_task, audit_task];
    bundle
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_bundle_is_reproducible_and_internally_consistent() {
        let a = sample_bundle(7);
        let b = sample_bundle(7);
        assert_eq!(a, b);

        for submission in &a.submissions {
            let task = a
                .tasks
                .iter()
                .find(|t| t.id == submission.task)
                .expect("submission references a bundled task");
            assert!(submission.submitted_at >= task.published_at);
            assert!(submission.submitted_at <= task.submission_deadline);
            assert!(
                a.contents
                    .iter()
                    .any(|c| ContentHash::of(c.as_bytes()) == submission.content),
                "every submission's content is bundled"
            );
        }
        assert_ne!(sample_bundle(8), a);
    }

    #[tokio::test]
    async fn sample_bundle_settles_both_tasks_end_to_end() {
        let bundle = sample_bundle(7);
        let db = Arc::new(EvalDb::temporary().unwrap());
        let outcomes = run_evaluation(&bundle, db, 0).await.unwrap();
        assert_eq!(outcomes.len(), 2);

        for (task_id, outcome) in &outcomes {
            let task = bundle.tasks.iter().find(|t| &t.id == task_id).unwrap();
            match outcome {
                EvaluationOutcome::Settled {
                    distribution,
                    rejected,
                } => {
                    distribution.verify().unwrap();
                    assert_eq!(distribution.total_pool, task.reward_pool);
                    assert!(rejected.is_empty(), "no honest submission is rejected");
                }
                other => panic!("expected settlement for {}, got {other:?}", task.title),
            }
        }
    }

    #[tokio::test]
    async fn resettling_at_the_same_revision_is_refused() {
        let bundle = sample_bundle(7);
        let db = Arc::new(EvalDb::temporary().unwrap());
        run_evaluation(&bundle, db.clone(), 0).await.unwrap();
        let again = run_evaluation(&bundle, db, 0).await;
        assert!(again.is_err(), "a finalized task cannot settle twice");
    }
}

/*!

Thin CLI over the recsyn core: flags map onto the configuration knobs, the input is one `.pmrs`
file, solutions are printed (and optionally written next to the input) together with a JSON
statistics record.

*/

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context as AnyhowContext, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use recsyn::driver;
use recsyn::parser::FunctionRoles;
use recsyn_lib::core::context::Context;
use recsyn_lib::ports::smt::SubprocessSmt;
use recsyn_lib::ports::sygus::SubprocessSygus;
use recsyn_lib::synth::lemmas::RacingProver;
use recsyn_lib::synth::refinement::Ports;
use recsyn_lib::Config;

#[derive(Parser, Debug)]
#[command(name = "recsyn", about = "Synthesis of recursive function skeletons by refinement")]
struct Cli {
  /// Input problem file (.pmrs dialect).
  input: PathBuf,

  /// Write the solution file into this directory, alongside a `.sol` suffix.
  #[arg(short, long)]
  output: Option<PathBuf>,

  /// Print the statistics record as JSON.
  #[arg(long)]
  json: bool,

  // Role selection
  #[arg(long, default_value = "target")]
  target: String,
  #[arg(long = "spec", default_value = "spec")]
  reference: String,
  #[arg(long, default_value = "repr")]
  repr: String,
  #[arg(long, default_value = "tinv")]
  tinv: String,

  // Bounds
  #[arg(long)]
  reduction_limit: Option<usize>,
  #[arg(long)]
  expand_depth: Option<usize>,
  #[arg(long)]
  expand_cut: Option<usize>,
  #[arg(long)]
  num_expansions_check: Option<usize>,
  #[arg(long)]
  max_lemma_attempts: Option<usize>,
  #[arg(long)]
  induction_proof_tlimit: Option<u64>,
  #[arg(long)]
  wait_parallel_tlimit: Option<u64>,

  // Optimization toggles
  #[arg(long)]
  simple_init: bool,
  #[arg(long)]
  no_deduction: bool,
  #[arg(long)]
  no_detupling: bool,
  #[arg(long)]
  no_simplify: bool,
  #[arg(long)]
  no_lifting: bool,
  #[arg(long)]
  assume_partial_correctness: bool,
  #[arg(long)]
  nonlinear: bool,

  // Solver binaries
  #[arg(long)]
  sygus_solver: Option<String>,
  #[arg(long)]
  smt_solver: Option<String>,
}

impl Cli {
  fn to_config(&self) -> Config {
    let mut cfg = Config::default();
    if let Some(v) = self.reduction_limit {
      cfg.reduction_limit = v;
    }
    if let Some(v) = self.expand_depth {
      cfg.expand_depth = v;
    }
    if let Some(v) = self.expand_cut {
      cfg.expand_cut = v;
    }
    if let Some(v) = self.num_expansions_check {
      cfg.num_expansions_check = v;
    }
    if let Some(v) = self.max_lemma_attempts {
      cfg.max_lemma_attempts = v;
    }
    if let Some(v) = self.induction_proof_tlimit {
      cfg.induction_proof_tlimit = v;
    }
    if let Some(v) = self.wait_parallel_tlimit {
      cfg.wait_parallel_tlimit = v;
    }
    cfg.simple_init = self.simple_init;
    cfg.use_deduction = !self.no_deduction;
    cfg.detupling = !self.no_detupling;
    cfg.simplify_equations = !self.no_simplify;
    cfg.attempt_lifting = !self.no_lifting;
    cfg.assume_partial_correctness = self.assume_partial_correctness;
    cfg.allow_nonlinear = self.nonlinear;
    if let Some(program) = &self.sygus_solver {
      cfg.sygus_solver.program = program.clone();
    }
    if let Some(program) = &self.smt_solver {
      cfg.smt_solver.program = program.clone();
    }
    cfg
  }

  fn roles(&self) -> FunctionRoles {
    FunctionRoles {
      target:    self.target.clone(),
      reference: self.reference.clone(),
      repr:      self.repr.clone(),
      tinv:      self.tinv.clone(),
    }
  }
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();
  let cfg = cli.to_config();

  let text = std::fs::read_to_string(&cli.input)
    .with_context(|| format!("reading {}", cli.input.display()))?;

  let mut ctx = Context::new();
  ctx.reinit();
  let problem = driver::load_problem(&mut ctx, &text, &cli.roles())
    .map_err(|e| anyhow::anyhow!("{}: {}", cli.input.display(), e))?;

  let mut sygus = SubprocessSygus::new(
    cfg.sygus_solver.clone(),
    Some(Duration::from_secs(cfg.wait_parallel_tlimit)),
  );
  let mut smt = SubprocessSmt::launch(&cfg.smt_solver)
    .map_err(|e| anyhow::anyhow!("launching SMT solver `{}`: {}", cfg.smt_solver.program, e))?;
  let mut prover = RacingProver {
    command: cfg.smt_solver.clone(),
    timeout: Duration::from_secs(cfg.wait_parallel_tlimit),
  };
  let mut ports = Ports {
    sygus:        &mut sygus,
    smt:          &mut smt,
    lemma_prover: &mut prover,
  };

  let (outcome, stats) = driver::run(&ctx, &cfg, &problem, &mut ports);

  let rendered = driver::render_solutions(&outcome);
  if !rendered.is_empty() {
    println!("{}", rendered);
  } else {
    println!("{}", outcome_summary(&outcome));
  }

  if let Some(dir) = &cli.output {
    let stem = cli
      .input
      .file_name()
      .map(|n| n.to_string_lossy().to_string())
      .unwrap_or_else(|| "problem".into());
    let path = dir.join(format!("{}.sol", stem));
    std::fs::write(&path, format!("{}\n", rendered))
      .with_context(|| format!("writing {}", path.display()))?;
  }

  if cli.json {
    println!("{}", stats.to_json());
  }

  std::process::exit(driver::exit_code(&outcome));
}

fn outcome_summary(outcome: &recsyn_lib::synth::refinement::SynthOutcome) -> &'static str {
  use recsyn_lib::synth::refinement::SynthOutcome;
  match outcome {
    SynthOutcome::Realizable(_) => "realizable",
    SynthOutcome::Unrealizable(_) => "unrealizable",
    SynthOutcome::Unknown(_) => "unknown",
    SynthOutcome::Failed(_) => "failed",
  }
}

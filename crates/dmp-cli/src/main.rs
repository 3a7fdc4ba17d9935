use clap::{Parser, Subcommand};
use dmp_core::{
    Discrete, Dmp, DmpConfig, Pattern, PatternKind, Rhythmic, RolloutOptions, WeightFile,
};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use std::error::Error;
use std::f64::consts::TAU;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

type CliResult<T> = Result<T, Box<dyn Error>>;

#[derive(Parser)]
#[command(name = "dmp-cli", about = "Learn and replay dynamic movement primitives")]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Imitate a built-in path with growing basis counts and print the tracking error
    Demo {
        #[arg(long, default_value = "rhythmic")]
        pattern: PatternKind,
    },
    /// Fit weights to a CSV demonstration (one row per dimension)
    Imitate {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        weights_out: PathBuf,
        #[arg(long, default_value = "discrete")]
        pattern: PatternKind,
    },
    /// Roll out stored weights and print the trajectory as CSV
    Rollout {
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long)]
        weights: PathBuf,
        #[arg(long)]
        tau: Option<f64>,
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        y0: Option<Vec<f64>>,
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        goal: Option<Vec<f64>>,
        #[arg(long, default_value = "discrete")]
        pattern: PatternKind,
    },
}

fn init_logging() {
    let mut filter = EnvFilter::from_default_env();
    if let Ok(d) = "dmp_core=info".parse() {
        filter = filter.add_directive(d);
    }
    if let Ok(d) = "dmp_cli=info".parse() {
        filter = filter.add_directive(d);
    }

    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

fn main() -> CliResult<()> {
    init_logging();

    let cli = Cli::parse();
    match cli.cmd {
        Commands::Demo { pattern } => match pattern {
            PatternKind::Discrete => demo::<Discrete>(reach_path(101).view()),
            PatternKind::Rhythmic => demo::<Rhythmic>(cosine_path(629).view()),
        },
        Commands::Imitate {
            config,
            input,
            weights_out,
            pattern,
        } => {
            let demo = read_demonstration(&input)?;
            let config = match config {
                Some(path) => DmpConfig::from_file_with_env(path)?,
                None => {
                    let mut config = DmpConfig::default();
                    config.apply_env_overrides()?;
                    config.n_dmps = demo.nrows();
                    config
                }
            };
            match pattern {
                PatternKind::Discrete => imitate::<Discrete>(config, demo.view(), &weights_out),
                PatternKind::Rhythmic => imitate::<Rhythmic>(config, demo.view(), &weights_out),
            }
        }
        Commands::Rollout {
            config,
            weights,
            tau,
            y0,
            goal,
            pattern,
        } => {
            let from_file = config.is_some();
            let mut config = match config {
                Some(path) => DmpConfig::from_file_with_env(path)?,
                None => {
                    let mut config = DmpConfig::default();
                    config.apply_env_overrides()?;
                    config
                }
            };
            if let Some(y0) = y0 {
                config.y0 = Some(y0);
            }
            if let Some(goal) = goal {
                config.goal = Some(goal);
            }
            let file = WeightFile::load(&weights)?;
            if !from_file {
                let (n_dmps, n_bfs) = file.weights.dim();
                config.n_dmps = n_dmps;
                config.n_bfs = n_bfs;
            }
            match pattern {
                PatternKind::Discrete => rollout::<Discrete>(config, file, tau),
                PatternKind::Rhythmic => rollout::<Rhythmic>(config, file, tau),
            }
        }
    }
}

fn demo<P: Pattern>(path: ArrayView2<'_, f64>) -> CliResult<()> {
    info!("{} demo on a {}-sample path", P::KIND, path.ncols());
    println!("n_bfs,rms");
    for n_bfs in [10, 30, 50, 100] {
        let mut dmp = Dmp::<P>::new(DmpConfig::new(path.nrows(), n_bfs))?;
        dmp.imitate_path(path)?;
        let track = dmp.rollout()?;
        let rms = match dmp.desired_path() {
            Some(desired) => track.tracking_rms(desired.view())?,
            None => return Err("imitation left no desired path".into()),
        };
        println!("{},{:.6}", n_bfs, rms);
    }
    Ok(())
}

fn imitate<P: Pattern>(config: DmpConfig, demo: ArrayView2<'_, f64>, out: &Path) -> CliResult<()> {
    let mut dmp = Dmp::<P>::new(config)?;
    let weights = dmp.imitate_path(demo)?;
    dmp.save_weights(out)?;
    info!(
        "wrote {}x{} {} weights to {}",
        weights.nrows(),
        weights.ncols(),
        P::KIND,
        out.display()
    );

    if let Some(desired) = dmp.desired_path().cloned() {
        let track = dmp.rollout()?;
        info!("reproduction rms: {:.6}", track.tracking_rms(desired.view())?);
    }
    // weight files carry no start or goal; print them for the rollout config
    println!("y0 = {:?}", dmp.y0().to_vec());
    println!("goal = {:?}", dmp.goal().to_vec());
    Ok(())
}

fn rollout<P: Pattern>(config: DmpConfig, file: WeightFile, tau: Option<f64>) -> CliResult<()> {
    if config.goal.is_none() {
        warn!("no goal configured; using 1.0 in every dimension");
    }
    let mut dmp = Dmp::<P>::with_weights(config, file.weights)?;
    let opts = RolloutOptions {
        tau,
        ..Default::default()
    };
    let track = dmp.rollout_with(&opts)?;

    let header: Vec<String> = (0..dmp.n_dmps()).map(|d| format!("y{}", d)).collect();
    println!("step,{}", header.join(","));
    for (k, row) in track.y.axis_iter(Axis(0)).enumerate() {
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        println!("{},{}", k + 1, values.join(","));
    }
    Ok(())
}

/// Parse a demonstration CSV: one line per dimension, comma separated.
/// Empty fields and `nan` mark missing samples.
fn parse_demonstration(text: &str) -> CliResult<Array2<f64>> {
    let mut rows: Vec<Vec<f64>> = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let mut row = Vec::new();
        for field in line.split(',') {
            let field = field.trim();
            if field.is_empty() || field.eq_ignore_ascii_case("nan") {
                row.push(f64::NAN);
            } else {
                let value = field
                    .parse::<f64>()
                    .map_err(|e| format!("line {}: bad value '{}': {}", line_no + 1, field, e))?;
                row.push(value);
            }
        }
        rows.push(row);
    }

    let cols = match rows.first() {
        Some(row) => row.len(),
        None => return Err("demonstration is empty".into()),
    };
    if let Some(bad) = rows.iter().position(|r| r.len() != cols) {
        return Err(format!(
            "row {} has {} samples, expected {}",
            bad + 1,
            rows[bad].len(),
            cols
        )
        .into());
    }
    let n = rows.len();
    let flat: Vec<f64> = rows.into_iter().flatten().collect();
    Ok(Array2::from_shape_vec((n, cols), flat)?)
}

fn read_demonstration(path: &Path) -> CliResult<Array2<f64>> {
    let demo = parse_demonstration(&fs::read_to_string(path)?)?;
    info!(
        "read {} dimension(s) x {} samples from {}",
        demo.nrows(),
        demo.ncols(),
        path.display()
    );
    Ok(demo)
}

fn cosine_path(samples: usize) -> Array2<f64> {
    Array1::linspace(0.0, TAU, samples)
        .mapv(f64::cos)
        .insert_axis(Axis(0))
}

/// Minimum-jerk reach from 0 to 1.
fn reach_path(samples: usize) -> Array2<f64> {
    Array1::linspace(0.0, 1.0, samples)
        .mapv(|s: f64| 10.0 * s.powi(3) - 15.0 * s.powi(4) + 6.0 * s.powi(5))
        .insert_axis(Axis(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_gaps_become_nan() {
        let demo = parse_demonstration("0, 1,,3\n\n4,nan,NaN,7\n").unwrap();
        assert_eq!(demo.dim(), (2, 4));
        assert_eq!(demo[[0, 1]], 1.0);
        assert!(demo[[0, 2]].is_nan());
        assert!(demo[[1, 1]].is_nan() && demo[[1, 2]].is_nan());
        assert_eq!(demo[[1, 3]], 7.0);
    }

    #[test]
    fn csv_rejects_ragged_rows_and_garbage() {
        assert!(parse_demonstration("1,2,3\n1,2\n").is_err());
        assert!(parse_demonstration("1,x,3\n").is_err());
        assert!(parse_demonstration("\n\n").is_err());
    }

    #[test]
    fn built_in_paths_have_expected_endpoints() {
        let reach = reach_path(101);
        assert_eq!(reach[[0, 0]], 0.0);
        assert!((reach[[0, 100]] - 1.0).abs() < 1e-12);
        let cosine = cosine_path(629);
        assert_eq!(cosine[[0, 0]], 1.0);
    }

    #[test]
    fn cli_parses_rollout_overrides() {
        let cli = Cli::try_parse_from([
            "dmp-cli", "rollout", "--weights", "w.json", "--tau", "2", "--y0", "-1,0.5",
            "--goal", "2,3", "--pattern", "rhythmic",
        ])
        .unwrap();
        match cli.cmd {
            Commands::Rollout {
                tau, y0, goal, pattern, ..
            } => {
                assert_eq!(tau, Some(2.0));
                assert_eq!(y0, Some(vec![-1.0, 0.5]));
                assert_eq!(goal, Some(vec![2.0, 3.0]));
                assert_eq!(pattern, PatternKind::Rhythmic);
            }
            _ => panic!("expected rollout"),
        }
    }
}

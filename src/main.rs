use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser, Subcommand, crate_version};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use env_logger::Builder;

use gambit_pivoting::{
    game::{bimatrix::BimatrixGame, mixed_profile::MixedProfile},
    math::{matrix::Matrix, rational::Rational},
    optimisation_algorithms::{
        config::{PivotConfig, Status},
        double_vertex_enum::enum_mixed,
        lemke::{Lcp, Lemke, LemkeResult, all_lemke_howson, lemke, lemke_howson},
        lp_solve::LpSolve,
        tableau::PivotNumber,
        vertex_enum::VertexEnum,
    },
};

/// Nash equilibria, linear programs and vertex enumeration by pivoting.
#[derive(Parser)]
#[command(name = "gambit-pivot", version = crate_version!())]
struct Cli {
    /// Compute with exact rationals instead of floating point.
    #[arg(long, global = true)]
    exact: bool,

    /// Stop after this many pivots.
    #[arg(long, global = true)]
    max_pivots: Option<usize>,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,

    #[command(subcommand)]
    command: Command,
}

/// Matrices are written row by row: `"3,0;0,3"`. Entries may be fractions or decimals.
#[derive(Args)]
struct GameArgs {
    /// Payoffs of the row player.
    #[arg(short = 'a', long = "a", allow_hyphen_values = true)]
    a: String,

    /// Payoffs of the column player.
    #[arg(short = 'b', long = "b", allow_hyphen_values = true)]
    b: String,
}

#[derive(Subcommand)]
enum Command {
    /// Find an equilibrium of a bimatrix game by complementary pivoting.
    Lemke {
        #[command(flatten)]
        game: GameArgs,

        /// Run Lemke-Howson, dropping this label (row strategies first, then column strategies).
        #[arg(long, conflicts_with = "all_labels")]
        label: Option<usize>,

        /// Run Lemke-Howson from every label and report the distinct equilibria.
        #[arg(long)]
        all_labels: bool,
    },

    /// Enumerate the extreme equilibria of a bimatrix game.
    Enummixed {
        #[command(flatten)]
        game: GameArgs,
    },

    /// Solve the linear complementarity problem w = q + M z.
    Lcp {
        #[arg(long, allow_hyphen_values = true)]
        m: String,

        #[arg(long, allow_hyphen_values = true)]
        q: String,
    },

    /// Maximise c x subject to A x <= b, x >= 0; the last rows are equalities.
    Lp {
        #[arg(short = 'a', long = "a", allow_hyphen_values = true)]
        a: String,

        #[arg(short = 'b', long = "b", allow_hyphen_values = true)]
        b: String,

        #[arg(short = 'c', long = "c", allow_hyphen_values = true)]
        c: String,

        #[arg(long, default_value_t = 0)]
        equalities: usize,
    },

    /// Enumerate the vertices of {y : A y + b <= 0, y >= 0}.
    Vertices {
        #[arg(short = 'a', long = "a", allow_hyphen_values = true)]
        a: String,

        #[arg(short = 'b', long = "b", allow_hyphen_values = true)]
        b: String,
    },
}

pub fn main() -> Result<()> {
    let cli = Cli::parse();

    Builder::new().filter_level(cli.verbose.log_level_filter()).init();
    log::info!("gambit-pivot starting");

    let mut config = PivotConfig::default();
    if let Some(max_pivots) = cli.max_pivots {
        config = config.with_max_pivots(max_pivots);
    }
    let result = if cli.exact {
        execute::<Rational>(&cli.command, config)
    } else {
        execute::<f64>(&cli.command, config)
    };
    result.context("executing gambit-pivot")
}

fn execute<T: PivotNumber>(command: &Command, config: PivotConfig) -> Result<()> {
    let status = Status::new();
    match command {
        Command::Lemke {
            game,
            label,
            all_labels,
        } => {
            let game = parse_game::<T>(game)?;
            if *all_labels {
                for profile in all_lemke_howson(&game, config, &status)? {
                    print_profile(&game, &profile);
                }
                return Ok(());
            }
            let result = match label {
                Some(label) => lemke_howson(&game, *label, config, &status)?,
                None => lemke(&game, config, &status)?,
            };
            print_result(&result);
            if let Some(profile) = &result.profile {
                print_profile(&game, profile);
            }
        }
        Command::Enummixed { game } => {
            let game = parse_game::<T>(game)?;
            let (equilibria, status) = enum_mixed(&game, config, status)?;
            println!("enumeration {}: {} extreme equilibria", status, equilibria.len());
            for profile in &equilibria {
                print_profile(&game, profile);
            }
        }
        Command::Lcp { m, q } => {
            let m = Matrix::<T>::parse(m).context("parsing M")?;
            let q = parse_vector::<T>(q).context("parsing q")?;
            let result = Lemke::solve_lcp(&Lcp::new(m, q)?, config, &status)?;
            print_result(&result);
        }
        Command::Lp { a, b, c, equalities } => {
            let a = Matrix::<T>::parse(a).context("parsing A")?;
            let b = parse_vector::<T>(b).context("parsing b")?;
            let c = parse_vector::<T>(c).context("parsing c")?;
            let lp = LpSolve::new(&a, &b, &c, *equalities, config, status)?;
            println!("status: {}", lp.status());
            println!("pivots: {}", lp.num_pivots());
            if lp.is_feasible() && lp.is_bounded() && !lp.is_aborted() {
                println!("optimum: {}", lp.optimum());
                println!("x: {}", join(&lp.optimum_vector()));
                println!("duals: {}", join(&lp.dual_vector()?));
            }
        }
        Command::Vertices { a, b } => {
            let a = Matrix::<T>::parse(a).context("parsing A")?;
            let b = parse_vector::<T>(b).context("parsing b")?;
            let mut enumeration = VertexEnum::new(&a, &b, config, status)?;
            let outcome = enumeration.search()?;
            println!("enumeration {}: {} vertices", outcome, enumeration.vertex_list().len());
            for vertex in enumeration.vertices() {
                println!("{}", join(&vertex));
            }
        }
    }
    Ok(())
}

fn parse_game<T: PivotNumber>(args: &GameArgs) -> Result<BimatrixGame<T>> {
    BimatrixGame::parse(&args.a, &args.b)
}

fn parse_vector<T: PivotNumber>(text: &str) -> Result<Vec<T>> {
    let matrix = Matrix::<T>::parse(text)?;
    if matrix.rows() != 1 {
        return Err(anyhow!("expected a single row of comma-separated values"));
    }
    Ok(matrix.row(0).to_vec())
}

fn print_result<T: PivotNumber>(result: &LemkeResult<T>) {
    println!("outcome: {}", result.outcome);
    println!("pivots: {}", result.pivots);
    println!("z: {}", join(&result.z));
    if result.numerically_unstable {
        println!("warning: numerically unstable; consider --exact");
    }
}

fn print_profile<T: PivotNumber>(game: &BimatrixGame<T>, profile: &MixedProfile<T>) {
    let (u, v) = game.payoffs(profile);
    println!("{} payoffs ({}, {})", profile, u, v);
}

fn join<T: PivotNumber>(values: &[T]) -> String {
    values.iter().map(|x| x.to_string()).collect::<Vec<_>>().join(", ")
}

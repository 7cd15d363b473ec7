//! tir - inspect traced expression graphs

mod sample;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tir_error::DiagnosticRenderer;
use tir_ir::{CompileConfig, Expr, TypeCheckPass};

/// Built-in kernel to trace
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum Sample {
    /// Particle update, type checks cleanly (default)
    #[default]
    Particles,
    /// Particle update plus ill-typed nodes
    Faulty,
}

#[derive(Parser)]
#[command(name = "tir")]
#[command(version = "0.1.0")]
#[command(about = "Trace-time expression IR inspector", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Compiler configuration (JSON)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log graph construction and type resolution
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Prints every node of the traced graph, operands first
    Dump {
        #[arg(short, long, default_value = "particles")]
        sample: Sample,
    },

    /// Type checks the traced graph and reports diagnostics
    Check {
        #[arg(short, long, default_value = "particles")]
        sample: Sample,

        /// Disable ANSI colors
        #[arg(long)]
        no_color: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    let _ = tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            tracing::Level::TRACE
        } else {
            tracing::Level::WARN
        })
        .with_writer(std::io::stderr)
        .try_init();

    let config = match &cli.config {
        Some(path) => match CompileConfig::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                std::process::exit(1);
            }
        },
        None => CompileConfig::default(),
    };

    match cli.command {
        Commands::Dump { sample } => {
            let kernel = trace(sample);
            let mut pass = TypeCheckPass::new(&config);
            for (label, root) in &kernel.roots {
                println!("; {}", label);
                root.walk_post_order(&mut |expr: &Expr| {
                    let dt = pass
                        .check(expr)
                        .map(|dt| dt.to_string())
                        .unwrap_or_else(|| "?".to_string());
                    println!("  {:<16} {:<4} {}", expr.kind(), dt, expr);
                });
            }
        }

        Commands::Check { sample, no_color } => {
            let kernel = trace(sample);
            let mut pass = TypeCheckPass::new(&config);
            pass.check_all(kernel.roots.iter().map(|(_, expr)| expr));

            let diagnostics = pass.take_diagnostics();
            if diagnostics.is_empty() {
                println!("[ok] {} roots type checked", kernel.roots.len());
                return;
            }

            let mut renderer = DiagnosticRenderer::new();
            if no_color {
                renderer = renderer.without_colors();
            }
            eprintln!("{}", diagnostics.render(&renderer));
            if diagnostics.has_errors() {
                std::process::exit(1);
            }
        }
    }
}

fn trace(sample: Sample) -> sample::Kernel {
    match sample {
        Sample::Particles => sample::particles(),
        Sample::Faulty => sample::faulty(),
    }
}

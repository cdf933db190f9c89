//! Double-Speck64 key-recovery demo.
//!
//! Options:
//!   --n=<bits>            Sub-key size in bits (default 20)
//!   --seed=<hex>          PRNG seed (default 1337)
//!   --ram=<size>          Dictionary RAM per receiver, e.g. 256M (default)
//!   --recv-per-node=<N>   Receiver count (default 1)
//!   --workers=<N>         Total worker threads incl. controller (default 4)
//!   --difficulty=<d>      Explicit distinguished-point difficulty
//!   --naive               Run the exhaustive baseline instead
//!   --report=<path>       Write a JSON run report
//!   -v, --verbose         Per-round summaries at info level

use std::process::ExitCode;
use std::time::Instant;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;

use claw_search::speck::DoubleSpeck;
use claw_search::{claw_search, human_parse, naive_claw_search, Parameters};

struct CliConfig {
    n_bits: u32,
    seed: u64,
    naive: bool,
    report: Option<String>,
    params: Parameters,
}

#[derive(Serialize)]
struct RunReport {
    mode: &'static str,
    n_bits: u32,
    seed: String,
    khi: String,
    klo: String,
    recovered: bool,
    elapsed_s: f64,
}

fn parse_args() -> Result<CliConfig, String> {
    let mut config = CliConfig {
        n_bits: 20,
        seed: 0x1337,
        naive: false,
        report: None,
        params: Parameters::default(),
    };

    for arg in std::env::args().skip(1) {
        if let Some(v) = arg.strip_prefix("--n=") {
            config.n_bits = v.parse().map_err(|_| format!("bad --n value '{v}'"))?;
        } else if let Some(v) = arg.strip_prefix("--seed=") {
            let v = v.trim_start_matches("0x");
            config.seed = u64::from_str_radix(v, 16).map_err(|_| format!("bad --seed value '{v}'"))?;
        } else if let Some(v) = arg.strip_prefix("--ram=") {
            config.params.nbytes_memory = human_parse(v).map_err(|e| e.to_string())?;
        } else if let Some(v) = arg.strip_prefix("--recv-per-node=") {
            config.params.recv_per_node =
                v.parse().map_err(|_| format!("bad --recv-per-node value '{v}'"))?;
        } else if let Some(v) = arg.strip_prefix("--workers=") {
            config.params.n_workers = v.parse().map_err(|_| format!("bad --workers value '{v}'"))?;
        } else if let Some(v) = arg.strip_prefix("--difficulty=") {
            config.params.difficulty =
                Some(v.parse().map_err(|_| format!("bad --difficulty value '{v}'"))?);
        } else if let Some(v) = arg.strip_prefix("--report=") {
            config.report = Some(v.to_string());
        } else if arg == "--naive" {
            config.naive = true;
        } else if arg == "-v" || arg == "--verbose" {
            config.params.verbose = true;
        } else {
            return Err(format!("unknown option '{arg}'"));
        }
    }
    config.params.seed = config.seed;
    Ok(config)
}

fn main() -> ExitCode {
    env_logger::init();

    let config = match parse_args() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(2);
        }
    };

    println!(
        "double-speck64 demo: n = {}, seed = {:#x}{}",
        config.n_bits,
        config.seed,
        if config.naive { ", naive baseline" } else { "" }
    );

    let mut rng = StdRng::seed_from_u64(config.seed);
    let pb = DoubleSpeck::new(config.n_bits, &mut rng);
    let (khi, klo) = pb.planted();

    let start = Instant::now();
    let result = if config.naive {
        naive_claw_search(&pb, &config.params).map(|pairs| pairs.into_iter().next())
    } else {
        claw_search(&pb, &config.params).map(Some)
    };
    let elapsed = start.elapsed();

    let (x0, x1) = match result {
        Ok(Some(pair)) => pair,
        Ok(None) => {
            eprintln!("no golden pair found");
            return ExitCode::FAILURE;
        }
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("f({x0:#x}) = g({x1:#x})  [{:.2}s]", elapsed.as_secs_f64());
    let recovered = (x0, x1) == (khi, klo);
    if recovered {
        println!("recovered the planted sub-keys");
    } else {
        println!("golden pair differs from the planted keys ({khi:#x}, {klo:#x})");
    }

    if let Some(path) = &config.report {
        let report = RunReport {
            mode: if config.naive { "naive" } else { "pcs" },
            n_bits: config.n_bits,
            seed: format!("{:#x}", config.seed),
            khi: format!("{x0:#x}"),
            klo: format!("{x1:#x}"),
            recovered,
            elapsed_s: elapsed.as_secs_f64(),
        };
        match serde_json::to_string_pretty(&report) {
            Ok(json) => {
                if let Err(e) = std::fs::write(path, json) {
                    eprintln!("failed to write report to {path}: {e}");
                }
            }
            Err(e) => eprintln!("failed to serialise report: {e}"),
        }
    }

    ExitCode::SUCCESS
}

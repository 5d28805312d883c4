use rve_selector::config;
use rve_selector::diagnostics::{write_json_file, SelectionReport};
use rve_selector::selector::{CandidateOutcome, Selection};
use rve_selector::select_best;
use std::env;
use std::path::PathBuf;
use std::time::Instant;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    if let Err(err) = run() {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}

fn usage(program: &str) -> String {
    format!("Usage: {program} <run.json>")
}

fn run() -> Result<(), String> {
    let mut args = env::args();
    let program = args.next().unwrap_or_else(|| "rve_select".to_string());
    let config_path = match args.next() {
        Some(arg) if arg == "-h" || arg == "--help" => {
            println!("{}", usage(&program));
            return Ok(());
        }
        Some(arg) => PathBuf::from(arg),
        None => return Err(usage(&program)),
    };

    let run_config = config::load_config(&config_path)?;
    let settings = run_config.evaluation.validate()?;
    if run_config.candidates.is_empty() {
        return Err(format!(
            "{} lists no candidates",
            config_path.display()
        ));
    }

    let start = Instant::now();
    let selection = select_best(&run_config.candidates, &settings).map_err(|e| e.to_string())?;
    let total_ms = start.elapsed().as_secs_f64() * 1000.0;

    print_text_summary(&selection);

    if let Some(path) = &run_config.output.json_out {
        let report = SelectionReport::new(&settings, selection, total_ms);
        write_json_file(path, &report)?;
        println!("\nJSON report written to {}", path.display());
    }
    Ok(())
}

fn print_text_summary(selection: &Selection) {
    for c in &selection.candidates {
        let number = c.index + 1;
        match &c.outcome {
            CandidateOutcome::Scored(s) => {
                let r = &s.report;
                println!(
                    "RVE #{number} has size error of {:.6}, shape error of {:.6}, fraction error of {:.6}, average error is {:.6}.",
                    r.size_error, r.shape_error, r.fraction_error, r.overall_error
                );
                if let Some(g) = &s.grains {
                    println!(
                        "  grains: {} retained of {} (spherical={} degenerate={} unknown_phase={})",
                        g.retained, g.grains, g.spherical, g.degenerate, g.unknown_phase
                    );
                }
            }
            CandidateOutcome::Failed(f) => {
                println!("RVE #{number} could not be scored: {}", f.message);
            }
        }
    }
    match &selection.best {
        Some(best) => println!(
            "\nThe best RVE is RVE #{} with an error of {:.6}.",
            best.index + 1,
            best.report.overall_error
        ),
        None => println!("\nNo RVE could be scored."),
    }
}

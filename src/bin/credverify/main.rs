use std::process::ExitCode;
use std::sync::Arc;

use credverify::{TrustKeyStore, TrustRecord, Verdict, Verifier, VerifierOptions};

fn usage() {
    eprintln!("Usage: credverify <credential-file> [trust-file] [options-file]");
}

fn read_file(filename: &str) -> Result<Vec<u8>, String> {
    std::fs::read(filename).map_err(|err| format!("Unable to read {}: {}", filename, err))
}

fn load_store(filename: &str) -> Result<TrustKeyStore, String> {
    let data = read_file(filename)?;
    let records: Vec<TrustRecord> = serde_json::from_slice(&data)
        .map_err(|err| format!("Unable to parse trust records in {}: {}", filename, err))?;
    Ok(TrustKeyStore::from_records(records))
}

fn load_options(filename: &str) -> Result<VerifierOptions, String> {
    let data = read_file(filename)?;
    let text = String::from_utf8(data).map_err(|err| format!("{}: {}", filename, err))?;
    VerifierOptions::from_json(&text).map_err(String::from)
}

fn run(args: &[String]) -> Result<bool, String> {
    let input = read_file(&args[1])?;
    let store = match args.get(2) {
        Some(filename) => load_store(filename)?,
        None => TrustKeyStore::new(),
    };
    let options = match args.get(3) {
        Some(filename) => load_options(filename)?,
        None => VerifierOptions::default(),
    };
    let verifier = Verifier::new(Arc::new(store)).with_options(options);
    let verdict = match verifier.verify_input(&input) {
        Ok(verdict) => verdict,
        Err(err) => Verdict::rejected(&err),
    };
    let output = serde_json::to_string_pretty(&verdict)
        .map_err(|err| format!("Unable to write output: {}", err))?;
    println!("{}", output);
    Ok(verdict.valid)
}

fn main() -> ExitCode {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();
    if !(2..=4).contains(&args.len()) {
        usage();
        return ExitCode::from(2);
    }
    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(err) => {
            eprintln!("{}", err);
            ExitCode::from(2)
        }
    }
}

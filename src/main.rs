use anyhow::{bail, Context, Result};
use clap::{crate_version, load_yaml, App, AppSettings, ArgMatches};
use json_schema_fuzz::{Fuzzer, Schema, Validator};
use rand::SeedableRng;
use rand_pcg::Pcg32;
use serde_json::{json, Value};

use std::fs::File;
use std::io::{stdin, BufReader, Read};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli_yaml = load_yaml!("cli.yaml");
    let matches = App::from(cli_yaml)
        .setting(AppSettings::ColoredHelp)
        .version(crate_version!())
        .get_matches();

    match matches.subcommand() {
        ("fuzz", Some(matches)) => fuzz(matches),
        ("validate", Some(matches)) => validate(matches),
        _ => unreachable!(),
    }
}

fn fuzz(matches: &ArgMatches) -> Result<()> {
    // Parse num-values and seed first, so that we can give the user an error
    // before potentially blocking as we read in the schema.

    let mut rng = if let Some(seed) = matches.value_of("seed") {
        Pcg32::seed_from_u64(
            seed.parse()
                .with_context(|| format!("Failed to parse seed: {}", seed))?,
        )
    } else {
        Pcg32::from_entropy()
    };

    let num_values: Option<u64> = if let Some(n) = matches.value_of("num-values") {
        Some(
            n.parse()
                .with_context(|| format!("Failed to parse number of values: {}", n))?,
        )
    } else {
        None
    };

    let schema = read_schema(matches.value_of("input").unwrap_or("-"))?;
    let fuzzer = Fuzzer::new(&schema).with_context(|| "Unsupported schema")?;

    if let Some(n) = num_values {
        for _ in 0..n {
            println!("{}", fuzzer.generate(&mut rng));
        }
    } else {
        loop {
            println!("{}", fuzzer.generate(&mut rng));
        }
    }

    Ok(())
}

fn validate(matches: &ArgMatches) -> Result<()> {
    let max_depth: Option<usize> = if let Some(n) = matches.value_of("max-depth") {
        Some(
            n.parse()
                .with_context(|| format!("Failed to parse max depth: {}", n))?,
        )
    } else {
        None
    };

    let validator = Validator {
        max_depth,
        strict_refs: matches.is_present("strict-refs"),
    };

    let schema = read_schema(matches.value_of("schema").unwrap_or("-"))?;
    let reader = open(matches.value_of("input").unwrap_or("-"))?;

    let mut invalid = 0;
    for (index, instance) in serde_json::Deserializer::from_reader(reader)
        .into_iter::<Value>()
        .enumerate()
    {
        let instance =
            instance.with_context(|| format!("Failed to parse input value {}", index))?;
        let errors = validator
            .validate(&schema, &instance)
            .with_context(|| format!("Failed to validate input value {}", index))?;

        if !errors.is_empty() {
            invalid += 1;
        }

        for error in errors {
            println!(
                "{}",
                json!({
                    "instance": index,
                    "instancePath": error.pointer.to_string(),
                    "error": error.message.to_string(),
                })
            );
        }
    }

    if invalid > 0 {
        bail!("{} input value(s) failed validation", invalid);
    }

    Ok(())
}

fn open(path: &str) -> Result<BufReader<Box<dyn Read>>> {
    Ok(BufReader::new(match path {
        "-" => Box::new(stdin()) as Box<dyn Read>,
        file => Box::new(
            File::open(file).with_context(|| format!("Failed to open {}", file))?,
        ) as Box<dyn Read>,
    }))
}

fn read_schema(path: &str) -> Result<Schema> {
    let value: Value =
        serde_json::from_reader(open(path)?).with_context(|| "Failed to parse schema")?;

    Ok(json_schema_fuzz::wire::from_value(value))
}

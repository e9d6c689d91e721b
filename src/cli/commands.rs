//! Command implementations for the stringsubs CLI.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter};
use std::path::Path;
use std::time::Instant;

use log::info;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::EngineConfig;
use crate::definition::StringsubsDefinition;
use crate::engine::StringSubstitutionEngine;
use crate::error::{Result, StringSubsError};
use crate::radix::RadixTree;
use crate::substitution::{
    FileSubstitutable, RadixTreeSubstitutionAlgorithm, Substitutable, SubstitutionAlgorithm,
    VariablePreprocessor, substitute,
};

/// Execute a CLI command.
pub fn execute_command(args: StringsubsArgs) -> Result<()> {
    match &args.command {
        Command::Apply(apply_args) => apply_definition(apply_args.clone(), &args),
        Command::Replace(replace_args) => replace_stream(replace_args.clone(), &args),
        Command::Defaults(defaults_args) => show_defaults(defaults_args.clone(), &args),
    }
}

/// Apply a substitution definition.
fn apply_definition(args: ApplyArgs, cli_args: &StringsubsArgs) -> Result<()> {
    if cli_args.verbosity() > 1 {
        println!("Applying definition: {}", args.definition.display());
    }
    let start_time = Instant::now();

    let mut config = EngineConfig::default()
        .with_buffer_size(args.buffer_size)
        .with_parallel(args.parallel);
    if let Some(dir) = &args.backup_dir {
        config = config.with_backup_location(dir);
    }

    let mut preprocessor = VariablePreprocessor::new(args.vars.iter().cloned().collect());
    if args.env {
        preprocessor = preprocessor.with_environment();
    }

    let mut engine = StringSubstitutionEngine::from_file(&args.definition)?.with_config(config);
    engine.set_attribute_preprocessor(Box::new(preprocessor));

    let report = if args.components.is_empty() && args.groups.is_empty() {
        engine.substitute_all()?
    } else {
        let mut report = if args.components.is_empty() {
            Default::default()
        } else {
            engine.substitute_components(&args.components)?
        };
        if !args.groups.is_empty() {
            let groups = engine.substitute_groups(&args.groups)?;
            report.groups_processed += groups.groups_processed;
            report.groups_skipped += groups.groups_skipped;
            report.archives_failed += groups.archives_failed;
            report.files.extend(groups.files);
        }
        report
    };

    output_result(
        "Substitution completed",
        &ApplyResult {
            definition: args.definition.display().to_string(),
            groups_processed: report.groups_processed,
            groups_skipped: report.groups_skipped,
            archives_failed: report.archives_failed,
            files: report.files,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// Substitute one stream with a flat JSON map.
fn replace_stream(args: ReplaceArgs, cli_args: &StringsubsArgs) -> Result<()> {
    let start_time = Instant::now();
    let map = load_map(&args.map)?;

    let input_name = args
        .input
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<stdin>".to_string());

    let (output_name, keys) = if args.in_place {
        let path = args.input.as_ref().ok_or_else(|| {
            StringSubsError::invalid_argument("--in-place needs an input file")
        })?;
        let algorithm = RadixTreeSubstitutionAlgorithm::new(&map)?;
        let mut substitutable = FileSubstitutable::new(path, &EngineConfig::default());
        algorithm.substitute(&mut substitutable)?;
        substitutable.finish()?;
        (input_name.clone(), algorithm.tree().len())
    } else {
        let tree = RadixTree::from_map(&map)?;
        let reader: Box<dyn io::BufRead> = match &args.input {
            Some(path) => Box::new(BufReader::new(
                File::open(path).map_err(|e| StringSubsError::substitution(&input_name, e))?,
            )),
            None => Box::new(io::stdin().lock()),
        };
        match &args.output {
            Some(path) => {
                let file = File::create(path)
                    .map_err(|e| StringSubsError::substitution(path.display().to_string(), e))?;
                substitute(&tree, reader, BufWriter::new(file), &input_name)?;
                (path.display().to_string(), tree.len())
            }
            None => {
                substitute(&tree, reader, io::stdout().lock(), &input_name)?;
                info!("Substituted {} with {} keys", input_name, tree.len());
                // Stdout carries the document itself; no summary.
                return Ok(());
            }
        }
    };

    output_result(
        "Replacement completed",
        &ReplaceResult {
            input: input_name,
            output: output_name,
            keys,
            duration_ms: start_time.elapsed().as_millis() as u64,
        },
        cli_args,
    )
}

/// List default properties.
fn show_defaults(args: DefaultsArgs, cli_args: &StringsubsArgs) -> Result<()> {
    let definition = StringsubsDefinition::from_file(&args.definition)?;
    let properties = definition
        .default_properties(args.property_type)
        .into_iter()
        .map(|p| PropertyRow {
            key: p.key.clone(),
            value: p.value.clone(),
            property_type: serde_json::to_value(p.property_type)
                .ok()
                .and_then(|v| v.as_str().map(str::to_string))
                .unwrap_or_default(),
            description: p.description.clone(),
        })
        .collect();

    output_result(
        "Default properties",
        &DefaultPropertiesResult { properties },
        cli_args,
    )
}

/// Load a flat `{"before": "after"}` JSON object.
fn load_map(path: &Path) -> Result<HashMap<String, String>> {
    let file = File::open(path).map_err(|e| {
        StringSubsError::definition(format!("Failed to read map file '{}': {}", path.display(), e))
    })?;
    let map: HashMap<String, String> = serde_json::from_reader(BufReader::new(file))?;
    Ok(map)
}

// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use chrono::NaiveDate;
use drd_batch::{run_batch, BatchRun, EntityInput, RunOptions};
use drd_core::{DetectionConfig, DrdError, EntityId, EntityOutcome, EntityResult, ObservationSeries};
use drd_oracle::FileOracle;
use serde::Serialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Debug)]
enum CliError {
    Drd(DrdError),
    Io {
        context: String,
        source: std::io::Error,
    },
    Json {
        context: String,
        source: serde_json::Error,
    },
    InvalidInput(String),
}

impl CliError {
    fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        Self::Json {
            context: context.into(),
            source,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::Drd(err) => err.code(),
            Self::Io { .. } => "io_error",
            Self::Json { .. } => "json_error",
            Self::InvalidInput(_) => "invalid_input",
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Drd(err) => write!(f, "{err}"),
            Self::Io { context, source } => write!(f, "{context}: {source}"),
            Self::Json { context, source } => write!(f, "{context}: {source}"),
            Self::InvalidInput(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Drd(err) => Some(err),
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::InvalidInput(_) => None,
        }
    }
}

impl From<DrdError> for CliError {
    fn from(value: DrdError) -> Self {
        Self::Drd(value)
    }
}

#[derive(Debug, Default)]
struct RunArgs {
    data: PathBuf,
    oracle_dir: PathBuf,
    entities: Option<PathBuf>,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    event_date: Option<NaiveDate>,
    parallel: bool,
}

#[derive(Serialize)]
struct RunOutput {
    command: &'static str,
    data: String,
    entities: usize,
    processed: usize,
    skipped: usize,
    errored: usize,
    output_dir: Option<String>,
    results: Vec<EntityResult>,
    rejections: Vec<RejectionOutput>,
}

#[derive(Serialize)]
struct RejectionOutput {
    entity: String,
    kind: &'static str,
    detail: String,
}

#[derive(Serialize)]
struct ErrorEnvelope {
    error: ErrorPayload,
}

#[derive(Serialize)]
struct ErrorPayload {
    code: String,
    message: String,
}

fn main() {
    init_tracing();
    if let Err(err) = run() {
        emit_structured_error(&err);
        process::exit(1);
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

fn run() -> Result<(), CliError> {
    let args = env::args().skip(1).collect::<Vec<_>>();
    if args.is_empty() {
        print_root_help();
        return Ok(());
    }
    if matches!(args[0].as_str(), "-h" | "--help") {
        print_root_help();
        return Ok(());
    }
    if matches!(args[0].as_str(), "-V" | "--version") {
        print_version();
        return Ok(());
    }

    let command_name = args[0].clone();
    let rest = &args[1..];
    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-h" | "--help"))
    {
        print_command_help(command_name.as_str())?;
        return Ok(());
    }
    if rest
        .iter()
        .any(|arg| matches!(arg.as_str(), "-V" | "--version"))
    {
        print_version();
        return Ok(());
    }

    match command_name.as_str() {
        "run" => handle_run(parse_run_args(rest)?),
        _ => Err(CliError::invalid_input(format!(
            "unknown command '{command_name}'; expected: run"
        ))),
    }
}

fn parse_run_args(tokens: &[String]) -> Result<RunArgs, CliError> {
    let mut args = RunArgs::default();
    let mut idx = 0usize;
    while idx < tokens.len() {
        let (flag, inline_value) = split_flag(tokens[idx].as_str())?;
        match flag {
            "--data" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.data = PathBuf::from(raw);
            }
            "--oracle-dir" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.oracle_dir = PathBuf::from(raw);
            }
            "--entities" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.entities = Some(PathBuf::from(raw));
            }
            "--output" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.output = Some(PathBuf::from(raw));
            }
            "--config" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.config = Some(PathBuf::from(raw));
            }
            "--event-date" => {
                let raw = take_flag_value(flag, inline_value, tokens, &mut idx)?;
                args.event_date = Some(parse_date_arg(raw.as_str(), flag)?);
            }
            "--parallel" => {
                ensure_no_inline_value(flag, inline_value)?;
                args.parallel = true;
            }
            other => {
                return Err(CliError::invalid_input(format!(
                    "unknown run option '{other}'"
                )));
            }
        }
        idx += 1;
    }

    if args.data.as_os_str().is_empty() {
        return Err(CliError::invalid_input("run requires --data <path>"));
    }
    if args.oracle_dir.as_os_str().is_empty() {
        return Err(CliError::invalid_input("run requires --oracle-dir <path>"));
    }

    Ok(args)
}

fn split_flag(token: &str) -> Result<(&str, Option<String>), CliError> {
    if !token.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "unexpected positional argument '{token}'; expected --flag value"
        )));
    }
    if let Some((flag, value)) = token.split_once('=') {
        return Ok((flag, Some(value.to_string())));
    }
    Ok((token, None))
}

fn take_flag_value(
    flag: &str,
    inline_value: Option<String>,
    tokens: &[String],
    idx: &mut usize,
) -> Result<String, CliError> {
    if let Some(value) = inline_value {
        return Ok(value);
    }

    *idx += 1;
    let value = tokens
        .get(*idx)
        .ok_or_else(|| CliError::invalid_input(format!("{flag} requires a value")))?;
    if value.starts_with("--") {
        return Err(CliError::invalid_input(format!(
            "{flag} requires a value, but got option '{value}'"
        )));
    }
    Ok(value.clone())
}

fn ensure_no_inline_value(flag: &str, inline_value: Option<String>) -> Result<(), CliError> {
    if inline_value.is_some() {
        return Err(CliError::invalid_input(format!(
            "{flag} does not accept a value"
        )));
    }
    Ok(())
}

fn parse_date_arg(raw: &str, flag: &str) -> Result<NaiveDate, CliError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
        CliError::invalid_input(format!("{flag} expects a YYYY-MM-DD date, got '{raw}'"))
    })
}

fn print_version() {
    println!("drd {}", env!("CARGO_PKG_VERSION"));
}

fn print_root_help() {
    println!(
        "drd {}\n\nUSAGE:\n  drd <COMMAND> [OPTIONS]\n\nCOMMANDS:\n  run   Run disturbance-recovery detection over a radiance table\n\nGLOBAL OPTIONS:\n  -h, --help      Show help\n  -V, --version   Show version\n\nRun 'drd run --help' for options.",
        env!("CARGO_PKG_VERSION")
    );
}

fn print_command_help(command: &str) -> Result<(), CliError> {
    match command {
        "run" => {
            println!(
                "USAGE:\n  drd run --data <table.csv> --oracle-dir <dir> [OPTIONS]\n\nOPTIONS:\n  --data <path>          Required long-format radiance table (entity_id,date,value)\n  --oracle-dir <path>    Required directory of per-entity decomposition JSON\n  --entities <path>      Optional entity list (first column, order preserved)\n  --output <path>        Write per-entity artifacts and summary.csv to this directory\n  --config <path>        Detection parameters JSON (partial documents allowed)\n  --event-date <date>    Override the event date (YYYY-MM-DD)\n  --parallel             Fan entities out over the thread pool"
            );
            Ok(())
        }
        _ => Err(CliError::invalid_input(format!(
            "unknown command '{command}'; expected: run"
        ))),
    }
}

fn handle_run(args: RunArgs) -> Result<(), CliError> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(event_date) = args.event_date {
        config.event_date = event_date;
    }

    let raw = fs::read_to_string(&args.data).map_err(|err| {
        CliError::io(format!("failed reading '{}'", args.data.display()), err)
    })?;
    let mut inputs = parse_data_table(&raw)?;

    if let Some(entities_path) = &args.entities {
        let raw = fs::read_to_string(entities_path).map_err(|err| {
            CliError::io(
                format!("failed reading '{}'", entities_path.display()),
                err,
            )
        })?;
        inputs = select_entities(inputs, &parse_entity_list(&raw));
    }
    if inputs.is_empty() {
        return Err(CliError::invalid_input(format!(
            "no entities found in '{}'",
            args.data.display()
        )));
    }
    tracing::info!(
        entities = inputs.len(),
        data = %args.data.display(),
        "loaded radiance table"
    );

    let oracle = FileOracle::new(args.oracle_dir.clone());
    let options = RunOptions {
        parallel: args.parallel,
        output_dir: args.output.clone(),
    };
    let run = run_batch(&inputs, &oracle, &config, &options)?;

    let payload = build_run_output(&args, &run, inputs.len());
    write_json_output(&payload)
}

fn build_run_output(args: &RunArgs, run: &BatchRun, entities: usize) -> RunOutput {
    let counters = run.summary.counters();
    let rejections = run
        .outcomes
        .iter()
        .filter_map(|(id, outcome)| match outcome {
            EntityOutcome::Completed(_) => None,
            EntityOutcome::Skipped(reason) => Some(RejectionOutput {
                entity: id.to_string(),
                kind: reason.code(),
                detail: reason.to_string(),
            }),
            EntityOutcome::Failed(cause) => Some(RejectionOutput {
                entity: id.to_string(),
                kind: "failed",
                detail: cause.clone(),
            }),
        })
        .collect();

    RunOutput {
        command: "run",
        data: args.data.display().to_string(),
        entities,
        processed: counters.processed,
        skipped: counters.skipped,
        errored: counters.errored,
        output_dir: args.output.as_ref().map(|p| p.display().to_string()),
        results: run.summary.results().to_vec(),
        rejections,
    }
}

fn load_config(path: Option<&Path>) -> Result<DetectionConfig, CliError> {
    let Some(path) = path else {
        return Ok(DetectionConfig::default());
    };
    let raw = fs::read_to_string(path)
        .map_err(|err| CliError::io(format!("failed reading '{}'", path.display()), err))?;
    serde_json::from_str(&raw).map_err(|err| {
        CliError::json(format!("failed parsing config '{}'", path.display()), err)
    })
}

/// Parses the long-format radiance table: `entity_id,date,value` rows,
/// optional header, rows grouped per entity in first-seen order.
///
/// A blank or `NA` value cell is a missing observation and is dropped. A row
/// that names an entity but fails to parse poisons that entity only; the
/// entity surfaces as errored, not the whole table.
fn parse_data_table(raw: &str) -> Result<Vec<EntityInput>, CliError> {
    let mut order: Vec<String> = Vec::new();
    let mut rows: HashMap<String, Result<Vec<(NaiveDate, f64)>, DrdError>> = HashMap::new();

    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();
        if fields.len() != 3 {
            return Err(CliError::invalid_input(format!(
                "data row {} has {} fields, expected entity_id,date,value",
                line_no + 1,
                fields.len()
            )));
        }
        let (id, date_raw, value_raw) = (fields[0], fields[1], fields[2]);

        let date = match NaiveDate::parse_from_str(date_raw, "%Y-%m-%d") {
            Ok(date) => date,
            Err(_) if line_no == 0 => continue, // header row
            Err(_) => {
                register_entity(&mut order, &mut rows, id);
                poison_entity(
                    &mut rows,
                    id,
                    format!("row {}: invalid date '{date_raw}'", line_no + 1),
                );
                continue;
            }
        };

        register_entity(&mut order, &mut rows, id);
        if value_raw.is_empty() || value_raw.eq_ignore_ascii_case("na") {
            continue; // missing observation
        }
        let value = match value_raw.parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                poison_entity(
                    &mut rows,
                    id,
                    format!("row {}: invalid value '{value_raw}'", line_no + 1),
                );
                continue;
            }
        };
        if let Some(Ok(entity_rows)) = rows.get_mut(id) {
            entity_rows.push((date, value));
        }
    }

    let inputs = order
        .into_iter()
        .map(|id| {
            let entity_id = EntityId::new(id.clone());
            match rows.remove(&id) {
                Some(Ok(entity_rows)) => build_input(entity_id, entity_rows),
                Some(Err(err)) => EntityInput::load_failed(entity_id, err),
                None => EntityInput::load_failed(
                    entity_id,
                    DrdError::invalid_input("no observations for entity"),
                ),
            }
        })
        .collect();
    Ok(inputs)
}

fn register_entity(
    order: &mut Vec<String>,
    rows: &mut HashMap<String, Result<Vec<(NaiveDate, f64)>, DrdError>>,
    id: &str,
) {
    if !rows.contains_key(id) {
        order.push(id.to_string());
        rows.insert(id.to_string(), Ok(Vec::new()));
    }
}

fn poison_entity(
    rows: &mut HashMap<String, Result<Vec<(NaiveDate, f64)>, DrdError>>,
    id: &str,
    detail: String,
) {
    if let Some(entry) = rows.get_mut(id) {
        if entry.is_ok() {
            *entry = Err(DrdError::invalid_input(detail));
        }
    }
}

fn build_input(id: EntityId, entity_rows: Vec<(NaiveDate, f64)>) -> EntityInput {
    if entity_rows.is_empty() {
        return EntityInput::load_failed(
            id,
            DrdError::invalid_input("no observations for entity"),
        );
    }
    let (dates, values): (Vec<NaiveDate>, Vec<f64>) = entity_rows.into_iter().unzip();
    match ObservationSeries::new(id.clone(), dates, values) {
        Ok(series) => EntityInput::ready(series),
        Err(err) => EntityInput::load_failed(id, err),
    }
}

/// First column of each line, deduplicated, order preserved.
fn parse_entity_list(raw: &str) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let id = line.split(',').next().unwrap_or("").trim();
        if id.is_empty() {
            continue;
        }
        if line_no == 0 && id.eq_ignore_ascii_case("entity_id") {
            continue;
        }
        if !seen.iter().any(|s| s == id) {
            seen.push(id.to_string());
        }
    }
    seen
}

/// Restricts inputs to the listed entities, in list order. A listed entity
/// with no data rows becomes a load failure so the run still accounts for it.
fn select_entities(inputs: Vec<EntityInput>, ids: &[String]) -> Vec<EntityInput> {
    let mut by_id: HashMap<String, EntityInput> = inputs
        .into_iter()
        .map(|input| (input.id().to_string(), input))
        .collect();
    ids.iter()
        .map(|id| {
            by_id.remove(id).unwrap_or_else(|| {
                EntityInput::load_failed(
                    EntityId::new(id.clone()),
                    DrdError::invalid_input("no observations for entity"),
                )
            })
        })
        .collect()
}

fn write_json_output<T: Serialize>(payload: &T) -> Result<(), CliError> {
    let encoded = serde_json::to_string_pretty(payload)
        .map_err(|source| CliError::json("failed to serialize JSON output", source))?;
    println!("{encoded}");
    Ok(())
}

fn emit_structured_error(err: &CliError) {
    let envelope = ErrorEnvelope {
        error: ErrorPayload {
            code: err.code().to_string(),
            message: err.to_string(),
        },
    };

    match serde_json::to_string_pretty(&envelope) {
        Ok(json) => eprintln!("{json}"),
        Err(_) => eprintln!(
            "{{\"error\":{{\"code\":\"{}\",\"message\":\"{}\"}}}}",
            err.code(),
            err
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::{
        handle_run, parse_data_table, parse_entity_list, parse_run_args, select_entities,
        split_flag, RunArgs,
    };
    use chrono::NaiveDate;
    use std::io::Write;
    use std::path::PathBuf;

    fn args(tokens: &[&str]) -> Vec<String> {
        tokens.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn run_args_require_data_and_oracle_dir() {
        let err = parse_run_args(&args(&["--data", "/tmp/t.csv"]))
            .expect_err("missing oracle dir must fail");
        assert!(err.to_string().contains("--oracle-dir"));

        let parsed = parse_run_args(&args(&[
            "--data",
            "/tmp/t.csv",
            "--oracle-dir",
            "/tmp/oracle",
            "--parallel",
            "--event-date",
            "2022-02-05",
        ]))
        .expect("full args should parse");
        assert!(parsed.parallel);
        assert_eq!(
            parsed.event_date,
            Some(NaiveDate::from_ymd_opt(2022, 2, 5).expect("valid date"))
        );
    }

    #[test]
    fn inline_flag_values_are_accepted() {
        let parsed = parse_run_args(&args(&[
            "--data=/tmp/t.csv",
            "--oracle-dir=/tmp/oracle",
        ]))
        .expect("inline values should parse");
        assert_eq!(parsed.data, PathBuf::from("/tmp/t.csv"));
    }

    #[test]
    fn positional_arguments_are_rejected() {
        let err = split_flag("table.csv").expect_err("positional must fail");
        assert!(err.to_string().contains("unexpected positional"));
    }

    #[test]
    fn data_table_groups_rows_per_entity_in_first_seen_order() {
        let raw = "entity_id,date,value\n\
                   S2,2022-01-01,1.0\n\
                   S1,2022-01-01,0.5\n\
                   S2,2022-01-02,1.1\n";
        let inputs = parse_data_table(raw).expect("table should parse");
        let ids: Vec<String> = inputs.iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["S2", "S1"]);
    }

    #[test]
    fn blank_and_na_values_are_dropped_as_missing() {
        let raw = "S1,2022-01-01,1.0\nS1,2022-01-02,\nS1,2022-01-03,NA\nS1,2022-01-04,1.2\n";
        let inputs = parse_data_table(raw).expect("table should parse");
        assert_eq!(inputs.len(), 1);
        // Two surviving rows; the series builds cleanly.
        assert!(matches!(
            &inputs[0],
            input if input.id().as_str() == "S1"
        ));
    }

    #[test]
    fn bad_value_poisons_only_its_entity() {
        let raw = "S1,2022-01-01,abc\nS2,2022-01-01,1.0\nS2,2022-01-02,1.1\n";
        let inputs = parse_data_table(raw).expect("table should parse");
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0].id().as_str(), "S1");
        // S1 carries a load error; the batch will count it as errored.
    }

    #[test]
    fn malformed_row_shape_fails_the_whole_table() {
        let err = parse_data_table("S1,2022-01-01\n").expect_err("two fields must fail");
        assert!(err.to_string().contains("expected entity_id,date,value"));
    }

    #[test]
    fn entity_list_takes_first_column_and_deduplicates() {
        let raw = "entity_id,region\nS2,a\nS1,b\nS2,a\n\nS3,c\n";
        assert_eq!(parse_entity_list(raw), vec!["S2", "S1", "S3"]);
    }

    #[test]
    fn select_entities_preserves_list_order_and_flags_missing() {
        let raw = "S1,2022-01-01,1.0\nS1,2022-01-02,1.1\n";
        let inputs = parse_data_table(raw).expect("table should parse");
        let selected = select_entities(inputs, &["S9".to_string(), "S1".to_string()]);
        let ids: Vec<String> = selected.iter().map(|i| i.id().to_string()).collect();
        assert_eq!(ids, vec!["S9", "S1"]);
    }

    #[test]
    fn end_to_end_run_writes_summary_and_artifacts() {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let data_path = dir.path().join("data.csv");
        let oracle_dir = dir.path().join("oracle");
        let output_dir = dir.path().join("out");
        std::fs::create_dir_all(&oracle_dir).expect("oracle dir");

        // 400 daily rows starting 2021-11-01; index 96 is 2022-02-05.
        let start = NaiveDate::from_ymd_opt(2021, 11, 1).expect("valid date");
        let mut data = String::from("entity_id,date,value\n");
        let mut trend = Vec::with_capacity(400);
        for i in 0..400u64 {
            let date = start + chrono::Days::new(i);
            let (level, fitted) = if i <= 96 { (1.0, 1.0) } else { (0.55, 0.8) };
            let ripple = 0.02 * ((i % 5) as f64 - 2.0);
            data.push_str(&format!("S1,{date},{}\n", level + ripple));
            trend.push(fitted);
        }
        std::fs::write(&data_path, data).expect("write data");

        let document = serde_json::json!({ "trend": trend, "changepoints": [96.0] });
        let mut file =
            std::fs::File::create(oracle_dir.join("S1.json")).expect("create document");
        write!(file, "{document}").expect("write document");

        let run_args = RunArgs {
            data: data_path,
            oracle_dir,
            entities: None,
            output: Some(output_dir.clone()),
            config: None,
            event_date: None,
            parallel: false,
        };
        handle_run(run_args).expect("run should succeed");

        let summary = std::fs::read_to_string(output_dir.join("summary.csv"))
            .expect("summary should exist");
        assert!(summary.contains("S1,2022-02-05,96,"));
        assert!(output_dir.join("S1").join("series.csv").is_file());
    }
}

mod render;

use std::fs;
use std::path::Path;
use std::process;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use hl7_toolchain_core::grammar::{dump::to_pretty_json, emit::generate, parser::parse_str};
use hl7_toolchain_core::variables::{Instance, InstanceSet, VariableMatcher, VariableSummary};
use hl7_toolchain_diagnostics::{self as diag, Diagnostic, Severity};
use hl7_toolchain_profile::{EditorProfile, load_profile_from_str};
use serde::Serialize;

use crate::render::{Format, display_segments, print_summary, render_diagnostics};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "hl7",
    version,
    about = "HL7 toolchain: parse, check, format, and fill HL7 v2.x message templates"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    // ── File analysis ───────────────────────────────────────────────
    /// Parse an HL7 file and print its message tree.
    Parse { file: String },

    /// Syntax-check an HL7 file.
    Check {
        file: String,
        /// Treat warnings as errors.
        #[arg(long)]
        strict: bool,
    },

    // ── File transformation ─────────────────────────────────────────
    /// Regenerate an HL7 file (normalizes segment terminators to `\r`).
    Format {
        file: String,
        /// Write formatted output back to the file (in-place).
        #[arg(long, short, conflicts_with = "check")]
        write: bool,
        /// Check if the file is already formatted (exit 1 if not). For CI.
        #[arg(long, conflicts_with = "write")]
        check: bool,
    },

    // ── Templates ───────────────────────────────────────────────────
    /// List the placeholder variables in a template.
    Vars {
        file: String,
        /// Editor profile JSON (placeholder keyword, instance cap).
        #[arg(long)]
        profile: Option<String>,
    },

    /// Fill a template once per instance.
    Fill {
        file: String,
        /// JSON array of instances: `[{"id", "name", "variable_values"}]`.
        #[arg(long)]
        instances: String,
        /// Editor profile JSON (see `vars --help`).
        #[arg(long)]
        profile: Option<String>,
        /// Write each output to `<DIR>/<instance id>.hl7` instead of stdout.
        #[arg(long)]
        out_dir: Option<String>,
    },

    // ── Reference ───────────────────────────────────────────────────
    /// Explain a diagnostic ID (e.g. HL71001).
    Explain { id: String },
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    let format = Format::resolve_or_detect(cli.output.as_deref());

    match cli.cmd {
        Cmd::Parse { file } => cmd_parse(&file, format)?,
        Cmd::Check { file, strict } => cmd_check(&file, strict, format)?,
        Cmd::Format { file, write, check } => cmd_format(&file, write, check, format)?,
        Cmd::Vars { file, profile } => cmd_vars(&file, profile.as_deref(), format)?,
        Cmd::Fill {
            file,
            instances,
            profile,
            out_dir,
        } => cmd_fill(
            &file,
            &instances,
            profile.as_deref(),
            out_dir.as_deref(),
            format,
        )?,
        Cmd::Explain { id } => cmd_explain(&id, format)?,
    }

    Ok(())
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_parse(file: &str, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let res = parse_str(&input);

    match format {
        Format::Json => {
            // Single valid JSON object to stdout.
            let out = serde_json::json!({
                "message": res.message,
                "delimiters": res.delimiters,
                "diagnostics": res.diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            // Tree to stdout, diagnostics to stderr.
            println!("{}", to_pretty_json(&res.message));
            if !res.diagnostics.is_empty() {
                render_diagnostics(&input, file, &res.diagnostics, format);
                print_summary(&res.diagnostics);
            }
        }
    }

    exit_on_errors(&res.diagnostics, false);
    Ok(())
}

fn cmd_check(file: &str, strict: bool, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let res = parse_str(&input);
    let ok = !res.diagnostics.iter().any(|d| fails(d, strict));

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "ok": ok,
                "segments": res.message.segments.len(),
                "diagnostics": res.diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            render_diagnostics(&input, file, &res.diagnostics, format);
            print_summary(&res.diagnostics);
            if ok {
                eprintln!("syntax ok ({} segments)", res.message.segments.len());
            }
        }
    }

    exit_on_errors(&res.diagnostics, strict);
    Ok(())
}

fn cmd_format(file: &str, write: bool, check: bool, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let res = parse_str(&input);

    // Surface parse diagnostics so the user knows if the input has issues.
    // In JSON mode stdout carries the status object only.
    if !res.diagnostics.is_empty() && format == Format::Pretty {
        render_diagnostics(&input, file, &res.diagnostics, format);
        print_summary(&res.diagnostics);
    }

    let formatted = generate(&res.message);
    let already_formatted = formatted == input;

    if check {
        status_message(
            format,
            already_formatted,
            "already formatted",
            "not formatted",
            file,
        );
        if !already_formatted {
            process::exit(1);
        }
    } else if write {
        if !already_formatted {
            fs::write(file, &formatted).with_context(|| format!("failed to write '{file}'"))?;
        }
        status_message(
            format,
            !already_formatted,
            "formatted",
            "already formatted",
            file,
        );
    } else {
        // Default: formatted output to stdout, byte-exact.
        print!("{formatted}");
    }

    Ok(())
}

fn cmd_vars(file: &str, profile_path: Option<&str>, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let profile = load_profile(profile_path)?;
    let matcher = matcher_for(&profile)?;
    let vars = matcher.extract_unique_variables(&parse_str(&input).message);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&vars)?),
        Format::Pretty => {
            if vars.is_empty() {
                eprintln!("no variables found (marker: {})", matcher.marker());
            }
            for var in &vars {
                println!("{}", describe_variable(var));
            }
        }
    }
    Ok(())
}

/// One instance's result, as reported by `fill`.
#[derive(Debug, Serialize)]
struct FillResult<'a> {
    id: &'a str,
    name: &'a str,
    serialized_hl7: String,
    has_unfilled_variables: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

fn cmd_fill(
    file: &str,
    instances_path: &str,
    profile_path: Option<&str>,
    out_dir: Option<&str>,
    format: Format,
) -> Result<()> {
    let input = read_input(file)?;
    let profile = load_profile(profile_path)?;
    let matcher = matcher_for(&profile)?;

    let raw = read_input(instances_path)?;
    let list: Vec<Instance> = serde_json::from_str(&raw)
        .with_context(|| format!("invalid instances file '{instances_path}'"))?;
    let set = InstanceSet::from_instances(list, profile.instances.max_instances)
        .with_context(|| format!("cannot load instances from '{instances_path}'"))?;
    if set.is_empty() {
        bail!("instances file '{instances_path}' contains no instances");
    }

    let template = matcher.apply_variable_editability(&parse_str(&input).message);
    if let Some(dir) = out_dir {
        fs::create_dir_all(dir).with_context(|| format!("failed to create '{dir}'"))?;
    }

    let mut results = Vec::with_capacity(set.len());
    for instance in set.iter() {
        let output = matcher.compute_instance_output(&instance.variable_values, &template);
        if output.has_unfilled_variables {
            log::info!("instance {} still has unfilled variables", instance.id);
        }
        let path = match out_dir {
            Some(dir) => {
                let path = Path::new(dir).join(format!("{}.hl7", instance.id));
                fs::write(&path, &output.serialized_hl7)
                    .with_context(|| format!("failed to write '{}'", path.display()))?;
                Some(path.to_string_lossy().into_owned())
            }
            None => None,
        };
        results.push(FillResult {
            id: &instance.id,
            name: &instance.name,
            serialized_hl7: output.serialized_hl7,
            has_unfilled_variables: output.has_unfilled_variables,
            path,
        });
    }

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&results)?),
        Format::Pretty => {
            for r in &results {
                let flag = if r.has_unfilled_variables {
                    " (unfilled variables)"
                } else {
                    ""
                };
                eprintln!("── {} [{}]{flag}", r.name, r.id);
                match &r.path {
                    Some(path) => eprintln!("wrote {path}"),
                    None => println!("{}", display_segments(&r.serialized_hl7)),
                }
            }
        }
    }
    Ok(())
}

fn cmd_explain(id: &str, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "id": id,
                "severity": diag::default_severity(id),
                "explanation": diag::explain(id),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            // Explanation is the expected output, so it goes to stdout.
            if let Some(text) = diag::explain(id) {
                use ariadne::Fmt;
                println!("{}: {}", id.fg(ariadne::Color::Cyan), text);
            } else {
                println!("{id}: (no explanation available)");
            }
        }
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn read_input(path: &str) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read '{path}'"))
}

fn load_profile(path: Option<&str>) -> Result<EditorProfile> {
    let Some(path) = path else {
        return Ok(EditorProfile::default());
    };
    let s = read_input(path)?;
    load_profile_from_str(&s).with_context(|| format!("invalid profile '{path}'"))
}

fn matcher_for(profile: &EditorProfile) -> Result<VariableMatcher> {
    VariableMatcher::new(&profile.variables.marker)
        .with_context(|| format!("unusable marker '{}'", profile.variables.marker))
}

fn describe_variable(var: &VariableSummary) -> String {
    let group = var
        .group_id
        .map_or_else(|| "standalone".to_string(), |g| format!("group {g}"));
    let places: Vec<String> = var
        .field_positions
        .iter()
        .map(|p| match p.repetition {
            Some(r) => format!("{}-{}[{r}]", p.segment_name, p.position),
            None => format!("{}-{}", p.segment_name, p.position),
        })
        .collect();
    format!(
        "{}  {group}  x{}  {}",
        var.variable_id,
        var.occurrence_count,
        places.join(", ")
    )
}

fn fails(d: &Diagnostic, strict: bool) -> bool {
    match d.severity {
        Severity::Error => true,
        Severity::Warn => strict,
        _ => false,
    }
}

/// Exit with code 1 if any diagnostic is an error (or a warning, when
/// `strict`). Info never causes a non-zero exit.
fn exit_on_errors(diagnostics: &[Diagnostic], strict: bool) {
    if diagnostics.iter().any(|d| fails(d, strict)) {
        process::exit(1);
    }
}

fn status_message(format: Format, condition: bool, if_true: &str, if_false: &str, file: &str) {
    let msg = if condition { if_true } else { if_false };
    match format {
        Format::Json => {
            let out = serde_json::json!({ "status": msg, "file": file });
            println!(
                "{}",
                serde_json::to_string_pretty(&out).expect("status JSON serialization cannot fail")
            );
        }
        Format::Pretty => eprintln!("{msg}: {file}"),
    }
}

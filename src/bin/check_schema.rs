//! Check schema files: parse every file, link and validate the combined schema, print
//! the diagnostics.
//!
//! Usage:
//!   check_schema [OPTIONS] FILE.xml ...
//!
//! Options:
//!   --warn-as-err               Treat warnings as errors
//!   --force-version N           Validate for protocol version N (at most the schema version)
//!   --min-remote-version N      Oldest remote version that must still be supported
//!
//! Diagnostics are printed as `file:line: level: message`. Exit code 1 on failure.
//! Set `RUST_LOG=info` (or `debug`) to follow the passes.

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;
use wiredsl::{Protocol, ProtocolConfig, Severity};

/// Remove `flag` and return the value following it.
fn take_value(args: &mut Vec<String>, flag: &str) -> anyhow::Result<Option<u32>> {
    let Some(pos) = args.iter().position(|a| a == flag) else {
        return Ok(None);
    };
    args.remove(pos);
    if pos >= args.len() {
        bail!("{} requires a value", flag);
    }
    let raw = args.remove(pos);
    let value = raw
        .parse()
        .with_context(|| format!("{}: invalid version \"{}\"", flag, raw))?;
    Ok(Some(value))
}

fn take_flag(args: &mut Vec<String>, flag: &str) -> bool {
    if let Some(pos) = args.iter().position(|a| a == flag) {
        args.remove(pos);
        true
    } else {
        false
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let mut args: Vec<String> = std::env::args().skip(1).collect();
    let mut config = ProtocolConfig::default().warn_as_error(take_flag(&mut args, "--warn-as-err"));
    if let Some(version) = take_value(&mut args, "--force-version")? {
        config = config.forced_version(version);
    }
    if let Some(version) = take_value(&mut args, "--min-remote-version")? {
        config = config.min_remote_version(version);
    }
    if args.is_empty() {
        bail!("usage: check_schema [--warn-as-err] [--force-version N] [--min-remote-version N] FILE...");
    }

    let mut protocol = Protocol::with_config(config);
    let mut ok = true;
    for path in &args {
        ok &= protocol.parse_file(path);
    }
    ok = ok && protocol.validate();

    let diagnostics = protocol.diagnostics();
    for d in diagnostics.messages() {
        if d.severity < Severity::Warning {
            continue;
        }
        if d.line > 0 {
            println!("{}:{}: {}: {}", d.source, d.line, d.severity, d.message);
        } else {
            println!("{}: {}: {}", d.source, d.severity, d.message);
        }
    }
    let (errors, warnings) = (diagnostics.error_count(), diagnostics.warning_count());
    if errors > 0 || warnings > 0 {
        eprintln!("check_schema: {} error(s), {} warning(s)", errors, warnings);
    }
    if !ok {
        std::process::exit(1);
    }
    if let Some(schema) = protocol.schema() {
        eprintln!(
            "{}: schema \"{}\" version {}, {} message(s)",
            args.join(", "),
            schema.name,
            schema.version,
            protocol.all_messages().len()
        );
    }
    Ok(())
}

//! Argument definitions and option assembly

use anyhow::{bail, Context, Result};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use fabric_core::Mode;
use indexmap::IndexMap;
use serde_json::Value as JsonValue;
use std::path::{Path, PathBuf};

pub(crate) const DEFAULT_PASSWORD_ENV: &str = "FABRIC_PASSWORD";

pub(crate) fn command() -> Command {
    Command::new("fabric-reconcile")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Converge one controller object declared in an object-type catalog")
        .arg(
            Arg::new("catalog")
                .long("catalog")
                .required(true)
                .value_parser(value_parser!(PathBuf))
                .help("Object-type catalog (YAML, or TOML by extension)"),
        )
        .arg(
            Arg::new("object")
                .long("object")
                .required(true)
                .help("Object type name from the catalog"),
        )
        .arg(
            Arg::new("state")
                .long("state")
                .default_value("present")
                .value_parser(["present", "absent", "query"])
                .help("Desired end state"),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .action(ArgAction::Append)
                .value_name("OPTION=VALUE")
                .help("Set one object option; repeatable"),
        )
        .arg(
            Arg::new("params")
                .long("params")
                .value_parser(value_parser!(PathBuf))
                .help("YAML mapping of object options"),
        )
        .arg(
            Arg::new("check")
                .long("check")
                .action(ArgAction::SetTrue)
                .help("Compute changes without submitting them"),
        )
        .arg(
            Arg::new("host")
                .long("host")
                .env("FABRIC_HOST")
                .required(true)
                .help("Controller host name or address"),
        )
        .arg(
            Arg::new("username")
                .long("username")
                .env("FABRIC_USERNAME")
                .default_value("admin")
                .help("Login user"),
        )
        .arg(
            Arg::new("password-env")
                .long("password-env")
                .default_value(DEFAULT_PASSWORD_ENV)
                .help("Environment variable holding the login password"),
        )
        .arg(
            Arg::new("protocol")
                .long("protocol")
                .default_value("https")
                .value_parser(["https", "http"])
                .help("URL scheme"),
        )
        .arg(
            Arg::new("no-verify")
                .long("no-verify")
                .action(ArgAction::SetTrue)
                .help("Accept the controller's certificate without verification"),
        )
        .arg(
            Arg::new("timeout")
                .long("timeout")
                .default_value("30")
                .value_parser(value_parser!(u64))
                .help("Per-request timeout in seconds"),
        )
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON lines on stderr"),
        )
}

/// Requested state
pub(crate) fn mode(matches: &ArgMatches) -> Result<Mode> {
    let state = string(matches, "state")?;
    state.parse::<Mode>().map_err(anyhow::Error::msg)
}

/// Required or defaulted string argument
pub(crate) fn string<'a>(matches: &'a ArgMatches, id: &str) -> Result<&'a str> {
    matches
        .get_one::<String>(id)
        .map(String::as_str)
        .with_context(|| format!("missing --{id}"))
}

/// Options from `--params` then `--set`, later entries overriding
pub(crate) fn options(matches: &ArgMatches) -> Result<IndexMap<String, JsonValue>> {
    let mut options = match matches.get_one::<PathBuf>("params") {
        Some(path) => read_params(path)?,
        None => IndexMap::new(),
    };
    for assignment in matches.get_many::<String>("set").into_iter().flatten() {
        let (name, value) = parse_set(assignment)?;
        options.insert(name, value);
    }
    Ok(options)
}

pub(crate) fn read_params(path: &Path) -> Result<IndexMap<String, JsonValue>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read params file {}", path.display()))?;
    let options: IndexMap<String, JsonValue> = serde_yaml::from_str(&text)
        .with_context(|| format!("params file {} is not a YAML mapping", path.display()))?;
    Ok(options)
}

/// `name=value`; the value is kept as text
pub(crate) fn parse_set(assignment: &str) -> Result<(String, JsonValue)> {
    let Some((name, value)) = assignment.split_once('=') else {
        bail!("--set expects OPTION=VALUE, got '{assignment}'");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("--set has an empty option name in '{assignment}'");
    }
    Ok((name.to_string(), JsonValue::String(value.to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn matches(args: &[&str]) -> ArgMatches {
        let mut argv = vec!["fabric-reconcile", "--catalog", "aci.yaml", "--object", "contract", "--host", "apic"];
        argv.extend_from_slice(args);
        command().try_get_matches_from(argv).unwrap()
    }

    #[test]
    fn set_parsing() {
        assert_eq!(parse_set("tenant=T1").unwrap(), ("tenant".to_string(), json!("T1")));
        assert_eq!(parse_set("descr=a=b").unwrap().1, json!("a=b"));
        assert!(parse_set("tenant").is_err());
        assert!(parse_set("=T1").is_err());
    }

    #[test]
    fn defaults() {
        let m = matches(&[]);
        assert_eq!(mode(&m).unwrap(), Mode::Present);
        assert_eq!(*m.get_one::<u64>("timeout").unwrap(), 30);
        assert!(!m.get_flag("check"));
        assert!(options(&m).unwrap().is_empty());
    }

    #[test]
    fn unknown_state_is_a_usage_error() {
        let argv = ["fabric-reconcile", "--catalog", "c.yaml", "--object", "o", "--host", "h", "--state", "gone"];
        assert!(command().try_get_matches_from(argv).is_err());
    }

    #[test]
    fn set_overrides_params_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("params.yaml");
        std::fs::write(&file, "tenant: T1\ncontract: C1\npriority: null\n").unwrap();

        let file = file.to_string_lossy().to_string();
        let m = matches(&["--params", &file, "--set", "contract=C2", "--state", "absent"]);
        let options = options(&m).unwrap();

        assert_eq!(mode(&m).unwrap(), Mode::Absent);
        assert_eq!(options.get("tenant"), Some(&json!("T1")));
        assert_eq!(options.get("contract"), Some(&json!("C2")));
        assert_eq!(options.get("priority"), Some(&JsonValue::Null));
    }

    #[test]
    fn non_mapping_params_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("params.yaml");
        std::fs::write(&file, "- just\n- a list\n").unwrap();
        assert!(read_params(&file).is_err());
    }
}

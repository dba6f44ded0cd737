use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::env;
use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::OnceLock;

fn placeholder_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").ok())
        .as_ref()
}

// Keep a value a single argument for shlex::split
fn quote_arg(v: &str) -> String {
    if v.chars().any(|c| c.is_whitespace() || c == '"' || c == '\'') {
        let escaped = v.replace('\\', "\\\\").replace('"', "\\\"");
        return format!("\"{escaped}\"");
    }
    v.to_string()
}

/// Expand `${VAR}` placeholders. `vars` wins over the environment; unknown
/// names expand to nothing.
pub fn expand_cmdline(cmdline: &str, vars: &HashMap<String, String>) -> String {
    let Some(re) = placeholder_re() else {
        return cmdline.to_string();
    };
    re.replace_all(cmdline, |caps: &regex::Captures| {
        let key = &caps[1];
        if let Some(v) = vars.get(key) {
            return quote_arg(v);
        }
        env::var(key).map(|v| quote_arg(&v)).unwrap_or_default()
    })
    .to_string()
}

fn command_for(cmdline: &str, vars: &HashMap<String, String>) -> Result<(Command, String)> {
    let expanded = expand_cmdline(cmdline, vars);
    let parts = shlex::split(&expanded).ok_or_else(|| anyhow!("Failed to parse command line"))?;
    let Some((program, args)) = parts.split_first() else {
        return Err(anyhow!("Empty command line"));
    };
    let mut cmd = Command::new(program);
    cmd.args(args).env("FORM_BUILDER_JSON", "1");
    Ok((cmd, expanded))
}

/// Run a command and parse its stdout as JSON.
pub fn run_cmdline_to_json(cmdline: &str, vars: &HashMap<String, String>) -> Result<JsonValue> {
    let (mut cmd, expanded) = command_for(cmdline, vars)?;
    let output = cmd
        .output()
        .with_context(|| format!("spawning {expanded}"))?;
    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(anyhow!("Command failed: {}\n{}", cmdline, err));
    }
    let text = String::from_utf8_lossy(&output.stdout).to_string();
    let v: JsonValue = serde_json::from_str(&text).with_context(|| "parsing command JSON")?;
    Ok(v)
}

/// Run a command with `input` on stdin and return its trimmed stdout.
pub fn run_cmdline_with_stdin(cmdline: &str, input: &str) -> Result<String> {
    let (mut cmd, expanded) = command_for(cmdline, &HashMap::new())?;
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .with_context(|| format!("spawning {expanded}"))?;
    if let Some(mut stdin) = child.stdin.take() {
        stdin
            .write_all(input.as_bytes())
            .with_context(|| "writing command stdin")?;
    }
    let output = child
        .wait_with_output()
        .with_context(|| format!("waiting for {expanded}"))?;
    if !output.status.success() {
        let err = String::from_utf8_lossy(&output.stderr).to_string();
        return Err(anyhow!("Command failed: {}\n{}", cmdline, err.trim()));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vars_override_environment_and_are_quoted() {
        let mut vars = HashMap::new();
        vars.insert("URL".to_string(), "http://host/a b".to_string());
        let out = expand_cmdline("curl -s ${URL} ${FORM_BUILDER_SURELY_UNSET}", &vars);
        assert_eq!(out, "curl -s \"http://host/a b\" ");
        assert_eq!(
            shlex::split(&out).unwrap(),
            vec!["curl", "-s", "http://host/a b"]
        );
    }

    #[test]
    fn json_command_output_is_parsed() {
        let v = run_cmdline_to_json(r#"echo '{"d": []}'"#, &HashMap::new()).unwrap();
        assert!(v["d"].as_array().unwrap().is_empty());
    }

    #[test]
    fn stdin_is_piped_to_the_command() {
        let out = run_cmdline_with_stdin("cat", "{\"name\":\"x\"}").unwrap();
        assert_eq!(out, "{\"name\":\"x\"}");
        assert!(run_cmdline_with_stdin("false", "").is_err());
        assert!(run_cmdline_with_stdin("   ", "").is_err());
    }
}

//! Shell-script assembly for multi-step CLI templates.
//!
//! All steps run inside one subprocess so working-directory and
//! environment changes persist across them. Each step's combined
//! stdout/stderr is captured into a `CMD_<i>_OUTPUT` shell variable, which
//! later steps may reference as `$CMD_<i>_OUTPUT` or `${CMD_<i>_OUTPUT}`;
//! the shell resolves those itself. Finally the selected outputs are
//! echoed: steps with `append_to_final_output` set decide explicitly, the
//! last step defaults to included, every other step to excluded.

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::error;

use utcp_core::types::call_template::CommandStep;
use utcp_core::types::JsonObject;

lazy_static! {
    static ref ARG_PLACEHOLDER: Regex =
        Regex::new(r"UTCP_ARG_([A-Za-z0-9_]+)_UTCP_END").unwrap();
}

fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Replace every `UTCP_ARG_<name>_UTCP_END` placeholder.
///
/// A placeholder with no matching argument substitutes the literal
/// `MISSING_ARG_<name>` so shell quoting stays intact; the miss is logged
/// and execution proceeds.
pub(crate) fn substitute_args(command: &str, args: &JsonObject) -> String {
    ARG_PLACEHOLDER
        .replace_all(command, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            match args.get(name) {
                Some(value) => scalar_string(value),
                None => {
                    error!(argument = %name, "no value for CLI placeholder");
                    format!("MISSING_ARG_{name}")
                }
            }
        })
        .into_owned()
}

fn step_appended(step: &CommandStep, index: usize, step_count: usize) -> bool {
    step.append_to_final_output
        .unwrap_or(index == step_count - 1)
}

/// POSIX script: capture each step, echo the selected outputs.
/// Deliberately no `set -e`; failing steps must surface their output to the
/// caller instead of aborting the script.
pub(crate) fn build_posix_script(steps: &[CommandStep], args: &JsonObject) -> String {
    let mut script = String::from("#!/bin/bash\n");
    for (index, step) in steps.iter().enumerate() {
        let command = substitute_args(&step.command, args);
        script.push_str(&format!("CMD_{index}_OUTPUT=$({command} 2>&1)\n"));
    }
    for (index, step) in steps.iter().enumerate() {
        if step_appended(step, index, steps.len()) {
            script.push_str(&format!("echo \"${{CMD_{index}_OUTPUT}}\"\n"));
        }
    }
    script
}

/// PowerShell script, same shape with `Out-String` capture.
pub(crate) fn build_powershell_script(steps: &[CommandStep], args: &JsonObject) -> String {
    let mut script = String::from("$ErrorActionPreference = \"Stop\"\n");
    for (index, step) in steps.iter().enumerate() {
        let command = substitute_args(&step.command, args);
        script.push_str(&format!(
            "$CMD_{index}_OUTPUT = {command} 2>&1 | Out-String\n"
        ));
    }
    for (index, step) in steps.iter().enumerate() {
        if step_appended(step, index, steps.len()) {
            script.push_str(&format!("Write-Output $CMD_{index}_OUTPUT\n"));
        }
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> JsonObject {
        value.as_object().unwrap().clone()
    }

    fn step(command: &str, append: Option<bool>) -> CommandStep {
        CommandStep {
            command: command.to_string(),
            append_to_final_output: append,
        }
    }

    #[test]
    fn test_placeholder_substitution() {
        let substituted = substitute_args(
            "grep UTCP_ARG_pattern_UTCP_END file_UTCP_ARG_index_UTCP_END.txt",
            &args(json!({"pattern": "error", "index": 3})),
        );
        assert_eq!(substituted, "grep error file_3.txt");
    }

    #[test]
    fn test_missing_placeholder_keeps_quoting_intact() {
        let substituted = substitute_args(
            "echo \"UTCP_ARG_absent_UTCP_END\"",
            &args(json!({})),
        );
        assert_eq!(substituted, "echo \"MISSING_ARG_absent\"");
    }

    #[test]
    fn test_posix_script_shape() {
        let script = build_posix_script(
            &[
                step("echo hello", Some(false)),
                step("echo prev=$CMD_0_OUTPUT", Some(true)),
            ],
            &args(json!({})),
        );
        assert_eq!(
            script,
            "#!/bin/bash\n\
             CMD_0_OUTPUT=$(echo hello 2>&1)\n\
             CMD_1_OUTPUT=$(echo prev=$CMD_0_OUTPUT 2>&1)\n\
             echo \"${CMD_1_OUTPUT}\"\n"
        );
        assert!(!script.contains("set -e"));
    }

    #[test]
    fn test_last_step_appends_by_default() {
        let script = build_posix_script(
            &[step("true", None), step("echo done", None)],
            &args(json!({})),
        );
        assert!(script.contains("echo \"${CMD_1_OUTPUT}\""));
        assert!(!script.contains("echo \"${CMD_0_OUTPUT}\""));
    }

    #[test]
    fn test_powershell_script_shape() {
        let script = build_powershell_script(&[step("Get-Date", None)], &args(json!({})));
        assert!(script.starts_with("$ErrorActionPreference = \"Stop\"\n"));
        assert!(script.contains("$CMD_0_OUTPUT = Get-Date 2>&1 | Out-String\n"));
        assert!(script.ends_with("Write-Output $CMD_0_OUTPUT\n"));
    }
}

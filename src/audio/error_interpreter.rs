//! Pure interpretation of the merge tool's stdout/stderr into a
//! disposition, isolated from process execution for easy testing.

use std::sync::OnceLock;

use regex::Regex;

/// What the merge tool's output tells us happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConverterOutcome {
    Success,
    Failed(String),
}

fn fatal_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)PHP (?:Warning|Fatal error):\s+(.*?)Stack trace").expect("static regex")
    })
}

fn err_block_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| vec![Regex::new(r"(?s)an error occured.*?Array.*?\)").expect("static regex")])
}

fn ignorable_error_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            Regex::new(r"(?i)failed to save key").expect("static regex"),
            Regex::new(r"(?i)implicit conversion from float").expect("static regex"),
            Regex::new(r"(?i)ffmpeg version .* or higher is .* likely to cause errors")
                .expect("static regex"),
        ]
    })
}

fn message_field_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?im)\[message\] => (.*)$").expect("static regex"))
}

/// Interpret the merge tool's output. The upstream tool prints to stdout
/// even on failure; `stdout` is searched for the word "error" first, then
/// for the specific error block shapes it's known to emit. A block is only
/// treated as fatal if it doesn't match any of the known-ignorable error
/// texts (a corrected version of the upstream check, which searched
/// `stdout` with the wrong, shadowed loop variable and so never matched
/// anything).
pub fn interpret(stdout: &str, stderr: &str, build_file_exists: bool) -> ConverterOutcome {
    if !stderr.trim().is_empty() {
        return ConverterOutcome::Failed(stderr.trim().to_string());
    }

    if Regex::new(r"(?i)error").expect("static regex").is_match(stdout) {
        if let Some(caps) = fatal_pattern().captures(stdout) {
            let msg = caps[1].trim().replace('\n', "\n     ");
            if !msg.is_empty() {
                return ConverterOutcome::Failed(msg);
            }
        }

        for pattern in err_block_patterns() {
            if let Some(block_match) = pattern.find(stdout) {
                let block = block_match.as_str();
                let is_ignorable = ignorable_error_patterns().iter().any(|ig| ig.is_match(block));
                if !is_ignorable {
                    if let Some(caps) = message_field_pattern().captures(block) {
                        return ConverterOutcome::Failed(caps[1].trim().to_string());
                    }
                    return ConverterOutcome::Failed(block.trim().to_string());
                }
            }
        }
    }

    if !build_file_exists {
        return ConverterOutcome::Failed(
            "No output file found, conversion or copying probably failed, but no error was reported"
                .to_string(),
        );
    }

    ConverterOutcome::Success
}

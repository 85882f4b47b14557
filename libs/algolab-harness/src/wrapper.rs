/// Harness Synthesizer
///
/// Turns raw user source into a standalone program that reads one input
/// from stdin, coerces it, calls the user's entry point and prints the
/// result on stdout.
///
/// Two flavours are produced:
/// - `wrap_user_code`: entry point detected from the source, input coerced
///   heuristically (see coerce.rs), arguments spread when the input is a list
/// - `problem_program`: entry point and parameter fixed by a `ProblemType`,
///   input already validated by the runner and passed as a JSON literal
///
/// Caught exceptions are written to stderr and the program exits with
/// `HARNESS_FAILURE_EXIT_CODE`, so the runner can tell them apart from an
/// interpreter crash.

use crate::problems::{OutputFormat, ProblemType};
use algolab_common::types::Language;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::sync::OnceLock;
use tracing::debug;

/// Exit status used by generated programs when user code throws
pub const HARNESS_FAILURE_EXIT_CODE: i64 = 3;

/// Used when nothing in the source looks like an entry point
pub const FALLBACK_ENTRY_POINT: &str = "solve";
/// Placeholder name used by exercise starter templates
pub const TEMPLATE_ENTRY_POINT: &str = "yourFunction";

const ENTRY_PLACEHOLDER: &str = "__ENTRY__";
const ANY_PLACEHOLDER: &str = "__ANY__";

/// How an entry point was found, in resolution order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryPointSource {
    /// `export [default] [async] function name(`
    ExplicitExport,
    /// `function name(` or `def name(`
    NamedDeclaration,
    /// `const|let|var name = (...)`, `= function`, `= async ...`, `= x =>`
    AssignedExpression,
    /// `yourFunction` if the source mentions it, otherwise `solve`
    FallbackConvention,
}

impl fmt::Display for EntryPointSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntryPointSource::ExplicitExport => "explicit export",
            EntryPointSource::NamedDeclaration => "named declaration",
            EntryPointSource::AssignedExpression => "assigned expression",
            EntryPointSource::FallbackConvention => "fallback convention",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryPoint {
    pub name: String,
    pub source: EntryPointSource,
}

fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("entry point pattern must compile")
}

fn js_patterns() -> &'static [(EntryPointSource, Regex)] {
    static PATTERNS: OnceLock<Vec<(EntryPointSource, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![
            (
                EntryPointSource::ExplicitExport,
                compile(r"\bexport\s+(?:default\s+)?(?:async\s+)?function(?:\s*\*\s*|\s+)([A-Za-z_$][\w$]*)\s*\("),
            ),
            (
                EntryPointSource::NamedDeclaration,
                compile(r"\bfunction(?:\s*\*\s*|\s+)([A-Za-z_$][\w$]*)\s*\("),
            ),
            (
                EntryPointSource::AssignedExpression,
                compile(r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\b\s*)?(?:\(|function\b|[A-Za-z_$][\w$]*\s*=>)"),
            ),
        ]
    })
}

fn python_patterns() -> &'static [(EntryPointSource, Regex)] {
    static PATTERNS: OnceLock<Vec<(EntryPointSource, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        vec![(
            EntryPointSource::NamedDeclaration,
            compile(r"(?m)^[ \t]*(?:async\s+)?def\s+([A-Za-z_]\w*)\s*\("),
        )]
    })
}

fn export_keyword() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        compile(r"(?m)^([ \t]*)export[ \t]+(?:default[ \t]+)?((?:async[ \t]+)?function\b|class\b|const\b|let\b|var\b)")
    })
}

fn export_list() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compile(r"(?m)^[ \t]*export[ \t]*\{[^}]*\}[ \t]*;?[ \t]*$"))
}

/// Turn ES module exports into plain declarations.
///
/// The harness reads stdin through `require`, which only exists when node
/// loads the file as CommonJS; any `export` makes it an ES module instead.
pub fn strip_module_exports(code: &str) -> Cow<'_, str> {
    match export_keyword().replace_all(code, "$1$2") {
        Cow::Borrowed(_) => export_list().replace_all(code, ""),
        Cow::Owned(stripped) => Cow::Owned(export_list().replace_all(&stripped, "").into_owned()),
    }
}

/// Find the function the harness should call.
///
/// Patterns are tried in `EntryPointSource` order; within one pattern the
/// earliest match in the source wins. Never fails: when nothing matches the
/// fallback convention is used.
pub fn detect_entry_point(code: &str, language: Language) -> EntryPoint {
    let patterns = match language {
        Language::JavaScript | Language::TypeScript => js_patterns(),
        Language::Python => python_patterns(),
    };

    for (source, pattern) in patterns {
        if let Some(name) = pattern.captures(code).and_then(|c| c.get(1)) {
            return EntryPoint {
                name: name.as_str().to_string(),
                source: *source,
            };
        }
    }

    let name = if code.contains(TEMPLATE_ENTRY_POINT) {
        TEMPLATE_ENTRY_POINT
    } else {
        FALLBACK_ENTRY_POINT
    };
    EntryPoint {
        name: name.to_string(),
        source: EntryPointSource::FallbackConvention,
    }
}

/// Append an input/invocation harness to user code.
///
/// `language` is matched case-insensitively against `javascript`,
/// `typescript` and `python`; for anything else the code is returned
/// unchanged and the caller must provide its own I/O handling.
pub fn wrap_user_code(code: &str, language: &str) -> String {
    let language: Language = match language.parse() {
        Ok(language) => language,
        Err(_) => {
            debug!(language = %language, "No harness for language, returning source unchanged");
            return code.to_string();
        }
    };

    let entry = detect_entry_point(code, language);
    debug!(
        language = %language,
        entry_point = %entry.name,
        detected_by = %entry.source,
        "Synthesizing harness"
    );

    let (code, harness) = match language {
        Language::JavaScript | Language::TypeScript => {
            let annotation = if language == Language::TypeScript { ": any" } else { "" };
            let harness = JS_HARNESS
                .replace(ANY_PLACEHOLDER, annotation)
                .replace(ENTRY_PLACEHOLDER, &entry.name);
            (strip_module_exports(code), harness)
        }
        Language::Python => (
            Cow::Borrowed(code),
            PYTHON_HARNESS.replace(ENTRY_PLACEHOLDER, &entry.name),
        ),
    };

    format!("{}\n\n{}", code.trim_end(), harness)
}

/// Build the fixed invocation wrapper for a built-in problem.
///
/// The generated JavaScript expects a function literally named after the
/// problem, reads the argument as JSON from stdin and prints the result with
/// the problem's stringification rule.
pub fn problem_program(code: &str, problem: ProblemType) -> String {
    let render = match problem.output_format() {
        OutputFormat::Display => "__result.toString()",
        OutputFormat::Json => "JSON.stringify(__result)",
    };

    let harness = PROBLEM_HARNESS
        .replace("__PARAM__", problem.parameter())
        .replace("__RENDER__", render)
        .replace(ENTRY_PLACEHOLDER, problem.entry_point());

    format!("{}\n\n{}", code.trim_end(), harness)
}

const PROBLEM_HARNESS: &str = r#"// Harness: reads the argument as JSON from stdin and calls __ENTRY__(__PARAM__).
;(function () {
  try {
    const __PARAM__ = JSON.parse(require('fs').readFileSync(0, 'utf8'));
    const __result = __ENTRY__(__PARAM__);
    process.stdout.write(String(__RENDER__));
  } catch (__error) {
    process.stderr.write(String(__error && __error.message !== undefined ? __error.message : __error));
    process.exitCode = 3;
  }
})();
"#;

const JS_HARNESS: &str = r#"// Harness: reads stdin, coerces it and calls __ENTRY__.
;(function () {
  const __isJsonShaped = (text__ANY__) =>
    (text.startsWith('[') && text.endsWith(']')) || (text.startsWith('{') && text.endsWith('}'));

  const __coerceToken = (token__ANY__) => {
    if (/^-?\d+$/.test(token)) return parseInt(token, 10);
    if (/^-?\d*\.\d+$/.test(token)) return parseFloat(token);
    if (__isJsonShaped(token)) {
      try {
        return JSON.parse(token);
      } catch (_) {
        return token;
      }
    }
    return token;
  };

  const __coerce = (raw__ANY__) => {
    const trimmed = raw.trim();
    if (trimmed === '') return raw;
    if (__isJsonShaped(trimmed)) {
      try {
        return JSON.parse(trimmed);
      } catch (_) {}
    }
    const tokens = trimmed.split(/[\s,]+/).filter((token__ANY__) => token.length > 0);
    if (tokens.length <= 1) return trimmed;
    return tokens.map(__coerceToken);
  };

  const __invoke = async (fn__ANY__, input__ANY__) => {
    if (Array.isArray(input)) {
      try {
        return await fn(...input);
      } catch (error__ANY__) {
        if (error instanceof TypeError || error instanceof RangeError) {
          return await fn(input);
        }
        throw error;
      }
    }
    return await fn(input);
  };

  const __render = (result__ANY__) =>
    typeof result === 'object' && result !== null ? JSON.stringify(result) : String(result);

  (async () => {
    const input = require('fs').readFileSync(0, 'utf8');
    return __invoke(__ENTRY__, __coerce(input));
  })().then(
    (result__ANY__) => {
      process.stdout.write(__render(result) + '\n');
    },
    (error__ANY__) => {
      process.stderr.write(String(error && error.message !== undefined ? error.message : error) + '\n');
      process.exitCode = 3;
    },
  );
})();
"#;

const PYTHON_HARNESS: &str = r#"# Harness: reads stdin, coerces it and calls __ENTRY__.
import asyncio as __harness_asyncio
import inspect as __harness_inspect
import json as __harness_json
import re as __harness_re
import sys as __harness_sys


def __harness_is_json_shaped(text):
    return (text.startswith("[") and text.endswith("]")) or (text.startswith("{") and text.endswith("}"))


def __harness_coerce_token(token):
    if __harness_re.fullmatch(r"-?\d+", token):
        return int(token)
    if __harness_re.fullmatch(r"-?\d*\.\d+", token):
        return float(token)
    if __harness_is_json_shaped(token):
        try:
            return __harness_json.loads(token)
        except ValueError:
            return token
    return token


def __harness_coerce(raw):
    trimmed = raw.strip()
    if trimmed == "":
        return raw
    if __harness_is_json_shaped(trimmed):
        try:
            return __harness_json.loads(trimmed)
        except ValueError:
            pass
    tokens = [token for token in __harness_re.split(r"[\s,]+", trimmed) if token]
    if len(tokens) <= 1:
        return trimmed
    return [__harness_coerce_token(token) for token in tokens]


def __harness_call(fn, *args):
    result = fn(*args)
    if __harness_inspect.iscoroutine(result):
        return __harness_asyncio.run(result)
    return result


def __harness_invoke(fn, value):
    if isinstance(value, list):
        try:
            return __harness_call(fn, *value)
        except TypeError:
            return __harness_call(fn, value)
    return __harness_call(fn, value)


def __harness_render(result):
    if isinstance(result, (dict, list, tuple)):
        return __harness_json.dumps(result, separators=(",", ":"))
    return str(result)


if __name__ == "__main__":
    try:
        __harness_result = __harness_invoke(__ENTRY__, __harness_coerce(__harness_sys.stdin.read()))
        print(__harness_render(__harness_result))
    except Exception as __harness_error:
        print(str(__harness_error), file=__harness_sys.stderr)
        __harness_sys.exit(3)
"#;

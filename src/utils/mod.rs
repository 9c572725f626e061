//! Small shared helpers: input validation and abstract text cleanup

use regex::Regex;
use std::sync::OnceLock;

/// Count whitespace-separated words in a problem statement
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

static DISPLAY_MATH: OnceLock<Regex> = OnceLock::new();
static INLINE_MATH: OnceLock<Regex> = OnceLock::new();
static SYMBOLS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
static FRAC: OnceLock<Regex> = OnceLock::new();
static TEXT_CMD: OnceLock<Regex> = OnceLock::new();
static EM_CMD: OnceLock<Regex> = OnceLock::new();
static BRACES: OnceLock<Regex> = OnceLock::new();
static COMMANDS: OnceLock<Regex> = OnceLock::new();
static SPACES: OnceLock<Regex> = OnceLock::new();

fn symbol_patterns() -> &'static Vec<(Regex, &'static str)> {
    SYMBOLS.get_or_init(|| {
        [
            (r"\\leq", "≤"),
            (r"\\geq", "≥"),
            (r"\\neq", "≠"),
            (r"\\approx", "≈"),
            (r"\\times", "×"),
            (r"\\div", "÷"),
            (r"\\pm", "±"),
            (r"\\infty", "∞"),
            (r"\\alpha", "α"),
            (r"\\beta", "β"),
            (r"\\gamma", "γ"),
            (r"\\delta", "δ"),
            (r"\\epsilon", "ε"),
            (r"\\theta", "θ"),
            (r"\\lambda", "λ"),
            (r"\\mu", "μ"),
            (r"\\sigma", "σ"),
            (r"\\pi", "π"),
            (r"\\lfloor", "⌊"),
            (r"\\rfloor", "⌋"),
            (r"\\lceil", "⌈"),
            (r"\\rceil", "⌉"),
        ]
        .into_iter()
        .map(|(pattern, replacement)| (Regex::new(pattern).unwrap(), replacement))
        .collect()
    })
}

/// Clean LaTeX and mathematical notation from text.
///
/// Worker responses carry paper abstracts straight from arXiv, which are
/// littered with inline math and LaTeX commands that render badly in the UI
/// and in reports.
pub fn clean_latex_from_text(text: &str) -> String {
    if text.is_empty() {
        return String::new();
    }

    let mut cleaned = text.to_string();

    // Strip math delimiters, keeping the content
    let display_math =
        DISPLAY_MATH.get_or_init(|| Regex::new(r"\$\$([^$]+)\$\$").unwrap());
    cleaned = display_math.replace_all(&cleaned, "$1").into_owned();
    let inline_math = INLINE_MATH.get_or_init(|| Regex::new(r"\$([^$]+)\$").unwrap());
    cleaned = inline_math.replace_all(&cleaned, "$1").into_owned();

    // Common symbol commands
    for (re, replacement) in symbol_patterns() {
        cleaned = re.replace_all(&cleaned, *replacement).into_owned();
    }

    // \frac{a}{b} -> (a/b)
    let frac = FRAC.get_or_init(|| Regex::new(r"\\frac\{([^}]+)\}\{([^}]+)\}").unwrap());
    cleaned = frac.replace_all(&cleaned, "($1/$2)").into_owned();

    // \text{...} and {\em ...} wrappers
    let text_cmd = TEXT_CMD.get_or_init(|| Regex::new(r"\\text\{([^}]+)\}").unwrap());
    cleaned = text_cmd.replace_all(&cleaned, "$1").into_owned();
    let em_cmd = EM_CMD.get_or_init(|| Regex::new(r"\{\\em\s+([^}]+)\}").unwrap());
    cleaned = em_cmd.replace_all(&cleaned, "$1").into_owned();

    // Remaining grouping braces and backslash commands
    let braces = BRACES.get_or_init(|| Regex::new(r"\{([^}]+)\}").unwrap());
    cleaned = braces.replace_all(&cleaned, "$1").into_owned();
    let commands = COMMANDS.get_or_init(|| Regex::new(r"\\([a-zA-Z]+)").unwrap());
    cleaned = commands.replace_all(&cleaned, "$1").into_owned();

    // Collapse whitespace
    let spaces = SPACES.get_or_init(|| Regex::new(r"\s+").unwrap());
    cleaned = spaces.replace_all(&cleaned, " ").into_owned();

    cleaned.trim().to_string()
}

/// Clean an abstract for display
pub fn clean_abstract(abstract_text: &str) -> String {
    clean_latex_from_text(abstract_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_count() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("one two three"), 3);
        assert_eq!(word_count("  padded   out  "), 2);
    }

    #[test]
    fn test_strips_math_delimiters() {
        assert_eq!(clean_latex_from_text("error of $O(n^2)$ time"), "error of O(n^2) time");
        assert_eq!(clean_latex_from_text("$$x + y$$"), "x + y");
    }

    #[test]
    fn test_replaces_symbol_commands() {
        assert_eq!(clean_latex_from_text(r"p \leq 0.05"), "p ≤ 0.05");
        assert_eq!(clean_latex_from_text(r"\alpha and \beta"), "α and β");
    }

    #[test]
    fn test_rewrites_fractions_and_wrappers() {
        assert_eq!(clean_latex_from_text(r"\frac{a}{b}"), "(a/b)");
        assert_eq!(clean_latex_from_text(r"\text{loss} is {\em low}"), "loss is low");
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(clean_latex_from_text("a   b\n\nc"), "a b c");
        assert_eq!(clean_abstract(""), "");
    }
}

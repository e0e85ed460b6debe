//! Normalisation: deterministic cleanup of OCR-generated Markdown.
//!
//! OCR models occasionally fall into generation loops, emitting the same
//! phrase (or the same LaTeX fragment) dozens of times. They also return bare
//! `![alt](src)` references that render as unstyled, full-width images. This
//! module applies three pure text passes:
//!
//! 1. Collapse runs of the known `$$ \hat{\text{O}} $$` formula artifact
//! 2. Collapse any fragment repeated, separated only by whitespace, at least
//!    [`NormalizeRules::min_repeats`] times
//! 3. Rewrite every image reference into a centred, captioned HTML block
//!
//! ## Rule Order
//!
//! The formula rule runs first. A long formula run would otherwise be caught
//! by the general rule and reported as generic repeated text. Image
//! rewriting runs last so the repetition scan never sees the HTML block.
//!
//! Annotation lines left by an earlier pass are opaque to every later pass
//! (and to a second run over the same text), so normalising twice gives the
//! same result as normalising once.

use crate::config::NormalizeRules;
use once_cell::sync::Lazy;
use regex::Regex;

/// Annotation replacing a run of the known formula artifact.
pub const FORMULA_ANNOTATION: &str = "\n*[LaTeX artifact removed]*\n";

/// Prefix of the annotation replacing a generic repetition run.
pub const REPETITION_PREFIX: &str = "*[Repetitive text removed: ";

const REPETITION_SUFFIX: &str = "...]*";

/// Normalise raw OCR output with the default thresholds.
pub fn normalize(input: &str) -> String {
    normalize_markdown(input, &NormalizeRules::default())
}

/// Apply all normalisation passes in order.
///
/// Never fails; text that matches no rule is returned unchanged.
pub fn normalize_markdown(input: &str, rules: &NormalizeRules) -> String {
    let s = outside_annotations(input, |t| collapse_formula_runs(t, rules.formula_min_run));
    let s = outside_annotations(&s, |t| collapse_repetitions(t, rules));
    outside_annotations(&s, format_images)
}

/// Apply `pass` to the text between annotation lines, copying those
/// lines through untouched.
fn outside_annotations(input: &str, pass: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chunk_start = 0;
    let mut pos = 0;
    for line in input.split_inclusive('\n') {
        if is_annotation(line.trim_end_matches(['\n', '\r'])) {
            out.push_str(&pass(&input[chunk_start..pos]));
            out.push_str(line);
            chunk_start = pos + line.len();
        }
        pos += line.len();
    }
    out.push_str(&pass(&input[chunk_start..]));
    out
}

fn is_annotation(line: &str) -> bool {
    line == FORMULA_ANNOTATION.trim_matches('\n')
        || (line.starts_with(REPETITION_PREFIX) && line.ends_with(REPETITION_SUFFIX))
}

// ── Rule 1: Known formula artifact ───────────────────────────────────────────

static RE_FORMULA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\$ \\hat\{\\text\{O\}\} \$\$").unwrap());

static RE_FORMULA_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:\$\$ \\hat\{\\text\{O\}\} \$\$\s*)+").unwrap());

fn collapse_formula_runs(input: &str, min_run: usize) -> String {
    RE_FORMULA_RUN
        .replace_all(input, |caps: &regex::Captures<'_>| {
            let run = &caps[0];
            if RE_FORMULA.find_iter(run).count() >= min_run {
                FORMULA_ANNOTATION.to_string()
            } else {
                run.to_string()
            }
        })
        .into_owned()
}

// ── Rule 2: Generic repetition collapse ──────────────────────────────────────
//
// Equivalent to `(.{N,})(\s+\1){M-1,}` with a greedy fragment, where `.` stops
// at line terminators. The `regex` crate has no backreferences, so the scan is
// explicit: at each position try the longest fragment first, and accept the
// first length that repeats often enough.

fn collapse_repetitions(input: &str, rules: &NormalizeRules) -> String {
    let chars: Vec<char> = input.chars().collect();
    let scan = RepetitionScan::new(&chars);
    let extra = rules.min_repeats.saturating_sub(1).max(1);
    let mut out = String::with_capacity(input.len());
    let mut i = 0;

    while i < chars.len() {
        match scan.run_at(i, rules.min_fragment_chars, extra) {
            Some((len, end)) => {
                let preview: String = chars[i..i + len.min(rules.preview_chars)]
                    .iter()
                    .collect();
                out.push('\n');
                out.push_str(REPETITION_PREFIX);
                out.push_str(&preview);
                out.push_str(REPETITION_SUFFIX);
                out.push('\n');
                i = end;
            }
            None => {
                out.push(chars[i]);
                i += 1;
            }
        }
    }

    out
}

/// Precomputed line ends and whitespace positions, so each start position
/// only tries fragment lengths that end right before whitespace.
struct RepetitionScan<'a> {
    chars: &'a [char],
    /// Index of the first line terminator at or after each position.
    line_end: Vec<usize>,
    /// Sorted indices of every whitespace char.
    whitespace: Vec<usize>,
}

impl<'a> RepetitionScan<'a> {
    fn new(chars: &'a [char]) -> Self {
        let mut line_end = vec![chars.len(); chars.len()];
        let mut next = chars.len();
        for i in (0..chars.len()).rev() {
            if is_line_terminator(chars[i]) {
                next = i;
            }
            line_end[i] = next;
        }
        let whitespace = chars
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_whitespace())
            .map(|(i, _)| i)
            .collect();
        Self {
            chars,
            line_end,
            whitespace,
        }
    }

    /// Returns `(fragment_len, run_end)` when a qualifying run starts at `start`.
    fn run_at(&self, start: usize, min_len: usize, extra: usize) -> Option<(usize, usize)> {
        let line_end = self.line_end[start];
        if line_end - start < min_len {
            return None;
        }

        // Longest fragment first; a repeat must begin with whitespace.
        let lo = self.whitespace.partition_point(|&p| p < start + min_len);
        let hi = self.whitespace.partition_point(|&p| p <= line_end);
        for &frag_end in self.whitespace[lo..hi].iter().rev() {
            let fragment = &self.chars[start..frag_end];
            let mut pos = frag_end;
            let mut repeats = 0;
            while let Some(next) = next_repeat(self.chars, pos, fragment) {
                pos = next;
                repeats += 1;
            }
            if repeats >= extra {
                return Some((fragment.len(), pos));
            }
        }

        None
    }
}

/// Match `\s+fragment` at `pos`, preferring the longest whitespace prefix.
fn next_repeat(chars: &[char], pos: usize, fragment: &[char]) -> Option<usize> {
    let ws = chars[pos..]
        .iter()
        .take_while(|c| c.is_whitespace())
        .count();
    (1..=ws).rev().find_map(|k| {
        let s = pos + k;
        chars[s..]
            .starts_with(fragment)
            .then_some(s + fragment.len())
    })
}

fn is_line_terminator(c: char) -> bool {
    matches!(c, '\n' | '\r' | '\u{2028}' | '\u{2029}')
}

// ── Rule 3: Image presentation blocks ────────────────────────────────────────

static RE_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[(.*?)\]\((.*?)\)").unwrap());

fn format_images(input: &str) -> String {
    RE_IMAGE
        .replace_all(input, |caps: &regex::Captures<'_>| {
            image_block(&caps[1], &caps[2])
        })
        .into_owned()
}

fn image_block(alt: &str, src: &str) -> String {
    let mut block = String::from(
        "\n<br>\n<div align=\"center\" style=\"margin: 20px 0; padding: 10px; \
         background: #f8f9fa; border-radius: 8px;\">\n",
    );
    block.push_str(&format!(
        "    <img src=\"{}\" alt=\"{}\" style=\"max-width: 100%; height: auto; \
         box-shadow: 0 4px 6px rgba(0,0,0,0.1);\">\n",
        escape_attr(src),
        escape_attr(alt)
    ));
    if !alt.is_empty() {
        block.push_str(&format!(
            "    <p style=\"font-size: 12px; color: #666; margin-top: 5px;\">{}</p>\n",
            escape_text(alt)
        ));
    }
    block.push_str("</div>\n<br>\n");
    block
}

fn escape_attr(s: &str) -> String {
    escape_text(s).replace('"', "&quot;")
}

fn escape_text(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

// ── Preview rendering ────────────────────────────────────────────────────────

static RE_BLOCK_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<(?:br|/div|/p)>|<(?:div|img|p) [^<>]*>"#).unwrap());

/// Render normalised Markdown as an HTML fragment for display.
///
/// Everything is escaped except the presentational tags emitted by the image
/// rule, so OCR text that happens to contain markup is shown literally.
pub fn render_preview(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 64);
    let mut last = 0;
    for tag in RE_BLOCK_TAG.find_iter(text) {
        out.push_str(&escape_text(&text[last..tag.start()]));
        out.push_str(tag.as_str());
        last = tag.end();
    }
    out.push_str(&escape_text(&text[last..]));
    out
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const FORMULA: &str = r"$$ \hat{\text{O}} $$";

    #[test]
    fn plain_text_unchanged() {
        let input = "# Title\n\nSome ordinary paragraph with words.";
        assert_eq!(normalize(input), input);
    }

    #[test]
    fn six_repeats_collapse_to_one_annotation() {
        let input = vec!["abcdef"; 6].join(" ");
        let result = normalize(&input);
        assert_eq!(result, "\n*[Repetitive text removed: abcdef...]*\n");
    }

    #[test]
    fn three_repeats_left_alone() {
        let input = vec!["abcdef"; 3].join(" ");
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn four_occurrences_below_threshold() {
        let input = vec!["abcdef"; 4].join(" ");
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn exactly_five_occurrences_collapse() {
        let input = vec!["hello"; 5].join(" ");
        assert!(normalize(&input).contains("*[Repetitive text removed: hello...]*"));
    }

    #[test]
    fn short_fragments_not_collapsed() {
        let input = vec!["abcd"; 10].join(" ");
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn preview_truncated_to_twenty_chars() {
        let phrase = "the model keeps saying this";
        let input = vec![phrase; 5].join("\n");
        let result = normalize(&input);
        assert!(
            result.contains("*[Repetitive text removed: the model keeps sayi...]*"),
            "got: {result:?}"
        );
    }

    #[test]
    fn repetition_keeps_surrounding_text() {
        let input = format!("Intro. {} Outro.", vec!["loop!"; 7].join(" "));
        let result = normalize(&input);
        assert!(result.starts_with("Intro. "), "got: {result:?}");
        assert!(result.ends_with(" Outro."), "got: {result:?}");
        assert_eq!(result.matches(REPETITION_PREFIX).count(), 1);
    }

    #[test]
    fn repeats_may_span_lines() {
        let input = vec!["Row of text"; 6].join("\n\n");
        let result = normalize(&input);
        assert_eq!(result.matches(REPETITION_PREFIX).count(), 1);
        assert!(!result.contains("Row of text\n"));
    }

    #[test]
    fn fragment_does_not_cross_newline() {
        // "ab\ncd" would be a five-char fragment if '.' matched newlines.
        let input = vec!["ab\ncd"; 6].join("\n");
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn custom_thresholds_apply() {
        let rules = NormalizeRules {
            min_fragment_chars: 3,
            min_repeats: 3,
            ..NormalizeRules::default()
        };
        let input = "xyz xyz xyz";
        let result = normalize_markdown(input, &rules);
        assert!(result.contains("*[Repetitive text removed: xyz...]*"));
    }

    #[test]
    fn formula_run_collapsed() {
        let input = format!("before\n{}\nafter", vec![FORMULA; 3].join("\n"));
        let result = normalize(&input);
        assert_eq!(result, format!("before\n{FORMULA_ANNOTATION}after"));
    }

    #[test]
    fn two_formulas_left_alone() {
        let input = format!("{FORMULA} {FORMULA}");
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn long_formula_run_uses_formula_annotation() {
        let input = vec![FORMULA; 8].join(" ");
        let result = normalize(&input);
        assert!(result.contains("LaTeX artifact removed"));
        assert!(!result.contains(REPETITION_PREFIX));
    }

    #[test]
    fn image_rewritten_with_caption() {
        let result = normalize("![cat](http://x/c.png)");
        assert!(result.contains("<img src=\"http://x/c.png\""), "got: {result}");
        assert!(result.contains(">cat</p>"), "got: {result}");
        assert!(result.contains("<div align=\"center\""));
        assert!(!result.contains("!["));
    }

    #[test]
    fn image_without_alt_has_no_caption() {
        let result = normalize("![](http://x/c.png)");
        assert!(result.contains("<img src=\"http://x/c.png\""));
        assert!(!result.contains("<p"), "got: {result}");
    }

    #[test]
    fn multiple_images_keep_order() {
        let result = normalize("![a](1.png) text ![b](2.png)");
        let first = result.find("1.png").unwrap();
        let second = result.find("2.png").unwrap();
        assert!(first < second);
        assert_eq!(result.matches("<img ").count(), 2);
        assert!(result.contains(" text "));
    }

    #[test]
    fn image_attributes_escaped() {
        let result = normalize(r#"![say "hi"](http://x/a.png?x=1&y=2)"#);
        assert!(result.contains("src=\"http://x/a.png?x=1&amp;y=2\""));
        assert!(result.contains("alt=\"say &quot;hi&quot;\""));
    }

    #[test]
    fn normalisation_is_idempotent() {
        let inputs = [
            "Hello".to_string(),
            vec!["abcdef"; 6].join(" "),
            format!("x {} y", vec![FORMULA; 4].join("\n")),
            "Intro\n\n![Figure 1](img-0.jpeg)\n\n![](img-1.jpeg)\nEnd".to_string(),
            format!(
                "{}\n\n![chart](https://h/c.png)",
                vec!["repeated line here"; 9].join("\n")
            ),
            (0..5)
                .map(|i| vec![format!("The quick brown fox jumps variant{i}"); 5].join(" "))
                .collect::<Vec<_>>()
                .join("\n"),
            vec![FORMULA; 3].join(" ") + "\n" + &vec![FORMULA; 3].join(" "),
        ];
        for input in inputs {
            let once = normalize(&input);
            let twice = normalize(&once);
            assert_eq!(once, twice, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn loops_sharing_a_prefix_stay_separate() {
        let input = (0..5)
            .map(|i| vec![format!("The quick brown fox jumps variant{i}"); 5].join(" "))
            .collect::<Vec<_>>()
            .join("\n");
        let result = normalize(&input);
        assert_eq!(result.matches(REPETITION_PREFIX).count(), 5);
        assert!(!result.contains("removed: *["), "got: {result:?}");
    }

    #[test]
    fn annotation_lines_are_left_verbatim() {
        let note = format!("{REPETITION_PREFIX}abcdef{REPETITION_SUFFIX}");
        let input = vec![note.as_str(); 6].join("\n");
        assert_eq!(normalize(&input), input);
    }

    #[test]
    fn image_inside_preview_not_rewritten() {
        let input = vec!["![a](x.png)"; 6].join(" ");
        let result = normalize(&input);
        assert!(result.contains("*[Repetitive text removed: ![a](x.png)...]*"), "got: {result:?}");
        assert!(!result.contains("<img"), "got: {result:?}");
        assert_eq!(normalize(&result), result);
    }

    #[test]
    fn preview_escapes_text_but_keeps_blocks() {
        let md = normalize("a <script>x</script> & ![cap](p.png)");
        let html = render_preview(&md);
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("&amp;"));
        assert!(html.contains("<div align=\"center\""));
        assert!(html.contains("<img src=\"p.png\""));
        assert!(html.contains("</div>"));
        assert!(html.contains("<br>"));
    }
}

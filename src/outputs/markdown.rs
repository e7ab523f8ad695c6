//! Markdown rendering of a run's digest.
//!
//! One document per run date: a header with the run parameters, a contents
//! list linking to each article's anchor, then one section per article in
//! fetch order. A run with nothing enhanced still renders a document saying so.

use crate::models::{EnhancedArticle, RunReport};
use crate::utils::{slugify_title, upcase};
use chrono::SecondsFormat;
use std::collections::HashMap;
use std::fmt::Write;

/// Render the digest for `enhanced` under the parameters in `report`.
///
/// Output depends only on its inputs; the one clock value used is
/// `report.run_timestamp`.
pub fn render_digest(enhanced: &[EnhancedArticle], report: &RunReport) -> String {
    let mut md = String::new();

    writeln!(
        md,
        "# {} News Digest: {}\n",
        upcase(report.category.as_str()),
        report.run_date
    )
    .unwrap();
    writeln!(
        md,
        "_Generated {}_\n",
        report
            .run_timestamp
            .to_rfc3339_opts(SecondsFormat::Secs, true)
    )
    .unwrap();
    writeln!(md, "- **Style:** {}", upcase(report.style.as_str())).unwrap();
    if let Some(keyword) = &report.keyword {
        writeln!(md, "- **Keyword:** {keyword}").unwrap();
    }
    writeln!(
        md,
        "- **Articles:** {} of {} fetched\n",
        enhanced.len(),
        report.fetched_count
    )
    .unwrap();

    if enhanced.is_empty() {
        match &report.fetch_error {
            Some(err) => writeln!(md, "No articles could be fetched: {err}\n").unwrap(),
            None => writeln!(md, "No articles were published in this run.\n").unwrap(),
        }
    } else {
        let anchors = anchors_for(enhanced);

        writeln!(md, "## Contents\n").unwrap();
        for (item, anchor) in enhanced.iter().zip(&anchors) {
            writeln!(md, "- [{}](#{})", escape_link_text(&item.headline), anchor).unwrap();
        }
        writeln!(md).unwrap();

        for item in enhanced {
            render_article(&mut md, item);
        }
    }

    if !report.failures.is_empty() {
        writeln!(
            md,
            "_{} article(s) could not be rewritten; see the run report for details._\n",
            report.failures.len()
        )
        .unwrap();
    }

    writeln!(md, "---\n").unwrap();
    writeln!(
        md,
        "_Sourced from EventRegistry and rewritten with Gemini._"
    )
    .unwrap();

    md
}

fn render_article(md: &mut String, item: &EnhancedArticle) {
    let article = &item.article;

    writeln!(md, "## {}\n", item.headline).unwrap();
    writeln!(md, "- **Source:** {}", article.source).unwrap();
    if let Some(published) = article.published_at {
        writeln!(
            md,
            "- **Published:** {}",
            published.to_rfc3339_opts(SecondsFormat::Secs, true)
        )
        .unwrap();
    }
    if !article.authors.is_empty() {
        writeln!(md, "- **Authors:** {}", article.authors.join(", ")).unwrap();
    }
    if item.headline != article.title {
        writeln!(md, "- **Original title:** {}", article.title).unwrap();
    }
    if let Some(url) = &article.url {
        writeln!(md, "- **Original:** <{url}>").unwrap();
    }
    writeln!(md, "- **Article ID:** `{}`\n", article.id).unwrap();

    writeln!(md, "{}\n", item.enhanced_body.trim()).unwrap();
}

/// Backslash-escape characters that would end or nest a link label.
fn escape_link_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '[' | ']') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Anchors matching the `## headline` sections, with `-1`, `-2`, ...
/// appended to repeated slugs.
fn anchors_for(enhanced: &[EnhancedArticle]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    enhanced
        .iter()
        .map(|item| {
            let base = slugify_title(&item.headline);
            let count = seen.entry(base.clone()).or_insert(0);
            let anchor = if *count == 0 {
                base
            } else {
                format!("{base}-{count}")
            };
            *count += 1;
            anchor
        })
        .collect()
}

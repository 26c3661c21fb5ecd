use crate::errors::Result;
use crate::model::{EvidenceBucket, Factor};
use crate::ops::Store;

const EXCERPT_CHARS: usize = 160;

/// Render the current version of a decision as a Markdown ADR
///
/// Sections: title, status line, context, decision, rationale,
/// alternatives, consequences (outcome evidence and supersession),
/// evidence per bucket, related decisions and the confidence breakdown.
///
/// # Errors
/// * `DecisionNotFound` - If the decision doesn't exist
pub fn render_adr(store: &Store, decision_id: &str) -> Result<String> {
    let d = store.current(decision_id)?;

    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", d.title));
    output.push_str(&format!(
        "**Status**: {} | **Date**: {} | **Version**: {} | **Scope**: {}\n\n",
        d.status,
        d.created_at.format("%Y-%m-%d"),
        d.version,
        d.scope
    ));
    if let Some(by) = &d.validated_by {
        output.push_str(&format!("**Validated by**: {}\n\n", by));
    }

    output.push_str("## Context\n\n");
    let intent = d.evidence.get(EvidenceBucket::Intent);
    if intent.is_empty() {
        output.push_str("_No discussion captured._\n\n");
    }
    for item in intent {
        output.push_str(&format!("> {}\n\n", item.excerpt(EXCERPT_CHARS)));
    }

    output.push_str("## Decision\n\n");
    output.push_str(&format!("{}\n\n", non_empty(&d.description)));

    output.push_str("## Rationale\n\n");
    output.push_str(&format!("{}\n\n", non_empty(&d.rationale)));

    if !d.alternatives_considered.is_empty() {
        output.push_str("## Alternatives Considered\n\n");
        for alt in &d.alternatives_considered {
            output.push_str(&format!("- {}\n", alt));
        }
        output.push('\n');
    }

    output.push_str("## Consequences\n\n");
    let outcomes = d.evidence.get(EvidenceBucket::Outcomes);
    if outcomes.is_empty() && d.superseded_by.is_none() {
        output.push_str("_No follow-up observed yet._\n\n");
    }
    for item in outcomes {
        output.push_str(&format!("- {}\n", item.excerpt(EXCERPT_CHARS)));
    }
    if !outcomes.is_empty() {
        output.push('\n');
    }
    if let Some(next) = &d.superseded_by {
        output.push_str(&format!("Superseded by `{}`.\n\n", next));
    }
    if let Some(prev) = &d.supersedes {
        output.push_str(&format!("Supersedes `{}`.\n\n", prev));
    }

    output.push_str("## Evidence\n\n");
    for (bucket, item) in d.evidence.iter() {
        let link = item
            .url
            .as_ref()
            .map(|u| format!(" ([link]({}))", u))
            .unwrap_or_default();
        output.push_str(&format!(
            "- **{}** `{}` by {} on {}{}\n",
            bucket,
            item.source_id,
            item.author,
            item.timestamp.format("%Y-%m-%d"),
            link
        ));
    }
    output.push('\n');

    let related: Vec<_> = store.edges_from(decision_id).collect();
    if !related.is_empty() {
        output.push_str("## Related Decisions\n\n");
        for edge in related {
            output.push_str(&format!(
                "- {} `{}` (strength {:.2})\n",
                edge.relationship_type, edge.target_decision_id, edge.strength
            ));
        }
        output.push('\n');
    }

    output.push_str(&format!(
        "## Confidence: {:.2}\n\n| factor | value | weight | explanation |\n|---|---|---|---|\n",
        d.confidence.overall
    ));
    for factor in Factor::ALL {
        output.push_str(&format!(
            "| {} | {:.2} | {:.2} | {} |\n",
            factor,
            d.confidence.factors.get(factor),
            d.confidence.weights.get(factor),
            d.confidence.explanation.get(factor)
        ));
    }
    output.push_str(&format!(
        "\n_Weights version {}._\n",
        d.confidence.weights_version
    ));

    Ok(output)
}

fn non_empty(text: &str) -> &str {
    if text.trim().is_empty() {
        "_Not recorded._"
    } else {
        text
    }
}

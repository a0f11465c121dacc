//! Best-effort recovery of truncated or malformed guide markup.
//!
//! Upstream feeds are routinely cut off mid-stream by network and size
//! limits. Recovery keeps every complete programme record and guarantees the
//! root element is syntactically closed, the minimum any XML parser needs.
//!
//! The heuristics form an ordered rule table evaluated first-match-wins, so
//! a new rule can be added without perturbing the existing ones and each
//! rule is testable on its own.

/// Closing marker of a complete programme record.
const PROGRAMME_END: &str = "</programme>";
/// Opening marker of a programme record (attributes follow, so no `>`).
const PROGRAMME_START: &str = "<programme";
/// Closing marker of the document root.
const TV_END: &str = "</tv>";
/// Declaration prepended when the document starts mid-stream.
const XML_DECL: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>";

struct Rule {
    name: &'static str,
    applies: fn(&str) -> bool,
    apply: fn(&str) -> String,
}

/// Ordered repair heuristics. The first rule whose predicate matches wins.
const RULES: &[Rule] = &[
    // A complete record exists somewhere: cut immediately after the last one
    // and close the root. Trailing partial data is assumed corrupt and is
    // discarded rather than completed.
    Rule {
        name: "truncate_after_last_complete_programme",
        applies: |doc| doc.contains(PROGRAMME_END),
        apply: |doc| {
            let end = doc.rfind(PROGRAMME_END).map(|i| i + PROGRAMME_END.len());
            let kept = end.map(|i| &doc[..i]).unwrap_or(doc);
            format!("{kept}\n{TV_END}")
        },
    },
    // Only a dangling start tag exists: drop the incomplete fragment
    // entirely and close the root.
    Rule {
        name: "drop_dangling_programme_fragment",
        applies: |doc| doc.contains(PROGRAMME_START),
        apply: |doc| {
            let cut = doc.rfind(PROGRAMME_START).unwrap_or(doc.len());
            format!("{}\n{TV_END}", doc[..cut].trim_end())
        },
    },
    // No programme markers at all: closing the root unconditionally keeps
    // the document parseable even when it carries no records. Whether an
    // empty feed is an error is the parser's call, not ours.
    Rule {
        name: "close_root",
        applies: |_| true,
        apply: |doc| {
            if doc.ends_with(TV_END) {
                doc.to_string()
            } else {
                format!("{doc}\n{TV_END}")
            }
        },
    },
];

/// Repairs possibly-truncated guide markup into a best-effort well-formed
/// document. Never fails; the input is untouched (callers may still log the
/// raw bytes for diagnostics).
pub fn repair(raw: &str) -> String {
    let doc = raw.trim();

    let mut repaired = doc.to_string();
    for rule in RULES {
        if (rule.applies)(doc) {
            repaired = (rule.apply)(doc);
            tracing::debug!(
                rule = rule.name,
                before = doc.len(),
                after = repaired.len(),
                "Applied repair rule"
            );
            break;
        }
    }

    // Independent of the structural rules: a document that starts mid-stream
    // gets a declaration so the root is the first markup the parser sees.
    if !repaired.starts_with("<?xml") && !repaired.starts_with("<tv") {
        repaired = format!("{XML_DECL}\n{repaired}");
        tracing::debug!("Prepended XML declaration");
    }

    repaired
}

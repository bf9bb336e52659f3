//! Decides whether an observed record satisfies an expected one.

use postcheck_common::MessageRecord;

/// Acceptance predicate: `(expected, candidate) -> accept`.
pub type MatchFn = dyn Fn(&MessageRecord, &MessageRecord) -> bool + Send + Sync;

/// All-or-nothing comparison of `candidate` against `expected`.
///
/// Subject, sender, recipients and cc must be equal, and the candidate's
/// reply-to must equal the expected effective reply-to. Then either the
/// bodies are compared exactly (when the expected body is set) or the
/// multipart segments are compared position by position, ignoring
/// surrounding whitespace. A candidate with fewer segments than expected is
/// rejected. Headers are not considered; see [`crate::headers`].
pub fn matches(expected: &MessageRecord, candidate: &MessageRecord) -> bool {
    if expected.subject() != candidate.subject()
        || expected.from() != candidate.from()
        || expected.to() != candidate.to()
        || expected.cc() != candidate.cc()
        || expected.effective_reply_to() != candidate.reply_to()
    {
        return false;
    }

    if expected.is_body_set() {
        return expected.body() == candidate.body();
    }

    expected
        .parts()
        .iter()
        .enumerate()
        .all(|(index, part)| {
            candidate
                .parts()
                .get(index)
                .is_some_and(|actual| part.trim() == actual.trim())
        })
}

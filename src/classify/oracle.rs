// ============================================================
// Layer 5 — Oracle Stage
// ============================================================
// Asks an external judgment service which spelling the text
// should use. The service reasons step by step and ends with a
// verdict marker:
//
//   …よって、ステップ2で選択した「2」が回答となります。
//   回答:2
//
// The LAST marker in the response wins (the few-shot examples
// echoed back also contain markers). A marker right after 「 or
// （ is a quotation, not a verdict.
//
//   0 → no change
//   1 → every kana form   → written form   (とき → 時)
//   2 → every written form → kana form     (時 → とき)
//
// Anything else (no marker, a digit outside 0–2, an unreadable
// response, a timeout) is "no change" plus a trace entry; only a
// transport failure fails the stage. The raw reasoning is traced
// as a note ahead of the verdict.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::classify::{ClassifierStage, HomographPair};
use crate::domain::error::ReviewError;
use crate::domain::span::{Category, Span};
use crate::domain::trace::{ClassificationTrace, Decision, TraceEntry};
use crate::domain::traits::{Oracle, OracleError, SamplingMode};

/// Placeholder replaced with the text under review
pub const TEXT_PLACEHOLDER: &str = "{text}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleRule {
    pub pair:          HomographPair,
    pub category:      Category,
    pub deterministic: bool,
    /// Custom prompt; must contain "{text}"
    pub prompt:        Option<String>,
}

impl Default for OracleRule {
    fn default() -> Self {
        Self {
            pair:          HomographPair::default(),
            category:      Category::SyntacticCorrection,
            deterministic: true,
            prompt:        None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Keep,
    ToWritten,
    ToKana,
}

impl Verdict {
    fn from_digit(d: u32) -> Option<Self> {
        match d {
            0 => Some(Self::Keep),
            1 => Some(Self::ToWritten),
            2 => Some(Self::ToKana),
            _ => None,
        }
    }
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"回答[:：]\s*(\d)").unwrap_or_else(|_| unreachable!("verdict pattern is a literal"))
    })
}

/// The last verdict marker that is not inside a quotation, as
/// (whole marker, digit)
fn last_marker(response: &str) -> Option<(&str, &str)> {
    marker_regex()
        .captures_iter(response)
        .filter(|caps| {
            let start = caps.get(0).map_or(0, |m| m.start());
            !matches!(response[..start].chars().next_back(), Some('「') | Some('（'))
        })
        .last()
        .and_then(|caps| Some((caps.get(0)?.as_str(), caps.get(1)?.as_str())))
}

/// Digit of the last verdict marker that is not inside a quotation.
/// None when there is no marker or its digit is not ASCII.
pub fn last_verdict_digit(response: &str) -> Option<u32> {
    let (_, digit) = last_marker(response)?;
    let c = digit.chars().next()?;
    if c.is_ascii_digit() {
        c.to_digit(10)
    } else {
        None
    }
}

/// Response folded onto one trace line
fn one_line(response: &str) -> String {
    response
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect::<Vec<_>>()
        .join(" / ")
}

/// Fill the prompt template with the text under review
pub fn build_prompt(template: &str, text: &str) -> String {
    template.replace(TEXT_PLACEHOLDER, text)
}

pub struct OracleStage<'a> {
    oracle: &'a dyn Oracle,
    rule:   &'a OracleRule,
}

impl<'a> OracleStage<'a> {
    pub fn new(oracle: &'a dyn Oracle, rule: &'a OracleRule) -> Self {
        Self { oracle, rule }
    }

    fn mode(&self) -> SamplingMode {
        if self.rule.deterministic {
            SamplingMode::Deterministic
        } else {
            SamplingMode::Sampled
        }
    }

    fn spans_for(&self, text: &str, verdict: Verdict) -> Vec<Span> {
        let pair = &self.rule.pair;
        let (from, to) = match verdict {
            Verdict::Keep      => return Vec::new(),
            Verdict::ToWritten => (&pair.kana, &pair.written),
            Verdict::ToKana    => (&pair.written, &pair.kana),
        };
        text.match_indices(from.as_str())
            .map(|(at, found)| Span::new(at, found, to.clone(), self.rule.category))
            .collect()
    }
}

impl ClassifierStage for OracleStage<'_> {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn classify(&self, text: &str, trace: &mut ClassificationTrace) -> Result<Vec<Span>, ReviewError> {
        if !self.rule.pair.occurs_in(text) {
            return Ok(Vec::new());
        }

        let template = self.rule.prompt.as_deref().unwrap_or(DEFAULT_PROMPT);
        let prompt   = build_prompt(template, text);

        let response = match self.oracle.query(&prompt, self.mode()) {
            Ok(r) => r,
            Err(OracleError::Transport(msg)) => {
                return Err(ReviewError::classification(self.name(), msg));
            }
            Err(OracleError::BadResponse(msg)) => {
                tracing::warn!("Oracle answer unreadable: {msg}; keeping text");
                trace.push(TraceEntry::new(self.name(), text, msg, Decision::AmbiguousVerdict));
                return Ok(Vec::new());
            }
            Err(e) => {
                tracing::warn!("Oracle gave no answer: {e}; keeping text");
                trace.push(TraceEntry::new(self.name(), text, e.to_string(), Decision::Failed(e.to_string())));
                return Ok(Vec::new());
            }
        };
        tracing::debug!("Oracle reasoning: {response}");
        trace.push(TraceEntry::new(self.name(), text, one_line(&response), Decision::Note));

        let digit = last_verdict_digit(&response);
        let Some(verdict) = digit.and_then(Verdict::from_digit) else {
            let marker = last_marker(&response).map_or("no marker", |(whole, _)| whole);
            trace.push(TraceEntry::new(self.name(), text, marker, Decision::AmbiguousVerdict));
            return Ok(Vec::new());
        };

        let spans = self.spans_for(text, verdict);
        let decision = match verdict {
            Verdict::Keep      => Decision::Keep,
            Verdict::ToWritten => Decision::Rewrite(self.rule.pair.written.clone()),
            Verdict::ToKana    => Decision::Rewrite(self.rule.pair.kana.clone()),
        };
        let annotation = format!("回答:{} ({} occurrence(s))", digit.unwrap_or(0), spans.len());
        trace.push(TraceEntry::new(self.name(), text, annotation, decision));
        Ok(spans)
    }
}

/// Few-shot protocol: the 場合 / 時点 substitution test with four
/// worked examples, ending in a "回答:" marker.
pub const DEFAULT_PROMPT: &str = r#"次のテキストに含まれる「時」と「とき」の使い分けを判断してください。
テキスト: {text}

次のルールに従って使い分けを判断してください:
単独で用いられる「時」や「とき」という語を検出した場合、そのまま「場合」と言い換えても自然な文章が成立するのであれば「とき」が正しい用法です。
「時点」と言い換えても意味が通るものは「時」が正しい用法になります。

次に、以下のステップに従って各ステップの内容を段階的に考察してください。
**ステップ1**: 「テキスト:」に続く文章から「時」または「とき」のいずれが使用されているか判断します。
**ステップ2**: 「時」を検出した場合、「場合」と置き換えてみてください。ただし、助詞を追加せず単語そのものを置き換えてください。そして文脈を確認し、自然な文章が成立するかどうかを確認します。ただし、「とき」を検出した場合、このステップはスキップしてください。
- 自然な文章だと判断した場合、「時→とき」に変換します（この場合、後で「2」を選びます）。
- 自然な文章でないと判断した場合、すでに文中で正しく「時」が使用されていると回答してください。（後で「0」を選びます）。
**ステップ3**: 「とき」を検出した場合、「時点」と置き換えてみてください。そして文脈を確認し、自然な文章が成立するかどうかを確認します。ただし、「時」を検出した場合、このステップはスキップしてください。
- 自然な文章だと判断した場合、「とき→時」に変換します（この場合、後で「1」を選びます）。
- 自然な文章でないと判断した場合、すでに文中で正しく「とき」が使用されていると回答してください。（後で「0」を選びます）。
**ステップ4**: 元のテキストと、ステップ2もしくは3で変換したテキストを比較します。このとき、『時間』と『状況』のいずれを意味しているかに注目して分析してください。ステップ2またはステップ3で0を選択している場合、変換前後の比較は行わず「0」と回答してください。
- ステップ2またはステップ3で変換したテキストの方が適切だと判断した場合、ステップ2またはステップ3で選択した数字を回答します。
- 元のテキストの方が適切だと判断した場合、0を回答します。

以下のようなフォーマットで回答してください。
----------------------------------------------------------------------------
思考：
(ステップ1)
テキスト：「いざという時は頼りになる」は、「時」を使用しています。

(ステップ2)
「時」を検出したので「場合」と置き換えます。
「いざという場合は頼りになる」
自然な文章なので、「時→とき」に変換します。(後で2と回答)

(ステップ3)
「時」を検出したのでスキップします。

(ステップ4)
元のテキスト：いざという時は頼りになる
変換後のテキスト：いざという場合は頼りになる
文脈を確認すると、ここで使用されている「時(とき)」は時間に関係なく、状況全体や可能性について議論していると捉えられるため、変換後のテキストが適切です。
よって、ステップ2で選択した「2」が回答となります。

回答:2
----------------------------------------------------------------------------
思考：
(ステップ1)
テキスト：「今は15時30分です」は、「時」を使用しています。

(ステップ2)
「時」を検出したので「場合」と置き換えます。
「今は15場合30分です」
自然な文章ではないので、すでに文中で正しく「時」が使用されています。(後で0と回答)

(ステップ3)
「時」を検出したのでスキップします。

(ステップ4)
ステップ2で「0」を選択しているので、変換前後の比較は行いません。
よって、回答は「0」となります。

回答:0
----------------------------------------------------------------------------
思考：
(ステップ1)
テキスト：「母が私を呼んだとき、私は数学を勉強していた」から、「とき」を検出しました。

(ステップ2)
「とき」を検出したのでスキップします。

(ステップ3)
「とき」を検出したので「時点」と置き換えます。
「母が私を呼んだ時点で、私は数学を勉強していた」
自然な文章なので、「とき→時」に変換します。(後で1と回答)

(ステップ4)
元のテキスト：母が私を呼んだとき、私は数学を勉強していた
変換後のテキスト：母が私を呼んだ時点で、私は数学を勉強していた
文脈を確認すると、ここで使用されている「時(とき)」は具体的な時間や瞬間を意味しており、ある特定の時点で何かが発生しているというニュアンスを持っています。
そのため、変換後のテキストが適切です。
よって、ステップ3で選択した「1」が回答となります。

回答:1
----------------------------------------------------------------------------
思考：
(ステップ1)
テキスト：「荷物が多いときにはタクシーを使う。」から、「とき」を検出しました。

(ステップ2)
「とき」を検出したのでスキップします。

(ステップ3)
「とき」を検出したので「時点」と置き換えます。
「荷物が多い時点にはタクシーを使う。」
自然な文章ではないので、すでに文中で正しく「とき」が使用されています。(後で0と回答)

(ステップ4)
ステップ3で「0」を選択しているので、変換前後の比較は行いません。
よって、回答は「0」となります。

回答:0
----------------------------------------------------------------------------
では「思考：」に続けてステップバイステップで考察し、「回答:」に続けて考察に紐付く数字を出力してください。
"#;

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::fakes::CannedOracle;

    fn run(oracle: &CannedOracle, text: &str) -> (Vec<Span>, ClassificationTrace) {
        let rule = OracleRule::default();
        let mut trace = ClassificationTrace::new(0);
        let spans = OracleStage::new(oracle, &rule).classify(text, &mut trace).unwrap();
        (spans, trace)
    }

    #[test]
    fn test_last_marker_wins() {
        assert_eq!(last_verdict_digit("回答:1 … 回答:0 … 回答: 2"), Some(2));
        assert_eq!(last_verdict_digit("回答：1"), Some(1));
        assert_eq!(last_verdict_digit("考察のみ"), None);
    }

    #[test]
    fn test_quoted_marker_is_ignored() {
        assert_eq!(last_verdict_digit("回答:2 そして「回答:1」と書く"), Some(2));
        assert_eq!(last_verdict_digit("（回答:1）"), None);
    }

    #[test]
    fn test_verdict_two_rewrites_written_form() {
        let oracle = CannedOracle::answering("思考：…\n回答:2");
        let text = "いざという時は頼りになる";
        let (spans, trace) = run(&oracle, text);

        assert_eq!(spans, vec![Span::new(text.find("時").unwrap(), "時", "とき", Category::SyntacticCorrection)]);
        assert_eq!(trace.entries().last().unwrap().decision, Decision::Rewrite("とき".into()));
        let (prompt, mode) = oracle.prompts.borrow()[0].clone();
        assert!(prompt.contains("テキスト: いざという時は頼りになる"));
        assert_eq!(mode, SamplingMode::Deterministic);
    }

    #[test]
    fn test_verdict_one_rewrites_every_kana_form() {
        let oracle = CannedOracle::answering("回答:1");
        let (spans, _) = run(&oracle, "ときどき、呼んだとき");
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|s| s.replacement == "時"));
    }

    #[test]
    fn test_missing_or_odd_marker_is_no_change() {
        for answer in ["わかりません", "回答:7"] {
            let oracle = CannedOracle::answering(answer);
            let (spans, trace) = run(&oracle, "時は金なり");
            assert!(spans.is_empty());
            assert_eq!(trace.entries().last().unwrap().decision, Decision::AmbiguousVerdict);
        }
    }

    #[test]
    fn test_full_width_last_marker_is_not_skipped() {
        let answer = "例では回答:1でした。\n思考：…\n回答:２";
        assert_eq!(last_verdict_digit(answer), None);

        let oracle = CannedOracle::answering(answer);
        let (spans, trace) = run(&oracle, "とき");
        assert!(spans.is_empty());
        let verdict = trace.entries().last().unwrap();
        assert_eq!(verdict.decision, Decision::AmbiguousVerdict);
        assert_eq!(verdict.annotation, "回答:２");
    }

    #[test]
    fn test_reasoning_is_traced_on_one_line() {
        let oracle = CannedOracle::answering("思考：\n(ステップ1)\n\n回答:0");
        let (_, trace) = run(&oracle, "時は金なり");

        let entries = trace.entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].decision, Decision::Note);
        assert_eq!(entries[0].annotation, "思考： / (ステップ1) / 回答:0");
        assert_eq!(entries[1].decision, Decision::Keep);
    }

    #[test]
    fn test_unreadable_answer_is_ambiguous() {
        let oracle = CannedOracle::failing(|| OracleError::BadResponse("missing 'response' field".into()));
        let (spans, trace) = run(&oracle, "時は金なり");
        assert!(spans.is_empty());
        assert_eq!(trace.entries().len(), 1);
        assert_eq!(trace.entries()[0].decision, Decision::AmbiguousVerdict);
    }

    #[test]
    fn test_text_without_pair_is_not_sent() {
        let oracle = CannedOracle::answering("回答:2");
        let (spans, _) = run(&oracle, "他の人");
        assert!(spans.is_empty());
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_timeout_fails_open() {
        let oracle = CannedOracle::failing(|| OracleError::TimedOut);
        let (spans, trace) = run(&oracle, "時は金なり");
        assert!(spans.is_empty());
        assert!(matches!(trace.entries()[0].decision, Decision::Failed(_)));
    }

    #[test]
    fn test_transport_error_fails_stage() {
        let oracle = CannedOracle::failing(|| OracleError::Transport("connection refused".into()));
        let rule = OracleRule::default();
        let mut trace = ClassificationTrace::new(0);
        let err = OracleStage::new(&oracle, &rule).classify("時", &mut trace).unwrap_err();
        assert!(matches!(err, ReviewError::ClassificationFailed { .. }));
    }
}

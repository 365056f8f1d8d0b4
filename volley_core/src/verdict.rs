//! Response-body evaluation deciding whether a wave keeps sending.
//!
//! The target service answers 200 whatever the logical outcome, so the
//! decision is keyed to the body shape: a top-level `code` plus
//! `data.apply_result` and `data.deadline`.

use serde_json::Value;

/// The one response shape that means the window is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuccessCondition {
    pub code: i64,
    pub apply_result: i64,
    /// Epoch seconds.
    pub deadline: i64,
}

impl Default for SuccessCondition {
    fn default() -> Self {
        Self {
            code: 0,
            apply_result: 3,
            deadline: 1_745_251_200,
        }
    }
}

/// Fields observed in a parsed body. Absent or non-integral values are `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Observed {
    pub code: Option<i64>,
    pub apply_result: Option<i64>,
    pub deadline: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// Body matched the success condition.
    Continue,
    /// Body parsed but the server has moved past the success condition.
    Abort(Observed),
    /// Body was not JSON; keep sending.
    Malformed(String),
}

impl Verdict {
    #[inline]
    pub fn is_abort(&self) -> bool {
        matches!(self, Verdict::Abort(_))
    }
}

fn as_integer(v: Option<&Value>) -> Option<i64> {
    let v = v?;
    v.as_i64().or_else(|| {
        v.as_f64()
            .filter(|f| f.fract() == 0.0 && f.is_finite())
            .map(|f| f as i64)
    })
}

impl Observed {
    pub fn extract(body: &Value) -> Self {
        let data = body.get("data");
        Self {
            code: as_integer(body.get("code")),
            apply_result: as_integer(data.and_then(|d| d.get("apply_result"))),
            deadline: as_integer(data.and_then(|d| d.get("deadline"))),
        }
    }
}

impl SuccessCondition {
    pub fn matches(&self, seen: &Observed) -> bool {
        seen.code == Some(self.code)
            && seen.apply_result == Some(self.apply_result)
            && seen.deadline == Some(self.deadline)
    }

    /// Evaluate a raw response body.
    pub fn evaluate(&self, body: &str) -> Verdict {
        match serde_json::from_str::<Value>(body) {
            Ok(v) => {
                let seen = Observed::extract(&v);
                if self.matches(&seen) {
                    Verdict::Continue
                } else {
                    Verdict::Abort(seen)
                }
            }
            Err(e) => Verdict::Malformed(e.to_string()),
        }
    }
}

// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Evaluation reasons and the `Detail<Value>` result wrapper
//! (specification §3.7 & §4.3).

use crate::error::ErrorKind as DataErrorKind;
use crate::value::Value;

/// Why a flag evaluation came out the way it did.
#[derive(Debug, Clone, PartialEq)]
pub enum Reason {
    Off,
    Fallthrough {
        in_experiment: bool,
    },
    TargetMatch,
    RuleMatch {
        rule_index: usize,
        rule_id: String,
        in_experiment: bool,
    },
    PrerequisiteFailed {
        prerequisite_key: String,
    },
    Error {
        error_kind: EvalErrorKind,
    },
}

/// Evaluation-specific error categories; `MalformedFlag` is used
/// uniformly for any out-of-range variation index, per the Open
/// Question resolved in specification §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    UserNotSpecified,
    FlagNotFound,
    MalformedFlag,
    WrongType,
    ClientNotReady,
    Exception,
}

impl Reason {
    /// The wire representation used by feature/debug events (§6.3).
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::json;
        match self {
            Reason::Off => json!({"kind": "OFF"}),
            Reason::Fallthrough { in_experiment } => {
                let mut v = json!({"kind": "FALLTHROUGH"});
                if *in_experiment {
                    v["inExperiment"] = json!(true);
                }
                v
            }
            Reason::TargetMatch => json!({"kind": "TARGET_MATCH"}),
            Reason::RuleMatch {
                rule_index,
                rule_id,
                in_experiment,
            } => {
                let mut v = json!({"kind": "RULE_MATCH", "ruleIndex": rule_index, "ruleId": rule_id});
                if *in_experiment {
                    v["inExperiment"] = json!(true);
                }
                v
            }
            Reason::PrerequisiteFailed { prerequisite_key } => {
                json!({"kind": "PREREQUISITE_FAILED", "prerequisiteKey": prerequisite_key})
            }
            Reason::Error { error_kind } => json!({"kind": "ERROR", "errorKind": error_kind.as_str()}),
        }
    }
}

impl EvalErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EvalErrorKind::UserNotSpecified => "USER_NOT_SPECIFIED",
            EvalErrorKind::FlagNotFound => "FLAG_NOT_FOUND",
            EvalErrorKind::MalformedFlag => "MALFORMED_FLAG",
            EvalErrorKind::WrongType => "WRONG_TYPE",
            EvalErrorKind::ClientNotReady => "CLIENT_NOT_READY",
            EvalErrorKind::Exception => "EXCEPTION",
        }
    }
}

/// Status of big ("unbounded") segment membership lookups, attached
/// to the reason per specification §4.3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BigSegmentsStatus {
    Healthy,
    Stale,
    NotConfigured,
    StoreError,
}

impl From<DataErrorKind> for EvalErrorKind {
    fn from(k: DataErrorKind) -> Self {
        match k {
            DataErrorKind::InvalidData => EvalErrorKind::MalformedFlag,
            DataErrorKind::StoreError => EvalErrorKind::Exception,
            _ => EvalErrorKind::Exception,
        }
    }
}

/// The outcome of an evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Detail {
    pub value: Value,
    pub variation_index: Option<usize>,
    pub reason: Reason,
    /// Populated only when the evaluated segment match consulted a
    /// big-segment store.
    pub big_segments_status: Option<BigSegmentsStatus>,
}

impl Detail {
    pub fn new(value: Value, variation_index: Option<usize>, reason: Reason) -> Self {
        Self {
            value,
            variation_index,
            reason,
            big_segments_status: None,
        }
    }

    pub fn error(default: Value, kind: EvalErrorKind) -> Self {
        Self::new(default, None, Reason::Error { error_kind: kind })
    }

    pub fn with_big_segments_status(mut self, status: BigSegmentsStatus) -> Self {
        self.big_segments_status = Some(status);
        self
    }
}

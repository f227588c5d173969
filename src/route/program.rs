//! Route programs: the block sequence a player assembles, as JSON.

use std::fmt;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RunnerError};
use crate::route::layout::{ChallengeLayout, TokenColor};

fn one() -> u32 {
    1
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Primitive {
    #[serde(rename_all = "camelCase")]
    Forward {
        #[serde(default = "one")]
        count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        timeout_ms: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        speed: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        stop_on_cross: Option<bool>,
    },
    TurnLeft {
        #[serde(default = "one")]
        count: u32,
    },
    TurnRight {
        #[serde(default = "one")]
        count: u32,
    },
    TurnBack {
        #[serde(default = "one")]
        count: u32,
    },
    Collect {
        #[serde(default = "one")]
        count: u32,
        color: TokenColor,
    },
    StartSound,
    FinishSound,
    /// Run `then` only when the current tile holds a token of `color`.
    WhenToken {
        color: TokenColor,
        #[serde(default)]
        then: Vec<Primitive>,
    },
}

impl Primitive {
    pub fn forward(count: u32) -> Self {
        Primitive::Forward {
            count,
            timeout_ms: None,
            speed: None,
            stop_on_cross: None,
        }
    }

    /// Block name as the challenge editor lists it in `statement`.
    pub fn block_name(&self) -> &'static str {
        match self {
            Primitive::Forward { .. } => "forward",
            Primitive::TurnLeft { .. } => "turnLeft",
            Primitive::TurnRight { .. } => "turnRight",
            Primitive::TurnBack { .. } => "turnBack",
            Primitive::Collect { .. } => "collect",
            Primitive::StartSound => "startSound",
            Primitive::FinishSound => "finishSound",
            Primitive::WhenToken { .. } => "whenToken",
        }
    }

    /// Start/finish sounds are scaffolding around every route, not cards.
    pub fn is_card(&self) -> bool {
        !matches!(self, Primitive::StartSound | Primitive::FinishSound)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub steps: Vec<Primitive>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProgramIssue {
    DisallowedBlock(&'static str),
    TooFewCards { count: usize, min: usize },
    TooManyCards { count: usize, max: usize },
}

impl fmt::Display for ProgramIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgramIssue::DisallowedBlock(name) => {
                write!(f, "block '{}' is not allowed by this challenge", name)
            }
            ProgramIssue::TooFewCards { count, min } => {
                write!(f, "{} cards used, at least {} required", count, min)
            }
            ProgramIssue::TooManyCards { count, max } => {
                write!(f, "{} cards used, at most {} allowed", count, max)
            }
        }
    }
}

impl Program {
    pub fn new(steps: Vec<Primitive>) -> Self {
        Self { steps }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| RunnerError::Program(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Every card in the program, nested ones included, depth first.
    pub fn cards(&self) -> Vec<&Primitive> {
        fn walk<'a>(steps: &'a [Primitive], out: &mut Vec<&'a Primitive>) {
            for step in steps {
                if step.is_card() {
                    out.push(step);
                }
                if let Primitive::WhenToken { then, .. } = step {
                    walk(then, out);
                }
            }
        }
        let mut out = Vec::new();
        walk(&self.steps, &mut out);
        out
    }

    /// Check the program against the challenge rules. Advisory only.
    pub fn validate_against(&self, layout: &ChallengeLayout) -> Vec<ProgramIssue> {
        let cards = self.cards();
        let mut issues = Vec::new();

        if !layout.statement.is_empty() {
            for card in &cards {
                let name = card.block_name();
                let allowed = layout
                    .statement
                    .iter()
                    .any(|s| s.eq_ignore_ascii_case(name));
                let issue = ProgramIssue::DisallowedBlock(name);
                if !allowed && !issues.contains(&issue) {
                    issues.push(issue);
                }
            }
        }

        let count = cards.len();
        if let Some(min) = layout.min_cards {
            if count < min {
                issues.push(ProgramIssue::TooFewCards { count, min });
            }
        }
        if let Some(max) = layout.max_cards {
            if count > max {
                issues.push(ProgramIssue::TooManyCards { count, max });
            }
        }
        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::route::layout::SAMPLE_CHALLENGE;

    #[test]
    fn test_parse_program() {
        let json = r#"{"steps": [
            {"op": "startSound"},
            {"op": "forward", "count": 2},
            {"op": "collect", "count": 1, "color": "yellow"},
            {"op": "forward", "timeoutMs": 1500, "stopOnCross": false},
            {"op": "turnLeft"},
            {"op": "whenToken", "color": "red", "then": [{"op": "collect", "color": "red"}]},
            {"op": "finishSound"}
        ]}"#;
        let program = Program::from_json_str(json).unwrap();

        assert_eq!(program.steps.len(), 7);
        assert_eq!(program.steps[1], Primitive::forward(2));
        assert_eq!(
            program.steps[3],
            Primitive::Forward {
                count: 1,
                timeout_ms: Some(1500),
                speed: None,
                stop_on_cross: Some(false),
            }
        );
        assert_eq!(program.steps[4], Primitive::TurnLeft { count: 1 });
        assert_eq!(program.cards().len(), 6);
    }

    #[test]
    fn test_unknown_color_is_an_error() {
        let json = r#"{"steps": [{"op": "collect", "color": "purple"}]}"#;
        assert!(matches!(
            Program::from_json_str(json),
            Err(RunnerError::Program(_))
        ));
    }

    #[test]
    fn test_validation_against_challenge() {
        let layout = ChallengeLayout::from_json_str(SAMPLE_CHALLENGE).unwrap();

        let ok = Program::new(vec![
            Primitive::StartSound,
            Primitive::forward(2),
            Primitive::Collect {
                count: 1,
                color: TokenColor::Yellow,
            },
            Primitive::forward(1),
            Primitive::FinishSound,
        ]);
        assert!(ok.validate_against(&layout).is_empty());

        let bad = Program::new(vec![
            Primitive::TurnLeft { count: 1 },
            Primitive::TurnLeft { count: 1 },
            Primitive::forward(1),
            Primitive::forward(1),
        ]);
        let issues = bad.validate_against(&layout);
        assert_eq!(
            issues,
            vec![
                ProgramIssue::DisallowedBlock("turnLeft"),
                ProgramIssue::TooManyCards { count: 4, max: 3 },
            ]
        );
    }
}

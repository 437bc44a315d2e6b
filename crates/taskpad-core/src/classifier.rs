//! Keyword classifier proposing a
//! priority, category and urgency for a
//! draft task.
//!
//! Evaluation order:
//!
//! 1. priority rules, first match wins,
//!    then the fallback verdict;
//! 2. category rules, first match wins,
//!    then `general`;
//! 3. the final override, applied
//!    unconditionally when it matches.
//!
//! The final override ("today" /
//! "tomorrow") overlaps the urgency
//! keyword rule. With the current lists
//! the result is identical either way,
//! but the override is kept as a separate
//! last step: if the two lists diverge,
//! the override takes precedence. Do not
//! fold it into the first rule.

use std::sync::OnceLock;

use regex::{
  Regex,
  RegexBuilder
};
use serde::{
  Deserialize,
  Serialize
};
use tracing::{
  debug,
  error
};

use crate::task::Priority;

const URGENT_KEYWORDS: &[&str] = &[
  "today",
  "tomorrow",
  "urgent",
  "asap",
  "immediately",
  "now",
  "deadline",
  "due",
  "deliver",
  "need"
];

const HIGH_PRIORITY_PATTERNS: &[&str] = &[
  r"\bwork(s|ing|ed)?\b",
  r"college",
  r"universit",
  r"exam",
  r"\btest",
  r"presentation",
  r"meeting",
  r"client",
  r"\bboss",
  r"deliver",
  r"deadline",
  r"important",
  r"critical",
  r"school",
  r"stud(y|ies|ying)",
  r"project",
  r"report",
  r"document",
  r"defen[cds]",
  r"evaluat"
];

const LOW_PRIORITY_PATTERNS: &[&str] = &[
  r"leisure",
  r"hobby",
  r"personal",
  r"whenever",
  r"no rush",
  r"optional",
  r"later",
  r"eventually"
];

const WORK_PATTERNS: &[&str] = &[
  r"\bwork(s|ing|ed)?\b",
  r"office",
  r"meeting",
  r"client",
  r"project"
];

const STUDIES_PATTERNS: &[&str] = &[
  r"college",
  r"universit",
  r"school",
  r"stud(y|ies|ying)",
  r"exam",
  r"homework",
  r"\bclass"
];

const SHOPPING_PATTERNS: &[&str] = &[
  r"\bbuy",
  r"grocer",
  r"market",
  r"pharmac",
  r"\bshop"
];

const HEALTH_PATTERNS: &[&str] = &[
  r"exercis",
  r"\bgym",
  r"\brun",
  r"\bjog",
  r"workout",
  r"training"
];

const PERSONAL_PATTERNS: &[&str] =
  &[r"personal", r"leisure", r"hobby"];

const OVERRIDE_KEYWORDS: &[&str] =
  &["today", "tomorrow"];

pub const DEFAULT_CATEGORY: &str =
  "general";

/// Transient classification result.
/// Only priority, category and urgency
/// are copied into a task when applied.
#[derive(
  Debug,
  Clone,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
)]
pub struct ClassifierSuggestion {
  pub priority:  Priority,
  pub category:  String,
  pub urgency:   String,
  #[serde(
    default,
    skip_serializing_if = "Option::is_none"
  )]
  pub reasoning: Option<String>
}

#[derive(Debug)]
enum Matcher {
  Keywords(&'static [&'static str]),
  Patterns(Vec<Regex>)
}

impl Matcher {
  fn patterns(
    sources: &[&str]
  ) -> Self {
    let compiled = sources
      .iter()
      .filter_map(|source| {
        match RegexBuilder::new(source)
          .case_insensitive(true)
          .build()
        {
          | Ok(re) => Some(re),
          | Err(err) => {
            error!(
              pattern = %source,
              error = %err,
              "skipping classifier pattern that failed to compile"
            );
            None
          }
        }
      })
      .collect();
    Self::Patterns(compiled)
  }

  /// Number of distinct keywords or
  /// patterns present in `text`.
  fn hits(&self, text: &str) -> usize {
    match self {
      | Self::Keywords(words) => {
        words
          .iter()
          .filter(|word| {
            text.contains(**word)
          })
          .count()
      }
      | Self::Patterns(patterns) => {
        patterns
          .iter()
          .filter(|re| re.is_match(text))
          .count()
      }
    }
  }
}

#[derive(Debug)]
struct Verdict {
  priority:  Priority,
  urgency:   &'static str,
  reasoning: fn(usize) -> String
}

#[derive(Debug)]
struct PriorityRule {
  name:    &'static str,
  matcher: Matcher,
  verdict: Verdict
}

#[derive(Debug)]
struct CategoryRule {
  category: &'static str,
  matcher:  Matcher
}

#[derive(Debug)]
pub struct Classifier {
  priority_rules: Vec<PriorityRule>,
  fallback:       Verdict,
  category_rules: Vec<CategoryRule>,
  final_override: PriorityRule
}

impl Default for Classifier {
  fn default() -> Self {
    Self::new()
  }
}

impl Classifier {
  pub fn new() -> Self {
    let priority_rules = vec![
      PriorityRule {
        name:    "urgent-keyword",
        matcher: Matcher::Keywords(
          URGENT_KEYWORDS
        ),
        verdict: Verdict {
          priority:  Priority::High,
          urgency:   "immediate",
          reasoning: |_| {
            "Urgent or near-deadline \
             task"
              .to_string()
          }
        }
      },
      PriorityRule {
        name:    "high-priority-domain",
        matcher: Matcher::patterns(
          HIGH_PRIORITY_PATTERNS
        ),
        verdict: Verdict {
          priority:  Priority::High,
          urgency:   "medium",
          reasoning: |count| {
            format!(
              "Work or study related \
               task - {count} \
               high-priority keyword(s) \
               detected"
            )
          }
        }
      },
      PriorityRule {
        name:    "low-priority",
        matcher: Matcher::patterns(
          LOW_PRIORITY_PATTERNS
        ),
        verdict: Verdict {
          priority:  Priority::Low,
          urgency:   "low",
          reasoning: |_| {
            "Personal or non-urgent \
             task"
              .to_string()
          }
        }
      },
    ];

    let category_rules = vec![
      CategoryRule {
        category: "work",
        matcher:  Matcher::patterns(
          WORK_PATTERNS
        )
      },
      CategoryRule {
        category: "studies",
        matcher:  Matcher::patterns(
          STUDIES_PATTERNS
        )
      },
      CategoryRule {
        category: "shopping",
        matcher:  Matcher::patterns(
          SHOPPING_PATTERNS
        )
      },
      CategoryRule {
        category: "health",
        matcher:  Matcher::patterns(
          HEALTH_PATTERNS
        )
      },
      CategoryRule {
        category: "personal",
        matcher:  Matcher::patterns(
          PERSONAL_PATTERNS
        )
      },
    ];

    Self {
      priority_rules,
      fallback: Verdict {
        priority:  Priority::Medium,
        urgency:   "normal",
        reasoning: |_| {
          "Moderate-priority task"
            .to_string()
        }
      },
      category_rules,
      final_override: PriorityRule {
        name:    "immediate-deadline",
        matcher: Matcher::Keywords(
          OVERRIDE_KEYWORDS
        ),
        verdict: Verdict {
          priority:  Priority::High,
          urgency:   "immediate",
          reasoning: |_| {
            "Immediate-deadline task - \
             high priority"
              .to_string()
          }
        }
      }
    }
  }

  #[tracing::instrument(skip(self, title, description))]
  pub fn classify(
    &self,
    title: &str,
    description: &str
  ) -> ClassifierSuggestion {
    let text = format!(
      "{title} {description}"
    )
    .to_lowercase();

    let (rule_name, verdict, hits) =
      self
        .priority_rules
        .iter()
        .find_map(|rule| {
          let hits =
            rule.matcher.hits(&text);
          (hits > 0).then_some((
            rule.name,
            &rule.verdict,
            hits
          ))
        })
        .unwrap_or((
          "fallback",
          &self.fallback,
          0
        ));

    let mut suggestion =
      ClassifierSuggestion {
        priority:  verdict.priority,
        category:  self.category_for(
          &text
        ),
        urgency:   verdict
          .urgency
          .to_string(),
        reasoning: Some((verdict
          .reasoning)(
          hits
        ))
      };

    let override_hits = self
      .final_override
      .matcher
      .hits(&text);
    if override_hits > 0 {
      let verdict =
        &self.final_override.verdict;
      suggestion.priority =
        verdict.priority;
      suggestion.urgency =
        verdict.urgency.to_string();
      suggestion.reasoning = Some(
        (verdict.reasoning)(
          override_hits
        )
      );
    }

    debug!(
      rule = rule_name,
      hits,
      overridden = override_hits > 0,
      priority = %suggestion.priority,
      category = %suggestion.category,
      "classified draft task"
    );

    suggestion
  }

  fn category_for(
    &self,
    text: &str
  ) -> String {
    self
      .category_rules
      .iter()
      .find(|rule| {
        rule.matcher.hits(text) > 0
      })
      .map_or(DEFAULT_CATEGORY, |rule| {
        rule.category
      })
      .to_string()
  }
}

/// Classifies with a lazily built shared
/// rule set. `description` may be empty.
pub fn classify(
  title: &str,
  description: &str
) -> ClassifierSuggestion {
  static CLASSIFIER: OnceLock<
    Classifier
  > = OnceLock::new();
  CLASSIFIER
    .get_or_init(Classifier::new)
    .classify(title, description)
}

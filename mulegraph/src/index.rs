// mulegraph/src/index.rs
//
// Account → pattern-type index, folded from ring membership.
//
// An account is present iff it belongs to at least one ring. Absence means
// "no known ring membership", not "not suspicious". The filter engine relies
// on that distinction.

use std::collections::{BTreeSet, HashMap};

use crate::model::{FraudRing, PatternLabel, PatternType};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PatternIndex {
    by_account: HashMap<String, BTreeSet<PatternLabel>>,
}

impl PatternIndex {
    /// Fold every ring's pattern into every one of its members. A pattern
    /// appears at most once per account however many rings of that type the
    /// account sits in.
    pub fn build(rings: &[FraudRing]) -> Self {
        let mut by_account: HashMap<String, BTreeSet<PatternLabel>> = HashMap::new();
        for ring in rings {
            for member in &ring.member_accounts {
                by_account
                    .entry(member.clone())
                    .or_default()
                    .insert(ring.pattern_type.clone());
            }
        }
        Self { by_account }
    }

    pub fn patterns(&self, account_id: &str) -> Option<&BTreeSet<PatternLabel>> {
        self.by_account.get(account_id)
    }

    /// True only if the account has an entry containing `pattern`.
    pub fn has_pattern(&self, account_id: &str, pattern: PatternType) -> bool {
        self.by_account
            .get(account_id)
            .map(|set| set.contains(&PatternLabel::Known(pattern)))
            .unwrap_or(false)
    }

    /// Comma-joined patterns for detail panels, `—` when the account is in no ring.
    pub fn describe(&self, account_id: &str) -> String {
        match self.by_account.get(account_id) {
            Some(set) if !set.is_empty() => set
                .iter()
                .map(|p| p.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            _ => "—".to_string(),
        }
    }

    pub fn len(&self) -> usize { self.by_account.len() }
    pub fn is_empty(&self) -> bool { self.by_account.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<PatternLabel>)> {
        self.by_account.iter()
    }
}

//! Static information about the target architecture that a program is
//! compiled for.

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{
    expr::{Name, Type},
    NodeKind,
};

/// How a target metadata variable is initialised at program entry.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MetadataInit {
    /// The variable starts out as zero.
    Zero,

    /// The variable starts out unknown, and is modelled by a symbolic
    /// variable named after its path.
    Symbolic,
}

/// A standard metadata variable provided by the target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MetadataVar {
    pub path: Name,
    pub ty:   Type,
    pub init: MetadataInit,
}

impl MetadataVar {
    #[must_use]
    pub fn new(path: impl Into<Name>, ty: Type, init: MetadataInit) -> Self {
        let path = path.into();
        Self { path, ty, init }
    }
}

/// The kinds of construct that can count towards coverage.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum CoverableKind {
    Statement,
    Table,
    Action,
    ParserState,
}

impl CoverableKind {
    /// Gets the coverable kind of a node, if it has one.
    #[must_use]
    pub fn of(kind: &NodeKind) -> Option<Self> {
        match kind {
            NodeKind::Statement => Some(Self::Statement),
            NodeKind::Table(_) => Some(Self::Table),
            NodeKind::Action(_) => Some(Self::Action),
            NodeKind::ParserState(_) => Some(Self::ParserState),
            _ => None,
        }
    }
}

/// The constructs at which no alternative may match.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum MatchConstruct {
    /// A parser `select`, where no match rejects the packet.
    Select,

    /// A table lookup, where no match runs the default action.
    Table,

    /// A `switch` without a default case, where no match continues after it.
    Switch,
}

/// What to do when no alternative of a construct matches.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum NoMatchPolicy {
    /// Produce a separate branch for the no-match outcome.
    Branch,

    /// Produce no branch for the no-match outcome.
    Omit,
}

/// Target-specific information supplied when the evaluator is created.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct TargetInfo {
    /// The standard metadata variables and how they start out.
    pub metadata: Vec<MetadataVar>,

    /// The kinds of construct recorded in a state's coverage.
    pub coverable: BTreeSet<CoverableKind>,

    /// The boolean variable set when a parser rejects a packet.
    ///
    /// When this is [`None`], a rejected packet ends execution.
    pub parser_error: Option<Name>,

    no_match: BTreeMap<MatchConstruct, NoMatchPolicy>,
}

impl TargetInfo {
    /// Adds a metadata variable.
    #[must_use]
    pub fn with_metadata(mut self, var: MetadataVar) -> Self {
        self.metadata.push(var);
        self
    }

    /// Sets the kinds of construct that count towards coverage.
    #[must_use]
    pub fn with_coverable(mut self, kinds: impl IntoIterator<Item = CoverableKind>) -> Self {
        self.coverable = kinds.into_iter().collect();
        self
    }

    /// Makes a rejecting parser set the variable at `path` and continue.
    #[must_use]
    pub fn with_parser_error(mut self, path: impl Into<Name>) -> Self {
        self.parser_error = Some(path.into());
        self
    }

    /// Sets the no-match policy for `construct` to `policy`.
    #[must_use]
    pub fn with_no_match_policy(mut self, construct: MatchConstruct, policy: NoMatchPolicy) -> Self {
        self.no_match.insert(construct, policy);
        self
    }

    /// Gets the no-match policy for `construct`, which defaults to
    /// [`NoMatchPolicy::Branch`].
    #[must_use]
    pub fn no_match_policy(&self, construct: MatchConstruct) -> NoMatchPolicy {
        self.no_match
            .get(&construct)
            .copied()
            .unwrap_or(NoMatchPolicy::Branch)
    }

    /// Checks whether nodes of `kind` count towards coverage.
    #[must_use]
    pub fn is_coverable(&self, kind: &NodeKind) -> bool {
        CoverableKind::of(kind).is_some_and(|k| self.coverable.contains(&k))
    }
}

impl Default for TargetInfo {
    fn default() -> Self {
        let metadata = vec![];
        let coverable = [
            CoverableKind::Statement,
            CoverableKind::Table,
            CoverableKind::Action,
            CoverableKind::ParserState,
        ]
        .into_iter()
        .collect();
        let parser_error = None;
        let no_match = BTreeMap::new();
        Self {
            metadata,
            coverable,
            parser_error,
            no_match,
        }
    }
}

#[cfg(test)]
mod test {
    use crate::vm::target::{MatchConstruct, NoMatchPolicy, TargetInfo};

    #[test]
    fn no_match_outcomes_branch_by_default() {
        let target = TargetInfo::default();
        assert_eq!(target.no_match_policy(MatchConstruct::Select), NoMatchPolicy::Branch);
        assert_eq!(target.no_match_policy(MatchConstruct::Table), NoMatchPolicy::Branch);
    }

    #[test]
    fn policies_are_set_per_construct() {
        let target =
            TargetInfo::default().with_no_match_policy(MatchConstruct::Switch, NoMatchPolicy::Omit);
        assert_eq!(target.no_match_policy(MatchConstruct::Switch), NoMatchPolicy::Omit);
        assert_eq!(target.no_match_policy(MatchConstruct::Select), NoMatchPolicy::Branch);
    }
}

use itertools::Itertools;

/// Parsed query tree evaluated against a [`Database`](super::Database).
///
/// This is the target language the declarative [`crate::query::Query`]
/// renders itself into.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Matches every document, with zero weight.
    MatchAll,
    /// Matches no document.
    MatchNothing,
    Term(String),
    And(Vec<Query>),
    Or(Vec<Query>),
    /// Matches the left side minus everything the right side matches.
    AndNot(Box<Query>, Box<Query>),
    /// Multiplies the weight of the inner query.
    Scale(f64, Box<Query>),
}

impl Query {
    /// Collapses the trivial cases so callers can combine clauses blindly.
    pub fn and(mut clauses: Vec<Query>) -> Query {
        match clauses.len() {
            0 => Query::MatchAll,
            1 => clauses.remove(0),
            _ => Query::And(clauses),
        }
    }

    pub fn or(mut clauses: Vec<Query>) -> Query {
        match clauses.len() {
            0 => Query::MatchNothing,
            1 => clauses.remove(0),
            _ => Query::Or(clauses),
        }
    }

    pub fn term(term: impl Into<String>) -> Query {
        Query::Term(term.into())
    }

    /// Compact textual form for debug logging.
    pub fn description(&self) -> String {
        match self {
            Query::MatchAll => "<alldocuments>".to_string(),
            Query::MatchNothing => "<nothing>".to_string(),
            Query::Term(t) => t.clone(),
            Query::And(cs) => format!("({})", cs.iter().map(Query::description).join(" AND ")),
            Query::Or(cs) => format!("({})", cs.iter().map(Query::description).join(" OR ")),
            Query::AndNot(a, b) => {
                format!("({} AND_NOT {})", a.description(), b.description())
            }
            Query::Scale(factor, inner) => format!("{factor}*{}", inner.description()),
        }
    }
}

use crate::model::Model;

/// Hydrated results of one search, with index metadata about the match-set.
///
/// A plain bag of values: immutable after creation, produced by the domain
/// and owned by the requesting caller.
#[derive(Debug, Clone, Default)]
pub struct QueryResults {
    models: Vec<Model>,
    upper_bound: u32,
}

impl QueryResults {
    pub(crate) fn new(models: Vec<Model>, upper_bound: u32) -> QueryResults {
        QueryResults {
            models,
            upper_bound,
        }
    }

    /// The hydrated models, in match order.
    pub fn models(&self) -> &[Model] {
        &self.models
    }

    pub fn into_models(self) -> Vec<Model> {
        self.models
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Upper-bound estimate of the total number of matches, usually larger
    /// than the page that was fetched.
    pub fn upper_bound(&self) -> u32 {
        self.upper_bound
    }
}

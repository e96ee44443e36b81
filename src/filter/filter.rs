use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{FilterOptions, FilterOrderInfo};
use crate::value::{Document, Value, ID_FIELD};

/// A complete read query: predicate, sort keys and paging window.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    where_data: Document,
    where_clause: FilterWhere,
    order_data: Vec<FilterOrderInfo>,
    limit: Option<usize>,
    offset: usize,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter matching exactly the document whose `_id` equals `id`.
    pub fn by_id(id: Value) -> Self {
        let mut where_data = Document::new();
        where_data.insert(ID_FIELD, id);
        // An implicit-equality document always parses
        let where_clause = FilterWhere::parse(&where_data).unwrap_or_default();
        Self {
            where_data,
            where_clause,
            ..Self::default()
        }
    }

    pub fn where_clause(&mut self, conditions: Document) -> Result<&mut Self, FilterError> {
        self.where_clause = FilterWhere::parse(&conditions)?;
        self.where_data = conditions;
        Ok(self)
    }

    pub fn order(&mut self, order: Vec<FilterOrderInfo>) -> &mut Self {
        self.order_data = order;
        self
    }

    /// Sets the paging window. A limit of zero means "no limit"; limits above the
    /// configured maximum are capped.
    pub fn limit(&mut self, limit: Option<usize>, offset: Option<usize>, options: &FilterOptions) -> &mut Self {
        let limit = limit.filter(|l| *l > 0);
        self.limit = match (limit, options.max_limit) {
            (Some(requested), Some(max)) if requested > max => {
                if options.debug_logging {
                    tracing::warn!("Limit {} exceeds max {}, capping to max", requested, max);
                }
                Some(max)
            }
            (requested, _) => requested,
        };
        self.offset = offset.unwrap_or(0);
        self
    }

    pub fn where_data(&self) -> &Document {
        &self.where_data
    }

    pub fn order_data(&self) -> &[FilterOrderInfo] {
        &self.order_data
    }

    pub fn matches(&self, doc: &Document) -> bool {
        self.where_clause.matches(doc)
    }

    /// The `_id` this filter pins down when it is a plain `{_id: <scalar>}` lookup,
    /// letting backends use their primary key instead of a scan.
    pub fn id_lookup(&self) -> Option<&Value> {
        if self.where_data.len() != 1 {
            return None;
        }
        match self.where_data.get(ID_FIELD) {
            Some(Value::Document(_)) | Some(Value::Array(_)) | Some(Value::Null) | None => None,
            Some(id) => Some(id),
        }
    }

    /// Sorts, skips and truncates already-matched documents.
    pub fn apply(&self, mut docs: Vec<Document>) -> Vec<Document> {
        FilterOrder::sort(&mut docs, &self.order_data);
        let take = self.limit.unwrap_or(usize::MAX);
        docs.into_iter().skip(self.offset).take(take).collect()
    }

    /// True when a store may stop scanning after `offset + limit` matches.
    pub fn scan_budget(&self) -> Option<usize> {
        if !self.order_data.is_empty() {
            return None;
        }
        self.limit.map(|l| l.saturating_add(self.offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc;
    use crate::filter::filter_order::FilterOrder;

    fn docs() -> Vec<Document> {
        (1..=5).map(|n| doc! { "_id" => n, "even" => n % 2 == 0 }).collect()
    }

    #[test]
    fn apply_sorts_then_pages() {
        let mut filter = Filter::new();
        filter
            .order(FilterOrder::parse_order_string("-_id").unwrap())
            .limit(Some(2), Some(1), &FilterOptions::default());
        let ids: Vec<_> = filter.apply(docs()).iter().map(|d| d.id().cloned().unwrap()).collect();
        assert_eq!(ids, vec![Value::Int(4), Value::Int(3)]);
    }

    #[test]
    fn limit_is_capped_and_zero_means_unbounded() {
        let options = FilterOptions { max_limit: Some(2), ..FilterOptions::default() };
        let mut filter = Filter::new();
        filter.limit(Some(50), None, &options);
        assert_eq!(filter.apply(docs()).len(), 2);
        filter.limit(Some(0), None, &FilterOptions::default());
        assert_eq!(filter.apply(docs()).len(), 5);
    }

    #[test]
    fn id_lookup_only_for_plain_id_filters() {
        assert_eq!(Filter::by_id(Value::from("a")).id_lookup(), Some(&Value::from("a")));
        let mut filter = Filter::new();
        filter.where_clause(doc! { "_id" => doc! { "$gt" => 1 } }).unwrap();
        assert_eq!(filter.id_lookup(), None);
        filter.where_clause(doc! { "_id" => 1, "even" => true }).unwrap();
        assert_eq!(filter.id_lookup(), None);
    }

    #[test]
    fn matches_uses_where_clause() {
        let mut filter = Filter::new();
        filter.where_clause(doc! { "even" => true }).unwrap();
        assert_eq!(docs().iter().filter(|d| filter.matches(d)).count(), 2);
    }
}

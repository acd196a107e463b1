//! Predicate translation to MongoDB query syntax.
//!
//! Converts a docstream [`Predicate`] into the filter document and find options MongoDB
//! executes. Conditions are combined with `$and`. The same conditions can also be
//! matched against change stream events, where the document sits under `fullDocument`.

use bson::{Bson, Document, doc};
use mongodb::options::FindOptions;

use docstream_core::query::{Comparison, Condition, Predicate, SortDirection};

/// Translates a predicate into a MongoDB filter and the matching find options.
pub(crate) fn translate(predicate: &Predicate) -> (Document, FindOptions) {
    (filter(predicate, ""), options(predicate))
}

/// Builds the `$match` stage body that keeps change events relevant to `predicate`.
///
/// Deletions carry no post-image to test, so every deletion passes; the stream drops
/// removals of documents it never reported. Invalidations always pass so the
/// subscription can end.
pub(crate) fn change_filter(predicate: &Predicate) -> Document {
    doc! {
        "$or": [
            { "operationType": { "$in": ["delete", "invalidate"] } },
            filter(predicate, "fullDocument."),
        ]
    }
}

fn filter(predicate: &Predicate, prefix: &str) -> Document {
    let mut clauses = predicate
        .conditions
        .iter()
        .map(|item| condition(item, prefix))
        .collect::<Vec<_>>();

    match clauses.len() {
        0 => doc! {},
        1 => clauses.remove(0),
        _ => doc! { "$and": clauses },
    }
}

fn condition(condition: &Condition, prefix: &str) -> Document {
    let value = condition.value.clone();

    let clause = match condition.op {
        Comparison::Eq => doc! { "$eq": value },
        Comparison::Ne => doc! { "$ne": value },
        Comparison::Gt => doc! { "$gt": value },
        Comparison::Gte => doc! { "$gte": value },
        Comparison::Lt => doc! { "$lt": value },
        Comparison::Lte => doc! { "$lte": value },
        Comparison::In => doc! { "$in": as_array(value) },
        Comparison::NotIn => doc! { "$nin": as_array(value) },
        Comparison::ArrayContains => doc! { "$elemMatch": { "$eq": value } },
    };

    let field = format!("{prefix}{}", condition.field);

    doc! { field: clause }
}

/// `$in` and `$nin` require an array; a scalar is treated as a one-element set.
fn as_array(value: Bson) -> Bson {
    match value {
        Bson::Array(_) => value,
        other => Bson::Array(vec![other]),
    }
}

fn options(predicate: &Predicate) -> FindOptions {
    let mut options = FindOptions::default();

    if let Some(limit) = predicate.limit {
        options.limit = Some(limit as i64);
    }
    if let Some(order) = &predicate.order_by {
        options.sort = Some(doc! {
            order.field.as_str(): match order.direction {
                SortDirection::Asc => 1,
                SortDirection::Desc => -1,
            }
        });
    }

    options
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_predicate_matches_everything() {
        let (filter, options) = translate(&Predicate::new());

        assert_eq!(filter, doc! {});
        assert_eq!(options.limit, None);
        assert_eq!(options.sort, None);
    }

    #[test]
    fn test_single_condition_is_not_wrapped() {
        let (filter, _) = translate(&Predicate::new().where_eq("status", "active"));

        assert_eq!(filter, doc! { "status": { "$eq": "active" } });
    }

    #[test]
    fn test_conditions_are_combined_with_and() {
        let predicate = Predicate::new()
            .filter("age", Comparison::Gte, 18)
            .filter("age", Comparison::Lt, 65)
            .filter("tags", Comparison::ArrayContains, "admin");

        let (filter, _) = translate(&predicate);

        assert_eq!(
            filter,
            doc! {
                "$and": [
                    { "age": { "$gte": 18 } },
                    { "age": { "$lt": 65 } },
                    { "tags": { "$elemMatch": { "$eq": "admin" } } },
                ]
            }
        );
    }

    #[test]
    fn test_set_membership_accepts_scalars() {
        let (in_list, _) = translate(&Predicate::new().where_in("role", ["admin", "owner"]));
        let (scalar, _) = translate(&Predicate::new().filter("role", Comparison::NotIn, "guest"));

        assert_eq!(in_list, doc! { "role": { "$in": ["admin", "owner"] } });
        assert_eq!(scalar, doc! { "role": { "$nin": ["guest"] } });
    }

    #[test]
    fn test_order_and_limit_become_options() {
        let predicate = Predicate::new()
            .order_by("name", SortDirection::Desc)
            .limit(5);

        let (_, options) = translate(&predicate);

        assert_eq!(options.sort, Some(doc! { "name": -1 }));
        assert_eq!(options.limit, Some(5));
    }

    #[test]
    fn test_change_filter_matches_full_document() {
        let predicate = Predicate::new()
            .where_eq("status", "active")
            .filter("age", Comparison::Gte, 18)
            .limit(3);

        assert_eq!(
            change_filter(&predicate),
            doc! {
                "$or": [
                    { "operationType": { "$in": ["delete", "invalidate"] } },
                    {
                        "$and": [
                            { "fullDocument.status": { "$eq": "active" } },
                            { "fullDocument.age": { "$gte": 18 } },
                        ]
                    },
                ]
            }
        );
    }

    #[test]
    fn test_unrestricted_change_filter_keeps_every_event() {
        assert_eq!(
            change_filter(&Predicate::new()),
            doc! {
                "$or": [
                    { "operationType": { "$in": ["delete", "invalidate"] } },
                    {},
                ]
            }
        );
    }
}

/* This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at http://mozilla.org/MPL/2.0/. */

use crate::geometry::{FeatureType, PropertyValue};
use std::cmp::Ordering;

/// A style-layer feature filter.
///
/// Evaluated against a feature's type, id and properties. The keys `$type`
/// and `$id` address the feature's type name and id rather than a
/// property. Comparisons against a missing key or a value of a different
/// type never match; they are not errors.
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    Any(Vec<Filter>),
    All(Vec<Filter>),
    NoneOf(Vec<Filter>),
    Equal(String, PropertyValue),
    NotEqual(String, PropertyValue),
    LessThan(String, PropertyValue),
    LessThanEqual(String, PropertyValue),
    GreaterThan(String, PropertyValue),
    GreaterThanEqual(String, PropertyValue),
    In(String, Vec<PropertyValue>),
    NotIn(String, Vec<PropertyValue>),
    Has(String),
    NotHas(String),
}

impl Default for Filter {
    fn default() -> Filter {
        Filter::All(Vec::new())
    }
}

impl Filter {
    pub fn evaluate<F>(
        &self,
        feature_type: FeatureType,
        id: Option<&PropertyValue>,
        lookup: &F,
    ) -> bool
    where
        F: Fn(&str) -> Option<PropertyValue>,
    {
        let get = |key: &str| -> Option<PropertyValue> {
            match key {
                "$type" => Some(PropertyValue::String(feature_type.name().to_string())),
                "$id" => id.cloned(),
                _ => lookup(key),
            }
        };

        match *self {
            Filter::Any(ref filters) => filters
                .iter()
                .any(|f| f.evaluate(feature_type, id, lookup)),
            Filter::All(ref filters) => filters
                .iter()
                .all(|f| f.evaluate(feature_type, id, lookup)),
            Filter::NoneOf(ref filters) => !filters
                .iter()
                .any(|f| f.evaluate(feature_type, id, lookup)),
            Filter::Equal(ref key, ref value) => match get(key) {
                Some(ref actual) => loose_eq(actual, value),
                None => false,
            },
            Filter::NotEqual(ref key, ref value) => match get(key) {
                Some(ref actual) => !loose_eq(actual, value),
                None => true,
            },
            Filter::LessThan(ref key, ref value) => compares(get(key), value, Ordering::Less, false),
            Filter::LessThanEqual(ref key, ref value) => {
                compares(get(key), value, Ordering::Less, true)
            }
            Filter::GreaterThan(ref key, ref value) => {
                compares(get(key), value, Ordering::Greater, false)
            }
            Filter::GreaterThanEqual(ref key, ref value) => {
                compares(get(key), value, Ordering::Greater, true)
            }
            Filter::In(ref key, ref values) => match get(key) {
                Some(ref actual) => values.iter().any(|v| loose_eq(actual, v)),
                None => false,
            },
            Filter::NotIn(ref key, ref values) => match get(key) {
                Some(ref actual) => !values.iter().any(|v| loose_eq(actual, v)),
                None => true,
            },
            Filter::Has(ref key) => get(key).is_some(),
            Filter::NotHas(ref key) => get(key).is_none(),
        }
    }
}

fn loose_eq(a: &PropertyValue, b: &PropertyValue) -> bool {
    match (a, b) {
        (&PropertyValue::Null, &PropertyValue::Null) => true,
        (&PropertyValue::Bool(x), &PropertyValue::Bool(y)) => x == y,
        (&PropertyValue::Number(x), &PropertyValue::Number(y)) => x == y,
        (&PropertyValue::String(ref x), &PropertyValue::String(ref y)) => x == y,
        _ => false,
    }
}

fn loose_cmp(a: &PropertyValue, b: &PropertyValue) -> Option<Ordering> {
    match (a, b) {
        (&PropertyValue::Number(x), &PropertyValue::Number(y)) => x.partial_cmp(&y),
        (&PropertyValue::String(ref x), &PropertyValue::String(ref y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compares(
    actual: Option<PropertyValue>,
    expected: &PropertyValue,
    wanted: Ordering,
    or_equal: bool,
) -> bool {
    match actual {
        Some(ref actual) => match loose_cmp(actual, expected) {
            Some(ordering) => ordering == wanted || (or_equal && ordering == Ordering::Equal),
            None => false,
        },
        None => false,
    }
}
